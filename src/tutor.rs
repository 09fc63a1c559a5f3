//! Gemini client producing step-by-step explanations.
//!
//! One request per student question: the prompt asks the model to answer as
//! a patient math teacher and to reply with a JSON document shaped like
//! [`TutorReply`]. Replies that are not valid JSON are wrapped into a
//! single-step fallback instead of failing the question.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::net;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum TutorError {
    #[error("Erro do Gemini: {0}")]
    Api(String),

    #[error("A IA demorou muito para responder. Tente novamente.")]
    Timeout,

    #[error("Erro ao conectar com a IA: {0}")]
    Transport(reqwest::Error),

    #[error("Erro ao conectar com a IA: resposta inválida ({0})")]
    BadResponse(#[from] serde_json::Error),

    #[error("Invalid AI endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}

impl From<reqwest::Error> for TutorError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TutorError::Timeout
        } else {
            TutorError::Transport(e)
        }
    }
}

/// One step written on the board.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TutorStep {
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "conteudo")]
    pub content: String,
}

/// The structured explanation. Missing fields are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TutorReply {
    #[serde(rename = "saudacao")]
    pub greeting: String,
    #[serde(rename = "questao_identificada")]
    pub identified_question: String,
    #[serde(rename = "conceito")]
    pub concept: String,
    #[serde(rename = "passos_lousa")]
    pub steps: Vec<TutorStep>,
    #[serde(rename = "resposta_final")]
    pub final_answer: String,
    #[serde(rename = "pergunta_verificacao")]
    pub check_question: String,
    #[serde(rename = "dica_extra")]
    pub extra_tip: String,
    #[serde(rename = "encorajamento")]
    pub encouragement: String,
}

impl TutorReply {
    /// Wraps raw model text that could not be parsed.
    pub fn fallback(question: &str, raw: &str) -> Self {
        Self {
            greeting: "Oi! Vamos resolver juntos!".into(),
            identified_question: if question.is_empty() { "questão da imagem".into() } else { question.into() },
            concept: String::new(),
            steps: vec![TutorStep { title: "Resolução".into(), content: raw.into() }],
            final_answer: String::new(),
            check_question: "Entendeu? Me conta o que achou!".into(),
            extra_tip: String::new(),
            encouragement: "Você consegue!".into(),
        }
    }

    /// Parses model output, tolerating markdown code fences.
    pub fn from_model_text(question: &str, text: &str) -> Self {
        let cleaned = text.replace("```json", "").replace("```", "");
        let cleaned = cleaned.trim();
        match serde_json::from_str(cleaned) {
            Ok(reply) => reply,
            Err(e) => {
                log::warn!("Model reply is not valid JSON ({}), using fallback", e);
                Self::fallback(question, cleaned)
            }
        }
    }
}

/// An image attached to a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    /// Base64 payload without any `data:` header.
    pub data: String,
}

impl InlineImage {
    /// Accepts either a `data:<mime>;base64,<payload>` URL or a bare base64
    /// payload (assumed JPEG). Empty input means no image.
    pub fn from_data_url(input: &str) -> Option<Self> {
        if input.is_empty() {
            return None;
        }
        let Some((header, payload)) = input.split_once(',') else {
            return Some(Self { mime_type: "image/jpeg".into(), data: input.into() });
        };

        let mime_type = header
            .split_once(':')
            .map(|(_, rest)| rest.split(';').next().unwrap_or_default())
            .filter(|mime| !mime.is_empty())
            .unwrap_or("image/jpeg");
        Some(Self { mime_type: mime_type.into(), data: payload.into() })
    }
}

/// Audience description for a school year band; unknown bands use `4-5`.
pub fn level_description(level: &str) -> &'static str {
    match level {
        "1-3" => "crianças de 6 a 8 anos (1° ao 3° ano). Use palavras BEM simples, exemplos com brinquedos e desenhos.",
        "6-9" => "alunos de 11 a 14 anos (6° ao 9° ano). Pode usar termos mais técnicos.",
        _ => "crianças de 9 a 10 anos (4° ao 5° ano). Use linguagem simples e exemplos do dia a dia.",
    }
}

/// A student question, ready to send.
#[derive(Debug, Clone)]
pub struct Question<'a> {
    pub text: &'a str,
    pub image: Option<InlineImage>,
    pub level: &'a str,
    pub teacher_name: &'a str,
}

impl Question<'_> {
    pub fn prompt(&self) -> String {
        let task = if self.text.is_empty() {
            "O aluno enviou uma foto da questão. Analise a imagem com atenção e resolva.".to_string()
        } else {
            format!("QUESTÃO DO ALUNO: {}", self.text)
        };

        format!(
            r#"Você é o {name}, um professor de matemática paciente, divertido e carinhoso.
Você ensina para {audience}

Resolva a questão passo a passo, como se estivesse escrevendo na lousa para a turma.

REGRAS:
1. Resolva a questão por completo, mostrando todos os passos.
2. Explique cada passo como se estivesse falando para a turma.
3. Use exemplos do dia a dia para ilustrar o conceito.
4. Seja encorajador, positivo e divertido.
5. Se houver alternativas, indique a correta e explique por que as outras estão erradas.
6. Se houver imagem, analise a questão nela com atenção.

Responda em JSON válido (sem markdown) com este formato:
{{
  "saudacao": "frase curta de saudação",
  "questao_identificada": "transcrição resumida da questão",
  "conceito": "conceito matemático envolvido, explicado em 2-3 frases",
  "passos_lousa": [
    {{"titulo": "Passo 1: título curto", "conteudo": "explicação detalhada do passo"}}
  ],
  "resposta_final": "A resposta é X porque...",
  "pergunta_verificacao": "pergunta para o aluno confirmar que entendeu",
  "dica_extra": "truque para lembrar deste tipo de questão",
  "encorajamento": "frase motivacional curta"
}}

O campo "passos_lousa" deve ter entre 3 e 6 passos.

{task}

Responda APENAS com o JSON, sem nenhum texto antes ou depois."#,
            name = self.teacher_name,
            audience = level_description(self.level),
            task = task,
        )
    }

    fn request_body(&self) -> Value {
        let mut parts = vec![json!({ "text": self.prompt() })];
        if let Some(image) = &self.image {
            parts.push(json!({
                "inline_data": { "mime_type": image.mime_type, "data": image.data }
            }));
        }

        json!({
            "contents": [{ "parts": parts }],
            "generationConfig": { "temperature": 0.7, "maxOutputTokens": 4000 }
        })
    }
}

/// Thin client for the `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: url::Url,
}

impl GeminiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TutorError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        // Joined paths must land below the base, not replace its last segment.
        let mut base_url = url::Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { http, base_url })
    }

    fn endpoint(&self, api_key: &str) -> Result<url::Url, TutorError> {
        let mut url = self
            .base_url
            .join(&format!("v1beta/models/{MODEL}:generateContent"))?;
        url.query_pairs_mut().append_pair("key", api_key);
        Ok(url)
    }

    pub async fn ask(&self, api_key: &str, question: &Question<'_>) -> Result<TutorReply, TutorError> {
        let url = self.endpoint(api_key)?;
        log::debug!(
            "Asking {} (text {} chars, image: {})",
            MODEL,
            question.text.chars().count(),
            question.image.is_some()
        );

        let res = net::post_json(&self.http, url, &question.request_body()).await?;

        if res.status != 200 {
            let message = res
                .json::<Value>()
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
                .unwrap_or_else(|| {
                    log::debug!("Unstructured error body ({:?}): {}", res.content_type(), res.text());
                    "Erro desconhecido".to_string()
                });
            log::warn!("Gemini returned {} {}: {}", res.status, res.status_text, message);
            return Err(TutorError::Api(message));
        }

        let data: Value = res.json()?;
        let text = data["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .unwrap_or_default();
        Ok(TutorReply::from_model_text(question.text, text))
    }
}
