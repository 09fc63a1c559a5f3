use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::ApiError;
use crate::server::{db, AppState, CurrentUser};
use crate::store::MessageKind;
use crate::tutor::{InlineImage, Question, TutorError};

const TITLE_CHARS: usize = 50;
const RECENT_CONVERSATIONS: usize = 30;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AskBody {
    pub texto: String,
    /// Base64 image, with or without a `data:` header.
    pub imagem: String,
    /// Empty starts a new conversation.
    pub conversa_id: String,
}

fn not_found() -> ApiError {
    ApiError::NotFound("Conversa não encontrada.".into())
}

pub async fn ask(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<AskBody>,
) -> Result<Json<Value>, ApiError> {
    let Some(api_key) = state.gemini_key_for(&user) else {
        return Err(ApiError::BadRequest("Configure sua chave do Gemini nas configurações.".into()));
    };

    let text = body.texto.trim().to_string();
    let has_image = !body.imagem.is_empty();
    let requested = body.conversa_id.trim().to_string();
    let (title, student_text) = if text.is_empty() {
        ("Questão com imagem".to_string(), "Foto da questão".to_string())
    } else {
        (text.chars().take(TITLE_CHARS).collect(), text.clone())
    };

    let user_id = user.id.clone();
    let conversation = db(&state.store, move |store| {
        let conversation = if requested.is_empty() {
            Some(store.create_conversation(&user_id, &title)?)
        } else {
            store.conversation_for_user(&requested, &user_id)?
        };
        if let Some(c) = &conversation {
            store.add_message(&c.id, MessageKind::Student, &student_text, has_image)?;
        }
        Ok(conversation)
    })
    .await?
    .ok_or_else(not_found)?;

    let question = Question {
        text: &text,
        image: InlineImage::from_data_url(&body.imagem),
        level: if user.level.is_empty() { "4-5" } else { &user.level },
        teacher_name: if user.teacher_name.is_empty() { "Professor Max" } else { &user.teacher_name },
    };
    let reply = state.tutor.ask(&api_key, &question).await?;

    let mut payload = serde_json::to_value(&reply).map_err(TutorError::from)?;
    let stored = payload.to_string();
    let conversation_id = conversation.id.clone();
    db(&state.store, move |store| {
        store.add_message(&conversation_id, MessageKind::Professor, &stored, false)?;
        store.touch_conversation(&conversation_id)
    })
    .await?;

    if let Value::Object(map) = &mut payload {
        map.insert("conversa_id".into(), Value::String(conversation.id));
    }
    Ok(Json(payload))
}

pub async fn list_conversations(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Value>, ApiError> {
    let conversations = db(&state.store, move |store| {
        store.recent_conversations(&user.id, RECENT_CONVERSATIONS)
    })
    .await?;

    let out = conversations
        .into_iter()
        .map(|c| {
            json!({
                "id": c.id,
                "titulo": c.title,
                "criada_em": c.created_at,
                "ultima_msg": c.last_message_at,
            })
        })
        .collect();
    Ok(Json(Value::Array(out)))
}

pub async fn conversation_messages(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let messages = db(&state.store, move |store| {
        match store.conversation_for_user(&id, &user.id)? {
            Some(c) => store.messages(&c.id).map(Some),
            None => Ok(None),
        }
    })
    .await?
    .ok_or_else(not_found)?;

    let out = messages
        .into_iter()
        .map(|m| {
            json!({
                "id": m.id,
                "tipo": m.kind.as_str(),
                "conteudo": m.content,
                "tem_imagem": m.has_image as i64,
                "criada_em": m.created_at,
            })
        })
        .collect();
    Ok(Json(Value::Array(out)))
}

pub async fn delete_conversation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    // Unknown or foreign ids are a silent no-op.
    let deleted = db(&state.store, move |store| store.delete_conversation(&id, &user.id)).await?;
    if !deleted {
        log::debug!("Conversation delete matched nothing");
    }
    Ok(Json(json!({ "ok": true })))
}
