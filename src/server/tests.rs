use super::*;
use crate::render::BoardConfig;
use crate::store::test_support::temp_store;
use serde_json::{json, Value};

const MODEL_REPLY: &str = r#"{"saudacao": "Oi, turma!", "conceito": "Divisão", "passos_lousa": [{"titulo": "Passo 1", "conteudo": "Repartir"}], "resposta_final": "5"}"#;

struct TestApp {
    base: String,
    client: reqwest::Client,
    store: Store,
    _dir: tempfile::TempDir,
}

/// Answers every request with `status`: a candidate wrapping `text` on 200,
/// an API error carrying `text` otherwise.
fn fake_gemini(status: u16, text: &'static str) -> String {
    let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    std::thread::spawn(move || {
        for mut request in server.incoming_requests() {
            let _ = std::io::copy(request.as_reader(), &mut std::io::sink());
            let body = if status == 200 {
                json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] })
            } else {
                json!({ "error": { "message": text } })
            };
            let _ = request.respond(tiny_http::Response::from_string(body.to_string()).with_status_code(status));
        }
    });
    format!("http://{addr}/")
}

async fn spawn_app(server_key: &str, gemini_base: &str) -> TestApp {
    let (dir, store) = temp_store();
    let state = AppState {
        store: store.clone(),
        board: Arc::new(BoardRenderer::new(BoardConfig::default(), Arc::new(FontBook::builtin())).unwrap()),
        tutor: GeminiClient::new(gemini_base, Duration::from_secs(5)).unwrap(),
        gemini_api_key: server_key.into(),
        session_ttl: Duration::from_secs(3600),
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, state, std::future::pending()));

    TestApp {
        base: format!("http://{addr}"),
        client: new_client(),
        store,
        _dir: dir,
    }
}

fn new_client() -> reqwest::Client {
    reqwest::Client::builder().cookie_store(true).build().unwrap()
}

impl TestApp {
    async fn post(&self, path: &str, body: Value) -> (u16, Value) {
        self.post_as(&self.client, path, body).await
    }

    async fn post_as(&self, client: &reqwest::Client, path: &str, body: Value) -> (u16, Value) {
        let res = client.post(format!("{}{}", self.base, path)).json(&body).send().await.unwrap();
        (res.status().as_u16(), res.json().await.unwrap_or(Value::Null))
    }

    async fn get(&self, path: &str) -> (u16, Value) {
        self.get_as(&self.client, path).await
    }

    async fn get_as(&self, client: &reqwest::Client, path: &str) -> (u16, Value) {
        let res = client.get(format!("{}{}", self.base, path)).send().await.unwrap();
        (res.status().as_u16(), res.json().await.unwrap_or(Value::Null))
    }

    async fn delete_as(&self, client: &reqwest::Client, path: &str) -> (u16, Value) {
        let res = client.delete(format!("{}{}", self.base, path)).send().await.unwrap();
        (res.status().as_u16(), res.json().await.unwrap_or(Value::Null))
    }

    async fn signup_as(&self, client: &reqwest::Client, email: &str) {
        let body = json!({ "nome": "Ana", "email": email, "senha": "segredo1", "nivel": "1-3" });
        let (status, out) = self.post_as(client, "/api/cadastro", body).await;
        assert_eq!(status, 200, "{out}");
    }
}

#[tokio::test]
async fn health_endpoints() {
    let app = spawn_app("", "http://127.0.0.1:9/").await;

    let (status, body) = app.get("/health").await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({ "status": "ok", "service": "Professor IA - Lousa Generator" }));

    let (status, body) = app.get("/api/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["service"], "Professor IA");
}

#[tokio::test]
async fn signup_login_and_logout() {
    let app = spawn_app("", "http://127.0.0.1:9/").await;

    let (_, me) = app.get("/api/eu").await;
    assert_eq!(me, json!({ "logado": false }));

    let body = json!({ "nome": "  Ana  ", "email": " Ana@Escola.BR ", "senha": "segredo1" });
    let (status, out) = app.post("/api/cadastro", body).await;
    assert_eq!(status, 200);
    assert_eq!(out, json!({ "ok": true, "nome": "Ana" }));

    let (_, me) = app.get("/api/eu").await;
    assert_eq!(me["logado"], true);
    assert_eq!(me["email"], "ana@escola.br");
    assert_eq!(me["nivel"], "4-5");
    assert_eq!(me["nome_professor"], "Professor Max");
    assert_eq!(me["tem_gemini"], false);

    let (status, out) = app.post("/api/logout", json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(out, json!({ "ok": true }));
    let (_, me) = app.get("/api/eu").await;
    assert_eq!(me["logado"], false);

    let login = json!({ "email": "ANA@escola.br", "senha": "segredo1" });
    let (status, out) = app.post("/api/login", login).await;
    assert_eq!(status, 200);
    assert_eq!(out["nome"], "Ana");
    let (_, me) = app.get("/api/eu").await;
    assert_eq!(me["logado"], true);
}

#[tokio::test]
async fn account_validation_errors() {
    let app = spawn_app("", "http://127.0.0.1:9/").await;

    let (status, out) = app.post("/api/cadastro", json!({ "nome": "Ana", "email": "a@b.c" })).await;
    assert_eq!(status, 400);
    assert_eq!(out["erro"], "Preencha todos os campos.");

    let short = json!({ "nome": "Ana", "email": "a@b.c", "senha": "12345" });
    let (status, out) = app.post("/api/cadastro", short).await;
    assert_eq!(status, 400);
    assert_eq!(out["erro"], "A senha precisa ter pelo menos 6 caracteres.");

    app.signup_as(&app.client, "a@b.c").await;
    let again = json!({ "nome": "Bia", "email": "A@B.C", "senha": "123456" });
    let (status, out) = app.post_as(&new_client(), "/api/cadastro", again).await;
    assert_eq!(status, 400);
    assert_eq!(out["erro"], "Este e-mail já está cadastrado.");

    let (status, out) = app.post_as(&new_client(), "/api/login", json!({ "email": "a@b.c" })).await;
    assert_eq!(status, 400);
    assert_eq!(out["erro"], "Preencha e-mail e senha.");

    let wrong = json!({ "email": "a@b.c", "senha": "errada!" });
    let (status, out) = app.post_as(&new_client(), "/api/login", wrong).await;
    assert_eq!(status, 401);
    assert_eq!(out["erro"], "E-mail ou senha incorretos.");

    let unknown = json!({ "email": "x@y.z", "senha": "segredo1" });
    let (status, _) = app.post_as(&new_client(), "/api/login", unknown).await;
    assert_eq!(status, 401);
}

#[tokio::test]
async fn protected_routes_require_a_session() {
    let app = spawn_app("", "http://127.0.0.1:9/").await;

    for path in ["/api/conversas", "/api/conversas/abc"] {
        let (status, out) = app.get(path).await;
        assert_eq!(status, 401, "{path}");
        assert_eq!(out["erro"], "Não autenticado");
    }
    let (status, _) = app.post("/api/perguntar", json!({ "texto": "1 + 1" })).await;
    assert_eq!(status, 401);
    let (status, _) = app.post("/api/config", json!({})).await;
    assert_eq!(status, 401);
    let (status, _) = app.post("/api/lousa", json!({})).await;
    assert_eq!(status, 401);
}

#[tokio::test]
async fn settings_are_saved() {
    let app = spawn_app("", "http://127.0.0.1:9/").await;
    app.signup_as(&app.client, "a@b.c").await;

    let settings = json!({ "nivel": "6-9", "gemini_key": " k-own ", "nome_professor": "Professora Lia" });
    let (status, out) = app.post("/api/config", settings).await;
    assert_eq!(status, 200);
    assert_eq!(out, json!({ "ok": true }));

    let (_, me) = app.get("/api/eu").await;
    assert_eq!(me["nivel"], "6-9");
    assert_eq!(me["gemini_key"], "k-own");
    assert_eq!(me["nome_professor"], "Professora Lia");
    assert_eq!(me["tem_gemini"], true);
}

#[tokio::test]
async fn asking_needs_a_key() {
    let app = spawn_app("", "http://127.0.0.1:9/").await;
    app.signup_as(&app.client, "a@b.c").await;

    let (status, out) = app.post("/api/perguntar", json!({ "texto": "10 ÷ 2" })).await;
    assert_eq!(status, 400);
    assert_eq!(out["erro"], "Configure sua chave do Gemini nas configurações.");
}

#[tokio::test]
async fn ask_stores_the_conversation() {
    let app = spawn_app("server-key", &fake_gemini(200, MODEL_REPLY)).await;
    app.signup_as(&app.client, "a@b.c").await;

    let (status, reply) = app.post("/api/perguntar", json!({ "texto": "  10 ÷ 2  " })).await;
    assert_eq!(status, 200, "{reply}");
    assert_eq!(reply["saudacao"], "Oi, turma!");
    assert_eq!(reply["passos_lousa"][0]["conteudo"], "Repartir");
    assert_eq!(reply["dica_extra"], "");
    let id = reply["conversa_id"].as_str().unwrap().to_string();

    let (_, list) = app.get("/api/conversas").await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["id"], id.as_str());
    assert_eq!(list[0]["titulo"], "10 ÷ 2");

    let (status, again) = app.post("/api/perguntar", json!({ "texto": "e 12 ÷ 3?", "conversa_id": id })).await;
    assert_eq!(status, 200);
    assert_eq!(again["conversa_id"], id.as_str());

    let (status, messages) = app.get(&format!("/api/conversas/{id}")).await;
    assert_eq!(status, 200);
    let messages = messages.as_array().unwrap();
    let kinds: Vec<_> = messages.iter().map(|m| m["tipo"].as_str().unwrap()).collect();
    assert_eq!(kinds, ["aluno", "professor", "aluno", "professor"]);
    assert_eq!(messages[0]["conteudo"], "10 ÷ 2");
    assert_eq!(messages[0]["tem_imagem"], 0);

    let stored: Value = serde_json::from_str(messages[1]["conteudo"].as_str().unwrap()).unwrap();
    assert_eq!(stored["resposta_final"], "5");
    assert!(stored.get("conversa_id").is_none());
}

#[tokio::test]
async fn image_question_gets_default_title() {
    let app = spawn_app("server-key", &fake_gemini(200, "Não sei ler JSON")).await;
    app.signup_as(&app.client, "a@b.c").await;

    let question = json!({ "imagem": "data:image/png;base64,iVBORw0K" });
    let (status, reply) = app.post("/api/perguntar", question).await;
    assert_eq!(status, 200);
    assert_eq!(reply["questao_identificada"], "questão da imagem");
    assert_eq!(reply["passos_lousa"][0]["titulo"], "Resolução");

    let (_, list) = app.get("/api/conversas").await;
    assert_eq!(list[0]["titulo"], "Questão com imagem");
    let id = list[0]["id"].as_str().unwrap();
    let (_, messages) = app.get(&format!("/api/conversas/{id}")).await;
    assert_eq!(messages[0]["conteudo"], "Foto da questão");
    assert_eq!(messages[0]["tem_imagem"], 1);
}

#[tokio::test]
async fn long_questions_are_titled_by_prefix() {
    let app = spawn_app("server-key", &fake_gemini(200, MODEL_REPLY)).await;
    app.signup_as(&app.client, "a@b.c").await;

    let text = "á".repeat(80);
    let (status, _) = app.post("/api/perguntar", json!({ "texto": text })).await;
    assert_eq!(status, 200);
    let (_, list) = app.get("/api/conversas").await;
    assert_eq!(list[0]["titulo"].as_str().unwrap().chars().count(), 50);
}

#[tokio::test]
async fn ai_errors_are_reported() {
    let app = spawn_app("server-key", &fake_gemini(400, "API key not valid")).await;
    app.signup_as(&app.client, "a@b.c").await;

    let (status, out) = app.post("/api/perguntar", json!({ "texto": "1 + 1" })).await;
    assert_eq!(status, 500);
    assert_eq!(out["erro"], "Erro do Gemini: API key not valid");
}

#[tokio::test]
async fn conversations_are_private() {
    let app = spawn_app("server-key", &fake_gemini(200, MODEL_REPLY)).await;
    app.signup_as(&app.client, "ana@b.c").await;
    let (_, reply) = app.post("/api/perguntar", json!({ "texto": "2 + 2" })).await;
    let id = reply["conversa_id"].as_str().unwrap().to_string();
    let path = format!("/api/conversas/{id}");

    let other = new_client();
    app.signup_as(&other, "bia@b.c").await;

    let (status, out) = app.get_as(&other, &path).await;
    assert_eq!(status, 404);
    assert_eq!(out["erro"], "Conversa não encontrada.");

    let (_, list) = app.get_as(&other, "/api/conversas").await;
    assert_eq!(list, json!([]));

    let foreign = json!({ "texto": "3 + 3", "conversa_id": id });
    let (status, _) = app.post_as(&other, "/api/perguntar", foreign).await;
    assert_eq!(status, 404);

    let (status, out) = app.delete_as(&other, &path).await;
    assert_eq!(status, 200);
    assert_eq!(out, json!({ "ok": true }));
    assert_eq!(app.store.messages(&id).unwrap().len(), 2);

    let (status, _) = app.delete_as(&app.client, &path).await;
    assert_eq!(status, 200);
    let (status, _) = app.get(&path).await;
    assert_eq!(status, 404);
    assert!(app.store.messages(&id).unwrap().is_empty());
}

#[tokio::test]
async fn standalone_board_returns_png() {
    let app = spawn_app("", "http://127.0.0.1:9/").await;

    let body = json!({
        "texto_lousa": "10 dividido por 2",
        "numeros": [10, 2],
        "tipo_operacao": "divisão",
        "dica_visual": "Imagine 10 balas para 2 amigos"
    });
    let res = app
        .client
        .post(format!("{}/gerar-lousa", app.base))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(res.headers()["content-type"], "image/png");
    assert!(res.headers()["content-disposition"].to_str().unwrap().contains("lousa.png"));
    let png = res.bytes().await.unwrap();
    assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
}

#[tokio::test]
async fn standalone_board_rejects_bad_json_with_error_key() {
    let app = spawn_app("", "http://127.0.0.1:9/").await;

    let res = app
        .client
        .post(format!("{}/gerar-lousa", app.base))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 400);
    let out: Value = res.json().await.unwrap();
    assert!(out["error"].is_string());
    assert!(out.get("erro").is_none());
}

#[tokio::test]
async fn user_board_returns_png() {
    let app = spawn_app("", "http://127.0.0.1:9/").await;
    app.signup_as(&app.client, "a@b.c").await;

    let res = app
        .client
        .post(format!("{}/api/lousa", app.base))
        .json(&json!({ "numeros": [3, 4], "tipo_operacao": "soma" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(res.headers()["content-type"], "image/png");
    assert!(res.bytes().await.unwrap().starts_with(b"\x89PNG"));
}
