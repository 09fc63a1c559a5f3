use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth;
use crate::errors::ApiError;
use crate::server::{db, AppState, CurrentUser, Session};
use crate::store::{NewUser, UserSettings};

const MIN_PASSWORD_CHARS: usize = 6;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SignupBody {
    pub nome: String,
    pub email: String,
    pub senha: String,
    pub nivel: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginBody {
    pub email: String,
    pub senha: String,
}

#[derive(Debug, Deserialize)]
pub struct SettingsBody {
    #[serde(default = "default_level")]
    pub nivel: String,
    #[serde(default)]
    pub gemini_key: String,
    #[serde(default = "default_teacher")]
    pub nome_professor: String,
}

fn default_level() -> String {
    "4-5".to_string()
}

fn default_teacher() -> String {
    "Professor Max".to_string()
}

/// Creates a session for `user_id` and returns the `Set-Cookie` value.
async fn start_session(state: &AppState, user_id: &str) -> Result<String, ApiError> {
    let token = auth::new_session_token();
    let ttl = state.session_ttl;
    let (t, u) = (token.clone(), user_id.to_string());
    db(&state.store, move |store| store.create_session(&t, &u, ttl)).await?;
    Ok(auth::session_cookie(&token, ttl))
}

pub async fn signup(
    State(state): State<AppState>,
    Json(body): Json<SignupBody>,
) -> Result<impl IntoResponse, ApiError> {
    let name = body.nome.trim().to_string();
    let email = body.email.trim().to_lowercase();

    if name.is_empty() || email.is_empty() || body.senha.is_empty() {
        return Err(ApiError::BadRequest("Preencha todos os campos.".into()));
    }
    if body.senha.chars().count() < MIN_PASSWORD_CHARS {
        return Err(ApiError::BadRequest("A senha precisa ter pelo menos 6 caracteres.".into()));
    }

    let level = if body.nivel.is_empty() { default_level() } else { body.nivel };
    let password_hash = auth::hash_password(&body.senha);

    let user = db(&state.store, move |store| {
        store.create_user(&NewUser {
            name: &name,
            email: &email,
            password_hash: &password_hash,
            level: &level,
        })
    })
    .await?;

    let cookie = start_session(&state, &user.id).await?;
    Ok(([(header::SET_COOKIE, cookie)], Json(json!({ "ok": true, "nome": user.name }))))
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> Result<impl IntoResponse, ApiError> {
    let email = body.email.trim().to_lowercase();
    if email.is_empty() || body.senha.is_empty() {
        return Err(ApiError::BadRequest("Preencha e-mail e senha.".into()));
    }

    let user = db(&state.store, move |store| store.user_by_email(&email)).await?;
    let Some(user) = user.filter(|u| auth::verify_password(&body.senha, &u.password_hash)) else {
        return Err(ApiError::WrongCredentials);
    };

    log::info!("User {} logged in", user.id);
    let cookie = start_session(&state, &user.id).await?;
    Ok(([(header::SET_COOKIE, cookie)], Json(json!({ "ok": true, "nome": user.name }))))
}

pub async fn logout(State(state): State<AppState>, session: Session) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = session.token {
        db(&state.store, move |store| store.delete_session(&token)).await?;
    }
    Ok(([(header::SET_COOKIE, auth::clear_session_cookie())], Json(json!({ "ok": true }))))
}

pub async fn me(State(state): State<AppState>, session: Session) -> Json<Value> {
    let Some(user) = session.user else {
        return Json(json!({ "logado": false }));
    };

    let has_key = state.gemini_key_for(&user).is_some();
    Json(json!({
        "logado": true,
        "id": user.id,
        "nome": user.name,
        "email": user.email,
        "nivel": user.level,
        "gemini_key": user.gemini_key,
        "nome_professor": user.teacher_name,
        "tem_gemini": has_key,
    }))
}

pub async fn save_settings(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<SettingsBody>,
) -> Result<Json<Value>, ApiError> {
    let settings = UserSettings {
        level: body.nivel,
        gemini_key: body.gemini_key.trim().to_string(),
        teacher_name: body.nome_professor,
    };
    db(&state.store, move |store| store.update_settings(&user.id, &settings)).await?;
    Ok(Json(json!({ "ok": true })))
}
