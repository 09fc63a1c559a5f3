use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::{ApiError, PlainError};
use crate::render::{Operation, RenderRequest};
use crate::server::{AppState, CurrentUser};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BoardBody {
    pub texto_lousa: String,
    /// Anything; only integer-valued numbers of an array are used.
    pub numeros: Value,
    pub tipo_operacao: String,
    pub dica_visual: String,
}

impl BoardBody {
    fn into_request(self) -> RenderRequest {
        RenderRequest::new(
            self.texto_lousa,
            operands(&self.numeros),
            Operation::from_name(&self.tipo_operacao),
        )
        .with_hint(self.dica_visual)
    }
}

/// Integer-valued entries of a JSON array, in order. `4.0` counts, `4.5`
/// and `"4"` do not.
fn operands(numbers: &Value) -> Vec<i64> {
    let Some(items) = numbers.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|n| {
            n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| f as i64)
            })
        })
        .collect()
}

async fn render_png(state: &AppState, req: RenderRequest) -> Result<impl IntoResponse, ApiError> {
    let board = state.board.clone();
    let png = tokio::task::spawn_blocking(move || board.render_png(&req))
        .await
        .map_err(|e| {
            log::error!("Render task failed: {}", e);
            ApiError::Internal
        })??;

    Ok((
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CONTENT_DISPOSITION, "inline; filename=\"lousa.png\""),
        ],
        png,
    ))
}

fn body_or_bad_request(body: Result<Json<BoardBody>, JsonRejection>) -> Result<BoardBody, ApiError> {
    body.map(|Json(b)| b).map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

pub async fn user_board(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    body: Result<Json<BoardBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let req = body_or_bad_request(body)?.into_request();
    render_png(&state, req).await
}

pub async fn standalone_board(
    State(state): State<AppState>,
    body: Result<Json<BoardBody>, JsonRejection>,
) -> Result<impl IntoResponse, PlainError> {
    let req = body_or_bad_request(body)?.into_request();
    Ok(render_png(&state, req).await?)
}

pub async fn api_health() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "Professor IA" }))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "Professor IA - Lousa Generator" }))
}
