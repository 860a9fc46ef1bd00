use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use serde_json::Value;
use tracing::info;

use crate::{
    error::{AppError, AppResult},
    models::{
        HealthResponse, LoginRequest, LoginResponse, MessageResponse, RegisterRequest,
    },
    state::AppState,
    store::Record,
};

pub async fn root() -> &'static str {
    "Gostwear Backend is Live and Ready"
}

pub async fn healthcheck() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn list_products(State(state): State<AppState>) -> AppResult<Json<Vec<Record>>> {
    let products = state.catalog.list_products().await?;
    Ok(Json(products))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Record>> {
    let product = state.catalog.get_product(&id).await?;
    Ok(Json(product))
}

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<Json<MessageResponse>> {
    state.accounts.register(json_or_default(payload)?).await?;
    Ok(Json(MessageResponse::new("Registration successful")))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<LoginResponse>> {
    let user = state.accounts.login(json_or_default(payload)?).await?;
    Ok(Json(LoginResponse {
        message: "Login successful".to_string(),
        user,
    }))
}

/// Orders are acknowledged and logged; fulfilment happens elsewhere.
pub async fn place_order(
    payload: Result<Json<Value>, JsonRejection>,
) -> AppResult<Json<MessageResponse>> {
    let order = json_or_default(payload)?;
    info!(order = %order, "order received");
    Ok(Json(MessageResponse::new("Order received successfully")))
}

/// A body sent without a JSON content type reads as empty, so the
/// required-field checks answer it. Malformed or mistyped JSON is a 400.
fn json_or_default<T: Default>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(T::default()),
        Err(rejection) => Err(AppError::from(rejection)),
    }
}
