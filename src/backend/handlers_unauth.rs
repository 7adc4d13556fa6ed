//! Routes accessibles sans authentification: test de vie, inscription et
//! connexion (unifiées ou par rôle).

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use log::info;

use crate::backend::{
    errors::ApiError,
    models::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse},
    state::AppState,
};
use crate::models::Role;
use crate::utils::error_messages::INVALID_BODY;

type ApiResult<T> = Result<T, ApiError>;

/// Test de vie
pub async fn test() -> &'static str {
    "API is working!"
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload.map(|Json(value)| value).map_err(|rejection| {
        info!("Rejected request body: {rejection}");
        ApiError::Validation(INVALID_BODY.to_string())
    })
}

fn path_role(raw: &str) -> ApiResult<Role> {
    raw.parse().map_err(|_| ApiError::NotFound("Unknown role"))
}

async fn register_as(
    state: &AppState,
    role: Role,
    request: RegisterRequest,
    message: String,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    let user = state
        .service
        .register(
            role,
            &request.full_name,
            &request.email,
            &request.password,
            request.created_by.as_deref(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { message, user })))
}

/// Inscription, le rôle étant donné dans le corps de la requête
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    let request = body(payload)?;
    let role = request
        .role
        .ok_or_else(|| ApiError::Validation("role: required".to_string()))?;

    register_as(&state, role, request, "User registered successfully".to_string()).await
}

/// Inscription avec le rôle fixé par le chemin (`/auth/doctor/register`, ...)
pub async fn register_role(
    State(state): State<AppState>,
    Path(role): Path<String>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    let role = path_role(&role)?;
    let request = body(payload)?;

    let mut message = role.to_string();
    if let Some(first) = message.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    register_as(&state, role, request, format!("{message} registered successfully")).await
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<LoginResponse>> {
    let request = body(payload)?;
    let token = state.service.login(&request.email, &request.password, None).await?;
    Ok(Json(LoginResponse { token }))
}

/// Connexion réservée aux comptes du rôle donné par le chemin
pub async fn login_role(
    State(state): State<AppState>,
    Path(role): Path<String>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<LoginResponse>> {
    let role = path_role(&role)?;
    let request = body(payload)?;
    let token = state
        .service
        .login(&request.email, &request.password, Some(role))
        .await?;
    Ok(Json(LoginResponse { token }))
}
