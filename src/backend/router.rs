//! Configuration des routes pour l'application.
//! Toutes les routes sont servies sous `/api`; celles qui exigent une
//! authentification passent par le middleware [`AuthUser`].

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_extractor_with_state,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowMethods, Any, CorsLayer};

use crate::backend::handlers_auth::{
    analyze, create_doctor, create_report, delete_report, get_report, list_all_reports,
    list_patients, list_reports, notify_patient,
};
use crate::backend::handlers_unauth::{login, login_role, register, register_role, test};
use crate::backend::{middlewares::AuthUser, state::AppState};
use crate::consts::MAX_BODY_SIZE;

/// Initialisation du routeur principal et des middlewares
pub fn get_router(state: AppState) -> Router {
    // Any origin, as the web front end is served separately
    let cors = CorsLayer::new()
        .allow_methods(AllowMethods::any())
        .allow_headers(AllowHeaders::any())
        .allow_origin(Any);

    let api = Router::new()
        .merge(unauth_routes())
        .merge(auth_routes(state.clone()));

    Router::new()
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(cors)
        .with_state(state)
}

/// Routes accessibles sans authentification
fn unauth_routes() -> Router<AppState> {
    Router::new()
        .route("/test", get(test))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/:role/register", post(register_role))
        .route("/auth/:role/login", post(login_role))
}

/// Routes nécessitant un jeton valide
fn auth_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/chef/doctors", post(create_doctor))
        .route("/patients", get(list_patients))
        .route("/analyze", post(analyze))
        .route("/reports", get(list_reports))
        .route("/reports/all", get(list_all_reports))
        .route("/reports/create", post(create_report))
        .route("/reports/:id", get(get_report).delete(delete_report))
        .route("/reports/:id/notify", post(notify_patient))
        .route_layer(from_extractor_with_state::<AuthUser, AppState>(state))
}
