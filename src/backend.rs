//! Couche HTTP de l'application.
//! Contient les gestionnaires pour les routes, les modèles de requêtes et de
//! réponses, le routeur, et le middleware d'authentification.

pub mod errors;
pub mod handlers_auth;
pub mod handlers_unauth;
pub mod middlewares;
pub mod models;
pub mod router;
pub mod state;
