//! API de gestion des rapports de fractures.
//!
//! Authentifie les comptes (chef, médecin, patient), transmet les radiographies
//! au service d'analyse externe, conserve les rapports et notifie les patients
//! par email.

pub mod analysis;
pub mod authorization;
pub mod backend;
pub mod config;
pub mod consts;
pub mod database;
pub mod email;
pub mod models;
pub mod services;
pub mod utils;
