//! Accès aux comptes et aux rapports.
//!
//! Le magasin est un objet construit explicitement au démarrage puis partagé
//! par tous les handlers. Deux implémentations: [`memory::MemoryStore`]
//! (par défaut) et, avec la feature `mongo`, `mongo::MongoStore`.

use std::io;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Account, AccountId, EnrichedReport, Report, ReportId, Role};

pub mod memory;
#[cfg(feature = "mongo")]
pub mod mongo;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("an account with this email already exists")]
    DuplicateEmail,

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("snapshot I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Les rapports à lister
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFilter {
    All,
    Patient(AccountId),
    Doctor(AccountId),
}

impl ReportFilter {
    pub fn matches(&self, report: &Report) -> bool {
        match self {
            ReportFilter::All => true,
            ReportFilter::Patient(id) => report.patient_id == *id,
            ReportFilter::Doctor(id) => report.doctor_id == *id,
        }
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Insère un compte; échoue si son email (non vide) est déjà pris.
    async fn insert_account(&self, account: Account) -> Result<(), StoreError>;

    async fn find_account(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    /// Recherche exacte sur l'email normalisé.
    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    async fn list_accounts_created_by(
        &self,
        creator: AccountId,
        role: Role,
    ) -> Result<Vec<Account>, StoreError>;

    async fn insert_report(&self, report: Report) -> Result<(), StoreError>;

    async fn find_report(&self, id: ReportId) -> Result<Option<Report>, StoreError>;

    /// Renvoie faux si le rapport n'existait pas.
    async fn delete_report(&self, id: ReportId) -> Result<bool, StoreError>;

    /// Rapports avec les noms du patient et du médecin, du plus récent au plus ancien.
    async fn list_reports(&self, filter: ReportFilter) -> Result<Vec<EnrichedReport>, StoreError>;
}

/// Tri commun aux deux implémentations
pub(crate) fn newest_first(reports: &mut [EnrichedReport]) {
    reports.sort_by(|a, b| b.report.created_at.cmp(&a.report.created_at));
}
