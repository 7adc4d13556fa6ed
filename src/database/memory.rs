//! Stockage en mémoire, avec sauvegarde optionnelle en JSON après chaque
//! écriture.

use std::{
    collections::HashMap,
    io::ErrorKind::NotFound,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::{newest_first, ReportFilter, Store, StoreError};
use crate::models::{Account, AccountId, EnrichedReport, Report, ReportId, Role};

#[derive(Serialize, Deserialize, Default)]
struct Snapshot {
    accounts: HashMap<AccountId, Account>,
    reports: HashMap<ReportId, Report>,
}

impl Snapshot {
    fn name_of(&self, id: AccountId) -> String {
        self.accounts
            .get(&id)
            .map(|account| account.full_name.clone())
            .unwrap_or_default()
    }
}

#[derive(Default)]
pub struct MemoryStore {
    path: Option<PathBuf>,
    data: RwLock<Snapshot>,
}

impl MemoryStore {
    /// Un magasin vide, jamais sauvegardé
    pub fn new() -> Self {
        Self::default()
    }

    /// Ouvre le fichier de sauvegarde, ou le crée s'il n'existe pas encore.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let snapshot = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(not_found) if not_found.kind() == NotFound => {
                info!("Snapshot {} not found, starting with an empty store", path.display());
                Snapshot::default()
            }
            Err(other) => return Err(other.into()),
        };

        let store = Self {
            path: Some(path),
            data: RwLock::new(snapshot),
        };
        // Fail now rather than on the first write
        store.save(&*store.data.read().await).await?;
        Ok(store)
    }

    /// Écrit dans un fichier voisin puis le renomme, pour ne jamais laisser
    /// de sauvegarde tronquée.
    async fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        if let Some(path) = &self.path {
            let bytes = serde_json::to_vec_pretty(snapshot)?;
            let mut partial = path.clone().into_os_string();
            partial.push(".tmp");
            let partial = PathBuf::from(partial);

            tokio::fs::write(&partial, bytes).await?;
            tokio::fs::rename(&partial, path).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_account(&self, account: Account) -> Result<(), StoreError> {
        let mut data = self.data.write().await;

        if !account.email.is_empty() && data.accounts.values().any(|a| a.email == account.email) {
            return Err(StoreError::DuplicateEmail);
        }

        let id = account.id;
        data.accounts.insert(id, account);
        if let Err(e) = self.save(&data).await {
            data.accounts.remove(&id);
            return Err(e);
        }
        Ok(())
    }

    async fn find_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        Ok(self.data.read().await.accounts.get(&id).cloned())
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        if email.is_empty() {
            return Ok(None);
        }
        let data = self.data.read().await;
        Ok(data.accounts.values().find(|a| a.email == email).cloned())
    }

    async fn list_accounts_created_by(
        &self,
        creator: AccountId,
        role: Role,
    ) -> Result<Vec<Account>, StoreError> {
        let data = self.data.read().await;
        let mut accounts: Vec<Account> = data
            .accounts
            .values()
            .filter(|a| a.role == role && a.created_by == Some(creator))
            .cloned()
            .collect();
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(accounts)
    }

    async fn insert_report(&self, report: Report) -> Result<(), StoreError> {
        let mut data = self.data.write().await;
        let id = report.id;
        let replaced = data.reports.insert(id, report);
        if let Err(e) = self.save(&data).await {
            match replaced {
                Some(previous) => data.reports.insert(id, previous),
                None => data.reports.remove(&id),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn find_report(&self, id: ReportId) -> Result<Option<Report>, StoreError> {
        Ok(self.data.read().await.reports.get(&id).cloned())
    }

    async fn delete_report(&self, id: ReportId) -> Result<bool, StoreError> {
        let mut data = self.data.write().await;
        let Some(removed) = data.reports.remove(&id) else {
            return Ok(false);
        };
        if let Err(e) = self.save(&data).await {
            data.reports.insert(id, removed);
            return Err(e);
        }
        Ok(true)
    }

    async fn list_reports(&self, filter: ReportFilter) -> Result<Vec<EnrichedReport>, StoreError> {
        let data = self.data.read().await;
        let mut reports: Vec<EnrichedReport> = data
            .reports
            .values()
            .filter(|report| filter.matches(report))
            .map(|report| EnrichedReport {
                patient_name: data.name_of(report.patient_id),
                doctor_name: data.name_of(report.doctor_id),
                report: report.clone(),
            })
            .collect();
        newest_first(&mut reports);
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn account(role: Role, name: &str, email: &str, created_by: Option<AccountId>) -> Account {
        Account {
            id: AccountId::new(),
            full_name: name.to_string(),
            email: email.to_string(),
            password_hash: None,
            role,
            created_by,
            created_at: Utc::now(),
            age: None,
            phone_number: None,
            notes: None,
        }
    }

    fn report(doctor: AccountId, patient: AccountId, age_minutes: i64) -> Report {
        Report {
            id: ReportId::new(),
            patient_id: patient,
            doctor_id: doctor,
            image_name: "xray.png".to_string(),
            annotated_image: None,
            fracture_type: "ulna fracture".to_string(),
            recovery_time: "42 days".to_string(),
            confidence: None,
            created_at: Utc::now() - Duration::minutes(age_minutes),
        }
    }

    #[tokio::test]
    async fn test_duplicate_emails_are_rejected() {
        let store = MemoryStore::new();
        store.insert_account(account(Role::Chef, "A", "a@example.com", None)).await.unwrap();

        let err = store
            .insert_account(account(Role::Chef, "B", "a@example.com", None))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));

        // Patients without email do not collide
        let doctor = AccountId::new();
        store.insert_account(account(Role::Patient, "P1", "", Some(doctor))).await.unwrap();
        store.insert_account(account(Role::Patient, "P2", "", Some(doctor))).await.unwrap();
        assert!(store.find_account_by_email("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_accounts_created_by() {
        let store = MemoryStore::new();
        let doctor = account(Role::Doctor, "Doc", "doc@example.com", None);
        let other = AccountId::new();
        store.insert_account(account(Role::Patient, "Mine", "", Some(doctor.id))).await.unwrap();
        store.insert_account(account(Role::Patient, "Theirs", "", Some(other))).await.unwrap();

        let mine = store.list_accounts_created_by(doctor.id, Role::Patient).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].full_name, "Mine");

        assert!(store
            .list_accounts_created_by(AccountId::new(), Role::Patient)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_reports_are_enriched_and_sorted() {
        let store = MemoryStore::new();
        let doctor = account(Role::Doctor, "Dr Grey", "grey@example.com", None);
        let patient = account(Role::Patient, "Jo Bloggs", "", Some(doctor.id));
        store.insert_account(doctor.clone()).await.unwrap();
        store.insert_account(patient.clone()).await.unwrap();

        let old = report(doctor.id, patient.id, 60);
        let new = report(doctor.id, patient.id, 1);
        let orphan = report(AccountId::new(), AccountId::new(), 30);
        for r in [old.clone(), new.clone(), orphan.clone()] {
            store.insert_report(r).await.unwrap();
        }

        let all = store.list_reports(ReportFilter::All).await.unwrap();
        let ids: Vec<ReportId> = all.iter().map(|r| r.report.id).collect();
        assert_eq!(ids, vec![new.id, orphan.id, old.id]);
        assert_eq!(all[0].patient_name, "Jo Bloggs");
        assert_eq!(all[0].doctor_name, "Dr Grey");
        assert_eq!(all[1].patient_name, "");

        let by_patient = store.list_reports(ReportFilter::Patient(patient.id)).await.unwrap();
        assert_eq!(by_patient.len(), 2);
        let by_doctor = store.list_reports(ReportFilter::Doctor(doctor.id)).await.unwrap();
        assert_eq!(by_doctor.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_report() {
        let store = MemoryStore::new();
        let r = report(AccountId::new(), AccountId::new(), 0);
        store.insert_report(r.clone()).await.unwrap();

        assert!(store.delete_report(r.id).await.unwrap());
        assert!(store.find_report(r.id).await.unwrap().is_none());
        assert!(!store.delete_report(r.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let chef = account(Role::Chef, "Chef", "chef@example.com", None);
        let r = report(AccountId::new(), AccountId::new(), 0);
        {
            let store = MemoryStore::open(&path).await.unwrap();
            store.insert_account(chef.clone()).await.unwrap();
            store.insert_report(r.clone()).await.unwrap();
        }

        let reopened = MemoryStore::open(&path).await.unwrap();
        let found = reopened.find_account_by_email("chef@example.com").await.unwrap().unwrap();
        assert_eq!(found.id, chef.id);
        assert_eq!(reopened.find_report(r.id).await.unwrap(), Some(r));
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, b"{ not json").unwrap();

        assert!(matches!(MemoryStore::open(&path).await, Err(StoreError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_failed_save_leaves_store_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        let store = MemoryStore::open(sub.join("store.json")).await.unwrap();

        let kept = report(AccountId::new(), AccountId::new(), 0);
        store.insert_report(kept.clone()).await.unwrap();
        std::fs::remove_dir_all(&sub).unwrap();

        let chef = account(Role::Chef, "Chef", "chef@example.com", None);
        let err = store.insert_account(chef.clone()).await.unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
        assert!(store.find_account_by_email("chef@example.com").await.unwrap().is_none());
        assert!(store.find_account(chef.id).await.unwrap().is_none());

        let lost = report(AccountId::new(), AccountId::new(), 0);
        assert!(store.insert_report(lost.clone()).await.is_err());
        assert!(store.find_report(lost.id).await.unwrap().is_none());

        assert!(store.delete_report(kept.id).await.is_err());
        assert_eq!(store.find_report(kept.id).await.unwrap(), Some(kept.clone()));

        // Once the directory is back the same write goes through
        std::fs::create_dir(&sub).unwrap();
        store.insert_account(chef).await.unwrap();
        assert!(store.delete_report(kept.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_save_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = MemoryStore::open(&path).await.unwrap();
        store.insert_report(report(AccountId::new(), AccountId::new(), 0)).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["store.json".to_string()]);
    }
}
