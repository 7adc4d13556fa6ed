//! Stockage MongoDB: collections `users` et `reports`.
//!
//! Les identifiants sont stockés en chaîne dans le champ `id`; le champ `_id`
//! attribué par MongoDB n'est jamais lu.

use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use log::info;
use mongodb::{
    bson::{doc, from_document, Document},
    error::{ErrorKind, WriteFailure},
    options::{ClientOptions, IndexOptions},
    Client, Collection, IndexModel,
};

use super::{newest_first, ReportFilter, Store, StoreError};
use crate::consts::{REPORTS_COLLECTION, USERS_COLLECTION};
use crate::models::{Account, AccountId, EnrichedReport, Report, ReportId, Role};

const DUPLICATE_KEY: i32 = 11000;

impl From<mongodb::error::Error> for StoreError {
    fn from(e: mongodb::error::Error) -> Self {
        match e.kind.as_ref() {
            ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY => {
                StoreError::DuplicateEmail
            }
            _ => StoreError::Backend(e.to_string()),
        }
    }
}

pub struct MongoStore {
    users: Collection<Account>,
    reports: Collection<Report>,
}

impl MongoStore {
    /// Se connecte et crée les index au besoin.
    pub async fn connect(uri: &str, database: &str, timeout: Duration) -> Result<Self, StoreError> {
        let mut options = ClientOptions::parse(uri).await?;
        options.connect_timeout = Some(timeout);
        options.server_selection_timeout = Some(timeout);

        let db = Client::with_options(options)?.database(database);
        let store = Self {
            users: db.collection(USERS_COLLECTION),
            reports: db.collection(REPORTS_COLLECTION),
        };

        // Patients created without email all carry "", so the unique index skips them
        let email_index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .partial_filter_expression(doc! { "email": { "$gt": "" } })
                    .build(),
            )
            .build();
        store.users.create_index(email_index).await?;

        for collection in [store.users.name(), store.reports.name()] {
            let id_index = IndexModel::builder()
                .keys(doc! { "id": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build();
            db.collection::<Document>(collection).create_index(id_index).await?;
        }

        info!("Connected to MongoDB database {database}");
        Ok(store)
    }
}

#[async_trait]
impl Store for MongoStore {
    async fn insert_account(&self, account: Account) -> Result<(), StoreError> {
        self.users.insert_one(account).await?;
        Ok(())
    }

    async fn find_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        Ok(self.users.find_one(doc! { "id": id.to_string() }).await?)
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        if email.is_empty() {
            return Ok(None);
        }
        Ok(self.users.find_one(doc! { "email": email }).await?)
    }

    async fn list_accounts_created_by(
        &self,
        creator: AccountId,
        role: Role,
    ) -> Result<Vec<Account>, StoreError> {
        let cursor = self
            .users
            .find(doc! { "createdBy": creator.to_string(), "role": role.as_ref() })
            .sort(doc! { "createdAt": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn insert_report(&self, report: Report) -> Result<(), StoreError> {
        self.reports.insert_one(report).await?;
        Ok(())
    }

    async fn find_report(&self, id: ReportId) -> Result<Option<Report>, StoreError> {
        Ok(self.reports.find_one(doc! { "id": id.to_string() }).await?)
    }

    async fn delete_report(&self, id: ReportId) -> Result<bool, StoreError> {
        let result = self.reports.delete_one(doc! { "id": id.to_string() }).await?;
        Ok(result.deleted_count > 0)
    }

    async fn list_reports(&self, filter: ReportFilter) -> Result<Vec<EnrichedReport>, StoreError> {
        let matching = match filter {
            ReportFilter::All => doc! {},
            ReportFilter::Patient(id) => doc! { "patientId": id.to_string() },
            ReportFilter::Doctor(id) => doc! { "doctorId": id.to_string() },
        };

        let pipeline = vec![
            doc! { "$match": matching },
            doc! { "$lookup": {
                "from": USERS_COLLECTION,
                "localField": "patientId",
                "foreignField": "id",
                "as": "patient",
            }},
            doc! { "$lookup": {
                "from": USERS_COLLECTION,
                "localField": "doctorId",
                "foreignField": "id",
                "as": "doctor",
            }},
            doc! { "$addFields": {
                "patientName": { "$ifNull": [{ "$arrayElemAt": ["$patient.fullName", 0] }, ""] },
                "doctorName": { "$ifNull": [{ "$arrayElemAt": ["$doctor.fullName", 0] }, ""] },
            }},
            doc! { "$project": { "_id": 0, "patient": 0, "doctor": 0 } },
        ];

        let documents: Vec<Document> = self.reports.aggregate(pipeline).await?.try_collect().await?;
        let mut reports = documents
            .into_iter()
            .map(from_document::<EnrichedReport>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        newest_first(&mut reports);
        Ok(reports)
    }
}
