//! Opérations métier, et point d'entrée unique pour le contrôle d'accès.
//!
//! Chaque opération exposée par l'API correspond à une méthode de
//! [`Service`]. Les handlers HTTP ne font que traduire requêtes et réponses.

use std::sync::Arc;

use chrono::Utc;
use log::{error, info, warn};
use thiserror::Error;

use crate::analysis::{AnalysisError, AnalysisOutcome, Analyzer};
use crate::authorization::{AccessDenied, Context};
use crate::consts::NOTIFICATION_SUBJECT;
use crate::database::{ReportFilter, Store, StoreError};
use crate::email::{render_notification, MailError, Mailer};
use crate::models::{
    Account, AccountId, AccountView, AnalysisResult, EnrichedReport, Report, ReportDetail, ReportId,
    Role,
};
use crate::utils::error_messages::{INVALID_PATIENT_ID, INVALID_REPORT_ID};
use crate::utils::password_utils::{hash, verify, PWHash};
use crate::utils::token::{Claims, TokenError, TokenKeys};
use crate::utils::validation::{
    parse_age, EmailInput, FileInput, PasswordInput, PhoneInput, TextInput,
};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    AccessDenied(#[from] AccessDenied),

    #[error("{0}")]
    Validation(String),

    #[error("User already exists")]
    UserAlreadyExists,

    #[error("Invalid creator")]
    InvalidCreator,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Image file is required")]
    MissingImage,

    #[error("Report not found")]
    NoSuchReport,

    #[error("Patient not found")]
    NoSuchPatient,

    #[error("Patient has no email address")]
    MissingPatientEmail,

    #[error("Failed to create user: {0}")]
    RegistrationFailed(StoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("Failed to send email: {0}")]
    Mail(#[from] MailError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Background task failed: {0}")]
    Blocking(#[from] tokio::task::JoinError),
}

type ServiceResult<T> = Result<T, ServiceError>;

/// Transforme une erreur de validation en erreur 400 préfixée par le champ
fn invalid(field: &'static str) -> impl FnOnce(anyhow::Error) -> ServiceError {
    move |e| ServiceError::Validation(format!("{field}: {e:#}"))
}

/// Une image reçue d'un client, pas encore validée
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub content: Vec<u8>,
}

/// Les champs d'un nouveau patient saisis avec un rapport
#[derive(Debug, Clone, Default)]
pub struct NewPatient {
    pub full_name: String,
    pub email: Option<String>,
    pub password: Option<String>,
    pub age: Option<String>,
    pub phone_number: Option<String>,
    pub notes: Option<String>,
}

/// Le patient concerné par un rapport
#[derive(Debug, Clone)]
pub enum PatientRef {
    Existing(String),
    New(NewPatient),
}

/// Une demande de création de rapport
#[derive(Debug, Clone)]
pub struct ReportSubmission {
    pub image: Option<Upload>,
    pub patient: PatientRef,
}

/// Réponse à la création d'un rapport
#[derive(Debug, Clone, PartialEq)]
pub struct ReportCreated {
    pub analysis: AnalysisResult,
    pub report: Report,
}

/// Patient résolu avant l'appel au service d'analyse
enum ResolvedPatient {
    Existing(AccountId),
    New(Account),
}

pub struct Service {
    store: Arc<dyn Store>,
    analyzer: Arc<dyn Analyzer>,
    mailer: Arc<dyn Mailer>,
    tokens: TokenKeys,
}

impl Service {
    pub fn new(
        store: Arc<dyn Store>,
        analyzer: Arc<dyn Analyzer>,
        mailer: Arc<dyn Mailer>,
        tokens: TokenKeys,
    ) -> Self {
        Self {
            store,
            analyzer,
            mailer,
            tokens,
        }
    }

    /// Vérifie un jeton porteur.
    pub fn authenticate(&self, token: &str) -> ServiceResult<Claims> {
        Ok(self.tokens.validate(token)?)
    }

    /// Inscrit un compte. Un médecin doit être créé par un chef existant et un
    /// patient par un médecin existant.
    pub async fn register(
        &self,
        role: Role,
        full_name: &str,
        email: &str,
        password: &str,
        created_by: Option<&str>,
    ) -> ServiceResult<AccountView> {
        let full_name = TextInput::new_short_form(full_name).map_err(invalid("fullName"))?;
        let email = EmailInput::new(email).map_err(invalid("email"))?;
        let password = PasswordInput::new(password).map_err(invalid("password"))?;

        let created_by = match role.creator_role() {
            None => None,
            Some(creator_role) => {
                let raw = created_by
                    .map(str::trim)
                    .filter(|raw| !raw.is_empty())
                    .ok_or_else(|| {
                        ServiceError::Validation("createdBy: required for this role".to_string())
                    })?;
                let creator_id: AccountId = raw.parse().map_err(|_| {
                    ServiceError::Validation("createdBy: invalid identifier".to_string())
                })?;

                match self.store.find_account(creator_id).await? {
                    Some(creator) if creator.role == creator_role => Some(creator.id),
                    _ => {
                        warn!("Registration of a {role} with invalid creator {creator_id}");
                        return Err(ServiceError::InvalidCreator);
                    }
                }
            }
        };

        let account = self
            .new_account(role, full_name, email.into_inner(), Some(password), created_by)
            .await?;
        self.insert_account(account).await
    }

    /// Ouvre une session: renvoie un jeton valable 24h.
    ///
    /// Un email inconnu, un mauvais mot de passe ou un compte d'un autre rôle
    /// que `expected_role` donnent tous la même erreur.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        expected_role: Option<Role>,
    ) -> ServiceResult<String> {
        let account = match EmailInput::new(email) {
            Ok(email) => self.store.find_account_by_email(email.as_str()).await?,
            Err(_) => None,
        };

        let stored_hash = account.as_ref().and_then(|a| a.password_hash.clone());
        let password = password.to_string();
        let matches = tokio::task::spawn_blocking(move || verify(&password, stored_hash.as_ref()))
            .await
            .map_err(|e| ServiceError::Hashing(e.to_string()))?;

        let account = match account {
            Some(account) if matches && expected_role.map_or(true, |role| role == account.role) => {
                account
            }
            _ => {
                warn!("Failed login attempt");
                return Err(ServiceError::InvalidCredentials);
            }
        };

        info!("{} ({}) logged in", account.id, account.role);
        Ok(self.tokens.issue(account.id, account.role, &account.email)?)
    }

    /// Un chef crée un compte médecin.
    pub async fn create_doctor(
        &self,
        caller: &Claims,
        full_name: &str,
        email: &str,
        password: &str,
    ) -> ServiceResult<AccountView> {
        Context::new(caller).create_doctor()?;

        let full_name = TextInput::new_short_form(full_name).map_err(invalid("fullName"))?;
        let email = EmailInput::new(email).map_err(invalid("email"))?;
        let password = PasswordInput::new(password).map_err(invalid("password"))?;

        let doctor = self
            .new_account(
                Role::Doctor,
                full_name,
                email.into_inner(),
                Some(password),
                Some(caller.user_id),
            )
            .await?;
        self.insert_account(doctor).await
    }

    /// Les patients enregistrés par le médecin connecté
    pub async fn list_my_patients(&self, caller: &Claims) -> ServiceResult<Vec<AccountView>> {
        Context::new(caller).list_patients()?;

        let patients = self
            .store
            .list_accounts_created_by(caller.user_id, Role::Patient)
            .await?;
        Ok(patients.into_iter().map(AccountView::from).collect())
    }

    /// Transmet une image au service d'analyse et renvoie sa réponse telle quelle.
    pub async fn analyze(&self, image: Option<Upload>) -> ServiceResult<AnalysisOutcome> {
        let image = validate_image(image).await?;
        Ok(self.analyzer.analyze(&image).await?)
    }

    /// Analyse une radiographie et enregistre le rapport, en créant le patient
    /// au besoin.
    pub async fn create_report(
        &self,
        caller: &Claims,
        submission: ReportSubmission,
    ) -> ServiceResult<ReportCreated> {
        Context::new(caller).create_report()?;

        let image = validate_image(submission.image).await?;
        let patient = self.resolve_patient(caller, submission.patient).await?;

        let analysis = self.analyzer.analyze(&image).await?.into_success()?;

        let patient_id = match patient {
            ResolvedPatient::Existing(id) => id,
            ResolvedPatient::New(account) => {
                let id = account.id;
                self.store.insert_account(account).await.map_err(|e| match e {
                    StoreError::DuplicateEmail => ServiceError::UserAlreadyExists,
                    other => ServiceError::Store(other),
                })?;
                info!("Patient {id} created by {}", caller.user_id);
                id
            }
        };

        let report = Report {
            id: ReportId::new(),
            patient_id,
            doctor_id: caller.user_id,
            image_name: image.filename().to_string(),
            annotated_image: analysis.image_base64.clone(),
            fracture_type: analysis.fracture_type.clone().unwrap_or_default(),
            recovery_time: analysis.recovery_label(),
            confidence: analysis.confidence,
            created_at: Utc::now(),
        };
        self.store.insert_report(report.clone()).await?;

        info!("Report {} created by {} for {}", report.id, caller.user_id, patient_id);
        Ok(ReportCreated { analysis, report })
    }

    /// Les rapports du patient ou du médecin connecté; aucun pour un chef.
    pub async fn list_my_reports(&self, caller: &Claims) -> ServiceResult<Vec<EnrichedReport>> {
        let filter = match caller.role {
            Role::Patient => ReportFilter::Patient(caller.user_id),
            Role::Doctor => ReportFilter::Doctor(caller.user_id),
            Role::Chef => return Ok(Vec::new()),
        };
        Ok(self.store.list_reports(filter).await?)
    }

    pub async fn list_all_reports(&self, caller: &Claims) -> ServiceResult<Vec<EnrichedReport>> {
        Context::new(caller).list_all_reports()?;
        Ok(self.store.list_reports(ReportFilter::All).await?)
    }

    /// Un rapport avec les comptes complets du patient et du médecin.
    pub async fn get_report(
        &self,
        caller: &Claims,
        report_id: &str,
    ) -> ServiceResult<ReportDetail> {
        let report = self.fetch_report(report_id).await?;
        Context::new(caller).read_report(&report)?;

        let patient = self.store.find_account(report.patient_id).await?;
        let doctor = self.store.find_account(report.doctor_id).await?;

        Ok(ReportDetail {
            report,
            patient: patient.map(AccountView::from),
            doctor: doctor.map(AccountView::from),
        })
    }

    pub async fn delete_report(&self, caller: &Claims, report_id: &str) -> ServiceResult<()> {
        let report = self.fetch_report(report_id).await?;
        Context::new(caller).delete_report(&report)?;

        if !self.store.delete_report(report.id).await? {
            return Err(ServiceError::NoSuchReport);
        }
        info!("Report {} deleted by {}", report.id, caller.user_id);
        Ok(())
    }

    /// Envoie au patient un email résumant le rapport.
    pub async fn notify_patient(&self, caller: &Claims, report_id: &str) -> ServiceResult<()> {
        Context::new(caller).notify_patient()?;

        let report = self.fetch_report(report_id).await?;
        let patient = self
            .store
            .find_account(report.patient_id)
            .await?
            .ok_or(ServiceError::NoSuchPatient)?;

        if patient.email.is_empty() {
            return Err(ServiceError::MissingPatientEmail);
        }

        let html = render_notification(
            &patient.full_name,
            &report.fracture_type,
            &report.recovery_time,
        )?;
        self.mailer
            .send(&patient.email, NOTIFICATION_SUBJECT, &html)
            .await
            .map_err(|e| {
                error!("Notification for report {} failed: {e}", report.id);
                e
            })?;

        info!("Patient {} notified about report {}", patient.id, report.id);
        Ok(())
    }

    async fn fetch_report(&self, report_id: &str) -> ServiceResult<Report> {
        let id: ReportId = report_id
            .parse()
            .map_err(|_| ServiceError::Validation(INVALID_REPORT_ID.to_string()))?;
        self.store.find_report(id).await?.ok_or(ServiceError::NoSuchReport)
    }

    /// Vérifie la référence au patient sans rien écrire.
    async fn resolve_patient(
        &self,
        caller: &Claims,
        patient: PatientRef,
    ) -> ServiceResult<ResolvedPatient> {
        match patient {
            PatientRef::Existing(raw) => {
                let id: AccountId = raw
                    .parse()
                    .map_err(|_| ServiceError::Validation(INVALID_PATIENT_ID.to_string()))?;
                match self.store.find_account(id).await? {
                    Some(account) if account.role == Role::Patient => {
                        Ok(ResolvedPatient::Existing(id))
                    }
                    _ => Err(ServiceError::NoSuchPatient),
                }
            }
            PatientRef::New(fields) => {
                let full_name =
                    TextInput::new_short_form(&fields.full_name).map_err(invalid("fullName"))?;

                let email = match non_blank(fields.email) {
                    Some(raw) => {
                        let email = EmailInput::new(&raw).map_err(invalid("email"))?;
                        if self.store.find_account_by_email(email.as_str()).await?.is_some() {
                            return Err(ServiceError::UserAlreadyExists);
                        }
                        email.into_inner()
                    }
                    None => String::new(),
                };

                let password = non_blank(fields.password)
                    .map(|raw| PasswordInput::new(&raw).map_err(invalid("password")))
                    .transpose()?;

                let age = non_blank(fields.age)
                    .map(|raw| {
                        raw.trim()
                            .parse::<u32>()
                            .map_err(|_| {
                                ServiceError::Validation("age: must be a whole number".to_string())
                            })
                            .and_then(|age| parse_age(age).map_err(invalid("age")))
                    })
                    .transpose()?;

                let phone_number = non_blank(fields.phone_number)
                    .map(|raw| {
                        PhoneInput::new(&raw)
                            .map(PhoneInput::into_inner)
                            .map_err(invalid("phoneNumber"))
                    })
                    .transpose()?;

                let notes = non_blank(fields.notes)
                    .map(|raw| {
                        TextInput::new_long_form(&raw)
                            .map(TextInput::into_inner)
                            .map_err(invalid("notes"))
                    })
                    .transpose()?;

                let mut account = self
                    .new_account(Role::Patient, full_name, email, password, Some(caller.user_id))
                    .await?;
                account.age = age;
                account.phone_number = phone_number;
                account.notes = notes;
                Ok(ResolvedPatient::New(account))
            }
        }
    }

    async fn new_account(
        &self,
        role: Role,
        full_name: TextInput,
        email: String,
        password: Option<PasswordInput>,
        created_by: Option<AccountId>,
    ) -> ServiceResult<Account> {
        let password_hash = match password {
            Some(password) => Some(hash_blocking(password).await?),
            None => None,
        };

        Ok(Account {
            id: AccountId::new(),
            full_name: full_name.into_inner(),
            email,
            password_hash,
            role,
            created_by,
            created_at: Utc::now(),
            age: None,
            phone_number: None,
            notes: None,
        })
    }

    async fn insert_account(&self, account: Account) -> ServiceResult<AccountView> {
        let view = AccountView::from(&account);
        match self.store.insert_account(account).await {
            Ok(()) => {
                info!("Account {} created with role {}", view.id, view.role);
                Ok(view)
            }
            Err(StoreError::DuplicateEmail) => Err(ServiceError::UserAlreadyExists),
            Err(e) => {
                error!("Could not store account: {e}");
                Err(ServiceError::RegistrationFailed(e))
            }
        }
    }
}

/// Le décodage complet de l'image se fait hors de l'exécuteur async.
async fn validate_image(image: Option<Upload>) -> ServiceResult<FileInput> {
    let image = image.ok_or(ServiceError::MissingImage)?;
    tokio::task::spawn_blocking(move || FileInput::new(&image.content, &image.filename))
        .await?
        .map_err(invalid("image"))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// argon2 est coûteux: on le sort de l'exécuteur async.
async fn hash_blocking(password: PasswordInput) -> ServiceResult<PWHash> {
    tokio::task::spawn_blocking(move || hash(password.as_str()))
        .await
        .map_err(|e| ServiceError::Hashing(e.to_string()))?
        .map_err(|e| ServiceError::Hashing(e.to_string()))
}
