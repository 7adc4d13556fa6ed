//! Contrôle d'accès par rôle.
//!
//! Chaque action possède sa propre méthode sur [`Context`]; les décisions
//! reposent sur un `match` exhaustif du rôle de l'appelant, si bien qu'un
//! nouveau rôle oblige à revoir chaque règle.

use log::{info, warn};
use thiserror::Error;

use crate::models::{Report, Role};
use crate::utils::token::Claims;

type AccessResult = Result<(), AccessDenied>;

/// Une erreur sans détails en cas d'accès refusé
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Access denied")]
pub struct AccessDenied;

/// Le sujet d'une décision d'accès: l'identité portée par le jeton.
pub struct Context<'ctx> {
    subject: &'ctx Claims,
}

impl<'ctx> Context<'ctx> {
    pub fn new(subject: &'ctx Claims) -> Self {
        Self { subject }
    }

    fn decide(&self, action: &str, granted: bool) -> AccessResult {
        if granted {
            info!("Granted {action} to {} ({})", self.subject.user_id, self.subject.role);
            Ok(())
        } else {
            warn!("Denied {action} to {} ({})", self.subject.user_id, self.subject.role);
            Err(AccessDenied)
        }
    }

    pub fn create_doctor(&self) -> AccessResult {
        let granted = match self.subject.role {
            Role::Chef => true,
            Role::Doctor | Role::Patient => false,
        };
        self.decide("create-doctor", granted)
    }

    pub fn list_patients(&self) -> AccessResult {
        let granted = match self.subject.role {
            Role::Doctor => true,
            Role::Chef | Role::Patient => false,
        };
        self.decide("list-patients", granted)
    }

    pub fn create_report(&self) -> AccessResult {
        let granted = match self.subject.role {
            Role::Doctor => true,
            Role::Chef | Role::Patient => false,
        };
        self.decide("create-report", granted)
    }

    pub fn list_all_reports(&self) -> AccessResult {
        let granted = match self.subject.role {
            Role::Chef => true,
            Role::Doctor | Role::Patient => false,
        };
        self.decide("list-all-reports", granted)
    }

    /// Le médecin et le patient du rapport, ou un chef.
    pub fn read_report(&self, report: &Report) -> AccessResult {
        let granted = match self.subject.role {
            Role::Chef => true,
            Role::Doctor => report.doctor_id == self.subject.user_id,
            Role::Patient => report.patient_id == self.subject.user_id,
        };
        self.decide("read-report", granted)
    }

    /// Seul le médecin auteur du rapport.
    pub fn delete_report(&self, report: &Report) -> AccessResult {
        let granted = match self.subject.role {
            Role::Doctor => report.doctor_id == self.subject.user_id,
            Role::Chef | Role::Patient => false,
        };
        self.decide("delete-report", granted)
    }

    pub fn notify_patient(&self) -> AccessResult {
        let granted = match self.subject.role {
            Role::Doctor | Role::Chef => true,
            Role::Patient => false,
        };
        self.decide("notify-patient", granted)
    }
}
