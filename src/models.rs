//! Modèle de données

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum_macros::{AsRefStr, EnumIter, EnumString};
use thiserror::Error;
use uuid::Uuid;

use crate::utils::password_utils::PWHash;

/// Role d'un compte: Chef (administrateur), Médecin ou Patient
#[derive(
    Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Chef,
    Doctor,
    Patient,
}

impl Role {
    /// Le rôle qui doit avoir créé un compte de ce rôle, s'il y en a un.
    pub fn creator_role(self) -> Option<Role> {
        match self {
            Role::Chef => None,
            Role::Doctor => Some(Role::Chef),
            Role::Patient => Some(Role::Doctor),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("invalid identifier")]
pub struct InvalidId;

/// Identifiant serialisé sous forme de chaîne, quel que soit le format cible.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord, Display)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl FromStr for $name {
            type Err = InvalidId;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self).map_err(|_| InvalidId)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse()
                    .map_err(|_| <D::Error as serde::de::Error>::custom("Invalid identifier"))
            }
        }
    };
}

string_id!(
    /// Un identifiant unique de compte
    AccountId
);

string_id!(
    /// Un identifiant unique de rapport
    ReportId
);

/// Un compte, quel que soit son rôle.
///
/// Les champs `age`, `phone_number` et `notes` ne sont renseignés que pour
/// les patients. Un patient créé par un médecin peut n'avoir ni email ni mot
/// de passe; il ne peut alors pas se connecter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: AccountId,
    pub full_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<PWHash>,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<AccountId>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Vue publique d'un compte, sans le haché du mot de passe
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: AccountId,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<AccountId>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl From<&Account> for AccountView {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            full_name: account.full_name.clone(),
            email: account.email.clone(),
            role: account.role,
            created_by: account.created_by,
            created_at: account.created_at,
            age: account.age,
            phone_number: account.phone_number.clone(),
            notes: account.notes.clone(),
        }
    }
}

impl From<Account> for AccountView {
    fn from(account: Account) -> Self {
        Self::from(&account)
    }
}

/// Un rapport d'analyse de radiographie
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: ReportId,
    pub patient_id: AccountId,
    pub doctor_id: AccountId,
    pub image_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotated_image: Option<String>,
    pub fracture_type: String,
    pub recovery_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Un rapport accompagné des noms du patient et du médecin
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedReport {
    #[serde(flatten)]
    pub report: Report,
    #[serde(default)]
    pub patient_name: String,
    #[serde(default)]
    pub doctor_name: String,
}

/// Un rapport accompagné des comptes complets du patient et du médecin
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportDetail {
    #[serde(flatten)]
    pub report: Report,
    pub patient: Option<AccountView>,
    pub doctor: Option<AccountView>,
}

/// Résultat renvoyé par le service d'analyse.
///
/// Les champs optionnels absents sont serialisés en `null` explicite.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisResult {
    pub detected: bool,
    #[serde(rename = "type", default)]
    pub fracture_type: Option<String>,
    #[serde(default)]
    pub recovery_time: Option<u32>,
    #[serde(default)]
    pub image_base64: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl AnalysisResult {
    /// Durée de rétablissement formatée, vide si le service n'en a pas donné
    pub fn recovery_label(&self) -> String {
        self.recovery_time
            .map(|days| format!("{days} days"))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use strum::IntoEnumIterator;

    #[test]
    fn test_role_round_trips_as_lowercase() {
        for role in Role::iter() {
            let json = serde_json::to_value(role).unwrap();
            assert_eq!(json, json!(role.to_string()));
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_creator_hierarchy() {
        assert_eq!(Role::Chef.creator_role(), None);
        assert_eq!(Role::Doctor.creator_role(), Some(Role::Chef));
        assert_eq!(Role::Patient.creator_role(), Some(Role::Doctor));
    }

    #[test]
    fn test_ids_parse_and_serialize_as_strings() {
        let id = AccountId::new();
        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json, json!(id.to_string()));
        assert_eq!(serde_json::from_value::<AccountId>(json).unwrap(), id);
        assert_eq!("not-a-uuid".parse::<ReportId>(), Err(InvalidId));
    }

    #[test]
    fn test_analysis_result_keeps_explicit_nulls() {
        let result: AnalysisResult = serde_json::from_value(json!({ "detected": false })).unwrap();
        assert_eq!(result.recovery_label(), "");

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            json!({
                "detected": false,
                "type": null,
                "recovery_time": null,
                "image_base64": null,
                "confidence": null
            })
        );
    }

    #[test]
    fn test_analysis_result_requires_detected_flag() {
        assert!(serde_json::from_value::<AnalysisResult>(json!({ "type": "wrist" })).is_err());
    }

    #[test]
    fn test_account_view_hides_password() {
        let account = Account {
            id: AccountId::new(),
            full_name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: crate::utils::password_utils::hash("secret-password").ok(),
            role: Role::Doctor,
            created_by: None,
            created_at: Utc::now(),
            age: None,
            phone_number: None,
            notes: None,
        };

        let value = serde_json::to_value(AccountView::from(&account)).unwrap();
        assert!(value.get("passwordHash").is_none());
        assert_eq!(value["fullName"], "Ada Lovelace");
        assert_eq!(value["role"], "doctor");
    }
}
