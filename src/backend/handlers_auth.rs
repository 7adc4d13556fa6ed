//! Routes réservées aux utilisateurs authentifiés.
//! Les décisions d'accès sont prises par le service; ces handlers ne font
//! que lire la requête et mettre en forme la réponse.

use axum::{
    extract::{multipart::MultipartRejection, rejection::JsonRejection, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use log::info;

use crate::backend::{
    errors::ApiError,
    middlewares::AuthUser,
    models::{CreateDoctorRequest, CreateReportResponse, MessageResponse, RegisterResponse},
    state::AppState,
};
use crate::models::{AccountView, AnalysisResult, EnrichedReport, ReportDetail};
use crate::services::{NewPatient, PatientRef, ReportSubmission, Upload};
use crate::utils::error_messages::INVALID_BODY;

type ApiResult<T> = Result<T, ApiError>;

const INVALID_FORM: &str = "Invalid form data";

/// Les champs d'un formulaire multipart, image comprise
#[derive(Default)]
struct ReportForm {
    image: Option<Upload>,
    existing_patient_id: Option<String>,
    patient: NewPatient,
}

/// Lit tous les champs du formulaire; les champs inconnus sont ignorés.
async fn read_form(multipart: Result<Multipart, MultipartRejection>) -> ApiResult<ReportForm> {
    let mut multipart = multipart.map_err(|rejection| {
        info!("Rejected multipart request: {rejection}");
        ApiError::Validation(INVALID_FORM.to_string())
    })?;
    let invalid = |e: axum::extract::multipart::MultipartError| {
        info!("Unreadable multipart field: {e}");
        ApiError::Validation(INVALID_FORM.to_string())
    };

    let mut form = ReportForm::default();
    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" | "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content = field.bytes().await.map_err(invalid)?.to_vec();
                form.image = Some(Upload { filename, content });
            }
            "existingPatientId" => {
                form.existing_patient_id = Some(field.text().await.map_err(invalid)?)
            }
            "fullName" => form.patient.full_name = field.text().await.map_err(invalid)?,
            "email" => form.patient.email = Some(field.text().await.map_err(invalid)?),
            "password" => form.patient.password = Some(field.text().await.map_err(invalid)?),
            "age" => form.patient.age = Some(field.text().await.map_err(invalid)?),
            "phoneNumber" => form.patient.phone_number = Some(field.text().await.map_err(invalid)?),
            "notes" => form.patient.notes = Some(field.text().await.map_err(invalid)?),
            _ => {}
        }
    }
    Ok(form)
}

/// Un chef crée un compte médecin
pub async fn create_doctor(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    payload: Result<Json<CreateDoctorRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    let Json(request) = payload.map_err(|_| ApiError::Validation(INVALID_BODY.to_string()))?;
    let user = state
        .service
        .create_doctor(&claims, &request.full_name, &request.email, &request.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Doctor created successfully".to_string(),
            user,
        }),
    ))
}

/// Les patients du médecin connecté
pub async fn list_patients(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> ApiResult<Json<Vec<AccountView>>> {
    Ok(Json(state.service.list_my_patients(&claims).await?))
}

/// Relaie l'image au service d'analyse, avec son code de retour
pub async fn analyze(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<(StatusCode, Json<AnalysisResult>)> {
    let form = read_form(multipart).await?;
    let outcome = state.service.analyze(form.image).await?;
    Ok((outcome.status, Json(outcome.result)))
}

pub async fn list_reports(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> ApiResult<Json<Vec<EnrichedReport>>> {
    Ok(Json(state.service.list_my_reports(&claims).await?))
}

pub async fn list_all_reports(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> ApiResult<Json<Vec<EnrichedReport>>> {
    Ok(Json(state.service.list_all_reports(&claims).await?))
}

/// Crée un rapport, pour un patient existant ou nouveau
pub async fn create_report(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<(StatusCode, Json<CreateReportResponse>)> {
    let form = read_form(multipart).await?;

    let patient = match form.existing_patient_id.filter(|id| !id.trim().is_empty()) {
        Some(id) => PatientRef::Existing(id),
        None => PatientRef::New(form.patient),
    };

    let created = state
        .service
        .create_report(
            &claims,
            ReportSubmission {
                image: form.image,
                patient,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateReportResponse {
            analysis: created.analysis,
            report: created.report,
        }),
    ))
}

pub async fn get_report(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ReportDetail>> {
    Ok(Json(state.service.get_report(&claims, &id).await?))
}

pub async fn delete_report(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.service.delete_report(&claims, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Envoie au patient l'email de notification du rapport
pub async fn notify_patient(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    state.service.notify_patient(&claims, &id).await?;
    Ok(Json(MessageResponse {
        message: "Notification sent successfully".to_string(),
    }))
}
