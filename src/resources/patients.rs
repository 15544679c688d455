// src/resources/patients.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    client::ApiClient,
    error::ApiError,
    models::{ApiResponse, ListParams, Locale, Page},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatientStatus {
    Active,
    Inactive,
    Discharged,
}

/* ============================================================
   API shape
   ============================================================ */

#[derive(Debug, Clone, Deserialize)]
pub struct ApiEmergencyContact {
    pub name: String,
    pub relationship: Option<String>,
    pub phone: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiPatient {
    pub id: Uuid,
    pub patient_code: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name_vi: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub national_id: Option<String>,
    pub insurance_number: Option<String>,
    pub emergency_contact: Option<ApiEmergencyContact>,
    #[serde(default)]
    pub medical_alerts: Vec<String>,
    pub status: PatientStatus,
    #[serde(default)]
    pub language_preference: Locale,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/* ============================================================
   View model
   ============================================================ */

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyContact {
    pub name: String,
    pub relationship: Option<String>,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: Uuid,
    pub patient_code: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub full_name_vi: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub national_id: Option<String>,
    pub insurance_number: Option<String>,
    pub emergency_contact: Option<EmergencyContact>,
    pub medical_alerts: Vec<String>,
    pub status: PatientStatus,
    pub language_preference: Locale,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Patient {
    /// Vietnamese name when the patient prefers it and one is on file.
    pub fn display_name(&self, locale: Locale) -> &str {
        match (locale, &self.full_name_vi) {
            (Locale::Vi, Some(vi)) => vi,
            _ => &self.full_name,
        }
    }
}

impl From<ApiPatient> for Patient {
    fn from(api: ApiPatient) -> Self {
        let full_name = format!("{} {}", api.first_name.trim(), api.last_name.trim())
            .trim()
            .to_string();
        let full_name_vi = api.full_name_vi.filter(|n| !n.trim().is_empty());

        Patient {
            id: api.id,
            patient_code: api.patient_code,
            first_name: api.first_name,
            last_name: api.last_name,
            full_name,
            full_name_vi,
            date_of_birth: api.date_of_birth,
            gender: api.gender,
            phone: api.phone,
            email: api.email,
            address: api.address,
            national_id: api.national_id,
            insurance_number: api.insurance_number,
            emergency_contact: api.emergency_contact.map(|c| EmergencyContact {
                name: c.name,
                relationship: c.relationship,
                phone: c.phone,
            }),
            medical_alerts: api.medical_alerts,
            status: api.status,
            language_preference: api.language_preference,
            created_at: api.created_at,
            updated_at: api.updated_at,
        }
    }
}

/* ============================================================
   Requests
   ============================================================ */

#[derive(Debug, Clone, Serialize)]
pub struct EmergencyContactInput {
    pub name: String,
    pub relationship: Option<String>,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatePatientRequest {
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name_vi: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub national_id: Option<String>,
    pub insurance_number: Option<String>,
    pub emergency_contact: Option<EmergencyContactInput>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub medical_alerts: Vec<String>,
    pub language_preference: Locale,
}

/// Partial update. Outer `None` leaves a field alone; `Some(None)` clears it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdatePatientRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name_vi: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insurance_number: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medical_alerts: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PatientStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_preference: Option<Locale>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PatientQuery {
    #[serde(flatten)]
    pub list: ListParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PatientStatus>,
}

fn validate_names(first: &str, last: &str) -> Result<(), ApiError> {
    if first.trim().is_empty() || last.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR".into(),
            "first_name and last_name are required".into(),
        ));
    }
    Ok(())
}

/* ============================================================
   Endpoints
   ============================================================ */

pub async fn list_patients(client: &ApiClient, query: &PatientQuery) -> Result<Page<Patient>, ApiError> {
    let resp: ApiResponse<Vec<ApiPatient>> = client.get("/v1/patients", query).await?;
    Ok(Page::from_response(resp))
}

pub async fn get_patient(client: &ApiClient, patient_id: Uuid) -> Result<Patient, ApiError> {
    let resp = client
        .get_plain::<ApiPatient>(&format!("/v1/patients/{patient_id}"))
        .await?;
    Ok(resp.data.into())
}

pub async fn create_patient(client: &ApiClient, req: &CreatePatientRequest) -> Result<Patient, ApiError> {
    validate_names(&req.first_name, &req.last_name)?;
    let resp = client.post::<ApiPatient, _>("/v1/patients", req).await?;
    Ok(resp.data.into())
}

pub async fn update_patient(
    client: &ApiClient,
    patient_id: Uuid,
    req: &UpdatePatientRequest,
) -> Result<Patient, ApiError> {
    if let (Some(first), Some(last)) = (&req.first_name, &req.last_name) {
        validate_names(first, last)?;
    }
    let resp = client
        .patch::<ApiPatient, _>(&format!("/v1/patients/{patient_id}"), req)
        .await?;
    Ok(resp.data.into())
}

pub async fn delete_patient(client: &ApiClient, patient_id: Uuid) -> Result<(), ApiError> {
    client.delete(&format!("/v1/patients/{patient_id}")).await
}
