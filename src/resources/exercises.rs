// src/resources/exercises.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    client::ApiClient,
    error::ApiError,
    models::{ApiResponse, ListParams, Page},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrescriptionStatus {
    Active,
    Paused,
    Completed,
    Discontinued,
}

/* ============================================================
   Exercise library
   ============================================================ */

#[derive(Debug, Clone, Deserialize)]
pub struct ApiExercise {
    pub id: Uuid,
    pub name: String,
    pub name_vi: Option<String>,
    pub description: Option<String>,
    pub description_vi: Option<String>,
    pub category: String,
    #[serde(default)]
    pub body_regions: Vec<String>,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub equipment: Vec<String>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub default_sets: Option<u32>,
    pub default_reps: Option<u32>,
    pub default_hold_seconds: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub id: Uuid,
    pub name: String,
    pub name_vi: Option<String>,
    pub description: Option<String>,
    pub description_vi: Option<String>,
    pub category: String,
    pub body_regions: Vec<String>,
    pub difficulty: Difficulty,
    pub equipment: Vec<String>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub default_sets: Option<u32>,
    pub default_reps: Option<u32>,
    pub default_hold_seconds: Option<u32>,
}

impl From<ApiExercise> for Exercise {
    fn from(api: ApiExercise) -> Self {
        Exercise {
            id: api.id,
            name: api.name,
            name_vi: api.name_vi,
            description: api.description,
            description_vi: api.description_vi,
            category: api.category,
            body_regions: api.body_regions,
            difficulty: api.difficulty,
            equipment: api.equipment,
            image_url: api.image_url,
            video_url: api.video_url,
            default_sets: api.default_sets,
            default_reps: api.default_reps,
            default_hold_seconds: api.default_hold_seconds,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExerciseQuery {
    #[serde(flatten)]
    pub list: ListParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
}

/* ============================================================
   Prescriptions
   ============================================================ */

#[derive(Debug, Clone, Deserialize)]
pub struct ApiPrescription {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub exercise_id: Uuid,
    pub exercise: Option<ApiExercise>,
    pub sets: u32,
    pub reps: u32,
    pub hold_seconds: Option<u32>,
    pub frequency_per_day: u32,
    pub days_per_week: u32,
    pub instructions: Option<String>,
    pub instructions_vi: Option<String>,
    pub status: PrescriptionStatus,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub prescribed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Prescription {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub exercise_id: Uuid,
    pub exercise: Option<Exercise>,
    pub sets: u32,
    pub reps: u32,
    pub hold_seconds: Option<u32>,
    pub frequency_per_day: u32,
    pub days_per_week: u32,
    pub sessions_per_week: u32,
    pub instructions: Option<String>,
    pub instructions_vi: Option<String>,
    pub status: PrescriptionStatus,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub prescribed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<ApiPrescription> for Prescription {
    fn from(api: ApiPrescription) -> Self {
        Prescription {
            id: api.id,
            patient_id: api.patient_id,
            exercise_id: api.exercise_id,
            exercise: api.exercise.map(Into::into),
            sets: api.sets,
            reps: api.reps,
            hold_seconds: api.hold_seconds,
            frequency_per_day: api.frequency_per_day,
            days_per_week: api.days_per_week,
            sessions_per_week: api.frequency_per_day * api.days_per_week,
            instructions: api.instructions,
            instructions_vi: api.instructions_vi,
            status: api.status,
            start_date: api.start_date,
            end_date: api.end_date,
            prescribed_by: api.prescribed_by,
            created_at: api.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatePrescriptionRequest {
    pub exercise_id: Uuid,
    pub sets: u32,
    pub reps: u32,
    pub hold_seconds: Option<u32>,
    pub frequency_per_day: u32,
    pub days_per_week: u32,
    pub instructions: Option<String>,
    pub instructions_vi: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

impl CreatePrescriptionRequest {
    fn validate(&self) -> Result<(), ApiError> {
        let bad = |msg: &str| Err(ApiError::BadRequest("VALIDATION_ERROR".into(), msg.to_string()));
        if self.sets == 0 || self.reps == 0 {
            return bad("sets and reps must be at least 1");
        }
        if !(1..=7).contains(&self.days_per_week) {
            return bad("days_per_week must be between 1 and 7");
        }
        if self.frequency_per_day == 0 {
            return bad("frequency_per_day must be at least 1");
        }
        if self.end_date.is_some_and(|end| end < self.start_date) {
            return bad("end_date must not be before start_date");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdatePrescriptionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sets: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hold_seconds: Option<Option<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_per_day: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_per_week: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PrescriptionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<Option<NaiveDate>>,
}

/* ============================================================
   Compliance log
   ============================================================ */

#[derive(Debug, Clone, Deserialize)]
pub struct ApiComplianceEntry {
    pub id: Uuid,
    pub prescription_id: Uuid,
    pub performed_on: NaiveDate,
    pub sets_completed: u32,
    pub reps_completed: u32,
    pub pain_level: Option<u8>,
    pub difficulty_rating: Option<u8>,
    pub notes: Option<String>,
    pub logged_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceEntry {
    pub id: Uuid,
    pub prescription_id: Uuid,
    pub performed_on: NaiveDate,
    pub sets_completed: u32,
    pub reps_completed: u32,
    pub pain_level: Option<u8>,
    pub difficulty_rating: Option<u8>,
    pub notes: Option<String>,
    pub logged_at: DateTime<Utc>,
}

impl From<ApiComplianceEntry> for ComplianceEntry {
    fn from(api: ApiComplianceEntry) -> Self {
        ComplianceEntry {
            id: api.id,
            prescription_id: api.prescription_id,
            performed_on: api.performed_on,
            sets_completed: api.sets_completed,
            reps_completed: api.reps_completed,
            pain_level: api.pain_level,
            difficulty_rating: api.difficulty_rating,
            notes: api.notes,
            logged_at: api.logged_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogComplianceRequest {
    pub performed_on: NaiveDate,
    pub sets_completed: u32,
    pub reps_completed: u32,
    pub pain_level: Option<u8>,
    pub difficulty_rating: Option<u8>,
    pub notes: Option<String>,
}

/// Share of prescribed sessions logged between `from` and `to` inclusive, 0..=100.
pub fn compliance_rate(prescription: &Prescription, log: &[ComplianceEntry], from: NaiveDate, to: NaiveDate) -> u8 {
    if to < from {
        return 0;
    }
    let days = (to - from).num_days() + 1;
    let expected = (days as f64 / 7.0 * prescription.sessions_per_week as f64).round() as u64;
    if expected == 0 {
        return 100;
    }
    let logged = log
        .iter()
        .filter(|e| e.prescription_id == prescription.id && e.performed_on >= from && e.performed_on <= to)
        .count() as u64;
    ((logged * 100 + expected / 2) / expected).min(100) as u8
}

/* ============================================================
   Endpoints
   ============================================================ */

pub async fn list_exercises(client: &ApiClient, query: &ExerciseQuery) -> Result<Page<Exercise>, ApiError> {
    let resp: ApiResponse<Vec<ApiExercise>> = client.get("/v1/exercises", query).await?;
    Ok(Page::from_response(resp))
}

pub async fn get_exercise(client: &ApiClient, exercise_id: Uuid) -> Result<Exercise, ApiError> {
    let resp = client
        .get_plain::<ApiExercise>(&format!("/v1/exercises/{exercise_id}"))
        .await?;
    Ok(resp.data.into())
}

pub async fn list_prescriptions(client: &ApiClient, patient_id: Uuid) -> Result<Vec<Prescription>, ApiError> {
    let resp = client
        .get_plain::<Vec<ApiPrescription>>(&format!("/v1/patients/{patient_id}/prescriptions"))
        .await?;
    Ok(resp.data.into_iter().map(Into::into).collect())
}

pub async fn create_prescription(
    client: &ApiClient,
    patient_id: Uuid,
    req: &CreatePrescriptionRequest,
) -> Result<Prescription, ApiError> {
    req.validate()?;
    let resp = client
        .post::<ApiPrescription, _>(&format!("/v1/patients/{patient_id}/prescriptions"), req)
        .await?;
    Ok(resp.data.into())
}

pub async fn update_prescription(
    client: &ApiClient,
    patient_id: Uuid,
    prescription_id: Uuid,
    req: &UpdatePrescriptionRequest,
) -> Result<Prescription, ApiError> {
    let resp = client
        .patch::<ApiPrescription, _>(
            &format!("/v1/patients/{patient_id}/prescriptions/{prescription_id}"),
            req,
        )
        .await?;
    Ok(resp.data.into())
}

pub async fn delete_prescription(client: &ApiClient, patient_id: Uuid, prescription_id: Uuid) -> Result<(), ApiError> {
    client
        .delete(&format!("/v1/patients/{patient_id}/prescriptions/{prescription_id}"))
        .await
}

pub async fn list_compliance(client: &ApiClient, prescription_id: Uuid) -> Result<Vec<ComplianceEntry>, ApiError> {
    let resp = client
        .get_plain::<Vec<ApiComplianceEntry>>(&format!("/v1/prescriptions/{prescription_id}/compliance"))
        .await?;
    Ok(resp.data.into_iter().map(Into::into).collect())
}

pub async fn log_compliance(
    client: &ApiClient,
    prescription_id: Uuid,
    req: &LogComplianceRequest,
) -> Result<ComplianceEntry, ApiError> {
    if req.pain_level.is_some_and(|p| p > 10) {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR".into(),
            "pain_level must be between 0 and 10".into(),
        ));
    }
    let resp = client
        .post::<ApiComplianceEntry, _>(&format!("/v1/prescriptions/{prescription_id}/compliance"), req)
        .await?;
    Ok(resp.data.into())
}
