// src/resources/discharge.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    client::{ApiClient, DownloadedFile},
    error::ApiError,
    models::Locale,
    outcomes::{MeasureType, definition},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DischargeStatus {
    Planned,
    Ready,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DischargeReason {
    GoalsMet,
    Plateau,
    PatientRequest,
    Referral,
    Other,
}

/* ============================================================
   API shape
   ============================================================ */

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiHepItem {
    pub exercise_id: Option<Uuid>,
    pub name: String,
    pub name_vi: Option<String>,
    pub sets: Option<u32>,
    pub reps: Option<u32>,
    pub frequency: Option<String>,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiFollowUp {
    pub recommendation: String,
    pub recommendation_vi: Option<String>,
    pub timeframe: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiOutcomeSummary {
    pub measure_type: MeasureType,
    pub baseline_score: Option<f64>,
    pub discharge_score: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiDischargePlan {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub status: DischargeStatus,
    pub reason: Option<DischargeReason>,
    pub planned_date: Option<NaiveDate>,
    pub actual_date: Option<NaiveDate>,
    #[serde(default)]
    pub hep_items: Vec<ApiHepItem>,
    #[serde(default)]
    pub follow_up: Vec<ApiFollowUp>,
    #[serde(default)]
    pub outcome_summary: Vec<ApiOutcomeSummary>,
    pub notes: Option<String>,
    pub summary_generated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiDischargeSummary {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub discharge_plan_id: Uuid,
    pub summary: String,
    pub summary_vi: Option<String>,
    pub generated_at: DateTime<Utc>,
}

/* ============================================================
   View models
   ============================================================ */

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HepItem {
    pub exercise_id: Option<Uuid>,
    pub name: String,
    pub name_vi: Option<String>,
    pub sets: Option<u32>,
    pub reps: Option<u32>,
    pub frequency: Option<String>,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUp {
    pub recommendation: String,
    pub recommendation_vi: Option<String>,
    pub timeframe: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeSummary {
    pub measure_type: MeasureType,
    pub baseline_score: Option<f64>,
    pub discharge_score: Option<f64>,
    pub improvement: Option<f64>,
    pub mcid_achieved: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DischargePlan {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub status: DischargeStatus,
    pub reason: Option<DischargeReason>,
    pub planned_date: Option<NaiveDate>,
    pub actual_date: Option<NaiveDate>,
    pub hep_items: Vec<HepItem>,
    pub follow_up: Vec<FollowUp>,
    pub outcome_summary: Vec<OutcomeSummary>,
    pub notes: Option<String>,
    pub has_summary: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DischargeSummary {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub discharge_plan_id: Uuid,
    pub summary: String,
    pub summary_vi: Option<String>,
    pub generated_at: DateTime<Utc>,
}

impl DischargeSummary {
    pub fn text(&self, locale: Locale) -> &str {
        match (locale, &self.summary_vi) {
            (Locale::Vi, Some(vi)) => vi,
            _ => &self.summary,
        }
    }
}

/* ============================================================
   Transformers
   ============================================================ */

impl From<ApiHepItem> for HepItem {
    fn from(api: ApiHepItem) -> Self {
        HepItem {
            exercise_id: api.exercise_id,
            name: api.name,
            name_vi: api.name_vi,
            sets: api.sets,
            reps: api.reps,
            frequency: api.frequency,
            instructions: api.instructions,
        }
    }
}

impl From<ApiFollowUp> for FollowUp {
    fn from(api: ApiFollowUp) -> Self {
        FollowUp {
            recommendation: api.recommendation,
            recommendation_vi: api.recommendation_vi,
            timeframe: api.timeframe,
        }
    }
}

impl From<ApiOutcomeSummary> for OutcomeSummary {
    fn from(api: ApiOutcomeSummary) -> Self {
        let def = definition(api.measure_type);
        let improvement = match (api.baseline_score, api.discharge_score) {
            (Some(b), Some(d)) => Some(def.improvement(b, d)),
            _ => None,
        };
        OutcomeSummary {
            measure_type: api.measure_type,
            baseline_score: api.baseline_score,
            discharge_score: api.discharge_score,
            improvement,
            mcid_achieved: improvement.is_some_and(|i| i >= def.mcid),
        }
    }
}

impl From<ApiDischargePlan> for DischargePlan {
    fn from(api: ApiDischargePlan) -> Self {
        DischargePlan {
            id: api.id,
            patient_id: api.patient_id,
            status: api.status,
            reason: api.reason,
            planned_date: api.planned_date,
            actual_date: api.actual_date,
            hep_items: api.hep_items.into_iter().map(Into::into).collect(),
            follow_up: api.follow_up.into_iter().map(Into::into).collect(),
            outcome_summary: api.outcome_summary.into_iter().map(Into::into).collect(),
            notes: api.notes,
            has_summary: api.summary_generated_at.is_some(),
            created_at: api.created_at,
            updated_at: api.updated_at,
        }
    }
}

impl From<ApiDischargeSummary> for DischargeSummary {
    fn from(api: ApiDischargeSummary) -> Self {
        DischargeSummary {
            id: api.id,
            patient_id: api.patient_id,
            discharge_plan_id: api.discharge_plan_id,
            summary: api.summary,
            summary_vi: api.summary_vi,
            generated_at: api.generated_at,
        }
    }
}

/* ============================================================
   Requests
   ============================================================ */

#[derive(Debug, Clone, Serialize)]
pub struct SaveDischargePlanRequest {
    pub reason: Option<DischargeReason>,
    pub planned_date: Option<NaiveDate>,
    pub hep_items: Vec<ApiHepItem>,
    pub follow_up: Vec<ApiFollowUp>,
    pub notes: Option<String>,
}

#[derive(Serialize)]
struct PdfQuery {
    locale: Locale,
}

#[derive(Serialize)]
struct NoBody {}

/* ============================================================
   Endpoints
   ============================================================ */

/// `None` when no plan has been started for the patient.
pub async fn get_discharge_plan(client: &ApiClient, patient_id: Uuid) -> Result<Option<DischargePlan>, ApiError> {
    match client
        .get_plain::<ApiDischargePlan>(&format!("/v1/patients/{patient_id}/discharge"))
        .await
    {
        Ok(resp) => Ok(Some(resp.data.into())),
        Err(ApiError::NotFound(..)) => Ok(None),
        Err(e) => Err(e),
    }
}

pub async fn create_discharge_plan(
    client: &ApiClient,
    patient_id: Uuid,
    req: &SaveDischargePlanRequest,
) -> Result<DischargePlan, ApiError> {
    let resp = client
        .post::<ApiDischargePlan, _>(&format!("/v1/patients/{patient_id}/discharge"), req)
        .await?;
    Ok(resp.data.into())
}

pub async fn update_discharge_plan(
    client: &ApiClient,
    patient_id: Uuid,
    req: &SaveDischargePlanRequest,
) -> Result<DischargePlan, ApiError> {
    let resp = client
        .put::<ApiDischargePlan, _>(&format!("/v1/patients/{patient_id}/discharge"), req)
        .await?;
    Ok(resp.data.into())
}

pub async fn generate_summary(client: &ApiClient, patient_id: Uuid) -> Result<DischargeSummary, ApiError> {
    let resp = client
        .post::<ApiDischargeSummary, _>(&format!("/v1/patients/{patient_id}/discharge/summary"), &NoBody {})
        .await?;
    Ok(resp.data.into())
}

pub async fn download_summary_pdf(client: &ApiClient, patient_id: Uuid, locale: Locale) -> Result<DownloadedFile, ApiError> {
    client
        .download(
            &format!("/v1/patients/{patient_id}/discharge/summary/pdf"),
            &PdfQuery { locale },
            &format!("discharge-summary-{patient_id}.pdf"),
        )
        .await
}
