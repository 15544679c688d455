// src/resources/assessments.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{client::ApiClient, error::ApiError, outcomes::MeasureType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
    Bilateral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurePhase {
    Baseline,
    Interim,
    Discharge,
    FollowUp,
}

/* ============================================================
   Range of motion
   ============================================================ */

#[derive(Debug, Clone, Deserialize)]
pub struct ApiRomAssessment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub joint: String,
    pub movement: String,
    pub side: Side,
    pub active_degrees: Option<f64>,
    pub passive_degrees: Option<f64>,
    pub normal_degrees: Option<f64>,
    #[serde(default)]
    pub pain_with_movement: bool,
    pub therapist_id: Option<Uuid>,
    pub notes: Option<String>,
    pub assessed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RomAssessment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub joint: String,
    pub movement: String,
    pub side: Side,
    pub active_degrees: Option<f64>,
    pub passive_degrees: Option<f64>,
    pub normal_degrees: Option<f64>,
    pub within_normal_limits: Option<bool>,
    pub pain_with_movement: bool,
    pub therapist_id: Option<Uuid>,
    pub notes: Option<String>,
    pub assessed_at: DateTime<Utc>,
}

impl From<ApiRomAssessment> for RomAssessment {
    fn from(api: ApiRomAssessment) -> Self {
        // Active range is what the patient achieves; passive only when active wasn't measured
        let measured = api.active_degrees.or(api.passive_degrees);
        let within_normal_limits = match (measured, api.normal_degrees) {
            (Some(m), Some(n)) => Some(m >= n),
            _ => None,
        };

        RomAssessment {
            id: api.id,
            patient_id: api.patient_id,
            joint: api.joint,
            movement: api.movement,
            side: api.side,
            active_degrees: api.active_degrees,
            passive_degrees: api.passive_degrees,
            normal_degrees: api.normal_degrees,
            within_normal_limits,
            pain_with_movement: api.pain_with_movement,
            therapist_id: api.therapist_id,
            notes: api.notes,
            assessed_at: api.assessed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateRomRequest {
    pub joint: String,
    pub movement: String,
    pub side: Side,
    pub active_degrees: Option<f64>,
    pub passive_degrees: Option<f64>,
    pub pain_with_movement: bool,
    pub notes: Option<String>,
}

/* ============================================================
   Manual muscle testing
   ============================================================ */

#[derive(Debug, Clone, Deserialize)]
pub struct ApiMmtAssessment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub muscle_group: String,
    pub side: Side,
    pub grade: u8,
    pub grade_modifier: Option<String>,
    pub therapist_id: Option<Uuid>,
    pub notes: Option<String>,
    pub assessed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MmtAssessment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub muscle_group: String,
    pub side: Side,
    pub grade: u8,
    pub grade_modifier: Option<String>,
    pub grade_label: String,
    pub therapist_id: Option<Uuid>,
    pub notes: Option<String>,
    pub assessed_at: DateTime<Utc>,
}

impl From<ApiMmtAssessment> for MmtAssessment {
    fn from(api: ApiMmtAssessment) -> Self {
        let grade = api.grade.min(5);
        let modifier = api
            .grade_modifier
            .filter(|m| m == "+" || m == "-");
        let grade_label = format!("{grade}{}", modifier.as_deref().unwrap_or(""));

        MmtAssessment {
            id: api.id,
            patient_id: api.patient_id,
            muscle_group: api.muscle_group,
            side: api.side,
            grade,
            grade_modifier: modifier,
            grade_label,
            therapist_id: api.therapist_id,
            notes: api.notes,
            assessed_at: api.assessed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateMmtRequest {
    pub muscle_group: String,
    pub side: Side,
    pub grade: u8,
    pub grade_modifier: Option<String>,
    pub notes: Option<String>,
}

/* ============================================================
   Outcome measures
   ============================================================ */

#[derive(Debug, Clone, Deserialize)]
pub struct ApiOutcomeMeasurement {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub measure_type: MeasureType,
    pub score: f64,
    pub phase: MeasurePhase,
    pub therapist_id: Option<Uuid>,
    pub notes: Option<String>,
    pub measured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeMeasurement {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub measure_type: MeasureType,
    pub score: f64,
    pub phase: MeasurePhase,
    pub therapist_id: Option<Uuid>,
    pub notes: Option<String>,
    pub measured_at: DateTime<Utc>,
}

impl From<ApiOutcomeMeasurement> for OutcomeMeasurement {
    fn from(api: ApiOutcomeMeasurement) -> Self {
        OutcomeMeasurement {
            id: api.id,
            patient_id: api.patient_id,
            measure_type: api.measure_type,
            score: api.score,
            phase: api.phase,
            therapist_id: api.therapist_id,
            notes: api.notes,
            measured_at: api.measured_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateOutcomeRequest {
    pub measure_type: MeasureType,
    pub score: f64,
    pub phase: MeasurePhase,
    pub notes: Option<String>,
}

/* ============================================================
   Re-evaluation comparison
   ============================================================ */

#[derive(Debug, Clone, Serialize)]
pub struct ReevaluationRequest {
    pub patient_id: Uuid,
    pub baseline_assessment_id: Option<Uuid>,
    pub current_assessment_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiReevaluationItem {
    pub metric: String,
    pub category: String,
    pub baseline_value: Option<f64>,
    pub current_value: Option<f64>,
    pub mcid: Option<f64>,
    #[serde(default = "default_true")]
    pub higher_is_better: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiReevaluation {
    pub patient_id: Uuid,
    #[serde(default)]
    pub comparisons: Vec<ApiReevaluationItem>,
    pub generated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReevaluationItem {
    pub metric: String,
    pub category: String,
    pub baseline_value: Option<f64>,
    pub current_value: Option<f64>,
    pub change: Option<f64>,
    pub improved: Option<bool>,
    pub mcid: Option<f64>,
    pub mcid_achieved: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reevaluation {
    pub patient_id: Uuid,
    pub comparisons: Vec<ReevaluationItem>,
    pub improved_count: usize,
    pub generated_at: DateTime<Utc>,
}

impl From<ApiReevaluationItem> for ReevaluationItem {
    fn from(api: ApiReevaluationItem) -> Self {
        let change = match (api.baseline_value, api.current_value) {
            (Some(b), Some(c)) => Some(c - b),
            _ => None,
        };
        let directional = change.map(|c| if api.higher_is_better { c } else { -c });
        let mcid_achieved = match (directional, api.mcid) {
            (Some(d), Some(m)) => d >= m,
            _ => false,
        };

        ReevaluationItem {
            metric: api.metric,
            category: api.category,
            baseline_value: api.baseline_value,
            current_value: api.current_value,
            change,
            improved: directional.map(|d| d > 0.0),
            mcid: api.mcid,
            mcid_achieved,
        }
    }
}

impl From<ApiReevaluation> for Reevaluation {
    fn from(api: ApiReevaluation) -> Self {
        let comparisons: Vec<ReevaluationItem> = api.comparisons.into_iter().map(Into::into).collect();
        let improved_count = comparisons.iter().filter(|c| c.improved == Some(true)).count();
        Reevaluation {
            patient_id: api.patient_id,
            comparisons,
            improved_count,
            generated_at: api.generated_at,
        }
    }
}

/* ============================================================
   Endpoints
   ============================================================ */

pub async fn list_rom(client: &ApiClient, patient_id: Uuid) -> Result<Vec<RomAssessment>, ApiError> {
    let resp = client
        .get_plain::<Vec<ApiRomAssessment>>(&format!("/v1/patients/{patient_id}/assessments/rom"))
        .await?;
    Ok(resp.data.into_iter().map(Into::into).collect())
}

pub async fn create_rom(client: &ApiClient, patient_id: Uuid, req: &CreateRomRequest) -> Result<RomAssessment, ApiError> {
    let resp = client
        .post::<ApiRomAssessment, _>(&format!("/v1/patients/{patient_id}/assessments/rom"), req)
        .await?;
    Ok(resp.data.into())
}

pub async fn list_mmt(client: &ApiClient, patient_id: Uuid) -> Result<Vec<MmtAssessment>, ApiError> {
    let resp = client
        .get_plain::<Vec<ApiMmtAssessment>>(&format!("/v1/patients/{patient_id}/assessments/mmt"))
        .await?;
    Ok(resp.data.into_iter().map(Into::into).collect())
}

pub async fn create_mmt(client: &ApiClient, patient_id: Uuid, req: &CreateMmtRequest) -> Result<MmtAssessment, ApiError> {
    if req.grade > 5 {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR".into(),
            "MMT grade must be between 0 and 5".into(),
        ));
    }
    let resp = client
        .post::<ApiMmtAssessment, _>(&format!("/v1/patients/{patient_id}/assessments/mmt"), req)
        .await?;
    Ok(resp.data.into())
}

#[derive(Serialize)]
struct OutcomeQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    measure_type: Option<MeasureType>,
}

pub async fn list_outcome_measures(
    client: &ApiClient,
    patient_id: Uuid,
    measure_type: Option<MeasureType>,
) -> Result<Vec<OutcomeMeasurement>, ApiError> {
    let resp = client
        .get::<Vec<ApiOutcomeMeasurement>, _>(
            &format!("/v1/patients/{patient_id}/outcome-measures"),
            &OutcomeQuery { measure_type },
        )
        .await?;
    Ok(resp.data.into_iter().map(Into::into).collect())
}

/// Scores outside the measure's range are refused before reaching the server.
pub async fn record_outcome_measure(
    client: &ApiClient,
    patient_id: Uuid,
    req: &CreateOutcomeRequest,
) -> Result<OutcomeMeasurement, ApiError> {
    crate::outcomes::definition(req.measure_type)
        .validate_score(req.score)
        .map_err(|e| ApiError::BadRequest("VALIDATION_ERROR".into(), e.to_string()))?;

    let resp = client
        .post::<ApiOutcomeMeasurement, _>(&format!("/v1/patients/{patient_id}/outcome-measures"), req)
        .await?;
    Ok(resp.data.into())
}

pub async fn compare_reevaluation(client: &ApiClient, req: &ReevaluationRequest) -> Result<Reevaluation, ApiError> {
    let resp = client
        .post::<ApiReevaluation, _>("/v1/assessments/reevaluation", req)
        .await?;
    Ok(resp.data.into())
}
