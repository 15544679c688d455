// src/resources/protocols.rs

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    client::ApiClient,
    error::ApiError,
    models::{ApiResponse, ListParams, Page},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Active,
    Paused,
    Completed,
    Discontinued,
}

/* ============================================================
   Protocol library
   ============================================================ */

#[derive(Debug, Clone, Deserialize)]
pub struct ApiProtocolExercise {
    pub exercise_id: Uuid,
    pub name: String,
    pub name_vi: Option<String>,
    pub sets: Option<u32>,
    pub reps: Option<u32>,
    pub frequency: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiProtocolPhase {
    pub phase_number: u32,
    pub name: String,
    pub name_vi: Option<String>,
    pub duration_weeks: u32,
    #[serde(default)]
    pub goals: Vec<String>,
    #[serde(default)]
    pub goals_vi: Vec<String>,
    #[serde(default)]
    pub exercises: Vec<ApiProtocolExercise>,
    #[serde(default)]
    pub precautions: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiProtocol {
    pub id: Uuid,
    pub name: String,
    pub name_vi: Option<String>,
    pub condition: String,
    pub description: Option<String>,
    #[serde(default)]
    pub phases: Vec<ApiProtocolPhase>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolExercise {
    pub exercise_id: Uuid,
    pub name: String,
    pub name_vi: Option<String>,
    pub sets: Option<u32>,
    pub reps: Option<u32>,
    pub frequency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolPhase {
    pub phase_number: u32,
    pub name: String,
    pub name_vi: Option<String>,
    pub duration_weeks: u32,
    pub goals: Vec<String>,
    pub goals_vi: Vec<String>,
    pub exercises: Vec<ProtocolExercise>,
    pub precautions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Protocol {
    pub id: Uuid,
    pub name: String,
    pub name_vi: Option<String>,
    pub condition: String,
    pub description: Option<String>,
    pub phases: Vec<ProtocolPhase>,
    pub total_weeks: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Protocol {
    pub fn phase(&self, number: u32) -> Option<&ProtocolPhase> {
        self.phases.iter().find(|p| p.phase_number == number)
    }
}

impl From<ApiProtocolExercise> for ProtocolExercise {
    fn from(api: ApiProtocolExercise) -> Self {
        ProtocolExercise {
            exercise_id: api.exercise_id,
            name: api.name,
            name_vi: api.name_vi,
            sets: api.sets,
            reps: api.reps,
            frequency: api.frequency,
        }
    }
}

impl From<ApiProtocolPhase> for ProtocolPhase {
    fn from(api: ApiProtocolPhase) -> Self {
        ProtocolPhase {
            phase_number: api.phase_number,
            name: api.name,
            name_vi: api.name_vi,
            duration_weeks: api.duration_weeks,
            goals: api.goals,
            goals_vi: api.goals_vi,
            exercises: api.exercises.into_iter().map(Into::into).collect(),
            precautions: api.precautions,
        }
    }
}

impl From<ApiProtocol> for Protocol {
    fn from(api: ApiProtocol) -> Self {
        let mut phases: Vec<ProtocolPhase> = api.phases.into_iter().map(Into::into).collect();
        phases.sort_by_key(|p| p.phase_number);
        let total_weeks = phases.iter().map(|p| p.duration_weeks).sum();

        Protocol {
            id: api.id,
            name: api.name,
            name_vi: api.name_vi,
            condition: api.condition,
            description: api.description,
            phases,
            total_weeks,
            is_active: api.is_active,
            created_at: api.created_at,
        }
    }
}

/* ============================================================
   Patient assignments
   ============================================================ */

#[derive(Debug, Clone, Deserialize)]
pub struct ApiPatientProtocol {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub protocol_id: Uuid,
    pub protocol_name: String,
    pub protocol_name_vi: Option<String>,
    pub current_phase: u32,
    pub total_phases: u32,
    pub status: AssignmentStatus,
    pub start_date: NaiveDate,
    pub expected_end_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub assigned_by: Option<Uuid>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientProtocol {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub protocol_id: Uuid,
    pub protocol_name: String,
    pub protocol_name_vi: Option<String>,
    pub current_phase: u32,
    pub total_phases: u32,
    pub progress_percent: u8,
    pub status: AssignmentStatus,
    pub start_date: NaiveDate,
    pub expected_end_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub assigned_by: Option<Uuid>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<ApiPatientProtocol> for PatientProtocol {
    fn from(api: ApiPatientProtocol) -> Self {
        // Phases before the current one are done; a completed assignment is 100
        let progress_percent = match (api.status, api.total_phases) {
            (AssignmentStatus::Completed, _) => 100,
            (_, 0) => 0,
            (_, total) => {
                let done = api.current_phase.saturating_sub(1).min(total);
                ((done * 100 + total / 2) / total) as u8
            }
        };

        PatientProtocol {
            id: api.id,
            patient_id: api.patient_id,
            protocol_id: api.protocol_id,
            protocol_name: api.protocol_name,
            protocol_name_vi: api.protocol_name_vi,
            current_phase: api.current_phase,
            total_phases: api.total_phases,
            progress_percent,
            status: api.status,
            start_date: api.start_date,
            expected_end_date: api.expected_end_date,
            notes: api.notes,
            assigned_by: api.assigned_by,
            updated_at: api.updated_at,
        }
    }
}

/// Expected end date from the start date and the protocol's phase lengths.
pub fn expected_end_date(protocol: &Protocol, start: NaiveDate) -> NaiveDate {
    start + Duration::weeks(i64::from(protocol.total_weeks))
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProtocolQuery {
    #[serde(flatten)]
    pub list: ListParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssignProtocolRequest {
    pub protocol_id: Uuid,
    pub start_date: NaiveDate,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateProgressRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_phase: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AssignmentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<Option<String>>,
}

/* ============================================================
   Endpoints
   ============================================================ */

pub async fn list_protocols(client: &ApiClient, query: &ProtocolQuery) -> Result<Page<Protocol>, ApiError> {
    let resp: ApiResponse<Vec<ApiProtocol>> = client.get("/v1/protocols", query).await?;
    Ok(Page::from_response(resp))
}

pub async fn get_protocol(client: &ApiClient, protocol_id: Uuid) -> Result<Protocol, ApiError> {
    let resp = client
        .get_plain::<ApiProtocol>(&format!("/v1/protocols/{protocol_id}"))
        .await?;
    Ok(resp.data.into())
}

pub async fn list_patient_protocols(client: &ApiClient, patient_id: Uuid) -> Result<Vec<PatientProtocol>, ApiError> {
    let resp = client
        .get_plain::<Vec<ApiPatientProtocol>>(&format!("/v1/patients/{patient_id}/protocols"))
        .await?;
    Ok(resp.data.into_iter().map(Into::into).collect())
}

pub async fn assign_protocol(
    client: &ApiClient,
    patient_id: Uuid,
    req: &AssignProtocolRequest,
) -> Result<PatientProtocol, ApiError> {
    let resp = client
        .post::<ApiPatientProtocol, _>(&format!("/v1/patients/{patient_id}/protocols"), req)
        .await?;
    Ok(resp.data.into())
}

pub async fn update_progress(
    client: &ApiClient,
    patient_id: Uuid,
    assignment_id: Uuid,
    req: &UpdateProgressRequest,
) -> Result<PatientProtocol, ApiError> {
    if req.current_phase == Some(0) {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR".into(),
            "phases are numbered from 1".into(),
        ));
    }
    let resp = client
        .patch::<ApiPatientProtocol, _>(
            &format!("/v1/patients/{patient_id}/protocols/{assignment_id}"),
            req,
        )
        .await?;
    Ok(resp.data.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_phases_are_ordered_and_weeks_summed() {
        let api: ApiProtocol = serde_json::from_value(json!({
            "id": "5e6f7081-92a3-4b4c-8d5e-6f708192a3b4",
            "name": "ACL reconstruction",
            "name_vi": "Tái tạo dây chằng chéo trước",
            "condition": "acl_reconstruction",
            "phases": [
                {"phase_number": 2, "name": "Strength", "duration_weeks": 6, "goals": ["Full ROM"]},
                {"phase_number": 1, "name": "Protection", "duration_weeks": 2,
                 "exercises": [{"exercise_id": "aaaaaaaa-bbbb-4ccc-8ddd-eeeeeeeeeeee", "name": "Quad sets", "sets": 3, "reps": 10}]}
            ],
            "created_at": "2026-01-01T00:00:00Z"
        }))
        .unwrap();
        let p = Protocol::from(api);
        assert_eq!(p.phases[0].phase_number, 1);
        assert_eq!(p.total_weeks, 8);
        assert_eq!(p.phase(2).unwrap().goals, vec!["Full ROM".to_string()]);
        assert_eq!(
            expected_end_date(&p, NaiveDate::from_ymd_opt(2026, 10, 1).unwrap()),
            NaiveDate::from_ymd_opt(2026, 11, 26).unwrap()
        );
    }

    #[test]
    fn test_assignment_progress() {
        let base = json!({
            "id": "6f708192-a3b4-4c5d-8e6f-708192a3b4c5",
            "patient_id": "0b7e6a52-8e35-4b8f-a1f6-0d9f3b1d2c4e",
            "protocol_id": "5e6f7081-92a3-4b4c-8d5e-6f708192a3b4",
            "protocol_name": "ACL reconstruction",
            "current_phase": 3,
            "total_phases": 4,
            "status": "active",
            "start_date": "2026-08-01"
        });
        let view = PatientProtocol::from(serde_json::from_value::<ApiPatientProtocol>(base.clone()).unwrap());
        assert_eq!(view.progress_percent, 50);

        let mut done = base;
        done["status"] = json!("completed");
        let view = PatientProtocol::from(serde_json::from_value::<ApiPatientProtocol>(done).unwrap());
        assert_eq!(view.progress_percent, 100);
    }
}
