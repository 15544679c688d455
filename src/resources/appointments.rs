// src/resources/appointments.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
    cache::{QueryCache, QueryKey},
    client::ApiClient,
    error::ApiError,
    models::{ApiResponse, Page},
    mutation::{OptimisticMutation, TransitionError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    CheckedIn,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub fn is_final(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::NoShow)
    }

    pub fn can_transition_to(self, next: AppointmentStatus) -> bool {
        !self.is_final() && self != next
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentType {
    Evaluation,
    Treatment,
    Reevaluation,
    Discharge,
    Consultation,
}

/* ============================================================
   API shape / view model
   ============================================================ */

#[derive(Debug, Clone, Deserialize)]
pub struct ApiAppointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: Option<String>,
    pub therapist_id: Uuid,
    pub therapist_name: Option<String>,
    pub appointment_type: AppointmentType,
    pub status: AppointmentStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub room: Option<String>,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: Option<String>,
    pub therapist_id: Uuid,
    pub therapist_name: Option<String>,
    pub appointment_type: AppointmentType,
    pub status: AppointmentStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub room: Option<String>,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<ApiAppointment> for Appointment {
    fn from(api: ApiAppointment) -> Self {
        let duration_minutes = (api.end_time - api.start_time).num_minutes().max(0);
        Appointment {
            id: api.id,
            patient_id: api.patient_id,
            patient_name: api.patient_name,
            therapist_id: api.therapist_id,
            therapist_name: api.therapist_name,
            appointment_type: api.appointment_type,
            status: api.status,
            start_time: api.start_time,
            end_time: api.end_time,
            duration_minutes,
            room: api.room,
            notes: api.notes,
            cancellation_reason: api.cancellation_reason,
            created_at: api.created_at,
            updated_at: api.updated_at,
        }
    }
}

/* ============================================================
   Requests
   ============================================================ */

#[derive(Debug, Clone, Default, Serialize)]
pub struct AppointmentQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub therapist_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AppointmentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: Uuid,
    pub therapist_id: Uuid,
    pub appointment_type: AppointmentType,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub room: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateAppointmentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub therapist_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<Option<String>>,
}

#[derive(Serialize)]
struct CancelBody<'a> {
    reason: &'a str,
}

#[derive(Serialize)]
struct StatusBody {
    status: AppointmentStatus,
}

fn check_time_range(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), ApiError> {
    if end <= start {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR".into(),
            "end_time must be after start_time".into(),
        ));
    }
    Ok(())
}

/* ============================================================
   Endpoints
   ============================================================ */

pub async fn list_appointments(client: &ApiClient, query: &AppointmentQuery) -> Result<Page<Appointment>, ApiError> {
    let resp: ApiResponse<Vec<ApiAppointment>> = client.get("/v1/appointments", query).await?;
    Ok(Page::from_response(resp))
}

pub async fn get_appointment(client: &ApiClient, appointment_id: Uuid) -> Result<Appointment, ApiError> {
    let resp = client
        .get_plain::<ApiAppointment>(&format!("/v1/appointments/{appointment_id}"))
        .await?;
    Ok(resp.data.into())
}

pub async fn create_appointment(client: &ApiClient, req: &CreateAppointmentRequest) -> Result<Appointment, ApiError> {
    check_time_range(req.start_time, req.end_time)?;
    let resp = client.post::<ApiAppointment, _>("/v1/appointments", req).await?;
    Ok(resp.data.into())
}

pub async fn update_appointment(
    client: &ApiClient,
    appointment_id: Uuid,
    req: &UpdateAppointmentRequest,
) -> Result<Appointment, ApiError> {
    if let (Some(start), Some(end)) = (req.start_time, req.end_time) {
        check_time_range(start, end)?;
    }
    let resp = client
        .patch::<ApiAppointment, _>(&format!("/v1/appointments/{appointment_id}"), req)
        .await?;
    Ok(resp.data.into())
}

pub async fn cancel_appointment(client: &ApiClient, appointment_id: Uuid, reason: &str) -> Result<Appointment, ApiError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR".into(),
            "a cancellation reason is required".into(),
        ));
    }
    let resp = client
        .post::<ApiAppointment, _>(
            &format!("/v1/appointments/{appointment_id}/cancel"),
            &CancelBody { reason },
        )
        .await?;
    Ok(resp.data.into())
}

pub async fn set_status(
    client: &ApiClient,
    appointment_id: Uuid,
    status: AppointmentStatus,
) -> Result<Appointment, ApiError> {
    let resp = client
        .patch::<ApiAppointment, _>(
            &format!("/v1/appointments/{appointment_id}/status"),
            &StatusBody { status },
        )
        .await?;
    Ok(resp.data.into())
}

/* ============================================================
   Optimistic status change
   ============================================================ */

#[derive(Debug, thiserror::Error)]
pub enum StatusChangeError {
    #[error("appointment is {from:?} and cannot move to {to:?}")]
    NotAllowed {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

pub fn appointment_key(appointment_id: Uuid) -> QueryKey {
    QueryKey::new(["appointments".to_string(), appointment_id.to_string()])
}

/// Shows the new status in `cache` right away and puts the old one back if the
/// server refuses. The entry is invalidated either way so the next read refetches.
pub async fn update_status_optimistic(
    client: &ApiClient,
    cache: &QueryCache<Appointment>,
    appointment_id: Uuid,
    status: AppointmentStatus,
) -> Result<Appointment, StatusChangeError> {
    let key = appointment_key(appointment_id);
    let current = cache
        .fetch_with(&key, || get_appointment(client, appointment_id))
        .await?;
    if !current.status.can_transition_to(status) {
        return Err(StatusChangeError::NotAllowed {
            from: current.status,
            to: status,
        });
    }

    let mut mutation = OptimisticMutation::new(cache, key);
    let result = mutation
        .run(
            move |cached| {
                let mut next = cached.cloned().unwrap_or(current);
                next.status = status;
                next
            },
            set_status(client, appointment_id, status),
        )
        .await?;

    let updated = result?;
    info!(%appointment_id, status = ?updated.status, "appointment status changed");
    Ok(updated)
}
