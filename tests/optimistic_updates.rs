mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post, put},
};
use serde_json::{Value, json};
use uuid::Uuid;

use common::{Authed, client, data, error, serve};
use physioflow::{
    ApiError,
    cache::QueryCache,
    checklist_session::{ChecklistError, ChecklistSession},
    resources::appointments::{
        Appointment, AppointmentStatus, ApiAppointment, StatusChangeError, appointment_key, update_status_optimistic,
    },
};

type Saves = Arc<Mutex<Vec<(String, Value)>>>;

/// Checklist stub state: accepted saves, plus every write in arrival order.
#[derive(Clone, Default)]
struct Stub {
    saves: Saves,
    log: Arc<Mutex<Vec<String>>>,
    put_delay: Duration,
}

impl Stub {
    fn slow(put_delay: Duration) -> Self {
        Stub {
            put_delay,
            ..Stub::default()
        }
    }

    fn saves(&self) -> Vec<(String, Value)> {
        self.saves.lock().unwrap().clone()
    }

    fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

const CHECKLIST_ID: &str = "9a0f1b7e-2d3c-4b5a-8e9f-0a1b2c3d4e5f";
const TEMPLATE_ID: &str = "5d2c7a10-3c2f-4d4e-8d1a-6b8f2e9c0a11";
const PATIENT_ID: &str = "0b7e6a52-8e35-4b8f-a1f6-0d9f3b1d2c4e";

fn checklist_app(stub: Stub) -> Router {
    Router::new()
        .route(
            "/v1/checklists/{id}",
            get(|_: Authed| async {
                data(json!({
                    "id": CHECKLIST_ID,
                    "template_id": TEMPLATE_ID,
                    "patient_id": PATIENT_ID,
                    "status": "in_progress",
                    "responses": [
                        {"item_id": "notes", "value": "slept well"},
                        {"item_id": "rom", "value": "full"}
                    ],
                    "created_at": "2026-10-18T08:00:00Z"
                }))
            }),
        )
        .route(
            "/v1/checklists/templates/{id}",
            get(|_: Authed| async {
                data(json!({
                    "id": TEMPLATE_ID,
                    "name": "Treatment visit",
                    "name_vi": "Buổi điều trị",
                    "visit_type": "treatment",
                    "sections": [{
                        "id": "main", "title": "Main", "sort_order": 1,
                        "items": [
                            {"id": "pain", "label": "Pain", "item_type": "pain_scale", "required": true, "sort_order": 1},
                            {"id": "rom", "label": "ROM", "item_type": "text", "required": true, "sort_order": 2},
                            {"id": "notes", "label": "Notes", "item_type": "text", "sort_order": 3}
                        ]
                    }]
                }))
            }),
        )
        .route(
            "/v1/checklists/{id}/responses/{item_id}",
            put(
                |State(stub): State<Stub>,
                 _: Authed,
                 Path((_id, item_id)): Path<(Uuid, String)>,
                 Json(body): Json<Value>| async move {
                    tokio::time::sleep(stub.put_delay).await;
                    if item_id == "rom" {
                        return error(StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", "rom is locked")
                            .into_response();
                    }
                    let value = body["value"].clone();
                    stub.log.lock().unwrap().push(format!("save {item_id}={value}"));
                    stub.saves.lock().unwrap().push((item_id.clone(), value.clone()));
                    data(json!({"item_id": item_id, "value": value})).into_response()
                },
            ),
        )
        .route(
            "/v1/checklists/{id}/complete",
            post(|State(stub): State<Stub>, _: Authed| async move {
                stub.log.lock().unwrap().push("complete".to_string());
                data(json!({
                    "id": "1f2e3d4c-5b6a-4789-8abc-def012345678",
                    "checklist_id": CHECKLIST_ID,
                    "patient_id": PATIENT_ID,
                    "subjective": "Pain 4/10",
                    "objective": "ROM full",
                    "assessment": "Improving",
                    "plan": "Continue HEP",
                    "generated_at": "2026-10-18T09:00:00Z"
                }))
            }),
        )
        .with_state(stub)
}

async fn wait_for_saves(session: &ChecklistSession) {
    for _ in 0..300 {
        if !session.has_pending_saves() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("auto-save never settled");
}

#[tokio::test]
async fn test_autosave_commits_and_rolls_back_per_item() {
    let stub = Stub::default();
    let base = serve(checklist_app(stub.clone())).await;
    let id: Uuid = CHECKLIST_ID.parse().unwrap();
    let session = ChecklistSession::open(client(&base), id, Duration::from_millis(20))
        .await
        .unwrap();

    session.set_response("pain", json!(4)).unwrap();
    session.set_response("rom", json!("limited")).unwrap();
    // Both edits are visible before anything is saved
    let responses = session.responses().await;
    assert_eq!(responses.get("rom"), Some(&json!("limited")));
    assert!(session.progress().await.can_complete);

    wait_for_saves(&session).await;

    let responses = session.responses().await;
    assert_eq!(responses.get("pain"), Some(&json!(4)));
    // The server refused the ROM edit, so the last confirmed value is back
    assert_eq!(responses.get("rom"), Some(&json!("full")));
    assert_eq!(stub.saves(), vec![("pain".to_string(), json!(4))]);
}

#[tokio::test]
async fn test_rapid_edits_are_saved_once() {
    let stub = Stub::default();
    let base = serve(checklist_app(stub.clone())).await;
    let id: Uuid = CHECKLIST_ID.parse().unwrap();
    let session = ChecklistSession::open(client(&base), id, Duration::from_millis(50))
        .await
        .unwrap();

    for level in [2, 5, 7] {
        session.set_response("pain", json!(level)).unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    wait_for_saves(&session).await;

    assert_eq!(stub.saves(), vec![("pain".to_string(), json!(7))]);
}

#[tokio::test]
async fn test_complete_flushes_drafts_first() {
    let stub = Stub::default();
    let base = serve(checklist_app(stub.clone())).await;
    let id: Uuid = CHECKLIST_ID.parse().unwrap();
    let session = ChecklistSession::open(client(&base), id, Duration::from_secs(3600))
        .await
        .unwrap();

    assert!(matches!(session.complete().await, Err(ChecklistError::Incomplete { .. })));

    session.set_response("pain", json!(3)).unwrap();
    let note = session.complete().await.unwrap();
    assert_eq!(note.assessment, "Improving");
    assert_eq!(stub.saves(), vec![("pain".to_string(), json!(3))]);
    assert!(!session.has_pending_saves());
}

#[tokio::test]
async fn test_complete_waits_for_save_already_on_the_wire() {
    let stub = Stub::slow(Duration::from_millis(300));
    let base = serve(checklist_app(stub.clone())).await;
    let id: Uuid = CHECKLIST_ID.parse().unwrap();
    let session = ChecklistSession::open(client(&base), id, Duration::from_millis(20))
        .await
        .unwrap();

    session.set_response("pain", json!(3)).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    // The save has left the debounce delay and is waiting on the server
    assert!(session.has_pending_saves());

    let note = session.complete().await.unwrap();
    assert_eq!(note.plan, "Continue HEP");

    assert_eq!(stub.log(), vec!["save pain=3".to_string(), "complete".to_string()]);
    assert_eq!(stub.saves(), vec![("pain".to_string(), json!(3))]);
    assert!(!session.has_pending_saves());
    assert_eq!(session.responses().await.get("pain"), Some(&json!(3)));
}

#[tokio::test]
async fn test_edit_during_save_ends_with_newer_value() {
    let stub = Stub::slow(Duration::from_millis(200));
    let base = serve(checklist_app(stub.clone())).await;
    let id: Uuid = CHECKLIST_ID.parse().unwrap();
    let session = ChecklistSession::open(client(&base), id, Duration::from_millis(20))
        .await
        .unwrap();

    session.set_response("pain", json!(3)).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    session.set_response("pain", json!(5)).unwrap();
    // The newer draft wins while the first request is still out
    assert_eq!(session.responses().await.get("pain"), Some(&json!(5)));

    wait_for_saves(&session).await;

    assert_eq!(
        stub.saves(),
        vec![("pain".to_string(), json!(3)), ("pain".to_string(), json!(5))]
    );
    assert_eq!(session.responses().await.get("pain"), Some(&json!(5)));
    assert!(session.is_item_stale("pain").await);
}

fn appointment_json(id: Uuid, status: &str) -> Value {
    json!({
        "id": id,
        "patient_id": PATIENT_ID,
        "therapist_id": "1a2b3c4d-5e6f-4a7b-8c9d-0e1f2a3b4c5d",
        "appointment_type": "treatment",
        "status": status,
        "start_time": "2026-10-20T09:00:00Z",
        "end_time": "2026-10-20T10:00:00Z",
        "created_at": "2026-10-01T08:00:00Z"
    })
}

fn appointment_app() -> Router {
    Router::new()
        .route(
            "/v1/appointments/{id}",
            get(|_: Authed, Path(id): Path<Uuid>| async move { data(appointment_json(id, "scheduled")) }),
        )
        .route(
            "/v1/appointments/{id}/status",
            patch(|_: Authed, Path(id): Path<Uuid>, Json(body): Json<Value>| async move {
                let status = body["status"].as_str().unwrap_or_default().to_string();
                if status == "checked_in" {
                    return error(StatusCode::CONFLICT, "TOO_EARLY", "check-in opens 30 minutes before").into_response();
                }
                data(appointment_json(id, &status)).into_response()
            }),
        )
}

#[tokio::test]
async fn test_appointment_status_rolls_back_on_conflict() {
    let base = serve(appointment_app()).await;
    let client = client(&base);
    let cache: QueryCache<Appointment> = QueryCache::new(Duration::from_secs(60));
    let id = Uuid::new_v4();

    let err = update_status_optimistic(&client, &cache, id, AppointmentStatus::CheckedIn)
        .await
        .unwrap_err();
    assert!(matches!(err, StatusChangeError::Api(ApiError::Conflict(ref code, _)) if code == "TOO_EARLY"));

    let key = appointment_key(id);
    assert_eq!(cache.get(&key).await.map(|a| a.status), Some(AppointmentStatus::Scheduled));
    assert!(cache.is_stale(&key).await);

    let updated = update_status_optimistic(&client, &cache, id, AppointmentStatus::Confirmed)
        .await
        .unwrap();
    assert_eq!(updated.status, AppointmentStatus::Confirmed);
    assert_eq!(cache.get(&key).await.map(|a| a.status), Some(AppointmentStatus::Confirmed));
}

#[tokio::test]
async fn test_final_appointment_refuses_status_change_locally() {
    // Nothing listens on port 9; a request would fail with a network error
    let client = client("http://127.0.0.1:9");
    let cache: QueryCache<Appointment> = QueryCache::new(Duration::from_secs(60));
    let id = Uuid::new_v4();
    let done: Appointment = serde_json::from_value::<ApiAppointment>(appointment_json(id, "completed"))
        .unwrap()
        .into();
    cache.set(appointment_key(id), done).await;

    let err = update_status_optimistic(&client, &cache, id, AppointmentStatus::Scheduled)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StatusChangeError::NotAllowed {
            from: AppointmentStatus::Completed,
            to: AppointmentStatus::Scheduled
        }
    ));
}
