//! A visit checklist being filled in.
//!
//! Edits show up immediately as drafts. Each item is saved on its own after
//! the auto-save delay; the save goes through an optimistic mutation on the
//! item's cache entry, so a failed write puts the last server value back.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::{QueryCache, QueryKey};
use crate::checklist_progress::{ChecklistProgress, Responses, compute_progress, missing_required};
use crate::client::ApiClient;
use crate::debounce::Debouncer;
use crate::error::ApiError;
use crate::mutation::{OptimisticMutation, TransitionError};
use crate::resources::checklists::{self, ChecklistTemplate, SoapNote, VisitChecklist};

// Responses are only refetched after a mutation invalidates them.
const RESPONSE_STALE_TIME: Duration = Duration::from_secs(300);

#[derive(Debug, thiserror::Error)]
pub enum ChecklistError {
    #[error("checklist has no item '{0}'")]
    UnknownItem(String),
    #[error("required items are unanswered: {}", .missing.join(", "))]
    Incomplete { missing: Vec<String> },
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

pub struct ChecklistSession {
    saver: ItemSaver,
    template: ChecklistTemplate,
    debouncers: Mutex<HashMap<String, Debouncer>>,
    autosave: Duration,
}

impl ChecklistSession {
    /// Loads the visit checklist and its template.
    pub async fn open(client: ApiClient, checklist_id: Uuid, autosave: Duration) -> Result<Self, ApiError> {
        let checklist = checklists::get_checklist(&client, checklist_id).await?;
        let template = checklists::get_template(&client, checklist.template_id).await?;
        Ok(Self::new(client, checklist, template, autosave).await)
    }

    pub async fn new(
        client: ApiClient,
        checklist: VisitChecklist,
        template: ChecklistTemplate,
        autosave: Duration,
    ) -> Self {
        let cache = Arc::new(QueryCache::new(RESPONSE_STALE_TIME));
        let base_key = QueryKey::new(["checklists".to_string(), checklist.id.to_string(), "responses".to_string()]);
        for (item_id, value) in checklist.responses {
            cache.set(base_key.child(item_id), value).await;
        }

        Self {
            saver: ItemSaver {
                client,
                checklist_id: checklist.id,
                cache,
                base_key,
                drafts: Arc::default(),
                in_flight: Arc::default(),
            },
            template,
            debouncers: Mutex::new(HashMap::new()),
            autosave,
        }
    }

    pub fn template(&self) -> &ChecklistTemplate {
        &self.template
    }

    /// Server-confirmed responses overlaid with unsaved drafts.
    pub async fn responses(&self) -> Responses {
        let mut out: Responses = self
            .saver
            .cache
            .entries_under(&self.saver.base_key)
            .await
            .into_iter()
            .filter_map(|(key, value)| key.segments().last().cloned().map(|id| (id, value)))
            .collect();
        let drafts = self.saver.drafts.lock().unwrap_or_else(|e| e.into_inner());
        for (item_id, value) in drafts.iter() {
            out.insert(item_id.clone(), value.clone());
        }
        out
    }

    pub async fn progress(&self) -> ChecklistProgress {
        compute_progress(&self.template, &self.responses().await)
    }

    /// True when the cached answer for `item_id` is due for a refetch.
    pub async fn is_item_stale(&self, item_id: &str) -> bool {
        self.saver.cache.is_stale(&self.saver.base_key.child(item_id)).await
    }

    /// Records an answer locally and schedules its save.
    pub fn set_response(&self, item_id: &str, value: Value) -> Result<(), ChecklistError> {
        if self.template.find_item(item_id).is_none() {
            return Err(ChecklistError::UnknownItem(item_id.to_string()));
        }

        self.saver
            .drafts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(item_id.to_string(), value.clone());

        let saver = self.saver.clone();
        let item_id = item_id.to_string();
        let mut debouncers = self.debouncers.lock().unwrap_or_else(|e| e.into_inner());
        debouncers
            .entry(item_id.clone())
            .or_insert_with(|| Debouncer::new(self.autosave))
            .call(async move {
                let _ = saver.save(item_id, value).await;
            });
        Ok(())
    }

    pub fn has_pending_saves(&self) -> bool {
        let debouncers = self.debouncers.lock().unwrap_or_else(|e| e.into_inner());
        debouncers.values().any(Debouncer::is_pending)
    }

    /// Saves every draft now instead of waiting for the auto-save delay.
    /// Saves already on the wire are awaited first.
    pub async fn flush(&self) -> Result<(), ChecklistError> {
        let debouncers: Vec<Debouncer> = {
            let mut debouncers = self.debouncers.lock().unwrap_or_else(|e| e.into_inner());
            debouncers.drain().map(|(_, d)| d).collect()
        };
        for debouncer in &debouncers {
            debouncer.settle().await;
        }

        let drafts: Vec<(String, Value)> = {
            let drafts = self.saver.drafts.lock().unwrap_or_else(|e| e.into_inner());
            drafts.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };
        for (item_id, value) in drafts {
            self.saver.clone().save(item_id, value).await?;
        }
        Ok(())
    }

    /// Saves outstanding answers, then completes the visit if every
    /// required item is answered.
    pub async fn complete(&self) -> Result<SoapNote, ChecklistError> {
        self.flush().await?;

        let responses = self.responses().await;
        let missing: Vec<String> = missing_required(&self.template, &responses)
            .into_iter()
            .map(|item| item.id.clone())
            .collect();
        if !missing.is_empty() {
            return Err(ChecklistError::Incomplete { missing });
        }

        let note = checklists::complete_checklist(&self.saver.client, self.saver.checklist_id).await?;
        info!(checklist_id = %self.saver.checklist_id, "checklist completed");
        Ok(note)
    }
}

/// Everything a background save needs, cheap to clone into a task.
#[derive(Clone)]
struct ItemSaver {
    client: ApiClient,
    checklist_id: Uuid,
    cache: Arc<QueryCache<Value>>,
    base_key: QueryKey,
    drafts: Arc<Mutex<HashMap<String, Value>>>,
    // One save per item at a time, so a rollback never lands on a newer value.
    in_flight: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl ItemSaver {
    fn item_lock(&self, item_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(item_id.to_string()).or_default().clone()
    }

    async fn save(self, item_id: String, value: Value) -> Result<(), ChecklistError> {
        let lock = self.item_lock(&item_id);
        let _guard = lock.lock().await;

        let checklist_id = self.checklist_id;
        let mut mutation = OptimisticMutation::new(self.cache.clone(), self.base_key.child(item_id.as_str()));
        let predicted = value.clone();
        let request = checklists::save_response(&self.client, checklist_id, &item_id, &value);
        let result = mutation.run(move |_| predicted, request).await;

        // Settled either way; a newer edit of the same item keeps its draft
        {
            let mut drafts = self.drafts.lock().unwrap_or_else(|e| e.into_inner());
            if drafts.get(&item_id) == Some(&value) {
                drafts.remove(&item_id);
            }
        }

        let result = result?;
        if let Err(e) = &result {
            warn!(%checklist_id, item_id = %item_id, code = e.code(), "checklist response not saved");
        }
        result.map(|_| ()).map_err(ChecklistError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::resources::checklists::{ChecklistItem, ChecklistItemType, ChecklistSection, ChecklistStatus};
    use chrono::Utc;
    use serde_json::json;

    fn template() -> ChecklistTemplate {
        let item = |id: &str, required: bool| ChecklistItem {
            id: id.into(),
            label: id.into(),
            label_vi: None,
            item_type: ChecklistItemType::Number,
            required,
            options: vec![],
            unit: None,
        };
        ChecklistTemplate {
            id: Uuid::nil(),
            name: "Daily".into(),
            name_vi: None,
            visit_type: "treatment".into(),
            sections: vec![ChecklistSection {
                id: "s".into(),
                title: "S".into(),
                title_vi: None,
                items: vec![item("pain", true), item("notes", false)],
            }],
        }
    }

    async fn session() -> ChecklistSession {
        let checklist = VisitChecklist {
            id: Uuid::new_v4(),
            template_id: Uuid::nil(),
            patient_id: Uuid::new_v4(),
            appointment_id: None,
            status: ChecklistStatus::InProgress,
            responses: [("notes".to_string(), json!("slept well"))].into_iter().collect(),
            completed_at: None,
            created_at: Utc::now(),
        };
        // Nothing listens here; these tests never reach the network
        let client = ApiClient::new(&Config::for_url("http://127.0.0.1:9")).unwrap();
        ChecklistSession::new(client, checklist, template(), Duration::from_secs(3600)).await
    }

    #[tokio::test]
    async fn test_drafts_overlay_server_responses() {
        let s = session().await;
        assert_eq!(s.responses().await.get("notes"), Some(&json!("slept well")));
        assert!(!s.progress().await.can_complete);

        s.set_response("pain", json!(3)).unwrap();
        assert!(s.has_pending_saves());
        let p = s.progress().await;
        assert!(p.can_complete);
        assert_eq!(p.percent, 100);
    }

    #[tokio::test]
    async fn test_unknown_item_is_rejected() {
        let s = session().await;
        assert!(matches!(
            s.set_response("nope", json!(1)),
            Err(ChecklistError::UnknownItem(ref id)) if id == "nope"
        ));
    }

    #[tokio::test]
    async fn test_complete_refuses_locally_when_required_missing() {
        let s = session().await;
        match s.complete().await {
            Err(ChecklistError::Incomplete { missing }) => assert_eq!(missing, vec!["pain".to_string()]),
            other => panic!("expected Incomplete, got {other:?}"),
        }
    }
}
