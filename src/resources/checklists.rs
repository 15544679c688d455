// src/resources/checklists.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{client::ApiClient, error::ApiError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecklistItemType {
    Checkbox,
    Text,
    Number,
    Select,
    MultiSelect,
    PainScale,
    Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecklistStatus {
    Draft,
    InProgress,
    Completed,
}

/* ============================================================
   API shape
   ============================================================ */

#[derive(Debug, Clone, Deserialize)]
pub struct ApiChecklistItem {
    pub id: String,
    pub label: String,
    pub label_vi: Option<String>,
    pub item_type: ChecklistItemType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Vec<String>,
    pub unit: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiChecklistSection {
    pub id: String,
    pub title: String,
    pub title_vi: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub items: Vec<ApiChecklistItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiChecklistTemplate {
    pub id: Uuid,
    pub name: String,
    pub name_vi: Option<String>,
    pub visit_type: String,
    #[serde(default)]
    pub sections: Vec<ApiChecklistSection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiChecklistResponse {
    pub item_id: String,
    pub value: Value,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiVisitChecklist {
    pub id: Uuid,
    pub template_id: Uuid,
    pub patient_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub status: ChecklistStatus,
    #[serde(default)]
    pub responses: Vec<ApiChecklistResponse>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSoapNote {
    pub id: Uuid,
    pub checklist_id: Uuid,
    pub patient_id: Uuid,
    pub subjective: String,
    pub objective: String,
    pub assessment: String,
    pub plan: String,
    pub generated_at: DateTime<Utc>,
}

/* ============================================================
   View models
   ============================================================ */

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItem {
    pub id: String,
    pub label: String,
    pub label_vi: Option<String>,
    pub item_type: ChecklistItemType,
    pub required: bool,
    pub options: Vec<String>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistSection {
    pub id: String,
    pub title: String,
    pub title_vi: Option<String>,
    pub items: Vec<ChecklistItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistTemplate {
    pub id: Uuid,
    pub name: String,
    pub name_vi: Option<String>,
    pub visit_type: String,
    pub sections: Vec<ChecklistSection>,
}

impl ChecklistTemplate {
    pub fn items(&self) -> impl Iterator<Item = &ChecklistItem> {
        self.sections.iter().flat_map(|s| s.items.iter())
    }

    pub fn find_item(&self, item_id: &str) -> Option<&ChecklistItem> {
        self.items().find(|i| i.id == item_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitChecklist {
    pub id: Uuid,
    pub template_id: Uuid,
    pub patient_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub status: ChecklistStatus,
    pub responses: BTreeMap<String, Value>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SoapNote {
    pub id: Uuid,
    pub checklist_id: Uuid,
    pub patient_id: Uuid,
    pub subjective: String,
    pub objective: String,
    pub assessment: String,
    pub plan: String,
    pub generated_at: DateTime<Utc>,
}

/* ============================================================
   Transformers
   ============================================================ */

impl From<ApiChecklistItem> for ChecklistItem {
    fn from(api: ApiChecklistItem) -> Self {
        ChecklistItem {
            id: api.id,
            label: api.label,
            label_vi: api.label_vi,
            item_type: api.item_type,
            required: api.required,
            options: api.options,
            unit: api.unit,
        }
    }
}

impl From<ApiChecklistSection> for ChecklistSection {
    fn from(api: ApiChecklistSection) -> Self {
        let mut items = api.items;
        items.sort_by_key(|i| i.sort_order);
        ChecklistSection {
            id: api.id,
            title: api.title,
            title_vi: api.title_vi,
            items: items.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<ApiChecklistTemplate> for ChecklistTemplate {
    fn from(api: ApiChecklistTemplate) -> Self {
        let mut sections = api.sections;
        sections.sort_by_key(|s| s.sort_order);
        ChecklistTemplate {
            id: api.id,
            name: api.name,
            name_vi: api.name_vi,
            visit_type: api.visit_type,
            sections: sections.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<ApiVisitChecklist> for VisitChecklist {
    fn from(api: ApiVisitChecklist) -> Self {
        VisitChecklist {
            id: api.id,
            template_id: api.template_id,
            patient_id: api.patient_id,
            appointment_id: api.appointment_id,
            status: api.status,
            responses: api.responses.into_iter().map(|r| (r.item_id, r.value)).collect(),
            completed_at: api.completed_at,
            created_at: api.created_at,
        }
    }
}

impl From<ApiSoapNote> for SoapNote {
    fn from(api: ApiSoapNote) -> Self {
        SoapNote {
            id: api.id,
            checklist_id: api.checklist_id,
            patient_id: api.patient_id,
            subjective: api.subjective,
            objective: api.objective,
            assessment: api.assessment,
            plan: api.plan,
            generated_at: api.generated_at,
        }
    }
}

/* ============================================================
   Endpoints
   ============================================================ */

#[derive(Serialize)]
struct ResponseBody<'a> {
    value: &'a Value,
}

pub async fn get_template(client: &ApiClient, template_id: Uuid) -> Result<ChecklistTemplate, ApiError> {
    let resp = client
        .get_plain::<ApiChecklistTemplate>(&format!("/v1/checklists/templates/{template_id}"))
        .await?;
    Ok(resp.data.into())
}

pub async fn get_checklist(client: &ApiClient, checklist_id: Uuid) -> Result<VisitChecklist, ApiError> {
    let resp = client
        .get_plain::<ApiVisitChecklist>(&format!("/v1/checklists/{checklist_id}"))
        .await?;
    Ok(resp.data.into())
}

pub async fn save_response(
    client: &ApiClient,
    checklist_id: Uuid,
    item_id: &str,
    value: &Value,
) -> Result<ApiChecklistResponse, ApiError> {
    let resp = client
        .put::<ApiChecklistResponse, _>(
            &format!("/v1/checklists/{checklist_id}/responses/{item_id}"),
            &ResponseBody { value },
        )
        .await?;
    Ok(resp.data)
}

/// Marks the checklist complete; the server generates the SOAP note from the responses.
pub async fn complete_checklist(client: &ApiClient, checklist_id: Uuid) -> Result<SoapNote, ApiError> {
    let resp = client
        .post::<ApiSoapNote, _>(&format!("/v1/checklists/{checklist_id}/complete"), &serde_json::json!({}))
        .await?;
    Ok(resp.data.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_template_sections_and_items_are_ordered() {
        let api: ApiChecklistTemplate = serde_json::from_value(json!({
            "id": "5d2c7a10-3c2f-4d4e-8d1a-6b8f2e9c0a11",
            "name": "Initial evaluation",
            "name_vi": "Đánh giá ban đầu",
            "visit_type": "initial",
            "sections": [
                {"id": "objective", "title": "Objective", "sort_order": 2, "items": []},
                {"id": "subjective", "title": "Subjective", "title_vi": "Chủ quan", "sort_order": 1, "items": [
                    {"id": "aggravating", "label": "Aggravating factors", "item_type": "text", "sort_order": 2},
                    {"id": "pain", "label": "Pain now", "label_vi": "Mức đau", "item_type": "pain_scale", "required": true, "sort_order": 1}
                ]}
            ]
        }))
        .unwrap();

        let template = ChecklistTemplate::from(api);
        assert_eq!(template.sections[0].id, "subjective");
        assert_eq!(template.sections[0].items[0].id, "pain");
        assert!(template.find_item("pain").unwrap().required);
        assert!(!template.find_item("aggravating").unwrap().required);

        let out = serde_json::to_value(&template).unwrap();
        assert_eq!(out["nameVi"], "Đánh giá ban đầu");
        assert_eq!(out["sections"][0]["items"][0]["itemType"], "pain_scale");
    }

    #[test]
    fn test_visit_checklist_responses_become_a_map() {
        let api: ApiVisitChecklist = serde_json::from_value(json!({
            "id": "9a0f1b7e-2d3c-4b5a-8e9f-0a1b2c3d4e5f",
            "template_id": "5d2c7a10-3c2f-4d4e-8d1a-6b8f2e9c0a11",
            "patient_id": "0b7e6a52-8e35-4b8f-a1f6-0d9f3b1d2c4e",
            "status": "in_progress",
            "responses": [
                {"item_id": "pain", "value": 6},
                {"item_id": "notes", "value": null}
            ],
            "created_at": "2026-10-01T08:00:00Z"
        }))
        .unwrap();

        let view = VisitChecklist::from(api);
        assert_eq!(view.status, ChecklistStatus::InProgress);
        assert_eq!(view.responses.get("pain"), Some(&json!(6)));
        assert_eq!(view.responses.get("notes"), Some(&Value::Null));
    }
}
