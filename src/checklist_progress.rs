//! Completion tracking for visit checklists.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::resources::checklists::{ChecklistItem, ChecklistTemplate};

pub type Responses = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionProgress {
    pub section_id: String,
    pub answered: usize,
    pub total: usize,
    pub required_answered: usize,
    pub required_total: usize,
    pub percent: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistProgress {
    pub sections: Vec<SectionProgress>,
    pub answered: usize,
    pub total: usize,
    pub required_answered: usize,
    pub required_total: usize,
    pub percent: u8,
    pub can_complete: bool,
}

/// An item counts as answered once it has any value other than JSON null.
pub fn is_answered(responses: &Responses, item_id: &str) -> bool {
    responses.get(item_id).is_some_and(|v| !v.is_null())
}

// Required items drive the percentage; optional-only groups fall back to all items.
fn percent(answered: usize, total: usize, required_answered: usize, required_total: usize) -> u8 {
    let (done, of) = if required_total > 0 {
        (required_answered, required_total)
    } else {
        (answered, total)
    };
    if of == 0 {
        return 100;
    }
    ((done * 100 + of / 2) / of) as u8
}

pub fn compute_progress(template: &ChecklistTemplate, responses: &Responses) -> ChecklistProgress {
    let sections: Vec<SectionProgress> = template
        .sections
        .iter()
        .map(|section| {
            let mut p = SectionProgress {
                section_id: section.id.clone(),
                answered: 0,
                total: section.items.len(),
                required_answered: 0,
                required_total: 0,
                percent: 0,
            };
            for item in &section.items {
                let answered = is_answered(responses, &item.id);
                if answered {
                    p.answered += 1;
                }
                if item.required {
                    p.required_total += 1;
                    if answered {
                        p.required_answered += 1;
                    }
                }
            }
            p.percent = percent(p.answered, p.total, p.required_answered, p.required_total);
            p
        })
        .collect();

    let answered = sections.iter().map(|s| s.answered).sum();
    let total = sections.iter().map(|s| s.total).sum();
    let required_answered = sections.iter().map(|s| s.required_answered).sum();
    let required_total = sections.iter().map(|s| s.required_total).sum();

    ChecklistProgress {
        percent: percent(answered, total, required_answered, required_total),
        can_complete: required_answered == required_total,
        sections,
        answered,
        total,
        required_answered,
        required_total,
    }
}

pub fn missing_required<'a>(template: &'a ChecklistTemplate, responses: &Responses) -> Vec<&'a ChecklistItem> {
    template
        .items()
        .filter(|item| item.required && !is_answered(responses, &item.id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::checklists::{ChecklistItemType, ChecklistSection};
    use serde_json::json;
    use uuid::Uuid;

    fn item(id: &str, required: bool) -> ChecklistItem {
        ChecklistItem {
            id: id.to_string(),
            label: id.to_string(),
            label_vi: None,
            item_type: ChecklistItemType::Text,
            required,
            options: vec![],
            unit: None,
        }
    }

    fn template() -> ChecklistTemplate {
        ChecklistTemplate {
            id: Uuid::nil(),
            name: "Follow-up".into(),
            name_vi: Some("Tái khám".into()),
            visit_type: "follow_up".into(),
            sections: vec![
                ChecklistSection {
                    id: "subjective".into(),
                    title: "Subjective".into(),
                    title_vi: None,
                    items: vec![item("pain", true), item("sleep", false)],
                },
                ChecklistSection {
                    id: "objective".into(),
                    title: "Objective".into(),
                    title_vi: None,
                    items: vec![item("rom", true), item("mmt", true), item("gait", false)],
                },
            ],
        }
    }

    fn responses(pairs: &[(&str, Value)]) -> Responses {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_empty_responses() {
        let p = compute_progress(&template(), &Responses::new());
        assert_eq!(p.required_total, 3);
        assert_eq!(p.percent, 0);
        assert!(!p.can_complete);
        assert_eq!(missing_required(&template(), &Responses::new()).len(), 3);
    }

    #[test]
    fn test_partial_progress_per_section() {
        let r = responses(&[("pain", json!(4)), ("rom", json!("limited")), ("gait", json!("antalgic"))]);
        let p = compute_progress(&template(), &r);

        assert_eq!(p.sections[0].percent, 100);
        assert_eq!(p.sections[0].answered, 1);
        assert_eq!(p.sections[1].required_answered, 1);
        assert_eq!(p.sections[1].percent, 50);
        // 2 of 3 required -> 67
        assert_eq!(p.percent, 67);
        assert_eq!(p.answered, 3);
        assert!(!p.can_complete);

        let t = template();
        let missing: Vec<&str> = missing_required(&t, &r).iter().map(|i| i.id.as_str()).collect();
        assert_eq!(missing, vec!["mmt"]);
    }

    #[test]
    fn test_null_is_not_an_answer_but_false_and_empty_are() {
        let r = responses(&[("pain", json!(0)), ("rom", json!(false)), ("mmt", Value::Null)]);
        assert!(!compute_progress(&template(), &r).can_complete);

        let r = responses(&[("pain", json!(0)), ("rom", json!(false)), ("mmt", json!(""))]);
        assert!(compute_progress(&template(), &r).can_complete);
    }

    #[test]
    fn test_optional_items_never_change_the_gate() {
        let r = responses(&[("pain", json!(2)), ("rom", json!(1)), ("mmt", json!("4+"))]);
        let mut t = template();
        let before = compute_progress(&t, &r).can_complete;
        t.sections[1].items.push(item("balance", false));
        t.sections.push(ChecklistSection {
            id: "extra".into(),
            title: "Extra".into(),
            title_vi: None,
            items: vec![item("notes", false)],
        });
        let after = compute_progress(&t, &r);
        assert_eq!(before, after.can_complete);
        assert!(after.can_complete);
        // Optional-only section reports over all its items
        assert_eq!(after.sections[2].percent, 0);
    }

    #[test]
    fn test_template_without_required_items() {
        let t = ChecklistTemplate {
            sections: vec![ChecklistSection {
                id: "notes".into(),
                title: "Notes".into(),
                title_vi: None,
                items: vec![item("a", false), item("b", false)],
            }],
            ..template()
        };
        let p = compute_progress(&t, &Responses::new());
        assert!(p.can_complete);
        assert_eq!(p.percent, 0);

        let empty = ChecklistTemplate { sections: vec![], ..template() };
        let p = compute_progress(&empty, &Responses::new());
        assert!(p.can_complete);
        assert_eq!(p.percent, 100);
    }
}
