use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{value_to_string, EditableField};
use crate::layout::BBox;

/// Font size used when the oracle did not report one.
pub const DEFAULT_FONT_SIZE: f32 = 11.0;

/// A caller-supplied replacement value.
///
/// Callers may send the bare value or echo back a field object; in the latter
/// case only its `value` member is used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChangeValue {
    Wrapped { value: Value },
    Plain(Value),
}

impl ChangeValue {
    /// The replacement text, if the change carries a scalar value.
    pub fn resolve(&self) -> Option<String> {
        match self {
            ChangeValue::Wrapped { value } | ChangeValue::Plain(value) => value_to_string(value),
        }
    }
}

impl From<&str> for ChangeValue {
    fn from(s: &str) -> Self {
        ChangeValue::Plain(Value::String(s.to_string()))
    }
}

/// Display name to requested value.
pub type Changes = BTreeMap<String, ChangeValue>;

/// One field the engine will redact and rewrite.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedReplacement {
    pub field: String,
    pub old: String,
    pub new: String,
    /// Oracle-reported box, used when the exact value cannot be re-located.
    pub bbox: Option<BBox>,
    pub page: u32,
    pub font: Option<String>,
    pub size: f32,
}

/// Ordered set of planned replacements, keyed by display name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ReplacementPlan {
    entries: Vec<PlannedReplacement>,
}

impl ReplacementPlan {
    /// Add an entry; an entry for the same field is replaced in place.
    pub fn insert(&mut self, entry: PlannedReplacement) {
        match self.entries.iter_mut().find(|e| e.field == entry.field) {
            Some(slot) => *slot = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn get(&self, field: &str) -> Option<&PlannedReplacement> {
        self.entries.iter().find(|e| e.field == field)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PlannedReplacement> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a ReplacementPlan {
    type Item = &'a PlannedReplacement;
    type IntoIter = std::slice::Iter<'a, PlannedReplacement>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Diff the caller's changes against the editable view.
///
/// A field is planned only when its current value is non-empty, a change
/// exists under the exact same display name, the change resolves to a value
/// different from the current one, and the field's page is known.
pub fn plan_replacements(fields: &[EditableField], changes: &Changes) -> ReplacementPlan {
    let mut plan = ReplacementPlan::default();

    for field in fields {
        let Some(old) = field.value.text() else {
            continue;
        };
        let Some(new) = changes.get(&field.name).and_then(ChangeValue::resolve) else {
            continue;
        };
        if new == old {
            continue;
        }
        let Some(page) = field.value.page else {
            log::warn!("field '{}' has no page, not planning it", field.name);
            continue;
        };

        log::debug!("planning '{}': {:?} -> {:?}", field.name, old, new);
        plan.insert(PlannedReplacement {
            field: field.name.clone(),
            old: old.to_string(),
            new,
            bbox: field.value.bbox,
            page,
            font: field.value.font.clone(),
            size: field.value.size.unwrap_or(DEFAULT_FONT_SIZE),
        });
    }

    plan
}

/// Outcome of one replacement pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplacementResult {
    pub changed_count: usize,
    /// Every editable field and its value before the change.
    pub fields_found: BTreeMap<String, String>,
    /// Only the fields actually rewritten, with their new value.
    pub fields_changed: BTreeMap<String, String>,
}

/// Collect the pre-change value of every editable field.
///
/// Repeated display names keep the last occurrence.
pub fn fields_found(fields: &[EditableField]) -> BTreeMap<String, String> {
    fields
        .iter()
        .filter_map(|f| f.value.text().map(|v| (f.name.clone(), v.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::types::FieldValue;
    use serde_json::json;

    fn field(name: &str, value: &str, page: Option<u32>) -> EditableField {
        EditableField::new(
            name,
            FieldValue {
                value: Some(value.to_string()),
                bbox: Some(BBox::new(50.0, 10.0, 90.0, 20.0)),
                font: Some("Helvetica".to_string()),
                size: Some(11.0),
                page,
            },
        )
    }

    fn changes(value: serde_json::Value) -> Changes {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_plans_changed_field() {
        let fields = vec![field("Invoice Number", "INV-001", Some(0))];
        let plan = plan_replacements(&fields, &changes(json!({"Invoice Number": "INV-002"})));

        assert_eq!(plan.len(), 1);
        let entry = plan.get("Invoice Number").unwrap();
        assert_eq!(entry.old, "INV-001");
        assert_eq!(entry.new, "INV-002");
        assert_eq!(entry.page, 0);
        assert_eq!(entry.bbox, Some(BBox::new(50.0, 10.0, 90.0, 20.0)));
        assert_eq!(entry.font.as_deref(), Some("Helvetica"));
        assert_eq!(entry.size, 11.0);
    }

    #[test]
    fn test_unchanged_value_is_not_planned() {
        let fields = vec![field("Total", "100", Some(0))];
        let plan = plan_replacements(&fields, &changes(json!({"Total": "100"})));
        assert!(plan.is_empty());
    }

    #[test]
    fn test_wrapped_value_is_unwrapped() {
        let fields = vec![field("Total", "100", Some(0))];
        let plan = plan_replacements(
            &fields,
            &changes(json!({"Total": {"value": "250", "bbox": [0, 0, 1, 1]}})),
        );
        assert_eq!(plan.get("Total").map(|e| e.new.as_str()), Some("250"));

        let same = plan_replacements(&fields, &changes(json!({"Total": {"value": "100"}})));
        assert!(same.is_empty());
    }

    #[test]
    fn test_numeric_change_is_stringified() {
        let fields = vec![field("Total", "100", Some(0))];
        let plan = plan_replacements(&fields, &changes(json!({"Total": 250})));
        assert_eq!(plan.get("Total").map(|e| e.new.as_str()), Some("250"));
    }

    #[test]
    fn test_null_or_list_change_is_ignored() {
        let fields = vec![field("Total", "100", Some(0)), field("IBAN", "DE00", Some(0))];
        let plan = plan_replacements(
            &fields,
            &changes(json!({"Total": null, "IBAN": [{"value": "x"}]})),
        );
        assert!(plan.is_empty());
    }

    #[test]
    fn test_unknown_page_is_not_planned() {
        let fields = vec![field("Total", "100", None)];
        let plan = plan_replacements(&fields, &changes(json!({"Total": "200"})));
        assert!(plan.is_empty());
    }

    #[test]
    fn test_empty_old_value_is_not_planned() {
        let fields = vec![field("Total", "", Some(0))];
        let plan = plan_replacements(&fields, &changes(json!({"Total": "200"})));
        assert!(plan.is_empty());
    }

    #[test]
    fn test_fields_not_named_are_untouched() {
        let fields = vec![
            field("Invoice Number", "INV-001", Some(0)),
            field("Total", "100", Some(0)),
        ];
        let plan = plan_replacements(&fields, &changes(json!({"Invoice Number": "INV-002"})));
        assert_eq!(plan.len(), 1);
        assert!(plan.get("Total").is_none());
    }

    #[test]
    fn test_repeated_name_keeps_last_occurrence() {
        let fields = vec![field("Amount", "40", Some(0)), field("Amount", "60", Some(1))];
        let plan = plan_replacements(&fields, &changes(json!({"Amount": "75"})));
        assert_eq!(plan.len(), 1);
        let entry = plan.get("Amount").unwrap();
        assert_eq!(entry.old, "60");
        assert_eq!(entry.page, 1);
    }

    #[test]
    fn test_missing_size_defaults() {
        let mut f = field("Total", "100", Some(0));
        f.value.size = None;
        let plan = plan_replacements(&[f], &changes(json!({"Total": "1"})));
        assert_eq!(plan.get("Total").unwrap().size, DEFAULT_FONT_SIZE);
    }

    #[test]
    fn test_fields_found() {
        let fields = vec![
            field("Invoice Number", "INV-001", Some(0)),
            field("Total", "100", Some(0)),
        ];
        let found = fields_found(&fields);
        assert_eq!(found.get("Invoice Number").map(String::as_str), Some("INV-001"));
        assert_eq!(found.get("Total").map(String::as_str), Some("100"));
    }

    #[test]
    fn test_change_value_from_str() {
        assert_eq!(ChangeValue::from("x").resolve(), Some("x".to_string()));
    }
}
