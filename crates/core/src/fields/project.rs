use super::types::{EditableField, FieldEntry, FieldMap, FieldValue};

/// Oracle field holding repeated line-item descriptions.
pub const DESCRIPTIONS: &str = "Descriptions";
/// Oracle field holding a single description (sometimes a list).
pub const DESCRIPTION: &str = "Description";
/// Oracle field naming what the invoice is for; also offered as a service.
pub const INVOICE_FOR: &str = "Invoice For";
/// Display-name prefix for service (line-item) entries.
pub const SERVICE: &str = "Service";

/// Fields that never appear under their own name in the editable view.
const FOLDED_FIELDS: [&str; 2] = [DESCRIPTION, DESCRIPTIONS];

#[derive(Clone, Copy)]
enum Shape {
    List,
    Scalar,
}

/// Service sources, first match wins.
const SERVICE_SOURCES: [(&str, Shape); 4] = [
    (DESCRIPTIONS, Shape::List),
    (DESCRIPTIONS, Shape::Scalar),
    (DESCRIPTION, Shape::Scalar),
    (DESCRIPTION, Shape::List),
];

/// Flatten an oracle field map into the ordered, display-ready field set.
///
/// Service entries come first: the first description source that yields a
/// value becomes `Service 1..N` (list form) or `Service` (scalar form), and a
/// scalar `Invoice For` is appended unless its value is already a service.
/// Every field other than the description sources follows in oracle order
/// when its value is non-empty, `Invoice For` included; list entries are
/// expanded under the same name.
pub fn project_editable_fields(fields: &FieldMap) -> Vec<EditableField> {
    let (mut services, mut numbered) = collect_services(fields);

    if let Some(FieldEntry::Single(invoice_for)) = fields.get(INVOICE_FOR) {
        if let Some(text) = invoice_for.text() {
            if !services.iter().any(|s| s.text() == Some(text)) {
                services.push(invoice_for.clone());
            }
        }
    }
    numbered |= services.len() > 1;

    let mut editable: Vec<EditableField> = services
        .into_iter()
        .enumerate()
        .map(|(idx, value)| {
            let name = if numbered {
                format!("{} {}", SERVICE, idx + 1)
            } else {
                SERVICE.to_string()
            };
            EditableField::new(name, value)
        })
        .collect();

    for (name, entry) in fields.iter() {
        if FOLDED_FIELDS.contains(&name) {
            continue;
        }
        match entry {
            FieldEntry::Single(value) if value.text().is_some() => {
                editable.push(EditableField::new(name, value.clone()));
            }
            FieldEntry::List(items) => {
                editable.extend(
                    items
                        .iter()
                        .filter(|v| v.text().is_some())
                        .map(|v| EditableField::new(name, v.clone())),
                );
            }
            _ => {}
        }
    }

    editable
}

/// Returns the service values and whether they came from a list source.
fn collect_services(fields: &FieldMap) -> (Vec<FieldValue>, bool) {
    for (name, shape) in SERVICE_SOURCES {
        match (fields.get(name), shape) {
            (Some(FieldEntry::List(items)), Shape::List) => {
                let values: Vec<FieldValue> =
                    items.iter().filter(|v| v.text().is_some()).cloned().collect();
                if !values.is_empty() {
                    return (values, true);
                }
            }
            (Some(FieldEntry::Single(value)), Shape::Scalar) if value.text().is_some() => {
                return (vec![value.clone()], false);
            }
            _ => {}
        }
    }
    (Vec::new(), false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: serde_json::Value) -> FieldMap {
        serde_json::from_value(value).unwrap()
    }

    fn names_and_values(fields: &[EditableField]) -> Vec<(String, String)> {
        fields
            .iter()
            .map(|f| (f.name.clone(), f.value.text().unwrap_or_default().to_string()))
            .collect()
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    #[test]
    fn test_descriptions_list_becomes_numbered_services() {
        let fields = map(json!({
            "Descriptions": [{"value": "A"}, {"value": "B"}]
        }));
        let editable = project_editable_fields(&fields);
        assert_eq!(
            names_and_values(&editable),
            pairs(&[("Service 1", "A"), ("Service 2", "B")])
        );
        assert!(editable
            .iter()
            .all(|f| f.name != DESCRIPTION && f.name != DESCRIPTIONS));
    }

    #[test]
    fn test_invoice_for_duplicate_is_suppressed() {
        let fields = map(json!({
            "Descriptions": [{"value": "A"}],
            "Invoice For": {"value": "A"}
        }));
        let editable = project_editable_fields(&fields);
        assert_eq!(
            names_and_values(&editable),
            pairs(&[("Service 1", "A"), ("Invoice For", "A")])
        );
    }

    #[test]
    fn test_invoice_for_stays_editable_under_its_name() {
        let fields = map(json!({
            "Descriptions": [{"value": "A"}],
            "Invoice For": {"value": "A", "page": 0},
            "Total": {"value": "10", "page": 0}
        }));
        let editable = project_editable_fields(&fields);
        let names: Vec<&str> = editable.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Service 1", "Invoice For", "Total"]);

        let mut changes = crate::fields::Changes::new();
        changes.insert("Invoice For".into(), "B".into());
        let plan = crate::fields::plan_replacements(&editable, &changes);
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn test_invoice_for_distinct_is_appended() {
        let fields = map(json!({
            "Descriptions": [{"value": "A"}],
            "Invoice For": {"value": "Consulting"}
        }));
        let editable = project_editable_fields(&fields);
        assert_eq!(
            names_and_values(&editable),
            pairs(&[
                ("Service 1", "A"),
                ("Service 2", "Consulting"),
                ("Invoice For", "Consulting")
            ])
        );
    }

    #[test]
    fn test_scalar_description_is_single_service() {
        let fields = map(json!({
            "Description": {"value": "Design work"},
            "Total": {"value": "500"}
        }));
        let editable = project_editable_fields(&fields);
        assert_eq!(
            names_and_values(&editable),
            pairs(&[("Service", "Design work"), ("Total", "500")])
        );
    }

    #[test]
    fn test_scalar_plus_invoice_for_numbers_both() {
        let fields = map(json!({
            "Description": {"value": "Design work"},
            "Invoice For": {"value": "Website"}
        }));
        let editable = project_editable_fields(&fields);
        assert_eq!(
            names_and_values(&editable),
            pairs(&[
                ("Service 1", "Design work"),
                ("Service 2", "Website"),
                ("Invoice For", "Website")
            ])
        );
    }

    #[test]
    fn test_descriptions_wins_over_description() {
        let fields = map(json!({
            "Description": {"value": "ignored"},
            "Descriptions": [{"value": "kept"}]
        }));
        let editable = project_editable_fields(&fields);
        assert_eq!(names_and_values(&editable), pairs(&[("Service 1", "kept")]));
    }

    #[test]
    fn test_description_list_is_last_resort() {
        let fields = map(json!({
            "Descriptions": null,
            "Description": [{"value": "X"}, {"value": ""}, {"value": "Y"}]
        }));
        let editable = project_editable_fields(&fields);
        assert_eq!(
            names_and_values(&editable),
            pairs(&[("Service 1", "X"), ("Service 2", "Y")])
        );
    }

    #[test]
    fn test_empty_descriptions_list_falls_through() {
        let fields = map(json!({
            "Descriptions": [],
            "Description": {"value": "Fallback"}
        }));
        let editable = project_editable_fields(&fields);
        assert_eq!(names_and_values(&editable), pairs(&[("Service", "Fallback")]));
    }

    #[test]
    fn test_invoice_for_alone() {
        let fields = map(json!({"Invoice For": {"value": "Hosting"}}));
        let editable = project_editable_fields(&fields);
        assert_eq!(
            names_and_values(&editable),
            pairs(&[("Service", "Hosting"), ("Invoice For", "Hosting")])
        );
    }

    #[test]
    fn test_other_fields_keep_order_and_skip_empty() {
        let fields = map(json!({
            "Total": {"value": "100"},
            "IBAN": null,
            "Client Name": {"value": ""},
            "Invoice Number": {"value": "INV-7"},
            "Amount": [{"value": "40"}, {"value": "60"}]
        }));
        let editable = project_editable_fields(&fields);
        assert_eq!(
            names_and_values(&editable),
            pairs(&[
                ("Total", "100"),
                ("Invoice Number", "INV-7"),
                ("Amount", "40"),
                ("Amount", "60")
            ])
        );
    }

    #[test]
    fn test_empty_map() {
        assert!(project_editable_fields(&FieldMap::new()).is_empty());
    }
}
