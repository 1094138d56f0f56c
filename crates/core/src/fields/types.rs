use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::layout::BBox;

/// One semantic field occurrence reported by the oracle.
///
/// Oracles are loose about types, so every member is parsed leniently:
/// numeric values become strings, malformed boxes become `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    #[serde(default, deserialize_with = "lenient_string")]
    pub value: Option<String>,
    #[serde(default, deserialize_with = "lenient_bbox")]
    pub bbox: Option<BBox>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub font: Option<String>,
    #[serde(default, deserialize_with = "lenient_f32")]
    pub size: Option<f32>,
    #[serde(default, deserialize_with = "lenient_page")]
    pub page: Option<u32>,
}

impl FieldValue {
    /// A value-only occurrence with no geometry.
    pub fn bare(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Default::default()
        }
    }

    /// The value, if present and non-empty.
    pub fn text(&self) -> Option<&str> {
        self.value.as_deref().filter(|v| !v.is_empty())
    }
}

/// What the oracle returned for one field name.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldEntry {
    Single(FieldValue),
    List(Vec<FieldValue>),
    Missing,
}

impl FieldEntry {
    fn from_json(value: Value) -> FieldEntry {
        match value {
            Value::Null => FieldEntry::Missing,
            Value::Object(_) => match serde_json::from_value::<FieldValue>(value) {
                Ok(v) => FieldEntry::Single(v),
                Err(e) => {
                    log::debug!("discarding malformed field value: {e}");
                    FieldEntry::Missing
                }
            },
            Value::Array(items) => FieldEntry::List(
                items
                    .into_iter()
                    .filter(Value::is_object)
                    .filter_map(|item| serde_json::from_value::<FieldValue>(item).ok())
                    .collect(),
            ),
            other => match value_to_string(&other) {
                Some(text) => FieldEntry::Single(FieldValue::bare(text)),
                None => FieldEntry::Missing,
            },
        }
    }
}

impl Serialize for FieldEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldEntry::Single(v) => v.serialize(serializer),
            FieldEntry::List(items) => items.serialize(serializer),
            FieldEntry::Missing => serializer.serialize_none(),
        }
    }
}

/// Field name to oracle entry, in the order the oracle reported them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMap {
    entries: Vec<(String, FieldEntry)>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a field map from a parsed JSON object, keeping key order.
    pub fn from_json_object(object: Map<String, Value>) -> Self {
        let mut map = FieldMap::new();
        for (name, value) in object {
            map.insert(name, FieldEntry::from_json(value));
        }
        map
    }

    /// Insert or replace an entry. Replacing keeps the original position.
    pub fn insert(&mut self, name: impl Into<String>, entry: FieldEntry) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = entry,
            None => self.entries.push((name, entry)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldEntry> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, entry)| entry)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldEntry)> {
        self.entries.iter().map(|(n, e)| (n.as_str(), e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for FieldMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, entry) in &self.entries {
            map.serialize_entry(name, entry)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FieldMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let object = Map::<String, Value>::deserialize(deserializer)?;
        Ok(FieldMap::from_json_object(object))
    }
}

/// A field occurrence exposed for editing under its display name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditableField {
    pub name: String,
    pub value: FieldValue,
}

impl EditableField {
    pub fn new(name: impl Into<String>, value: FieldValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Render a scalar JSON value as the text it stands for.
///
/// Strings pass through, numbers and booleans use their JSON spelling, and
/// everything else (null, arrays, objects) has no text.
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(value_to_string(&Value::deserialize(deserializer)?))
}

fn lenient_f32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f32>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64().map(|f| f as f32),
        Value::String(s) => s.trim().parse::<f32>().ok(),
        _ => None,
    })
}

fn lenient_page<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .and_then(|p| u32::try_from(p).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    })
}

fn lenient_bbox<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<BBox>, D::Error> {
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(None);
    };
    let coords: Vec<f32> = items
        .iter()
        .filter_map(|v| v.as_f64().map(|f| f as f32))
        .collect();
    if items.len() != 4 || coords.len() != 4 {
        return Ok(None);
    }
    Ok(Some(BBox::new(coords[0], coords[1], coords[2], coords[3])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_value_full() {
        let v: FieldValue = serde_json::from_value(json!({
            "value": "INV-001",
            "bbox": [50, 10, 90, 20],
            "font": "Helvetica",
            "size": 11,
            "page": 0
        }))
        .unwrap();
        assert_eq!(v.value.as_deref(), Some("INV-001"));
        assert_eq!(v.bbox, Some(BBox::new(50.0, 10.0, 90.0, 20.0)));
        assert_eq!(v.font.as_deref(), Some("Helvetica"));
        assert_eq!(v.size, Some(11.0));
        assert_eq!(v.page, Some(0));
    }

    #[test]
    fn test_field_value_lenient_types() {
        let v: FieldValue = serde_json::from_value(json!({
            "value": 1250.5,
            "bbox": [1, 2, 3],
            "size": "9.5",
            "page": "2"
        }))
        .unwrap();
        assert_eq!(v.value.as_deref(), Some("1250.5"));
        assert_eq!(v.bbox, None);
        assert_eq!(v.font, None);
        assert_eq!(v.size, Some(9.5));
        assert_eq!(v.page, Some(2));
    }

    #[test]
    fn test_field_value_text_filters_empty() {
        assert_eq!(FieldValue::bare("").text(), None);
        assert_eq!(FieldValue::default().text(), None);
        assert_eq!(FieldValue::bare("x").text(), Some("x"));
    }

    #[test]
    fn test_field_map_keeps_oracle_order() {
        let map: FieldMap = serde_json::from_value(json!({
            "Total": {"value": "100"},
            "Invoice Number": {"value": "INV-1"},
            "Due Date": null
        }))
        .unwrap();
        let names: Vec<&str> = map.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Total", "Invoice Number", "Due Date"]);
        assert_eq!(map.get("Due Date"), Some(&FieldEntry::Missing));
    }

    #[test]
    fn test_field_map_list_drops_non_objects() {
        let map: FieldMap = serde_json::from_value(json!({
            "Descriptions": [{"value": "A"}, "junk", null, {"value": "B"}]
        }))
        .unwrap();
        match map.get("Descriptions") {
            Some(FieldEntry::List(items)) => {
                assert_eq!(items.len(), 2);
                assert_eq!(items[1].text(), Some("B"));
            }
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn test_field_map_bare_scalar() {
        let map: FieldMap = serde_json::from_value(json!({"Currency": "EUR"})).unwrap();
        assert_eq!(
            map.get("Currency"),
            Some(&FieldEntry::Single(FieldValue::bare("EUR")))
        );
    }

    #[test]
    fn test_field_map_serializes_as_object() {
        let mut map = FieldMap::new();
        map.insert("Total", FieldEntry::Single(FieldValue::bare("10")));
        map.insert("IBAN", FieldEntry::Missing);
        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json["Total"]["value"], "10");
        assert!(json["IBAN"].is_null());
    }

    #[test]
    fn test_field_map_insert_replaces_in_place() {
        let mut map = FieldMap::new();
        map.insert("A", FieldEntry::Missing);
        map.insert("B", FieldEntry::Missing);
        map.insert("A", FieldEntry::Single(FieldValue::bare("1")));
        let names: Vec<&str> = map.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_value_to_string() {
        assert_eq!(value_to_string(&json!("a")), Some("a".to_string()));
        assert_eq!(value_to_string(&json!(42)), Some("42".to_string()));
        assert_eq!(value_to_string(&json!(true)), Some("true".to_string()));
        assert_eq!(value_to_string(&json!(null)), None);
        assert_eq!(value_to_string(&json!(["a"])), None);
    }
}
