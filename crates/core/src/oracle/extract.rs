use serde_json::Value;

use super::OracleError;
use crate::fields::FieldMap;

/// Cut the JSON envelope out of a model response.
///
/// The envelope runs from the first `{` to the last `}`; anything around it
/// (markdown fences, commentary) is discarded.
pub fn extract_envelope(response: &str) -> Result<&str, OracleError> {
    let trimmed = response.trim();
    if trimmed.is_empty() {
        return Err(OracleError::EmptyResponse);
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(&trimmed[start..=end]),
        _ => Err(OracleError::Format(format!(
            "no JSON object in response: {}",
            preview(trimmed)
        ))),
    }
}

/// Parse a raw model response into a field map.
pub fn parse_field_map(response: &str) -> Result<FieldMap, OracleError> {
    let envelope = extract_envelope(response)?;
    match serde_json::from_str::<Value>(envelope) {
        Ok(Value::Object(object)) => {
            let fields = FieldMap::from_json_object(object);
            log::debug!(
                "oracle returned {} fields: {:?}",
                fields.len(),
                fields.iter().map(|(name, _)| name).collect::<Vec<_>>()
            );
            Ok(fields)
        }
        Ok(_) => Err(OracleError::Format("envelope is not an object".to_string())),
        Err(e) => Err(OracleError::Format(e.to_string())),
    }
}

fn preview(text: &str) -> String {
    text.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldEntry;

    #[test]
    fn test_clean_object_passes_through() {
        let response = r#"{"Total": {"value": "10"}}"#;
        assert_eq!(extract_envelope(response).unwrap(), response);
    }

    #[test]
    fn test_commentary_and_fences_are_discarded() {
        let response = "Sure! Here it is:\n```json\n{\"Total\": {\"value\": \"10\"}}\n```\nHope that helps.";
        assert_eq!(
            extract_envelope(response).unwrap(),
            "{\"Total\": {\"value\": \"10\"}}"
        );
    }

    #[test]
    fn test_empty_response() {
        assert!(matches!(extract_envelope(""), Err(OracleError::EmptyResponse)));
        assert!(matches!(
            parse_field_map("  \n\t "),
            Err(OracleError::EmptyResponse)
        ));
    }

    #[test]
    fn test_no_braces_is_format_error() {
        assert!(matches!(
            extract_envelope("I could not find any fields."),
            Err(OracleError::Format(_))
        ));
        assert!(matches!(extract_envelope("} backwards {"), Err(OracleError::Format(_))));
    }

    #[test]
    fn test_invalid_json_is_format_error() {
        assert!(matches!(
            parse_field_map("{\"Total\": {\"value\": }"),
            Err(OracleError::Format(_))
        ));
    }

    #[test]
    fn test_parse_scenario_response() {
        let response = r#"{"Invoice Number": {"value":"INV-001","bbox":[50,10,90,20],"font":"Helvetica","size":11,"page":0}}"#;
        let fields = parse_field_map(response).unwrap();
        match fields.get("Invoice Number") {
            Some(FieldEntry::Single(v)) => {
                assert_eq!(v.text(), Some("INV-001"));
                assert_eq!(v.page, Some(0));
            }
            other => panic!("expected single value, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_braces_use_outermost_pair() {
        let response = "prefix {\"A\": {\"value\": \"{x}\"}} suffix";
        let fields = parse_field_map(response).unwrap();
        assert_eq!(fields.len(), 1);
    }
}
