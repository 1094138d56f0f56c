use super::OracleError;
use crate::layout::TextSpan;

/// The fixed vocabulary of field names the oracle is asked to locate.
pub const FIELDS_TO_EXTRACT: [&str; 21] = [
    "Invoice Number",
    "Invoice Date",
    "Due Date",
    "Client Name",
    "Company Name",
    "Client Address",
    "Client Phone",
    "Client Email",
    "Invoice For",
    "Bank Name",
    "Account Name",
    "Account Number",
    "IBAN",
    "SWIFT",
    "Account From",
    "Amount",
    "Currency",
    "Total",
    "Subtotal",
    "Descriptions",
    "Description",
];

/// Build the system instructions sent ahead of the span list.
pub fn build_preamble() -> String {
    format!(
        "\
You are given an array of text blocks from a PDF invoice.
Each block contains 'text', its bounding box ('bbox'), font, size, and 'page' number.
For each of the following fields [{fields}], find ONLY the value (not including label, key, or prefix) \
and return the exact bbox, font, and size for that value (not the whole line, not including any label).
For fields like 'Descriptions' or 'Description' (service lines), if there are multiple, return a list \
of all with value/bbox/font/size/page.
Return valid JSON like: \
{{\"Description\": {{\"value\": \"...\", \"bbox\": [x0, y0, x1, y1], \"font\": \"...\", \"size\": 11.0, \"page\": page_num}}, ...}}, \
if not found set it to null. Do NOT add any explanation or non-JSON text.",
        fields = FIELDS_TO_EXTRACT.join(", ")
    )
}

/// Serialize the document's spans into the user prompt.
pub fn build_prompt(spans: &[TextSpan]) -> Result<String, OracleError> {
    Ok(format!("blocks:\n{}", serde_json::to_string(spans)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::BBox;

    #[test]
    fn test_preamble_lists_every_field() {
        let preamble = build_preamble();
        for field in FIELDS_TO_EXTRACT {
            assert!(preamble.contains(field), "missing {field}");
        }
        assert!(preamble.contains("\"bbox\": [x0, y0, x1, y1]"));
    }

    #[test]
    fn test_prompt_embeds_spans_in_order() {
        let spans = vec![
            TextSpan::new(
                0,
                "Invoice",
                BBox::new(10.0, 10.0, 50.0, 20.0),
                "Helvetica-Bold",
                14.0,
                16,
            ),
            TextSpan::new(0, "INV-001", BBox::new(50.0, 10.0, 90.0, 20.0), "Helvetica", 11.0, 0),
        ];
        let prompt = build_prompt(&spans).unwrap();
        assert!(prompt.starts_with("blocks:\n["));
        let first = prompt.find("\"Invoice\"").unwrap();
        let second = prompt.find("\"INV-001\"").unwrap();
        assert!(first < second);
        assert!(prompt.contains("\"font\":\"Helvetica\""));
    }

    #[test]
    fn test_prompt_empty_spans() {
        assert_eq!(build_prompt(&[]).unwrap(), "blocks:\n[]");
    }
}
