//! Prompt and response-schema builders for the LLM extraction stages.

use serde_json::json;

/// Prompt for extracting the deceased's full name from raw OCR text.
pub fn build_name_prompt(raw_text: &str) -> String {
    format!(
        "Extract the full name of the deceased. \
         Look for: Name of the deceased (in full): [Name]. \
         Return a JSON array with one object containing exactly the key: 'person_name'. \
         Do not add explanations or extra text.\n\n\
         OCR TEXT:\n{raw_text}"
    )
}

/// Schema constraining the name extraction response.
pub fn name_schema() -> serde_json::Value {
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "person_name": {"type": "string"}
            },
            "required": ["person_name"]
        }
    })
}

/// Prompt for extracting date, location and cause of death. The year
/// range anchors the model against misreading faded digits.
pub fn build_fields_prompt(raw_text: &str, start_year: i32, end_year: i32) -> String {
    format!(
        "Extract the following details from the OCR record (if available):\n\
         1. event_date, write the death date in Month Day, Year -- it should be between {start_year} and {end_year}\n\
         2. event_location, write a specific location or address of death\n\
         3. cause_of_death, write a specific and succinct cause of death\n\n\
         Return a JSON array with one object containing exactly these keys:\n\
         - event_date\n\
         - event_location\n\
         - cause_of_death\n\n\
         Do not include any extra text. Be succinct and concise.\n\n\
         OCR Record:\n{raw_text}"
    )
}

/// Schema constraining the field extraction response.
pub fn fields_schema() -> serde_json::Value {
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "event_date": {"type": "string"},
                "event_location": {"type": "string"},
                "cause_of_death": {"type": "string"}
            },
            "required": ["event_date", "event_location", "cause_of_death"]
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_prompt_embeds_ocr_text() {
        let prompt = build_name_prompt("Name of the deceased (in full): Mary Smith");
        assert!(prompt.contains("Mary Smith"));
        assert!(prompt.contains("person_name"));
    }

    #[test]
    fn fields_prompt_embeds_year_range() {
        let prompt = build_fields_prompt("some text", 1865, 1867);
        assert!(prompt.contains("between 1865 and 1867"));
        assert!(prompt.contains("cause_of_death"));
    }

    #[test]
    fn schemas_require_their_keys() {
        let schema = fields_schema();
        let required = schema["items"]["required"].as_array().unwrap();
        assert_eq!(required.len(), 3);

        let schema = name_schema();
        assert_eq!(schema["items"]["required"][0], "person_name");
    }
}
