//! Option extraction from elicitation schemas.

use serde_json::Value;

/// Pull the enumerated choices out of an elicitation's requested schema.
///
/// Looks at each property in schema order and returns the first `enum` found, either
/// directly on the property or on its `items` schema (multi-select). `None`
/// means the answer is free text.
pub fn extract_options(schema: Option<&Value>) -> Option<Vec<Value>> {
    let properties = schema?.get("properties")?.as_object()?;
    properties.values().find_map(|property| {
        property
            .get("enum")
            .or_else(|| property.get("items").and_then(|items| items.get("enum")))
            .and_then(Value::as_array)
            .cloned()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn direct_enum_is_extracted() {
        let schema = json!({"properties": {"time": {"enum": ["9am", "10am"]}}});
        assert_eq!(extract_options(Some(&schema)), Some(vec![json!("9am"), json!("10am")]));
    }

    #[test]
    fn items_enum_is_extracted() {
        let schema = json!({"properties": {"time": {"items": {"enum": ["9am", "10am"]}}}});
        assert_eq!(extract_options(Some(&schema)), Some(vec![json!("9am"), json!("10am")]));
    }

    #[test]
    fn schema_without_enum_yields_none() {
        let schema = json!({"type": "object", "properties": {"value": {"type": "string"}}});
        assert_eq!(extract_options(Some(&schema)), None);
        assert_eq!(extract_options(Some(&json!({}))), None);
        assert_eq!(extract_options(None), None);
    }

    #[test]
    fn later_property_enum_is_found_when_earlier_has_none() {
        let schema = json!({
            "properties": {
                "a_note": {"type": "string"},
                "b_choice": {"type": "string", "enum": ["yes", "no"]}
            }
        });
        assert_eq!(extract_options(Some(&schema)), Some(vec![json!("yes"), json!("no")]));
    }

    #[test]
    fn first_enum_follows_schema_order() {
        let schema: Value = serde_json::from_str(
            r#"{"properties": {"zeta": {"enum": ["z"]}, "alpha": {"enum": ["a"]}}}"#,
        )
        .unwrap();
        assert_eq!(extract_options(Some(&schema)), Some(vec![json!("z")]));
    }
}
