use serde_json::Value;

use caseforge_core::types::Row;

/// Normalize a data-source payload into a flat row list.
///
/// Accepted shapes, tried in order:
/// - a direct list of rows
/// - `{"data": [...]}` or `{"response": {"data": [...]}}`
/// - MCP-style `{"content": [{"type": "text", "text": "..."}]}` where each
///   text block holds a JSON object, a JSON array, or newline-delimited JSON
///
/// Total: never fails, unparseable lines are skipped and anything that is not
/// a flat object is discarded.
pub fn extract_rows(res: &Value) -> Vec<Row> {
    if let Value::Array(items) = res {
        return only_objects(items);
    }

    let Value::Object(obj) = res else {
        return Vec::new();
    };

    // Unwrap one optional "response" envelope.
    let payload = match obj.get("response") {
        Some(Value::Object(inner)) => inner,
        _ => obj,
    };

    if let Some(Value::Array(data)) = payload.get("data") {
        return only_objects(data);
    }

    let mut rows = Vec::new();
    let Some(Value::Array(content)) = payload.get("content") else {
        return rows;
    };

    for block in content {
        let Some(text) = block.get("text").and_then(Value::as_str) else {
            continue;
        };
        if text.trim().is_empty() {
            continue;
        }

        // Whole-block parse first: object is one row, array is many.
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => {
                rows.push(map);
                continue;
            }
            Ok(Value::Array(items)) => {
                rows.extend(only_objects(&items));
                continue;
            }
            _ => {}
        }

        // Fall back to newline-delimited JSON, skipping bad lines.
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(line) {
                rows.push(map);
            }
        }
    }

    rows
}

fn only_objects(items: &[Value]) -> Vec<Row> {
    items
        .iter()
        .filter_map(|v| match v {
            Value::Object(map) => Some(map.clone()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_direct_row_list() {
        let rows = extract_rows(&json!([{"id": 1}, {"id": 2}, "junk", 3]));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], 1);
    }

    #[test]
    fn test_nested_data_field() {
        let rows = extract_rows(&json!({"data": [{"name": "stations"}]}));
        assert_eq!(rows.len(), 1);

        let rows = extract_rows(&json!({"response": {"data": [{"name": "fares"}]}}));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], "fares");
    }

    #[test]
    fn test_content_block_with_json_object() {
        let rows = extract_rows(&json!({
            "content": [{"type": "text", "text": r#"{"station": "Bank"}"#}]
        }));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["station"], "Bank");
    }

    #[test]
    fn test_content_block_with_json_array() {
        let rows = extract_rows(&json!({
            "content": [{"type": "text", "text": r#"[{"a": 1}, {"b": 2}, 7]"#}]
        }));
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_content_block_newline_delimited() {
        let text = "{\"a\": 1}\nnot json at all\n\n{\"b\": 2}\n[1,2]";
        let rows = extract_rows(&json!({"content": [{"type": "text", "text": text}]}));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["a"], 1);
        assert_eq!(rows[1]["b"], 2);
    }

    #[test]
    fn test_malformed_shapes_yield_empty() {
        assert!(extract_rows(&json!(null)).is_empty());
        assert!(extract_rows(&json!("plain string")).is_empty());
        assert!(extract_rows(&json!(42)).is_empty());
        assert!(extract_rows(&json!({"unrelated": true})).is_empty());
        assert!(extract_rows(&json!({"content": "not a list"})).is_empty());
        assert!(extract_rows(&json!({"content": [{"no_text": 1}, {"text": 5}]})).is_empty());
    }

    #[test]
    fn test_non_object_records_discarded() {
        let rows = extract_rows(&json!({"data": [[1, 2], "x", {"ok": true}]}));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["ok"], true);
    }
}
