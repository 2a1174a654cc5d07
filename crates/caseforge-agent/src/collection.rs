use std::path::{Path, PathBuf};

use chrono::Local;
use serde_json::Value;
use tracing::{debug, info};

use caseforge_core::error::{ForgeError, Result};

/// Which workflow path produced a persisted collection. Encoded into the
/// artifact filename so provenance is recoverable from the name alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Initial,
    Enhanced,
    EnhancedWithData,
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Variant::Initial => "initial",
            Variant::Enhanced => "enhanced",
            Variant::EnhancedWithData => "enhanced_with_data",
        };
        write!(f, "{s}")
    }
}

fn artifact_filename(stamp: &str, variant: Variant) -> String {
    format!("{stamp}_{variant}_postman_collection.json")
}

/// Persists collection artifacts under timestamped, variant-tagged filenames.
#[derive(Debug, Clone)]
pub struct CollectionStore {
    artifacts_dir: PathBuf,
}

impl CollectionStore {
    pub fn new(artifacts_dir: impl Into<PathBuf>) -> Self {
        Self {
            artifacts_dir: artifacts_dir.into(),
        }
    }

    pub fn artifacts_dir(&self) -> &Path {
        &self.artifacts_dir
    }

    /// Write a collection artifact, returning its path.
    pub fn save(&self, collection: &Value, variant: Variant) -> Result<PathBuf> {
        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let path = self.artifacts_dir.join(artifact_filename(&stamp, variant));

        std::fs::create_dir_all(&self.artifacts_dir)
            .map_err(|e| ForgeError::Persist(e.to_string()))?;
        let text =
            serde_json::to_string_pretty(collection).map_err(|e| ForgeError::Persist(e.to_string()))?;
        std::fs::write(&path, text).map_err(|e| ForgeError::Persist(e.to_string()))?;

        info!(path = %path.display(), %variant, "Collection artifact saved");
        Ok(path)
    }

    /// Read a collection artifact back.
    pub fn load(&self, path: &Path) -> Result<Value> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// The last test-case item of a collection, used as the structural example
/// for generated items.
pub fn last_item(collection: &Value) -> Option<&Value> {
    collection.get("item")?.as_array()?.last()
}

/// Merge new test-case items into a collection.
///
/// Append-only: existing items are never mutated or removed. If the
/// collection has a textual name without the enhanced marker, the marker is
/// appended.
pub fn merge_collections(existing: &Value, new_items: &[Value]) -> Value {
    let mut merged = existing.clone();

    let obj = match merged.as_object_mut() {
        Some(obj) => obj,
        None => return merged,
    };

    let items = obj
        .entry("item")
        .or_insert_with(|| Value::Array(Vec::new()));
    if let Some(list) = items.as_array_mut() {
        list.extend(new_items.iter().cloned());
    }

    if let Some(name) = obj
        .get_mut("info")
        .and_then(|info| info.get_mut("name"))
    {
        if let Some(text) = name.as_str() {
            if !text.ends_with(" (Enhanced)") {
                *name = Value::String(format!("{text} (Enhanced)"));
            }
        }
    }

    merged
}

/// Clean and parse free-text model output that should be collection JSON.
///
/// Strips markdown fences, then parses; on failure attempts the common
/// repairs (trailing commas, over-escaped quotes) before giving up.
pub fn clean_model_json(text: &str) -> Result<Value> {
    let mut cleaned = text.trim();

    if let Some(rest) = cleaned.strip_prefix("```json") {
        cleaned = rest;
    } else if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest;
    }
    let cleaned = cleaned.trim();

    match serde_json::from_str(cleaned) {
        Ok(value) => Ok(value),
        Err(e) => {
            debug!(error = %e, "Model JSON parse failed, attempting repair");
            attempt_json_repair(cleaned)
                .ok_or_else(|| ForgeError::ModelParse(format!("unrepairable JSON output: {e}")))
        }
    }
}

fn attempt_json_repair(text: &str) -> Option<Value> {
    let fixes: [fn(&str) -> String; 2] = [
        // Trailing commas before a closing brace/bracket
        |s| s.replace(",}", "}").replace(",]", "]"),
        // Over-escaped quotes
        |s| s.replace("\\\"", "\""),
    ];

    for fix in fixes {
        if let Ok(value) = serde_json::from_str(&fix(text)) {
            return Some(value);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample_collection() -> Value {
        json!({
            "info": { "name": "TFL Journeys", "schema": "v2.1.0" },
            "item": [
                { "name": "valid journey", "request": { "method": "GET" } },
                { "name": "bad mode", "request": { "method": "GET" } }
            ]
        })
    }

    #[test]
    fn test_merge_is_append_only() {
        let existing = sample_collection();
        let new_items = vec![
            json!({ "name": "oyster edge case", "request": { "method": "GET" } }),
            json!({ "name": "missing date", "request": { "method": "GET" } }),
        ];

        let merged = merge_collections(&existing, &new_items);
        let items = merged["item"].as_array().unwrap();

        assert_eq!(items.len(), 4);
        // First N items byte-for-byte unchanged
        assert_eq!(items[0], existing["item"][0]);
        assert_eq!(items[1], existing["item"][1]);
        assert_eq!(items[2]["name"], "oyster edge case");
        // Source collection untouched
        assert_eq!(existing["item"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_merge_marks_name_once() {
        let merged = merge_collections(&sample_collection(), &[]);
        assert_eq!(merged["info"]["name"], "TFL Journeys (Enhanced)");

        let again = merge_collections(&merged, &[]);
        assert_eq!(again["info"]["name"], "TFL Journeys (Enhanced)");
    }

    #[test]
    fn test_merge_creates_missing_item_array() {
        let merged = merge_collections(&json!({"info": {}}), &[json!({"name": "t1"})]);
        assert_eq!(merged["item"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_last_item() {
        let collection = sample_collection();
        assert_eq!(last_item(&collection).unwrap()["name"], "bad mode");
        assert!(last_item(&json!({"item": []})).is_none());
        assert!(last_item(&json!({})).is_none());
    }

    #[test]
    fn test_filenames_distinct_per_timestamp_and_tagged() {
        let a = artifact_filename("20260829_120000", Variant::Initial);
        let b = artifact_filename("20260829_120001", Variant::Initial);
        assert_ne!(a, b);
        assert!(a.contains("_initial_"));

        let c = artifact_filename("20260829_120000", Variant::EnhancedWithData);
        assert!(c.contains("_enhanced_with_data_"));
        assert!(c.ends_with("_postman_collection.json"));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = CollectionStore::new(dir.path());

        let path = store.save(&sample_collection(), Variant::Enhanced).unwrap();
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .contains("_enhanced_"));

        let loaded = store.load(&path).unwrap();
        assert_eq!(loaded, sample_collection());
    }

    #[test]
    fn test_clean_valid_json_matches_direct_parse() {
        let text = r#"{"info": {"name": "X"}, "item": []}"#;
        let cleaned = clean_model_json(text).unwrap();
        let direct: Value = serde_json::from_str(text).unwrap();
        assert_eq!(cleaned, direct);
    }

    #[test]
    fn test_clean_strips_markdown_fences() {
        let text = "```json\n{\"item\": []}\n```";
        let value = clean_model_json(text).unwrap();
        assert!(value["item"].as_array().unwrap().is_empty());

        let bare = "```\n{\"item\": []}\n```";
        assert!(clean_model_json(bare).is_ok());
    }

    #[test]
    fn test_repair_trailing_comma() {
        let value = clean_model_json(r#"{"item": [1, 2,],}"#).unwrap();
        assert_eq!(value["item"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_unrepairable_is_an_error() {
        let err = clean_model_json("this is not json at all {{{").unwrap_err();
        assert!(matches!(err, ForgeError::ModelParse(_)));
    }
}
