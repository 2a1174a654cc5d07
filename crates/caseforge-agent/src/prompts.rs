//! Prompt templates and structured-output schemas for the generation steps.

use serde_json::{json, Value};

use caseforge_core::types::TableInfo;

pub fn format_tables(tables: &[TableInfo]) -> String {
    tables
        .iter()
        .map(|t| format!("- {}: {}", t.name, t.description))
        .collect::<Vec<_>>()
        .join("\n")
}

/// System prompt for the data-search sub-workflow's model step.
pub fn data_search_prompt(lookup_query: &str, tables: &[TableInfo]) -> String {
    format!(
        "You are a data search agent. Your task is to find the following data in a \
         relational database:\n\n{lookup_query}\n\nAvailable tables:\n{}\n\n\
         Use describe_schema to inspect a table's columns and execute_query to run \
         read-only SELECT queries. When you have found the requested data, or have \
         exhausted all options, call mark_complete with status 'found' or 'failed' \
         and a short explanation. Issue one tool call at a time.",
        format_tables(tables)
    )
}

/// System prompt for generating a fresh collection from an API specification.
pub fn create_collection_prompt(date: &str) -> String {
    format!(
        "You are an expert API tester. Convert the provided OpenAPI specification \
         into a complete Postman collection (collection format v2.1.0) covering every \
         endpoint with positive and negative test cases. Today's date is {date}; use \
         it for any date-valued example parameters. Respond with ONLY the collection \
         JSON, no prose and no markdown fences."
    )
}

/// Planning prompt: which new test cases the scenario requires, as short
/// descriptions.
pub fn plan_test_cases_prompt(spec: &str, collection: &str, requirement: &str) -> String {
    format!(
        "You are planning functional API test cases.\n\nOpenAPI specification:\n{spec}\n\n\
         Existing Postman collection:\n{collection}\n\nUser requirement:\n{requirement}\n\n\
         List the new test cases needed to cover the requirement that are not already \
         present in the collection. Return an empty list if the collection already \
         covers it."
    )
}

/// Generation prompt: turn planned descriptions into concrete test-case items.
pub fn generate_test_cases_prompt(example: &str, spec: &str, new_tests: &[String]) -> String {
    format!(
        "Generate Postman test-case items for the planned cases below. Match the \
         structure of this example item from the existing collection:\n{example}\n\n\
         OpenAPI specification:\n{spec}\n\nPlanned test cases:\n{}",
        new_tests.join("\n")
    )
}

/// Generation prompt for the data-enhancement path: concrete looked-up rows
/// drive realistic request parameters.
pub fn data_test_cases_prompt(
    example: &str,
    spec: &str,
    requirement: &str,
    data: &str,
) -> String {
    format!(
        "Generate Postman test-case items that exercise the requirement below using \
         the looked-up reference data as concrete request parameters. Match the \
         structure of this example item:\n{example}\n\nOpenAPI specification:\n{spec}\n\n\
         Requirement:\n{requirement}\n\nLooked-up data:\n{data}"
    )
}

/// Prompt for deriving database lookup requests from a scenario.
pub fn derive_requirements_prompt(test_data_scenario: &str) -> String {
    format!(
        "A tester described the following scenario:\n\n{test_data_scenario}\n\n\
         List the categories of reference data that must be looked up in the \
         database to build realistic test inputs for it. Each entry should be one \
         self-contained lookup description."
    )
}

/// Schema for the lookup-request planning step.
pub fn lookup_requests_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "data_to_lookup": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Lookup requests to be executed on the database"
            }
        },
        "required": ["data_to_lookup"],
        "additionalProperties": false
    })
}

/// Schema for the test-case planning step.
pub fn planned_cases_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "test_cases": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Planned test cases, one description each"
            }
        },
        "required": ["test_cases"],
        "additionalProperties": false
    })
}

/// Schema for generated test-case items (Postman collection item objects).
pub fn test_case_items_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "test_cases": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "request": { "type": "object", "additionalProperties": true },
                        "event": {
                            "type": "array",
                            "items": { "type": "object", "additionalProperties": true }
                        },
                        "response": {
                            "type": "array",
                            "items": { "type": "object", "additionalProperties": true }
                        }
                    },
                    "required": ["name", "request"],
                    "additionalProperties": true
                }
            }
        },
        "required": ["test_cases"],
        "additionalProperties": false
    })
}
