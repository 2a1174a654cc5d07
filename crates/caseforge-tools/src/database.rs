use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::{json, Value};

use caseforge_core::error::{ForgeError, Result};
use caseforge_core::traits::Tool;
use caseforge_core::types::{Row, TableInfo, ToolOutcome};

use crate::datasource::DataSourceClient;

/// Convert schema-listing rows into table descriptors.
///
/// The data source reports tables as `TABLE_NAME`/`TABLE_COMMENT` records;
/// lowercase `name`/`description` is accepted as well.
pub fn tables_from_rows(rows: &[Row]) -> Vec<TableInfo> {
    rows.iter()
        .filter_map(|row| {
            let name = row
                .get("TABLE_NAME")
                .or_else(|| row.get("name"))
                .and_then(Value::as_str)?;
            let description = row
                .get("TABLE_COMMENT")
                .or_else(|| row.get("description"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            Some(TableInfo::new(name, description))
        })
        .collect()
}

// ── ListSchemasTool ─────────────────────────────────────────────

pub struct ListSchemasTool {
    client: Arc<DataSourceClient>,
}

impl ListSchemasTool {
    pub fn new(client: Arc<DataSourceClient>) -> Self {
        Self { client }
    }
}

impl Tool for ListSchemasTool {
    fn name(&self) -> &str {
        "list_schemas"
    }
    fn description(&self) -> &str {
        "List all tables in the database with a description of what each table stores."
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }
    fn execute(&self, _input: Value) -> BoxFuture<'_, Result<ToolOutcome>> {
        Box::pin(async move { Ok(self.client.call("list-tables", json!({})).await) })
    }
}

// ── DescribeSchemaTool ──────────────────────────────────────────

pub struct DescribeSchemaTool {
    client: Arc<DataSourceClient>,
}

impl DescribeSchemaTool {
    pub fn new(client: Arc<DataSourceClient>) -> Self {
        Self { client }
    }
}

#[derive(Deserialize)]
struct DescribeSchemaInput {
    name: String,
}

impl Tool for DescribeSchemaTool {
    fn name(&self) -> &str {
        "describe_schema"
    }
    fn description(&self) -> &str {
        "Get the schema of one table. Each returned row describes one column."
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Name of the table to describe" }
            },
            "required": ["name"]
        })
    }
    fn execute(&self, input: Value) -> BoxFuture<'_, Result<ToolOutcome>> {
        Box::pin(async move {
            let p: DescribeSchemaInput = serde_json::from_value(input)
                .map_err(|e| ForgeError::ToolValidation(e.to_string()))?;
            Ok(self
                .client
                .call("describe-table", json!({"table_name": p.name}))
                .await)
        })
    }
}

// ── ExecuteQueryTool ────────────────────────────────────────────

pub struct ExecuteQueryTool {
    client: Arc<DataSourceClient>,
}

impl ExecuteQueryTool {
    pub fn new(client: Arc<DataSourceClient>) -> Self {
        Self { client }
    }
}

#[derive(Deserialize)]
struct ExecuteQueryInput {
    query: String,
}

/// Reject anything that is not a plain read. The model is instructed to only
/// issue SELECTs; this guard makes the boundary enforce it too.
fn is_read_only(query: &str) -> bool {
    matches!(
        query
            .trim_start()
            .split_whitespace()
            .next()
            .map(str::to_ascii_uppercase)
            .as_deref(),
        Some("SELECT") | Some("WITH")
    )
}

impl Tool for ExecuteQueryTool {
    fn name(&self) -> &str {
        "execute_query"
    }
    fn description(&self) -> &str {
        "Execute a read-only SELECT query on the database. Each returned row is one result row."
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Read-only SELECT query to execute" }
            },
            "required": ["query"]
        })
    }
    fn execute(&self, input: Value) -> BoxFuture<'_, Result<ToolOutcome>> {
        Box::pin(async move {
            let p: ExecuteQueryInput = serde_json::from_value(input)
                .map_err(|e| ForgeError::ToolValidation(e.to_string()))?;
            if !is_read_only(&p.query) {
                return Ok(ToolOutcome::error(
                    "only read-only SELECT queries are allowed",
                ));
            }
            Ok(self.client.call("execute-sql", json!({"sql": p.query})).await)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect()
    }

    #[test]
    fn test_tables_from_rows() {
        let rows = vec![
            row(&[("TABLE_NAME", "stations"), ("TABLE_COMMENT", "tube stations")]),
            row(&[("name", "fares"), ("description", "fare bands")]),
            row(&[("unrelated", "x")]),
        ];
        let tables = tables_from_rows(&rows);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0], TableInfo::new("stations", "tube stations"));
        assert_eq!(tables[1], TableInfo::new("fares", "fare bands"));
    }

    #[test]
    fn test_read_only_guard() {
        assert!(is_read_only("SELECT * FROM stations"));
        assert!(is_read_only("  select 1"));
        assert!(is_read_only("WITH t AS (SELECT 1) SELECT * FROM t"));
        assert!(!is_read_only("DROP TABLE stations"));
        assert!(!is_read_only("UPDATE fares SET price = 0"));
        assert!(!is_read_only(""));
    }
}
