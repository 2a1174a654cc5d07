pub mod complete;
pub mod database;
pub mod datasource;
pub mod registry;
pub mod rows;

use std::sync::Arc;

pub use complete::{CompletionSignal, MarkCompleteTool};
pub use database::{tables_from_rows, DescribeSchemaTool, ExecuteQueryTool, ListSchemasTool};
pub use datasource::DataSourceClient;
pub use registry::ToolRegistry;
pub use rows::extract_rows;

/// Create a registry with the data-source tools and the completion signal.
pub fn data_search_registry(client: Arc<DataSourceClient>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(ListSchemasTool::new(client.clone()));
    registry.register(DescribeSchemaTool::new(client.clone()));
    registry.register(ExecuteQueryTool::new(client));
    registry.register(MarkCompleteTool);
    registry
}
