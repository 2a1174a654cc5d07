use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForgeError {
    // Model errors
    #[error("model request failed: {0}")]
    ModelRequest(String),

    #[error("model response parse error: {0}")]
    ModelParse(String),

    // Tool errors
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("tool execution failed: {tool}: {message}")]
    ToolExecution { tool: String, message: String },

    #[error("tool input validation failed: {0}")]
    ToolValidation(String),

    // Workflow errors
    #[error("step '{0}' not found in workflow graph")]
    NodeNotFound(String),

    #[error("workflow exceeded step budget ({0})")]
    StepBudgetExceeded(usize),

    // Domain errors
    #[error("spec validation failed: {0}")]
    SpecValidation(String),

    #[error("collection persist failed: {0}")]
    Persist(String),

    #[error("upload failed: {0}")]
    Upload(String),

    // Config errors
    #[error("config error: {0}")]
    Config(String),

    #[error("config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ForgeError>;
