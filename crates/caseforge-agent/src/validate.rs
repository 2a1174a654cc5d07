use std::path::Path;

use futures::future::BoxFuture;
use tracing::warn;

use caseforge_core::error::{ForgeError, Result};
use caseforge_workflow::{StepNode, StepOutcome};

use crate::state::{RunPatch, RunState};

/// Read and structurally validate an API specification file, returning its
/// text. The document must be JSON with an `openapi` or `swagger` version
/// marker and a `paths` object.
pub fn validate_spec_file(path: &Path) -> Result<String> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        ForgeError::SpecValidation(format!("cannot read {}: {e}", path.display()))
    })?;

    let doc: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| ForgeError::SpecValidation(format!("not valid JSON: {e}")))?;

    let obj = doc
        .as_object()
        .ok_or_else(|| ForgeError::SpecValidation("document root is not an object".into()))?;

    if !obj.contains_key("openapi") && !obj.contains_key("swagger") {
        return Err(ForgeError::SpecValidation(
            "missing 'openapi'/'swagger' version marker".into(),
        ));
    }
    if !obj.get("paths").map(|p| p.is_object()).unwrap_or(false) {
        return Err(ForgeError::SpecValidation(
            "missing or non-object 'paths' section".into(),
        ));
    }

    Ok(text)
}

/// Gate node: every run starts here. An unreadable or malformed specification
/// terminates the run as an error before any model call is made.
pub struct ValidateSpecNode;

impl StepNode<RunState> for ValidateSpecNode {
    fn id(&self) -> &str {
        "validate_spec"
    }

    fn run<'a>(&'a self, state: &'a RunState) -> BoxFuture<'a, Result<StepOutcome<RunState>>> {
        Box::pin(async move {
            match validate_spec_file(&state.spec_fpath) {
                Ok(_) => Ok(StepOutcome::route(caseforge_workflow::Transition::Next)),
                Err(e) => {
                    warn!(spec = %state.spec_fpath.display(), error = %e, "Specification rejected");
                    Ok(StepOutcome::finish(RunPatch::error(format!(
                        "specification validation failed: {e}"
                    ))))
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_spec(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_accepts_minimal_openapi_doc() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_spec(
            &dir,
            "spec.json",
            r#"{"openapi": "3.0.0", "paths": {"/journey": {}}}"#,
        );
        assert!(validate_spec_file(&path).is_ok());
    }

    #[test]
    fn test_rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = validate_spec_file(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ForgeError::SpecValidation(_)));
    }

    #[test]
    fn test_rejects_non_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_spec(&dir, "spec.json", "openapi: 3.0.0");
        assert!(validate_spec_file(&path).is_err());
    }

    #[test]
    fn test_rejects_missing_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_spec(&dir, "spec.json", r#"{"openapi": "3.0.0"}"#);
        let err = validate_spec_file(&path).unwrap_err();
        assert!(err.to_string().contains("paths"));
    }
}
