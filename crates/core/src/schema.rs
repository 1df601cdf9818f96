use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use jsonschema::Validator;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to load schema {path}: {reason}")]
    Load { path: PathBuf, reason: String },
    #[error("Response data violates schema {path}: {}", messages.join("; "))]
    Violation {
        path: PathBuf,
        messages: Vec<String>,
    },
}

/// JSON schemas keyed by case name, read lazily from `<dir>/<name>.json` and
/// compiled once.
pub struct SchemaRegistry {
    dir: PathBuf,
    cache: HashMap<String, Option<Validator>>,
}

impl SchemaRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: HashMap::new(),
        }
    }

    fn schema_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    fn compile(path: &Path) -> Result<Validator, SchemaError> {
        let load_error = |reason: String| SchemaError::Load {
            path: path.to_path_buf(),
            reason,
        };
        let content = fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
        let schema: Value = serde_json::from_str(&content).map_err(|e| load_error(e.to_string()))?;
        jsonschema::validator_for(&schema).map_err(|e| load_error(e.to_string()))
    }

    /// Validates `data` against the schema registered for `name`.
    ///
    /// Returns `Ok(false)` when no schema exists for the case.
    pub fn validate(&mut self, name: &str, data: &Value) -> Result<bool, SchemaError> {
        let path = self.schema_path(name);
        if !self.cache.contains_key(name) {
            let compiled = if path.is_file() {
                debug!(path = %path.display(), "Compiling response schema");
                Some(Self::compile(&path)?)
            } else {
                None
            };
            self.cache.insert(name.to_string(), compiled);
        }

        let Some(Some(validator)) = self.cache.get(name) else {
            return Ok(false);
        };
        let messages: Vec<String> = validator.iter_errors(data).map(|e| e.to_string()).collect();
        if messages.is_empty() {
            Ok(true)
        } else {
            Err(SchemaError::Violation { path, messages })
        }
    }
}
