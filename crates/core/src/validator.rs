//! Top-level shape checks for GraphQL responses.
use serde_json::Value;
use thiserror::Error;

const SNIPPET_LEN: usize = 200;

/// Which of the two GraphQL result members a response carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    Data,
    Errors,
    DataAndErrors,
}

/// A response that does not look like a GraphQL result. Each variant carries
/// the offending structure for diagnosis.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeViolation {
    #[error("response is not a JSON object, got {actual}")]
    NotAnObject { actual: String },
    #[error("response must contain either 'data' or 'errors', got keys [{}]", keys.join(", "))]
    MissingDataAndErrors { keys: Vec<String> },
    #[error("'data' must be an object, got {actual}")]
    DataNotObject { actual: String },
    #[error("'errors' must be a list, got {actual}")]
    ErrorsNotList { actual: String },
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn describe(value: &Value) -> String {
    let mut text = value.to_string();
    if text.len() > SNIPPET_LEN {
        let cut = (0..=SNIPPET_LEN)
            .rev()
            .find(|i| text.is_char_boundary(*i))
            .unwrap_or(0);
        text.truncate(cut);
        text.push_str("...");
    }
    format!("{} {text}", json_type(value))
}

/// Accepts an object carrying `data` as an object, `errors` as a list, or
/// both. Extra members such as `extensions` are allowed.
pub fn validate_response(response: &Value) -> Result<ResponseShape, ShapeViolation> {
    let object = response
        .as_object()
        .ok_or_else(|| ShapeViolation::NotAnObject {
            actual: describe(response),
        })?;

    let data = object.get("data");
    let errors = object.get("errors");

    if let Some(data) = data.filter(|d| !d.is_object()) {
        return Err(ShapeViolation::DataNotObject {
            actual: describe(data),
        });
    }
    if let Some(errors) = errors.filter(|e| !e.is_array()) {
        return Err(ShapeViolation::ErrorsNotList {
            actual: describe(errors),
        });
    }

    match (data.is_some(), errors.is_some()) {
        (true, true) => Ok(ResponseShape::DataAndErrors),
        (true, false) => Ok(ResponseShape::Data),
        (false, true) => Ok(ResponseShape::Errors),
        (false, false) => Err(ShapeViolation::MissingDataAndErrors {
            keys: object.keys().cloned().collect(),
        }),
    }
}

/// One line per entry of `errors`: the message followed by its locations and
/// path when the server provides them.
pub fn describe_graphql_errors(response: &Value) -> Vec<String> {
    let Some(errors) = response.get("errors").and_then(Value::as_array) else {
        return Vec::new();
    };

    errors
        .iter()
        .map(|error| {
            let mut line = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            if let Some(locations) = error.get("locations") {
                line.push_str(&format!(" (locations: {locations})"));
            }
            if let Some(path) = error.get("path") {
                line.push_str(&format!(" (path: {path})"));
            }
            line
        })
        .collect()
}
