//! Structured per-item failures reported by the pseudonymisation service.

use serde::Serialize;
use serde_json::Value;

const UNEXPECTED_RESULT_TYPE: &str =
    "urn:problem-type:ictreuse:pseudonymisation-helper:unexpected-result";

/// An RFC 7807-style problem object (`type`/`title`/`status`/`detail`) as the
/// eHealth services emit it inside batch outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EHealthProblem {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    pub status: String,
    pub detail: String,
}

impl EHealthProblem {
    /// Interpret a service response object as a problem.
    ///
    /// Responses without a `type` field are wrapped in a synthetic
    /// "unexpected result" problem carrying the raw response, so the caller
    /// always gets something structured.
    pub fn from_response(response: &Value) -> Self {
        if response.get("type").is_some() {
            EHealthProblem {
                problem_type: string_field(response, "type"),
                title: string_field(response, "title"),
                status: string_field(response, "status"),
                detail: string_field(response, "detail"),
            }
        } else {
            EHealthProblem {
                problem_type: UNEXPECTED_RESULT_TYPE.to_string(),
                title: "Unexpected Result".to_string(),
                status: "undefined".to_string(),
                detail: format!(
                    "Unable to convert the service response into a problem. Response was: {response}"
                ),
            }
        }
    }
}

/// The service is inconsistent about numeric vs string `status`; normalize.
fn string_field(value: &Value, field: &str) -> String {
    match value.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

impl std::fmt::Display for EHealthProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}, status {}): {}",
            self.title, self.problem_type, self.status, self.detail
        )
    }
}
