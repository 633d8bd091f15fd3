use serde_json::json;

use crate::grading::GradeError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({ "id": id, "ok": true, "result": result })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({ "code": code, "message": message.into() });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({ "id": id, "ok": false, "error": error })
}

/// Handler-level failure, rendered with `err` at the edge.
#[derive(Debug)]
pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn not_found(what: &str, id: &str) -> Self {
        Self {
            code: "not_found",
            message: format!("{} not found", what),
            details: Some(json!({ "id": id })),
        }
    }

    pub fn db(code: &'static str, e: impl std::fmt::Display) -> Self {
        Self::new(code, e.to_string())
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        tracing::debug!(request_id = id, code = self.code, message = %self.message, "request rejected");
        err(id, self.code, self.message, self.details)
    }
}

impl From<GradeError> for HandlerErr {
    fn from(e: GradeError) -> Self {
        let code = match e.code.as_str() {
            "validation_failed" => "validation_failed",
            "not_found" => "not_found",
            _ => "source_failed",
        };
        Self {
            code,
            message: e.message,
            details: e.details,
        }
    }
}
