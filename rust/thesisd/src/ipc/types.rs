use std::collections::HashMap;
use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::grading::GradeSheet;
use crate::service::ProgressReport;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    /// Last successful progress report per student id.
    pub progress: HashMap<String, ProgressReport>,
    /// Open grading sheets by sheet id.
    pub sheets: HashMap<String, GradeSheet>,
}
