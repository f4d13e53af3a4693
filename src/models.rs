use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::render::RenderPlan;

pub const SERVICE_NAME: &str = "excel-preview-worker";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawCell {
    #[serde(default)]
    pub value: String,
    #[serde(default, alias = "raw_value")]
    pub raw_value: Option<Value>,
    #[serde(default, alias = "is_amount")]
    pub is_amount: bool,
    #[serde(default, alias = "is_highlight")]
    pub is_highlight: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RawMergeGroup {
    pub start: i64,
    pub end: i64,
    #[serde(default)]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawTable {
    #[serde(default, alias = "center_title")]
    pub title: Option<String>,
    #[serde(default)]
    pub headers: Option<Vec<String>>,
    #[serde(default)]
    pub rows: Option<Vec<Vec<RawCell>>>,
    /// Column name to its merge groups, in document order. Entries stay
    /// untyped until the column is found in `headers`.
    #[serde(default, alias = "merge_info")]
    pub merge_info: Option<Map<String, Value>>,
}

impl RawTable {
    pub fn is_empty(&self) -> bool {
        self.headers.is_none() && self.rows.is_none() && self.merge_info.is_none()
    }
}

/// One entry of the result object. The table is either nested under
/// `excel_table` (what the processing service sends) or inlined.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawGroup {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "total_amount")]
    pub total_amount: Option<f64>,
    #[serde(default, alias = "excel_table", alias = "table")]
    pub excel_table: Option<RawTable>,
    #[serde(flatten)]
    pub inline: RawTable,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub preview_data: Option<Value>,
    #[serde(default)]
    pub stats: Option<Value>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub excel_file_name: Option<String>,
    #[serde(default)]
    pub errors: Vec<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRenderResponse {
    pub message: String,
    pub plan: RenderPlan,
    pub html: String,
    pub stats: Option<Value>,
    pub download_url: Option<String>,
    pub excel_file_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigResponse {
    pub max_file_size_mb: u64,
    pub allowed_extensions: Vec<String>,
    pub required_columns: Vec<String>,
    pub merge_columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}
