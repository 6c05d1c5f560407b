//! Response bodies of the form recognizer REST API.

use serde::Deserialize;

/// Body returned when polling an analyze operation
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AnalyzeOperation {
    pub status: String,
    #[serde(default)]
    pub analyze_result: Option<RawAnalyzeResult>,
    #[serde(default)]
    pub error: Option<RemoteError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RemoteError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub innererror: Option<serde_json::Value>,
}

impl RemoteError {
    /// Most specific message the service gave
    pub fn detail(&self) -> String {
        self.innererror
            .as_ref()
            .and_then(|inner| inner.get("message"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}: {}", self.code, self.message))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawAnalyzeResult {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub pages: Vec<RawPage>,
    #[serde(default)]
    pub tables: Vec<serde_json::Value>,
    #[serde(default)]
    pub key_value_pairs: Vec<serde_json::Value>,
    #[serde(default)]
    pub entities: Vec<serde_json::Value>,
    #[serde(default)]
    pub styles: Vec<serde_json::Value>,
    #[serde(default)]
    pub paragraphs: Vec<RawParagraph>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawPage {
    pub page_number: u32,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub lines: Vec<RawLine>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawLine {
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawParagraph {
    pub content: String,
    #[serde(default)]
    pub bounding_regions: Vec<RawBoundingRegion>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawBoundingRegion {
    #[serde(default)]
    pub polygon: Vec<f64>,
}
