//! Remote document analysis.
//!
//! Documents are analyzed by URL: the service fetches the signed blob URL
//! itself, so nothing here streams document bytes.

mod client;
mod wire;

pub use client::FormRecognizerClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use wire::RawAnalyzeResult;

pub const READ_MODEL: &str = "prebuilt-read";
pub const LAYOUT_MODEL: &str = "prebuilt-layout";

/// Document analysis as seen by the pipeline
#[async_trait]
pub trait DocumentAnalyzer: Send + Sync {
    /// Analyze the document at `url` with `model_id`, or the configured
    /// default model
    async fn analyze(
        &self,
        url: &str,
        model_id: Option<&str>,
    ) -> Result<AnalysisResult, AnalysisError>;
}

/// Normalized analysis output stored as a request's result payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub page_count: u32,
    pub content: String,
    pub tables: Vec<serde_json::Value>,
    pub key_value_pairs: Vec<serde_json::Value>,
    pub entities: Vec<serde_json::Value>,
    pub styles: Vec<serde_json::Value>,
}

impl From<RawAnalyzeResult> for AnalysisResult {
    fn from(raw: RawAnalyzeResult) -> Self {
        Self {
            page_count: raw.pages.len() as u32,
            content: raw.content,
            tables: raw.tables,
            key_value_pairs: raw.key_value_pairs,
            entities: raw.entities,
            styles: raw.styles,
        }
    }
}

/// Plain text of a document, whole and per page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextExtraction {
    pub text: String,
    pub pages: Vec<PageText>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageText {
    pub number: u32,
    /// Page lines joined with `\n`
    pub text: String,
    pub width: Option<f64>,
    pub height: Option<f64>,
}

impl From<RawAnalyzeResult> for TextExtraction {
    fn from(raw: RawAnalyzeResult) -> Self {
        let pages = raw
            .pages
            .into_iter()
            .map(|page| PageText {
                number: page.page_number,
                text: page
                    .lines
                    .into_iter()
                    .map(|line| line.content)
                    .collect::<Vec<_>>()
                    .join("\n"),
                width: page.width,
                height: page.height,
            })
            .collect();

        Self {
            text: raw.content,
            pages,
        }
    }
}

/// Tables and paragraphs of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutAnalysis {
    pub tables: Vec<serde_json::Value>,
    pub paragraphs: Vec<Paragraph>,
    pub page_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paragraph {
    pub content: String,
    /// Polygon of the paragraph's first bounding region, empty if none
    pub bounding_box: Vec<f64>,
}

impl From<RawAnalyzeResult> for LayoutAnalysis {
    fn from(raw: RawAnalyzeResult) -> Self {
        let paragraphs = raw
            .paragraphs
            .into_iter()
            .map(|paragraph| Paragraph {
                content: paragraph.content,
                bounding_box: paragraph
                    .bounding_regions
                    .into_iter()
                    .next()
                    .map(|region| region.polygon)
                    .unwrap_or_default(),
            })
            .collect();

        Self {
            tables: raw.tables,
            paragraphs,
            page_count: raw.pages.len() as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture() -> RawAnalyzeResult {
        serde_json::from_value(json!({
            "apiVersion": "2023-07-31",
            "modelId": "prebuilt-document",
            "content": "Invoice 42\nTotal: 10 EUR\nPage two",
            "pages": [
                {
                    "pageNumber": 1,
                    "width": 8.5,
                    "height": 11.0,
                    "unit": "inch",
                    "lines": [
                        { "content": "Invoice 42", "polygon": [0, 0, 1, 0, 1, 1, 0, 1] },
                        { "content": "Total: 10 EUR", "polygon": [] }
                    ]
                },
                { "pageNumber": 2, "width": 8.5, "height": 11.0, "lines": [{ "content": "Page two" }] }
            ],
            "tables": [{ "rowCount": 1, "columnCount": 2, "cells": [] }],
            "keyValuePairs": [{ "key": { "content": "Total" }, "value": { "content": "10 EUR" } }],
            "styles": [{ "isHandwritten": false }],
            "paragraphs": [
                { "content": "Invoice 42", "boundingRegions": [
                    { "pageNumber": 1, "polygon": [0.5, 0.5, 2.0, 0.5, 2.0, 1.0, 0.5, 1.0] },
                    { "pageNumber": 2, "polygon": [9.0] }
                ]},
                { "content": "Page two" }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_analysis_result_mapping() {
        let result = AnalysisResult::from(fixture());

        assert_eq!(result.page_count, 2);
        assert!(result.content.starts_with("Invoice 42"));
        assert_eq!(result.tables.len(), 1);
        assert_eq!(result.key_value_pairs[0]["key"]["content"], "Total");
        assert!(result.entities.is_empty());
        assert_eq!(result.styles.len(), 1);
    }

    #[test]
    fn test_analysis_result_serializes_camel_case() {
        let value = serde_json::to_value(AnalysisResult::from(fixture())).unwrap();
        assert_eq!(value["pageCount"], 2);
        assert!(value.get("keyValuePairs").is_some());
        assert!(value.get("key_value_pairs").is_none());
    }

    #[test]
    fn test_text_extraction_joins_lines_per_page() {
        let extraction = TextExtraction::from(fixture());

        assert_eq!(extraction.pages.len(), 2);
        assert_eq!(extraction.pages[0].number, 1);
        assert_eq!(extraction.pages[0].text, "Invoice 42\nTotal: 10 EUR");
        assert_eq!(extraction.pages[0].width, Some(8.5));
        assert_eq!(extraction.pages[1].text, "Page two");
    }

    #[test]
    fn test_layout_uses_first_bounding_region() {
        let layout = LayoutAnalysis::from(fixture());

        assert_eq!(layout.page_count, 2);
        assert_eq!(layout.tables.len(), 1);
        assert_eq!(layout.paragraphs[0].bounding_box.len(), 8);
        assert_eq!(layout.paragraphs[0].bounding_box[0], 0.5);
        assert!(layout.paragraphs[1].bounding_box.is_empty());
    }

    #[test]
    fn test_empty_result_maps_to_zero_pages() {
        let raw: RawAnalyzeResult = serde_json::from_value(json!({})).unwrap();
        let result = AnalysisResult::from(raw);
        assert_eq!(result, AnalysisResult::default());
    }
}
