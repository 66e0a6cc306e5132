use crate::domain::synthesis::{AudioFormat, TextSource};
use serde::{Deserialize, Serialize};

/// Request for POST /api/jobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJobRequest {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<TextSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<AudioFormat>,
}

/// A finished artifact, ready to be streamed to the client
#[derive(Debug, Clone)]
pub struct Artifact {
    pub file_name: String,
    pub content_type: &'static str,
    pub audio: Vec<u8>,
    pub duration_seconds: f64,
    pub segment_count: usize,
    pub fell_back: bool,
}
