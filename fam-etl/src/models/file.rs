//! Uploaded file record
//!
//! Files are stored whole; imports are re-runnable against the same upload
//! and a failed job never loses its input.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: Uuid,
    pub filename: String,
    /// Raw CSV text as received
    #[serde(skip_serializing)]
    pub content: String,
    pub size_bytes: usize,
    pub uploaded_at: DateTime<Utc>,
}

impl UploadedFile {
    pub fn new(filename: String, content: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename,
            size_bytes: content.len(),
            content,
            uploaded_at: Utc::now(),
        }
    }
}
