use serde::{Deserialize, Serialize};
use std::fmt;

/// Voice presets offered by the conversion service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    Ash,
    Alloy,
    Verse,
    Sage,
}

impl Voice {
    /// Every voice the service offers, in the order it presents them.
    pub const ALL: [Voice; 4] = [Voice::Ash, Voice::Alloy, Voice::Verse, Voice::Sage];

    /// The name the service expects on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Voice::Ash => "ash",
            Voice::Alloy => "alloy",
            Voice::Verse => "verse",
            Voice::Sage => "sage",
        }
    }
}

impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document payload staged for submission.
#[derive(Debug, Clone)]
pub struct Document {
    /// Original file name, forwarded to the service
    pub file_name: String,
    /// Raw document bytes
    pub content: Vec<u8>,
}

impl Document {
    pub fn new(file_name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Response returned by the submit endpoint once a job is accepted.
///
/// Both fields are required; the service pre-allocates the artifact
/// location at acceptance time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobTicket {
    /// Server-assigned job identifier
    pub job_id: String,
    /// Location of the audio artifact (usually a path relative to the service)
    pub audio_url: String,
}

/// Body of a progress query response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressMessage {
    /// Percent complete in 0..=100, or -1 when generation failed
    pub progress: i64,
}
