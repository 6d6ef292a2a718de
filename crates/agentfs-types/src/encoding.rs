//! Text encodings for file content.
//!
//! Files are byte strings. An `Encoding` describes how text handed to
//! `write_file_encoded` turns into bytes, and how bytes come back out of
//! `read_file_encoded`.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::{AgentFsError, Result};

/// A text encoding understood by the filesystem handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Text is stored as its UTF-8 bytes; reads must be valid UTF-8.
    Utf8,
    /// Text is standard base64 of the stored bytes.
    Base64,
}

impl Encoding {
    /// Turn text into the bytes it represents.
    pub fn decode(&self, text: &str) -> Result<Vec<u8>> {
        match self {
            Encoding::Utf8 => Ok(text.as_bytes().to_vec()),
            Encoding::Base64 => STANDARD.decode(text).map_err(|e| AgentFsError::Decode {
                path: String::new(),
                message: format!("invalid base64: {e}"),
            }),
        }
    }

    /// Render stored bytes as text.
    pub fn encode(&self, bytes: Vec<u8>) -> Result<String> {
        match self {
            Encoding::Utf8 => String::from_utf8(bytes).map_err(|e| AgentFsError::Decode {
                path: String::new(),
                message: format!("invalid utf-8: {e}"),
            }),
            Encoding::Base64 => Ok(STANDARD.encode(bytes)),
        }
    }

    /// Canonical name, as accepted by `FromStr`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Base64 => "base64",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = AgentFsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            "base64" => Ok(Encoding::Base64),
            _ => Err(AgentFsError::UnsupportedEncoding(s.to_string())),
        }
    }
}
