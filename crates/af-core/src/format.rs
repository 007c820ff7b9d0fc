//! Target audio formats.
//!
//! Seven formats are offered to users. Anything else that looks like a file
//! extension is carried through as [`AudioFormat::Other`] and left to the
//! engine to accept or reject.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Target format of a conversion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AudioFormat {
    #[default]
    Mp3,
    Wav,
    Ogg,
    Flac,
    M4a,
    Aac,
    Wma,
    /// An extension outside the supported list, passed through verbatim.
    Other(String),
}

impl AudioFormat {
    /// The formats offered by the adapters, in display order.
    pub const SUPPORTED: &'static [AudioFormat] = &[
        AudioFormat::Mp3,
        AudioFormat::Wav,
        AudioFormat::Ogg,
        AudioFormat::Flac,
        AudioFormat::M4a,
        AudioFormat::Aac,
        AudioFormat::Wma,
    ];

    /// File extension without the leading dot.
    pub fn extension(&self) -> &str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::Ogg => "ogg",
            Self::Flac => "flac",
            Self::M4a => "m4a",
            Self::Aac => "aac",
            Self::Wma => "wma",
            Self::Other(ext) => ext,
        }
    }

    /// Whether this is one of the [`SUPPORTED`](Self::SUPPORTED) formats.
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    /// MIME type used when serving a converted file.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::Wav => "audio/wav",
            Self::Ogg => "audio/ogg",
            Self::Flac => "audio/flac",
            Self::M4a => "audio/mp4",
            Self::Aac => "audio/aac",
            Self::Wma => "audio/x-ms-wma",
            Self::Other(_) => "application/octet-stream",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for AudioFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ext = s.trim().trim_start_matches('.').to_ascii_lowercase();
        if ext.is_empty() {
            return Err(Error::Validation("format must not be empty".into()));
        }
        // The extension becomes part of a file name on disk.
        if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::Validation(format!("invalid format '{s}'")));
        }

        Ok(match ext.as_str() {
            "mp3" => Self::Mp3,
            "wav" => Self::Wav,
            "ogg" => Self::Ogg,
            "flac" => Self::Flac,
            "m4a" => Self::M4a,
            "aac" => Self::Aac,
            "wma" => Self::Wma,
            _ => Self::Other(ext),
        })
    }
}

impl TryFrom<String> for AudioFormat {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AudioFormat> for String {
    fn from(format: AudioFormat) -> Self {
        format.extension().to_string()
    }
}
