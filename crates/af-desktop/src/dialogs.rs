//! File dialog descriptions.
//!
//! Toolkit-neutral: a front-end turns these into its native open/save
//! dialogs.

use af_core::AudioFormat;

/// One entry in a dialog's file type list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFilter {
    pub label: String,
    /// Glob patterns such as `*.mp3`.
    pub patterns: Vec<String>,
}

impl FileFilter {
    /// Whether `file_name` matches one of the patterns (case-insensitive).
    pub fn matches(&self, file_name: &str) -> bool {
        let lower = file_name.to_ascii_lowercase();
        self.patterns.iter().any(|p| match p.strip_prefix("*.") {
            Some("*") => true,
            Some(ext) => lower
                .rsplit_once('.')
                .is_some_and(|(_, e)| e == ext.to_ascii_lowercase()),
            None => p == "*" || lower == p.to_ascii_lowercase(),
        })
    }
}

/// Filters for picking the input file: all supported audio, then anything.
pub fn open_filter() -> Vec<FileFilter> {
    vec![
        FileFilter {
            label: "Audio Files".to_string(),
            patterns: AudioFormat::SUPPORTED
                .iter()
                .map(|f| format!("*.{}", f.extension()))
                .collect(),
        },
        FileFilter {
            label: "All Files".to_string(),
            patterns: vec!["*.*".to_string()],
        },
    ]
}

/// Save dialog settings for a target format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveDialog {
    /// Extension appended when the user types a bare name, with the dot.
    pub default_extension: String,
    pub filters: Vec<FileFilter>,
}

pub fn save_filter(format: &AudioFormat) -> SaveDialog {
    let ext = format.extension();
    SaveDialog {
        default_extension: format!(".{ext}"),
        filters: vec![FileFilter {
            label: format!("{} Audio", ext.to_ascii_uppercase()),
            patterns: vec![format!("*.{ext}")],
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_filter_lists_supported_formats() {
        let filters = open_filter();
        assert_eq!(filters[0].label, "Audio Files");
        assert_eq!(
            filters[0].patterns,
            ["*.mp3", "*.wav", "*.ogg", "*.flac", "*.m4a", "*.aac", "*.wma"]
        );
        assert!(filters[0].matches("Track.FLAC"));
        assert!(!filters[0].matches("notes.txt"));
        assert!(filters[1].matches("notes.txt"));
    }

    #[test]
    fn save_filter_uses_target() {
        let dialog = save_filter(&AudioFormat::Ogg);
        assert_eq!(dialog.default_extension, ".ogg");
        assert_eq!(dialog.filters[0].label, "OGG Audio");
        assert!(dialog.filters[0].matches("out.ogg"));
        assert!(!dialog.filters[0].matches("out.mp3"));
    }
}
