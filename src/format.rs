use std::path::Path;

/// Source format of a subtitle file, resolved once from its file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleFormat {
    Srt,
    AssSsa,
    Vtt,
    Unknown,
}

impl SubtitleFormat {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "srt" => SubtitleFormat::Srt,
            "ass" | "ssa" => SubtitleFormat::AssSsa,
            "vtt" => SubtitleFormat::Vtt,
            _ => SubtitleFormat::Unknown,
        }
    }

    pub fn from_filename<P: AsRef<Path>>(filename: P) -> Self {
        filename
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(SubtitleFormat::Unknown, Self::from_extension)
    }
}
