use std::path::Path;

/// File types the engine can read and write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileFormat {
    Puz,
    Txt,
    Json,
    /// Crossword Compiler XML, read only.
    Jpz,
}

impl FileFormat {
    pub const ALL: [FileFormat; 4] = [
        FileFormat::Puz,
        FileFormat::Txt,
        FileFormat::Json,
        FileFormat::Jpz,
    ];

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "puz" => Some(FileFormat::Puz),
            "txt" => Some(FileFormat::Txt),
            "json" => Some(FileFormat::Json),
            "jpz" => Some(FileFormat::Jpz),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    pub fn extension(self) -> &'static str {
        match self {
            FileFormat::Puz => "puz",
            FileFormat::Txt => "txt",
            FileFormat::Json => "json",
            FileFormat::Jpz => "jpz",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            FileFormat::Puz => "Across Lite Format",
            FileFormat::Txt => "Across Lite Text",
            FileFormat::Json => "Puzzle Snapshot",
            FileFormat::Jpz => "Crossword Compiler",
        }
    }

    pub fn can_load(self) -> bool {
        true
    }

    pub fn can_save(self) -> bool {
        self != FileFormat::Jpz
    }
}

/// `(description, pattern)` pairs for file dialogs, e.g. `("Across Lite Format", "*.puz")`.
pub fn file_filters() -> Vec<(&'static str, String)> {
    FileFormat::ALL
        .iter()
        .map(|format| (format.description(), format!("*.{}", format.extension())))
        .collect()
}
