//! Known seismic file types and file-name based detection.

use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

/// A seismic data file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    /// SAC binary time series, one channel per file.
    Sac,
    /// SEED / miniSEED data records.
    Seed,
    /// Seisan event file (Fortran unformatted).
    Seisan,
    /// Two-column text as exported from Matlab.
    Text,
    Unknown,
}

struct Entry {
    file_type: FileType,
    extension: &'static str,
    pattern: &'static str,
    description: &'static str,
}

/// Detection order. The first matching pattern wins.
const TABLE: [Entry; 5] = [
    Entry {
        file_type: FileType::Sac,
        extension: ".sac",
        pattern: r".*[_\.](sac|SAC)",
        description: "SAC file",
    },
    Entry {
        file_type: FileType::Seed,
        extension: ".mseed",
        pattern: r".*\.m?seed",
        description: "SEED/miniSEED file",
    },
    Entry {
        file_type: FileType::Seisan,
        extension: ".seisan",
        pattern: r".*\.(seisan)",
        description: "Seisan file",
    },
    Entry {
        file_type: FileType::Text,
        extension: ".txt",
        pattern: r".*\.(txt|mat)",
        description: "Matlab-readable text file",
    },
    Entry {
        file_type: FileType::Unknown,
        extension: ".unknown",
        pattern: r".ukn",
        description: "Unknown file type",
    },
];

static PATTERNS: LazyLock<Vec<(FileType, Regex)>> = LazyLock::new(|| {
    TABLE
        .iter()
        .map(|e| {
            // Anchored: the whole name must match, not a substring.
            let re = Regex::new(&format!("^(?:{})$", e.pattern))
                .unwrap_or_else(|err| panic!("bad pattern for {:?}: {err}", e.file_type));
            (e.file_type, re)
        })
        .collect()
});

impl FileType {
    /// Classify a file name. Matching is case-insensitive.
    pub fn from_file_name(name: &str) -> Self {
        let name = name.to_lowercase();
        PATTERNS
            .iter()
            .find(|(_, re)| re.is_match(&name))
            .map(|(t, _)| *t)
            .unwrap_or(FileType::Unknown)
    }

    pub fn from_path(path: &Path) -> Self {
        Self::from_file_name(&path.to_string_lossy())
    }

    fn entry(self) -> &'static Entry {
        TABLE
            .iter()
            .find(|e| e.file_type == self)
            .unwrap_or(&TABLE[TABLE.len() - 1])
    }

    /// Canonical file extension, including the dot.
    pub fn extension(self) -> &'static str {
        self.entry().extension
    }

    /// Detection pattern as written in the format table.
    pub fn pattern(self) -> &'static str {
        self.entry().pattern
    }

    pub fn description(self) -> &'static str {
        self.entry().description
    }

    /// Prefix used in group names (`"<tag>^<path>"`).
    pub fn tag(self) -> &'static str {
        match self {
            Self::Sac => "SAC",
            Self::Seed => "SEED",
            Self::Seisan => "Seisan",
            Self::Text => "TXT",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_each_format() {
        assert_eq!(FileType::from_file_name("quake.mseed"), FileType::Seed);
        assert_eq!(FileType::from_file_name("quake.seed"), FileType::Seed);
        assert_eq!(FileType::from_file_name("x.SAC"), FileType::Sac);
        assert_eq!(FileType::from_file_name("ANMO_BHZ_sac"), FileType::Sac);
        assert_eq!(
            FileType::from_file_name("2024-01-01-0000-00S.seisan"),
            FileType::Seisan
        );
        assert_eq!(FileType::from_file_name("trace.txt"), FileType::Text);
        assert_eq!(FileType::from_file_name("trace.MAT"), FileType::Text);
    }

    #[test]
    fn test_unknown() {
        assert_eq!(FileType::from_file_name("readme.md"), FileType::Unknown);
        assert_eq!(FileType::from_file_name(""), FileType::Unknown);
    }

    #[test]
    fn test_whole_name_match() {
        // Extension must end the name.
        assert_eq!(FileType::from_file_name("a.mseed.bak"), FileType::Unknown);
        assert_eq!(FileType::from_file_name("sacfile"), FileType::Unknown);
    }

    #[test]
    fn test_path_with_directories() {
        let path = Path::new("/data/2024/IU.ANMO.mseed");
        assert_eq!(FileType::from_path(path), FileType::Seed);
    }

    #[test]
    fn test_table_metadata() {
        assert_eq!(FileType::Seed.extension(), ".mseed");
        assert_eq!(FileType::Sac.description(), "SAC file");
        assert_eq!(FileType::Seisan.tag(), "Seisan");
        assert_eq!(FileType::Text.pattern(), r".*\.(txt|mat)");
        assert_eq!(format!("{}", FileType::Unknown), "Unknown file type");
    }
}
