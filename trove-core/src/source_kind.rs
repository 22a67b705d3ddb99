//! Selection of the item source implementation.

use serde::{Deserialize, Serialize};

/// Which kind of item source backs the library.
///
/// Both kinds expose the same item shape; only the origin differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// `<id>.info/` directories on local disk
    #[default]
    Directory,
    /// Remote catalog API
    Catalog,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Directory => "directory",
            Self::Catalog => "catalog",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "directory" | "dir" => Ok(Self::Directory),
            "catalog" | "remote" => Ok(Self::Catalog),
            _ => Err(format!(
                "Invalid source kind: '{s}'. Valid options are: directory, catalog"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("dir".parse::<SourceKind>(), Ok(SourceKind::Directory));
        assert_eq!("Directory".parse::<SourceKind>(), Ok(SourceKind::Directory));
        assert_eq!("remote".parse::<SourceKind>(), Ok(SourceKind::Catalog));
        assert_eq!(" CATALOG ".parse::<SourceKind>(), Ok(SourceKind::Catalog));
        assert!("ftp".parse::<SourceKind>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for kind in [SourceKind::Directory, SourceKind::Catalog] {
            assert_eq!(kind.to_string().parse::<SourceKind>(), Ok(kind));
        }
        assert_eq!(SourceKind::default(), SourceKind::Directory);
    }
}
