use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::parser::Language;

/// How finely documents are cut into matchable units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeGranularity {
    /// The whole document is one unit.
    File,
    /// Each non-blank line is a unit.
    Line,
    /// Syntax-aware units: declarations and the statements inside
    /// them. Requires a configured language.
    #[default]
    Declaration,
}

impl fmt::Display for MergeGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeGranularity::File => write!(f, "file"),
            MergeGranularity::Line => write!(f, "line"),
            MergeGranularity::Declaration => write!(f, "declaration"),
        }
    }
}

impl FromStr for MergeGranularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "file" => Ok(MergeGranularity::File),
            "line" => Ok(MergeGranularity::Line),
            "declaration" => Ok(MergeGranularity::Declaration),
            other => Err(format!("unknown granularity: {other}")),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub granularity: MergeGranularity,
    #[serde(default)]
    pub language: Option<Language>,
    #[serde(default)]
    pub history: HistorySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySettings {
    /// Revision the previous generation's inputs are read from.
    #[serde(default = "default_revision")]
    pub revision: String,
    /// Repository root for history lookups; the current directory
    /// when unset.
    #[serde(default)]
    pub repo_root: Option<PathBuf>,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            revision: default_revision(),
            repo_root: None,
        }
    }
}

fn default_revision() -> String {
    "HEAD".into()
}

impl Settings {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_settings_fill_in_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"language": "java"}"#).unwrap();
        assert_eq!(settings.granularity, MergeGranularity::Declaration);
        assert_eq!(settings.language, Some(Language::Java));
        assert_eq!(settings.history.revision, "HEAD");
        assert_eq!(settings.history.repo_root, None);
    }

    #[test]
    fn settings_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let mut settings = Settings::default();
        settings.granularity = MergeGranularity::Line;
        settings.history.revision = "HEAD~1".into();
        settings.save(&path).unwrap();
        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded.granularity, MergeGranularity::Line);
        assert_eq!(loaded.history.revision, "HEAD~1");
    }

    #[test]
    fn granularity_parses_its_display_form() {
        for g in [
            MergeGranularity::File,
            MergeGranularity::Line,
            MergeGranularity::Declaration,
        ] {
            assert_eq!(g.to_string().parse::<MergeGranularity>(), Ok(g));
        }
        assert!("word".parse::<MergeGranularity>().is_err());
    }
}
