//! Script directory source adapter.
//!
//! The batch scraper deposits raw `.pine` files under one subdirectory
//! per category; this adapter is the backlog view over that tree. The
//! file stem is the script name (the scraper already slugs it).

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::domain::error::PinerankError;
use crate::domain::work_item::{FetchedSource, SourceLocator, slugify};
use crate::ports::config_port::ConfigPort;
use crate::ports::source_port::SourcePort;

const SCRIPT_EXTENSION: &str = "pine";

#[derive(Debug)]
pub struct ScriptDirAdapter {
    base_path: PathBuf,
}

impl ScriptDirAdapter {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PinerankError> {
        let dir = config.get_string("pipeline", "source_dir").ok_or_else(|| {
            PinerankError::ConfigMissing {
                section: "pipeline".into(),
                key: "source_dir".into(),
            }
        })?;
        Ok(Self::new(dir))
    }

    /// List backlog entries, newest categories and names in stable sorted
    /// order. `category` restricts the walk to one subdirectory.
    pub fn discover(&self, category: Option<&str>) -> Result<Vec<SourceLocator>, PinerankError> {
        let mut categories: Vec<PathBuf> = Vec::new();
        match category {
            Some(name) => categories.push(self.base_path.join(name)),
            None => {
                let entries =
                    fs::read_dir(&self.base_path).map_err(|e| PinerankError::Fetch {
                        locator: self.base_path.display().to_string(),
                        reason: e.to_string(),
                    })?;
                for entry in entries {
                    let entry = entry.map_err(|e| PinerankError::Fetch {
                        locator: self.base_path.display().to_string(),
                        reason: e.to_string(),
                    })?;
                    if entry.path().is_dir() {
                        categories.push(entry.path());
                    }
                }
                categories.sort();
            }
        }

        let mut sources = Vec::new();
        for category_dir in categories {
            let category_name = category_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let entries = match fs::read_dir(&category_dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(PinerankError::Fetch {
                        locator: category_dir.display().to_string(),
                        reason: e.to_string(),
                    });
                }
            };

            let mut files: Vec<PathBuf> = Vec::new();
            for entry in entries {
                let entry = entry.map_err(|e| PinerankError::Fetch {
                    locator: category_dir.display().to_string(),
                    reason: e.to_string(),
                })?;
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == SCRIPT_EXTENSION) {
                    files.push(path);
                }
            }
            files.sort();

            for path in files {
                let name = path
                    .file_stem()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                sources.push(SourceLocator::new(
                    path.display().to_string(),
                    name,
                    category_name.clone(),
                ));
            }
        }

        Ok(sources)
    }
}

impl SourcePort for ScriptDirAdapter {
    fn fetch(&self, source: &SourceLocator) -> Result<FetchedSource, PinerankError> {
        let path = Path::new(&source.locator);
        let raw = fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => PinerankError::SourceNotFound {
                locator: source.locator.clone(),
            },
            ErrorKind::PermissionDenied => PinerankError::SourceAccessDenied {
                locator: source.locator.clone(),
                reason: e.to_string(),
            },
            _ => PinerankError::Fetch {
                locator: source.locator.clone(),
                reason: e.to_string(),
            },
        })?;

        // the scraper leaves non-breaking spaces in copied source
        let raw = raw.replace('\u{a0}', " ");

        Ok(FetchedSource {
            item_id: slugify(&source.name),
            name: source.name.clone(),
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seed_scripts() -> (TempDir, ScriptDirAdapter) {
        let dir = TempDir::new().unwrap();
        let base = dir.path();

        fs::create_dir_all(base.join("oscillators")).unwrap();
        fs::create_dir_all(base.join("trending")).unwrap();
        fs::write(
            base.join("oscillators/rsi-divergence.pine"),
            "//@version=5\nindicator(\"RSI Divergence\")\n",
        )
        .unwrap();
        fs::write(
            base.join("oscillators/stoch-cross.pine"),
            "//@version=5\nindicator(\"Stoch Cross\")\n",
        )
        .unwrap();
        fs::write(
            base.join("trending/twin-range.pine"),
            "//@version=5\nstrategy(\"Twin Range\")\n",
        )
        .unwrap();
        // non-script files are ignored
        fs::write(base.join("trending/notes.txt"), "not a script").unwrap();

        let adapter = ScriptDirAdapter::new(base);
        (dir, adapter)
    }

    #[test]
    fn discover_walks_all_categories_sorted() {
        let (_dir, adapter) = seed_scripts();
        let sources = adapter.discover(None).unwrap();
        let names: Vec<&str> = sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["rsi-divergence", "stoch-cross", "twin-range"]);
        assert_eq!(sources[0].category, "oscillators");
        assert_eq!(sources[2].category, "trending");
    }

    #[test]
    fn discover_filters_by_category() {
        let (_dir, adapter) = seed_scripts();
        let sources = adapter.discover(Some("trending")).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name, "twin-range");
    }

    #[test]
    fn discover_missing_category_is_empty() {
        let (_dir, adapter) = seed_scripts();
        let sources = adapter.discover(Some("volume")).unwrap();
        assert!(sources.is_empty());
    }

    #[test]
    fn fetch_reads_source_and_normalizes_nbsp() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("top")).unwrap();
        let path = dir.path().join("top/gap-finder.pine");
        fs::write(&path, "plot(close)\u{a0}// nbsp").unwrap();

        let adapter = ScriptDirAdapter::new(dir.path());
        let source = SourceLocator::new(path.display().to_string(), "gap-finder", "top");
        let fetched = adapter.fetch(&source).unwrap();

        assert_eq!(fetched.item_id, "gap-finder");
        assert_eq!(fetched.raw, "plot(close) // nbsp");
    }

    #[test]
    fn fetch_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let adapter = ScriptDirAdapter::new(dir.path());
        let source = SourceLocator::new(
            dir.path().join("gone.pine").display().to_string(),
            "gone",
            "top",
        );
        match adapter.fetch(&source) {
            Err(PinerankError::SourceNotFound { .. }) => {}
            other => panic!("expected SourceNotFound, got {other:?}"),
        }
    }

    #[test]
    fn from_config_requires_source_dir() {
        struct EmptyConfig;
        impl ConfigPort for EmptyConfig {
            fn get_string(&self, _section: &str, _key: &str) -> Option<String> {
                None
            }
            fn get_int(&self, _section: &str, _key: &str, default: i64) -> i64 {
                default
            }
            fn get_double(&self, _section: &str, _key: &str, default: f64) -> f64 {
                default
            }
            fn get_bool(&self, _section: &str, _key: &str, default: bool) -> bool {
                default
            }
        }

        match ScriptDirAdapter::from_config(&EmptyConfig) {
            Err(PinerankError::ConfigMissing { section, key }) => {
                assert_eq!(section, "pipeline");
                assert_eq!(key, "source_dir");
            }
            other => panic!("expected ConfigMissing, got {other:?}"),
        }
    }
}
