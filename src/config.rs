//! Configuration files
//!
//! `symdex.toml` holds indexer settings; a project file lists the project
//! parts to index as `[[project_parts]]` tables.

use crate::project::ProjectPartConfiguration;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_DEBOUNCE_MS: u64 = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Index database file
    pub database: PathBuf,
    /// Parallel collectors; the number of CPUs when unset
    pub concurrency: Option<usize>,
    pub watch_debounce_ms: u64,
    /// Filter directive used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            database: default_database_path_in(Path::new(".")),
            concurrency: None,
            watch_debounce_ms: DEFAULT_DEBOUNCE_MS,
            log_level: "info".to_string(),
        }
    }
}

impl IndexerConfig {
    pub fn concurrency(&self) -> usize {
        self.concurrency
            .filter(|n| *n > 0)
            .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
            .unwrap_or(1)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.watch_debounce_ms)
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("symdex.toml")
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join(".symdex").join("index.db")
}

/// Load the config file; `None` when it does not exist
pub fn load_config(path: Option<&Path>) -> Result<Option<IndexerConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: IndexerConfig =
        toml::from_str(&contents).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &IndexerConfig, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(Error::Config(format!(
            "config already exists at {} (use --force to overwrite)",
            path.display()
        )));
    }

    let contents = toml::to_string_pretty(config).map_err(|e| Error::Config(e.to_string()))?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectFile {
    #[serde(default)]
    pub project_parts: Vec<ProjectPartConfiguration>,
}

/// Load a project file. Relative file and include paths are taken relative
/// to the directory of the project file.
pub fn load_project(path: &Path) -> Result<Vec<ProjectPartConfiguration>> {
    let contents = std::fs::read_to_string(path)?;
    let project: ProjectFile =
        toml::from_str(&contents).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

    let base = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::path::absolute(parent)?,
        _ => std::env::current_dir()?,
    };
    let resolve = |p: PathBuf| {
        if p.is_relative() && !p.as_os_str().is_empty() { base.join(p) } else { p }
    };

    Ok(project
        .project_parts
        .into_iter()
        .map(|mut part| {
            part.files = part.files.into_iter().map(resolve).collect();
            part.include_paths = part.include_paths.into_iter().map(resolve).collect();
            part
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("symdex.toml");
        assert!(load_config(Some(&path)).unwrap().is_none());

        let config = IndexerConfig {
            concurrency: Some(3),
            ..IndexerConfig::default()
        };
        write_config(&path, &config, false).unwrap();
        assert!(write_config(&path, &config, false).is_err());

        let loaded = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.concurrency(), 3);
        assert_eq!(loaded.debounce(), Duration::from_millis(20));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("symdex.toml");
        std::fs::write(&path, "watch_debounce_ms = 50\n").unwrap();

        let config = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(config.watch_debounce_ms, 50);
        assert_eq!(config.log_level, "info");
        assert!(config.concurrency() >= 1);

        std::fs::write(&path, "watch_debounce_ms = \"soon\"\n").unwrap();
        assert!(matches!(load_config(Some(&path)), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_project_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.toml");
        std::fs::write(
            &path,
            r#"
[[project_parts]]
id = "core"
files = ["src/a.c", "/abs/b.c"]
arguments = ["-std=c11"]
include_paths = ["include"]
macros = [{ name = "NDEBUG" }]

[[project_parts]]
id = "tests"
files = ["tests/t.c"]
"#,
        )
        .unwrap();

        let parts = load_project(&path).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].files[0], dir.path().join("src/a.c"));
        assert_eq!(parts[0].files[1], PathBuf::from("/abs/b.c"));
        assert_eq!(parts[0].include_paths[0], dir.path().join("include"));
        assert_eq!(parts[0].macros[0].name, "NDEBUG");
        assert!(parts[1].arguments.is_empty());
        parts[0].validate().unwrap();
    }

    #[test]
    fn test_ensure_db_dir() {
        let dir = tempfile::tempdir().unwrap();
        let db = default_database_path_in(dir.path());
        ensure_db_dir(&db).unwrap();
        assert!(dir.path().join(".symdex").is_dir());
    }
}
