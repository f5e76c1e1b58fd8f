//! Project part configuration
//!
//! A project part is one compilation unit configuration: its own file set,
//! flags, macros and include paths. The indexer only keeps read snapshots.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Identity of a project part
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectPartId(pub String);

impl ProjectPartId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProjectPartId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProjectPartId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A preprocessor macro definition (`-DNAME` or `-DNAME=VALUE`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerMacro {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl CompilerMacro {
    pub fn new(name: impl Into<String>, value: Option<&str>) -> Self {
        Self {
            name: name.into(),
            value: value.map(str::to_string),
        }
    }

    fn to_argument(&self) -> String {
        match &self.value {
            Some(value) => format!("-D{}={}", self.name, value),
            None => format!("-D{}", self.name),
        }
    }
}

/// Configuration of one project part
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectPartConfiguration {
    pub id: ProjectPartId,
    /// Ordered source files of the part
    pub files: Vec<PathBuf>,
    /// Raw compiler flags
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(default)]
    pub macros: Vec<CompilerMacro>,
    #[serde(default)]
    pub include_paths: Vec<PathBuf>,
}

impl ProjectPartConfiguration {
    pub fn new(id: impl Into<String>, files: Vec<PathBuf>) -> Self {
        Self {
            id: ProjectPartId::new(id),
            files,
            arguments: Vec::new(),
            macros: Vec::new(),
            include_paths: Vec::new(),
        }
    }

    pub fn with_arguments(mut self, arguments: &[&str]) -> Self {
        self.arguments = arguments.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_macro(mut self, name: &str, value: Option<&str>) -> Self {
        self.macros.push(CompilerMacro::new(name, value));
        self
    }

    pub fn with_include_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.include_paths.push(path.into());
        self
    }

    /// Compile arguments handed to the collector: flags, then macros, then include paths
    pub fn command_line(&self) -> Vec<String> {
        let mut args = self.arguments.clone();
        args.extend(self.macros.iter().map(CompilerMacro::to_argument));
        args.extend(
            self.include_paths
                .iter()
                .map(|p| format!("-I{}", p.display())),
        );
        args
    }

    /// Reject malformed parts before any task is created
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| Error::InvalidProjectPart {
            id: self.id.0.clone(),
            reason: reason.to_string(),
        };

        if self.id.0.trim().is_empty() {
            return Err(invalid("empty project part id"));
        }
        if let Some(file) = self.files.iter().find(|f| f.as_os_str().is_empty()) {
            return Err(invalid(&format!("empty file path {:?}", file)));
        }
        if let Some(file) = self.files.iter().find(|f| f.is_relative()) {
            return Err(invalid(&format!("file path {} is not absolute", file.display())));
        }
        if self.macros.iter().any(|m| m.name.trim().is_empty()) {
            return Err(invalid("macro without a name"));
        }
        Ok(())
    }
}
