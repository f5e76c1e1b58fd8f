//! Symbol and location records
//!
//! All languages are mapped into four universal symbol kinds:
//! - `Namespace`: namespace, module, package
//! - `Container`: class, struct, enum, trait
//! - `Callable`: function, method, function-like macro
//! - `Value`: field, variable, constant, object-like macro
//!
//! Collectors produce [`CollectedSymbols`]; storage turns them into
//! [`SymbolRecord`]s and [`LocationRecord`]s with storage-assigned ids.

use crate::filepath::FileId;
use crate::project::ProjectPartId;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Universal symbol kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    /// Namespace, module, package - the organizational unit
    Namespace,
    /// Class, struct, enum, trait - types that contain other symbols
    Container,
    /// Function, method, function-like macro - executable code
    Callable,
    /// Field, variable, constant - data holders
    Value,
}

impl SymbolKind {
    /// Get the string representation of the symbol kind
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Namespace => "namespace",
            SymbolKind::Container => "container",
            SymbolKind::Callable => "callable",
            SymbolKind::Value => "value",
        }
    }

    /// Get all symbol kinds
    pub fn all() -> &'static [SymbolKind] {
        &[
            SymbolKind::Namespace,
            SymbolKind::Container,
            SymbolKind::Callable,
            SymbolKind::Value,
        ]
    }
}

impl FromStr for SymbolKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "namespace" | "ns" | "module" | "package" => Ok(SymbolKind::Namespace),
            "container" | "class" | "struct" | "enum" | "trait" | "union" => Ok(SymbolKind::Container),
            "callable" | "function" | "method" | "fn" | "def" => Ok(SymbolKind::Callable),
            "value" | "field" | "variable" | "var" | "const" | "macro" => Ok(SymbolKind::Value),
            _ => Err(Error::Config(format!("Unknown symbol kind: {}", s))),
        }
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a location defines or references its symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationRole {
    Definition,
    Reference,
}

impl LocationRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationRole::Definition => "definition",
            LocationRole::Reference => "reference",
        }
    }
}

impl FromStr for LocationRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "definition" | "def" => Ok(LocationRole::Definition),
            "reference" | "ref" => Ok(LocationRole::Reference),
            _ => Err(Error::Config(format!("Unknown location role: {}", s))),
        }
    }
}

impl std::fmt::Display for LocationRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage-assigned symbol identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolId(pub i64);

impl std::fmt::Display for SymbolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A persisted symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRecord {
    pub id: SymbolId,
    /// Stable qualified key, unique within a file
    pub usr: String,
    pub kind: SymbolKind,
    /// Display name (just the identifier, not fully qualified)
    pub name: String,
    /// File that contains the symbol
    pub file: FileId,
    pub project_part: ProjectPartId,
}

/// A persisted source location of a symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub symbol_id: SymbolId,
    pub file: FileId,
    /// 1-indexed
    pub line: u32,
    /// 1-indexed
    pub column: u32,
    pub role: LocationRole,
}

/// A symbol as reported by a collector, before storage assigns an id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedSymbol {
    pub usr: String,
    pub kind: SymbolKind,
    pub name: String,
}

/// A location as reported by a collector
///
/// `symbol` indexes into [`CollectedSymbols::symbols`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedLocation {
    pub symbol: usize,
    pub line: u32,
    pub column: u32,
    pub role: LocationRole,
}

/// Output of one collector run for one file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectedSymbols {
    pub symbols: Vec<CollectedSymbol>,
    pub locations: Vec<CollectedLocation>,
}

impl CollectedSymbols {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a symbol, returning its index
    pub fn add_symbol(&mut self, usr: impl Into<String>, kind: SymbolKind, name: impl Into<String>) -> usize {
        self.symbols.push(CollectedSymbol {
            usr: usr.into(),
            kind,
            name: name.into(),
        });
        self.symbols.len() - 1
    }

    pub fn add_location(&mut self, symbol: usize, line: u32, column: u32, role: LocationRole) {
        self.locations.push(CollectedLocation {
            symbol,
            line,
            column,
            role,
        });
    }

    /// Find the index of a symbol by its usr
    pub fn symbol_index(&self, usr: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s.usr == usr)
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Content digest; equal result sets hash equal
    pub fn digest(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for symbol in &self.symbols {
            hasher.update(symbol.usr.as_bytes());
            hasher.update(&[0]);
            hasher.update(symbol.kind.as_str().as_bytes());
            hasher.update(&[0]);
            hasher.update(symbol.name.as_bytes());
            hasher.update(&[1]);
        }
        for location in &self.locations {
            hasher.update(&(location.symbol as u64).to_le_bytes());
            hasher.update(&location.line.to_le_bytes());
            hasher.update(&location.column.to_le_bytes());
            hasher.update(location.role.as_str().as_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }
}
