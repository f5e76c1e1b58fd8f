//! Source languages understood by the tree-sitter collector
//!
//! Each language maps its grammar's definition node kinds onto the universal
//! [`SymbolKind`]s. The collector itself never looks at language-specific
//! node names.

use crate::symbol::SymbolKind;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceLanguage {
    C,
    Cpp,
    Rust,
    Python,
    JavaScript,
    Go,
}

/// Node kinds that can name or reference a symbol
pub const IDENTIFIER_KINDS: &[&str] = &[
    "identifier",
    "type_identifier",
    "field_identifier",
    "property_identifier",
    "namespace_identifier",
];

const C_DEFINITIONS: &[(&str, SymbolKind)] = &[
    ("function_definition", SymbolKind::Callable),
    ("struct_specifier", SymbolKind::Container),
    ("union_specifier", SymbolKind::Container),
    ("enum_specifier", SymbolKind::Container),
    ("type_definition", SymbolKind::Container),
    ("enumerator", SymbolKind::Value),
    ("preproc_def", SymbolKind::Value),
    ("preproc_function_def", SymbolKind::Callable),
];

const CPP_DEFINITIONS: &[(&str, SymbolKind)] = &[
    ("function_definition", SymbolKind::Callable),
    ("class_specifier", SymbolKind::Container),
    ("struct_specifier", SymbolKind::Container),
    ("union_specifier", SymbolKind::Container),
    ("enum_specifier", SymbolKind::Container),
    ("type_definition", SymbolKind::Container),
    ("alias_declaration", SymbolKind::Container),
    ("namespace_definition", SymbolKind::Namespace),
    ("enumerator", SymbolKind::Value),
    ("preproc_def", SymbolKind::Value),
    ("preproc_function_def", SymbolKind::Callable),
];

const RUST_DEFINITIONS: &[(&str, SymbolKind)] = &[
    ("function_item", SymbolKind::Callable),
    ("function_signature_item", SymbolKind::Callable),
    ("macro_definition", SymbolKind::Callable),
    ("struct_item", SymbolKind::Container),
    ("enum_item", SymbolKind::Container),
    ("union_item", SymbolKind::Container),
    ("trait_item", SymbolKind::Container),
    ("type_item", SymbolKind::Container),
    ("mod_item", SymbolKind::Namespace),
    ("const_item", SymbolKind::Value),
    ("static_item", SymbolKind::Value),
    ("enum_variant", SymbolKind::Value),
];

const PYTHON_DEFINITIONS: &[(&str, SymbolKind)] = &[
    ("function_definition", SymbolKind::Callable),
    ("class_definition", SymbolKind::Container),
];

const JAVASCRIPT_DEFINITIONS: &[(&str, SymbolKind)] = &[
    ("function_declaration", SymbolKind::Callable),
    ("generator_function_declaration", SymbolKind::Callable),
    ("method_definition", SymbolKind::Callable),
    ("class_declaration", SymbolKind::Container),
    ("variable_declarator", SymbolKind::Value),
];

const GO_DEFINITIONS: &[(&str, SymbolKind)] = &[
    ("function_declaration", SymbolKind::Callable),
    ("method_declaration", SymbolKind::Callable),
    ("type_spec", SymbolKind::Container),
    ("const_spec", SymbolKind::Value),
    ("var_spec", SymbolKind::Value),
];

impl SourceLanguage {
    pub fn all() -> &'static [SourceLanguage] {
        &[
            SourceLanguage::C,
            SourceLanguage::Cpp,
            SourceLanguage::Rust,
            SourceLanguage::Python,
            SourceLanguage::JavaScript,
            SourceLanguage::Go,
        ]
    }

    /// Prefix of the symbol keys produced for this language
    pub fn usr_prefix(&self) -> &'static str {
        match self {
            SourceLanguage::C => "c",
            SourceLanguage::Cpp => "c++",
            SourceLanguage::Rust => "rust",
            SourceLanguage::Python => "py",
            SourceLanguage::JavaScript => "js",
            SourceLanguage::Go => "go",
        }
    }

    pub fn file_extensions(&self) -> &'static [&'static str] {
        match self {
            SourceLanguage::C => &["c", "h"],
            SourceLanguage::Cpp => &["cc", "cpp", "cxx", "c++", "hpp", "hh", "hxx", "h++", "ipp", "tpp"],
            SourceLanguage::Rust => &["rs"],
            SourceLanguage::Python => &["py", "pyi"],
            SourceLanguage::JavaScript => &["js", "jsx", "mjs", "cjs"],
            SourceLanguage::Go => &["go"],
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|lang| lang.file_extensions().contains(&ext.as_str()))
    }

    /// Parse a `-x` style language name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "c" | "c-header" => Some(SourceLanguage::C),
            "c++" | "cpp" | "cxx" | "c++-header" | "objective-c++" => Some(SourceLanguage::Cpp),
            "rust" | "rs" => Some(SourceLanguage::Rust),
            "python" | "py" => Some(SourceLanguage::Python),
            "javascript" | "js" => Some(SourceLanguage::JavaScript),
            "go" => Some(SourceLanguage::Go),
            _ => None,
        }
    }

    /// Language requested by the compile arguments (`-x lang`, `-xlang`,
    /// `--language=lang`); the last one wins.
    pub fn from_arguments(arguments: &[String]) -> Option<Self> {
        let mut found = None;
        let mut args = arguments.iter();
        while let Some(arg) = args.next() {
            let name = if arg == "-x" {
                args.next().map(String::as_str)
            } else if let Some(name) = arg.strip_prefix("--language=") {
                Some(name)
            } else {
                arg.strip_prefix("-x").filter(|n| !n.is_empty())
            };
            if let Some(lang) = name.and_then(Self::from_name) {
                found = Some(lang);
            }
        }
        found
    }

    pub fn grammar(&self) -> tree_sitter::Language {
        match self {
            SourceLanguage::C => tree_sitter_c::LANGUAGE.into(),
            SourceLanguage::Cpp => tree_sitter_cpp::LANGUAGE.into(),
            SourceLanguage::Rust => tree_sitter_rust::LANGUAGE.into(),
            SourceLanguage::Python => tree_sitter_python::LANGUAGE.into(),
            SourceLanguage::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            SourceLanguage::Go => tree_sitter_go::LANGUAGE.into(),
        }
    }

    fn definitions(&self) -> &'static [(&'static str, SymbolKind)] {
        match self {
            SourceLanguage::C => C_DEFINITIONS,
            SourceLanguage::Cpp => CPP_DEFINITIONS,
            SourceLanguage::Rust => RUST_DEFINITIONS,
            SourceLanguage::Python => PYTHON_DEFINITIONS,
            SourceLanguage::JavaScript => JAVASCRIPT_DEFINITIONS,
            SourceLanguage::Go => GO_DEFINITIONS,
        }
    }

    /// Symbol kind of a definition node, if the node defines a symbol
    pub fn definition_kind(&self, node_kind: &str) -> Option<SymbolKind> {
        self.definitions()
            .iter()
            .find(|(kind, _)| *kind == node_kind)
            .map(|(_, symbol_kind)| *symbol_kind)
    }

    /// Nodes that open a named scope without defining a symbol, with the
    /// field holding the scope name
    pub fn scope_field(&self, node_kind: &str) -> Option<&'static str> {
        match (self, node_kind) {
            (SourceLanguage::Rust, "impl_item") => Some("type"),
            _ => None,
        }
    }

    /// Tag types (`struct foo`) only define a symbol when they carry a body
    pub fn requires_body(&self, node_kind: &str) -> bool {
        matches!(
            node_kind,
            "struct_specifier" | "union_specifier" | "enum_specifier" | "class_specifier"
        )
    }
}

impl std::fmt::Display for SourceLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SourceLanguage::C => "C",
            SourceLanguage::Cpp => "C++",
            SourceLanguage::Rust => "Rust",
            SourceLanguage::Python => "Python",
            SourceLanguage::JavaScript => "JavaScript",
            SourceLanguage::Go => "Go",
        };
        f.write_str(name)
    }
}
