//! Tree-sitter collector
//!
//! Extracts definitions and same-file references using tree-sitter grammars.
//! Symbol keys are qualified by the enclosing definitions, e.g.
//! `c++:geo::Point` or `rust:Counter::bump`.

use super::{GeneratedFiles, SymbolsCollector};
use super::languages::{IDENTIFIER_KINDS, SourceLanguage};
use crate::symbol::{CollectedSymbols, LocationRole, SymbolKind};
use crate::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tree_sitter::{Node, Parser};

/// Collector backed by tree-sitter parsers, one per language, created on demand
#[derive(Default)]
pub struct TreeSitterCollector {
    parsers: HashMap<SourceLanguage, Parser>,
    generated: GeneratedFiles,
}

impl TreeSitterCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_generated_files(generated: GeneratedFiles) -> Self {
        Self {
            parsers: HashMap::new(),
            generated,
        }
    }

    fn parser(&mut self, language: SourceLanguage) -> Result<&mut Parser> {
        if !self.parsers.contains_key(&language) {
            let mut parser = Parser::new();
            parser
                .set_language(&language.grammar())
                .map_err(|e| Error::Collector(format!("cannot load {} grammar: {}", language, e)))?;
            self.parsers.insert(language, parser);
        }
        self.parsers
            .get_mut(&language)
            .ok_or_else(|| Error::Collector(format!("no parser for {}", language)))
    }

    /// Collect symbols from in-memory source text
    pub fn collect_source(&mut self, language: SourceLanguage, path: &Path, source: &str) -> Result<CollectedSymbols> {
        let tree = self
            .parser(language)?
            .parse(source, None)
            .ok_or_else(|| Error::parse(path, "parser produced no tree"))?;

        let root = tree.root_node();
        if root.has_error() {
            tracing::debug!(path = %path.display(), "syntax errors, indexing recoverable parts");
        }

        let mut extractor = Extractor {
            language,
            source: source.as_bytes(),
            results: CollectedSymbols::new(),
            by_name: HashMap::new(),
            definition_names: HashSet::new(),
        };
        let mut scope = Vec::new();
        extractor.collect_definitions(root, &mut scope);
        extractor.collect_references(root);
        Ok(extractor.results)
    }
}

impl SymbolsCollector for TreeSitterCollector {
    fn collect(&mut self, path: &Path, arguments: &[String]) -> Result<CollectedSymbols> {
        let language = SourceLanguage::from_arguments(arguments)
            .or_else(|| SourceLanguage::from_path(path))
            .ok_or_else(|| Error::parse(path, "unsupported source language"))?;

        if let Some(content) = self.generated.content(path) {
            return self.collect_source(language, path, &content);
        }
        let source = std::fs::read_to_string(path).map_err(|e| Error::parse(path, e.to_string()))?;
        self.collect_source(language, path, &source)
    }
}

struct Extractor<'s> {
    language: SourceLanguage,
    source: &'s [u8],
    results: CollectedSymbols,
    /// First symbol defined under each display name
    by_name: HashMap<String, usize>,
    /// Start bytes of identifier nodes that name a definition
    definition_names: HashSet<usize>,
}

impl<'s> Extractor<'s> {
    fn text(&self, node: Node) -> Option<&'s str> {
        node.utf8_text(self.source).ok()
    }

    fn collect_definitions(&mut self, node: Node, scope: &mut Vec<String>) {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();

        for child in children {
            let kind = child.kind();

            if let Some(symbol_kind) = self.language.definition_kind(kind) {
                let has_body = !self.language.requires_body(kind) || child.child_by_field_name("body").is_some();
                if let Some(name_node) = definition_name(child).filter(|_| has_body) {
                    if let Some(name) = self.text(name_node) {
                        self.add_definition(name_node, name, symbol_kind, scope);
                        scope.push(name.to_string());
                        self.collect_definitions(child, scope);
                        scope.pop();
                        continue;
                    }
                }
            } else if let Some(field) = self.language.scope_field(kind) {
                if let Some(name) = child.child_by_field_name(field).and_then(|n| self.text(n)) {
                    scope.push(name.to_string());
                    self.collect_definitions(child, scope);
                    scope.pop();
                    continue;
                }
            }

            self.collect_definitions(child, scope);
        }
    }

    fn add_definition(&mut self, name_node: Node, name: &str, kind: SymbolKind, scope: &[String]) {
        let qualified = if scope.is_empty() {
            name.to_string()
        } else {
            format!("{}::{}", scope.join("::"), name)
        };
        let usr = format!("{}:{}", self.language.usr_prefix(), qualified);

        // Declaration and definition of the same entity share one symbol
        let index = match self.results.symbol_index(&usr) {
            Some(index) => index,
            None => self.results.add_symbol(usr, kind, name),
        };
        let position = name_node.start_position();
        self.results.add_location(
            index,
            position.row as u32 + 1,
            position.column as u32 + 1,
            LocationRole::Definition,
        );
        self.by_name.entry(name.to_string()).or_insert(index);
        self.definition_names.insert(name_node.start_byte());
    }

    fn collect_references(&mut self, node: Node) {
        if IDENTIFIER_KINDS.contains(&node.kind()) && !self.definition_names.contains(&node.start_byte()) {
            let index = self.text(node).and_then(|name| self.by_name.get(name).copied());
            if let Some(index) = index {
                let position = node.start_position();
                self.results.add_location(
                    index,
                    position.row as u32 + 1,
                    position.column as u32 + 1,
                    LocationRole::Reference,
                );
            }
        }

        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        for child in children {
            self.collect_references(child);
        }
    }
}

/// Find the identifier naming a definition node.
///
/// Uses the `name` field when present, otherwise follows the chain of
/// `declarator` fields used by the C family grammars.
fn definition_name(node: Node) -> Option<Node> {
    if let Some(name) = node.child_by_field_name("name") {
        return innermost_name(name);
    }

    let mut current = node.child_by_field_name("declarator")?;
    loop {
        if let Some(name) = innermost_name(current) {
            return Some(name);
        }
        current = current.child_by_field_name("declarator")?;
    }
}

fn innermost_name(node: Node) -> Option<Node> {
    match node.kind() {
        "identifier" | "type_identifier" | "field_identifier" | "namespace_identifier"
        | "property_identifier" | "destructor_name" | "operator_name" => Some(node),
        "qualified_identifier" => innermost_name(node.child_by_field_name("name")?),
        _ => None,
    }
}
