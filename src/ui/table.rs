use crate::symbol::{LocationRecord, SymbolRecord};
use std::path::PathBuf;
use tabled::{Table, Tabled, settings::Style};

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Default)]
pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row(&mut self, label: &str, value: &str) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }
        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

pub fn stats_table(stats: &[(&str, String)]) -> String {
    let mut builder = TableBuilder::new();
    for (label, value) in stats {
        builder.add_row(label, value);
    }
    builder.build()
}

#[derive(Tabled)]
struct SymbolRow {
    #[tabled(rename = "Id")]
    id: i64,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Key")]
    usr: String,
    #[tabled(rename = "Part")]
    part: String,
}

pub fn symbols_table(symbols: &[SymbolRecord]) -> String {
    let rows: Vec<SymbolRow> = symbols
        .iter()
        .map(|s| SymbolRow {
            id: s.id.0,
            kind: s.kind.to_string(),
            name: s.name.clone(),
            usr: s.usr.clone(),
            part: s.project_part.to_string(),
        })
        .collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

#[derive(Tabled)]
struct LocationRow {
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Line")]
    line: u32,
    #[tabled(rename = "Column")]
    column: u32,
}

/// Locations with the resolved path of their file
pub fn locations_table(locations: &[(LocationRecord, PathBuf)]) -> String {
    let rows: Vec<LocationRow> = locations
        .iter()
        .map(|(location, path)| LocationRow {
            role: location.role.to_string(),
            file: path.display().to_string(),
            line: location.line,
            column: location.column,
        })
        .collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filepath::FileId;
    use crate::project::ProjectPartId;
    use crate::symbol::{LocationRole, SymbolId, SymbolKind};

    #[test]
    fn test_stats_table() {
        assert!(stats_table(&[]).is_empty());
        let table = stats_table(&[("Symbols", "12".to_string())]);
        assert!(table.contains("Metric"));
        assert!(table.contains("Symbols"));
        assert!(table.contains("12"));
    }

    #[test]
    fn test_symbol_and_location_tables() {
        let symbol = SymbolRecord {
            id: SymbolId(4),
            usr: "c++:geo::Point".to_string(),
            kind: SymbolKind::Container,
            name: "Point".to_string(),
            file: FileId(1),
            project_part: ProjectPartId::new("core"),
        };
        let table = symbols_table(&[symbol]);
        assert!(table.contains("c++:geo::Point"));
        assert!(table.contains("core"));

        let location = LocationRecord {
            symbol_id: SymbolId(4),
            file: FileId(1),
            line: 2,
            column: 8,
            role: LocationRole::Definition,
        };
        let table = locations_table(&[(location, PathBuf::from("/src/geo.h"))]);
        assert!(table.contains("/src/geo.h"));
        assert!(table.contains("definition"));
    }
}
