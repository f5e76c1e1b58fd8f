//! Database schema definitions

/// SQL to create the sources table (path interning)
pub const CREATE_SOURCES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS sources (
    source_id INTEGER PRIMARY KEY,
    path TEXT NOT NULL UNIQUE
)
"#;

/// SQL to create the project parts table
/// `arguments` holds the compile arguments as a JSON array
pub const CREATE_PROJECT_PARTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS project_parts (
    project_part_id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    arguments TEXT NOT NULL
)
"#;

/// SQL to create the file membership table; a file belongs to one part
pub const CREATE_PROJECT_PART_SOURCES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS project_part_sources (
    source_id INTEGER PRIMARY KEY REFERENCES sources(source_id),
    project_part_id INTEGER NOT NULL REFERENCES project_parts(project_part_id) ON DELETE CASCADE
)
"#;

/// SQL to create the file statuses table
/// Status and digest are recorded when a file's results are applied
pub const CREATE_FILE_STATUSES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS file_statuses (
    source_id INTEGER PRIMARY KEY REFERENCES sources(source_id),
    project_part_id INTEGER NOT NULL REFERENCES project_parts(project_part_id) ON DELETE CASCADE,
    size INTEGER NOT NULL,
    last_modified INTEGER NOT NULL,
    results_digest TEXT NOT NULL
)
"#;

/// SQL to create the symbols table
pub const CREATE_SYMBOLS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS symbols (
    symbol_id INTEGER PRIMARY KEY AUTOINCREMENT,
    usr TEXT NOT NULL,
    name TEXT NOT NULL,
    kind TEXT NOT NULL,
    source_id INTEGER NOT NULL REFERENCES sources(source_id),
    project_part_id INTEGER NOT NULL REFERENCES project_parts(project_part_id) ON DELETE CASCADE
)
"#;

/// SQL to create the locations table
pub const CREATE_LOCATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS locations (
    symbol_id INTEGER NOT NULL REFERENCES symbols(symbol_id) ON DELETE CASCADE,
    source_id INTEGER NOT NULL REFERENCES sources(source_id),
    line INTEGER NOT NULL,
    col INTEGER NOT NULL,
    role TEXT NOT NULL
)
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_project_part_sources_part ON project_part_sources(project_part_id)",
    "CREATE INDEX IF NOT EXISTS idx_symbols_source ON symbols(source_id)",
    "CREATE INDEX IF NOT EXISTS idx_symbols_name ON symbols(name)",
    "CREATE INDEX IF NOT EXISTS idx_symbols_part ON symbols(project_part_id)",
    "CREATE INDEX IF NOT EXISTS idx_locations_symbol ON locations(symbol_id)",
    "CREATE INDEX IF NOT EXISTS idx_locations_source ON locations(source_id)",
];

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![
        CREATE_SOURCES_TABLE,
        CREATE_PROJECT_PARTS_TABLE,
        CREATE_PROJECT_PART_SOURCES_TABLE,
        CREATE_FILE_STATUSES_TABLE,
        CREATE_SYMBOLS_TABLE,
        CREATE_LOCATIONS_TABLE,
    ];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}
