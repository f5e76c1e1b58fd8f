pub mod marker;
pub mod output;
pub mod progress;
pub mod table;
pub mod theme;

pub use marker::Marker;
pub use output::{
    dim, error, file_failed, file_indexed, header, info, muted, path, section, success,
    summary_row, symbol_name, warn, watching,
};
pub use progress::IndexProgress;
pub use table::{TableBuilder, locations_table, stats_table, symbols_table};
pub use theme::{Theme, theme};
