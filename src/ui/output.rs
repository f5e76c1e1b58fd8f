use crate::ui::{Marker, theme};
use owo_colors::OwoColorize;
use std::path::Path;

pub fn header(text: &str) {
    println!("{} {}", Marker::Start, text.style(theme().heading));
}

pub fn success(label: &str) {
    println!("{} {}", Marker::Done, label.style(theme().ok));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Marker::Failed, label.style(theme().failure));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Marker::Caution, label.style(theme().caution));
}

pub fn info(label: &str, value: &str) {
    println!(
        "{} {}: {}",
        Marker::Note.glyph().style(theme().label),
        label.style(theme().faint),
        value
    );
}

pub fn section(title: &str) {
    println!();
    println!("━{}━", title.style(theme().heading));
}

pub fn dim(text: &str) -> String {
    text.style(theme().faint).to_string()
}

pub fn muted(text: &str) -> String {
    text.style(theme().aside).to_string()
}

pub fn symbol_name(name: &str) -> String {
    name.style(theme().symbol).to_string()
}

pub fn path(path: &Path) -> String {
    path.display().style(theme().path).to_string()
}

/// A file was (re)indexed while watching
pub fn file_indexed(file: &Path, symbols: usize) {
    println!(
        "{} {} {}",
        Marker::Reindexed.glyph().style(theme().caution),
        path(file),
        muted(&format!("({} symbols)", symbols))
    );
}

pub fn file_failed(file: &Path, message: &str) {
    eprintln!(
        "{} {} {}",
        Marker::Failed.glyph().style(theme().failure),
        path(file),
        dim(message)
    );
}

pub fn watching(files: usize) {
    println!(
        "{} Watching {} files for changes {}",
        Marker::Watching,
        files,
        muted("(Ctrl-C to stop)")
    );
}

pub fn summary_row(label: &str, value: &str) {
    println!("  {} {}", label.style(theme().faint), value);
}
