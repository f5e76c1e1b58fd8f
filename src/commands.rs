use crate::{OutputMode, emit_success};
use anyhow::Context;
use owo_colors::OwoColorize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use symdex::config::{self, IndexerConfig};
use symdex::storage::{Database, SymbolStorage};
use symdex::ui::{
    IndexProgress, Marker, dim, header, info, locations_table, path, section, stats_table, success, summary_row,
    symbol_name, symbols_table, theme, warn, watching,
};
use symdex::{FilePathCache, FilePathCaching, ProjectPartId, SymbolId, SymbolIndexing};

pub fn run_index(config: &IndexerConfig, project: &Path, watch: bool, output_mode: OutputMode) -> anyhow::Result<()> {
    let parts = config::load_project(project)
        .with_context(|| format!("failed to load project file {}", project.display()))?;
    let started = Instant::now();
    let indexing = SymbolIndexing::open(config)?;

    // Parts that are no longer listed in the project file
    let listed: HashSet<&ProjectPartId> = parts.iter().map(|part| &part.id).collect();
    let dropped: Vec<ProjectPartId> = indexing
        .storage()
        .fetch_project_part_ids()?
        .into_iter()
        .filter(|id| !listed.contains(id))
        .collect();
    let dropped_files = if dropped.is_empty() {
        0
    } else {
        indexing.remove_project_parts(&dropped)?
    };

    if output_mode.is_human() {
        header(&format!("Indexing {}", project.display()));
        info("Database", &config.database.display().to_string());
        info("Project parts", &parts.len().to_string());
        info("Concurrency", &config.concurrency().to_string());
        for id in &dropped {
            warn(&format!("Project part '{}' is no longer listed, removed", id));
        }
    }

    let reports = output_mode.is_human().then(|| indexing.subscribe());
    let report = indexing.update_project_parts(parts);
    if output_mode.is_human() {
        for rejected in &report.rejected {
            warn(&rejected.to_string());
        }
    }

    let progress = reports.map(|reports| {
        let paths: Arc<dyn FilePathCaching> = indexing.file_paths().clone();
        IndexProgress::new(report.enqueued, reports, paths)
    });
    indexing.wait_until_idle();

    let stats = indexing.stats();
    let totals = indexing.storage().stats()?;
    match &progress {
        Some(progress) => {
            progress.finish_with_summary(started.elapsed(), &stats);
            summary_row("Files removed", &(report.removed + dropped_files).to_string());
            summary_row("Parts rejected", &report.rejected.len().to_string());
            println!();
            println!(
                "{}",
                stats_table(&[
                    ("Indexed files", totals.indexed_files.to_string()),
                    ("Symbols", totals.symbols.to_string()),
                    ("Locations", totals.locations.to_string()),
                ])
            );
        }
        None => {
            let rejected: Vec<String> = report.rejected.iter().map(ToString::to_string).collect();
            let data = serde_json::json!({
                "enqueued": report.enqueued,
                "indexed": stats.indexed,
                "unchanged": stats.unchanged + stats.stale,
                "failed": stats.failed,
                "removed": report.removed + dropped_files,
                "dropped_parts": dropped,
                "rejected": rejected,
                "symbols": totals.symbols,
                "locations": totals.locations,
                "elapsed_ms": started.elapsed().as_millis() as u64,
            });
            emit_success(output_mode, "index", data)?;
        }
    }

    if watch {
        if output_mode.is_human() {
            println!();
            watching(indexing.watcher().watched_count());
        }
        tracing::info!(files = indexing.watcher().watched_count(), "watching for changes");
        // Changes are handled on the indexing threads until the process is interrupted
        loop {
            std::thread::park();
        }
    }
    Ok(())
}

pub fn run_symbols(config: &IndexerConfig, file: &Path, output_mode: OutputMode) -> anyhow::Result<()> {
    let (paths, storage) = open_index(config)?;
    let file = std::path::absolute(file)?;
    let Some(id) = paths.find(&file)? else {
        anyhow::bail!("{} is not part of the index", file.display());
    };
    let symbols = storage.symbols_in_file(id)?;

    if output_mode.is_human() {
        section(&format!(" Symbols in {} ", file.display()));
        if symbols.is_empty() {
            println!("{}", dim("No symbols recorded for this file."));
        } else {
            println!("{}", symbols_table(&symbols));
        }
    } else {
        let data = serde_json::json!({
            "file": file,
            "symbols": symbols,
        });
        emit_success(output_mode, "symbols", data)?;
    }
    Ok(())
}

pub fn run_locations(config: &IndexerConfig, symbol: i64, output_mode: OutputMode) -> anyhow::Result<()> {
    let (paths, storage) = open_index(config)?;
    let id = SymbolId(symbol);
    let Some(record) = storage.get_symbol(id)? else {
        anyhow::bail!("no symbol with id {}", symbol);
    };

    let mut locations = Vec::new();
    for location in storage.locations_for_symbol(id)? {
        let file = paths.resolve(location.file)?;
        locations.push((location, file));
    }

    if output_mode.is_human() {
        section(&format!(" Locations of {} ", record.name));
        summary_row("Kind", &record.kind.to_string());
        summary_row("Key", &record.usr);
        println!();
        if locations.is_empty() {
            println!("{}", dim("No locations recorded."));
        } else {
            println!("{}", locations_table(&locations));
        }
    } else {
        let locations: Vec<serde_json::Value> = locations
            .iter()
            .map(|(location, file)| {
                serde_json::json!({
                    "file": file,
                    "line": location.line,
                    "column": location.column,
                    "role": location.role.as_str(),
                })
            })
            .collect();
        let data = serde_json::json!({
            "symbol": record,
            "locations": locations,
        });
        emit_success(output_mode, "locations", data)?;
    }
    Ok(())
}

pub fn run_find(config: &IndexerConfig, name: &str, output_mode: OutputMode) -> anyhow::Result<()> {
    let (paths, storage) = open_index(config)?;
    let symbols = storage.find_symbols_by_name(name)?;

    if output_mode.is_human() {
        section(&format!(" Symbols named {} ", name));
        if symbols.is_empty() {
            println!("{}", dim("No symbols found."));
            return Ok(());
        }
        println!("{}", symbols_table(&symbols));
        let mut files: Vec<PathBuf> = Vec::new();
        for symbol in &symbols {
            let file = paths.resolve(symbol.file)?;
            if !files.contains(&file) {
                files.push(file);
            }
        }
        for file in &files {
            println!("  {} {}", Marker::File.glyph().style(theme().faint), path(file));
        }
    } else {
        let mut results = Vec::with_capacity(symbols.len());
        for symbol in &symbols {
            results.push(serde_json::json!({
                "symbol": symbol,
                "path": paths.resolve(symbol.file)?,
            }));
        }
        let data = serde_json::json!({
            "name": name,
            "results": results,
        });
        emit_success(output_mode, "find", data)?;
    }
    Ok(())
}

pub fn run_stats(config: &IndexerConfig, output_mode: OutputMode) -> anyhow::Result<()> {
    let (_, storage) = open_index(config)?;
    let stats = storage.stats()?;
    let parts = storage.fetch_project_part_ids()?;

    if output_mode.is_human() {
        section(" Index ");
        info("Database", &config.database.display().to_string());
        println!();
        println!(
            "{}",
            stats_table(&[
                ("Sources", stats.sources.to_string()),
                ("Project parts", stats.project_parts.to_string()),
                ("Indexed files", stats.indexed_files.to_string()),
                ("Symbols", stats.symbols.to_string()),
                ("Locations", stats.locations.to_string()),
            ])
        );
        for id in &parts {
            println!("  {} {}", Marker::Part.glyph().style(theme().faint), symbol_name(id.as_str()));
        }
    } else {
        let data = serde_json::json!({
            "database": config.database,
            "sources": stats.sources,
            "project_parts": parts,
            "indexed_files": stats.indexed_files,
            "symbols": stats.symbols,
            "locations": stats.locations,
        });
        emit_success(output_mode, "stats", data)?;
    }
    Ok(())
}

pub fn run_init(config_path: &Path, config: &IndexerConfig, force: bool, output_mode: OutputMode) -> anyhow::Result<()> {
    config::write_config(config_path, config, force)?;

    if output_mode.is_human() {
        success(&format!("Wrote {}", config_path.display()));
        info("Database", &config.database.display().to_string());
        println!();
        println!("{}", dim("List project parts in a project file, then run:"));
        println!("  {}", "symdex index --project project.toml".bold());
    } else {
        let data = serde_json::json!({
            "config": config_path,
            "database": config.database,
        });
        emit_success(output_mode, "init", data)?;
    }
    Ok(())
}

/// Open an existing index for queries; never creates one
fn open_index(config: &IndexerConfig) -> anyhow::Result<(FilePathCache, SymbolStorage)> {
    if !config.database.exists() {
        anyhow::bail!(
            "no index at {} (run `symdex index --project <file>` first)",
            config.database.display()
        );
    }
    let database = Arc::new(Database::open(&config.database)?);
    tracing::debug!(database = %config.database.display(), "opened index for query");
    Ok((FilePathCache::new(database.clone()), SymbolStorage::new(database)))
}
