use crate::filepath::FilePathCaching;
use crate::indexer::{SchedulerStats, TaskOutcome, TaskReport};
use crate::ui::{Marker, file_failed, file_indexed, theme};
use crossbeam::channel::Receiver;
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Progress bar over the tasks of one update, fed by scheduler reports.
///
/// Reports that arrive after the bar finished are printed one line per file,
/// which is what watch mode shows.
pub struct IndexProgress {
    bar: ProgressBar,
    _handle: thread::JoinHandle<()>,
}

impl IndexProgress {
    pub fn new(total: usize, reports: Receiver<TaskReport>, paths: Arc<dyn FilePathCaching>) -> Self {
        let bar = if console::Term::stdout().is_term() {
            ProgressBar::new(total as u64)
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) = ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {wide_msg}") {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_message("Indexing files");
        if total == 0 {
            bar.finish_and_clear();
        }

        let progress = bar.clone();
        let handle = thread::spawn(move || {
            for report in reports {
                let path = paths.resolve(report.file).unwrap_or_default();
                if progress.is_finished() {
                    match &report.outcome {
                        TaskOutcome::Indexed { symbols, .. } => file_indexed(&path, *symbols),
                        outcome if outcome.is_failure() => file_failed(&path, &failure_message(outcome)),
                        _ => {}
                    }
                    continue;
                }

                progress.inc(1);
                if let Some(name) = path.file_name() {
                    progress.set_message(name.to_string_lossy().to_string());
                }
                if report.outcome.is_failure() {
                    progress.suspend(|| file_failed(&path, &failure_message(&report.outcome)));
                }
                if progress.length().is_some_and(|len| progress.position() >= len) {
                    progress.finish_and_clear();
                }
            }
        });

        Self { bar, _handle: handle }
    }

    /// Stop the bar; later reports are printed per file
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    pub fn finish_with_summary(&self, duration: Duration, stats: &SchedulerStats) {
        self.finish();
        println!();
        println!(
            "{} {}",
            Marker::Done.glyph().style(theme().ok),
            format!("Complete in {}", HumanDuration(duration)).style(theme().ok)
        );
        println!(
            "  {} {} indexed  {} {} unchanged  {} {} failed",
            Marker::File.glyph().style(theme().label),
            stats.indexed,
            Marker::Part.glyph().style(theme().label),
            stats.unchanged + stats.stale,
            Marker::Failed.glyph().style(theme().label),
            stats.failed
        );
    }
}

fn failure_message(outcome: &TaskOutcome) -> String {
    match outcome {
        TaskOutcome::ParseFailed(message)
        | TaskOutcome::StorageFailed(message)
        | TaskOutcome::CollectorUnavailable(message) => message.clone(),
        _ => String::new(),
    }
}
