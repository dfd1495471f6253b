//! Terminal progress display for ingestion runs
//!
//! Consumes the [`ProgressSnapshot`] stream published by the executor and
//! renders it with indicatif: one bar for overall files and one for the batch
//! in flight, showing the file being streamed when there is one. When stderr
//! is not a terminal the display falls back to periodic text lines.
//!
//! The display never applies back-pressure: the executor drops snapshots
//! that do not fit in the channel, and the display simply renders whatever
//! arrives.
//!
//! # Examples
//!
//! ```rust,no_run
//! use dicom_ingest::cli::{ProgressConfig, ProgressDisplay};
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (tx, rx) = mpsc::channel(1024);
//! let mut display = ProgressDisplay::new(ProgressConfig::default());
//! display.start(rx)?;
//!
//! // hand `tx` to the ingestor and run it; the channel closes when the run ends
//! drop(tx);
//! let last = display.finish().await;
//! # Ok(())
//! # }
//! ```

use std::time::{Duration, Instant};

use crossterm::terminal;
use crossterm::tty::IsTty;
use indicatif::{HumanBytes, MultiProgress, ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::app::executor::ProgressSnapshot;
use crate::errors::{AppError, Result};

/// Configuration for progress display
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Enable visual progress bars
    pub enable_progress_bars: bool,
    /// Maximum width for file names in display
    pub max_filename_width: usize,
    /// Minimum interval between text-mode lines
    pub text_report_interval: Duration,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enable_progress_bars: true,
            max_filename_width: 40,
            text_report_interval: Duration::from_secs(5),
        }
    }
}

/// Snapshot-driven progress display
#[derive(Debug)]
pub struct ProgressDisplay {
    config: ProgressConfig,
    is_terminal: bool,
    update_task: Option<JoinHandle<Option<ProgressSnapshot>>>,
}

impl ProgressDisplay {
    /// Create a new progress display with the given configuration
    pub fn new(config: ProgressConfig) -> Self {
        Self {
            config,
            is_terminal: std::io::stderr().is_tty(),
            update_task: None,
        }
    }

    /// Whether bars will be drawn rather than text lines
    pub fn uses_bars(&self) -> bool {
        self.config.enable_progress_bars && self.is_terminal
    }

    /// Start rendering snapshots from the channel
    ///
    /// # Errors
    ///
    /// Returns `AppError` if a progress bar template is invalid
    pub fn start(&mut self, rx: mpsc::Receiver<ProgressSnapshot>) -> Result<()> {
        let task = if self.uses_bars() {
            let width = filename_width(self.config.max_filename_width);
            Self::start_bar_mode(rx, width)?
        } else {
            Self::start_text_mode(rx, self.config.text_report_interval)
        };
        self.update_task = Some(task);
        Ok(())
    }

    /// Wait for the snapshot channel to close and return the last snapshot seen
    pub async fn finish(&mut self) -> Option<ProgressSnapshot> {
        debug!("Finishing progress display");
        match self.update_task.take() {
            Some(task) => task.await.ok().flatten(),
            None => None,
        }
    }

    fn start_bar_mode(
        mut rx: mpsc::Receiver<ProgressSnapshot>,
        width: usize,
    ) -> Result<JoinHandle<Option<ProgressSnapshot>>> {
        let multi = MultiProgress::new();

        let overall = multi.add(ProgressBar::new(0));
        overall.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({eta}) {msg}",
                )
                .map_err(|e| AppError::generic(format!("Progress bar template error: {}", e)))?
                .progress_chars("##-"),
        );

        let batch = multi.add(ProgressBar::new(100));
        batch.set_style(
            ProgressStyle::default_bar()
                .template("  {prefix} [{bar:30.green/white}] {pos:>3}% {msg}")
                .map_err(|e| AppError::generic(format!("Batch bar template error: {}", e)))?
                .progress_chars("=>-"),
        );

        Ok(tokio::spawn(async move {
            let mut last = None;
            while let Some(snapshot) = rx.recv().await {
                overall.set_length(snapshot.total_files as u64);
                overall.set_position(snapshot.processed_files as u64);
                if snapshot.failed_files > 0 {
                    overall.set_message(format!("{} failed", snapshot.failed_files));
                }

                batch.set_prefix(batch_prefix(&snapshot));
                batch.set_position(snapshot.current_batch_progress_pct.round() as u64);
                batch.set_message(file_message(&snapshot, width));
                last = Some(snapshot);
            }

            batch.finish_and_clear();
            match &last {
                Some(snapshot) => overall.finish_with_message(snapshot.operation_label.clone()),
                None => overall.finish_and_clear(),
            }
            last
        }))
    }

    fn start_text_mode(
        mut rx: mpsc::Receiver<ProgressSnapshot>,
        report_interval: Duration,
    ) -> JoinHandle<Option<ProgressSnapshot>> {
        tokio::spawn(async move {
            let mut last: Option<ProgressSnapshot> = None;
            let mut last_report = Instant::now();

            while let Some(snapshot) = rx.recv().await {
                let new_batch = last
                    .as_ref()
                    .map_or(true, |prev| prev.current_batch_index != snapshot.current_batch_index);

                if new_batch || last_report.elapsed() >= report_interval {
                    eprintln!("{}", text_line(&snapshot));
                    last_report = Instant::now();
                }
                last = Some(snapshot);
            }

            if let Some(snapshot) = &last {
                eprintln!("{}", snapshot.operation_label);
            }
            last
        })
    }
}

/// File name budget, bounded by a third of the terminal width when known
fn filename_width(configured: usize) -> usize {
    match terminal::size() {
        Ok((columns, _)) => configured.min(usize::from(columns) / 3).max(8),
        Err(_) => configured,
    }
}

/// Keep the tail of long names, where DICOM instance numbers usually are
pub(crate) fn truncate_name(name: &str, width: usize) -> String {
    let count = name.chars().count();
    if count <= width {
        return name.to_string();
    }
    let keep = width.saturating_sub(3);
    let tail: String = name.chars().skip(count - keep).collect();
    format!("...{}", tail)
}

pub(crate) fn batch_prefix(snapshot: &ProgressSnapshot) -> String {
    if snapshot.total_batches == 0 {
        return "Batch -/-".to_string();
    }
    format!(
        "Batch {}/{}",
        (snapshot.current_batch_index + 1).min(snapshot.total_batches),
        snapshot.total_batches
    )
}

pub(crate) fn file_message(snapshot: &ProgressSnapshot, width: usize) -> String {
    match (
        &snapshot.current_file_name,
        snapshot.current_file_bytes,
        snapshot.current_file_total,
    ) {
        (Some(name), Some(bytes), Some(total)) => format!(
            "{} {}/{}",
            truncate_name(name, width),
            HumanBytes(bytes),
            HumanBytes(total)
        ),
        (Some(name), None, _) => format!(
            "{} {}",
            snapshot.operation_label,
            truncate_name(name, width)
        ),
        _ => snapshot.operation_label.clone(),
    }
}

fn text_line(snapshot: &ProgressSnapshot) -> String {
    format!(
        "{}: {}/{} files ({:.1}%), {} failed",
        snapshot.operation_label,
        snapshot.processed_files,
        snapshot.total_files,
        snapshot.overall_pct(),
        snapshot.failed_files
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(batch: usize, processed: usize) -> ProgressSnapshot {
        ProgressSnapshot {
            total_files: 10,
            processed_files: processed,
            failed_files: 0,
            current_batch_index: batch,
            total_batches: 2,
            current_batch_progress_pct: 50.0,
            operation_label: format!("Loading batch {}/2", batch + 1),
            current_file_name: None,
            current_file_bytes: None,
            current_file_total: None,
        }
    }

    fn text_config() -> ProgressConfig {
        ProgressConfig {
            enable_progress_bars: false,
            max_filename_width: 20,
            text_report_interval: Duration::from_millis(1),
        }
    }

    /// Text mode drains the channel and returns the final snapshot once it closes
    #[tokio::test]
    async fn test_text_mode_returns_last_snapshot() {
        let mut display = ProgressDisplay::new(text_config());
        assert!(!display.uses_bars());

        let (tx, rx) = mpsc::channel(16);
        display.start(rx).unwrap();

        tx.send(snapshot(0, 3)).await.unwrap();
        tx.send(snapshot(1, 10)).await.unwrap();
        drop(tx);

        let last = display.finish().await.unwrap();
        assert_eq!(last.processed_files, 10);
        assert_eq!(last.current_batch_index, 1);
    }

    #[tokio::test]
    async fn test_finish_without_start() {
        let mut display = ProgressDisplay::new(text_config());
        assert!(display.finish().await.is_none());
    }

    #[test]
    fn test_filename_truncation() {
        assert_eq!(truncate_name("IM0001.dcm", 20), "IM0001.dcm");
        assert_eq!(truncate_name("series/very_long_instance_0042.dcm", 12), "..._0042.dcm");
        assert_eq!(truncate_name("abc", 0), "...");
    }

    #[test]
    fn test_messages() {
        let mut s = snapshot(0, 0);
        assert_eq!(batch_prefix(&s), "Batch 1/2");
        assert_eq!(file_message(&s, 20), "Loading batch 1/2");

        s.current_file_name = Some("big.dcm".to_string());
        s.current_file_bytes = Some(1024);
        s.current_file_total = Some(2048);
        assert_eq!(file_message(&s, 20), "big.dcm 1.00 KiB/2.00 KiB");

        s.current_file_name = Some("IM0001".to_string());
        s.current_file_bytes = None;
        s.current_file_total = None;
        assert_eq!(file_message(&s, 20), "Loading batch 1/2 IM0001");

        s.total_batches = 0;
        assert_eq!(batch_prefix(&s), "Batch -/-");
        assert!(text_line(&snapshot(1, 5)).contains("5/10 files (50.0%)"));
    }
}
