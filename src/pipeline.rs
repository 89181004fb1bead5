use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

use crate::config::Config;
use crate::events::{EventSink, PipelineEvent, PROCESS_LABEL, SCAN_LABEL};
use crate::export;
use crate::llm::extraction::CodeExtractor;
use crate::llm::create_llm;
use crate::processor::VideoTagProcessor;
use crate::scanner::VideoScanner;
use crate::tags::TagFetcher;
use crate::PipelineError;

/// Run the full scan → process → export pipeline on the calling task,
/// sequentially, emitting [`PipelineEvent`]s to `tx` along the way.
///
/// Fatal errors surface both as the returned `Err` and as a `Failed` event;
/// per-file failures are folded into sentinel records and never abort the
/// run.
pub async fn run(
    config: Config,
    scan_dir: PathBuf,
    output_path: PathBuf,
    tx: mpsc::UnboundedSender<PipelineEvent>,
) -> Result<(), PipelineError> {
    let events = EventSink::new(tx);

    match run_inner(config, &scan_dir, &output_path, &events).await {
        Ok(videos) => {
            info!("Run completed: {} videos tagged", videos);
            events.send(PipelineEvent::Completed {
                videos,
                output: output_path,
            });
            Ok(())
        }
        Err(e) => {
            events.send(PipelineEvent::Failed(e.to_string()));
            Err(e)
        }
    }
}

async fn run_inner(
    config: Config,
    scan_dir: &Path,
    output_path: &Path,
    events: &EventSink,
) -> Result<usize, PipelineError> {
    config
        .validate()
        .map_err(|e| PipelineError::Config(format!("{e:#}")))?;

    // One chat client and one page session per run, shared across all files.
    let llm = create_llm(&config).map_err(|e| PipelineError::Config(format!("{e:#}")))?;

    events.progress(SCAN_LABEL, 0);
    events.log(format!("Scanning directory: {}", scan_dir.display()));
    let scanner = VideoScanner::new(&config);
    let videos = scanner
        .scan(scan_dir, |percent| events.progress(SCAN_LABEL, percent))
        .map_err(|e| PipelineError::Scan(format!("{e:#}")))?;
    events.log(format!("Found {} video files", videos.len()));

    events.progress(PROCESS_LABEL, 0);
    let extractor = CodeExtractor::new(llm.clone(), Duration::from_secs_f64(config.llm.delay));
    let fetcher = TagFetcher::new(llm, &config)
        .map_err(|e| PipelineError::Config(format!("{e:#}")))?;
    let processor = VideoTagProcessor::new(
        Box::new(extractor),
        Box::new(fetcher),
        &config,
        events.clone(),
    );
    let records = processor.process_videos(&videos).await;

    events.log(format!(
        "Exporting {} records to {}",
        records.len(),
        output_path.display()
    ));
    export::export_records(&records, output_path)
        .map_err(|e| PipelineError::Export(format!("{e:#}")))?;

    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_run_on_empty_tree_exports_and_completes() {
        let dir = TempDir::new().unwrap();
        let scan_dir = dir.path().join("videos");
        std::fs::create_dir(&scan_dir).unwrap();
        let output = dir.path().join("out.xlsx");

        let (tx, mut rx) = mpsc::unbounded_channel();
        run(Config::default(), scan_dir, output.clone(), tx)
            .await
            .unwrap();

        assert!(output.exists());

        let mut completed = false;
        let mut scan_percents = Vec::new();
        while let Ok(event) = rx.try_recv() {
            match event {
                PipelineEvent::Completed { videos, output: path } => {
                    completed = true;
                    assert_eq!(videos, 0);
                    assert_eq!(path, output);
                }
                PipelineEvent::Progress { label, percent } if label == SCAN_LABEL => {
                    scan_percents.push(percent)
                }
                PipelineEvent::Failed(msg) => panic!("unexpected failure: {}", msg),
                _ => {}
            }
        }
        assert!(completed);
        assert_eq!(*scan_percents.last().unwrap(), 100);
        assert!(scan_percents.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_run_with_missing_scan_dir_fails() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let output = dir.path().join("out.xlsx");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = run(Config::default(), missing, output.clone(), tx).await;

        assert!(matches!(result, Err(PipelineError::Scan(_))));
        assert!(!output.exists());

        let mut failed = false;
        while let Ok(event) = rx.try_recv() {
            if let PipelineEvent::Failed(_) = event {
                failed = true;
            }
        }
        assert!(failed);
    }

    #[tokio::test]
    async fn test_run_with_invalid_config_fails_before_scanning() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.llm.process_retries = 0;

        let (tx, _rx) = mpsc::unbounded_channel();
        let result = run(
            config,
            dir.path().to_path_buf(),
            dir.path().join("out.xlsx"),
            tx,
        )
        .await;

        assert!(matches!(result, Err(PipelineError::Config(_))));
    }
}
