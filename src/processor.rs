use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::events::{EventSink, PROCESS_LABEL};
use crate::scanner::VideoFile;

/// Terminal `tags` value for a file whose retry budget ran out. A marker,
/// never parsed as data.
pub const FAILURE_SENTINEL: &str = "processing failed";

/// One output row per scanned video, in scan order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    pub name: String,
    pub path: String,
    pub code: String,
    /// Comma-joined tag list, or [`FAILURE_SENTINEL`]
    pub tags: String,
}

/// Source of release codes for filenames. Soft-fails to an empty string.
#[async_trait]
pub trait CodeSource: Send + Sync {
    async fn extract_code(&self, filename: &str) -> String;
}

/// Source of descriptive tags for a release code. Soft-fails to an empty
/// list.
#[async_trait]
pub trait TagSource: Send + Sync {
    async fn fetch_tags(&self, code: &str) -> Vec<String>;
}

/// Drives the per-file extract → fetch loop with a bounded retry budget.
/// Processes files strictly in scan order, one at a time.
pub struct VideoTagProcessor {
    extractor: Box<dyn CodeSource>,
    fetcher: Box<dyn TagSource>,
    max_retries: u32,
    retry_backoff: Duration,
    events: EventSink,
}

impl VideoTagProcessor {
    pub fn new(
        extractor: Box<dyn CodeSource>,
        fetcher: Box<dyn TagSource>,
        config: &Config,
        events: EventSink,
    ) -> Self {
        Self {
            extractor,
            fetcher,
            max_retries: config.llm.process_retries.max(1),
            retry_backoff: Duration::from_secs_f64(config.llm.delay * 2.0),
            events,
        }
    }

    /// Produce exactly one record per input video. Per-file failures never
    /// abort the run; overall progress counts files started, reported
    /// before each file.
    pub async fn process_videos(&self, videos: &[VideoFile]) -> Vec<TagRecord> {
        let total = videos.len();
        let mut records = Vec::with_capacity(total);

        for (index, video) in videos.iter().enumerate() {
            self.events
                .progress(PROCESS_LABEL, (index * 100 / total) as u8);
            records.push(self.process_one(video).await);
        }

        records
    }

    async fn process_one(&self, video: &VideoFile) -> TagRecord {
        self.events.log(format!("Processing file: {}", video.name));

        let mut attempt = 0u32;
        loop {
            attempt += 1;

            // The whole extract+fetch pair is retried together even when
            // only the fetch came up empty: a fresh extraction may yield a
            // different code.
            let code = self.extractor.extract_code(&video.name).await;
            self.events.log(format!("Extracted code: {}", code));

            let tags = self.fetcher.fetch_tags(&code).await;
            self.events.log(format!("Fetched tags: {}", tags.join(", ")));

            if !tags.is_empty() {
                info!("Tagged {} as {} ({} tags)", video.name, code, tags.len());
                return TagRecord {
                    name: video.name.clone(),
                    path: video.path.display().to_string(),
                    code,
                    tags: tags.join(", "),
                };
            }

            if attempt >= self.max_retries {
                warn!(
                    "Giving up on {} after {} attempts",
                    video.name, self.max_retries
                );
                self.events.log(format!(
                    "Tag lookup failed for {}, giving up after {} attempts",
                    video.name, self.max_retries
                ));
                return TagRecord {
                    name: video.name.clone(),
                    path: video.path.display().to_string(),
                    code: String::new(),
                    tags: FAILURE_SENTINEL.to_string(),
                };
            }

            self.events.log(format!(
                "No tags for {}, retrying {}/{}",
                video.name, attempt, self.max_retries
            ));
            tokio::time::sleep(self.retry_backoff).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::PipelineEvent;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    struct FixedCode {
        code: &'static str,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl CodeSource for FixedCode {
        async fn extract_code(&self, _filename: &str) -> String {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.code.to_string()
        }
    }

    struct FixedTags {
        tags: Vec<&'static str>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TagSource for FixedTags {
        async fn fetch_tags(&self, _code: &str) -> Vec<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.tags.iter().map(|t| t.to_string()).collect()
        }
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.llm.delay = 0.0;
        config.llm.process_retries = 3;
        config
    }

    fn video(name: &str) -> VideoFile {
        VideoFile {
            name: name.to_string(),
            path: PathBuf::from("/videos").join(name),
            size: 1024,
        }
    }

    fn processor_with(
        code: &'static str,
        tags: Vec<&'static str>,
    ) -> (VideoTagProcessor, Arc<AtomicUsize>, Arc<AtomicUsize>, mpsc::UnboundedReceiver<PipelineEvent>)
    {
        let extract_calls = Arc::new(AtomicUsize::new(0));
        let fetch_calls = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::unbounded_channel();
        let processor = VideoTagProcessor::new(
            Box::new(FixedCode {
                code,
                calls: extract_calls.clone(),
            }),
            Box::new(FixedTags {
                tags,
                calls: fetch_calls.clone(),
            }),
            &test_config(),
            EventSink::new(tx),
        );
        (processor, extract_calls, fetch_calls, rx)
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let (processor, extract_calls, fetch_calls, _rx) =
            processor_with("ABC-123", vec!["a", "b", "c"]);

        let records = processor.process_videos(&[video("abc.mp4")]).await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "abc.mp4");
        assert_eq!(records[0].code, "ABC-123");
        assert_eq!(records[0].tags, "a, b, c");
        assert_eq!(extract_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fetch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_budget_exhaustion_yields_sentinel() {
        let (processor, extract_calls, fetch_calls, _rx) = processor_with("ABC-123", vec![]);

        let records = processor.process_videos(&[video("abc.mp4")]).await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].code, "");
        assert_eq!(records[0].tags, FAILURE_SENTINEL);
        // the whole extract+fetch pair re-runs on every attempt
        assert_eq!(extract_calls.load(Ordering::SeqCst), 3);
        assert_eq!(fetch_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_one_record_per_input() {
        let (processor, _, _, _rx) = processor_with("X-001", vec!["t"]);

        let videos: Vec<_> = (0..5).map(|i| video(&format!("v{}.mkv", i))).collect();
        let records = processor.process_videos(&videos).await;

        assert_eq!(records.len(), videos.len());
        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["v0.mkv", "v1.mkv", "v2.mkv", "v3.mkv", "v4.mkv"]);
    }

    #[tokio::test]
    async fn test_progress_counts_files_started() {
        let (processor, _, _, mut rx) = processor_with("X-001", vec!["t"]);

        let videos: Vec<_> = (0..4).map(|i| video(&format!("v{}.mp4", i))).collect();
        processor.process_videos(&videos).await;
        drop(processor);

        let mut percents = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let PipelineEvent::Progress { label, percent } = event {
                assert_eq!(label, PROCESS_LABEL);
                percents.push(percent);
            }
        }

        assert_eq!(percents, vec![0, 25, 50, 75]);
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_empty_input_yields_no_records() {
        let (processor, extract_calls, _, _rx) = processor_with("X-001", vec!["t"]);
        let records = processor.process_videos(&[]).await;
        assert!(records.is_empty());
        assert_eq!(extract_calls.load(Ordering::SeqCst), 0);
    }
}
