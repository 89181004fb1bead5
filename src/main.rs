use anyhow::Result;
use clap::{Arg, Command};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use video_tagger::pipeline;
use video_tagger::{Config, PipelineEvent};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("video_tagger=info,warn")
        .init();

    let matches = Command::new("Video Tagger")
        .version("0.1.0")
        .about("Scans a directory for video files, looks up release codes and tags, exports a spreadsheet")
        .arg(
            Arg::new("scan-dir")
                .short('d')
                .long("scan-dir")
                .value_name("DIR")
                .help("Directory to scan for video files")
                .required(true),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Path of the exported spreadsheet (.xlsx is appended if missing)")
                .required(true),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Path to a TOML configuration file"),
        )
        .get_matches();

    let scan_dir = PathBuf::from(matches.get_one::<String>("scan-dir").unwrap());
    let output_path = ensure_xlsx(PathBuf::from(matches.get_one::<String>("output").unwrap()));

    // Load configuration
    let config = match matches.get_one::<String>("config") {
        Some(path) => Config::load_from(Path::new(path))?,
        None => Config::load().unwrap_or_else(|e| {
            warn!("Failed to load config, using defaults: {}", e);
            Config::default()
        }),
    };

    info!("Scan directory: {}", scan_dir.display());
    info!("Output file: {}", output_path.display());

    if !scan_dir.exists() {
        error!("Scan directory does not exist: {}", scan_dir.display());
        return Err(anyhow::anyhow!("scan directory not found"));
    }

    // The pipeline runs on one background task; this shell only drains its
    // event channel.
    let (tx, mut rx) = mpsc::unbounded_channel();
    let worker = tokio::spawn(pipeline::run(config, scan_dir, output_path, tx));

    let mut last_progress = None;
    while let Some(event) = rx.recv().await {
        match event {
            PipelineEvent::Progress { label, percent } => {
                if last_progress != Some((label, percent)) {
                    info!("{}: {}%", label, percent);
                    last_progress = Some((label, percent));
                }
            }
            PipelineEvent::Log(line) => info!("{}", line),
            PipelineEvent::Completed { videos, output } => {
                info!("Done: {} videos, results in {}", videos, output.display());
            }
            PipelineEvent::Failed(message) => error!("Run failed: {}", message),
        }
    }

    worker.await??;
    Ok(())
}

/// The exporter writes whatever path it is given; the shell owns the
/// extension convention.
fn ensure_xlsx(path: PathBuf) -> PathBuf {
    let has_xlsx = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx"));

    if has_xlsx {
        path
    } else {
        let mut raw = path.into_os_string();
        raw.push(".xlsx");
        PathBuf::from(raw)
    }
}
