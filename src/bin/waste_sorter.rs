//! waste_sorter - live waste classification
//!
//! This binary:
//! 1. Loads configuration (JSON file + environment), then applies CLI flags
//! 2. Loads the detection model (or the scripted demo backend for `stub://`)
//! 3. Opens the video source (webcam, local file, or `stub://` frames)
//! 4. Streams until Ctrl-C, end of stream, or `--max-frames`
//! 5. Releases the source and clears the display on exit

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use waste_sorter::ui::{Ui, UiMode};
use waste_sorter::{
    load_backend, open_source, Classifier, ConsoleSink, ExpiryPolicy, SorterConfig, SorterError,
    StopSignal, StreamLoop, StreamSession, Termination,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Classify waste seen by a camera into recycling categories")]
struct Args {
    /// Video source: webcam index or /dev/video*, a local video file, or stub://name.
    #[arg(long)]
    source: Option<String>,

    /// ONNX model path, or stub:// for the scripted demo backend.
    #[arg(long)]
    model: Option<String>,

    /// Minimum detection confidence in (0, 1].
    #[arg(long)]
    confidence: Option<f32>,

    /// Milliseconds before displayed results are cleared.
    #[arg(long, value_name = "MS")]
    expiry_ms: Option<u64>,

    /// Cancel pending expiries when a newer change is displayed.
    #[arg(long)]
    cancel_superseded: bool,

    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,

    /// Write the latest annotated frame to this JPEG path.
    #[arg(long, value_name = "PATH")]
    snapshot: Option<PathBuf>,

    /// Snapshot every N-th frame.
    #[arg(long, default_value_t = 15, value_name = "N")]
    snapshot_every: u64,

    /// Startup progress output.
    #[arg(long, value_enum, default_value_t = UiMode::Auto, value_name = "MODE")]
    ui: UiMode,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let ui = Ui::for_stderr(args.ui);

    let cfg = {
        let stage = ui.stage("Load configuration");
        let cfg = resolve_config(&args)?;
        stage.complete();
        cfg
    };
    let table = Arc::new(cfg.category_table()?);
    log::info!(
        "{} labels mapped to categories; expiry {}ms ({:?})",
        table.len(),
        cfg.expiry.delay.as_millis(),
        cfg.expiry.policy
    );

    let backend = {
        let stage = ui.stage("Load model");
        let backend = match load_backend(&cfg.model, cfg.confidence_threshold) {
            Ok(backend) => backend,
            Err(SorterError::ModelLoad { path, reason }) => {
                log::error!("Unable to load model. Check the specified path: {}", path);
                return Err(anyhow!("model load failed for {}: {}", path, reason));
            }
            Err(other) => return Err(other.into()),
        };
        stage.complete();
        backend
    };
    let classifier = Classifier::new(backend, cfg.confidence_threshold);

    let mut source = {
        let stage = ui.stage("Open source");
        let source = open_source(&cfg.source)?;
        stage.complete();
        source
    };

    let stop = StopSignal::new();
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || {
        log::info!("stop requested");
        handler_stop.stop();
    })
    .map_err(|e| anyhow!("failed to install Ctrl-C handler: {}", e))?;

    let mut sink = ConsoleSink::new();
    if let Some(path) = &args.snapshot {
        log::info!("writing snapshots to {}", path.display());
        sink = sink.with_snapshot(path.clone(), args.snapshot_every);
    }

    let mut session = StreamSession::new(Arc::clone(&table), Box::new(sink), cfg.expiry);
    let mut stream = StreamLoop::new(classifier, table, cfg.frame_width, cfg.frame_height);
    let report = stream.run(source.as_mut(), &mut session, &stop, args.max_frames)?;

    log::info!(
        "processed {} frames: {} changes, {} inference failures",
        report.frames,
        report.changes,
        report.inference_failures
    );
    match report.termination {
        Termination::SourceFailed(reason) => Err(anyhow!("video source failed: {}", reason)),
        _ => Ok(()),
    }
}

fn resolve_config(args: &Args) -> Result<SorterConfig> {
    let mut cfg = SorterConfig::load()?;
    if let Some(source) = &args.source {
        cfg.source.uri = source.clone();
    }
    if let Some(model) = &args.model {
        cfg.model.path = model.clone();
    }
    if let Some(confidence) = args.confidence {
        cfg.confidence_threshold = confidence;
    }
    if let Some(expiry_ms) = args.expiry_ms {
        cfg.expiry.delay = Duration::from_millis(expiry_ms);
    }
    if args.cancel_superseded {
        cfg.expiry.policy = ExpiryPolicy::CancelSuperseded;
    }
    cfg.validate()?;
    Ok(cfg)
}
