// Batch runner for the overlay engine: reads a position history and a directory of
// still frames, composites the scheduled analytics and writes the frames back out.

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use pitch_vision::core_modules::artifact_store::save_png;
use pitch_vision::core_modules::position::{BoxAnchor, EntityPositionHistory, TrackFrames};
use pitch_vision::{OverlayConfig, OverlayPipeline};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

#[derive(Debug, Parser)]
#[command(name = "pitch_vision", version, about = "Positional analytics overlays for match footage")]
struct Cli {
    /// TOML configuration. Built-in defaults are used when omitted.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Pitch plate image, overriding `assets.background`.
    #[arg(long)]
    background: Option<PathBuf>,

    /// Artifact directory, overriding `assets.output_dir`.
    #[arg(long)]
    artifacts: Option<PathBuf>,

    /// Caption font, overriding `caption.font`.
    #[arg(long)]
    font: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Composite the scheduled overlays onto every frame of a frame directory.
    Run {
        #[command(flatten)]
        input: PositionInput,
        /// Directory of input frames, processed in file-name order.
        #[arg(long)]
        frames: PathBuf,
        /// Directory the composited frames are written to.
        #[arg(long)]
        out: PathBuf,
    },
    /// Render both analytics over the whole history and write the artifacts.
    Snapshot {
        #[command(flatten)]
        input: PositionInput,
    },
}

#[derive(Debug, Args)]
struct PositionInput {
    /// History JSON: `{"<entity>": [[x, y], ...]}`.
    #[arg(long, conflicts_with = "tracks", required_unless_present = "tracks")]
    positions: Option<PathBuf>,
    /// Tracker output JSON: one `{"<entity>": {"bbox": [x1, y1, x2, y2]}}` object per frame.
    #[arg(long)]
    tracks: Option<PathBuf>,
    /// Bounding-box point used as the position when reading tracks.
    #[arg(long, value_enum, default_value_t = AnchorArg::TopLeft)]
    anchor: AnchorArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AnchorArg {
    TopLeft,
    BottomCenter,
    Center,
}

impl From<AnchorArg> for BoxAnchor {
    fn from(value: AnchorArg) -> Self {
        match value {
            AnchorArg::TopLeft => BoxAnchor::TopLeft,
            AnchorArg::BottomCenter => BoxAnchor::BottomCenter,
            AnchorArg::Center => BoxAnchor::Center,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pitch_vision=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Command::Run { input, frames, out } => {
            let history = load_history(&input).await?;
            tokio::task::spawn_blocking(move || run_frames(config, &history, &frames, &out))
                .await
                .context("frame worker panicked")??;
        }
        Command::Snapshot { input } => {
            let history = load_history(&input).await?;
            tokio::task::spawn_blocking(move || snapshot(config, &history))
                .await
                .context("snapshot worker panicked")??;
        }
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<OverlayConfig> {
    let mut config = match &cli.config {
        Some(path) => OverlayConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => OverlayConfig::default(),
    };
    if let Some(background) = &cli.background {
        config.assets.background = background.clone();
    }
    if let Some(dir) = &cli.artifacts {
        config.assets.output_dir = Some(dir.clone());
    }
    if let Some(font) = &cli.font {
        config.caption.font = Some(font.clone());
    }
    config.validate()?;
    Ok(config)
}

async fn load_history(input: &PositionInput) -> Result<EntityPositionHistory> {
    let history = match (&input.positions, &input.tracks) {
        (Some(path), None) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading positions from {}", path.display()))?;
            EntityPositionHistory::from_json(&text)
                .with_context(|| format!("parsing positions in {}", path.display()))?
        }
        (None, Some(path)) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading tracks from {}", path.display()))?;
            let frames: TrackFrames = serde_json::from_str(&text)
                .with_context(|| format!("parsing tracks in {}", path.display()))?;
            EntityPositionHistory::from_tracks(&frames, input.anchor.into())
        }
        _ => bail!("exactly one of --positions or --tracks is required"),
    };
    info!(
        entities = history.entity_count(),
        samples = history.sample_count(),
        "position history loaded"
    );
    Ok(history)
}

fn run_frames(
    config: OverlayConfig,
    history: &EntityPositionHistory,
    frames_dir: &Path,
    out_dir: &Path,
) -> Result<()> {
    let paths = frame_paths(frames_dir)?;
    if paths.is_empty() {
        bail!("no frames found in {}", frames_dir.display());
    }
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;

    let mut pipeline = OverlayPipeline::new(config)?;
    // One frame in memory at a time; the pipeline only needs playback order.
    for (index, path) in paths.iter().enumerate() {
        let mut frame = image::open(path)
            .with_context(|| format!("decoding frame {}", path.display()))?
            .to_rgb8();
        pipeline.process_frame(index, history, &mut frame)?;
        let target = out_dir.join(format!("frame_{index:05}.png"));
        save_png(&target, &frame).with_context(|| format!("writing {}", target.display()))?;
    }
    info!(frames = paths.len(), out = %out_dir.display(), "frames written");
    Ok(())
}

fn snapshot(config: OverlayConfig, history: &EntityPositionHistory) -> Result<()> {
    if config.assets.output_dir.is_none() {
        bail!("snapshot needs an artifact directory (assets.output_dir or --artifacts)");
    }
    let pipeline = OverlayPipeline::new(config)?;
    pipeline.snapshot(history)?;
    if let Some(store) = pipeline.artifact_store() {
        info!(dir = %store.dir().display(), "snapshot artifacts written");
    }
    Ok(())
}

fn frame_paths(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let path = entry?.path();
        let is_frame = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if is_frame {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}
