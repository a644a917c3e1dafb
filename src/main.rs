use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::{info, warn};
use simplelog::{Config, LevelFilter, SimpleLogger, WriteLogger};

use pagescroll::render::{AssemblyEvent, AssemblyService};
use pagescroll::replay::{ReplayScript, replay};
use pagescroll::settings::{Settings, default_config_path};
use pagescroll::zoom::{GestureController, Size, pan_bounds};

/// Longest a single assembly may take before the CLI gives up
const ASSEMBLY_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Parser)]
#[command(name = "pagescroll")]
#[command(about = "Continuous-scroll document surface tools")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (default: the user config directory)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level: off, error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "info")]
    log_level: LevelFilter,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true, value_name = "FILE")]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Stack every page of a document onto one surface and save it as PNG
    Render {
        /// PDF file (with the `pdf` feature) or a directory of page images
        #[arg(value_name = "DOCUMENT")]
        document: PathBuf,

        /// Spill through compressed storage at half resolution
        #[arg(long)]
        low_memory: bool,

        /// Output PNG (default: <document>.png)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the pan bound for a content size, viewport and scale
    Bounds {
        /// Unscaled content size, WIDTHxHEIGHT
        #[arg(long, value_parser = parse_size)]
        content: Size,

        /// Viewport size, WIDTHxHEIGHT
        #[arg(long, value_parser = parse_size)]
        viewport: Size,

        #[arg(long, default_value_t = 1.0)]
        scale: f32,
    },

    /// Feed a JSON gesture script through the transform controller
    Replay {
        #[arg(value_name = "SCRIPT")]
        script: PathBuf,

        /// Frame interval for animation steps
        #[arg(long, default_value_t = 16)]
        frame_ms: u64,
    },
}

fn parse_size(value: &str) -> Result<Size, String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {value:?}"))?;
    let parse = |part: &str| {
        part.trim()
            .parse::<f32>()
            .map_err(|e| format!("{part:?}: {e}"))
    };
    Ok(Size::new(parse(width)?, parse(height)?))
}

fn init_logging(level: LevelFilter, log_file: Option<&Path>) -> Result<()> {
    match log_file {
        Some(path) => WriteLogger::init(
            level,
            Config::default(),
            File::create(path).with_context(|| format!("creating log file {}", path.display()))?,
        )?,
        None => SimpleLogger::init(level, Config::default())?,
    }
    Ok(())
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let settings = match path {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    settings.with_context(|| {
        let shown = path
            .map(Path::to_path_buf)
            .or_else(default_config_path)
            .unwrap_or_default();
        format!("loading settings from {}", shown.display())
    })
}

fn main() -> Result<()> {
    better_panic::install();
    let cli = Cli::parse();
    init_logging(cli.log_level, cli.log_file.as_deref())?;
    let settings = load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Render {
            document,
            low_memory,
            output,
        } => run_render(&settings, &document, low_memory, output),
        Commands::Bounds {
            content,
            viewport,
            scale,
        } => run_bounds(content, viewport, scale),
        Commands::Replay { script, frame_ms } => run_replay(&settings, &script, frame_ms),
    }
}

fn run_render(
    settings: &Settings,
    document: &Path,
    low_memory: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let low_memory = settings.low_memory_requested(low_memory);
    let mut service = AssemblyService::new(settings.assembler());
    let id = service.load(document, low_memory);

    match service.wait(ASSEMBLY_TIMEOUT) {
        Some(AssemblyEvent::Ready(ready)) if ready == id => {}
        Some(_) => {
            let error = service
                .last_error()
                .map_or_else(|| "unknown error".to_string(), ToString::to_string);
            bail!("assembling {}: {error}", document.display());
        }
        None => bail!("assembling {} timed out", document.display()),
    }
    let Some(rendered) = service.current() else {
        bail!("assembly finished without a document");
    };
    service.shutdown();

    let output = output.unwrap_or_else(|| document.with_extension("png"));
    rendered
        .surface()
        .save(&output)
        .with_context(|| format!("writing {}", output.display()))?;
    info!("Wrote {}", output.display());

    println!(
        "{}x{} ({:?}) -> {}",
        rendered.width(),
        rendered.height(),
        rendered.fidelity(),
        output.display()
    );
    for page in 0..rendered.page_count() {
        if let Some(offset) = rendered.page_offset(page) {
            println!("page {page}: y={offset}");
        }
    }
    Ok(())
}

fn run_bounds(content: Size, viewport: Size, scale: f32) -> Result<()> {
    if !scale.is_finite() || scale <= 0.0 {
        bail!("scale must be a positive number, got {scale}");
    }
    let bounds = pan_bounds(content, viewport, scale);
    println!("max_x={} max_y={}", bounds.max_x, bounds.max_y);
    Ok(())
}

fn run_replay(settings: &Settings, script: &Path, frame_ms: u64) -> Result<()> {
    let script = ReplayScript::load(script)
        .with_context(|| format!("loading replay script {}", script.display()))?;
    let state = settings.transform_state()?;
    let mut controller = GestureController::new(state, settings.gesture_config());
    if frame_ms == 0 {
        warn!("Frame interval of 0 ms never advances animations");
    }

    for record in replay(&script, &mut controller, Duration::from_millis(frame_ms)) {
        println!("{}", serde_json::to_string(&record)?);
    }
    Ok(())
}
