use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use typecut::export::capture::CaptureOptions;
use typecut::export::ffmpeg::FfmpegBackend;
use typecut::fonts::pool::ShuffleRng;
use typecut::{
    AnimationConfig, AnimationLoop, ClockSource, ConfigInput, EdgeMode, ExportCoordinator,
    FontDbResolver, FontLoader, FontPool, FrameRenderer, GifEncoder, QueuedScheduler,
    RealtimeCapture, ScriptOptions, Surface, SystemClock, Tick, Timeline,
};

/// Fonts resolved up front so the first frames do not fall back while loading.
const WARM_FONTS: usize = 32;

#[derive(Parser, Debug)]
#[command(name = "typecut", version)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the effective font pool, the sequence and the switch interval.
    Sequence(SettingsArgs),
    /// Render the frame shown at an elapsed time as a PNG.
    Frame(FrameArgs),
    /// Run the live loop in real time, writing a PNG on every redraw.
    Preview(PreviewArgs),
    /// Export a looping GIF.
    Gif(ExportArgs),
    /// Capture a WebM in real time (requires `ffmpeg` on PATH).
    Webm(ExportArgs),
    /// Export an After Effects keyframe script.
    Script(ExportArgs),
    /// Font utilities.
    #[command(subcommand)]
    Fonts(FontsCommand),
}

#[derive(Subcommand, Debug)]
enum FontsCommand {
    /// Check which families load within the timeout.
    Verify(VerifyArgs),
    /// Pick a random usable pool from curated, local and system fonts.
    Randomize(RandomizeArgs),
}

#[derive(Args, Debug, Clone)]
struct SettingsArgs {
    /// JSON settings file; flags override its fields.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    text: Option<String>,

    /// Seconds (1-10).
    #[arg(long)]
    duration: Option<u32>,

    /// Font switches per pass (2-100).
    #[arg(long)]
    switches: Option<u32>,

    /// Pixels (48-240).
    #[arg(long)]
    font_size: Option<u32>,

    /// Text color, `#rgb` or `#rrggbb`.
    #[arg(long)]
    color: Option<String>,

    /// Background color, `#rgb` or `#rrggbb`.
    #[arg(long)]
    background: Option<String>,

    /// Paint the background instead of leaving it transparent.
    #[arg(long)]
    opaque: bool,

    /// Comma-separated font families, in order.
    #[arg(long, value_delimiter = ',')]
    fonts: Option<Vec<String>>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// Extra font directory (repeatable).
    #[arg(long = "font-dir")]
    font_dirs: Vec<PathBuf>,
}

#[derive(Args, Debug)]
struct FrameArgs {
    #[command(flatten)]
    settings: SettingsArgs,

    /// Elapsed milliseconds since playback start.
    #[arg(long, default_value_t = 0)]
    at_ms: u64,

    /// Draw with binary alpha, as the GIF export does.
    #[arg(long)]
    hard: bool,

    #[arg(long)]
    out: PathBuf,
}

#[derive(Args, Debug)]
struct PreviewArgs {
    #[command(flatten)]
    settings: SettingsArgs,

    #[arg(long)]
    out_dir: PathBuf,

    /// Full passes to play before stopping.
    #[arg(long, default_value_t = 1)]
    cycles: u64,
}

#[derive(Args, Debug)]
struct ExportArgs {
    #[command(flatten)]
    settings: SettingsArgs,

    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
}

#[derive(Args, Debug)]
struct VerifyArgs {
    #[arg(required = true)]
    families: Vec<String>,

    /// Per-font load budget in milliseconds.
    #[arg(long, default_value_t = 2000)]
    timeout_ms: u64,

    #[arg(long = "font-dir")]
    font_dirs: Vec<PathBuf>,
}

#[derive(Args, Debug)]
struct RandomizeArgs {
    #[arg(long, default_value_t = 0)]
    seed: u64,

    #[arg(long = "font-dir")]
    font_dirs: Vec<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Command::Sequence(args) => cmd_sequence(args),
        Command::Frame(args) => cmd_frame(args),
        Command::Preview(args) => cmd_preview(args),
        Command::Gif(args) => cmd_gif(args),
        Command::Webm(args) => cmd_webm(args),
        Command::Script(args) => cmd_script(args),
        Command::Fonts(FontsCommand::Verify(args)) => cmd_fonts_verify(args),
        Command::Fonts(FontsCommand::Randomize(args)) => cmd_fonts_randomize(args),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

struct Session {
    cfg: AnimationConfig,
    pool: FontPool,
    loader: Arc<FontLoader>,
}

impl Session {
    fn open(args: &SettingsArgs) -> anyhow::Result<Self> {
        let base = match &args.config {
            Some(path) => ConfigInput::from_json_file(path)?,
            None => ConfigInput::default(),
        };
        let input = base.merge(ConfigInput {
            text: args.text.clone(),
            duration_secs: args.duration,
            switch_count: args.switches,
            font_size: args.font_size,
            text_color: args.color.clone(),
            background_color: args.background.clone(),
            transparent_background: args.opaque.then_some(false),
            fonts: args.fonts.clone(),
            canvas_width: args.width,
            canvas_height: args.height,
            font_dirs: args.font_dirs.clone(),
        });
        let (cfg, pool) = input.resolve().context("invalid settings")?;
        let loader = Arc::new(FontLoader::new(Arc::new(system_resolver(&input.font_dirs))));
        Ok(Self { cfg, pool, loader })
    }

    fn timeline(&self) -> Timeline {
        Timeline::new(&self.pool, self.cfg.duration_ms, self.cfg.switch_count)
    }

    fn warm_fonts(&self, timeline: &Timeline) {
        let unique = timeline.sequence().unique();
        let unique = &unique[..unique.len().min(WARM_FONTS)];
        self.loader.prefetch(unique);
        for family in unique {
            if self.loader.resolve(family, self.loader.timeout()).is_none() {
                tracing::warn!(family = %family, "font unavailable; frames will use the fallback chain");
            }
        }
    }
}

fn system_resolver(font_dirs: &[PathBuf]) -> FontDbResolver {
    let mut resolver = FontDbResolver::system();
    for dir in font_dirs {
        if dir.is_file() {
            if let Err(e) = resolver.install_file(dir) {
                tracing::warn!(path = %dir.display(), error = %e, "skipping font file");
            }
        } else {
            resolver.load_dir(dir);
        }
    }
    resolver
}

fn cmd_sequence(args: SettingsArgs) -> anyhow::Result<()> {
    let session = Session::open(&args)?;
    let timeline = session.timeline();
    println!("pool:       {}", session.pool.effective().join(", "));
    println!("ms/switch:  {}", timeline.timing().ms_per_switch());
    println!("steps:      {}", timeline.timing().steps_in_duration());
    for (i, name) in timeline.sequence().names().iter().enumerate() {
        println!("{i:>4}  {name}");
    }
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let session = Session::open(&args.settings)?;
    let timeline = session.timeline();
    let (index, font) = timeline.font_at(args.at_ms as f64);

    let edge = if args.hard {
        EdgeMode::hard()
    } else {
        EdgeMode::Smooth
    };
    let mut renderer = FrameRenderer::new(Arc::clone(&session.loader)).with_edge_mode(edge);
    let mut surface = Surface::new(session.cfg.canvas)?;
    let frame = renderer.render_frame(&session.cfg, font, &mut surface)?;

    write_png(&args.out, &frame)?;
    eprintln!("wrote {} (step {index}, {font})", args.out.display());
    Ok(())
}

fn cmd_preview(args: PreviewArgs) -> anyhow::Result<()> {
    let session = Session::open(&args.settings)?;
    let timeline = session.timeline();
    session.warm_fonts(&timeline);

    let clock: Arc<dyn ClockSource> = Arc::new(SystemClock::new());
    let mut anim = AnimationLoop::new(session.cfg.clone(), session.pool.clone(), Arc::clone(&clock))?;
    let mut renderer =
        FrameRenderer::new(Arc::clone(&session.loader)).with_font_wait(Duration::ZERO);
    let mut surface = Surface::new(session.cfg.canvas)?;
    let mut sched = QueuedScheduler::new();

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("create output dir '{}'", args.out_dir.display()))?;

    let mut written = 0u64;
    let mut tick = anim.restart(&mut renderer, &mut surface, &mut sched)?;
    loop {
        if let Tick::Drawn { index, font, .. } = &tick {
            let path = args
                .out_dir
                .join(format!("frame-{written:05}-{index:03}.png"));
            write_png(&path, &surface.snapshot(Some(font.clone())))?;
            written += 1;
        }
        if anim.loops_completed() >= args.cycles {
            break;
        }
        // One display refresh at 60 Hz.
        clock.sleep_ms(1000.0 / 60.0);
        let Some(token) = sched.take_pending() else {
            break;
        };
        tick = anim.on_redraw(token, &mut renderer, &mut surface, &mut sched)?;
    }
    anim.pause(&mut sched);

    eprintln!("wrote {written} frames to {}", args.out_dir.display());
    Ok(())
}

fn cmd_gif(args: ExportArgs) -> anyhow::Result<()> {
    let session = Session::open(&args.settings)?;
    let coordinator = ExportCoordinator::new();
    let artifact = GifEncoder::new(Arc::clone(&session.loader)).encode(
        &coordinator,
        &session.cfg,
        &session.pool,
    )?;
    let path = artifact.write_to_dir(&args.out_dir)?;
    eprintln!("wrote {}", path.display());
    Ok(())
}

fn cmd_webm(args: ExportArgs) -> anyhow::Result<()> {
    let session = Session::open(&args.settings)?;
    let timeline = session.timeline();
    session.warm_fonts(&timeline);

    let backend = FfmpegBackend::detect();
    let clock: Arc<dyn ClockSource> = Arc::new(SystemClock::new());
    let mut anim = AnimationLoop::new(session.cfg.clone(), session.pool.clone(), clock)?;
    let mut renderer =
        FrameRenderer::new(Arc::clone(&session.loader)).with_font_wait(Duration::ZERO);
    let mut surface = Surface::new(session.cfg.canvas)?;
    let mut sched = QueuedScheduler::new();

    let coordinator = ExportCoordinator::new().with_observer(|kind, pct| {
        tracing::debug!(%kind, pct, "export progress");
    });
    let artifact = RealtimeCapture::new(&backend)
        .with_options(CaptureOptions::default())
        .capture(&coordinator, &mut anim, &mut renderer, &mut surface, &mut sched)?;
    let path = artifact.write_to_dir(&args.out_dir)?;
    eprintln!("wrote {}", path.display());
    Ok(())
}

fn cmd_script(args: ExportArgs) -> anyhow::Result<()> {
    let session = Session::open(&args.settings)?;
    let coordinator = ExportCoordinator::new();
    let artifact = typecut::export_script(
        &coordinator,
        &session.cfg,
        &session.pool,
        &ScriptOptions::default(),
    )?;
    let path = artifact.write_to_dir(&args.out_dir)?;
    eprintln!("wrote {}", path.display());
    Ok(())
}

fn cmd_fonts_verify(args: VerifyArgs) -> anyhow::Result<()> {
    let resolver = Arc::new(system_resolver(&args.font_dirs));
    let loader = FontLoader::with_timeout(resolver, Duration::from_millis(args.timeout_ms));
    let usable = loader.verify_usable(&args.families);
    for family in &args.families {
        let name = typecut::normalize_font_name(family);
        let status = if usable.contains(&name) {
            if loader.is_distinct_from_fallback(&name) {
                "ok"
            } else {
                "ok (same face as fallback)"
            }
        } else {
            "unusable"
        };
        println!("{name}: {status}");
    }
    Ok(())
}

fn cmd_fonts_randomize(args: RandomizeArgs) -> anyhow::Result<()> {
    let resolver = system_resolver(&args.font_dirs);
    let extra = resolver.families();
    let loader = FontLoader::new(Arc::new(resolver));
    let mut rng = ShuffleRng::new(args.seed);
    let pool = typecut::randomize_pool(&extra, &loader, &mut rng).context("randomize font pool")?;
    println!("{}", pool.names().join(","));
    Ok(())
}

fn write_png(path: &Path, frame: &typecut::Frame) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        path,
        &frame.to_straight_rgba(),
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", path.display()))
}
