//! CLI binary for mdsketch.
//!
//! A thin shim over the library crate that maps CLI flags (with `MDSKETCH_*`
//! environment fallbacks) to `RenderConfig` and prints results. Logs go to
//! stderr; stdout carries only the derived document path or JSON.

use anyhow::{Context, Result};
use clap::Parser;
use mdsketch::{
    convert_diagrams, ConversionProgressCallback, FillTexture, HandDrawnOptions, ImageFormat,
    ProgressCallback, RasterStrategy, RenderConfig, RenderEngine,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per diagram.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&index))
            .map_or(0.0, |t| t.elapsed().as_secs_f64())
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_blocks: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} diagrams  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        self.bar.set_length(total_blocks as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Rendering");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Rendering {total_blocks} diagrams…"))
        ));
    }

    fn on_block_start(&self, index: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(index, Instant::now());
        }
        self.bar.set_message(format!("diagram {index}"));
    }

    fn on_block_complete(&self, index: usize, total: usize, path: &Path) {
        let secs = self.elapsed_secs(index);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.bar.println(format!(
            "  {} Diagram {:>3}/{:<3}  {}  {}",
            green("✓"),
            index,
            total,
            name,
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_block_error(&self, index: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(index);
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Diagram {:>3}/{:<3}  {}  {}",
            red("✗"),
            index,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_degraded(&self, index: usize, message: &str) {
        self.bar
            .println(format!("  {} Diagram {:>3}  {}", yellow("!"), index, dim(message)));
    }

    fn on_conversion_complete(&self, total: usize, success: usize) {
        let failed = total.saturating_sub(success);
        self.bar.finish_and_clear();
        if failed == 0 {
            eprintln!("{} {} diagrams rendered", green("✔"), bold(&success.to_string()));
        } else {
            eprintln!(
                "{} {}/{} diagrams rendered  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&success.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Render every mermaid block; writes article.converted.md
  mdsketch article.md

  # Hand-drawn style, reproducible
  mdsketch --hand-drawn --seed 42 article.md

  # JPG via the hosted renderer (never stylized)
  mdsketch --engine remote --format jpg article.md

  # Images somewhere else, no browser
  mdsketch --output-dir /tmp/diagrams --raster vector article.md

FILES:
  article.md                          input, never modified
  article.converted.md                blocks replaced by image links
  .assets/article__mmd_<i>.<ext>      one image per rendered block
  .assets/article__mmd_<i>.hand-drawn.svg   stylized SVG (hand-drawn runs)

REQUIREMENTS:
  Local engine   mmdc on PATH, or npx (fetches @mermaid-js/mermaid-cli)
  Hand-drawn     a Chromium/Chrome binary gives full fidelity; without one
                 the built-in rasteriser is used and HTML label text is lost
"#;

/// Render Mermaid diagrams in Markdown to images.
#[derive(Parser, Debug)]
#[command(
    name = "mdsketch",
    version,
    about = "Render Mermaid diagrams in Markdown to (optionally hand-drawn) images",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Markdown document to convert.
    input: PathBuf,

    /// Directory for generated images. Default: <document dir>/.assets
    #[arg(short, long, env = "MDSKETCH_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Image format.
    #[arg(short, long, env = "MDSKETCH_FORMAT", value_enum, default_value = "png")]
    format: FormatArg,

    /// Render scale factor.
    #[arg(short, long, env = "MDSKETCH_SCALE", default_value_t = 1.0)]
    scale: f32,

    /// Background colour passed to the renderer.
    #[arg(short, long, env = "MDSKETCH_BACKGROUND", default_value = "#ffffff")]
    background: String,

    /// Rendering engine.
    #[arg(short, long, env = "MDSKETCH_ENGINE", value_enum, default_value = "local")]
    engine: EngineArg,

    /// Restyle diagrams to look hand-drawn (local engine only).
    #[arg(long, env = "MDSKETCH_HAND_DRAWN")]
    hand_drawn: bool,

    /// Sketch roughness, 0–3.
    #[arg(long, env = "MDSKETCH_ROUGHNESS", default_value_t = 1.5)]
    roughness: f32,

    /// Default fill texture.
    #[arg(long, env = "MDSKETCH_FILL", value_enum, default_value = "hachure")]
    fill: TextureArg,

    /// Keep each element's own colour instead of perturbing it.
    #[arg(long, env = "MDSKETCH_NO_RANDOM_COLORS")]
    no_random_colors: bool,

    /// Always use the default fill texture.
    #[arg(long, env = "MDSKETCH_NO_RANDOM_TEXTURES")]
    no_random_textures: bool,

    /// Do not give structurally related elements a shared colour.
    #[arg(long, env = "MDSKETCH_NO_GROUP_COLORS")]
    no_group_colors: bool,

    /// Seed for reproducible hand-drawn output.
    #[arg(long, env = "MDSKETCH_SEED")]
    seed: Option<u64>,

    /// Hosted renderer base URL.
    #[arg(long, env = "MDSKETCH_REMOTE_ENDPOINT", default_value = mdsketch::config::DEFAULT_REMOTE_ENDPOINT)]
    remote_endpoint: String,

    /// Local renderer executable. Default: mmdc on PATH, else npx.
    #[arg(long, env = "MDSKETCH_MMDC")]
    mmdc: Option<PathBuf>,

    /// Headless browser executable. Default: chromium/chrome on PATH.
    #[arg(long, env = "MDSKETCH_BROWSER")]
    browser: Option<PathBuf>,

    /// Raster strategies in order of preference.
    #[arg(long, env = "MDSKETCH_RASTER", value_enum, value_delimiter = ',',
          default_values_t = vec![RasterArg::Browser, RasterArg::Vector])]
    raster: Vec<RasterArg>,

    /// Per-diagram render timeout in seconds.
    #[arg(long, env = "MDSKETCH_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// Output JSON (ConversionOutput) instead of the derived document path.
    #[arg(long, env = "MDSKETCH_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "MDSKETCH_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MDSKETCH_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MDSKETCH_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Png,
    Jpg,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum EngineArg {
    Local,
    Remote,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum TextureArg {
    Hachure,
    CrossHatch,
    Zigzag,
    Solid,
    Dots,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum RasterArg {
    Browser,
    Vector,
}

impl From<FormatArg> for ImageFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Png => ImageFormat::Png,
            FormatArg::Jpg => ImageFormat::Jpg,
        }
    }
}

impl From<EngineArg> for RenderEngine {
    fn from(v: EngineArg) -> Self {
        match v {
            EngineArg::Local => RenderEngine::Local,
            EngineArg::Remote => RenderEngine::Remote,
        }
    }
}

impl From<TextureArg> for FillTexture {
    fn from(v: TextureArg) -> Self {
        match v {
            TextureArg::Hachure => FillTexture::Hachure,
            TextureArg::CrossHatch => FillTexture::CrossHatch,
            TextureArg::Zigzag => FillTexture::ZigZag,
            TextureArg::Solid => FillTexture::Solid,
            TextureArg::Dots => FillTexture::Dots,
        }
    }
}

impl From<RasterArg> for RasterStrategy {
    fn from(v: RasterArg) -> Self {
        match v {
            RasterArg::Browser => RasterStrategy::HeadlessBrowser,
            RasterArg::Vector => RasterStrategy::VectorLibrary,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs unless --verbose.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run conversion ───────────────────────────────────────────────────
    let output = convert_diagrams(&cli.input, &config)
        .await
        .context("Conversion failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }

    println!("{}", output.document_path.display());

    if !cli.quiet {
        if output.total_blocks == 0 {
            eprintln!("{} no mermaid blocks found; document left as is", dim("·"));
        } else if !show_progress {
            eprintln!(
                "Rendered {}/{} diagrams",
                output.images.len(),
                output.total_blocks
            );
            for e in &output.errors {
                eprintln!("  {} {}", red("✗"), e);
            }
        }
        if output.wrote_document() {
            eprintln!("   {}", dim(&format!("→ {}", output.document_path.display())));
        }
    }

    Ok(())
}

/// Map CLI args to `RenderConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<RenderConfig> {
    let hand_drawn = HandDrawnOptions {
        enabled: cli.hand_drawn,
        roughness: cli.roughness,
        fill_texture: cli.fill.into(),
        randomize_colors: !cli.no_random_colors,
        randomize_textures: !cli.no_random_textures,
        group_colors_by_block: !cli.no_group_colors,
    };

    let mut builder = RenderConfig::builder()
        .image_format(cli.format.into())
        .scale(cli.scale)
        .background(cli.background.clone())
        .engine(cli.engine.into())
        .hand_drawn(hand_drawn)
        .remote_endpoint(cli.remote_endpoint.clone())
        .render_timeout_secs(cli.timeout)
        .raster_strategies(cli.raster.iter().map(|&r| r.into()).collect());

    if let Some(ref dir) = cli.output_dir {
        builder = builder.output_dir(dir.clone());
    }
    if let Some(ref cmd) = cli.mmdc {
        builder = builder.local_command(cmd.clone());
    }
    if let Some(ref browser) = cli.browser {
        builder = builder.browser_command(browser.clone());
    }
    if let Some(seed) = cli.seed {
        builder = builder.seed(seed);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
