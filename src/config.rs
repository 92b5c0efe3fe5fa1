//! Configuration types for diagram rendering.
//!
//! All rendering behaviour is controlled through [`RenderConfig`], built via
//! [`RenderConfigBuilder`]. One struct holds every knob so a run can be
//! logged, compared against another run, or handed to the pipeline
//! orchestrator unchanged.
//!
//! # Design choice: builder over constructor
//! Most callers only touch two or three fields (format, engine, hand-drawn
//! style). The builder lets them set exactly those and rely on documented
//! defaults for the rest, and `build()` is the single place where malformed
//! options are rejected before any rendering begins.

use crate::error::MdSketchError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Default hosted rendering service.
pub const DEFAULT_REMOTE_ENDPOINT: &str = "https://kroki.io";

/// Default name of the directory generated images are written to.
pub const DEFAULT_ASSETS_DIR: &str = ".assets";

/// Configuration for one diagram-conversion pass.
///
/// Built via [`RenderConfig::builder()`] or using [`RenderConfig::default()`].
///
/// # Example
/// ```rust
/// use mdsketch::{RenderConfig, ImageFormat, HandDrawnOptions};
///
/// let config = RenderConfig::builder()
///     .image_format(ImageFormat::Jpg)
///     .scale(2.0)
///     .hand_drawn(HandDrawnOptions { enabled: true, ..Default::default() })
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct RenderConfig {
    /// Directory generated images are written to. Default: `<document dir>/.assets`.
    ///
    /// When the directory lies inside the document's directory the inserted
    /// image links are relative; otherwise they are absolute.
    pub output_dir: Option<PathBuf>,

    /// Directory name used when `output_dir` is not set. Default: `.assets`.
    pub assets_dir_name: String,

    /// Final raster format. Default: [`ImageFormat::Png`].
    pub image_format: ImageFormat,

    /// Render scale factor passed to the local engine. Must be > 0. Default: 1.0.
    pub scale: f32,

    /// Background colour passed to the local engine. Default: `#ffffff`.
    pub background: String,

    /// Which rendering engine to use. Default: [`RenderEngine::Local`].
    pub engine: RenderEngine,

    /// Hand-drawn stylization settings. Default: disabled.
    pub hand_drawn: HandDrawnOptions,

    /// Base URL of the remote rendering service. Default: `https://kroki.io`.
    pub remote_endpoint: String,

    /// Explicit local renderer command.
    ///
    /// `None` looks up `mmdc` on `PATH` and falls back to
    /// `npx -y @mermaid-js/mermaid-cli`.
    pub local_command: Option<PathBuf>,

    /// Wall-clock limit per local render and per remote request, in seconds. Default: 30.
    pub render_timeout_secs: u64,

    /// Cap on captured stdout/stderr of the local renderer, in bytes. Default: 10 MiB.
    pub max_output_bytes: usize,

    /// Explicit headless browser executable. `None` searches `PATH`.
    pub browser_command: Option<PathBuf>,

    /// Raster strategies, tried in order. Default: browser, then vector library.
    pub raster_strategies: Vec<RasterStrategy>,

    /// Seed for colour, texture and sketch randomness. `None` draws from entropy.
    ///
    /// A fixed seed makes the hand-drawn output reproducible run to run.
    pub seed: Option<u64>,

    /// Optional per-block progress sink.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            assets_dir_name: DEFAULT_ASSETS_DIR.to_string(),
            image_format: ImageFormat::default(),
            scale: 1.0,
            background: "#ffffff".to_string(),
            engine: RenderEngine::default(),
            hand_drawn: HandDrawnOptions::default(),
            remote_endpoint: DEFAULT_REMOTE_ENDPOINT.to_string(),
            local_command: None,
            render_timeout_secs: 30,
            max_output_bytes: 10 * 1024 * 1024,
            browser_command: None,
            raster_strategies: vec![RasterStrategy::HeadlessBrowser, RasterStrategy::VectorLibrary],
            seed: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for RenderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderConfig")
            .field("output_dir", &self.output_dir)
            .field("assets_dir_name", &self.assets_dir_name)
            .field("image_format", &self.image_format)
            .field("scale", &self.scale)
            .field("background", &self.background)
            .field("engine", &self.engine)
            .field("hand_drawn", &self.hand_drawn)
            .field("remote_endpoint", &self.remote_endpoint)
            .field("local_command", &self.local_command)
            .field("render_timeout_secs", &self.render_timeout_secs)
            .field("max_output_bytes", &self.max_output_bytes)
            .field("browser_command", &self.browser_command)
            .field("raster_strategies", &self.raster_strategies)
            .field("seed", &self.seed)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl RenderConfig {
    /// Create a new builder for `RenderConfig`.
    pub fn builder() -> RenderConfigBuilder {
        RenderConfigBuilder {
            config: Self::default(),
        }
    }

    /// Whether this pass will try the stylized (SVG → sketch → raster) path at all.
    pub fn wants_sketch(&self) -> bool {
        self.hand_drawn.enabled && self.engine == RenderEngine::Local
    }
}

/// Builder for [`RenderConfig`].
#[derive(Debug)]
pub struct RenderConfigBuilder {
    config: RenderConfig,
}

impl RenderConfigBuilder {
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = Some(dir.into());
        self
    }

    pub fn assets_dir_name(mut self, name: impl Into<String>) -> Self {
        self.config.assets_dir_name = name.into();
        self
    }

    pub fn image_format(mut self, format: ImageFormat) -> Self {
        self.config.image_format = format;
        self
    }

    /// Set the render scale. Not clamped; `build()` rejects non-positive values.
    pub fn scale(mut self, scale: f32) -> Self {
        self.config.scale = scale;
        self
    }

    pub fn background(mut self, color: impl Into<String>) -> Self {
        self.config.background = color.into();
        self
    }

    pub fn engine(mut self, engine: RenderEngine) -> Self {
        self.config.engine = engine;
        self
    }

    pub fn hand_drawn(mut self, options: HandDrawnOptions) -> Self {
        self.config.hand_drawn = options;
        self
    }

    pub fn remote_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.remote_endpoint = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn local_command(mut self, cmd: impl Into<PathBuf>) -> Self {
        self.config.local_command = Some(cmd.into());
        self
    }

    pub fn render_timeout_secs(mut self, secs: u64) -> Self {
        self.config.render_timeout_secs = secs.max(1);
        self
    }

    pub fn max_output_bytes(mut self, bytes: usize) -> Self {
        self.config.max_output_bytes = bytes.max(1);
        self
    }

    pub fn browser_command(mut self, cmd: impl Into<PathBuf>) -> Self {
        self.config.browser_command = Some(cmd.into());
        self
    }

    pub fn raster_strategies(mut self, strategies: Vec<RasterStrategy>) -> Self {
        self.config.raster_strategies = strategies;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RenderConfig, MdSketchError> {
        let c = &self.config;
        if !c.scale.is_finite() || c.scale <= 0.0 {
            return Err(MdSketchError::InvalidConfig(format!(
                "scale must be a positive number, got {}",
                c.scale
            )));
        }
        if c.assets_dir_name.trim().is_empty() {
            return Err(MdSketchError::InvalidConfig(
                "assets directory name must not be empty".into(),
            ));
        }
        if c.background.trim().is_empty() {
            return Err(MdSketchError::InvalidConfig(
                "background colour must not be empty".into(),
            ));
        }
        let r = c.hand_drawn.roughness;
        if !r.is_finite() || !(0.0..=3.0).contains(&r) {
            return Err(MdSketchError::InvalidConfig(format!(
                "roughness must be 0–3, got {r}"
            )));
        }
        if !(c.remote_endpoint.starts_with("http://") || c.remote_endpoint.starts_with("https://"))
        {
            return Err(MdSketchError::InvalidConfig(format!(
                "remote endpoint must be an http(s) URL, got '{}'",
                c.remote_endpoint
            )));
        }
        if c.raster_strategies.is_empty() {
            return Err(MdSketchError::InvalidConfig(
                "at least one raster strategy is required".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Final raster format of generated images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Lossless PNG (default).
    #[default]
    Png,
    /// JPEG, flattened onto white.
    Jpg,
}

impl ImageFormat {
    /// File extension, also used in the generated image name.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpg => "jpg",
        }
    }
}

/// Which backend turns diagram source into an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderEngine {
    /// Local command-line renderer (default). Supports SVG output and therefore stylization.
    #[default]
    Local,
    /// Hosted rendering service. PNG only, so never stylized.
    Remote,
}

/// Raster strategies, tried in the order configured.
///
/// | Strategy | Fidelity | Needs |
/// |----------|----------|-------|
/// | `HeadlessBrowser` | full, including HTML labels in `foreignObject` | Chromium/Chrome on `PATH` |
/// | `VectorLibrary` | drops `foreignObject` text | nothing (pure Rust) |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RasterStrategy {
    HeadlessBrowser,
    VectorLibrary,
}

/// Fill texture of a sketched shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FillTexture {
    /// Parallel diagonal strokes (default).
    #[default]
    Hachure,
    /// Two crossing sets of hachure strokes.
    CrossHatch,
    /// One continuous zigzag stroke.
    ZigZag,
    /// Plain solid fill.
    Solid,
    /// Dot fill. Selectable as a default but never drawn by random sampling.
    Dots,
}

impl FillTexture {
    /// Textures random sampling may pick from.
    pub const SAMPLED: [FillTexture; 4] = [
        FillTexture::Hachure,
        FillTexture::CrossHatch,
        FillTexture::ZigZag,
        FillTexture::Solid,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FillTexture::Hachure => "hachure",
            FillTexture::CrossHatch => "cross-hatch",
            FillTexture::ZigZag => "zigzag",
            FillTexture::Solid => "solid",
            FillTexture::Dots => "dots",
        }
    }
}

impl fmt::Display for FillTexture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hand-drawn stylization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandDrawnOptions {
    /// Turn stylization on. Default: false.
    pub enabled: bool,
    /// Sketch roughness, 0–3. Default: 1.5.
    pub roughness: f32,
    /// Texture used when neither grouping nor randomization picks one. Default: hachure.
    pub fill_texture: FillTexture,
    /// Perturb each element's colour independently. Default: true.
    pub randomize_colors: bool,
    /// Pick a random texture per group or element. Default: true.
    pub randomize_textures: bool,
    /// Give all elements sharing a structural group key one colour. Default: true.
    pub group_colors_by_block: bool,
}

impl Default for HandDrawnOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            roughness: 1.5,
            fill_texture: FillTexture::default(),
            randomize_colors: true,
            randomize_textures: true,
            group_colors_by_block: true,
        }
    }
}

/// Options for [`crate::chain::run_pipeline`].
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Document to process. Never written to.
    pub path: PathBuf,
    /// Run the convert-diagrams stage. Default: true.
    pub convert_diagrams: bool,
    /// Run the collect/upload/rewrite stages. Default: false.
    pub upload_images: bool,
    /// Rendering settings for the convert-diagrams stage.
    pub render: RenderConfig,
}

impl PipelineOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            convert_diagrams: true,
            upload_images: false,
            render: RenderConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = RenderConfig::default();
        assert_eq!(c.image_format, ImageFormat::Png);
        assert_eq!(c.scale, 1.0);
        assert_eq!(c.background, "#ffffff");
        assert_eq!(c.engine, RenderEngine::Local);
        assert_eq!(c.render_timeout_secs, 30);
        assert_eq!(c.max_output_bytes, 10 * 1024 * 1024);
        assert_eq!(c.assets_dir_name, ".assets");
        assert!(!c.hand_drawn.enabled);
        assert_eq!(c.hand_drawn.roughness, 1.5);
        assert_eq!(c.hand_drawn.fill_texture, FillTexture::Hachure);
    }

    #[test]
    fn builder_rejects_non_positive_scale() {
        let err = RenderConfig::builder().scale(0.0).build().unwrap_err();
        assert!(matches!(err, MdSketchError::InvalidConfig(_)));
        let err = RenderConfig::builder().scale(f32::NAN).build().unwrap_err();
        assert!(matches!(err, MdSketchError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_out_of_range_roughness() {
        let err = RenderConfig::builder()
            .hand_drawn(HandDrawnOptions {
                roughness: 3.5,
                ..Default::default()
            })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("roughness"));
    }

    #[test]
    fn builder_rejects_empty_strategy_list() {
        assert!(RenderConfig::builder()
            .raster_strategies(vec![])
            .build()
            .is_err());
    }

    #[test]
    fn builder_rejects_non_http_endpoint() {
        assert!(RenderConfig::builder()
            .remote_endpoint("ftp://example.com")
            .build()
            .is_err());
    }

    #[test]
    fn builder_trims_endpoint_slash_and_clamps_timeout() {
        let c = RenderConfig::builder()
            .remote_endpoint("https://kroki.example/")
            .render_timeout_secs(0)
            .build()
            .unwrap();
        assert_eq!(c.remote_endpoint, "https://kroki.example");
        assert_eq!(c.render_timeout_secs, 1);
    }

    #[test]
    fn sketch_only_with_local_engine() {
        let hd = HandDrawnOptions {
            enabled: true,
            ..Default::default()
        };
        let local = RenderConfig::builder().hand_drawn(hd.clone()).build().unwrap();
        assert!(local.wants_sketch());
        let remote = RenderConfig::builder()
            .hand_drawn(hd)
            .engine(RenderEngine::Remote)
            .build()
            .unwrap();
        assert!(!remote.wants_sketch());
    }

    #[test]
    fn sampled_textures_exclude_dots() {
        assert!(!FillTexture::SAMPLED.contains(&FillTexture::Dots));
        assert_eq!(FillTexture::CrossHatch.to_string(), "cross-hatch");
    }
}
