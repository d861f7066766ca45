//! Kolosal Vision CLI Module
//!
//! Command-line interface for serving, one-off predictions and artifact
//! inspection.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::inference::PredictionService;
use crate::model::InferenceArtifact;
use crate::options::RequestOptions;
use crate::preprocessing::RawImage;
use crate::server::{run_server, ServerConfig};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_run(msg: &str) {
    eprint!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    eprintln!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "kolosal-vision")]
#[command(author = "KolosalAI")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Image classification prediction server")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the prediction server
    Serve {
        /// Host to bind to (defaults to API_HOST or 0.0.0.0)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (defaults to API_PORT or 8080)
        #[arg(short, long)]
        port: Option<u16>,

        /// Model artifact directory (defaults to MODEL_DIR or ./model)
        #[arg(short, long)]
        model_dir: Option<PathBuf>,

        /// Per-request deadline in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Maximum predictions computing at once
        #[arg(long)]
        max_concurrency: Option<usize>,
    },

    /// Classify one image file without starting the server
    Predict {
        /// Model artifact directory
        #[arg(short, long)]
        model_dir: PathBuf,

        /// Image file to classify
        #[arg(short, long)]
        image: PathBuf,

        /// Reject images that do not already match the model input size
        #[arg(long)]
        no_resize: bool,

        /// Report the raw model score instead of a calibrated probability
        #[arg(long)]
        raw: bool,
    },

    /// Show the input shape, labels and calibration of a model artifact
    Info {
        /// Model artifact directory
        #[arg(short, long)]
        model_dir: PathBuf,
    },
}

/// Server settings: environment defaults overridden by command-line flags
#[derive(Debug, Default, Clone)]
pub struct ServeArgs {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub model_dir: Option<PathBuf>,
    pub timeout_ms: Option<u64>,
    pub max_concurrency: Option<usize>,
}

impl ServeArgs {
    pub fn into_config(self) -> ServerConfig {
        let mut config = ServerConfig::default();
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(model_dir) = self.model_dir {
            config.model_dir = model_dir;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.request_timeout_ms = timeout_ms;
        }
        if let Some(n) = self.max_concurrency {
            config.max_concurrent_inferences = n.max(1);
        }
        config
    }
}

// ─── Predict ───────────────────────────────────────────────────────────────────

pub fn cmd_predict(model_dir: &Path, image_path: &Path, no_resize: bool, raw: bool) -> anyhow::Result<()> {
    step_run("Loading model");
    let start = Instant::now();
    let artifact = Arc::new(InferenceArtifact::load(model_dir)?);
    step_done(&format!("{} labels, {:?}", artifact.labels().len(), start.elapsed()));

    let bytes = std::fs::read(image_path)?;
    let options = RequestOptions::new()
        .with_resize(!no_resize)
        .with_post_process(!raw);

    step_run("Predicting");
    let start = Instant::now();
    let service = PredictionService::new(artifact);
    let result = service.predict(RawImage::new(bytes, None), options)?;
    step_done(&format!("{:?}", start.elapsed()));

    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}

// ─── Info ──────────────────────────────────────────────────────────────────────

pub fn cmd_info(model_dir: &Path) -> anyhow::Result<()> {
    section("Model Info");

    let artifact = InferenceArtifact::load(model_dir)?;
    let summary = artifact.describe();

    println!("  {:<14} {}", muted("Directory"), model_dir.display());
    println!("  {:<14} {}", muted("Backend"), summary.backend);
    println!("  {:<14} {}", muted("Input shape"), summary.input_shape);
    println!("  {:<14} {:?}", muted("Layout"), summary.layout);
    println!("  {:<14} {}", muted("Temperature"), summary.temperature);
    println!("  {:<14} {}", muted("Labels"), summary.num_labels);
    println!();

    println!("  {:>6}  {}", muted("Index"), muted("Label"));
    println!("  {}", dim(&"─".repeat(30)));
    for (i, label) in summary.labels.iter().enumerate() {
        println!("  {:>6}  {}", i, label);
    }

    println!();
    Ok(())
}

// ─── Serve ─────────────────────────────────────────────────────────────────────

pub async fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = args.into_config();
    let host = &config.host;
    let port = config.port;

    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", "Kolosal Vision".white().bold()));
    line_box_center(&format!("{}", dim(&format!("v{}", env!("CARGO_PKG_VERSION")))));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("Predict", &format!("http://{}:{}/predict/image", host, port)));
    line_box(&kv("Health ", &format!("http://{}:{}/health", host, port)));
    line_box(&kv("Model  ", &config.model_dir.display().to_string()));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box_center(&format!("{}", dim("ctrl+c to stop")));
    line_box_empty();
    line_box_bottom();
    println!();

    run_server(config).await
}
