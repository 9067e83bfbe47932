//! # lottie-engine CLI
//!
//! ## Commands
//! - `info`: size, frame rate, frame count, duration and markers
//! - `render`: write one frame as an image
//! - `export`: write an animated GIF or PNG
//! - `tree`: print the render tree of one frame

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use lottie_engine::{ExportOptions, LottieAnimation};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lottie-engine")]
#[command(about = "Render Lottie animations on the CPU")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show document metadata
    Info {
        /// Lottie JSON or .tgs file
        input: PathBuf,
    },

    /// Render a single frame to an image file
    Render {
        input: PathBuf,

        /// Output image; the format follows the extension
        #[arg(short, long)]
        output: PathBuf,

        /// Frame index
        #[arg(short, long, conflicts_with = "pos")]
        frame: Option<usize>,

        /// Position through the animation, 0.0 to 1.0
        #[arg(short, long)]
        pos: Option<f32>,

        #[arg(long)]
        width: Option<u32>,

        #[arg(long)]
        height: Option<u32>,
    },

    /// Export an animated .gif or .png
    Export {
        input: PathBuf,

        output: PathBuf,

        /// JSON file with export options; flags override its fields
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(long)]
        fps: Option<f32>,

        #[arg(long)]
        width: Option<u32>,

        #[arg(long)]
        height: Option<u32>,

        /// First output frame
        #[arg(long)]
        start: Option<usize>,

        /// Output frame to stop before
        #[arg(long)]
        end: Option<usize>,

        /// Play count, 0 loops forever
        #[arg(long)]
        loops: Option<u16>,
    },

    /// Print the render tree of a frame
    Tree {
        input: PathBuf,

        #[arg(short, long, default_value = "0")]
        frame: usize,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Info { input } => cmd_info(&input),
        Commands::Render {
            input,
            output,
            frame,
            pos,
            width,
            height,
        } => cmd_render(&input, &output, frame, pos, width, height),
        Commands::Export {
            input,
            output,
            config,
            fps,
            width,
            height,
            start,
            end,
            loops,
        } => {
            let mut options = match config {
                Some(path) => {
                    let bytes = std::fs::read(&path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    ExportOptions::from_json(&bytes)
                        .with_context(|| format!("parsing {}", path.display()))?
                }
                None => ExportOptions::default(),
            };
            options.fps = fps.or(options.fps);
            options.width = width.or(options.width);
            options.height = height.or(options.height);
            options.loop_count = loops.or(options.loop_count);
            if start.is_some() || end.is_some() {
                let (s, e) = options.frame_range.unwrap_or((0, usize::MAX));
                let e = end.unwrap_or(e);
                if e == usize::MAX {
                    bail!("--start needs --end or a frame_range in the config");
                }
                options.frame_range = Some((start.unwrap_or(s), e));
            }
            cmd_export(&input, &output, &options)
        }
        Commands::Tree { input, frame } => cmd_tree(&input, frame),
    }
}

fn load(input: &Path) -> Result<LottieAnimation> {
    LottieAnimation::from_file(input).with_context(|| format!("loading {}", input.display()))
}

fn cmd_info(input: &Path) -> Result<()> {
    let anim = load(input)?;
    let (w, h) = anim.size();
    let doc = anim.document();
    println!("{}", input.display());
    if let Some(name) = &doc.name {
        println!("  name:        {name}");
    }
    if let Some(version) = &doc.version {
        println!("  version:     {version}");
    }
    println!("  size:        {w}x{h}");
    println!("  frame rate:  {}", anim.frame_rate());
    println!("  frames:      {}", anim.total_frames());
    println!("  duration:    {:.3}s", anim.duration());
    println!("  layers:      {}", doc.layers.len());
    for marker in anim.markers() {
        println!(
            "  marker:      {} [{}, {}]",
            marker.name, marker.start_frame, marker.end_frame
        );
    }
    Ok(())
}

fn cmd_render(
    input: &Path,
    output: &Path,
    frame: Option<usize>,
    pos: Option<f32>,
    width: Option<u32>,
    height: Option<u32>,
) -> Result<()> {
    let anim = load(input)?;
    let frame = match (frame, pos) {
        (Some(f), _) => f,
        (None, Some(p)) => anim.frame_at_pos(p),
        (None, None) => 0,
    };
    let (w, h) = anim.size();
    let image = anim.render_image(frame, width.unwrap_or(w), height.unwrap_or(h))?;
    image
        .save(output)
        .with_context(|| format!("writing {}", output.display()))?;
    println!("frame {frame} -> {}", output.display());
    Ok(())
}

fn cmd_export(input: &Path, output: &Path, options: &ExportOptions) -> Result<()> {
    let anim = load(input)?;
    anim.save_animation(output, options)
        .with_context(|| format!("exporting {}", output.display()))?;
    println!("{}", output.display());
    Ok(())
}

fn cmd_tree(input: &Path, frame: usize) -> Result<()> {
    let anim = load(input)?;
    print!("{}", anim.render_tree(frame)?);
    Ok(())
}
