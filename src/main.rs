use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;

use storage_tube::config::{default_workers, DEFAULT_FPS, DEFAULT_SCALE_FACTOR};
use storage_tube::{load_file, save_file, FfmpegBackend, RawBackend, TubeConfig, VideoBackend};

/// storage-tube: store any file as black/white video frames and load it back.
#[derive(Parser)]
#[command(name = "storage-tube", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Hide progress bars
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Container {
    /// Lossless FFV1 through ffmpeg
    Ffv1,
    /// Uncompressed frames, no ffmpeg needed
    Raw,
}

impl Container {
    fn extension(self) -> &'static str {
        match self {
            Container::Ffv1 => "mkv",
            Container::Raw => "stvr",
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Save a file into a video
    Save {
        /// File to store
        #[arg(short, long)]
        input: PathBuf,

        /// Folder the video is written to
        #[arg(short = 'f', long, default_value = ".")]
        output_folder: PathBuf,

        /// Video file name without extension (default: input file stem)
        #[arg(short = 'n', long)]
        output_name: Option<String>,

        /// Size of one data cell in pixels (default: 4)
        #[arg(long, default_value_t = DEFAULT_SCALE_FACTOR)]
        scale: u32,

        /// Frames per second (default: 20)
        #[arg(long, default_value_t = DEFAULT_FPS)]
        fps: u32,

        /// Video container to write
        #[arg(long, value_enum, default_value_t = Container::Ffv1)]
        container: Container,
    },

    /// Load a file back out of a video
    Load {
        /// Video to read
        #[arg(short, long)]
        input: PathBuf,

        /// Folder the restored file is written to
        #[arg(short = 'f', long, default_value = ".")]
        output_folder: PathBuf,

        /// Restored file name; the stored extension is kept
        #[arg(short = 'n', long)]
        output_name: Option<String>,

        /// Scale factor the video was saved with
        #[arg(long, default_value_t = DEFAULT_SCALE_FACTOR)]
        scale: u32,

        /// Parallel decode workers
        #[arg(short, long, default_value_t = default_workers())]
        workers: usize,

        /// Video container to read
        #[arg(long, value_enum, default_value_t = Container::Ffv1)]
        container: Container,
    },
}

fn save_with<B: VideoBackend>(
    backend: &B,
    input: &Path,
    output: &Path,
    cfg: &TubeConfig,
) -> Result<()> {
    let report = save_file(input, output, cfg, backend)?;
    info!(
        "stored {} ({} bytes) in {} frames: {}",
        report.file_name,
        report.total_bytes,
        report.frames,
        output.display()
    );
    Ok(())
}

fn load_with<B: VideoBackend>(
    backend: &B,
    input: &Path,
    output_folder: &Path,
    output_name: Option<&str>,
    cfg: &TubeConfig,
) -> Result<()> {
    let report = load_file(input, output_folder, output_name, cfg, backend)?;
    info!(
        "restored {} bytes from {} frames with {} workers: {}",
        report.total_bytes,
        report.decoded_frames,
        report.workers,
        report.path.display()
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Save {
            input,
            output_folder,
            output_name,
            scale,
            fps,
            container,
        } => {
            let cfg = TubeConfig {
                scale_factor: scale,
                fps,
                show_progress: !cli.quiet,
                ..Default::default()
            };

            let stem = match output_name {
                Some(name) => name,
                None => input
                    .file_stem()
                    .context("input path has no file name")?
                    .to_string_lossy()
                    .into_owned(),
            };
            std::fs::create_dir_all(&output_folder)
                .with_context(|| format!("failed to create {}", output_folder.display()))?;
            let output = output_folder.join(format!("{}.{}", stem, container.extension()));

            match container {
                Container::Ffv1 => save_with(&FfmpegBackend, &input, &output, &cfg)?,
                Container::Raw => save_with(&RawBackend, &input, &output, &cfg)?,
            }
        }

        Commands::Load {
            input,
            output_folder,
            output_name,
            scale,
            workers,
            container,
        } => {
            let cfg = TubeConfig {
                scale_factor: scale,
                workers,
                show_progress: !cli.quiet,
                ..Default::default()
            };
            let output_name = output_name.as_deref();

            match container {
                Container::Ffv1 => {
                    load_with(&FfmpegBackend, &input, &output_folder, output_name, &cfg)?
                }
                Container::Raw => load_with(&RawBackend, &input, &output_folder, output_name, &cfg)?,
            }
        }
    }

    Ok(())
}
