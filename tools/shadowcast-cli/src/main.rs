//! Shadowcast CLI: render shadowing-practice videos from subtitle clips.
//!
//! Usage:
//!   shadowcast render <CLIP> -c <CLIPS> -t <TEMPLATE>    Render one clip
//!   shadowcast batch <CLIP>... -c <CLIPS> -t <TEMPLATE>  Render and merge several clips
//!   shadowcast compile <CLIP> -c <CLIPS> -t <TEMPLATE>   Print the ffmpeg invocation
//!   shadowcast status <ID>                               Show one job
//!   shadowcast jobs [--active] [--limit N]               List jobs
//!   shadowcast cleanup                                   Delete finished jobs past retention
//!   shadowcast check                                     Check ffmpeg/ffprobe availability
//!   shadowcast init-template <PATH>                      Write a starter template
//!   shadowcast validate <TEMPLATE>                       Validate a template

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use shadowcast_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "shadowcast",
    about = "Render shadowing-practice videos with ffmpeg",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to the standard location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a single clip
    Render {
        /// Clip id
        clip: String,

        /// JSON file with the clip catalog
        #[arg(short, long)]
        clips: PathBuf,

        /// Template file
        #[arg(short, long)]
        template: PathBuf,
    },

    /// Render several clips into one video
    Batch {
        /// Clip ids in output order
        #[arg(required = true)]
        clip_ids: Vec<String>,

        /// JSON file with the clip catalog
        #[arg(short, long)]
        clips: PathBuf,

        /// Template file
        #[arg(short, long)]
        template: PathBuf,
    },

    /// Print the ffmpeg invocation for a clip without running it
    Compile {
        /// Clip id
        clip: String,

        /// JSON file with the clip catalog
        #[arg(short, long)]
        clips: PathBuf,

        /// Template file
        #[arg(short, long)]
        template: PathBuf,

        /// Output file written by the printed command
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the status of a job
    Status {
        /// Job id
        id: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List jobs
    Jobs {
        /// Only pending and processing jobs
        #[arg(long)]
        active: bool,

        /// Maximum number of jobs to list
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Delete finished jobs older than the retention window
    Cleanup {
        /// Override the configured retention window (hours)
        #[arg(long)]
        hours: Option<u64>,
    },

    /// Check ffmpeg/ffprobe availability
    Check,

    /// Write a starter template
    InitTemplate {
        /// Destination file
        path: PathBuf,

        /// Template id
        #[arg(long, default_value = "shadowing")]
        id: String,

        /// Output aspect ratio: vertical|widescreen
        #[arg(long, default_value = "vertical")]
        aspect: String,

        /// Number of repeats per clip
        #[arg(long, default_value = "3")]
        repeats: u32,

        /// Pause between repeats (seconds)
        #[arg(long, default_value = "1.0")]
        pause: f64,

        /// Reveal subtitles gradually: none, then Korean, then all layers
        #[arg(long)]
        progressive: bool,
    },

    /// Validate a template, optionally against a clip catalog
    Validate {
        /// Template file
        template: PathBuf,

        /// Compile every clip in this catalog with the template
        #[arg(short, long)]
        clips: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {e}", path.display()))?,
        None => AppConfig::load(),
    };

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    let _log_guard = shadowcast_common::logging::init_logging(&logging)?;
    tracing::debug!(
        output_dir = %config.output_dir.display(),
        state_dir = %config.state_dir.display(),
        "Configuration loaded"
    );

    match cli.command {
        Commands::Render {
            clip,
            clips,
            template,
        } => commands::render::run(&config, clip, clips, template).await,
        Commands::Batch {
            clip_ids,
            clips,
            template,
        } => commands::batch::run(&config, clip_ids, clips, template).await,
        Commands::Compile {
            clip,
            clips,
            template,
            output,
        } => commands::compile::run(&config, clip, clips, template, output).await,
        Commands::Status { id, json } => commands::status::run(&config, id, json).await,
        Commands::Jobs { active, limit } => commands::jobs::run(&config, active, limit).await,
        Commands::Cleanup { hours } => commands::cleanup::run(&config, hours).await,
        Commands::Check => commands::check::run(&config),
        Commands::InitTemplate {
            path,
            id,
            aspect,
            repeats,
            pause,
            progressive,
        } => commands::init_template::run(path, id, aspect, repeats, pause, progressive),
        Commands::Validate { template, clips } => commands::validate::run(template, clips),
    }
}
