use anyhow::{Context, Result};
use bili_summary::audio::{check_ffmpeg, check_ffprobe, Ffmpeg};
use bili_summary::summarize::{format_summary_for_comment, format_transcript};
use bili_summary::{
    acquire_transcript, create_backend, parse_input, print_summary, BilibiliClient, Config,
    PipelineOptions, StageExt, Summarizer, TranscriptSource, Transcriber,
};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "bili-summary")]
#[command(version, about = "AI summaries of Bilibili videos")]
#[command(
    long_about = "Summarize a Bilibili video from its subtitles, or from a transcription of its audio when it has none."
)]
struct Cli {
    /// BV id or video URL (a `?p=N` page is honoured)
    video: String,

    /// OpenAI-compatible API key
    #[arg(short = 'k', long = "key", env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// OpenAI-compatible base URL
    #[arg(short = 'b', long = "base-url", env = "OPENAI_BASE_URL")]
    base_url: Option<String>,

    /// Chat model used for the summary
    #[arg(short, long, env = "OPENAI_CHAT_MODEL")]
    model: Option<String>,

    /// Save the summary to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Post the summary as a comment on the video
    #[arg(long)]
    comment: bool,

    /// Transcribe the audio when the video has no subtitles
    #[arg(long)]
    transcribe: bool,

    /// Always transcribe the audio, ignoring subtitles
    #[arg(long)]
    force_transcribe: bool,

    /// Save the flattened transcript to this file
    #[arg(long)]
    transcript_out: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Only log warnings and hide progress spinners
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        Level::DEBUG
    } else if quiet {
        Level::WARN
    } else {
        Level::INFO
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

fn apply_cli(config: &mut Config, cli: &Cli) {
    if let Some(ref key) = cli.api_key {
        config.openai_api_key = Some(key.clone());
    }
    if let Some(ref url) = cli.base_url {
        config.openai_base_url = url.clone();
    }
    if let Some(ref model) = cli.model {
        config.chat_model = model.clone();
    }
}

fn format_duration(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    let video_ref = parse_input(&cli.video)
        .with_context(|| format!("No BV id found in '{}'", cli.video))?;

    let mut config = Config::load().context("Failed to load configuration")?;
    apply_cli(&mut config, &cli);
    config.validate().context("Configuration validation failed")?;

    let client = BilibiliClient::from_config(&config).context("Failed to create Bilibili client")?;

    let video = client
        .video_info(&video_ref.bvid, video_ref.page)
        .await
        .context("Failed to fetch video info")?;

    info!("Title:    {}", video.title);
    info!("Duration: {}", format_duration(video.duration));
    if video.total_pages > 1 {
        info!(
            "Part {}/{} (use ?p=N to choose another part)",
            video.current_page, video.total_pages
        );
    }

    let transcription_enabled = cli.transcribe || cli.force_transcribe;
    let backend = if transcription_enabled {
        let backend = create_backend(&config).context("Failed to create transcription backend")?;
        info!("Transcription backend: {}", backend.name());
        for check in [check_ffmpeg().await, check_ffprobe().await] {
            if let Err(e) = check {
                warn!("{}; audio over the upload limit cannot be split", e);
            }
        }
        Some(backend)
    } else {
        None
    };

    let options = PipelineOptions {
        force_transcribe: cli.force_transcribe,
        show_progress: !cli.quiet,
        ..Default::default()
    };

    let transcript = acquire_transcript(&client, &video, backend.as_ref(), &Ffmpeg, &options)
        .await
        .context("Failed to obtain transcript")?;

    let Some(transcript) = transcript else {
        println!("This video has no subtitles. Re-run with --transcribe to transcribe its audio.");
        return Ok(());
    };

    match transcript.source {
        TranscriptSource::Subtitles => info!("Transcript source: subtitles"),
        TranscriptSource::Transcription { backend } => {
            info!("Transcript source: {} transcription", backend)
        }
    }

    let flattened = format_transcript(&transcript.segments);
    if let Some(ref path) = cli.transcript_out {
        std::fs::write(path, &flattened)
            .with_context(|| format!("Failed to write transcript to {}", path.display()))?;
        info!("Transcript saved to {}", path.display());
    }

    let summarizer = Summarizer::from_config(&config)?;
    let summary = summarizer
        .summarize(&video, &flattened)
        .await
        .stage("summarization")?;

    print_summary(&video, &summary);

    if let Some(ref path) = cli.output {
        std::fs::write(path, &summary)
            .with_context(|| format!("Failed to write summary to {}", path.display()))?;
        info!("Summary saved to {}", path.display());
    }

    if cli.comment {
        let message = format_summary_for_comment(&summary);
        client
            .post_comment(video.aid, &message)
            .await
            .context("Failed to post comment")?;
        println!("Comment posted.");
    }

    Ok(())
}
