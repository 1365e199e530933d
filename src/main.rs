use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use voxchat::api::ApiServer;
use voxchat::voice::{AudioPayload, inspect_wav};
use voxchat::{Config, ConversationSession, Services};

/// voxchat - Talk to a chatbot with your voice
#[derive(Parser)]
#[command(name = "voxchat", version, about)]
struct Cli {
    /// Port to listen on (overrides config)
    #[arg(long, env = "VOXCHAT_PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Run a single voice turn from a WAV file
    Turn {
        /// Recorded speech (WAV)
        input: PathBuf,
        /// Where to write the spoken reply
        #[arg(short, long, default_value = "reply.mp3")]
        output: PathBuf,
    },
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
        /// Where to write the audio
        #[arg(short, long, default_value = "tts-test.mp3")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,voxchat=info",
        1 => "info,voxchat=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load();
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    tracing::debug!(?config, "loaded configuration");

    let services = Services::from_config(&config);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&config, &services).await,
        Command::Turn { input, output } => one_turn(&config, &services, &input, &output).await,
        Command::TestTts { text, output } => test_tts(&services, &text, &output).await,
    }
}

/// Run the HTTP API until Ctrl-C
async fn serve(config: &Config, services: &Services) -> anyhow::Result<()> {
    tracing::info!(
        port = config.server.port,
        llm_model = %config.llm.model,
        stt_model = %config.stt.model,
        "starting voxchat"
    );

    let server = ApiServer::new(
        services.pipeline(),
        services.session_store(config),
        config.server.port,
    )
    .static_dir(config.server.static_dir.clone())
    .max_audio_bytes(config.server.max_audio_bytes)
    .session_ttl(config.server.session_ttl);

    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
            shutdown.cancel();
        }
    });

    server.run().await?;
    Ok(())
}

/// Transcribe, answer and speak one recording
async fn one_turn(
    config: &Config,
    services: &Services,
    input: &Path,
    output: &Path,
) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(input).await?;
    let info = inspect_wav(&bytes)?;
    tracing::info!(
        channels = info.channels,
        sample_rate = info.sample_rate,
        duration_ms = u64::try_from(info.duration.as_millis()).unwrap_or(u64::MAX),
        "read recording"
    );
    if info.channels != 1 {
        tracing::warn!(channels = info.channels, "expected mono audio");
    }

    let mut session = ConversationSession::new(services.chat.clone(), config.llm.session_settings());
    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let outcome = services
        .pipeline()
        .process_cancellable(&mut session, &AudioPayload::wav(bytes), &[], &cancel)
        .await?;

    if let Some(entry) = outcome.latest() {
        println!("you:       {}", entry.user());
        println!("assistant: {}", entry.assistant());
    }

    tokio::fs::write(output, outcome.response_audio.bytes()).await?;
    println!(
        "wrote {} bytes of audio to {}",
        outcome.response_audio.len(),
        output.display()
    );

    Ok(())
}

/// Test TTS output
async fn test_tts(services: &Services, text: &str, output: &Path) -> anyhow::Result<()> {
    println!("Synthesizing: \"{text}\"");

    let audio = services.synthesizer.synthesize(text).await?;
    tokio::fs::write(output, audio.bytes()).await?;

    println!("Wrote {} bytes of {} to {}", audio.len(), audio.mime_type(), output.display());
    Ok(())
}
