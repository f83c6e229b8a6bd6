use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use professora::voice::{OutputFormat, PollySynthesizer, SpeechSynthesizer};
use professora::{Config, Daemon, DirectTransport, Error, RelayClient, Transport, build_orchestrator};

/// Professora - conversational language tutor relay
#[derive(Parser)]
#[command(name = "professora", version, about)]
struct Cli {
    /// Path to a TOML config file (default: ~/.config/professora/config.toml)
    #[arg(short, long, env = "PROFESSORA_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config and environment)
    #[arg(long)]
    port: Option<u16>,

    /// Serve a browser UI bundle from this directory
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the relay server (default)
    Serve,
    /// Run a single turn in-process and print the reply
    Turn {
        /// What the learner said
        text: String,
        /// Write the reply audio to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Interactive session: one line of stdin per turn
    Chat {
        /// Relay URL (e.g. ws://localhost:8001/ws); in-process when omitted
        #[arg(long)]
        relay: Option<String>,
        /// Directory for reply audio files
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Test speech synthesis
    TestTts {
        /// Text to speak
        #[arg(default_value = "Oi! Tudo bem? This is a test of the speech system.")]
        text: String,
        /// Write the audio to this file
        #[arg(short, long, default_value = "professora-tts.mp3")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,professora=info",
        1 => "info,professora=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
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
    match cli.command {
        None | Some(Command::Serve) => {
            let config = load_config(cli.config.as_deref(), cli.port, cli.static_dir)?;
            tracing::debug!(?config, "loaded configuration");

            let daemon = Daemon::new(config)?;
            tracing::info!("professora ready");
            daemon.run().await?;
            Ok(())
        }
        Some(Command::Turn { text, output }) => {
            let config = load_config(cli.config.as_deref(), None, None)?;
            one_turn(&config, &text, output.as_deref()).await
        }
        Some(Command::Chat { relay, out_dir }) => match relay {
            Some(url) => {
                let client = RelayClient::connect(&url).await?;
                println!("Connected to {url}. Type a sentence, Ctrl-D to quit.");
                let client = chat(client, &out_dir, None, |_| None).await?;
                client.close().await?;
                Ok(())
            }
            None => {
                let config = load_config(cli.config.as_deref(), None, None)?;
                let format = config.voice.settings.output_format;
                let orchestrator = Arc::new(build_orchestrator(&config)?);
                println!("Professora is listening. Type a sentence, Ctrl-D to quit.");
                let transport = chat(DirectTransport::new(orchestrator), &out_dir, Some(format), |t| {
                    t.session().turns().last().map(|turn| turn.reply_text.clone())
                })
                .await?;
                println!("{} turn(s) recorded", transport.session().len());
                Ok(())
            }
        },
        Some(Command::TestTts { text, output }) => {
            let config = load_config(cli.config.as_deref(), None, None)?;
            test_tts(&config, &text, &output).await
        }
    }
}

fn load_config(path: Option<&Path>, port: Option<u16>, static_dir: Option<PathBuf>) -> anyhow::Result<Config> {
    let mut config = Config::load(path)?;
    if let Some(port) = port {
        config.server.port = port;
    }
    if static_dir.is_some() {
        config.server.static_dir = static_dir;
    }
    config.validate()?;
    Ok(config)
}

async fn one_turn(config: &Config, text: &str, output: Option<&Path>) -> anyhow::Result<()> {
    let orchestrator = build_orchestrator(config)?;
    let reply = match orchestrator.process_turn(text).await {
        Ok(reply) => reply,
        Err(Error::EmptyInput) => {
            println!("(nothing to say)");
            return Ok(());
        }
        Err(err @ Error::Synthesis { .. }) => {
            if let Some(text) = unspoken_reply(&err) {
                println!("{text}");
            }
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    println!("{}", reply.reply_text);

    if let Some(path) = output {
        tokio::fs::write(path, &reply.audio).await?;
        println!("audio: {} bytes written to {}", reply.audio.len(), path.display());
    } else {
        play(&reply.audio, config.voice.settings.output_format);
    }

    Ok(())
}

/// Read stdin line by line and deliver each line as one turn
///
/// `format` is the configured encoding when known; relay audio is sniffed.
/// `reply_text` extracts the latest reply text when the transport can
/// see it; the relay only returns audio.
async fn chat<T: Transport>(
    mut transport: T,
    out_dir: &Path,
    format: Option<OutputFormat>,
    reply_text: impl Fn(&T) -> Option<String>,
) -> anyhow::Result<T> {
    tokio::fs::create_dir_all(out_dir).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut turn = 0_usize;

    while let Some(line) = lines.next_line().await? {
        match transport.deliver(&line).await {
            Ok(audio) => {
                turn += 1;
                if let Some(text) = reply_text(&transport) {
                    println!("professora: {text}");
                }
                let format = format.unwrap_or_else(|| OutputFormat::sniff(&audio));
                let path = out_dir.join(format!("turn-{turn:03}.{}", format.extension()));
                tokio::fs::write(&path, &audio).await?;
                println!("  [{} bytes → {}]", audio.len(), path.display());
                play(&audio, format);
            }
            Err(Error::EmptyInput) => {}
            Err(err @ Error::Synthesis { .. }) => {
                if let Some(text) = unspoken_reply(&err) {
                    println!("professora: {text}");
                }
            }
            Err(e @ Error::Inference(_)) => println!("  [{e}]"),
            Err(e) => return Err(e.into()),
        }
    }

    Ok(transport)
}

async fn test_tts(config: &Config, text: &str, output: &Path) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let aws = &config.aws;
    let synthesizer = match &aws.polly_endpoint {
        Some(endpoint) => PollySynthesizer::with_endpoint(
            aws.credentials.clone(),
            &aws.region,
            endpoint,
            config.voice.settings.clone(),
            config.voice.timeout,
        )?,
        None => PollySynthesizer::new(
            aws.credentials.clone(),
            &aws.region,
            config.voice.settings.clone(),
            config.voice.timeout,
        )?,
    };

    println!(
        "Synthesizing with voice {} ({})...",
        config.voice.settings.voice_id,
        config.voice.settings.engine.as_str()
    );
    let audio = synthesizer
        .synthesize(text)
        .await
        .map_err(|e| anyhow::anyhow!("TTS synthesis failed: {e}"))?;
    println!("Got {} bytes of audio data", audio.len());

    if audio.len() > 3 {
        println!(
            "First 4 bytes: {:02x} {:02x} {:02x} {:02x}",
            audio[0], audio[1], audio[2], audio[3]
        );
    }

    tokio::fs::write(output, &audio).await?;
    println!("Saved to {}", output.display());
    play(&audio, config.voice.settings.output_format);

    println!("\n---");
    println!("If you got audio, TTS is working!");

    Ok(())
}

/// Reply text plus a missing-audio note for a turn whose speech failed
fn unspoken_reply(err: &Error) -> Option<String> {
    let failure = err.service_failure()?;
    err.reply_text()
        .map(|text| format!("{text}\n  [no audio: {failure}]"))
}

/// Play reply audio on the local output device
///
/// Only MP3 can be decoded. Playback problems are logged and never end
/// the session.
#[cfg(feature = "playback")]
fn play(audio: &[u8], format: OutputFormat) {
    if format != OutputFormat::Mp3 {
        tracing::info!(format = format.as_str(), "playback supports mp3 only, skipping");
        return;
    }

    let played = professora::voice::AudioPlayback::new()
        .and_then(|playback| tokio::task::block_in_place(|| playback.play_mp3(audio)));
    if let Err(e) = played {
        tracing::warn!(error = %e, "audio playback failed");
    }
}

#[cfg(not(feature = "playback"))]
fn play(_audio: &[u8], _format: OutputFormat) {
    tracing::debug!("built without the playback feature, skipping playback");
}
