use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;
use voxtutor_audio::{DeviceManager, OutputContext, OutputNode, PLAYBACK_SAMPLE_RATE};
use voxtutor_backend::{BackendRegistry, TutorBackend};
use voxtutor_core::{AppConfig, Language, SessionStatus};
use voxtutor_playback::{spawn_narrator, Completion, NarrationReport};
use voxtutor_session::{LessonSession, LiveSessionHost};

#[derive(Parser)]
#[command(name = "voxtutor", about = "Voice chemistry tutor")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Override the configured language (ar, en)
    #[arg(short, long)]
    language: Option<Language>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Narrate a piece of text once
    Say { text: String },
    /// Generate and narrate lesson content
    Lesson {
        #[arg(long)]
        unit: String,
        #[arg(long)]
        topic: String,
        #[arg(long, default_value_t = 1)]
        part: u8,
        /// Generate a test instead of an explanation
        #[arg(long, conflicts_with = "diagram")]
        test: bool,
        /// Generate a diagram and narrate its explanation
        #[arg(long)]
        diagram: bool,
    },
    /// Talk with the tutor until Ctrl-C
    Live,
    /// List audio devices
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from_file(&cli.config)
        .with_context(|| format!("failed to load config from {:?}", cli.config))?;

    let env_filter = EnvFilter::try_new(&config.general.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::Registry::default().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false),
    );

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    tracing::info!("voxtutor starting");

    let language = cli.language.unwrap_or(config.general.language);
    let device_manager = DeviceManager::new();

    if let Command::Devices = cli.command {
        return list_devices(&device_manager);
    }

    let backend = build_backend(&config).await?;

    if config.audio.playback_sample_rate != PLAYBACK_SAMPLE_RATE {
        tracing::warn!(
            "playback_sample_rate {} differs from the {} Hz backend audio; narration will be rejected",
            config.audio.playback_sample_rate,
            PLAYBACK_SAMPLE_RATE,
        );
    }

    // Get output device
    tracing::info!("using output device: {}", config.audio.output_device);
    let output_device = device_manager
        .get_output_device(&config.audio.output_device)
        .with_context(|| format!("failed to get output device: {}", config.audio.output_device))?;

    let sample_rate = config.audio.playback_sample_rate;
    let channels: u16 = 1;
    let buffer_size = config.audio.buffer_size;

    let (shared, renderer) = voxtutor_audio::output_context(sample_rate, config.audio.voice_capacity);
    let output: Arc<dyn OutputContext> = Arc::new(shared);

    // Start output node
    let (_output_node, output_handle) =
        OutputNode::new(&output_device, renderer, sample_rate, channels, buffer_size)
            .context("failed to create output node")?;

    tracing::info!(
        "output at {}Hz, {} ch, buffer={}",
        sample_rate,
        channels,
        buffer_size,
    );

    match cli.command {
        Command::Say { text } => {
            let mut narrator = spawn_narrator(Arc::clone(&backend), Arc::clone(&output));
            let mut reports = narrator
                .take_report_receiver()
                .context("narrator report receiver already taken")?;
            narrator.speak(text, language);

            tokio::select! {
                _ = wait_for_narration(&mut reports, narrator.speaking()) => {}
                _ = tokio::signal::ctrl_c() => tracing::info!("interrupted"),
            }
            narrator.shutdown().await;
        }
        Command::Lesson {
            unit,
            topic,
            part,
            test,
            diagram,
        } => {
            let mut narrator = spawn_narrator(Arc::clone(&backend), Arc::clone(&output));
            let mut reports = narrator
                .take_report_receiver()
                .context("narrator report receiver already taken")?;
            let speaking = narrator.speaking();

            let mut session = LessonSession::new(backend, narrator, language, unit, topic);
            session.set_part(part);

            if test {
                println!("{}", session.request_test().await);
            } else if diagram {
                let diagram = session
                    .request_diagram()
                    .await
                    .context("diagram generation failed")?;
                if !diagram.image_url.is_empty() {
                    tracing::info!(bytes = diagram.image_url.len(), "diagram image received");
                }
                println!("{}", diagram.explanation);
            } else {
                println!("{}", session.explain().await);
            }

            tokio::select! {
                _ = wait_for_narration(&mut reports, speaking) => {}
                _ = tokio::signal::ctrl_c() => tracing::info!("interrupted"),
            }
            session.narrator_mut().shutdown().await;
        }
        Command::Live => {
            tracing::info!("using input device: {}", config.audio.input_device);
            let input_device = device_manager
                .get_input_device(&config.audio.input_device)
                .with_context(|| {
                    format!("failed to get input device: {}", config.audio.input_device)
                })?;

            let (mic_tx, mic_rx) = mpsc::unbounded_channel();
            let (_capture, _capture_handle) = voxtutor_audio::CaptureNode::new(
                &input_device,
                config.audio.capture_sample_rate,
                channels,
                buffer_size,
                config.audio.capture_block_size,
                mic_tx,
            )
            .context("failed to create capture node")?;

            let mut host = LiveSessionHost::start(backend, Arc::clone(&output), mic_rx, language);
            let mut status = host.status();

            tracing::info!("live session starting, press Ctrl-C to quit");
            let interrupted = tokio::select! {
                result = status.wait_for(|s| s.is_terminal()) => {
                    match result {
                        Ok(ended) => tracing::info!("live session ended: {:?}", *ended),
                        Err(_) => tracing::info!("live session task stopped"),
                    }
                    false
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("interrupted");
                    true
                }
            };

            // A remote close still plays the reply already queued
            if !interrupted && host.current_status() == SessionStatus::Closed {
                tokio::select! {
                    _ = host.finished() => {}
                    _ = tokio::signal::ctrl_c() => tracing::info!("interrupted"),
                }
            }
            host.close().await;

            if host.current_status() == SessionStatus::Error {
                anyhow::bail!("live session failed");
            }
        }
        Command::Devices => {}
    }

    tracing::info!(status = ?output_handle.status(), "shutting down");
    Ok(())
}

async fn build_backend(config: &AppConfig) -> Result<Arc<dyn TutorBackend>> {
    let registry = BackendRegistry::new();
    let engine = config.backend.engine.as_str();

    let backend_config = config
        .backend
        .engine_options()
        .with_context(|| format!("invalid options for backend '{engine}'"))?;

    let backend = registry
        .build(engine, backend_config)
        .await
        .with_context(|| {
            format!(
                "failed to start backend '{}' (available: {})",
                engine,
                registry.list_backends().join(", ")
            )
        })?;
    Ok(Arc::from(backend))
}

/// Wait until the current narration started and finished, or produced nothing.
async fn wait_for_narration(
    reports: &mut mpsc::UnboundedReceiver<NarrationReport>,
    mut speaking: tokio::sync::watch::Receiver<bool>,
) {
    while let Some(report) = reports.recv().await {
        match report.completion {
            Completion::Stale => continue,
            Completion::Started(id) => {
                tracing::debug!(source_id = %id, "narration playing");
                let _ = speaking.wait_for(|s| !*s).await;
                return;
            }
            Completion::NoAudio | Completion::Failed => {
                tracing::warn!(generation = report.generation, "narration produced no audio");
                return;
            }
        }
    }
}

fn list_devices(device_manager: &DeviceManager) -> Result<()> {
    println!("Host: {}", device_manager.host_name());

    println!("Input devices:");
    for (name, _) in device_manager
        .list_input_devices()
        .context("failed to list input devices")?
    {
        println!("  {name}");
    }

    println!("Output devices:");
    for (name, _) in device_manager
        .list_output_devices()
        .context("failed to list output devices")?
    {
        println!("  {name}");
    }
    Ok(())
}
