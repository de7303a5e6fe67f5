//! Mandatum terminal host.
//!
//! Wires the command table, settings, and a transcription backend into the
//! engine, then serves two input paths until shutdown: the voice pipeline
//! (inside the engine) and a stdin text loop feeding `submit_text`. Both
//! funnel into the same input director, so a typed line and a spoken phrase
//! are indistinguishable to the grammar.

mod actions;
mod commands;
mod settings;

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::unbounded_channel;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mandatum_core::{
    audio::list_input_devices, CommandSet, EngineStatus, MandatumEngine, RecognitionStage,
    StubTranscriber, TranscriberHandle,
};

use settings::{default_settings_path, load_settings, save_settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    if std::env::args().any(|a| a == "--list-devices") {
        print_device_table();
        return Ok(());
    }

    let settings_path = default_settings_path();
    let settings = load_settings(&settings_path);
    if !settings_path.exists() {
        if let Err(e) = save_settings(&settings_path, &settings) {
            warn!("could not write default settings file: {e}");
        }
    }
    info!(path = %settings_path.display(), "settings loaded");

    // Shutdown is itself a command — its action signals this channel.
    let (shutdown_tx, mut shutdown_rx) = unbounded_channel::<()>();

    let command_set = CommandSet::new(commands::command_table(&shutdown_tx))
        .context("command table failed grammar validation")?;

    // Placeholder backend; real recognizers implement `Transcriber` and slot
    // in here without touching the rest of the host.
    let transcriber = TranscriberHandle::new(StubTranscriber::new());

    let engine = Arc::new(MandatumEngine::new(
        settings.engine_config(),
        transcriber,
        command_set,
    )?);

    engine.warm_up()?;

    match engine.start_with_device(settings.preferred_input_device.clone()) {
        Ok(()) => nl_print("listening — say a wake word, or type a command"),
        Err(e) => {
            warn!("voice capture unavailable ({e}) — text input only");
            nl_print("voice capture unavailable — type commands instead");
        }
    }

    spawn_event_printers(&engine);

    // Text interface: every stdin line goes through the same gate/match path.
    let text_engine = Arc::clone(&engine);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                nl_print("goodbye!");
                break;
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        if let Err(e) = text_engine.submit_text(trimmed) {
                            warn!("text input failed: {e}");
                        }
                    }
                    Ok(None) => break, // stdin closed
                    Err(e) => {
                        warn!("stdin read failed: {e}");
                        break;
                    }
                }
            }
        }
    }

    if engine.status() == EngineStatus::Listening || engine.status() == EngineStatus::Focused {
        let _ = engine.stop();
    }
    Ok(())
}

/// Forward engine broadcasts to the terminal. Each subscriber runs on its
/// own task; lagged receivers just skip ahead.
fn spawn_event_printers(engine: &Arc<MandatumEngine>) {
    let mut recognition_rx = engine.subscribe_recognition();
    tokio::spawn(async move {
        while let Ok(event) = recognition_rx.recv().await {
            // The narrow keyword pass also fires for out-of-focus phrases;
            // only the candidate's full pass is worth echoing.
            if event.stage == RecognitionStage::Full {
                nl_print(&format!(">>> Voice: \"{}\"", event.text));
            }
        }
    });

    let mut command_rx = engine.subscribe_commands();
    tokio::spawn(async move {
        while let Ok(event) = command_rx.recv().await {
            nl_print(&format!("[{}] {}", event.command, event.output));
        }
    });

    let mut status_rx = engine.subscribe_status();
    tokio::spawn(async move {
        while let Ok(event) = status_rx.recv().await {
            match event.detail {
                Some(detail) => info!(status = ?event.status, %detail, "engine status"),
                None => info!(status = ?event.status, "engine status"),
            }
        }
    });
}

fn print_device_table() {
    let devices = list_input_devices();
    if devices.is_empty() {
        println!("no audio input devices found");
        return;
    }
    for device in devices {
        let marker = if device.is_default { "*" } else { " " };
        println!("{marker} {}", device.name);
    }
}

/// Same as `println!` but with a leading blank line, so output stands clear
/// of the prompt the user is typing at.
fn nl_print(message: &str) {
    println!("\n{message}");
}
