//! vchat core entry point.
//!
//! Communicates with the renderer via JSON-line IPC on stdin/stdout. Sets up
//! logging, configuration and the speech backends, then hands over to the
//! session loop.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use vchat_core::config::credentials::CredentialStore;
use vchat_core::config::read_config;
use vchat_core::ipc::bridge::{emit_error, emit_event, spawn_stdin_reader, spawn_stdout_writer};
use vchat_core::ipc::AvatarEvent;
use vchat_core::rig::loader::ManifestRigLoader;
use vchat_core::session::{Session, SessionDeps};
use vchat_core::speech::output::RodioOutput;
use vchat_core::speech::{create_synthesizer, SpeechSynthesizer};

#[tokio::main]
async fn main() {
    if let Err(e) = vchat_core::logging::init() {
        eprintln!("Failed to initialize logging: {:#}", e);
    }

    // Let the front-end know we're alive before anything slow happens.
    emit_event(&AvatarEvent::Starting {});

    let config = read_config();
    info!(model = %config.chat.model, speech = %config.speech.adapter, "Configuration loaded");

    let synth: Option<Arc<dyn SpeechSynthesizer>> = match create_synthesizer(&config.speech) {
        Ok(engine) => {
            info!(engine = %engine.name(), "Speech synthesis ready");
            Some(Arc::from(engine))
        }
        Err(e) => {
            warn!("Speech disabled: {}", e);
            None
        }
    };
    let (output, playback_events) = RodioOutput::new(config.speech.volume, config.speech.output_device.clone());
    let loader = Arc::new(ManifestRigLoader::new(config.avatar.asset_dir()));

    let deps = SessionDeps {
        synth,
        output: Box::new(output),
        playback_events,
        loader,
        credentials: CredentialStore::in_data_dir(),
    };

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let writer = spawn_stdout_writer(events_rx);
    let commands = spawn_stdin_reader();

    let (session, inputs) = match Session::new(config, deps, events_tx) {
        Ok(parts) => parts,
        Err(e) => {
            error!("Failed to start session: {:#}", e);
            emit_error(&format!("Failed to start: {:#}", e));
            return;
        }
    };

    session.run(inputs, commands).await;

    // session dropped its sender, the writer drains and exits
    let _ = writer.await;
    info!("vchat core shut down");
}
