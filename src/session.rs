//! The session: one task that owns every piece of avatar state and handles
//! one event at a time.
//!
//! Background work (chat streams, synthesis, rig loads, playback) runs in
//! spawned tasks that only report back over channels. Nothing here blocks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::animation::{AnimationEngine, FrameInput, LoadTicket};
use crate::chat::{ChatClient, ChatError, Role, StreamHandler, Transcript};
use crate::config::credentials::CredentialStore;
use crate::config::AppConfig;
use crate::controls;
use crate::ipc::{AvatarCommand, AvatarEvent};
use crate::models::{self, DEFAULT_MODEL_ID, MODELS};
use crate::rig::loader::RigLoader;
use crate::rig::Rig;
use crate::speech::output::{AudioOutput, PlaybackEvent};
use crate::speech::{SentenceSegmenter, SpeechEvent, SpeechPipeline, SpeechSynthesizer, SynthesisResult};
use crate::state::{AudioLevel, AvatarPose, AvatarStore, Emotion, ExpressionStore};

/// One step of a streaming reply, as seen by the session.
#[derive(Debug)]
pub enum ChatEvent {
    Chunk(String),
    Complete,
    Error(ChatError),
}

/// Forwards stream callbacks onto the session's channel, tagged with the
/// stream they belong to.
struct ChatForwarder {
    stream_id: u64,
    tx: mpsc::UnboundedSender<(u64, ChatEvent)>,
}

impl StreamHandler for ChatForwarder {
    fn on_chunk(&mut self, content: &str) {
        let _ = self.tx.send((self.stream_id, ChatEvent::Chunk(content.to_string())));
    }

    fn on_complete(&mut self) {
        let _ = self.tx.send((self.stream_id, ChatEvent::Complete));
    }

    fn on_error(&mut self, error: ChatError) {
        let _ = self.tx.send((self.stream_id, ChatEvent::Error(error)));
    }
}

/// Result of a background rig load.
pub struct RigLoaded {
    ticket: LoadTicket,
    model_id: String,
    result: anyhow::Result<Box<dyn Rig>>,
}

/// Reply currently streaming in.
#[derive(Debug, Clone)]
struct ActiveStream {
    id: u64,
    reply_id: String,
}

/// External pieces the session is built from.
pub struct SessionDeps {
    pub synth: Option<Arc<dyn SpeechSynthesizer>>,
    pub output: Box<dyn AudioOutput>,
    pub playback_events: mpsc::UnboundedReceiver<PlaybackEvent>,
    pub loader: Arc<dyn RigLoader>,
    pub credentials: CredentialStore,
}

/// Receivers for everything the session's background tasks report.
pub struct SessionInputs {
    chat: mpsc::UnboundedReceiver<(u64, ChatEvent)>,
    rigs: mpsc::UnboundedReceiver<RigLoaded>,
    synthesis: mpsc::UnboundedReceiver<SynthesisResult>,
    playback: mpsc::UnboundedReceiver<PlaybackEvent>,
}

pub struct Session {
    config: AppConfig,
    events: mpsc::UnboundedSender<AvatarEvent>,

    avatar: AvatarStore,
    expression: ExpressionStore,
    level: Arc<AudioLevel>,
    engine: AnimationEngine,

    segmenter: SentenceSegmenter,
    speech: SpeechPipeline,

    transcript: Transcript,
    chat: Arc<ChatClient>,
    credentials: CredentialStore,
    api_key: Option<String>,
    streaming: Option<ActiveStream>,
    next_stream_id: u64,
    chat_tx: mpsc::UnboundedSender<(u64, ChatEvent)>,

    loader: Arc<dyn RigLoader>,
    rig_tx: mpsc::UnboundedSender<RigLoaded>,

    clock: Instant,
    last_frame: Option<Instant>,
}

impl Session {
    pub fn new(
        config: AppConfig,
        deps: SessionDeps,
        events: mpsc::UnboundedSender<AvatarEvent>,
    ) -> anyhow::Result<(Self, SessionInputs)> {
        let chat = ChatClient::new(&config.chat)?;

        let model = if models::find(&config.avatar.default_model).is_some() {
            config.avatar.default_model.clone()
        } else {
            warn!(model = %config.avatar.default_model, "Unknown default model, using {}", DEFAULT_MODEL_ID);
            DEFAULT_MODEL_ID.to_string()
        };

        let level = AudioLevel::new();
        let (speech, synthesis) = SpeechPipeline::new(deps.synth, deps.output, level.clone());
        let (chat_tx, chat_rx) = mpsc::unbounded_channel();
        let (rig_tx, rig_rx) = mpsc::unbounded_channel();
        let api_key = deps.credentials.load();

        let session = Self {
            config,
            events,
            avatar: AvatarStore::new(model),
            expression: ExpressionStore::new(),
            level,
            engine: AnimationEngine::new(),
            segmenter: SentenceSegmenter::new(),
            speech,
            transcript: Transcript::new(),
            chat: Arc::new(chat),
            credentials: deps.credentials,
            api_key,
            streaming: None,
            next_stream_id: 0,
            chat_tx,
            loader: deps.loader,
            rig_tx,
            clock: Instant::now(),
            last_frame: None,
        };
        let inputs = SessionInputs {
            chat: chat_rx,
            rigs: rig_rx,
            synthesis,
            playback: deps.playback_events,
        };
        Ok((session, inputs))
    }

    /// Run until a `stop` command arrives or the command channel closes.
    pub async fn run(mut self, mut inputs: SessionInputs, mut commands: mpsc::UnboundedReceiver<AvatarCommand>) {
        self.start();

        let period = Duration::from_secs_f64(1.0 / self.config.avatar.frame_rate.max(1) as f64);
        let mut frames = tokio::time::interval(period);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = frames.tick() => self.on_frame(Instant::now()),
                cmd = commands.recv() => match cmd {
                    Some(cmd) => {
                        if !self.handle_command(cmd) {
                            break;
                        }
                    }
                    None => {
                        info!("stdin closed, shutting down");
                        break;
                    }
                },
                Some((stream_id, event)) = inputs.chat.recv() => self.on_chat_event(stream_id, event),
                Some(loaded) = inputs.rigs.recv() => self.on_rig_loaded(loaded),
                Some(result) = inputs.synthesis.recv() => self.on_synthesized(result),
                Some(event) = inputs.playback.recv() => self.on_playback(event),
            }
        }

        self.stop_speech();
        self.emit(AvatarEvent::Stopping {});
    }

    /// Greeting, initial model load and the `ready` event.
    pub fn start(&mut self) {
        if let Some(greeting) = self.config.chat.greeting.clone().filter(|g| !g.trim().is_empty()) {
            let message = self.transcript.push(Role::Assistant, greeting).clone();
            self.emit(AvatarEvent::Message { message });
        }

        let model = self.avatar.get().model_id;
        self.set_model(&model);

        self.emit(AvatarEvent::Ready {
            model,
            has_api_key: self.api_key.is_some(),
        });
        if self.api_key.is_none() {
            info!("No API key configured, asking the front-end for one");
            self.emit(AvatarEvent::ApiKeyRequired {});
        }
    }

    /// Returns `false` when the session should exit.
    pub fn handle_command(&mut self, cmd: AvatarCommand) -> bool {
        match cmd {
            AvatarCommand::Ping {} => self.emit(AvatarEvent::Pong {}),

            AvatarCommand::Stop {} => return false,

            AvatarCommand::SendMessage { text } => self.send_user_message(&text),

            AvatarCommand::SetApiKey { api_key } => self.set_api_key(&api_key),

            AvatarCommand::SetModel { model } => self.set_model(&model),

            AvatarCommand::ListModels {} => {
                let current = self.avatar.get().model_id;
                self.emit(AvatarEvent::ModelList {
                    models: MODELS.to_vec(),
                    current,
                });
            }

            AvatarCommand::SetPosition { position } => {
                self.avatar.set_position(position);
                self.emit_avatar_state();
            }

            AvatarCommand::SetRotation { rotation } => {
                self.avatar.set_rotation(rotation);
                self.emit_avatar_state();
            }

            AvatarCommand::SetScale { scale } => {
                self.avatar.set_scale(scale);
                self.emit_avatar_state();
            }

            AvatarCommand::ResetTransform {} => {
                self.avatar.reset_transform();
                self.emit_avatar_state();
            }

            AvatarCommand::SetPose { pose } => self.set_pose(pose),

            AvatarCommand::SetGestureFlags { dancing, jumping, waving } => {
                self.set_pose(AvatarPose::from_flags(dancing, jumping, waving));
            }

            AvatarCommand::Key { key, typing } => {
                if controls::handle_key(&self.avatar, &key, typing) {
                    self.emit_avatar_state();
                }
            }

            AvatarCommand::StopSpeech {} => self.stop_speech(),
        }
        true
    }

    /// Start a reply to `text`. Blank input and input while a reply is still
    /// streaming are ignored.
    pub fn send_user_message(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if self.streaming.is_some() {
            debug!("Reply still streaming, ignoring input");
            return;
        }
        let Some(api_key) = self.api_key.clone() else {
            self.emit(AvatarEvent::ApiKeyRequired {});
            return;
        };

        // a new question cuts off whatever the avatar is still saying
        self.stop_speech();

        let user = self.transcript.push(Role::User, text).clone();
        self.emit(AvatarEvent::Message { message: user });
        let reply = self.transcript.push(Role::Assistant, "").clone();
        let reply_id = reply.id.clone();
        self.emit(AvatarEvent::Message { message: reply });

        let messages = self.transcript.to_request(&self.config.chat.system_prompt);

        self.next_stream_id += 1;
        let stream_id = self.next_stream_id;
        self.streaming = Some(ActiveStream { id: stream_id, reply_id });

        let chat = self.chat.clone();
        let tx = self.chat_tx.clone();
        tokio::spawn(async move {
            let mut forwarder = ChatForwarder { stream_id, tx };
            chat.stream_completion(&messages, &api_key, &mut forwarder).await;
        });
    }

    fn on_chat_event(&mut self, stream_id: u64, event: ChatEvent) {
        let Some(active) = self.streaming.clone() else {
            debug!(stream_id, "Chat event with no active stream");
            return;
        };
        if active.id != stream_id {
            debug!(stream_id, current = active.id, "Chat event from a superseded stream");
            return;
        }

        match event {
            ChatEvent::Chunk(content) => {
                self.transcript.append_to_reply(&active.reply_id, &content);
                self.emit(AvatarEvent::ChatChunk {
                    msg_id: active.reply_id.clone(),
                    content: content.clone(),
                });

                let segment = self.segmenter.push(&content);
                if let Some(emotion) = segment.emotion {
                    self.set_emotion(emotion);
                }
                if let Some(sentence) = segment.sentence {
                    self.speech.submit(&sentence);
                }
            }

            ChatEvent::Complete => {
                if let Some(rest) = self.segmenter.finish() {
                    self.speech.submit(&rest);
                }
                self.streaming = None;
                let content = self.reply_text(&active.reply_id);
                self.emit(AvatarEvent::ChatComplete {
                    msg_id: active.reply_id,
                    content,
                });
            }

            ChatEvent::Error(e) => {
                error!("Chat reply failed: {}", e);
                self.transcript
                    .append_to_reply(&active.reply_id, &format!(" [Error: {}]", e));
                self.segmenter.reset();
                self.streaming = None;
                self.emit(AvatarEvent::ChatError {
                    msg_id: active.reply_id,
                    message: e.to_string(),
                });
            }
        }
    }

    fn set_emotion(&mut self, emotion: Emotion) {
        let previous = self.expression.emotion();
        self.expression.set(emotion);
        if previous != emotion {
            debug!(%emotion, "Emotion changed");
            self.emit(AvatarEvent::Emotion { emotion });
        }
    }

    fn set_api_key(&mut self, api_key: &str) {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            self.emit(AvatarEvent::ApiKeyRequired {});
            return;
        }
        if let Err(e) = self.credentials.save(api_key) {
            warn!("Failed to persist API key: {:#}", e);
            self.emit(AvatarEvent::Error {
                message: format!("Failed to save API key: {:#}", e),
            });
        }
        self.api_key = Some(api_key.to_string());
        info!("API key updated");
    }

    fn set_pose(&mut self, pose: AvatarPose) {
        self.avatar.set_pose(pose);
        self.emit_avatar_state();
    }

    /// Swap to `model_id`. The current rig is released at once and frames
    /// stop until the new one is mounted.
    pub fn set_model(&mut self, model_id: &str) {
        let Some(info) = models::find(model_id) else {
            warn!(model = model_id, "Unknown model requested");
            self.emit(AvatarEvent::Error {
                message: format!("Unknown model: {}", model_id),
            });
            return;
        };
        if self.engine.model_id() == Some(info.id) {
            debug!(model = info.id, "Model already selected");
            return;
        }

        self.avatar.set_model(info.id);
        let ticket = self.engine.begin_load(info.id);
        info!(model = info.id, "Loading model");
        self.emit(AvatarEvent::ModelLoading {
            model: info.id.to_string(),
        });
        self.emit_avatar_state();

        let loader = self.loader.clone();
        let tx = self.rig_tx.clone();
        let model_id = info.id.to_string();
        tokio::spawn(async move {
            let result = loader.load(&model_id).await;
            let _ = tx.send(RigLoaded {
                ticket,
                model_id,
                result,
            });
        });
    }

    fn on_rig_loaded(&mut self, loaded: RigLoaded) {
        match loaded.result {
            Ok(rig) => {
                if self.engine.finish_load(loaded.ticket, rig) {
                    self.emit(AvatarEvent::ModelLoaded {
                        model: loaded.model_id,
                    });
                }
            }
            Err(e) => {
                let current = self.engine.model_id() == Some(loaded.model_id.as_str());
                self.engine.cancel_load(loaded.ticket);
                if current {
                    error!(model = %loaded.model_id, "Failed to load model: {:#}", e);
                    self.emit(AvatarEvent::Error {
                        message: format!("Failed to load model {}: {:#}", loaded.model_id, e),
                    });
                }
            }
        }
    }

    fn on_synthesized(&mut self, result: SynthesisResult) {
        let events = self.speech.on_synthesized(result, Instant::now());
        self.forward_speech(events);
    }

    fn on_playback(&mut self, event: PlaybackEvent) {
        let events = self.speech.on_playback(event, Instant::now());
        self.forward_speech(events);
    }

    /// Silence the avatar and forget any sentence still being assembled.
    pub fn stop_speech(&mut self) {
        let events = self.speech.stop_all();
        self.segmenter.reset();
        self.forward_speech(events);
    }

    /// One animation frame.
    pub fn on_frame(&mut self, now: Instant) {
        let delta = self
            .last_frame
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or(Duration::ZERO);
        self.last_frame = Some(now);

        let volume = self.speech.sample_level(now);
        let input = FrameInput {
            elapsed: now.saturating_duration_since(self.clock).as_secs_f32(),
            delta: delta.as_secs_f32(),
            pose: self.avatar.pose(),
            emotion: self.expression.emotion(),
            volume,
            transform: self.avatar.transform(),
        };

        if let Some(frame) = self.engine.tick(input) {
            if self.config.avatar.emit_frames {
                self.emit(AvatarEvent::Frame { frame });
            }
        }
    }

    fn forward_speech(&self, events: Vec<SpeechEvent>) {
        for event in events {
            match event {
                SpeechEvent::SpeakingStart { text } => self.emit(AvatarEvent::SpeakingStart { text }),
                SpeechEvent::SpeakingEnd => self.emit(AvatarEvent::SpeakingEnd {}),
            }
        }
    }

    fn reply_text(&self, reply_id: &str) -> String {
        self.transcript
            .get(reply_id)
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }

    fn emit_avatar_state(&self) {
        self.emit(AvatarEvent::AvatarState {
            state: self.avatar.get(),
        });
    }

    fn emit(&self, event: AvatarEvent) {
        // receiver only goes away at shutdown
        let _ = self.events.send(event);
    }
}
