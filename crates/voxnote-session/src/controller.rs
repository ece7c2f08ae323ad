//! Session controller: single-writer arbitration of the microphone.
//!
//! One tokio task owns all mutable session state and processes requests
//! from an mpsc queue strictly in arrival order. Multi-step transitions
//! (handoff, stop-with-drain, cool-down) are awaited inline inside request
//! handling, so a request picked up from the queue always observes a
//! stable state and reconfiguration arriving mid-transition is naturally
//! queued behind it. There is no mid-drain cancellation: once a stop is
//! issued the drain completes before the next request runs.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use voxnote_core::config::VoxnoteConfig;
use voxnote_core::error::{Result, VoxnoteError};
use voxnote_core::types::SessionKind;
use voxnote_engine::{hypothesis, EngineEvent, RecognitionEngine};
use voxnote_mic::MicrophoneArbiter;

use crate::listener::{ListenerEvent, ListenerHandle};
use crate::processor::{self, UtteranceProcessor};
use crate::state::{SessionState, StateMachine};

enum Command {
    StartDictation(oneshot::Sender<Result<()>>),
    StopDictation,
    SetKeywordSpotting(bool, oneshot::Sender<Result<()>>),
    SetTriggerPhrase(String),
    SetActiveFolder(String),
    Shutdown,
}

/// The controller actor. Constructed and consumed by [`SessionController::spawn`].
pub struct SessionController {
    engine: Arc<dyn RecognitionEngine>,
    arbiter: MicrophoneArbiter,
    processor: Arc<UtteranceProcessor>,
    machine: StateMachine,
    trigger_phrase: String,
    keyword_spotting: bool,
    handoff_poll_interval: Duration,
    handoff_max_attempts: u32,
    cooldown: Duration,
    keyword_settle: Duration,
    handle: Option<ListenerHandle>,
    next_generation: u64,
    commands: mpsc::Receiver<Command>,
    events: mpsc::Receiver<ListenerEvent>,
    events_tx: mpsc::Sender<ListenerEvent>,
}

impl SessionController {
    /// Spawn the controller task and return the handle clients talk through.
    ///
    /// If keyword spotting is enabled in the config the controller starts
    /// spotting immediately; a model failure at startup is logged and
    /// leaves the controller idle rather than failing the spawn.
    pub fn spawn(
        engine: Arc<dyn RecognitionEngine>,
        arbiter: MicrophoneArbiter,
        processor: Arc<UtteranceProcessor>,
        config: &VoxnoteConfig,
    ) -> SessionControllerHandle {
        let (commands_tx, commands_rx) = mpsc::channel(32);
        let (events_tx, events_rx) = mpsc::channel(64);
        let machine = StateMachine::new();
        let state_rx = machine.subscribe();

        let controller = Self {
            engine,
            arbiter,
            processor,
            machine,
            trigger_phrase: config.trigger.phrase.clone(),
            keyword_spotting: config.trigger.keyword_spotting,
            handoff_poll_interval: config.session.handoff_poll_interval(),
            handoff_max_attempts: config.session.handoff_max_attempts,
            cooldown: config.session.cooldown(),
            keyword_settle: config.session.keyword_settle(),
            handle: None,
            next_generation: 0,
            commands: commands_rx,
            events: events_rx,
            events_tx,
        };
        tokio::spawn(controller.run());

        SessionControllerHandle {
            commands: commands_tx,
            state: state_rx,
        }
    }

    async fn run(mut self) {
        if self.keyword_spotting {
            if let Err(e) = self.start_keyword_spotting().await {
                warn!(error = %e, "Keyword spotting unavailable at startup");
            }
        }

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if self.handle_command(command).await {
                            break;
                        }
                    }
                    None => break,
                },
                Some(event) = self.events.recv() => self.handle_event(event).await,
            }
        }

        self.drop_active_handle().await;
        self.machine.reset();
        info!("Session controller stopped");
    }

    /// Returns `true` when the controller should shut down.
    async fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::StartDictation(reply) => {
                let result = self.request_start_dictation().await;
                let _ = reply.send(result);
            }
            Command::StopDictation => {
                if self.machine.current() == SessionState::Dictating {
                    self.stop_dictation().await;
                } else {
                    debug!(state = %self.machine.current(), "Stop request outside dictation is a no-op");
                }
            }
            Command::SetKeywordSpotting(enabled, reply) => {
                let result = self.set_keyword_spotting(enabled).await;
                let _ = reply.send(result);
            }
            Command::SetTriggerPhrase(phrase) => self.set_trigger_phrase(phrase).await,
            Command::SetActiveFolder(folder) => {
                info!(folder, "Active folder changed");
                self.processor.set_active_folder(folder);
            }
            Command::Shutdown => return true,
        }
        false
    }

    async fn handle_event(&mut self, event: ListenerEvent) {
        let live_generation = self.handle.as_ref().map(ListenerHandle::generation);
        if live_generation != Some(event.generation) {
            debug!(generation = event.generation, "Discarding stale engine event");
            return;
        }
        match event.kind {
            SessionKind::KeywordSpotting => self.on_keyword_event(event.event).await,
            SessionKind::Dictation => self.on_dictation_event(event.event).await,
        }
    }

    async fn on_keyword_event(&mut self, event: EngineEvent) {
        match hypothesis::project(&event) {
            Some(h) if h.is_final => {
                if h.text.trim().to_lowercase() == self.trigger_phrase.trim().to_lowercase() {
                    info!(phrase = %self.trigger_phrase, "Trigger phrase recognized");
                    if let Err(e) = self.hand_off_to_dictation().await {
                        warn!(error = %e, "Handoff after trigger failed");
                    }
                } else {
                    debug!(text = %h.text, "Ignoring non-trigger keyword result");
                }
            }
            // Partials while spotting carry no signal.
            Some(_) => {}
            None => {
                // Error or timeout ends the recognizer turn; restart once.
                warn!("Keyword listener turn ended abnormally, restarting");
                self.drop_active_handle().await;
                if let Err(e) = self.start_listener(SessionKind::KeywordSpotting).await {
                    warn!(error = %e, "Keyword spotting restart failed");
                    self.set_state(SessionState::Idle);
                }
            }
        }
    }

    async fn on_dictation_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Partial(payload) => {
                let text = hypothesis::extract_text(&payload);
                if processor::contains_trigger(&text, &self.trigger_phrase) {
                    info!("Trigger phrase heard mid-dictation, stopping");
                    self.stop_dictation().await;
                }
            }
            EngineEvent::Final(payload) => {
                let text = hypothesis::extract_text(&payload);
                self.processor.process_final(&text, &self.trigger_phrase);
                self.stop_dictation().await;
            }
            EngineEvent::Error(message) => {
                warn!(message, "Engine error during dictation");
                self.stop_dictation().await;
            }
            EngineEvent::Timeout => {
                debug!("Dictation timed out");
                self.stop_dictation().await;
            }
        }
    }

    async fn request_start_dictation(&mut self) -> Result<()> {
        if self.machine.current() == SessionState::Dictating {
            debug!("Already dictating");
            return Ok(());
        }
        self.hand_off_to_dictation().await
    }

    /// The microphone handoff: stop whatever is listening, wait for the
    /// device to come free, then start dictation.
    ///
    /// A mic that never comes free within the attempt budget aborts the
    /// handoff: the controller logs the timeout and falls back to the best
    /// safe state instead of surfacing an error. Only a failure to start
    /// the dictation listener itself propagates.
    async fn hand_off_to_dictation(&mut self) -> Result<()> {
        self.set_state(SessionState::HandingOffToDictation);
        self.drop_active_handle().await;
        tokio::time::sleep(self.keyword_settle).await;

        let free = self
            .arbiter
            .await_free(self.handoff_poll_interval, self.handoff_max_attempts)
            .await;
        if !free {
            let timeout = VoxnoteError::HandoffTimeout {
                attempts: self.handoff_max_attempts,
            };
            warn!(error = %timeout, "Handoff aborted, falling back");
            self.fall_back().await;
            return Ok(());
        }

        match self.start_listener(SessionKind::Dictation).await {
            Ok(()) => {
                self.set_state(SessionState::Dictating);
                info!("Dictation started");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Dictation listener failed to start, falling back");
                self.fall_back().await;
                Err(e)
            }
        }
    }

    /// Stop dictation with the full drain, cool-down, and resume sequence.
    async fn stop_dictation(&mut self) {
        self.set_state(SessionState::StoppingDictation);
        self.drop_active_handle().await;
        self.set_state(SessionState::CoolingDown);
        tokio::time::sleep(self.cooldown).await;

        if !self.keyword_spotting {
            self.set_state(SessionState::Idle);
            return;
        }
        let free = self
            .arbiter
            .await_free(self.handoff_poll_interval, self.handoff_max_attempts)
            .await;
        if free {
            self.fall_back().await;
        } else {
            warn!("Microphone still busy after cool-down, going idle");
            self.set_state(SessionState::Idle);
        }
    }

    /// Resume keyword spotting if the feature is enabled, otherwise idle.
    async fn fall_back(&mut self) {
        if self.keyword_spotting {
            match self.start_listener(SessionKind::KeywordSpotting).await {
                Ok(()) => self.set_state(SessionState::SpottingKeyword),
                Err(e) => {
                    warn!(error = %e, "Could not resume keyword spotting");
                    self.set_state(SessionState::Idle);
                }
            }
        } else {
            self.set_state(SessionState::Idle);
        }
    }

    async fn set_keyword_spotting(&mut self, enabled: bool) -> Result<()> {
        self.keyword_spotting = enabled;
        if !enabled {
            // Straight to idle: no cool-down, no restart.
            self.drop_active_handle().await;
            if self.machine.current() != SessionState::Idle {
                self.set_state(SessionState::Idle);
            }
            info!("Keyword spotting disabled");
            return Ok(());
        }
        if self.machine.current() == SessionState::Idle {
            self.start_keyword_spotting().await?;
        }
        info!(phrase = %self.trigger_phrase, "Keyword spotting enabled");
        Ok(())
    }

    async fn set_trigger_phrase(&mut self, phrase: String) {
        info!(%phrase, "Trigger phrase changed");
        self.trigger_phrase = phrase;
        // The new grammar takes effect on the next listener initialization;
        // restarting the keyword listener is that initialization. An active
        // dictation is unaffected until its next transition.
        if self.machine.current() == SessionState::SpottingKeyword {
            self.drop_active_handle().await;
            if let Err(e) = self.start_listener(SessionKind::KeywordSpotting).await {
                warn!(error = %e, "Could not restart keyword spotting with new phrase");
                self.set_state(SessionState::Idle);
            }
        }
    }

    async fn start_keyword_spotting(&mut self) -> Result<()> {
        self.start_listener(SessionKind::KeywordSpotting).await?;
        self.set_state(SessionState::SpottingKeyword);
        Ok(())
    }

    /// Construct a listener, enforcing the handle-identity invariant: no
    /// second listener is ever created while one is recorded live,
    /// regardless of what the mic probe reports.
    async fn start_listener(&mut self, kind: SessionKind) -> Result<()> {
        if self.handle.is_some() {
            debug_assert!(
                self.handle.is_none(),
                "listener requested while another is live"
            );
            error!(%kind, "Refusing to create a second live listener");
            return Err(VoxnoteError::InvariantViolation(
                "a listener is already live".to_string(),
            ));
        }

        self.next_generation += 1;
        let phrase_filter = match kind {
            SessionKind::KeywordSpotting => Some(self.trigger_phrase.as_str()),
            SessionKind::Dictation => None,
        };
        let handle = ListenerHandle::start(
            self.engine.as_ref(),
            kind,
            phrase_filter,
            self.next_generation,
            self.events_tx.clone(),
        )
        .await?;
        self.handle = Some(handle);
        Ok(())
    }

    async fn drop_active_handle(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.stop().await {
                warn!(error = %e, "Error while stopping listener");
            }
        }
    }

    fn set_state(&self, target: SessionState) {
        if let Err(e) = self.machine.transition(target) {
            error!(error = %e, "Rejected state transition");
        }
    }
}

/// Client handle to a running [`SessionController`]. Cheap to clone.
#[derive(Clone)]
pub struct SessionControllerHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<SessionState>,
}

impl SessionControllerHandle {
    /// Start dictation immediately, stopping any active listener first.
    ///
    /// A no-op while already dictating. Surfaces `ModelUnavailable`; a
    /// handoff timeout is absorbed by the fallback and reported as success.
    pub async fn request_start_dictation(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::StartDictation(tx)).await?;
        rx.await.map_err(|_| Self::stopped())?
    }

    /// Stop an active dictation. A no-op in any other state.
    pub async fn request_stop_dictation(&self) -> Result<()> {
        self.send(Command::StopDictation).await
    }

    pub async fn set_keyword_spotting_enabled(&self, enabled: bool) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::SetKeywordSpotting(enabled, tx)).await?;
        rx.await.map_err(|_| Self::stopped())?
    }

    pub async fn set_trigger_phrase(&self, phrase: impl Into<String>) -> Result<()> {
        self.send(Command::SetTriggerPhrase(phrase.into())).await
    }

    pub async fn set_active_folder(&self, folder: impl Into<String>) -> Result<()> {
        self.send(Command::SetActiveFolder(folder.into())).await
    }

    pub fn current_state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch receiver for state changes (the UI "recording" indicator).
    pub fn state_changes(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown).await
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Self::stopped())
    }

    fn stopped() -> VoxnoteError {
        VoxnoteError::Session("session controller is not running".to_string())
    }
}
