//! # Capture Session Controller
//!
//! State machine driving one capture session from scanning to a published
//! (or locally exported) result.
//!
//! ## Table of Contents
//! 1. ControllerHandle - async command API, cheap to clone
//! 2. CaptureDelegate - callbacks handed to the capture runtime
//! 3. Controller actor - owns all session state
//!
//! ## States
//!
//! ```text
//! Idle ──start──▶ Scanning ──stop (space held)──▶ AwaitingAction ──process──▶ Processing
//!   ▲                │                                  ▲                         │
//!   └──stop (no space) / cancel                         └─resume─┐       Completed | Failed
//!                                                                └── Failed(not retryable)
//! ```
//!
//! All state lives on a single actor task. Commands arrive on a bounded
//! channel; capture callbacks and run completions arrive on an event channel
//! and carry the session generation or run id they belong to, so late
//! results from an abandoned session or run are dropped.

mod run;
mod state;

pub use run::{Delivery, Pipeline, ProcessRequest};
pub use state::{Completion, Failure, FailureKind, SessionSnapshot, SessionState};

use crate::capture::{
    Acceptance, CaptureConfig, CaptureRuntime, CapturedSpace, FinalResultHandler, IntermediateResultHandler,
};
use crate::error::{CaptureError, ControllerError};
use crate::tracker::ResourceTracker;
use reqwest::Method;
use run::Target;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

const COMMAND_BUFFER: usize = 32;

/// Reply to `process_result`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessAck {
    /// A run started
    Started(Uuid),
    /// A run is already in progress; nothing was started
    Ignored,
    /// No run started and the state moved to `Failed` (no valid session)
    Rejected,
}

type Reply<T> = oneshot::Sender<Result<T, ControllerError>>;

enum Command {
    Start(Reply<()>),
    Stop(Reply<()>),
    Cancel(Reply<()>),
    Process(ProcessRequest, Reply<ProcessAck>),
    Resume(Reply<()>),
    DismissNotice,
}

enum Event {
    Intermediate { generation: u64, error: CaptureError },
    Final { generation: u64, result: Result<CapturedSpace, CaptureError> },
    RunFinished { run_id: Uuid, result: Result<Completion, Failure> },
}

// ============================================================================
// Handle
// ============================================================================

/// Command handle of a running controller.
///
/// The controller stops once every handle has been dropped.
#[derive(Clone)]
pub struct ControllerHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<SessionSnapshot>,
}

impl ControllerHandle {
    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T, ControllerError> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(make(tx)).await.map_err(|_| ControllerError::Closed)?;
        rx.await.map_err(|_| ControllerError::Closed)?
    }

    /// Begin a new capture session, discarding any held result
    pub async fn start_session(&self) -> Result<(), ControllerError> {
        self.request(Command::Start).await
    }

    /// Finish scanning; moves to `AwaitingAction` only if a result was delivered
    pub async fn stop_session(&self) -> Result<(), ControllerError> {
        self.request(Command::Stop).await
    }

    /// Abandon the session and return to `Idle`. Ignored while processing.
    pub async fn cancel(&self) -> Result<(), ControllerError> {
        self.request(Command::Cancel).await
    }

    /// Export, transform and deliver the held captured space
    pub async fn process_result(&self, request: ProcessRequest) -> Result<ProcessAck, ControllerError> {
        self.request(|reply| Command::Process(request, reply)).await
    }

    /// Return to `AwaitingAction` after a non-retryable failure was resolved
    /// elsewhere (upgrade purchased, signed in again)
    pub async fn resume(&self) -> Result<(), ControllerError> {
        self.request(Command::Resume).await
    }

    pub async fn dismiss_notice(&self) -> Result<(), ControllerError> {
        self.commands
            .send(Command::DismissNotice)
            .await
            .map_err(|_| ControllerError::Closed)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.clone()
    }

    /// Wait until the published snapshot satisfies `predicate`
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> Result<SessionSnapshot, ControllerError> {
        let mut state = self.state.clone();
        let snapshot = state
            .wait_for(|snapshot| predicate(snapshot))
            .await
            .map_err(|_| ControllerError::Closed)?;
        Ok((*snapshot).clone())
    }
}

// ============================================================================
// CaptureDelegate
// ============================================================================

/// Callbacks for one session generation
struct CaptureDelegate {
    generation: u64,
    events: mpsc::UnboundedSender<Event>,
}

impl IntermediateResultHandler for CaptureDelegate {
    fn should_accept(&self, error: Option<CaptureError>) -> Acceptance {
        let Some(error) = error else {
            return Acceptance::Accept;
        };
        let acceptance = if error.is_transient() { Acceptance::Accept } else { Acceptance::Reject };
        let _ = self.events.send(Event::Intermediate {
            generation: self.generation,
            error,
        });
        acceptance
    }
}

impl FinalResultHandler for CaptureDelegate {
    fn on_final_result(&self, result: Result<CapturedSpace, CaptureError>) {
        let _ = self.events.send(Event::Final {
            generation: self.generation,
            result,
        });
    }
}

// ============================================================================
// Controller actor
// ============================================================================

/// Owner of one capture session's state
pub struct CaptureSessionController {
    runtime: Arc<dyn CaptureRuntime>,
    capture_config: CaptureConfig,
    pipeline: Arc<Pipeline>,

    state: SessionState,
    captured_space: Option<CapturedSpace>,
    notice: Option<String>,
    generation: u64,
    current_run: Option<Uuid>,
    runs_started: u64,
    in_flight: Option<JoinHandle<()>>,

    events_tx: mpsc::UnboundedSender<Event>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl CaptureSessionController {
    /// Spawn the controller on the current tokio runtime
    pub fn spawn(runtime: Arc<dyn CaptureRuntime>, pipeline: Pipeline, capture_config: CaptureConfig) -> ControllerHandle {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::default());

        let controller = Self {
            runtime,
            capture_config,
            pipeline: Arc::new(pipeline),
            state: SessionState::Idle,
            captured_space: None,
            notice: None,
            generation: 0,
            current_run: None,
            runs_started: 0,
            in_flight: None,
            events_tx,
            snapshot_tx,
        };
        tokio::spawn(controller.run(commands_rx, events_rx));

        ControllerHandle {
            commands: commands_tx,
            state: snapshot_rx,
        }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>, mut events: mpsc::UnboundedReceiver<Event>) {
        debug!("Capture session controller started");
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command, &mut events),
                    None => break,
                },
                Some(event) = events.recv() => self.handle_event(event),
            }
        }

        if self.state == SessionState::Scanning {
            self.runtime.stop();
        }
        if let Some(in_flight) = self.in_flight.take() {
            debug!("Waiting for in-flight run before shutdown");
            let _ = in_flight.await;
        }
        debug!("Capture session controller stopped");
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(SessionSnapshot {
            state: self.state.clone(),
            has_captured_space: self.captured_space.is_some(),
            notice: self.notice.clone(),
            runs_started: self.runs_started,
        });
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            debug!(from = %self.state, to = %state, "Session state changed");
        }
        self.state = state;
        self.publish();
    }

    fn invalid(&self, action: &'static str) -> ControllerError {
        ControllerError::InvalidState {
            action,
            state: self.state.label().to_string(),
        }
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    fn handle_command(&mut self, command: Command, events: &mut mpsc::UnboundedReceiver<Event>) {
        match command {
            Command::Start(reply) => {
                let _ = reply.send(self.start_session());
            }
            Command::Stop(reply) => {
                let _ = reply.send(self.stop_session(events));
            }
            Command::Cancel(reply) => {
                let _ = reply.send(self.cancel());
            }
            Command::Process(request, reply) => {
                let _ = reply.send(self.process_result(request));
            }
            Command::Resume(reply) => {
                let _ = reply.send(self.resume());
            }
            Command::DismissNotice => {
                if self.notice.take().is_some() {
                    self.publish();
                }
            }
        }
    }

    fn start_session(&mut self) -> Result<(), ControllerError> {
        if matches!(self.state, SessionState::Scanning | SessionState::Processing) {
            return Err(self.invalid("start a session"));
        }

        self.captured_space = None;
        self.notice = None;
        self.generation += 1;

        let delegate = Arc::new(CaptureDelegate {
            generation: self.generation,
            events: self.events_tx.clone(),
        });
        if let Err(e) = self.runtime.run(&self.capture_config, delegate) {
            warn!(error = %e, "Capture runtime failed to start");
            self.set_state(SessionState::Idle);
            return Err(e.into());
        }

        info!(generation = self.generation, "Capture session started");
        self.set_state(SessionState::Scanning);
        Ok(())
    }

    fn stop_session(&mut self, events: &mut mpsc::UnboundedReceiver<Event>) -> Result<(), ControllerError> {
        if self.state != SessionState::Scanning {
            return Err(self.invalid("stop the session"));
        }

        self.runtime.stop();
        // Results the runtime delivered while stopping still count
        while let Ok(event) = events.try_recv() {
            self.handle_event(event);
        }
        if self.state != SessionState::Scanning {
            return Ok(());
        }

        let next = if self.captured_space.is_some() {
            SessionState::AwaitingAction
        } else {
            SessionState::Idle
        };
        self.set_state(next);
        Ok(())
    }

    fn cancel(&mut self) -> Result<(), ControllerError> {
        match self.state {
            SessionState::Processing => {
                debug!("Cancel ignored while processing");
                return Ok(());
            }
            SessionState::Scanning => {
                self.runtime.stop();
                self.generation += 1;
            }
            _ => {}
        }
        self.captured_space = None;
        self.notice = None;
        self.set_state(SessionState::Idle);
        Ok(())
    }

    fn process_result(&mut self, request: ProcessRequest) -> Result<ProcessAck, ControllerError> {
        match &self.state {
            SessionState::Processing => {
                debug!("Process request ignored, run already in progress");
                return Ok(ProcessAck::Ignored);
            }
            SessionState::AwaitingAction => {}
            SessionState::Failed(failure) if failure.retryable => {}
            _ => return Err(self.invalid("process the result")),
        }

        let Some(space) = self.captured_space.clone() else {
            return Err(self.invalid("process the result"));
        };
        if request.name.trim().is_empty() {
            return Err(ControllerError::InvalidRequest("scan name must not be empty".to_string()));
        }

        let target = match request.delivery {
            Delivery::Publish => match self.pipeline.session.authorize(&self.pipeline.upload_path, Method::POST) {
                Some(template) => Target::Publish(template),
                None => {
                    warn!("No valid session, publish rejected before upload");
                    self.set_state(SessionState::Failed(Failure::auth_invalid()));
                    return Ok(ProcessAck::Rejected);
                }
            },
            Delivery::LocalExport => match &self.pipeline.local_sink {
                Some(sink) => Target::Local(sink.clone()),
                None => {
                    return Err(ControllerError::InvalidRequest(
                        "no local export destination configured".to_string(),
                    ))
                }
            },
        };

        let run_id = Uuid::new_v4();
        self.current_run = Some(run_id);
        self.runs_started += 1;
        self.notice = None;
        info!(%run_id, delivery = ?request.delivery, "Pipeline run started");
        self.set_state(SessionState::Processing);

        self.in_flight = Some(self.spawn_run(run_id, space, request, target));
        Ok(ProcessAck::Started(run_id))
    }

    fn resume(&mut self) -> Result<(), ControllerError> {
        let resumable = matches!(&self.state, SessionState::Failed(failure) if !failure.retryable);
        if !resumable || self.captured_space.is_none() {
            return Err(self.invalid("resume"));
        }
        self.set_state(SessionState::AwaitingAction);
        Ok(())
    }

    /// Run the pipeline on its own task; cleanup happens before the
    /// completion event is sent, even if the run panicked
    fn spawn_run(
        &self,
        run_id: Uuid,
        space: CapturedSpace,
        request: ProcessRequest,
        target: Target,
    ) -> JoinHandle<()> {
        let pipeline = self.pipeline.clone();
        let events = self.events_tx.clone();
        let tracker = ResourceTracker::new();
        let run_tracker = tracker.clone();

        let work = tokio::spawn(async move { pipeline.execute(run_id, space, request, target, run_tracker).await });

        tokio::spawn(async move {
            let result = match work.await {
                Ok(result) => result,
                Err(e) => Err(Failure::internal(format!("Pipeline run aborted: {}", e))),
            };

            match tokio::task::spawn_blocking(move || tracker.cleanup()).await {
                Ok(report) => debug!(%run_id, removed = report.removed, failed = report.failed, "Run cleanup finished"),
                Err(e) => warn!(%run_id, error = %e, "Run cleanup task failed"),
            }

            let _ = events.send(Event::RunFinished { run_id, result });
        })
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Intermediate { generation, error } => {
                if generation != self.generation || self.state != SessionState::Scanning {
                    return;
                }
                debug!(error = %error, "Intermediate capture error");
                self.notice = Some(error.to_string());
                self.publish();
            }
            Event::Final { generation, result } => {
                if generation != self.generation || self.state != SessionState::Scanning {
                    debug!(generation, current = self.generation, "Dropping stale capture result");
                    return;
                }
                match result {
                    Ok(space) => {
                        info!(space = %space.id(), "Captured space received");
                        self.captured_space = Some(space);
                        self.publish();
                    }
                    Err(e) => {
                        warn!(error = %e, "Capture session ended with an error");
                        self.runtime.stop();
                        self.notice = Some(e.to_string());
                        self.set_state(SessionState::Failed(Failure::capture(&e)));
                    }
                }
            }
            Event::RunFinished { run_id, result } => {
                if self.current_run != Some(run_id) {
                    debug!(%run_id, "Dropping result of an abandoned run");
                    return;
                }
                self.current_run = None;
                self.in_flight = None;

                match result {
                    Ok(completion) => {
                        info!(%run_id, "Pipeline run completed");
                        self.captured_space = None;
                        self.set_state(SessionState::Completed(completion));
                    }
                    Err(failure) => {
                        warn!(%run_id, kind = ?failure.kind, retryable = failure.retryable, message = %failure.message, "Pipeline run failed");
                        self.set_state(SessionState::Failed(failure));
                    }
                }
            }
        }
    }
}
