// Keeps the published service list in sync with the supervisor.
//
// All subprocess calls happen on one worker task that drains a FIFO request
// queue, so at most one `brew` invocation is ever in flight and snapshots
// reach the observer in the order they were produced.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::brew::{ExecError, Supervisor};
use super::model::{Availability, Notice, PendingOperation, Snapshot, Target, Verb};
use super::observer::Observer;
use super::parser::{ParseError, parse_service_list};

const REFRESH_LABEL: &str = "Refreshing...";
const LIST_ACTION: &str = "list services";

/// Failures recovered at the engine boundary. Observers only ever see the
/// [`Notice`] derived from one of these.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("supervisor executable not found at {path}")]
    ExecutableUnavailable { path: PathBuf },

    #[error("could not {action}: {source}")]
    CommandFailed {
        action: String,
        #[source]
        source: ExecError,
    },

    #[error("could not read service list: {0}")]
    ParseFailure(#[from] ParseError),

    #[error("refusing to {verb} {name}: owned by {owner}")]
    ForeignServiceRejected {
        verb: Verb,
        name: String,
        owner: String,
    },
}

impl SyncError {
    fn from_exec(action: impl Into<String>, err: ExecError) -> Self {
        match err {
            ExecError::Unavailable { path } => Self::ExecutableUnavailable { path },
            source => Self::CommandFailed {
                action: action.into(),
                source,
            },
        }
    }

    /// Exit code of the failed command, when it ran to completion.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::CommandFailed {
                source: ExecError::Failed { code },
                ..
            } => *code,
            _ => None,
        }
    }

    pub fn notice(&self) -> Notice {
        match self {
            Self::ExecutableUnavailable { path } => Notice {
                title: "Homebrew Services not found".to_string(),
                detail: format!("No executable at {}.", path.display()),
            },
            Self::CommandFailed { action, source } if action == LIST_ACTION => Notice {
                title: format!("Could not {action}"),
                detail: format!("Showing the last known state until a listing succeeds. ({source})"),
            },
            Self::CommandFailed { action, source } => Notice {
                title: format!("Could not {action}"),
                detail: format!("You will need to manually resolve the issue. ({source})"),
            },
            Self::ParseFailure(err) => Notice {
                title: "Could not read service list".to_string(),
                detail: err.to_string(),
            },
            Self::ForeignServiceRejected { verb, name, owner } => Notice {
                title: format!("Cannot {verb} {name}"),
                detail: format!("{name} is managed by {owner} and cannot be changed from here."),
            },
        }
    }
}

/// Where the worker currently is. One per engine, not per service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Refreshing,
    Mutating,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Request {
    Refresh,
    Control { verb: Verb, target: Target },
    Toggle { name: String, alternate: bool },
}

/// Cheap, cloneable front door to a running engine.
///
/// Every method only enqueues; none of them wait for the supervisor.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<Request>,
    refresh_queued: Arc<AtomicBool>,
}

impl EngineHandle {
    pub fn start(&self, name: impl Into<String>) {
        self.control(Verb::Start, Target::Service(name.into()));
    }

    pub fn stop(&self, name: impl Into<String>) {
        self.control(Verb::Stop, Target::Service(name.into()));
    }

    pub fn restart(&self, name: impl Into<String>) {
        self.control(Verb::Restart, Target::Service(name.into()));
    }

    pub fn start_all(&self) {
        self.control(Verb::Start, Target::All);
    }

    pub fn stop_all(&self) {
        self.control(Verb::Stop, Target::All);
    }

    pub fn restart_all(&self) {
        self.control(Verb::Restart, Target::All);
    }

    /// Starts or stops `name` depending on its current status, or restarts
    /// it when `alternate` is set.
    pub fn toggle(&self, name: impl Into<String>, alternate: bool) {
        self.send(Request::Toggle {
            name: name.into(),
            alternate,
        });
    }

    /// Re-lists services. Calls made while a refresh is still waiting in the
    /// queue are folded into that one.
    pub fn refresh(&self) {
        if !self.refresh_queued.swap(true, Ordering::AcqRel) {
            self.send(Request::Refresh);
        }
    }

    pub fn control(&self, verb: Verb, target: Target) {
        self.send(Request::Control { verb, target });
    }

    fn send(&self, request: Request) {
        if let Err(e) = self.tx.send(request) {
            warn!("sync engine has stopped, dropping {:?}", e.0);
        }
    }

    /// A handle whose requests land in the returned receiver, with no engine
    /// behind it.
    #[cfg(test)]
    pub(crate) fn detached() -> (Self, mpsc::UnboundedReceiver<Request>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Self {
            tx,
            refresh_queued: Arc::new(AtomicBool::new(false)),
        };
        (handle, rx)
    }
}

/// Owns the authoritative service list and the pending operation.
pub struct SyncEngine<S, O> {
    supervisor: S,
    observer: O,
    acting_user: String,
    state: EngineState,
    /// Last-known-good view, never marked as loading.
    current: Snapshot,
    pending: Option<PendingOperation>,
    published: u64,
    refresh_queued: Arc<AtomicBool>,
}

impl<S, O> SyncEngine<S, O>
where
    S: Supervisor + Sync + 'static,
    O: Observer,
{
    pub fn new(supervisor: S, observer: O, acting_user: impl Into<String>) -> Self {
        Self {
            supervisor,
            observer,
            acting_user: acting_user.into(),
            state: EngineState::Idle,
            current: Snapshot::default(),
            pending: None,
            published: 0,
            refresh_queued: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Moves the engine onto its own task.
    ///
    /// The task exits once every [`EngineHandle`] has been dropped and the
    /// queue is drained.
    pub fn spawn(self) -> (EngineHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = EngineHandle {
            tx,
            refresh_queued: Arc::clone(&self.refresh_queued),
        };
        let task = tokio::spawn(self.run(rx));
        (handle, task)
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Request>) {
        info!("sync engine started for user {}", self.acting_user);
        while let Some(request) = rx.recv().await {
            self.handle(request).await;
        }
        info!("sync engine stopped after {} snapshots", self.published);
    }

    async fn handle(&mut self, request: Request) {
        match request {
            Request::Refresh => {
                self.refresh_queued.store(false, Ordering::Release);
                self.refresh().await;
            }
            Request::Control { verb, target } => self.control(verb, target).await,
            Request::Toggle { name, alternate } => {
                let Some(verb) = self.current.find(&name).map(|s| s.toggled_verb(alternate)) else {
                    warn!("ignoring toggle of unknown service {name}");
                    return;
                };
                self.control(verb, Target::Service(name)).await;
            }
        }
    }

    async fn refresh(&mut self) {
        self.transition(EngineState::Refreshing);
        self.publish(self.current.loading_with(REFRESH_LABEL));
        self.reload().await;
    }

    async fn control(&mut self, verb: Verb, target: Target) {
        if let Target::Service(name) = &target {
            if let Some(owner) = self.foreign_owner(name) {
                let err = SyncError::ForeignServiceRejected {
                    verb,
                    name: name.clone(),
                    owner,
                };
                warn!("{err}");
                self.observer.on_notice(err.notice());
                return;
            }
        }

        let op = PendingOperation::new(verb, target);
        let args = op.args();
        self.transition(EngineState::Mutating);
        self.publish(self.current.loading_with(op.label()));
        self.pending = Some(op);

        let result = self.supervisor.run(&args).await;
        if let Some(op) = &self.pending {
            debug!("{} finished after {:?}", op.label(), op.issued_at.elapsed());
        }

        if let Err(e) = result {
            let action = format!("{verb} {}", self.pending_target());
            match SyncError::from_exec(action, e) {
                SyncError::ExecutableUnavailable { path } => {
                    warn!("brew not found at {}", path.display());
                    self.current.availability = Availability::Unavailable { path };
                    self.finish();
                    return;
                }
                err => {
                    warn!(exit_code = ?err.exit_code(), "{err}");
                    self.observer.on_notice(err.notice());
                }
            }
        }

        // The supervisor or another client may have changed more than we
        // asked for, so always re-derive from a fresh listing.
        self.transition(EngineState::Refreshing);
        self.reload().await;
    }

    /// Lists services and publishes the result, keeping the last-known-good
    /// services when anything goes wrong.
    async fn reload(&mut self) {
        let args = ["services".to_string(), "list".to_string()];
        let result = self
            .supervisor
            .run_capturing_output(&args)
            .await
            .map_err(|e| SyncError::from_exec(LIST_ACTION, e))
            .and_then(|raw| parse_service_list(&raw).map_err(SyncError::from));

        match result {
            Ok(services) => {
                debug!("listed {} services", services.len());
                self.current = Snapshot {
                    services,
                    ..Snapshot::default()
                };
            }
            Err(SyncError::ExecutableUnavailable { path }) => {
                warn!("brew not found at {}", path.display());
                self.current.availability = Availability::Unavailable { path };
            }
            Err(err) => {
                warn!(exit_code = ?err.exit_code(), "{err}");
                self.observer.on_notice(err.notice());
            }
        }

        self.finish();
    }

    fn finish(&mut self) {
        self.transition(EngineState::Idle);
        self.publish(self.current.clone());
        self.pending = None;
    }

    fn foreign_owner(&self, name: &str) -> Option<String> {
        self.current
            .find(name)
            .filter(|s| s.is_foreign(&self.acting_user))
            .and_then(|s| s.owner.clone())
    }

    fn pending_target(&self) -> String {
        self.pending
            .as_ref()
            .map(|op| op.target.to_string())
            .unwrap_or_default()
    }

    fn transition(&mut self, next: EngineState) {
        if self.state != next {
            debug!("engine {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    fn publish(&mut self, snapshot: Snapshot) {
        self.published += 1;
        debug!(
            "publish #{}: {} services, loading={}",
            self.published,
            snapshot.services.len(),
            snapshot.loading
        );
        self.observer.on_snapshot(snapshot);
    }
}
