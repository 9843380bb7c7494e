// Defines the core data structures shared by the engine and the UI.

use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

/// Lifecycle state of a service as reported by `brew services list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Running,
    Stopped,
    /// The row carried no status column at all.
    Unknown,
}

/// Represents one service known to the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRecord {
    pub name: String,
    pub status: ServiceStatus,
    pub owner: Option<String>, // e.g., "root" for services started with sudo
}

impl ServiceRecord {
    pub fn new(name: impl Into<String>, status: ServiceStatus) -> Self {
        Self {
            name: name.into(),
            status,
            owner: None,
        }
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn is_running(&self) -> bool {
        self.status == ServiceStatus::Running
    }

    /// A service owned by someone other than `acting_user` cannot be
    /// controlled from here; the supervisor would reject the mutation.
    pub fn is_foreign(&self, acting_user: &str) -> bool {
        self.owner.as_deref().is_some_and(|owner| owner != acting_user)
    }

    /// Verb a single activation should issue for this record.
    ///
    /// The alternate gesture always restarts. Otherwise a running service is
    /// stopped and anything else (stopped or unknown) is started.
    pub fn toggled_verb(&self, alternate: bool) -> Verb {
        if alternate {
            Verb::Restart
        } else if self.is_running() {
            Verb::Stop
        } else {
            Verb::Start
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Start,
    Stop,
    Restart,
}

impl Verb {
    /// Subcommand passed to `brew services`.
    pub fn as_arg(self) -> &'static str {
        match self {
            Verb::Start => "start",
            Verb::Stop => "stop",
            Verb::Restart => "restart",
        }
    }

    pub fn progressive(self) -> &'static str {
        match self {
            Verb::Start => "Starting",
            Verb::Stop => "Stopping",
            Verb::Restart => "Restarting",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg())
    }
}

/// What a control command applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Service(String),
    All,
}

impl Target {
    pub fn as_arg(&self) -> &str {
        match self {
            Target::Service(name) => name,
            Target::All => "--all",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Service(name) => f.write_str(name),
            Target::All => f.write_str("all"),
        }
    }
}

/// A control request the engine is currently executing.
#[derive(Debug, Clone)]
pub struct PendingOperation {
    pub target: Target,
    pub verb: Verb,
    pub issued_at: Instant,
}

impl PendingOperation {
    pub fn new(verb: Verb, target: Target) -> Self {
        Self {
            target,
            verb,
            issued_at: Instant::now(),
        }
    }

    /// Human readable progress label, e.g. "Starting redis...".
    pub fn label(&self) -> String {
        format!("{} {}...", self.verb.progressive(), self.target)
    }

    /// Argument vector for the supervisor.
    pub fn args(&self) -> Vec<String> {
        vec![
            "services".to_string(),
            self.verb.as_arg().to_string(),
            self.target.as_arg().to_string(),
        ]
    }
}

/// Whether the supervisor executable could be found at all.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Availability {
    #[default]
    Available,
    Unavailable { path: PathBuf },
}

/// Immutable view of every known service, published by the engine.
///
/// Each snapshot fully replaces the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Snapshot {
    pub services: Vec<ServiceRecord>,
    pub loading: bool,
    pub label: Option<String>,
    pub availability: Availability,
}

impl Snapshot {
    pub fn find(&self, name: &str) -> Option<&ServiceRecord> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Copy of this snapshot marked as busy with `label`.
    pub fn loading_with(&self, label: impl Into<String>) -> Self {
        Self {
            loading: true,
            label: Some(label.into()),
            ..self.clone()
        }
    }
}

/// Dismissible advisory message for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggled_verb_running_stops() {
        let service = ServiceRecord::new("redis", ServiceStatus::Running);
        assert_eq!(service.toggled_verb(false), Verb::Stop);
    }

    #[test]
    fn test_toggled_verb_stopped_and_unknown_start() {
        let stopped = ServiceRecord::new("redis", ServiceStatus::Stopped);
        let unknown = ServiceRecord::new("redis", ServiceStatus::Unknown);
        assert_eq!(stopped.toggled_verb(false), Verb::Start);
        assert_eq!(unknown.toggled_verb(false), Verb::Start);
    }

    #[test]
    fn test_toggled_verb_alternate_restarts() {
        let running = ServiceRecord::new("redis", ServiceStatus::Running);
        let stopped = ServiceRecord::new("redis", ServiceStatus::Stopped);
        assert_eq!(running.toggled_verb(true), Verb::Restart);
        assert_eq!(stopped.toggled_verb(true), Verb::Restart);
    }

    #[test]
    fn test_is_foreign() {
        let unowned = ServiceRecord::new("redis", ServiceStatus::Running);
        let mine = ServiceRecord::new("redis", ServiceStatus::Running).with_owner("alice");
        let theirs = ServiceRecord::new("nginx", ServiceStatus::Running).with_owner("root");

        assert!(!unowned.is_foreign("alice"));
        assert!(!mine.is_foreign("alice"));
        assert!(theirs.is_foreign("alice"));
    }

    #[test]
    fn test_pending_operation_labels_and_args() {
        let one = PendingOperation::new(Verb::Start, Target::Service("redis".into()));
        assert_eq!(one.label(), "Starting redis...");
        assert_eq!(one.args(), vec!["services", "start", "redis"]);

        let all = PendingOperation::new(Verb::Restart, Target::All);
        assert_eq!(all.label(), "Restarting all...");
        assert_eq!(all.args(), vec!["services", "restart", "--all"]);
    }

    #[test]
    fn test_loading_with_keeps_services() {
        let snapshot = Snapshot {
            services: vec![ServiceRecord::new("redis", ServiceStatus::Stopped)],
            ..Default::default()
        };
        let busy = snapshot.loading_with("Refreshing...");
        assert!(busy.loading);
        assert_eq!(busy.label.as_deref(), Some("Refreshing..."));
        assert_eq!(busy.services, snapshot.services);
    }
}
