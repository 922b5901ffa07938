//! Shared fixtures for the integration tests.

// Not every test binary uses every fixture.
#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use vigil_core::{
    CommentManager, DowntimeManager, Host, MonitorLog, NotificationType, Notifier, ObjectStore,
    ProgramState, ResultHandler, ResultPolicy, Service, VigilConfig,
};

/// A notifier that records every dispatch.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, Option<String>, NotificationType)>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn take(&self) -> Vec<(String, Option<String>, NotificationType)> {
        std::mem::take(&mut *self.sent.lock())
    }

    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }
}

impl Notifier for RecordingNotifier {
    fn notify_host(&self, host: &Host, kind: NotificationType, _output: &str) {
        self.sent.lock().push((host.name.clone(), None, kind));
    }

    fn notify_service(&self, service: &Service, kind: NotificationType, _output: &str) {
        self.sent.lock().push((
            service.host_name.clone(),
            Some(service.description.clone()),
            kind,
        ));
    }
}

/// Two hosts (db1 parent of web1), three services, one contact, one command.
pub fn small_config() -> VigilConfig {
    let toml_text = r#"
        [daemon]
        interval_length = 60

        [[command]]
        name = "check_tcp"
        command_line = "/usr/lib/monitoring/check_tcp -H $HOSTADDRESS$ -p $ARG1$"

        [[timeperiod]]
        name = "24x7"

        [[contact]]
        name = "ops"
        email = "ops@example.net"

        [[host]]
        name = "web1"
        address = "10.0.0.10"
        check_command = "check_tcp!22"
        parents = ["db1"]
        contacts = ["ops"]
        max_attempts = 3

        [[host]]
        name = "db1"
        address = "10.0.0.11"
        check_command = "check_tcp!22"
        contacts = ["ops"]
        max_attempts = 3

        [[service]]
        host_name = "web1"
        description = "http"
        check_command = "check_tcp!80"
        contacts = ["ops"]
        max_attempts = 3

        [[service]]
        host_name = "web1"
        description = "ssh"
        check_command = "check_tcp!22"
        contacts = ["ops"]
        max_attempts = 3

        [[service]]
        host_name = "db1"
        description = "postgres"
        check_command = "check_tcp!5432"
        contacts = ["ops"]
        max_attempts = 4
    "#;
    toml::from_str(toml_text).expect("test config parses")
}

/// Fully wired core: store, managers, recording notifier, result handler.
pub struct World {
    pub store: Arc<ObjectStore>,
    pub comments: Arc<CommentManager>,
    pub downtimes: Arc<DowntimeManager>,
    pub globals: Arc<ProgramState>,
    pub notifier: Arc<RecordingNotifier>,
    pub handler: ResultHandler,
}

pub fn world() -> World {
    let cfg = small_config();
    let store = Arc::new(ObjectStore::from_config(&cfg).expect("store builds"));
    let comments = Arc::new(CommentManager::new());
    let globals = Arc::new(ProgramState::new(&cfg.daemon, 1_000));
    let log = Arc::new(MonitorLog::sink());
    let notifier = RecordingNotifier::new();
    let downtimes = Arc::new(DowntimeManager::new(
        Arc::clone(&store),
        Arc::clone(&comments),
        Arc::clone(&log),
        notifier.clone(),
    ));
    let handler = ResultHandler::new(
        Arc::clone(&store),
        Arc::clone(&comments),
        Arc::clone(&downtimes),
        Arc::clone(&globals),
        log,
        notifier.clone(),
        ResultPolicy {
            interval_length: 60,
            use_aggressive_host_checking: false,
        },
    );
    World {
        store,
        comments,
        downtimes,
        globals,
        notifier,
        handler,
    }
}
