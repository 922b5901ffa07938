//! The notification contract.
//!
//! The result handler and the downtime manager decide *when* to notify;
//! delivery (contact resolution, transports) sits behind [`Notifier`]. The
//! shipped [`LogNotifier`] writes notification lines to the monitoring log,
//! one per contact, which is also what the `log` table surfaces.

use std::sync::Arc;

use crate::logfile::MonitorLog;
use crate::objects::{Host, Service};

/// Why a notification is being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationType {
    Problem,
    Recovery,
    Acknowledgement,
    FlapStart,
    FlapStop,
    DowntimeStart,
    DowntimeEnd,
    DowntimeCancelled,
}

impl NotificationType {
    /// Wire name used in notification log lines.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Problem => "PROBLEM",
            Self::Recovery => "RECOVERY",
            Self::Acknowledgement => "ACKNOWLEDGEMENT",
            Self::FlapStart => "FLAPPINGSTART",
            Self::FlapStop => "FLAPPINGSTOP",
            Self::DowntimeStart => "DOWNTIMESTART",
            Self::DowntimeEnd => "DOWNTIMEEND",
            Self::DowntimeCancelled => "DOWNTIMECANCELLED",
        }
    }

    /// Notifications that bypass the acknowledged/suppressed gates because
    /// they describe the suppression itself.
    pub const fn is_meta(self) -> bool {
        !matches!(self, Self::Problem | Self::Recovery)
    }
}

/// Delivery contract. Implementations must be cheap or hand off quickly;
/// they are called from the scheduler loop.
pub trait Notifier: Send + Sync {
    fn notify_host(&self, host: &Host, kind: NotificationType, output: &str);
    fn notify_service(&self, service: &Service, kind: NotificationType, output: &str);
}

/// Writes one `HOST NOTIFICATION` / `SERVICE NOTIFICATION` line per contact
/// to the monitoring log.
pub struct LogNotifier {
    log: Arc<MonitorLog>,
}

impl LogNotifier {
    pub fn new(log: Arc<MonitorLog>) -> Self {
        Self { log }
    }

    fn state_text(kind: NotificationType, state_name: &str) -> String {
        match kind {
            NotificationType::Problem | NotificationType::Recovery => state_name.to_string(),
            other => format!("{};{state_name}", other.name()),
        }
    }
}

impl Notifier for LogNotifier {
    fn notify_host(&self, host: &Host, kind: NotificationType, output: &str) {
        let state = Self::state_text(kind, host.state.name());
        for contact in &host.contacts {
            self.log.log(&format!(
                "HOST NOTIFICATION: {contact};{};{state};notify-host;{output}",
                host.name
            ));
        }
    }

    fn notify_service(&self, service: &Service, kind: NotificationType, output: &str) {
        let state = Self::state_text(kind, service.state.name());
        for contact in &service.contacts {
            self.log.log(&format!(
                "SERVICE NOTIFICATION: {contact};{};{};{state};notify-service;{output}",
                service.host_name, service.description
            ));
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    //! A notifier that records every dispatch for assertions.

    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::{NotificationType, Notifier};
    use crate::objects::{Host, Service};

    /// One recorded notification.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Recorded {
        pub host:    String,
        pub service: Option<String>,
        pub kind:    NotificationType,
    }

    /// Test double capturing notifications in order.
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<Recorded>>,
    }

    impl RecordingNotifier {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn take(&self) -> Vec<Recorded> {
            std::mem::take(&mut *self.sent.lock())
        }

        pub fn count(&self) -> usize {
            self.sent.lock().len()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify_host(&self, host: &Host, kind: NotificationType, _output: &str) {
            self.sent.lock().push(Recorded {
                host:    host.name.clone(),
                service: None,
                kind,
            });
        }

        fn notify_service(&self, service: &Service, kind: NotificationType, _output: &str) {
            self.sent.lock().push(Recorded {
                host:    service.host_name.clone(),
                service: Some(service.description.clone()),
                kind,
            });
        }
    }
}
