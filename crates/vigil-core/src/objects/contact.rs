//! Contact records. The core only carries them for the query engine and
//! for expansion into notification log lines; delivery transports are out
//! of scope.

/// A notification recipient.
#[derive(Debug, Clone)]
pub struct Contact {
    pub name:  String,
    pub alias: String,
    pub email: String,
    pub pager: String,
    pub host_notification_period: String,
    pub service_notification_period: String,
    pub host_notifications_enabled: bool,
    pub service_notifications_enabled: bool,
}
