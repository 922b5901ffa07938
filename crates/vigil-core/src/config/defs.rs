//! Object definition records as they appear in the configuration file.
//!
//! These are plain serde targets; the object store converts them into live
//! rows at startup.

use serde::Deserialize;

fn default_true() -> bool {
    true
}

fn default_check_interval() -> f64 {
    5.0
}

fn default_retry_interval() -> f64 {
    1.0
}

fn default_max_attempts() -> u32 {
    3
}

fn default_notification_interval() -> f64 {
    60.0
}

fn default_low_flap() -> f64 {
    20.0
}

fn default_high_flap() -> f64 {
    30.0
}

/// A `[[host]]` block.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostDef {
    pub name: String,
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub address: String,
    pub check_command: String,
    #[serde(default = "default_check_interval")]
    pub check_interval: f64,
    #[serde(default = "default_retry_interval")]
    pub retry_interval: f64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub check_period: String,
    #[serde(default)]
    pub notification_period: String,
    #[serde(default = "default_notification_interval")]
    pub notification_interval: f64,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub contacts: Vec<String>,
    #[serde(default)]
    pub contact_groups: Vec<String>,
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,
    #[serde(default = "default_true")]
    pub active_checks_enabled: bool,
    #[serde(default = "default_true")]
    pub passive_checks_enabled: bool,
    #[serde(default = "default_true")]
    pub event_handler_enabled: bool,
    #[serde(default = "default_true")]
    pub flap_detection_enabled: bool,
    #[serde(default)]
    pub check_freshness: bool,
    #[serde(default)]
    pub freshness_threshold: u32,
    #[serde(default = "default_low_flap")]
    pub low_flap_threshold: f64,
    #[serde(default = "default_high_flap")]
    pub high_flap_threshold: f64,
    #[serde(default)]
    pub notes: String,
}

/// A `[[service]]` block.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceDef {
    pub host_name: String,
    pub description: String,
    pub check_command: String,
    #[serde(default = "default_check_interval")]
    pub check_interval: f64,
    #[serde(default = "default_retry_interval")]
    pub retry_interval: f64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub check_period: String,
    #[serde(default)]
    pub notification_period: String,
    #[serde(default = "default_notification_interval")]
    pub notification_interval: f64,
    #[serde(default)]
    pub contacts: Vec<String>,
    #[serde(default)]
    pub contact_groups: Vec<String>,
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,
    #[serde(default = "default_true")]
    pub active_checks_enabled: bool,
    #[serde(default = "default_true")]
    pub passive_checks_enabled: bool,
    #[serde(default = "default_true")]
    pub event_handler_enabled: bool,
    #[serde(default = "default_true")]
    pub flap_detection_enabled: bool,
    #[serde(default)]
    pub check_freshness: bool,
    #[serde(default)]
    pub freshness_threshold: u32,
    #[serde(default = "default_low_flap")]
    pub low_flap_threshold: f64,
    #[serde(default = "default_high_flap")]
    pub high_flap_threshold: f64,
    #[serde(default)]
    pub notes: String,
}

/// A `[[hostgroup]]`, `[[servicegroup]]` or `[[contactgroup]]` block.
/// Servicegroup members are written `"host,description"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupDef {
    pub name: String,
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub members: Vec<String>,
}

/// A `[[contact]]` block.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContactDef {
    pub name: String,
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub pager: String,
    #[serde(default)]
    pub host_notification_period: String,
    #[serde(default)]
    pub service_notification_period: String,
    #[serde(default = "default_true")]
    pub host_notifications_enabled: bool,
    #[serde(default = "default_true")]
    pub service_notifications_enabled: bool,
}

/// A `[[command]]` block.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandEntry {
    pub name:         String,
    pub command_line: String,
}

/// A `[[timeperiod]]` block. Day values look like
/// `"09:00-17:00,20:00-22:00"`; an absent day has no valid times (but a
/// period with no days at all admits everything).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimePeriodDef {
    pub name: String,
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub sunday: Option<String>,
    #[serde(default)]
    pub monday: Option<String>,
    #[serde(default)]
    pub tuesday: Option<String>,
    #[serde(default)]
    pub wednesday: Option<String>,
    #[serde(default)]
    pub thursday: Option<String>,
    #[serde(default)]
    pub friday: Option<String>,
    #[serde(default)]
    pub saturday: Option<String>,
}
