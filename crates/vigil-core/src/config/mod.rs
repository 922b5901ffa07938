//! Daemon and object configuration.
//!
//! A single TOML file describes both the daemon settings and the monitored
//! object definitions. Loading is a two-phase affair: deserialize with
//! serde defaults, then run a validation pass that collects *every*
//! problem before refusing to start. A daemon must never partial-start on
//! a config that is only mostly right.

mod defs;
mod validation;

use std::path::{Path, PathBuf};

use serde::Deserialize;

pub use defs::{
    CommandEntry, ContactDef, GroupDef, HostDef, ServiceDef, TimePeriodDef,
};
pub use validation::validate;

use crate::error::ConfigError;

/// Daemon-level settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    /// External command FIFO path.
    pub command_file: PathBuf,
    /// Monitoring log path (the file the `log` table reads back).
    pub log_file: PathBuf,
    pub status_file: PathBuf,
    pub retention_file: PathBuf,
    /// Unix socket for the query protocol. Empty disables it.
    pub query_socket: Option<PathBuf>,
    /// TCP address (`host:port`) for the query protocol. Empty disables it.
    pub query_listen: Option<String>,

    /// Seconds per interval unit; check/retry intervals are multiples of
    /// this.
    pub interval_length: u32,
    /// Ceiling on concurrently running service checks. 0 means unlimited.
    pub max_parallel_service_checks: u32,
    pub service_check_timeout: u64,
    pub host_check_timeout: u64,

    pub status_update_interval: u64,
    pub retention_update_interval: u64,
    /// 0 disables scheduled rotation.
    pub log_rotation_interval: u64,
    pub freshness_check_interval: u64,

    /// Minutes over which initial service checks are spread.
    pub max_service_check_spread: u32,
    /// Minutes over which initial host checks are spread.
    pub max_host_check_spread: u32,

    pub execute_service_checks: bool,
    pub execute_host_checks: bool,
    pub accept_passive_service_checks: bool,
    pub accept_passive_host_checks: bool,
    pub enable_notifications: bool,
    pub enable_event_handlers: bool,
    pub enable_flap_detection: bool,

    pub low_service_flap_threshold: f64,
    pub high_service_flap_threshold: f64,
    pub low_host_flap_threshold: f64,
    pub high_host_flap_threshold: f64,

    /// When set, a DOWN result is taken at face value without walking
    /// parents for reachability.
    pub use_aggressive_host_checking: bool,
    pub use_retained_state: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            command_file: PathBuf::from("/var/lib/vigil/rw/vigil.cmd"),
            log_file: PathBuf::from("/var/log/vigil/vigil.log"),
            status_file: PathBuf::from("/var/lib/vigil/status.dat"),
            retention_file: PathBuf::from("/var/lib/vigil/retention.dat"),
            query_socket: None,
            query_listen: None,
            interval_length: 60,
            max_parallel_service_checks: 0,
            service_check_timeout: 60,
            host_check_timeout: 30,
            status_update_interval: 10,
            retention_update_interval: 3600,
            log_rotation_interval: 0,
            freshness_check_interval: 60,
            max_service_check_spread: 30,
            max_host_check_spread: 30,
            execute_service_checks: true,
            execute_host_checks: true,
            accept_passive_service_checks: true,
            accept_passive_host_checks: true,
            enable_notifications: true,
            enable_event_handlers: true,
            enable_flap_detection: false,
            low_service_flap_threshold: 20.0,
            high_service_flap_threshold: 30.0,
            low_host_flap_threshold: 20.0,
            high_host_flap_threshold: 30.0,
            use_aggressive_host_checking: false,
            use_retained_state: true,
        }
    }
}

/// The whole configuration file: daemon settings plus object definitions.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VigilConfig {
    pub daemon: DaemonConfig,
    #[serde(rename = "host")]
    pub hosts: Vec<HostDef>,
    #[serde(rename = "service")]
    pub services: Vec<ServiceDef>,
    #[serde(rename = "hostgroup")]
    pub hostgroups: Vec<GroupDef>,
    #[serde(rename = "servicegroup")]
    pub servicegroups: Vec<GroupDef>,
    #[serde(rename = "contact")]
    pub contacts: Vec<ContactDef>,
    #[serde(rename = "contactgroup")]
    pub contactgroups: Vec<GroupDef>,
    #[serde(rename = "command")]
    pub commands: Vec<CommandEntry>,
    #[serde(rename = "timeperiod")]
    pub timeperiods: Vec<TimePeriodDef>,
}

impl VigilConfig {
    /// Read and deserialize a configuration file, then validate it.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path:   path.to_path_buf(),
            source: Box::new(source),
        })?;
        let problems = validate(&cfg);
        if problems.is_empty() {
            Ok(cfg)
        } else {
            Err(ConfigError::Invalid { problems })
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    //! Canned configurations for tests across the workspace.

    use super::*;

    /// Two hosts (db1 parent of web1), three services, one hostgroup, one
    /// contact, one command, one 24x7 timeperiod.
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

            [[hostgroup]]
            name = "web-servers"
            members = ["web1"]

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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let d = DaemonConfig::default();
        assert_eq!(d.interval_length, 60);
        assert!(d.execute_service_checks);
        assert!(d.low_service_flap_threshold < d.high_service_flap_threshold);
    }

    #[test]
    fn test_small_config_parses_and_validates() {
        let cfg = test_support::small_config();
        assert_eq!(cfg.hosts.len(), 2);
        assert_eq!(cfg.services.len(), 3);
        assert!(validate(&cfg).is_empty(), "{:?}", validate(&cfg));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = toml::from_str::<VigilConfig>("[daemon]\nbogus_key = 1\n");
        assert!(err.is_err());
    }
}
