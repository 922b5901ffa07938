//! The object store: name-keyed maps over shared row handles.
//!
//! One outer readers-writer lock guards the maps; the conventional access
//! pattern is a short critical section to snapshot row handles, then work on
//! the handles without the store lock. Row fields are guarded by the per-row
//! lock inside each handle.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::command::CommandDef;
use super::contact::Contact;
use super::group::{ContactGroup, HostGroup, ServiceGroup};
use super::host::Host;
use super::service::Service;
use super::timeperiod::TimePeriod;
use crate::config::VigilConfig;
use crate::error::ConfigError;

/// Shared handle to a host row.
pub type HostRef = Arc<RwLock<Host>>;
/// Shared handle to a service row.
pub type ServiceRef = Arc<RwLock<Service>>;

struct Inner {
    hosts: Vec<HostRef>,
    hosts_by_name: HashMap<String, HostRef>,
    services: Vec<ServiceRef>,
    /// host name → description → service
    services_by_host: HashMap<String, HashMap<String, ServiceRef>>,
    hostgroups: Vec<Arc<HostGroup>>,
    hostgroups_by_name: HashMap<String, Arc<HostGroup>>,
    servicegroups: Vec<Arc<ServiceGroup>>,
    servicegroups_by_name: HashMap<String, Arc<ServiceGroup>>,
    contacts: Vec<Arc<Contact>>,
    contacts_by_name: HashMap<String, Arc<Contact>>,
    contactgroups: Vec<Arc<ContactGroup>>,
    contactgroups_by_name: HashMap<String, Arc<ContactGroup>>,
    commands: Vec<Arc<CommandDef>>,
    commands_by_name: HashMap<String, Arc<CommandDef>>,
    timeperiods: Vec<Arc<TimePeriod>>,
    timeperiods_by_name: HashMap<String, Arc<TimePeriod>>,
}

/// Process-wide collection of monitored objects.
pub struct ObjectStore {
    inner: RwLock<Inner>,
}

impl ObjectStore {
    /// Build the store from a validated configuration and resolve derived
    /// relations (children, host→services, group back-references).
    pub fn from_config(cfg: &VigilConfig) -> Result<Self, ConfigError> {
        let mut hosts = Vec::new();
        let mut hosts_by_name: HashMap<String, HostRef> = HashMap::new();
        for def in &cfg.hosts {
            let row = Arc::new(RwLock::new(Host::from_def(def)));
            hosts_by_name.insert(def.name.clone(), Arc::clone(&row));
            hosts.push(row);
        }

        let mut services = Vec::new();
        let mut services_by_host: HashMap<String, HashMap<String, ServiceRef>> = HashMap::new();
        for def in &cfg.services {
            let row = Arc::new(RwLock::new(Service::from_def(def)));
            services_by_host
                .entry(def.host_name.clone())
                .or_default()
                .insert(def.description.clone(), Arc::clone(&row));
            services.push(row);
        }

        let mut timeperiods = Vec::new();
        let mut timeperiods_by_name = HashMap::new();
        for def in &cfg.timeperiods {
            let tp = Arc::new(TimePeriod::from_def(def)?);
            timeperiods_by_name.insert(tp.name.clone(), Arc::clone(&tp));
            timeperiods.push(tp);
        }

        let mut commands = Vec::new();
        let mut commands_by_name = HashMap::new();
        for def in &cfg.commands {
            let cmd = Arc::new(CommandDef {
                name:         def.name.clone(),
                command_line: def.command_line.clone(),
            });
            commands_by_name.insert(cmd.name.clone(), Arc::clone(&cmd));
            commands.push(cmd);
        }

        let mut contacts = Vec::new();
        let mut contacts_by_name = HashMap::new();
        for def in &cfg.contacts {
            let c = Arc::new(Contact {
                name:  def.name.clone(),
                alias: if def.alias.is_empty() {
                    def.name.clone()
                } else {
                    def.alias.clone()
                },
                email: def.email.clone(),
                pager: def.pager.clone(),
                host_notification_period: def.host_notification_period.clone(),
                service_notification_period: def.service_notification_period.clone(),
                host_notifications_enabled: def.host_notifications_enabled,
                service_notifications_enabled: def.service_notifications_enabled,
            });
            contacts_by_name.insert(c.name.clone(), Arc::clone(&c));
            contacts.push(c);
        }

        let mut hostgroups = Vec::new();
        let mut hostgroups_by_name = HashMap::new();
        for def in &cfg.hostgroups {
            let g = Arc::new(HostGroup {
                name:    def.name.clone(),
                alias:   if def.alias.is_empty() {
                    def.name.clone()
                } else {
                    def.alias.clone()
                },
                members: def.members.clone(),
            });
            hostgroups_by_name.insert(g.name.clone(), Arc::clone(&g));
            hostgroups.push(g);
        }

        let mut servicegroups = Vec::new();
        let mut servicegroups_by_name = HashMap::new();
        for def in &cfg.servicegroups {
            let members = def
                .members
                .iter()
                .filter_map(|m| {
                    m.split_once(',')
                        .map(|(h, s)| (h.trim().to_string(), s.trim().to_string()))
                })
                .collect();
            let g = Arc::new(ServiceGroup {
                name: def.name.clone(),
                alias: if def.alias.is_empty() {
                    def.name.clone()
                } else {
                    def.alias.clone()
                },
                members,
            });
            servicegroups_by_name.insert(g.name.clone(), Arc::clone(&g));
            servicegroups.push(g);
        }

        let mut contactgroups = Vec::new();
        let mut contactgroups_by_name = HashMap::new();
        for def in &cfg.contactgroups {
            let g = Arc::new(ContactGroup {
                name:    def.name.clone(),
                alias:   if def.alias.is_empty() {
                    def.name.clone()
                } else {
                    def.alias.clone()
                },
                members: def.members.clone(),
            });
            contactgroups_by_name.insert(g.name.clone(), Arc::clone(&g));
            contactgroups.push(g);
        }

        let store = Self {
            inner: RwLock::new(Inner {
                hosts,
                hosts_by_name,
                services,
                services_by_host,
                hostgroups,
                hostgroups_by_name,
                servicegroups,
                servicegroups_by_name,
                contacts,
                contacts_by_name,
                contactgroups,
                contactgroups_by_name,
                commands,
                commands_by_name,
                timeperiods,
                timeperiods_by_name,
            }),
        };
        store.link();
        Ok(store)
    }

    /// Resolve derived relations. Runs once after construction; relations
    /// are never mutated afterwards.
    fn link(&self) {
        let inner = self.inner.read();

        // host children from parents
        let mut children: HashMap<String, Vec<String>> = HashMap::new();
        for row in &inner.hosts {
            let h = row.read();
            for parent in &h.parents {
                children
                    .entry(parent.clone())
                    .or_default()
                    .push(h.name.clone());
            }
        }
        for row in &inner.hosts {
            let name = row.read().name.clone();
            if let Some(kids) = children.remove(&name) {
                row.write().children = kids;
            }
        }

        // host → service descriptions, in configuration order
        for row in &inner.services {
            let (host_name, desc) = {
                let s = row.read();
                (s.host_name.clone(), s.description.clone())
            };
            if let Some(host) = inner.hosts_by_name.get(&host_name) {
                host.write().services.push(desc);
            }
        }

        // group membership back-references
        for g in &inner.hostgroups {
            for member in &g.members {
                if let Some(host) = inner.hosts_by_name.get(member) {
                    host.write().groups.push(g.name.clone());
                }
            }
        }
        for g in &inner.servicegroups {
            for (host_name, desc) in &g.members {
                if let Some(svc) = inner
                    .services_by_host
                    .get(host_name)
                    .and_then(|m| m.get(desc))
                {
                    svc.write().groups.push(g.name.clone());
                }
            }
        }
    }

    // -- lookups ------------------------------------------------------------

    pub fn host(&self, name: &str) -> Option<HostRef> {
        self.inner.read().hosts_by_name.get(name).cloned()
    }

    pub fn service(&self, host: &str, description: &str) -> Option<ServiceRef> {
        self.inner
            .read()
            .services_by_host
            .get(host)
            .and_then(|m| m.get(description))
            .cloned()
    }

    pub fn timeperiod(&self, name: &str) -> Option<Arc<TimePeriod>> {
        self.inner.read().timeperiods_by_name.get(name).cloned()
    }

    pub fn command(&self, name: &str) -> Option<Arc<CommandDef>> {
        self.inner.read().commands_by_name.get(name).cloned()
    }

    pub fn contact(&self, name: &str) -> Option<Arc<Contact>> {
        self.inner.read().contacts_by_name.get(name).cloned()
    }

    pub fn hostgroup(&self, name: &str) -> Option<Arc<HostGroup>> {
        self.inner.read().hostgroups_by_name.get(name).cloned()
    }

    pub fn contactgroup(&self, name: &str) -> Option<Arc<ContactGroup>> {
        self.inner.read().contactgroups_by_name.get(name).cloned()
    }

    // -- snapshots -----------------------------------------------------------

    /// All host rows in configuration order.
    pub fn hosts(&self) -> Vec<HostRef> {
        self.inner.read().hosts.clone()
    }

    /// All service rows in configuration order.
    pub fn services(&self) -> Vec<ServiceRef> {
        self.inner.read().services.clone()
    }

    pub fn hostgroups(&self) -> Vec<Arc<HostGroup>> {
        self.inner.read().hostgroups.clone()
    }

    pub fn servicegroups(&self) -> Vec<Arc<ServiceGroup>> {
        self.inner.read().servicegroups.clone()
    }

    pub fn contacts(&self) -> Vec<Arc<Contact>> {
        self.inner.read().contacts.clone()
    }

    pub fn contactgroups(&self) -> Vec<Arc<ContactGroup>> {
        self.inner.read().contactgroups.clone()
    }

    pub fn commands(&self) -> Vec<Arc<CommandDef>> {
        self.inner.read().commands.clone()
    }

    pub fn timeperiods(&self) -> Vec<Arc<TimePeriod>> {
        self.inner.read().timeperiods.clone()
    }

    pub fn host_count(&self) -> usize {
        self.inner.read().hosts.len()
    }

    pub fn service_count(&self) -> usize {
        self.inner.read().services.len()
    }

    /// Whether `t` is admitted by the named timeperiod. An empty name or an
    /// unknown period admits everything, so objects without an explicit
    /// period are always checkable.
    pub fn time_is_valid(&self, period: &str, t: i64) -> bool {
        if period.is_empty() {
            return true;
        }
        match self.timeperiod(period) {
            Some(tp) => tp.is_valid_time(t),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::small_config;

    #[test]
    fn test_store_lookup_and_order() {
        let cfg = small_config();
        let store = ObjectStore::from_config(&cfg).unwrap();
        assert_eq!(store.host_count(), 2);
        assert_eq!(store.service_count(), 3);
        assert!(store.host("web1").is_some());
        assert!(store.host("nope").is_none());
        assert!(store.service("web1", "http").is_some());
        assert!(store.service("web1", "nope").is_none());

        let hosts = store.hosts();
        assert_eq!(hosts[0].read().name, "web1");
        assert_eq!(hosts[1].read().name, "db1");
    }

    #[test]
    fn test_link_resolves_children_and_services() {
        let cfg = small_config();
        let store = ObjectStore::from_config(&cfg).unwrap();
        // db1 is a parent of web1
        let db = store.host("db1").unwrap();
        assert_eq!(db.read().children, vec!["web1".to_string()]);
        let web = store.host("web1").unwrap();
        assert_eq!(web.read().services, vec!["http", "ssh"]);
    }

    #[test]
    fn test_link_resolves_group_backrefs() {
        let cfg = small_config();
        let store = ObjectStore::from_config(&cfg).unwrap();
        let web = store.host("web1").unwrap();
        assert_eq!(web.read().groups, vec!["web-servers".to_string()]);
    }
}
