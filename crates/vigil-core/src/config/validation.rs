//! Semantic validation of a parsed configuration.
//!
//! Every problem is collected; the caller refuses to start if the returned
//! list is non-empty. Messages name the offending object so an operator can
//! fix a large config in one pass.

use std::collections::{HashMap, HashSet};

use super::VigilConfig;

/// Run all validations and return the collected problems.
pub fn validate(cfg: &VigilConfig) -> Vec<String> {
    let mut problems = Vec::new();

    validate_daemon(cfg, &mut problems);

    let host_names: HashSet<&str> = cfg.hosts.iter().map(|h| h.name.as_str()).collect();
    let command_names: HashSet<&str> = cfg.commands.iter().map(|c| c.name.as_str()).collect();
    let period_names: HashSet<&str> = cfg.timeperiods.iter().map(|t| t.name.as_str()).collect();
    let contact_names: HashSet<&str> = cfg.contacts.iter().map(|c| c.name.as_str()).collect();

    validate_unique(cfg, &mut problems);
    validate_hosts(cfg, &host_names, &command_names, &period_names, &contact_names, &mut problems);
    validate_services(cfg, &host_names, &command_names, &period_names, &contact_names, &mut problems);
    validate_groups(cfg, &host_names, &contact_names, &mut problems);
    validate_parent_cycles(cfg, &mut problems);

    problems
}

fn validate_daemon(cfg: &VigilConfig, problems: &mut Vec<String>) {
    let d = &cfg.daemon;
    if d.interval_length == 0 {
        problems.push("daemon: interval_length must be positive".into());
    }
    if d.low_service_flap_threshold >= d.high_service_flap_threshold {
        problems.push("daemon: low_service_flap_threshold must be below high_service_flap_threshold".into());
    }
    if d.low_host_flap_threshold >= d.high_host_flap_threshold {
        problems.push("daemon: low_host_flap_threshold must be below high_host_flap_threshold".into());
    }
    if d.max_service_check_spread == 0 {
        problems.push("daemon: max_service_check_spread must be positive".into());
    }
    if d.max_host_check_spread == 0 {
        problems.push("daemon: max_host_check_spread must be positive".into());
    }
}

fn validate_unique(cfg: &VigilConfig, problems: &mut Vec<String>) {
    let mut seen = HashSet::new();
    for h in &cfg.hosts {
        if !seen.insert(h.name.as_str()) {
            problems.push(format!("host '{}': duplicate definition", h.name));
        }
    }
    let mut seen = HashSet::new();
    for s in &cfg.services {
        if !seen.insert((s.host_name.as_str(), s.description.as_str())) {
            problems.push(format!(
                "service '{}/{}': duplicate definition",
                s.host_name, s.description
            ));
        }
    }
    for (kind, names) in [
        ("command", cfg.commands.iter().map(|c| c.name.as_str()).collect::<Vec<_>>()),
        ("timeperiod", cfg.timeperiods.iter().map(|t| t.name.as_str()).collect()),
        ("contact", cfg.contacts.iter().map(|c| c.name.as_str()).collect()),
        ("hostgroup", cfg.hostgroups.iter().map(|g| g.name.as_str()).collect()),
        ("servicegroup", cfg.servicegroups.iter().map(|g| g.name.as_str()).collect()),
        ("contactgroup", cfg.contactgroups.iter().map(|g| g.name.as_str()).collect()),
    ] {
        let mut seen = HashSet::new();
        for n in names {
            if !seen.insert(n) {
                problems.push(format!("{kind} '{n}': duplicate definition"));
            }
        }
    }
}

fn check_command_ref(kind: &str, who: &str, reference: &str, commands: &HashSet<&str>, problems: &mut Vec<String>) {
    let base = reference.split('!').next().unwrap_or(reference);
    if base.is_empty() {
        problems.push(format!("{kind} '{who}': empty check_command"));
    } else if !commands.contains(base) {
        problems.push(format!("{kind} '{who}': unknown check command '{base}'"));
    }
}

fn check_period_ref(kind: &str, who: &str, field: &str, reference: &str, periods: &HashSet<&str>, problems: &mut Vec<String>) {
    if !reference.is_empty() && !periods.contains(reference) {
        problems.push(format!("{kind} '{who}': unknown {field} '{reference}'"));
    }
}

fn check_contact_refs(kind: &str, who: &str, refs: &[String], contacts: &HashSet<&str>, problems: &mut Vec<String>) {
    for c in refs {
        if !contacts.contains(c.as_str()) {
            problems.push(format!("{kind} '{who}': unknown contact '{c}'"));
        }
    }
}

fn validate_hosts(
    cfg: &VigilConfig,
    hosts: &HashSet<&str>,
    commands: &HashSet<&str>,
    periods: &HashSet<&str>,
    contacts: &HashSet<&str>,
    problems: &mut Vec<String>,
) {
    for h in &cfg.hosts {
        check_command_ref("host", &h.name, &h.check_command, commands, problems);
        check_period_ref("host", &h.name, "check_period", &h.check_period, periods, problems);
        check_period_ref("host", &h.name, "notification_period", &h.notification_period, periods, problems);
        check_contact_refs("host", &h.name, &h.contacts, contacts, problems);
        for p in &h.parents {
            if !hosts.contains(p.as_str()) {
                problems.push(format!("host '{}': unknown parent '{p}'", h.name));
            }
            if p == &h.name {
                problems.push(format!("host '{}': is its own parent", h.name));
            }
        }
        if h.check_interval <= 0.0 {
            problems.push(format!("host '{}': check_interval must be positive", h.name));
        }
        if h.retry_interval <= 0.0 {
            problems.push(format!("host '{}': retry_interval must be positive", h.name));
        }
    }
}

fn validate_services(
    cfg: &VigilConfig,
    hosts: &HashSet<&str>,
    commands: &HashSet<&str>,
    periods: &HashSet<&str>,
    contacts: &HashSet<&str>,
    problems: &mut Vec<String>,
) {
    for s in &cfg.services {
        let who = format!("{}/{}", s.host_name, s.description);
        if !hosts.contains(s.host_name.as_str()) {
            problems.push(format!("service '{who}': unknown host"));
        }
        check_command_ref("service", &who, &s.check_command, commands, problems);
        check_period_ref("service", &who, "check_period", &s.check_period, periods, problems);
        check_period_ref("service", &who, "notification_period", &s.notification_period, periods, problems);
        check_contact_refs("service", &who, &s.contacts, contacts, problems);
        if s.check_interval <= 0.0 {
            problems.push(format!("service '{who}': check_interval must be positive"));
        }
        if s.retry_interval <= 0.0 {
            problems.push(format!("service '{who}': retry_interval must be positive"));
        }
    }
}

fn validate_groups(
    cfg: &VigilConfig,
    hosts: &HashSet<&str>,
    contacts: &HashSet<&str>,
    problems: &mut Vec<String>,
) {
    let service_keys: HashSet<(&str, &str)> = cfg
        .services
        .iter()
        .map(|s| (s.host_name.as_str(), s.description.as_str()))
        .collect();

    for g in &cfg.hostgroups {
        for m in &g.members {
            if !hosts.contains(m.as_str()) {
                problems.push(format!("hostgroup '{}': unknown member '{m}'", g.name));
            }
        }
    }
    for g in &cfg.servicegroups {
        for m in &g.members {
            match m.split_once(',') {
                Some((h, d)) if service_keys.contains(&(h.trim(), d.trim())) => {}
                Some((h, d)) => problems.push(format!(
                    "servicegroup '{}': unknown member '{},{}'",
                    g.name,
                    h.trim(),
                    d.trim()
                )),
                None => problems.push(format!(
                    "servicegroup '{}': member '{m}' is not 'host,description'",
                    g.name
                )),
            }
        }
    }
    for g in &cfg.contactgroups {
        for m in &g.members {
            if !contacts.contains(m.as_str()) {
                problems.push(format!("contactgroup '{}': unknown member '{m}'", g.name));
            }
        }
    }
}

/// Detect cycles in the host parent graph with an iterative DFS.
fn validate_parent_cycles(cfg: &VigilConfig, problems: &mut Vec<String>) {
    let parents: HashMap<&str, &Vec<String>> =
        cfg.hosts.iter().map(|h| (h.name.as_str(), &h.parents)).collect();

    // 0 = unvisited, 1 = on stack, 2 = done
    let mut mark: HashMap<&str, u8> = HashMap::new();
    for h in &cfg.hosts {
        if mark.get(h.name.as_str()).copied().unwrap_or(0) != 0 {
            continue;
        }
        let mut stack: Vec<(&str, usize)> = vec![(h.name.as_str(), 0)];
        mark.insert(h.name.as_str(), 1);
        while let Some((name, idx)) = stack.pop() {
            let ps = parents.get(name).copied();
            let next = ps.and_then(|p| p.get(idx));
            match next {
                Some(parent) => {
                    stack.push((name, idx + 1));
                    let parent = parent.as_str();
                    match mark.get(parent).copied().unwrap_or(0) {
                        0 if parents.contains_key(parent) => {
                            mark.insert(parent, 1);
                            stack.push((parent, 0));
                        }
                        1 => {
                            problems.push(format!(
                                "host '{parent}': parent relationship forms a cycle"
                            ));
                        }
                        _ => {}
                    }
                }
                None => {
                    mark.insert(name, 2);
                }
            }
        }
    }
}
