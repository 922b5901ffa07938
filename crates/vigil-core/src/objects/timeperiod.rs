//! Timeperiods: weekly windows during which checks run and notifications
//! are permitted.

use chrono::{Datelike, Local, TimeZone, Timelike};

use crate::config::TimePeriodDef;
use crate::error::ConfigError;

/// A window within one day, in seconds since midnight. `end` is exclusive
/// and may be 86400 for "until midnight".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: u32,
    pub end:   u32,
}

/// A named weekly schedule. Index 0 is Sunday, matching the configuration
/// key order.
#[derive(Debug, Clone)]
pub struct TimePeriod {
    pub name:     String,
    pub alias:    String,
    pub weekdays: [Vec<TimeRange>; 7],
}

impl TimePeriod {
    /// Parse a definition. Day values look like `"09:00-17:00,20:00-22:00"`.
    pub fn from_def(def: &TimePeriodDef) -> Result<Self, ConfigError> {
        let mut weekdays: [Vec<TimeRange>; 7] = Default::default();
        let days = [
            (&def.sunday, 0),
            (&def.monday, 1),
            (&def.tuesday, 2),
            (&def.wednesday, 3),
            (&def.thursday, 4),
            (&def.friday, 5),
            (&def.saturday, 6),
        ];
        for (value, idx) in days {
            if let Some(spec) = value {
                weekdays[idx] = parse_ranges(&def.name, spec)?;
            }
        }
        Ok(Self {
            name: def.name.clone(),
            alias: if def.alias.is_empty() {
                def.name.clone()
            } else {
                def.alias.clone()
            },
            weekdays,
        })
    }

    /// Whether `t` (unix seconds, local time) falls inside the period.
    ///
    /// A period with no ranges on any day is treated as always-valid; this
    /// is how `24x7` is conventionally written with every day covered, and
    /// how an intentionally empty period still admits everything rather
    /// than silently disabling its referents.
    pub fn is_valid_time(&self, t: i64) -> bool {
        if self.weekdays.iter().all(Vec::is_empty) {
            return true;
        }
        let Some(local) = Local.timestamp_opt(t, 0).single() else {
            return false;
        };
        let day = local.weekday().num_days_from_sunday() as usize;
        let secs = local.num_seconds_from_midnight();
        self.weekdays[day]
            .iter()
            .any(|r| secs >= r.start && secs < r.end)
    }
}

fn parse_ranges(period: &str, spec: &str) -> Result<Vec<TimeRange>, ConfigError> {
    let mut out = Vec::new();
    for part in spec.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let Some((a, b)) = part.split_once('-') else {
            return Err(invalid(period, part));
        };
        let (start, end) = (parse_hhmm(a), parse_hhmm(b));
        match (start, end) {
            (Some(s), Some(e)) if s < e => out.push(TimeRange { start: s, end: e }),
            _ => return Err(invalid(period, part)),
        }
    }
    Ok(out)
}

fn parse_hhmm(s: &str) -> Option<u32> {
    let (h, m) = s.trim().split_once(':')?;
    let h: u32 = h.parse().ok()?;
    let m: u32 = m.parse().ok()?;
    if h > 24 || m > 59 || (h == 24 && m != 0) {
        return None;
    }
    Some(h * 3600 + m * 60)
}

fn invalid(period: &str, part: &str) -> ConfigError {
    ConfigError::Invalid {
        problems: vec![format!("timeperiod '{period}': bad time range '{part}'")],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(name: &str) -> TimePeriodDef {
        TimePeriodDef {
            name:      name.to_string(),
            alias:     String::new(),
            sunday:    None,
            monday:    None,
            tuesday:   None,
            wednesday: None,
            thursday:  None,
            friday:    None,
            saturday:  None,
        }
    }

    #[test]
    fn test_parse_hhmm() {
        assert_eq!(parse_hhmm("09:00"), Some(9 * 3600));
        assert_eq!(parse_hhmm("24:00"), Some(86400));
        assert_eq!(parse_hhmm("24:30"), None);
        assert_eq!(parse_hhmm("9"), None);
        assert_eq!(parse_hhmm("aa:bb"), None);
    }

    #[test]
    fn test_empty_period_is_always_valid() {
        let tp = TimePeriod::from_def(&def("24x7")).unwrap();
        assert!(tp.is_valid_time(0));
        assert!(tp.is_valid_time(1_700_000_000));
    }

    #[test]
    fn test_range_parsing() {
        let mut d = def("workhours");
        d.monday = Some("09:00-17:00,20:00-22:00".to_string());
        let tp = TimePeriod::from_def(&d).unwrap();
        assert_eq!(tp.weekdays[1].len(), 2);
        assert_eq!(
            tp.weekdays[1][0],
            TimeRange {
                start: 9 * 3600,
                end:   17 * 3600,
            }
        );
    }

    #[test]
    fn test_reversed_range_rejected() {
        let mut d = def("broken");
        d.monday = Some("17:00-09:00".to_string());
        assert!(TimePeriod::from_def(&d).is_err());
    }
}
