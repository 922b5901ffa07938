//! Line parsing for the external-command channel.

use super::table::expected_args;
use super::RawCommand;
use crate::error::CommandError;

/// Parse one `[<unix-ts>] NAME[;arg;…]` line.
///
/// Known commands are split to their expected argument count, with the last
/// argument consuming all remaining text. Unknown commands keep the whole
/// remainder as a single argument.
pub fn parse_line(line: &str) -> Result<RawCommand, CommandError> {
    let malformed = || CommandError::Malformed {
        line: line.to_string(),
    };

    let rest = line.trim();
    let rest = rest.strip_prefix('[').ok_or_else(malformed)?;
    let (ts, rest) = rest.split_once(']').ok_or_else(malformed)?;
    let entry_time: i64 = ts.trim().parse().map_err(|_| malformed())?;
    let rest = rest.trim_start();

    let (name, arg_text) = match rest.split_once(';') {
        Some((name, args)) => (name, Some(args)),
        None => (rest, None),
    };
    if name.is_empty() {
        return Err(malformed());
    }

    let args = match expected_args(name) {
        Some(0) => {
            // Trailing arguments on a no-arg command are tolerated garbage.
            Vec::new()
        }
        Some(expected) => {
            let text = arg_text.unwrap_or("");
            let parts: Vec<String> = text
                .splitn(expected, ';')
                .map(str::to_string)
                .collect();
            if parts.len() != expected || (parts.len() == 1 && parts[0].is_empty()) {
                return Err(CommandError::WrongArgCount {
                    name:     name.to_string(),
                    expected,
                    got:      if text.is_empty() { 0 } else { parts.len() },
                });
            }
            parts
        }
        None => match arg_text {
            Some(text) => vec![text.to_string()],
            None => Vec::new(),
        },
    };

    Ok(RawCommand::new(entry_time, name, args))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_no_arg_command() {
        let cmd = parse_line("[1700000000] ENABLE_NOTIFICATIONS").unwrap();
        assert_eq!(cmd.entry_time, 1_700_000_000);
        assert_eq!(cmd.name, "ENABLE_NOTIFICATIONS");
        assert!(cmd.args.is_empty());
    }

    #[test]
    fn test_parse_with_args() {
        let cmd = parse_line("[1700000000] SCHEDULE_SVC_CHECK;web1;http;1700000100").unwrap();
        assert_eq!(cmd.args, vec!["web1", "http", "1700000100"]);
    }

    #[test]
    fn test_last_arg_consumes_semicolons() {
        let cmd = parse_line(
            "[1700000000] ACKNOWLEDGE_SVC_PROBLEM;web1;http;1;1;1;ops;known issue; see ticket #42",
        )
        .unwrap();
        assert_eq!(cmd.args.len(), 7);
        assert_eq!(cmd.args[6], "known issue; see ticket #42");
    }

    #[test]
    fn test_wrong_arg_count_rejected() {
        let err = parse_line("[1700000000] ACKNOWLEDGE_SVC_PROBLEM;web1;http").unwrap_err();
        assert!(matches!(err, CommandError::WrongArgCount { expected: 7, .. }));
    }

    #[test]
    fn test_unknown_command_single_argument() {
        let cmd = parse_line("[1700000000] CUSTOM_THING;a;b;c").unwrap();
        assert_eq!(cmd.name, "CUSTOM_THING");
        assert_eq!(cmd.args, vec!["a;b;c"]);
    }

    #[test]
    fn test_missing_timestamp_rejected() {
        assert!(parse_line("ENABLE_NOTIFICATIONS").is_err());
        assert!(parse_line("[abc] ENABLE_NOTIFICATIONS").is_err());
    }
}
