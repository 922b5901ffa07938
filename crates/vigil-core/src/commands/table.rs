//! Expected argument counts for known commands.
//!
//! The last expected argument consumes all remaining text, so free-text
//! comment fields may contain semicolons without escaping.

/// Expected argument count for a known command name; `None` for unknown
/// commands (which get the whole remainder as a single argument).
pub fn expected_args(name: &str) -> Option<usize> {
    let n = match name {
        // global toggles
        "ENABLE_NOTIFICATIONS"
        | "DISABLE_NOTIFICATIONS"
        | "START_EXECUTING_SVC_CHECKS"
        | "STOP_EXECUTING_SVC_CHECKS"
        | "START_EXECUTING_HOST_CHECKS"
        | "STOP_EXECUTING_HOST_CHECKS"
        | "START_ACCEPTING_PASSIVE_SVC_CHECKS"
        | "STOP_ACCEPTING_PASSIVE_SVC_CHECKS"
        | "START_ACCEPTING_PASSIVE_HOST_CHECKS"
        | "STOP_ACCEPTING_PASSIVE_HOST_CHECKS"
        | "ENABLE_EVENT_HANDLERS"
        | "DISABLE_EVENT_HANDLERS"
        | "ENABLE_FLAP_DETECTION"
        | "DISABLE_FLAP_DETECTION"
        | "SHUTDOWN_PROCESS"
        | "SHUTDOWN_PROGRAM" => 0,

        // passive results
        "PROCESS_SERVICE_CHECK_RESULT" => 4,
        "PROCESS_HOST_CHECK_RESULT" => 3,

        // check scheduling
        "SCHEDULE_SVC_CHECK" | "SCHEDULE_FORCED_SVC_CHECK" => 3,
        "SCHEDULE_HOST_CHECK" | "SCHEDULE_FORCED_HOST_CHECK" => 2,
        "SCHEDULE_FORCED_HOST_SVC_CHECKS" => 2,

        // acknowledgements
        "ACKNOWLEDGE_SVC_PROBLEM" => 7,
        "ACKNOWLEDGE_HOST_PROBLEM" => 6,
        "REMOVE_SVC_ACKNOWLEDGEMENT" => 2,
        "REMOVE_HOST_ACKNOWLEDGEMENT" => 1,

        // downtimes
        "SCHEDULE_SVC_DOWNTIME" => 9,
        "SCHEDULE_HOST_DOWNTIME" | "SCHEDULE_HOST_SVC_DOWNTIME" => 8,
        "DEL_SVC_DOWNTIME" | "DEL_HOST_DOWNTIME" => 1,

        // comments
        "ADD_SVC_COMMENT" => 5,
        "ADD_HOST_COMMENT" => 4,
        "DEL_SVC_COMMENT" | "DEL_HOST_COMMENT" => 1,
        "DEL_ALL_SVC_COMMENTS" => 2,
        "DEL_ALL_HOST_COMMENTS" => 1,

        // per-object toggles
        "ENABLE_SVC_NOTIFICATIONS"
        | "DISABLE_SVC_NOTIFICATIONS"
        | "ENABLE_SVC_CHECK"
        | "DISABLE_SVC_CHECK"
        | "ENABLE_PASSIVE_SVC_CHECKS"
        | "DISABLE_PASSIVE_SVC_CHECKS"
        | "ENABLE_SVC_FLAP_DETECTION"
        | "DISABLE_SVC_FLAP_DETECTION" => 2,
        "ENABLE_HOST_NOTIFICATIONS"
        | "DISABLE_HOST_NOTIFICATIONS"
        | "ENABLE_HOST_CHECK"
        | "DISABLE_HOST_CHECK"
        | "ENABLE_PASSIVE_HOST_CHECKS"
        | "DISABLE_PASSIVE_HOST_CHECKS"
        | "ENABLE_HOST_FLAP_DETECTION"
        | "DISABLE_HOST_FLAP_DETECTION" => 1,

        _ => return None,
    };
    Some(n)
}
