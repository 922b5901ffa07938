//! Check-command definitions.

/// A named command line template. Object definitions reference commands as
/// `name` or `name!arg1!arg2`; the runner substitutes `$ARGn$` and the
/// standard host/service macros before execution.
#[derive(Debug, Clone)]
pub struct CommandDef {
    pub name:         String,
    pub command_line: String,
}
