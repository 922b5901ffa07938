//! Query engine errors, mapped to protocol status codes at the server
//! boundary.

use thiserror::Error;

/// Errors a query can produce. Filter-level oddities (unknown columns,
/// unknown operators) are deliberately *not* errors; they evaluate to
/// false so probing UIs see empty results instead of failures.
#[derive(Error, Debug)]
pub enum LqlError {
    /// 404 in the fixed16 header.
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// 400 in the fixed16 header.
    #[error("{0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LqlError {
    /// HTTP-like status code for the fixed16 response header.
    pub const fn status(&self) -> u16 {
        match self {
            Self::UnknownTable(_) => 404,
            Self::Parse(_) => 400,
            Self::Io(_) => 500,
        }
    }
}
