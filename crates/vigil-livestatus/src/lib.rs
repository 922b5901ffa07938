//! # Vigil Livestatus
//!
//! The live query engine: an LQL (Livestatus Query Language) parser, a
//! relational view over the monitoring core's in-memory state, filter and
//! stats evaluation, CSV/JSON formatters, and the socket server that ties
//! them together.
//!
//! ## Request shape
//!
//! ```text
//! GET services
//! Columns: host_name description state
//! Filter: state = 2
//! Filter: acknowledged = 0
//! And: 2
//! OutputFormat: json
//! ResponseHeader: fixed16
//! ```
//!
//! Requests arrive on a Unix socket and/or TCP, separated by blank lines;
//! `COMMAND` lines ride the same connection and feed the external-command
//! subsystem.

#![forbid(unsafe_code)]
// Missing docs allowed for internal items - public API is fully documented
#![allow(missing_docs)]
#![warn(clippy::all)]
// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod columns;
pub mod engine;
pub mod error;
pub mod filter;
pub mod format;
pub mod query;
pub mod row;
pub mod server;
pub mod state;
pub mod stats;
pub mod tables;
pub mod value;

pub use engine::{execute, ResultSet};
pub use error::LqlError;
pub use filter::{Filter, FilterOp};
pub use format::{render, OutputFormat, ResponseHeader};
pub use query::Query;
pub use row::Row;
pub use server::LivestatusServer;
pub use state::{ChannelSink, CommandSink, LivestatusState};
pub use stats::Stat;
pub use tables::TableRegistry;
pub use value::{ColumnType, Value};
