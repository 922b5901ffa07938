//! The in-memory object graph: hosts, services, groups, contacts,
//! timeperiods, check commands, and process-wide program state.
//!
//! Objects are built once from configuration at startup and never added or
//! removed afterwards; only their *state* fields mutate at runtime. Rows are
//! shared as `Arc<RwLock<_>>` handles so the query engine can snapshot a row
//! list under the store's outer lock and then read fields without it.

mod command;
mod contact;
mod flap;
mod group;
mod host;
mod program;
mod service;
mod state;
mod store;
mod timeperiod;

pub use command::CommandDef;
pub use contact::Contact;
pub use flap::{FlapHistory, FLAP_HISTORY_SIZE};
pub use group::{ContactGroup, HostGroup, ServiceGroup};
pub use host::Host;
pub use program::ProgramState;
pub use service::Service;
pub use state::{modattr, Acknowledgement, HostState, ServiceState, StateType};
pub use store::{HostRef, ObjectStore, ServiceRef};
pub use timeperiod::{TimePeriod, TimeRange};
