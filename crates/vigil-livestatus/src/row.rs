//! The row union: one variant per table family.
//!
//! Rows hold shared handles into the core's state. Host and service rows
//! read through their row lock per field access; a query may therefore see
//! a mix of old and new values for a row mutated mid-evaluation, which the
//! monitoring domain tolerates.

use std::sync::Arc;

use vigil_core::objects::{CommandDef, Contact, ContactGroup, HostGroup, ServiceGroup, TimePeriod};
use vigil_core::{Comment, Downtime, HostRef, LogEntry, ServiceRef};

use crate::value::ColumnType;

/// A row of the `columns` meta-table.
#[derive(Debug, Clone)]
pub struct ColumnMetaRow {
    pub table: &'static str,
    pub name: &'static str,
    pub ctype: ColumnType,
    pub description: &'static str,
}

/// One row of any table.
#[derive(Clone)]
pub enum Row {
    Host(HostRef),
    Service(ServiceRef),
    HostGroup(Arc<HostGroup>),
    ServiceGroup(Arc<ServiceGroup>),
    Contact(Arc<Contact>),
    ContactGroup(Arc<ContactGroup>),
    Command(Arc<CommandDef>),
    TimePeriod(Arc<TimePeriod>),
    Comment(Arc<Comment>),
    Downtime(Arc<Downtime>),
    Log(Arc<LogEntry>),
    /// The single row of the `status` table; values come straight from the
    /// state provider.
    Status,
    ColumnMeta(Arc<ColumnMetaRow>),
}
