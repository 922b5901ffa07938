//! Comment lifecycle.
//!
//! Comments are immutable once added; the manager hands out `Arc` clones.
//! Ids are strictly increasing for the life of the process, and a
//! retention restore bumps the seed past the highest loaded id.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::unix_now;

/// What created a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentEntryType {
    User,
    Downtime,
    Flapping,
    Acknowledgement,
}

impl CommentEntryType {
    pub const fn as_int(self) -> i64 {
        match self {
            Self::User => 1,
            Self::Downtime => 2,
            Self::Flapping => 3,
            Self::Acknowledgement => 4,
        }
    }

    pub const fn from_int(v: i64) -> Self {
        match v {
            2 => Self::Downtime,
            3 => Self::Flapping,
            4 => Self::Acknowledgement,
            _ => Self::User,
        }
    }
}

/// Whether the daemon or an operator created the comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentSource {
    Internal,
    External,
}

/// A host or service comment.
#[derive(Debug, Clone)]
pub struct Comment {
    pub id: u64,
    pub host_name: String,
    /// `None` for host comments.
    pub service_description: Option<String>,
    pub entry_type: CommentEntryType,
    pub author: String,
    pub text: String,
    pub source: CommentSource,
    pub persistent: bool,
    pub entry_time: i64,
    pub expire_time: Option<i64>,
}

struct Inner {
    comments: BTreeMap<u64, Arc<Comment>>,
    next_id:  u64,
}

/// Thread-safe owner of all comments.
pub struct CommentManager {
    inner: Mutex<Inner>,
}

impl Default for CommentManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CommentManager {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                comments: BTreeMap::new(),
                next_id:  1,
            }),
        }
    }

    /// Add a comment, assigning the next id. The id field of `comment` is
    /// ignored. Returns the assigned id.
    pub fn add(&self, mut comment: Comment) -> u64 {
        if comment.entry_time == 0 {
            comment.entry_time = unix_now();
        }
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        comment.id = id;
        inner.comments.insert(id, Arc::new(comment));
        id
    }

    /// Insert a comment keeping its id; used by retention restore. The id
    /// seed moves past the loaded id.
    pub fn add_with_id(&self, comment: Comment) {
        let mut inner = self.inner.lock();
        inner.next_id = inner.next_id.max(comment.id + 1);
        inner.comments.insert(comment.id, Arc::new(comment));
    }

    /// Remove a comment. Missing ids are a no-op.
    pub fn delete(&self, id: u64) {
        self.inner.lock().comments.remove(&id);
    }

    pub fn get(&self, id: u64) -> Option<Arc<Comment>> {
        self.inner.lock().comments.get(&id).cloned()
    }

    /// All comments, ordered by id.
    pub fn all(&self) -> Vec<Arc<Comment>> {
        self.inner.lock().comments.values().cloned().collect()
    }

    /// Comments attached directly to a host (not to its services).
    pub fn for_host(&self, host: &str) -> Vec<Arc<Comment>> {
        self.inner
            .lock()
            .comments
            .values()
            .filter(|c| c.host_name == host && c.service_description.is_none())
            .cloned()
            .collect()
    }

    pub fn for_service(&self, host: &str, description: &str) -> Vec<Arc<Comment>> {
        self.inner
            .lock()
            .comments
            .values()
            .filter(|c| {
                c.host_name == host && c.service_description.as_deref() == Some(description)
            })
            .cloned()
            .collect()
    }

    /// Delete every comment attached to a host, including its services'.
    pub fn delete_all_for_host(&self, host: &str) {
        self.inner
            .lock()
            .comments
            .retain(|_, c| c.host_name != host);
    }

    pub fn delete_all_for_service(&self, host: &str, description: &str) {
        self.inner.lock().comments.retain(|_, c| {
            !(c.host_name == host && c.service_description.as_deref() == Some(description))
        });
    }

    /// Delete non-persistent acknowledgement comments on a host; called
    /// when an acknowledgement clears.
    pub fn delete_host_ack_comments(&self, host: &str) {
        self.inner.lock().comments.retain(|_, c| {
            !(c.host_name == host
                && c.service_description.is_none()
                && c.entry_type == CommentEntryType::Acknowledgement
                && !c.persistent)
        });
    }

    pub fn delete_service_ack_comments(&self, host: &str, description: &str) {
        self.inner.lock().comments.retain(|_, c| {
            !(c.host_name == host
                && c.service_description.as_deref() == Some(description)
                && c.entry_type == CommentEntryType::Acknowledgement
                && !c.persistent)
        });
    }

    /// Remove comments whose expire time has passed.
    pub fn expire_comments(&self, now: i64) {
        self.inner
            .lock()
            .comments
            .retain(|_, c| c.expire_time.is_none_or(|t| t > now));
    }

    /// The id the next [`Self::add`] will assign.
    pub fn next_id(&self) -> u64 {
        self.inner.lock().next_id
    }

    pub fn len(&self) -> usize {
        self.inner.lock().comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().comments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(host: &str, svc: Option<&str>, entry: CommentEntryType, persistent: bool) -> Comment {
        Comment {
            id: 0,
            host_name: host.to_string(),
            service_description: svc.map(str::to_string),
            entry_type: entry,
            author: "tester".into(),
            text: "text".into(),
            source: CommentSource::External,
            persistent,
            entry_time: 100,
            expire_time: None,
        }
    }

    #[test]
    fn test_ids_strictly_increase() {
        let mgr = CommentManager::new();
        let a = mgr.add(comment("h", None, CommentEntryType::User, false));
        let b = mgr.add(comment("h", None, CommentEntryType::User, false));
        assert!(b > a);
    }

    #[test]
    fn test_add_with_id_bumps_seed() {
        let mgr = CommentManager::new();
        let mut c = comment("h", None, CommentEntryType::User, false);
        c.id = 41;
        mgr.add_with_id(c);
        let next = mgr.add(comment("h", None, CommentEntryType::User, false));
        assert_eq!(next, 42);
    }

    #[test]
    fn test_scoped_lookups() {
        let mgr = CommentManager::new();
        mgr.add(comment("h1", None, CommentEntryType::User, false));
        mgr.add(comment("h1", Some("s1"), CommentEntryType::User, false));
        mgr.add(comment("h2", None, CommentEntryType::User, false));
        assert_eq!(mgr.for_host("h1").len(), 1);
        assert_eq!(mgr.for_service("h1", "s1").len(), 1);
        assert_eq!(mgr.all().len(), 3);
    }

    #[test]
    fn test_ack_cleanup_spares_persistent() {
        let mgr = CommentManager::new();
        mgr.add(comment("h", None, CommentEntryType::Acknowledgement, false));
        let keep = mgr.add(comment("h", None, CommentEntryType::Acknowledgement, true));
        mgr.add(comment("h", None, CommentEntryType::User, false));
        mgr.delete_host_ack_comments("h");
        let left = mgr.for_host("h");
        assert_eq!(left.len(), 2);
        assert!(left.iter().any(|c| c.id == keep));
    }

    #[test]
    fn test_expiry() {
        let mgr = CommentManager::new();
        let mut c = comment("h", None, CommentEntryType::User, false);
        c.expire_time = Some(50);
        mgr.add(c);
        let mut c = comment("h", None, CommentEntryType::User, false);
        c.expire_time = Some(500);
        let kept = mgr.add(c);
        mgr.expire_comments(100);
        let left = mgr.all();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, kept);
    }

    #[test]
    fn test_delete_all_for_host_includes_services() {
        let mgr = CommentManager::new();
        mgr.add(comment("h1", None, CommentEntryType::User, false));
        mgr.add(comment("h1", Some("s"), CommentEntryType::User, false));
        mgr.add(comment("h2", None, CommentEntryType::User, false));
        mgr.delete_all_for_host("h1");
        assert_eq!(mgr.all().len(), 1);
    }
}
