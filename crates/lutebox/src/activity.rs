//! `MemoryActivityLog`: the default `ActivityLog` collaborator
//! used when no GUI shell supplies its own. A bounded ring buffer behind a
//! mutex, the usual shape for an in-memory diagnostic buffer that must
//! never grow unbounded.
//!
//! `ActivityLog` methods are synchronous and best-effort, so a blocking `std::sync::Mutex`
//! guards the buffer rather than an async one - no call here ever holds the
//! lock across an await point.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use lutebox_proto::ActivityEvent;

use crate::collab::ActivityLog;

pub struct MemoryActivityLog {
    capacity: usize,
    events: Mutex<VecDeque<ActivityEvent>>,
    healthy: AtomicBool,
}

impl MemoryActivityLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: Mutex::new(VecDeque::new()),
            healthy: AtomicBool::new(true),
        }
    }

    /// Snapshot of the events currently buffered, oldest first.
    pub fn snapshot(&self) -> Vec<ActivityEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).iter().cloned().collect()
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }
}

impl ActivityLog for MemoryActivityLog {
    fn add(&self, event: ActivityEvent) {
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        if events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    fn patch_last_response(&self, text: String) {
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(last) = events.back_mut() {
            last.response_body = Some(serde_json::Value::String(text));
        }
    }

    fn set_server_status(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lutebox_proto::Transport;
    use serde_json::json;

    #[test]
    fn add_evicts_oldest_once_capacity_is_reached() {
        let log = MemoryActivityLog::new(2);
        log.add(ActivityEvent::new("ping", Transport::Http, 1, json!({})));
        log.add(ActivityEvent::new("tools/list", Transport::Http, 2, json!({})));
        log.add(ActivityEvent::new("tools/call", Transport::Http, 3, json!({})));

        let snapshot = log.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].method, "tools/list");
        assert_eq!(snapshot[1].method, "tools/call");
    }

    #[test]
    fn patch_last_response_targets_most_recent_event() {
        let log = MemoryActivityLog::new(4);
        log.add(ActivityEvent::new("ping", Transport::Http, 1, json!({})));
        log.patch_last_response("{}".to_string());

        let snapshot = log.snapshot();
        assert_eq!(
            snapshot[0].response_body,
            Some(serde_json::Value::String("{}".to_string()))
        );
    }

    #[test]
    fn set_server_status_round_trips() {
        let log = MemoryActivityLog::new(4);
        assert!(log.is_healthy());
        log.set_server_status(false);
        assert!(!log.is_healthy());
    }
}
