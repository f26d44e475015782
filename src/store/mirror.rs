use crate::record::AttendanceEvent;
use std::sync::{Arc, PoisonError, RwLock};

/// In-memory copy of the events logged during the current session.
///
/// Clones share the same list. Each push happens under the write lock, so a
/// reader sees either the whole event or none of it.
#[derive(Clone, Debug, Default)]
pub struct EventMirror {
    events: Arc<RwLock<Vec<AttendanceEvent>>>,
}

impl EventMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// append one event
    pub fn push(&self, event: AttendanceEvent) {
        self.events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    /// Copy of the current contents, in arrival order.
    pub fn snapshot(&self) -> Vec<AttendanceEvent> {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::capture_time;

    fn event(uid: &str) -> AttendanceEvent {
        AttendanceEvent {
            timestamp: capture_time(),
            uid: uid.to_string(),
            fingerprint_id: "FP".to_string(),
            distance_cm: "10".to_string(),
            access: "GRANTED".to_string(),
        }
    }

    #[test]
    fn test_clones_share_contents() {
        let mirror = EventMirror::new();
        let view = mirror.clone();
        assert!(view.is_empty());
        mirror.push(event("A1"));
        assert_eq!(view.len(), 1);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mirror = EventMirror::new();
        mirror.push(event("A1"));
        let mut snapshot = mirror.snapshot();
        snapshot.push(event("A2"));
        snapshot[0].uid = "changed".to_string();
        assert_eq!(mirror.len(), 1);
        assert_eq!(mirror.snapshot()[0].uid, "A1");
    }

    #[test]
    fn test_concurrent_push_keeps_every_event() {
        let mirror = EventMirror::new();
        let writers: Vec<_> = (0..4)
            .map(|n| {
                let mirror = mirror.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        mirror.push(event(&format!("{n}-{i}")));
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }
        assert_eq!(mirror.len(), 200);
    }
}
