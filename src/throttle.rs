use log::trace;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(600);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Admission {
    Admitted,
    Suppressed,
}

/// Time-windowed dedup gate: at most one admitted dispatch per key per
/// cooldown window. A key found present is cleared on the spot, so the
/// trigger after a suppressed one is admitted again (alternating pattern,
/// matching the original middleware).
///
/// Expiry is lazy: each entry records when it was armed, and an entry older
/// than the cooldown is treated as absent. No timers, no background work;
/// state stays bounded at one entry per key.
///
/// Cheap to clone; clones share the same key table.
#[derive(Clone)]
pub struct ThrottleGate {
    inner: Arc<Inner>,
}

struct Inner {
    cooldown: Duration,
    entries: Mutex<HashMap<String, Instant>>,
}

impl ThrottleGate {
    pub fn new(cooldown: Duration) -> ThrottleGate {
        ThrottleGate {
            inner: Arc::new(Inner {
                cooldown,
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Decides whether a trigger for `key` may dispatch a wake. Linearizable
    /// per key: of two callers racing on an absent key, exactly one is
    /// admitted.
    pub fn admit(&self, key: &str) -> Admission {
        let now = Instant::now();
        let mut entries = self.inner.entries.lock().unwrap();
        match entries.get(key) {
            Some(&armed) if now.duration_since(armed) < self.inner.cooldown => {
                entries.remove(key);
                trace!("throttle: {} suppressed, entry cleared", key);
                Admission::Suppressed
            }
            _ => {
                // Absent, or armed longer ago than the cooldown; a stale
                // entry is overwritten rather than honored.
                entries.insert(key.to_string(), now);
                Admission::Admitted
            }
        }
    }
}
