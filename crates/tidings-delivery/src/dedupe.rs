//! Bounded memory of mailbox copies already published.

use std::collections::{HashSet, VecDeque};

use parking_lot::Mutex;

/// `(mailbox key, sender, client message id)`.
type Entry = (String, String, String);

fn entry(mailbox: &str, send_id: &str, client_msg_id: &str) -> Entry {
    (mailbox.to_owned(), send_id.to_owned(), client_msg_id.to_owned())
}

#[derive(Default)]
struct Window {
    seen: HashSet<Entry>,
    order: VecDeque<Entry>,
}

/// Remembers the last `capacity` copies by mailbox, sender and client
/// message id.
///
/// Client message ids are only unique per sender, so two senders reusing
/// an id never collide. Oldest entries are forgotten first. A capacity of
/// zero remembers nothing.
pub struct DedupeWindow {
    capacity: usize,
    window: Mutex<Window>,
}

impl DedupeWindow {
    /// Window holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            window: Mutex::new(Window::default()),
        }
    }

    /// Claim the copy for publishing. Returns `false` when it was already
    /// claimed and not yet evicted; the check and the claim happen under
    /// one lock, so concurrent callers see exactly one `true`.
    pub fn try_reserve(&self, mailbox: &str, send_id: &str, client_msg_id: &str) -> bool {
        if self.capacity == 0 {
            return true;
        }
        let entry = entry(mailbox, send_id, client_msg_id);
        let mut window = self.window.lock();
        if !window.seen.insert(entry.clone()) {
            return false;
        }
        window.order.push_back(entry);
        while window.order.len() > self.capacity {
            if let Some(oldest) = window.order.pop_front() {
                let _ = window.seen.remove(&oldest);
            }
        }
        true
    }

    /// Drop a claim whose publish failed so a retry can publish it.
    pub fn release(&self, mailbox: &str, send_id: &str, client_msg_id: &str) {
        let entry = entry(mailbox, send_id, client_msg_id);
        let mut window = self.window.lock();
        if window.seen.remove(&entry) {
            window.order.retain(|e| e != &entry);
        }
    }

    /// Whether the copy is currently claimed.
    pub fn contains(&self, mailbox: &str, send_id: &str, client_msg_id: &str) -> bool {
        self.window
            .lock()
            .seen
            .contains(&entry(mailbox, send_id, client_msg_id))
    }

    /// Entries currently remembered.
    pub fn len(&self) -> usize {
        self.window.lock().order.len()
    }

    /// Whether nothing is remembered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
