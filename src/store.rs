use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
#[derive(Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    pub author: String,
    pub content: String,
    pub created: DateTime<Utc>,
}

struct StoreInner {
    // Newest message first, id order strictly descending.
    messages: Vec<Message>,
    next_id: u64,
}

/// In-memory message collection shared by all handlers. Snapshots take the
/// read side of the lock, inserts the write side; neither holds it across
/// anything but the in-memory copy or mutation.
pub struct MessageStore {
    inner: RwLock<StoreInner>,
}

impl MessageStore {
    pub fn new() -> MessageStore {
        let seed = Message {
            id: 1,
            author: String::from("System"),
            content: String::from("Welcome to the guestbook!"),
            created: Utc::now(),
        };
        MessageStore {
            inner: RwLock::new(StoreInner {
                messages: vec![seed],
                next_id: 2,
            }),
        }
    }

    /// Independent point-in-time copy of all messages, newest first.
    pub fn snapshot(&self) -> Vec<Message> {
        self.inner.read().unwrap().messages.clone()
    }

    /// Assigns the next id, stamps the current time and prepends the message.
    /// Validation of empty content is the caller's job.
    pub fn insert(&self, author: &str, content: &str) -> Message {
        let mut inner = self.inner.write().unwrap();
        let msg = Message {
            id: inner.next_id,
            author: String::from(author),
            content: String::from(content),
            created: Utc::now(),
        };
        inner.next_id += 1;
        inner.messages.insert(0, msg.clone());
        msg
    }
}
