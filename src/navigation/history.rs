//! In-memory history: a stack of URLs with a cursor.
//!
//! Every location change is delivered to all listeners in the order it
//! happened, which makes it a drop-in event source for [`Navigation::attach`].
//!
//! [`Navigation::attach`]: crate::navigation::Navigation::attach

use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::routing::Url;

struct Stack {
    entries: Vec<Url>,
    index: usize,
    listeners: Vec<mpsc::UnboundedSender<Url>>,
}

impl Stack {
    fn notify(&mut self) {
        let location = self.entries[self.index].clone();
        self.listeners.retain(|tx| tx.send(location.clone()).is_ok());
    }
}

/// Browser-like history kept in memory.
pub struct MemoryHistory {
    stack: Mutex<Stack>,
}

impl MemoryHistory {
    pub fn new(initial: Url) -> Self {
        Self {
            stack: Mutex::new(Stack {
                entries: vec![initial],
                index: 0,
                listeners: Vec::new(),
            }),
        }
    }

    fn with_stack<R>(&self, f: impl FnOnce(&mut Stack) -> R) -> R {
        let mut guard = match self.stack.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    /// Current entry.
    pub fn location(&self) -> Url {
        self.with_stack(|s| s.entries[s.index].clone())
    }

    /// Number of entries, including any forward entries.
    pub fn len(&self) -> usize {
        self.with_stack(|s| s.entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.with_stack(|s| s.entries.is_empty())
    }

    /// Add an entry after the current one, dropping forward entries.
    pub fn push(&self, url: Url) {
        self.with_stack(|s| {
            s.entries.truncate(s.index + 1);
            s.entries.push(url);
            s.index += 1;
            s.notify();
        });
    }

    /// Overwrite the current entry.
    pub fn replace(&self, url: Url) {
        self.with_stack(|s| {
            let index = s.index;
            s.entries[index] = url;
            s.notify();
        });
    }

    /// Move the cursor by `delta`, clamped to the stack. Returns whether the
    /// location changed.
    pub fn go(&self, delta: isize) -> bool {
        self.with_stack(|s| {
            let last = s.entries.len() as isize - 1;
            let target = (s.index as isize + delta).clamp(0, last) as usize;
            if target == s.index {
                return false;
            }
            s.index = target;
            s.notify();
            true
        })
    }

    pub fn back(&self) -> bool {
        self.go(-1)
    }

    pub fn forward(&self) -> bool {
        self.go(1)
    }

    /// Receive every subsequent location change.
    pub fn listen(&self) -> mpsc::UnboundedReceiver<Url> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.with_stack(|s| s.listeners.push(tx));
        rx
    }
}
