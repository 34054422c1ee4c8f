//! Module usage counting.
//!
//! A [`UsageCount`] tracks how many sessions are alive on a device. The host
//! refuses to unload a device while its count is non-zero. Each successful
//! open holds one [`UsageRef`]; dropping it gives the count back.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Process-wide count of active device users.
#[derive(Debug, Default)]
pub struct UsageCount {
    users: AtomicUsize,
}

impl UsageCount {
    /// Creates a counter with no users.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            users: AtomicUsize::new(0),
        }
    }

    /// Takes one reference, returning a guard that gives it back on drop.
    #[must_use]
    pub fn acquire(self: &Arc<Self>) -> UsageRef {
        self.users.fetch_add(1, Ordering::AcqRel);
        UsageRef {
            count: Arc::clone(self),
        }
    }

    /// Returns the number of active users.
    #[must_use]
    pub fn users(&self) -> usize {
        self.users.load(Ordering::Acquire)
    }

    /// Returns `true` if nothing holds a reference.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.users() == 0
    }

    fn put(&self) {
        // Only a live `UsageRef` can call this, so the count is at least one.
        let _ = self
            .users
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }
}

/// One held reference on a [`UsageCount`].
#[derive(Debug)]
pub struct UsageRef {
    count: Arc<UsageCount>,
}

impl Drop for UsageRef {
    fn drop(&mut self) {
        self.count.put();
    }
}
