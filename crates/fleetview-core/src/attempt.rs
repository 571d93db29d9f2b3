//! Playback attempts
//!
//! Every "play this video" request gets an [`AttemptId`] strictly greater than
//! any before it. The tracker publishes the current id on a watch channel, so a
//! token can both answer "am I still current?" synchronously and be awaited
//! until it is superseded.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::watch;

/// Identifier of one playback attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AttemptId(u64);

impl AttemptId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Allocates attempt ids and publishes the current one
#[derive(Debug)]
pub struct AttemptTracker {
    current: watch::Sender<AttemptId>,
}

impl AttemptTracker {
    pub fn new() -> Self {
        let (current, _) = watch::channel(AttemptId(0));
        Self { current }
    }

    /// Start a new attempt, superseding the previous one
    pub fn begin(&self) -> AttemptToken {
        let id = self.bump();
        AttemptToken {
            id,
            current: self.current.subscribe(),
        }
    }

    /// Supersede the current attempt without starting another
    pub fn invalidate(&self) -> AttemptId {
        self.bump()
    }

    /// Id most recently allocated
    pub fn current(&self) -> AttemptId {
        *self.current.borrow()
    }

    fn bump(&self) -> AttemptId {
        let mut next = AttemptId(0);
        self.current.send_modify(|id| {
            id.0 += 1;
            next = *id;
        });
        next
    }
}

impl Default for AttemptTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancellation token of one attempt
#[derive(Debug, Clone)]
pub struct AttemptToken {
    id: AttemptId,
    current: watch::Receiver<AttemptId>,
}

impl AttemptToken {
    pub fn id(&self) -> AttemptId {
        self.id
    }

    /// Returns true while no newer attempt has started and the modal is open
    pub fn is_current(&self) -> bool {
        *self.current.borrow() == self.id
    }

    /// `Err(StaleAttempt)` once superseded
    pub fn ensure_current(&self) -> Result<()> {
        if self.is_current() {
            Ok(())
        } else {
            Err(Error::StaleAttempt(self.id))
        }
    }

    /// Resolves once this attempt is superseded
    ///
    /// Pending forever while the attempt stays current, so it can be raced in
    /// `tokio::select!` against any stage future.
    pub async fn superseded(&self) {
        let mut current = self.current.clone();
        loop {
            let stale = *current.borrow_and_update() != self.id;
            if stale {
                return;
            }
            if current.changed().await.is_err() {
                // Tracker dropped: nothing can ever become current again
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_ids_increase() {
        let tracker = AttemptTracker::new();
        let first = tracker.begin();
        let second = tracker.begin();
        assert!(second.id() > first.id());
        assert!(!first.is_current());
        assert!(second.is_current());
        assert!(matches!(first.ensure_current(), Err(Error::StaleAttempt(id)) if id == first.id()));
    }

    #[test]
    fn test_invalidate_supersedes_without_new_attempt() {
        let tracker = AttemptTracker::new();
        let token = tracker.begin();
        let closed = tracker.invalidate();
        assert!(!token.is_current());
        assert!(closed > token.id());
        assert_eq!(tracker.current(), closed);
    }

    #[tokio::test]
    async fn test_superseded_resolves_on_new_attempt() {
        let tracker = AttemptTracker::new();
        let token = tracker.begin();

        let pending = tokio::time::timeout(Duration::from_millis(20), token.superseded()).await;
        assert!(pending.is_err());

        let waiter = tokio::spawn({
            let token = token.clone();
            async move { token.superseded().await }
        });
        tracker.begin();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("superseded should resolve")
            .unwrap();
    }
}
