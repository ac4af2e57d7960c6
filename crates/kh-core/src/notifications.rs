use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::error::Rejection;
use crate::types::{KioskId, Notification, WaiterId};

/// One pending-alert record per waiter in a fixed pool.
///
/// `raise` and `clear` are crate-private: only the coordinator mutates
/// notifications, so a raised flag always matches a live assignment.
#[derive(Clone, Debug, Default)]
pub struct NotificationRegistry {
    by_waiter: BTreeMap<WaiterId, Notification>,
}

impl NotificationRegistry {
    pub fn new<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = WaiterId>,
    {
        Self {
            by_waiter: ids
                .into_iter()
                .map(|id| (id, Notification::default()))
                .collect(),
        }
    }

    pub fn contains(&self, waiter: &WaiterId) -> bool {
        self.by_waiter.contains_key(waiter)
    }

    pub fn get(&self, waiter: &WaiterId) -> Option<&Notification> {
        self.by_waiter.get(waiter)
    }

    pub fn waiters(&self) -> impl Iterator<Item = &WaiterId> {
        self.by_waiter.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&WaiterId, &Notification)> {
        self.by_waiter.iter()
    }

    pub(crate) fn raise(
        &mut self,
        waiter: &WaiterId,
        kiosk: &KioskId,
        now: DateTime<Utc>,
    ) -> Result<(), Rejection> {
        let n = self
            .by_waiter
            .get_mut(waiter)
            .ok_or_else(|| Rejection::unknown_waiter(waiter))?;
        n.pending = true;
        n.kiosk = Some(kiosk.clone());
        n.raised_at = Some(now);
        Ok(())
    }

    /// Clear a waiter's alert. Returns whether one was pending.
    ///
    /// An unknown waiter is an error, distinct from "nothing pending".
    pub(crate) fn clear(&mut self, waiter: &WaiterId) -> Result<bool, Rejection> {
        let n = self
            .by_waiter
            .get_mut(waiter)
            .ok_or_else(|| Rejection::unknown_waiter(waiter))?;
        let was_pending = n.pending;
        n.pending = false;
        n.kiosk = None;
        Ok(was_pending)
    }

    pub fn snapshot(&self) -> BTreeMap<WaiterId, Notification> {
        self.by_waiter.clone()
    }
}
