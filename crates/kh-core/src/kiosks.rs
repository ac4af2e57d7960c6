use std::collections::BTreeMap;

use crate::types::{Kiosk, KioskId, WaiterId};

/// Authoritative per-kiosk state for a fixed fleet.
///
/// Kiosks are created once, all `Free`, and never added or removed. Only the
/// coordinator gets mutable access; everyone else reads.
#[derive(Clone, Debug, Default)]
pub struct KioskRegistry {
    kiosks: BTreeMap<KioskId, Kiosk>,
}

impl KioskRegistry {
    /// Build the fleet. Duplicate ids collapse into one kiosk.
    pub fn new<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = KioskId>,
    {
        Self {
            kiosks: ids.into_iter().map(|id| (id, Kiosk::free())).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.kiosks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kiosks.is_empty()
    }

    pub fn contains(&self, id: &KioskId) -> bool {
        self.kiosks.contains_key(id)
    }

    pub fn get(&self, id: &KioskId) -> Option<&Kiosk> {
        self.kiosks.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &KioskId) -> Option<&mut Kiosk> {
        self.kiosks.get_mut(id)
    }

    /// Kiosks in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&KioskId, &Kiosk)> {
        self.kiosks.iter()
    }

    /// Linear scan for the kiosk `waiter` is attending, skipping `except`.
    ///
    /// The fleet is small and fixed, so no reverse index is kept. This scan is
    /// the mutual-exclusion check for claims.
    pub fn attending_kiosk_of(&self, waiter: &WaiterId, except: Option<&KioskId>) -> Option<&KioskId> {
        self.kiosks
            .iter()
            .filter(|(id, _)| Some(*id) != except)
            .find(|(_, k)| k.is_attended_by(waiter))
            .map(|(id, _)| id)
    }

    /// Owned copy of every kiosk.
    pub fn snapshot(&self) -> BTreeMap<KioskId, Kiosk> {
        self.kiosks.clone()
    }
}
