//! Generation tokens for reusable display slots.
//!
//! A grid cell that requests a thumbnail may be scrolled away and reassigned
//! to a different asset before the deferred result arrives. Each slot
//! therefore carries a generation that bumps on every reassignment; a result
//! is applied only if the token captured at request time still matches.
//! Identity is checked, never slot position.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use uuid::Uuid;

/// The mutable binding of one reusable display slot.
#[derive(Debug, Default)]
pub struct SlotState {
    assigned: Mutex<Option<Uuid>>,
    generation: AtomicU64,
}

/// Proof of which assignment a request was issued under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotToken {
    asset_id: Uuid,
    generation: u64,
}

impl SlotState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the slot to `asset_id` and hand back the token to attach to
    /// any thumbnail request made for this assignment.
    pub fn assign(&self, asset_id: Uuid) -> SlotToken {
        let mut assigned = self.assigned.lock().unwrap();
        *assigned = Some(asset_id);
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        SlotToken {
            asset_id,
            generation,
        }
    }

    /// Unbind the slot (cell went off screen empty).
    pub fn clear(&self) {
        let mut assigned = self.assigned.lock().unwrap();
        *assigned = None;
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Whether a deferred result issued under `token` may still be applied.
    pub fn is_current(&self, token: &SlotToken) -> bool {
        let assigned = self.assigned.lock().unwrap();
        *assigned == Some(token.asset_id)
            && self.generation.load(Ordering::Acquire) == token.generation
    }
}

impl SlotToken {
    /// The asset this token was issued for.
    pub fn asset_id(&self) -> Uuid {
        self.asset_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_token_applies() {
        let slot = SlotState::new();
        let asset = Uuid::new_v4();
        let token = slot.assign(asset);
        assert!(slot.is_current(&token));
    }

    #[test]
    fn test_reassignment_invalidates() {
        let slot = SlotState::new();
        let token = slot.assign(Uuid::new_v4());
        slot.assign(Uuid::new_v4());
        assert!(!slot.is_current(&token));
    }

    #[test]
    fn test_reassignment_to_same_asset_still_invalidates_old_request() {
        // Re-binding the same asset bumps the generation: the old request
        // may be mid-extraction against a file that has been replaced.
        let slot = SlotState::new();
        let asset = Uuid::new_v4();
        let old = slot.assign(asset);
        let new = slot.assign(asset);
        assert!(!slot.is_current(&old));
        assert!(slot.is_current(&new));
    }

    #[test]
    fn test_clear_invalidates() {
        let slot = SlotState::new();
        let token = slot.assign(Uuid::new_v4());
        slot.clear();
        assert!(!slot.is_current(&token));
    }
}
