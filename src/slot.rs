//! Per-contact state of multitouch devices.

use crate::attribute_set::AttributeSet;
use crate::constants::AbsoluteAxisCode;

/// Highest number of multitouch slots tracked by the state mirror and the
/// synchronization engine. Slots at indices past this cap are ignored: their
/// cached values stay untouched until a real event updates them.
pub const MAX_MT_SLOTS: i32 = 60;

/// First per-slot code: everything after `ABS_MT_SLOT`.
pub(crate) const MT_CODE_FIRST: u16 = AbsoluteAxisCode::ABS_MT_SLOT.0 + 1;
/// Number of per-slot codes tracked (`ABS_MT_SLOT + 1` through `ABS_MAX`).
pub(crate) const MT_CODE_COUNT: usize =
    (AbsoluteAxisCode::MAX - AbsoluteAxisCode::ABS_MT_SLOT.0) as usize;

/// The `slot x code` value table of a real multitouch device, plus the
/// currently selected slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SlotTable {
    /// Slot-major: `values[slot * MT_CODE_COUNT + (code - MT_CODE_FIRST)]`.
    values: Vec<i32>,
    /// The slot count the device reports. Only the first
    /// `min(num_slots, MAX_MT_SLOTS)` are tracked.
    num_slots: i32,
    current_slot: i32,
    /// An out-of-range `ABS_MT_SLOT` was seen; per-slot writes are dropped
    /// until the frame ends.
    slot_poisoned: bool,
}

impl SlotTable {
    pub(crate) fn new(num_slots: i32) -> Self {
        let tracked = num_slots.clamp(0, MAX_MT_SLOTS) as usize;
        Self {
            values: vec![0; tracked * MT_CODE_COUNT],
            num_slots,
            current_slot: 0,
            slot_poisoned: false,
        }
    }

    pub(crate) fn num_slots(&self) -> i32 {
        self.num_slots
    }

    pub(crate) fn tracked_slots(&self) -> i32 {
        self.num_slots.min(MAX_MT_SLOTS)
    }

    pub(crate) fn current_slot(&self) -> i32 {
        self.current_slot
    }

    pub(crate) fn set_current_slot(&mut self, slot: i32) {
        self.current_slot = slot;
    }

    fn index(&self, slot: i32, code: AbsoluteAxisCode) -> Option<usize> {
        if slot < 0 || slot >= self.tracked_slots() {
            return None;
        }
        if code.0 < MT_CODE_FIRST || code.0 > AbsoluteAxisCode::MAX {
            return None;
        }
        Some(slot as usize * MT_CODE_COUNT + (code.0 - MT_CODE_FIRST) as usize)
    }

    pub(crate) fn value(&self, slot: i32, code: AbsoluteAxisCode) -> Option<i32> {
        self.index(slot, code).map(|i| self.values[i])
    }

    /// Writes a single cell. Returns `false` when the slot is outside the
    /// tracked range or the code is not a per-slot code.
    pub(crate) fn set_value(&mut self, slot: i32, code: AbsoluteAxisCode, value: i32) -> bool {
        match self.index(slot, code) {
            Some(i) => {
                self.values[i] = value;
                true
            }
            None => false,
        }
    }

    /// Applies an `ABS_MT_SLOT` event: non-negative values select
    /// `min(value, N - 1)`; negative values leave the selection unchanged
    /// and poison the rest of the frame.
    pub(crate) fn process_slot_event(&mut self, value: i32) {
        if value >= 0 {
            self.current_slot = value.min(self.num_slots - 1);
            self.slot_poisoned = false;
        } else {
            self.slot_poisoned = true;
        }
    }

    /// Applies a per-slot event to the currently selected slot. Writes to
    /// untracked slots (past the cap) and poisoned frames are dropped.
    pub(crate) fn process_mt_event(&mut self, code: AbsoluteAxisCode, value: i32) {
        if self.slot_poisoned {
            return;
        }
        self.set_value(self.current_slot, code, value);
    }

    /// Frame boundary: poisoning does not outlive the frame it happened in.
    pub(crate) fn end_frame(&mut self) {
        self.slot_poisoned = false;
    }
}

/// A device that advertises `ABS_MT_SLOT` together with the (reserved) code
/// right before it is using the MT range as ordinary axes; its numbering is
/// incidental rather than semantic.
pub(crate) fn is_fake_mt(abs: &AttributeSet<AbsoluteAxisCode>) -> bool {
    abs.contains(AbsoluteAxisCode::ABS_MT_SLOT)
        && abs.contains(AbsoluteAxisCode(AbsoluteAxisCode::ABS_MT_SLOT.0 - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_selection_is_clamped() {
        let mut table = SlotTable::new(2);
        table.process_slot_event(1);
        assert_eq!(table.current_slot(), 1);
        table.process_slot_event(7);
        assert_eq!(table.current_slot(), 1);
        table.process_slot_event(0);
        assert_eq!(table.current_slot(), 0);
    }

    #[test]
    fn negative_slot_poisons_the_frame() {
        let mut table = SlotTable::new(2);
        table.process_slot_event(-3);
        assert_eq!(table.current_slot(), 0);
        table.process_mt_event(AbsoluteAxisCode::ABS_MT_POSITION_X, 55);
        assert_eq!(table.value(0, AbsoluteAxisCode::ABS_MT_POSITION_X), Some(0));

        table.end_frame();
        table.process_mt_event(AbsoluteAxisCode::ABS_MT_POSITION_X, 55);
        assert_eq!(table.value(0, AbsoluteAxisCode::ABS_MT_POSITION_X), Some(55));
    }

    #[test]
    fn writes_route_to_current_slot() {
        let mut table = SlotTable::new(3);
        table.process_slot_event(2);
        table.process_mt_event(AbsoluteAxisCode::ABS_MT_TRACKING_ID, 17);
        assert_eq!(table.value(2, AbsoluteAxisCode::ABS_MT_TRACKING_ID), Some(17));
        assert_eq!(table.value(0, AbsoluteAxisCode::ABS_MT_TRACKING_ID), Some(0));
    }

    #[test]
    fn untracked_slots_are_ignored() {
        let mut table = SlotTable::new(100);
        assert_eq!(table.num_slots(), 100);
        assert_eq!(table.tracked_slots(), MAX_MT_SLOTS);
        assert!(!table.set_value(60, AbsoluteAxisCode::ABS_MT_POSITION_X, 1));
        assert!(table.set_value(59, AbsoluteAxisCode::ABS_MT_POSITION_X, 1));
        assert_eq!(table.value(60, AbsoluteAxisCode::ABS_MT_POSITION_X), None);
    }

    #[test]
    fn non_mt_codes_are_rejected() {
        let mut table = SlotTable::new(2);
        assert!(!table.set_value(0, AbsoluteAxisCode::ABS_X, 5));
        assert!(!table.set_value(0, AbsoluteAxisCode::ABS_MT_SLOT, 5));
    }

    #[test]
    fn fake_mt_detection() {
        let mut abs = AttributeSet::<AbsoluteAxisCode>::new();
        abs.insert(AbsoluteAxisCode::ABS_MT_SLOT);
        abs.insert(AbsoluteAxisCode::ABS_MT_POSITION_X);
        assert!(!is_fake_mt(&abs));
        abs.insert(AbsoluteAxisCode(AbsoluteAxisCode::ABS_MT_SLOT.0 - 1));
        assert!(is_fake_mt(&abs));
    }
}
