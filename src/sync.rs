//! `SYN_DROPPED` recovery: diffing the cached device state against a fresh
//! kernel snapshot and replaying the difference as synthesized events.
//!
//! The ioctl half of recovery (capturing the snapshot) lives on
//! [`Device`](crate::Device); this module is the pure diff.

use crate::attribute_set::AttributeSet;
use crate::constants::*;
use crate::device_state::DeviceState;
use crate::event::InputEvent;
use crate::queue::EventQueue;
use crate::slot::MT_CODE_FIRST;

/// Borrowed view of the capability sets the delta generator walks.
pub(crate) struct SyncCaps<'a> {
    pub(crate) types: &'a AttributeSet<EventType>,
    pub(crate) keys: &'a AttributeSet<KeyCode>,
    pub(crate) leds: &'a AttributeSet<LedCode>,
    pub(crate) switches: &'a AttributeSet<SwitchCode>,
    pub(crate) abs: &'a AttributeSet<AbsoluteAxisCode>,
}

/// Appends the ordered event sequence that drives a client from `prev` to
/// `next`, terminated by a single `SYN_REPORT`. Every synthesized event
/// carries `time` (the `SYN_DROPPED` timestamp, or "now" for a forced
/// sync). Relative axes are stateless and produce nothing.
///
/// The fuzz of absolute axes is not applied here: the kernel already
/// filtered the values this replays.
pub(crate) fn push_delta(
    caps: &SyncCaps<'_>,
    prev: &DeviceState,
    next: &DeviceState,
    time: libc::timeval,
    out: &mut EventQueue,
) {
    if caps.types.contains(EventType::EV_KEY) {
        for key in caps.keys.iter() {
            let was = prev.key_vals.contains(key);
            let is = next.key_vals.contains(key);
            if was != is {
                out.push(InputEvent::with_time(time, EventType::EV_KEY, key.0, is as i32));
            }
        }
    }

    if caps.types.contains(EventType::EV_LED) {
        for led in caps.leds.iter() {
            let was = prev.led_vals.contains(led);
            let is = next.led_vals.contains(led);
            if was != is {
                out.push(InputEvent::with_time(time, EventType::EV_LED, led.0, is as i32));
            }
        }
    }

    if caps.types.contains(EventType::EV_SW) {
        for sw in caps.switches.iter() {
            let was = prev.switch_vals.contains(sw);
            let is = next.switch_vals.contains(sw);
            if was != is {
                out.push(InputEvent::with_time(time, EventType::EV_SW, sw.0, is as i32));
            }
        }
    }

    if caps.types.contains(EventType::EV_ABS) {
        let mt_tracked = next.mt.is_some();
        for axis in caps.abs.iter() {
            // Real-MT devices sync the MT range per slot below.
            if mt_tracked && axis.is_multitouch() {
                continue;
            }
            let was = prev.abs_vals[axis.0 as usize].value;
            let is = next.abs_vals[axis.0 as usize].value;
            if was != is {
                out.push(InputEvent::with_time(time, EventType::EV_ABS, axis.0, is));
            }
        }

        if let (Some(pm), Some(nm)) = (&prev.mt, &next.mt) {
            for slot in 0..nm.tracked_slots() {
                push_slot_delta(caps, pm, nm, slot, time, out);
            }
        }
    }

    out.push(InputEvent::with_time(
        time,
        EventType::EV_SYN,
        SynchronizationCode::SYN_REPORT.0,
        0,
    ));
}

fn push_slot_delta(
    caps: &SyncCaps<'_>,
    prev: &crate::slot::SlotTable,
    next: &crate::slot::SlotTable,
    slot: i32,
    time: libc::timeval,
    out: &mut EventQueue,
) {
    const TRACKING_ID: AbsoluteAxisCode = AbsoluteAxisCode::ABS_MT_TRACKING_ID;

    let changed = |code: AbsoluteAxisCode| {
        caps.abs.contains(code) && prev.value(slot, code) != next.value(slot, code)
    };

    let any_changed = (MT_CODE_FIRST..=AbsoluteAxisCode::MAX)
        .map(AbsoluteAxisCode)
        .any(changed);
    if !any_changed {
        return;
    }

    out.push(InputEvent::with_time(
        time,
        EventType::EV_ABS,
        AbsoluteAxisCode::ABS_MT_SLOT.0,
        slot,
    ));

    // A new tracking id must open the contact before its coordinates; a
    // terminated contact (-1) must close it after them.
    let tid_changed = changed(TRACKING_ID);
    let tid_last = tid_changed && next.value(slot, TRACKING_ID) == Some(-1);
    let tid_first = tid_changed && !tid_last && prev.value(slot, TRACKING_ID) == Some(-1);

    let mut emit = |code: AbsoluteAxisCode| {
        out.push(InputEvent::with_time(
            time,
            EventType::EV_ABS,
            code.0,
            next.value(slot, code).unwrap_or(0),
        ));
    };

    if tid_first {
        emit(TRACKING_ID);
    }
    for raw in MT_CODE_FIRST..=AbsoluteAxisCode::MAX {
        let code = AbsoluteAxisCode(raw);
        if code == TRACKING_ID && (tid_first || tid_last) {
            continue;
        }
        if changed(code) {
            emit(code);
        }
    }
    if tid_last {
        emit(TRACKING_ID);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::SlotTable;

    struct Fixture {
        types: AttributeSet<EventType>,
        keys: AttributeSet<KeyCode>,
        leds: AttributeSet<LedCode>,
        switches: AttributeSet<SwitchCode>,
        abs: AttributeSet<AbsoluteAxisCode>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                types: AttributeSet::new(),
                keys: AttributeSet::new(),
                leds: AttributeSet::new(),
                switches: AttributeSet::new(),
                abs: AttributeSet::new(),
            }
        }

        fn caps(&self) -> SyncCaps<'_> {
            SyncCaps {
                types: &self.types,
                keys: &self.keys,
                leds: &self.leds,
                switches: &self.switches,
                abs: &self.abs,
            }
        }
    }

    const TIME: libc::timeval = libc::timeval {
        tv_sec: 10,
        tv_usec: 20,
    };

    fn drain(queue: &mut EventQueue) -> Vec<(u16, u16, i32)> {
        std::iter::from_fn(|| queue.pop())
            .map(|ev| (ev.event_type().0, ev.code(), ev.value()))
            .collect()
    }

    #[test]
    fn key_state_delta() {
        let mut fix = Fixture::new();
        fix.types.insert(EventType::EV_KEY);
        fix.keys.insert(KeyCode::KEY_A);
        fix.keys.insert(KeyCode::KEY_B);

        let mut prev = DeviceState::new();
        prev.key_vals.insert(KeyCode::KEY_A);
        let mut next = DeviceState::new();
        next.key_vals.insert(KeyCode::KEY_B);

        let mut queue = EventQueue::new();
        push_delta(&fix.caps(), &prev, &next, TIME, &mut queue);

        itertools::assert_equal(
            drain(&mut queue),
            vec![
                (EventType::EV_KEY.0, KeyCode::KEY_A.0, 0),
                (EventType::EV_KEY.0, KeyCode::KEY_B.0, 1),
                (EventType::EV_SYN.0, SynchronizationCode::SYN_REPORT.0, 0),
            ],
        );
    }

    #[test]
    fn identical_states_produce_only_the_report() {
        let mut fix = Fixture::new();
        fix.types.insert(EventType::EV_KEY);
        fix.types.insert(EventType::EV_ABS);
        fix.keys.insert(KeyCode::KEY_A);
        fix.abs.insert(AbsoluteAxisCode::ABS_X);

        let mut state = DeviceState::new();
        state.key_vals.insert(KeyCode::KEY_A);
        state.abs_vals[0].value = 5;

        let mut queue = EventQueue::new();
        push_delta(&fix.caps(), &state, &state.clone(), TIME, &mut queue);
        assert_eq!(queue.len(), 1);
        assert_eq!(
            drain(&mut queue),
            vec![(EventType::EV_SYN.0, SynchronizationCode::SYN_REPORT.0, 0)]
        );
    }

    #[test]
    fn disabled_type_suppresses_its_codes() {
        let mut fix = Fixture::new();
        // Key code bit set, but the type bit is not.
        fix.keys.insert(KeyCode::KEY_A);

        let prev = DeviceState::new();
        let mut next = DeviceState::new();
        next.key_vals.insert(KeyCode::KEY_A);

        let mut queue = EventQueue::new();
        push_delta(&fix.caps(), &prev, &next, TIME, &mut queue);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn non_mt_axis_delta_reports_new_value() {
        let mut fix = Fixture::new();
        fix.types.insert(EventType::EV_ABS);
        fix.abs.insert(AbsoluteAxisCode::ABS_X);
        fix.abs.insert(AbsoluteAxisCode::ABS_Y);

        let mut prev = DeviceState::new();
        prev.abs_vals[0].value = 100;
        let mut next = DeviceState::new();
        next.abs_vals[0].value = 150;

        let mut queue = EventQueue::new();
        push_delta(&fix.caps(), &prev, &next, TIME, &mut queue);
        itertools::assert_equal(
            drain(&mut queue),
            vec![
                (EventType::EV_ABS.0, AbsoluteAxisCode::ABS_X.0, 150),
                (EventType::EV_SYN.0, SynchronizationCode::SYN_REPORT.0, 0),
            ],
        );
    }

    #[test]
    fn mt_delta_orders_slots_and_tracking_ids() {
        let mut fix = Fixture::new();
        fix.types.insert(EventType::EV_ABS);
        fix.abs.insert(AbsoluteAxisCode::ABS_MT_SLOT);
        fix.abs.insert(AbsoluteAxisCode::ABS_MT_POSITION_X);
        fix.abs.insert(AbsoluteAxisCode::ABS_MT_TRACKING_ID);

        let mut prev = DeviceState::new();
        let mut prev_mt = SlotTable::new(2);
        prev_mt.set_value(0, AbsoluteAxisCode::ABS_MT_POSITION_X, 100);
        prev_mt.set_value(0, AbsoluteAxisCode::ABS_MT_TRACKING_ID, 4);
        prev_mt.set_value(1, AbsoluteAxisCode::ABS_MT_TRACKING_ID, -1);
        prev.mt = Some(prev_mt);

        let mut next = DeviceState::new();
        let mut next_mt = SlotTable::new(2);
        next_mt.set_value(0, AbsoluteAxisCode::ABS_MT_POSITION_X, 150);
        next_mt.set_value(0, AbsoluteAxisCode::ABS_MT_TRACKING_ID, 4);
        next_mt.set_value(1, AbsoluteAxisCode::ABS_MT_TRACKING_ID, 17);
        next_mt.set_value(1, AbsoluteAxisCode::ABS_MT_POSITION_X, 200);
        next.mt = Some(next_mt);

        let mut queue = EventQueue::new();
        push_delta(&fix.caps(), &prev, &next, TIME, &mut queue);

        itertools::assert_equal(
            drain(&mut queue),
            vec![
                (EventType::EV_ABS.0, AbsoluteAxisCode::ABS_MT_SLOT.0, 0),
                (EventType::EV_ABS.0, AbsoluteAxisCode::ABS_MT_POSITION_X.0, 150),
                (EventType::EV_ABS.0, AbsoluteAxisCode::ABS_MT_SLOT.0, 1),
                // The new contact opens before its coordinates arrive.
                (EventType::EV_ABS.0, AbsoluteAxisCode::ABS_MT_TRACKING_ID.0, 17),
                (EventType::EV_ABS.0, AbsoluteAxisCode::ABS_MT_POSITION_X.0, 200),
                (EventType::EV_SYN.0, SynchronizationCode::SYN_REPORT.0, 0),
            ],
        );
    }

    #[test]
    fn terminated_contact_closes_last() {
        let mut fix = Fixture::new();
        fix.types.insert(EventType::EV_ABS);
        fix.abs.insert(AbsoluteAxisCode::ABS_MT_SLOT);
        fix.abs.insert(AbsoluteAxisCode::ABS_MT_POSITION_X);
        fix.abs.insert(AbsoluteAxisCode::ABS_MT_TRACKING_ID);

        let mut prev = DeviceState::new();
        let mut prev_mt = SlotTable::new(1);
        prev_mt.set_value(0, AbsoluteAxisCode::ABS_MT_TRACKING_ID, 9);
        prev_mt.set_value(0, AbsoluteAxisCode::ABS_MT_POSITION_X, 10);
        prev.mt = Some(prev_mt);

        let mut next = DeviceState::new();
        let mut next_mt = SlotTable::new(1);
        next_mt.set_value(0, AbsoluteAxisCode::ABS_MT_TRACKING_ID, -1);
        next_mt.set_value(0, AbsoluteAxisCode::ABS_MT_POSITION_X, 12);
        next.mt = Some(next_mt);

        let mut queue = EventQueue::new();
        push_delta(&fix.caps(), &prev, &next, TIME, &mut queue);

        itertools::assert_equal(
            drain(&mut queue),
            vec![
                (EventType::EV_ABS.0, AbsoluteAxisCode::ABS_MT_SLOT.0, 0),
                (EventType::EV_ABS.0, AbsoluteAxisCode::ABS_MT_POSITION_X.0, 12),
                (EventType::EV_ABS.0, AbsoluteAxisCode::ABS_MT_TRACKING_ID.0, -1),
                (EventType::EV_SYN.0, SynchronizationCode::SYN_REPORT.0, 0),
            ],
        );
    }

    #[test]
    fn synthesized_events_carry_the_trigger_timestamp() {
        let mut fix = Fixture::new();
        fix.types.insert(EventType::EV_KEY);
        fix.keys.insert(KeyCode::KEY_A);

        let prev = DeviceState::new();
        let mut next = DeviceState::new();
        next.key_vals.insert(KeyCode::KEY_A);

        let mut queue = EventQueue::new();
        push_delta(&fix.caps(), &prev, &next, TIME, &mut queue);
        while let Some(ev) = queue.pop() {
            assert_eq!(ev.time().tv_sec, TIME.tv_sec);
            assert_eq!(ev.time().tv_usec, TIME.tv_usec);
        }
    }

    #[test]
    fn applying_the_delta_reproduces_the_snapshot() {
        let mut fix = Fixture::new();
        fix.types.insert(EventType::EV_KEY);
        fix.types.insert(EventType::EV_ABS);
        fix.keys.insert(KeyCode::KEY_A);
        fix.keys.insert(KeyCode::KEY_B);
        fix.abs.insert(AbsoluteAxisCode::ABS_X);

        let mut prev = DeviceState::new();
        prev.key_vals.insert(KeyCode::KEY_A);
        prev.abs_vals[0].value = 3;

        let mut next = DeviceState::new();
        next.key_vals.insert(KeyCode::KEY_B);
        next.abs_vals[0].value = -9;

        let mut queue = EventQueue::new();
        push_delta(&fix.caps(), &prev, &next, TIME, &mut queue);

        let mut replayed = prev.clone();
        while let Some(ev) = queue.pop() {
            replayed.process_event(&ev);
        }
        assert_eq!(replayed, next);
    }
}
