use crate::attribute_set::AttributeSet;
use crate::compat::{input_absinfo, ABS_CNT};
use crate::constants::*;
use crate::event::{EventCode, InputEvent};
use crate::slot::SlotTable;

const ABSINFO_ZERO: input_absinfo = input_absinfo {
    value: 0,
    minimum: 0,
    maximum: 0,
    fuzz: 0,
    flat: 0,
    resolution: 0,
};

pub(crate) const ABS_VALS_INIT: [input_absinfo; ABS_CNT] = [ABSINFO_ZERO; ABS_CNT];

/// The delay and period of the kernel's key autorepeat, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyRepeat {
    pub delay: i32,
    pub period: i32,
}

/// The cached value state of an attached device: everything the kernel
/// reports through the state ioctls, kept current by event processing.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DeviceState {
    /// Set = key pressed
    pub(crate) key_vals: AttributeSet<KeyCode>,
    /// Set = LED lit
    pub(crate) led_vals: AttributeSet<LedCode>,
    /// Set = switch enabled (closed)
    pub(crate) switch_vals: AttributeSet<SwitchCode>,
    /// Axis metadata and current values, indexed by code. Valid only for
    /// codes marked supported.
    pub(crate) abs_vals: Box<[input_absinfo; ABS_CNT]>,
    pub(crate) repeat: KeyRepeat,
    /// Present iff the device is a real multitouch device.
    pub(crate) mt: Option<SlotTable>,
}

impl DeviceState {
    pub(crate) fn new() -> Self {
        Self {
            key_vals: AttributeSet::new(),
            led_vals: AttributeSet::new(),
            switch_vals: AttributeSet::new(),
            abs_vals: Box::new(ABS_VALS_INIT),
            repeat: KeyRepeat::default(),
            mt: None,
        }
    }

    /// Folds one event into the cached state. The caller has already
    /// filtered events of disabled types and codes.
    pub(crate) fn process_event(&mut self, ev: &InputEvent) {
        match ev.event_code() {
            EventCode::Key(key) if (key.0 as usize) < crate::compat::KEY_CNT => {
                self.key_vals.set(key, ev.value() != 0);
            }
            EventCode::Led(led) if (led.0 as usize) < crate::compat::LED_CNT => {
                self.led_vals.set(led, ev.value() != 0);
            }
            EventCode::Switch(sw) if (sw.0 as usize) < crate::compat::SW_CNT => {
                self.switch_vals.set(sw, ev.value() != 0);
            }
            EventCode::AbsAxis(axis) if (axis.0 as usize) < ABS_CNT => {
                self.process_abs(axis, ev.value());
            }
            EventCode::Repeat(RepeatCode::REP_DELAY) => self.repeat.delay = ev.value(),
            EventCode::Repeat(RepeatCode::REP_PERIOD) => self.repeat.period = ev.value(),
            EventCode::Synchronization(SynchronizationCode::SYN_REPORT) => {
                if let Some(mt) = &mut self.mt {
                    mt.end_frame();
                }
            }
            _ => {}
        }
    }

    fn process_abs(&mut self, axis: AbsoluteAxisCode, value: i32) {
        // Fake-MT devices carry no slot table and share axis state like any
        // other absolute axis.
        match &mut self.mt {
            Some(mt) if axis == AbsoluteAxisCode::ABS_MT_SLOT => mt.process_slot_event(value),
            Some(mt) if axis.is_multitouch() => mt.process_mt_event(axis, value),
            _ => self.abs_vals[axis.0 as usize].value = value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::InputEvent;

    fn ev(type_: EventType, code: u16, value: i32) -> InputEvent {
        InputEvent::new(type_, code, value)
    }

    #[test]
    fn key_events_toggle_bits() {
        let mut state = DeviceState::new();
        state.process_event(&ev(EventType::EV_KEY, KeyCode::KEY_A.0, 1));
        assert!(state.key_vals.contains(KeyCode::KEY_A));
        state.process_event(&ev(EventType::EV_KEY, KeyCode::KEY_A.0, 0));
        assert!(!state.key_vals.contains(KeyCode::KEY_A));
    }

    #[test]
    fn key_repeat_counts_as_pressed() {
        let mut state = DeviceState::new();
        state.process_event(&ev(EventType::EV_KEY, KeyCode::KEY_A.0, 2));
        assert!(state.key_vals.contains(KeyCode::KEY_A));
    }

    #[test]
    fn abs_events_update_axis_values() {
        let mut state = DeviceState::new();
        state.process_event(&ev(EventType::EV_ABS, AbsoluteAxisCode::ABS_X.0, -37));
        assert_eq!(state.abs_vals[AbsoluteAxisCode::ABS_X.0 as usize].value, -37);
    }

    #[test]
    fn mt_events_route_through_the_slot_table() {
        let mut state = DeviceState::new();
        state.mt = Some(SlotTable::new(2));
        state.process_event(&ev(EventType::EV_ABS, AbsoluteAxisCode::ABS_MT_SLOT.0, 1));
        state.process_event(&ev(
            EventType::EV_ABS,
            AbsoluteAxisCode::ABS_MT_POSITION_X.0,
            640,
        ));
        let mt = state.mt.as_ref().unwrap();
        assert_eq!(mt.current_slot(), 1);
        assert_eq!(mt.value(1, AbsoluteAxisCode::ABS_MT_POSITION_X), Some(640));
        // The shared axis array is untouched by per-slot codes.
        assert_eq!(
            state.abs_vals[AbsoluteAxisCode::ABS_MT_POSITION_X.0 as usize].value,
            0
        );
    }

    #[test]
    fn fake_mt_shares_axis_state() {
        let mut state = DeviceState::new();
        state.process_event(&ev(
            EventType::EV_ABS,
            AbsoluteAxisCode::ABS_MT_POSITION_X.0,
            77,
        ));
        assert_eq!(
            state.abs_vals[AbsoluteAxisCode::ABS_MT_POSITION_X.0 as usize].value,
            77
        );
    }

    #[test]
    fn repeat_codes_update_the_pair() {
        let mut state = DeviceState::new();
        state.process_event(&ev(EventType::EV_REP, RepeatCode::REP_DELAY.0, 250));
        state.process_event(&ev(EventType::EV_REP, RepeatCode::REP_PERIOD.0, 33));
        assert_eq!(
            state.repeat,
            KeyRepeat {
                delay: 250,
                period: 33
            }
        );
    }
}
