//! The kernel event frame and its typed views.

use std::fmt;
use std::time::{Duration, SystemTime};

use crate::compat::input_event;
use crate::constants::*;

/// A single event frame as read off the device descriptor:
/// `{time, type, code, value}`.
#[derive(Copy, Clone, PartialEq, Eq)]
#[repr(transparent)]
pub struct InputEvent(pub(crate) input_event);

impl InputEvent {
    /// Creates a new event with a zeroed timestamp.
    pub fn new(type_: EventType, code: u16, value: i32) -> Self {
        Self(input_event {
            time: libc::timeval {
                tv_sec: 0,
                tv_usec: 0,
            },
            type_: type_.0,
            code,
            value,
        })
    }

    /// Creates a new event timestamped with the current time.
    pub fn new_now(type_: EventType, code: u16, value: i32) -> Self {
        Self::with_time(systime_to_timeval(&SystemTime::now()), type_, code, value)
    }

    pub(crate) fn with_time(time: libc::timeval, type_: EventType, code: u16, value: i32) -> Self {
        Self(input_event {
            time,
            type_: type_.0,
            code,
            value,
        })
    }

    /// The moment the kernel (or the synchronization engine) stamped on the
    /// event.
    pub fn timestamp(&self) -> SystemTime {
        timeval_to_systime(&self.0.time)
    }

    pub(crate) fn time(&self) -> libc::timeval {
        self.0.time
    }

    pub fn event_type(&self) -> EventType {
        EventType(self.0.type_)
    }

    /// The raw numeric code; see [`InputEvent::event_code`] for the typed view.
    pub fn code(&self) -> u16 {
        self.0.code
    }

    pub fn value(&self) -> i32 {
        self.0.value
    }

    /// The `(type, code)` pair as an [`EventCode`].
    pub fn event_code(&self) -> EventCode {
        EventCode::new(self.event_type(), self.code())
    }

    pub fn is_type(&self, type_: EventType) -> bool {
        self.event_type() == type_
    }

    pub fn is_code(&self, code: EventCode) -> bool {
        self.event_code() == code
    }

    pub(crate) fn is_syn_dropped(&self) -> bool {
        self.0.type_ == EventType::EV_SYN.0 && self.0.code == SynchronizationCode::SYN_DROPPED.0
    }
}

impl From<input_event> for InputEvent {
    fn from(raw: input_event) -> Self {
        Self(raw)
    }
}

impl AsRef<input_event> for InputEvent {
    fn as_ref(&self) -> &input_event {
        &self.0
    }
}

impl fmt::Debug for InputEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("InputEvent")
            .field("time", &self.timestamp())
            .field("code", &self.event_code())
            .field("value", &self.value())
            .finish()
    }
}

/// An event code paired with its type.
///
/// This is the currency of the capability and value surface:
/// `has_event_code`, `event_value`, `enable_event_code` and friends all
/// speak `EventCode`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum EventCode {
    Synchronization(SynchronizationCode),
    Key(KeyCode),
    RelAxis(RelativeAxisCode),
    AbsAxis(AbsoluteAxisCode),
    Misc(MiscCode),
    Switch(SwitchCode),
    Led(LedCode),
    Sound(SoundCode),
    Repeat(RepeatCode),
    ForceFeedback(FFEffectCode),
    /// A code of a type without a dedicated table (`EV_PWR`,
    /// `EV_FF_STATUS`, or an unknown type).
    Other(EventType, u16),
}

impl EventCode {
    /// Pairs a numeric type and code into the typed view.
    pub fn new(type_: EventType, code: u16) -> Self {
        match type_ {
            EventType::EV_SYN => Self::Synchronization(SynchronizationCode(code)),
            EventType::EV_KEY => Self::Key(KeyCode(code)),
            EventType::EV_REL => Self::RelAxis(RelativeAxisCode(code)),
            EventType::EV_ABS => Self::AbsAxis(AbsoluteAxisCode(code)),
            EventType::EV_MSC => Self::Misc(MiscCode(code)),
            EventType::EV_SW => Self::Switch(SwitchCode(code)),
            EventType::EV_LED => Self::Led(LedCode(code)),
            EventType::EV_SND => Self::Sound(SoundCode(code)),
            EventType::EV_REP => Self::Repeat(RepeatCode(code)),
            EventType::EV_FF => Self::ForceFeedback(FFEffectCode(code)),
            other => Self::Other(other, code),
        }
    }

    pub fn event_type(&self) -> EventType {
        match self {
            Self::Synchronization(_) => EventType::EV_SYN,
            Self::Key(_) => EventType::EV_KEY,
            Self::RelAxis(_) => EventType::EV_REL,
            Self::AbsAxis(_) => EventType::EV_ABS,
            Self::Misc(_) => EventType::EV_MSC,
            Self::Switch(_) => EventType::EV_SW,
            Self::Led(_) => EventType::EV_LED,
            Self::Sound(_) => EventType::EV_SND,
            Self::Repeat(_) => EventType::EV_REP,
            Self::ForceFeedback(_) => EventType::EV_FF,
            Self::Other(t, _) => *t,
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            Self::Synchronization(c) => c.0,
            Self::Key(c) => c.0,
            Self::RelAxis(c) => c.0,
            Self::AbsAxis(c) => c.0,
            Self::Misc(c) => c.0,
            Self::Switch(c) => c.0,
            Self::Led(c) => c.0,
            Self::Sound(c) => c.0,
            Self::Repeat(c) => c.0,
            Self::ForceFeedback(c) => c.0,
            Self::Other(_, c) => *c,
        }
    }

    /// The canonical symbolic name of the code (`"ABS_X"` style), looked up
    /// in the table of the code's type.
    pub fn name(&self) -> Option<&'static str> {
        match self {
            Self::Synchronization(c) => c.name(),
            Self::Key(c) => c.name(),
            Self::RelAxis(c) => c.name(),
            Self::AbsAxis(c) => c.name(),
            Self::Misc(c) => c.name(),
            Self::Switch(c) => c.name(),
            Self::Led(c) => c.name(),
            Self::Sound(c) => c.name(),
            Self::Repeat(c) => c.name(),
            Self::ForceFeedback(c) => c.name(),
            Self::Other(..) => None,
        }
    }

    /// Looks up a code by its full symbolic name within the table of the
    /// given type. The prefix is part of the name (`"ABS_X"`, not `"X"`).
    pub fn from_name(type_: EventType, name: &str) -> Option<Self> {
        match type_ {
            EventType::EV_SYN => SynchronizationCode::from_name(name).map(Self::Synchronization),
            EventType::EV_KEY => KeyCode::from_name(name).map(Self::Key),
            EventType::EV_REL => RelativeAxisCode::from_name(name).map(Self::RelAxis),
            EventType::EV_ABS => AbsoluteAxisCode::from_name(name).map(Self::AbsAxis),
            EventType::EV_MSC => MiscCode::from_name(name).map(Self::Misc),
            EventType::EV_SW => SwitchCode::from_name(name).map(Self::Switch),
            EventType::EV_LED => LedCode::from_name(name).map(Self::Led),
            EventType::EV_SND => SoundCode::from_name(name).map(Self::Sound),
            EventType::EV_REP => RepeatCode::from_name(name).map(Self::Repeat),
            EventType::EV_FF => FFEffectCode::from_name(name).map(Self::ForceFeedback),
            _ => None,
        }
    }
}

pub(crate) fn systime_to_timeval(time: &SystemTime) -> libc::timeval {
    let (sign, dur) = match time.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(dur) => (1 as libc::time_t, dur),
        Err(e) => (-1 as libc::time_t, e.duration()),
    };
    libc::timeval {
        tv_sec: dur.as_secs() as libc::time_t * sign,
        tv_usec: dur.subsec_micros() as libc::suseconds_t,
    }
}

pub(crate) fn timeval_to_systime(tv: &libc::timeval) -> SystemTime {
    let dur = Duration::new(tv.tv_sec.unsigned_abs() as u64, tv.tv_usec as u32 * 1000);
    if tv.tv_sec >= 0 {
        SystemTime::UNIX_EPOCH + dur
    } else {
        SystemTime::UNIX_EPOCH - dur
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_code_round_trip() {
        let ev = InputEvent::new(EventType::EV_KEY, KeyCode::KEY_A.0, 1);
        assert_eq!(ev.event_code(), EventCode::Key(KeyCode::KEY_A));
        assert_eq!(ev.event_code().event_type(), EventType::EV_KEY);
        assert_eq!(ev.event_code().code(), KeyCode::KEY_A.0);
    }

    #[test]
    fn from_name_picks_table_by_type() {
        assert_eq!(
            EventCode::from_name(EventType::EV_ABS, "ABS_X"),
            Some(EventCode::AbsAxis(AbsoluteAxisCode::ABS_X))
        );
        // A key name is not found in the ABS table.
        assert_eq!(EventCode::from_name(EventType::EV_ABS, "KEY_A"), None);
        assert_eq!(EventCode::from_name(EventType::EV_PWR, "anything"), None);
    }

    #[test]
    fn syn_dropped_detection() {
        let dropped = InputEvent::new(
            EventType::EV_SYN,
            SynchronizationCode::SYN_DROPPED.0,
            0,
        );
        let report = InputEvent::new(EventType::EV_SYN, SynchronizationCode::SYN_REPORT.0, 0);
        assert!(dropped.is_syn_dropped());
        assert!(!report.is_syn_dropped());
    }

    #[test]
    fn timeval_round_trip() {
        let now = SystemTime::UNIX_EPOCH + Duration::new(1_600_000_000, 123_000_000);
        let tv = systime_to_timeval(&now);
        assert_eq!(tv.tv_sec, 1_600_000_000);
        assert_eq!(tv.tv_usec, 123_000);
        assert_eq!(timeval_to_systime(&tv), now);
    }
}
