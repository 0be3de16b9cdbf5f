//! The device model: a queryable, mutable mirror of one evdev descriptor,
//! and the event reader that keeps it current.

use std::io;
use std::mem::{self, MaybeUninit};
use std::os::unix::io::RawFd;
use std::time::SystemTime;
use std::fmt;

use bitflags::bitflags;

use crate::attribute_set::AttributeSet;
use crate::compat::{input_event, input_id, ABS_CNT, EV_CNT, INPUT_PROP_CNT, KEY_CNT, LED_CNT, MSC_CNT, REL_CNT, SND_CNT, SW_CNT};
use crate::constants::*;
use crate::device_state::{DeviceState, KeyRepeat};
use crate::error::{Error, Result};
use crate::event::{systime_to_timeval, EventCode, InputEvent};
use crate::input_id::InputId;
use crate::queue::EventQueue;
use crate::slot::{is_fake_mt, SlotTable, MT_CODE_FIRST};
use crate::sync::{push_delta, SyncCaps};
use crate::sys;
use crate::abs_info::AbsInfo;

bitflags! {
    /// Flags controlling one [`Device::next_event`] call.
    ///
    /// Exactly one of `NORMAL`, `SYNC` and `FORCE_SYNC` must be set;
    /// `BLOCKING` may be combined with any of them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ReadFlag: u32 {
        /// Process data in sync mode, draining the synthesized delta.
        const SYNC = 1;
        /// Process data in normal mode.
        const NORMAL = 2;
        /// Pretend the next event is a `SYN_DROPPED` and start a sync.
        const FORCE_SYNC = 4;
        /// The descriptor is not `O_NONBLOCK` and the read may block.
        const BLOCKING = 8;
    }
}

/// What a successful [`Device::next_event`] call produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// An ordinary device event.
    Success,
    /// Either a `SYN_DROPPED` was just seen (normal mode) or the returned
    /// event is part of the synchronization delta (sync mode).
    Sync,
}

/// Argument to [`Device::grab`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabMode {
    /// Take the kernel-level exclusive subscription.
    Grab,
    /// Release it.
    Ungrab,
}

/// Argument to the kernel LED operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedState {
    On,
    Off,
}

impl LedState {
    fn value(self) -> i32 {
        match self {
            LedState::On => 1,
            LedState::Off => 0,
        }
    }
}

/// The clock future event timestamps are read in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClockId {
    #[default]
    Realtime,
    Monotonic,
}

impl ClockId {
    fn raw(self) -> libc::c_int {
        match self {
            ClockId::Realtime => libc::CLOCK_REALTIME,
            ClockId::Monotonic => libc::CLOCK_MONOTONIC,
        }
    }
}

/// Per-type payload of [`Device::enable_event_code`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EnablePayload {
    /// For every type except `EV_ABS` and `EV_REP`.
    None,
    /// Axis metadata for an `EV_ABS` code.
    AbsInfo(AbsInfo),
    /// The autorepeat pair for `EV_REP`.
    Repeat(KeyRepeat),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    Normal,
    Sync,
    /// Transient: only observed inside a single `next_event(FORCE_SYNC)`
    /// call, between deciding to sync and the snapshot being taken.
    ForcedSyncPending,
}

/// A mirror of one evdev device.
///
/// A `Device` starts out empty and detached. [`attach`](Device::attach)
/// probes a caller-owned descriptor and overwrites the model with what the
/// kernel reports; afterwards [`next_event`](Device::next_event) keeps the
/// mirror current, recovering from kernel-side event loss (`SYN_DROPPED`)
/// by replaying the state difference as synthesized events.
///
/// The descriptor stays owned by the caller: it is never closed here, and
/// making it non-blocking (or not, together with [`ReadFlag::BLOCKING`]) is
/// the caller's choice. All capability mutations are local to this mirror
/// and never reach the kernel; the `kernel_*` operations are the explicit
/// exceptions.
#[derive(Debug)]
pub struct Device {
    fd: Option<RawFd>,
    name: Option<String>,
    phys: Option<String>,
    uniq: Option<String>,
    id: input_id,
    driver_version: i32,
    props: AttributeSet<PropType>,
    types: AttributeSet<EventType>,
    keys: AttributeSet<KeyCode>,
    rel: AttributeSet<RelativeAxisCode>,
    abs: AttributeSet<AbsoluteAxisCode>,
    switches: AttributeSet<SwitchCode>,
    leds: AttributeSet<LedCode>,
    misc: AttributeSet<MiscCode>,
    sounds: AttributeSet<SoundCode>,
    ff: AttributeSet<FFEffectCode>,
    state: DeviceState,
    queue: EventQueue,
    /// The kernel snapshot the queued delta leads to; the model is
    /// fast-forwarded to it when the sync completes or is abandoned.
    pending: Option<DeviceState>,
    reader: ReaderState,
    clock_id: ClockId,
    grabbed: bool,
    #[cfg(test)]
    test_snapshot: Option<DeviceState>,
}

impl Default for Device {
    fn default() -> Self {
        Self::new()
    }
}

impl Device {
    /// Creates an empty, detached model.
    pub fn new() -> Self {
        Self {
            fd: None,
            name: None,
            phys: None,
            uniq: None,
            id: input_id {
                bustype: 0,
                vendor: 0,
                product: 0,
                version: 0,
            },
            driver_version: 0,
            props: AttributeSet::new(),
            types: AttributeSet::new(),
            keys: AttributeSet::new(),
            rel: AttributeSet::new(),
            abs: AttributeSet::new(),
            switches: AttributeSet::new(),
            leds: AttributeSet::new(),
            misc: AttributeSet::new(),
            sounds: AttributeSet::new(),
            ff: AttributeSet::new(),
            state: DeviceState::new(),
            queue: EventQueue::new(),
            pending: None,
            reader: ReaderState::Normal,
            clock_id: ClockId::default(),
            grabbed: false,
            #[cfg(test)]
            test_snapshot: None,
        }
    }

    // ---- descriptor lifecycle -------------------------------------------

    /// Probes `fd` and populates the model from the kernel.
    ///
    /// The descriptor stays owned by the caller. May be called once per
    /// model; identity and capabilities set beforehand are overwritten.
    pub fn attach(&mut self, fd: RawFd) -> Result<()> {
        if self.fd.is_some() {
            return Err(Error::AlreadyAttached);
        }

        let mut version: libc::c_int = 0;
        unsafe { sys::eviocgversion(fd, &mut version) }.map_err(Error::NotAnEvdevDevice)?;
        self.driver_version = version;

        unsafe { sys::eviocgid(fd, &mut self.id) }?;
        self.name = read_identity_string(fd, sys::eviocgname);
        self.phys = read_identity_string(fd, sys::eviocgphys);
        self.uniq = read_identity_string(fd, sys::eviocguniq);

        // Kernels without EVIOCGPROP simply expose no properties.
        self.props.clear();
        let _ = unsafe { sys::eviocgprop(fd, self.props.as_mut_raw_slice()) };

        self.types.clear();
        unsafe { sys::eviocgbit_type(fd, self.types.as_mut_raw_slice()) }?;

        self.keys.clear();
        if self.types.contains(EventType::EV_KEY) {
            unsafe { sys::eviocgbit_key(fd, self.keys.as_mut_raw_slice()) }?;
        }
        self.rel.clear();
        if self.types.contains(EventType::EV_REL) {
            unsafe { sys::eviocgbit_relative(fd, self.rel.as_mut_raw_slice()) }?;
        }
        self.abs.clear();
        if self.types.contains(EventType::EV_ABS) {
            unsafe { sys::eviocgbit_absolute(fd, self.abs.as_mut_raw_slice()) }?;
        }
        self.switches.clear();
        if self.types.contains(EventType::EV_SW) {
            unsafe { sys::eviocgbit_switch(fd, self.switches.as_mut_raw_slice()) }?;
        }
        self.leds.clear();
        if self.types.contains(EventType::EV_LED) {
            unsafe { sys::eviocgbit_led(fd, self.leds.as_mut_raw_slice()) }?;
        }
        self.misc.clear();
        if self.types.contains(EventType::EV_MSC) {
            unsafe { sys::eviocgbit_misc(fd, self.misc.as_mut_raw_slice()) }?;
        }
        self.sounds.clear();
        if self.types.contains(EventType::EV_SND) {
            unsafe { sys::eviocgbit_sound(fd, self.sounds.as_mut_raw_slice()) }?;
        }
        self.ff.clear();
        if self.types.contains(EventType::EV_FF) {
            unsafe { sys::eviocgbit_ff(fd, self.ff.as_mut_raw_slice()) }?;
        }

        self.state = DeviceState::new();
        if self.types.contains(EventType::EV_ABS) {
            for axis in self.abs.iter() {
                unsafe {
                    sys::eviocgabs(fd, axis.0 as u32, &mut self.state.abs_vals[axis.0 as usize])
                }?;
            }
        }
        if self.types.contains(EventType::EV_KEY) {
            unsafe { sys::eviocgkey(fd, self.state.key_vals.as_mut_raw_slice()) }?;
        }
        if self.types.contains(EventType::EV_LED) {
            unsafe { sys::eviocgled(fd, self.state.led_vals.as_mut_raw_slice()) }?;
        }
        if self.types.contains(EventType::EV_SW) {
            unsafe { sys::eviocgsw(fd, self.state.switch_vals.as_mut_raw_slice()) }?;
        }
        if self.types.contains(EventType::EV_REP) {
            let mut rep = [0 as libc::c_uint; 2];
            if unsafe { sys::eviocgrep(fd, &mut rep) }.is_ok() {
                self.state.repeat = KeyRepeat {
                    delay: rep[0] as i32,
                    period: rep[1] as i32,
                };
            }
        }

        self.setup_mt(fd);

        if self.clock_id != ClockId::Realtime {
            self.apply_clock_id(fd, self.clock_id)?;
        }

        self.queue.reserve_bound(self.sync_bound());
        self.reader = ReaderState::Normal;
        self.fd = Some(fd);
        Ok(())
    }

    fn setup_mt(&mut self, fd: RawFd) {
        self.state.mt = None;
        if !self.abs.contains(AbsoluteAxisCode::ABS_MT_SLOT) {
            return;
        }
        if is_fake_mt(&self.abs) {
            log_msg!(
                Info,
                "device \"{}\" uses the multitouch axis range without slot semantics; treating its axes as ordinary",
                self.name.as_deref().unwrap_or("?")
            );
            return;
        }

        let slot_info = self.state.abs_vals[AbsoluteAxisCode::ABS_MT_SLOT.0 as usize];
        let num_slots = slot_info.maximum + 1;
        let mut table = SlotTable::new(num_slots);
        table.set_current_slot(slot_info.value.clamp(0, (num_slots - 1).max(0)));

        let tracked = table.tracked_slots() as usize;
        let mut buf = vec![0i32; tracked + 1];
        for code in self.abs.iter().filter(|c| c.0 >= MT_CODE_FIRST) {
            buf[0] = code.0 as i32;
            match unsafe { sys::eviocgmtslots(fd, &mut buf) } {
                Ok(_) => {
                    for slot in 0..tracked {
                        table.set_value(slot as i32, code, buf[slot + 1]);
                    }
                }
                Err(_) => {
                    // Pre-3.4 kernels: slot values default to zero.
                    log_msg!(Debug, "EVIOCGMTSLOTS unavailable; slot values start at 0");
                    break;
                }
            }
        }
        self.state.mt = Some(table);
    }

    /// Swaps the descriptor without re-probing the device.
    ///
    /// No check is made that the new descriptor refers to the same device;
    /// the cached state is kept. Follow up with
    /// `next_event(ReadFlag::FORCE_SYNC)` to resynchronize.
    pub fn change_fd(&mut self, fd: RawFd) -> Result<()> {
        if self.fd.is_none() {
            return Err(Error::NotAttached);
        }
        self.fd = Some(fd);
        Ok(())
    }

    /// The attached descriptor, if any.
    pub fn fd(&self) -> Option<RawFd> {
        self.fd
    }

    // ---- identity --------------------------------------------------------

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn physical_path(&self) -> Option<&str> {
        self.phys.as_deref()
    }

    pub fn unique_name(&self) -> Option<&str> {
        self.uniq.as_deref()
    }

    /// Caller-local override; [`attach`](Device::attach) overwrites it.
    pub fn set_name(&mut self, name: &str) {
        self.name = Some(name.to_owned());
    }

    pub fn set_physical_path(&mut self, phys: &str) {
        self.phys = Some(phys.to_owned());
    }

    pub fn set_unique_name(&mut self, uniq: &str) {
        self.uniq = Some(uniq.to_owned());
    }

    /// Bus/vendor/product/version identity as one struct.
    pub fn input_id(&self) -> InputId {
        InputId::from(self.id)
    }

    pub fn bustype(&self) -> u16 {
        self.id.bustype
    }

    pub fn vendor_id(&self) -> u16 {
        self.id.vendor
    }

    pub fn product_id(&self) -> u16 {
        self.id.product
    }

    pub fn version(&self) -> u16 {
        self.id.version
    }

    pub fn set_bustype(&mut self, bustype: u16) {
        self.id.bustype = bustype;
    }

    pub fn set_vendor_id(&mut self, vendor: u16) {
        self.id.vendor = vendor;
    }

    pub fn set_product_id(&mut self, product: u16) {
        self.id.product = product;
    }

    pub fn set_version(&mut self, version: u16) {
        self.id.version = version;
    }

    /// The evdev protocol version the driver reported at attach time.
    pub fn driver_version(&self) -> i32 {
        self.driver_version
    }

    // ---- capabilities ----------------------------------------------------

    pub fn has_property(&self, prop: PropType) -> bool {
        self.props.contains(prop)
    }

    /// Marks a property as present on this mirror. Local only; overwritten
    /// by [`attach`](Device::attach).
    pub fn enable_property(&mut self, prop: PropType) -> Result<()> {
        if prop.0 as usize >= INPUT_PROP_CNT {
            return Err(Error::InvalidArgument("property out of range"));
        }
        self.props.insert(prop);
        Ok(())
    }

    pub fn has_event_type(&self, type_: EventType) -> bool {
        self.types.contains(type_)
    }

    /// Whether the device supports the code. Always false when the code's
    /// type is disabled, regardless of the per-code bit.
    pub fn has_event_code(&self, code: EventCode) -> bool {
        if !self.has_event_type(code.event_type()) {
            return false;
        }
        match code {
            EventCode::Synchronization(_) => true,
            EventCode::Key(c) => self.keys.contains(c),
            EventCode::RelAxis(c) => self.rel.contains(c),
            EventCode::AbsAxis(c) => self.abs.contains(c),
            EventCode::Misc(c) => self.misc.contains(c),
            EventCode::Switch(c) => self.switches.contains(c),
            EventCode::Led(c) => self.leds.contains(c),
            EventCode::Sound(c) => self.sounds.contains(c),
            EventCode::Repeat(c) => c.0 <= RepeatCode::MAX,
            EventCode::ForceFeedback(c) => self.ff.contains(c),
            EventCode::Other(..) => true,
        }
    }

    pub fn properties(&self) -> &AttributeSet<PropType> {
        &self.props
    }

    pub fn supported_events(&self) -> &AttributeSet<EventType> {
        &self.types
    }

    pub fn supported_keys(&self) -> &AttributeSet<KeyCode> {
        &self.keys
    }

    pub fn supported_relative_axes(&self) -> &AttributeSet<RelativeAxisCode> {
        &self.rel
    }

    pub fn supported_absolute_axes(&self) -> &AttributeSet<AbsoluteAxisCode> {
        &self.abs
    }

    pub fn supported_switches(&self) -> &AttributeSet<SwitchCode> {
        &self.switches
    }

    pub fn supported_leds(&self) -> &AttributeSet<LedCode> {
        &self.leds
    }

    pub fn misc_properties(&self) -> &AttributeSet<MiscCode> {
        &self.misc
    }

    pub fn supported_sounds(&self) -> &AttributeSet<SoundCode> {
        &self.sounds
    }

    pub fn supported_ff(&self) -> &AttributeSet<FFEffectCode> {
        &self.ff
    }

    /// Locally marks an event type as supported.
    pub fn enable_event_type(&mut self, type_: EventType) -> Result<()> {
        if type_.0 as usize >= EV_CNT {
            return Err(Error::InvalidArgument("event type out of range"));
        }
        self.types.insert(type_);
        Ok(())
    }

    /// Locally marks a code as supported, implying its type. `EV_ABS` codes
    /// take their axis metadata, `EV_REP` takes the repeat pair, everything
    /// else takes [`EnablePayload::None`].
    pub fn enable_event_code(&mut self, code: EventCode, payload: EnablePayload) -> Result<()> {
        match (code, payload) {
            (EventCode::AbsAxis(axis), EnablePayload::AbsInfo(info)) => {
                if axis.0 as usize >= ABS_CNT {
                    return Err(Error::InvalidArgument("absolute axis code out of range"));
                }
                self.types.insert(EventType::EV_ABS);
                self.abs.insert(axis);
                self.state.abs_vals[axis.0 as usize] = info.0;
                if axis == AbsoluteAxisCode::ABS_MT_SLOT && !is_fake_mt(&self.abs) {
                    let num_slots = info.maximum() + 1;
                    let mut table = SlotTable::new(num_slots);
                    table.set_current_slot(info.value().clamp(0, (num_slots - 1).max(0)));
                    self.state.mt = Some(table);
                }
            }
            (EventCode::Repeat(_), EnablePayload::Repeat(pair)) => {
                self.types.insert(EventType::EV_REP);
                self.state.repeat = pair;
            }
            (EventCode::Key(c), EnablePayload::None) => {
                if c.0 as usize >= KEY_CNT {
                    return Err(Error::InvalidArgument("key code out of range"));
                }
                self.types.insert(EventType::EV_KEY);
                self.keys.insert(c);
            }
            (EventCode::RelAxis(c), EnablePayload::None) => {
                if c.0 as usize >= REL_CNT {
                    return Err(Error::InvalidArgument("relative axis code out of range"));
                }
                self.types.insert(EventType::EV_REL);
                self.rel.insert(c);
            }
            (EventCode::Switch(c), EnablePayload::None) => {
                if c.0 as usize >= SW_CNT {
                    return Err(Error::InvalidArgument("switch code out of range"));
                }
                self.types.insert(EventType::EV_SW);
                self.switches.insert(c);
            }
            (EventCode::Led(c), EnablePayload::None) => {
                if c.0 as usize >= LED_CNT {
                    return Err(Error::InvalidArgument("LED code out of range"));
                }
                self.types.insert(EventType::EV_LED);
                self.leds.insert(c);
            }
            (EventCode::Misc(c), EnablePayload::None) => {
                if c.0 as usize >= MSC_CNT {
                    return Err(Error::InvalidArgument("misc code out of range"));
                }
                self.types.insert(EventType::EV_MSC);
                self.misc.insert(c);
            }
            (EventCode::Sound(c), EnablePayload::None) => {
                if c.0 as usize >= SND_CNT {
                    return Err(Error::InvalidArgument("sound code out of range"));
                }
                self.types.insert(EventType::EV_SND);
                self.sounds.insert(c);
            }
            (EventCode::ForceFeedback(c), EnablePayload::None) => {
                if c.0 as usize >= crate::compat::FF_CNT {
                    return Err(Error::InvalidArgument("force feedback code out of range"));
                }
                self.types.insert(EventType::EV_FF);
                self.ff.insert(c);
            }
            (EventCode::Synchronization(_), _) | (EventCode::Other(..), _) => {
                return Err(Error::InvalidArgument("cannot enable codes of this event type"));
            }
            _ => {
                return Err(Error::InvalidArgument("payload does not match the event type"));
            }
        }
        self.queue.reserve_bound(self.sync_bound());
        Ok(())
    }

    /// Locally disables an event type. Queries for any of its codes report
    /// "absent" afterwards even though the per-code bits are retained.
    /// Disabling `EV_SYN` is rejected.
    pub fn disable_event_type(&mut self, type_: EventType) -> Result<()> {
        if type_ == EventType::EV_SYN {
            return Err(Error::InvalidArgument("EV_SYN cannot be disabled"));
        }
        if type_.0 as usize >= EV_CNT {
            return Err(Error::InvalidArgument("event type out of range"));
        }
        self.types.remove(type_);
        Ok(())
    }

    /// Locally disables a single code; the reader filters matching events.
    pub fn disable_event_code(&mut self, code: EventCode) -> Result<()> {
        match code {
            EventCode::Synchronization(_) => {
                Err(Error::InvalidArgument("EV_SYN codes cannot be disabled"))
            }
            EventCode::Key(c) if (c.0 as usize) < KEY_CNT => {
                self.keys.remove(c);
                Ok(())
            }
            EventCode::RelAxis(c) if (c.0 as usize) < REL_CNT => {
                self.rel.remove(c);
                Ok(())
            }
            EventCode::AbsAxis(c) if (c.0 as usize) < ABS_CNT => {
                self.abs.remove(c);
                Ok(())
            }
            EventCode::Switch(c) if (c.0 as usize) < SW_CNT => {
                self.switches.remove(c);
                Ok(())
            }
            EventCode::Led(c) if (c.0 as usize) < LED_CNT => {
                self.leds.remove(c);
                Ok(())
            }
            EventCode::Misc(c) if (c.0 as usize) < MSC_CNT => {
                self.misc.remove(c);
                Ok(())
            }
            EventCode::Sound(c) if (c.0 as usize) < SND_CNT => {
                self.sounds.remove(c);
                Ok(())
            }
            EventCode::ForceFeedback(c) if (c.0 as usize) < crate::compat::FF_CNT => {
                self.ff.remove(c);
                Ok(())
            }
            _ => Err(Error::InvalidArgument("code out of range for its type")),
        }
    }

    // ---- axis metadata ---------------------------------------------------

    /// The axis metadata for `code`, or `None` when the code is not marked
    /// supported.
    pub fn abs_info(&self, code: AbsoluteAxisCode) -> Option<AbsInfo> {
        if !self.has_event_code(EventCode::AbsAxis(code)) {
            return None;
        }
        Some(AbsInfo(self.state.abs_vals[code.0 as usize]))
    }

    /// Replaces the whole axis tuple on the mirror. No effect when the code
    /// is not supported; nothing reaches the kernel (see
    /// [`kernel_set_abs_info`](Device::kernel_set_abs_info)).
    pub fn set_abs_info(&mut self, code: AbsoluteAxisCode, info: &AbsInfo) {
        if self.has_event_code(EventCode::AbsAxis(code)) {
            self.state.abs_vals[code.0 as usize] = info.0;
        }
    }

    fn abs_field(&self, code: AbsoluteAxisCode, field: fn(&AbsInfo) -> i32) -> i32 {
        // Unsupported codes read as 0 rather than an error; the historical
        // contract, and it spares a branch at every call site.
        match self.abs_info(code) {
            Some(info) => field(&info),
            None => 0,
        }
    }

    fn set_abs_field(&mut self, code: AbsoluteAxisCode, value: i32, apply: fn(&mut AbsInfo, i32)) {
        if let Some(mut info) = self.abs_info(code) {
            apply(&mut info, value);
            self.state.abs_vals[code.0 as usize] = info.0;
        }
    }

    pub fn abs_minimum(&self, code: AbsoluteAxisCode) -> i32 {
        self.abs_field(code, |i| i.minimum())
    }

    pub fn abs_maximum(&self, code: AbsoluteAxisCode) -> i32 {
        self.abs_field(code, |i| i.maximum())
    }

    pub fn abs_fuzz(&self, code: AbsoluteAxisCode) -> i32 {
        self.abs_field(code, |i| i.fuzz())
    }

    pub fn abs_flat(&self, code: AbsoluteAxisCode) -> i32 {
        self.abs_field(code, |i| i.flat())
    }

    pub fn abs_resolution(&self, code: AbsoluteAxisCode) -> i32 {
        self.abs_field(code, |i| i.resolution())
    }

    pub fn set_abs_minimum(&mut self, code: AbsoluteAxisCode, value: i32) {
        self.set_abs_field(code, value, |i, v| i.0.minimum = v);
    }

    pub fn set_abs_maximum(&mut self, code: AbsoluteAxisCode, value: i32) {
        self.set_abs_field(code, value, |i, v| i.0.maximum = v);
    }

    pub fn set_abs_fuzz(&mut self, code: AbsoluteAxisCode, value: i32) {
        self.set_abs_field(code, value, |i, v| i.0.fuzz = v);
    }

    pub fn set_abs_flat(&mut self, code: AbsoluteAxisCode, value: i32) {
        self.set_abs_field(code, value, |i, v| i.0.flat = v);
    }

    pub fn set_abs_resolution(&mut self, code: AbsoluteAxisCode, value: i32) {
        self.set_abs_field(code, value, |i, v| i.0.resolution = v);
    }

    /// Writes the axis tuple to the kernel via `EVIOCSABS` and, on success,
    /// to the mirror.
    pub fn kernel_set_abs_info(&mut self, code: AbsoluteAxisCode, info: &AbsInfo) -> Result<()> {
        let fd = self.fd.ok_or(Error::NotAttached)?;
        if !self.has_event_code(EventCode::AbsAxis(code)) {
            return Err(Error::InvalidArgument("absolute axis code not enabled"));
        }
        unsafe { sys::eviocsabs(fd, code.0 as u32, &info.0) }?;
        self.state.abs_vals[code.0 as usize] = info.0;
        Ok(())
    }

    // ---- values ----------------------------------------------------------

    /// The current value of the code on the mirror, or `None` when the code
    /// is not supported. For multitouch codes of a real multitouch device
    /// this reads the currently selected slot.
    pub fn event_value(&self, code: EventCode) -> Option<i32> {
        if !self.has_event_code(code) {
            return None;
        }
        Some(match code {
            EventCode::Key(c) => self.state.key_vals.contains(c) as i32,
            EventCode::Led(c) => self.state.led_vals.contains(c) as i32,
            EventCode::Switch(c) => self.state.switch_vals.contains(c) as i32,
            EventCode::AbsAxis(axis) => match &self.state.mt {
                Some(mt) if axis == AbsoluteAxisCode::ABS_MT_SLOT => mt.current_slot(),
                Some(mt) if axis.is_multitouch() => {
                    mt.value(mt.current_slot(), axis).unwrap_or(0)
                }
                _ => self.state.abs_vals[axis.0 as usize].value,
            },
            EventCode::Repeat(RepeatCode::REP_DELAY) => self.state.repeat.delay,
            EventCode::Repeat(_) => self.state.repeat.period,
            // Relative axes and the remaining types carry no state.
            _ => 0,
        })
    }

    /// Sets the value of a code on the mirror, without clamping `EV_ABS`
    /// values to the axis range (the historical behavior: caller writes are
    /// taken verbatim).
    ///
    /// For multitouch codes of a real multitouch device the write lands in
    /// the currently selected slot, and `ABS_MT_SLOT` itself must be a
    /// valid slot index.
    pub fn set_event_value(&mut self, code: EventCode, value: i32) -> Result<()> {
        if !self.has_event_code(code) {
            return Err(Error::InvalidArgument("code not enabled on this device"));
        }
        match code {
            EventCode::Key(c) => self.state.key_vals.set(c, value != 0),
            EventCode::Led(c) => self.state.led_vals.set(c, value != 0),
            EventCode::Switch(c) => self.state.switch_vals.set(c, value != 0),
            EventCode::AbsAxis(axis) => match &mut self.state.mt {
                Some(mt) if axis == AbsoluteAxisCode::ABS_MT_SLOT => {
                    if value < 0 || value >= mt.num_slots() {
                        return Err(Error::InvalidArgument("slot out of range"));
                    }
                    mt.set_current_slot(value);
                }
                Some(mt) if axis.is_multitouch() => {
                    let slot = mt.current_slot();
                    mt.set_value(slot, axis, value);
                }
                _ => self.state.abs_vals[axis.0 as usize].value = value,
            },
            EventCode::Repeat(RepeatCode::REP_DELAY) => self.state.repeat.delay = value,
            EventCode::Repeat(_) => self.state.repeat.period = value,
            _ => {
                return Err(Error::InvalidArgument("this event type carries no value state"));
            }
        }
        Ok(())
    }

    /// The number of multitouch slots, or `None` when the device has none
    /// (including fake-multitouch devices).
    pub fn num_slots(&self) -> Option<i32> {
        self.state.mt.as_ref().map(SlotTable::num_slots)
    }

    /// The currently selected multitouch slot.
    ///
    /// This tracks processed events, which may differ from what an ioctl
    /// would report while events are still queued on the descriptor.
    pub fn current_slot(&self) -> Option<i32> {
        self.state.mt.as_ref().map(SlotTable::current_slot)
    }

    /// The value of a per-slot code in the given slot, or `None` when
    /// there is no slot table, the code is not an enabled per-slot code, or
    /// the slot is out of the tracked range.
    pub fn slot_value(&self, slot: i32, code: AbsoluteAxisCode) -> Option<i32> {
        let mt = self.state.mt.as_ref()?;
        if !self.has_event_code(EventCode::AbsAxis(code)) || code.0 < MT_CODE_FIRST {
            return None;
        }
        mt.value(slot, code)
    }

    /// Sets a per-slot value on the mirror.
    pub fn set_slot_value(&mut self, slot: i32, code: AbsoluteAxisCode, value: i32) -> Result<()> {
        if code.0 < MT_CODE_FIRST || code.0 > AbsoluteAxisCode::MAX {
            return Err(Error::InvalidArgument("not a per-slot multitouch code"));
        }
        if !self.has_event_code(EventCode::AbsAxis(code)) {
            return Err(Error::InvalidArgument("code not enabled on this device"));
        }
        let mt = self
            .state
            .mt
            .as_mut()
            .ok_or(Error::InvalidArgument("device has no multitouch slots"))?;
        if !mt.set_value(slot, code, value) {
            return Err(Error::InvalidArgument("slot out of range"));
        }
        Ok(())
    }

    /// The autorepeat pair, meaningful when `EV_REP` is supported.
    pub fn key_repeat(&self) -> KeyRepeat {
        self.state.repeat
    }

    // ---- kernel-effecting operations ------------------------------------

    /// Takes or releases the kernel-level exclusive subscription on the
    /// descriptor. Repeating the current mode is a no-op success; only one
    /// handle per descriptor can hold the grab (the kernel enforces this,
    /// and the resulting error is surfaced).
    pub fn grab(&mut self, mode: GrabMode) -> Result<()> {
        let fd = self.fd.ok_or(Error::NotAttached)?;
        match mode {
            GrabMode::Grab if !self.grabbed => {
                unsafe { sys::eviocgrab(fd, 1) }?;
                self.grabbed = true;
            }
            GrabMode::Ungrab if self.grabbed => {
                unsafe { sys::eviocgrab(fd, 0) }?;
                self.grabbed = false;
            }
            _ => {}
        }
        Ok(())
    }

    /// Selects the clock future event timestamps are read in. Only
    /// meaningful before events are read; earlier events keep whatever
    /// timebase they were stamped with.
    pub fn set_clock_id(&mut self, clock: ClockId) -> Result<()> {
        if let Some(fd) = self.fd {
            self.apply_clock_id(fd, clock)?;
        }
        self.clock_id = clock;
        Ok(())
    }

    fn apply_clock_id(&self, fd: RawFd, clock: ClockId) -> Result<()> {
        let raw = clock.raw();
        unsafe { sys::eviocsclockid(fd, &raw) }.map_err(|err| match err {
            nix::Error::EINVAL | nix::Error::ENOTTY => Error::NotSupported,
            other => Error::Nix(other),
        })?;
        Ok(())
    }

    /// Turns one LED on or off on the actual device.
    pub fn kernel_set_led_value(&mut self, code: LedCode, value: LedState) -> Result<()> {
        self.kernel_set_led_values(&[(code, value)])
    }

    /// Batched LED write: all pairs are validated before anything is
    /// written, so one bad pair aborts the whole batch. The events are
    /// written as a single frame terminated by `SYN_REPORT`.
    pub fn kernel_set_led_values(&mut self, values: &[(LedCode, LedState)]) -> Result<()> {
        let fd = self.fd.ok_or(Error::NotAttached)?;
        if values.is_empty() {
            return Ok(());
        }
        for (code, _) in values {
            if !self.has_event_code(EventCode::Led(*code)) {
                return Err(Error::InvalidArgument("LED code not enabled on this device"));
            }
        }

        let time = systime_to_timeval(&SystemTime::now());
        let mut frame: Vec<input_event> = Vec::with_capacity(values.len() + 1);
        for (code, value) in values {
            frame.push(input_event {
                time,
                type_: EventType::EV_LED.0,
                code: code.0,
                value: value.value(),
            });
        }
        frame.push(input_event {
            time,
            type_: EventType::EV_SYN.0,
            code: SynchronizationCode::SYN_REPORT.0,
            value: 0,
        });

        let bytes = frame.len() * mem::size_of::<input_event>();
        let res = unsafe { libc::write(fd, frame.as_ptr() as *const libc::c_void, bytes) };
        if res < 0 {
            return Err(Error::Io(io::Error::last_os_error()));
        }
        if res as usize != bytes {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::WriteZero,
                "short write to event descriptor",
            )));
        }
        for (code, value) in values {
            self.state.led_vals.set(*code, *value == LedState::On);
        }
        Ok(())
    }

    // ---- the reader ------------------------------------------------------

    /// The streaming operation. See [`ReadFlag`] for the mode selection;
    /// exactly one of `NORMAL`, `SYNC`, `FORCE_SYNC` must be set.
    ///
    /// Normal mode returns `(Success, event)` per device event, in kernel
    /// order, filtering disabled types and codes. When a `SYN_DROPPED` is
    /// read, the kernel state is snapshotted, the difference against the
    /// mirror is queued as synthesized events, and `(Sync, the SYN_DROPPED
    /// event)` is returned: the caller should now drain with `SYNC` until
    /// [`Error::WouldBlock`], receiving `(Sync, event)` for every delta
    /// event. A caller that goes back to `NORMAL` early discards the rest
    /// of the delta; the mirror is fast-forwarded to the snapshot either
    /// way.
    ///
    /// `FORCE_SYNC` starts the same procedure without a `SYN_DROPPED`,
    /// returning `(Sync, _)` with an event the caller must not inspect; the
    /// queued delta always ends with (at least) a `SYN_REPORT`.
    pub fn next_event(&mut self, flags: ReadFlag) -> Result<(ReadStatus, InputEvent)> {
        let mode = flags.intersection(ReadFlag::NORMAL | ReadFlag::SYNC | ReadFlag::FORCE_SYNC);
        if mode.bits().count_ones() != 1 {
            return Err(Error::InvalidArgument(
                "exactly one of NORMAL, SYNC and FORCE_SYNC must be set",
            ));
        }
        let fd = self.fd.ok_or(Error::NotAttached)?;

        if mode == ReadFlag::FORCE_SYNC {
            self.reader = ReaderState::ForcedSyncPending;
            let time = systime_to_timeval(&SystemTime::now());
            match self.start_sync(fd, time) {
                Ok(()) => {
                    self.reader = ReaderState::Sync;
                    // The returned event is unspecified by contract.
                    Ok((
                        ReadStatus::Sync,
                        InputEvent::with_time(
                            time,
                            EventType::EV_SYN,
                            SynchronizationCode::SYN_REPORT.0,
                            0,
                        ),
                    ))
                }
                Err(err) => {
                    self.reader = ReaderState::Normal;
                    Err(err)
                }
            }
        } else if mode == ReadFlag::SYNC {
            match self.queue.pop() {
                Some(ev) => {
                    // The mirror advances event by event as the delta is
                    // drained, not in one jump at sync start.
                    self.state.process_event(&ev);
                    Ok((ReadStatus::Sync, ev))
                }
                None => {
                    if self.reader == ReaderState::Sync {
                        self.finish_sync();
                    }
                    Err(Error::WouldBlock)
                }
            }
        } else {
            if self.reader == ReaderState::Sync {
                // Abandoned sync: drop the rest of the delta and jump to the
                // snapshot before the next real event is returned.
                self.queue.clear();
                self.finish_sync();
            }
            loop {
                let ev = self.read_one(fd)?;
                if ev.is_syn_dropped() {
                    let time = ev.time();
                    self.start_sync(fd, time)?;
                    self.reader = ReaderState::Sync;
                    return Ok((ReadStatus::Sync, ev));
                }
                if !self.wants_event(&ev) {
                    continue;
                }
                self.state.process_event(&ev);
                return Ok((ReadStatus::Success, ev));
            }
        }
    }

    fn read_one(&self, fd: RawFd) -> Result<InputEvent> {
        let mut ev = MaybeUninit::<input_event>::uninit();
        let res = unsafe {
            libc::read(
                fd,
                ev.as_mut_ptr() as *mut libc::c_void,
                mem::size_of::<input_event>(),
            )
        };
        if res < 0 {
            let err = io::Error::last_os_error();
            return Err(match err.raw_os_error() {
                Some(libc::EAGAIN) => Error::WouldBlock,
                _ => Error::Io(err),
            });
        }
        if res as usize != mem::size_of::<input_event>() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "short read from event descriptor",
            )));
        }
        Ok(InputEvent(unsafe { ev.assume_init() }))
    }

    /// Disabled types and codes never reach the caller or the mirror.
    fn wants_event(&self, ev: &InputEvent) -> bool {
        let type_ = ev.event_type();
        if type_ == EventType::EV_SYN {
            return true;
        }
        if !self.types.contains(type_) {
            return false;
        }
        match ev.event_code() {
            EventCode::Key(c) => self.keys.contains(c),
            EventCode::RelAxis(c) => self.rel.contains(c),
            EventCode::AbsAxis(c) => self.abs.contains(c),
            EventCode::Misc(c) => self.misc.contains(c),
            EventCode::Switch(c) => self.switches.contains(c),
            EventCode::Led(c) => self.leds.contains(c),
            EventCode::Sound(c) => self.sounds.contains(c),
            EventCode::ForceFeedback(c) => self.ff.contains(c),
            EventCode::Repeat(c) => c.0 <= RepeatCode::MAX,
            EventCode::Synchronization(_) | EventCode::Other(..) => true,
        }
    }

    /// Snapshots the kernel state, queues the delta and remembers the
    /// snapshot. On failure nothing stays queued and the mirror is left on
    /// whatever the partial refresh captured.
    fn start_sync(&mut self, fd: RawFd, time: libc::timeval) -> Result<()> {
        let mut next = self.state.clone();
        match self.refresh_state(fd, &mut next) {
            Ok(()) => {
                self.queue.clear();
                let caps = SyncCaps {
                    types: &self.types,
                    keys: &self.keys,
                    leds: &self.leds,
                    switches: &self.switches,
                    abs: &self.abs,
                };
                push_delta(&caps, &self.state, &next, time, &mut self.queue);
                self.pending = Some(next);
                Ok(())
            }
            Err(err) => {
                self.queue.clear();
                self.state = next;
                self.pending = None;
                Err(err)
            }
        }
    }

    /// Fast-forwards the mirror to the pending snapshot and returns the
    /// reader to normal mode.
    fn finish_sync(&mut self) {
        if let Some(snapshot) = self.pending.take() {
            self.state = snapshot;
        }
        self.reader = ReaderState::Normal;
    }

    /// Re-reads the kernel value state into `next` with the same ioctls the
    /// initializer uses, minus identity and name.
    fn refresh_state(&mut self, fd: RawFd, next: &mut DeviceState) -> Result<()> {
        #[cfg(test)]
        if let Some(snapshot) = &self.test_snapshot {
            *next = snapshot.clone();
            return Ok(());
        }
        if self.types.contains(EventType::EV_KEY) {
            unsafe { sys::eviocgkey(fd, next.key_vals.as_mut_raw_slice()) }?;
        }
        if self.types.contains(EventType::EV_LED) {
            unsafe { sys::eviocgled(fd, next.led_vals.as_mut_raw_slice()) }?;
        }
        if self.types.contains(EventType::EV_SW) {
            unsafe { sys::eviocgsw(fd, next.switch_vals.as_mut_raw_slice()) }?;
        }
        if self.types.contains(EventType::EV_ABS) {
            for axis in self.abs.iter() {
                if next.mt.is_some()
                    && axis.is_multitouch()
                    && axis != AbsoluteAxisCode::ABS_MT_SLOT
                {
                    continue;
                }
                unsafe {
                    sys::eviocgabs(fd, axis.0 as u32, &mut next.abs_vals[axis.0 as usize])
                }?;
            }
            if let Some(mt) = &mut next.mt {
                let kernel_slot = next.abs_vals[AbsoluteAxisCode::ABS_MT_SLOT.0 as usize].value;
                mt.set_current_slot(kernel_slot.clamp(0, (mt.num_slots() - 1).max(0)));
                let tracked = mt.tracked_slots() as usize;
                let mut buf = vec![0i32; tracked + 1];
                for code in self.abs.iter().filter(|c| c.0 >= MT_CODE_FIRST) {
                    buf[0] = code.0 as i32;
                    unsafe { sys::eviocgmtslots(fd, &mut buf) }?;
                    for slot in 0..tracked {
                        mt.set_value(slot as i32, code, buf[slot + 1]);
                    }
                }
            }
        }
        Ok(())
    }

    /// Worst-case length of one sync delta: every supported code changing
    /// once, one slot marker per tracked slot, and the report.
    fn sync_bound(&self) -> usize {
        let mut bound =
            self.keys.len() + self.leds.len() + self.switches.len() + self.abs.len() + 2;
        if let Some(mt) = &self.state.mt {
            let per_slot_codes = self.abs.iter().filter(|c| c.0 >= MT_CODE_FIRST).count();
            bound += mt.tracked_slots() as usize * (per_slot_codes + 1);
        }
        bound
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}:", self.name().unwrap_or("Unnamed device"))?;
        if let Some(phys) = self.physical_path() {
            writeln!(f, "  Physical address: {:?}", phys)?;
        }
        if let Some(uniq) = self.unique_name() {
            writeln!(f, "  Unique name: {:?}", uniq)?;
        }
        let id = self.input_id();
        writeln!(f, "  Bus: {:#x}", id.bustype())?;
        writeln!(f, "  Vendor: {:#x}", id.vendor())?;
        writeln!(f, "  Product: {:#x}", id.product())?;
        writeln!(f, "  Version: {:#x}", id.version())?;
        writeln!(f, "  Properties: {:?}", self.properties())?;
        writeln!(f, "  Event types: {:?}", self.supported_events())?;
        if self.has_event_type(EventType::EV_KEY) {
            writeln!(f, "  Keys: {:?}", self.supported_keys())?;
        }
        if self.has_event_type(EventType::EV_REL) {
            writeln!(f, "  Relative axes: {:?}", self.supported_relative_axes())?;
        }
        if self.has_event_type(EventType::EV_ABS) {
            writeln!(f, "  Absolute axes:")?;
            for axis in self.supported_absolute_axes().iter() {
                writeln!(f, "    {:?} ({:?})", axis, self.abs_info(axis))?;
            }
        }
        if self.has_event_type(EventType::EV_SW) {
            writeln!(f, "  Switches: {:?}", self.supported_switches())?;
        }
        if self.has_event_type(EventType::EV_LED) {
            writeln!(f, "  LEDs: {:?}", self.supported_leds())?;
        }
        if let Some(slots) = self.num_slots() {
            writeln!(f, "  Multitouch slots: {}", slots)?;
        }
        Ok(())
    }
}

/// Fetches one of the identity strings (name, phys, uniq). A failing ioctl
/// and an empty string both come back as `None`; phys and uniq are optional
/// on many devices.
fn read_identity_string(
    fd: RawFd,
    ioctl: unsafe fn(RawFd, &mut [u8]) -> nix::Result<libc::c_int>,
) -> Option<String> {
    let mut buf = [0u8; 256];
    let written = unsafe { ioctl(fd, &mut buf) }.ok()?;
    if written <= 0 {
        return None;
    }
    // The ioctl reports how many bytes it wrote, counting the terminating
    // NUL; stop at the NUL regardless of what it claims.
    let len = (written as usize).min(buf.len());
    let text = match buf[..len].iter().position(|&b| b == 0) {
        Some(nul) => &buf[..nul],
        None => &buf[..len],
    };
    if text.is_empty() {
        return None;
    }
    Some(String::from_utf8_lossy(text).into_owned())
}

#[cfg(test)]
impl Device {
    /// Wires a descriptor without probing, so reader tests can run over a
    /// pipe instead of a real evdev node.
    pub(crate) fn attach_for_test(&mut self, fd: RawFd) {
        self.queue.reserve_bound(self.sync_bound());
        self.fd = Some(fd);
    }

    /// Replaces the kernel-snapshot step of the sync engine.
    pub(crate) fn set_test_snapshot(&mut self, snapshot: DeviceState) {
        self.test_snapshot = Some(snapshot);
    }

    pub(crate) fn cloned_state(&self) -> DeviceState {
        self.state.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    struct Pipe {
        read: RawFd,
        write: RawFd,
    }

    impl Pipe {
        fn new_nonblocking() -> Pipe {
            let mut fds = [0 as libc::c_int; 2];
            assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
            unsafe { libc::fcntl(fds[0], libc::F_SETFL, libc::O_NONBLOCK) };
            Pipe {
                read: fds[0],
                write: fds[1],
            }
        }

        fn send(&self, events: &[InputEvent]) {
            let bytes = events.len() * size_of::<input_event>();
            let res =
                unsafe { libc::write(self.write, events.as_ptr() as *const libc::c_void, bytes) };
            assert_eq!(res as usize, bytes);
        }
    }

    impl Drop for Pipe {
        fn drop(&mut self) {
            unsafe {
                libc::close(self.read);
                libc::close(self.write);
            }
        }
    }

    fn ev(type_: EventType, code: u16, value: i32) -> InputEvent {
        InputEvent::new(type_, code, value)
    }

    fn report() -> InputEvent {
        ev(EventType::EV_SYN, SynchronizationCode::SYN_REPORT.0, 0)
    }

    fn dropped_at(tv_sec: libc::time_t) -> InputEvent {
        InputEvent::with_time(
            libc::timeval { tv_sec, tv_usec: 0 },
            EventType::EV_SYN,
            SynchronizationCode::SYN_DROPPED.0,
            0,
        )
    }

    fn keyboard() -> (Device, Pipe) {
        let pipe = Pipe::new_nonblocking();
        let mut dev = Device::new();
        dev.enable_event_code(EventCode::Key(KeyCode::KEY_A), EnablePayload::None)
            .unwrap();
        dev.enable_event_code(EventCode::Key(KeyCode::KEY_B), EnablePayload::None)
            .unwrap();
        dev.attach_for_test(pipe.read);
        (dev, pipe)
    }

    fn drain_sync(dev: &mut Device) -> Vec<(u16, u16, i32)> {
        let mut out = Vec::new();
        loop {
            match dev.next_event(ReadFlag::SYNC) {
                Ok((status, ev)) => {
                    assert_eq!(status, ReadStatus::Sync);
                    out.push((ev.event_type().0, ev.code(), ev.value()));
                }
                Err(Error::WouldBlock) => break,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        out
    }

    #[test]
    fn keyboard_single_key() {
        let (mut dev, pipe) = keyboard();
        pipe.send(&[ev(EventType::EV_KEY, KeyCode::KEY_A.0, 1), report()]);

        let (status, first) = dev.next_event(ReadFlag::NORMAL).unwrap();
        assert_eq!(status, ReadStatus::Success);
        assert_eq!(first.event_code(), EventCode::Key(KeyCode::KEY_A));
        assert_eq!(first.value(), 1);
        assert_eq!(dev.event_value(EventCode::Key(KeyCode::KEY_A)), Some(1));

        let (status, second) = dev.next_event(ReadFlag::NORMAL).unwrap();
        assert_eq!(status, ReadStatus::Success);
        assert_eq!(
            second.event_code(),
            EventCode::Synchronization(SynchronizationCode::SYN_REPORT)
        );

        assert!(matches!(
            dev.next_event(ReadFlag::NORMAL),
            Err(Error::WouldBlock)
        ));
    }

    #[test]
    fn next_event_requires_exactly_one_mode() {
        let (mut dev, _pipe) = keyboard();
        assert!(matches!(
            dev.next_event(ReadFlag::NORMAL | ReadFlag::SYNC),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            dev.next_event(ReadFlag::BLOCKING),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn next_event_requires_attachment() {
        let mut dev = Device::new();
        assert!(matches!(
            dev.next_event(ReadFlag::NORMAL),
            Err(Error::NotAttached)
        ));
    }

    #[test]
    fn disabled_code_is_filtered() {
        let (mut dev, pipe) = keyboard();
        dev.enable_event_code(EventCode::RelAxis(RelativeAxisCode::REL_X), EnablePayload::None)
            .unwrap();
        dev.disable_event_code(EventCode::RelAxis(RelativeAxisCode::REL_X))
            .unwrap();

        pipe.send(&[
            ev(EventType::EV_REL, RelativeAxisCode::REL_X.0, 3),
            ev(EventType::EV_KEY, KeyCode::KEY_A.0, 1),
        ]);
        let (_, first) = dev.next_event(ReadFlag::NORMAL).unwrap();
        assert_eq!(first.event_code(), EventCode::Key(KeyCode::KEY_A));
    }

    #[test]
    fn disabled_type_is_filtered() {
        let (mut dev, pipe) = keyboard();
        dev.enable_event_code(EventCode::RelAxis(RelativeAxisCode::REL_X), EnablePayload::None)
            .unwrap();
        dev.disable_event_type(EventType::EV_REL).unwrap();

        pipe.send(&[ev(EventType::EV_REL, RelativeAxisCode::REL_X.0, 3)]);
        assert!(matches!(
            dev.next_event(ReadFlag::NORMAL),
            Err(Error::WouldBlock)
        ));
    }

    #[test]
    fn dropped_triggers_sync_and_replays_key_delta() {
        let (mut dev, pipe) = keyboard();

        // The client believes KEY_A is down.
        pipe.send(&[ev(EventType::EV_KEY, KeyCode::KEY_A.0, 1), report()]);
        dev.next_event(ReadFlag::NORMAL).unwrap();
        dev.next_event(ReadFlag::NORMAL).unwrap();

        // Meanwhile the kernel says: A up, B down.
        let mut snapshot = dev.cloned_state();
        snapshot.key_vals.remove(KeyCode::KEY_A);
        snapshot.key_vals.insert(KeyCode::KEY_B);
        dev.set_test_snapshot(snapshot);

        pipe.send(&[dropped_at(99)]);
        let (status, ev) = dev.next_event(ReadFlag::NORMAL).unwrap();
        assert_eq!(status, ReadStatus::Sync);
        assert!(ev.is_syn_dropped());

        // The mirror advances per drained event.
        let (_, first) = dev.next_event(ReadFlag::SYNC).unwrap();
        assert_eq!(first.event_code(), EventCode::Key(KeyCode::KEY_A));
        assert_eq!(first.value(), 0);
        assert_eq!(first.time().tv_sec, 99);
        assert_eq!(dev.event_value(EventCode::Key(KeyCode::KEY_A)), Some(0));
        assert_eq!(dev.event_value(EventCode::Key(KeyCode::KEY_B)), Some(0));

        let (_, second) = dev.next_event(ReadFlag::SYNC).unwrap();
        assert_eq!(second.event_code(), EventCode::Key(KeyCode::KEY_B));
        assert_eq!(second.value(), 1);
        assert_eq!(dev.event_value(EventCode::Key(KeyCode::KEY_B)), Some(1));

        let (_, last) = dev.next_event(ReadFlag::SYNC).unwrap();
        assert_eq!(
            last.event_code(),
            EventCode::Synchronization(SynchronizationCode::SYN_REPORT)
        );
        assert!(matches!(
            dev.next_event(ReadFlag::SYNC),
            Err(Error::WouldBlock)
        ));

        // Fully drained: the mirror equals the snapshot.
        assert_eq!(dev.event_value(EventCode::Key(KeyCode::KEY_A)), Some(0));
        assert_eq!(dev.event_value(EventCode::Key(KeyCode::KEY_B)), Some(1));
    }

    #[test]
    fn abandoned_sync_fast_forwards() {
        let (mut dev, pipe) = keyboard();

        let mut snapshot = dev.cloned_state();
        snapshot.key_vals.insert(KeyCode::KEY_B);
        dev.set_test_snapshot(snapshot);

        pipe.send(&[dropped_at(5)]);
        let (status, _) = dev.next_event(ReadFlag::NORMAL).unwrap();
        assert_eq!(status, ReadStatus::Sync);

        // Going straight back to normal mode discards the queue but still
        // lands the mirror on the snapshot.
        assert!(matches!(
            dev.next_event(ReadFlag::NORMAL),
            Err(Error::WouldBlock)
        ));
        assert_eq!(dev.event_value(EventCode::Key(KeyCode::KEY_B)), Some(1));
        assert!(matches!(
            dev.next_event(ReadFlag::SYNC),
            Err(Error::WouldBlock)
        ));
    }

    #[test]
    fn forced_sync_emits_at_least_the_report() {
        let (mut dev, _pipe) = keyboard();
        dev.set_test_snapshot(dev.cloned_state());

        let (status, _) = dev.next_event(ReadFlag::FORCE_SYNC).unwrap();
        assert_eq!(status, ReadStatus::Sync);

        let (status, ev) = dev.next_event(ReadFlag::SYNC).unwrap();
        assert_eq!(status, ReadStatus::Sync);
        assert_eq!(
            ev.event_code(),
            EventCode::Synchronization(SynchronizationCode::SYN_REPORT)
        );
        assert!(matches!(
            dev.next_event(ReadFlag::SYNC),
            Err(Error::WouldBlock)
        ));
    }

    #[test]
    fn sync_idempotence() {
        let (mut dev, pipe) = keyboard();

        let mut snapshot = dev.cloned_state();
        snapshot.key_vals.insert(KeyCode::KEY_A);
        dev.set_test_snapshot(snapshot);

        pipe.send(&[dropped_at(1)]);
        dev.next_event(ReadFlag::NORMAL).unwrap();
        assert_eq!(drain_sync(&mut dev).len(), 2);

        // Same kernel state again: the second delta is only the report.
        dev.next_event(ReadFlag::FORCE_SYNC).unwrap();
        assert_eq!(
            drain_sync(&mut dev),
            vec![(EventType::EV_SYN.0, SynchronizationCode::SYN_REPORT.0, 0)]
        );
    }

    fn touch_device() -> (Device, Pipe) {
        let pipe = Pipe::new_nonblocking();
        let mut dev = Device::new();
        dev.enable_event_code(
            EventCode::AbsAxis(AbsoluteAxisCode::ABS_MT_SLOT),
            EnablePayload::AbsInfo(AbsInfo::new(0, 1)),
        )
        .unwrap();
        dev.enable_event_code(
            EventCode::AbsAxis(AbsoluteAxisCode::ABS_MT_POSITION_X),
            EnablePayload::AbsInfo(AbsInfo::new(0, 4000)),
        )
        .unwrap();
        dev.enable_event_code(
            EventCode::AbsAxis(AbsoluteAxisCode::ABS_MT_TRACKING_ID),
            EnablePayload::AbsInfo(AbsInfo::new(-1, 65535)),
        )
        .unwrap();
        dev.attach_for_test(pipe.read);
        (dev, pipe)
    }

    #[test]
    fn slot_events_route_to_the_selected_slot() {
        let (mut dev, pipe) = touch_device();
        assert_eq!(dev.num_slots(), Some(2));

        pipe.send(&[
            ev(EventType::EV_ABS, AbsoluteAxisCode::ABS_MT_SLOT.0, 1),
            ev(EventType::EV_ABS, AbsoluteAxisCode::ABS_MT_POSITION_X.0, 640),
            report(),
        ]);
        for _ in 0..3 {
            dev.next_event(ReadFlag::NORMAL).unwrap();
        }

        assert_eq!(dev.current_slot(), Some(1));
        assert_eq!(
            dev.slot_value(1, AbsoluteAxisCode::ABS_MT_POSITION_X),
            Some(640)
        );
        assert_eq!(
            dev.slot_value(0, AbsoluteAxisCode::ABS_MT_POSITION_X),
            Some(0)
        );
        // The current-slot view through the plain value getter.
        assert_eq!(
            dev.event_value(EventCode::AbsAxis(AbsoluteAxisCode::ABS_MT_POSITION_X)),
            Some(640)
        );
        assert_eq!(
            dev.event_value(EventCode::AbsAxis(AbsoluteAxisCode::ABS_MT_SLOT)),
            Some(1)
        );
    }

    #[test]
    fn mt_resync_replays_slot_state() {
        let (mut dev, pipe) = touch_device();

        // No contact in either slot before the drop.
        dev.set_slot_value(0, AbsoluteAxisCode::ABS_MT_TRACKING_ID, -1)
            .unwrap();
        dev.set_slot_value(1, AbsoluteAxisCode::ABS_MT_TRACKING_ID, -1)
            .unwrap();

        let mut snapshot = dev.cloned_state();
        {
            let mt = snapshot.mt.as_mut().unwrap();
            mt.set_value(0, AbsoluteAxisCode::ABS_MT_POSITION_X, 150);
            mt.set_value(1, AbsoluteAxisCode::ABS_MT_TRACKING_ID, 17);
            mt.set_value(1, AbsoluteAxisCode::ABS_MT_POSITION_X, 200);
        }
        dev.set_test_snapshot(snapshot);

        pipe.send(&[dropped_at(7)]);
        dev.next_event(ReadFlag::NORMAL).unwrap();
        let delta = drain_sync(&mut dev);

        assert_eq!(
            delta,
            vec![
                (EventType::EV_ABS.0, AbsoluteAxisCode::ABS_MT_SLOT.0, 0),
                (EventType::EV_ABS.0, AbsoluteAxisCode::ABS_MT_POSITION_X.0, 150),
                (EventType::EV_ABS.0, AbsoluteAxisCode::ABS_MT_SLOT.0, 1),
                (EventType::EV_ABS.0, AbsoluteAxisCode::ABS_MT_TRACKING_ID.0, 17),
                (EventType::EV_ABS.0, AbsoluteAxisCode::ABS_MT_POSITION_X.0, 200),
                (EventType::EV_SYN.0, SynchronizationCode::SYN_REPORT.0, 0),
            ]
        );
        assert_eq!(
            dev.slot_value(0, AbsoluteAxisCode::ABS_MT_POSITION_X),
            Some(150)
        );
        assert_eq!(
            dev.slot_value(1, AbsoluteAxisCode::ABS_MT_TRACKING_ID),
            Some(17)
        );
    }

    #[test]
    fn set_event_value_validates_the_slot_index() {
        let (mut dev, _pipe) = touch_device();
        assert!(dev
            .set_event_value(EventCode::AbsAxis(AbsoluteAxisCode::ABS_MT_SLOT), 1)
            .is_ok());
        assert_eq!(dev.current_slot(), Some(1));
        assert!(matches!(
            dev.set_event_value(EventCode::AbsAxis(AbsoluteAxisCode::ABS_MT_SLOT), 2),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            dev.set_event_value(EventCode::AbsAxis(AbsoluteAxisCode::ABS_MT_SLOT), -1),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn fake_mt_devices_report_no_slots() {
        let mut dev = Device::new();
        dev.enable_event_code(
            EventCode::AbsAxis(AbsoluteAxisCode(AbsoluteAxisCode::ABS_MT_SLOT.0 - 1)),
            EnablePayload::AbsInfo(AbsInfo::new(0, 100)),
        )
        .unwrap();
        dev.enable_event_code(
            EventCode::AbsAxis(AbsoluteAxisCode::ABS_MT_SLOT),
            EnablePayload::AbsInfo(AbsInfo::new(0, 1)),
        )
        .unwrap();
        dev.enable_event_code(
            EventCode::AbsAxis(AbsoluteAxisCode::ABS_MT_POSITION_X),
            EnablePayload::AbsInfo(AbsInfo::new(0, 4000)),
        )
        .unwrap();

        assert_eq!(dev.num_slots(), None);
        assert_eq!(dev.current_slot(), None);

        // MT axes behave like ordinary shared axes.
        dev.set_event_value(
            EventCode::AbsAxis(AbsoluteAxisCode::ABS_MT_POSITION_X),
            123,
        )
        .unwrap();
        assert_eq!(
            dev.event_value(EventCode::AbsAxis(AbsoluteAxisCode::ABS_MT_POSITION_X)),
            Some(123)
        );
        assert!(dev
            .set_slot_value(0, AbsoluteAxisCode::ABS_MT_POSITION_X, 1)
            .is_err());
    }

    #[test]
    fn set_event_value_does_not_clamp_abs() {
        let mut dev = Device::new();
        dev.enable_event_code(
            EventCode::AbsAxis(AbsoluteAxisCode::ABS_X),
            EnablePayload::AbsInfo(AbsInfo::new(-100, 100)),
        )
        .unwrap();
        dev.set_event_value(EventCode::AbsAxis(AbsoluteAxisCode::ABS_X), 5000)
            .unwrap();
        assert_eq!(
            dev.event_value(EventCode::AbsAxis(AbsoluteAxisCode::ABS_X)),
            Some(5000)
        );
    }

    #[test]
    fn value_getters_shadow_processed_events() {
        let (mut dev, pipe) = keyboard();
        dev.enable_event_code(
            EventCode::Switch(SwitchCode::SW_LID),
            EnablePayload::None,
        )
        .unwrap();
        pipe.send(&[
            ev(EventType::EV_KEY, KeyCode::KEY_B.0, 1),
            ev(EventType::EV_SW, SwitchCode::SW_LID.0, 1),
            report(),
        ]);
        for _ in 0..3 {
            dev.next_event(ReadFlag::NORMAL).unwrap();
        }
        assert_eq!(dev.event_value(EventCode::Key(KeyCode::KEY_B)), Some(1));
        assert_eq!(dev.event_value(EventCode::Switch(SwitchCode::SW_LID)), Some(1));
    }

    #[test]
    fn grab_and_clock_require_attachment() {
        let mut dev = Device::new();
        assert!(matches!(dev.grab(GrabMode::Grab), Err(Error::NotAttached)));
        // Recording a clock without a descriptor is fine; it applies at
        // attach time.
        dev.set_clock_id(ClockId::Monotonic).unwrap();
    }

    #[test]
    fn attach_twice_fails() {
        let (mut dev, pipe) = keyboard();
        assert!(matches!(dev.attach(pipe.write), Err(Error::AlreadyAttached)));
    }

    #[test]
    fn attach_rejects_non_evdev_descriptors() {
        let pipe = Pipe::new_nonblocking();
        let mut dev = Device::new();
        assert!(matches!(
            dev.attach(pipe.read),
            Err(Error::NotAnEvdevDevice(_))
        ));
    }
}
