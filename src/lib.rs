//! A userspace mirror of Linux evdev device state.
//!
//! This crate mediates access to the kernel's generic input interface
//! (`/dev/input/event*`). It keeps a queryable, locally mutable model of one
//! device — identity, supported event types and codes, per-axis metadata,
//! key/LED/switch state and multitouch slots — and offers a single streaming
//! operation, [`Device::next_event`], that updates the model from the event
//! stream.
//!
//! Its central responsibility is recovering from kernel-side event loss:
//! when the kernel signals `SYN_DROPPED`, the library snapshots the real
//! device state, computes the difference against the cached model and
//! replays it to the caller as a sequence of synthesized events, so client
//! state machines never observe an inconsistent device.
//!
//! The file descriptor is owned by the caller: opened, configured
//! (non-)blocking, and closed outside this crate.
//!
//! ```no_run
//! use evmirror::{Device, ReadFlag};
//! use std::os::unix::io::IntoRawFd;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let fd = std::fs::File::open("/dev/input/event0")?.into_raw_fd();
//! let mut dev = Device::new();
//! dev.attach(fd)?;
//! loop {
//!     match dev.next_event(ReadFlag::NORMAL | ReadFlag::BLOCKING) {
//!         Ok((status, ev)) => println!("{status:?}: {ev:?}"),
//!         Err(evmirror::Error::WouldBlock) => continue,
//!         Err(err) => return Err(err.into()),
//!     }
//! }
//! # }
//! ```

#[macro_use]
mod attribute_set;
#[macro_use]
mod logging;

mod abs_info;
mod compat;
mod constants;
mod device;
mod device_state;
mod error;
mod event;
mod input_id;
mod queue;
mod slot;
mod sync;
mod sys;

pub use abs_info::AbsInfo;
pub use attribute_set::{ArrayedEvdevEnum, AttributeSet, EvdevEnum};
pub use constants::{
    AbsoluteAxisCode, EventType, FFEffectCode, KeyCode, LedCode, MiscCode, PropType,
    RelativeAxisCode, RepeatCode, SoundCode, SwitchCode, SynchronizationCode,
};
pub use device::{
    ClockId, Device, EnablePayload, GrabMode, LedState, ReadFlag, ReadStatus,
};
pub use device_state::KeyRepeat;
pub use error::{Error, Result};
pub use event::{EventCode, InputEvent};
pub use input_id::InputId;
pub use logging::{
    bridge_to_log, log_priority, set_log_handler, set_log_priority, LogHandler, LogPriority,
};
pub use slot::MAX_MT_SLOTS;
