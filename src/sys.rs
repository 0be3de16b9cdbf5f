use crate::compat::{input_absinfo, input_id};
use nix::{
    convert_ioctl_res, ioctl_read, ioctl_read_buf, ioctl_write_int, ioctl_write_ptr,
    request_code_read, request_code_write,
};

ioctl_read!(eviocgversion, b'E', 0x01, ::libc::c_int);
ioctl_read!(eviocgid, b'E', 0x02, input_id);
ioctl_read!(eviocgrep, b'E', 0x03, [::libc::c_uint; 2]);

ioctl_read_buf!(eviocgname, b'E', 0x06, u8);
ioctl_read_buf!(eviocgphys, b'E', 0x07, u8);
ioctl_read_buf!(eviocguniq, b'E', 0x08, u8);
ioctl_read_buf!(eviocgprop, b'E', 0x09, u8);
ioctl_read_buf!(eviocgmtslots, b'E', 0x0a, i32);
ioctl_read_buf!(eviocgkey, b'E', 0x18, u8);
ioctl_read_buf!(eviocgled, b'E', 0x19, u8);
ioctl_read_buf!(eviocgsw, b'E', 0x1b, u8);

ioctl_write_int!(eviocgrab, b'E', 0x90);
ioctl_write_ptr!(eviocsclockid, b'E', 0xa0, ::libc::c_int);

macro_rules! eviocgbit_ioctl {
    ($mac:ident!($name:ident, $ev:ident, $ty:ty)) => {
        eviocgbit_ioctl!($mac!($name, $crate::EventType::$ev.0, $ty));
    };
    ($mac:ident!($name:ident, $ev:expr, $ty:ty)) => {
        $mac!($name, b'E', 0x20 + $ev, $ty);
    };
}

eviocgbit_ioctl!(ioctl_read_buf!(eviocgbit_type, 0, u8));
eviocgbit_ioctl!(ioctl_read_buf!(eviocgbit_key, EV_KEY, u8));
eviocgbit_ioctl!(ioctl_read_buf!(eviocgbit_relative, EV_REL, u8));
eviocgbit_ioctl!(ioctl_read_buf!(eviocgbit_absolute, EV_ABS, u8));
eviocgbit_ioctl!(ioctl_read_buf!(eviocgbit_misc, EV_MSC, u8));
eviocgbit_ioctl!(ioctl_read_buf!(eviocgbit_switch, EV_SW, u8));
eviocgbit_ioctl!(ioctl_read_buf!(eviocgbit_led, EV_LED, u8));
eviocgbit_ioctl!(ioctl_read_buf!(eviocgbit_sound, EV_SND, u8));
eviocgbit_ioctl!(ioctl_read_buf!(eviocgbit_ff, EV_FF, u8));

/// ioctl: "get abs value/limits"
///
/// `abs` must be one of the "Absolute axes" values defined in the kernel
/// headers (`include/uapi/linux/input-event-codes.h` in modern kernels).
///
/// # Panics
///
/// Calling this with a value greater than the kernel-defined `ABS_MAX`
/// (typically 0x3f) will panic.
///
/// # Safety
///
/// `fd` must be a descriptor for an evdev device.
pub unsafe fn eviocgabs(
    fd: ::libc::c_int,
    abs: u32,
    buf: &mut input_absinfo,
) -> ::nix::Result<::libc::c_int> {
    assert!(abs <= 0x3f);
    convert_ioctl_res!(::nix::libc::ioctl(
        fd,
        request_code_read!(b'E', 0x40 + abs, ::std::mem::size_of::<input_absinfo>()),
        buf as *mut input_absinfo
    ))
}

/// ioctl: "set abs value/limits"
///
/// # Panics
///
/// Calling this with a value greater than the kernel-defined `ABS_MAX`
/// (typically 0x3f) will panic.
///
/// # Safety
///
/// `fd` must be a descriptor for an evdev device.
pub unsafe fn eviocsabs(
    fd: ::libc::c_int,
    abs: u32,
    buf: &input_absinfo,
) -> ::nix::Result<::libc::c_int> {
    assert!(abs <= 0x3f);
    convert_ioctl_res!(::nix::libc::ioctl(
        fd,
        request_code_write!(b'E', 0xc0 + abs, ::std::mem::size_of::<input_absinfo>()),
        buf as *const input_absinfo
    ))
}
