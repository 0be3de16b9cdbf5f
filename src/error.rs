use std::io;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// The operation requires an attached descriptor.
    #[error("no file descriptor is attached to the device model")]
    NotAttached,
    /// [`attach`](crate::Device::attach) was called twice on the same model.
    #[error("the device model is already attached to a file descriptor")]
    AlreadyAttached,
    /// A type, code or slot was out of range, a code was not enabled, or a
    /// payload did not match the operation.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// The initial version ioctl failed: the descriptor does not speak evdev.
    #[error("descriptor is not an evdev device")]
    NotAnEvdevDevice(#[source] nix::Error),
    /// A non-blocking read found no data. Also the reader's way of saying
    /// "sync queue drained".
    #[error("operation would block")]
    WouldBlock,
    /// The running kernel lacks the required ioctl.
    #[error("operation not supported by the running kernel")]
    NotSupported,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Nix(#[from] nix::Error),
}

impl Error {
    /// The negative errno a caller following the C convention would see for
    /// this error.
    pub fn errno(&self) -> i32 {
        let raw = match self {
            Error::NotAttached | Error::AlreadyAttached => libc::EBADF,
            Error::InvalidArgument(_) => libc::EINVAL,
            Error::NotAnEvdevDevice(err) => *err as i32,
            Error::WouldBlock => libc::EAGAIN,
            Error::NotSupported => libc::ENOSYS,
            Error::Io(err) => err.raw_os_error().unwrap_or(libc::EIO),
            Error::Nix(err) => *err as i32,
        };
        -raw
    }
}
