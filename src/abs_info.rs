use std::fmt;

use crate::compat::input_absinfo;

/// Information about an absolute axis: its current value plus the range,
/// noise filter and resolution metadata reported by the kernel.
#[derive(Copy, Clone, PartialEq, Eq)]
#[repr(transparent)]
pub struct AbsInfo(pub(crate) input_absinfo);

impl AbsInfo {
    /// Creates a new `AbsInfo` with a minimum and maximum value.
    ///
    /// All other fields start out as zero.
    pub const fn new(minimum: i32, maximum: i32) -> Self {
        Self(input_absinfo {
            value: 0,
            minimum,
            maximum,
            fuzz: 0,
            flat: 0,
            resolution: 0,
        })
    }

    /// Returns a copy of `self` with the given axis value.
    ///
    /// The value is not clamped to the minimum/maximum or modified in any
    /// other way.
    pub const fn with_value(mut self, value: i32) -> Self {
        self.0.value = value;
        self
    }

    /// Returns a copy of `self` with the given fuzz value.
    pub const fn with_fuzz(mut self, fuzz: i32) -> Self {
        self.0.fuzz = fuzz;
        self
    }

    /// Returns a copy of `self` with the given flat value.
    pub const fn with_flat(mut self, flat: i32) -> Self {
        self.0.flat = flat;
        self
    }

    /// Returns a copy of `self` with the given axis resolution.
    pub const fn with_resolution(mut self, resolution: i32) -> Self {
        self.0.resolution = resolution;
        self
    }

    /// The latest reported value for the axis.
    pub const fn value(&self) -> i32 {
        self.0.value
    }

    /// The minimum value for the axis.
    pub const fn minimum(&self) -> i32 {
        self.0.minimum
    }

    /// The maximum value for the axis.
    pub const fn maximum(&self) -> i32 {
        self.0.maximum
    }

    /// Noise filter value: deviations within `fuzz` are discarded by the
    /// kernel before they reach the event stream.
    pub const fn fuzz(&self) -> i32 {
        self.0.fuzz
    }

    /// Dead zone: values within `flat` of the center are reported as 0 by
    /// the joystick interface.
    pub const fn flat(&self) -> i32 {
        self.0.flat
    }

    /// Resolution in units/mm, or units/radian for rotational axes.
    pub const fn resolution(&self) -> i32 {
        self.0.resolution
    }
}

impl From<input_absinfo> for AbsInfo {
    fn from(raw: input_absinfo) -> Self {
        Self(raw)
    }
}

impl AsRef<input_absinfo> for AbsInfo {
    fn as_ref(&self) -> &input_absinfo {
        &self.0
    }
}

impl fmt::Debug for AbsInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AbsInfo")
            .field("value", &self.value())
            .field("min", &self.minimum())
            .field("max", &self.maximum())
            .field("fuzz", &self.fuzz())
            .field("flat", &self.flat())
            .field("resolution", &self.resolution())
            .finish()
    }
}
