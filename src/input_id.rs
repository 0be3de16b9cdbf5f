use crate::compat::input_id;
use std::fmt;

/// The bus/vendor/product/version quad identifying a mirrored device.
///
/// This is a plain copy of the kernel's `input_id`, taken at attach time.
/// The numbers carry no semantics inside this crate; the per-field setters
/// on [`Device`](crate::Device) exist so a caller can stage a different
/// identity on a detached mirror, knowing an attach overwrites it.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct InputId {
    bustype: u16,
    vendor: u16,
    product: u16,
    version: u16,
}

impl InputId {
    pub fn new(bustype: u16, vendor: u16, product: u16, version: u16) -> Self {
        Self {
            bustype,
            vendor,
            product,
            version,
        }
    }

    /// The bus the device hangs off (`BUS_USB` and friends in the kernel
    /// headers).
    pub fn bustype(&self) -> u16 {
        self.bustype
    }

    pub fn vendor(&self) -> u16 {
        self.vendor
    }

    pub fn product(&self) -> u16 {
        self.product
    }

    pub fn version(&self) -> u16 {
        self.version
    }
}

impl From<input_id> for InputId {
    fn from(id: input_id) -> Self {
        Self {
            bustype: id.bustype,
            vendor: id.vendor,
            product: id.product,
            version: id.version,
        }
    }
}

impl From<InputId> for input_id {
    fn from(id: InputId) -> Self {
        input_id {
            bustype: id.bustype,
            vendor: id.vendor,
            product: id.product,
            version: id.version,
        }
    }
}

impl fmt::Debug for InputId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "InputId {{ bus {:#06x}, vendor {:#06x}, product {:#06x}, version {:#06x} }}",
            self.bustype, self.vendor, self.product, self.version
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirrors_the_kernel_struct() {
        let raw = input_id {
            bustype: 0x03,
            vendor: 0x046d,
            product: 0xc52b,
            version: 0x0111,
        };
        let id = InputId::from(raw);
        assert_eq!(id.bustype(), 0x03);
        assert_eq!(id.vendor(), 0x046d);
        assert_eq!(input_id::from(id), raw);
        assert_eq!(id, InputId::new(0x03, 0x046d, 0xc52b, 0x0111));
    }
}
