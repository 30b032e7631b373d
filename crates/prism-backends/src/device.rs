//! Device discovery and selection
//!
//! Prism executes kernels on in-process devices: the host processor and a
//! reference accelerator that implements the work-group execution model
//! exactly. Real driver-backed devices plug in behind the same `Device`
//! description; discovery and selection never silently substitute one kind
//! for another.

use std::fmt;

use crate::error::{BackendError, Result};

/// Kind of execution device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// General-purpose host processor
    Host,
    /// Accelerator executing the work-group model
    Accelerator,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Host => f.write_str("host"),
            DeviceKind::Accelerator => f.write_str("accelerator"),
        }
    }
}

/// One execution device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    name: String,
    kind: DeviceKind,
    max_work_group_size: usize,
    address_bits: u32,
}

impl Device {
    /// Create a device description
    pub fn new(name: impl Into<String>, kind: DeviceKind, max_work_group_size: usize, address_bits: u32) -> Self {
        Self {
            name: name.into(),
            kind,
            max_work_group_size,
            address_bits,
        }
    }

    /// Device name, e.g. `"prism-reference-accelerator"`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Device kind
    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    /// Largest work-group this device will schedule
    pub fn max_work_group_size(&self) -> usize {
        self.max_work_group_size
    }

    /// Addressing width in bits; atomic indices must fit this width
    pub fn address_bits(&self) -> u32 {
        self.address_bits
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.kind)
    }
}

/// Registry of devices visible to this process
///
/// `discover()` enumerates the built-in devices. Selection by kind fails with
/// [`BackendError::DeviceUnavailable`] when no device of that kind exists;
/// it is never downgraded to a different device.
#[derive(Debug, Clone)]
pub struct DeviceRegistry {
    devices: Vec<Device>,
}

impl DeviceRegistry {
    /// Enumerate the in-process devices
    pub fn discover() -> Self {
        let devices = vec![
            Device::new("prism-host", DeviceKind::Host, 256, usize::BITS),
            Device::new("prism-reference-accelerator", DeviceKind::Accelerator, 256, usize::BITS),
        ];
        tracing::debug!(count = devices.len(), "devices_discovered");
        Self { devices }
    }

    /// Build a registry from an explicit device list (used to model hosts
    /// where a device kind is absent)
    pub fn with_devices(devices: Vec<Device>) -> Self {
        Self { devices }
    }

    /// All known devices
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Select the first device of the given kind
    ///
    /// # Errors
    ///
    /// [`BackendError::DeviceUnavailable`] when no device of `kind` exists.
    pub fn get(&self, kind: DeviceKind) -> Result<&Device> {
        self.devices
            .iter()
            .find(|d| d.kind() == kind)
            .ok_or(BackendError::DeviceUnavailable { kind })
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::discover()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_finds_both_kinds() {
        let registry = DeviceRegistry::discover();
        assert!(registry.get(DeviceKind::Host).is_ok());
        assert!(registry.get(DeviceKind::Accelerator).is_ok());
    }

    #[test]
    fn test_unavailable_kind_is_an_error() {
        let registry = DeviceRegistry::with_devices(vec![Device::new("host-only", DeviceKind::Host, 64, 64)]);

        match registry.get(DeviceKind::Accelerator) {
            Err(BackendError::DeviceUnavailable { kind }) => {
                assert_eq!(kind, DeviceKind::Accelerator);
            }
            other => panic!("expected DeviceUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn test_device_display() {
        let device = Device::new("prism-host", DeviceKind::Host, 256, 64);
        assert_eq!(device.to_string(), "prism-host (host)");
    }
}
