use crate::error::{Error, Result};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdapterDesc {
    pub description: String,
    pub is_software: bool,
}

/// Enumerates adapters in the platform's preference order and creates devices
/// on them.
pub trait AdapterSource {
    type Adapter;
    type Device;

    /// `Ok(None)` marks the end of enumeration.
    fn enum_adapter(&self, index: u32) -> Result<Option<Self::Adapter>>;

    fn describe(&self, adapter: &Self::Adapter) -> Result<AdapterDesc>;

    /// Fails when the adapter lacks the required feature level.
    fn create_device(&self, adapter: &Self::Adapter) -> Result<Self::Device>;
}

/// Creates a device on the first hardware adapter that accepts one.
///
/// Software adapters are never selected. Indices that fail to enumerate or
/// describe are skipped rather than ending the search.
pub fn select_hardware_adapter<S: AdapterSource>(
    source: &S,
) -> Result<(S::Adapter, S::Device)> {
    for index in 0.. {
        let adapter = match source.enum_adapter(index) {
            Ok(Some(adapter)) => adapter,
            Ok(None) => break,
            Err(e) => {
                log::debug!("skipping adapter {index}: {e}");
                continue;
            }
        };

        let desc = match source.describe(&adapter) {
            Ok(desc) => desc,
            Err(e) => {
                log::debug!("skipping adapter {index}, no description: {e}");
                continue;
            }
        };

        // Don't select the Basic Render Driver adapter.
        if desc.is_software {
            log::debug!("skipping software adapter {index}: {}", desc.description);
            continue;
        }

        match source.create_device(&adapter) {
            Ok(device) => {
                log::info!("using adapter {index}: {}", desc.description);
                return Ok((adapter, device));
            }
            Err(e) => log::debug!("adapter {index} ({}) rejected: {e}", desc.description),
        }
    }

    Err(Error::AdapterNotFound)
}

/// Activates API validation when requested. A missing debug layer is not an
/// error; the device is then created without validation.
pub fn activate_debug_layer(requested: bool, activate: impl FnOnce() -> bool) -> bool {
    if !requested {
        return false;
    }

    let active = activate();
    if !active {
        log::debug!("debug layer unavailable, continuing without validation");
    }

    active
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;

    #[derive(Clone, Copy)]
    enum Slot {
        Hardware { supported: bool },
        Software,
        EnumFails,
        DescribeFails,
    }

    struct FakeAdapters {
        slots: Vec<Slot>,
        device_attempts: RefCell<Vec<u32>>,
    }

    impl FakeAdapters {
        fn new(slots: &[Slot]) -> Self {
            Self {
                slots: slots.to_vec(),
                device_attempts: RefCell::new(Vec::new()),
            }
        }
    }

    impl AdapterSource for FakeAdapters {
        type Adapter = u32;
        type Device = String;

        fn enum_adapter(&self, index: u32) -> Result<Option<u32>> {
            match self.slots.get(index as usize) {
                None => Ok(None),
                Some(Slot::EnumFails) => Err(Error::native(-1, "enum")),
                Some(_) => Ok(Some(index)),
            }
        }

        fn describe(&self, adapter: &u32) -> Result<AdapterDesc> {
            match self.slots[*adapter as usize] {
                Slot::DescribeFails => Err(Error::native(-1, "desc")),
                Slot::Software => Ok(AdapterDesc {
                    description: "Microsoft Basic Render Driver".into(),
                    is_software: true,
                }),
                _ => Ok(AdapterDesc {
                    description: format!("gpu {adapter}"),
                    is_software: false,
                }),
            }
        }

        fn create_device(&self, adapter: &u32) -> Result<String> {
            self.device_attempts.borrow_mut().push(*adapter);
            match self.slots[*adapter as usize] {
                Slot::Hardware { supported: true } => Ok(format!("device on {adapter}")),
                _ => Err(Error::native(-1, "feature level")),
            }
        }
    }

    #[test]
    fn only_software_adapter_is_not_found() {
        let source = FakeAdapters::new(&[Slot::Software]);
        let result = select_hardware_adapter(&source);

        assert!(matches!(result, Err(Error::AdapterNotFound)));
        assert!(source.device_attempts.borrow().is_empty());
    }

    #[test]
    fn no_adapters_is_not_found() {
        let source = FakeAdapters::new(&[]);
        assert!(matches!(
            select_hardware_adapter(&source),
            Err(Error::AdapterNotFound)
        ));
    }

    #[test]
    fn first_capable_hardware_adapter_wins() {
        let source = FakeAdapters::new(&[
            Slot::Software,
            Slot::Hardware { supported: false },
            Slot::Hardware { supported: true },
            Slot::Hardware { supported: true },
        ]);

        let (adapter, device) = select_hardware_adapter(&source).unwrap();
        assert_eq!(adapter, 2);
        assert_eq!(device, "device on 2");
        assert_eq!(*source.device_attempts.borrow(), vec![1, 2]);
    }

    #[test]
    fn failing_indices_are_skipped() {
        let source = FakeAdapters::new(&[
            Slot::EnumFails,
            Slot::DescribeFails,
            Slot::Hardware { supported: true },
        ]);

        let (adapter, _) = select_hardware_adapter(&source).unwrap();
        assert_eq!(adapter, 2);
    }

    #[test]
    fn debug_layer_not_attempted_unless_requested() {
        let attempts = Cell::new(0);
        let active = activate_debug_layer(false, || {
            attempts.set(attempts.get() + 1);
            true
        });

        assert!(!active);
        assert_eq!(attempts.get(), 0);
    }

    #[test]
    fn unavailable_debug_layer_degrades_silently() {
        assert!(!activate_debug_layer(true, || false));
        assert!(activate_debug_layer(true, || true));
    }
}
