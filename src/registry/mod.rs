//! Device registration shim.
//!
//! The registry plays the host's part: it assigns major numbers to named
//! devices and routes numbered file handles to their sessions. Each
//! [`DeviceNode`] keeps a table of open handles, so callers that only hold a
//! `u64` file handle (as a host filesystem would) can read and release.
//!
//! ```text
//! register("kernel-roulette") -> major 240
//!   open(240)        -> fh 1
//!   read(240, fh 1)  -> bytes
//!   release(240, 1)
//! unregister(240)    (refused while fh are open)
//! ```

use crate::core::CopyOut;
use crate::device::{OpenFile, RouletteDevice};
use crate::error::{DeviceError, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info};

/// First major number handed out to dynamically registered devices.
pub const DYNAMIC_MAJOR_START: u32 = 240;

/// Last major number handed out to dynamically registered devices.
pub const DYNAMIC_MAJOR_END: u32 = 254;

/// A registered device and its open file handles.
#[derive(Debug)]
pub struct DeviceNode {
    major: u32,
    device: RouletteDevice,
    files: RwLock<HashMap<u64, Arc<Mutex<OpenFile>>>>,
    next_fh: AtomicU64,
}

impl DeviceNode {
    fn new(major: u32, device: RouletteDevice) -> Self {
        Self {
            major,
            device,
            files: RwLock::new(HashMap::new()),
            next_fh: AtomicU64::new(1),
        }
    }

    /// Returns the major number.
    #[must_use]
    pub const fn major(&self) -> u32 {
        self.major
    }

    /// Returns the underlying device.
    #[must_use]
    pub const fn device(&self) -> &RouletteDevice {
        &self.device
    }

    /// Returns the number of open file handles.
    #[must_use]
    pub fn open_handles(&self) -> usize {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Opens the device and returns a new file handle.
    ///
    /// # Errors
    ///
    /// Propagates fatal open failures according to the device policy, and
    /// returns [`DeviceError::Unloaded`] once the node has been unregistered.
    pub fn open(&self) -> Result<u64> {
        let file = self.device.open()?;
        let fh = self.next_fh.fetch_add(1, Ordering::Relaxed);

        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(fh, Arc::new(Mutex::new(file)));

        debug!(major = self.major, fh, "file handle opened");
        Ok(fh)
    }

    /// Reads up to `len` bytes from handle `fh` into `dst`.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::BadHandle`] for an unknown handle and
    /// [`DeviceError::Fault`] if `dst` rejects the copy.
    pub fn read<D>(&self, fh: u64, dst: &mut D, len: usize) -> Result<usize>
    where
        D: CopyOut + ?Sized,
    {
        let file = self.file(fh)?;
        let mut file = file.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(file.read_into(dst, len)?)
    }

    /// Runs `f` against the open file behind `fh`.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::BadHandle`] for an unknown handle.
    pub fn inspect<R>(&self, fh: u64, f: impl FnOnce(&OpenFile) -> R) -> Result<R> {
        let file = self.file(fh)?;
        let file = file.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(f(&file))
    }

    /// Returns the cursor position of handle `fh`.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::BadHandle`] for an unknown handle.
    pub fn position(&self, fh: u64) -> Result<u64> {
        self.inspect(fh, OpenFile::position)
    }

    /// Releases handle `fh`.
    ///
    /// # Errors
    ///
    /// Releasing an unknown or already released handle is a contract
    /// violation and handled as fatal.
    pub fn release(&self, fh: u64) -> Result<()> {
        let removed = self
            .files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&fh);

        let Some(file) = removed else {
            return self
                .device
                .enforce(Err(DeviceError::BadHandle { handle: fh }.into()));
        };

        // A read still holding the handle drops the last reference itself.
        if let Ok(file) = Arc::try_unwrap(file) {
            self.device
                .release(file.into_inner().unwrap_or_else(PoisonError::into_inner));
        }
        debug!(major = self.major, fh, "file handle released");
        Ok(())
    }

    fn file(&self, fh: u64) -> Result<Arc<Mutex<OpenFile>>> {
        let files = self.files.read().unwrap_or_else(PoisonError::into_inner);
        match files.get(&fh) {
            Some(file) => Ok(Arc::clone(file)),
            None => self
                .device
                .enforce(Err(DeviceError::BadHandle { handle: fh }.into())),
        }
    }
}

/// Table of registered devices keyed by major number.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    nodes: RwLock<BTreeMap<u32, Arc<DeviceNode>>>,
}

impl DeviceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `device` under its name and returns its major number.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Registration`] if the name is empty, already
    /// taken, or no major number is free.
    pub fn register(&self, device: RouletteDevice) -> Result<u32> {
        let name = device.name().to_string();
        let registration_error = |reason: &str| DeviceError::Registration {
            name: name.clone(),
            reason: reason.to_string(),
        };

        if name.trim().is_empty() {
            return Err(registration_error("empty device name").into());
        }

        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        if nodes.values().any(|node| node.device().name() == name) {
            return Err(registration_error("name already registered").into());
        }

        let major = (DYNAMIC_MAJOR_START..=DYNAMIC_MAJOR_END)
            .find(|major| !nodes.contains_key(major))
            .ok_or_else(|| registration_error("no free major numbers"))?;

        nodes.insert(major, Arc::new(DeviceNode::new(major, device)));

        info!("Registered {name} with major device number {major}");
        info!("Run /bin/mknod /dev/{name} c {major} 0");
        Ok(major)
    }

    /// Removes the device with `major`.
    ///
    /// The device is unloaded first, so a caller still holding its
    /// [`DeviceNode`] cannot open new sessions. Unregistering a major that is
    /// not registered is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Busy`] while the device has active users.
    pub fn unregister(&self, major: u32) -> Result<()> {
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        let Some(node) = nodes.get(&major) else {
            return Ok(());
        };

        // Nodes already handed out refuse new opens from here on.
        node.device().unload()?;

        if let Some(node) = nodes.remove(&major) {
            info!("Unregistered {} (major {major})", node.device().name());
        }
        Ok(())
    }

    /// Looks up the node for `major`.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::NotRegistered`] if nothing is registered there.
    pub fn node(&self, major: u32) -> Result<Arc<DeviceNode>> {
        self.nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&major)
            .cloned()
            .ok_or_else(|| DeviceError::NotRegistered { major }.into())
    }

    /// Finds the major number registered for `name`.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<u32> {
        self.nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|node| node.device().name() == name)
            .map(|node| node.major())
    }

    /// Returns all registered major numbers in ascending order.
    #[must_use]
    pub fn majors(&self) -> Vec<u32> {
        self.nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::sampler::ScriptedSampler;

    fn device(name: &str) -> RouletteDevice {
        RouletteDevice::new(name, Arc::new(ScriptedSampler::constant(250, 200)))
    }

    #[test]
    fn test_register_assigns_majors() {
        let registry = DeviceRegistry::new();
        assert_eq!(registry.register(device("a")).unwrap(), DYNAMIC_MAJOR_START);
        assert_eq!(
            registry.register(device("b")).unwrap(),
            DYNAMIC_MAJOR_START + 1
        );
        assert_eq!(registry.lookup("b"), Some(DYNAMIC_MAJOR_START + 1));
        assert_eq!(registry.majors().len(), 2);
    }

    #[test]
    fn test_register_rejects_duplicates_and_empty_names() {
        let registry = DeviceRegistry::new();
        registry.register(device("a")).unwrap();

        let err = registry.register(device("a")).unwrap_err();
        assert!(matches!(
            err,
            Error::Device(DeviceError::Registration { .. })
        ));
        assert!(!err.is_fatal());

        assert!(registry.register(device("")).is_err());
    }

    #[test]
    fn test_register_runs_out_of_majors() {
        let registry = DeviceRegistry::new();
        let slots = DYNAMIC_MAJOR_END - DYNAMIC_MAJOR_START + 1;
        for i in 0..slots {
            registry.register(device(&format!("dev{i}"))).unwrap();
        }
        let err = registry.register(device("overflow")).unwrap_err();
        assert!(err.to_string().contains("no free major numbers"));
    }

    #[test]
    fn test_freed_major_is_reused() {
        let registry = DeviceRegistry::new();
        let a = registry.register(device("a")).unwrap();
        registry.register(device("b")).unwrap();
        registry.unregister(a).unwrap();
        assert_eq!(registry.register(device("c")).unwrap(), a);
    }

    #[test]
    fn test_handle_lifecycle() {
        let registry = DeviceRegistry::new();
        let major = registry.register(device("a")).unwrap();
        let node = registry.node(major).unwrap();

        let fh = node.open().unwrap();
        assert_eq!(node.open_handles(), 1);

        let mut out = Vec::new();
        assert_eq!(node.read(fh, &mut out, 10).unwrap(), 10);
        assert_eq!(node.position(fh).unwrap(), 10);
        assert_eq!(node.read(fh, &mut out, 100).unwrap(), 40);
        assert_eq!(node.read(fh, &mut out, 100).unwrap(), 0);

        node.release(fh).unwrap();
        assert_eq!(node.open_handles(), 0);
        assert_eq!(node.device().users(), 0);
    }

    #[test]
    fn test_read_after_release_fails() {
        let registry = DeviceRegistry::new();
        let major = registry.register(device("a")).unwrap();
        let node = registry.node(major).unwrap();

        let fh = node.open().unwrap();
        node.release(fh).unwrap();

        let mut out = Vec::new();
        let err = node.read(fh, &mut out, 10).unwrap_err();
        assert!(matches!(
            err,
            Error::Device(DeviceError::BadHandle { handle }) if handle == fh
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn test_double_release_is_contract_violation() {
        let registry = DeviceRegistry::new();
        let major = registry.register(device("a")).unwrap();
        let node = registry.node(major).unwrap();

        let fh = node.open().unwrap();
        node.release(fh).unwrap();
        let err = node.release(fh).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(node.device().users(), 0);
    }

    #[test]
    fn test_unregister_refused_while_busy() {
        let registry = DeviceRegistry::new();
        let major = registry.register(device("a")).unwrap();
        let node = registry.node(major).unwrap();
        let fh = node.open().unwrap();

        let err = registry.unregister(major).unwrap_err();
        assert!(matches!(
            err,
            Error::Device(DeviceError::Busy { users: 1, .. })
        ));
        assert_eq!(err.errno(), -libc::EBUSY);

        node.release(fh).unwrap();
        registry.unregister(major).unwrap();
        registry.unregister(major).unwrap();
        assert!(matches!(
            registry.node(major).unwrap_err(),
            Error::Device(DeviceError::NotRegistered { .. })
        ));
    }

    #[test]
    fn test_held_node_refuses_open_after_unregister() {
        let registry = DeviceRegistry::new();
        let major = registry.register(device("a")).unwrap();
        let node = registry.node(major).unwrap();

        registry.unregister(major).unwrap();
        assert!(registry.majors().is_empty());

        let err = node.open().unwrap_err();
        assert!(matches!(
            err,
            Error::Device(DeviceError::Unloaded { .. })
        ));
        assert_eq!(node.device().users(), 0);
        assert_eq!(node.open_handles(), 0);
    }

    #[test]
    fn test_unload_races_with_opens() {
        use std::thread;

        let registry = Arc::new(DeviceRegistry::new());
        let major = registry
            .register(RouletteDevice::new(
                "racy",
                Arc::new(ScriptedSampler::constant(250, 200)),
            ))
            .unwrap();
        let node = registry.node(major).unwrap();

        let openers: Vec<_> = (0..4)
            .map(|_| {
                let node = Arc::clone(&node);
                thread::spawn(move || {
                    for _ in 0..200 {
                        match node.open() {
                            Ok(fh) => node.release(fh).unwrap(),
                            Err(err) => {
                                assert!(matches!(
                                    err,
                                    Error::Device(DeviceError::Unloaded { .. })
                                ));
                                return;
                            }
                        }
                    }
                })
            })
            .collect();

        while registry.unregister(major).is_err() {
            thread::yield_now();
        }
        for opener in openers {
            opener.join().unwrap();
        }

        assert!(node.device().is_unloaded());
        assert_eq!(node.device().users(), 0);
        assert!(node.open().is_err());
    }
}
