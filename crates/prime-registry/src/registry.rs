// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Entity registry implementation

use std::collections::HashMap;

use tracing::debug;

use crate::types::{
    AppKnobType, AppMonType, Application, DevKnobType, DevMonType, Device, ElementId, Knob,
    Monitor, ProcId, TypeLookup,
};

/// Registry of live devices and applications
///
/// Devices are keyed by source address (`UDS` for the local socket),
/// applications by the process id from their registration handshake.
///
/// The registry is pure state with no internal locking; it is owned by the
/// single decoding thread. Every operation is infallible: removals of absent
/// entries are no-ops and lookups of undefined pairs yield
/// [`TypeLookup::Unknown`].
#[derive(Debug, Default)]
pub struct Registry {
    devices: HashMap<String, Device>,
    apps: HashMap<ProcId, Application>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Entities
    // ------------------------------------------------------------------

    /// Create an application entry. Returns `false` if it already existed,
    /// in which case its knobs and monitors are kept.
    pub fn create_app(&mut self, pid: ProcId) -> bool {
        if self.apps.contains_key(&pid) {
            debug!("[REGISTRY] App {} already registered", pid);
            return false;
        }
        self.apps.insert(pid, Application::new());
        debug!("[REGISTRY] Created app {} (total: {})", pid, self.apps.len());
        true
    }

    /// Drop an application together with all its knobs and monitors
    pub fn drop_app(&mut self, pid: ProcId) -> Option<Application> {
        let removed = self.apps.remove(&pid);
        if removed.is_some() {
            debug!("[REGISTRY] Dropped app {} (total: {})", pid, self.apps.len());
        }
        removed
    }

    /// Create a device entry. Returns `false` if it already existed.
    pub fn create_device(&mut self, key: &str) -> bool {
        if self.devices.contains_key(key) {
            return false;
        }
        self.devices.insert(key.to_string(), Device::new());
        debug!(
            "[REGISTRY] Created device {} (total: {})",
            key,
            self.devices.len()
        );
        true
    }

    /// Drop a device together with all its knobs and monitors
    pub fn drop_device(&mut self, key: &str) -> Option<Device> {
        let removed = self.devices.remove(key);
        if removed.is_some() {
            debug!(
                "[REGISTRY] Dropped device {} (total: {})",
                key,
                self.devices.len()
            );
        }
        removed
    }

    pub fn app(&self, pid: ProcId) -> Option<&Application> {
        self.apps.get(&pid)
    }

    pub fn device(&self, key: &str) -> Option<&Device> {
        self.devices.get(key)
    }

    pub fn app_count(&self) -> usize {
        self.apps.len()
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    fn app_entry(&mut self, pid: ProcId) -> &mut Application {
        self.apps.entry(pid).or_insert_with(|| {
            debug!("[REGISTRY] Lazily created app {}", pid);
            Application::new()
        })
    }

    fn device_entry(&mut self, key: &str) -> &mut Device {
        self.devices.entry(key.to_string()).or_insert_with(|| {
            debug!("[REGISTRY] Lazily created device {}", key);
            Device::new()
        })
    }

    // ------------------------------------------------------------------
    // Upserts (REG)
    // ------------------------------------------------------------------

    /// Insert or overwrite an application knob, creating the app if needed.
    /// Returns the replaced definition, if any.
    pub fn upsert_app_knob(
        &mut self,
        pid: ProcId,
        knob: Knob<AppKnobType>,
    ) -> Option<Knob<AppKnobType>> {
        debug!("[REGISTRY] App {} knob {} -> {}", pid, knob.id, knob.kind);
        self.app_entry(pid).insert_knob(knob)
    }

    pub fn upsert_app_monitor(
        &mut self,
        pid: ProcId,
        monitor: Monitor<AppMonType>,
    ) -> Option<Monitor<AppMonType>> {
        debug!(
            "[REGISTRY] App {} monitor {} -> {}",
            pid, monitor.id, monitor.kind
        );
        self.app_entry(pid).insert_monitor(monitor)
    }

    pub fn upsert_device_knob(
        &mut self,
        key: &str,
        knob: Knob<DevKnobType>,
    ) -> Option<Knob<DevKnobType>> {
        debug!("[REGISTRY] Device {} knob {} -> {}", key, knob.id, knob.kind);
        self.device_entry(key).insert_knob(knob)
    }

    pub fn upsert_device_monitor(
        &mut self,
        key: &str,
        monitor: Monitor<DevMonType>,
    ) -> Option<Monitor<DevMonType>> {
        debug!(
            "[REGISTRY] Device {} monitor {} -> {}",
            key, monitor.id, monitor.kind
        );
        self.device_entry(key).insert_monitor(monitor)
    }

    // ------------------------------------------------------------------
    // Removals (DEREG)
    // ------------------------------------------------------------------

    pub fn remove_app_knob(&mut self, pid: ProcId, id: ElementId) -> Option<Knob<AppKnobType>> {
        self.apps.get_mut(&pid).and_then(|app| app.remove_knob(id))
    }

    pub fn remove_app_monitor(
        &mut self,
        pid: ProcId,
        id: ElementId,
    ) -> Option<Monitor<AppMonType>> {
        self.apps.get_mut(&pid).and_then(|app| app.remove_monitor(id))
    }

    pub fn remove_device_knob(&mut self, key: &str, id: ElementId) -> Option<Knob<DevKnobType>> {
        self.devices.get_mut(key).and_then(|dev| dev.remove_knob(id))
    }

    pub fn remove_device_monitor(
        &mut self,
        key: &str,
        id: ElementId,
    ) -> Option<Monitor<DevMonType>> {
        self.devices
            .get_mut(key)
            .and_then(|dev| dev.remove_monitor(id))
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    pub fn lookup_app_knob_type(&self, pid: ProcId, id: ElementId) -> TypeLookup<AppKnobType> {
        self.apps
            .get(&pid)
            .and_then(|app| app.knob(id))
            .map(|knob| knob.kind)
            .into()
    }

    pub fn lookup_app_monitor_type(&self, pid: ProcId, id: ElementId) -> TypeLookup<AppMonType> {
        self.apps
            .get(&pid)
            .and_then(|app| app.monitor(id))
            .map(|mon| mon.kind)
            .into()
    }

    pub fn lookup_device_knob_type(&self, key: &str, id: ElementId) -> TypeLookup<DevKnobType> {
        self.devices
            .get(key)
            .and_then(|dev| dev.knob(id))
            .map(|knob| knob.kind)
            .into()
    }

    pub fn lookup_device_monitor_type(
        &self,
        key: &str,
        id: ElementId,
    ) -> TypeLookup<DevMonType> {
        self.devices
            .get(key)
            .and_then(|dev| dev.monitor(id))
            .map(|mon| mon.kind)
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Numeric;

    fn freq_knob(id: ElementId, init: i64) -> Knob<DevKnobType> {
        Knob::new(
            id,
            DevKnobType::Freq,
            Numeric::Int(100),
            Numeric::Int(2000),
            Numeric::Int(init),
        )
    }

    #[test]
    fn test_create_app_is_idempotent() {
        let mut registry = Registry::new();
        assert!(registry.create_app(42));
        registry.upsert_app_knob(
            42,
            Knob::new(
                1,
                AppKnobType::Par,
                Numeric::Int(1),
                Numeric::Int(8),
                Numeric::Int(4),
            ),
        );
        assert!(!registry.create_app(42));
        assert_eq!(registry.app(42).unwrap().knob_count(), 1);
    }

    #[test]
    fn test_upsert_creates_entity_lazily() {
        let mut registry = Registry::new();
        registry.upsert_device_knob("10.0.0.2", freq_knob(3, 800));
        assert_eq!(registry.device_count(), 1);
        assert_eq!(
            registry.lookup_device_knob_type("10.0.0.2", 3),
            TypeLookup::Known(DevKnobType::Freq)
        );
    }

    #[test]
    fn test_reregistration_keeps_single_entry() {
        let mut registry = Registry::new();
        registry.upsert_device_knob("UDS", freq_knob(5, 800));
        let previous = registry.upsert_device_knob("UDS", freq_knob(5, 1200));

        assert_eq!(previous.map(|k| k.init), Some(Numeric::Int(800)));
        let device = registry.device("UDS").unwrap();
        assert_eq!(device.knob_count(), 1);
        assert_eq!(device.knob(5).unwrap().init, Numeric::Int(1200));
    }

    #[test]
    fn test_dereg_then_lookup_is_unknown() {
        let mut registry = Registry::new();
        registry.upsert_device_knob("UDS", freq_knob(3, 800));
        assert!(registry.remove_device_knob("UDS", 3).is_some());
        assert!(registry.lookup_device_knob_type("UDS", 3).is_unknown());
        // second removal is a no-op
        assert!(registry.remove_device_knob("UDS", 3).is_none());
    }

    #[test]
    fn test_lookup_on_missing_entity() {
        let registry = Registry::new();
        assert!(registry.lookup_app_knob_type(7, 0).is_unknown());
        assert!(registry.lookup_app_monitor_type(7, 0).is_unknown());
        assert!(registry.lookup_device_monitor_type("nowhere", 1).is_unknown());
    }

    #[test]
    fn test_drop_app_removes_children() {
        let mut registry = Registry::new();
        registry.upsert_app_monitor(
            9,
            Monitor::with_bounds(
                2,
                AppMonType::Perf,
                Numeric::Float(0.0),
                Numeric::Float(30.0),
                1.0,
            ),
        );
        assert_eq!(
            registry.lookup_app_monitor_type(9, 2),
            TypeLookup::Known(AppMonType::Perf)
        );

        let dropped = registry.drop_app(9).unwrap();
        assert_eq!(dropped.monitor_count(), 1);
        assert!(registry.lookup_app_monitor_type(9, 2).is_unknown());
        assert!(registry.drop_app(9).is_none());
    }

    #[test]
    fn test_device_lifecycle() {
        let mut registry = Registry::new();
        assert!(registry.create_device("UDS"));
        assert!(!registry.create_device("UDS"));
        registry.upsert_device_monitor("UDS", Monitor::bare(0, DevMonType::Temp));
        assert_eq!(
            registry.lookup_device_monitor_type("UDS", 0),
            TypeLookup::Known(DevMonType::Temp)
        );
        registry.drop_device("UDS");
        assert_eq!(registry.device_count(), 0);
    }
}
