//! The simulated modem record
//!
//! A [`Modem`] owns everything about one simulated device: its property
//! store (the single source of truth for `State` and friends), its bearers,
//! its operation leases, the cooperative scheduler its slow methods complete
//! on, and the buffer of signals waiting to be picked up.
//!
//! Control methods live in `control.rs`, the testing surface in `testing.rs`
//! and fault interception in `fault.rs`; they are all `impl Modem` blocks.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use mm_protocol::{
    interface, CoreError, InterfaceMap, ModemError, ModemLock, ModemState, PowerState,
    PropertyMap, PropertyValue, RegistrationState, StateChangeReason, ROOT_PATH,
};
use tracing::{debug, info, warn};

use crate::bearer::Bearer;
use crate::fault::{FaultPlan, MethodCall};
use crate::lease::{LeaseTable, OperationId, OperationKind};
use crate::properties::PropertyStore;
use crate::scheduler::Scheduler;
use crate::signal::ModemSignal;
use crate::sim::SimCard;
use crate::technology::Technology;
use crate::testing::ReceivedMessage;
use crate::timing::TimingConfig;

/// Upper bound on tasks a single `run_until_idle` call executes
const MAX_TURNS: usize = 100_000;

/// Properties a client may write directly
const WRITABLE_PROPERTIES: &[(&str, &str)] = &[(interface::MODEM, "OwnNumbers")];

/// One simulated modem
#[derive(Debug)]
pub struct Modem {
    path: String,
    properties: PropertyStore,
    overrides: InterfaceMap,
    technology: Arc<dyn Technology>,
    sim: Option<Weak<SimCard>>,
    pub(crate) bearers: BTreeMap<String, Bearer>,
    leases: LeaseTable,
    scheduler: Scheduler,
    faults: FaultPlan,
    timing: TimingConfig,
    internal_depth: u32,
    acting_for: Option<(OperationKind, OperationId)>,
    signals: Vec<ModemSignal>,
    pub(crate) messages: Vec<ReceivedMessage>,
    calls: Vec<MethodCall>,
}

impl Modem {
    /// Create a modem at index 0 with the given technology
    pub fn new(technology: impl Technology + 'static) -> Self {
        Self::with_technology(Arc::new(technology))
    }

    pub fn with_technology(technology: Arc<dyn Technology>) -> Self {
        let path = mm_protocol::modem_path(0);
        let properties = initial_properties(technology.as_ref(), "pseudomodem0");
        info!("Created {} modem at {}", technology.name(), path);
        Self {
            path,
            properties,
            overrides: InterfaceMap::new(),
            technology,
            sim: None,
            bearers: BTreeMap::new(),
            leases: LeaseTable::new(),
            scheduler: Scheduler::new(),
            faults: FaultPlan::none(),
            timing: TimingConfig::default(),
            internal_depth: 0,
            acting_for: None,
            signals: Vec::new(),
            messages: Vec::new(),
            calls: Vec::new(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the kernel device name reported in the `Device` property
    pub fn with_device(mut self, device: &str) -> Self {
        if let Err(e) = self
            .properties
            .set(interface::MODEM, "Device", PropertyValue::from(device))
        {
            warn!("{}: cannot set device name: {}", self.path, e);
        }
        self
    }

    pub fn with_timing(mut self, timing: TimingConfig) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_faults(mut self, faults: FaultPlan) -> Self {
        self.faults = faults;
        self
    }

    /// Override initial property values
    ///
    /// Overrides must name existing properties with matching types. They are
    /// re-applied whenever the modem resets.
    pub fn with_property_overrides(mut self, overrides: InterfaceMap) -> Result<Self, ModemError> {
        self.properties.apply(&overrides)?;
        self.overrides = overrides;
        Ok(self)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn technology(&self) -> Arc<dyn Technology> {
        Arc::clone(&self.technology)
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    pub fn get(&self, interface: &str, name: &str) -> Result<PropertyValue, ModemError> {
        debug!("{}: Get {}.{}", self.path, interface, name);
        self.properties.get(interface, name).cloned()
    }

    pub fn get_all(&self, interface: &str) -> Result<PropertyMap, ModemError> {
        debug!("{}: GetAll {}", self.path, interface);
        self.properties.get_all(interface).cloned()
    }

    /// Client write, limited to writable properties
    pub fn set(
        &mut self,
        interface: &str,
        name: &str,
        value: PropertyValue,
    ) -> Result<(), ModemError> {
        // Existence first, so unknown names report as such
        self.properties.get(interface, name)?;
        let writable = WRITABLE_PROPERTIES
            .iter()
            .any(|(iface, prop)| *iface == interface && *prop == name);
        if !writable {
            return Err(ModemError::core(
                CoreError::Unauthorized,
                format!("Property \"{name}\" is read-only"),
            ));
        }
        self.properties.set(interface, name, value).map(|_| ())
    }

    pub(crate) fn properties(&self) -> &PropertyStore {
        &self.properties
    }

    /// Internal write that skips the writability check
    pub(crate) fn write_property(
        &mut self,
        interface: &str,
        name: &str,
        value: PropertyValue,
    ) -> Result<(), ModemError> {
        self.properties.set(interface, name, value).map(|_| ())
    }

    pub(crate) fn property_u32(&self, interface: &str, name: &str) -> Option<u32> {
        self.properties.get(interface, name).ok()?.as_u32()
    }

    /// Rebuild properties from scratch, keeping overrides and the SIM
    pub(crate) fn reinitialize_properties(&mut self) {
        let device = self
            .properties
            .get(interface::MODEM, "Device")
            .ok()
            .and_then(PropertyValue::as_str)
            .unwrap_or("pseudomodem0")
            .to_string();
        self.properties = initial_properties(self.technology.as_ref(), &device);
        if let Err(e) = self.properties.apply(&self.overrides) {
            warn!("{}: dropping property overrides: {}", self.path, e);
        }
        let sim_path = self.sim().map(|sim| sim.path.clone());
        self.write_sim_path(sim_path);
    }

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    pub fn state(&self) -> ModemState {
        self.properties
            .get(interface::MODEM, "State")
            .ok()
            .and_then(PropertyValue::as_i32)
            .and_then(ModemState::from_i32)
            .unwrap_or(ModemState::Unknown)
    }

    /// Write `State` and emit `StateChanged`
    pub fn change_state(&mut self, new: ModemState, reason: StateChangeReason) {
        let old = self.state();
        if let Err(e) = self.properties.set(
            interface::MODEM,
            "State",
            PropertyValue::I32(new.as_i32()),
        ) {
            warn!("{}: cannot write State: {}", self.path, e);
            return;
        }
        info!("{}: state {} -> {} ({:?})", self.path, old, new, reason);
        self.signals
            .push(ModemSignal::StateChanged { old, new, reason });
    }

    /// 3GPP registration state, if this modem has one
    pub fn registration_state(&self) -> Option<RegistrationState> {
        self.properties
            .get(interface::MODEM_3GPP, "RegistrationState")
            .ok()
            .and_then(PropertyValue::as_u32)
            .and_then(RegistrationState::from_u32)
    }

    pub fn set_registration_state(&mut self, state: RegistrationState) -> Result<(), ModemError> {
        if !self.properties.has_interface(interface::MODEM_3GPP) {
            return Err(ModemError::core(
                CoreError::Unsupported,
                "Modem has no 3GPP registration state",
            ));
        }
        debug!("{}: registration state -> {}", self.path, state);
        self.write_property(
            interface::MODEM_3GPP,
            "RegistrationState",
            PropertyValue::U32(state.as_u32()),
        )
    }

    pub fn signal_quality(&self) -> (u32, bool) {
        match self.properties.get(interface::MODEM, "SignalQuality") {
            Ok(PropertyValue::SignalQuality(quality, recent)) => (*quality, *recent),
            _ => (0, false),
        }
    }

    pub fn power_state(&self) -> PowerState {
        self.property_u32(interface::MODEM, "PowerState")
            .and_then(PowerState::from_u32)
            .unwrap_or(PowerState::Unknown)
    }

    // ------------------------------------------------------------------
    // SIM
    // ------------------------------------------------------------------

    /// The inserted SIM, if it is still alive
    pub fn sim(&self) -> Option<Arc<SimCard>> {
        self.sim.as_ref().and_then(Weak::upgrade)
    }

    /// Insert (or with `None`, remove) a SIM
    pub fn set_sim(&mut self, sim: Option<&Arc<SimCard>>) {
        self.sim = sim.map(Arc::downgrade);
        self.write_sim_path(sim.map(|sim| sim.path.clone()));
    }

    fn write_sim_path(&mut self, path: Option<String>) {
        let path = path.unwrap_or_else(|| ROOT_PATH.to_string());
        let value = PropertyValue::ObjectPath(path);
        if let Err(e) = self.write_property(interface::MODEM, "Sim", value) {
            warn!("{}: cannot write Sim: {}", self.path, e);
        }
    }

    // ------------------------------------------------------------------
    // Signals
    // ------------------------------------------------------------------

    pub(crate) fn emit(&mut self, signal: ModemSignal) {
        self.signals.push(signal);
    }

    /// Take every signal emitted since the last drain
    pub fn drain_signals(&mut self) -> Vec<ModemSignal> {
        std::mem::take(&mut self.signals)
    }

    // ------------------------------------------------------------------
    // Scheduler
    // ------------------------------------------------------------------

    /// Run `task` on this modem's context as soon as possible
    pub fn schedule(&mut self, task: impl FnOnce(&mut Modem) + Send + 'static) {
        self.scheduler.defer(Box::new(task));
    }

    /// Run `task` on this modem's context after `delay`
    pub fn schedule_after(
        &mut self,
        delay: Duration,
        task: impl FnOnce(&mut Modem) + Send + 'static,
    ) {
        self.scheduler.defer_after(delay, Box::new(task));
    }

    /// Virtual time of this modem's scheduler
    pub fn now(&self) -> Instant {
        self.scheduler.now()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    pub fn has_pending_work(&self) -> bool {
        !self.scheduler.is_empty()
    }

    /// Run every task due at `now`, returning how many ran
    pub fn run_ready(&mut self, now: Instant) -> usize {
        let mut ran = 0;
        while let Some(task) = self.scheduler.pop_due(now) {
            task(self);
            ran += 1;
        }
        ran
    }

    /// Run queued tasks in deadline order until none remain, jumping the
    /// virtual clock over delays
    pub fn run_until_idle(&mut self) -> usize {
        let mut ran = 0;
        while let Some(task) = self.scheduler.pop_next() {
            task(self);
            ran += 1;
            if ran >= MAX_TURNS {
                warn!("{}: scheduler still busy after {} tasks", self.path, ran);
                break;
            }
        }
        ran
    }

    /// Run queued tasks until `predicate` holds or the queue drains
    pub fn run_until(&mut self, mut predicate: impl FnMut(&Modem) -> bool) -> bool {
        let mut ran = 0;
        while !predicate(self) {
            let Some(task) = self.scheduler.pop_next() else {
                return false;
            };
            task(self);
            ran += 1;
            if ran >= MAX_TURNS {
                return false;
            }
        }
        true
    }

    // ------------------------------------------------------------------
    // Leases and internal steps
    // ------------------------------------------------------------------

    pub fn leases(&self) -> &LeaseTable {
        &self.leases
    }

    pub(crate) fn leases_mut(&mut self) -> &mut LeaseTable {
        &mut self.leases
    }

    /// Id of the operation currently holding the `kind` lease
    pub fn operation(&self, kind: OperationKind) -> Option<OperationId> {
        self.leases.holder(kind).map(|lease| lease.id())
    }

    /// Run `f` as an internal step
    ///
    /// Calls made inside are ones this modem makes on its own behalf (a
    /// disable tearing down bearers, a connect enabling the modem first).
    /// Fault plans never intercept them.
    pub fn internal<R>(&mut self, f: impl FnOnce(&mut Modem) -> R) -> R {
        self.internal_depth += 1;
        let result = f(self);
        self.internal_depth -= 1;
        result
    }

    /// Run `f` outside any internal step
    ///
    /// Operations make their own asynchronous calls this way, so a call is
    /// internal only when the step that issues it says so.
    pub(crate) fn external<R>(&mut self, f: impl FnOnce(&mut Modem) -> R) -> R {
        let depth = std::mem::replace(&mut self.internal_depth, 0);
        let result = f(self);
        self.internal_depth = depth;
        result
    }

    pub fn in_internal_step(&self) -> bool {
        self.internal_depth > 0
    }

    /// Whether run `id` still holds the `kind` lease and was not cancelled
    pub fn is_live(&self, kind: OperationKind, id: OperationId) -> bool {
        self.leases
            .holder(kind)
            .is_some_and(|lease| lease.id() == id && !lease.is_cancelled())
    }

    /// Run `f` on behalf of run `id` of `kind`
    ///
    /// Deferred side effects of calls made inside check [`Modem::is_live`]
    /// for this run before they apply.
    pub(crate) fn acting_for<R>(
        &mut self,
        kind: OperationKind,
        id: OperationId,
        f: impl FnOnce(&mut Modem) -> R,
    ) -> R {
        let outer = self.acting_for.replace((kind, id));
        let result = f(self);
        self.acting_for = outer;
        result
    }

    /// Run whose step issued the call being made, if any
    pub(crate) fn caller(&self) -> Option<(OperationKind, OperationId)> {
        self.acting_for
    }

    // ------------------------------------------------------------------
    // Faults and the call journal
    // ------------------------------------------------------------------

    pub fn faults(&self) -> &FaultPlan {
        &self.faults
    }

    pub(crate) fn faults_mut(&mut self) -> &mut FaultPlan {
        &mut self.faults
    }

    /// Every interceptable call made on this modem, oldest first
    pub fn calls(&self) -> &[MethodCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub(crate) fn record_call(&mut self, call: MethodCall) {
        debug!("{}: {:?}", self.path, call);
        self.calls.push(call);
    }
}

fn initial_properties(technology: &dyn Technology, device: &str) -> PropertyStore {
    let mut interfaces = InterfaceMap::new();
    interfaces.insert(interface::MODEM.to_string(), modem_properties(device));
    interfaces.insert(interface::MODEM_SIMPLE.to_string(), PropertyMap::new());
    technology.initialize_properties(&mut interfaces);
    PropertyStore::new(interfaces)
}

fn modem_properties(device: &str) -> PropertyMap {
    let strings = |values: &[&str]| values.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    PropertyMap::from([
        ("Sim".into(), PropertyValue::ObjectPath(ROOT_PATH.into())),
        ("ModemCapabilities".into(), PropertyValue::U32(0)),
        ("CurrentCapabilities".into(), PropertyValue::U32(0)),
        ("MaxBearers".into(), PropertyValue::U32(0)),
        ("MaxActiveBearers".into(), PropertyValue::U32(0)),
        ("Manufacturer".into(), PropertyValue::from("Pseudo Devices")),
        ("Model".into(), PropertyValue::from("PM-3000")),
        ("Revision".into(), PropertyValue::from("1.0")),
        ("DeviceIdentifier".into(), PropertyValue::from("PSEUDO0123456789")),
        ("Device".into(), PropertyValue::from(device)),
        ("Drivers".into(), PropertyValue::StrList(strings(&["pseudo"]))),
        ("Plugin".into(), PropertyValue::from("Pseudomodem")),
        ("EquipmentIdentifier".into(), PropertyValue::from("")),
        ("UnlockRequired".into(), PropertyValue::U32(ModemLock::None.as_u32())),
        (
            "UnlockRetries".into(),
            PropertyValue::LockRetries(BTreeMap::from([(ModemLock::SimPin.as_u32(), 3)])),
        ),
        ("State".into(), PropertyValue::I32(ModemState::Disabled.as_i32())),
        ("AccessTechnologies".into(), PropertyValue::U32(0)),
        ("SignalQuality".into(), PropertyValue::SignalQuality(100, true)),
        ("OwnNumbers".into(), PropertyValue::StrList(strings(&["5555555555"]))),
        ("PowerState".into(), PropertyValue::U32(PowerState::On.as_u32())),
        ("SupportedModes".into(), PropertyValue::U32(0)),
        ("AllowedModes".into(), PropertyValue::U32(0)),
        ("PreferredMode".into(), PropertyValue::U32(0)),
        ("SupportedBands".into(), PropertyValue::U32List(vec![0])),
        ("Bands".into(), PropertyValue::U32List(vec![0])),
    ])
}
