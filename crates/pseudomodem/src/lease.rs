//! Per-kind operation leases
//!
//! A lease is the right to drive a modem through one kind of multi-step
//! operation. At most one lease per [`OperationKind`] exists at a time; kinds
//! are independent of each other. Leases survive across suspension points,
//! which is what lets a second same-kind request fail fast instead of
//! interleaving with the first.
//!
//! Only the operation engine acquires leases. Everything else can look.

use std::collections::BTreeMap;
use std::fmt;

use mm_protocol::{CoreError, ModemError, ModemState, RegistrationState};

/// Kinds of multi-step operation, each with its own lease slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationKind {
    Enable,
    Disable,
    Register,
    Connect,
    Disconnect,
}

impl OperationKind {
    pub const ALL: [OperationKind; 5] = [
        OperationKind::Enable,
        OperationKind::Disable,
        OperationKind::Register,
        OperationKind::Connect,
        OperationKind::Disconnect,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::Enable => "Enable",
            OperationKind::Disable => "Disable",
            OperationKind::Register => "Register",
            OperationKind::Connect => "Connect",
            OperationKind::Disconnect => "Disconnect",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identifies one admitted operation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(u64);

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op#{}", self.0)
    }
}

/// Where a cancelled operation puts the modem back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Restore {
    /// The State and RegistrationState seen at admission
    PreOperation,
    /// A fixed state, registration state untouched
    State(ModemState),
}

/// How an operation reacts to cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelPolicy {
    /// States in which cancellation rolls back immediately
    pub interruptible: &'static [ModemState],
    pub restore: Restore,
}

impl CancelPolicy {
    /// Cancellation is only observed at the next step
    pub const DEFERRED: CancelPolicy = CancelPolicy {
        interruptible: &[],
        restore: Restore::PreOperation,
    };
}

/// A held lease
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    id: OperationId,
    kind: OperationKind,
    state_before: ModemState,
    registration_before: Option<RegistrationState>,
    policy: CancelPolicy,
    cancelled: bool,
}

impl Lease {
    pub fn id(&self) -> OperationId {
        self.id
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn state_before(&self) -> ModemState {
        self.state_before
    }

    pub fn registration_before(&self) -> Option<RegistrationState> {
        self.registration_before
    }

    pub fn policy(&self) -> CancelPolicy {
        self.policy
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// State pair a cancellation restores
    pub fn restore_target(&self) -> (ModemState, Option<RegistrationState>) {
        match self.policy.restore {
            Restore::PreOperation => (self.state_before, self.registration_before),
            Restore::State(state) => (state, None),
        }
    }
}

/// One lease slot per operation kind
#[derive(Debug, Default)]
pub struct LeaseTable {
    slots: BTreeMap<OperationKind, Lease>,
    next_id: u64,
}

impl LeaseTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn holder(&self, kind: OperationKind) -> Option<&Lease> {
        self.slots.get(&kind)
    }

    pub fn is_held(&self, kind: OperationKind) -> bool {
        self.slots.contains_key(&kind)
    }

    /// Held and not already cancelled
    pub fn is_pending(&self, kind: OperationKind) -> bool {
        self.slots.get(&kind).is_some_and(|lease| !lease.cancelled)
    }

    /// True if `id` currently holds the `kind` lease
    pub fn holds(&self, kind: OperationKind, id: OperationId) -> bool {
        self.slots.get(&kind).is_some_and(|lease| lease.id == id)
    }

    pub fn held(&self) -> impl Iterator<Item = &Lease> {
        self.slots.values()
    }

    pub(crate) fn acquire(
        &mut self,
        kind: OperationKind,
        state_before: ModemState,
        registration_before: Option<RegistrationState>,
        policy: CancelPolicy,
    ) -> Result<OperationId, ModemError> {
        if let Some(lease) = self.slots.get(&kind) {
            return Err(in_progress(kind, lease.id));
        }
        self.next_id += 1;
        let id = OperationId(self.next_id);
        self.slots.insert(
            kind,
            Lease {
                id,
                kind,
                state_before,
                registration_before,
                policy,
                cancelled: false,
            },
        );
        Ok(id)
    }

    /// Release the `kind` lease if `id` holds it
    pub(crate) fn release(&mut self, kind: OperationKind, id: OperationId) -> bool {
        if self.holds(kind, id) {
            self.slots.remove(&kind);
            true
        } else {
            false
        }
    }

    pub(crate) fn mark_cancelled(&mut self, kind: OperationKind, id: OperationId) -> bool {
        match self.slots.get_mut(&kind) {
            Some(lease) if lease.id == id => {
                lease.cancelled = true;
                true
            }
            _ => false,
        }
    }
}

pub(crate) fn in_progress(kind: OperationKind, holder: OperationId) -> ModemError {
    ModemError::core(
        CoreError::InProgress,
        format!("{kind} already in progress ({holder})"),
    )
}
