//! Operation engine
//!
//! Multi-step procedures (enable, disable, register, connect, disconnect)
//! all run on the same engine. An [`Operation`] supplies:
//!
//! - the states it may start from
//! - a table mapping modem states to handlers
//! - how to absorb the events its asynchronous calls complete with
//! - a rollback to a stable state when it fails
//! - a cancel policy
//!
//! # Lifecycle
//!
//! 1. **Admission** ([`start`]): if another operation holds this kind's
//!    lease the request fails with `InProgress`; if the operation's own
//!    checks or the start-state list reject the current state it fails
//!    (`WrongState` for the latter). Either way nothing has changed yet and
//!    the completion is handed back inside [`Rejected`]. Otherwise the lease
//!    is acquired.
//! 2. **Dispatch**: the handler for the modem's *current* state runs. It
//!    advances the state itself and returns a [`Step`]: keep going, await an
//!    asynchronous call, poll again later, or stop. When no handler matches
//!    the current state the operation is finished.
//! 3. **Completion**: success releases the lease and resolves the caller's
//!    completion with [`Operation::finish`]. Any error rolls the modem back,
//!    releases the lease and resolves the completion with that same error.
//! 4. **Cancellation** ([`cancel`]): a no-op unless the given run holds the
//!    lease. In an interruptible state the modem is restored and the lease
//!    released at once; otherwise the run stops at its next step. A
//!    cancelled run resolves its completion with `Cancelled`.

mod connect;
mod disable;
mod disconnect;
mod enable;
mod register;

use std::time::Duration;

use mm_protocol::{CoreError, ModemError, ModemState, StateChangeReason};
use tracing::{debug, info, warn};

use crate::completion::{Completion, Rejected};
use crate::lease::{self, CancelPolicy, OperationId, OperationKind};
use crate::Modem;

pub use connect::{ConnectEvent, ConnectMachine};
pub use disable::{DisableEvent, DisableMachine};
pub use disconnect::{DisconnectEvent, DisconnectMachine};
pub use enable::{EnableEvent, EnableMachine};
pub use register::{RegisterEvent, RegisterMachine};

/// State handler
pub type Handler<M> = fn(&mut M, &mut Modem) -> Result<Step<M>, ModemError>;

/// State to handler lookup table
pub type HandlerTable<M> = &'static [(ModemState, Handler<M>)];

/// Asynchronous call a handler suspends on
pub type AsyncCall<E> = Box<dyn FnOnce(&mut Modem, Completion<E>) + Send>;

/// What a handler asks the engine to do next
pub enum Step<M: Operation> {
    /// The state has advanced; dispatch again now
    Continue,
    /// Suspend until the call resolves, then feed the event back
    Await(AsyncCall<M::Event>),
    /// Dispatch again after a delay, without an event
    Wait(Duration),
    /// Stop advancing and finish
    Done,
}

impl<M: Operation> Step<M> {
    pub fn call(f: impl FnOnce(&mut Modem, Completion<M::Event>) + Send + 'static) -> Self {
        Step::Await(Box::new(f))
    }

    /// Resume with `event` once `delay` of simulated latency has passed
    pub fn after(delay: Duration, event: M::Event) -> Self {
        Step::call(move |modem, done| {
            modem.schedule_after(delay, move |modem| done.succeed(modem, event));
        })
    }
}

/// A multi-step procedure driven by the engine
pub trait Operation: Send + Sized + 'static {
    /// What asynchronous calls complete with
    type Event: Send + 'static;
    /// What the caller receives on success
    type Output: Send + 'static;

    const KIND: OperationKind;

    fn start_states(&self) -> &'static [ModemState];

    fn handlers(&self) -> HandlerTable<Self>;

    /// Extra admission checks, run after the lease check and before the
    /// start-state check
    fn admit(&self, _modem: &Modem) -> Result<(), ModemError> {
        Ok(())
    }

    fn on_event(&mut self, modem: &mut Modem, event: Self::Event) -> Result<(), ModemError>;

    /// Put the modem back into a stable state after a failure
    fn rollback(&mut self, modem: &mut Modem);

    fn cancel_policy(&self) -> CancelPolicy {
        CancelPolicy::DEFERRED
    }

    fn finish(&mut self, modem: &mut Modem) -> Result<Self::Output, ModemError>;
}

struct Run<M: Operation> {
    id: OperationId,
    op: M,
    done: Completion<M::Output>,
}

/// Admit `op` and start driving it
pub fn start<M: Operation>(
    modem: &mut Modem,
    op: M,
    done: Completion<M::Output>,
) -> Result<OperationId, Rejected<M::Output>> {
    let kind = M::KIND;
    if let Some(lease) = modem.leases().holder(kind) {
        let error = lease::in_progress(kind, lease.id());
        warn!("{}: rejecting {}: {}", modem.path(), kind, error);
        return Err(Rejected::new(error, done));
    }
    if let Err(error) = op.admit(modem) {
        warn!("{}: rejecting {}: {}", modem.path(), kind, error);
        return Err(Rejected::new(error, done));
    }
    let state = modem.state();
    if !op.start_states().contains(&state) {
        let error = ModemError::core(
            CoreError::WrongState,
            format!("Cannot start {kind} while modem is {state}"),
        );
        warn!("{}: rejecting {}: {}", modem.path(), kind, error);
        return Err(Rejected::new(error, done));
    }

    let registration = modem.registration_state();
    let id = match modem
        .leases_mut()
        .acquire(kind, state, registration, op.cancel_policy())
    {
        Ok(id) => id,
        Err(error) => return Err(Rejected::new(error, done)),
    };
    info!("{}: {} {} started in {}", modem.path(), kind, id, state);
    dispatch(modem, Run { id, op, done });
    Ok(id)
}

/// Cancel run `id` of `kind`
///
/// Returns whether anything happened. Never fails.
pub fn cancel(modem: &mut Modem, kind: OperationKind, id: OperationId) -> bool {
    let Some(lease) = modem
        .leases()
        .holder(kind)
        .filter(|lease| lease.id() == id && !lease.is_cancelled())
        .cloned()
    else {
        debug!("{}: cancel {} {}: not the holder", modem.path(), kind, id);
        return false;
    };

    let state = modem.state();
    if lease.policy().interruptible.contains(&state) {
        let (restore_state, restore_registration) = lease.restore_target();
        if let Some(registration) = restore_registration {
            if let Err(e) = modem.set_registration_state(registration) {
                debug!("{}: cancel {}: {}", modem.path(), kind, e);
            }
        }
        if state != restore_state {
            modem.change_state(restore_state, StateChangeReason::Unknown);
        }
        modem.leases_mut().release(kind, id);
        info!("{}: {} {} cancelled in {}", modem.path(), kind, id, state);
    } else {
        modem.leases_mut().mark_cancelled(kind, id);
        info!(
            "{}: {} {} cancelled in {}, stopping at next step",
            modem.path(),
            kind,
            id,
            state
        );
    }
    true
}

fn live<M: Operation>(modem: &Modem, run: &Run<M>) -> bool {
    modem.is_live(M::KIND, run.id)
}

fn dispatch<M: Operation>(modem: &mut Modem, mut run: Run<M>) {
    loop {
        if !live(modem, &run) {
            return abandon(modem, run);
        }
        let state = modem.state();
        let handler = run
            .op
            .handlers()
            .iter()
            .find(|(s, _)| *s == state)
            .map(|(_, handler)| *handler);
        let Some(handler) = handler else {
            return succeed(modem, run);
        };

        debug!("{}: {} {} handling {}", modem.path(), M::KIND, run.id, state);
        match handler(&mut run.op, modem) {
            Ok(Step::Continue) => {
                if modem.state() == state {
                    let error = ModemError::core(
                        CoreError::Failed,
                        format!("{} stalled in {}", M::KIND, state),
                    );
                    return fail(modem, run, error);
                }
            }
            Ok(Step::Await(call)) => {
                let id = run.id;
                let resume_with =
                    Completion::callback(move |modem, result| resume(modem, run, result));
                modem.external(|modem| {
                    modem.acting_for(M::KIND, id, |modem| call(modem, resume_with))
                });
                return;
            }
            Ok(Step::Wait(delay)) => {
                modem.schedule_after(delay, move |modem| dispatch(modem, run));
                return;
            }
            Ok(Step::Done) => return succeed(modem, run),
            Err(error) => return fail(modem, run, error),
        }
    }
}

fn resume<M: Operation>(modem: &mut Modem, mut run: Run<M>, result: Result<M::Event, ModemError>) {
    if !live(modem, &run) {
        return abandon(modem, run);
    }
    match result.and_then(|event| run.op.on_event(modem, event)) {
        Ok(()) => dispatch(modem, run),
        Err(error) => fail(modem, run, error),
    }
}

fn succeed<M: Operation>(modem: &mut Modem, mut run: Run<M>) {
    match run.op.finish(modem) {
        Ok(output) => {
            modem.leases_mut().release(M::KIND, run.id);
            info!("{}: {} {} completed in {}", modem.path(), M::KIND, run.id, modem.state());
            run.done.succeed(modem, output);
        }
        Err(error) => fail(modem, run, error),
    }
}

fn fail<M: Operation>(modem: &mut Modem, mut run: Run<M>, error: ModemError) {
    warn!(
        "{}: {} {} failed in {}: {}",
        modem.path(),
        M::KIND,
        run.id,
        modem.state(),
        error
    );
    run.op.rollback(modem);
    modem.leases_mut().release(M::KIND, run.id);
    run.done.fail(modem, error);
}

/// A cancelled run reached a step
///
/// If it still holds a lease marked cancelled, it rolls back and releases.
/// If the lease is already gone, cancellation restored the modem and this
/// run only has to drop its working data.
fn abandon<M: Operation>(modem: &mut Modem, mut run: Run<M>) {
    if modem.leases().holds(M::KIND, run.id) {
        run.op.rollback(modem);
        modem.leases_mut().release(M::KIND, run.id);
    }
    debug!("{}: {} {} abandoned", modem.path(), M::KIND, run.id);
    run.done.fail(
        modem,
        ModemError::core(CoreError::Cancelled, format!("{} was cancelled", M::KIND)),
    );
}

impl Modem {
    /// Cancel run `id` of `kind`; see [`cancel`]
    pub fn cancel(&mut self, kind: OperationKind, id: OperationId) -> bool {
        cancel(self, kind, id)
    }

    /// Cancel whichever run currently holds the `kind` lease
    pub fn cancel_current(&mut self, kind: OperationKind) -> bool {
        match self.operation(kind) {
            Some(id) => cancel(self, kind, id),
            None => false,
        }
    }
}
