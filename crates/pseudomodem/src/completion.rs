//! Asynchronous method completion
//!
//! A control method that models device latency does not return its result.
//! It takes a [`Completion`] and resolves it exactly once, with either a
//! value or a [`ModemError`], at some later point on the modem's cooperative
//! context. A completion can deliver into:
//!
//! - a oneshot channel, whose receiving end is a [`Reply`] that can be polled
//!   with [`Reply::try_take`] or awaited
//! - a callback that gets the modem back, queued on the scheduler rather than
//!   run inline
//! - nowhere, for fire-and-forget internal steps; the outcome is only logged
//!
//! Methods that admit work through the operation engine can also refuse it
//! up front. They hand the completion back untouched inside a [`Rejected`]
//! so that the caller, not the method, decides what to do with it.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use mm_protocol::{CoreError, ModemError};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::Modem;

/// Callback invoked with the modem and the method outcome
pub type Callback<T> = Box<dyn FnOnce(&mut Modem, Result<T, ModemError>) + Send>;

enum Sink<T> {
    Channel(oneshot::Sender<Result<T, ModemError>>),
    Callback(Callback<T>),
    Detached(&'static str),
}

/// Single-use continuation for an asynchronous control method
#[must_use = "a completion must be resolved or handed back"]
pub struct Completion<T> {
    sink: Sink<T>,
}

impl<T: Send + 'static> Completion<T> {
    /// Completion that delivers into a fresh channel
    pub fn channel() -> (Self, Reply<T>) {
        let (tx, rx) = oneshot::channel();
        (Self::from_sender(tx), Reply { rx })
    }

    /// Completion that delivers into an existing oneshot sender
    pub fn from_sender(tx: oneshot::Sender<Result<T, ModemError>>) -> Self {
        Self {
            sink: Sink::Channel(tx),
        }
    }

    /// Completion that runs `f` on the modem's scheduler
    pub fn callback(f: impl FnOnce(&mut Modem, Result<T, ModemError>) + Send + 'static) -> Self {
        Self {
            sink: Sink::Callback(Box::new(f)),
        }
    }

    /// Completion whose outcome is only logged under `label`
    pub fn detached(label: &'static str) -> Self {
        Self {
            sink: Sink::Detached(label),
        }
    }

    /// Adapt a completion for a method with a different success type
    pub fn map<U: Send + 'static>(self, f: impl FnOnce(U) -> T + Send + 'static) -> Completion<U> {
        Completion::callback(move |modem, result: Result<U, ModemError>| {
            self.resolve(modem, result.map(f))
        })
    }

    /// Resolve with `result`
    ///
    /// Channel sinks receive the value now. Callback sinks are queued on the
    /// modem's scheduler so they never run inside the caller's stack frame.
    pub fn complete(self, modem: &mut Modem, result: Result<T, ModemError>) {
        match self.sink {
            Sink::Callback(f) => modem.schedule(move |modem| f(modem, result)),
            sink => Self { sink }.resolve(modem, result),
        }
    }

    pub fn succeed(self, modem: &mut Modem, value: T) {
        self.complete(modem, Ok(value));
    }

    pub fn fail(self, modem: &mut Modem, error: ModemError) {
        self.complete(modem, Err(error));
    }

    fn resolve(self, modem: &mut Modem, result: Result<T, ModemError>) {
        match self.sink {
            Sink::Channel(tx) => {
                if tx.send(result).is_err() {
                    debug!("{}: completion receiver dropped", modem.path());
                }
            }
            Sink::Callback(f) => f(modem, result),
            Sink::Detached(label) => match result {
                Ok(_) => debug!("{}: {} completed", modem.path(), label),
                Err(e) => warn!("{}: {} failed: {}", modem.path(), label, e),
            },
        }
    }
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.sink {
            Sink::Channel(_) => "channel",
            Sink::Callback(_) => "callback",
            Sink::Detached(label) => label,
        };
        f.debug_tuple("Completion").field(&kind).finish()
    }
}

/// Receiving end of a channel completion
#[derive(Debug)]
pub struct Reply<T> {
    rx: oneshot::Receiver<Result<T, ModemError>>,
}

impl<T> Reply<T> {
    /// Take the outcome if the method has completed
    ///
    /// A completion dropped without being resolved reads as `Aborted`.
    pub fn try_take(&mut self) -> Option<Result<T, ModemError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(dropped())),
        }
    }
}

impl<T> Future for Reply<T> {
    type Output = Result<T, ModemError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(dropped())))
    }
}

fn dropped() -> ModemError {
    ModemError::core(CoreError::Aborted, "Method completion was dropped")
}

/// Request refused at admission, before any work started
///
/// Carries the untouched completion back to the caller.
pub struct Rejected<T> {
    pub error: ModemError,
    pub done: Completion<T>,
}

impl<T: Send + 'static> Rejected<T> {
    pub fn new(error: ModemError, done: Completion<T>) -> Self {
        Self { error, done }
    }

    /// Deliver the refusal through the completion after all
    pub fn forward(self, modem: &mut Modem) {
        self.done.fail(modem, self.error);
    }

    pub fn into_error(self) -> ModemError {
        self.error
    }
}

impl<T> fmt::Debug for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected").field("error", &self.error).finish()
    }
}

impl<T> From<Rejected<T>> for ModemError {
    fn from(rejected: Rejected<T>) -> Self {
        rejected.error
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::Gsm3gpp;

    fn modem() -> Modem {
        Modem::new(Gsm3gpp::new())
    }

    #[test]
    fn test_channel_delivers_immediately() {
        let mut modem = modem();
        let (done, mut reply) = Completion::<u32>::channel();
        assert!(reply.try_take().is_none());
        done.succeed(&mut modem, 7);
        assert_eq!(reply.try_take(), Some(Ok(7)));
    }

    #[test]
    fn test_dropped_completion_reads_as_aborted() {
        let (done, mut reply) = Completion::<()>::channel();
        drop(done);
        let err = reply.try_take().unwrap().unwrap_err();
        assert!(err.is(CoreError::Aborted));
    }

    #[test]
    fn test_callback_is_deferred_and_runs_once() {
        let mut modem = modem();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let done = Completion::<()>::callback(move |_, result| {
            assert!(result.is_ok());
            seen.fetch_add(1, Ordering::SeqCst);
        });

        done.succeed(&mut modem, ());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        modem.run_until_idle();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_map_adapts_success_and_passes_errors() {
        let mut modem = modem();
        let (done, mut reply) = Completion::<String>::channel();
        let mapped = done.map(|n: u32| format!("bearer/{n}"));
        mapped.succeed(&mut modem, 4);
        modem.run_until_idle();
        assert_eq!(reply.try_take(), Some(Ok("bearer/4".to_string())));

        let (done, mut reply) = Completion::<String>::channel();
        let mapped = done.map(|n: u32| n.to_string());
        mapped.fail(&mut modem, ModemError::core(CoreError::Failed, "boom"));
        modem.run_until_idle();
        assert!(reply.try_take().unwrap().unwrap_err().is(CoreError::Failed));
    }

    #[test]
    fn test_rejected_forward_uses_failure_path() {
        let mut modem = modem();
        let (done, mut reply) = Completion::<()>::channel();
        let rejected = Rejected::new(ModemError::core(CoreError::InProgress, "busy"), done);
        rejected.forward(&mut modem);
        assert!(reply.try_take().unwrap().unwrap_err().is(CoreError::InProgress));
    }

    #[tokio::test]
    async fn test_reply_is_awaitable() {
        let mut modem = modem();
        let (done, reply) = Completion::<u32>::channel();
        done.succeed(&mut modem, 42);
        assert_eq!(reply.await, Ok(42));
    }
}
