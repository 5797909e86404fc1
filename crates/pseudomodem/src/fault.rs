//! Fault injection
//!
//! A [`FaultPlan`] is attached to a modem at construction and scripts how its
//! asynchronous control methods misbehave. Each [`Method`] gets an ordered
//! list of [`FaultBehavior`]s; the Nth external call uses the Nth entry (the
//! last entry repeats once the list runs out).
//!
//! Calls made from inside [`Modem::internal`] bypass the plan entirely and do
//! not advance its call count, so a plan aimed at one scenario never disturbs
//! the steps other operations take on their own behalf.
//!
//! ```rust
//! use mm_protocol::{ConnectionError, ModemError};
//! use pseudomodem::{FaultBehavior, FaultPlan, Method};
//!
//! // First disconnect works, every later one fails
//! let plan = FaultPlan::none().on(
//!     Method::Disconnect,
//!     vec![FaultBehavior::FailAfter {
//!         successes: 1,
//!         error: ModemError::connection(ConnectionError::NoCarrier, "line dropped"),
//!     }],
//! );
//! assert!(!plan.is_empty());
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use mm_protocol::{ModemError, ModemState, StateChangeReason};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::completion::{Completion, Rejected};
use crate::Modem;

/// Control methods a plan can intercept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Enable,
    Connect,
    Disconnect,
    Register,
    RegisterWithNetwork,
    Scan,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Enable => "Enable",
            Method::Connect => "Connect",
            Method::Disconnect => "Disconnect",
            Method::Register => "Register",
            Method::RegisterWithNetwork => "RegisterWithNetwork",
            Method::Scan => "Scan",
        };
        f.write_str(name)
    }
}

/// What one call to an intercepted method does
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "behavior", rename_all = "snake_case")]
pub enum FaultBehavior {
    /// Run the real method
    Default,
    /// Fail through the completion without doing anything
    Fail { error: ModemError },
    /// Move to `hold_state`, wait, then restore the prior state and fail
    DelayedFail {
        #[serde(default)]
        hold_state: Option<ModemState>,
        delay_ms: u64,
        error: ModemError,
    },
    /// Run the real method for the first `successes` calls, then fail
    FailAfter { successes: u32, error: ModemError },
}

/// Behaviors for one method, as written in a config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultRule {
    pub method: Method,
    pub behaviors: Vec<FaultBehavior>,
}

#[derive(Debug, Clone, Default)]
struct Script {
    behaviors: Vec<FaultBehavior>,
    calls: u32,
}

/// Per-method fault scripts
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    scripts: BTreeMap<Method, Script>,
}

/// Resolved decision for one call
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Fault {
    Proceed,
    Fail(ModemError),
    DelayedFail {
        hold_state: Option<ModemState>,
        delay: Duration,
        error: ModemError,
    },
}

impl FaultPlan {
    /// Plan that never interferes
    pub fn none() -> Self {
        Self::default()
    }

    /// Script `method` with `behaviors`, replacing any earlier script
    pub fn on(mut self, method: Method, behaviors: Vec<FaultBehavior>) -> Self {
        self.scripts.insert(
            method,
            Script {
                behaviors,
                calls: 0,
            },
        );
        self
    }

    pub fn from_rules(rules: &[FaultRule]) -> Self {
        rules.iter().fold(Self::none(), |plan, rule| {
            plan.on(rule.method, rule.behaviors.clone())
        })
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// External calls seen so far for `method`
    pub fn calls(&self, method: Method) -> u32 {
        self.scripts.get(&method).map_or(0, |script| script.calls)
    }

    /// Decide the next external call to `method` and count it
    pub(crate) fn next(&mut self, method: Method) -> Fault {
        let Some(script) = self.scripts.get_mut(&method) else {
            return Fault::Proceed;
        };
        let index = script.calls;
        script.calls += 1;
        let behavior = script
            .behaviors
            .get(index as usize)
            .or_else(|| script.behaviors.last())
            .cloned()
            .unwrap_or(FaultBehavior::Default);

        match behavior {
            FaultBehavior::Default => Fault::Proceed,
            FaultBehavior::Fail { error } => Fault::Fail(error),
            FaultBehavior::DelayedFail {
                hold_state,
                delay_ms,
                error,
            } => Fault::DelayedFail {
                hold_state,
                delay: Duration::from_millis(delay_ms),
                error,
            },
            FaultBehavior::FailAfter { successes, error } => {
                if index < successes {
                    Fault::Proceed
                } else {
                    Fault::Fail(error)
                }
            }
        }
    }
}

/// One interceptable call, as recorded in the modem's journal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodCall {
    pub method: Method,
    pub args: Vec<String>,
    /// Made from inside an internal step
    pub internal: bool,
}

impl Modem {
    /// Route a call to `method` through the fault plan
    ///
    /// `base` is the real method. It only runs if the plan says so; injected
    /// failures are delivered through `done` and never rejected up front.
    pub(crate) fn intercept<T: Send + 'static>(
        &mut self,
        method: Method,
        args: Vec<String>,
        done: Completion<T>,
        base: impl FnOnce(&mut Modem, Completion<T>) -> Result<(), Rejected<T>>,
    ) -> Result<(), Rejected<T>> {
        let internal = self.in_internal_step();
        self.record_call(MethodCall {
            method,
            args,
            internal,
        });
        let fault = if internal {
            Fault::Proceed
        } else {
            self.faults_mut().next(method)
        };

        match fault {
            Fault::Proceed => base(self, done),
            Fault::Fail(error) => {
                info!("{}: injected {} failure: {}", self.path(), method, error);
                done.fail(self, error);
                Ok(())
            }
            Fault::DelayedFail {
                hold_state,
                delay,
                error,
            } => {
                info!(
                    "{}: injected {} failure after {:?}: {}",
                    self.path(),
                    method,
                    delay,
                    error
                );
                let before = self.state();
                if let Some(hold) = hold_state {
                    self.change_state(hold, StateChangeReason::UserRequested);
                }
                self.schedule_after(delay, move |modem| {
                    if hold_state.is_some_and(|hold| modem.state() == hold) {
                        modem.change_state(before, StateChangeReason::Unknown);
                    }
                    done.fail(modem, error);
                });
                Ok(())
            }
        }
    }
}
