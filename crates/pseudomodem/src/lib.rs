//! Simulated Cellular Modem
//!
//! This crate provides a software modem that answers the ModemManager1
//! control plane (properties, control methods, signals) well enough to drive
//! a connection manager through realistic state transitions without hardware.
//!
//! # Architecture
//!
//! - **Device record**: [`Modem`] owns the property store, bearers, leases and
//!   a cooperative [`scheduler`]. Writing `State` always emits `StateChanged`.
//! - **Async methods**: slow methods resolve a [`Completion`] exactly once,
//!   later on the same context. Requests refused at admission come back as a
//!   [`Rejected`] instead.
//! - **Operation engine**: enable, disable, register, connect and disconnect
//!   are [`machine::Operation`]s driven by one generic engine. A per-kind
//!   [`Lease`] keeps two operations of the same kind from overlapping.
//! - **Technology**: radio-family behavior is a [`Technology`] capability;
//!   [`Gsm3gpp`] fills in scanning and registration, [`GenericModem`] nothing.
//! - **Fault injection**: a [`FaultPlan`] scripts failures per method and call
//!   count. Steps one operation runs on behalf of another bypass it.
//! - **Actor**: [`ModemHandle`] runs a modem on tokio against the wall clock.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use mm_protocol::{ModemState, RegistrationState};
//! use pseudomodem::{Completion, Gsm3gpp, Modem, SimCard};
//!
//! let sim = Arc::new(SimCard::new("310260", "Home"));
//! let mut modem = Modem::new(Gsm3gpp::new());
//! modem.set_sim(Some(&sim));
//!
//! let (done, mut reply) = Completion::channel();
//! modem.enable(true, done).unwrap();
//! modem.run_until_idle();
//!
//! assert_eq!(reply.try_take(), Some(Ok(())));
//! assert_eq!(modem.state(), ModemState::Registered);
//! assert_eq!(modem.registration_state(), Some(RegistrationState::Home));
//! ```

pub mod actor;
pub mod bearer;
pub mod completion;
pub mod config;
mod control;
pub mod fault;
pub mod gsm3gpp;
pub mod lease;
pub mod machine;
pub mod modem;
pub mod network;
pub mod properties;
pub mod scheduler;
pub mod signal;
pub mod sim;
pub mod technology;
pub mod testing;
pub mod timing;

pub use actor::{run_modem_actor, ModemCommand, ModemHandle};
pub use bearer::{Bearer, ALLOWED_BEARER_PROPERTIES};
pub use completion::{Completion, Rejected, Reply};
pub use config::{ConfigError, ModemConfig, TechnologyKind};
pub use control::COMMAND_RESPONSE;
pub use fault::{FaultBehavior, FaultPlan, FaultRule, Method, MethodCall};
pub use gsm3gpp::Gsm3gpp;
pub use lease::{CancelPolicy, Lease, LeaseTable, OperationId, OperationKind, Restore};
pub use machine::{Operation, Step};
pub use modem::Modem;
pub use network::Network;
pub use signal::ModemSignal;
pub use sim::SimCard;
pub use technology::{GenericModem, Technology};
pub use testing::ReceivedMessage;
pub use timing::TimingConfig;
