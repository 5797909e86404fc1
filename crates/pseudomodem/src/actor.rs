//! Modem actor
//!
//! A [`Modem`] is single-threaded and cooperative. The actor owns one, feeds
//! it [`ModemCommand`]s from a channel and runs its scheduled work against the
//! wall clock. Every signal the modem emits is broadcast to subscribers.
//!
//! # Example
//!
//! ```rust,ignore
//! use pseudomodem::{Gsm3gpp, Modem, ModemHandle};
//!
//! let handle = ModemHandle::spawn(Modem::new(Gsm3gpp::new()));
//! let mut signals = handle.subscribe();
//! handle.enable(true).await?;
//! ```

use std::time::Instant;

use mm_protocol::{
    Band, CoreError, InterfaceMap, ModemError, Modes, PowerState, PropertyMap, PropertyValue,
};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::sleep_until;
use tracing::{debug, info};

use crate::completion::{Completion, Rejected};
use crate::lease::OperationKind;
use crate::network::Network;
use crate::signal::ModemSignal;
use crate::Modem;

type Respond<T> = oneshot::Sender<Result<T, ModemError>>;

/// Commands sent to the modem actor
#[derive(Debug)]
pub enum ModemCommand {
    Enable {
        enable: bool,
        respond: Respond<()>,
    },
    Connect {
        properties: PropertyMap,
        respond: Respond<String>,
    },
    Disconnect {
        bearer: String,
        respond: Respond<()>,
    },
    RegisterWithNetwork {
        respond: Respond<()>,
    },
    Register {
        operator_code: String,
        operator_name: String,
        respond: Respond<()>,
    },
    Scan {
        respond: Respond<Vec<Network>>,
    },
    /// Cancel whichever operation of `kind` is running
    Cancel {
        kind: OperationKind,
        respond: Respond<bool>,
    },
    ListBearers {
        respond: Respond<Vec<String>>,
    },
    CreateBearer {
        properties: PropertyMap,
        respond: Respond<String>,
    },
    DeleteBearer {
        bearer: String,
        respond: Respond<()>,
    },
    Reset {
        respond: Respond<()>,
    },
    FactoryReset {
        code: String,
        respond: Respond<()>,
    },
    SetAllowedModes {
        modes: Modes,
        preferred: Modes,
        respond: Respond<()>,
    },
    SetBands {
        bands: Vec<Band>,
        respond: Respond<()>,
    },
    Command {
        cmd: String,
        timeout: u32,
        respond: Respond<String>,
    },
    SetPowerState {
        power_state: PowerState,
        respond: Respond<()>,
    },
    Get {
        interface: String,
        name: String,
        respond: Respond<PropertyValue>,
    },
    GetAll {
        interface: String,
        respond: Respond<PropertyMap>,
    },
    Set {
        interface: String,
        name: String,
        value: PropertyValue,
        respond: Respond<()>,
    },
    GetStatus {
        respond: Respond<PropertyMap>,
    },
    AllProperties {
        respond: Respond<InterfaceMap>,
    },
    ReceiveMessage {
        sender: String,
        content: String,
        respond: Respond<()>,
    },
    SetPropertyForTesting {
        interface: String,
        name: String,
        value: PropertyValue,
        respond: Respond<()>,
    },
    /// Stop the actor
    Shutdown,
}

/// Answer a synchronous command
fn reply<T>(respond: Respond<T>, result: Result<T, ModemError>) {
    if respond.send(result).is_err() {
        debug!("requester went away before the reply");
    }
}

/// Start an asynchronous command, failing the requester on rejection
fn begin<T: Send + 'static>(modem: &mut Modem, started: Result<(), Rejected<T>>) {
    if let Err(rejected) = started {
        rejected.forward(modem);
    }
}

/// Apply one command; returns false on shutdown
fn handle_command(modem: &mut Modem, cmd: ModemCommand) -> bool {
    match cmd {
        ModemCommand::Enable { enable, respond } => {
            let started = modem.enable(enable, Completion::from_sender(respond));
            begin(modem, started);
        }
        ModemCommand::Connect {
            properties,
            respond,
        } => {
            let started = modem.connect(properties, Completion::from_sender(respond));
            begin(modem, started);
        }
        ModemCommand::Disconnect { bearer, respond } => {
            let started = modem.disconnect(&bearer, Completion::from_sender(respond));
            begin(modem, started);
        }
        ModemCommand::RegisterWithNetwork { respond } => {
            let started = modem.register_with_network(Completion::from_sender(respond));
            begin(modem, started);
        }
        ModemCommand::Register {
            operator_code,
            operator_name,
            respond,
        } => modem.register(&operator_code, &operator_name, Completion::from_sender(respond)),
        ModemCommand::Scan { respond } => modem.scan(Completion::from_sender(respond)),
        ModemCommand::Cancel { kind, respond } => reply(respond, Ok(modem.cancel_current(kind))),
        ModemCommand::ListBearers { respond } => reply(respond, Ok(modem.list_bearers())),
        ModemCommand::CreateBearer {
            properties,
            respond,
        } => reply(respond, modem.create_bearer(properties)),
        ModemCommand::DeleteBearer { bearer, respond } => {
            reply(respond, modem.delete_bearer(&bearer))
        }
        ModemCommand::Reset { respond } => reply(respond, modem.reset()),
        ModemCommand::FactoryReset { code, respond } => reply(respond, modem.factory_reset(&code)),
        ModemCommand::SetAllowedModes {
            modes,
            preferred,
            respond,
        } => reply(respond, modem.set_allowed_modes(modes, preferred)),
        ModemCommand::SetBands { bands, respond } => reply(respond, modem.set_bands(&bands)),
        ModemCommand::Command {
            cmd,
            timeout,
            respond,
        } => reply(respond, modem.command(&cmd, timeout)),
        ModemCommand::SetPowerState {
            power_state,
            respond,
        } => reply(respond, modem.set_power_state(power_state)),
        ModemCommand::Get {
            interface,
            name,
            respond,
        } => reply(respond, modem.get(&interface, &name)),
        ModemCommand::GetAll { interface, respond } => reply(respond, modem.get_all(&interface)),
        ModemCommand::Set {
            interface,
            name,
            value,
            respond,
        } => reply(respond, modem.set(&interface, &name, value)),
        ModemCommand::GetStatus { respond } => reply(respond, Ok(modem.status())),
        ModemCommand::AllProperties { respond } => reply(respond, Ok(modem.all_properties())),
        ModemCommand::ReceiveMessage {
            sender,
            content,
            respond,
        } => {
            modem.receive_message(sender, content);
            reply(respond, Ok(()));
        }
        ModemCommand::SetPropertyForTesting {
            interface,
            name,
            value,
            respond,
        } => reply(respond, modem.set_property_for_testing(&interface, &name, value)),
        ModemCommand::Shutdown => return false,
    }
    true
}

fn publish(modem: &mut Modem, signal_tx: &broadcast::Sender<ModemSignal>) {
    for signal in modem.drain_signals() {
        // No subscribers is fine
        let _ = signal_tx.send(signal);
    }
}

/// Run the modem actor until shutdown or until every command sender is gone
pub async fn run_modem_actor(
    mut modem: Modem,
    mut cmd_rx: mpsc::Receiver<ModemCommand>,
    signal_tx: broadcast::Sender<ModemSignal>,
) {
    info!("{}: modem actor started", modem.path());

    loop {
        let deadline = modem.next_deadline();
        let wake = deadline
            .map(tokio::time::Instant::from_std)
            .unwrap_or_else(tokio::time::Instant::now);

        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { break; };
                // Bring the clock up to date before new work is scheduled
                modem.run_ready(Instant::now());
                if !handle_command(&mut modem, cmd) {
                    break;
                }
            }
            _ = sleep_until(wake), if deadline.is_some() => {}
        }

        modem.run_ready(Instant::now());
        publish(&mut modem, &signal_tx);
    }

    publish(&mut modem, &signal_tx);
    info!("{}: modem actor stopped", modem.path());
}

/// Async handle to a spawned modem actor
#[derive(Debug, Clone)]
pub struct ModemHandle {
    tx: mpsc::Sender<ModemCommand>,
    signals: broadcast::Sender<ModemSignal>,
}

impl ModemHandle {
    /// Spawn an actor for `modem` on the current tokio runtime
    pub fn spawn(modem: Modem) -> Self {
        let (tx, rx) = mpsc::channel(64);
        let (signals, _) = broadcast::channel(256);
        tokio::spawn(run_modem_actor(modem, rx, signals.clone()));
        Self { tx, signals }
    }

    /// Receive every signal emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ModemSignal> {
        self.signals.subscribe()
    }

    async fn call<T>(
        &self,
        build: impl FnOnce(Respond<T>) -> ModemCommand,
    ) -> Result<T, ModemError> {
        let (respond, rx) = oneshot::channel();
        self.tx.send(build(respond)).await.map_err(|_| stopped())?;
        rx.await.map_err(|_| stopped())?
    }

    pub async fn enable(&self, enable: bool) -> Result<(), ModemError> {
        self.call(|respond| ModemCommand::Enable { enable, respond })
            .await
    }

    /// Simple.Connect, returning the bearer path
    pub async fn connect(&self, properties: PropertyMap) -> Result<String, ModemError> {
        self.call(|respond| ModemCommand::Connect {
            properties,
            respond,
        })
        .await
    }

    pub async fn disconnect(&self, bearer: &str) -> Result<(), ModemError> {
        let bearer = bearer.to_string();
        self.call(|respond| ModemCommand::Disconnect { bearer, respond })
            .await
    }

    pub async fn register_with_network(&self) -> Result<(), ModemError> {
        self.call(|respond| ModemCommand::RegisterWithNetwork { respond })
            .await
    }

    pub async fn register(
        &self,
        operator_code: &str,
        operator_name: &str,
    ) -> Result<(), ModemError> {
        let operator_code = operator_code.to_string();
        let operator_name = operator_name.to_string();
        self.call(|respond| ModemCommand::Register {
            operator_code,
            operator_name,
            respond,
        })
        .await
    }

    pub async fn scan(&self) -> Result<Vec<Network>, ModemError> {
        self.call(|respond| ModemCommand::Scan { respond }).await
    }

    /// Cancel the running operation of `kind`; false if there was none
    pub async fn cancel(&self, kind: OperationKind) -> Result<bool, ModemError> {
        self.call(|respond| ModemCommand::Cancel { kind, respond })
            .await
    }

    pub async fn list_bearers(&self) -> Result<Vec<String>, ModemError> {
        self.call(|respond| ModemCommand::ListBearers { respond })
            .await
    }

    pub async fn create_bearer(&self, properties: PropertyMap) -> Result<String, ModemError> {
        self.call(|respond| ModemCommand::CreateBearer {
            properties,
            respond,
        })
        .await
    }

    pub async fn delete_bearer(&self, bearer: &str) -> Result<(), ModemError> {
        let bearer = bearer.to_string();
        self.call(|respond| ModemCommand::DeleteBearer { bearer, respond })
            .await
    }

    pub async fn reset(&self) -> Result<(), ModemError> {
        self.call(|respond| ModemCommand::Reset { respond }).await
    }

    pub async fn factory_reset(&self, code: &str) -> Result<(), ModemError> {
        let code = code.to_string();
        self.call(|respond| ModemCommand::FactoryReset { code, respond })
            .await
    }

    pub async fn set_allowed_modes(
        &self,
        modes: Modes,
        preferred: Modes,
    ) -> Result<(), ModemError> {
        self.call(|respond| ModemCommand::SetAllowedModes {
            modes,
            preferred,
            respond,
        })
        .await
    }

    pub async fn set_bands(&self, bands: Vec<Band>) -> Result<(), ModemError> {
        self.call(|respond| ModemCommand::SetBands { bands, respond })
            .await
    }

    pub async fn command(&self, cmd: &str, timeout: u32) -> Result<String, ModemError> {
        let cmd = cmd.to_string();
        self.call(|respond| ModemCommand::Command {
            cmd,
            timeout,
            respond,
        })
        .await
    }

    pub async fn set_power_state(&self, power_state: PowerState) -> Result<(), ModemError> {
        self.call(|respond| ModemCommand::SetPowerState {
            power_state,
            respond,
        })
        .await
    }

    pub async fn get(&self, interface: &str, name: &str) -> Result<PropertyValue, ModemError> {
        let interface = interface.to_string();
        let name = name.to_string();
        self.call(|respond| ModemCommand::Get {
            interface,
            name,
            respond,
        })
        .await
    }

    pub async fn get_all(&self, interface: &str) -> Result<PropertyMap, ModemError> {
        let interface = interface.to_string();
        self.call(|respond| ModemCommand::GetAll { interface, respond })
            .await
    }

    pub async fn set(
        &self,
        interface: &str,
        name: &str,
        value: PropertyValue,
    ) -> Result<(), ModemError> {
        let interface = interface.to_string();
        let name = name.to_string();
        self.call(|respond| ModemCommand::Set {
            interface,
            name,
            value,
            respond,
        })
        .await
    }

    /// Simple.GetStatus
    pub async fn status(&self) -> Result<PropertyMap, ModemError> {
        self.call(|respond| ModemCommand::GetStatus { respond })
            .await
    }

    pub async fn all_properties(&self) -> Result<InterfaceMap, ModemError> {
        self.call(|respond| ModemCommand::AllProperties { respond })
            .await
    }

    pub async fn receive_message(&self, sender: &str, content: &str) -> Result<(), ModemError> {
        let sender = sender.to_string();
        let content = content.to_string();
        self.call(|respond| ModemCommand::ReceiveMessage {
            sender,
            content,
            respond,
        })
        .await
    }

    pub async fn set_property_for_testing(
        &self,
        interface: &str,
        name: &str,
        value: PropertyValue,
    ) -> Result<(), ModemError> {
        let interface = interface.to_string();
        let name = name.to_string();
        self.call(|respond| ModemCommand::SetPropertyForTesting {
            interface,
            name,
            value,
            respond,
        })
        .await
    }

    /// Ask the actor to stop; pending requests are dropped
    pub async fn shutdown(&self) {
        if self.tx.send(ModemCommand::Shutdown).await.is_err() {
            debug!("modem actor already stopped");
        }
    }
}

fn stopped() -> ModemError {
    ModemError::core(CoreError::Aborted, "modem actor stopped")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use mm_protocol::{interface, ModemState, RegistrationState};
    use tokio::time::timeout;

    use super::*;
    use crate::{Gsm3gpp, SimCard};

    fn spawn_modem() -> (ModemHandle, Arc<SimCard>) {
        let sim = Arc::new(SimCard::new("310260", "Home"));
        let mut modem = Modem::new(Gsm3gpp::new());
        modem.set_sim(Some(&sim));
        (ModemHandle::spawn(modem), sim)
    }

    async fn wait_for_state(rx: &mut broadcast::Receiver<ModemSignal>, state: ModemState) {
        timeout(Duration::from_secs(5), async {
            loop {
                let signal = rx.recv().await.unwrap();
                if signal.new_state() == Some(state) {
                    return;
                }
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_enable_broadcasts_state_changes() {
        let (handle, _sim) = spawn_modem();
        let mut signals = handle.subscribe();

        handle.enable(true).await.unwrap();

        let first = signals.recv().await.unwrap();
        assert_eq!(first.new_state(), Some(ModemState::Enabling));
        wait_for_state(&mut signals, ModemState::Registered).await;

        let registration = handle
            .get(interface::MODEM_3GPP, "RegistrationState")
            .await
            .unwrap();
        assert_eq!(registration.as_u32(), Some(RegistrationState::Home.as_u32()));

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_connect_and_disconnect() {
        let (handle, _sim) = spawn_modem();
        let properties = PropertyMap::from([("apn".to_string(), PropertyValue::from("internet"))]);

        let bearer = handle.connect(properties).await.unwrap();
        assert_eq!(handle.list_bearers().await.unwrap(), vec![bearer.clone()]);

        handle.disconnect(&bearer).await.unwrap();
        let state = handle.get(interface::MODEM, "State").await.unwrap();
        assert_eq!(state.as_i32(), Some(ModemState::Registered.as_i32()));

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_rejection_reaches_requester() {
        let (handle, _sim) = spawn_modem();

        let err = handle.disconnect(mm_protocol::ROOT_PATH).await.unwrap_err();
        assert!(err.is(CoreError::WrongState));
        assert!(!handle.cancel(OperationKind::Register).await.unwrap());

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_message_signal() {
        let (handle, _sim) = spawn_modem();
        let mut signals = handle.subscribe();

        handle.receive_message("5551234", "hello").await.unwrap();

        match signals.recv().await.unwrap() {
            ModemSignal::MessageReceived { sender, content } => {
                assert_eq!(sender, "5551234");
                assert_eq!(content, "hello");
            }
            other => panic!("Expected MessageReceived, got {other:?}"),
        }

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_requests_after_shutdown_are_aborted() {
        let (handle, _sim) = spawn_modem();

        handle.shutdown().await;
        let err = handle.enable(true).await.unwrap_err();

        assert!(err.is(CoreError::Aborted));
    }

    #[tokio::test]
    async fn test_actor_stops_when_handles_drop() {
        let (tx, rx) = mpsc::channel(4);
        let (signals, _) = broadcast::channel(4);
        let actor = tokio::spawn(run_modem_actor(Modem::new(Gsm3gpp::new()), rx, signals));

        drop(tx);
        timeout(Duration::from_secs(5), actor).await.unwrap().unwrap();
    }
}
