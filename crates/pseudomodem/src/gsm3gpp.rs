//! 3GPP (GSM/UMTS/LTE) technology

use mm_protocol::{
    interface, AccessTechnologies, Band, Capabilities, CoreError, InterfaceMap,
    MobileEquipmentError, ModemError, ModemState, Modes, PropertyMap, PropertyValue,
    RegistrationState, StateChangeReason,
};
use tracing::{debug, info};

use crate::completion::{Completion, Rejected};
use crate::machine::{self, RegisterMachine};
use crate::network::Network;
use crate::technology::Technology;
use crate::Modem;

const SUPPORTED_BANDS: &[Band] = &[
    Band::EGSM,
    Band::DCS,
    Band::PCS,
    Band::G850,
    Band::U2100,
    Band::U1800,
    Band::U17IV,
    Band::U800,
    Band::U850,
];

const DEFAULT_BANDS: &[Band] = &[
    Band::EGSM,
    Band::DCS,
    Band::PCS,
    Band::G850,
    Band::U2100,
    Band::U800,
    Band::U850,
];

/// 3GPP modem behavior
///
/// Scans report the configured roaming networks first and the SIM's home
/// network last.
#[derive(Debug, Clone)]
pub struct Gsm3gpp {
    imei: String,
    roaming_networks: Vec<Network>,
    home_network_visible: bool,
}

impl Gsm3gpp {
    pub fn new() -> Self {
        Self {
            imei: "356938035643809".to_string(),
            roaming_networks: Vec::new(),
            home_network_visible: true,
        }
    }

    pub fn with_imei(mut self, imei: impl Into<String>) -> Self {
        self.imei = imei.into();
        self
    }

    pub fn with_roaming_networks(mut self, networks: Vec<Network>) -> Self {
        self.roaming_networks = networks;
        self
    }

    /// Whether scans see the SIM's home network
    pub fn with_home_network(mut self, visible: bool) -> Self {
        self.home_network_visible = visible;
        self
    }

    fn visible_networks(&self, modem: &Modem) -> Vec<Network> {
        let mut networks = self.roaming_networks.clone();
        if self.home_network_visible {
            if let Some(sim) = modem.sim() {
                networks.push(
                    Network::new(sim.operator_identifier.clone(), sim.operator_name.clone())
                        .with_access_technology(sim.access_technology),
                );
            }
        }
        networks
    }
}

impl Default for Gsm3gpp {
    fn default() -> Self {
        Self::new()
    }
}

fn bands(list: &[Band]) -> PropertyValue {
    PropertyValue::U32List(list.iter().map(|band| band.as_u32()).collect())
}

impl Technology for Gsm3gpp {
    fn name(&self) -> &'static str {
        "3gpp"
    }

    fn initialize_properties(&self, interfaces: &mut InterfaceMap) {
        let caps = (Capabilities::GSM_UMTS | Capabilities::LTE).bits();
        if let Some(modem) = interfaces.get_mut(interface::MODEM) {
            modem.insert("ModemCapabilities".into(), PropertyValue::U32(caps));
            modem.insert("CurrentCapabilities".into(), PropertyValue::U32(caps));
            modem.insert("MaxBearers".into(), PropertyValue::U32(3));
            modem.insert("MaxActiveBearers".into(), PropertyValue::U32(2));
            modem.insert("EquipmentIdentifier".into(), PropertyValue::from(self.imei.as_str()));
            modem.insert(
                "AccessTechnologies".into(),
                PropertyValue::U32((AccessTechnologies::GSM | AccessTechnologies::UMTS).bits()),
            );
            modem.insert("SupportedModes".into(), PropertyValue::U32(Modes::ANY.bits()));
            modem.insert("AllowedModes".into(), PropertyValue::U32(Modes::ANY.bits()));
            modem.insert("PreferredMode".into(), PropertyValue::U32(Modes::NONE.bits()));
            modem.insert("SupportedBands".into(), bands(SUPPORTED_BANDS));
            modem.insert("Bands".into(), bands(DEFAULT_BANDS));
        }
        interfaces.insert(
            interface::MODEM_3GPP.to_string(),
            PropertyMap::from([
                ("Imei".into(), PropertyValue::from(self.imei.as_str())),
                (
                    "RegistrationState".into(),
                    PropertyValue::U32(RegistrationState::Idle.as_u32()),
                ),
                ("OperatorCode".into(), PropertyValue::from("")),
                ("OperatorName".into(), PropertyValue::from("")),
                ("EnabledFacilityLocks".into(), PropertyValue::U32(0)),
            ]),
        );
    }

    fn status(&self, modem: &Modem) -> PropertyMap {
        let mut status = PropertyMap::from([(
            "state".to_string(),
            PropertyValue::I32(modem.state().as_i32()),
        )]);
        if modem.state() >= ModemState::Registered {
            let (quality, recent) = modem.signal_quality();
            status.insert("signal-quality".into(), PropertyValue::SignalQuality(quality, recent));
            if let Ok(bands) = modem.get(interface::MODEM, "Bands") {
                status.insert("bands".into(), bands);
            }
            if let Some(sim) = modem.sim() {
                status.insert(
                    "access-technology".into(),
                    PropertyValue::U32(sim.access_technology.bits()),
                );
            }
            if let Some(registration) = modem.registration_state() {
                status.insert(
                    "m3gpp-registration-state".into(),
                    PropertyValue::U32(registration.as_u32()),
                );
            }
            for (key, name) in [
                ("m3gpp-operator-code", "OperatorCode"),
                ("m3gpp-operator-name", "OperatorName"),
            ] {
                if let Ok(value) = modem.get(interface::MODEM_3GPP, name) {
                    status.insert(key.into(), value);
                }
            }
        }
        status
    }

    fn register_with_network(
        &self,
        modem: &mut Modem,
        done: Completion<()>,
    ) -> Result<(), Rejected<()>> {
        machine::start(modem, RegisterMachine::new(), done).map(|_| ())
    }

    fn unregister_with_network(&self, modem: &mut Modem) -> Result<(), ModemError> {
        modem.set_registration_state(RegistrationState::Idle)?;
        for name in ["OperatorCode", "OperatorName"] {
            modem.write_property(interface::MODEM_3GPP, name, PropertyValue::from(""))?;
        }
        if modem.state() == ModemState::Registered {
            modem.change_state(ModemState::Enabled, StateChangeReason::UserRequested);
        }
        Ok(())
    }

    fn scan(&self, modem: &mut Modem, done: Completion<Vec<Network>>) {
        if modem.state() < ModemState::Enabled {
            done.fail(
                modem,
                ModemError::core(
                    CoreError::WrongState,
                    "Modem not enabled, cannot scan for networks.",
                ),
            );
            return;
        }
        if modem.sim().is_none() {
            done.fail(
                modem,
                ModemError::mobile_equipment(
                    MobileEquipmentError::SimNotInserted,
                    "Cannot scan for networks because no SIM is inserted.",
                ),
            );
            return;
        }
        let networks = self.visible_networks(modem);
        info!("{}: scan found {} network(s)", modem.path(), networks.len());
        let delay = modem.timing().scan();
        modem.schedule_after(delay, move |modem| done.succeed(modem, networks));
    }

    fn register(
        &self,
        modem: &mut Modem,
        operator_code: &str,
        operator_name: &str,
        done: Completion<()>,
    ) {
        let registration = if operator_code.is_empty() {
            RegistrationState::Home
        } else {
            match modem.sim() {
                Some(sim) if sim.operator_identifier == operator_code => RegistrationState::Home,
                Some(_) => RegistrationState::Roaming,
                None => {
                    done.fail(
                        modem,
                        ModemError::mobile_equipment(
                            MobileEquipmentError::SimNotInserted,
                            "Cannot register without a SIM.",
                        ),
                    );
                    return;
                }
            }
        };
        let code = operator_code.to_string();
        let name = operator_name.to_string();
        let caller = modem.caller();
        let delay = modem.timing().register();
        modem.schedule_after(delay, move |modem| {
            if let Some((kind, id)) = caller.filter(|&(kind, id)| !modem.is_live(kind, id)) {
                debug!("{}: {} {} gone, not registering", modem.path(), kind, id);
                let error = ModemError::core(CoreError::Cancelled, "Registration was cancelled.");
                return done.fail(modem, error);
            }
            let applied = modem
                .set_registration_state(registration)
                .and_then(|()| {
                    let code = PropertyValue::from(code);
                    modem.write_property(interface::MODEM_3GPP, "OperatorCode", code)
                })
                .and_then(|()| {
                    let name = PropertyValue::from(name);
                    modem.write_property(interface::MODEM_3GPP, "OperatorName", name)
                });
            match applied {
                Ok(()) => {
                    info!("{}: registered ({})", modem.path(), registration);
                    modem.change_state(ModemState::Registered, StateChangeReason::UserRequested);
                    done.succeed(modem, ());
                }
                Err(e) => done.fail(modem, e),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::SimCard;

    fn enabled_modem(tech: Gsm3gpp) -> (Modem, Arc<SimCard>) {
        let sim = Arc::new(SimCard::new("310260", "Home"));
        let mut modem = Modem::new(tech);
        modem.set_sim(Some(&sim));
        modem.change_state(ModemState::Enabled, StateChangeReason::Unknown);
        modem.drain_signals();
        (modem, sim)
    }

    #[test]
    fn test_scan_lists_roaming_before_home() {
        let tech = Gsm3gpp::new().with_roaming_networks(vec![Network::new("310410", "Roam")]);
        let (mut modem, _sim) = enabled_modem(tech);
        let (done, mut reply) = Completion::channel();
        modem.scan(done);
        modem.run_until_idle();

        let networks = reply.try_take().unwrap().unwrap();
        let codes: Vec<_> = networks.iter().map(|n| n.operator_code.as_str()).collect();
        assert_eq!(codes, ["310410", "310260"]);
    }

    #[test]
    fn test_scan_requires_enabled_modem_and_sim() {
        let (mut modem, sim) = enabled_modem(Gsm3gpp::new());
        modem.change_state(ModemState::Disabled, StateChangeReason::Unknown);
        let (done, mut reply) = Completion::channel();
        modem.scan(done);
        assert!(reply.try_take().unwrap().unwrap_err().is(CoreError::WrongState));

        modem.change_state(ModemState::Enabled, StateChangeReason::Unknown);
        drop(sim);
        let (done, mut reply) = Completion::channel();
        modem.scan(done);
        assert!(reply
            .try_take()
            .unwrap()
            .unwrap_err()
            .is(MobileEquipmentError::SimNotInserted));
    }

    #[test]
    fn test_register_home_versus_roaming() {
        let (mut modem, _sim) = enabled_modem(Gsm3gpp::new());
        let (done, mut reply) = Completion::channel();
        modem.register("310260", "Home", done);
        modem.run_until_idle();
        assert_eq!(reply.try_take(), Some(Ok(())));
        assert_eq!(modem.registration_state(), Some(RegistrationState::Home));
        assert_eq!(modem.state(), ModemState::Registered);

        let (done, mut reply) = Completion::channel();
        modem.register("310410", "Roam", done);
        modem.run_until_idle();
        assert_eq!(reply.try_take(), Some(Ok(())));
        assert_eq!(modem.registration_state(), Some(RegistrationState::Roaming));
        assert_eq!(
            modem.get(interface::MODEM_3GPP, "OperatorName").unwrap(),
            PropertyValue::from("Roam")
        );
    }

    #[test]
    fn test_unregister_returns_to_enabled() {
        let (mut modem, _sim) = enabled_modem(Gsm3gpp::new());
        let (done, _reply) = Completion::channel();
        modem.register("", "", done);
        modem.run_until_idle();
        assert_eq!(modem.state(), ModemState::Registered);

        modem.unregister_with_network().unwrap();
        assert_eq!(modem.state(), ModemState::Enabled);
        assert_eq!(modem.registration_state(), Some(RegistrationState::Idle));
    }

    #[test]
    fn test_status_includes_registration_once_registered() {
        let (mut modem, _sim) = enabled_modem(Gsm3gpp::new());
        assert!(!modem.status().contains_key("m3gpp-registration-state"));

        let (done, _reply) = Completion::channel();
        modem.register("310260", "Home", done);
        modem.run_until_idle();
        let status = modem.status();
        assert_eq!(
            status.get("m3gpp-registration-state"),
            Some(&PropertyValue::U32(RegistrationState::Home.as_u32()))
        );
        assert_eq!(
            status.get("m3gpp-operator-code"),
            Some(&PropertyValue::from("310260"))
        );
    }
}
