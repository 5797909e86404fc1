//! Integration tests for automatic network registration
//!
//! These tests drive the Register operation end to end on the cooperative
//! scheduler and check:
//! - Admission (in progress, wrong state) leaves the modem untouched
//! - Scan outcomes (empty, failing, non-empty) and the first-network rule
//! - Cancellation by holders and non-holders
//! - Same-kind serialization under arbitrary start states

use std::sync::Arc;

use mm_protocol::{
    interface, ConnectionError, CoreError, MobileEquipmentError, ModemError, ModemState,
    PropertyValue, RegistrationState, StateChangeReason,
};
use proptest::prelude::*;
use pseudomodem::{
    Completion, FaultBehavior, FaultPlan, Gsm3gpp, Method, Modem, Network, OperationKind,
    SimCard,
};

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    pub fn home_sim() -> Arc<SimCard> {
        Arc::new(SimCard::new("310260", "Home"))
    }

    /// An ENABLED 3GPP modem with `sim` inserted
    pub fn enabled(tech: Gsm3gpp, sim: Option<&Arc<SimCard>>, faults: FaultPlan) -> Modem {
        let mut modem = Modem::new(tech).with_faults(faults);
        modem.set_sim(sim);
        modem.change_state(ModemState::Enabled, StateChangeReason::Unknown);
        modem.drain_signals();
        modem
    }

    /// Technology whose scans only ever see `networks`
    pub fn sees_only(networks: Vec<Network>) -> Gsm3gpp {
        Gsm3gpp::new()
            .with_roaming_networks(networks)
            .with_home_network(false)
    }

    /// Run registration to completion and return its outcome
    pub fn register(modem: &mut Modem) -> Result<(), ModemError> {
        let (done, mut reply) = Completion::channel();
        modem.register_with_network(done).map_err(|r| r.error)?;
        modem.run_until_idle();
        reply
            .try_take()
            .unwrap_or_else(|| Err(ModemError::core(CoreError::Failed, "never completed")))
    }

    pub fn assert_safe_pair(modem: &Modem) {
        assert_eq!(modem.state(), ModemState::Enabled);
        assert_eq!(modem.registration_state(), Some(RegistrationState::Idle));
        assert!(!modem.leases().is_held(OperationKind::Register));
    }

    pub fn register_calls(modem: &Modem) -> Vec<Vec<String>> {
        modem
            .calls()
            .iter()
            .filter(|call| call.method == Method::Register)
            .map(|call| call.args.clone())
            .collect()
    }
}

// ============================================================================
// Scan Outcome Tests
// ============================================================================

mod scan_tests {
    use super::*;

    #[test]
    fn empty_scan_fails_with_no_network() {
        let sim = helpers::home_sim();
        let mut modem = helpers::enabled(helpers::sees_only(vec![]), Some(&sim), FaultPlan::none());

        let err = helpers::register(&mut modem).unwrap_err();

        assert!(err.is(MobileEquipmentError::NoNetwork));
        helpers::assert_safe_pair(&modem);
        assert!(helpers::register_calls(&modem).is_empty());
    }

    #[test]
    fn scan_error_is_reraised_unchanged() {
        let mut modem = helpers::enabled(Gsm3gpp::new(), None, FaultPlan::none());

        let err = helpers::register(&mut modem).unwrap_err();

        assert!(err.is(MobileEquipmentError::SimNotInserted));
        helpers::assert_safe_pair(&modem);
    }

    #[test]
    fn injected_scan_error_is_reraised_unchanged() {
        let sim = helpers::home_sim();
        let injected = ModemError::connection(ConnectionError::NoCarrier, "radio asleep");
        let plan = FaultPlan::none().on(
            Method::Scan,
            vec![FaultBehavior::Fail {
                error: injected.clone(),
            }],
        );
        let mut modem = helpers::enabled(Gsm3gpp::new(), Some(&sim), plan);

        let err = helpers::register(&mut modem).unwrap_err();

        assert_eq!(err, injected);
        helpers::assert_safe_pair(&modem);
    }

    #[test]
    fn registers_with_single_scanned_network() {
        let sim = helpers::home_sim();
        let tech = helpers::sees_only(vec![Network::new("A", "Home")]);
        let mut modem = helpers::enabled(tech, Some(&sim), FaultPlan::none());

        helpers::register(&mut modem).unwrap();

        assert_eq!(
            helpers::register_calls(&modem),
            vec![vec!["A".to_string(), "Home".to_string()]]
        );
        assert_eq!(modem.state(), ModemState::Registered);
        assert_eq!(modem.registration_state(), Some(RegistrationState::Roaming));
        assert_eq!(
            modem.get(interface::MODEM_3GPP, "OperatorCode").unwrap(),
            PropertyValue::from("A")
        );
        assert!(!modem.leases().is_held(OperationKind::Register));
    }

    #[test]
    fn first_scanned_network_wins_over_home() {
        let sim = helpers::home_sim();
        let tech = Gsm3gpp::new().with_roaming_networks(vec![
            Network::new("310410", "Roam A"),
            Network::new("310150", "Roam B"),
        ]);
        let mut modem = helpers::enabled(tech, Some(&sim), FaultPlan::none());

        helpers::register(&mut modem).unwrap();

        let calls = helpers::register_calls(&modem);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0][0], "310410");
        assert_eq!(modem.registration_state(), Some(RegistrationState::Roaming));
    }

    #[test]
    fn register_error_rolls_back() {
        let sim = helpers::home_sim();
        let denied = ModemError::mobile_equipment(
            MobileEquipmentError::NetworkNotAllowed,
            "emergency calls only",
        );
        let plan = FaultPlan::none().on(
            Method::Register,
            vec![FaultBehavior::Fail {
                error: denied.clone(),
            }],
        );
        let mut modem = helpers::enabled(Gsm3gpp::new(), Some(&sim), plan);

        assert_eq!(helpers::register(&mut modem).unwrap_err(), denied);
        helpers::assert_safe_pair(&modem);
    }
}

// ============================================================================
// Admission Tests
// ============================================================================

mod admission_tests {
    use super::*;

    #[test]
    fn back_to_back_registration_is_in_progress() {
        let sim = helpers::home_sim();
        let mut modem = helpers::enabled(Gsm3gpp::new(), Some(&sim), FaultPlan::none());

        let (first, mut first_reply) = Completion::channel();
        modem.register_with_network(first).unwrap();
        let before = modem.all_properties();

        let rejected = modem
            .register_with_network(Completion::detached("second"))
            .unwrap_err();
        assert!(rejected.error.is(CoreError::InProgress));
        assert_eq!(modem.all_properties(), before);

        modem.run_until_idle();
        assert_eq!(first_reply.try_take(), Some(Ok(())));
        assert_eq!(modem.state(), ModemState::Registered);
    }

    #[test]
    fn registration_from_disabled_is_wrong_state() {
        let sim = helpers::home_sim();
        let mut modem = Modem::new(Gsm3gpp::new());
        modem.set_sim(Some(&sim));
        let before = modem.all_properties();

        let (done, mut reply) = Completion::channel();
        let rejected = modem.register_with_network(done).unwrap_err();

        assert!(rejected.error.is(CoreError::WrongState));
        assert_eq!(modem.all_properties(), before);
        assert!(!modem.leases().is_held(OperationKind::Register));
        // The completion came back untouched
        drop(rejected);
        assert!(reply.try_take().unwrap().unwrap_err().is(CoreError::Aborted));
    }
}

// ============================================================================
// Cancellation Tests
// ============================================================================

mod cancel_tests {
    use super::*;

    #[test]
    fn cancel_while_searching_rolls_back() {
        let sim = helpers::home_sim();
        let mut modem = helpers::enabled(Gsm3gpp::new(), Some(&sim), FaultPlan::none());

        let (done, mut reply) = Completion::channel();
        modem.register_with_network(done).unwrap();
        assert_eq!(modem.state(), ModemState::Searching);

        assert!(modem.cancel_current(OperationKind::Register));
        helpers::assert_safe_pair(&modem);

        // The scan still resolves later; its result must be dropped
        modem.run_until_idle();
        assert!(reply.try_take().unwrap().unwrap_err().is(CoreError::Cancelled));
        helpers::assert_safe_pair(&modem);
        assert!(helpers::register_calls(&modem).is_empty());
    }

    #[test]
    fn cancel_after_scan_discards_pending_registration() {
        let sim = helpers::home_sim();
        let mut modem = helpers::enabled(Gsm3gpp::new(), Some(&sim), FaultPlan::none());

        let (done, mut reply) = Completion::channel();
        modem.register_with_network(done).unwrap();
        assert!(modem.run_until(|m| !helpers::register_calls(m).is_empty()));
        assert_eq!(modem.state(), ModemState::Searching);

        assert!(modem.cancel_current(OperationKind::Register));
        helpers::assert_safe_pair(&modem);

        // The register call resolves later and must not apply
        modem.run_until_idle();
        helpers::assert_safe_pair(&modem);
        assert!(reply.try_take().unwrap().unwrap_err().is(CoreError::Cancelled));
        assert!(modem
            .drain_signals()
            .iter()
            .all(|signal| signal.new_state() != Some(ModemState::Registered)));
    }

    #[test]
    fn cancel_by_non_holder_is_noop() {
        let sim = helpers::home_sim();
        let mut modem = helpers::enabled(Gsm3gpp::new(), Some(&sim), FaultPlan::none());

        let (done, _reply) = Completion::channel();
        modem.register_with_network(done).unwrap();
        let stale = modem.operation(OperationKind::Register).unwrap();
        modem.run_until_idle();
        modem.unregister_with_network().unwrap();

        let (done, mut reply) = Completion::channel();
        modem.register_with_network(done).unwrap();
        let before = modem.all_properties();

        assert!(!modem.cancel(OperationKind::Register, stale));
        assert!(!modem.cancel_current(OperationKind::Connect));
        assert_eq!(modem.all_properties(), before);

        modem.run_until_idle();
        assert_eq!(reply.try_take(), Some(Ok(())));
    }

    #[test]
    fn new_registration_after_cancel_is_admitted() {
        let sim = helpers::home_sim();
        let mut modem = helpers::enabled(Gsm3gpp::new(), Some(&sim), FaultPlan::none());

        let (done, mut cancelled) = Completion::channel();
        modem.register_with_network(done).unwrap();
        modem.cancel_current(OperationKind::Register);

        let (done, mut second) = Completion::channel();
        modem.register_with_network(done).unwrap();
        modem.run_until_idle();

        assert!(cancelled.try_take().unwrap().unwrap_err().is(CoreError::Cancelled));
        assert_eq!(second.try_take(), Some(Ok(())));
        assert_eq!(modem.state(), ModemState::Registered);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

mod proptest_tests {
    use super::*;

    fn modem_state() -> impl Strategy<Value = ModemState> {
        proptest::sample::select(ModemState::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn only_enabled_admits_registration(state in modem_state()) {
            let sim = helpers::home_sim();
            let mut modem = Modem::new(Gsm3gpp::new());
            modem.set_sim(Some(&sim));
            modem.change_state(state, StateChangeReason::Unknown);
            let before = modem.all_properties();

            let result = modem.register_with_network(Completion::detached("prop"));

            if state == ModemState::Enabled {
                prop_assert!(result.is_ok());
            } else {
                let rejected = result.unwrap_err();
                prop_assert!(rejected.error.is(CoreError::WrongState));
                prop_assert_eq!(modem.all_properties(), before);
            }
        }

        #[test]
        fn registration_always_uses_first_network(
            codes in proptest::collection::vec("[0-9]{5,6}", 1..5)
        ) {
            let sim = helpers::home_sim();
            let networks: Vec<Network> = codes
                .iter()
                .map(|code| Network::new(code.clone(), format!("Net {code}")))
                .collect();
            let mut modem =
                helpers::enabled(helpers::sees_only(networks), Some(&sim), FaultPlan::none());

            prop_assert!(helpers::register(&mut modem).is_ok());
            let calls = helpers::register_calls(&modem);
            prop_assert_eq!(calls.len(), 1);
            prop_assert_eq!(&calls[0][0], &codes[0]);
        }
    }
}
