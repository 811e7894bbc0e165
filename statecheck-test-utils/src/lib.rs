//! statecheck Test Utilities
//!
//! Shared test infrastructure for the statecheck workspace:
//! - [`ScriptedSource`]: a state source that replays a fixed script
//! - Proptest generators for paths and leaf values
//! - Fixtures: a populated device state tree
//! - Custom assertions over validation results

pub mod scripted;

pub use scripted::{ScriptedSource, Step, StreamEnd};

// Re-export core types for convenience
pub use statecheck_core::{
    FailureKind, FetchError, FetchErrorKind, PathElem, Query, StatePath, ValidationError, Value,
};
pub use statecheck_source::{InMemoryStateSource, StateSource};

/// Install a fmt subscriber that writes through the test harness.
///
/// Honors `RUST_LOG`; safe to call from every test.
pub fn init_test_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("statecheck=debug,statecheck_source=debug,warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for paths and leaf values.

    use super::*;
    use proptest::prelude::*;
    use serde_json::Value as Json;

    /// A path element name as found in YANG-style trees.
    pub fn arb_elem_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9-]{0,11}"
    }

    /// A list key value; may contain `/`, as interface names do.
    pub fn arb_key_value() -> impl Strategy<Value = String> {
        "[A-Za-z0-9][A-Za-z0-9./:-]{0,11}"
    }

    /// An element with up to two keys.
    pub fn arb_path_elem() -> impl Strategy<Value = PathElem> {
        (
            arb_elem_name(),
            prop::collection::btree_map(arb_elem_name(), arb_key_value(), 0..3),
        )
            .prop_map(|(name, keys)| PathElem { name, keys })
    }

    /// A non-root path of one to six elements.
    pub fn arb_state_path() -> impl Strategy<Value = StatePath> {
        prop::collection::vec(arb_path_elem(), 1..7).prop_map(StatePath::from_elems)
    }

    /// A path together with one of its ancestors (possibly itself).
    pub fn arb_path_with_prefix() -> impl Strategy<Value = (StatePath, StatePath)> {
        prop::collection::vec(arb_path_elem(), 1..7).prop_flat_map(|elems| {
            let len = elems.len();
            (0..=len).prop_map(move |cut| {
                (
                    StatePath::from_elems(elems.clone()),
                    StatePath::from_elems(elems[..cut].to_vec()),
                )
            })
        })
    }

    /// A scalar leaf value.
    pub fn arb_leaf_json() -> impl Strategy<Value = Json> {
        prop_oneof![
            any::<bool>().prop_map(Json::from),
            any::<u32>().prop_map(Json::from),
            any::<i64>().prop_map(Json::from),
            "[a-zA-Z0-9 _-]{0,16}".prop_map(Json::from),
        ]
    }

    /// A transport failure of any kind.
    pub fn arb_fetch_error() -> impl Strategy<Value = FetchError> {
        prop_oneof![
            Just(FetchError::deadline_exceeded()),
            Just(FetchError::cancelled()),
            Just(FetchError::stream_closed()),
            "[a-z ]{1,20}".prop_map(FetchError::unavailable),
            "[a-z ]{1,20}".prop_map(|m| FetchError::new(FetchErrorKind::Internal, m)),
        ]
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! A small device state tree for end-to-end tests.
    //!
    //! ```text
    //! /system/state/hostname                                   "dut1"
    //! /system/state/boot-time                                  1700000000
    //! /interfaces/interface[name=eth0]/state/mtu               1500
    //! /interfaces/interface[name=eth0]/state/oper-status       "UP"
    //! /interfaces/interface[name=eth1]/state/mtu               9000
    //! /interfaces/interface[name=eth1]/state/oper-status       "DOWN"
    //! /network-instances/.../neighbor[neighbor-address=192.0.2.1]/state/session-state  "ESTABLISHED"
    //! ```

    use super::*;
    use serde_json::json;

    pub const HOSTNAME: &str = "dut1";
    pub const BOOT_TIME: u64 = 1_700_000_000;
    pub const BGP_NEIGHBOR: &str = "192.0.2.1";

    pub fn system_state() -> StatePath {
        StatePath::root().child("system").child("state")
    }

    pub fn hostname() -> StatePath {
        system_state().child("hostname")
    }

    pub fn boot_time() -> StatePath {
        system_state().child("boot-time")
    }

    pub fn domain_name() -> StatePath {
        system_state().child("domain-name")
    }

    pub fn interface(name: &str) -> StatePath {
        StatePath::root()
            .child("interfaces")
            .keyed_child("interface", [("name", name)])
    }

    pub fn interface_mtu(name: &str) -> StatePath {
        interface(name).child("state").child("mtu")
    }

    pub fn oper_status(name: &str) -> StatePath {
        interface(name).child("state").child("oper-status")
    }

    pub fn bgp_neighbor(address: &str) -> StatePath {
        StatePath::root()
            .child("network-instances")
            .keyed_child("network-instance", [("name", "default")])
            .child("protocols")
            .keyed_child(
                "protocol",
                [("identifier", "BGP"), ("name", "BGP")],
            )
            .child("bgp")
            .child("neighbors")
            .keyed_child("neighbor", [("neighbor-address", address)])
    }

    pub fn session_state(address: &str) -> StatePath {
        bgp_neighbor(address).child("state").child("session-state")
    }

    /// An in-memory source holding the tree above.
    pub fn device_state() -> InMemoryStateSource {
        let source = InMemoryStateSource::new();
        load_device_state(&source);
        source
    }

    pub fn load_device_state(source: &InMemoryStateSource) {
        source.set_json(&hostname(), json!(HOSTNAME));
        source.set_json(&boot_time(), json!(BOOT_TIME));
        source.set_json(&interface_mtu("eth0"), json!(1500));
        source.set_json(&oper_status("eth0"), json!("UP"));
        source.set_json(&interface_mtu("eth1"), json!(9000));
        source.set_json(&oper_status("eth1"), json!("DOWN"));
        source.set_json(&session_state(BGP_NEIGHBOR), json!("ESTABLISHED"));
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over `Result<(), ValidationError>`.

    use super::*;

    type Outcome = Result<(), ValidationError>;

    /// Assert the validation passed.
    #[track_caller]
    pub fn assert_passed(result: &Outcome) {
        if let Err(err) = result {
            panic!("Expected validation to pass, got: {}", err);
        }
    }

    /// Assert the value was fetched but rejected, and nothing else went wrong.
    #[track_caller]
    pub fn assert_mismatch(result: &Outcome) -> &ValidationError {
        match result {
            Err(err) if err.kind() == FailureKind::Validation => err,
            other => panic!("Expected a validation mismatch, got: {:?}", other),
        }
    }

    /// Assert the failure came from the source, with the given kind.
    #[track_caller]
    pub fn assert_transport_failure(result: &Outcome, kind: FetchErrorKind) -> &ValidationError {
        match result {
            Err(err) => match err.failure_cause() {
                Some(cause) if cause.kind() == kind => err,
                other => panic!("Expected {} failure, got cause {:?} in {}", kind, other, err),
            },
            Ok(()) => panic!("Expected {} failure, got Ok", kind),
        }
    }

    /// Assert the wait ran out of time.
    #[track_caller]
    pub fn assert_timed_out(result: &Outcome) -> &ValidationError {
        match result {
            Err(err) if err.is_timeout() => err,
            other => panic!("Expected deadline exceeded, got: {:?}", other),
        }
    }

    /// Assert the failure message contains `needle`.
    #[track_caller]
    pub fn assert_message_contains(result: &Outcome, needle: &str) {
        match result {
            Err(err) => {
                let message = err.to_string();
                assert!(
                    message.contains(needle),
                    "Expected message containing {:?}, got {:?}",
                    needle,
                    message
                );
            }
            Ok(()) => panic!("Expected failure mentioning {:?}, got Ok", needle),
        }
    }
}
