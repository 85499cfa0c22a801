//! JSON-Based Integration Tests
//!
//! These tests load the circuit descriptions shipped in `configs/` and check
//! the recorded traces of complete lock-step runs.

use rusty_circuit::system_config::CircuitFactory;
use rusty_circuit::{NodeState, SimError};

fn config_path(name: &str) -> String {
    format!("{}/configs/{}", env!("CARGO_MANIFEST_DIR"), name)
}

/// Value a gate sees at tick `k` from a signal whose per-tick values are
/// `signal[tick - 1]`: whatever was sent one tick earlier, 0 before that.
fn delayed(signal: &[bool], k: usize) -> bool {
    k >= 2 && signal[k - 2]
}

fn bits(pattern: &str) -> Vec<bool> {
    pattern.chars().map(|c| c == '1').collect()
}

fn trace(signal: &[bool]) -> String {
    signal.iter().map(|b| if *b { '1' } else { '0' }).collect()
}

#[cfg(test)]
mod json_circuit_tests {
    use super::*;

    #[test]
    fn test_factory_creation() {
        let factory = CircuitFactory::new();
        let types = factory.component_types();
        for expected in [
            "and", "buffer", "gate", "nand", "nor", "not", "or", "probe", "stimulus", "xnor",
            "xor",
        ] {
            assert!(types.contains(&expected), "missing {}", expected);
        }
    }

    #[test]
    fn test_example_circuit_loading() {
        let circuit = CircuitFactory::new()
            .create_from_json(config_path("example_circuit.json"))
            .unwrap();
        let info = circuit.info();
        assert_eq!(info.name, "example_circuit");
        assert_eq!(info.sim_length, 64);
        assert_eq!(info.gate_count, 2);
        assert_eq!(info.stimulus_count, 3);
        assert_eq!(info.probe_count, 1);
        assert_eq!(info.wire_count, 5);
    }

    #[test]
    fn test_example_circuit_run() {
        let circuit = CircuitFactory::new()
            .create_from_json(config_path("example_circuit.json"))
            .unwrap();
        let results = circuit.run_lockstep().unwrap();
        assert!(results.report.is_clean());
        assert!(results
            .report
            .nodes
            .iter()
            .all(|n| n.state == NodeState::Terminated && n.ticks == 65));

        assert_eq!(
            results.stimulus("stimulus_a"),
            Some("0000000011111111000000001111111100000000111111110000000011111111")
        );

        // c only rises at tick 33; the AND sees it one tick later and sees
        // the OR of values sent two ticks earlier.
        let expected = format!("{}1{}{}", "0".repeat(33), "0".repeat(8), "1".repeat(22));
        assert_eq!(results.probe("probe"), Some(expected.as_str()));
    }

    #[test]
    fn test_full_adder_matches_delay_model() {
        let circuit = CircuitFactory::new()
            .create_from_json(config_path("full_adder.json"))
            .unwrap();
        let n = circuit.sim_length() as usize;
        let results = circuit.run_lockstep().unwrap();
        assert!(results.report.is_clean());

        let a = bits(results.stimulus("a").unwrap());
        let b = bits(results.stimulus("b").unwrap());
        let cin = bits(results.stimulus("cin").unwrap());

        let mut half_sum = Vec::with_capacity(n);
        let mut sum = Vec::with_capacity(n);
        let mut half_carry = Vec::with_capacity(n);
        let mut carry_through = Vec::with_capacity(n);
        let mut cout = Vec::with_capacity(n);
        for k in 1..=n {
            let hs = delayed(&a, k) ^ delayed(&b, k);
            let s = delayed(&half_sum, k) ^ delayed(&cin, k);
            let hc = delayed(&a, k) && delayed(&b, k);
            let ct = delayed(&half_sum, k) && delayed(&cin, k);
            let co = delayed(&half_carry, k) || delayed(&carry_through, k);
            half_sum.push(hs);
            sum.push(s);
            half_carry.push(hc);
            carry_through.push(ct);
            cout.push(co);
        }

        assert_eq!(results.probe("sum_probe"), Some(trace(&sum).as_str()));
        assert_eq!(results.probe("cout_probe"), Some(trace(&cout).as_str()));

        // 1 + 1 + 1 once everything has settled.
        assert!(results.probe("sum_probe").unwrap().ends_with('1'));
        assert!(results.probe("cout_probe").unwrap().ends_with('1'));
    }

    #[test]
    fn test_length_override_refits_patterns() {
        let mut circuit = CircuitFactory::new()
            .create_from_json(config_path("example_circuit.json"))
            .unwrap();
        circuit.set_sim_length(70);
        let results = circuit.run_lockstep().unwrap();
        let a = results.stimulus("stimulus_a").unwrap();
        assert_eq!(a.len(), 70);
        assert!(a.ends_with("1000000"));
        assert_eq!(results.probe("probe").unwrap().len(), 70);

        circuit.set_sim_length(10);
        let results = circuit.run_lockstep().unwrap();
        assert_eq!(results.stimulus("stimulus_a"), Some("0000000011"));
        assert_eq!(results.probe("probe"), Some("0000000000"));
    }

    #[test]
    fn test_invalid_config_file() {
        let factory = CircuitFactory::new();

        let result = factory.create_from_json(config_path("non_existent.json"));
        assert!(matches!(result, Err(SimError::Io { .. })));

        let result = factory.create_from_str(r#"{"name": "x"}"#);
        assert!(matches!(result, Err(SimError::Json(_))));
    }

    #[test]
    fn test_connection_to_unknown_component() {
        let json = r#"{
            "name": "broken", "sim_length": 4,
            "components": {"s": {"component_type": "stimulus", "properties": {"pattern": "1"}}},
            "connections": {"w": {"source": {"component": "s", "pin": "out"},
                                  "targets": [{"component": "ghost", "pin": "in"}]}}
        }"#;
        let err = CircuitFactory::new().create_from_str(json).err();
        assert_eq!(err, Some(SimError::ComponentNotFound("ghost".to_string())));
    }
}
