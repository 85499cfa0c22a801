//! Real-time runner integration tests
//!
//! These runs use a slow tick so each probe's settle window comfortably
//! covers the packets sent during the same tick.

use rusty_circuit::config::TimingConfig;
use rusty_circuit::system_config::CircuitFactory;
use rusty_circuit::{Circuit, NodeState, RealtimeRunner, RoutingTable, SimError};
use std::time::Duration;

fn timing() -> TimingConfig {
    TimingConfig::new(Duration::from_millis(4), Duration::from_millis(2))
}

#[cfg(test)]
mod realtime_circuit_tests {
    use super::*;

    #[tokio::test]
    async fn test_loopback_records_pattern() {
        let mut circuit = Circuit::new("loopback", 12);
        circuit.add_stimulus("s", "110010111").unwrap();
        circuit.add_probe("p").unwrap();
        circuit.connect("s", "p", "in").unwrap();

        let results = circuit.run_realtime(timing()).await.unwrap();
        assert!(results.report.is_clean());
        assert_eq!(results.stimulus("s"), Some("110010111000"));
        assert_eq!(results.probe("p"), Some("110010111000"));
    }

    #[tokio::test]
    async fn test_every_node_terminates() {
        let mut circuit = CircuitFactory::new()
            .create_from_json(format!(
                "{}/configs/full_adder.json",
                env!("CARGO_MANIFEST_DIR")
            ))
            .unwrap();
        circuit.set_sim_length(6);
        let results = circuit.run_realtime(timing()).await.unwrap();

        assert_eq!(results.report.nodes.len(), 10);
        for node in &results.report.nodes {
            assert_eq!(node.state, NodeState::Terminated, "{}", node.name);
            assert_eq!(node.ticks, 7, "{}", node.name);
        }
        assert_eq!(results.probe("sum_probe").map(str::len), Some(6));
    }

    #[tokio::test]
    async fn test_settle_window_longer_than_tick_is_rejected() {
        let mut circuit = Circuit::new("loopback", 8);
        circuit.add_stimulus("s", "10101010").unwrap();
        circuit.add_probe("p").unwrap();
        circuit.connect("s", "p", "in").unwrap();

        let slow_settle = TimingConfig::new(Duration::from_millis(2), Duration::from_millis(5));
        let err = circuit.run_realtime(slow_settle).await.err().unwrap();
        assert!(matches!(err, SimError::InvalidTiming(_)));
        assert!(err.is_configuration_error());

        let zero_tick = TimingConfig::new(Duration::ZERO, Duration::from_micros(700));
        let err = circuit.run_realtime(zero_tick).await.err().unwrap();
        assert!(matches!(err, SimError::InvalidTiming(_)));
    }

    #[test]
    fn test_block_on_empty_runner() {
        let runner =
            RealtimeRunner::new(Vec::new(), RoutingTable::new(), TimingConfig::default()).unwrap();
        let report = tokio_test::block_on(runner.run()).unwrap();
        assert!(report.nodes.is_empty());
    }

    #[test]
    fn test_block_on_constant_probe() {
        let mut circuit = Circuit::new("constant", 5);
        circuit.add_stimulus("one", "11111").unwrap();
        circuit.add_probe("p").unwrap();
        circuit.connect("one", "p", "in").unwrap();

        let results = tokio_test::block_on(circuit.run_realtime(timing())).unwrap();
        assert_eq!(results.probe("p"), Some("11111"));
    }
}
