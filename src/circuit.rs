//! # Host harness
//!
//! [`Circuit`] is the netlist builder that plays the host's role: it names
//! components, wires outputs to inputs, writes every node's configuration
//! block and reads the probe recordings back once the run is over.
//!
//! Every component with an output (gates and stimuli) drives exactly one
//! wire. Wires get routing keys 0, 1, 2, ... in the order their drivers were
//! added; an input that is never connected listens on
//! [`RoutingKey::UNCONNECTED`].
//!
//! ```rust
//! use rusty_circuit::circuit::Circuit;
//!
//! let mut circuit = Circuit::new("or_gate", 4);
//! circuit.add_stimulus("a", "0011").unwrap();
//! circuit.add_stimulus("b", "0101").unwrap();
//! circuit.add_or("or").unwrap();
//! circuit.add_probe("out").unwrap();
//! circuit.connect("a", "or", "a").unwrap();
//! circuit.connect("b", "or", "b").unwrap();
//! circuit.connect("or", "out", "in").unwrap();
//!
//! let results = circuit.run_lockstep().unwrap();
//! assert!(results.report.is_clean());
//! ```

use std::collections::HashMap;

use tracing::{debug, info};

use crate::bus::{RoutingEntry, RoutingTable};
use crate::component::Component;
use crate::components;
use crate::config::{
    GateConfig, NodeKind, ProbeConfig, StimulusConfig, TimingConfig, PACKED_DATA_OFFSET,
};
use crate::error::{Result, SimError};
use crate::pin::PinValue;
use crate::region::ConfigRegion;
use crate::runtime::{LockstepRunner, RealtimeRunner, RunReport};
use crate::types::{packed_bit, packed_len, Lut, NodeId, RoutingKey};

/// Name of the output pin on gates and stimuli.
pub const OUTPUT_PIN: &str = "out";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Gate { lut: Lut },
    Stimulus { pattern: Vec<bool> },
    Probe,
}

#[derive(Debug, Clone)]
struct Element {
    name: String,
    part: Part,
    /// Driving component per input pin, in pin order.
    inputs: Vec<Option<String>>,
}

impl Element {
    fn kind(&self) -> NodeKind {
        match self.part {
            Part::Gate { .. } => NodeKind::Gate,
            Part::Stimulus { .. } => NodeKind::Stimulus,
            Part::Probe => NodeKind::Probe,
        }
    }

    fn input_pins(&self) -> &'static [&'static str] {
        match self.part {
            Part::Gate { .. } => &["a", "b"],
            Part::Stimulus { .. } => &[],
            Part::Probe => &["in"],
        }
    }

    fn has_output(&self) -> bool {
        !matches!(self.part, Part::Probe)
    }
}

/// A netlist of gates, stimuli and probes sharing one simulation length.
#[derive(Debug, Clone)]
pub struct Circuit {
    name: String,
    description: String,
    sim_length: u32,
    elements: Vec<Element>,
    index: HashMap<String, usize>,
}

impl Circuit {
    pub fn new(name: impl Into<String>, sim_length: u32) -> Self {
        Circuit {
            name: name.into(),
            description: String::new(),
            sim_length,
            elements: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sim_length(&self) -> u32 {
        self.sim_length
    }

    /// Changes the number of ticks every node runs for. Stimulus patterns are
    /// re-fitted to the new length at build time.
    pub fn set_sim_length(&mut self, sim_length: u32) {
        self.sim_length = sim_length;
    }

    fn add(&mut self, name: &str, part: Part) -> Result<NodeId> {
        if self.index.contains_key(name) {
            return Err(SimError::DuplicateComponent(name.to_string()));
        }
        let mut element = Element {
            name: name.to_string(),
            part,
            inputs: Vec::new(),
        };
        element.inputs = vec![None; element.input_pins().len()];
        let id = NodeId::new(self.elements.len());
        self.index.insert(name.to_string(), id.index());
        self.elements.push(element);
        Ok(id)
    }

    /// Adds a two-input gate computing `lut`. Input pins are `a` and `b`.
    pub fn add_gate(&mut self, name: &str, lut: Lut) -> Result<NodeId> {
        self.add(name, Part::Gate { lut })
    }

    pub fn add_and(&mut self, name: &str) -> Result<NodeId> {
        self.add_gate(name, Lut::AND)
    }

    pub fn add_or(&mut self, name: &str) -> Result<NodeId> {
        self.add_gate(name, Lut::OR)
    }

    pub fn add_xor(&mut self, name: &str) -> Result<NodeId> {
        self.add_gate(name, Lut::XOR)
    }

    /// Inverter on input `a`; input `b` is ignored.
    pub fn add_not(&mut self, name: &str) -> Result<NodeId> {
        self.add_gate(name, Lut::NOT)
    }

    /// Adds a stimulus playing `pattern`, a string of `0` and `1` where the
    /// first character is the value at tick 1.
    pub fn add_stimulus(&mut self, name: &str, pattern: &str) -> Result<NodeId> {
        let pattern = parse_pattern(name, pattern)?;
        self.add(name, Part::Stimulus { pattern })
    }

    /// Adds a probe recording its `in` pin.
    pub fn add_probe(&mut self, name: &str) -> Result<NodeId> {
        self.add(name, Part::Probe)
    }

    fn element_index(&self, name: &str) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| SimError::ComponentNotFound(name.to_string()))
    }

    /// Drives input `pin` of `target` with the output of `source`.
    pub fn connect(&mut self, source: &str, target: &str, pin: &str) -> Result<()> {
        let source_index = self.element_index(source)?;
        if !self.elements[source_index].has_output() {
            return Err(SimError::PinNotFound {
                component: source.to_string(),
                pin: OUTPUT_PIN.to_string(),
            });
        }

        let target_index = self.element_index(target)?;
        let element = &mut self.elements[target_index];
        let slot = element
            .input_pins()
            .iter()
            .position(|p| *p == pin)
            .ok_or_else(|| SimError::PinNotFound {
                component: target.to_string(),
                pin: pin.to_string(),
            })?;
        if element.inputs[slot].is_some() {
            return Err(SimError::PinAlreadyConnected {
                component: target.to_string(),
                pin: pin.to_string(),
            });
        }
        element.inputs[slot] = Some(source.to_string());
        debug!(source, target, pin, "connected");
        Ok(())
    }

    /// Routing key of each driven wire, keyed by the driving component.
    fn wire_keys(&self) -> HashMap<&str, RoutingKey> {
        self.elements
            .iter()
            .filter(|e| e.has_output())
            .enumerate()
            .map(|(wire, e)| (e.name.as_str(), RoutingKey::new(wire as u32)))
            .collect()
    }

    /// Writes every node's configuration into a freshly allocated region,
    /// loads the nodes from those regions and builds the routing table.
    pub fn build(&self) -> Result<BuiltCircuit> {
        let keys = self.wire_keys();
        let key_of = |source: &Option<String>| {
            source
                .as_deref()
                .and_then(|name| keys.get(name).copied())
                .unwrap_or(RoutingKey::UNCONNECTED)
        };

        let mut nodes: Vec<Box<dyn Component>> = Vec::with_capacity(self.elements.len());
        let mut regions = Vec::with_capacity(self.elements.len());
        for element in &self.elements {
            let output_key = keys
                .get(element.name.as_str())
                .copied()
                .unwrap_or(RoutingKey::UNCONNECTED);
            let block = match &element.part {
                Part::Gate { lut } => GateConfig {
                    sim_length: self.sim_length,
                    input_a_key: key_of(&element.inputs[0]),
                    input_b_key: key_of(&element.inputs[1]),
                    output_key,
                    lut: *lut,
                }
                .encode(),
                Part::Stimulus { pattern } => StimulusConfig {
                    sim_length: self.sim_length,
                    output_key,
                    stimulus: pack_pattern(pattern, self.sim_length),
                }
                .encode(),
                Part::Probe => ProbeConfig {
                    sim_length: self.sim_length,
                    input_key: key_of(&element.inputs[0]),
                }
                .encode(),
            };
            let size = match element.kind() {
                NodeKind::Gate => GateConfig::SIZE,
                NodeKind::Stimulus => StimulusConfig::region_size(self.sim_length),
                NodeKind::Probe => ProbeConfig::region_size(self.sim_length),
            };
            let region = ConfigRegion::alloc(size);
            region.write(0, &block)?;
            nodes.push(components::load(
                element.name.clone(),
                element.kind(),
                &region,
            )?);
            regions.push(region);
        }

        let mut table = RoutingTable::new();
        for element in self.elements.iter().filter(|e| e.has_output()) {
            let mut route = Vec::new();
            for (index, sink) in self.elements.iter().enumerate() {
                let driven = sink
                    .inputs
                    .iter()
                    .any(|input| input.as_deref() == Some(element.name.as_str()));
                if driven {
                    route.push(NodeId::new(index));
                }
            }
            if !route.is_empty() {
                table.push(RoutingEntry::exact(keys[element.name.as_str()], route));
            }
        }

        debug!(
            circuit = %self.name,
            nodes = nodes.len(),
            routes = table.len(),
            "circuit built"
        );
        Ok(BuiltCircuit {
            nodes,
            table,
            regions,
            elements: self
                .elements
                .iter()
                .map(|e| (e.name.clone(), e.kind()))
                .collect(),
            sim_length: self.sim_length,
        })
    }

    /// Builds the circuit and runs it on the deterministic lock-step runner.
    pub fn run_lockstep(&self) -> Result<CircuitResults> {
        let built = self.build()?;
        let mut runner = LockstepRunner::new(built.nodes, built.table)?;
        let report = runner.run()?;
        info!(circuit = %self.name, ticks = runner.tick(), "lock-step run finished");
        CircuitResults::collect(&built.elements, &built.regions, self.sim_length, report)
    }

    /// Builds the circuit and runs it in real time, one task per node.
    pub async fn run_realtime(&self, timing: TimingConfig) -> Result<CircuitResults> {
        let built = self.build()?;
        let runner = RealtimeRunner::new(built.nodes, built.table, timing)?;
        let report = runner.run().await?;
        info!(circuit = %self.name, "real-time run finished");
        CircuitResults::collect(&built.elements, &built.regions, self.sim_length, report)
    }

    pub fn info(&self) -> CircuitInfo {
        let count = |kind: NodeKind| self.elements.iter().filter(|e| e.kind() == kind).count();
        CircuitInfo {
            name: self.name.clone(),
            description: self.description.clone(),
            sim_length: self.sim_length,
            gate_count: count(NodeKind::Gate),
            stimulus_count: count(NodeKind::Stimulus),
            probe_count: count(NodeKind::Probe),
            wire_count: self.elements.iter().filter(|e| e.has_output()).count(),
        }
    }
}

fn parse_pattern(component: &str, pattern: &str) -> Result<Vec<bool>> {
    pattern
        .chars()
        .map(|c| match c {
            '0' => Ok(false),
            '1' => Ok(true),
            found => Err(SimError::InvalidPattern {
                component: component.to_string(),
                found,
            }),
        })
        .collect()
}

/// Packs `pattern` LSB-first, zero-padded or truncated to `sim_length` bits.
fn pack_pattern(pattern: &[bool], sim_length: u32) -> Vec<u8> {
    let mut bytes = vec![0u8; packed_len(sim_length)];
    for (t, _) in pattern
        .iter()
        .take(sim_length as usize)
        .enumerate()
        .filter(|(_, bit)| **bit)
    {
        bytes[t / 8] |= 1 << (t % 8);
    }
    bytes
}

fn unpack_trace(bytes: &[u8], sim_length: u32) -> String {
    (0..sim_length as usize)
        .map(|t| PinValue::from_bool(packed_bit(bytes, t)).to_char())
        .collect()
}

/// Nodes, routes and regions ready to hand to a runner.
pub struct BuiltCircuit {
    pub nodes: Vec<Box<dyn Component>>,
    pub table: RoutingTable,
    /// Configuration region of each node, in node order.
    pub regions: Vec<ConfigRegion>,
    elements: Vec<(String, NodeKind)>,
    sim_length: u32,
}

impl BuiltCircuit {
    /// Reads back the traces once a runner has finished with the nodes.
    pub fn results(&self, report: RunReport) -> Result<CircuitResults> {
        CircuitResults::collect(&self.elements, &self.regions, self.sim_length, report)
    }
}

/// One named signal over time, `'0'`/`'1'` per tick starting at tick 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    pub name: String,
    pub kind: NodeKind,
    pub bits: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitResults {
    pub sim_length: u32,
    /// Stimulus patterns and probe recordings, in the order the components were added.
    pub traces: Vec<Trace>,
    pub report: RunReport,
}

impl CircuitResults {
    fn collect(
        elements: &[(String, NodeKind)],
        regions: &[ConfigRegion],
        sim_length: u32,
        report: RunReport,
    ) -> Result<Self> {
        let len = packed_len(sim_length);
        let mut traces = Vec::new();
        for ((name, kind), region) in elements.iter().zip(regions) {
            if *kind == NodeKind::Gate {
                continue;
            }
            let bytes = region.read(PACKED_DATA_OFFSET, len)?;
            traces.push(Trace {
                name: name.clone(),
                kind: *kind,
                bits: unpack_trace(&bytes, sim_length),
            });
        }
        Ok(CircuitResults {
            sim_length,
            traces,
            report,
        })
    }

    fn trace(&self, name: &str, kind: NodeKind) -> Option<&str> {
        self.traces
            .iter()
            .find(|t| t.kind == kind && t.name == name)
            .map(|t| t.bits.as_str())
    }

    /// Recording of the named probe.
    pub fn probe(&self, name: &str) -> Option<&str> {
        self.trace(name, NodeKind::Probe)
    }

    /// Pattern played by the named stimulus, as fitted to the run length.
    pub fn stimulus(&self, name: &str) -> Option<&str> {
        self.trace(name, NodeKind::Stimulus)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitInfo {
    pub name: String,
    pub description: String,
    pub sim_length: u32,
    pub gate_count: usize,
    pub stimulus_count: usize,
    pub probe_count: usize,
    pub wire_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn or_circuit() -> Circuit {
        let mut circuit = Circuit::new("or", 4);
        circuit.add_stimulus("a", "0011").unwrap();
        circuit.add_stimulus("b", "0101").unwrap();
        circuit.add_or("or").unwrap();
        circuit.add_probe("out").unwrap();
        circuit.connect("a", "or", "a").unwrap();
        circuit.connect("b", "or", "b").unwrap();
        circuit.connect("or", "out", "in").unwrap();
        circuit
    }

    #[test]
    fn test_wire_keys_are_sequential() {
        let built = or_circuit().build().unwrap();
        let keys: Vec<u32> = built
            .table
            .entries()
            .iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(keys, vec![0, 1, 2]);
        assert_eq!(built.table.route(RoutingKey::new(2)), &[NodeId::new(3)]);
    }

    #[test]
    fn test_regions_hold_encoded_blocks() {
        let built = or_circuit().build().unwrap();
        let gate = GateConfig::decode(&built.regions[2].to_vec().unwrap()).unwrap();
        assert_eq!(gate.input_a_key, RoutingKey::new(0));
        assert_eq!(gate.input_b_key, RoutingKey::new(1));
        assert_eq!(gate.output_key, RoutingKey::new(2));
        assert_eq!(gate.lut, Lut::OR);

        let stimulus = StimulusConfig::decode(&built.regions[0].to_vec().unwrap()).unwrap();
        assert_eq!(stimulus.stimulus, vec![0b1100]);
    }

    #[test]
    fn test_unconnected_inputs() {
        let mut circuit = Circuit::new("inv", 2);
        circuit.add_not("inv").unwrap();
        circuit.add_probe("p").unwrap();
        let built = circuit.build().unwrap();

        let gate = GateConfig::decode(&built.regions[0].to_vec().unwrap()).unwrap();
        assert_eq!(gate.input_a_key, RoutingKey::UNCONNECTED);
        assert_eq!(gate.input_b_key, RoutingKey::UNCONNECTED);
        let probe = ProbeConfig::decode(&built.regions[1].to_vec().unwrap()).unwrap();
        assert_eq!(probe.input_key, RoutingKey::UNCONNECTED);
        assert!(built.table.is_empty());
    }

    #[test]
    fn test_probe_recording_is_cleared_at_load() {
        let mut circuit = Circuit::new("p", 16);
        circuit.add_probe("p").unwrap();
        let built = circuit.build().unwrap();
        assert_eq!(built.regions[0].len().unwrap(), 10);
        assert_eq!(built.regions[0].read(8, 2).unwrap(), vec![0, 0]);
    }

    #[test]
    fn test_pattern_fitting() {
        assert_eq!(pack_pattern(&[true, false, true], 8), vec![0b101]);
        assert_eq!(pack_pattern(&[true; 12], 4), vec![0b1111]);
        assert_eq!(pack_pattern(&[true; 9], 9), vec![0xFF, 0x01]);
        assert!(pack_pattern(&[true], 0).is_empty());
    }

    #[test]
    fn test_or_results() {
        let results = or_circuit().run_lockstep().unwrap();
        assert!(results.report.is_clean());
        assert_eq!(results.stimulus("a"), Some("0011"));
        assert_eq!(results.stimulus("b"), Some("0101"));
        // One tick of gate delay; the gate sees nothing on tick 1.
        assert_eq!(results.probe("out"), Some("0011"));
        assert_eq!(results.probe("a"), None);
    }

    #[test]
    fn test_connect_errors() {
        let mut circuit = or_circuit();
        assert_eq!(
            circuit.connect("missing", "or", "a"),
            Err(SimError::ComponentNotFound("missing".to_string()))
        );
        assert!(matches!(
            circuit.connect("a", "or", "c"),
            Err(SimError::PinNotFound { .. })
        ));
        assert!(matches!(
            circuit.connect("out", "or", "a"),
            Err(SimError::PinNotFound { .. })
        ));
        assert!(matches!(
            circuit.connect("b", "or", "a"),
            Err(SimError::PinAlreadyConnected { .. })
        ));
        assert!(matches!(
            circuit.connect("a", "b", "a"),
            Err(SimError::PinNotFound { .. })
        ));
    }

    #[test]
    fn test_add_errors() {
        let mut circuit = Circuit::new("c", 4);
        circuit.add_probe("x").unwrap();
        assert_eq!(
            circuit.add_and("x"),
            Err(SimError::DuplicateComponent("x".to_string()))
        );
        assert_eq!(
            circuit.add_stimulus("s", "01x"),
            Err(SimError::InvalidPattern {
                component: "s".to_string(),
                found: 'x'
            })
        );
    }

    #[test]
    fn test_fanout_to_both_pins_routes_once() {
        let mut circuit = Circuit::new("self_and", 3);
        circuit.add_stimulus("s", "110").unwrap();
        circuit.add_and("and").unwrap();
        circuit.connect("s", "and", "a").unwrap();
        circuit.connect("s", "and", "b").unwrap();
        let built = circuit.build().unwrap();
        assert_eq!(built.table.route(RoutingKey::new(0)), &[NodeId::new(1)]);
    }

    #[test]
    fn test_info() {
        let info = or_circuit().with_description("two inputs").info();
        assert_eq!(info.name, "or");
        assert_eq!(info.description, "two inputs");
        assert_eq!(info.gate_count, 1);
        assert_eq!(info.stimulus_count, 2);
        assert_eq!(info.probe_count, 1);
        assert_eq!(info.wire_count, 3);
    }
}
