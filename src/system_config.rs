//! # JSON circuit descriptions
//!
//! Circuits can be described in JSON and turned into a [`Circuit`] by a
//! [`CircuitFactory`], which keeps a registry of component creators keyed by
//! `component_type`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rusty_circuit::system_config::CircuitFactory;
//!
//! let factory = CircuitFactory::new();
//! let circuit = factory
//!     .create_from_json("configs/example_circuit.json")
//!     .expect("Could not create circuit!");
//!
//! let info = circuit.info();
//! println!("Created circuit: {} with {} gates", info.name, info.gate_count);
//! ```
//!
//! ## File format
//!
//! ```json
//! {
//!   "name": "or_gate",
//!   "description": "Two stimuli into an OR gate",
//!   "version": "1.0",
//!   "sim_length": 8,
//!   "components": {
//!     "a":   {"component_type": "stimulus", "properties": {"pattern": "00110011"}},
//!     "b":   {"component_type": "stimulus", "properties": {"pattern": "01010101"}},
//!     "or":  {"component_type": "or"},
//!     "out": {"component_type": "probe"}
//!   },
//!   "connections": {
//!     "a_to_or": {"source": {"component": "a", "pin": "out"},
//!                 "targets": [{"component": "or", "pin": "a"}]}
//!   }
//! }
//! ```
//!
//! Components are added in the order of their ids, so node ids and wire keys
//! do not depend on the order of the file.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use tracing::debug;

use crate::circuit::{Circuit, OUTPUT_PIN};
use crate::error::{Result, SimError};
use crate::types::{Lut, NodeId};

/// Top-level JSON circuit description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: String,
    pub sim_length: u32,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub components: BTreeMap<String, ComponentConfig>,
    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentConfig {
    pub component_type: String,
    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub source: PinReference,
    pub targets: Vec<PinReference>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinReference {
    pub component: String,
    pub pin: String,
}

/// Adds one described component to the circuit under `name`.
pub type ComponentCreator =
    fn(config: &ComponentConfig, name: &str, circuit: &mut Circuit) -> Result<NodeId>;

/// Builds circuits from JSON descriptions.
#[derive(Debug)]
pub struct CircuitFactory {
    component_registry: HashMap<String, ComponentCreator>,
}

impl Default for CircuitFactory {
    fn default() -> Self {
        Self::new()
    }
}

fn string_property<'a>(config: &'a ComponentConfig, name: &str, property: &str) -> Result<&'a str> {
    config
        .properties
        .get(property)
        .ok_or_else(|| SimError::InvalidProperty {
            component: name.to_string(),
            property: property.to_string(),
            reason: "missing".to_string(),
        })?
        .as_str()
        .ok_or_else(|| SimError::InvalidProperty {
            component: name.to_string(),
            property: property.to_string(),
            reason: "expected a string".to_string(),
        })
}

fn lut_property(config: &ComponentConfig, name: &str) -> Result<Lut> {
    let invalid = |reason: String| SimError::InvalidProperty {
        component: name.to_string(),
        property: "lut".to_string(),
        reason,
    };
    let value = config
        .properties
        .get("lut")
        .ok_or_else(|| invalid("missing".to_string()))?;
    let raw = match value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| invalid(format!("{} is not an unsigned integer", n)))?,
        serde_json::Value::String(s) => {
            let digits = s.trim_start_matches("0b");
            u64::from_str_radix(digits, 2)
                .map_err(|_| invalid(format!("'{}' is not a binary number", s)))?
        }
        other => return Err(invalid(format!("unexpected value {}", other))),
    };
    let raw =
        u32::try_from(raw).map_err(|_| invalid(format!("{} does not fit in 32 bits", raw)))?;
    Lut::new(raw)
}

impl CircuitFactory {
    pub fn new() -> Self {
        let mut factory = CircuitFactory {
            component_registry: HashMap::new(),
        };
        factory.register_default_components();
        factory
    }

    fn register_default_components(&mut self) {
        self.register("and", |_, name, circuit| circuit.add_gate(name, Lut::AND));
        self.register("or", |_, name, circuit| circuit.add_gate(name, Lut::OR));
        self.register("xor", |_, name, circuit| circuit.add_gate(name, Lut::XOR));
        self.register("nand", |_, name, circuit| circuit.add_gate(name, Lut::NAND));
        self.register("nor", |_, name, circuit| circuit.add_gate(name, Lut::NOR));
        self.register("xnor", |_, name, circuit| circuit.add_gate(name, Lut::XNOR));
        self.register("not", |_, name, circuit| circuit.add_gate(name, Lut::NOT));
        self.register("buffer", |_, name, circuit| {
            circuit.add_gate(name, Lut::BUFFER)
        });

        self.register("gate", |config, name, circuit| {
            let lut = lut_property(config, name)?;
            circuit.add_gate(name, lut)
        });

        self.register("stimulus", |config, name, circuit| {
            let pattern = string_property(config, name, "pattern")?;
            circuit.add_stimulus(name, pattern)
        });

        self.register("probe", |_, name, circuit| circuit.add_probe(name));
    }

    /// Registers (or replaces) the creator for `component_type`.
    pub fn register(&mut self, component_type: &str, creator: ComponentCreator) {
        self.component_registry
            .insert(component_type.to_string(), creator);
    }

    pub fn component_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.component_registry.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn create_from_json(&self, json_path: impl AsRef<Path>) -> Result<Circuit> {
        let config = self.load_json_config(json_path.as_ref())?;
        self.create_from_config(&config)
    }

    pub fn create_from_str(&self, json: &str) -> Result<Circuit> {
        let config: CircuitConfig = serde_json::from_str(json)?;
        self.create_from_config(&config)
    }

    fn load_json_config(&self, path: &Path) -> Result<CircuitConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| SimError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn create_from_config(&self, config: &CircuitConfig) -> Result<Circuit> {
        let mut circuit =
            Circuit::new(config.name.clone(), config.sim_length).with_description(&config.description);
        self.create_components(config, &mut circuit)?;
        self.connect_components(config, &mut circuit)?;
        debug!(
            circuit = %config.name,
            version = %config.version,
            components = config.components.len(),
            connections = config.connections.len(),
            "circuit created from description"
        );
        Ok(circuit)
    }

    fn create_components(&self, config: &CircuitConfig, circuit: &mut Circuit) -> Result<()> {
        for (id, component_config) in &config.components {
            let creator = self
                .component_registry
                .get(&component_config.component_type)
                .ok_or_else(|| {
                    SimError::UnknownComponentType(component_config.component_type.clone())
                })?;
            creator(component_config, id, circuit)?;
        }
        Ok(())
    }

    fn connect_components(&self, config: &CircuitConfig, circuit: &mut Circuit) -> Result<()> {
        for (connection_id, connection) in &config.connections {
            debug!(
                connection = %connection_id,
                source = %connection.source.component,
                targets = connection.targets.len(),
                "connecting"
            );
            if connection.source.pin != OUTPUT_PIN {
                return Err(SimError::PinNotFound {
                    component: connection.source.component.clone(),
                    pin: connection.source.pin.clone(),
                });
            }
            for target in &connection.targets {
                circuit.connect(&connection.source.component, &target.component, &target.pin)?;
            }
        }
        Ok(())
    }
}
