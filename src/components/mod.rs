// Circuit element kernels
pub mod gate;
pub mod probe;
pub mod stimulus;

pub use gate::LutGate;
pub use probe::ProbeRecorder;
pub use stimulus::StimulusPlayer;

use crate::component::Component;
use crate::config::{NodeConfig, NodeKind};
use crate::error::Result;
use crate::region::ConfigRegion;

/// Decodes the configuration block in `region` and builds the matching kernel.
///
/// Malformed blocks are rejected here, before the node is scheduled.
pub fn load(name: String, kind: NodeKind, region: &ConfigRegion) -> Result<Box<dyn Component>> {
    Ok(match NodeConfig::load(kind, region)? {
        NodeConfig::Gate(config) => Box::new(LutGate::new(name, config)),
        NodeConfig::Stimulus(config) => Box::new(StimulusPlayer::new(name, config)),
        NodeConfig::Probe(config) => {
            Box::new(ProbeRecorder::new(name, config, region.clone())?)
        }
    })
}
