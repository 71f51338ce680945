use std::sync::Arc;

use crate::definition::{duplicate_names, SimulationDefinition};

/// Where the orchestrator finds the simulations it can run.
pub trait SimulationSource {
    /// Every available simulation, in a stable order.
    fn discover(&self) -> anyhow::Result<Vec<Arc<SimulationDefinition>>>;
}

/// Simulations registered in code by the binary that embeds the runner.
#[derive(Debug, Clone, Default)]
pub struct SimulationRegistry {
    simulations: Vec<Arc<SimulationDefinition>>,
}

impl SimulationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, simulation: SimulationDefinition) -> Self {
        self.simulations.push(Arc::new(simulation));
        self
    }

    pub fn len(&self) -> usize {
        self.simulations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.simulations.is_empty()
    }
}

impl SimulationSource for SimulationRegistry {
    /// Registered simulations sorted by name.
    ///
    /// Fails if two simulations share a name, because a configured simulation name would be
    /// ambiguous.
    fn discover(&self) -> anyhow::Result<Vec<Arc<SimulationDefinition>>> {
        let duplicates = duplicate_names(self.simulations.iter().map(|s| s.name()));
        if !duplicates.is_empty() {
            anyhow::bail!(
                "Simulation names must be unique, found duplicates: {}",
                duplicates.join(", ")
            );
        }

        let mut simulations = self.simulations.clone();
        simulations.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(simulations)
    }
}
