use std::collections::HashSet;

use volley_core::prelude::{Assertion, ScenarioDescriptor};

use crate::context::{RunnerContext, UserContext};

pub type HookResult = anyhow::Result<()>;

pub type GlobalHook = fn(&RunnerContext) -> HookResult;
pub type UserBehaviour = fn(&mut UserContext) -> HookResult;

/// One named population of users inside a simulation, all running the same behaviour.
#[derive(Debug, Clone)]
pub struct ScenarioDefinition {
    pub name: String,
    pub users: usize,
    pub behaviour: UserBehaviour,
}

impl ScenarioDefinition {
    pub fn descriptor(&self) -> ScenarioDescriptor {
        ScenarioDescriptor::new(&self.name, self.users)
    }
}

/// The builder for a simulation definition.
///
/// A simulation groups the scenarios that are run together and the assertions that decide whether
/// the run passed.
pub struct SimulationDefinitionBuilder {
    /// The name of the simulation, which must be unique among the simulations offered to the runner.
    ///
    /// Recommended value is `env!("CARGO_PKG_NAME")` for a binary that defines a single simulation.
    name: String,
    /// Global setup hook for this simulation. It will be run once, after the run record is opened
    /// and before any users are started.
    setup_fn: Option<GlobalHook>,
    /// Global teardown hook for this simulation. It will be run once, after every user has finished.
    teardown_fn: Option<GlobalHook>,
    scenarios: Vec<ScenarioDefinition>,
    assertions: Vec<Assertion>,
}

/// A validated simulation, ready to be run.
#[derive(Debug, Clone)]
pub struct SimulationDefinition {
    name: String,
    setup_fn: Option<GlobalHook>,
    teardown_fn: Option<GlobalHook>,
    scenarios: Vec<ScenarioDefinition>,
    assertions: Vec<Assertion>,
}

impl SimulationDefinitionBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            setup_fn: None,
            teardown_fn: None,
            scenarios: Vec::new(),
            assertions: Vec::new(),
        }
    }

    /// Set the global setup hook [SimulationDefinitionBuilder::setup_fn] for this simulation.
    pub fn use_setup(mut self, setup_fn: GlobalHook) -> Self {
        self.setup_fn = Some(setup_fn);
        self
    }

    /// Set the global teardown hook [SimulationDefinitionBuilder::teardown_fn] for this simulation.
    pub fn use_teardown(mut self, teardown_fn: GlobalHook) -> Self {
        self.teardown_fn = Some(teardown_fn);
        self
    }

    /// Add a scenario that starts `users` users, each running `behaviour` once.
    pub fn use_scenario(mut self, name: &str, users: usize, behaviour: UserBehaviour) -> Self {
        if self.scenarios.iter().any(|s| s.name == name) {
            panic!("Scenario [{}] is already defined", name);
        }

        self.scenarios.push(ScenarioDefinition {
            name: name.to_string(),
            users,
            behaviour,
        });
        self
    }

    pub fn with_assertion(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    pub fn with_assertions(mut self, assertions: impl IntoIterator<Item = Assertion>) -> Self {
        self.assertions.extend(assertions);
        self
    }

    pub fn build(self) -> anyhow::Result<SimulationDefinition> {
        if self.name.trim().is_empty() {
            anyhow::bail!("A simulation must have a name");
        }

        if self.scenarios.is_empty() {
            anyhow::bail!("Simulation [{}] does not define any scenarios", self.name);
        }

        if let Some(empty) = self.scenarios.iter().find(|s| s.users == 0) {
            anyhow::bail!(
                "Scenario [{}] of simulation [{}] must have at least one user",
                empty.name,
                self.name
            );
        }

        Ok(SimulationDefinition {
            name: self.name,
            setup_fn: self.setup_fn,
            teardown_fn: self.teardown_fn,
            scenarios: self.scenarios,
            assertions: self.assertions,
        })
    }
}

impl SimulationDefinition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scenarios(&self) -> &[ScenarioDefinition] {
        &self.scenarios
    }

    pub fn descriptors(&self) -> Vec<ScenarioDescriptor> {
        self.scenarios.iter().map(|s| s.descriptor()).collect()
    }

    pub fn assertions(&self) -> &[Assertion] {
        &self.assertions
    }

    pub fn total_users(&self) -> usize {
        self.scenarios.iter().map(|s| s.users).sum()
    }

    pub(crate) fn setup_fn(&self) -> Option<GlobalHook> {
        self.setup_fn
    }

    pub(crate) fn teardown_fn(&self) -> Option<GlobalHook> {
        self.teardown_fn
    }
}

/// Names that appear more than once in `names`.
pub(crate) fn duplicate_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for name in names {
        if !seen.insert(name) && !duplicates.iter().any(|d| d == name) {
            duplicates.push(name.to_string());
        }
    }
    duplicates
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn idle(_: &mut UserContext) -> HookResult {
        Ok(())
    }

    #[test]
    fn build_collects_scenarios_in_order() {
        let simulation = SimulationDefinitionBuilder::new("shop")
            .use_scenario("browse", 10, idle)
            .use_scenario("buy", 2, idle)
            .with_assertion(Assertion::global().failed_requests_count().is(0.0))
            .build()
            .unwrap();

        assert_eq!("shop", simulation.name());
        assert_eq!(
            vec![
                ScenarioDescriptor::new("browse", 10),
                ScenarioDescriptor::new("buy", 2)
            ],
            simulation.descriptors()
        );
        assert_eq!(12, simulation.total_users());
        assert_eq!(1, simulation.assertions().len());
    }

    #[test]
    fn build_rejects_empty_simulations() {
        let err = SimulationDefinitionBuilder::new("empty").build().unwrap_err();
        assert!(err.to_string().contains("does not define any scenarios"));

        let err = SimulationDefinitionBuilder::new("nobody")
            .use_scenario("browse", 0, idle)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("at least one user"));
    }

    #[test]
    #[should_panic(expected = "Scenario [browse] is already defined")]
    fn duplicate_scenario_panics() {
        let _ = SimulationDefinitionBuilder::new("shop")
            .use_scenario("browse", 1, idle)
            .use_scenario("browse", 1, idle);
    }

    #[test]
    fn finds_duplicate_names() {
        assert_eq!(
            vec!["a".to_string()],
            duplicate_names(["a", "b", "a", "a"])
        );
        assert!(duplicate_names(["a", "b"]).is_empty());
    }
}
