use crate::model::{HealthState, State};
use serde::{Deserialize, Serialize};

/// Number of agents in each health state at a given iteration.
///
/// `resistant` counts living agents immune to at least one strain and
/// overlaps with the other columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Census {
    pub iteration: usize,
    pub susceptible: usize,
    pub exposed: usize,
    pub infected: usize,
    pub resistant: usize,
    pub dead: usize,
}

impl Census {
    pub fn take(state: &State) -> Self {
        let mut census = Census {
            iteration: state.step,
            ..Default::default()
        };
        for agt in &state.agt_vec {
            match agt.state {
                HealthState::Susceptible => census.susceptible += 1,
                HealthState::Exposed => census.exposed += 1,
                HealthState::Infected => census.infected += 1,
                HealthState::Dead => census.dead += 1,
            }
            if agt.is_resistant() {
                census.resistant += 1;
            }
        }
        census
    }

    /// Number of agents accounted for by the exclusive states.
    pub fn total(&self) -> usize {
        self.susceptible + self.exposed + self.infected + self.dead
    }
}

/// Per-agent record of the strain parameters an agent carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTrace {
    pub iteration: usize,
    pub agent: usize,
    pub state: HealthState,
    pub strain: Option<usize>,
    pub spread_chance: Option<f64>,
    pub fatality_rate: Option<f64>,
    pub immunities: usize,
}

impl AgentTrace {
    pub fn take(state: &State) -> Vec<Self> {
        state
            .agt_vec
            .iter()
            .map(|agt| {
                let virus = agt.strain.map(|id| &state.strains[id]);
                AgentTrace {
                    iteration: state.step,
                    agent: agt.id,
                    state: agt.state,
                    strain: agt.strain.map(|id| id.index()),
                    spread_chance: virus.map(|v| v.spread_chance),
                    fatality_rate: virus.map(|v| v.fatality_rate),
                    immunities: agt.immunities.len(),
                }
            })
            .collect()
    }
}
