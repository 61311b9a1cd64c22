use crate::grid::{Grid, Pos};
use crate::virus::{StrainId, Strains};
use serde::{Deserialize, Serialize};

/// Disease state of an agent.
///
/// Resistance is not a state of its own: an agent is resistant to the
/// strains in its immune set and may still be exposed to any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthState {
    Susceptible,
    Exposed,
    Infected,
    Dead,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: usize,
    pub pos: Pos,
    pub state: HealthState,

    /// Strain currently carried, if any.
    pub strain: Option<StrainId>,
    /// Strains this agent can no longer be exposed to.
    pub immunities: Vec<StrainId>,

    pub move_chance: f64,
    pub recovery_chance: f64,
    pub resistance_chance: f64,

    /// Consecutive steps spent infected.
    pub time_infected: u32,
}

impl Agent {
    pub fn is_immune_to(&self, strain: StrainId) -> bool {
        self.immunities.contains(&strain)
    }

    pub fn is_resistant(&self) -> bool {
        self.state != HealthState::Dead && !self.immunities.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    /// Number of steps performed so far.
    pub step: usize,

    pub agt_vec: Vec<Agent>,

    pub grid: Grid,

    pub strains: Strains,
}
