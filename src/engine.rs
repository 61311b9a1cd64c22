use crate::census::{AgentTrace, Census};
use crate::config::Config;
use crate::grid::{Grid, Pos};
use crate::model::{Agent, HealthState, State};
use crate::virus::{Strains, Virus};
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::{Bernoulli, Uniform};
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Simulation engine.
///
/// Holds the configuration, current state, and random number generator,
/// and provides methods to initialize, run, save, and load simulations.
#[derive(Serialize, Deserialize)]
pub struct Engine {
    cfg: Config,
    state: State,
    rng: ChaCha12Rng,
}

impl Engine {
    /// Create a new `Engine` with the given configuration and a random initial state.
    ///
    /// The first `n_infected` agents start infected, each with a strain of
    /// its own. Every agent is placed on a uniformly chosen cell.
    pub fn generate_initial_condition(cfg: Config) -> Result<Self> {
        let mut rng = match cfg.init.seed {
            Some(seed) => ChaCha12Rng::seed_from_u64(seed),
            None => ChaCha12Rng::try_from_os_rng()?,
        };

        let mut grid = Grid::new(cfg.init.width, cfg.init.height)?;
        let mut strains = Strains::new();

        let x_dist = Uniform::new(0, cfg.init.width)?;
        let y_dist = Uniform::new(0, cfg.init.height)?;
        let factor_dist = Uniform::new_inclusive(-1.0, 1.0)?;

        let model = &cfg.model;
        let n_agt = cfg.init.n_agents();
        let mut agt_vec = Vec::with_capacity(n_agt);
        for id in 0..n_agt {
            let (state, strain) = if id < cfg.init.n_infected {
                let virus = if model.insert_variant {
                    Virus::variant(
                        model.spread_chance,
                        model.fatality_rate,
                        model.min_time_to_recover,
                        model.variation_chance,
                        factor_dist.sample(&mut rng),
                    )
                } else {
                    Virus::common(
                        model.spread_chance,
                        model.fatality_rate,
                        model.min_time_to_recover,
                    )
                };
                (HealthState::Infected, Some(strains.insert(virus)))
            } else {
                (HealthState::Susceptible, None)
            };

            let pos = Pos::new(x_dist.sample(&mut rng), y_dist.sample(&mut rng));
            grid.place_agent(id, pos);

            agt_vec.push(Agent {
                id,
                pos,
                state,
                strain,
                immunities: Vec::new(),
                move_chance: model.move_chance,
                recovery_chance: model.recovery_chance,
                resistance_chance: model.resistance_chance,
                time_infected: 0,
            });
        }

        let state = State {
            step: 0,
            agt_vec,
            grid,
            strains,
        };

        Ok(Self { cfg, state, rng })
    }

    pub fn cfg(&self) -> &Config {
        &self.cfg
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// Perform the simulation and save the resulting census to a CSV file.
    ///
    /// If `trace_file` is given, the state of every agent is written to it
    /// at every step as well.
    pub fn perform_simulation<P: AsRef<Path>>(
        &mut self,
        file: P,
        trace_file: Option<P>,
    ) -> Result<()> {
        let file = file.as_ref();
        let mut writer =
            csv::Writer::from_path(file).with_context(|| format!("failed to create {file:?}"))?;

        let mut trace_writer = match &trace_file {
            Some(trace_file) => {
                let trace_file: &Path = trace_file.as_ref();
                let trace_writer = csv::Writer::from_path(trace_file)
                    .with_context(|| format!("failed to create {trace_file:?}"))?;
                Some(trace_writer)
            }
            None => None,
        };

        let n_steps = self.cfg.output.steps_per_file;
        let steps_per_log = (n_steps / 10).max(1);
        for i_step in 0..n_steps {
            if let Some(trace_writer) = &mut trace_writer {
                for trace in AgentTrace::take(&self.state) {
                    trace_writer
                        .serialize(trace)
                        .context("failed to serialize agent trace")?;
                }
            }

            let census = self.perform_step().context("failed to perform step")?;
            writer
                .serialize(census)
                .context("failed to serialize census")?;

            if (i_step + 1) % steps_per_log == 0 {
                let progress = 100.0 * (i_step + 1) as f64 / n_steps as f64;
                log::info!("completed {progress:06.2}%");
            }
        }

        writer.flush().context("failed to flush writer stream")?;
        if let Some(trace_writer) = &mut trace_writer {
            trace_writer
                .flush()
                .context("failed to flush trace writer stream")?;
        }

        Ok(())
    }

    /// Save a checkpoint of the entire engine state.
    ///
    /// Can be used to resume the simulation later.
    pub fn save_checkpoint<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, &self).context("failed to serialize engine")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }

    /// Load a previously saved engine checkpoint.
    pub fn load_checkpoint<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);
        let engine = decode::from_read(&mut reader).context("failed to deserialize engine")?;
        Ok(engine)
    }

    /// Take the census of the current state and then advance every agent once.
    ///
    /// Agents are activated in a freshly shuffled order and each one sees
    /// the changes made by the agents activated before it.
    pub fn perform_step(&mut self) -> Result<Census> {
        let census = Census::take(&self.state);

        let mut i_agt_order: Vec<usize> = (0..self.state.agt_vec.len()).collect();
        i_agt_order.shuffle(&mut self.rng);

        for i_agt in i_agt_order {
            self.step_agent(i_agt)
                .with_context(|| format!("failed to step agent {i_agt}"))?;
        }

        self.state.step += 1;

        Ok(census)
    }

    fn step_agent(&mut self, i_agt: usize) -> Result<()> {
        if self.state.agt_vec[i_agt].state == HealthState::Infected {
            self.expose_neighbors(i_agt)
                .context("failed to expose neighbors")?;
            self.try_to_recover(i_agt)
                .context("failed to resolve infection")?;
        }

        if self.state.agt_vec[i_agt].state == HealthState::Exposed {
            self.resolve_exposure(i_agt)
                .context("failed to resolve exposure")?;
        }

        if self.state.agt_vec[i_agt].state != HealthState::Dead {
            self.move_agent(i_agt).context("failed to move agent")?;
        }

        Ok(())
    }

    fn expose_neighbors(&mut self, i_agt: usize) -> Result<()> {
        let agt = &self.state.agt_vec[i_agt];
        let strain = agt.strain.context("infected agent carries no strain")?;
        let i_nbr_vec = self.state.grid.neighbors(agt.pos, true);

        for i_nbr in i_nbr_vec {
            let nbr = &self.state.agt_vec[i_nbr];
            if nbr.state != HealthState::Susceptible || nbr.is_immune_to(strain) {
                continue;
            }

            // Variants may hand a freshly mutated strain to each neighbor.
            let nbr_strain = self
                .state
                .strains
                .transmit(strain, &mut self.rng)
                .context("failed to transmit strain")?;

            let nbr = &mut self.state.agt_vec[i_nbr];
            nbr.state = HealthState::Exposed;
            nbr.strain = Some(nbr_strain);
            nbr.time_infected = 0;
        }

        Ok(())
    }

    fn try_to_recover(&mut self, i_agt: usize) -> Result<()> {
        let agt = &mut self.state.agt_vec[i_agt];
        let strain = agt.strain.context("infected agent carries no strain")?;
        let virus = &self.state.strains[strain];

        agt.time_infected += 1;
        if agt.time_infected < virus.min_time_to_recover {
            return Ok(());
        }

        let rec_dist = Bernoulli::new(agt.recovery_chance)?;
        if rec_dist.sample(&mut self.rng) {
            agt.state = HealthState::Susceptible;
            agt.time_infected = 0;

            let res_dist = Bernoulli::new(agt.resistance_chance)?;
            if res_dist.sample(&mut self.rng) {
                agt.immunities.push(strain);
                agt.strain = None;
            }
            return Ok(());
        }

        let fat_dist = Bernoulli::new(virus.fatality_rate)?;
        if fat_dist.sample(&mut self.rng) {
            agt.state = HealthState::Dead;
        }

        Ok(())
    }

    fn resolve_exposure(&mut self, i_agt: usize) -> Result<()> {
        let agt = &mut self.state.agt_vec[i_agt];
        let strain = agt.strain.context("exposed agent carries no strain")?;

        let spr_dist = Bernoulli::new(self.state.strains[strain].spread_chance)?;
        if spr_dist.sample(&mut self.rng) {
            agt.state = HealthState::Infected;
            agt.time_infected = 0;
        } else {
            agt.state = HealthState::Susceptible;
            agt.strain = None;
        }

        Ok(())
    }

    fn move_agent(&mut self, i_agt: usize) -> Result<()> {
        let agt = &self.state.agt_vec[i_agt];
        let mov_dist = Bernoulli::new(agt.move_chance)?;
        if !mov_dist.sample(&mut self.rng) {
            return Ok(());
        }

        let from = agt.pos;
        let cells = self.state.grid.neighborhood(from, false);
        let &to = cells
            .choose(&mut self.rng)
            .context("failed to choose a cell to move to")?;

        self.state.grid.move_agent(i_agt, from, to)?;
        self.state.agt_vec[i_agt].pos = to;

        Ok(())
    }
}
