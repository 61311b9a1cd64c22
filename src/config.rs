use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub model: ModelConfig,
    pub init: InitConfig,
    pub output: OutputConfig,
}

/// Disease and behaviour parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    /// Baseline probability that an exposure develops into an infection.
    pub spread_chance: f64,
    /// Baseline probability that an infected agent dies once eligible.
    pub fatality_rate: f64,
    /// Number of infected steps before recovery or death can happen.
    pub min_time_to_recover: u32,

    /// Seed the population with variant strains instead of common ones.
    pub insert_variant: bool,
    /// Probability that a variant mutates when it is passed on.
    pub variation_chance: f64,

    /// Probability that an agent moves during a step.
    pub move_chance: f64,
    /// Probability that an eligible infected agent recovers.
    pub recovery_chance: f64,
    /// Probability that a recovering agent becomes immune to its strain.
    pub resistance_chance: f64,
}

/// Initial condition parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InitConfig {
    /// Number of agents starting susceptible.
    pub n_susceptible: usize,
    /// Number of agents starting infected.
    pub n_infected: usize,

    /// Grid width (number of columns).
    pub width: usize,
    /// Grid height (number of rows).
    pub height: usize,

    /// Seed of the random number generator (taken from the OS if absent).
    pub seed: Option<u64>,
}

/// Output parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Number of steps simulated per trajectory file.
    pub steps_per_file: usize,
    /// Write a per-agent trace next to every trajectory file.
    #[serde(default)]
    pub trace_agents: bool,
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded and contain a serialized [`Config`].
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents = fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    /// Check that every parameter describes a meaningful simulation.
    pub fn validate(&self) -> Result<()> {
        let model = &self.model;
        check_num(model.spread_chance, 0.0..=1.0).context("invalid spread chance")?;
        check_num(model.fatality_rate, 0.0..=1.0).context("invalid fatality rate")?;
        check_num(model.min_time_to_recover, 0..100_000)
            .context("invalid minimum time to recover")?;
        check_num(model.variation_chance, 0.0..=1.0).context("invalid variation chance")?;
        check_num(model.move_chance, 0.0..=1.0).context("invalid move chance")?;
        check_num(model.recovery_chance, 0.0..=1.0).context("invalid recovery chance")?;
        check_num(model.resistance_chance, 0.0..=1.0).context("invalid resistance chance")?;

        let init = &self.init;
        check_num(init.n_susceptible, 0..100_000).context("invalid number of susceptible agents")?;
        check_num(init.n_infected, 0..100_000).context("invalid number of infected agents")?;
        check_num(init.n_agents(), 1..100_000).context("invalid total number of agents")?;
        check_num(init.width, 1..10_000).context("invalid grid width")?;
        check_num(init.height, 1..10_000).context("invalid grid height")?;

        check_num(self.output.steps_per_file, 1..1_000_000)
            .context("invalid number of steps per file")?;

        Ok(())
    }
}

impl InitConfig {
    /// Total number of agents in the population.
    pub fn n_agents(&self) -> usize {
        self.n_susceptible + self.n_infected
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    // NaN is never contained in a range, so it is rejected here as well.
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}
