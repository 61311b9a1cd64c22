use crate::census::Census;
use crate::stats::{Accumulator, TimeSeries};
use anyhow::{Context, Result};
use serde::Serialize;
use std::{fs::File, io::BufWriter, path::Path};

/// Quantity measured over the census time series of a run.
pub trait Obs {
    fn update(&mut self, census: &Census) -> Result<()>;
    fn report(&self) -> serde_json::Value;
}

/// Mean and standard deviation of every state count.
pub struct StateCounts {
    acc_vec: [Accumulator; 5],
}

impl StateCounts {
    pub fn new() -> Self {
        Self {
            acc_vec: std::array::from_fn(|_| Accumulator::new()),
        }
    }
}

impl Obs for StateCounts {
    fn update(&mut self, census: &Census) -> Result<()> {
        let counts = [
            census.susceptible,
            census.exposed,
            census.infected,
            census.resistant,
            census.dead,
        ];
        for (acc, count) in self.acc_vec.iter_mut().zip(counts) {
            acc.add(count as f64);
        }
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        let [s, e, i, r, d] = self.acc_vec.each_ref().map(Accumulator::report);
        serde_json::json!({
            "state_counts": {
                "susceptible": s,
                "exposed": e,
                "infected": i,
                "resistant": r,
                "dead": d,
            }
        })
    }
}

/// Largest number of simultaneously infected agents.
pub struct PeakInfected {
    peak: Option<(usize, usize)>,
}

impl PeakInfected {
    pub fn new() -> Self {
        Self { peak: None }
    }
}

impl Obs for PeakInfected {
    fn update(&mut self, census: &Census) -> Result<()> {
        let is_new_peak = match self.peak {
            Some((_, infected)) => census.infected > infected,
            None => true,
        };
        if is_new_peak {
            self.peak = Some((census.iteration, census.infected));
        }
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        let (iteration, infected) = self.peak.unzip();
        serde_json::json!({ "peak_infected": { "iteration": iteration, "infected": infected } })
    }
}

/// Last census of the run.
pub struct FinalCensus {
    last: Option<Census>,
}

impl FinalCensus {
    pub fn new() -> Self {
        Self { last: None }
    }
}

impl Obs for FinalCensus {
    fn update(&mut self, census: &Census) -> Result<()> {
        self.last = Some(*census);
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({ "final_census": self.last })
    }
}

/// Fraction of living agents that are infected, once equilibrated.
pub struct Prevalence {
    time_series: TimeSeries,
}

impl Prevalence {
    pub fn new() -> Self {
        Self {
            time_series: TimeSeries::new(),
        }
    }
}

impl Obs for Prevalence {
    fn update(&mut self, census: &Census) -> Result<()> {
        let n_alive = census.total() - census.dead;
        let prevalence = if n_alive > 0 {
            census.infected as f64 / n_alive as f64
        } else {
            0.0
        };
        self.time_series.push(prevalence);
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({ "prevalence": self.time_series.report() })
    }
}

/// Summary of the strains created during a run.
#[derive(Debug, Serialize)]
pub struct StrainSummary {
    pub n_strains: usize,
    pub max_lineage_depth: usize,
}

pub struct Analyzer {
    obs_ptr_vec: Vec<Box<dyn Obs>>,
    strain_summary: Option<StrainSummary>,
}

impl Analyzer {
    pub fn new() -> Self {
        let obs_ptr_vec: Vec<Box<dyn Obs>> = vec![
            Box::new(StateCounts::new()),
            Box::new(PeakInfected::new()),
            Box::new(FinalCensus::new()),
            Box::new(Prevalence::new()),
        ];
        Self {
            obs_ptr_vec,
            strain_summary: None,
        }
    }

    pub fn add_census(&mut self, census: &Census) -> Result<()> {
        for obs in &mut self.obs_ptr_vec {
            obs.update(census).context("failed to update observable")?;
        }
        Ok(())
    }

    pub fn add_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let mut reader =
            csv::Reader::from_path(file).with_context(|| format!("failed to open {file:?}"))?;

        for record in reader.deserialize() {
            let census: Census = record.context("failed to read census")?;
            self.add_census(&census)?;
        }
        Ok(())
    }

    pub fn set_strain_summary(&mut self, summary: StrainSummary) {
        self.strain_summary = Some(summary);
    }

    pub fn report(&self) -> serde_json::Value {
        let mut reports: Vec<_> = self.obs_ptr_vec.iter().map(|obs| obs.report()).collect();
        if let Some(summary) = &self.strain_summary {
            reports.push(serde_json::json!({ "strains": summary }));
        }
        serde_json::Value::Array(reports)
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let writer = BufWriter::new(file);

        serde_json::to_writer_pretty(writer, &self.report())
            .context("failed to serialize results")?;
        Ok(())
    }
}
