//! Pathogen strains and their mutation.

use anyhow::{Context, Result};
use rand::prelude::*;
use rand_distr::{Bernoulli, Uniform};
use serde::{Deserialize, Serialize};
use std::ops::Index;

/// Identity of a strain inside a [`Strains`] registry.
///
/// Two strains are the same strain only if they have the same id,
/// regardless of their parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StrainId(usize);

impl StrainId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Mutation parameters carried by variant strains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    /// Position in `[-1, 1]` between the negative and positive range.
    pub factor: f64,
    /// Maximum shift of the spread chance away from its baseline.
    pub spread_range: f64,
    /// Maximum shift of the fatality rate away from its baseline.
    pub fatality_range: f64,
    /// Probability of mutating when passed on to another agent.
    pub variation_chance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Kind {
    Common,
    Variant(Mutation),
}

/// Strain descriptor. Never modified once registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Virus {
    /// Probability that an exposure develops into an infection.
    pub spread_chance: f64,
    /// Probability that an eligible infected agent dies.
    pub fatality_rate: f64,
    /// Number of infected steps before recovery or death can happen.
    pub min_time_to_recover: u32,
    pub kind: Kind,
    /// Strain this one mutated from, if any.
    pub parent: Option<StrainId>,
}

impl Virus {
    /// Create a strain that never mutates.
    pub fn common(spread_chance: f64, fatality_rate: f64, min_time_to_recover: u32) -> Self {
        Self {
            spread_chance,
            fatality_rate,
            min_time_to_recover,
            kind: Kind::Common,
            parent: None,
        }
    }

    /// Create a seed variant around the given baseline.
    ///
    /// The spread range is half the baseline spread chance and the
    /// fatality range a quarter of it.
    pub fn variant(
        spread_chance: f64,
        fatality_rate: f64,
        min_time_to_recover: u32,
        variation_chance: f64,
        factor: f64,
    ) -> Self {
        let mutation = Mutation {
            factor,
            spread_range: spread_chance / 2.0,
            fatality_range: spread_chance / 4.0,
            variation_chance,
        };
        Self::derive(spread_chance, fatality_rate, min_time_to_recover, mutation)
    }

    /// Derive a new variant from this one with a fresh mutation factor.
    ///
    /// The current (already mutated) parameters become the new baseline,
    /// so successive mutations accumulate. Returns `None` for common strains.
    pub fn mutate(&self, factor: f64) -> Option<Self> {
        let Kind::Variant(mutation) = &self.kind else {
            return None;
        };
        let mutation = Mutation {
            factor,
            ..mutation.clone()
        };
        Some(Self::derive(
            self.spread_chance,
            self.fatality_rate,
            self.min_time_to_recover,
            mutation,
        ))
    }

    fn derive(
        spread_chance: f64,
        fatality_rate: f64,
        min_time_to_recover: u32,
        mutation: Mutation,
    ) -> Self {
        let spread_chance = spread_chance + interp_mutation(mutation.factor, mutation.spread_range);
        let fatality_rate =
            fatality_rate + interp_mutation(mutation.factor, mutation.fatality_range);
        Self {
            spread_chance: spread_chance.clamp(0.0, 1.0),
            fatality_rate: fatality_rate.clamp(0.0, 1.0),
            min_time_to_recover,
            kind: Kind::Variant(mutation),
            parent: None,
        }
    }
}

/// Map a factor in `[-1, 1]` linearly onto `[-range, range]`.
fn interp_mutation(factor: f64, range: f64) -> f64 {
    factor.clamp(-1.0, 1.0) * range
}

/// Registry owning every strain created during a simulation.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Strains {
    vec: Vec<Virus>,
}

impl Strains {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, virus: Virus) -> StrainId {
        self.vec.push(virus);
        StrainId(self.vec.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.vec.len()
    }

    /// Number of mutations separating a strain from its seed strain.
    pub fn lineage_depth(&self, mut id: StrainId) -> usize {
        let mut depth = 0;
        while let Some(parent) = self[id].parent {
            depth += 1;
            id = parent;
        }
        depth
    }

    pub fn max_lineage_depth(&self) -> usize {
        (0..self.vec.len())
            .map(|idx| self.lineage_depth(StrainId(idx)))
            .max()
            .unwrap_or(0)
    }

    /// Pick the strain a newly exposed agent receives from `id`.
    ///
    /// Common strains are always shared. Variants are shared unless a
    /// mutation happens, in which case a new strain is registered.
    pub fn transmit<R: Rng>(&mut self, id: StrainId, rng: &mut R) -> Result<StrainId> {
        let Kind::Variant(mutation) = &self[id].kind else {
            return Ok(id);
        };

        let var_dist = Bernoulli::new(mutation.variation_chance)?;
        if !var_dist.sample(rng) {
            return Ok(id);
        }

        let factor_dist = Uniform::new_inclusive(-1.0, 1.0)?;
        let mut virus = self[id]
            .mutate(factor_dist.sample(rng))
            .context("failed to mutate variant")?;
        virus.parent = Some(id);

        let spread_chance = virus.spread_chance;
        let fatality_rate = virus.fatality_rate;
        let new_id = self.insert(virus);
        log::debug!(
            "strain {} mutated into {} (spread {spread_chance:.4}, fatality {fatality_rate:.4})",
            id.0,
            new_id.0
        );

        Ok(new_id)
    }
}

impl Index<StrainId> for Strains {
    type Output = Virus;

    fn index(&self, id: StrainId) -> &Virus {
        &self.vec[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha12Rng;

    const TOL: f64 = 1e-12;

    #[test]
    fn neutral_factor_keeps_baseline() {
        let virus = Virus::variant(0.4, 0.024, 2, 0.01, 0.0);
        assert!((virus.spread_chance - 0.4).abs() < TOL);
        assert!((virus.fatality_rate - 0.024).abs() < TOL);
        assert_eq!(virus.min_time_to_recover, 2);
    }

    #[test]
    fn extreme_factors_reach_full_range() {
        let virus = Virus::variant(0.4, 0.3, 0, 0.01, 1.0);
        assert!((virus.spread_chance - 0.6).abs() < TOL);
        assert!((virus.fatality_rate - 0.4).abs() < TOL);

        let virus = Virus::variant(0.4, 0.3, 0, 0.01, -1.0);
        assert!((virus.spread_chance - 0.2).abs() < TOL);
        assert!((virus.fatality_rate - 0.2).abs() < TOL);
    }

    #[test]
    fn interpolated_values_are_clamped() {
        let virus = Virus::variant(0.4, 0.024, 0, 0.01, -1.0);
        assert_eq!(virus.fatality_rate, 0.0);

        let virus = Virus::variant(0.9, 0.5, 0, 0.01, 1.0);
        assert_eq!(virus.spread_chance, 1.0);
    }

    #[test]
    fn common_strains_never_mutate() {
        let virus = Virus::common(0.4, 0.024, 1);
        assert!(virus.mutate(0.5).is_none());

        let mut strains = Strains::new();
        let id = strains.insert(virus);
        let mut rng = ChaCha12Rng::seed_from_u64(7);
        for _ in 0..100 {
            assert_eq!(strains.transmit(id, &mut rng).unwrap(), id);
        }
        assert_eq!(strains.len(), 1);
    }

    #[test]
    fn mutation_builds_on_parent_parameters() {
        let parent = Virus::variant(0.4, 0.2, 3, 0.5, 0.5);
        let child = parent.mutate(0.5).unwrap();
        assert!((child.spread_chance - (parent.spread_chance + 0.1)).abs() < TOL);
        assert!((child.fatality_rate - (parent.fatality_rate + 0.05)).abs() < TOL);
        assert_eq!(child.min_time_to_recover, 3);
        let Kind::Variant(mutation) = &child.kind else {
            panic!("child is not a variant");
        };
        assert_eq!(mutation.variation_chance, 0.5);
        assert_eq!(mutation.factor, 0.5);
    }

    #[test]
    fn certain_variation_registers_new_strains() {
        let mut strains = Strains::new();
        let seed = strains.insert(Virus::variant(0.4, 0.1, 0, 1.0, 0.0));
        let mut rng = ChaCha12Rng::seed_from_u64(7);

        let first = strains.transmit(seed, &mut rng).unwrap();
        let second = strains.transmit(first, &mut rng).unwrap();
        assert_ne!(first, seed);
        assert_ne!(second, first);
        assert_eq!(strains[second].parent, Some(first));
        assert_eq!(strains.lineage_depth(second), 2);
        assert_eq!(strains.lineage_depth(seed), 0);
        assert_eq!(strains.max_lineage_depth(), 2);
    }

    #[test]
    fn zero_variation_shares_the_strain() {
        let mut strains = Strains::new();
        let seed = strains.insert(Virus::variant(0.4, 0.1, 0, 0.0, 0.3));
        let mut rng = ChaCha12Rng::seed_from_u64(7);
        assert_eq!(strains.transmit(seed, &mut rng).unwrap(), seed);
        assert_eq!(strains.len(), 1);
    }
}
