//! Monte-Carlo approximation of the genotype-collapsed likelihood.
//!
//! For a locus with depth `d`, the number of reads coming from the variant cell population
//! `d_v` ranges over `0..=d`. Given `d_v`, the probability of the observed variant read count
//! marginalized over the reference/variant genotypes does not depend on the cellular prevalence,
//! so it is estimated once per mutation and sample by simulation and kept in a [LikelihoodCache].
use super::check_observation;
use crate::errors::{sampling_error, Result};
use crate::misc::{log_binomial_pdf, logsumexp, logsumexp_str};
use definitions::{GenotypePrior, Observation};
use rand::{Rng, SeedableRng};
use rand_distr::{Binomial, Distribution};
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;

/// Number of simulated draws for each (d_v, genotype pair).
pub const DEFAULT_DRAWS: usize = 1_000_000;

#[derive(Debug, Clone, PartialEq)]
pub struct LikelihoodCache {
    observation: Observation,
    /// log P(observed variant reads | d_v), indexed by d_v.
    log_probs: Vec<f64>,
}

impl std::fmt::Display for LikelihoodCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let finite = self.log_probs.iter().filter(|x| x.is_finite()).count();
        write!(f, "{}\t{}/{}", self.observation, finite, self.log_probs.len())
    }
}

impl LikelihoodCache {
    /// Build the cache. Each d_v is simulated with its own generator seeded from `rng`,
    /// so the result only depends on the state of `rng`, not on the number of threads.
    pub fn new<R: Rng>(
        observation: Observation,
        genotype: &GenotypePrior,
        draws: usize,
        rng: &mut R,
    ) -> Result<Self> {
        check_observation(&observation)?;
        if draws == 0 {
            return Err(crate::errors::invalid_configuration(
                "the number of Monte-Carlo draws should be positive",
            ));
        }
        let depth = observation.total_reads;
        let seeds: Vec<u64> = (0..=depth).map(|_| rng.gen::<u64>()).collect();
        let log_probs = seeds
            .into_par_iter()
            .enumerate()
            .map(|(d_v, seed)| {
                let mut rng: Xoshiro256PlusPlus = SeedableRng::seed_from_u64(seed);
                marginal_log_prob(&observation, d_v as u64, genotype, draws, &mut rng)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            observation,
            log_probs,
        })
    }
    pub fn depth(&self) -> u64 {
        self.observation.total_reads
    }
    pub fn log_probs(&self) -> &[f64] {
        &self.log_probs
    }
    /// log sum_{d_v} P(obs|d_v) Binom(d_v|d,f).
    pub fn log_likelihood(&self, cellular_frequency: f64) -> f64 {
        let depth = self.depth();
        logsumexp_str(
            self.log_probs
                .iter()
                .enumerate()
                .map(|(d_v, lp)| lp + log_binomial_pdf(d_v as u64, depth, cellular_frequency)),
        )
    }
}

// log sum_{g_r, g_v} pi_r pi_v P(obs | d_v, g_r, g_v).
fn marginal_log_prob<R: Rng>(
    observation: &Observation,
    d_v: u64,
    genotype: &GenotypePrior,
    draws: usize,
    rng: &mut R,
) -> Result<f64> {
    let d_r = observation.total_reads - d_v;
    let mut terms = Vec::with_capacity(genotype.reference.len() * genotype.variant.len());
    for reference in genotype.reference.iter() {
        for variant in genotype.variant.iter() {
            let freq = simulate(
                observation.var_reads,
                (d_r, reference.mu),
                (d_v, variant.mu),
                draws,
                rng,
            )?;
            terms.push(reference.log_pi() + variant.log_pi() + freq.ln());
        }
    }
    Ok(logsumexp(&terms))
}

// Empirical frequency of Binom(d_r, mu_r) + Binom(d_v, mu_v) == var_reads.
fn simulate<R: Rng>(
    var_reads: u64,
    (d_r, mu_r): (u64, f64),
    (d_v, mu_v): (u64, f64),
    draws: usize,
    rng: &mut R,
) -> Result<f64> {
    let ref_dist = Binomial::new(d_r, mu_r).map_err(sampling_error)?;
    let var_dist = Binomial::new(d_v, mu_v).map_err(sampling_error)?;
    let hit = (0..draws)
        .filter(|_| ref_dist.sample(rng) + var_dist.sample(rng) == var_reads)
        .count();
    Ok(hit as f64 / draws as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use definitions::GenotypeState;
    #[test]
    fn deterministic_with_seed() {
        let obs = Observation::new(4, 12);
        let genotype = GenotypePrior::default();
        let mut rng: Xoshiro256PlusPlus = SeedableRng::seed_from_u64(3209);
        let cache1 = LikelihoodCache::new(obs, &genotype, 2_000, &mut rng).unwrap();
        let mut rng: Xoshiro256PlusPlus = SeedableRng::seed_from_u64(3209);
        let cache2 = LikelihoodCache::new(obs, &genotype, 2_000, &mut rng).unwrap();
        assert_eq!(cache1, cache2);
        for f in (0..=10).map(|i| i as f64 / 10f64) {
            assert_eq!(cache1.log_likelihood(f), cache2.log_likelihood(f));
        }
    }
    #[test]
    fn never_positive() {
        let obs = Observation::new(7, 15);
        let genotype = GenotypePrior::default();
        let mut rng: Xoshiro256PlusPlus = SeedableRng::seed_from_u64(1);
        let cache = LikelihoodCache::new(obs, &genotype, 5_000, &mut rng).unwrap();
        assert_eq!(cache.log_probs().len(), 16);
        assert!(cache.log_probs().iter().all(|&x| x <= 0f64));
        for f in (0..=20).map(|i| i as f64 / 20f64) {
            let lk = cache.log_likelihood(f);
            assert!(lk <= 0f64, "{}\t{}", f, lk);
        }
    }
    #[test]
    fn unreachable_count_is_neg_inf() {
        // Every read is a reference read (mu = 0.001), and there are few draws,
        // so observing all variant reads without any variant population is never simulated.
        let obs = Observation::new(10, 10);
        let genotype = GenotypePrior::new(
            vec![GenotypeState::new(2, 0, 1f64)],
            vec![GenotypeState::new(2, 0, 1f64)],
            vec![GenotypeState::new(2, 2, 1f64)],
        );
        let mut rng: Xoshiro256PlusPlus = SeedableRng::seed_from_u64(1);
        let cache = LikelihoodCache::new(obs, &genotype, 100, &mut rng).unwrap();
        assert_eq!(cache.log_probs()[0], f64::NEG_INFINITY);
        assert!(cache.log_probs()[10].is_finite());
        assert_eq!(cache.log_likelihood(0f64), f64::NEG_INFINITY);
        assert!(cache.log_likelihood(1f64).is_finite());
    }
    #[test]
    fn approximates_exact_marginal() {
        // With d_v = d, the variant count follows Binom(d, mu_v).
        let obs = Observation::new(5, 10);
        let genotype = GenotypePrior::new(
            vec![GenotypeState::new(2, 0, 1f64)],
            vec![GenotypeState::new(2, 0, 1f64)],
            vec![GenotypeState::new(2, 1, 1f64)],
        );
        let mut rng: Xoshiro256PlusPlus = SeedableRng::seed_from_u64(24);
        let cache = LikelihoodCache::new(obs, &genotype, 200_000, &mut rng).unwrap();
        let exact = log_binomial_pdf(5, 10, 0.5);
        assert!((cache.log_probs()[10] - exact).abs() < 0.05);
    }
    #[test]
    fn zero_draws_is_error() {
        let obs = Observation::new(1, 2);
        let mut rng: Xoshiro256PlusPlus = SeedableRng::seed_from_u64(1);
        assert!(LikelihoodCache::new(obs, &GenotypePrior::default(), 0, &mut rng).is_err());
    }
}
