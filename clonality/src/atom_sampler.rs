//! Update of the cluster parameters given the partition.
use crate::base_measure::MultiSampleBaseMeasure;
use crate::density::{DensityModel, MutationEvidence};
use crate::errors::Result;
use crate::partition::Partition;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;

/// Propose from the base measure and accept by Metropolis-Hastings,
/// or draw from the posterior directly if the density is conjugate.
#[derive(Debug, Clone)]
pub struct BaseMeasureAtomSampler {
    base_measure: MultiSampleBaseMeasure,
}

impl BaseMeasureAtomSampler {
    pub fn new(base_measure: MultiSampleBaseMeasure) -> Self {
        Self { base_measure }
    }
    /// Update the parameters of every active cluster. Clusters are updated in parallel,
    /// each with its own generator seeded from `rng`.
    pub fn sample<R: Rng>(
        &self,
        partition: &mut Partition,
        evidence: &[MutationEvidence],
        density: &DensityModel,
        rng: &mut R,
    ) -> Result<()> {
        let members = partition.members();
        let seeds: Vec<u64> = members.iter().map(|_| rng.gen::<u64>()).collect();
        let partition_ref = &*partition;
        let updated: Vec<(usize, Vec<f64>)> = members
            .into_par_iter()
            .zip(seeds.into_par_iter())
            .map(|((slot, members), seed)| -> Result<(usize, Vec<f64>)> {
                let mut rng: Xoshiro256PlusPlus = SeedableRng::seed_from_u64(seed);
                let members: Vec<_> = members.iter().map(|&i| &evidence[i]).collect();
                let mut params = match partition_ref.cluster(slot) {
                    Some(cluster) => cluster.params.clone(),
                    None => unreachable!(),
                };
                self.update(&mut params, &members, density, &mut rng)?;
                Ok((slot, params))
            })
            .collect::<Result<Vec<_>>>()?;
        for (slot, params) in updated {
            if let Some(cluster) = partition.cluster_mut(slot) {
                cluster.params = params;
            }
        }
        Ok(())
    }
    /// Update the parameters of a cluster with `members`.
    pub fn update<R: Rng>(
        &self,
        params: &mut Vec<f64>,
        members: &[&MutationEvidence],
        density: &DensityModel,
        rng: &mut R,
    ) -> Result<()> {
        if density.is_conjugate() {
            self.conjugate_update(params, members, rng)
        } else if self.base_measure.is_linked() {
            let proposed = self.base_measure.draw(rng);
            let old_lk = joint_log_likelihood(params, members, density)?;
            let new_lk = joint_log_likelihood(&proposed, members, density)?;
            if accept(new_lk - old_lk, rng) {
                *params = proposed;
            }
            Ok(())
        } else {
            let prior = self.base_measure.prevalence();
            for (sample, x) in params.iter_mut().enumerate() {
                let proposed = prior.draw(rng);
                let old_lk = sample_log_likelihood(*x, sample, members, density)?;
                let new_lk = sample_log_likelihood(proposed, sample, members, density)?;
                if accept(new_lk - old_lk, rng) {
                    *x = proposed;
                }
            }
            Ok(())
        }
    }
    fn conjugate_update<R: Rng>(
        &self,
        params: &mut Vec<f64>,
        members: &[&MutationEvidence],
        rng: &mut R,
    ) -> Result<()> {
        let prior = self.base_measure.prevalence();
        let counts = |sample: usize| -> (u64, u64) {
            members
                .iter()
                .map(|m| m.samples[sample].observation())
                .fold((0, 0), |(v, r), obs| (v + obs.var_reads, r + obs.ref_reads()))
        };
        if self.base_measure.is_linked() {
            let (var, refr) = (0..params.len())
                .map(counts)
                .fold((0, 0), |(v, r), (x, y)| (v + x, r + y));
            let x = prior.draw_posterior(var, refr, rng)?;
            params.iter_mut().for_each(|p| *p = x);
        } else {
            for (sample, p) in params.iter_mut().enumerate() {
                let (var, refr) = counts(sample);
                *p = prior.draw_posterior(var, refr, rng)?;
            }
        }
        Ok(())
    }
}

fn accept<R: Rng>(log_ratio: f64, rng: &mut R) -> bool {
    // NaN arises only from -inf - -inf; keep the current value then.
    !log_ratio.is_nan() && rng.gen::<f64>().ln() < log_ratio
}

fn joint_log_likelihood(
    params: &[f64],
    members: &[&MutationEvidence],
    density: &DensityModel,
) -> Result<f64> {
    members
        .iter()
        .map(|m| density.log_likelihood(m, params))
        .sum()
}

fn sample_log_likelihood(
    x: f64,
    sample: usize,
    members: &[&MutationEvidence],
    density: &DensityModel,
) -> Result<f64> {
    members
        .iter()
        .map(|m| density.sample_log_likelihood(&m.samples[sample], x))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base_measure::BetaBaseMeasure;
    use crate::density::SampleEvidence;
    use definitions::{GenotypePrior, Observation, SampleData};
    fn mutation(counts: &[(u64, u64)]) -> MutationEvidence {
        let samples = counts
            .iter()
            .map(|&(var, total)| {
                let obs = Observation::new(var, total);
                SampleEvidence::new(SampleData::new(obs, GenotypePrior::default(), 1f64))
            })
            .collect();
        MutationEvidence {
            id: String::new(),
            samples,
        }
    }
    fn posterior_mean(sampler: &BaseMeasureAtomSampler, density: DensityModel) -> Vec<f64> {
        let mut rng: Xoshiro256PlusPlus = SeedableRng::seed_from_u64(4823);
        let data = vec![mutation(&[(20, 100), (80, 100)]), mutation(&[(22, 100), (78, 100)])];
        let members: Vec<_> = data.iter().collect();
        let mut params = vec![0.5, 0.5];
        let mut sums = vec![0f64; 2];
        let (burn_in, len) = (200, 2000);
        for i in 0..burn_in + len {
            sampler
                .update(&mut params, &members, &density, &mut rng)
                .unwrap();
            if burn_in <= i {
                sums.iter_mut().zip(params.iter()).for_each(|(s, p)| *s += p);
            }
        }
        sums.iter().map(|s| s / len as f64).collect()
    }
    #[test]
    fn unlinked_metropolis() {
        let beta = BetaBaseMeasure::new(1f64, 1f64).unwrap();
        let base = MultiSampleBaseMeasure::new(beta, 2, false).unwrap();
        let sampler = BaseMeasureAtomSampler::new(base);
        let density = DensityModel::BetaBinomial {
            precision: 1000f64,
        };
        let mean = posterior_mean(&sampler, density);
        assert!((mean[0] - 0.21).abs() < 0.05, "{:?}", mean);
        assert!((mean[1] - 0.79).abs() < 0.05, "{:?}", mean);
    }
    #[test]
    fn unlinked_conjugate() {
        let beta = BetaBaseMeasure::new(1f64, 1f64).unwrap();
        let base = MultiSampleBaseMeasure::new(beta, 2, false).unwrap();
        let sampler = BaseMeasureAtomSampler::new(base);
        let mean = posterior_mean(&sampler, DensityModel::Binomial);
        assert!((mean[0] - 0.21).abs() < 0.02, "{:?}", mean);
        assert!((mean[1] - 0.79).abs() < 0.02, "{:?}", mean);
    }
    #[test]
    fn linked_shares_value() {
        let beta = BetaBaseMeasure::new(1f64, 1f64).unwrap();
        let base = MultiSampleBaseMeasure::new(beta, 2, true).unwrap();
        let sampler = BaseMeasureAtomSampler::new(base);
        for density in [
            DensityModel::Binomial,
            DensityModel::BetaBinomial { precision: 100f64 },
        ]
        .iter()
        {
            let mean = posterior_mean(&sampler, *density);
            assert!((mean[0] - mean[1]).abs() < 0.000001, "{:?}", mean);
            // Joint evidence is 200/400.
            assert!((mean[0] - 0.5).abs() < 0.05, "{:?}", mean);
        }
    }
    #[test]
    fn update_all_clusters() {
        let beta = BetaBaseMeasure::new(1f64, 1f64).unwrap();
        let base = MultiSampleBaseMeasure::new(beta, 1, false).unwrap();
        let sampler = BaseMeasureAtomSampler::new(base);
        let data = vec![mutation(&[(5, 100)]), mutation(&[(95, 100)])];
        let mut partition = Partition::disconnected(vec![vec![0.5], vec![0.5]]);
        let mut rng: Xoshiro256PlusPlus = SeedableRng::seed_from_u64(1);
        for _ in 0..10 {
            sampler
                .sample(&mut partition, &data, &DensityModel::Binomial, &mut rng)
                .unwrap();
        }
        assert!(partition.params_of(0)[0] < 0.2);
        assert!(0.8 < partition.params_of(1)[0]);
        assert_eq!(partition.cluster_num(), 2);
    }
}
