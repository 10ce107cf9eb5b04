//! Gibbs update of the partition with auxiliary parameters (Neal 2000, Algorithm 8).
use crate::base_measure::MultiSampleBaseMeasure;
use crate::density::{DensityModel, MutationEvidence};
use crate::errors::{Error, Result};
use crate::misc::normalize_log_weights;
use crate::partition::Partition;
use log::*;
use rand::seq::SliceRandom;
use rand::Rng;

/// Where a mutation can go.
#[derive(Debug, Clone, PartialEq)]
pub enum Candidate {
    /// An existing cluster at the slot.
    Existing(usize),
    /// A new cluster with the auxiliary parameter.
    Auxiliary(Vec<f64>),
}

#[derive(Debug, Clone)]
pub struct AuxiliaryParameterPartitionSampler {
    base_measure: MultiSampleBaseMeasure,
    aux_num: usize,
}

impl AuxiliaryParameterPartitionSampler {
    pub fn new(base_measure: MultiSampleBaseMeasure, aux_num: usize) -> Result<Self> {
        if aux_num == 0 {
            return Err(crate::errors::invalid_configuration(
                "the number of auxiliary parameters should be positive",
            ));
        }
        Ok(Self {
            base_measure,
            aux_num,
        })
    }
    /// One pass over all the mutations, in the index order.
    pub fn sample<R: Rng>(
        &self,
        partition: &mut Partition,
        evidence: &[MutationEvidence],
        density: &DensityModel,
        alpha: f64,
        rng: &mut R,
    ) -> Result<()> {
        if partition.mutation_num() != evidence.len() {
            return Err(Error::MutationNumMismatch {
                expected: partition.mutation_num(),
                found: evidence.len(),
            });
        }
        for mutation in 0..evidence.len() {
            self.update_assignment(mutation, partition, evidence, density, alpha, rng)?;
        }
        trace!("PARTITION\t{}", partition);
        Ok(())
    }
    fn update_assignment<R: Rng>(
        &self,
        mutation: usize,
        partition: &mut Partition,
        evidence: &[MutationEvidence],
        density: &DensityModel,
        alpha: f64,
        rng: &mut R,
    ) -> Result<()> {
        partition.detach(mutation);
        let (candidates, probs) =
            self.assignment_distribution(mutation, partition, evidence, density, alpha, rng)?;
        let choice = (0..candidates.len())
            .collect::<Vec<_>>()
            .choose_weighted(rng, |&i| probs[i])
            .map(|&i| i)
            .map_err(crate::errors::sampling_error)?;
        match candidates.into_iter().nth(choice) {
            Some(Candidate::Existing(slot)) => partition.attach(mutation, slot),
            Some(Candidate::Auxiliary(params)) => {
                partition.attach_new(mutation, params);
            }
            None => unreachable!(),
        }
        Ok(())
    }
    /// The conditional distribution of the cluster of `mutation`, which should be detached from the partition.
    /// Existing clusters get n_k * f(x|theta_k), and each of the auxiliary parameters gets alpha/m * f(x|phi).
    pub fn assignment_distribution<R: Rng>(
        &self,
        mutation: usize,
        partition: &Partition,
        evidence: &[MutationEvidence],
        density: &DensityModel,
        alpha: f64,
        rng: &mut R,
    ) -> Result<(Vec<Candidate>, Vec<f64>)> {
        let data = &evidence[mutation];
        let mut candidates = Vec::with_capacity(partition.cluster_num() + self.aux_num);
        let mut log_weights = Vec::with_capacity(partition.cluster_num() + self.aux_num);
        for (slot, cluster) in partition.clusters() {
            let lk = density.log_likelihood(data, &cluster.params)?;
            candidates.push(Candidate::Existing(slot));
            log_weights.push((cluster.size() as f64).ln() + lk);
        }
        let aux_weight = (alpha / self.aux_num as f64).ln();
        for _ in 0..self.aux_num {
            let params = self.base_measure.draw(rng);
            let lk = density.log_likelihood(data, &params)?;
            candidates.push(Candidate::Auxiliary(params));
            log_weights.push(aux_weight + lk);
        }
        match normalize_log_weights(&log_weights) {
            Some(probs) => Ok((candidates, probs)),
            None => Err(Error::DegenerateAssignment { mutation }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base_measure::BetaBaseMeasure;
    use crate::density::SampleEvidence;
    use definitions::{GenotypePrior, Observation, SampleData};
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;
    fn dataset(counts: &[(u64, u64)]) -> Vec<MutationEvidence> {
        counts
            .iter()
            .enumerate()
            .map(|(i, &(var, total))| {
                let obs = Observation::new(var, total);
                let sample = SampleData::new(obs, GenotypePrior::default(), 1f64);
                MutationEvidence {
                    id: format!("m{}", i),
                    samples: vec![SampleEvidence::new(sample)],
                }
            })
            .collect()
    }
    fn sampler(aux_num: usize) -> AuxiliaryParameterPartitionSampler {
        let beta = BetaBaseMeasure::new(1f64, 1f64).unwrap();
        let base = MultiSampleBaseMeasure::new(beta, 1, false).unwrap();
        AuxiliaryParameterPartitionSampler::new(base, aux_num).unwrap()
    }
    #[test]
    fn zero_aux_is_error() {
        let beta = BetaBaseMeasure::new(1f64, 1f64).unwrap();
        let base = MultiSampleBaseMeasure::new(beta, 1, false).unwrap();
        assert!(AuxiliaryParameterPartitionSampler::new(base, 0).is_err());
    }
    #[test]
    fn distribution_sums_to_one() {
        let mut rng: Xoshiro256PlusPlus = SeedableRng::seed_from_u64(42);
        let data = dataset(&[(5, 20), (15, 20), (0, 20), (10, 20)]);
        let sampler = sampler(3);
        let density = DensityModel::BetaBinomial { precision: 50f64 };
        let params: Vec<_> = (0..4).map(|i| vec![0.1 + 0.2 * i as f64]).collect();
        let mut partition = Partition::disconnected(params);
        for mutation in 0..4 {
            partition.detach(mutation);
            let (candidates, probs) = sampler
                .assignment_distribution(mutation, &partition, &data, &density, 1f64, &mut rng)
                .unwrap();
            assert_eq!(candidates.len(), partition.cluster_num() + 3);
            let total: f64 = probs.iter().sum();
            assert!((total - 1f64).abs() < 0.0000001, "{}", total);
            partition.attach_new(mutation, vec![0.5]);
        }
    }
    #[test]
    fn mutation_count_invariant() {
        let mut rng: Xoshiro256PlusPlus = SeedableRng::seed_from_u64(42);
        let data = dataset(&[(5, 20), (15, 20), (0, 20), (10, 20), (19, 20), (1, 20)]);
        let sampler = sampler(2);
        let density = DensityModel::Binomial;
        let mut partition = Partition::connected(data.len(), vec![0.5]);
        for _ in 0..200 {
            sampler
                .sample(&mut partition, &data, &density, 1f64, &mut rng)
                .unwrap();
            let total: usize = partition.clusters().map(|(_, c)| c.size()).sum();
            assert_eq!(total, data.len());
            assert_eq!(partition.members().len(), partition.cluster_num());
            assert!(partition.clusters().all(|(_, c)| c.size() > 0));
            let labels = partition.labels();
            assert!(labels.iter().all(|&l| l < data.len()));
        }
    }
    #[test]
    fn evidence_length_mismatch() {
        let mut rng: Xoshiro256PlusPlus = SeedableRng::seed_from_u64(42);
        let data = dataset(&[(5, 20), (15, 20), (0, 20)]);
        let mut partition = Partition::connected(2, vec![0.5]);
        let result = sampler(1).sample(&mut partition, &data, &DensityModel::Binomial, 1f64, &mut rng);
        assert!(matches!(result, Err(Error::MutationNumMismatch { expected: 2, found: 3 })));
        assert_eq!(partition.cluster_num(), 1);
    }
    #[test]
    fn separates_distinct_mutations() {
        let mut rng: Xoshiro256PlusPlus = SeedableRng::seed_from_u64(1);
        let data = dataset(&[(2, 200), (3, 200), (190, 200), (195, 200)]);
        let sampler = sampler(2);
        let density = DensityModel::Binomial;
        let mut partition = Partition::connected(data.len(), vec![0.5]);
        for _ in 0..50 {
            sampler
                .sample(&mut partition, &data, &density, 1f64, &mut rng)
                .unwrap();
        }
        assert_ne!(partition.assignment(0), partition.assignment(3));
        assert_ne!(partition.assignment(1), partition.assignment(2));
    }
    #[test]
    fn degenerate_assignment() {
        let mut rng: Xoshiro256PlusPlus = SeedableRng::seed_from_u64(1);
        let data = dataset(&[(20, 20), (20, 20)]);
        let sampler = sampler(1);
        // A point mass at zero cannot produce any variant read.
        let density = DensityModel::BetaBinomial { precision: 1f64 };
        let mut partition = Partition::disconnected(vec![vec![0f64], vec![0f64]]);
        partition.detach(0);
        let result = sampler.assignment_distribution(0, &partition, &data, &density, 0f64, &mut rng);
        assert!(matches!(result, Err(Error::DegenerateAssignment { mutation: 0 })));
    }
}
