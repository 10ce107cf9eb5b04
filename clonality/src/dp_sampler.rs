//! The Dirichlet process mixture sampler. One sweep consists of
//! the partition update, the cluster parameter update, and, periodically, the global parameter update.
use crate::atom_sampler::BaseMeasureAtomSampler;
use crate::base_measure::{check_positive, MultiSampleBaseMeasure};
use crate::density::{DensityModel, MutationEvidence};
use crate::errors::{invalid_configuration, Error, Result};
use crate::global_params::{
    concentration_log_likelihood, precision_log_likelihood, MetropolisHastingsSampler,
};
use crate::partition::Partition;
use crate::partition_sampler::AuxiliaryParameterPartitionSampler;
use crate::trace::TraceWriter;
use definitions::TraceRecord;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// How to build the first partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitMethod {
    /// All the mutations in one cluster.
    Connected,
    /// Each mutation in its own cluster.
    Disconnected,
}

impl std::default::Default for InitMethod {
    fn default() -> Self {
        InitMethod::Disconnected
    }
}

#[derive(Debug, Clone)]
pub struct SamplerConfig {
    seed: u64,
    aux_num: usize,
    global_update_interval: usize,
    log_interval: usize,
    init_method: InitMethod,
}

impl SamplerConfig {
    pub fn new(
        seed: u64,
        aux_num: usize,
        global_update_interval: usize,
        log_interval: usize,
        init_method: InitMethod,
    ) -> Result<Self> {
        if aux_num == 0 {
            return Err(invalid_configuration(
                "the number of auxiliary parameters should be positive",
            ));
        }
        if global_update_interval == 0 {
            return Err(invalid_configuration(
                "the global update interval should be positive",
            ));
        }
        Ok(Self {
            seed,
            aux_num,
            global_update_interval,
            log_interval,
            init_method,
        })
    }
}

impl std::default::Default for SamplerConfig {
    fn default() -> Self {
        Self {
            seed: 24309,
            aux_num: 1,
            global_update_interval: 1,
            log_interval: 100,
            init_method: InitMethod::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    Uninitialized,
    /// `iteration` sweeps have been completed.
    Running { iteration: usize },
    Finished,
    /// A sweep failed. The partition may be inconsistent and the run cannot go on.
    Failed,
}

impl std::fmt::Display for SamplerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SamplerState::Uninitialized => write!(f, "Uninitialized"),
            SamplerState::Running { iteration } => write!(f, "Running({})", iteration),
            SamplerState::Finished => write!(f, "Finished"),
            SamplerState::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DirichletProcessSampler {
    config: SamplerConfig,
    density: DensityModel,
    base_measure: MultiSampleBaseMeasure,
    partition_sampler: AuxiliaryParameterPartitionSampler,
    atom_sampler: BaseMeasureAtomSampler,
    alpha: f64,
    alpha_sampler: Option<MetropolisHastingsSampler>,
    precision_sampler: Option<MetropolisHastingsSampler>,
    partition: Option<Partition>,
    state: SamplerState,
    rng: Xoshiro256PlusPlus,
}

impl std::fmt::Display for DirichletProcessSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cluster_num = self.partition.as_ref().map(|p| p.cluster_num()).unwrap_or(0);
        write!(f, "{}\t{}\t{:.3}\t{}", self.state, self.density, self.alpha, cluster_num)
    }
}

impl DirichletProcessSampler {
    /// The concentration is fixed to `alpha` unless a sampler is given by [with_concentration_sampler](Self::with_concentration_sampler).
    pub fn new(
        config: SamplerConfig,
        density: DensityModel,
        base_measure: MultiSampleBaseMeasure,
        alpha: f64,
    ) -> Result<Self> {
        check_positive("concentration", alpha)?;
        let partition_sampler = AuxiliaryParameterPartitionSampler::new(base_measure, config.aux_num)?;
        let atom_sampler = BaseMeasureAtomSampler::new(base_measure);
        let rng: Xoshiro256PlusPlus = SeedableRng::seed_from_u64(config.seed);
        Ok(Self {
            config,
            density,
            base_measure,
            partition_sampler,
            atom_sampler,
            alpha,
            alpha_sampler: None,
            precision_sampler: None,
            partition: None,
            state: SamplerState::Uninitialized,
            rng,
        })
    }
    pub fn with_concentration_sampler(mut self, sampler: MetropolisHastingsSampler) -> Self {
        self.alpha_sampler = Some(sampler);
        self
    }
    /// The precision is only sampled if the density has one.
    pub fn with_precision_sampler(mut self, sampler: MetropolisHastingsSampler) -> Self {
        if self.density.precision().is_none() {
            warn!("PRECISION\t{}\tThe density has no precision. Ignored.", self.density);
        }
        self.precision_sampler = Some(sampler);
        self
    }
    pub fn state(&self) -> SamplerState {
        self.state
    }
    pub fn alpha(&self) -> f64 {
        self.alpha
    }
    pub fn precision(&self) -> Option<f64> {
        self.density.precision()
    }
    pub fn partition(&self) -> Option<&Partition> {
        self.partition.as_ref()
    }
    /// Build the first partition.
    pub fn initialize(&mut self, evidence: &[MutationEvidence]) -> Result<()> {
        if self.state != SamplerState::Uninitialized {
            return Err(Error::SamplerState {
                expected: "Uninitialized",
                found: self.state.to_string(),
            });
        }
        self.check_samples(evidence)?;
        let partition = match self.config.init_method {
            InitMethod::Connected => {
                let params = self.base_measure.draw(&mut self.rng);
                Partition::connected(evidence.len(), params)
            }
            InitMethod::Disconnected => {
                let params: Vec<_> = evidence
                    .iter()
                    .map(|_| self.base_measure.draw(&mut self.rng))
                    .collect();
                Partition::disconnected(params)
            }
        };
        debug!("INIT\t{:?}\t{}", self.config.init_method, partition);
        self.partition = Some(partition);
        self.state = SamplerState::Running { iteration: 0 };
        Ok(())
    }
    fn check_samples(&self, evidence: &[MutationEvidence]) -> Result<()> {
        let sample_num = self.base_measure.sample_num();
        match evidence.iter().find(|m| m.samples.len() != sample_num) {
            Some(mutation) => Err(Error::SampleNumMismatch {
                expected: mutation.samples.len(),
                found: sample_num,
            }),
            None => Ok(()),
        }
    }
    /// One sweep. Return the snapshot of the chain after the sweep.
    /// Evidence not matching the partition is rejected before anything is updated.
    /// Any later error moves the sampler to [SamplerState::Failed].
    pub fn sweep(&mut self, evidence: &[MutationEvidence]) -> Result<TraceRecord> {
        let iteration = match self.state {
            SamplerState::Running { iteration } => iteration,
            _ => {
                return Err(Error::SamplerState {
                    expected: "Running",
                    found: self.state.to_string(),
                })
            }
        };
        let mutation_num = self.partition.as_ref().map_or(0, |p| p.mutation_num());
        if mutation_num != evidence.len() {
            return Err(Error::MutationNumMismatch {
                expected: mutation_num,
                found: evidence.len(),
            });
        }
        self.check_samples(evidence)?;
        let record = match self.update(iteration, evidence) {
            Ok(record) => record,
            Err(why) => {
                error!("SWEEP\t{}\tFailed\t{}", iteration + 1, why);
                self.state = SamplerState::Failed;
                return Err(why);
            }
        };
        self.state = SamplerState::Running {
            iteration: iteration + 1,
        };
        if self.config.log_interval > 0 && (iteration + 1) % self.config.log_interval == 0 {
            info!(
                "SWEEP\t{}\t{}\t{:.3}\t{}",
                iteration + 1,
                record.cluster_num(),
                record.alpha,
                record.precision.map(|p| format!("{:.3}", p)).unwrap_or_else(|| "-".to_string()),
            );
        }
        Ok(record)
    }
    fn update(&mut self, iteration: usize, evidence: &[MutationEvidence]) -> Result<TraceRecord> {
        let partition = match self.partition.as_mut() {
            Some(partition) => partition,
            None => unreachable!(),
        };
        self.partition_sampler.sample(
            partition,
            evidence,
            &self.density,
            self.alpha,
            &mut self.rng,
        )?;
        self.atom_sampler
            .sample(partition, evidence, &self.density, &mut self.rng)?;
        let partition = &*partition;
        if (iteration + 1) % self.config.global_update_interval == 0 {
            if let Some(mh) = self.alpha_sampler.as_ref() {
                let (k, n) = (partition.cluster_num(), partition.mutation_num());
                let lk = |a: f64| Ok(concentration_log_likelihood(a, k, n));
                self.alpha = mh.update(self.alpha, lk, &mut self.rng)?;
            }
            if let (Some(mh), Some(current)) = (self.precision_sampler.as_ref(), self.density.precision()) {
                let lk = |s: f64| precision_log_likelihood(s, partition, evidence);
                let precision = mh.update(current, lk, &mut self.rng)?;
                self.density = self.density.with_precision(precision);
            }
        }
        Ok(TraceRecord {
            alpha: self.alpha,
            precision: self.density.precision(),
            labels: partition.labels(),
            cellular_frequencies: partition.cellular_frequencies(self.base_measure.sample_num()),
        })
    }
    /// Run `num_iters` sweeps, appending a record to `trace` after each.
    /// The sampler is initialized first if needed, and finished at the end.
    /// A failed sweep aborts the run and no record is appended for it.
    /// A trace that refuses a record fails the run as well.
    pub fn sample<T: TraceWriter>(
        &mut self,
        evidence: &[MutationEvidence],
        trace: &mut T,
        num_iters: usize,
    ) -> Result<()> {
        if self.state == SamplerState::Uninitialized {
            self.initialize(evidence)?;
        }
        for _ in 0..num_iters {
            let record = self.sweep(evidence)?;
            if let Err(why) = trace.append(record) {
                error!("TRACE\t{}", why);
                self.state = SamplerState::Failed;
                return Err(why);
            }
        }
        self.state = SamplerState::Finished;
        debug!("FINISH\t{}", self);
        Ok(())
    }
}
