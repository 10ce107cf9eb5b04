//! Densities of the read counts given the cellular prevalence of a cluster.
use crate::errors::{Error, Result};
use crate::misc::{log_beta_binomial_pdf, log_binomial_pdf, logsumexp};
use definitions::{DataSet, GenotypePrior, Observation, SampleData};
use log::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
pub mod collapsed;
pub use collapsed::LikelihoodCache;

/// The kind of the density, as it appears in the configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DensityKind {
    Binomial,
    BetaBinomial,
    GenotypeMixture,
    Collapsed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DensityModel {
    /// Binomial with the mean of the cellular prevalence. Conjugate to the Beta base measure.
    Binomial,
    /// Beta-Binomial with the mean of the cellular prevalence and the shared precision.
    BetaBinomial { precision: f64 },
    /// Binomial marginalized over the genotypes of the normal, reference, and variant populations.
    GenotypeMixture,
    /// Genotype mixture marginalized by Monte-Carlo simulation. Requires prepared evidence.
    Collapsed,
}

impl std::fmt::Display for DensityModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DensityModel::Binomial => write!(f, "Binomial"),
            DensityModel::BetaBinomial { precision } => write!(f, "BetaBinomial({})", precision),
            DensityModel::GenotypeMixture => write!(f, "GenotypeMixture"),
            DensityModel::Collapsed => write!(f, "Collapsed"),
        }
    }
}

/// The evidence of a mutation in a sample, together with the Monte-Carlo cache if needed.
#[derive(Debug, Clone)]
pub struct SampleEvidence {
    pub data: SampleData,
    cache: Option<LikelihoodCache>,
}

impl SampleEvidence {
    pub fn new(data: SampleData) -> Self {
        Self { data, cache: None }
    }
    pub fn with_cache(data: SampleData, cache: LikelihoodCache) -> Self {
        Self {
            data,
            cache: Some(cache),
        }
    }
    pub fn observation(&self) -> &Observation {
        &self.data.observation
    }
    pub fn cache(&self) -> Option<&LikelihoodCache> {
        self.cache.as_ref()
    }
}

#[derive(Debug, Clone)]
pub struct MutationEvidence {
    pub id: String,
    pub samples: Vec<SampleEvidence>,
}

impl DensityModel {
    pub fn new(kind: DensityKind, precision: f64) -> Result<Self> {
        let model = match kind {
            DensityKind::Binomial => DensityModel::Binomial,
            DensityKind::BetaBinomial => {
                crate::base_measure::check_positive("precision", precision)?;
                DensityModel::BetaBinomial { precision }
            }
            DensityKind::GenotypeMixture => DensityModel::GenotypeMixture,
            DensityKind::Collapsed => DensityModel::Collapsed,
        };
        Ok(model)
    }
    pub fn precision(&self) -> Option<f64> {
        match *self {
            DensityModel::BetaBinomial { precision } => Some(precision),
            _ => None,
        }
    }
    /// The same density with the precision replaced. No-op if the density has no precision.
    pub fn with_precision(&self, precision: f64) -> Self {
        match self {
            DensityModel::BetaBinomial { .. } => DensityModel::BetaBinomial { precision },
            _ => *self,
        }
    }
    /// True if the Beta base measure is conjugate to this density.
    pub fn is_conjugate(&self) -> bool {
        matches!(self, DensityModel::Binomial)
    }
    /// Attach the evidence to the mutations. For the collapsed density,
    /// the Monte-Carlo caches are built here.
    pub fn prepare<R: Rng>(
        &self,
        dataset: &DataSet,
        draws: usize,
        rng: &mut R,
    ) -> Result<Vec<MutationEvidence>> {
        let mut evidence = Vec::with_capacity(dataset.mutation_num());
        for mutation in dataset.mutations.iter() {
            let mut samples = Vec::with_capacity(mutation.samples.len());
            for data in mutation.samples.iter() {
                check_observation(&data.observation)?;
                let sample = match self {
                    DensityModel::Collapsed => {
                        let cache =
                            LikelihoodCache::new(data.observation, &data.genotype, draws, rng)?;
                        trace!("CACHE\t{}\t{}", mutation.id, cache);
                        SampleEvidence::with_cache(data.clone(), cache)
                    }
                    _ => SampleEvidence::new(data.clone()),
                };
                samples.push(sample);
            }
            let id = mutation.id.clone();
            evidence.push(MutationEvidence { id, samples });
        }
        debug!("DENSITY\t{}\t{}", self, evidence.len());
        Ok(evidence)
    }
    /// Log likelihood of a mutation in a sample, given the prevalence.
    pub fn sample_log_likelihood(&self, evidence: &SampleEvidence, prevalence: f64) -> Result<f64> {
        check_prevalence(prevalence)?;
        let obs = evidence.observation();
        check_observation(obs)?;
        let (var, total) = (obs.var_reads, obs.total_reads);
        let lk = match *self {
            DensityModel::Binomial => log_binomial_pdf(var, total, prevalence),
            DensityModel::BetaBinomial { precision } => {
                crate::base_measure::check_positive("precision", precision)?;
                let a = prevalence * precision;
                let b = precision - a;
                log_beta_binomial_pdf(var, total, a, b)
            }
            DensityModel::GenotypeMixture => genotype_mixture(&evidence.data, prevalence),
            DensityModel::Collapsed => evidence
                .cache()
                .ok_or(Error::MissingLikelihoodCache)?
                .log_likelihood(prevalence),
        };
        Ok(lk)
    }
    /// Log likelihood of a mutation, summed over the samples.
    pub fn log_likelihood(&self, evidence: &MutationEvidence, params: &[f64]) -> Result<f64> {
        if evidence.samples.len() != params.len() {
            return Err(Error::SampleNumMismatch {
                expected: evidence.samples.len(),
                found: params.len(),
            });
        }
        evidence
            .samples
            .iter()
            .zip(params.iter())
            .map(|(sample, &x)| self.sample_log_likelihood(sample, x))
            .sum()
    }
}

pub(crate) fn check_observation(obs: &Observation) -> Result<()> {
    match obs.is_valid() {
        true => Ok(()),
        false => Err(Error::InvalidCounts {
            var_reads: obs.var_reads,
            total_reads: obs.total_reads,
        }),
    }
}

fn check_prevalence(x: f64) -> Result<()> {
    match (0f64..=1f64).contains(&x) {
        true => Ok(()),
        false => Err(Error::InvalidParameter {
            name: "cellular prevalence",
            value: x,
        }),
    }
}

fn genotype_mixture(data: &SampleData, prevalence: f64) -> f64 {
    let GenotypePrior {
        normal,
        reference,
        variant,
    } = &data.genotype;
    let (obs, t, f) = (&data.observation, data.tumour_content, prevalence);
    let mut terms = Vec::with_capacity(normal.len() * reference.len() * variant.len());
    for g_n in normal.iter() {
        for g_r in reference.iter() {
            for g_v in variant.iter() {
                let p_n = (1f64 - t) * g_n.copy_number as f64;
                let p_r = t * (1f64 - f) * g_r.copy_number as f64;
                let p_v = t * f * g_v.copy_number as f64;
                let norm = p_n + p_r + p_v;
                if norm <= 0f64 {
                    continue;
                }
                let mu = (p_n * g_n.mu + p_r * g_r.mu + p_v * g_v.mu) / norm;
                let log_pi = g_n.log_pi() + g_r.log_pi() + g_v.log_pi();
                terms.push(log_pi + log_binomial_pdf(obs.var_reads, obs.total_reads, mu));
            }
        }
    }
    logsumexp(&terms)
}
