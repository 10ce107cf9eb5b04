//! Definitions -- A tiny interface for the clonal prevalence inference.
//! Roughly speaking, the loader produces one [DataSet](DataSet), the sampler consumes it,
//! and every completed sweep of the sampler is summarized into one [TraceRecord](TraceRecord).

use serde::{Deserialize, Serialize};

/// The minor allele fraction assigned to a genotype with no (or only) variant alleles.
/// A genotype never emits exactly 0 or 1 to make room for sequencing errors.
pub const MU_EPSILON: f64 = 0.001;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSet {
    /// Sample IDs, in the order of the configuration.
    pub sample_ids: Vec<String>,
    /// Mutations shared by all the samples.
    pub mutations: Vec<Mutation>,
}

impl DataSet {
    pub fn new(sample_ids: Vec<String>, mutations: Vec<Mutation>) -> Self {
        Self {
            sample_ids,
            mutations,
        }
    }
    pub fn sample_num(&self) -> usize {
        self.sample_ids.len()
    }
    pub fn mutation_num(&self) -> usize {
        self.mutations.len()
    }
    pub fn mutation_ids(&self) -> Vec<String> {
        self.mutations.iter().map(|m| m.id.clone()).collect()
    }
}

impl std::fmt::Display for DataSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "S:{}\tM:{}", self.sample_num(), self.mutation_num())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mutation {
    /// The `mutation_id` column of the input tables.
    pub id: String,
    /// One entry for each sample, in the order of [DataSet::sample_ids](DataSet).
    pub samples: Vec<SampleData>,
}

impl Mutation {
    pub fn new(id: String, samples: Vec<SampleData>) -> Self {
        Self { id, samples }
    }
}

/// Evidence of a mutation in a sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleData {
    pub observation: Observation,
    pub genotype: GenotypePrior,
    /// Fraction of the sequenced cells being tumour cells.
    pub tumour_content: f64,
}

impl SampleData {
    pub fn new(observation: Observation, genotype: GenotypePrior, tumour_content: f64) -> Self {
        Self {
            observation,
            genotype,
            tumour_content,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Observation {
    pub var_reads: u64,
    pub total_reads: u64,
}

impl Observation {
    pub fn new(var_reads: u64, total_reads: u64) -> Self {
        Self {
            var_reads,
            total_reads,
        }
    }
    pub fn ref_reads(&self) -> u64 {
        self.total_reads.saturating_sub(self.var_reads)
    }
    pub fn is_valid(&self) -> bool {
        self.var_reads <= self.total_reads
    }
}

impl std::fmt::Display for Observation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.var_reads, self.total_reads)
    }
}

/// A latent genotype of a cell population at the locus.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GenotypeState {
    pub copy_number: u32,
    /// Probability to sample a variant read from this genotype.
    pub mu: f64,
    /// Prior weight.
    pub pi: f64,
}

impl GenotypeState {
    /// A genotype with `variant_alleles` out of `copy_number` alleles carrying the mutation.
    pub fn new(copy_number: u32, variant_alleles: u32, pi: f64) -> Self {
        let mu = if variant_alleles == 0 {
            MU_EPSILON
        } else if copy_number <= variant_alleles {
            1f64 - MU_EPSILON
        } else {
            variant_alleles as f64 / copy_number as f64
        };
        Self {
            copy_number,
            mu,
            pi,
        }
    }
    pub fn log_pi(&self) -> f64 {
        self.pi.ln()
    }
}

/// Priors over the genotypes of the normal, reference, and variant populations.
/// States with zero weight are removed on construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenotypePrior {
    pub normal: Vec<GenotypeState>,
    pub reference: Vec<GenotypeState>,
    pub variant: Vec<GenotypeState>,
}

impl GenotypePrior {
    pub fn new(
        normal: Vec<GenotypeState>,
        reference: Vec<GenotypeState>,
        variant: Vec<GenotypeState>,
    ) -> Self {
        let prune = |states: Vec<GenotypeState>| -> Vec<GenotypeState> {
            states.into_iter().filter(|s| 0f64 < s.pi).collect()
        };
        Self {
            normal: prune(normal),
            reference: prune(reference),
            variant: prune(variant),
        }
    }
    pub fn is_empty(&self) -> bool {
        self.normal.is_empty() || self.reference.is_empty() || self.variant.is_empty()
    }
}

impl std::default::Default for GenotypePrior {
    // Diploid, heterozygous or homozygous mutation in the variant population.
    fn default() -> Self {
        Self::new(
            vec![GenotypeState::new(2, 0, 1f64)],
            vec![GenotypeState::new(2, 0, 1f64)],
            vec![GenotypeState::new(2, 1, 0.5), GenotypeState::new(2, 2, 0.5)],
        )
    }
}

/// A snapshot of the chain after one sweep.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceRecord {
    /// Concentration parameter of the Dirichlet process.
    pub alpha: f64,
    /// Precision of the Beta-Binomial density, if it is a part of the model.
    pub precision: Option<f64>,
    /// Cluster label of each mutation. Labels are 0,1,2.. in the order of first appearance.
    pub labels: Vec<usize>,
    /// Cellular prevalence. `cellular_frequencies[s][m]` is the prevalence of the m-th mutation in the s-th sample.
    pub cellular_frequencies: Vec<Vec<f64>>,
}

impl TraceRecord {
    pub fn cluster_num(&self) -> usize {
        self.labels.iter().max().map(|&x| x + 1).unwrap_or(0)
    }
}
