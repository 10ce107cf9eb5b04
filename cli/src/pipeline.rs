//! Pipelines -- the whole analysis of the clonality.
//!
//! This module defines the configuration of an analysis and runs it from the read count tables to the trace,
//! and from the trace to the summary table.
use clonality::base_measure::{BetaBaseMeasure, GammaPrior, MultiSampleBaseMeasure};
use clonality::density::collapsed::DEFAULT_DRAWS;
use clonality::density::{DensityKind, DensityModel};
use clonality::dp_sampler::{DirichletProcessSampler, InitMethod, SamplerConfig};
use clonality::entry::{Entry, SampleTable};
use clonality::global_params::{GammaProposal, MetropolisHastingsSampler};
use clonality::trace::{check_sample_id, DiskTrace, TraceMeta, TraceReader};
use clonality::{summary, Error, Result};
use definitions::{DataSet, GenotypePrior, GenotypeState};
use log::*;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// The configuration of the analysis.
/// This struct is a comprehensive list of the parameters that can be set by a user.
/// Paths are relative to `working_dir`.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,
    #[serde(default = "default_trace_dir")]
    pub trace_dir: PathBuf,
    #[serde(default = "default_seed")]
    pub seed: u64,
    pub num_iters: usize,
    #[serde(default)]
    pub verbose: usize,
    #[serde(default = "default_threads")]
    pub threads: usize,
    #[serde(default = "default_density")]
    pub density: DensityKind,
    /// If true, a cluster has one prevalence shared by all the samples.
    #[serde(default)]
    pub linked: bool,
    #[serde(default)]
    pub init_method: InitMethod,
    #[serde(default = "default_auxiliary_params")]
    pub auxiliary_params: usize,
    #[serde(default = "default_flush_interval")]
    pub flush_interval: usize,
    #[serde(default = "default_global_update_interval")]
    pub global_update_interval: usize,
    #[serde(default = "default_log_interval")]
    pub log_interval: usize,
    #[serde(default = "default_monte_carlo_draws")]
    pub monte_carlo_draws: usize,
    #[serde(default)]
    pub concentration: ConcentrationConfig,
    #[serde(default)]
    pub base_measure: BaseMeasureConfig,
    #[serde(default)]
    pub precision: PrecisionConfig,
    pub samples: Vec<SampleConfig>,
}

fn default_working_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_trace_dir() -> PathBuf {
    PathBuf::from("trace")
}
fn default_seed() -> u64 {
    24309
}
fn default_threads() -> usize {
    1
}
fn default_density() -> DensityKind {
    DensityKind::BetaBinomial
}
fn default_auxiliary_params() -> usize {
    1
}
fn default_flush_interval() -> usize {
    100
}
fn default_global_update_interval() -> usize {
    1
}
fn default_log_interval() -> usize {
    100
}
fn default_monte_carlo_draws() -> usize {
    DEFAULT_DRAWS
}

/// The concentration of the Dirichlet process. Fixed unless `prior` is given.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct ConcentrationConfig {
    pub value: f64,
    #[serde(default)]
    pub prior: Option<GammaPrior>,
    #[serde(default = "default_concentration_proposal")]
    pub proposal_precision: f64,
}

fn default_concentration_proposal() -> f64 {
    1f64
}

impl std::default::Default for ConcentrationConfig {
    fn default() -> Self {
        Self {
            value: 1f64,
            prior: Some(GammaPrior {
                shape: 1f64,
                rate: 0.001,
            }),
            proposal_precision: default_concentration_proposal(),
        }
    }
}

/// Beta prior over the prevalences.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct BaseMeasureConfig {
    pub alpha: f64,
    pub beta: f64,
}

impl std::default::Default for BaseMeasureConfig {
    fn default() -> Self {
        Self {
            alpha: 1f64,
            beta: 1f64,
        }
    }
}

/// The precision of the Beta-Binomial density. Ignored by the other densities.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct PrecisionConfig {
    pub value: f64,
    pub prior: GammaPrior,
    pub proposal_precision: f64,
}

impl std::default::Default for PrecisionConfig {
    fn default() -> Self {
        Self {
            value: 1000f64,
            prior: GammaPrior {
                shape: 1f64,
                rate: 0.0001,
            },
            proposal_precision: 0.01,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct SampleConfig {
    pub id: String,
    pub mutations_file: PathBuf,
    #[serde(default = "default_tumour_content")]
    pub tumour_content: f64,
    #[serde(default)]
    pub genotype_prior: Option<GenotypePriorConfig>,
}

fn default_tumour_content() -> f64 {
    1f64
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct GenotypePriorConfig {
    pub normal: Vec<GenotypeStateConfig>,
    pub reference: Vec<GenotypeStateConfig>,
    pub variant: Vec<GenotypeStateConfig>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug)]
#[serde(deny_unknown_fields)]
pub struct GenotypeStateConfig {
    pub copy_number: u32,
    pub variant_alleles: u32,
    pub weight: f64,
}

impl GenotypePriorConfig {
    fn to_prior(&self) -> Result<GenotypePrior> {
        let convert = |states: &[GenotypeStateConfig]| -> Result<Vec<GenotypeState>> {
            states
                .iter()
                .map(|s| match s.weight.is_finite() && 0f64 <= s.weight {
                    true => Ok(GenotypeState::new(s.copy_number, s.variant_alleles, s.weight)),
                    false => Err(Error::InvalidParameter {
                        name: "genotype weight",
                        value: s.weight,
                    }),
                })
                .collect()
        };
        let prior = GenotypePrior::new(
            convert(&self.normal)?,
            convert(&self.reference)?,
            convert(&self.variant)?,
        );
        Ok(prior)
    }
}

fn invalid(msg: &str) -> Error {
    Error::InvalidConfiguration {
        msg: msg.to_string(),
    }
}

impl AnalysisConfig {
    /// Check the parameters before anything is loaded.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("auxiliary_params", self.auxiliary_params),
            ("flush_interval", self.flush_interval),
            ("global_update_interval", self.global_update_interval),
            ("monte_carlo_draws", self.monte_carlo_draws),
            ("threads", self.threads),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, x)| *x == 0) {
            return Err(invalid(&format!("{} should be positive", name)));
        }
        if self.samples.is_empty() {
            return Err(invalid("at least one sample is required"));
        }
        BetaBaseMeasure::new(self.base_measure.alpha, self.base_measure.beta)?;
        self.concentration_sampler()?;
        self.precision_sampler()?;
        DensityModel::new(self.density, self.precision.value)?;
        for sample in self.samples.iter() {
            check_sample_id(&sample.id)?;
            self.sample_table(sample)?;
        }
        Ok(())
    }
    pub fn trace_path(&self) -> PathBuf {
        self.working_dir.join(&self.trace_dir)
    }
    fn sample_table(&self, sample: &SampleConfig) -> Result<SampleTable> {
        let genotype = match sample.genotype_prior.as_ref() {
            Some(config) => config.to_prior()?,
            None => GenotypePrior::default(),
        };
        let path = self.working_dir.join(&sample.mutations_file);
        Ok(SampleTable::new(&sample.id, path, sample.tumour_content, genotype))
    }
    fn concentration_sampler(&self) -> Result<Option<MetropolisHastingsSampler>> {
        let config = &self.concentration;
        if !(config.value.is_finite() && 0f64 < config.value) {
            return Err(Error::InvalidParameter {
                name: "concentration",
                value: config.value,
            });
        }
        match config.prior {
            Some(prior) => {
                let prior = GammaPrior::new(prior.shape, prior.rate)?;
                let proposal = GammaProposal::new(config.proposal_precision)?;
                Ok(Some(MetropolisHastingsSampler::new(prior, proposal)))
            }
            None => Ok(None),
        }
    }
    fn precision_sampler(&self) -> Result<MetropolisHastingsSampler> {
        let config = &self.precision;
        let prior = GammaPrior::new(config.prior.shape, config.prior.rate)?;
        let proposal = GammaProposal::new(config.proposal_precision)?;
        Ok(MetropolisHastingsSampler::new(prior, proposal))
    }
}

pub fn set_threads(threads: usize) {
    debug!("Set Threads\t{}", threads);
    if let Err(why) = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
    {
        debug!("{:?} The global pool has already been built.", why);
    }
}

/// Load the tables, sample the posterior, and write the trace.
pub fn run_analysis(config: &AnalysisConfig) -> Result<()> {
    config.validate()?;
    set_threads(config.threads);
    let tables = config
        .samples
        .iter()
        .map(|sample| config.sample_table(sample))
        .collect::<Result<Vec<_>>>()?;
    let ds = DataSet::entry(&tables)?;
    let mut rng: Xoshiro256PlusPlus = SeedableRng::seed_from_u64(config.seed);
    let sampler_seed: u64 = rng.gen();
    let density = DensityModel::new(config.density, config.precision.value)?;
    let evidence = density.prepare(&ds, config.monte_carlo_draws, &mut rng)?;
    let prevalence = BetaBaseMeasure::new(config.base_measure.alpha, config.base_measure.beta)?;
    let base_measure = MultiSampleBaseMeasure::new(prevalence, ds.sample_num(), config.linked)?;
    let sampler_config = SamplerConfig::new(
        sampler_seed,
        config.auxiliary_params,
        config.global_update_interval,
        config.log_interval,
        config.init_method,
    )?;
    let mut sampler =
        DirichletProcessSampler::new(sampler_config, density, base_measure, config.concentration.value)?;
    if let Some(mh) = config.concentration_sampler()? {
        sampler = sampler.with_concentration_sampler(mh);
    }
    if density.precision().is_some() {
        sampler = sampler.with_precision_sampler(config.precision_sampler()?);
    }
    let meta = TraceMeta::new(ds.sample_ids.clone(), ds.mutation_ids(), density.precision().is_some());
    let mut trace = DiskTrace::new(config.trace_path(), meta, config.flush_interval)?;
    trace.open()?;
    info!("START\t{}\t{}\t{}", ds, density, config.num_iters);
    sampler.sample(&evidence, &mut trace, config.num_iters)?;
    trace.close()?;
    info!("FINISH\t{}", sampler);
    Ok(())
}

/// Read the trace and write the posterior summary to `output`.
pub fn summarize<P: AsRef<Path>>(config: &AnalysisConfig, output: P, burnin: usize, thin: usize) -> Result<()> {
    let trace = TraceReader::open(config.trace_path())?.load()?;
    let rows = summary::summarize(&trace, burnin, thin)?;
    let wtr = std::fs::File::create(output).map(BufWriter::new)?;
    summary::write_summary(&rows, wtr)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    const CONFIG: &str = r#"
working_dir = "WORKDIR"
num_iters = 30
seed = 42
density = "beta_binomial"
auxiliary_params = 2
flush_interval = 7

[concentration]
value = 1.0
prior = { shape = 1.0, rate = 1.0 }

[precision]
value = 100.0
prior = { shape = 1.0, rate = 0.001 }
proposal_precision = 2.0

[[samples]]
id = "A"
mutations_file = "a.tsv"

[[samples]]
id = "B"
mutations_file = "b.tsv"
tumour_content = 0.8
genotype_prior = { normal = [{ copy_number = 2, variant_alleles = 0, weight = 1.0 }], reference = [{ copy_number = 2, variant_alleles = 0, weight = 1.0 }], variant = [{ copy_number = 2, variant_alleles = 1, weight = 1.0 }] }
"#;
    fn write(dir: &Path, name: &str, content: &str) {
        let mut wtr = std::fs::File::create(dir.join(name)).unwrap();
        wtr.write_all(content.as_bytes()).unwrap();
    }
    fn config(dir: &Path) -> AnalysisConfig {
        let text = CONFIG.replace("WORKDIR", dir.to_str().unwrap());
        toml::from_str(&text).unwrap()
    }
    #[test]
    fn defaults() {
        let config: AnalysisConfig = toml::from_str(
            "num_iters = 10\n[[samples]]\nid = \"A\"\nmutations_file = \"a.tsv\"\n",
        )
        .unwrap();
        assert_eq!(config.density, DensityKind::BetaBinomial);
        assert_eq!(config.init_method, InitMethod::Disconnected);
        assert_eq!(config.auxiliary_params, 1);
        assert!(!config.linked);
        assert!(config.validate().is_ok());
    }
    #[test]
    fn invalid_configs() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        assert!(config.validate().is_ok());
        config.auxiliary_params = 0;
        assert!(config.validate().is_err());
        let mut config = self::config(dir.path());
        config.flush_interval = 0;
        assert!(config.validate().is_err());
        let mut config = self::config(dir.path());
        config.concentration.value = -1f64;
        assert!(config.validate().is_err());
        let mut config = self::config(dir.path());
        config.samples[0].id = "../A".to_string();
        assert!(config.validate().is_err());
        let unknown = "num_iters = 10\nunknown = 3\nsamples = []\n";
        assert!(toml::from_str::<AnalysisConfig>(unknown).is_err());
    }
    #[test]
    fn run_and_summarize() {
        let dir = tempfile::tempdir().unwrap();
        let header = "mutation_id\tref_counts\tvar_counts\n";
        write(
            dir.path(),
            "a.tsv",
            &format!("{}m1\t15\t5\nm2\t5\t15\nm3\t20\t0\nm4\t10\t10\n", header),
        );
        write(
            dir.path(),
            "b.tsv",
            &format!("{}m1\t12\t8\nm2\t8\t12\nm3\t19\t1\n", header),
        );
        let config = config(dir.path());
        run_analysis(&config).unwrap();
        let trace = TraceReader::open(config.trace_path()).unwrap().load().unwrap();
        assert_eq!(trace.records.len(), 30);
        assert_eq!(trace.meta.mutation_ids, vec!["m1", "m2", "m3"]);
        let output = dir.path().join("summary.tsv");
        summarize(&config, &output, 10, 2).unwrap();
        let text = std::fs::read_to_string(&output).unwrap();
        assert_eq!(text.lines().count(), 1 + 3 * 2);
    }
}
