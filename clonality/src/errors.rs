use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {msg}")]
    InvalidConfiguration { msg: String },
    #[error("invalid observation for mutation {mutation} in {path}: {msg}")]
    InvalidObservation {
        path: PathBuf,
        mutation: String,
        msg: String,
    },
    #[error("mutation {mutation} appears more than once in {path}")]
    DuplicatedMutation { path: PathBuf, mutation: String },
    #[error("no mutation is shared by all the samples")]
    NoSharedMutation,
    #[error("invalid read counts: {var_reads} variant reads out of {total_reads} reads")]
    InvalidCounts { var_reads: u64, total_reads: u64 },
    #[error("invalid {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },
    #[error("cluster parameter has {found} samples, but the data has {expected}")]
    SampleNumMismatch { expected: usize, found: usize },
    #[error("the partition has {expected} mutations, but the evidence has {found}")]
    MutationNumMismatch { expected: usize, found: usize },
    #[error("Monte-Carlo likelihood cache is missing; the evidence has not been prepared for the collapsed density")]
    MissingLikelihoodCache,
    #[error("every candidate cluster of mutation {mutation} has zero likelihood")]
    DegenerateAssignment { mutation: usize },
    #[error("sampler is {found}, but it should be {expected}")]
    SamplerState {
        expected: &'static str,
        found: String,
    },
    #[error("trace store is {found}, but it should be {expected}")]
    TraceState {
        expected: &'static str,
        found: String,
    },
    #[error("trace store at {path} was created for different samples or mutations")]
    TraceMismatch { path: PathBuf },
    #[error("trace store at {path} is corrupted: {msg}")]
    CorruptTrace { path: PathBuf, msg: String },
    #[error("sampling failed: {msg}")]
    Sampling { msg: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn invalid_configuration(msg: &str) -> Error {
    Error::InvalidConfiguration {
        msg: msg.to_owned(),
    }
}

pub(crate) fn sampling_error<E: std::fmt::Display>(why: E) -> Error {
    Error::Sampling {
        msg: why.to_string(),
    }
}
