//! Clonality -- Inference of the clonal population structure of a tumour.
//!
//! The cellular prevalence of each somatic mutation is inferred jointly with the clustering of the mutations
//! by a Dirichlet process mixture model, sampled with Neal's Algorithm 8.
pub mod atom_sampler;
pub mod base_measure;
pub mod density;
pub mod dp_sampler;
pub mod entry;
pub mod errors;
pub mod find_union;
pub mod global_params;
pub mod misc;
pub mod partition;
pub mod partition_sampler;
pub mod summary;
pub mod trace;
pub use errors::{Error, Result};
#[macro_use]
extern crate log;
