//! Loading the per-sample read count tables into a [DataSet](definitions::DataSet).
use crate::errors::{invalid_configuration, Error, Result};
use definitions::{DataSet, GenotypePrior, Mutation, Observation, SampleData};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::convert::TryFrom;
use std::path::{Path, PathBuf};

/// One sample to be loaded.
#[derive(Debug, Clone)]
pub struct SampleTable {
    pub id: String,
    /// TSV with `mutation_id`, `ref_counts`, and `var_counts` columns.
    pub path: PathBuf,
    pub tumour_content: f64,
    pub genotype: GenotypePrior,
}

impl SampleTable {
    pub fn new<P: AsRef<Path>>(id: &str, path: P, tumour_content: f64, genotype: GenotypePrior) -> Self {
        Self {
            id: id.to_string(),
            path: path.as_ref().to_path_buf(),
            tumour_content,
            genotype,
        }
    }
}

pub trait Entry: Sized {
    fn entry(samples: &[SampleTable]) -> Result<Self>;
}

impl Entry for DataSet {
    /// Only the mutations appearing in all the samples are kept, in the order of the first sample.
    fn entry(samples: &[SampleTable]) -> Result<Self> {
        if samples.is_empty() {
            return Err(invalid_configuration("at least one sample is required"));
        }
        let mut sample_ids = HashSet::new();
        for sample in samples.iter() {
            if !(0f64 < sample.tumour_content && sample.tumour_content <= 1f64) {
                return Err(Error::InvalidParameter {
                    name: "tumour content",
                    value: sample.tumour_content,
                });
            }
            if sample.genotype.is_empty() {
                let msg = format!("genotype prior of {} has no state", sample.id);
                return Err(invalid_configuration(&msg));
            }
            if !sample_ids.insert(sample.id.as_str()) {
                let msg = format!("sample {} appears more than once", sample.id);
                return Err(invalid_configuration(&msg));
            }
        }
        let tables = samples
            .iter()
            .map(|sample| read_table(&sample.path))
            .collect::<Result<Vec<_>>>()?;
        let lookups: Vec<HashMap<&str, Observation>> = tables
            .iter()
            .map(|table| table.iter().map(|(id, obs)| (id.as_str(), *obs)).collect())
            .collect();
        let mutations: Vec<_> = tables[0]
            .iter()
            .filter_map(|(id, _)| {
                let observations: Option<Vec<_>> = lookups
                    .iter()
                    .map(|lookup| lookup.get(id.as_str()).copied())
                    .collect();
                if observations.is_none() {
                    debug!("ENTRY\tNotShared\t{}", id);
                }
                let data = observations?
                    .into_iter()
                    .zip(samples.iter())
                    .map(|(obs, sample)| {
                        SampleData::new(obs, sample.genotype.clone(), sample.tumour_content)
                    })
                    .collect();
                Some(Mutation::new(id.clone(), data))
            })
            .collect();
        for (sample, table) in samples.iter().zip(tables.iter()) {
            debug!("ENTRY\t{}\t{}\t{}", sample.id, table.len(), mutations.len());
        }
        if mutations.is_empty() {
            return Err(Error::NoSharedMutation);
        }
        let sample_ids = samples.iter().map(|s| s.id.clone()).collect();
        let dataset = DataSet::new(sample_ids, mutations);
        info!("ENTRY\t{}", dataset);
        Ok(dataset)
    }
}

#[derive(Debug, Deserialize)]
struct Row {
    mutation_id: String,
    ref_counts: String,
    var_counts: String,
}

/// Read a per-sample table. Extra columns are ignored.
pub fn read_table<P: AsRef<Path>>(path: P) -> Result<Vec<(String, Observation)>> {
    let path = path.as_ref();
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_path(path)?;
    let mut seen = HashSet::new();
    let mut table = vec![];
    for row in rdr.deserialize::<Row>() {
        let row = row?;
        let invalid = |msg: String| Error::InvalidObservation {
            path: path.to_path_buf(),
            mutation: row.mutation_id.clone(),
            msg,
        };
        let parse = |name: &str, value: &str| -> Result<u64> {
            let count: i64 = value
                .trim()
                .parse()
                .map_err(|_| invalid(format!("{} is not an integer: {}", name, value)))?;
            match u64::try_from(count) {
                Ok(count) => Ok(count),
                Err(_) => Err(invalid(format!("{} is negative: {}", name, count))),
            }
        };
        let ref_counts = parse("ref_counts", &row.ref_counts)?;
        let var_counts = parse("var_counts", &row.var_counts)?;
        if ref_counts + var_counts == 0 {
            return Err(invalid("no read covers the mutation".to_string()));
        }
        if !seen.insert(row.mutation_id.clone()) {
            return Err(Error::DuplicatedMutation {
                path: path.to_path_buf(),
                mutation: row.mutation_id,
            });
        }
        let obs = Observation::new(var_counts, ref_counts + var_counts);
        table.push((row.mutation_id, obs));
    }
    debug!("ENTRY\t{}\t{}", path.display(), table.len());
    Ok(table)
}
