//! Posterior summary of a trace: mean and standard deviation of the prevalences,
//! and the clusters from the co-clustering frequencies.
use crate::errors::{invalid_configuration, Result};
use crate::find_union::FindUnion;
use crate::trace::Trace;
use definitions::TraceRecord;
use serde::Serialize;
use std::io::Write;

/// Mutation pairs sharing the label in more than this fraction of the records are put in the same cluster.
const CO_CLUSTERING_THR: f64 = 0.5;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SummaryRow {
    pub mutation_id: String,
    pub sample_id: String,
    pub cellular_prevalence: f64,
    pub cellular_prevalence_std: f64,
    pub cluster_id: usize,
}

/// The records after discarding the first `burnin` and keeping every `thin`-th.
pub fn thinned(records: &[TraceRecord], burnin: usize, thin: usize) -> Result<Vec<&TraceRecord>> {
    if thin == 0 {
        return Err(invalid_configuration("thinning should be positive"));
    }
    let kept: Vec<_> = records.iter().skip(burnin).step_by(thin).collect();
    if kept.is_empty() {
        let msg = format!("no record left after burn-in {} out of {}", burnin, records.len());
        return Err(invalid_configuration(&msg));
    }
    Ok(kept)
}

/// Fraction of the records where the i-th and j-th mutations share the label, as `[i][j]`.
pub fn co_clustering_frequencies(records: &[&TraceRecord], mutation_num: usize) -> Vec<Vec<f64>> {
    let mut counts = vec![vec![0; mutation_num]; mutation_num];
    for record in records.iter() {
        for (i, &li) in record.labels.iter().enumerate() {
            for (j, &lj) in record.labels.iter().enumerate() {
                counts[i][j] += (li == lj) as u32;
            }
        }
    }
    let len = records.len().max(1) as f64;
    counts
        .iter()
        .map(|row| row.iter().map(|&c| c as f64 / len).collect())
        .collect()
}

/// Cluster of each mutation, merging the pairs co-clustered more often than not.
pub fn consensus_clusters(records: &[&TraceRecord], mutation_num: usize) -> Vec<usize> {
    let freqs = co_clustering_frequencies(records, mutation_num);
    let mut fu = FindUnion::new(mutation_num);
    for (i, row) in freqs.iter().enumerate() {
        for (j, &freq) in row.iter().enumerate().skip(i + 1) {
            if CO_CLUSTERING_THR < freq {
                fu.unite(i, j);
            }
        }
    }
    fu.labels()
}

pub fn summarize(trace: &Trace, burnin: usize, thin: usize) -> Result<Vec<SummaryRow>> {
    let records = thinned(&trace.records, burnin, thin)?;
    let mutation_num = trace.meta.mutation_ids.len();
    let clusters = consensus_clusters(&records, mutation_num);
    debug!(
        "SUMMARY\t{}\t{}",
        records.len(),
        clusters.iter().max().map(|&x| x + 1).unwrap_or(0)
    );
    let len = records.len() as f64;
    let mut rows = Vec::with_capacity(mutation_num * trace.meta.sample_ids.len());
    for (m, mutation_id) in trace.meta.mutation_ids.iter().enumerate() {
        for (s, sample_id) in trace.meta.sample_ids.iter().enumerate() {
            let (sum, sumsq) = records
                .iter()
                .map(|r| r.cellular_frequencies[s][m])
                .fold((0f64, 0f64), |(sum, sumsq), x| (sum + x, sumsq + x * x));
            let mean = sum / len;
            let var = (sumsq / len - mean * mean).max(0f64);
            rows.push(SummaryRow {
                mutation_id: mutation_id.clone(),
                sample_id: sample_id.clone(),
                cellular_prevalence: mean,
                cellular_prevalence_std: var.sqrt(),
                cluster_id: clusters[m],
            });
        }
    }
    Ok(rows)
}

/// Write the rows as a TSV with a header.
pub fn write_summary<W: Write>(rows: &[SummaryRow], wtr: W) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().delimiter(b'\t').from_writer(wtr);
    for row in rows.iter() {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::TraceMeta;
    fn trace() -> Trace {
        let meta = TraceMeta::new(
            vec!["A".to_string()],
            vec!["m1".to_string(), "m2".to_string(), "m3".to_string()],
            false,
        );
        let records = (0..10)
            .map(|i| {
                let labels = match i % 4 {
                    0 => vec![0, 0, 1],
                    1 => vec![0, 0, 0],
                    2 => vec![0, 1, 2],
                    _ => vec![0, 0, 1],
                };
                let x = i as f64 / 10f64;
                TraceRecord {
                    alpha: 1f64,
                    precision: None,
                    labels,
                    cellular_frequencies: vec![vec![0.5, x, 0.1]],
                }
            })
            .collect();
        Trace { meta, records }
    }
    #[test]
    fn thinning() {
        let trace = trace();
        assert_eq!(thinned(&trace.records, 2, 3).unwrap().len(), 3);
        assert!(thinned(&trace.records, 10, 1).is_err());
        assert!(thinned(&trace.records, 0, 0).is_err());
    }
    #[test]
    fn summary() {
        let trace = trace();
        let rows = summarize(&trace, 0, 1).unwrap();
        assert_eq!(rows.len(), 3);
        assert!((rows[0].cellular_prevalence - 0.5).abs() < 0.000001);
        assert!(rows[0].cellular_prevalence_std < 0.000001);
        assert!((rows[1].cellular_prevalence - 0.45).abs() < 0.000001);
        assert!(0.2 < rows[1].cellular_prevalence_std);
        // m1 and m2 share the label in 8/10 records, m3 in 3/10.
        let clusters: Vec<_> = rows.iter().map(|r| r.cluster_id).collect();
        assert_eq!(clusters, vec![0, 0, 1]);
    }
    #[test]
    fn tsv() {
        let rows = summarize(&trace(), 0, 1).unwrap();
        let mut buf = vec![];
        write_summary(&rows, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "mutation_id\tsample_id\tcellular_prevalence\tcellular_prevalence_std\tcluster_id"
        );
        assert_eq!(lines.count(), 3);
    }
}
