//! Persistence of the posterior trace.
//!
//! A trace store is a directory:
//! ```text
//! meta.json                      sample IDs, mutation IDs, and whether the precision is recorded.
//! alpha.tsv                      one concentration per line.
//! precision.tsv                  one precision per line, if recorded.
//! labels.tsv                     header of mutation IDs, then one row of labels per sweep.
//! cellular_frequencies/<id>.tsv  header of mutation IDs, then one row of prevalences per sweep.
//! ```
use crate::errors::{invalid_configuration, Error, Result};
use definitions::TraceRecord;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

const META: &str = "meta.json";
const ALPHA: &str = "alpha.tsv";
const PRECISION: &str = "precision.tsv";
const LABELS: &str = "labels.tsv";
const FREQUENCIES: &str = "cellular_frequencies";

/// The sink of the sampler. One record is appended after each sweep.
pub trait TraceWriter {
    fn append(&mut self, record: TraceRecord) -> Result<()>;
}

impl TraceWriter for Vec<TraceRecord> {
    fn append(&mut self, record: TraceRecord) -> Result<()> {
        self.push(record);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceMeta {
    pub sample_ids: Vec<String>,
    pub mutation_ids: Vec<String>,
    pub precision: bool,
}

impl TraceMeta {
    pub fn new(sample_ids: Vec<String>, mutation_ids: Vec<String>, precision: bool) -> Self {
        Self {
            sample_ids,
            mutation_ids,
            precision,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceState {
    Created,
    Opened,
    Closed,
}

impl std::fmt::Display for TraceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TraceState::Created => write!(f, "Created"),
            TraceState::Opened => write!(f, "Opened"),
            TraceState::Closed => write!(f, "Closed"),
        }
    }
}

/// Trace store on a directory. Records are buffered, and written every `flush_interval` appends.
#[derive(Debug)]
pub struct DiskTrace {
    dir: PathBuf,
    meta: TraceMeta,
    flush_interval: usize,
    buffer: Vec<TraceRecord>,
    state: TraceState,
}

impl DiskTrace {
    pub fn new<P: AsRef<Path>>(dir: P, meta: TraceMeta, flush_interval: usize) -> Result<Self> {
        if flush_interval == 0 {
            return Err(invalid_configuration("the flush interval should be positive"));
        }
        meta.sample_ids.iter().try_for_each(|id| check_sample_id(id))?;
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
            meta,
            flush_interval,
            buffer: Vec::with_capacity(flush_interval),
            state: TraceState::Created,
        })
    }
    pub fn state(&self) -> TraceState {
        self.state
    }
    fn check_state(&self, expected: TraceState, name: &'static str) -> Result<()> {
        match self.state == expected {
            true => Ok(()),
            false => Err(Error::TraceState {
                expected: name,
                found: self.state.to_string(),
            }),
        }
    }
    /// Create the store, or reopen the existing one to append records.
    pub fn open(&mut self) -> Result<()> {
        self.check_state(TraceState::Created, "Created")?;
        let meta_path = self.dir.join(META);
        if meta_path.exists() {
            let rdr = BufReader::new(File::open(&meta_path)?);
            let existing: TraceMeta = serde_json::de::from_reader(rdr)?;
            if existing != self.meta {
                return Err(Error::TraceMismatch {
                    path: self.dir.clone(),
                });
            }
            debug!("TRACE\tReopen\t{}", self.dir.display());
        } else {
            self.create()?;
            debug!("TRACE\tCreate\t{}", self.dir.display());
        }
        self.state = TraceState::Opened;
        Ok(())
    }
    fn create(&self) -> Result<()> {
        std::fs::create_dir_all(self.dir.join(FREQUENCIES))?;
        let mut wtr = BufWriter::new(File::create(self.dir.join(META))?);
        serde_json::ser::to_writer_pretty(&mut wtr, &self.meta)?;
        wtr.flush()?;
        File::create(self.dir.join(ALPHA))?;
        if self.meta.precision {
            File::create(self.dir.join(PRECISION))?;
        }
        let header = &self.meta.mutation_ids;
        write_header(&self.dir.join(LABELS), header)?;
        for id in self.meta.sample_ids.iter() {
            write_header(&frequency_path(&self.dir, id), header)?;
        }
        Ok(())
    }
    /// Write the buffered records.
    pub fn flush(&mut self) -> Result<()> {
        self.check_state(TraceState::Opened, "Opened")?;
        if self.buffer.is_empty() {
            return Ok(());
        }
        let mut alpha = appender(&self.dir.join(ALPHA))?;
        let mut labels = appender(&self.dir.join(LABELS))?;
        let mut precision = match self.meta.precision {
            true => Some(appender(&self.dir.join(PRECISION))?),
            false => None,
        };
        let mut frequencies = self
            .meta
            .sample_ids
            .iter()
            .map(|id| appender(&frequency_path(&self.dir, id)))
            .collect::<Result<Vec<_>>>()?;
        for record in self.buffer.iter() {
            alpha.serialize(record.alpha)?;
            labels.serialize(&record.labels)?;
            if let Some(wtr) = precision.as_mut() {
                let value = record.precision.ok_or_else(|| Error::CorruptTrace {
                    path: self.dir.clone(),
                    msg: "a record without precision".to_string(),
                })?;
                wtr.serialize(value)?;
            }
            for (wtr, row) in frequencies.iter_mut().zip(record.cellular_frequencies.iter()) {
                wtr.serialize(row)?;
            }
        }
        alpha.flush()?;
        labels.flush()?;
        if let Some(wtr) = precision.as_mut() {
            wtr.flush()?;
        }
        for wtr in frequencies.iter_mut() {
            wtr.flush()?;
        }
        trace!("TRACE\tFlush\t{}", self.buffer.len());
        self.buffer.clear();
        Ok(())
    }
    /// Flush the remaining records and close the store.
    pub fn close(&mut self) -> Result<()> {
        self.flush()?;
        self.state = TraceState::Closed;
        debug!("TRACE\tClose\t{}", self.dir.display());
        Ok(())
    }
}

impl TraceWriter for DiskTrace {
    fn append(&mut self, record: TraceRecord) -> Result<()> {
        self.check_state(TraceState::Opened, "Opened")?;
        if record.labels.len() != self.meta.mutation_ids.len()
            || record.cellular_frequencies.len() != self.meta.sample_ids.len()
        {
            return Err(Error::TraceMismatch {
                path: self.dir.clone(),
            });
        }
        self.buffer.push(record);
        if self.flush_interval <= self.buffer.len() {
            self.flush()?;
        }
        Ok(())
    }
}

/// A sample ID names a file in the store, so it should be a plain file name.
pub fn check_sample_id(sample_id: &str) -> Result<()> {
    let is_plain = !sample_id.is_empty()
        && sample_id != "."
        && sample_id != ".."
        && !sample_id.contains(|c: char| c == '/' || c == '\\' || c == '\0');
    match is_plain {
        true => Ok(()),
        false => Err(invalid_configuration(&format!(
            "sample ID {:?} is not usable as a file name",
            sample_id
        ))),
    }
}

fn frequency_path(dir: &Path, sample_id: &str) -> PathBuf {
    dir.join(FREQUENCIES).join(format!("{}.tsv", sample_id))
}

fn write_header(path: &Path, header: &[String]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_path(path)?;
    wtr.write_record(header)?;
    wtr.flush()?;
    Ok(())
}

fn appender(path: &Path) -> Result<csv::Writer<File>> {
    let file = OpenOptions::new().append(true).open(path)?;
    let wtr = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_writer(file);
    Ok(wtr)
}

/// A trace read back from a closed store.
#[derive(Debug, Clone)]
pub struct Trace {
    pub meta: TraceMeta,
    pub records: Vec<TraceRecord>,
}

#[derive(Debug, Clone)]
pub struct TraceReader {
    dir: PathBuf,
    meta: TraceMeta,
}

impl TraceReader {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let rdr = BufReader::new(File::open(dir.join(META))?);
        let meta: TraceMeta = serde_json::de::from_reader(rdr)?;
        if let Some(id) = meta.sample_ids.iter().find(|id| check_sample_id(id).is_err()) {
            return Err(Error::CorruptTrace {
                path: dir,
                msg: format!("sample ID {:?} is not a plain file name", id),
            });
        }
        Ok(Self { dir, meta })
    }
    pub fn load(&self) -> Result<Trace> {
        let alpha: Vec<f64> = read_rows(&self.dir.join(ALPHA), None)?;
        let header = Some(self.meta.mutation_ids.as_slice());
        let labels: Vec<Vec<usize>> = read_rows(&self.dir.join(LABELS), header)?;
        let precision: Option<Vec<f64>> = match self.meta.precision {
            true => Some(read_rows(&self.dir.join(PRECISION), None)?),
            false => None,
        };
        let frequencies = self
            .meta
            .sample_ids
            .iter()
            .map(|id| read_rows::<Vec<f64>>(&frequency_path(&self.dir, id), header))
            .collect::<Result<Vec<_>>>()?;
        let len = alpha.len();
        let consistent = labels.len() == len
            && precision.as_ref().map(|p| p.len() == len).unwrap_or(true)
            && frequencies.iter().all(|fs| fs.len() == len);
        if !consistent {
            return Err(self.corrupt("the number of rows differs between files"));
        }
        let mut labels = labels.into_iter();
        let mut frequencies: Vec<_> = frequencies.into_iter().map(|fs| fs.into_iter()).collect();
        let mut records = Vec::with_capacity(len);
        for (i, alpha) in alpha.into_iter().enumerate() {
            let labels = labels.next().ok_or_else(|| self.corrupt("missing labels"))?;
            let cellular_frequencies = frequencies
                .iter_mut()
                .map(|fs| fs.next().ok_or_else(|| self.corrupt("missing frequencies")))
                .collect::<Result<Vec<_>>>()?;
            let precision = precision.as_ref().map(|p| p[i]);
            records.push(TraceRecord {
                alpha,
                precision,
                labels,
                cellular_frequencies,
            });
        }
        debug!("TRACE\tLoad\t{}\t{}", self.dir.display(), records.len());
        Ok(Trace {
            meta: self.meta.clone(),
            records,
        })
    }
    fn corrupt(&self, msg: &str) -> Error {
        Error::CorruptTrace {
            path: self.dir.clone(),
            msg: msg.to_string(),
        }
    }
}

fn read_rows<T: serde::de::DeserializeOwned>(path: &Path, header: Option<&[String]>) -> Result<Vec<T>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(header.is_some())
        .from_path(path)?;
    if let Some(header) = header {
        let found = rdr.headers()?;
        if !found.iter().eq(header.iter().map(|s| s.as_str())) {
            return Err(Error::CorruptTrace {
                path: path.to_path_buf(),
                msg: "unexpected header".to_string(),
            });
        }
    }
    rdr.deserialize::<T>()
        .map(|row| row.map_err(Error::from))
        .collect()
}
