//! Sentence collections and corpus statistics
//!
//! A [`Dataset`] is the ordered list of sentences read from one or more
//! treebank files. Derived views and statistics are recomputed from the
//! current sentences on every call.

use crate::conllu::{ParseError, parse_file};
use crate::tree::Sentence;
use log::debug;
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::ops::Index;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Statistics requested over a sequence with no values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot compute statistics over empty {what}")]
pub struct EmptyDatasetError {
    /// Which sequence was empty
    pub what: &'static str,
}

/// Error loading a dataset from a glob pattern
#[derive(Debug, Error)]
pub enum GlobLoadError {
    #[error(transparent)]
    Pattern(#[from] glob::PatternError),
    #[error(transparent)]
    Glob(#[from] glob::GlobError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Min/max/mean/standard deviation of a sequence of lengths
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub min: usize,
    pub max: usize,
    pub mean: f64,
    /// Population standard deviation
    pub std: f64,
}

impl Summary {
    /// Summarize `values`, or `None` when there are none
    pub fn from_values(values: &[usize]) -> Option<Self> {
        let min = *values.iter().min()?;
        let max = *values.iter().max()?;
        let n = values.len() as f64;
        let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
        let var = values
            .iter()
            .map(|&v| (v as f64 - mean).powi(2))
            .sum::<f64>()
            / n;
        Some(Self {
            min,
            max,
            mean,
            std: var.sqrt(),
        })
    }
}

/// Sentence and arc length statistics for a whole dataset
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DatasetStats {
    pub max_sent_len: usize,
    pub min_sent_len: usize,
    pub avg_sent_len: f64,
    pub std_sent_len: f64,
    pub max_arc_len: usize,
    pub min_arc_len: usize,
    pub avg_arc_len: f64,
    pub std_arc_len: f64,
    pub num_sents: usize,
}

/// Ordered collection of sentences with optional labels
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    pub sents: Vec<Sentence>,
    pub lang: Option<String>,
    pub name: Option<String>,
}

impl Dataset {
    pub fn new(sents: Vec<Sentence>) -> Self {
        Self {
            sents,
            lang: None,
            name: None,
        }
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Parse several files in parallel and concatenate them in the given order
    pub fn from_paths<P: AsRef<Path> + Sync>(paths: &[P]) -> Result<Self, ParseError> {
        let parts = paths
            .par_iter()
            .map(|path| parse_file(path))
            .collect::<Result<Vec<_>, _>>()?;
        let sents: Vec<Sentence> = parts.into_iter().flat_map(|d| d.sents).collect();
        debug!("loaded {} sentences from {} files", sents.len(), paths.len());
        Ok(Self::new(sents))
    }

    /// Parse every file matching a glob pattern
    ///
    /// Files are processed in sorted order for deterministic results.
    pub fn from_glob(pattern: &str) -> Result<Self, GlobLoadError> {
        let mut paths = glob::glob(pattern)?.collect::<Result<Vec<PathBuf>, _>>()?;
        paths.sort();
        Ok(Self::from_paths(&paths)?)
    }

    pub fn len(&self) -> usize {
        self.sents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sents.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sentence> {
        self.sents.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Sentence> {
        self.sents.iter_mut()
    }

    /// Write the dataset as CoNLL-U to `path`
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()
    }

    /// Write each sentence's token lines followed by one blank line
    pub fn write_to<W: Write>(&self, mut writer: W) -> std::io::Result<()> {
        for sent in &self.sents {
            for token in sent {
                writeln!(writer, "{}", token)?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }

    pub fn words(&self) -> Vec<Vec<&str>> {
        self.sents.iter().map(Sentence::words).collect()
    }

    pub fn heads(&self) -> Vec<Vec<i64>> {
        self.sents.iter().map(Sentence::heads).collect()
    }

    pub fn arctags(&self) -> Vec<Vec<&str>> {
        self.sents.iter().map(Sentence::arctags).collect()
    }

    pub fn upostags(&self) -> Vec<Vec<&str>> {
        self.sents.iter().map(Sentence::upostags).collect()
    }

    pub fn xpostags(&self) -> Vec<Vec<&str>> {
        self.sents.iter().map(Sentence::xpostags).collect()
    }

    pub fn sent_lengths(&self) -> Vec<usize> {
        self.sents.iter().map(Sentence::len).collect()
    }

    /// Arc lengths of all sentences, flattened in order
    pub fn arc_lengths(&self) -> Vec<usize> {
        self.sents.iter().flat_map(|s| s.arc_lengths()).collect()
    }

    pub fn len_stats(&self) -> Result<Summary, EmptyDatasetError> {
        Summary::from_values(&self.sent_lengths()).ok_or(EmptyDatasetError {
            what: "sentence lengths",
        })
    }

    pub fn arc_len_stats(&self) -> Result<Summary, EmptyDatasetError> {
        Summary::from_values(&self.arc_lengths()).ok_or(EmptyDatasetError {
            what: "arc lengths",
        })
    }

    pub fn stats(&self) -> Result<DatasetStats, EmptyDatasetError> {
        let sent = self.len_stats()?;
        let arc = self.arc_len_stats()?;
        Ok(DatasetStats {
            max_sent_len: sent.max,
            min_sent_len: sent.min,
            avg_sent_len: sent.mean,
            std_sent_len: sent.std,
            max_arc_len: arc.max,
            min_arc_len: arc.min,
            avg_arc_len: arc.mean,
            std_arc_len: arc.std,
            num_sents: self.len(),
        })
    }
}

impl Index<usize> for Dataset {
    type Output = Sentence;

    fn index(&self, index: usize) -> &Sentence {
        &self.sents[index]
    }
}

impl IntoIterator for Dataset {
    type Item = Sentence;
    type IntoIter = std::vec::IntoIter<Sentence>;

    fn into_iter(self) -> Self::IntoIter {
        self.sents.into_iter()
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a Sentence;
    type IntoIter = std::slice::Iter<'a, Sentence>;

    fn into_iter(self) -> Self::IntoIter {
        self.sents.iter()
    }
}

impl FromIterator<Sentence> for Dataset {
    fn from_iter<I: IntoIterator<Item = Sentence>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Dataset of {} - {} sents",
            self.lang.as_deref().unwrap_or("unknown"),
            self.len()
        )
    }
}
