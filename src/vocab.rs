//! Frequency-ranked vocabularies
//!
//! A [`Vocab`] maps surface symbols to dense integer ids. Ids below
//! [`RESERVED_COUNT`] belong to structural symbols (padding, unknown, start,
//! end); corpus symbols follow in order of descending frequency.

use log::debug;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::ops::Index;
use std::path::Path;
use thiserror::Error;

/// Number of ids set aside for structural symbols
pub const RESERVED_COUNT: u32 = 4;

pub const PAD_SYMBOL: &str = "<PAD>";
pub const UNK_SYMBOL: &str = "<UNK>";
pub const START_SYMBOL: &str = "<START>";
pub const END_SYMBOL: &str = "<END>";

/// Error reading or writing a vocabulary file
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed vocabulary file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("reserved ids {0:?} do not cover 0..4 exactly once")]
    Reserved(ReservedIds),
    #[error("symbol {symbol:?} has id {id} outside the symbol range")]
    InvalidId { symbol: String, id: u32 },
    #[error("id {0} is assigned to more than one symbol")]
    DuplicateId(u32),
}

/// Ids of the structural symbols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservedIds {
    pub pad: u32,
    pub unk: u32,
    pub start: u32,
    pub end: u32,
}

impl Default for ReservedIds {
    fn default() -> Self {
        Self {
            pad: 0,
            unk: 1,
            start: 2,
            end: 3,
        }
    }
}

impl ReservedIds {
    /// Name of the structural symbol with this id
    pub fn symbol(&self, id: u32) -> Option<&'static str> {
        match id {
            _ if id == self.pad => Some(PAD_SYMBOL),
            _ if id == self.unk => Some(UNK_SYMBOL),
            _ if id == self.start => Some(START_SYMBOL),
            _ if id == self.end => Some(END_SYMBOL),
            _ => None,
        }
    }

    fn validate(&self) -> Result<(), SerializationError> {
        let mut ids = [self.pad, self.unk, self.start, self.end];
        ids.sort_unstable();
        if ids.iter().copied().eq(0..RESERVED_COUNT) {
            Ok(())
        } else {
            Err(SerializationError::Reserved(*self))
        }
    }
}

/// On-disk form: symbol table plus reserved ids
#[derive(Serialize, Deserialize)]
struct VocabFile {
    reserved: ReservedIds,
    index: BTreeMap<String, u32>,
    #[serde(default)]
    size: usize,
    #[serde(default)]
    threshold: usize,
}

/// Bijective mapping between symbols and dense ids
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocab {
    reserved: ReservedIds,
    index: FxHashMap<String, u32>,
    /// Symbols in id order, starting at [`RESERVED_COUNT`]
    symbols: Vec<String>,
    size: usize,
    threshold: usize,
}

impl Vocab {
    /// Build a vocabulary from a token stream
    ///
    /// Symbols occurring at most `threshold` times are dropped. The rest are
    /// ranked by descending count, ties going to the symbol seen first, and
    /// the top `size` are kept.
    pub fn from_token_list<I, S>(tokens: I, size: usize, threshold: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut slots: FxHashMap<String, usize> = FxHashMap::default();
        let mut counts: Vec<(String, usize)> = Vec::new();

        for token in tokens {
            let token = token.as_ref();
            match slots.get(token) {
                Some(&slot) => counts[slot].1 += 1,
                None => {
                    slots.insert(token.to_string(), counts.len());
                    counts.push((token.to_string(), 1));
                }
            }
        }

        let seen = counts.len();
        counts.retain(|(_, count)| *count > threshold);
        // stable: equal counts stay in first-seen order
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts.truncate(size);

        let symbols: Vec<String> = counts.into_iter().map(|(symbol, _)| symbol).collect();
        debug!(
            "built vocabulary: kept {} of {} distinct symbols (size={}, threshold={})",
            symbols.len(),
            seen,
            size,
            threshold
        );
        Self::from_ranked(ReservedIds::default(), symbols, size, threshold)
    }

    fn from_ranked(reserved: ReservedIds, symbols: Vec<String>, size: usize, threshold: usize) -> Self {
        let index = symbols
            .iter()
            .zip(RESERVED_COUNT..)
            .map(|(symbol, id)| (symbol.clone(), id))
            .collect();
        Self {
            reserved,
            index,
            symbols,
            size,
            threshold,
        }
    }

    pub fn reserved(&self) -> ReservedIds {
        self.reserved
    }

    /// Symbol to id table, excluding structural symbols
    pub fn index(&self) -> &FxHashMap<String, u32> {
        &self.index
    }

    /// Number of corpus symbols retained
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Number of ids in use, structural symbols included
    pub fn total_len(&self) -> usize {
        self.symbols.len() + RESERVED_COUNT as usize
    }

    /// Maximum number of symbols requested at build time
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.index.contains_key(symbol)
    }

    /// Id of `symbol`, or the unknown id
    pub fn get(&self, symbol: &str) -> u32 {
        self.index.get(symbol).copied().unwrap_or(self.reserved.unk)
    }

    /// Map every token to its id; unknown tokens map to the unknown id
    pub fn encode<I, S>(&self, tokens: I) -> Vec<u32>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        tokens.into_iter().map(|t| self.get(t.as_ref())).collect()
    }

    /// Symbol for an id, structural symbols included
    pub fn symbol(&self, id: u32) -> Option<&str> {
        if let Some(symbol) = self.reserved.symbol(id) {
            return Some(symbol);
        }
        let offset = id.checked_sub(RESERVED_COUNT)? as usize;
        self.symbols.get(offset).map(String::as_str)
    }

    /// Map ids back to symbols; ids out of range decode to [`UNK_SYMBOL`]
    pub fn decode(&self, ids: &[u32]) -> Vec<&str> {
        ids.iter()
            .map(|&id| self.symbol(id).unwrap_or(UNK_SYMBOL))
            .collect()
    }

    /// Corpus symbols in id order
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.symbols.iter().map(String::as_str).zip(RESERVED_COUNT..)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SerializationError> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SerializationError> {
        Self::read_from(BufReader::new(File::open(path)?))
    }

    /// Write the vocabulary as JSON
    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), SerializationError> {
        let file = VocabFile {
            reserved: self.reserved,
            index: self.iter().map(|(s, id)| (s.to_string(), id)).collect(),
            size: self.size,
            threshold: self.threshold,
        };
        serde_json::to_writer_pretty(writer, &file)?;
        Ok(())
    }

    /// Read a vocabulary written by [`Vocab::write_to`]
    pub fn read_from<R: Read>(reader: R) -> Result<Self, SerializationError> {
        let file: VocabFile = serde_json::from_reader(reader)?;
        file.reserved.validate()?;

        let n = file.index.len();
        let mut slots: Vec<Option<String>> = vec![None; n];
        for (symbol, id) in file.index {
            let offset = id
                .checked_sub(RESERVED_COUNT)
                .map(|o| o as usize)
                .filter(|&o| o < n);
            let Some(offset) = offset else {
                return Err(SerializationError::InvalidId { symbol, id });
            };
            if slots[offset].is_some() {
                return Err(SerializationError::DuplicateId(id));
            }
            slots[offset] = Some(symbol);
        }

        // n symbols in n distinct slots: every slot is filled
        let symbols = slots.into_iter().flatten().collect();
        Ok(Self::from_ranked(
            file.reserved,
            symbols,
            file.size,
            file.threshold,
        ))
    }
}

impl Index<&str> for Vocab {
    type Output = u32;

    fn index(&self, symbol: &str) -> &u32 {
        self.index.get(symbol).unwrap_or(&self.reserved.unk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAKE: &str = "daybreak at the bottom of the lake";

    fn lake() -> Vec<&'static str> {
        LAKE.split_whitespace().collect()
    }

    #[test]
    fn test_from_token_list() {
        let v = Vocab::from_token_list(lake(), 7, 0);
        let unk = v.reserved().unk;

        assert_eq!(v.len(), 6);
        assert_eq!(v.index().len(), 6);
        assert_eq!(v.encode(["unknown", "words"]), vec![unk, unk]);

        let e = v.encode(["the", "daybreak", "supercalifragilistic"]);
        assert_ne!(e[0], unk);
        assert_ne!(e[1], unk);
        assert_eq!(e[2], unk);
    }

    #[test]
    fn test_zero_size() {
        let v = Vocab::from_token_list(lake(), 0, 0);
        let unk = v.reserved().unk;

        assert_eq!(v.len(), 0);
        assert_eq!(v.encode(["unknown", "words"]), vec![unk, unk]);
        assert_eq!(v.encode(lake()), vec![unk; 7]);
    }

    #[test]
    fn test_threshold() {
        let v = Vocab::from_token_list(lake(), 7, 1);
        let unk = v.reserved().unk;

        assert_eq!(v.len(), 1);
        assert_eq!(v.encode(["unknown", "words"]), vec![unk, unk]);

        let e = v.encode(["the", "daybreak", "supercalifragilistic"]);
        assert_ne!(e[0], unk);
        assert_eq!(e[1], unk);
        assert_eq!(e[2], unk);
    }

    #[test]
    fn test_threshold_above_max_count() {
        let v = Vocab::from_token_list(lake(), 7, 5);

        assert!(v.is_empty());
        assert_eq!(v.encode(lake()), vec![v.reserved().unk; 7]);
        // Unlike size=0, the requested size is still visible
        assert_eq!(v.size(), 7);
        assert_eq!(Vocab::from_token_list(lake(), 0, 0).size(), 0);
    }

    #[test]
    fn test_threshold_law() {
        let tokens: Vec<&str> = "a b b c c c d d d d e e e e e".split(' ').collect();
        for t in 0..7 {
            let v = Vocab::from_token_list(&tokens, 100, t);
            for (symbol, _) in v.iter() {
                let count = tokens.iter().filter(|&&s| s == symbol).count();
                assert!(count >= t, "{symbol} kept with count {count} at threshold {t}");
            }
        }
    }

    #[test]
    fn test_ranking_and_ties() {
        let v = Vocab::from_token_list(["b", "a", "c", "a", "b", "d", "c", "a"], 10, 0);

        // a=3 first, then b and c tied at 2 in first-seen order, then d
        let ranked: Vec<&str> = v.iter().map(|(s, _)| s).collect();
        assert_eq!(ranked, vec!["a", "b", "c", "d"]);
        assert_eq!(v["a"], RESERVED_COUNT);
        assert_eq!(v["d"], RESERVED_COUNT + 3);
        assert_eq!(v.total_len(), 8);

        let truncated = Vocab::from_token_list(["b", "a", "c", "a", "b", "d", "c", "a"], 2, 0);
        assert!(truncated.contains("b"));
        assert!(!truncated.contains("c"));
    }

    #[test]
    fn test_ids_dense_and_disjoint_from_reserved() {
        let v = Vocab::from_token_list(lake(), 7, 0);
        let mut ids: Vec<u32> = v.index().values().copied().collect();
        ids.sort_unstable();
        assert_eq!(ids, (RESERVED_COUNT..RESERVED_COUNT + 6).collect::<Vec<_>>());
    }

    #[test]
    fn test_decode() {
        let v = Vocab::from_token_list(lake(), 7, 0);
        let ids = v.encode(["the", "bottom", "abyss"]);

        assert_eq!(v.decode(&ids), vec!["the", "bottom", UNK_SYMBOL]);
        assert_eq!(v.symbol(0), Some(PAD_SYMBOL));
        assert_eq!(v.symbol(3), Some(END_SYMBOL));
        assert_eq!(v.symbol(1000), None);
        assert_eq!(v.decode(&[2, 1000]), vec![START_SYMBOL, UNK_SYMBOL]);
    }

    #[test]
    fn test_serialisation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v.vocab");

        let s = [
            "here", "i", "go", "playing", "the", "fool", "again", "yes", "i", "am", "i", "am", "i",
            "am",
        ];
        let v = Vocab::from_token_list(s, 20, 0);
        v.save(&path).unwrap();
        let v2 = Vocab::load(&path).unwrap();

        for w in s {
            assert_eq!(v[w], v2[w]);
        }
        assert_eq!(v2, v);
        for seq in [&[][..], &["nobody", "home"][..], &["i", "am", "nobody"][..]] {
            assert_eq!(v.encode(seq), v2.encode(seq));
        }
    }

    #[test]
    fn test_serialisation_empty_vocab() {
        let v = Vocab::from_token_list(lake(), 0, 0);
        let mut buf = Vec::new();
        v.write_to(&mut buf).unwrap();
        let v2 = Vocab::read_from(buf.as_slice()).unwrap();

        assert_eq!(v2, v);
        assert_eq!(v2.encode(["the"]), vec![v.reserved().unk]);
    }

    #[test]
    fn test_load_missing_or_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let err = Vocab::load(dir.path().join("missing.vocab")).unwrap_err();
        assert!(matches!(err, SerializationError::Io(_)));

        let v = Vocab::from_token_list(lake(), 7, 0);
        let mut buf = Vec::new();
        v.write_to(&mut buf).unwrap();
        buf.truncate(buf.len() / 2);
        let err = Vocab::read_from(buf.as_slice()).unwrap_err();
        assert!(matches!(err, SerializationError::Json(_)));
    }

    #[test]
    fn test_load_inconsistent_ids() {
        let bad_reserved = r#"{"reserved": {"pad": 0, "unk": 0, "start": 2, "end": 3}, "index": {}}"#;
        assert!(matches!(
            Vocab::read_from(bad_reserved.as_bytes()).unwrap_err(),
            SerializationError::Reserved(_)
        ));

        let in_reserved = r#"{"reserved": {"pad": 0, "unk": 1, "start": 2, "end": 3}, "index": {"a": 1}}"#;
        assert!(matches!(
            Vocab::read_from(in_reserved.as_bytes()).unwrap_err(),
            SerializationError::InvalidId { id: 1, .. }
        ));

        let gap = r#"{"reserved": {"pad": 0, "unk": 1, "start": 2, "end": 3}, "index": {"a": 4, "b": 6}}"#;
        assert!(matches!(
            Vocab::read_from(gap.as_bytes()).unwrap_err(),
            SerializationError::InvalidId { id: 6, .. }
        ));

        let dup = r#"{"reserved": {"pad": 0, "unk": 1, "start": 2, "end": 3}, "index": {"a": 4, "b": 4}}"#;
        assert!(matches!(
            Vocab::read_from(dup.as_bytes()).unwrap_err(),
            SerializationError::DuplicateId(4)
        ));
    }

    #[test]
    fn test_load_permuted_reserved() {
        let json = r#"{"reserved": {"pad": 3, "unk": 0, "start": 1, "end": 2}, "index": {"x": 5, "y": 4}}"#;
        let v = Vocab::read_from(json.as_bytes()).unwrap();

        assert_eq!(v.get("nope"), 0);
        assert_eq!(v.encode(["y", "x"]), vec![4, 5]);
        assert_eq!(v.symbol(3), Some(PAD_SYMBOL));
    }
}
