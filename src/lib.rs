//! Depbank: dependency treebank loading and vocabulary building
//!
//! Reads CoNLL-U treebanks into sentences and datasets with derived
//! statistics, and maps tokens to integer ids for downstream models.

pub mod conllu; // CoNLL-U file parsing
pub mod dataset; // Sentence collections and statistics
pub mod locator; // Treebank file discovery
pub mod tree; // Token and sentence records
pub mod vocab; // Frequency-ranked vocabularies

// Re-exports for convenience
pub use conllu::{CoNLLUReader, ParseError, ParserConfig, parse_file, parse_str};
pub use dataset::{Dataset, DatasetStats, EmptyDatasetError, Summary};
pub use locator::{CorpusLocator, FlatLocator, LoadError, LocatorError, Split, UdLocator};
pub use tree::{LengthMismatch, ROOT, Sentence, Token, TokenError};
pub use vocab::{ReservedIds, SerializationError, Vocab};
