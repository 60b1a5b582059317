//! CoNLL-U file parsing
//!
//! Streams CoNLL-U text into [`Sentence`] records. Sentences are separated by
//! blank lines, comment lines are skipped, and every other line must hold
//! exactly ten tab-separated columns.
//!
//! CoNLL-U format: https://universaldependencies.org/format.html

use crate::dataset::Dataset;
use crate::tree::{CONLLU_FIELDS, Sentence, Token, TokenError};
use flate2::read::MultiGzDecoder;
use log::debug;
use memchr::memchr_iter;
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, ErrorKind, Lines};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default prefix of comment/metadata lines
pub const COMMENT_MARKER: char = '#';

/// Reader settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserConfig {
    /// Lines starting with this character are ignored
    pub comment_marker: char,
}

impl ParserConfig {
    pub fn with_comment_marker(mut self, marker: char) -> Self {
        self.comment_marker = marker;
        self
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            comment_marker: COMMENT_MARKER,
        }
    }
}

/// What went wrong on a line
#[derive(Debug, Error)]
pub enum ParseErrorKind {
    /// Malformed token line
    #[error("{source}: {line:?}")]
    Format { line: String, source: TokenError },
    /// Line is not valid UTF-8
    #[error("invalid UTF-8: {0}")]
    Encoding(#[source] std::io::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error during CoNLL-U parsing
#[derive(Debug)]
pub struct ParseError {
    /// Source file, when reading from disk
    pub path: Option<PathBuf>,
    /// 1-based line number (0 if the file could not be opened)
    pub line_num: usize,
    pub kind: ParseErrorKind,
}

impl ParseError {
    /// Raw text of the offending line, for format errors
    pub fn line(&self) -> Option<&str> {
        match &self.kind {
            ParseErrorKind::Format { line, .. } => Some(line),
            ParseErrorKind::Encoding(_) | ParseErrorKind::Io(_) => None,
        }
    }

    /// Whether the input itself is malformed, as opposed to unreadable
    pub fn is_format(&self) -> bool {
        matches!(
            self.kind,
            ParseErrorKind::Format { .. } | ParseErrorKind::Encoding(_)
        )
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(path) => write!(
                f,
                "Parse error in {} at line {}: {}",
                path.display(),
                self.line_num,
                self.kind
            ),
            None => write!(f, "Parse error at line {}: {}", self.line_num, self.kind),
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

/// CoNLL-U reader that iterates over sentences
///
/// Iteration stops after the first error.
pub struct CoNLLUReader<R: BufRead> {
    lines: Lines<R>,
    line_num: usize,
    config: ParserConfig,
    path: Option<PathBuf>,
    finished: bool,
}

impl<R: BufRead> CoNLLUReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_num: 0,
            config: ParserConfig::default(),
            path: None,
            finished: false,
        }
    }

    pub fn with_config(mut self, config: ParserConfig) -> Self {
        self.config = config;
        self
    }

    /// Attach a path to be reported in errors
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Read every remaining sentence into a [`Dataset`]
    pub fn into_dataset(self) -> Result<Dataset, ParseError> {
        let sents = self.collect::<Result<Vec<_>, _>>()?;
        Ok(Dataset::new(sents))
    }

    fn error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError {
            path: self.path.clone(),
            line_num: self.line_num,
            kind,
        }
    }
}

impl CoNLLUReader<Box<dyn BufRead>> {
    /// Create a reader from a file path
    ///
    /// Files ending in `.gz` are decompressed on the fly.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = File::open(path)?;
        let reader: Box<dyn BufRead> = if path.extension().is_some_and(|ext| ext == "gz") {
            Box::new(BufReader::new(MultiGzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };
        Ok(Self::new(reader).with_path(path))
    }
}

impl CoNLLUReader<Cursor<String>> {
    /// Create a reader from a string
    pub fn from_string(text: &str) -> Self {
        Self::new(Cursor::new(text.to_string()))
    }
}

impl<R: BufRead> Iterator for CoNLLUReader<R> {
    type Item = Result<Sentence, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let mut tokens = Vec::new();

        // Read lines until we hit a blank line (sentence boundary) or EOF
        loop {
            let line = match self.lines.next() {
                None => {
                    self.finished = true;
                    if tokens.is_empty() {
                        return None;
                    }
                    // Last sentence without trailing blank line
                    break;
                }
                Some(Err(e)) => {
                    self.finished = true;
                    self.line_num += 1;
                    let kind = match e.kind() {
                        ErrorKind::InvalidData => ParseErrorKind::Encoding(e),
                        _ => ParseErrorKind::Io(e),
                    };
                    return Some(Err(self.error(kind)));
                }
                Some(Ok(line)) => line,
            };
            self.line_num += 1;

            let trimmed = line.trim_end();
            if trimmed.is_empty() {
                if tokens.is_empty() {
                    continue;
                }
                break;
            }

            if trimmed.starts_with(self.config.comment_marker) {
                continue;
            }

            match parse_line(trimmed) {
                Ok(token) => tokens.push(token),
                Err(source) => {
                    self.finished = true;
                    let kind = ParseErrorKind::Format {
                        line: trimmed.to_string(),
                        source,
                    };
                    return Some(Err(self.error(kind)));
                }
            }
        }

        Some(Ok(Sentence::new(tokens)))
    }
}

/// Parse a single CoNLL-U token line
pub fn parse_line(line: &str) -> Result<Token, TokenError> {
    Token::from_fields(&split_fields(line)?)
}

/// Split a line on tabs into exactly ten columns
fn split_fields(line: &str) -> Result<[&str; 10], TokenError> {
    let mut fields = [""; CONLLU_FIELDS.len()];
    let mut found = 0;
    let mut start = 0;

    for end in memchr_iter(b'\t', line.as_bytes()).chain(std::iter::once(line.len())) {
        if found < fields.len() {
            fields[found] = &line[start..end];
        }
        found += 1;
        start = end + 1;
    }

    if found != fields.len() {
        return Err(TokenError::FieldCount { found });
    }
    Ok(fields)
}

/// Parse a CoNLL-U file into a [`Dataset`]
pub fn parse_file(path: impl AsRef<Path>) -> Result<Dataset, ParseError> {
    parse_file_with(path, ParserConfig::default())
}

/// Parse a CoNLL-U file with explicit reader settings
pub fn parse_file_with(path: impl AsRef<Path>, config: ParserConfig) -> Result<Dataset, ParseError> {
    let path = path.as_ref();
    let reader = CoNLLUReader::from_file(path).map_err(|e| ParseError {
        path: Some(path.to_path_buf()),
        line_num: 0,
        kind: ParseErrorKind::Io(e),
    })?;
    let dataset = reader.with_config(config).into_dataset()?;
    debug!("parsed {} sentences from {}", dataset.len(), path.display());
    Ok(dataset)
}

/// Parse in-memory CoNLL-U text into a [`Dataset`]
pub fn parse_str(text: &str) -> Result<Dataset, ParseError> {
    CoNLLUReader::from_string(text).into_dataset()
}
