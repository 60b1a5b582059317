//! Token and sentence records
//!
//! A [`Token`] is one row of a CoNLL-U file and a [`Sentence`] is the ordered
//! run of tokens that forms one dependency tree. Multiword range rows carry
//! no head and never make it into a sentence.

use std::fmt;
use std::ops::Index;

use atoi::FromRadix10SignedChecked;
use thiserror::Error;

/// Symbol standing in for the artificial root node in word and tag views
pub const ROOT: &str = "__ROOT__";

/// Head value used when the HEAD column holds the `_` placeholder
pub const NO_HEAD: i64 = -1;

/// Column names of a CoNLL-U row, in file order
pub const CONLLU_FIELDS: [&str; 10] = [
    "id", "form", "lemma", "upostag", "xpostag", "feats", "head", "deprel", "deps", "misc",
];

/// Error building a token from raw column values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("expected 10 fields, found {found}")]
    FieldCount { found: usize },
    #[error("invalid HEAD value {0:?}")]
    InvalidHead(String),
}

/// Bulk update given a different number of values than there are tokens
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("sentence has {expected} tokens but {found} values were given")]
pub struct LengthMismatch {
    pub expected: usize,
    pub found: usize,
}

/// One row of a CoNLL-U file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Word index, or a range such as `4-5` for multiword tokens
    pub id: String,
    pub form: String,
    pub lemma: String,
    pub upostag: String,
    pub xpostag: String,
    pub feats: String,
    /// Index of the head word, 0 for the root and [`NO_HEAD`] for `_`
    pub head: i64,
    pub deprel: String,
    pub deps: String,
    pub misc: String,
}

impl Token {
    /// Build a token from exactly ten column values in [`CONLLU_FIELDS`] order
    pub fn from_fields<S: AsRef<str>>(fields: &[S]) -> Result<Self, TokenError> {
        let [id, form, lemma, upostag, xpostag, feats, head, deprel, deps, misc] = fields else {
            return Err(TokenError::FieldCount {
                found: fields.len(),
            });
        };

        Ok(Self {
            id: id.as_ref().to_string(),
            form: form.as_ref().to_string(),
            lemma: lemma.as_ref().to_string(),
            upostag: upostag.as_ref().to_string(),
            xpostag: xpostag.as_ref().to_string(),
            feats: feats.as_ref().to_string(),
            head: parse_head(head.as_ref())?,
            deprel: deprel.as_ref().to_string(),
            deps: deps.as_ref().to_string(),
            misc: misc.as_ref().to_string(),
        })
    }

    /// True for multiword range rows (`4-5`)
    pub fn is_multiword(&self) -> bool {
        self.id.contains('-')
    }

    /// True for enhanced-dependency empty nodes (`8.1`)
    pub fn is_empty_node(&self) -> bool {
        self.id.contains('.')
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.id,
            self.form,
            self.lemma,
            self.upostag,
            self.xpostag,
            self.feats,
            self.head,
            self.deprel,
            self.deps,
            self.misc
        )
    }
}

/// Parse HEAD field (`_` or a decimal integer)
fn parse_head(s: &str) -> Result<i64, TokenError> {
    if s == "_" {
        return Ok(NO_HEAD);
    }
    if !s.bytes().any(|b| b.is_ascii_digit()) {
        return Err(TokenError::InvalidHead(s.to_string()));
    }
    match i64::from_radix_10_signed_checked(s.as_bytes()) {
        (Some(head), used) if used == s.len() => Ok(head),
        _ => Err(TokenError::InvalidHead(s.to_string())),
    }
}

/// A dependency tree (sentence)
///
/// Position in the token list (1-based) is the node id used by the head
/// column, regardless of the literal `id` field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sentence {
    tokens: Vec<Token>,
}

impl Sentence {
    /// Create a sentence, dropping tokens without a head
    pub fn new(tokens: impl IntoIterator<Item = Token>) -> Self {
        Self {
            tokens: tokens.into_iter().filter(|t| t.head != NO_HEAD).collect(),
        }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Token> {
        self.tokens.iter()
    }

    /// Word forms with [`ROOT`] in front
    pub fn words(&self) -> Vec<&str> {
        with_root(self.tokens.iter().map(|t| t.form.as_str()))
    }

    pub fn heads(&self) -> Vec<i64> {
        self.tokens.iter().map(|t| t.head).collect()
    }

    /// Dependency relations with any `:subtype` removed
    pub fn arctags(&self) -> Vec<&str> {
        self.tokens
            .iter()
            .map(|t| t.deprel.split(':').next().unwrap_or_default())
            .collect()
    }

    /// Universal POS tags with [`ROOT`] in front
    pub fn upostags(&self) -> Vec<&str> {
        with_root(self.tokens.iter().map(|t| t.upostag.as_str()))
    }

    /// Language-specific POS tags with [`ROOT`] in front
    pub fn xpostags(&self) -> Vec<&str> {
        with_root(self.tokens.iter().map(|t| t.xpostag.as_str()))
    }

    /// Distance in words between each token and its head
    ///
    /// Attachment to the root counts as distance 1.
    pub fn arc_lengths(&self) -> Vec<usize> {
        self.tokens
            .iter()
            .zip(1i64..)
            .map(|(t, index)| match t.head {
                0 => 1,
                head => (head - index).unsigned_abs() as usize,
            })
            .collect()
    }

    /// Replace every head, one value per token in order
    pub fn set_heads(&mut self, heads: &[i64]) -> Result<(), LengthMismatch> {
        self.check_len(heads.len())?;
        for (token, &head) in self.tokens.iter_mut().zip(heads) {
            token.head = head;
        }
        Ok(())
    }

    /// Replace every dependency relation, one label per token in order
    pub fn set_labels<S: AsRef<str>>(&mut self, labels: &[S]) -> Result<(), LengthMismatch> {
        self.check_len(labels.len())?;
        for (token, label) in self.tokens.iter_mut().zip(labels) {
            token.deprel = label.as_ref().to_string();
        }
        Ok(())
    }

    fn check_len(&self, found: usize) -> Result<(), LengthMismatch> {
        if found != self.tokens.len() {
            return Err(LengthMismatch {
                expected: self.tokens.len(),
                found,
            });
        }
        Ok(())
    }
}

fn with_root<'a>(values: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    std::iter::once(ROOT).chain(values).collect()
}

impl Index<usize> for Sentence {
    type Output = Token;

    fn index(&self, index: usize) -> &Token {
        &self.tokens[index]
    }
}

impl<'a> IntoIterator for &'a Sentence {
    type Item = &'a Token;
    type IntoIter = std::slice::Iter<'a, Token>;

    fn into_iter(self) -> Self::IntoIter {
        self.tokens.iter()
    }
}

impl fmt::Display for Sentence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut forms = self.tokens.iter().map(|t| t.form.as_str());
        if let Some(first) = forms.next() {
            f.write_str(first)?;
            for form in forms {
                write!(f, " {}", form)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(line: &str) -> Token {
        let fields: Vec<&str> = line.split('\t').collect();
        Token::from_fields(&fields).unwrap()
    }

    fn dog_runs() -> Sentence {
        Sentence::new(vec![
            token("1\tThe\tthe\tDET\tDT\t_\t2\tdet\t_\t_"),
            token("2\tdog\tdog\tNOUN\tNN\t_\t3\tnsubj:pass\t_\t_"),
            token("3\truns\trun\tVERB\tVBZ\t_\t0\troot\t_\tSpaceAfter=No"),
            token("4\t.\t.\tPUNCT\t.\t_\t3\tpunct\t_\t_"),
        ])
    }

    #[test]
    fn test_token_from_fields() {
        let t = token("3\truns\trun\tVERB\tVBZ\tNumber=Sing\t0\troot\t_\tSpaceAfter=No");

        assert_eq!(t.id, "3");
        assert_eq!(t.form, "runs");
        assert_eq!(t.lemma, "run");
        assert_eq!(t.upostag, "VERB");
        assert_eq!(t.xpostag, "VBZ");
        assert_eq!(t.feats, "Number=Sing");
        assert_eq!(t.head, 0);
        assert_eq!(t.deprel, "root");
        assert_eq!(t.deps, "_");
        assert_eq!(t.misc, "SpaceAfter=No");
    }

    #[test]
    fn test_token_field_count() {
        let err = Token::from_fields(&["1", "The", "the"]).unwrap_err();
        assert_eq!(err, TokenError::FieldCount { found: 3 });

        let eleven = ["_"; 11];
        assert_eq!(
            Token::from_fields(&eleven).unwrap_err(),
            TokenError::FieldCount { found: 11 }
        );
    }

    #[test]
    fn test_token_head_placeholder() {
        let t = token("4-5\tdella\t_\t_\t_\t_\t_\t_\t_\t_");
        assert_eq!(t.head, NO_HEAD);
        assert!(t.is_multiword());
        assert!(!t.is_empty_node());
    }

    #[test]
    fn test_token_invalid_head() {
        let fields = ["1", "a", "a", "X", "X", "_", "two", "dep", "_", "_"];
        assert_eq!(
            Token::from_fields(&fields).unwrap_err(),
            TokenError::InvalidHead("two".to_string())
        );

        for bad in ["", "-", "3a", "1.5"] {
            let mut fields = fields;
            fields[6] = bad;
            assert!(Token::from_fields(&fields).is_err(), "{bad:?} accepted");
        }
    }

    #[test]
    fn test_token_display() {
        let line = "2\tdog\tdog\tNOUN\tNN\t_\t3\tnsubj\t_\t_";
        assert_eq!(token(line).to_string(), line);

        // `_` heads are written back as the sentinel value
        let mwt = token("4-5\tdella\t_\t_\t_\t_\t_\t_\t_\t_");
        assert_eq!(mwt.to_string(), "4-5\tdella\t_\t_\t_\t_\t-1\t_\t_\t_");
    }

    #[test]
    fn test_sentence_drops_multiword_rows() {
        let sent = Sentence::new(vec![
            token("1-2\tdella\t_\t_\t_\t_\t_\t_\t_\t_"),
            token("1\tdi\tdi\tADP\tE\t_\t3\tcase\t_\t_"),
            token("2\tla\til\tDET\tRD\t_\t3\tdet\t_\t_"),
            token("3\tcasa\tcasa\tNOUN\tS\t_\t0\troot\t_\t_"),
        ]);

        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].form, "di");
        assert_eq!(sent.to_string(), "di la casa");
    }

    #[test]
    fn test_sentence_all_filtered_is_empty() {
        let sent = Sentence::new(vec![token("1-2\tdella\t_\t_\t_\t_\t_\t_\t_\t_")]);
        assert!(sent.is_empty());
        assert_eq!(sent.words(), vec![ROOT]);
        assert!(sent.arc_lengths().is_empty());
        assert_eq!(sent.to_string(), "");
    }

    #[test]
    fn test_sentence_views() {
        let sent = dog_runs();

        assert_eq!(sent.words(), vec![ROOT, "The", "dog", "runs", "."]);
        assert_eq!(sent.heads(), vec![2, 3, 0, 3]);
        assert_eq!(sent.arctags(), vec!["det", "nsubj", "root", "punct"]);
        assert_eq!(sent.upostags(), vec![ROOT, "DET", "NOUN", "VERB", "PUNCT"]);
        assert_eq!(sent.xpostags(), vec![ROOT, "DT", "NN", "VBZ", "."]);
    }

    #[test]
    fn test_arc_lengths() {
        let sent = dog_runs();
        // The->dog 1, dog->runs 1, runs->ROOT 1, .->runs 1
        assert_eq!(sent.arc_lengths(), vec![1, 1, 1, 1]);

        let sent = Sentence::new(vec![
            token("1\tA\ta\tX\tX\t_\t4\tdep\t_\t_"),
            token("2\tB\tb\tX\tX\t_\t0\troot\t_\t_"),
            token("3\tC\tc\tX\tX\t_\t1\tdep\t_\t_"),
            token("4\tD\td\tX\tX\t_\t2\tdep\t_\t_"),
        ]);
        for (i, (&head, &len)) in sent.heads().iter().zip(&sent.arc_lengths()).enumerate() {
            if head == 0 {
                assert_eq!(len, 1);
            } else {
                assert_eq!(len as i64, (head - (i as i64 + 1)).abs());
            }
        }
        assert_eq!(sent.arc_lengths(), vec![3, 1, 2, 2]);
    }

    #[test]
    fn test_set_heads_and_labels() {
        let mut sent = dog_runs();

        sent.set_heads(&[3, 3, 0, 3]).unwrap();
        sent.set_labels(&["nsubj", "obj", "root", "punct"]).unwrap();

        assert_eq!(sent.heads(), vec![3, 3, 0, 3]);
        assert_eq!(sent.arctags(), vec!["nsubj", "obj", "root", "punct"]);
    }

    #[test]
    fn test_set_heads_length_mismatch() {
        let mut sent = dog_runs();

        let err = sent.set_heads(&[1, 2]).unwrap_err();
        assert_eq!(
            err,
            LengthMismatch {
                expected: 4,
                found: 2
            }
        );
        // Nothing was applied
        assert_eq!(sent.heads(), vec![2, 3, 0, 3]);

        let labels = vec!["a".to_string(); 5];
        assert!(sent.set_labels(&labels).is_err());
        assert_eq!(sent[0].deprel, "det");
    }
}
