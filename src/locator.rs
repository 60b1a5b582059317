//! Treebank file discovery
//!
//! Resolves a language name to the training or development file of a
//! treebank distribution. Two layouts are supported behind the
//! [`CorpusLocator`] trait:
//!
//! - [`UdLocator`]: Universal Dependencies releases, one `UD_<Language>`
//!   folder per treebank, possibly spread over several roots.
//! - [`FlatLocator`]: a single folder of `<lang>-ud-train.conllu` /
//!   `<lang>-ud-dev.conllu` files, as in the older shared-task bundles.

use crate::conllu::{ParseError, parse_file};
use crate::dataset::Dataset;
use log::debug;
use regex::Regex;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

/// Environment variable holding one or more treebank roots
pub const DATA_ENV_VAR: &str = "DEPBANK_DATA";

/// Folder names of UD treebanks
pub const LANG_FOLDER_PATTERN: &str = r"^UD_(?P<lang>[A-Za-z\-_]+)";

static LANG_FOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(LANG_FOLDER_PATTERN).expect("valid folder pattern"));

/// Which part of a treebank to load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Split {
    Train,
    Dev,
}

impl Split {
    /// File name ending identifying this split
    pub fn suffix(self) -> &'static str {
        match self {
            Split::Train => "ud-train.conllu",
            Split::Dev => "ud-dev.conllu",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Split::Train => f.write_str("train"),
            Split::Dev => f.write_str("dev"),
        }
    }
}

/// Error resolving a treebank file
#[derive(Debug, Error)]
pub enum LocatorError {
    #[error("no treebank root given and DEPBANK_DATA is not set")]
    NoRoot,
    #[error("no language folders found in {}", .0.display())]
    NoLanguages(PathBuf),
    #[error("no {split} file found for language {lang:?}")]
    NotFound { lang: String, split: Split },
    #[error("IO error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Error locating or parsing a treebank file
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Locate(#[from] LocatorError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Resolves languages to treebank files
pub trait CorpusLocator {
    /// Languages available, sorted
    fn langs(&self) -> Vec<&str>;

    /// Path of the `split` file for `lang`
    fn locate(&self, lang: &str, split: Split) -> Result<PathBuf, LocatorError>;

    /// Name recorded on datasets loaded for `lang`
    fn corpus_name(&self, lang: &str) -> String;

    /// Parse the `split` file for `lang`, labelled with language and corpus name
    fn load(&self, lang: &str, split: Split) -> Result<Dataset, LoadError> {
        let path = self.locate(lang, split)?;
        let dataset = parse_file(&path)?;
        debug!("loaded {} sentences from {}", dataset.len(), path.display());
        Ok(dataset.with_lang(lang).with_name(self.corpus_name(lang)))
    }

    fn load_train(&self, lang: &str) -> Result<Dataset, LoadError> {
        self.load(lang, Split::Train)
    }

    fn load_dev(&self, lang: &str) -> Result<Dataset, LoadError> {
        self.load(lang, Split::Dev)
    }
}

fn read_dir_names(dir: &Path) -> Result<Vec<(String, PathBuf)>, LocatorError> {
    let io_err = |source| LocatorError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        match entry.file_name().into_string() {
            Ok(name) => names.push((name, entry.path())),
            Err(name) => debug!("skipping non-UTF-8 entry {:?} in {}", name, dir.display()),
        }
    }
    names.sort();
    Ok(names)
}

/// Last component of `path`, resolving `.` and `..` against the filesystem
fn dir_name(path: &Path) -> String {
    let resolved = match path.file_name() {
        Some(_) => None,
        None => fs::canonicalize(path).ok(),
    };
    resolved
        .as_deref()
        .unwrap_or(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[derive(Debug, Clone)]
struct LangFolder {
    path: PathBuf,
    corpus: String,
}

/// Locator for Universal Dependencies release folders
#[derive(Debug, Clone)]
pub struct UdLocator {
    roots: Vec<PathBuf>,
    lang_folders: BTreeMap<String, LangFolder>,
}

impl UdLocator {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, LocatorError> {
        Self::from_roots([root.into()])
    }

    /// Use the roots listed in [`DATA_ENV_VAR`]
    pub fn from_env() -> Result<Self, LocatorError> {
        Self::from_roots(roots_from_env(std::env::var_os(DATA_ENV_VAR))?)
    }

    /// Scan several roots; a language found in an earlier root wins
    pub fn from_roots(roots: impl IntoIterator<Item = PathBuf>) -> Result<Self, LocatorError> {
        let roots: Vec<PathBuf> = roots.into_iter().collect();
        let Some(first) = roots.first() else {
            return Err(LocatorError::NoRoot);
        };

        let mut lang_folders = BTreeMap::new();
        for root in &roots {
            let corpus = dir_name(root);
            for (name, path) in read_dir_names(root)? {
                let Some(lang) = LANG_FOLDER.captures(&name).map(|c| c["lang"].to_string()) else {
                    continue;
                };
                if !path.is_dir() {
                    continue;
                }
                lang_folders.entry(lang).or_insert_with(|| LangFolder {
                    path,
                    corpus: corpus.clone(),
                });
            }
        }

        if lang_folders.is_empty() {
            return Err(LocatorError::NoLanguages(first.clone()));
        }
        debug!(
            "found {} UD languages under {} roots",
            lang_folders.len(),
            roots.len()
        );
        Ok(Self {
            roots,
            lang_folders,
        })
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

/// Split an environment value into root paths
fn roots_from_env(value: Option<OsString>) -> Result<Vec<PathBuf>, LocatorError> {
    let value = value.ok_or(LocatorError::NoRoot)?;
    let roots: Vec<PathBuf> = std::env::split_paths(&value)
        .filter(|p| !p.as_os_str().is_empty())
        .collect();
    if roots.is_empty() {
        return Err(LocatorError::NoRoot);
    }
    Ok(roots)
}

impl CorpusLocator for UdLocator {
    fn langs(&self) -> Vec<&str> {
        self.lang_folders.keys().map(String::as_str).collect()
    }

    fn locate(&self, lang: &str, split: Split) -> Result<PathBuf, LocatorError> {
        let not_found = || LocatorError::NotFound {
            lang: lang.to_string(),
            split,
        };
        let folder = self.lang_folders.get(lang).ok_or_else(not_found)?;
        read_dir_names(&folder.path)?
            .into_iter()
            .find(|(name, _)| name.ends_with(split.suffix()))
            .map(|(_, path)| path)
            .ok_or_else(not_found)
    }

    fn corpus_name(&self, lang: &str) -> String {
        self.lang_folders
            .get(lang)
            .map(|folder| folder.corpus.clone())
            .unwrap_or_default()
    }
}

/// Locator for a single folder of `<lang>-ud-<split>.conllu` files
#[derive(Debug, Clone)]
pub struct FlatLocator {
    dir: PathBuf,
    langs: BTreeMap<String, Vec<Split>>,
}

impl FlatLocator {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, LocatorError> {
        let dir = dir.into();
        let mut langs: BTreeMap<String, Vec<Split>> = BTreeMap::new();

        for (name, _) in read_dir_names(&dir)? {
            for split in [Split::Train, Split::Dev] {
                let lang = name
                    .strip_suffix(split.suffix())
                    .and_then(|rest| rest.strip_suffix('-'))
                    .filter(|lang| !lang.is_empty());
                if let Some(lang) = lang {
                    langs.entry(lang.to_string()).or_default().push(split);
                }
            }
        }

        if langs.is_empty() {
            return Err(LocatorError::NoLanguages(dir));
        }
        debug!("found {} languages in {}", langs.len(), dir.display());
        Ok(Self { dir, langs })
    }
}

impl CorpusLocator for FlatLocator {
    fn langs(&self) -> Vec<&str> {
        self.langs.keys().map(String::as_str).collect()
    }

    fn locate(&self, lang: &str, split: Split) -> Result<PathBuf, LocatorError> {
        match self.langs.get(lang) {
            Some(splits) if splits.contains(&split) => {
                Ok(self.dir.join(format!("{}-{}", lang, split.suffix())))
            }
            _ => Err(LocatorError::NotFound {
                lang: lang.to_string(),
                split,
            }),
        }
    }

    fn corpus_name(&self, _lang: &str) -> String {
        dir_name(&self.dir)
    }
}
