use std::{
    fmt,
    path::{Component, Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// File extension of every document in the mirror and upstream.
pub const DOC_EXTENSION: &str = "md";

/// Alternate form of a leaf document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Variant {
    #[default]
    Basic,
    Detail,
    Install,
}

impl Variant {
    fn suffix(self) -> Option<&'static str> {
        match self {
            Variant::Basic => None,
            Variant::Detail => Some("detail"),
            Variant::Install => Some("install"),
        }
    }

    /// Human label used when listing queued documents.
    pub fn label(self) -> Option<&'static str> {
        match self {
            Variant::Basic => None,
            Variant::Detail => Some("detailed"),
            Variant::Install => Some("install"),
        }
    }

    /// Noun used when a requested variant is missing ("no installation
    /// write-up").
    pub fn write_up(self) -> Option<&'static str> {
        match self {
            Variant::Basic => None,
            Variant::Detail => Some("detailed"),
            Variant::Install => Some("installation"),
        }
    }
}

/// Identifier of one document resource: topic segments plus a variant.
///
/// The text form joins segments with `/` and appends `.detail` or
/// `.install` for variants, e.g. `git/commit.detail`. On disk the
/// resource lives at the text form plus `.md`.
///
/// # Examples
///
/// ```
/// use cheatdex::doc_path::{DocPath, Variant};
///
/// let path: DocPath = "git/commit.detail".parse().unwrap();
/// assert_eq!(path.segments(), ["git", "commit"]);
/// assert_eq!(path.variant(), Variant::Detail);
/// assert_eq!(path.command(), "git commit");
/// ```
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct DocPath {
    segments: Vec<String>,
    variant: Variant,
}

impl DocPath {
    pub fn new(segments: Vec<String>, variant: Variant) -> Result<Self> {
        if segments.is_empty() {
            return Err(Error::InvalidPath("empty path".into()));
        }
        for segment in &segments {
            if segment.is_empty()
                || segment == "."
                || segment == ".."
                || segment.contains('/')
                || segment.contains(char::is_whitespace)
            {
                return Err(Error::InvalidPath(segments.join("/")));
            }
        }
        Ok(Self { segments, variant })
    }

    /// Recover a resource identifier from a mirror-relative file path
    /// such as `git/commit.detail.md`. Returns `None` for anything that
    /// is not a document.
    pub fn from_file(relative: &Path) -> Option<Self> {
        if relative.extension()?.to_str()? != DOC_EXTENSION {
            return None;
        }
        let mut segments = Vec::new();
        for component in relative.with_extension("").components() {
            match component {
                Component::Normal(part) => {
                    segments.push(part.to_str()?.to_string());
                }
                _ => return None,
            }
        }
        Self::parse(&segments.join("/")).ok()
    }

    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim().trim_matches('/');
        let (stem, variant) = if let Some(stem) = text.strip_suffix(".detail")
        {
            (stem, Variant::Detail)
        } else if let Some(stem) = text.strip_suffix(".install") {
            (stem, Variant::Install)
        } else {
            (text, Variant::Basic)
        };
        let segments = stem.split('/').map(str::to_string).collect();
        Self::new(segments, variant)
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Topic path without the variant suffix (`git/commit`).
    pub fn topic(&self) -> String {
        self.segments.join("/")
    }

    /// Space-separated form the user types (`git commit`).
    pub fn command(&self) -> String {
        self.segments.join(" ")
    }

    /// Command plus a variant label, e.g. `git commit (detailed)`.
    pub fn describe(&self) -> String {
        match self.variant.label() {
            Some(label) => format!("{} ({label})", self.command()),
            None => self.command(),
        }
    }

    /// Relative file path of the resource inside a mirror or upstream.
    pub fn file_path(&self) -> PathBuf {
        let mut path: PathBuf = self.segments.iter().collect();
        let mut name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if let Some(suffix) = self.variant.suffix() {
            name.push('.');
            name.push_str(suffix);
        }
        name.push('.');
        name.push_str(DOC_EXTENSION);
        path.set_file_name(name);
        path
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.topic())?;
        if let Some(suffix) = self.variant.suffix() {
            write!(f, ".{suffix}")?;
        }
        Ok(())
    }
}

impl FromStr for DocPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DocPath {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<DocPath> for String {
    fn from(value: DocPath) -> Self {
        value.to_string()
    }
}
