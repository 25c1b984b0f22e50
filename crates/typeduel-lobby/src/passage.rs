//! Passage content: the texts players type and identify.
//!
//! Text retrieval lives in a separate service. The engine only sees the
//! [`PassageSource`] trait and treats every failure as recoverable: a
//! round that cannot load its passage is played with
//! [`PLACEHOLDER_TEXT`] instead of stalling the lobby.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Text shown when a passage could not be loaded.
pub const PLACEHOLDER_TEXT: &str = "Error loading verse. Please type this sentence instead.";

/// References used when the configuration does not supply a pool.
pub const DEFAULT_REFERENCE_POOL: &[&str] = &[
    "John 3:16",
    "Genesis 1:1",
    "Psalm 23:1",
    "Proverbs 3:5",
    "Philippians 4:13",
    "Romans 8:28",
    "Jeremiah 29:11",
    "Isaiah 40:31",
    "Matthew 5:9",
    "Joshua 1:9",
    "1 John 4:8",
    "Psalm 119:105",
    "Hebrews 11:1",
    "Matthew 6:33",
];

const KJV_SAMPLE: &[(&str, &str)] = &[
    ("John 3:16", "For God so loved the world, that he gave his only begotten Son, that whosoever believeth in him should not perish, but have everlasting life."),
    ("Genesis 1:1", "In the beginning God created the heaven and the earth."),
    ("Psalm 23:1", "The LORD is my shepherd; I shall not want."),
    ("Proverbs 3:5", "Trust in the LORD with all thine heart; and lean not unto thine own understanding."),
    ("Philippians 4:13", "I can do all things through Christ which strengtheneth me."),
    ("Romans 8:28", "And we know that all things work together for good to them that love God, to them who are the called according to his purpose."),
    ("Jeremiah 29:11", "For I know the thoughts that I think toward you, saith the LORD, thoughts of peace, and not of evil, to give you an expected end."),
    ("Isaiah 40:31", "But they that wait upon the LORD shall renew their strength; they shall mount up with wings as eagles; they shall run, and not be weary; and they shall walk, and not faint."),
    ("Matthew 5:9", "Blessed are the peacemakers: for they shall be called the children of God."),
    ("Joshua 1:9", "Have not I commanded thee? Be strong and of a good courage; be not afraid, neither be thou dismayed: for the LORD thy God is with thee whithersoever thou goest."),
    ("1 John 4:8", "He that loveth not knoweth not God; for God is love."),
    ("Psalm 119:105", "Thy word is a lamp unto my feet, and a light unto my path."),
    ("Hebrews 11:1", "Now faith is the substance of things hoped for, the evidence of things not seen."),
    ("Matthew 6:33", "But seek ye first the kingdom of God, and his righteousness; and all these things shall be added unto you."),
];

// ---------------------------------------------------------------------------
// Passage + errors
// ---------------------------------------------------------------------------

/// A resolved passage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    pub reference: String,
    pub text: String,
    pub copyright: Option<String>,
}

impl Passage {
    /// The passage used when the real one could not be loaded.
    pub fn placeholder(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            text: PLACEHOLDER_TEXT.to_string(),
            copyright: None,
        }
    }

    /// Whether this is the placeholder rather than real content.
    pub fn is_placeholder(&self) -> bool {
        self.text == PLACEHOLDER_TEXT
    }
}

/// Why a passage could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PassageError {
    /// No text could be resolved for the reference.
    #[error("no passage found for {0}")]
    NotFound(String),

    /// The upstream provider kept failing through the whole retry budget.
    #[error("passage provider unavailable after {attempts} attempts: {message}")]
    UpstreamUnavailable { attempts: u32, message: String },

    /// The selected provider needs a credential that is not configured.
    #[error("passage provider misconfigured: {0}")]
    Misconfigured(String),
}

/// Result alias for passage lookups.
pub type PassageResult<T> = Result<T, PassageError>;

// ---------------------------------------------------------------------------
// Versions
// ---------------------------------------------------------------------------

/// Which upstream serves a translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// Public-domain texts, no credential needed.
    Public,
    /// Licensed texts behind an API key.
    Keyed { bible_id: &'static str },
}

/// Supported translations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BibleVersion {
    Kjv,
    Web,
    Fbv,
    Icv,
    Ycv,
}

impl BibleVersion {
    /// Every supported version.
    pub const ALL: [BibleVersion; 5] = [Self::Kjv, Self::Web, Self::Fbv, Self::Icv, Self::Ycv];

    /// The short code clients and providers use.
    pub fn code(self) -> &'static str {
        match self {
            Self::Kjv => "KJV",
            Self::Web => "WEB",
            Self::Fbv => "FBV",
            Self::Icv => "ICV",
            Self::Ycv => "YCV",
        }
    }

    /// Parses a version code, ignoring case.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|v| v.code().eq_ignore_ascii_case(code.trim()))
    }

    /// The upstream that serves this version.
    pub fn provider(self) -> Provider {
        match self {
            Self::Kjv | Self::Web => Provider::Public,
            Self::Fbv => Provider::Keyed { bible_id: "65eec8e0b60e656b-01" },
            Self::Icv => Provider::Keyed { bible_id: "a36fc06b086699f1-02" },
            Self::Ycv => Provider::Keyed { bible_id: "b8d1feac6e94bd74-01" },
        }
    }

    /// Whether fetching this version needs an API credential.
    pub fn requires_credential(self) -> bool {
        matches!(self.provider(), Provider::Keyed { .. })
    }
}

impl fmt::Display for BibleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ---------------------------------------------------------------------------
// PassageSource
// ---------------------------------------------------------------------------

/// Abstraction over wherever passage text comes from.
pub trait PassageSource: Send + Sync {
    /// Resolves `reference` (a human reference or a provider passage code)
    /// in the given translation.
    fn fetch(
        &self,
        reference: &str,
        version: BibleVersion,
    ) -> BoxFuture<'static, PassageResult<Passage>>;
}

/// Shared handle type used by the engine.
pub type SharedPassageSource = Arc<dyn PassageSource>;

/// In-memory passage source.
///
/// Lookups ignore case. Keyed translations are refused with
/// [`PassageError::Misconfigured`] unless the source was built
/// [`with_credential`](Self::with_credential), mirroring the real
/// provider setup.
#[derive(Debug, Clone, Default)]
pub struct StaticPassages {
    texts: Arc<HashMap<String, Passage>>,
    has_credential: bool,
}

impl StaticPassages {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// A source holding KJV text for every reference in
    /// [`DEFAULT_REFERENCE_POOL`].
    pub fn kjv_sample() -> Self {
        KJV_SAMPLE
            .iter()
            .fold(Self::new(), |source, (reference, text)| {
                source.with_passage(*reference, *text)
            })
    }

    /// Adds (or replaces) a passage.
    pub fn with_passage(mut self, reference: impl Into<String>, text: impl Into<String>) -> Self {
        let reference = reference.into();
        let passage = Passage {
            text: normalize_text(&text.into()),
            reference: reference.clone(),
            copyright: None,
        };
        Arc::make_mut(&mut self.texts).insert(reference.to_lowercase(), passage);
        self
    }

    /// Marks the keyed-provider credential as configured.
    pub fn with_credential(mut self) -> Self {
        self.has_credential = true;
        self
    }

    /// The reference spelled as stored, if known.
    pub fn lookup(&self, reference: &str) -> Option<&Passage> {
        self.texts.get(&reference.trim().to_lowercase())
    }
}

impl PassageSource for StaticPassages {
    fn fetch(
        &self,
        reference: &str,
        version: BibleVersion,
    ) -> BoxFuture<'static, PassageResult<Passage>> {
        let result = if version.requires_credential() && !self.has_credential {
            Err(PassageError::Misconfigured(format!(
                "{version} needs an API key"
            )))
        } else {
            self.lookup(reference)
                .cloned()
                .ok_or_else(|| PassageError::NotFound(reference.to_string()))
        };
        Box::pin(async move { result })
    }
}

// ---------------------------------------------------------------------------
// Text clean-up
// ---------------------------------------------------------------------------

/// Strips markup tags and collapses runs of whitespace into single spaces.
///
/// Providers return verse text wrapped in HTML with verse-number spans and
/// line breaks; players must only ever see the plain words. Only complete,
/// non-empty `<...>` runs count as tags and they are removed outright, so
/// inline markup never splits a word. A `<` with no closing `>` is text.
pub fn normalize_text(raw: &str) -> String {
    let mut plain = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(open) = rest.find('<') {
        plain.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('>') {
            Some(close) if close > 0 => rest = &after[close + 1..],
            _ => {
                plain.push('<');
                rest = after;
            }
        }
    }
    plain.push_str(rest);
    plain.split_whitespace().collect::<Vec<_>>().join(" ")
}
