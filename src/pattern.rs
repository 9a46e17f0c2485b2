//! Route pattern compilation and structural matching.
//!
//! A pattern such as `/users/{id}/posts/{post_id}` compiles to
//!
//! ```text
//! [Literal("users"), Capture("id"), Literal("posts"), Capture("post_id")]
//! ```
//!
//! Matching is segment-by-segment: the counts must agree, literals compare
//! byte-for-byte, and a capture takes one whole non-empty segment. A
//! `{name:type}` capture is accepted but the type is not checked.

use std::collections::HashMap;
use std::fmt;

/// One `/`-separated piece of a compiled pattern.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum Segment {
    Literal(String),
    Capture(String),
}

/// Why a pattern was rejected.
#[derive(Debug, Eq, PartialEq)]
pub(crate) enum PatternError {
    EmptyCapture,
    DuplicateCapture(String),
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyCapture => f.write_str("capture with an empty name"),
            Self::DuplicateCapture(name) => write!(f, "capture `{name}` appears more than once"),
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Pattern {
    segments: Vec<Segment>,
}

impl Pattern {
    /// Compiles a resolved path. Empty pieces (leading, trailing or doubled
    /// slashes) are skipped, so `""` and `"/"` both compile to the root.
    pub(crate) fn compile(path: &str) -> Result<Self, PatternError> {
        let mut segments = Vec::new();
        for piece in path.split('/').filter(|p| !p.is_empty()) {
            let segment = match piece.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                Some(inner) => {
                    let name = inner.split_once(':').map_or(inner, |(name, _ty)| name);
                    if name.is_empty() {
                        return Err(PatternError::EmptyCapture);
                    }
                    if segments.contains(&Segment::Capture(name.to_owned())) {
                        return Err(PatternError::DuplicateCapture(name.to_owned()));
                    }
                    Segment::Capture(name.to_owned())
                }
                None => Segment::Literal(piece.to_owned()),
            };
            segments.push(segment);
        }
        Ok(Self { segments })
    }

    /// Matches `path` and returns the bound captures.
    ///
    /// `path` must start with `/`. The root path `/` has zero segments.
    pub(crate) fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let rest = path.strip_prefix('/')?;
        let mut pieces = rest.split('/');
        if rest.is_empty() {
            // "/" → zero segments
            pieces.next();
        }

        let mut params = HashMap::new();
        let mut expected = self.segments.iter();
        loop {
            match (expected.next(), pieces.next()) {
                (None, None) => return Some(params),
                (Some(Segment::Literal(lit)), Some(piece)) if lit == piece => {}
                (Some(Segment::Capture(name)), Some(piece)) if !piece.is_empty() => {
                    params.insert(name.clone(), piece.to_owned());
                }
                _ => return None,
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn segments(&self) -> &[Segment] { &self.segments }
}
