//! RFC 6901 JSON pointers

use serde::{Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;

/// One reference token of a pointer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PointerSegment {
    /// Object member name
    Key(String),
    /// Array position
    Index(usize),
}

/// Pointer assembled segment by segment during a walk
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct JsonPointer {
    segments: Vec<PointerSegment>,
}

/// Escape a reference token (`~` becomes `~0`, `/` becomes `~1`)
pub fn escape_token(token: &str) -> Cow<'_, str> {
    if token.contains(['~', '/']) {
        Cow::Owned(token.replace('~', "~0").replace('/', "~1"))
    } else {
        Cow::Borrowed(token)
    }
}

/// Reverse of [`escape_token`]
pub fn unescape_token(token: &str) -> Cow<'_, str> {
    if token.contains('~') {
        Cow::Owned(token.replace("~1", "/").replace("~0", "~"))
    } else {
        Cow::Borrowed(token)
    }
}

impl JsonPointer {
    /// The whole-document pointer (`""`)
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a pointer string
    ///
    /// Tokens made only of ASCII digits (without a leading zero) become
    /// [`PointerSegment::Index`]; everything else is a key.
    pub fn parse(pointer: &str) -> Option<Self> {
        if pointer.is_empty() {
            return Some(Self::root());
        }
        let rest = pointer.strip_prefix('/')?;
        let segments = rest
            .split('/')
            .map(|raw| {
                let token = unescape_token(raw);
                match token.parse::<usize>() {
                    Ok(n) if token == "0" || !token.starts_with('0') => PointerSegment::Index(n),
                    _ => PointerSegment::Key(token.into_owned()),
                }
            })
            .collect();
        Some(Self { segments })
    }

    /// Append a member name
    pub fn push_key(&mut self, key: impl Into<String>) {
        self.segments.push(PointerSegment::Key(key.into()));
    }

    /// Append an array position
    pub fn push_index(&mut self, index: usize) {
        self.segments.push(PointerSegment::Index(index));
    }

    /// Remove the last segment
    pub fn pop(&mut self) -> Option<PointerSegment> {
        self.segments.pop()
    }

    /// Segments in order
    pub fn segments(&self) -> &[PointerSegment] {
        &self.segments
    }

    /// True for the whole-document pointer
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for PointerSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointerSegment::Key(key) => write!(f, "{}", escape_token(key)),
            PointerSegment::Index(n) => write!(f, "{n}"),
        }
    }
}

impl fmt::Display for JsonPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl Serialize for JsonPointer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
