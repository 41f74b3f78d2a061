//! Key-path grammar for flattened metadata.
//!
//! A flattened key is the path from the root of a structure to one leaf:
//!
//! - `$` alone is the root itself (only used when the root is a leaf).
//! - Mapping keys are joined with `.`; the first key has no leading dot.
//! - Sequence positions are written as `[n]` directly after their parent;
//!   a path that starts with a position is anchored at the root (`$[0]`).
//! - Inside a mapping key, `\`, `.`, `[`, `]` and `$` are escaped with `\`.
//! - A path has at most [`MAX_DEPTH`] segments.
//!
//! `{"addons": [{"slug": "a.b"}]}` therefore flattens to the single key
//! `addons[0].slug` while the mapping key `a.b` would be written `a\.b`.

use super::CodecError;

/// Key used when the whole structure is a single leaf.
pub const ROOT_KEY: &str = "$";

/// Deepest path accepted by [`parse_key`], matching serde_json's own
/// recursion limit.
pub const MAX_DEPTH: usize = 128;

/// Characters that must be escaped inside a mapping key.
const RESERVED: [char; 5] = ['\\', '.', '[', ']', '$'];

/// One step of a path through a nested structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Entry of a mapping.
    Key(String),
    /// Position in a sequence.
    Index(usize),
}

/// Renders a path as a flattened key.
pub fn encode_path(segments: &[PathSegment]) -> String {
    if segments.is_empty() {
        return ROOT_KEY.to_string();
    }

    let mut out = String::new();
    if matches!(segments.first(), Some(PathSegment::Index(_))) {
        out.push_str(ROOT_KEY);
    }
    for (i, segment) in segments.iter().enumerate() {
        match segment {
            PathSegment::Key(name) => {
                if i > 0 {
                    out.push('.');
                }
                for c in name.chars() {
                    if RESERVED.contains(&c) {
                        out.push('\\');
                    }
                    out.push(c);
                }
            },
            PathSegment::Index(index) => {
                out.push('[');
                out.push_str(&index.to_string());
                out.push(']');
            },
        }
    }
    out
}

/// Parses a flattened key back into its path.
///
/// # Errors
///
/// Returns [`CodecError::InvalidKey`] for dangling escapes, unescaped
/// reserved characters, malformed or non-canonical indices and paths deeper
/// than [`MAX_DEPTH`].
pub fn parse_key(key: &str) -> Result<Vec<PathSegment>, CodecError> {
    if key == ROOT_KEY {
        return Ok(Vec::new());
    }

    let invalid = |reason: &'static str| CodecError::InvalidKey {
        key: key.to_string(),
        reason,
    };

    let mut segments = Vec::new();
    let mut chars = key.chars().peekable();
    let mut expect_key = true;

    if let Some(rest) = key.strip_prefix(ROOT_KEY) {
        if !rest.starts_with('[') {
            return Err(invalid("root marker must precede a sequence index"));
        }
        chars.next();
        expect_key = false;
    }

    loop {
        if expect_key {
            let mut name = String::new();
            while let Some(&c) = chars.peek() {
                match c {
                    '.' | '[' => break,
                    ']' | '$' => return Err(invalid("unescaped reserved character")),
                    '\\' => {
                        chars.next();
                        match chars.next() {
                            Some(escaped) if RESERVED.contains(&escaped) => name.push(escaped),
                            _ => return Err(invalid("dangling escape")),
                        }
                    },
                    _ => {
                        name.push(c);
                        chars.next();
                    },
                }
            }
            segments.push(PathSegment::Key(name));
            if segments.len() > MAX_DEPTH {
                return Err(invalid("path is too deep"));
            }
        }

        match chars.next() {
            None => break,
            Some('.') => expect_key = true,
            Some('[') => {
                let mut digits = String::new();
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some(d) if d.is_ascii_digit() => digits.push(d),
                        _ => return Err(invalid("malformed sequence index")),
                    }
                }
                if digits.is_empty() || (digits.len() > 1 && digits.starts_with('0')) {
                    return Err(invalid("non-canonical sequence index"));
                }
                let index = digits
                    .parse::<usize>()
                    .map_err(|_| invalid("sequence index out of range"))?;
                segments.push(PathSegment::Index(index));
                if segments.len() > MAX_DEPTH {
                    return Err(invalid("path is too deep"));
                }
                expect_key = false;
            },
            Some(_) => return Err(invalid("unexpected character after sequence index")),
        }
    }

    Ok(segments)
}
