//! BIP-32 derivation paths: parse, render, compare, truncate and append.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

const HARDENED_FLAG: u32 = 0x8000_0000;

/// A derivation path failed to parse.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid key path: {0}")]
pub struct KeyPathError(pub String);

/// A persistent, immutable sequence of BIP-32 child indices, with an
/// `is_rooted` flag recording whether it is anchored at `m`.
///
/// Cloning is cheap: the step list is reference-counted and every mutating
/// operation (`append`, `truncate`) returns a new value rather than
/// modifying the receiver.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeyPath {
    steps: Arc<Vec<u32>>,
    is_rooted: bool,
}

impl KeyPath {
    /// The root path `m` (zero steps, rooted).
    pub fn root() -> Self {
        KeyPath {
            steps: Arc::new(Vec::new()),
            is_rooted: true,
        }
    }

    /// An empty, unrooted path (zero steps, not anchored at `m`).
    pub fn unrooted() -> Self {
        KeyPath {
            steps: Arc::new(Vec::new()),
            is_rooted: false,
        }
    }

    /// Whether this path is anchored at the master key `m`.
    pub fn is_rooted(&self) -> bool {
        self.is_rooted
    }

    /// Number of steps (0 for the root).
    pub fn length(&self) -> usize {
        self.steps.len()
    }

    /// The raw child index (hardened bit included) at 1-based position `i`.
    ///
    /// # Panics
    /// Panics if `i` is 0 or greater than [`KeyPath::length`].
    pub fn step(&self, i: usize) -> u32 {
        assert!(i >= 1 && i <= self.steps.len(), "key path index out of range");
        self.steps[i - 1]
    }

    /// This path with its last step removed, or `None` for a 0-length path.
    pub fn parent(&self) -> Option<Self> {
        if self.steps.is_empty() {
            None
        } else {
            Some(self.truncate(self.steps.len() - 1))
        }
    }

    /// Keep only the first `k` steps.
    ///
    /// # Panics
    /// Panics if `k > self.length()`.
    pub fn truncate(&self, k: usize) -> Self {
        assert!(k <= self.steps.len(), "truncate beyond path length");
        KeyPath {
            steps: Arc::new(self.steps[..k].to_vec()),
            is_rooted: self.is_rooted,
        }
    }

    /// Append one more raw child index (hardened bit included if needed).
    pub fn append(&self, index: u32) -> Self {
        let mut steps = (*self.steps).clone();
        steps.push(index);
        KeyPath {
            steps: Arc::new(steps),
            is_rooted: self.is_rooted,
        }
    }

    /// Append a plain index, OR-ing in the hardened bit.
    pub fn append_hardened(&self, index: u32) -> Self {
        self.append(index | HARDENED_FLAG)
    }

    /// Lazily yield every non-empty prefix of this path, shortest first,
    /// ending with the path itself. Used to walk a derivation step by step.
    pub fn steps(&self) -> impl Iterator<Item = KeyPath> + '_ {
        (1..=self.steps.len()).map(move |k| self.truncate(k))
    }

    /// Parse a textual key path per the grammar in the derivation design:
    /// `m` (optional, meaning rooted) followed by zero or more `/index[']`
    /// steps.
    pub fn parse(s: &str) -> Result<Self, KeyPathError> {
        if s.is_empty() {
            return Err(KeyPathError("empty path".into()));
        }
        if s.contains('M') {
            return Err(KeyPathError("root marker must be lowercase 'm'".into()));
        }

        let (is_rooted, rest) = match s.strip_prefix('m') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let mut steps = Vec::new();
        if is_rooted {
            if !rest.is_empty() {
                if !rest.starts_with('/') {
                    return Err(KeyPathError("stray characters after 'm'".into()));
                }
                for segment in rest.split('/').skip(1) {
                    steps.push(parse_step(segment)?);
                }
            }
        } else {
            for segment in rest.split('/') {
                steps.push(parse_step(segment)?);
            }
        }

        Ok(KeyPath {
            steps: Arc::new(steps),
            is_rooted,
        })
    }
}

fn parse_step(segment: &str) -> Result<u32, KeyPathError> {
    if segment.is_empty() {
        return Err(KeyPathError("empty path segment".into()));
    }
    let (digits, hardened) = match segment.strip_suffix('\'') {
        Some(d) => (d, true),
        None => (segment, false),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(KeyPathError(format!("invalid path segment: {segment}")));
    }
    let value: u32 = digits
        .parse()
        .map_err(|_| KeyPathError(format!("path segment out of range: {segment}")))?;
    if value & HARDENED_FLAG != 0 {
        return Err(KeyPathError(format!("path segment out of range: {segment}")));
    }
    Ok(if hardened { value | HARDENED_FLAG } else { value })
}

fn sort_key(index: u32) -> (u32, u8) {
    let hardened = index & HARDENED_FLAG != 0;
    (index & !HARDENED_FLAG, if hardened { 0 } else { 1 })
}

impl PartialOrd for KeyPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KeyPath {
    fn cmp(&self, other: &Self) -> Ordering {
        for (&a, &b) in self.steps.iter().zip(other.steps.iter()) {
            let ord = sort_key(a).cmp(&sort_key(b));
            if ord != Ordering::Equal {
                return ord;
            }
        }
        self.steps.len().cmp(&other.steps.len())
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_rooted {
            write!(f, "m")?;
        }
        for (i, &step) in self.steps.iter().enumerate() {
            if i > 0 || self.is_rooted {
                write!(f, "/")?;
            }
            write!(f, "{}", render_step(step))?;
        }
        Ok(())
    }
}

fn render_step(index: u32) -> String {
    if index & HARDENED_FLAG != 0 {
        format!("{}'", index & !HARDENED_FLAG)
    } else {
        format!("{index}")
    }
}
