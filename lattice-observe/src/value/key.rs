use std::borrow::Cow;
use std::fmt;

/// The largest valid sequence index. One past it is the longest length a
/// sequence can have.
pub const MAX_INDEX: usize = (u32::MAX - 1) as usize;

/// A property key for the escape-hatch operations.
///
/// Objects are keyed by name; arrays by index. A name that spells a
/// non-negative integer is accepted as an index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Index(usize),
    Name(String),
}

impl Key {
    /// The key as a sequence index, if it is a valid one. Indices past
    /// [`MAX_INDEX`] are not.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Key::Index(i) => (*i <= MAX_INDEX).then_some(*i),
            Key::Name(name) => {
                let n: f64 = name.trim().parse().ok()?;
                if n.is_finite() && n >= 0.0 && n.fract() == 0.0 && n <= MAX_INDEX as f64 {
                    Some(n as usize)
                } else {
                    None
                }
            }
        }
    }

    /// The key as a property name.
    pub fn as_name(&self) -> Cow<'_, str> {
        match self {
            Key::Index(i) => Cow::Owned(i.to_string()),
            Key::Name(name) => Cow::Borrowed(name),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_name())
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Key::Index(i)
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}
