use std::fmt;

/// A decoded tag that either maps onto a known variant `T` or is preserved as
/// its raw on-disk value.
///
/// Level files from tools we do not know about occasionally carry tags we have
/// no typed representation for. Decoders return `Unknown(raw)` instead of
/// failing so the caller decides whether the record is usable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Recognized<T, Raw = u32> {
    Known(T),
    Unknown(Raw),
}

impl<T: Copy, Raw: Copy> Copy for Recognized<T, Raw> {}

impl<T, Raw> Recognized<T, Raw> {
    pub fn known(&self) -> Option<&T> {
        match self {
            Recognized::Known(t) => Some(t),
            Recognized::Unknown(_) => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Recognized::Unknown(_))
    }

    /// Convert into a `Result`, mapping the raw value with `f`.
    pub fn ok_or_else<E, F: FnOnce(Raw) -> E>(self, f: F) -> Result<T, E> {
        match self {
            Recognized::Known(t) => Ok(t),
            Recognized::Unknown(raw) => Err(f(raw)),
        }
    }

    pub fn unwrap_or(self, default: T) -> T {
        match self {
            Recognized::Known(t) => t,
            Recognized::Unknown(_) => default,
        }
    }
}

impl<T, Raw> From<T> for Recognized<T, Raw> {
    fn from(value: T) -> Self {
        Recognized::Known(value)
    }
}

impl<T: fmt::Display, Raw: fmt::Display> fmt::Display for Recognized<T, Raw> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recognized::Known(t) => t.fmt(f),
            Recognized::Unknown(raw) => write!(f, "unknown({raw})"),
        }
    }
}
