//! Entry ids and read cursors.

use std::{fmt, str::FromStr};

use crate::error::ParseIdError;

/// Store-assigned entry id in `<millis>-<sequence>` form.
///
/// Ordered by `(millis, sequence)`. Ids are only meaningful relative to other
/// ids of the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId {
    millis: u64,
    seq: u64,
}

impl EntryId {
    /// Smallest possible id (`0-0`). No entry is ever assigned it.
    pub const MIN: Self = Self { millis: 0, seq: 0 };

    /// Build an id from its two components.
    pub const fn new(millis: u64, seq: u64) -> Self {
        Self { millis, seq }
    }

    /// Millisecond component.
    pub const fn millis(self) -> u64 {
        self.millis
    }

    /// Sequence component within the millisecond.
    pub const fn seq(self) -> u64 {
        self.seq
    }

    /// Smallest id strictly greater than `self` whose millis is at least
    /// `now_millis`.
    pub fn successor(self, now_millis: u64) -> Self {
        if now_millis > self.millis {
            Self::new(now_millis, 0)
        } else {
            Self::new(self.millis, self.seq.saturating_add(1))
        }
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.millis, self.seq)
    }
}

impl FromStr for EntryId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseIdError(s.to_string());
        let (millis, seq) = match s.split_once('-') {
            Some((millis, seq)) => (millis, seq),
            None => (s, "0"),
        };
        let millis = millis.parse().map_err(|_| invalid())?;
        let seq = seq.parse().map_err(|_| invalid())?;
        Ok(Self { millis, seq })
    }
}

/// Position within one key's log from which a read starts (exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cursor {
    /// Start of the log (`"0"`): the read includes every entry.
    Beginning,
    /// End of the log (`"$"`): only entries appended after the read starts.
    Tail,
    /// Only entries with an id strictly greater than this one.
    After(EntryId),
}

impl Cursor {
    /// Whether an entry with `id` lies past this cursor.
    ///
    /// [`Cursor::Tail`] admits nothing; resolve it against the log end first.
    pub fn admits(self, id: EntryId) -> bool {
        match self {
            Self::Beginning => true,
            Self::Tail => false,
            Self::After(after) => id > after,
        }
    }
}

impl From<EntryId> for Cursor {
    fn from(id: EntryId) -> Self {
        Self::After(id)
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Beginning => f.write_str("0"),
            Self::Tail => f.write_str("$"),
            Self::After(id) => id.fmt(f),
        }
    }
}

impl FromStr for Cursor {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0" => Ok(Self::Beginning),
            "$" => Ok(Self::Tail),
            other => other.parse().map(Self::After),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_and_bare_ids() {
        assert_eq!("1700000000000-3".parse::<EntryId>(), Ok(EntryId::new(1_700_000_000_000, 3)));
        assert_eq!("42".parse::<EntryId>(), Ok(EntryId::new(42, 0)));
        assert!("abc-1".parse::<EntryId>().is_err());
        assert!("1-".parse::<EntryId>().is_err());
    }

    #[test]
    fn id_order_is_millis_then_sequence() {
        assert!(EntryId::new(1, 9) < EntryId::new(2, 0));
        assert!(EntryId::new(2, 0) < EntryId::new(2, 1));
    }

    #[test]
    fn successor_is_strictly_greater() {
        let id = EntryId::new(100, 4);
        assert_eq!(id.successor(100), EntryId::new(100, 5));
        assert_eq!(id.successor(50), EntryId::new(100, 5));
        assert_eq!(id.successor(101), EntryId::new(101, 0));
    }

    #[test]
    fn special_cursors_use_wire_tokens() {
        assert_eq!("0".parse::<Cursor>(), Ok(Cursor::Beginning));
        assert_eq!("$".parse::<Cursor>(), Ok(Cursor::Tail));
        assert_eq!(Cursor::Beginning.to_string(), "0");
        assert_eq!(Cursor::Tail.to_string(), "$");
        assert_eq!(Cursor::After(EntryId::new(7, 1)).to_string(), "7-1");
    }

    #[test]
    fn cursor_admits_only_later_ids() {
        let cursor = Cursor::After(EntryId::new(5, 0));
        assert!(!cursor.admits(EntryId::new(5, 0)));
        assert!(cursor.admits(EntryId::new(5, 1)));
        assert!(Cursor::Beginning.admits(EntryId::new(0, 1)));
        assert!(!Cursor::Tail.admits(EntryId::new(u64::MAX, 0)));
    }
}
