use std::fmt;

/// Game episode a quest belongs to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Episode {
    #[default]
    I,
    II,
    IV,
}

impl Episode {
    /// Decode the value passed to `set_episode`.
    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::I),
            1 => Some(Self::II),
            2 => Some(Self::IV),
            _ => None,
        }
    }

    /// Value that `set_episode` expects for this episode.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::I => 0,
            Self::II => 1,
            Self::IV => 2,
        }
    }
}

impl fmt::Display for Episode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I => f.write_str("I"),
            Self::II => f.write_str("II"),
            Self::IV => f.write_str("IV"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_roundtrip() {
        for episode in [Episode::I, Episode::II, Episode::IV] {
            assert_eq!(Episode::from_code(episode.code()), Some(episode));
        }
        assert_eq!(Episode::from_code(3), None);
    }
}
