use std::fmt;

/// Container format versions this crate reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum LmtVersion {
    /// Monster Hunter: World
    #[default]
    V95,
}

impl LmtVersion {
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            95 => Some(Self::V95),
            _ => None,
        }
    }

    pub const fn to_u16(self) -> u16 {
        match self {
            Self::V95 => 95,
        }
    }
}

impl fmt::Display for LmtVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_versions() {
        assert_eq!(LmtVersion::from_u16(95), Some(LmtVersion::V95));
        assert_eq!(LmtVersion::from_u16(67), None);
        assert_eq!(LmtVersion::V95.to_u16(), 95);
        assert_eq!(LmtVersion::default().to_string(), "95");
    }
}
