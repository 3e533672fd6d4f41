use crate::error::FormatError;

/// On-disk format generations.
///
/// Every table chunk carries the version its records were written with; readers accept
/// [`Version::OLDEST_STILL_SUPPORTED`] through [`Version::LATEST`], writers always emit
/// [`Version::LATEST`]. Versions 1 to 5 are no longer readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u32)]
pub enum Version {
    V6 = 6,
    /// Never released, shares the V6 layouts
    V7 = 7,
    V8 = 8,
    V9 = 9,
    V10 = 10,
    V11 = 11,
    V12 = 12,
}

impl Version {
    pub const OLDEST_STILL_SUPPORTED: Self = Self::V6;
    pub const LATEST: Self = Self::V12;

    pub const ALL: [Self; 7] = [
        Self::V6,
        Self::V7,
        Self::V8,
        Self::V9,
        Self::V10,
        Self::V11,
        Self::V12,
    ];

    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for Version {
    type Error = FormatError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Ok(match value {
            6 => Self::V6,
            7 => Self::V7,
            8 => Self::V8,
            9 => Self::V9,
            10 => Self::V10,
            11 => Self::V11,
            12 => Self::V12,
            version => return Err(FormatError::UnsupportedVersion { version }),
        })
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.as_u32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_range() {
        for v in Version::ALL {
            assert_eq!(Version::try_from(v.as_u32()).unwrap(), v);
            assert!(v >= Version::OLDEST_STILL_SUPPORTED && v <= Version::LATEST);
        }
        for raw in [0, 1, 5, 13, u32::MAX] {
            assert!(matches!(
                Version::try_from(raw),
                Err(FormatError::UnsupportedVersion { version }) if version == raw
            ));
        }
    }
}
