//! Key types for the catalog tables.

use std::fmt::Display;

macro_rules! u32_key {
    ($(#[$meta:meta])* $name:ident, $sentinel:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, Eq, PartialOrd, Ord, PartialEq, Hash)]
        pub struct $name(u32);

        impl $name {
            pub const $sentinel: Self = Self(u32::MAX);

            pub const fn new(id: u32) -> Self {
                Self(id)
            }

            pub fn as_u32(&self) -> u32 {
                self.0
            }
        }

        impl From<u32> for $name {
            fn from(value: u32) -> Self {
                Self(value)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                if *self == Self::$sentinel {
                    f.write_str(stringify!($sentinel))
                } else {
                    write!(f, "{}", self.0)
                }
            }
        }
    };
}

u32_key!(
    /// Color key, [`ColorId::NONE`] means "no color"
    ColorId,
    NONE
);
u32_key!(CategoryId, UNKNOWN);
u32_key!(RelationshipId, UNKNOWN);

#[derive(Debug, Copy, Clone, Eq, PartialOrd, Ord, PartialEq, Hash)]
pub struct RelationshipMatchId(u16);

impl RelationshipMatchId {
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    pub fn as_u16(&self) -> u16 {
        self.0
    }
}

impl From<u16> for RelationshipMatchId {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl Display for RelationshipMatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Single upper-case ASCII letter naming an item type, e.g. `P` for parts
#[derive(Copy, Clone, Eq, PartialOrd, Ord, PartialEq, Hash)]
pub struct ItemTypeId(u8);

impl ItemTypeId {
    /// Stand-in for references to item types that are not in the catalog
    pub const UNKNOWN: Self = Self(b'?');

    /// Returns `None` unless `id` is an ASCII upper-case letter
    pub const fn new(id: u8) -> Option<Self> {
        if id.is_ascii_uppercase() {
            Some(Self(id))
        } else {
            None
        }
    }

    pub fn as_u8(&self) -> u8 {
        self.0
    }

    pub fn as_char(&self) -> char {
        self.0 as char
    }
}

impl std::fmt::Debug for ItemTypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ItemTypeId({})", self.as_char())
    }
}

impl Display for ItemTypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Bit set describing the material of a color
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct ColorType(u32);

impl ColorType {
    pub const SOLID: Self = Self(1 << 0);
    pub const TRANSPARENT: Self = Self(1 << 1);
    pub const GLITTER: Self = Self(1 << 2);
    pub const SPECKLE: Self = Self(1 << 3);
    pub const METALLIC: Self = Self(1 << 4);
    pub const CHROME: Self = Self(1 << 5);
    pub const PEARL: Self = Self(1 << 6);
    pub const MILKY: Self = Self(1 << 7);
    pub const MODULEX: Self = Self(1 << 8);
    pub const SATIN: Self = Self(1 << 9);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for ColorType {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Capabilities of an item type
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct ItemTypeFlags(u8);

impl ItemTypeFlags {
    pub const HAS_INVENTORIES: Self = Self(1 << 0);
    pub const HAS_COLORS: Self = Self(1 << 1);
    pub const HAS_WEIGHT: Self = Self(1 << 2);
    pub const HAS_YEAR: Self = Self(1 << 3);
    pub const HAS_SUBCONDITIONS: Self = Self(1 << 4);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for ItemTypeFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Known deviations of the remote API that consumers have to work around
#[derive(Debug, Copy, Clone, Eq, PartialOrd, Ord, PartialEq, Hash)]
#[repr(u32)]
pub enum ApiQuirk {
    /// Counterpart items of an alternate are not listed by the API
    MissingCounterpartItems = 1,
    /// Color ids in inventories use the retired numbering
    LegacyColorIds = 2,
    /// Reported weights are known to be wrong for some item types
    UnreliableWeights = 3,
}

impl ApiQuirk {
    pub const ALL: [Self; 3] = [
        Self::MissingCounterpartItems,
        Self::LegacyColorIds,
        Self::UnreliableWeights,
    ];

    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn from_u32(value: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|q| q.as_u32() == value)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::MissingCounterpartItems => "missing-counterpart-items",
            Self::LegacyColorIds => "legacy-color-ids",
            Self::UnreliableWeights => "unreliable-weights",
        }
    }
}

impl Display for ApiQuirk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
