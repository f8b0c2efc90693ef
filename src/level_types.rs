//! Engine concept types shared by every stage of a conversion run.
//!
//! These describe which schema generation a block was written for, which
//! instance collection an entity belongs to, and the small value types that
//! appear in several record layouts.

use std::fmt;
use std::str::FromStr;

use crate::recognized::Recognized;

// =============================================================================
// Generation
// =============================================================================

/// Binary schema generation of a level or of a single entity.
///
/// Generations are ordered: `V1 < V2 < V3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Generation {
    V1,
    V2,
    V3,
}

/// Rotation handedness used by a generation's transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
}

impl Generation {
    pub const ALL: [Generation; 3] = [Generation::V1, Generation::V2, Generation::V3];

    /// Numeric tag written into level headers.
    pub fn tag(self) -> u32 {
        match self {
            Generation::V1 => 1,
            Generation::V2 => 2,
            Generation::V3 => 3,
        }
    }

    pub fn from_tag(tag: u32) -> Recognized<Generation, u32> {
        match tag {
            1 => Recognized::Known(Generation::V1),
            2 => Recognized::Known(Generation::V2),
            3 => Recognized::Known(Generation::V3),
            other => Recognized::Unknown(other),
        }
    }

    pub fn handedness(self) -> Handedness {
        match self {
            Generation::V1 => Handedness::Left,
            Generation::V2 | Generation::V3 => Handedness::Right,
        }
    }

    /// Minimum length of a ParamBlock attached to an instance of this generation.
    pub fn min_param_block_len(self) -> usize {
        match self {
            Generation::V1 => 0,
            Generation::V2 | Generation::V3 => crate::level::MIN_PARAM_BLOCK_LEN,
        }
    }

    /// Whether this generation's layouts carry the wider (nine slot) class header.
    pub fn has_wide_class_header(self) -> bool {
        self >= Generation::V2
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Generation::V1 => write!(f, "v1"),
            Generation::V2 => write!(f, "v2"),
            Generation::V3 => write!(f, "v3"),
        }
    }
}

impl FromStr for Generation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "v1" | "1" => Ok(Generation::V1),
            "v2" | "2" => Ok(Generation::V2),
            "v3" | "3" => Ok(Generation::V3),
            other => Err(format!("unknown generation '{other}' (expected v1, v2 or v3)")),
        }
    }
}

// =============================================================================
// Category
// =============================================================================

/// Instance collection an entity belongs to.
///
/// The declaration order is the on-disk order of the occlusion table:
/// moby, then tie, then shrub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Category {
    /// Placed object instances with behavior (parameter blocks, class headers).
    Moby,
    /// Structural instances.
    Tie,
    /// Decorative prop instances.
    Shrub,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Moby, Category::Tie, Category::Shrub];

    pub fn index(self) -> usize {
        match self {
            Category::Moby => 0,
            Category::Tie => 1,
            Category::Shrub => 2,
        }
    }

    /// Categories whose model ids live in the same namespace as `self`.
    ///
    /// Object-instance models and decorative-prop models must not collide.
    pub fn namespace(self) -> &'static [Category] {
        match self {
            Category::Moby | Category::Shrub => &[Category::Moby, Category::Shrub],
            Category::Tie => &[Category::Tie],
        }
    }

    /// Whether instances of this category carry behavior data
    /// (ParamBlocks and class headers).
    pub fn has_behavior(self) -> bool {
        matches!(self, Category::Moby)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Moby => write!(f, "moby"),
            Category::Tie => write!(f, "tie"),
            Category::Shrub => write!(f, "shrub"),
        }
    }
}

// =============================================================================
// Small value types
// =============================================================================

/// 24-bit vertex/ambient color stored as three bytes plus one pad byte.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb {
        r: 0xFF,
        g: 0xFF,
        b: 0xFF,
    };

    pub fn to_bytes(self) -> [u8; 4] {
        [self.r, self.g, self.b, 0]
    }

    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Rgb {
            r: bytes[0],
            g: bytes[1],
            b: bytes[2],
        }
    }
}
