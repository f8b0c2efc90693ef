use glam::Vec4;

use crate::recognized::Recognized;

/// Kind of path-like geometry. All kinds share one id space per level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PathKind {
    Path,
    GrindRail,
    CameraRail,
}

impl PathKind {
    pub fn tag(self) -> u16 {
        match self {
            PathKind::Path => 0,
            PathKind::GrindRail => 1,
            PathKind::CameraRail => 2,
        }
    }

    pub fn from_tag(tag: u16) -> Recognized<PathKind, u16> {
        match tag {
            0 => Recognized::Known(PathKind::Path),
            1 => Recognized::Known(PathKind::GrindRail),
            2 => Recognized::Known(PathKind::CameraRail),
            other => Recognized::Unknown(other),
        }
    }
}

/// Spline control points addressed by a level-unique id.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PathSpline {
    pub id: i32,
    pub kind: PathKind,
    /// xyz position plus a per-point parameter in w.
    pub points: Vec<Vec4>,
}
