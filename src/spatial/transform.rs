//! Coordinate conversion between generations.
//!
//! V1 stores rotations left-handed, V2 and V3 right-handed. Converting a
//! placement flips the sign of the X and Z Euler components and recomposes the
//! transform as scale, then rotation, then translation. Culling bounds are
//! derived from the converted transform so they stay consistent with the
//! geometry they cover.

use glam::{Vec3, Vec4};

use crate::level::Transform;
use crate::level_types::Generation;

/// Convert a placement written for `from` into `to`'s convention.
pub fn convert_transform(transform: &Transform, from: Generation, to: Generation) -> Transform {
    if from.handedness() == to.handedness() {
        return *transform;
    }
    Transform {
        position: transform.position,
        rotation: flip_handedness(transform.rotation),
        scale: transform.scale,
    }
}

fn flip_handedness(rotation: Vec3) -> Vec3 {
    Vec3::new(-rotation.x, rotation.y, -rotation.z)
}

/// World-space culling sphere of a model's local bounds placed by `transform`.
pub fn cull_bounds(model_bounds: Vec4, transform: &Transform) -> Vec4 {
    let center = transform.to_matrix().transform_point3(model_bounds.truncate());
    let scale = transform.scale.abs().max_element();
    center.extend(model_bounds.w * scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placed() -> Transform {
        Transform {
            position: Vec3::new(10.0, 0.0, -4.0),
            rotation: Vec3::new(0.3, -0.7, 1.1),
            scale: Vec3::splat(2.0),
        }
    }

    #[test]
    fn v1_to_v2_negates_x_and_z() {
        let out = convert_transform(&placed(), Generation::V1, Generation::V2);
        assert_eq!(out.rotation, Vec3::new(-0.3, -0.7, -1.1));
        assert_eq!(out.position, placed().position);
        assert_eq!(out.scale, placed().scale);
    }

    #[test]
    fn same_handedness_is_untouched() {
        assert_eq!(
            convert_transform(&placed(), Generation::V2, Generation::V3),
            placed()
        );
    }

    #[test]
    fn conversion_is_an_involution() {
        let there = convert_transform(&placed(), Generation::V1, Generation::V3);
        let back = convert_transform(&there, Generation::V3, Generation::V1);
        assert_eq!(back, placed());
    }

    #[test]
    fn cull_bounds_follow_placement() {
        let t = Transform {
            position: Vec3::new(100.0, 0.0, 0.0),
            rotation: Vec3::ZERO,
            scale: Vec3::new(1.0, 3.0, 1.0),
        };
        let bounds = cull_bounds(Vec4::new(1.0, 0.0, 0.0, 2.0), &t);
        assert!(bounds.truncate().abs_diff_eq(Vec3::new(101.0, 0.0, 0.0), 1e-5));
        assert_eq!(bounds.w, 6.0);
    }
}
