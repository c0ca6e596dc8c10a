//! Sampled channel values at a single frame.

use glam::{Affine3A, EulerRot, Quat, Vec2, Vec3};

/// Transform channels of a video layer sampled at one frame.
///
/// Rotations are in degrees. 2-D layers leave the z components neutral.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VideoTransform {
    pub anchor: Vec3,
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
    pub direction: Vec3,
    pub opacity: f32,
}

impl Default for VideoTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl VideoTransform {
    pub const IDENTITY: Self = Self {
        anchor: Vec3::ZERO,
        position: Vec3::ZERO,
        rotation: Vec3::ZERO,
        scale: Vec3::ONE,
        direction: Vec3::ZERO,
        opacity: 1.0,
    };

    /// Local matrix: move the anchor to the origin, scale, rotate (X, then
    /// Y, then Z), then translate to the position.
    pub fn to_affine(&self) -> Affine3A {
        let rotation = Quat::from_euler(
            EulerRot::ZYX,
            self.rotation.z.to_radians(),
            self.rotation.y.to_radians(),
            self.rotation.x.to_radians(),
        );
        Affine3A::from_scale_rotation_translation(self.scale, rotation, self.position)
            * Affine3A::from_translation(-self.anchor)
    }
}

/// Audio channels sampled at one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AudioMix {
    /// Left/right volume.
    pub volume: Vec2,
    /// Left/right pan.
    pub pan: Vec2,
}

impl Default for AudioMix {
    fn default() -> Self {
        Self { volume: Vec2::ONE, pan: Vec2::ZERO }
    }
}

/// Camera channels sampled at one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CameraPose {
    pub eye: Vec3,
    pub position: Vec3,
    pub direction: Vec3,
    pub rotation: Vec3,
    pub zoom: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_affine() {
        let m = VideoTransform::IDENTITY.to_affine();
        assert!(m.abs_diff_eq(Affine3A::IDENTITY, 1e-6));
    }

    #[test]
    fn test_anchor_and_position() {
        let t = VideoTransform {
            anchor: Vec3::new(10.0, 10.0, 0.0),
            position: Vec3::new(100.0, 50.0, 0.0),
            ..VideoTransform::IDENTITY
        };
        let p = t.to_affine().transform_point3(Vec3::new(10.0, 10.0, 0.0));
        assert!(p.abs_diff_eq(Vec3::new(100.0, 50.0, 0.0), 1e-4));
    }

    #[test]
    fn test_rotation_z_degrees() {
        let t = VideoTransform {
            rotation: Vec3::new(0.0, 0.0, 90.0),
            ..VideoTransform::IDENTITY
        };
        let p = t.to_affine().transform_point3(Vec3::X);
        assert!(p.abs_diff_eq(Vec3::Y, 1e-5));
    }
}
