use std::f32::consts::PI;

use nalgebra as na;
use na::{vector, Matrix3, Vector3};

use super::hit_test::Sample;
use crate::texture::TextureSet;

const LIGHT_INTENSITY: f32 = 7.0;

/// Selectable terms of the lighting model. Cycled at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightingMode {
    ObservedArea,
    Diffuse,
    Specular,
    Combined,
}

impl LightingMode {
    /// Advances to the next mode, wrapping back after Combined.
    pub fn cycle(self) -> LightingMode {
        return match self {
            LightingMode::ObservedArea => LightingMode::Diffuse,
            LightingMode::Diffuse => LightingMode::Specular,
            LightingMode::Specular => LightingMode::Combined,
            LightingMode::Combined => LightingMode::ObservedArea,
        };
    }
}

/// Shades one covered pixel under the fixed directional light. Returns rgb
/// with channels in [0.0, 1.0] after clamping.
pub fn shade_pixel(
    sample: &Sample,
    textures: &TextureSet,
    lighting_mode: LightingMode,
    use_normal_map: bool,
) -> Vector3<f32> {
    // Direction towards the light, used in the dot product as-is.
    let light_direction = vector![0.577, -0.577, 0.577];
    let ambient = vector![0.03, 0.03, 0.03];

    let mut normal = sample.normal;
    if use_normal_map {
        let normal_sample = textures.normal.sample(sample.uv);
        // Channels come in as [0, 1], remap to [-1, 1].
        let local_normal = vector![
            2.0 * normal_sample.x - 1.0,
            2.0 * normal_sample.y - 1.0,
            2.0 * normal_sample.z - 1.0
        ];

        let binormal = normal.cross(&sample.tangent);
        let tangent_space_axis = Matrix3::from_columns(&[sample.tangent, binormal, normal]);
        normal = tangent_space_axis * local_normal;
    }

    let cos_angle = normal.dot(&light_direction).max(0.0);

    let diffuse_sample = textures.diffuse.sample(sample.uv);
    let lambert = diffuse_sample * LIGHT_INTENSITY / PI;

    let specular_reflectance = textures.specular.sample(sample.uv).x;
    let shininess = 25.0 + textures.gloss.sample(sample.uv).x;
    let specular = vector![1.0, 1.0, 1.0] * (specular_reflectance * cos_angle.powf(shininess));

    let color = match lighting_mode {
        LightingMode::ObservedArea => vector![1.0, 1.0, 1.0],
        LightingMode::Diffuse => lambert,
        LightingMode::Specular => specular,
        LightingMode::Combined => lambert + specular + ambient,
    };

    // Every term, ambient included, is attenuated by the observed angle.
    let attenuated = color * cos_angle;

    return vector![
        attenuated.x.min(1.0),
        attenuated.y.min(1.0),
        attenuated.z.min(1.0)
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit_sample(normal: Vector3<f32>) -> Sample {
        return Sample {
            uv: vector![0.5, 0.5],
            normal,
            tangent: vector![1.0, 0.0, 0.0],
            view_direction: vector![0.0, 0.0, 1.0],
            depth: 1.0,
            weights: vector![0.3, 0.3, 0.4],
        };
    }

    #[test]
    fn test_cycle_returns_after_four_steps() {
        let mut mode = LightingMode::Combined;
        for _ in 0..4 {
            mode = mode.cycle();
        }
        assert_eq!(mode, LightingMode::Combined);

        assert_eq!(LightingMode::ObservedArea.cycle(), LightingMode::Diffuse);
        assert_eq!(LightingMode::Diffuse.cycle(), LightingMode::Specular);
        assert_eq!(LightingMode::Specular.cycle(), LightingMode::Combined);
    }

    #[test]
    fn test_observed_area_is_cosine_gray() {
        let textures = TextureSet::flat_white();
        let sample = lit_sample(vector![0.577, -0.577, 0.577]);
        let color = shade_pixel(&sample, &textures, LightingMode::ObservedArea, false);
        // Normal aligned with the light gives cos close to 1.
        assert!((color.x - 1.0).abs() < 1e-2);
        assert!((color.x - color.y).abs() < 1e-6);
        assert!((color.y - color.z).abs() < 1e-6);
    }

    #[test]
    fn test_surface_facing_away_is_black() {
        let textures = TextureSet::flat_white();
        let sample = lit_sample(vector![-0.577, 0.577, -0.577]);
        let color = shade_pixel(&sample, &textures, LightingMode::Diffuse, false);
        assert!(color.norm() < 1e-6);
    }

    #[test]
    fn test_combined_ambient_is_attenuated_too() {
        let textures = TextureSet::flat_white();
        // Normal orthogonal to the light - cos is 0, so even the ambient
        // term must vanish.
        let sample = lit_sample(vector![0.577, 0.577, 0.0].normalize());
        let color = shade_pixel(&sample, &textures, LightingMode::Combined, false);
        assert!(color.norm() < 1e-4);
    }

    #[test]
    fn test_flat_normal_map_keeps_geometric_normal() {
        let textures = TextureSet::flat_white();
        let sample = lit_sample(vector![0.577, -0.577, 0.577]);
        let with_map = shade_pixel(&sample, &textures, LightingMode::ObservedArea, true);
        let without_map = shade_pixel(&sample, &textures, LightingMode::ObservedArea, false);
        assert!((with_map - without_map).norm() < 1e-2);
    }

    #[test]
    fn test_diffuse_white_saturates() {
        let textures = TextureSet::flat_white();
        let sample = lit_sample(vector![0.577, -0.577, 0.577]);
        // Lambert term is 7 / pi, well above the clamp.
        let color = shade_pixel(&sample, &textures, LightingMode::Diffuse, false);
        assert!((color.x - 1.0).abs() < 1e-6);
        assert!((color.y - 1.0).abs() < 1e-6);
        assert!((color.z - 1.0).abs() < 1e-6);
    }
}
