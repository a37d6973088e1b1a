use std::path::Path;

use nalgebra as na;
use na::{vector, Vector2, Vector3};

/// Decoded texture data - width, height and a flat rgb8 pixel array.
/// Read-only after construction, exposes a pure sampling function.
pub struct Texture {
    width: u32,
    height: u32,
    pixel_data: Vec<u8>,
}

impl Texture {
    /// Loads and decodes an image file into rgb8 pixel data.
    /// Load failure is propagated to the caller - there is no placeholder
    /// texture fallback.
    pub fn load(path: &Path) -> Result<Texture, image::ImageError> {
        let decoded = image::open(path)?.to_rgb8();
        let (width, height) = (decoded.width(), decoded.height());
        log::info!("Loaded texture {} ({}x{})", path.display(), width, height);
        return Ok(Texture {
            width,
            height,
            pixel_data: decoded.into_raw(),
        });
    }

    /// Makes a 1x1 texture of a single color, channels in [0.0, 1.0].
    /// Mostly useful as a stand-in in tests.
    pub fn flat(color: Vector3<f32>) -> Texture {
        let packed = crate::util::pack_color(color);
        return Texture {
            width: 1,
            height: 1,
            pixel_data: packed.to_vec(),
        };
    }

    /// Samples the texel under uv, returning rgb with channels in [0.0, 1.0].
    /// Coordinates outside [0, 1] wrap around.
    pub fn sample(&self, uv: Vector2<f32>) -> Vector3<f32> {
        let x = (self.width as f32 * uv.x.abs()) as u32 % self.width;
        let y = (self.height as f32 * uv.y.abs()) as u32 % self.height;
        let index = (3 * (x + y * self.width)) as usize;
        return vector![
            self.pixel_data[index] as f32 / 255.0,
            self.pixel_data[index + 1] as f32 / 255.0,
            self.pixel_data[index + 2] as f32 / 255.0
        ];
    }
}

/// The four fixed texture channels the shading model consumes.
pub struct TextureSet {
    pub diffuse: Texture,
    pub normal: Texture,
    pub specular: Texture,
    pub gloss: Texture,
}

impl TextureSet {
    /// Loads `<prefix>_diffuse.png`, `<prefix>_normal.png`,
    /// `<prefix>_specular.png` and `<prefix>_gloss.png`.
    pub fn load(prefix: &str) -> Result<TextureSet, image::ImageError> {
        return Ok(TextureSet {
            diffuse: Texture::load(Path::new(&format!("{}_diffuse.png", prefix)))?,
            normal: Texture::load(Path::new(&format!("{}_normal.png", prefix)))?,
            specular: Texture::load(Path::new(&format!("{}_specular.png", prefix)))?,
            gloss: Texture::load(Path::new(&format!("{}_gloss.png", prefix)))?,
        });
    }

    /// All-flat set for tests: white diffuse, straight-up normal, black
    /// specular and gloss.
    pub fn flat_white() -> TextureSet {
        return TextureSet {
            diffuse: Texture::flat(vector![1.0, 1.0, 1.0]),
            normal: Texture::flat(vector![0.5, 0.5, 1.0]),
            specular: Texture::flat(vector![0.0, 0.0, 0.0]),
            gloss: Texture::flat(vector![0.0, 0.0, 0.0]),
        };
    }
}
