pub mod shader;

use nalgebra as na;
use na::{vector, Matrix4, Rotation3, Vector3};

use crate::camera::Camera;
use crate::mesh::{Mesh, Topology, Vertex};
use crate::texture::TextureSet;
use crate::util::{from_hom_vector, pack_color, to_hom_point};
use self::hit_test::hit_test;
use self::shader::{shade_pixel, LightingMode};

const CLEAR_COLOR: [u8; 3] = [100, 100, 100];

// The scene depths this pipeline produces cluster just under the far end of
// their range, the affine remap spreads them out for the depth test and the
// depth visualization. Not a general depth linearization.
const DEPTH_REMAP_MIN: f32 = 0.985;
const DEPTH_REMAP_MAX: f32 = 1.0;

/// Frame driver - owns the color and depth buffers, the meshes, the texture
/// set and the render toggles, and runs the whole per-frame pipeline:
/// vertex transform, triangle setup, per-pixel hit test, depth test and
/// shading.
pub struct Renderer {
    width: u32,
    height: u32,
    depth_buffer: Vec<f32>,
    color_buffer: Vec<u8>,

    meshes: Vec<Mesh>,
    textures: TextureSet,

    depth_view: bool,
    rotate: bool,
    use_normal_map: bool,
    lighting_mode: LightingMode,
    total_rotation: f32,
}

impl Renderer {
    pub fn new(width: u32, height: u32, meshes: Vec<Mesh>, textures: TextureSet) -> Renderer {
        let n_pixels = (width * height) as usize;
        return Renderer {
            width,
            height,
            depth_buffer: vec![f32::INFINITY; n_pixels],
            color_buffer: vec![0; 3 * n_pixels],
            meshes,
            textures,
            depth_view: false,
            rotate: true,
            use_normal_map: true,
            lighting_mode: LightingMode::Combined,
            total_rotation: 0.0,
        };
    }

    /// Get the rendered frame as a flat rgb8 slice, row-major from the top
    /// left corner.
    pub fn as_render_data(&self) -> &[u8] {
        return &self.color_buffer[..];
    }

    /// Advances the mesh auto-rotation when it is enabled.
    pub fn update(&mut self, delta_time: f32) {
        if !self.rotate {
            return;
        }
        self.total_rotation += delta_time;
        let world_matrix =
            Rotation3::from_axis_angle(&Vector3::y_axis(), self.total_rotation).to_homogeneous();
        for mesh in &mut self.meshes {
            mesh.world_matrix = world_matrix;
        }
    }

    pub fn toggle_depth_view(&mut self) {
        self.depth_view = !self.depth_view;
    }

    pub fn toggle_rotation(&mut self) {
        self.rotate = !self.rotate;
    }

    pub fn toggle_normal_map(&mut self) {
        self.use_normal_map = !self.use_normal_map;
    }

    pub fn cycle_lighting_mode(&mut self) {
        self.lighting_mode = self.lighting_mode.cycle();
    }

    pub fn lighting_mode(&self) -> LightingMode {
        return self.lighting_mode;
    }

    /// Dumps the current color buffer to a fixed-name bitmap next to the
    /// executable.
    pub fn save_buffer_to_image(&self) -> image::ImageResult<()> {
        return image::save_buffer(
            "rasterizer_color_buffer.bmp",
            &self.color_buffer,
            self.width,
            self.height,
            image::ColorType::Rgb8,
        );
    }

    /// Resets the depth buffer to infinity and the color buffer to the clear
    /// color.
    fn clear(&mut self) {
        let n_pixels = (self.width * self.height) as usize;
        for i in 0..n_pixels {
            self.depth_buffer[i] = f32::INFINITY;
            self.color_buffer[3 * i] = CLEAR_COLOR[0];
            self.color_buffer[3 * i + 1] = CLEAR_COLOR[1];
            self.color_buffer[3 * i + 2] = CLEAR_COLOR[2];
        }
    }

    /// Renders all meshes for one frame.
    pub fn render(&mut self, camera: &Camera) {
        self.clear();

        let width = self.width;
        let height = self.height;
        let depth_view = self.depth_view;
        let use_normal_map = self.use_normal_map;
        let lighting_mode = self.lighting_mode;

        let textures = &self.textures;
        let depth_buffer = &mut self.depth_buffer;
        let color_buffer = &mut self.color_buffer;

        let view_projection = camera.projection_matrix * camera.view_matrix;

        for mesh in &mut self.meshes {
            let world_view_projection = view_projection * mesh.world_matrix;

            transform_vertices(
                &mesh.world_matrix,
                &world_view_projection,
                camera.origin,
                width,
                height,
                &mesh.vertices,
                &mut mesh.vertices_out,
            );

            let triangle_count = match mesh.topology {
                Topology::TriangleList => mesh.indices.len() / 3,
                Topology::TriangleStrip => mesh.indices.len().saturating_sub(2),
            };

            for triangle_index in 0..triangle_count {
                let (vertex_0, mut vertex_1, mut vertex_2) =
                    triangle_vertices(mesh, triangle_index);

                // Strip windows can repeat a vertex, those slivers have no
                // area to rasterize.
                if mesh.topology == Topology::TriangleStrip
                    && (vertex_0.position == vertex_1.position
                        || vertex_0.position == vertex_2.position
                        || vertex_1.position == vertex_2.position)
                {
                    continue;
                }

                // Force counter-clockwise winding relative to the camera.
                let face_normal = from_hom_vector(vertex_1.position - vertex_0.position)
                    .cross(&from_hom_vector(vertex_2.position - vertex_0.position));
                if face_normal.dot(&camera.forward) < 0.0 {
                    std::mem::swap(&mut vertex_1, &mut vertex_2);
                }

                if !vertex_0.valid || !vertex_1.valid || !vertex_2.valid {
                    continue;
                }

                // Integer pixel bounding box, expanded by one pixel on each
                // side. Boxes sticking out of the viewport drop the whole
                // triangle rather than getting clamped.
                let mut x_min = vertex_0
                    .position
                    .x
                    .min(vertex_1.position.x)
                    .min(vertex_2.position.x) as i32;
                let mut x_max = vertex_0
                    .position
                    .x
                    .max(vertex_1.position.x)
                    .max(vertex_2.position.x) as i32;
                let mut y_min = vertex_0
                    .position
                    .y
                    .min(vertex_1.position.y)
                    .min(vertex_2.position.y) as i32;
                let mut y_max = vertex_0
                    .position
                    .y
                    .max(vertex_1.position.y)
                    .max(vertex_2.position.y) as i32;

                if x_min < 0 {
                    continue;
                }
                x_min -= 1;
                if y_min < 0 {
                    continue;
                }
                y_min -= 1;
                if x_max > width as i32 {
                    continue;
                }
                x_max += 1;
                if y_max > height as i32 {
                    continue;
                }
                y_max += 1;

                for px in x_min..x_max {
                    if px < 0 || px >= width as i32 {
                        continue;
                    }
                    for py in y_min..y_max {
                        if py < 0 || py >= height as i32 {
                            continue;
                        }

                        let point = vector![px as f32 + 0.5, py as f32 + 0.5, 0.0];
                        let sample = match hit_test(point, &vertex_0, &vertex_1, &vertex_2) {
                            Some(sample) => sample,
                            None => continue,
                        };

                        let buffer_index = (px + py * width as i32) as usize;
                        let depth =
                            (sample.depth - DEPTH_REMAP_MIN) / (DEPTH_REMAP_MAX - DEPTH_REMAP_MIN);

                        if depth < depth_buffer[buffer_index] {
                            depth_buffer[buffer_index] = depth;

                            let color = if depth_view {
                                let normalized_depth = (depth - DEPTH_REMAP_MIN)
                                    / (DEPTH_REMAP_MAX - DEPTH_REMAP_MIN);
                                vector![normalized_depth, normalized_depth, normalized_depth]
                            } else {
                                shade_pixel(&sample, textures, lighting_mode, use_normal_map)
                            };

                            let bytes = pack_color(color);
                            color_buffer[3 * buffer_index] = bytes[0];
                            color_buffer[3 * buffer_index + 1] = bytes[1];
                            color_buffer[3 * buffer_index + 2] = bytes[2];
                        }
                    }
                }
            }
        }
    }
}

/// Fetches the 3 transformed vertices of a triangle according to the mesh
/// topology. Odd-numbered strip triangles get their second and third vertex
/// swapped to keep a consistent winding.
fn triangle_vertices(mesh: &Mesh, triangle_index: usize) -> (Vertex, Vertex, Vertex) {
    return match mesh.topology {
        Topology::TriangleList => {
            let base = triangle_index * 3;
            (
                mesh.vertices_out[mesh.indices[base] as usize],
                mesh.vertices_out[mesh.indices[base + 1] as usize],
                mesh.vertices_out[mesh.indices[base + 2] as usize],
            )
        }
        Topology::TriangleStrip => {
            let vertex_0 = mesh.vertices_out[mesh.indices[triangle_index] as usize];
            let mut vertex_1 = mesh.vertices_out[mesh.indices[triangle_index + 1] as usize];
            let mut vertex_2 = mesh.vertices_out[mesh.indices[triangle_index + 2] as usize];
            if triangle_index % 2 == 1 {
                std::mem::swap(&mut vertex_1, &mut vertex_2);
            }
            (vertex_0, vertex_1, vertex_2)
        }
    };
}

/// Maps every input vertex through the combined matrix into screen space:
/// homogeneous transform, perspective divide, bounds-based validity, NDC to
/// pixel remap. z keeps the NDC depth and w the clip-space w for the
/// perspective-correct interpolation later. Normals and tangents only get
/// the world transform, the view direction is the screen-space position
/// relative to the camera origin.
fn transform_vertices(
    world: &Matrix4<f32>,
    world_view_projection: &Matrix4<f32>,
    camera_origin: Vector3<f32>,
    width: u32,
    height: u32,
    vertices_in: &[Vertex],
    vertices_out: &mut Vec<Vertex>,
) {
    vertices_out.clear();

    for vertex in vertices_in {
        let mut out = *vertex;

        let mut position = world_view_projection * vertex.position;
        let normal = world * to_hom_point(vertex.normal);
        let tangent = world * to_hom_point(vertex.tangent);

        position.x /= position.w;
        position.y /= position.w;
        position.z /= position.w;

        out.valid = !(position.x < -1.0
            || position.x > 1.0
            || position.y < -1.0
            || position.y > 1.0
            || position.z < 0.0
            || position.z > 1.0);

        position.x = (position.x + 1.0) / 2.0 * width as f32;
        position.y = (1.0 - position.y) / 2.0 * height as f32;

        out.position = position;
        out.normal = from_hom_vector(normal);
        out.tangent = from_hom_vector(tangent);
        out.view_direction = vector![position.x, position.y, position.z] - camera_origin;

        vertices_out.push(out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector2;

    fn lit_vertex(position: Vector3<f32>, uv: Vector2<f32>, normal: Vector3<f32>) -> Vertex {
        let mut vertex = Vertex::new(position, uv, normal);
        vertex.tangent = vector![1.0, 0.0, 0.0];
        return vertex;
    }

    fn test_camera() -> Camera {
        return Camera::new(45.0, vector![0.0, 0.0, 0.0], 1.0);
    }

    fn pixel(renderer: &Renderer, x: u32, y: u32) -> [u8; 3] {
        let index = (3 * (x + y * 64)) as usize;
        let data = renderer.as_render_data();
        return [data[index], data[index + 1], data[index + 2]];
    }

    #[test]
    fn test_strip_indices_swap_on_odd_triangles() {
        let positions = [
            vector![0.0, 0.0, 0.0],
            vector![1.0, 0.0, 0.0],
            vector![0.0, 1.0, 0.0],
            vector![1.0, 1.0, 0.0],
        ];
        let vertices: Vec<Vertex> = positions
            .iter()
            .map(|p| Vertex::new(*p, vector![0.0, 0.0], vector![0.0, 0.0, -1.0]))
            .collect();
        let mut mesh = Mesh::new(vertices, vec![0, 1, 2, 3], Topology::TriangleStrip);
        mesh.vertices_out = mesh.vertices.clone();

        // 4 strip indices make exactly 2 triangles.
        assert_eq!(mesh.indices.len() - 2, 2);

        let (a, b, c) = triangle_vertices(&mesh, 0);
        assert_eq!(a.position, mesh.vertices[0].position);
        assert_eq!(b.position, mesh.vertices[1].position);
        assert_eq!(c.position, mesh.vertices[2].position);

        // The odd triangle comes out as (1, 3, 2), not (1, 2, 3).
        let (a, b, c) = triangle_vertices(&mesh, 1);
        assert_eq!(a.position, mesh.vertices[1].position);
        assert_eq!(b.position, mesh.vertices[3].position);
        assert_eq!(c.position, mesh.vertices[2].position);
    }

    #[test]
    fn test_vertex_validity_is_boundary_inclusive() {
        let identity = Matrix4::identity();
        let vertices = vec![
            // NDC z exactly on the near and far bounds stays valid.
            Vertex::new(vector![0.0, 0.0, 0.0], vector![0.0, 0.0], vector![0.0, 0.0, 1.0]),
            Vertex::new(vector![0.0, 0.0, 1.0], vector![0.0, 0.0], vector![0.0, 0.0, 1.0]),
            Vertex::new(vector![0.0, 0.0, 1.5], vector![0.0, 0.0], vector![0.0, 0.0, 1.0]),
            Vertex::new(vector![0.0, 0.0, -0.1], vector![0.0, 0.0], vector![0.0, 0.0, 1.0]),
            Vertex::new(vector![1.0, -1.0, 0.5], vector![0.0, 0.0], vector![0.0, 0.0, 1.0]),
            Vertex::new(vector![1.2, 0.0, 0.5], vector![0.0, 0.0], vector![0.0, 0.0, 1.0]),
        ];
        let mut vertices_out = Vec::new();
        transform_vertices(
            &identity,
            &identity,
            vector![0.0, 0.0, 0.0],
            64,
            64,
            &vertices,
            &mut vertices_out,
        );

        assert_eq!(vertices_out.len(), vertices.len());
        assert!(vertices_out[0].valid);
        assert!(vertices_out[1].valid);
        assert!(!vertices_out[2].valid);
        assert!(!vertices_out[3].valid);
        assert!(vertices_out[4].valid);
        assert!(!vertices_out[5].valid);
    }

    #[test]
    fn test_ndc_to_screen_remap() {
        let identity = Matrix4::identity();
        let vertices = vec![
            Vertex::new(vector![0.0, 0.0, 0.5], vector![0.0, 0.0], vector![0.0, 0.0, 1.0]),
            Vertex::new(vector![-1.0, 1.0, 0.5], vector![0.0, 0.0], vector![0.0, 0.0, 1.0]),
        ];
        let mut vertices_out = Vec::new();
        transform_vertices(
            &identity,
            &identity,
            vector![0.0, 0.0, 0.0],
            64,
            64,
            &vertices,
            &mut vertices_out,
        );

        // NDC center lands on the screen center, (-1, 1) on the top left.
        assert!((vertices_out[0].position.x - 32.0).abs() < 1e-4);
        assert!((vertices_out[0].position.y - 32.0).abs() < 1e-4);
        assert!(vertices_out[1].position.x.abs() < 1e-4);
        assert!(vertices_out[1].position.y.abs() < 1e-4);
    }

    /// Two overlapping triangles must resolve to the same image no matter
    /// the submission order.
    #[test]
    fn test_depth_test_is_order_independent() {
        let light = vector![0.577, -0.577, 0.577];
        let away = vector![0.0, 0.0, -1.0];
        let uv = vector![0.0, 0.0];

        // Near triangle lit head-on, far triangle with the same screen
        // footprint facing away from the light.
        let near = vec![
            lit_vertex(vector![-20.0, -20.0, 50.0], uv, light),
            lit_vertex(vector![20.0, -20.0, 50.0], uv, light),
            lit_vertex(vector![0.0, 20.0, 50.0], uv, light),
        ];
        let far = vec![
            lit_vertex(vector![-24.0, -24.0, 60.0], uv, away),
            lit_vertex(vector![24.0, -24.0, 60.0], uv, away),
            lit_vertex(vector![0.0, 24.0, 60.0], uv, away),
        ];

        let render_order = |first: Vec<Vertex>, second: Vec<Vertex>| -> Vec<u8> {
            let meshes = vec![
                Mesh::new(first, vec![0, 1, 2], Topology::TriangleList),
                Mesh::new(second, vec![0, 1, 2], Topology::TriangleList),
            ];
            let mut renderer = Renderer::new(64, 64, meshes, TextureSet::flat_white());
            renderer.toggle_rotation();
            renderer.cycle_lighting_mode(); // Combined -> ObservedArea
            renderer.render(&test_camera());
            return renderer.as_render_data().to_vec();
        };

        let near_first = render_order(near.clone(), far.clone());
        let far_first = render_order(far, near);
        assert_eq!(near_first, far_first);

        // The near, lit triangle owns the center pixel.
        let center = (3 * (32 + 32 * 64)) as usize;
        assert!(near_first[center] > 250);
    }

    /// A flat white quad seen head-on in Diffuse mode renders as a uniform
    /// surface with a seamless diagonal and the clear color outside.
    #[test]
    fn test_quad_renders_seamlessly() {
        let light = vector![0.577, -0.577, 0.577];
        let mut vertices = vec![
            Vertex::new(vector![-10.0, -10.0, 50.0], vector![0.0, 0.0], light),
            Vertex::new(vector![10.0, -10.0, 50.0], vector![1.0, 0.0], light),
            Vertex::new(vector![10.0, 10.0, 50.0], vector![1.0, 1.0], light),
            Vertex::new(vector![-10.0, 10.0, 50.0], vector![0.0, 1.0], light),
        ];
        let indices = vec![0, 1, 2, 0, 2, 3];
        crate::mesh::accumulate_tangents(&mut vertices, &indices);

        let mesh = Mesh::new(vertices, indices, Topology::TriangleList);
        let mut renderer = Renderer::new(64, 64, vec![mesh], TextureSet::flat_white());
        renderer.toggle_rotation();
        renderer.cycle_lighting_mode(); // Combined -> ObservedArea
        renderer.cycle_lighting_mode(); // ObservedArea -> Diffuse
        renderer.render(&test_camera());

        // Every pixel well inside the footprint is saturated white, with no
        // seam along the shared diagonal.
        for xy in 20..45 {
            assert_eq!(pixel(&renderer, xy, xy), [255, 255, 255]);
            assert_eq!(pixel(&renderer, xy, 64 - xy), [255, 255, 255]);
        }

        // Outside the footprint only the clear color remains.
        assert_eq!(pixel(&renderer, 2, 2), CLEAR_COLOR);
        assert_eq!(pixel(&renderer, 61, 61), CLEAR_COLOR);
    }

    /// Partially visible triangles are dropped wholesale, not clipped.
    #[test]
    fn test_partially_visible_triangle_is_dropped() {
        // z = 25 doubles the projected extent of the z = 50 footprint, so
        // the triangle covers the screen center but its corners land
        // outside NDC bounds. The whole triangle goes, center included.
        let light = vector![0.577, -0.577, 0.577];
        let uv = vector![0.0, 0.0];
        let vertices = vec![
            lit_vertex(vector![-20.0, -20.0, 25.0], uv, light),
            lit_vertex(vector![20.0, -20.0, 25.0], uv, light),
            lit_vertex(vector![0.0, 20.0, 25.0], uv, light),
        ];
        let mesh = Mesh::new(vertices, vec![0, 1, 2], Topology::TriangleList);
        let mut renderer = Renderer::new(64, 64, vec![mesh], TextureSet::flat_white());
        renderer.toggle_rotation();
        renderer.render(&test_camera());

        assert_eq!(pixel(&renderer, 32, 32), CLEAR_COLOR);
    }
}
