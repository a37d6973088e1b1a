use nalgebra as na;
use na::{vector, Matrix4, Vector2, Vector3, Vector4};
use obj::{Obj, TexturedVertex};

use crate::util::from_hom_vector;

/// How the index list maps to triangles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// Every 3 consecutive indices form one triangle.
    TriangleList,
    /// Every window of 3 consecutive indices forms one triangle, with
    /// winding alternating per triangle.
    TriangleStrip,
}

/// Vertex state threaded through the whole pipeline. Position starts out in
/// model space and is overwritten in place on the way to screen space.
#[derive(Debug, Clone, Copy)]
pub struct Vertex {
    pub position: Vector4<f32>,
    pub color: Vector3<f32>,
    pub uv: Vector2<f32>,
    /// False once the vertex fails the post-projection bounds test.
    pub valid: bool,
    pub normal: Vector3<f32>,
    pub tangent: Vector3<f32>,
    /// Populated by the screen-space transform, meaningless before it.
    pub view_direction: Vector3<f32>,
}

impl Vertex {
    pub fn new(position: Vector3<f32>, uv: Vector2<f32>, normal: Vector3<f32>) -> Vertex {
        return Vertex {
            position: vector![position.x, position.y, position.z, 1.0],
            color: vector![1.0, 1.0, 1.0],
            uv,
            valid: true,
            normal,
            tangent: vector![0.0, 0.0, 0.0],
            view_direction: vector![0.0, 0.0, 0.0],
        };
    }
}

/// Mesh - vertex and index lists, index layout tag, world transform and a
/// transient buffer of transformed vertices, rewritten every frame.
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub topology: Topology,
    pub world_matrix: Matrix4<f32>,
    pub vertices_out: Vec<Vertex>,
}

impl Mesh {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>, topology: Topology) -> Mesh {
        return Mesh {
            vertices,
            indices,
            topology,
            world_matrix: Matrix4::identity(),
            vertices_out: Vec::new(),
        };
    }

    /// Builds a triangle list mesh from a loaded OBJ model. The v texture
    /// coordinate is flipped to match the top-left texture origin, and
    /// tangents are accumulated from uv deltas since the OBJ format does not
    /// carry them.
    pub fn from_obj(model: &Obj<TexturedVertex, u32>) -> Mesh {
        let mut vertices: Vec<Vertex> = model
            .vertices
            .iter()
            .map(|vertex| {
                Vertex::new(
                    vector![vertex.position[0], vertex.position[1], vertex.position[2]],
                    vector![vertex.texture[0], 1.0 - vertex.texture[1]],
                    vector![vertex.normal[0], vertex.normal[1], vertex.normal[2]],
                )
            })
            .collect();
        accumulate_tangents(&mut vertices, &model.indices);
        return Mesh::new(vertices, model.indices.clone(), Topology::TriangleList);
    }
}

/// Per-triangle tangent accumulation: each triangle contributes the surface
/// direction in which u grows to all 3 of its corners, and the sums are
/// orthogonalized against the vertex normal at the end.
pub fn accumulate_tangents(vertices: &mut [Vertex], indices: &[u32]) {
    let mut tangents = vec![Vector3::zeros(); vertices.len()];
    for triangle in indices.chunks_exact(3) {
        let (i0, i1, i2) = (triangle[0] as usize, triangle[1] as usize, triangle[2] as usize);
        let edge_1 = from_hom_vector(vertices[i1].position - vertices[i0].position);
        let edge_2 = from_hom_vector(vertices[i2].position - vertices[i0].position);
        let delta_uv_1 = vertices[i1].uv - vertices[i0].uv;
        let delta_uv_2 = vertices[i2].uv - vertices[i0].uv;

        // Triangles with a degenerate uv mapping contribute nothing.
        let determinant = delta_uv_1.x * delta_uv_2.y - delta_uv_2.x * delta_uv_1.y;
        if determinant.abs() < 1e-7 {
            continue;
        }
        let tangent = (edge_1 * delta_uv_2.y - edge_2 * delta_uv_1.y) / determinant;
        tangents[i0] += tangent;
        tangents[i1] += tangent;
        tangents[i2] += tangent;
    }

    for (vertex, tangent) in vertices.iter_mut().zip(tangents) {
        let projected = tangent - vertex.normal * vertex.normal.dot(&tangent);
        vertex.tangent = projected
            .try_normalize(1e-7)
            .unwrap_or_else(|| vector![1.0, 0.0, 0.0]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_vertices() -> Vec<Vertex> {
        let normal = vector![0.0, 0.0, -1.0];
        return vec![
            Vertex::new(vector![0.0, 0.0, 0.0], vector![0.0, 0.0], normal),
            Vertex::new(vector![1.0, 0.0, 0.0], vector![1.0, 0.0], normal),
            Vertex::new(vector![1.0, 1.0, 0.0], vector![1.0, 1.0], normal),
            Vertex::new(vector![0.0, 1.0, 0.0], vector![0.0, 1.0], normal),
        ];
    }

    #[test]
    fn test_tangents_follow_u_direction() {
        let mut vertices = quad_vertices();
        accumulate_tangents(&mut vertices, &[0, 1, 2, 0, 2, 3]);
        for vertex in &vertices {
            assert!((vertex.tangent - vector![1.0, 0.0, 0.0]).norm() < 1e-4);
        }
    }

    #[test]
    fn test_tangents_are_orthogonal_to_normals() {
        let mut vertices = quad_vertices();
        accumulate_tangents(&mut vertices, &[0, 1, 2, 0, 2, 3]);
        for vertex in &vertices {
            assert!(vertex.tangent.dot(&vertex.normal).abs() < 1e-4);
            assert!((vertex.tangent.norm() - 1.0).abs() < 1e-4);
        }
    }
}
