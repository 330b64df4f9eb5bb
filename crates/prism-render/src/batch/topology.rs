//! Static per-vertex geometry shared by every instance of a batch.

use prism_core::math::Vec3;

/// Indexed triangle list with per-vertex position, normal and uv.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Topology {
    pub indices: Vec<u32>,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
}

impl Topology {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Unit quad in the xy plane, uv equal to position.
    ///
    /// SDF and image shaders place the quad from the instance extras, so the
    /// positions only matter as uv carriers.
    pub fn quad() -> Self {
        Self {
            indices: vec![0, 1, 2, 0, 2, 3],
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
            normals: vec![[0.0, 0.0, 1.0]; 4],
            uvs: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
        }
    }

    /// Axis-aligned box centered on the origin, each face split into a grid.
    ///
    /// `segments` is `[width, height, depth]`; zero counts are treated as one.
    pub fn cuboid(width: f32, height: f32, depth: f32, segments: [u32; 3]) -> Self {
        let [ws, hs, ds] = segments.map(|s| s.max(1));
        let (hx, hy, hz) = (width / 2.0, height / 2.0, depth / 2.0);

        let corners = [
            Vec3::new(-hx, -hy, hz),
            Vec3::new(hx, -hy, hz),
            Vec3::new(hx, hy, hz),
            Vec3::new(-hx, hy, hz),
            Vec3::new(hx, -hy, -hz),
            Vec3::new(-hx, -hy, -hz),
            Vec3::new(-hx, hy, -hz),
            Vec3::new(hx, hy, -hz),
        ];

        // ([origin, u end, v end] corners, normal, u segments, v segments)
        let faces = [
            ([0, 1, 3], Vec3::Z, ws, hs),
            ([4, 5, 7], Vec3::NEG_Z, ws, hs),
            ([3, 2, 6], Vec3::Y, ws, ds),
            ([1, 0, 4], Vec3::NEG_Y, ws, ds),
            ([1, 4, 2], Vec3::X, ds, hs),
            ([5, 0, 6], Vec3::NEG_X, ds, hs),
        ];

        let mut topology = Topology::default();
        for ([origin, u_end, v_end], normal, u_segments, v_segments) in faces {
            let base = topology.positions.len() as u32;
            let (o, a, b) = (corners[origin], corners[u_end], corners[v_end]);
            for i in 0..=u_segments {
                for j in 0..=v_segments {
                    let u = i as f32 / u_segments as f32;
                    let v = j as f32 / v_segments as f32;
                    let position = o.lerp(a, u) + (o.lerp(b, v) - o);
                    topology.positions.push(position.to_array());
                    topology.normals.push(normal.to_array());
                    topology.uvs.push([u, v]);

                    if i < u_segments && j < v_segments {
                        let vertex = base + i * (v_segments + 1) + j;
                        let next_row = vertex + v_segments + 1;
                        topology.indices.extend([next_row, vertex + 1, vertex]);
                        topology.indices.extend([next_row, next_row + 1, vertex + 1]);
                    }
                }
            }
        }
        topology
    }
}
