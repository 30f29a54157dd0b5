//! Procedural mesh generation for block tops and bottoms
//!
//! All meshes share a unit footprint (x, z in [-0.5, 0.5]) and start at
//! y = 0. Bottoms are one unit tall and get stretched to the block height;
//! tops are short caps placed at that height.

use glam::{Vec2, Vec3};
use std::f32::consts::{PI, TAU};

use super::catalog::{GeometryKind, GeometryProvider, Mesh};
use super::vertex::Vertex;
use crate::error::InitError;
use crate::sim::block::{BottomShape, TopShape};

/// Collects flat-shaded convex faces
#[derive(Default)]
struct MeshBuilder {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
}

impl MeshBuilder {
    /// Add a convex polygon, wound so its normal points away from `inside`
    fn face(&mut self, points: &[Vec3], inside: Vec3) {
        if points.len() < 3 {
            return;
        }

        // Newell's method: robust for any planar convex polygon
        let mut normal = Vec3::ZERO;
        for (i, cur) in points.iter().enumerate() {
            let next = points[(i + 1) % points.len()];
            normal.x += (cur.y - next.y) * (cur.z + next.z);
            normal.y += (cur.z - next.z) * (cur.x + next.x);
            normal.z += (cur.x - next.x) * (cur.y + next.y);
        }
        let Some(mut normal) = normal.try_normalize() else {
            return;
        };

        let centroid = points.iter().copied().sum::<Vec3>() / points.len() as f32;
        let base = self.vertices.len() as u32;
        if normal.dot(centroid - inside) < 0.0 {
            normal = -normal;
            self.vertices.extend(points.iter().rev().map(|&p| Vertex::new(p, normal)));
        } else {
            self.vertices.extend(points.iter().map(|&p| Vertex::new(p, normal)));
        }

        for i in 1..points.len() as u32 - 1 {
            self.indices.extend_from_slice(&[base, base + i, base + i + 1]);
        }
    }

    /// Side walls and caps between two horizontal rings of equal length
    fn prism(&mut self, lower: &[Vec3], upper: &[Vec3]) {
        let inside = (lower.iter().chain(upper).copied().sum::<Vec3>()) / (lower.len() + upper.len()) as f32;
        let n = lower.len();
        for i in 0..n {
            let j = (i + 1) % n;
            self.face(&[lower[i], lower[j], upper[j], upper[i]], inside);
        }
        self.face(lower, inside);
        self.face(upper, inside);
    }

    /// Side triangles from a ring up to an apex, plus the base cap
    fn cone(&mut self, ring: &[Vec3], apex: Vec3) {
        let inside = (ring.iter().copied().sum::<Vec3>() + apex) / (ring.len() + 1) as f32;
        for i in 0..ring.len() {
            let j = (i + 1) % ring.len();
            self.face(&[ring[i], ring[j], apex], inside);
        }
        self.face(ring, inside);
    }

    fn finish(self) -> Mesh {
        Mesh {
            vertices: self.vertices,
            indices: self.indices,
        }
    }
}

/// Rectangle ring at height `y`
fn square_ring(half: Vec2, y: f32) -> Vec<Vec3> {
    vec![
        Vec3::new(-half.x, y, -half.y),
        Vec3::new(half.x, y, -half.y),
        Vec3::new(half.x, y, half.y),
        Vec3::new(-half.x, y, half.y),
    ]
}

/// Square ring with its corners cut by `cut`
fn chamfer_ring(half: f32, cut: f32, y: f32) -> Vec<Vec3> {
    let inner = half - cut;
    vec![
        Vec3::new(-inner, y, -half),
        Vec3::new(inner, y, -half),
        Vec3::new(half, y, -inner),
        Vec3::new(half, y, inner),
        Vec3::new(inner, y, half),
        Vec3::new(-inner, y, half),
        Vec3::new(-half, y, inner),
        Vec3::new(-half, y, -inner),
    ]
}

fn circle_ring(center: Vec2, radius: f32, y: f32, segments: u32) -> Vec<Vec3> {
    (0..segments)
        .map(|i| {
            let theta = i as f32 / segments as f32 * TAU;
            Vec3::new(center.x + radius * theta.cos(), y, center.y + radius * theta.sin())
        })
        .collect()
}

/// Built-in geometry provider
#[derive(Debug, Clone, Copy)]
pub struct ProceduralShapes {
    /// Segments around round features
    pub segments: u32,
}

impl Default for ProceduralShapes {
    fn default() -> Self {
        Self { segments: 12 }
    }
}

impl ProceduralShapes {
    pub fn top(&self, shape: TopShape) -> Mesh {
        let segments = self.segments.max(3);
        let mut b = MeshBuilder::default();
        match shape {
            TopShape::Flat => {
                b.prism(&square_ring(Vec2::splat(0.5), 0.0), &square_ring(Vec2::splat(0.5), 0.15));
            }
            TopShape::Bevel => {
                b.prism(&square_ring(Vec2::splat(0.5), 0.0), &square_ring(Vec2::splat(0.36), 0.2));
            }
            TopShape::Dome => {
                let rings = (segments / 2).max(2);
                let radius = 0.45;
                let mut previous = circle_ring(Vec2::ZERO, radius, 0.0, segments);
                let inside = Vec3::ZERO;
                for r in 1..rings {
                    let phi = r as f32 / rings as f32 * PI * 0.5;
                    let ring = circle_ring(Vec2::ZERO, radius * phi.cos(), radius * phi.sin(), segments);
                    for i in 0..segments as usize {
                        let j = (i + 1) % segments as usize;
                        b.face(&[previous[i], previous[j], ring[j], ring[i]], inside);
                    }
                    previous = ring;
                }
                let apex = Vec3::new(0.0, radius, 0.0);
                for i in 0..segments as usize {
                    let j = (i + 1) % segments as usize;
                    b.face(&[previous[i], previous[j], apex], inside);
                }
                b.face(&circle_ring(Vec2::ZERO, radius, 0.0, segments), Vec3::new(0.0, radius * 0.5, 0.0));
            }
            TopShape::Pyramid => {
                b.cone(&square_ring(Vec2::splat(0.5), 0.0), Vec3::new(0.0, 0.45, 0.0));
            }
            TopShape::Studs => {
                b.prism(&square_ring(Vec2::splat(0.5), 0.0), &square_ring(Vec2::splat(0.5), 0.1));
                for (x, z) in [(-0.25, -0.25), (0.25, -0.25), (0.25, 0.25), (-0.25, 0.25)] {
                    let c = Vec2::new(x, z);
                    b.prism(
                        &circle_ring(c, 0.12, 0.1, segments),
                        &circle_ring(c, 0.12, 0.22, segments),
                    );
                }
            }
            TopShape::Ridge => {
                // Triangular prism running along x
                let inside = Vec3::new(0.0, 0.1, 0.0);
                let (h, w) = (0.3, 0.5);
                let left = [
                    Vec3::new(-w, 0.0, -w),
                    Vec3::new(-w, 0.0, w),
                    Vec3::new(-w, h, 0.0),
                ];
                let right = left.map(|p| Vec3::new(w, p.y, p.z));
                b.face(&left, inside);
                b.face(&right, inside);
                b.face(&[left[0], right[0], right[1], left[1]], inside);
                b.face(&[left[0], left[2], right[2], right[0]], inside);
                b.face(&[left[1], right[1], right[2], left[2]], inside);
            }
        }
        b.finish()
    }

    pub fn bottom(&self, shape: BottomShape) -> Mesh {
        let mut b = MeshBuilder::default();
        match shape {
            BottomShape::Pillar => {
                b.prism(&square_ring(Vec2::splat(0.5), 0.0), &square_ring(Vec2::splat(0.5), 1.0));
            }
            BottomShape::Chamfered => {
                b.prism(&chamfer_ring(0.5, 0.12, 0.0), &chamfer_ring(0.5, 0.12, 1.0));
            }
            BottomShape::Tapered => {
                b.prism(&square_ring(Vec2::splat(0.5), 0.0), &square_ring(Vec2::splat(0.44), 1.0));
            }
        }
        b.finish()
    }
}

impl GeometryProvider for ProceduralShapes {
    fn variants(&self) -> Result<Vec<(GeometryKind, Mesh)>, InitError> {
        let tops = TopShape::ALL.into_iter().map(|t| (GeometryKind::Top(t), self.top(t)));
        let bottoms = BottomShape::ALL
            .into_iter()
            .map(|s| (GeometryKind::Bottom(s), self.bottom(s)));
        Ok(tops.chain(bottoms).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outward(mesh: &Mesh, inside: Vec3) -> bool {
        mesh.indices.chunks(3).all(|tri| {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| Vec3::from_array(mesh.vertices[i as usize].position));
            let n = (b - a).cross(c - a);
            n.dot((a + b + c) / 3.0 - inside) >= -1e-6
        })
    }

    #[test]
    fn test_all_variants_non_empty() {
        let variants = ProceduralShapes::default().variants().unwrap();
        assert_eq!(variants.len(), 9);
        for (kind, mesh) in variants {
            assert!(!mesh.is_empty(), "{kind:?}");
            assert_eq!(mesh.indices.len() % 3, 0);
            assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertices.len()));
        }
    }

    #[test]
    fn test_pillar_winding_outward() {
        let mesh = ProceduralShapes::default().bottom(BottomShape::Pillar);
        assert_eq!(mesh.indices.len(), 6 * 6);
        assert!(outward(&mesh, Vec3::new(0.0, 0.5, 0.0)));
    }

    #[test]
    fn test_tops_fit_footprint() {
        let shapes = ProceduralShapes::default();
        for top in TopShape::ALL {
            let (min, max) = shapes.top(top).bounds();
            assert!(min.y >= -1e-6, "{top:?} dips below its base");
            assert!(max.x <= 0.5 + 1e-6 && min.z >= -0.5 - 1e-6, "{top:?}");
        }
    }
}
