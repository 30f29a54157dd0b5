//! Geometry catalog: the nine mesh variants blocks are built from
//!
//! Six top shapes and three bottom shapes, each registered once, plus the
//! map saying which bottom a given top sits on. The catalog is filled from
//! a [`GeometryProvider`] and is rejected unless every variant is present
//! and non-empty.

use glam::Vec3;

use super::vertex::Vertex;
use crate::error::InitError;
use crate::sim::block::{BlockEntity, BottomShape, TopShape};

/// Indexed triangle mesh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn is_empty(&self) -> bool {
        self.indices.len() < 3 || self.vertices.is_empty()
    }

    /// Local-space bounding box
    pub fn bounds(&self) -> (Vec3, Vec3) {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for v in &self.vertices {
            let p = Vec3::from_array(v.position);
            min = min.min(p);
            max = max.max(p);
        }
        if self.vertices.is_empty() {
            (Vec3::ZERO, Vec3::ZERO)
        } else {
            (min, max)
        }
    }
}

/// One of the nine catalog entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    Top(TopShape),
    Bottom(BottomShape),
}

impl GeometryKind {
    pub const COUNT: usize = TopShape::ALL.len() + BottomShape::ALL.len();

    /// Dense slot: tops first, then bottoms
    pub fn slot(self) -> usize {
        match self {
            GeometryKind::Top(top) => top.index(),
            GeometryKind::Bottom(bottom) => TopShape::ALL.len() + bottom.index(),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            GeometryKind::Top(top) => top.as_str(),
            GeometryKind::Bottom(bottom) => bottom.as_str(),
        }
    }

    pub fn all() -> impl Iterator<Item = GeometryKind> {
        TopShape::ALL
            .into_iter()
            .map(GeometryKind::Top)
            .chain(BottomShape::ALL.into_iter().map(GeometryKind::Bottom))
    }
}

/// Source of mesh variants (procedural, or an asset loader)
pub trait GeometryProvider {
    /// Every variant this provider can supply
    fn variants(&self) -> Result<Vec<(GeometryKind, Mesh)>, InitError>;

    /// Bottom a given top sits on
    fn compatible_bottom(&self, top: TopShape) -> BottomShape {
        top.bottom()
    }
}

#[derive(Debug, Clone)]
pub struct GeometryCatalog {
    meshes: Vec<Mesh>,
    bounds: Vec<(Vec3, Vec3)>,
    compatibility: [BottomShape; TopShape::ALL.len()],
}

impl GeometryCatalog {
    pub fn from_provider(provider: &dyn GeometryProvider) -> Result<Self, InitError> {
        let variants = provider.variants()?;
        let mut slots: Vec<Option<Mesh>> = vec![None; GeometryKind::COUNT];
        for (kind, mesh) in variants {
            if mesh.is_empty() {
                return Err(InitError::EmptyMesh(kind.label()));
            }
            slots[kind.slot()] = Some(mesh);
        }

        let present = slots.iter().filter(|s| s.is_some()).count();
        if present != GeometryKind::COUNT {
            return Err(InitError::IncompleteCatalog {
                expected: GeometryKind::COUNT,
                actual: present,
            });
        }

        let meshes: Vec<Mesh> = slots.into_iter().flatten().collect();
        let bounds = meshes.iter().map(Mesh::bounds).collect();
        let compatibility = TopShape::ALL.map(|top| provider.compatible_bottom(top));

        log::debug!(
            "Geometry catalog loaded: {} variants, {} vertices",
            meshes.len(),
            meshes.iter().map(|m| m.vertices.len()).sum::<usize>()
        );

        Ok(Self {
            meshes,
            bounds,
            compatibility,
        })
    }

    pub fn mesh(&self, kind: GeometryKind) -> &Mesh {
        &self.meshes[kind.slot()]
    }

    pub fn bounds(&self, kind: GeometryKind) -> (Vec3, Vec3) {
        self.bounds[kind.slot()]
    }

    pub fn bottom_for(&self, top: TopShape) -> BottomShape {
        self.compatibility[top.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (GeometryKind, &Mesh)> {
        GeometryKind::all().map(move |kind| (kind, self.mesh(kind)))
    }

    /// Vertex and index budget for a set of blocks: per-variant counts summed
    /// over every block's top and bottom
    pub fn budget_for(&self, blocks: &[BlockEntity]) -> (u32, u32) {
        blocks.iter().fold((0, 0), |(v, i), block| {
            let top = self.mesh(GeometryKind::Top(block.top));
            let bottom = self.mesh(GeometryKind::Bottom(self.bottom_for(block.top)));
            (
                v + (top.vertices.len() + bottom.vertices.len()) as u32,
                i + (top.indices.len() + bottom.indices.len()) as u32,
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::shapes::ProceduralShapes;

    struct Partial(usize);

    impl GeometryProvider for Partial {
        fn variants(&self) -> Result<Vec<(GeometryKind, Mesh)>, InitError> {
            let full = ProceduralShapes::default().variants()?;
            Ok(full.into_iter().take(self.0).collect())
        }
    }

    struct Hollow;

    impl GeometryProvider for Hollow {
        fn variants(&self) -> Result<Vec<(GeometryKind, Mesh)>, InitError> {
            Ok(GeometryKind::all().map(|k| (k, Mesh::default())).collect())
        }
    }

    #[test]
    fn test_slots_are_dense() {
        let mut slots: Vec<usize> = GeometryKind::all().map(GeometryKind::slot).collect();
        slots.sort();
        assert_eq!(slots, (0..GeometryKind::COUNT).collect::<Vec<_>>());
    }

    #[test]
    fn test_procedural_catalog_complete() {
        let catalog = GeometryCatalog::from_provider(&ProceduralShapes::default()).unwrap();
        assert_eq!(catalog.iter().count(), 9);
        assert_eq!(catalog.bottom_for(TopShape::Dome), BottomShape::Tapered);
    }

    #[test]
    fn test_missing_variant_rejected() {
        let err = GeometryCatalog::from_provider(&Partial(8)).unwrap_err();
        assert!(matches!(err, InitError::IncompleteCatalog { expected: 9, actual: 8 }));
    }

    #[test]
    fn test_empty_mesh_rejected() {
        let err = GeometryCatalog::from_provider(&Hollow).unwrap_err();
        assert!(matches!(err, InitError::EmptyMesh(_)));
    }

    #[test]
    fn test_bottom_bounds_span_unit_height() {
        let catalog = GeometryCatalog::from_provider(&ProceduralShapes::default()).unwrap();
        for bottom in BottomShape::ALL {
            let (min, max) = catalog.bounds(GeometryKind::Bottom(bottom));
            assert!(min.y.abs() < 1e-6 && (max.y - 1.0).abs() < 1e-6, "{bottom:?}");
            assert!(max.x <= 0.5 + 1e-6 && min.x >= -0.5 - 1e-6);
        }
    }
}
