//! Instanced render batch
//!
//! Every block is drawn as two instances sharing one batch: handle `2i` is
//! the bottom of entity `i` and `2i + 1` its top. Capacity, vertex and index
//! budgets are fixed at allocation; nothing is reallocated per frame.
//!
//! The batch keeps CPU-side instance state and hands the GPU backend a
//! geometry-grouped copy each frame, so handle order and draw order are
//! independent.

use glam::{Mat4, Quat, Vec3};

use super::catalog::Mesh;
use super::vertex::{InstanceRaw, Vertex};
use crate::camera::Ray;
use crate::error::BatchError;

/// Registered mesh variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryId(pub u32);

/// Render instance slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceHandle(pub u32);

impl InstanceHandle {
    pub fn bottom_of(entity: usize) -> Self {
        Self(entity as u32 * 2)
    }

    pub fn top_of(entity: usize) -> Self {
        Self(entity as u32 * 2 + 1)
    }

    pub fn is_top(self) -> bool {
        self.0 % 2 == 1
    }
}

/// Entity owning a render instance (even/odd pairing)
#[inline]
pub fn entity_index_of(handle: InstanceHandle) -> usize {
    (handle.0 / 2) as usize
}

#[derive(Debug, Clone, Copy)]
struct GeometryRange {
    first_index: u32,
    index_count: u32,
    local_min: Vec3,
    local_max: Vec3,
}

#[derive(Debug, Clone, Copy)]
struct InstanceState {
    geometry: GeometryId,
    model: Mat4,
    color: Vec3,
}

/// One instanced draw call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawGroup {
    pub indices: std::ops::Range<u32>,
    pub instances: std::ops::Range<u32>,
}

/// Nearest instance along a ray
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub handle: InstanceHandle,
    pub distance: f32,
}

/// Live resource totals, all zero after disposal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceCounts {
    pub geometries: u32,
    pub instances: u32,
    pub vertices: u32,
    pub indices: u32,
}

impl ResourceCounts {
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Default)]
pub struct InstancedRenderBatch {
    capacity: u32,
    vertex_budget: u32,
    index_budget: u32,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    geometries: Vec<GeometryRange>,
    instances: Vec<InstanceState>,
    /// Bumped whenever mesh data changes, so the backend knows to upload
    geometry_revision: u64,
    disposed: bool,
}

impl InstancedRenderBatch {
    /// Reserve storage for `2 * entity_count` instances
    pub fn allocate(entity_count: usize, vertex_budget: u32, index_budget: u32) -> Self {
        let capacity = entity_count as u32 * 2;
        Self {
            capacity,
            vertex_budget,
            index_budget,
            vertices: Vec::with_capacity(vertex_budget as usize),
            indices: Vec::with_capacity(index_budget as usize),
            geometries: Vec::new(),
            instances: Vec::with_capacity(capacity as usize),
            geometry_revision: 0,
            disposed: false,
        }
    }

    pub fn add_geometry(&mut self, mesh: &Mesh) -> Result<GeometryId, BatchError> {
        if self.disposed {
            return Err(BatchError::Disposed);
        }
        let vertices_needed = (self.vertices.len() + mesh.vertices.len()) as u32;
        if vertices_needed > self.vertex_budget {
            return Err(BatchError::VertexBudget {
                budget: self.vertex_budget,
                needed: vertices_needed,
            });
        }
        let indices_needed = (self.indices.len() + mesh.indices.len()) as u32;
        if indices_needed > self.index_budget {
            return Err(BatchError::IndexBudget {
                budget: self.index_budget,
                needed: indices_needed,
            });
        }

        let (local_min, local_max) = mesh.bounds();
        let base_vertex = self.vertices.len() as u32;
        let range = GeometryRange {
            first_index: self.indices.len() as u32,
            index_count: mesh.indices.len() as u32,
            local_min,
            local_max,
        };
        self.vertices.extend_from_slice(&mesh.vertices);
        // Indices are stored pre-offset so draws never need a base vertex
        self.indices.extend(mesh.indices.iter().map(|i| i + base_vertex));
        self.geometries.push(range);
        self.geometry_revision += 1;
        Ok(GeometryId(self.geometries.len() as u32 - 1))
    }

    /// Reserve the next instance slot. Starts with an identity transform.
    pub fn add_instance(&mut self, geometry: GeometryId) -> Result<InstanceHandle, BatchError> {
        if self.disposed {
            return Err(BatchError::Disposed);
        }
        if geometry.0 as usize >= self.geometries.len() {
            return Err(BatchError::UnknownGeometry(geometry));
        }
        if self.instances.len() as u32 >= self.capacity {
            return Err(BatchError::InstanceCapacity { capacity: self.capacity });
        }
        self.instances.push(InstanceState {
            geometry,
            model: Mat4::IDENTITY,
            color: Vec3::ONE,
        });
        Ok(InstanceHandle(self.instances.len() as u32 - 1))
    }

    fn instance_mut(&mut self, handle: InstanceHandle) -> Result<&mut InstanceState, BatchError> {
        if self.disposed {
            return Err(BatchError::Disposed);
        }
        self.instances
            .get_mut(handle.0 as usize)
            .ok_or(BatchError::UnknownInstance(handle))
    }

    pub fn set_transform(
        &mut self,
        handle: InstanceHandle,
        translation: Vec3,
        rotation: Quat,
        scale: Vec3,
    ) -> Result<(), BatchError> {
        self.instance_mut(handle)?.model = Mat4::from_scale_rotation_translation(scale, rotation, translation);
        Ok(())
    }

    pub fn set_color(&mut self, handle: InstanceHandle, color: Vec3) -> Result<(), BatchError> {
        self.instance_mut(handle)?.color = color;
        Ok(())
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn instance_count(&self) -> u32 {
        self.instances.len() as u32
    }

    pub fn geometry_count(&self) -> u32 {
        self.geometries.len() as u32
    }

    pub fn geometry_revision(&self) -> u64 {
        self.geometry_revision
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn resource_counts(&self) -> ResourceCounts {
        ResourceCounts {
            geometries: self.geometry_count(),
            instances: self.instance_count(),
            vertices: self.vertices.len() as u32,
            indices: self.indices.len() as u32,
        }
    }

    /// Closest instance hit by `ray`
    pub fn raycast(&self, ray: &Ray) -> Option<RayHit> {
        let mut best: Option<RayHit> = None;
        for (i, instance) in self.instances.iter().enumerate() {
            let range = &self.geometries[instance.geometry.0 as usize];
            let Some(distance) = ray.hit_obb(&instance.model, range.local_min, range.local_max) else {
                continue;
            };
            if best.is_none_or(|b| distance < b.distance) {
                best = Some(RayHit {
                    handle: InstanceHandle(i as u32),
                    distance,
                });
            }
        }
        best
    }

    /// Instance data grouped by geometry plus the draw calls covering it
    pub fn packed_instances(&self) -> (Vec<InstanceRaw>, Vec<DrawGroup>) {
        let mut per_geometry: Vec<Vec<InstanceRaw>> = vec![Vec::new(); self.geometries.len()];
        for instance in &self.instances {
            per_geometry[instance.geometry.0 as usize].push(InstanceRaw::new(instance.model, instance.color));
        }

        let mut raw = Vec::with_capacity(self.instances.len());
        let mut groups = Vec::new();
        for (range, bucket) in self.geometries.iter().zip(per_geometry) {
            if bucket.is_empty() {
                continue;
            }
            let start = raw.len() as u32;
            raw.extend(bucket);
            groups.push(DrawGroup {
                indices: range.first_index..range.first_index + range.index_count,
                instances: start..raw.len() as u32,
            });
        }
        (raw, groups)
    }

    /// Release all geometry and instance storage. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.vertices = Vec::new();
        self.indices = Vec::new();
        self.geometries.clear();
        self.instances = Vec::new();
        self.capacity = 0;
        self.geometry_revision += 1;
        self.disposed = true;
    }
}
