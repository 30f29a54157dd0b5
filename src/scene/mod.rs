//! Scene context
//!
//! Owns every piece of per-session state: the packed blocks, the contestant
//! roster, the instanced batch, the wave field, lazily
//! created agent animations, and the camera with its autofocus. Consumers
//! receive the scene by reference; there is no global instance.
//!
//! Per frame, [`Scene::update`] advances the wave field, then agents, then
//! autofocus, and finally writes every instance transform and color.

pub mod lifecycle;
pub mod selection;

pub use lifecycle::{FrameLoop, Viewer};

use std::collections::BTreeMap;

use glam::{Quat, Vec2, Vec3};
use rand::SeedableRng;
use rand_pcg::Pcg32;

use crate::camera::{Camera, CameraAutofocus};
use crate::consts::*;
use crate::contestants::{ContestantId, ContestantRoster};
use crate::error::{BatchError, InitError};
use crate::renderer::batch::{GeometryId, InstanceHandle, InstancedRenderBatch, ResourceCounts};
use crate::renderer::catalog::{GeometryCatalog, GeometryKind, GeometryProvider};
use crate::renderer::FrameView;
use crate::settings::Settings;
use crate::sim::agent::AgentAnimation;
use crate::sim::block::{BlockEntity, BlockId, BlockStore};
use crate::sim::packer::GridPacker;
use crate::sim::wave::{ColorMode, WaveField, WaveInputs};

/// Payload of a successful block selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockClick {
    pub index: usize,
    pub id: BlockId,
    pub contestant: Option<ContestantId>,
}

pub type BlockClickCallback = Box<dyn FnMut(&BlockClick)>;

pub struct Scene {
    blocks: BlockStore,
    roster: ContestantRoster,
    batch: InstancedRenderBatch,
    wave: WaveField,
    /// Created on first interaction, keyed by entity index
    agents: BTreeMap<usize, AgentAnimation>,
    camera: Camera,
    autofocus: CameraAutofocus,

    selected: Option<usize>,
    active_agent: Option<usize>,
    active_category: Option<String>,
    /// Pointer projected onto the ground plane
    pointer: Option<Vec2>,
    elapsed: f32,
    depth_of_field: bool,
    on_block_click: Option<BlockClickCallback>,
    torn_down: bool,
}

/// Register the variants the blocks use and reserve two instances per block
fn populate_batch(
    batch: &mut InstancedRenderBatch,
    catalog: &GeometryCatalog,
    blocks: &BlockStore,
) -> Result<(), BatchError> {
    let mut used = [false; GeometryKind::COUNT];
    for block in blocks.iter() {
        used[GeometryKind::Top(block.top).slot()] = true;
        used[GeometryKind::Bottom(block.bottom).slot()] = true;
    }

    let mut ids: [Option<GeometryId>; GeometryKind::COUNT] = [None; GeometryKind::COUNT];
    for (kind, mesh) in catalog.iter() {
        if used[kind.slot()] {
            ids[kind.slot()] = Some(batch.add_geometry(mesh)?);
        }
    }

    let id_of = |kind: GeometryKind| ids[kind.slot()].ok_or(BatchError::UnknownGeometry(GeometryId(kind.slot() as u32)));
    for (i, block) in blocks.iter().enumerate() {
        let bottom = id_of(GeometryKind::Bottom(block.bottom))?;
        let top = id_of(GeometryKind::Top(block.top))?;
        let b = batch.add_instance(bottom)?;
        let t = batch.add_instance(top)?;
        debug_assert_eq!((b, t), (InstanceHandle::bottom_of(i), InstanceHandle::top_of(i)));
    }
    Ok(())
}

/// Top cap resting pose: translation and scale
fn top_rest_pose(block: &BlockEntity) -> (Vec3, Vec3) {
    let footprint = block.size * TILE_GAP;
    (
        Vec3::new(block.center.x, block.height, block.center.y),
        Vec3::new(footprint.x, block.size.min_element(), footprint.y),
    )
}

impl Scene {
    /// Pack the zone, load geometry and allocate the render batch
    pub fn new(
        settings: &Settings,
        roster: ContestantRoster,
        provider: &dyn GeometryProvider,
        viewport: Vec2,
        seed: u64,
    ) -> Result<Self, InitError> {
        let zone = settings.zone();
        if zone.x <= 0 || zone.y <= 0 {
            return Err(InitError::EmptyZone {
                width: zone.x,
                height: zone.y,
            });
        }
        if zone.x.checked_mul(zone.y).is_none_or(|cells| cells as usize > MAX_ZONE_CELLS) {
            return Err(InitError::ZoneTooLarge {
                width: zone.x,
                height: zone.y,
                max: MAX_ZONE_CELLS,
            });
        }

        let catalog = GeometryCatalog::from_provider(provider)?;

        let mut rng = Pcg32::seed_from_u64(seed);
        let mut blocks = GridPacker::new(settings.packer_config()).pack(zone, &roster, &mut rng);
        for block in blocks.iter_mut() {
            block.bottom = catalog.bottom_for(block.top);
        }

        let (vertex_budget, index_budget) = catalog.budget_for(blocks.as_slice());
        let mut batch = InstancedRenderBatch::allocate(blocks.len(), vertex_budget, index_budget);
        if let Err(e) = populate_batch(&mut batch, &catalog, &blocks) {
            batch.dispose();
            return Err(e.into());
        }

        let wave = WaveField::new(
            settings.wave_config(),
            seed as u32 as i32,
            settings.color_mode,
            blocks.as_slice(),
        );
        let camera = Camera::framing(zone, viewport);
        let autofocus = CameraAutofocus::new(&camera);

        log::info!(
            "Scene created: {}x{} zone, {} blocks, {} instances, seed {}",
            zone.x,
            zone.y,
            blocks.len(),
            batch.instance_count(),
            seed
        );

        let mut scene = Self {
            blocks,
            roster,
            batch,
            wave,
            agents: BTreeMap::new(),
            camera,
            autofocus,
            selected: None,
            active_agent: None,
            active_category: None,
            pointer: None,
            elapsed: 0.0,
            depth_of_field: settings.effective_depth_of_field(),
            on_block_click: None,
            torn_down: false,
        };
        scene.write_instances();
        Ok(scene)
    }

    pub fn blocks(&self) -> &BlockStore {
        &self.blocks
    }

    pub fn roster(&self) -> &ContestantRoster {
        &self.roster
    }

    pub fn batch(&self) -> &InstancedRenderBatch {
        &self.batch
    }

    pub fn wave(&self) -> &WaveField {
        &self.wave
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn agent(&self, index: usize) -> Option<&AgentAnimation> {
        self.agents.get(&index)
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn active_category(&self) -> Option<&str> {
        self.active_category.as_deref()
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn resource_counts(&self) -> ResourceCounts {
        self.batch.resource_counts()
    }

    pub fn set_on_block_click(&mut self, callback: Option<BlockClickCallback>) {
        self.on_block_click = callback;
    }

    /// Pointer in screen coordinates; None when it left the canvas
    pub fn set_pointer_screen(&mut self, screen: Option<Vec2>) {
        self.pointer = screen.and_then(|s| self.camera.ground_point(s));
    }

    /// Pointer already projected onto the ground plane
    pub fn set_pointer_ground(&mut self, ground: Option<Vec2>) {
        self.pointer = ground;
    }

    /// Switch theme and launch a ripple from the screen center
    pub fn set_color_mode(&mut self, mode: ColorMode) -> bool {
        if self.torn_down {
            return false;
        }
        let changed = self.wave.set_color_mode(mode, self.elapsed);
        if changed {
            log::info!("Color mode changed to {}", mode.as_str());
        }
        changed
    }

    pub fn resize_viewport(&mut self, width: f32, height: f32) -> bool {
        self.camera.resize(width, height)
    }

    fn wave_inputs(&self) -> WaveInputs {
        let origin = self.camera.ground_point(self.camera.viewport() * 0.5).unwrap_or(Vec2::ZERO);
        let half = self.blocks.zone().as_vec2() * 0.5;
        let reach = [
            Vec2::new(-half.x, -half.y),
            Vec2::new(half.x, -half.y),
            Vec2::new(half.x, half.y),
            Vec2::new(-half.x, half.y),
        ]
        .into_iter()
        .map(|corner| corner.distance(origin))
        .fold(0.0, f32::max);

        WaveInputs {
            elapsed: self.elapsed,
            pointer: self.pointer,
            ripple_origin: origin,
            ripple_reach: reach,
        }
    }

    /// Advance one frame by `dt` seconds
    pub fn update(&mut self, dt: f32) {
        if self.torn_down {
            return;
        }
        let dt = dt.clamp(0.0, MAX_FRAME_DT);
        self.elapsed += dt;

        let inputs = self.wave_inputs();
        self.wave.update(self.blocks.as_mut_slice(), &self.roster, &inputs);

        for agent in self.agents.values_mut() {
            agent.update(dt, self.elapsed);
        }
        if let Some(index) = self.active_agent
            && self.agents.get(&index).is_none_or(AgentAnimation::is_idle)
        {
            self.active_agent = None;
        }

        let agent_position = self.active_agent_position();
        self.autofocus.update(dt, &self.camera, &self.batch, agent_position);

        self.write_instances();
    }

    fn active_agent_position(&self) -> Option<Vec3> {
        let index = self.active_agent?;
        self.agents.get(&index)?.pose().map(|pose| pose.position)
    }

    /// Push every block's transform and color into the batch
    fn write_instances(&mut self) {
        if self.batch.is_disposed() {
            return;
        }
        for (i, block) in self.blocks.iter().enumerate() {
            let colors = self.wave.colors(i);
            let yaw = Quat::from_rotation_y(block.rotation);
            let footprint = block.size * TILE_GAP;
            let bottom = InstanceHandle::bottom_of(i);
            let top = InstanceHandle::top_of(i);

            let mut result = self.batch.set_transform(
                bottom,
                Vec3::new(block.center.x, 0.0, block.center.y),
                yaw,
                Vec3::new(footprint.x, block.height, footprint.y),
            );

            let (rest_position, rest_scale) = top_rest_pose(block);
            let pose = self.agents.get(&i).and_then(AgentAnimation::pose);
            result = result.and_then(|_| match pose {
                Some(pose) => self.batch.set_transform(
                    top,
                    pose.position,
                    Quat::from_rotation_y(block.rotation + pose.yaw),
                    pose.scale,
                ),
                None => self.batch.set_transform(top, rest_position, yaw, rest_scale),
            });

            if let Some(colors) = colors {
                result = result
                    .and_then(|_| self.batch.set_color(bottom, colors.bottom))
                    .and_then(|_| self.batch.set_color(top, colors.top));
            }

            if let Err(e) = result {
                log::warn!("Skipping instance update for block {}: {}", i, e);
            }
        }
    }

    /// Data for the presentation backend
    pub fn frame_view(&self) -> FrameView<'_> {
        FrameView {
            batch: &self.batch,
            view_proj: self.camera.view_projection(),
            camera_position: self.camera.position,
            focus: self.autofocus.params(),
            background: self.wave.mode().background(),
            depth_of_field: self.depth_of_field,
            elapsed: self.elapsed,
        }
    }

    // === Teardown steps, driven in order by the viewer ===

    pub(crate) fn release_batch(&mut self) {
        self.batch.dispose();
    }

    pub(crate) fn release_optics(&mut self) {
        self.autofocus.dispose();
    }

    pub(crate) fn clear(&mut self) {
        for agent in self.agents.values_mut() {
            agent.reset();
        }
        self.agents.clear();
        self.blocks.clear();
        self.wave.clear();
        self.roster = ContestantRoster::default();
        self.selected = None;
        self.active_agent = None;
        self.active_category = None;
        self.pointer = None;
        self.on_block_click = None;
        self.torn_down = true;
    }
}
