//! Grid packing
//!
//! Tiles a rectangular zone with variable-size blocks. Rows are scanned top
//! to bottom, columns left to right; the first free run found is always
//! used. There is no backtracking and no attempt at a minimal tile count,
//! only full, non-overlapping coverage.

use std::f32::consts::{FRAC_PI_2, PI};

use glam::IVec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::block::{BlockEntity, BlockStore, GridBox, TopShape};
use crate::contestants::ContestantRoster;

/// Packing parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackerConfig {
    /// Starting maximum tile size (cells)
    pub max_size: IVec2,
    /// Probability that a tile is forced square
    pub square_chance: f32,
    /// Probability, per finished row, that `max_size` is resampled
    pub resample_chance: f32,
    /// Discrete sizes `max_size` is resampled from, per axis
    pub resample_sizes: Vec<i32>,
    /// Number of palette colors available to unassigned tiles
    pub palette_size: usize,
}

impl Default for PackerConfig {
    fn default() -> Self {
        Self {
            max_size: IVec2::new(3, 3),
            square_chance: 0.5,
            resample_chance: 0.2,
            resample_sizes: vec![2, 5],
            palette_size: crate::sim::wave::PALETTE_SIZE,
        }
    }
}

pub struct GridPacker {
    config: PackerConfig,
}

impl GridPacker {
    pub fn new(config: PackerConfig) -> Self {
        Self { config }
    }

    /// Fill `zone` completely with blocks.
    ///
    /// Contestants are handed out in roster order, one per tile, until the
    /// roster runs out; the remaining tiles get a random palette color.
    pub fn pack<R: Rng>(&self, zone: IVec2, roster: &ContestantRoster, rng: &mut R) -> BlockStore {
        let mut store = BlockStore::new(zone);
        let zone_box = store.zone_box();
        let palette_size = self.config.palette_size.max(1);
        let mut max_size = self.config.max_size.max(IVec2::ONE);
        let mut next_contestant = 0usize;

        let mut y = 0;
        while y < zone.y {
            let mut x = 0;
            while x < zone.x {
                let run = free_run(&store, IVec2::new(x, y), max_size.x);
                if run == 0 {
                    // Claimed by a taller tile from an earlier row
                    x += 1;
                    continue;
                }

                let forced_square = rng.random::<f32>() < self.config.square_chance;
                let sx = rng.random_range(1..=run);
                let sy = if forced_square {
                    sx
                } else {
                    rng.random_range(1..=max_size.y)
                };
                let grid_box =
                    GridBox::new(IVec2::new(x, y), IVec2::new(x + sx, y + sy)).clamp_to(&zone_box);

                let top = TopShape::ALL[rng.random_range(0..TopShape::ALL.len())];
                let id = store.next_block_id();
                let mut block = BlockEntity::new(id, grid_box, top, zone);
                block.forced_square = forced_square;
                block.rotation = if grid_box.is_square() {
                    rng.random_range(0..4) as f32 * FRAC_PI_2
                } else if rng.random_bool(0.5) {
                    PI
                } else {
                    0.0
                };

                match roster.at(next_contestant) {
                    Some(contestant) => {
                        block.contestant = Some(contestant.id);
                        block.top_color_index = contestant.color_index % palette_size;
                        next_contestant += 1;
                    }
                    None => block.top_color_index = rng.random_range(0..palette_size),
                }

                store.insert(block);
                x += sx;
            }

            // Vary block structure from row to row
            if !self.config.resample_sizes.is_empty()
                && rng.random::<f32>() > 1.0 - self.config.resample_chance
            {
                let sizes = &self.config.resample_sizes;
                max_size = IVec2::new(
                    sizes[rng.random_range(0..sizes.len())],
                    sizes[rng.random_range(0..sizes.len())],
                )
                .max(IVec2::ONE);
            }
            y += 1;
        }

        log::debug!(
            "Packed {}x{} zone into {} blocks ({} with contestants)",
            zone.x,
            zone.y,
            store.len(),
            next_contestant
        );
        debug_assert!(store.verify_coverage());
        store
    }
}

/// Length of the contiguous free run starting at `cell`, capped at `limit`.
/// Stops at the first occupied cell or the zone edge.
fn free_run(store: &BlockStore, cell: IVec2, limit: i32) -> i32 {
    let mut run = 0;
    while run < limit && store.is_free(cell + IVec2::new(run, 0)) {
        run += 1;
    }
    run
}
