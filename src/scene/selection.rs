//! Selection and category gating
//!
//! A click casts a ray through the batch; the hit instance maps back to its
//! entity by even/odd pairing. Only blocks in the active category (or any
//! block when no category is active) can be selected. Selecting a block
//! highlights it and emerges its agent, returning the previous one.

use glam::Vec2;

use super::{BlockClick, Scene, top_rest_pose};
use crate::consts::FILTERED_HEIGHT;
use crate::error::InteractionError;
use crate::renderer::batch::{InstanceHandle, entity_index_of};
use crate::sim::agent::{AgentAnimation, AgentState};

impl Scene {
    /// Filter the grid to one category, or clear the filter with `None`.
    ///
    /// The active agent is sent back, the highlight cleared and every block
    /// reset to base height. With a category set, non-matching blocks sink to
    /// a reduced height and the wave field freezes.
    pub fn set_active_category(&mut self, category: Option<&str>) {
        if self.torn_down {
            return;
        }

        self.clear_selection();
        self.wave.reset_heights(self.blocks.as_mut_slice());

        match category {
            Some(cat) => {
                let mut filtered = 0;
                for block in self.blocks.iter_mut() {
                    if self.roster.category_of(block.contestant) != Some(cat) {
                        block.target_height = FILTERED_HEIGHT;
                        filtered += 1;
                    }
                }
                self.wave.set_frozen(true);
                log::debug!("Category {:?} active, {} blocks filtered out", cat, filtered);
            }
            None => {
                self.wave.set_frozen(false);
                log::debug!("Category filter cleared");
            }
        }
        self.active_category = category.map(str::to_owned);
    }

    /// Whether a block passes the active category filter
    pub fn is_selectable(&self, index: usize) -> bool {
        let Some(block) = self.blocks.get(index) else {
            return false;
        };
        match &self.active_category {
            None => true,
            Some(cat) => self.roster.category_of(block.contestant) == Some(cat.as_str()),
        }
    }

    /// Map a raycast hit back to its entity
    pub fn resolve_hit(&self, handle: InstanceHandle) -> Result<usize, InteractionError> {
        let count = self.batch.instance_count();
        if handle.0 >= count {
            return Err(InteractionError::HandleOutOfRange {
                handle: handle.0,
                count,
            });
        }
        let index = entity_index_of(handle);
        if index >= self.blocks.len() {
            return Err(InteractionError::EntityOutOfRange {
                index,
                count: self.blocks.len(),
            });
        }
        Ok(index)
    }

    /// Resolve a click at screen coordinates. `Ok(None)` means the ray hit
    /// nothing.
    pub fn handle_click(&mut self, screen: Vec2) -> Result<Option<BlockClick>, InteractionError> {
        if self.torn_down {
            return Err(InteractionError::TornDown);
        }
        let ray = self.camera.screen_ray(screen);
        let Some(hit) = self.batch.raycast(&ray) else {
            return Ok(None);
        };
        let result = self.resolve_hit(hit.handle).and_then(|index| self.select(index));
        match result {
            Ok(click) => Ok(Some(click)),
            Err(e) => {
                log::warn!("Ignoring click at ({}, {}): {}", screen.x, screen.y, e);
                Err(e)
            }
        }
    }

    /// Select a block, emerging its agent
    pub fn select(&mut self, index: usize) -> Result<BlockClick, InteractionError> {
        if self.torn_down {
            return Err(InteractionError::TornDown);
        }
        let Some(block) = self.blocks.get(index) else {
            return Err(InteractionError::EntityOutOfRange {
                index,
                count: self.blocks.len(),
            });
        };
        if !self.is_selectable(index) {
            return Err(InteractionError::NotSelectable { index });
        }

        let click = BlockClick {
            index,
            id: block.id,
            contestant: block.contestant,
        };
        let (rest_position, rest_scale) = top_rest_pose(block);

        let already_up = self.selected == Some(index)
            && self.agents.get(&index).is_some_and(|a| !a.is_idle());
        if already_up {
            return Ok(click);
        }

        if let Some(prev) = self.selected
            && prev != index
            && let Some(block) = self.blocks.get_mut(prev)
        {
            block.highlighted = false;
        }
        if let Some(prev) = self.active_agent
            && prev != index
        {
            self.retire_agent(prev);
        }

        if let Some(block) = self.blocks.get_mut(index) {
            block.highlighted = true;
        }
        self.selected = Some(index);

        let agent = self
            .agents
            .entry(index)
            .or_insert_with(|| AgentAnimation::new(rest_position, rest_scale));
        if agent.state == AgentState::Returning {
            agent.reset();
        }
        agent.emerge(rest_position, rest_scale);
        self.active_agent = Some(index);

        log::debug!("Selected block {} (id {:?}, contestant {:?})", index, click.id, click.contestant);
        if let Some(callback) = self.on_block_click.as_mut() {
            callback(&click);
        }
        Ok(click)
    }

    /// Select the matching block with the highest contestant progress
    /// (lowest index on ties) and emerge its agent
    pub fn activate_category_agent(&mut self, category: &str) -> Result<BlockClick, InteractionError> {
        if self.torn_down {
            return Err(InteractionError::TornDown);
        }
        let mut best: Option<(usize, f32)> = None;
        for (i, block) in self.blocks.iter().enumerate() {
            if self.roster.category_of(block.contestant) != Some(category) {
                continue;
            }
            let progress = self.roster.progress_of(block.contestant);
            if best.is_none_or(|(_, p)| progress > p) {
                best = Some((i, progress));
            }
        }
        let (index, _) = best.ok_or_else(|| InteractionError::NoMatchingBlock(category.to_owned()))?;
        self.select(index)
    }

    /// Deselect and send the active agent back
    pub fn clear_selection(&mut self) {
        if let Some(index) = self.active_agent.take() {
            self.retire_agent(index);
        }
        if let Some(index) = self.selected.take()
            && let Some(block) = self.blocks.get_mut(index)
        {
            block.highlighted = false;
        }
    }

    /// Screen position of the active agent, for overlay placement
    pub fn agent_screen_position(&self) -> Option<Vec2> {
        self.active_agent_position()
            .and_then(|position| self.camera.project(position))
    }

    /// Return an agent to rest; one still emerging snaps back instead
    fn retire_agent(&mut self, index: usize) {
        let Some(agent) = self.agents.get_mut(&index) else {
            return;
        };
        if !agent.return_to_rest() && agent.state == AgentState::Emerging {
            agent.reset();
        }
        log::debug!("Agent {} retired ({:?})", index, agent.state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contestants::{Contestant, ContestantId, ContestantRoster};
    use crate::renderer::shapes::ProceduralShapes;
    use crate::settings::Settings;
    use glam::Vec3;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn roster() -> ContestantRoster {
        let records = [("prize", 0.2), ("race", 0.9), ("prize", 0.7), ("race", 0.1), ("prize", 0.7)]
            .into_iter()
            .enumerate()
            .map(|(i, (category, progress))| Contestant {
                id: ContestantId(i as u32 + 1),
                name: format!("c{i}"),
                category: category.into(),
                progress,
                color_index: i,
            })
            .collect();
        ContestantRoster::new(records)
    }

    fn scene() -> Scene {
        let settings = Settings {
            zone_width: 8,
            zone_height: 6,
            ..Settings::default()
        };
        Scene::new(&settings, roster(), &ProceduralShapes::default(), Vec2::new(800.0, 600.0), 11).unwrap()
    }

    #[test]
    fn test_resolve_hit_pairs() {
        let scene = scene();
        for i in 0..scene.blocks().len() {
            assert_eq!(scene.resolve_hit(InstanceHandle::bottom_of(i)), Ok(i));
            assert_eq!(scene.resolve_hit(InstanceHandle::top_of(i)), Ok(i));
        }
        let count = scene.batch().instance_count();
        assert_eq!(
            scene.resolve_hit(InstanceHandle(count)),
            Err(InteractionError::HandleOutOfRange { handle: count, count })
        );
    }

    #[test]
    fn test_select_emerges_and_retires_previous() {
        let mut scene = scene();
        scene.select(0).unwrap();
        for _ in 0..90 {
            scene.update(1.0 / 60.0);
        }
        assert_eq!(scene.agent(0).map(|a| a.state), Some(AgentState::Active));

        scene.select(1).unwrap();
        assert!(!scene.blocks().get(0).unwrap().highlighted);
        assert!(scene.blocks().get(1).unwrap().highlighted);
        assert_eq!(scene.agent(0).map(|a| a.state), Some(AgentState::Returning));
        assert_eq!(scene.agent(1).map(|a| a.state), Some(AgentState::Emerging));
        assert_eq!(scene.agent_count(), 2);
    }

    #[test]
    fn test_category_gates_selection() {
        let mut scene = scene();
        scene.set_active_category(Some("prize"));
        // Block 1 holds a "race" contestant
        assert_eq!(scene.select(1), Err(InteractionError::NotSelectable { index: 1 }));
        assert!(scene.selected().is_none());
        assert!(scene.select(0).is_ok());
    }

    #[test]
    fn test_rejected_click_leaves_selection_untouched() {
        let mut scene = scene();
        let records = (0..4)
            .map(|i| Contestant {
                id: ContestantId(i + 1),
                name: format!("r{i}"),
                category: "race".into(),
                progress: 0.5,
                color_index: i as usize,
            })
            .collect();
        scene.roster = ContestantRoster::new(records);
        scene.set_active_category(Some("prize"));
        scene.update(1.0 / 60.0);

        let block = scene.blocks().get(0).unwrap();
        let top = Vec3::new(block.center.x, block.height, block.center.y);
        let screen = scene.camera().project(top).unwrap();
        let result = scene.handle_click(screen);

        assert!(matches!(result, Err(InteractionError::NotSelectable { .. })), "{result:?}");
        assert!(scene.selected().is_none());
        assert_eq!(scene.agent_count(), 0);
        assert!(scene.blocks().iter().all(|b| !b.highlighted));
    }

    #[test]
    fn test_category_change_clears_selection() {
        let mut scene = scene();
        scene.select(0).unwrap();
        scene.set_active_category(Some("race"));
        assert!(scene.selected().is_none());
        assert!(!scene.blocks().get(0).unwrap().highlighted);
        assert_eq!(scene.agent(0).map(|a| a.state), Some(AgentState::Idle));
    }

    #[test]
    fn test_activate_category_prefers_progress_then_index() {
        let mut scene = scene();
        let click = scene.activate_category_agent("prize").unwrap();
        assert_eq!(click.index, 2);
        assert_eq!(click.contestant, Some(ContestantId(3)));
        assert_eq!(
            scene.activate_category_agent("chess"),
            Err(InteractionError::NoMatchingBlock("chess".into()))
        );
    }

    #[test]
    fn test_callback_receives_click() {
        let mut scene = scene();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        scene.set_on_block_click(Some(Box::new(move |click| sink.borrow_mut().push(*click))));
        scene.select(3).unwrap();
        // Re-selecting while the agent is up changes nothing
        scene.select(3).unwrap();
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(seen.borrow()[0].index, 3);
    }

    #[test]
    fn test_agent_screen_position_follows_agent() {
        let mut scene = scene();
        assert!(scene.agent_screen_position().is_none());
        scene.select(0).unwrap();
        scene.update(0.05);
        let pos = scene.agent_screen_position().unwrap();
        assert!(pos.x.is_finite() && pos.y.is_finite());
    }
}
