//! Agent animation: a block's top lifting out of the grid and settling back
//!
//! `Idle → Emerging → Active → Returning → Idle`. Only `emerge()` leaves
//! `Idle` and only `return_to_rest()` leaves `Active`; calls from any other
//! state are ignored.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::easing::{ease_in_out_cubic, ease_out_back, ease_out_cubic};
use crate::consts::*;
use crate::lerp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AgentState {
    #[default]
    Idle,
    Emerging,
    Active,
    Returning,
}

/// Transform the agent wants applied to its block's top
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentPose {
    pub position: Vec3,
    pub scale: Vec3,
    /// Yaw added on top of the block's own rotation
    pub yaw: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentAnimation {
    pub state: AgentState,
    /// Progress through the current transition, 0..1
    pub progress: f32,
    pub original_position: Vec3,
    pub original_scale: Vec3,
    pub target_position: Vec3,
    position: Vec3,
    scale: Vec3,
    yaw: f32,
    /// Yaw when returning began, eased back to zero
    return_yaw: f32,
}

impl AgentAnimation {
    pub fn new(original_position: Vec3, original_scale: Vec3) -> Self {
        Self {
            state: AgentState::Idle,
            progress: 0.0,
            original_position,
            original_scale,
            target_position: original_position + AGENT_HOVER_OFFSET,
            position: original_position,
            scale: original_scale,
            yaw: 0.0,
            return_yaw: 0.0,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == AgentState::Idle
    }

    /// Start emerging from the given resting pose. Returns false (and changes
    /// nothing) unless idle.
    pub fn emerge(&mut self, rest_position: Vec3, rest_scale: Vec3) -> bool {
        if self.state != AgentState::Idle {
            return false;
        }
        self.original_position = rest_position;
        self.original_scale = rest_scale;
        self.target_position = rest_position + AGENT_HOVER_OFFSET;
        self.position = rest_position;
        self.scale = rest_scale;
        self.yaw = 0.0;
        self.progress = 0.0;
        self.state = AgentState::Emerging;
        true
    }

    /// Start returning. Returns false (and changes nothing) unless active.
    pub fn return_to_rest(&mut self) -> bool {
        if self.state != AgentState::Active {
            return false;
        }
        self.progress = 0.0;
        self.return_yaw = self.yaw;
        self.state = AgentState::Returning;
        true
    }

    /// Snap straight back to idle at the resting pose
    pub fn reset(&mut self) {
        self.state = AgentState::Idle;
        self.progress = 0.0;
        self.position = self.original_position;
        self.scale = self.original_scale;
        self.yaw = 0.0;
        self.return_yaw = 0.0;
    }

    /// Advance by `dt` seconds; `time` drives the hover bob
    pub fn update(&mut self, dt: f32, time: f32) {
        match self.state {
            AgentState::Idle => {}
            AgentState::Emerging => {
                self.progress = (self.progress + dt / EMERGE_DURATION).min(1.0);
                let eased = ease_out_cubic(self.progress);
                self.position = self.original_position.lerp(self.target_position, eased);
                self.scale = self.original_scale * (1.0 + ease_out_back(self.progress) * AGENT_SCALE_BOOST);
                if self.progress >= 1.0 {
                    self.state = AgentState::Active;
                }
            }
            AgentState::Active => {
                let bob = (time * HOVER_FREQUENCY).sin() * HOVER_AMPLITUDE;
                self.position = self.target_position + Vec3::new(0.0, bob, 0.0);
                self.scale = self.enlarged_scale();
                self.yaw += dt * AGENT_YAW_SPEED;
            }
            AgentState::Returning => {
                self.progress = (self.progress + dt / RETURN_DURATION).min(1.0);
                let eased = ease_in_out_cubic(self.progress);
                self.position = self.target_position.lerp(self.original_position, eased);
                self.scale = self.enlarged_scale().lerp(self.original_scale, eased);
                self.yaw = lerp(self.return_yaw, 0.0, eased);
                if self.progress >= 1.0 {
                    self.reset();
                }
            }
        }
    }

    fn enlarged_scale(&self) -> Vec3 {
        self.original_scale * (1.0 + AGENT_SCALE_BOOST)
    }

    /// Pose to render, None while idle (the wave field owns the block then)
    pub fn pose(&self) -> Option<AgentPose> {
        (self.state != AgentState::Idle).then_some(AgentPose {
            position: self.position,
            scale: self.scale,
            yaw: self.yaw,
        })
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }
}
