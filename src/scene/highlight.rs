//! Pick-and-highlight state machine.
//!
//! At most one node is highlighted at any instant. The revert deadline is
//! carried inside the state itself and checked by the per-frame tick, so
//! replacing the state on a new pick is also the cancellation of the pending
//! revert: a stale expiry can never fire against a node that was
//! re-highlighted or replaced in the interim.

use crate::scene::{NodeId, SceneAsset, SceneRegistry};
use glam::Vec4;
use std::time::{Duration, Instant};

/// Default highlight color, 0xff6b6b.
pub const HIGHLIGHT_COLOR: Vec4 = Vec4::new(1.0, 107.0 / 255.0, 107.0 / 255.0, 1.0);

pub const HIGHLIGHT_DURATION: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightState {
    Idle,
    Highlighted { node: NodeId, deadline: Instant },
}

#[derive(Debug)]
pub struct Highlighter {
    state: HighlightState,
    duration: Duration,
    color: Vec4,
}

impl Default for Highlighter {
    fn default() -> Self {
        Self::new(HIGHLIGHT_DURATION, HIGHLIGHT_COLOR)
    }
}

impl Highlighter {
    pub fn new(duration: Duration, color: Vec4) -> Self {
        Self {
            state: HighlightState::Idle,
            duration,
            color,
        }
    }

    pub fn state(&self) -> HighlightState {
        self.state
    }

    pub fn highlighted_node(&self) -> Option<NodeId> {
        match self.state {
            HighlightState::Highlighted { node, .. } => Some(node),
            HighlightState::Idle => None,
        }
    }

    /// A pick landed on `node`. Re-picking the highlighted node restarts its
    /// timer; picking a different node reverts the previous one first. A node
    /// without a recorded original color is never entered into the
    /// highlighted state.
    pub fn on_pick(
        &mut self,
        node: NodeId,
        scene: &mut SceneAsset,
        registry: &SceneRegistry,
        now: Instant,
    ) {
        if let HighlightState::Highlighted { node: previous, .. } = self.state {
            if previous != node {
                Self::restore(previous, scene, registry);
                self.state = HighlightState::Idle;
            }
        }

        let Some(entry) = registry.find(node) else {
            return;
        };
        if entry.original_color.is_none() {
            return;
        }
        if let Some(material) = scene.material_mut(entry.material) {
            material.base_color = Some(self.color);
        }
        self.state = HighlightState::Highlighted {
            node,
            deadline: now + self.duration,
        };
    }

    /// Per-frame expiry check; reverts the node once its deadline passes.
    pub fn tick(&mut self, scene: &mut SceneAsset, registry: &SceneRegistry, now: Instant) {
        if let HighlightState::Highlighted { node, deadline } = self.state {
            if now >= deadline {
                Self::restore(node, scene, registry);
                self.state = HighlightState::Idle;
            }
        }
    }

    fn restore(node: NodeId, scene: &mut SceneAsset, registry: &SceneRegistry) {
        let Some(entry) = registry.find(node) else {
            return;
        };
        if let (Some(original), Some(material)) =
            (entry.original_color, scene.material_mut(entry.material))
        {
            material.base_color = Some(original);
        }
    }
}
