// ECS components for agents walking the trail.
// A walking agent is an entity with Transform + PathWalker + Agent + Tint.

use bevy_ecs::prelude::*;
use glam::Vec3;

/// World position of an entity, synced from its walker every frame.
#[derive(Component, Debug, Clone, Copy)]
pub struct Transform {
    pub position: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self { position }
    }
}

/// RGB color for rendering
#[derive(Component, Debug, Clone, Copy)]
pub struct Tint {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Tint {
    pub const HIKER: Tint = Tint { r: 1.0, g: 0.55, b: 0.1 };
    pub const CHARACTER: Tint = Tint { r: 0.15, g: 0.35, b: 1.0 };

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, 1.0]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentKind {
    /// Follows keyboard direction commands; the camera tracks it.
    Hiker,
    /// Walks on its own and ignores direction commands.
    Character,
}

/// Who this walker is and how fast it goes (world units per second).
#[derive(Component, Debug, Clone, Copy)]
pub struct Agent {
    pub kind: AgentKind,
    pub speed: f32,
}
