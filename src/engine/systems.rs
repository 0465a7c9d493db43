// ECS systems for the walking agents.
// The track and terrain are owned by the scene and passed in by reference;
// walkers only hold their own cursor.

use bevy_ecs::prelude::*;
use glam::Vec3;

use super::components::*;
use super::config::WalkerConfig;
use super::path::PathTrack;
use super::terrain::TerrainMesh;
use super::walker::{Direction, PathWalker};

/// Caller commands that change traversal outside the normal step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkCommand {
    /// Force hikers forward before their next step.
    Forward,
    /// Force hikers backward before their next step.
    Backward,
    /// Send every walker back to the first waypoint.
    Reset,
}

/// Spawn an agent parked at the start of `track`.
pub fn spawn_agent(
    world: &mut World,
    track: &PathTrack,
    terrain: &TerrainMesh,
    kind: AgentKind,
    config: &WalkerConfig,
    tint: Tint,
) -> Entity {
    let walker = PathWalker::new(track, terrain, config.policy, config.offset);
    world
        .spawn((
            Transform::from_position(walker.position()),
            walker,
            Agent { kind, speed: config.speed },
            tint,
        ))
        .id()
}

/// Step every walker by `dt` and copy its position into the Transform.
pub fn walk_system(world: &mut World, track: &PathTrack, terrain: &TerrainMesh, dt: f32) {
    let mut query = world.query::<(&mut Transform, &mut PathWalker, &Agent)>();
    for (mut transform, mut walker, agent) in query.iter_mut(world) {
        walker.step(track, terrain, dt, agent.speed);
        transform.position = walker.position();
    }
}

/// Apply a caller command. Direction commands only affect hikers.
pub fn command_system(world: &mut World, track: &PathTrack, terrain: &TerrainMesh, command: WalkCommand) {
    let mut query = world.query::<(&mut Transform, &mut PathWalker, &Agent)>();
    for (mut transform, mut walker, agent) in query.iter_mut(world) {
        match command {
            WalkCommand::Forward if agent.kind == AgentKind::Hiker => {
                walker.set_direction(Direction::Forward)
            }
            WalkCommand::Backward if agent.kind == AgentKind::Hiker => {
                walker.set_direction(Direction::Backward)
            }
            WalkCommand::Reset => {
                walker.reset(track, terrain);
                transform.position = walker.position();
            }
            _ => {}
        }
    }
}

/// Position of the first hiker, if any.
pub fn hiker_position(world: &mut World) -> Option<Vec3> {
    let mut query = world.query::<(&Transform, &Agent)>();
    query
        .iter(world)
        .find(|(_, agent)| agent.kind == AgentKind::Hiker)
        .map(|(transform, _)| transform.position)
}

/// Snapshot of the first hiker's walker for the overlay.
pub fn hiker_walker(world: &mut World) -> Option<PathWalker> {
    let mut query = world.query::<(&PathWalker, &Agent)>();
    query
        .iter(world)
        .find(|(_, agent)| agent.kind == AgentKind::Hiker)
        .map(|(walker, _)| walker.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::{PathConfig, TerrainConfig};
    use crate::engine::heightfield::Heightfield;

    fn scene() -> (TerrainMesh, PathTrack) {
        let field = Heightfield::from_samples(21, 21, vec![1.0; 21 * 21]).unwrap();
        let terrain = TerrainMesh::build(&field, &TerrainConfig { height_scale: 1.0, horizontal_scale: 1.0, texture_repeat: 1.0 });
        let raw = vec![Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0), Vec3::new(10.0, 0.0, 10.0)];
        let track = PathTrack::from_points(raw, &terrain, &PathConfig { horizontal_scale: 1.0, offset: 0.5 });
        (terrain, track)
    }

    #[test]
    fn walk_system_moves_every_agent_and_syncs_transform() {
        let (terrain, track) = scene();
        let mut world = World::new();
        let hiker = spawn_agent(&mut world, &track, &terrain, AgentKind::Hiker, &WalkerConfig::hiker(), Tint::HIKER);
        let character = spawn_agent(&mut world, &track, &terrain, AgentKind::Character, &WalkerConfig::character(), Tint::CHARACTER);

        walk_system(&mut world, &track, &terrain, 1.0);

        // Hiker: speed 10, offset 0.5. Character: speed 5, offset 2.0.
        let hiker_pos = world.get::<Transform>(hiker).unwrap().position;
        let character_pos = world.get::<Transform>(character).unwrap().position;
        assert!(hiker_pos.abs_diff_eq(Vec3::new(10.0, 1.5, 0.0), 1e-5));
        assert!(character_pos.abs_diff_eq(Vec3::new(5.0, 3.0, 0.0), 1e-5));
        assert_eq!(hiker_position(&mut world), Some(hiker_pos));
    }

    #[test]
    fn direction_commands_only_reach_hikers() {
        let (terrain, track) = scene();
        let mut world = World::new();
        let hiker = spawn_agent(&mut world, &track, &terrain, AgentKind::Hiker, &WalkerConfig::hiker(), Tint::HIKER);
        let character = spawn_agent(&mut world, &track, &terrain, AgentKind::Character, &WalkerConfig::character(), Tint::CHARACTER);

        command_system(&mut world, &track, &terrain, WalkCommand::Backward);

        assert_eq!(world.get::<PathWalker>(hiker).unwrap().direction(), Direction::Backward);
        assert_eq!(world.get::<PathWalker>(character).unwrap().direction(), Direction::Forward);
    }

    #[test]
    fn reset_returns_everyone_to_the_start() {
        let (terrain, track) = scene();
        let mut world = World::new();
        let hiker = spawn_agent(&mut world, &track, &terrain, AgentKind::Hiker, &WalkerConfig::hiker(), Tint::HIKER);

        walk_system(&mut world, &track, &terrain, 1.5);
        command_system(&mut world, &track, &terrain, WalkCommand::Reset);

        let walker = hiker_walker(&mut world).unwrap();
        assert_eq!(walker.cursor_distance(), 0.0);
        assert_eq!(world.get::<Transform>(hiker).unwrap().position, Vec3::new(0.0, 1.5, 0.0));
    }
}
