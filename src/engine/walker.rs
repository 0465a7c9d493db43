// Constant-speed traversal of a PathTrack.
//
// A walker owns only its cursor; the track and terrain are borrowed on every
// call, so any number of walkers can share one read-only track and terrain.
//
// Per step:
//   1. Move the arc-length cursor by speed * dt in the current direction.
//   2. Apply the boundary policy (bounce at either end, or wrap around).
//   3. Re-locate the active segment incrementally from the previous one.
//   4. Lerp inside that segment and drop the result onto the terrain.
//
// Segment search is O(1) amortized while a step covers only a few segments.
// A frame-time spike that crosses more than MAX_INCREMENTAL_STEPS segments
// falls back to a binary search over the cumulative distances.

use bevy_ecs::prelude::*;
use glam::Vec3;
use log::debug;

use super::path::PathTrack;
use super::terrain::TerrainMesh;

/// Segments walked one by one before switching to binary search.
const MAX_INCREMENTAL_STEPS: usize = 8;

/// What happens when the cursor reaches an end of the track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryPolicy {
    /// Reverse direction at either end.
    Bounce,
    /// Wrap around to the other end and keep the direction.
    Loop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn flipped(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

/// Progress summary for the stats overlay.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HikeStats {
    /// Total distance travelled since the last reset, across bounces and wraps.
    pub distance_hiked: f32,
    /// Arc length from the cursor to the end of the track.
    pub distance_remaining: f32,
    /// Simulated seconds since the last reset.
    pub time_elapsed: f32,
}

/// Traversal state for one agent.
///
/// After every `step` or `reset`:
/// `cumulative[segment] <= cursor <= cumulative[segment + 1]`.
#[derive(Component, Debug, Clone)]
pub struct PathWalker {
    policy: BoundaryPolicy,
    offset: f32,

    cursor: f32,
    segment: usize,
    direction: Direction,
    local_t: f32,
    position: Vec3,

    distance_hiked: f32,
    time_elapsed: f32,
}

impl PathWalker {
    /// A walker parked at the first waypoint, `offset` above the terrain.
    pub fn new(track: &PathTrack, terrain: &TerrainMesh, policy: BoundaryPolicy, offset: f32) -> Self {
        let mut walker = Self {
            policy,
            offset,
            cursor: 0.0,
            segment: 0,
            direction: Direction::Forward,
            local_t: 0.0,
            position: Vec3::ZERO,
            distance_hiked: 0.0,
            time_elapsed: 0.0,
        };
        walker.reset(track, terrain);
        walker
    }

    /// Back to the first waypoint, moving forward, with cleared statistics.
    pub fn reset(&mut self, track: &PathTrack, terrain: &TerrainMesh) {
        self.cursor = 0.0;
        self.segment = 0;
        self.direction = Direction::Forward;
        self.local_t = 0.0;
        self.distance_hiked = 0.0;
        self.time_elapsed = 0.0;
        self.position = self.project(track.points()[0], terrain);
    }

    /// Force the direction used by the next `step`.
    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    /// Advance by `speed * dt` along the track and recompute the position.
    ///
    /// Total: negative inputs count as zero, zero-length tracks and segments
    /// never divide by zero.
    pub fn step(&mut self, track: &PathTrack, terrain: &TerrainMesh, dt: f32, speed: f32) {
        let dt = dt.max(0.0);
        let distance = (speed * dt).max(0.0);
        self.time_elapsed += dt;

        let total = track.total_length();
        if track.segment_count() == 0 || total <= 0.0 {
            // Nothing to walk: stay pinned to the first waypoint.
            self.cursor = 0.0;
            self.segment = 0;
            self.local_t = 0.0;
            self.position = self.project(track.points()[0], terrain);
            return;
        }

        let before = self.cursor;
        let wrapped = self.advance(distance, total);
        self.distance_hiked += if wrapped { distance } else { (self.cursor - before).abs() };

        let cumulative = track.cumulative_distances();
        if wrapped {
            self.segment = locate_segment(cumulative, self.cursor);
        } else {
            self.relocate_segment(cumulative);
        }

        let start = cumulative[self.segment];
        let length = cumulative[self.segment + 1] - start;
        self.local_t = if length > 0.0 {
            ((self.cursor - start) / length).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let points = track.points();
        let lerped = points[self.segment].lerp(points[self.segment + 1], self.local_t);
        self.position = self.project(lerped, terrain);
    }

    /// Move the cursor and apply the boundary policy. Returns true on a wrap.
    fn advance(&mut self, distance: f32, total: f32) -> bool {
        match self.direction {
            Direction::Forward => self.cursor += distance,
            Direction::Backward => self.cursor -= distance,
        }

        match self.policy {
            BoundaryPolicy::Bounce => {
                if self.direction == Direction::Forward && self.cursor >= total {
                    self.cursor = total;
                    self.direction = self.direction.flipped();
                    debug!("Walker reached end of track ({:.1}), turning back", total);
                } else if self.direction == Direction::Backward && self.cursor <= 0.0 {
                    self.cursor = 0.0;
                    self.direction = self.direction.flipped();
                    debug!("Walker reached start of track, turning forward");
                }
                false
            }
            BoundaryPolicy::Loop => {
                if self.cursor >= total || self.cursor < 0.0 {
                    self.cursor = self.cursor.rem_euclid(total).clamp(0.0, total);
                    debug!("Walker wrapped around track to {:.2}", self.cursor);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Walk the segment index toward the cursor; bail out to binary search
    /// if the cursor moved across too many segments in one step.
    fn relocate_segment(&mut self, cumulative: &[f32]) {
        let last = cumulative.len() - 2;
        let mut segment = self.segment.min(last);
        let mut steps = 0;

        while segment < last && self.cursor > cumulative[segment + 1] {
            segment += 1;
            steps += 1;
            if steps > MAX_INCREMENTAL_STEPS {
                self.segment = locate_segment(cumulative, self.cursor);
                return;
            }
        }
        while segment > 0 && self.cursor < cumulative[segment] {
            segment -= 1;
            steps += 1;
            if steps > MAX_INCREMENTAL_STEPS {
                self.segment = locate_segment(cumulative, self.cursor);
                return;
            }
        }

        self.segment = segment;
    }

    fn project(&self, p: Vec3, terrain: &TerrainMesh) -> Vec3 {
        Vec3::new(p.x, terrain.height_at(p.x, p.z) + self.offset, p.z)
    }

    pub fn position(&self) -> Vec3 { self.position }
    pub fn cursor_distance(&self) -> f32 { self.cursor }
    pub fn segment_index(&self) -> usize { self.segment }
    pub fn direction(&self) -> Direction { self.direction }
    pub fn policy(&self) -> BoundaryPolicy { self.policy }

    /// Interpolation factor inside the active segment, in [0, 1].
    pub fn local_t(&self) -> f32 { self.local_t }

    pub fn stats(&self, track: &PathTrack) -> HikeStats {
        HikeStats {
            distance_hiked: self.distance_hiked,
            distance_remaining: (track.total_length() - self.cursor).max(0.0),
            time_elapsed: self.time_elapsed,
        }
    }
}

/// First segment whose end is at or beyond `cursor`.
/// `cumulative` must hold at least two entries.
fn locate_segment(cumulative: &[f32], cursor: f32) -> usize {
    cumulative[1..]
        .partition_point(|&d| d < cursor)
        .min(cumulative.len() - 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::{PathConfig, TerrainConfig};
    use crate::engine::heightfield::Heightfield;

    const OFFSET: f32 = 0.5;

    fn flat_terrain() -> TerrainMesh {
        let field = Heightfield::from_samples(21, 21, vec![0.0; 21 * 21]).unwrap();
        TerrainMesh::build(&field, &TerrainConfig { height_scale: 1.0, horizontal_scale: 1.0, texture_repeat: 1.0 })
    }

    fn track(points: &[[f32; 3]], terrain: &TerrainMesh) -> PathTrack {
        let raw = points.iter().map(|&p| Vec3::from_array(p)).collect();
        PathTrack::from_points(raw, terrain, &PathConfig { horizontal_scale: 1.0, offset: OFFSET })
    }

    fn l_shape(terrain: &TerrainMesh) -> PathTrack {
        track(&[[0.0, 0.0, 0.0], [10.0, 0.0, 0.0], [10.0, 0.0, 10.0]], terrain)
    }

    fn assert_segment_invariant(walker: &PathWalker, track: &PathTrack) {
        let c = track.cumulative_distances();
        let s = walker.segment_index();
        let d = walker.cursor_distance();
        assert!(s + 1 < c.len());
        assert!(c[s] <= d + 1e-4 && d <= c[s + 1] + 1e-4, "cursor {d} outside segment {s} [{}, {}]", c[s], c[s + 1]);
    }

    #[test]
    fn starts_at_first_waypoint_moving_forward() {
        let terrain = flat_terrain();
        let track = l_shape(&terrain);
        let walker = PathWalker::new(&track, &terrain, BoundaryPolicy::Bounce, OFFSET);

        assert_eq!(walker.cursor_distance(), 0.0);
        assert_eq!(walker.segment_index(), 0);
        assert_eq!(walker.direction(), Direction::Forward);
        assert_eq!(walker.position(), Vec3::new(0.0, OFFSET, 0.0));
    }

    #[test]
    fn three_seconds_at_speed_five_lands_mid_second_segment() {
        let terrain = flat_terrain();
        let track = l_shape(&terrain);
        let mut walker = PathWalker::new(&track, &terrain, BoundaryPolicy::Bounce, OFFSET);

        walker.step(&track, &terrain, 3.0, 5.0);

        assert_eq!(walker.cursor_distance(), 15.0);
        assert_eq!(walker.segment_index(), 1);
        assert_eq!(walker.local_t(), 0.5);
        assert!(walker.position().abs_diff_eq(Vec3::new(10.0, OFFSET, 5.0), 1e-5));
    }

    #[test]
    fn bounce_lands_on_end_then_walks_back() {
        let terrain = flat_terrain();
        let track = l_shape(&terrain);
        let mut walker = PathWalker::new(&track, &terrain, BoundaryPolicy::Bounce, OFFSET);

        // 16 steps of 1.25 units cover exactly total_length / speed seconds.
        for _ in 0..16 {
            walker.step(&track, &terrain, 0.25, 5.0);
            assert_segment_invariant(&walker, &track);
        }
        assert_eq!(walker.cursor_distance(), track.total_length());
        assert_eq!(walker.direction(), Direction::Backward);
        assert!(walker.position().abs_diff_eq(Vec3::new(10.0, OFFSET, 10.0), 1e-5));

        walker.step(&track, &terrain, 0.25, 5.0);
        assert_eq!(walker.cursor_distance(), 18.75);
        assert_eq!(walker.direction(), Direction::Backward);
    }

    #[test]
    fn bounce_turns_forward_again_at_start() {
        let terrain = flat_terrain();
        let track = l_shape(&terrain);
        let mut walker = PathWalker::new(&track, &terrain, BoundaryPolicy::Bounce, OFFSET);

        walker.step(&track, &terrain, 1.0, 5.0);
        walker.set_direction(Direction::Backward);
        walker.step(&track, &terrain, 2.0, 5.0);

        assert_eq!(walker.cursor_distance(), 0.0);
        assert_eq!(walker.direction(), Direction::Forward);
        assert_eq!(walker.segment_index(), 0);
        assert!(walker.position().abs_diff_eq(Vec3::new(0.0, OFFSET, 0.0), 1e-5));
    }

    #[test]
    fn loop_wraps_without_changing_direction() {
        let terrain = flat_terrain();
        let track = l_shape(&terrain);
        let mut walker = PathWalker::new(&track, &terrain, BoundaryPolicy::Loop, OFFSET);

        walker.step(&track, &terrain, 3.0, 5.0);
        walker.step(&track, &terrain, 2.0, 5.0);

        assert_eq!(walker.cursor_distance(), 5.0);
        assert_eq!(walker.direction(), Direction::Forward);
        assert_eq!(walker.segment_index(), 0);
        assert!(walker.position().abs_diff_eq(Vec3::new(5.0, OFFSET, 0.0), 1e-5));
        assert_eq!(walker.stats(&track).distance_hiked, 25.0);
    }

    #[test]
    fn loop_reaching_end_exactly_restarts_at_zero() {
        let terrain = flat_terrain();
        let track = l_shape(&terrain);
        let mut walker = PathWalker::new(&track, &terrain, BoundaryPolicy::Loop, OFFSET);

        walker.step(&track, &terrain, 4.0, 5.0);
        assert_eq!(walker.cursor_distance(), 0.0);
        assert_eq!(walker.segment_index(), 0);
    }

    #[test]
    fn loop_backward_wraps_to_the_end() {
        let terrain = flat_terrain();
        let track = l_shape(&terrain);
        let mut walker = PathWalker::new(&track, &terrain, BoundaryPolicy::Loop, OFFSET);

        walker.set_direction(Direction::Backward);
        walker.step(&track, &terrain, 1.0, 5.0);
        assert_eq!(walker.cursor_distance(), 15.0);
        assert_eq!(walker.direction(), Direction::Backward);
        assert_eq!(walker.segment_index(), 1);
    }

    #[test]
    fn explicit_commands_force_direction() {
        let terrain = flat_terrain();
        let track = l_shape(&terrain);
        let mut walker = PathWalker::new(&track, &terrain, BoundaryPolicy::Bounce, OFFSET);

        walker.set_direction(Direction::Forward);
        walker.step(&track, &terrain, 2.6, 5.0);
        assert_eq!(walker.segment_index(), 1);
        walker.set_direction(Direction::Backward);
        walker.step(&track, &terrain, 1.0, 5.0);
        assert_eq!(walker.direction(), Direction::Backward);
        assert!((walker.cursor_distance() - 8.0).abs() < 1e-5);
        assert_eq!(walker.segment_index(), 0);
        assert_segment_invariant(&walker, &track);
    }

    #[test]
    fn reset_then_zero_step_sits_on_first_waypoint() {
        let terrain = flat_terrain();
        let track = l_shape(&terrain);
        let mut walker = PathWalker::new(&track, &terrain, BoundaryPolicy::Bounce, OFFSET);

        walker.step(&track, &terrain, 3.3, 5.0);
        walker.reset(&track, &terrain);
        walker.step(&track, &terrain, 0.0, 5.0);

        assert_eq!(walker.position(), track.points()[0]);
        assert_eq!(walker.stats(&track), HikeStats { distance_hiked: 0.0, distance_remaining: 20.0, time_elapsed: 0.0 });
    }

    #[test]
    fn single_point_track_stays_pinned() {
        let terrain = flat_terrain();
        let track = track(&[[2.0, 7.0, -3.0]], &terrain);
        let mut walker = PathWalker::new(&track, &terrain, BoundaryPolicy::Bounce, OFFSET);

        for dt in [0.0, 0.016, 1.0, 100.0] {
            walker.step(&track, &terrain, dt, 5.0);
            let p = walker.position();
            assert!(p.is_finite());
            assert_eq!(p, Vec3::new(2.0, OFFSET, -3.0));
            assert_eq!(walker.cursor_distance(), 0.0);
        }
    }

    #[test]
    fn zero_length_segments_do_not_produce_nan() {
        let terrain = flat_terrain();
        let track = track(
            &[[0.0, 0.0, 0.0], [0.0, 0.0, 0.0], [4.0, 0.0, 0.0], [4.0, 0.0, 0.0], [4.0, 0.0, 3.0]],
            &terrain,
        );
        let mut walker = PathWalker::new(&track, &terrain, BoundaryPolicy::Bounce, OFFSET);

        for _ in 0..40 {
            walker.step(&track, &terrain, 0.1, 3.0);
            assert!(walker.position().is_finite());
            assert!((0.0..=1.0).contains(&walker.local_t()));
            assert_segment_invariant(&walker, &track);
        }
    }

    #[test]
    fn large_time_spike_still_finds_segment() {
        let terrain = flat_terrain();
        // Zigzag of 30 equal segments.
        let points: Vec<[f32; 3]> = (0..31)
            .map(|i| [(i % 2) as f32, 0.0, i as f32 * 0.25 - 3.75])
            .collect();
        let track = track(&points, &terrain);
        let mut walker = PathWalker::new(&track, &terrain, BoundaryPolicy::Bounce, OFFSET);

        walker.step(&track, &terrain, 1.0, track.total_length() * 0.8);
        assert_segment_invariant(&walker, &track);
        assert!(walker.segment_index() > MAX_INCREMENTAL_STEPS);

        walker.set_direction(Direction::Backward);
        walker.step(&track, &terrain, 1.0, track.total_length() * 0.7);
        assert_segment_invariant(&walker, &track);
        assert!(walker.segment_index() < 10);
    }

    #[test]
    fn position_follows_terrain_between_waypoints() {
        // A ridge along z = 0 that the straight segment crosses.
        let samples: Vec<f32> = (0..5).flat_map(|z| [if z == 2 { 8.0 } else { 0.0 }; 5]).collect();
        let field = Heightfield::from_samples(5, 5, samples).unwrap();
        let terrain = TerrainMesh::build(&field, &TerrainConfig { height_scale: 1.0, horizontal_scale: 1.0, texture_repeat: 1.0 });
        let track = track(&[[0.0, 0.0, -2.0], [0.0, 0.0, 2.0]], &terrain);
        let mut walker = PathWalker::new(&track, &terrain, BoundaryPolicy::Bounce, OFFSET);

        // Both endpoints sit on flat ground; the midpoint is on the ridge.
        walker.step(&track, &terrain, 1.0, 2.0);
        assert!(walker.position().abs_diff_eq(Vec3::new(0.0, 8.0 + OFFSET, 0.0), 1e-5));
    }

    #[test]
    fn stats_track_distance_and_time() {
        let terrain = flat_terrain();
        let track = l_shape(&terrain);
        let mut walker = PathWalker::new(&track, &terrain, BoundaryPolicy::Bounce, OFFSET);

        walker.step(&track, &terrain, 3.0, 5.0);
        walker.step(&track, &terrain, 2.0, 5.0);
        walker.step(&track, &terrain, 1.0, 5.0);

        let stats = walker.stats(&track);
        assert_eq!(stats.time_elapsed, 6.0);
        // 15 forward, 5 to the end (clamped), then 5 back.
        assert_eq!(stats.distance_hiked, 25.0);
        assert_eq!(stats.distance_remaining, 5.0);
    }

    #[test]
    fn negative_inputs_do_not_move_the_walker() {
        let terrain = flat_terrain();
        let track = l_shape(&terrain);
        let mut walker = PathWalker::new(&track, &terrain, BoundaryPolicy::Bounce, OFFSET);

        walker.step(&track, &terrain, -1.0, 5.0);
        walker.step(&track, &terrain, 1.0, -5.0);
        assert_eq!(walker.cursor_distance(), 0.0);
        assert_eq!(walker.direction(), Direction::Forward);
    }
}
