// Recorded route loaded from a text file and draped over the terrain.
//
// File format: whitespace-separated floats read as consecutive `x y z`
// triples, no header. Reading stops at the first token that is not a number;
// a trailing incomplete triple is dropped.

use std::path::Path;

use glam::{Vec2, Vec3};
use log::{info, warn};

use super::config::PathConfig;
use super::error::PathError;
use super::mesh::{LineVertex, RenderMesh};
use super::terrain::TerrainMesh;

/// Ordered waypoints with cumulative arc length.
///
/// Every waypoint lies inside the terrain footprint at the configured offset above the
/// surface. `cumulative[0] == 0` and `cumulative` is non-decreasing.
#[derive(Debug, Clone)]
pub struct PathTrack {
    points: Vec<Vec3>,
    cumulative: Vec<f32>,
}

impl PathTrack {
    /// Read, validate and measure a path file in one step.
    pub fn load(path: &Path, terrain: &TerrainMesh, config: &PathConfig) -> Result<Self, PathError> {
        let text = std::fs::read_to_string(path).map_err(|source| PathError::FileOpen {
            path: path.to_path_buf(),
            source,
        })?;

        let raw = parse_points(&text);
        if raw.is_empty() {
            return Err(PathError::Empty { path: path.to_path_buf() });
        }

        let track = Self::from_points(raw, terrain, config);
        info!(
            "Loaded path {:?}: {} waypoints, length {:.1}, elevation change {:.1}",
            path,
            track.points.len(),
            track.total_length(),
            track.elevation_change()
        );
        Ok(track)
    }

    /// Scale, clamp and re-project `raw` onto `terrain`.
    ///
    /// The file's own elevation is discarded: each waypoint's y becomes the
    /// terrain height under it plus `config.offset`. `raw` must be non-empty.
    pub fn from_points(raw: Vec<Vec3>, terrain: &TerrainMesh, config: &PathConfig) -> Self {
        debug_assert!(!raw.is_empty(), "a path needs at least one waypoint");

        let mut clamped = 0usize;
        let points: Vec<Vec3> = raw
            .into_iter()
            .map(|p| {
                let scaled = Vec2::new(p.x, p.z) * config.horizontal_scale;
                let xz = terrain.clamp_to_bounds(scaled);
                if xz != scaled {
                    clamped += 1;
                }
                Vec3::new(xz.x, terrain.height_at(xz.x, xz.y) + config.offset, xz.y)
            })
            .collect();

        if clamped > 0 {
            warn!("{} of {} waypoints were outside the terrain and got clamped", clamped, points.len());
        }

        let cumulative = cumulative_distances(&points);
        Self { points, cumulative }
    }

    pub fn points(&self) -> &[Vec3] { &self.points }

    /// Arc length from the first waypoint to each waypoint.
    pub fn cumulative_distances(&self) -> &[f32] { &self.cumulative }

    pub fn total_length(&self) -> f32 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    /// Number of segments; zero for a single-point track.
    pub fn segment_count(&self) -> usize {
        self.points.len().saturating_sub(1)
    }

    /// Sum of absolute height differences between consecutive waypoints.
    pub fn elevation_change(&self) -> f32 {
        self.points.windows(2).map(|w| (w[1].y - w[0].y).abs()).sum()
    }

    /// Waypoints as a line strip, drawn non-indexed.
    pub fn to_line_strip(&self) -> RenderMesh<LineVertex> {
        RenderMesh {
            vertices: self.points.iter().map(|p| LineVertex { position: p.to_array() }).collect(),
            indices: Vec::new(),
        }
    }
}

/// Parse consecutive `x y z` triples; see the module note on truncation.
pub fn parse_points(text: &str) -> Vec<Vec3> {
    let mut values = Vec::new();
    for token in text.split_whitespace() {
        match token.parse::<f32>() {
            Ok(v) => values.push(v),
            Err(_) => {
                warn!("Stopped reading path at non-numeric token {:?}", token);
                break;
            }
        }
    }

    let leftover = values.len() % 3;
    if leftover != 0 {
        warn!("Dropping {} trailing value(s) that do not form a full triple", leftover);
    }

    values.chunks_exact(3).map(|c| Vec3::new(c[0], c[1], c[2])).collect()
}

fn cumulative_distances(points: &[Vec3]) -> Vec<f32> {
    let mut cumulative = Vec::with_capacity(points.len());
    let mut total = 0.0;
    cumulative.push(total);
    for w in points.windows(2) {
        total += w[0].distance(w[1]);
        cumulative.push(total);
    }
    cumulative
}
