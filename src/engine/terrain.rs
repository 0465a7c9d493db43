// Heightfield → triangulated terrain surface.
//
// Built once at load, then shared read-only by the path loader, every walker
// and the renderer. The only query is `height_at`, which never fails.
//
// Grid layout: vertex (x, z) sits at index z * width + x and at world
// position (x * s - half_width, elevation, z * s - half_depth), so the grid is
// centred on the origin.

use std::path::Path;

use glam::{Vec2, Vec3};
use log::info;

use super::config::TerrainConfig;
use super::error::TerrainError;
use super::heightfield::Heightfield;
use super::mesh::{GpuVertex, RenderMesh};

pub struct TerrainMesh {
    width: u32,
    height: u32,
    horizontal_scale: f32,
    half_width: f32,
    half_depth: f32,
    max_height: f32,

    pub positions:  Vec<Vec3>,
    /// Unit length, pointing +Y on any heightfield.
    pub normals:    Vec<Vec3>,
    pub tex_coords: Vec<Vec2>,
    /// Two triangles per cell: (i0, i1, i2) and (i1, i3, i2), where
    /// i0 = (x, z), i1 = (x+1, z), i2 = (x, z+1), i3 = (x+1, z+1).
    /// Seen from above these wind clockwise.
    pub indices:    Vec<u32>,
}

impl TerrainMesh {
    /// Decode `path` and build the mesh in one go.
    pub fn load(path: &Path, config: &TerrainConfig) -> Result<Self, TerrainError> {
        let field = Heightfield::load(path, config.height_scale)?;
        let mesh = Self::build(&field, config);
        info!(
            "Terrain mesh: {} vertices, {} triangles, extent {:.1} x {:.1}, max height {:.2}",
            mesh.positions.len(),
            mesh.indices.len() / 3,
            mesh.half_width * 2.0,
            mesh.half_depth * 2.0,
            mesh.max_height
        );
        Ok(mesh)
    }

    /// Derive positions, texture coordinates, smooth normals and indices.
    pub fn build(field: &Heightfield, config: &TerrainConfig) -> Self {
        let (width, height) = (field.width(), field.height());
        let s = config.horizontal_scale;
        let half_width = (width - 1) as f32 * s * 0.5;
        let half_depth = (height - 1) as f32 * s * 0.5;
        let n_verts = (width * height) as usize;

        let mut positions = Vec::with_capacity(n_verts);
        let mut tex_coords = Vec::with_capacity(n_verts);
        let mut max_height = 0.0_f32;

        for z in 0..height {
            for x in 0..width {
                let elevation = field.get(x, z);
                max_height = max_height.max(elevation);

                positions.push(Vec3::new(
                    x as f32 * s - half_width,
                    elevation,
                    z as f32 * s - half_depth,
                ));
                tex_coords.push(Vec2::new(
                    x as f32 / (width - 1) as f32 * config.texture_repeat,
                    z as f32 / (height - 1) as f32 * config.texture_repeat,
                ));
            }
        }

        let indices = triangulate_grid(width, height);
        let normals = smooth_normals(&positions, &indices);

        Self {
            width,
            height,
            horizontal_scale: s,
            half_width,
            half_depth,
            max_height,
            positions,
            normals,
            tex_coords,
            indices,
        }
    }

    /// Bilinearly interpolated surface height under world (x, z).
    ///
    /// Inputs outside the grid are clamped to the nearest edge, so this is
    /// total: it returns the boundary height rather than failing.
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        let max_x = (self.width - 1) as f32;
        let max_z = (self.height - 1) as f32;
        let local_x = ((x + self.half_width) / self.horizontal_scale).clamp(0.0, max_x);
        let local_z = ((z + self.half_depth) / self.horizontal_scale).clamp(0.0, max_z);

        let x0 = local_x as u32;
        let z0 = local_z as u32;
        let x1 = (x0 + 1).min(self.width - 1);
        let z1 = (z0 + 1).min(self.height - 1);
        let fx = local_x - x0 as f32;
        let fz = local_z - z0 as f32;

        let h00 = self.elevation(x0, z0);
        let h10 = self.elevation(x1, z0);
        let h01 = self.elevation(x0, z1);
        let h11 = self.elevation(x1, z1);

        let h0 = h00 + (h10 - h00) * fx;
        let h1 = h01 + (h11 - h01) * fx;
        h0 + (h1 - h0) * fz
    }

    /// Clamp a horizontal (x, z) position into the mesh footprint.
    pub fn clamp_to_bounds(&self, xz: Vec2) -> Vec2 {
        let half = self.half_extents();
        xz.clamp(-half, half)
    }

    #[inline]
    fn elevation(&self, x: u32, z: u32) -> f32 {
        self.positions[(z * self.width + x) as usize].y
    }

    pub fn width(&self) -> u32 { self.width }
    pub fn height(&self) -> u32 { self.height }
    pub fn horizontal_scale(&self) -> f32 { self.horizontal_scale }
    pub fn max_height(&self) -> f32 { self.max_height }

    /// Half the footprint along X and Z; the mesh spans [-half, half].
    pub fn half_extents(&self) -> Vec2 {
        Vec2::new(self.half_width, self.half_depth)
    }

    /// Interleave position / normal / tex_coord for upload.
    pub fn to_render_mesh(&self) -> RenderMesh<GpuVertex> {
        let vertices = self.positions.iter()
            .zip(&self.normals)
            .zip(&self.tex_coords)
            .map(|((p, n), t)| GpuVertex {
                position:  p.to_array(),
                normal:    n.to_array(),
                tex_coord: t.to_array(),
            })
            .collect();

        RenderMesh { vertices, indices: self.indices.clone() }
    }
}

// ============================================================================
// TRIANGULATION + SMOOTH NORMALS
// ============================================================================

/// Two triangles per grid cell, same diagonal everywhere.
fn triangulate_grid(width: u32, height: u32) -> Vec<u32> {
    let mut indices = Vec::with_capacity(6 * ((width - 1) * (height - 1)) as usize);
    for z in 0..height - 1 {
        for x in 0..width - 1 {
            let i0 = z * width + x;
            let i1 = i0 + 1;
            let i2 = i0 + width;
            let i3 = i2 + 1;
            indices.extend_from_slice(&[i0, i1, i2, i1, i3, i2]);
        }
    }
    indices
}

/// Area-weighted vertex normals.
///
///   1. For each triangle accumulate its unnormalized face normal onto its
///      three corners. The cross product magnitude is 2×area, so larger
///      faces weigh more.
///   2. Normalize each accumulator.
///
/// Boundary vertices touch fewer faces and simply average fewer terms.
fn smooth_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normal_accum = vec![Vec3::ZERO; positions.len()];

    for tri in indices.chunks_exact(3) {
        let (a, b, c) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        // Winding is clockwise from above, so (c - a) × (b - a) points up.
        let weighted = (positions[c] - positions[a]).cross(positions[b] - positions[a]);
        normal_accum[a] += weighted;
        normal_accum[b] += weighted;
        normal_accum[c] += weighted;
    }

    normal_accum.into_iter().map(Vec3::normalize_or_zero).collect()
}
