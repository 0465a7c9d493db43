// GPU-facing mesh types.
//
// Two-layer architecture:
//   TerrainMesh / PathTrack (CPU, queryable) → RenderMesh (interleaved bytes) → GpuMesh (wgpu buffers)
//
// GpuMesh owns its buffers and must be released exactly once on teardown.

use wgpu::util::DeviceExt;

// ============================================================================
// GPU VERTICES
// ============================================================================

/// Interleaved terrain vertex:
///   @location(0) position:  vec3<f32>
///   @location(1) normal:    vec3<f32>
///   @location(2) tex_coord: vec2<f32>
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuVertex {
    pub position:  [f32; 3],
    pub normal:    [f32; 3],
    pub tex_coord: [f32; 2],
}

impl GpuVertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
            0 => Float32x3,
            1 => Float32x3,
            2 => Float32x2,
        ];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<GpuVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

/// Position-only vertex used for the path line strip and agent cubes.
///   @location(0) position: vec3<f32>
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LineVertex {
    pub position: [f32; 3],
}

impl LineVertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<LineVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x3,
            }],
        }
    }
}

// ============================================================================
// RENDER MESH
// ============================================================================

/// Interleaved vertex data plus an optional index list, ready for upload.
/// An empty `indices` means the mesh is drawn non-indexed (line strips).
pub struct RenderMesh<V: bytemuck::Pod> {
    pub vertices: Vec<V>,
    pub indices:  Vec<u32>,
}

impl<V: bytemuck::Pod> RenderMesh<V> {
    /// Cast vertex slice to raw bytes for wgpu buffer upload.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Cast index slice to raw bytes for wgpu buffer upload.
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

/// Unit cube centred on the origin, used to draw agents.
pub fn agent_cube(half: f32) -> RenderMesh<LineVertex> {
    let corners = [
        [-half, -half,  half], [ half, -half,  half], [ half,  half,  half], [-half,  half,  half],
        [-half, -half, -half], [ half, -half, -half], [ half,  half, -half], [-half,  half, -half],
    ];
    RenderMesh {
        vertices: corners.iter().map(|&position| LineVertex { position }).collect(),
        indices: vec![
            0, 1, 2,  0, 2, 3,  // Front
            5, 4, 7,  5, 7, 6,  // Back
            4, 0, 3,  4, 3, 7,  // Left
            1, 5, 6,  1, 6, 2,  // Right
            3, 2, 6,  3, 6, 7,  // Top
            4, 5, 1,  4, 1, 0,  // Bottom
        ],
    }
}

// ============================================================================
// GPU MESH
// ============================================================================

/// A device allocation that can be freed ahead of drop.
pub trait DeviceBuffer {
    fn destroy(&self);
}

impl DeviceBuffer for wgpu::Buffer {
    fn destroy(&self) {
        wgpu::Buffer::destroy(self);
    }
}

/// Vertex (and optionally index) buffers living on the device.
///
/// `release()` destroys both buffers; a released mesh draws nothing and
/// further releases are no-ops.
pub struct GpuMesh<B: DeviceBuffer = wgpu::Buffer> {
    buffers: Option<(B, Option<B>)>,
    vertex_count: u32,
    index_count: u32,
}

impl GpuMesh {
    pub fn upload<V: bytemuck::Pod>(device: &wgpu::Device, label: &str, mesh: &RenderMesh<V>) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: mesh.vertex_bytes(),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = (!mesh.indices.is_empty()).then(|| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: mesh.index_bytes(),
                usage: wgpu::BufferUsages::INDEX,
            })
        });

        Self::from_buffers(
            vertex_buffer,
            index_buffer,
            mesh.vertices.len() as u32,
            mesh.indices.len() as u32,
        )
    }

    /// Issue the draw call for this mesh with `instances`.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, instances: std::ops::Range<u32>) {
        let Some((vertex_buffer, index_buffer)) = &self.buffers else {
            return;
        };
        pass.set_vertex_buffer(0, vertex_buffer.slice(..));
        match index_buffer {
            Some(index_buffer) => {
                pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..self.index_count, 0, instances);
            }
            None => pass.draw(0..self.vertex_count, instances),
        }
    }
}

impl<B: DeviceBuffer> GpuMesh<B> {
    fn from_buffers(vertex: B, index: Option<B>, vertex_count: u32, index_count: u32) -> Self {
        Self {
            buffers: Some((vertex, index)),
            vertex_count,
            index_count,
        }
    }

    pub fn is_released(&self) -> bool {
        self.buffers.is_none()
    }

    /// Destroy the device buffers. Returns false if they were already gone.
    pub fn release(&mut self) -> bool {
        let Some((vertex_buffer, index_buffer)) = self.buffers.take() else {
            return false;
        };
        vertex_buffer.destroy();
        if let Some(index_buffer) = index_buffer {
            index_buffer.destroy();
        }
        log::debug!(
            "Released mesh buffers ({} vertices, {} indices)",
            self.vertex_count,
            self.index_count
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn terrain_vertex_layout_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<GpuVertex>(), 8 * 4);
        let layout = GpuVertex::desc();
        assert_eq!(layout.array_stride, 32);
        assert_eq!(layout.attributes[1].offset, 12);
        assert_eq!(layout.attributes[2].offset, 24);
    }

    #[test]
    fn cube_indices_stay_in_range() {
        let cube = agent_cube(0.5);
        assert_eq!(cube.vertices.len(), 8);
        assert_eq!(cube.indices.len(), 36);
        assert!(cube.indices.iter().all(|&i| i < 8));
        assert_eq!(cube.vertex_bytes().len(), 8 * 12);
        assert_eq!(cube.index_bytes().len(), 36 * 4);
    }

    struct CountingBuffer(Rc<Cell<u32>>);

    impl DeviceBuffer for CountingBuffer {
        fn destroy(&self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn release_destroys_each_buffer_once() {
        let destroyed = Rc::new(Cell::new(0));
        let mut mesh = GpuMesh::from_buffers(
            CountingBuffer(destroyed.clone()),
            Some(CountingBuffer(destroyed.clone())),
            8,
            36,
        );
        assert!(!mesh.is_released());

        assert!(mesh.release());
        assert!(mesh.is_released());
        assert_eq!(destroyed.get(), 2);

        assert!(!mesh.release());
        assert!(!mesh.release());
        assert_eq!(destroyed.get(), 2);
    }

    #[test]
    fn release_without_index_buffer() {
        let destroyed = Rc::new(Cell::new(0));
        let mut mesh = GpuMesh::from_buffers(CountingBuffer(destroyed.clone()), None, 5, 0);

        assert!(mesh.release());
        assert!(!mesh.release());
        assert_eq!(destroyed.get(), 1);
    }
}
