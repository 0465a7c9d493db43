// Trail walker: renders a heightmap terrain and animates agents along a
// recorded hiking path draped over it.
//
// Startup order: config → terrain → path → window/device → agents.
// Any load failure aborts before a window is created.

mod engine;

use std::sync::Arc;
use std::time::Instant;

use bevy_ecs::prelude::*;
use glam::{Mat4, Vec3};
use log::{error, info, warn};
use wgpu::util::DeviceExt;
use winit::{
    event::{ElementState, Event as WinitEvent, KeyEvent, WindowEvent},
    event_loop::EventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

use engine::camera::HikeCamera;
use engine::config::SimConfig;
use engine::debug_overlay::{DebugOverlay, OverlayStats};
use engine::input::InputState;
use engine::mesh::{agent_cube, GpuMesh, GpuVertex, LineVertex};
use engine::path::PathTrack;
use engine::systems::{self, WalkCommand};
use engine::terrain::TerrainMesh;
use engine::{AgentKind, Tint, Transform};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
/// Side length of the agent cubes in world units.
const AGENT_SIZE: f32 = 2.0;
const TRAIL_COLOR: [f32; 4] = [1.0, 0.1, 0.1, 1.0];

// ============================================================================
// INSTANCE DATA (per-agent)
// ============================================================================

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct InstanceData {
    offset: [f32; 3],
    scale: f32,
    color: [f32; 4],
}

impl InstanceData {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<InstanceData>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,  // One per instance, not per vertex
            attributes: &[
                // Offset (location 1)
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                // Scale (location 2)
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32,
                },
                // Color (location 3)
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    shader_location: 3,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}

// ============================================================================
// UNIFORM DATA
// ============================================================================

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Uniforms {
    view_proj: [[f32; 4]; 4],
    light_dir: [f32; 4],
    params: [f32; 4],
}

impl Uniforms {
    fn new(view_proj: Mat4, max_height: f32) -> Self {
        let light = Vec3::new(-0.4, -1.0, -0.3).normalize();
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            light_dir: light.extend(0.0).to_array(),
            params: [max_height, 0.0, 0.0, 0.0],
        }
    }
}

// ============================================================================
// APPLICATION STATE
// ============================================================================

struct State {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: winit::dpi::PhysicalSize<u32>,
    depth_view: wgpu::TextureView,

    terrain_pipeline: wgpu::RenderPipeline,
    trail_pipeline: wgpu::RenderPipeline,
    agent_pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,

    terrain_gpu: GpuMesh,
    trail_gpu: GpuMesh,
    cube_gpu: GpuMesh,
    trail_instance_buffer: wgpu::Buffer,
    agent_instance_buffer: wgpu::Buffer,
    max_instances: usize,

    // Scene: single owner of the terrain and track; walkers borrow them per frame.
    terrain: TerrainMesh,
    track: PathTrack,
    world: World,

    camera: HikeCamera,
    input: InputState,
    overlay: DebugOverlay,

    last_update: Instant,
    frame_count: u32,
    frame_time_accum: f32,
    last_fps_update: Instant,
    fps: u32,
    frame_time_avg_ms: f32,
}

impl State {
    async fn new(
        window: Arc<Window>,
        terrain: TerrainMesh,
        track: PathTrack,
        sim: &SimConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or("no compatible GPU adapter found")?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: None,
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps.present_modes[0],
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        surface.configure(&device, &config);
        let depth_view = create_depth_view(&device, &config);

        let terrain_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Terrain Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/terrain.wgsl").into()),
        });
        let flat_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Flat Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/flat.wgsl").into()),
        });

        let uniforms = Uniforms::new(Mat4::IDENTITY, terrain.max_height());

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Uniform Buffer"),
            contents: bytemuck::cast_slice(&[uniforms]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let uniform_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
                label: Some("uniform_bind_group_layout"),
            });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &uniform_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
            label: Some("uniform_bind_group"),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Render Pipeline Layout"),
            bind_group_layouts: &[&uniform_bind_group_layout],
            push_constant_ranges: &[],
        });

        // Terrain triangles wind clockwise seen from above.
        let terrain_pipeline = create_pipeline(
            &device,
            &pipeline_layout,
            &terrain_shader,
            PipelineDesc {
                label: "Terrain Pipeline",
                buffers: &[GpuVertex::desc()],
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Cw,
                cull_mode: Some(wgpu::Face::Back),
                depth_write: true,
                format: config.format,
            },
        );
        let trail_pipeline = create_pipeline(
            &device,
            &pipeline_layout,
            &flat_shader,
            PipelineDesc {
                label: "Trail Pipeline",
                buffers: &[LineVertex::desc(), InstanceData::desc()],
                topology: wgpu::PrimitiveTopology::LineStrip,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                depth_write: false,
                format: config.format,
            },
        );
        let agent_pipeline = create_pipeline(
            &device,
            &pipeline_layout,
            &flat_shader,
            PipelineDesc {
                label: "Agent Pipeline",
                buffers: &[LineVertex::desc(), InstanceData::desc()],
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                depth_write: true,
                format: config.format,
            },
        );

        let terrain_gpu = GpuMesh::upload(&device, "Terrain Mesh", &terrain.to_render_mesh());
        let trail_gpu = GpuMesh::upload(&device, "Trail Line Strip", &track.to_line_strip());
        let cube_gpu = GpuMesh::upload(&device, "Agent Cube", &agent_cube(0.5));

        let trail_instance = InstanceData {
            offset: [0.0; 3],
            scale: 1.0,
            color: TRAIL_COLOR,
        };
        let trail_instance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Trail Instance Buffer"),
            contents: bytemuck::cast_slice(&[trail_instance]),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let max_instances = 16;
        let agent_instance_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Agent Instance Buffer"),
            size: (max_instances * std::mem::size_of::<InstanceData>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // Agents: the hiker bounces (or loops, if configured), the character loops.
        let mut world = World::new();
        systems::spawn_agent(&mut world, &track, &terrain, AgentKind::Hiker, &sim.hiker, Tint::HIKER);
        systems::spawn_agent(&mut world, &track, &terrain, AgentKind::Character, &sim.character, Tint::CHARACTER);

        let camera = HikeCamera::new(terrain.half_extents(), terrain.max_height());
        let overlay = DebugOverlay::new(&window, &device, config.format);

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            size,
            depth_view,
            terrain_pipeline,
            trail_pipeline,
            agent_pipeline,
            uniform_buffer,
            uniform_bind_group,
            terrain_gpu,
            trail_gpu,
            cube_gpu,
            trail_instance_buffer,
            agent_instance_buffer,
            max_instances,
            terrain,
            track,
            world,
            camera,
            input: InputState::new(),
            overlay,
            last_update: Instant::now(),
            frame_count: 0,
            frame_time_accum: 0.0,
            last_fps_update: Instant::now(),
            fps: 0,
            frame_time_avg_ms: 0.0,
        })
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
            self.depth_view = create_depth_view(&self.device, &self.config);
        }
    }

    fn update(&mut self) {
        let now = Instant::now();
        let dt = (now - self.last_update).as_secs_f32();
        self.last_update = now;

        if self.input.is_key_held(KeyCode::KeyW) {
            systems::command_system(&mut self.world, &self.track, &self.terrain, WalkCommand::Forward);
        }
        if self.input.is_key_held(KeyCode::KeyS) {
            systems::command_system(&mut self.world, &self.track, &self.terrain, WalkCommand::Backward);
        }
        if self.input.was_key_pressed(KeyCode::KeyR) {
            systems::command_system(&mut self.world, &self.track, &self.terrain, WalkCommand::Reset);
            info!("Hike reset to the first waypoint");
        }
        if self.input.was_key_pressed(KeyCode::F3) {
            self.overlay.toggle();
        }

        systems::walk_system(&mut self.world, &self.track, &self.terrain, dt);

        let anchor = systems::hiker_position(&mut self.world).unwrap_or(Vec3::ZERO);
        self.camera.update(&self.input, anchor);

        self.frame_count += 1;
        self.frame_time_accum += dt;
        if (now - self.last_fps_update).as_secs_f32() >= 1.0 {
            self.fps = self.frame_count;
            self.frame_time_avg_ms = self.frame_time_accum * 1000.0 / self.frame_count as f32;
            self.frame_count = 0;
            self.frame_time_accum = 0.0;
            self.last_fps_update = now;
        }
    }

    fn overlay_stats(&mut self) -> Option<OverlayStats> {
        let walker = systems::hiker_walker(&mut self.world)?;
        let p = walker.position();
        Some(OverlayStats {
            fps: self.fps,
            frame_time_avg_ms: self.frame_time_avg_ms,
            resolution: (self.size.width, self.size.height),
            camera_mode: self.camera.mode.label(),
            follow_distance: self.camera.follow_distance(),
            terrain_grid: (self.terrain.width(), self.terrain.height()),
            grid_spacing: self.terrain.horizontal_scale(),
            hike: walker.stats(&self.track),
            track_length: self.track.total_length(),
            elevation_change: self.track.elevation_change(),
            waypoint_count: self.track.points().len(),
            segment_index: walker.segment_index(),
            segment_t: walker.local_t(),
            cursor_distance: walker.cursor_distance(),
            direction: walker.direction(),
            policy: walker.policy(),
            hiker_position: (p.x, p.y, p.z),
        })
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        // Collect instance data from ECS BEFORE creating render pass
        let mut instance_data = Vec::new();
        let mut query = self.world.query::<(&Transform, &Tint)>();
        for (transform, tint) in query.iter(&self.world) {
            instance_data.push(InstanceData {
                offset: transform.position.to_array(),
                scale: AGENT_SIZE,
                color: tint.to_array(),
            });
        }

        let instance_count = instance_data.len().min(self.max_instances);

        if instance_count > 0 {
            self.queue.write_buffer(
                &self.agent_instance_buffer,
                0,
                bytemuck::cast_slice(&instance_data[..instance_count]),
            );
        }

        let aspect = self.size.width as f32 / self.size.height.max(1) as f32;
        let uniforms = Uniforms::new(self.camera.view_projection(aspect), self.terrain.max_height());
        self.queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));

        let stats = self.overlay_stats();

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.2,
                            g: 0.3,
                            b: 0.4,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);

            render_pass.set_pipeline(&self.terrain_pipeline);
            self.terrain_gpu.draw(&mut render_pass, 0..1);

            render_pass.set_pipeline(&self.trail_pipeline);
            render_pass.set_vertex_buffer(1, self.trail_instance_buffer.slice(..));
            self.trail_gpu.draw(&mut render_pass, 0..1);

            render_pass.set_pipeline(&self.agent_pipeline);
            render_pass.set_vertex_buffer(1, self.agent_instance_buffer.slice(..));
            self.cube_gpu.draw(&mut render_pass, 0..instance_count as u32);
        }

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: self.window.scale_factor() as f32,
        };
        self.overlay.render(
            &self.device,
            &self.queue,
            &mut encoder,
            &self.window,
            &view,
            &screen_descriptor,
            stats.as_ref(),
        );

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }

    /// Release every device buffer. Safe to call more than once.
    fn teardown(&mut self) {
        let meshes = [&mut self.terrain_gpu, &mut self.trail_gpu, &mut self.cube_gpu];
        let released = meshes.into_iter().map(|mesh| mesh.release()).filter(|&done| done).count();
        if released > 0 {
            info!("Released {} scene meshes", released);
        }
        debug_assert!(
            self.terrain_gpu.is_released() && self.trail_gpu.is_released() && self.cube_gpu.is_released()
        );
    }
}

// ============================================================================
// PIPELINE HELPERS
// ============================================================================

struct PipelineDesc<'a> {
    label: &'a str,
    buffers: &'a [wgpu::VertexBufferLayout<'a>],
    topology: wgpu::PrimitiveTopology,
    front_face: wgpu::FrontFace,
    cull_mode: Option<wgpu::Face>,
    depth_write: bool,
    format: wgpu::TextureFormat,
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    desc: PipelineDesc<'_>,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(desc.label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: desc.buffers,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: desc.format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: desc.topology,
            strip_index_format: None,
            front_face: desc.front_face,
            cull_mode: desc.cull_mode,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: desc.depth_write,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
        cache: None,
    })
}

fn create_depth_view(device: &wgpu::Device, config: &wgpu::SurfaceConfiguration) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width: config.width,
            height: config.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

// ============================================================================
// MAIN
// ============================================================================

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let sim = SimConfig::from_args(std::env::args().skip(1))?;

    let terrain = TerrainMesh::load(&sim.heightmap, &sim.terrain)?;
    let track = PathTrack::load(&sim.path_file, &terrain, &sim.path_config())?;

    let event_loop = EventLoop::new()?;

    let window_attributes = Window::default_attributes()
        .with_title("Trail Walker")
        .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));

    let window = Arc::new(event_loop.create_window(window_attributes)?);

    let mut state = pollster::block_on(State::new(window, terrain, track, &sim))?;
    info!(
        "Walking {:.1} m of trail at {:.1} m/s ({:?})",
        state.track.total_length(),
        sim.hiker.speed,
        sim.hiker.policy
    );

    event_loop.run(move |event, control_flow| {
        match event {
            WinitEvent::WindowEvent {
                ref event,
                window_id,
            } if window_id == state.window.id() => {
                let response = state.overlay.handle_window_event(&state.window, event);
                if !response.consumed {
                    state.input.process_event(event);
                }

                match event {
                    WindowEvent::CloseRequested
                    | WindowEvent::KeyboardInput {
                        event:
                            KeyEvent {
                                state: ElementState::Pressed,
                                physical_key: PhysicalKey::Code(KeyCode::Escape),
                                ..
                            },
                        ..
                    } => {
                        state.teardown();
                        control_flow.exit();
                    }
                    WindowEvent::Resized(physical_size) => {
                        state.resize(*physical_size);
                    }
                    WindowEvent::RedrawRequested => {
                        state.update();
                        match state.render() {
                            Ok(_) => {}
                            Err(wgpu::SurfaceError::Lost) => state.resize(state.size),
                            Err(wgpu::SurfaceError::OutOfMemory) => {
                                state.teardown();
                                control_flow.exit();
                            }
                            Err(e) => warn!("{:?}", e),
                        }
                        state.input.end_frame();
                    }
                    _ => {}
                }
            }
            WinitEvent::AboutToWait => {
                state.window.request_redraw();
            }
            _ => {}
        }
    })?;

    Ok(())
}
