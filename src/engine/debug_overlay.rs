use egui::epaint::Shadow;

use super::walker::{BoundaryPolicy, Direction, HikeStats};

pub struct OverlayStats {
    pub fps: u32,
    pub frame_time_avg_ms: f32,
    pub resolution: (u32, u32),
    pub camera_mode: &'static str,
    pub follow_distance: f32,
    pub terrain_grid: (u32, u32),
    pub grid_spacing: f32,
    pub hike: HikeStats,
    pub track_length: f32,
    pub elevation_change: f32,
    pub waypoint_count: usize,
    pub segment_index: usize,
    pub segment_t: f32,
    pub cursor_distance: f32,
    pub direction: Direction,
    pub policy: BoundaryPolicy,
    pub hiker_position: (f32, f32, f32),
}

pub struct DebugOverlay {
    pub visible: bool,
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

impl DebugOverlay {
    pub fn new(
        window: &winit::window::Window,
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
    ) -> Self {
        let egui_ctx = egui::Context::default();

        // Style: dark, semi-transparent, small monospace white font
        let mut visuals = egui::Visuals::dark();
        visuals.window_fill = egui::Color32::from_rgba_premultiplied(0, 0, 0, 180);
        visuals.window_stroke = egui::Stroke::NONE;
        visuals.window_shadow = Shadow::NONE;
        visuals.override_text_color = Some(egui::Color32::WHITE);
        egui_ctx.set_visuals(visuals);

        let mut style = (*egui_ctx.style()).clone();
        style.override_font_id = Some(egui::FontId::monospace(13.0));
        egui_ctx.set_style(style);

        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );

        let egui_renderer = egui_wgpu::Renderer::new(
            device,
            surface_format,
            None,  // drawn after the scene, no depth test
            1,     // msaa samples
            false, // no dithering
        );

        Self {
            visible: true,
            egui_ctx,
            egui_state,
            egui_renderer,
        }
    }

    pub fn toggle(&mut self) {
        self.visible = !self.visible;
    }

    pub fn handle_window_event(
        &mut self,
        window: &winit::window::Window,
        event: &winit::event::WindowEvent,
    ) -> egui_winit::EventResponse {
        self.egui_state.on_window_event(window, event)
    }

    /// Render one egui frame with the hike panel (`None` or hidden = empty frame).
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        window: &winit::window::Window,
        view: &wgpu::TextureView,
        screen_descriptor: &egui_wgpu::ScreenDescriptor,
        stats: Option<&OverlayStats>,
    ) {
        let raw_input = self.egui_state.take_egui_input(window);
        let visible = self.visible;

        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            let Some(stats) = stats.filter(|_| visible) else {
                return;
            };
            egui::Area::new(egui::Id::new("hike_overlay"))
                .fixed_pos(egui::pos2(10.0, 10.0))
                .show(ctx, |ui| {
                    egui::Frame::none()
                        .fill(egui::Color32::from_rgba_premultiplied(0, 0, 0, 180))
                        .inner_margin(egui::Margin::same(8.0))
                        .rounding(4.0)
                        .show(ui, |ui: &mut egui::Ui| {
                            ui.label(format!(
                                "FPS: {}  ({:.2} ms)",
                                stats.fps, stats.frame_time_avg_ms
                            ));
                            ui.label(format!(
                                "Resolution: {} x {}  Camera: {} ({:.0} m behind)",
                                stats.resolution.0, stats.resolution.1, stats.camera_mode, stats.follow_distance
                            ));
                            ui.separator();
                            ui.label(format!(
                                "Terrain: {} x {} grid, {:.2} m spacing",
                                stats.terrain_grid.0, stats.terrain_grid.1, stats.grid_spacing
                            ));
                            ui.label(format!(
                                "Track: {:.1} m over {} waypoints, {:.1} m elevation change",
                                stats.track_length, stats.waypoint_count, stats.elevation_change
                            ));
                            ui.label(format!("Distance hiked:     {:.1} m", stats.hike.distance_hiked));
                            ui.label(format!("Distance remaining: {:.1} m", stats.hike.distance_remaining));
                            ui.label(format!("Time elapsed:       {:.1} s", stats.hike.time_elapsed));
                            ui.label(format!(
                                "Cursor {:.1} m  segment {} (t {:.2})  {:?} / {:?}",
                                stats.cursor_distance,
                                stats.segment_index,
                                stats.segment_t,
                                stats.direction,
                                stats.policy,
                            ));
                            ui.label(format!(
                                "Hiker at ({:.1}, {:.1}, {:.1})",
                                stats.hiker_position.0,
                                stats.hiker_position.1,
                                stats.hiker_position.2,
                            ));
                            ui.separator();
                            ui.label("W/S direction  R reset  1/2/3 camera  F3 panel");
                        });
                });
        });

        self.egui_state
            .handle_platform_output(window, full_output.platform_output);

        let tris = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);

        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui_renderer
                .update_texture(device, queue, *id, image_delta);
        }

        self.egui_renderer
            .update_buffers(device, queue, encoder, &tris, screen_descriptor);

        {
            let render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            self.egui_renderer
                .render(&mut render_pass.forget_lifetime(), &tris, screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }
    }
}
