use crate::{
    camera::{OrbitControls, PerspectiveCamera},
    config::Config,
    gizmo::{handle_length, TransformGizmo},
    input::Command,
    loader::{spawn_loader, LoadEvent},
    renderer::{pipelines::splat::SplatUniforms, Renderer},
    scene::{Change, Scene},
    ui::{self, Hud},
};
use anyhow::Result;
use collage::{FrameReporter, Readout};
use crossbeam_channel::Receiver;
use glam::Vec2;
use std::{path::PathBuf, sync::Arc};
use winit::{
    dpi::PhysicalSize,
    event::{ElementState, MouseButton, WindowEvent},
    window::Window,
};

/// Surface size for a window of `physical` pixels at `scale_factor`, with
/// the device pixel ratio capped at `max_ratio`.
pub fn effective_surface_size(
    physical: PhysicalSize<u32>,
    scale_factor: f64,
    max_ratio: f64,
) -> PhysicalSize<u32> {
    let scale = if scale_factor > 0.0 { scale_factor } else { 1.0 };
    let ratio = scale.min(max_ratio.max(f64::MIN_POSITIVE)) / scale;
    let shrink = |v: u32| ((v as f64 * ratio).round() as u32).max(1);
    PhysicalSize::new(shrink(physical.width), shrink(physical.height))
}

/// Resets the controls for a newly loaded model: handles and readout panels
/// hidden until toggled again. Returns the dragging change, if any.
pub fn attach_controls(gizmo: &mut TransformGizmo, hud: &mut Hud) -> Option<bool> {
    let changed = gizmo.attach();
    hud.controls_visible = false;
    hud.mode = gizmo.mode;
    changed
}

pub struct App {
    pub renderer: Renderer,
    pub camera: PerspectiveCamera,
    pub orbit: OrbitControls,
    pub gizmo: TransformGizmo,
    pub scene: Scene,
    pub hud: Hud,
    pub egui_ctx: egui::Context,
    pub egui_state: egui_winit::State,
    reporter: FrameReporter,
    loader: Option<Receiver<LoadEvent>>,
    cursor: Option<Vec2>,
    window_size: PhysicalSize<u32>,
    max_pixel_ratio: f64,
}

impl App {
    pub async fn new(window: Arc<Window>, config: &Config) -> Result<Self> {
        let window_size = window.inner_size();
        let surface_size =
            effective_surface_size(window_size, window.scale_factor(), config.max_pixel_ratio);
        let renderer = Renderer::new(window.clone(), surface_size).await?;

        let mut camera = PerspectiveCamera::new(1.0);
        camera.set_viewport(window_size.width, window_size.height);
        let mut orbit = OrbitControls::new();
        orbit.set_viewport_height(window_size.height);

        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui_ctx.viewport_id(),
            &*window,
            None,
            None,
        );

        Ok(Self {
            renderer,
            camera,
            orbit,
            gizmo: TransformGizmo::attached(),
            scene: Scene::new(),
            hud: Hud::default(),
            egui_ctx,
            egui_state,
            reporter: FrameReporter::new(config.report_every),
            loader: None,
            cursor: None,
            window_size,
            max_pixel_ratio: config.max_pixel_ratio,
        })
    }

    /// Starts loading a scene in the background.
    pub fn load(&mut self, scene: PathBuf, models_dir: PathBuf) -> Result<()> {
        log::info!("Loading {} (models in {})", scene.display(), models_dir.display());
        // The loader thread detaches; it ends once every asset is sent.
        let (rx, _handle) = spawn_loader(scene, models_dir)?;
        self.loader = Some(rx);
        Ok(())
    }

    pub fn resize(&mut self, window: &Window, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.window_size = new_size;
        self.camera.set_viewport(new_size.width, new_size.height);
        self.orbit.set_viewport_height(new_size.height);
        self.renderer.resize(effective_surface_size(
            new_size,
            window.scale_factor(),
            self.max_pixel_ratio,
        ));
    }

    /// Handles one window event; returns true if it was consumed.
    pub fn handle_event(&mut self, window: &Window, event: &WindowEvent) -> bool {
        let response = self.egui_state.on_window_event(window, event);
        if response.consumed {
            return true;
        }

        match event {
            WindowEvent::Resized(size) => self.resize(window, *size),
            WindowEvent::ScaleFactorChanged { .. } => self.resize(window, window.inner_size()),
            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed && !event.repeat =>
            {
                if let Some(command) = Command::from_key(&event.logical_key) {
                    self.apply(command);
                    return true;
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let cursor = Vec2::new(position.x as f32, position.y as f32);
                self.cursor = Some(cursor);
                self.pointer_moved(cursor);
            }
            WindowEvent::MouseInput {
                button: MouseButton::Left,
                state,
                ..
            } => {
                let changed = match state {
                    ElementState::Pressed => self.pointer_pressed(),
                    ElementState::Released => self.gizmo.end_drag(),
                };
                if let Some(dragging) = changed {
                    self.dragging_changed(dragging);
                    if dragging {
                        return true;
                    }
                }
            }
            _ => {}
        }

        self.orbit.handle_event(event, &self.camera);
        false
    }

    pub fn apply(&mut self, command: Command) {
        match command {
            Command::SetMode(mode) => {
                self.gizmo.set_mode(mode);
                self.hud.mode = self.gizmo.mode;
            }
            Command::ToggleControls => {
                self.hud.controls_visible = self.gizmo.toggle_visibility();
            }
        }
    }

    fn dragging_changed(&mut self, dragging: bool) {
        self.orbit.enabled = !dragging;
    }

    fn handle_len(&self) -> Option<f32> {
        let target = self.scene.model_transform()?;
        Some(handle_length(self.camera.eye, target.position, self.camera.fov_y_deg))
    }

    fn viewport(&self) -> Vec2 {
        Vec2::new(self.window_size.width as f32, self.window_size.height as f32)
    }

    fn pointer_moved(&mut self, cursor: Vec2) {
        let Some(len) = self.handle_len() else {
            return;
        };
        let ray = self.camera.ray_from_screen(cursor.x, cursor.y, self.viewport());
        if self.gizmo.is_dragging() {
            if let Some(t) = self.gizmo.drag_to(&ray) {
                self.scene.set_model_transform(t);
            }
        } else if let Some(target) = self.scene.model_transform() {
            let target = *target;
            self.gizmo.hover(&ray, &target, len);
        }
    }

    fn pointer_pressed(&mut self) -> Option<bool> {
        let cursor = self.cursor?;
        let len = self.handle_len()?;
        let target = *self.scene.model_transform()?;
        let ray = self.camera.ray_from_screen(cursor.x, cursor.y, self.viewport());
        self.gizmo.begin_drag(&ray, &target, len)
    }

    /// Applies loader results that arrived since the last frame.
    fn drain_loader(&mut self) {
        let Some(rx) = &self.loader else {
            return;
        };
        let events: Vec<_> = rx.try_iter().collect();
        for event in events {
            let finished = matches!(event, LoadEvent::Finished);
            match self.scene.apply(event) {
                Change::Splat => {
                    if let Some(node) = &self.scene.splat {
                        self.renderer.splats.upload(&self.renderer.gfx.device, &node.cloud);
                    }
                }
                Change::Model => {
                    if let Some(dragging) = attach_controls(&mut self.gizmo, &mut self.hud) {
                        self.dragging_changed(dragging);
                    }
                    if let Some(node) = &self.scene.model {
                        self.renderer
                            .mesh
                            .upload(&self.renderer.gfx.device, node, &self.scene.ambient);
                    }
                }
                Change::Nothing => {}
            }
            if finished {
                self.loader = None;
            }
        }
        self.hud.status = self.scene.status_lines();
        self.hud.errors.clone_from(&self.scene.errors);
    }

    /// Refreshes the readout on reporting frames once the model exists.
    fn report(&mut self) {
        if self.reporter.tick() {
            if let Some(t) = self.scene.model_transform() {
                self.hud.readout = Some(Readout::from_transform(t));
            }
        }
    }

    fn prepare_scene(&mut self) {
        let view = self.camera.view();
        let proj = self.camera.proj();
        let view_proj = proj * view;
        let gfx = &self.renderer.gfx;
        let viewport = [gfx.size.width as f32, gfx.size.height as f32];

        if let Some(node) = &self.scene.splat {
            let uniforms = SplatUniforms::new(
                view * node.transform.matrix(),
                proj,
                viewport,
                self.camera.fov_y_deg.to_radians(),
            );
            self.renderer.splats.prepare(&gfx.queue, &uniforms);
        }

        let mut lines = Vec::new();
        if let Some(node) = &self.scene.model {
            self.renderer
                .mesh
                .prepare(&gfx.queue, view_proj, node.transform.matrix());
            if let Some(len) = self.handle_len() {
                lines = self.gizmo.lines(&node.transform, len);
            }
        }
        self.renderer
            .gizmo
            .prepare(&gfx.device, &gfx.queue, view_proj, &lines);
    }

    pub fn render(&mut self, window: &Window) -> Result<(), wgpu::SurfaceError> {
        self.drain_loader();
        self.orbit.update(&mut self.camera);
        self.report();

        let frame = self.renderer.gfx.surface.get_current_texture()?;
        let swap_view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.prepare_scene();
        self.renderer.render(&swap_view);

        let egui_input = self.egui_state.take_egui_input(window);
        self.egui_ctx.begin_frame(egui_input);
        let commands = ui::draw(&self.egui_ctx, &self.hud);
        let egui_output = self.egui_ctx.end_frame();
        self.egui_state
            .handle_platform_output(window, egui_output.platform_output.clone());

        for command in commands {
            self.apply(command);
        }

        let shapes = self
            .egui_ctx
            .tessellate(egui_output.shapes, self.egui_ctx.pixels_per_point());

        // The surface may be smaller than the window when the pixel ratio is capped.
        let surface_scale =
            self.renderer.gfx.config.width as f32 / self.window_size.width.max(1) as f32;
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [
                self.renderer.gfx.config.width,
                self.renderer.gfx.config.height,
            ],
            pixels_per_point: self.egui_ctx.pixels_per_point() * surface_scale,
        };

        let mut encoder = self
            .renderer
            .gfx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("UI Encoder"),
            });

        for (id, delta) in &egui_output.textures_delta.set {
            self.renderer.egui_renderer.update_texture(
                &self.renderer.gfx.device,
                &self.renderer.gfx.queue,
                *id,
                delta,
            );
        }

        self.renderer.egui_renderer.update_buffers(
            &self.renderer.gfx.device,
            &self.renderer.gfx.queue,
            &mut encoder,
            &shapes,
            &screen_descriptor,
        );

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("EGUI Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &swap_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            self.renderer
                .egui_renderer
                .render(&mut render_pass, &shapes, &screen_descriptor);
        }

        for id in &egui_output.textures_delta.free {
            self.renderer.egui_renderer.free_texture(id);
        }

        self.renderer
            .gfx
            .queue
            .submit(std::iter::once(encoder.finish()));
        frame.present();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_ratio_is_capped() {
        // A 3x display is rendered at 2x.
        let size = effective_surface_size(PhysicalSize::new(3000, 1500), 3.0, 2.0);
        assert_eq!(size, PhysicalSize::new(2000, 1000));
    }

    #[test]
    fn low_ratios_render_at_full_size() {
        let size = effective_surface_size(PhysicalSize::new(1280, 720), 1.0, 2.0);
        assert_eq!(size, PhysicalSize::new(1280, 720));
        let size = effective_surface_size(PhysicalSize::new(2560, 1440), 2.0, 2.0);
        assert_eq!(size, PhysicalSize::new(2560, 1440));
    }

    #[test]
    fn loading_a_model_hides_controls_shown_earlier() {
        let mut gizmo = TransformGizmo::attached();
        let mut hud = Hud::default();
        // "c" pressed while the splat was still loading.
        hud.controls_visible = gizmo.toggle_visibility();
        assert!(hud.controls_visible);

        assert_eq!(attach_controls(&mut gizmo, &mut hud), None);
        assert!(!hud.controls_visible);
        assert_eq!(gizmo.shown(), [false, false, false]);

        // The next toggle shows them again.
        assert!(gizmo.toggle_visibility());
    }

    #[test]
    fn surface_never_collapses() {
        let size = effective_surface_size(PhysicalSize::new(1, 1), 4.0, 1.0);
        assert_eq!(size, PhysicalSize::new(1, 1));
        let size = effective_surface_size(PhysicalSize::new(100, 100), 0.0, 2.0);
        assert_eq!(size, PhysicalSize::new(100, 100));
    }
}
