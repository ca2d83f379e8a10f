mod egui_host;
mod timing;

use crate::assets::{self, LoadEvent, ProgressTracker};
use crate::config::{self, ViewerConfig};
use crate::render::{params, pick, HeadlessEngine, OrbitCamera, RenderEngine, RenderParameters};
use crate::scene::highlight::Highlighter;
use crate::scene::{SceneAsset, SceneRegistry};
use crate::ui::{ControlPanel, LoadingOverlay, PanelOutput};
use egui_host::EguiHost;
use glam::Vec4;
use timing::FrameTiming;

use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

/// Pointer travel below this is a click, not an orbit drag.
const CLICK_SLOP_PX: f32 = 4.0;
const ORBIT_SENSITIVITY: f32 = 0.005;
const WHEEL_ZOOM_STEP: f32 = 0.5;

/// All viewer state, owned by the event-loop thread and passed by reference
/// into each component's operations.
pub struct ViewerState {
    pub scene: Option<SceneAsset>,
    pub registry: SceneRegistry,
    pub highlighter: Highlighter,
    pub params: RenderParameters,
}

struct DragState {
    last: (f32, f32),
    travelled: f32,
}

pub struct App {
    config: ViewerConfig,
    window: Option<Arc<Window>>,
    engine: Box<dyn RenderEngine>,
    state: ViewerState,
    camera: OrbitCamera,
    egui_host: Option<EguiHost>,
    panel: ControlPanel,
    overlay: LoadingOverlay,
    progress: ProgressTracker,
    loader: Option<Receiver<LoadEvent>>,
    mouse_pos: Option<(f32, f32)>,
    drag: Option<DragState>,
    ui_wants_pointer: bool,
    timing: FrameTiming,
    target_frame_duration: Duration,
    next_frame_time: Instant,
    close_requested: bool,
}

impl App {
    fn new(config: ViewerConfig) -> Self {
        let [r, g, b] = config.highlight_color;
        let highlighter = Highlighter::new(
            Duration::from_millis(config.highlight_duration_ms),
            Vec4::new(r, g, b, 1.0),
        );
        let panel = ControlPanel::new(&config.params);
        let timing = FrameTiming::new(config.window_title.clone());
        Self {
            state: ViewerState {
                scene: None,
                registry: SceneRegistry::new(),
                highlighter,
                params: config.params,
            },
            engine: Box::new(HeadlessEngine::new()),
            window: None,
            camera: OrbitCamera::new(),
            egui_host: None,
            panel,
            overlay: LoadingOverlay::new(),
            progress: ProgressTracker::new(),
            loader: None,
            mouse_pos: None,
            drag: None,
            ui_wants_pointer: false,
            timing,
            target_frame_duration: Duration::from_millis(16),
            next_frame_time: Instant::now(),
            close_requested: false,
            config,
        }
    }

    /// Push the configured render parameters into the engine (and scene, once
    /// one exists). Safe to call repeatedly; the setters are idempotent.
    fn sync_params(&mut self) {
        let current = self.state.params;
        let ViewerState {
            scene,
            registry,
            params,
            ..
        } = &mut self.state;
        params::set_tone_mapping(params, scene.as_mut(), self.engine.as_mut(), current.tone_mapping);
        params::set_exposure(params, self.engine.as_mut(), current.exposure);
        params::set_env_intensity(params, scene.as_mut(), current.env_intensity);
        params::set_saturation(params, scene.as_mut(), registry, current.saturation);
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        self.camera
            .set_aspect(new_size.width as f32, new_size.height as f32);
        self.engine.set_surface_size(new_size.width, new_size.height);
    }

    fn update_target_frame_duration(&mut self, window: &Window) {
        let mut target = Duration::from_millis(16);
        if let Some(monitor) = window.current_monitor() {
            if let Some(millihz) = monitor.refresh_rate_millihertz() {
                let hz = millihz as f32 / 1000.0;
                if hz > 1.0 {
                    target = Duration::from_secs_f32(1.0 / hz);
                }
            }
        }
        self.target_frame_duration = target;
        self.next_frame_time = Instant::now() + self.target_frame_duration;
    }

    fn drain_loader(&mut self, now: Instant) {
        let Some(rx) = self.loader.take() else {
            return;
        };
        let mut disconnected = false;
        loop {
            match rx.try_recv() {
                Ok(LoadEvent::Progress { url, loaded, total }) => {
                    if let Some(percent) = self.progress.update(&url, loaded, total) {
                        self.overlay.set_percent(percent);
                        if self.progress.is_finished() {
                            self.overlay.finish(now);
                        }
                    }
                }
                Ok(LoadEvent::Completed(mut asset)) => {
                    let registry = assets::prepare_scene(&mut asset);
                    log::info!("Scene ready: {} pickable meshes", registry.len());
                    self.camera.frame_target(asset.centroid());
                    self.state.scene = Some(asset);
                    self.state.registry = registry;
                    self.sync_params();
                    self.overlay.finish(now);
                }
                Ok(LoadEvent::Failed(err)) => {
                    // Non-fatal: the viewer stays interactive with an empty scene.
                    log::error!("Asset load failed: {err}");
                    self.overlay.dismiss();
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }
        if !disconnected {
            self.loader = Some(rx);
        }
    }

    /// Full pick → highlight transition for one click; atomic with respect to
    /// other clicks since everything runs on the event-loop thread.
    fn handle_click(&mut self, x: f32, y: f32, now: Instant) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        let size = window.inner_size();
        let ViewerState {
            scene,
            registry,
            highlighter,
            ..
        } = &mut self.state;
        let Some(scene) = scene.as_mut() else {
            return;
        };
        let Some(hit) = pick::pick(
            x,
            y,
            size.width as f32,
            size.height as f32,
            &self.camera,
            scene,
            registry,
        ) else {
            return;
        };
        let name = registry
            .find(hit.node)
            .map(|entry| entry.name.clone())
            .unwrap_or_else(|| "unnamed".to_string());
        log::info!("Clicked [{name}] at distance {:.3}", hit.distance);
        highlighter.on_pick(hit.node, scene, registry, now);
    }

    fn apply_panel_output(&mut self, out: PanelOutput) {
        if !out.any() {
            return;
        }
        let ViewerState {
            scene,
            registry,
            params,
            ..
        } = &mut self.state;
        if let Some(mode) = out.tone_mapping {
            params::set_tone_mapping(params, scene.as_mut(), self.engine.as_mut(), mode);
        }
        if let Some(value) = out.exposure {
            params::set_exposure(params, self.engine.as_mut(), value);
        }
        if let Some(value) = out.env_intensity {
            params::set_env_intensity(params, scene.as_mut(), value);
        }
        if let Some(value) = out.saturation {
            params::set_saturation(params, scene.as_mut(), registry, value);
        }
    }

    fn frame(&mut self) {
        let now = Instant::now();
        self.timing.update(self.window.as_deref(), now);
        self.drain_loader(now);
        self.camera.update(self.timing.frame_dt);

        {
            let ViewerState {
                scene,
                registry,
                highlighter,
                ..
            } = &mut self.state;
            if let Some(scene) = scene.as_mut() {
                highlighter.tick(scene, registry, now);
            }
        }
        self.overlay.tick(now);

        if let (Some(window), Some(host)) = (self.window.clone(), self.egui_host.as_mut()) {
            let panel = &mut self.panel;
            let overlay = &self.overlay;
            let mut panel_out = PanelOutput::default();
            let frame = host.run_ui(&window, |ctx| {
                panel_out = panel.show(ctx);
                overlay.show(ctx);
            });
            self.ui_wants_pointer = frame.wants_pointer_input;
            self.engine.paint_ui(
                frame.pixels_per_point,
                frame.textures_delta,
                frame.clipped_primitives,
            );
            self.apply_panel_output(panel_out);
        }

        self.engine.render(self.state.scene.as_mut(), &self.camera);
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attrs = WindowAttributes::default()
            .with_title(self.config.window_title.clone())
            .with_inner_size(PhysicalSize::new(
                self.config.window_width,
                self.config.window_height,
            ))
            .with_resizable(true);

        let window = Arc::new(
            event_loop
                .create_window(window_attrs)
                .expect("Failed to create window"),
        );

        self.handle_resize(window.inner_size());
        self.egui_host = Some(EguiHost::new(&window));
        self.sync_params();
        self.loader = Some(assets::spawn_load(PathBuf::from(&self.config.asset_path)));
        self.update_target_frame_duration(&window);
        self.window = Some(window);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let ui_consumed = match (self.window.clone(), self.egui_host.as_mut()) {
            (Some(window), Some(host)) => host.on_window_event(&window, &event),
            _ => false,
        };

        match event {
            WindowEvent::CloseRequested => {
                self.close_requested = true;
                event_loop.exit();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                    && event.state == ElementState::Pressed
                {
                    self.close_requested = true;
                    event_loop.exit();
                }
            }
            WindowEvent::Resized(new_size) => {
                self.handle_resize(new_size);
                if let Some(window) = self.window.clone() {
                    self.update_target_frame_duration(&window);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let pos = (position.x as f32, position.y as f32);
                if let Some(drag) = self.drag.as_mut() {
                    let dx = pos.0 - drag.last.0;
                    let dy = pos.1 - drag.last.1;
                    drag.travelled += (dx * dx + dy * dy).sqrt();
                    drag.last = pos;
                    self.camera
                        .rotate(dx * ORBIT_SENSITIVITY, dy * ORBIT_SENSITIVITY);
                }
                self.mouse_pos = Some(pos);
            }
            WindowEvent::CursorLeft { .. } => {
                self.mouse_pos = None;
                self.drag = None;
            }
            WindowEvent::MouseInput { state, button, .. } => {
                if button != MouseButton::Left {
                    return;
                }
                match state {
                    ElementState::Pressed => {
                        if ui_consumed || self.ui_wants_pointer {
                            return;
                        }
                        if let Some(pos) = self.mouse_pos {
                            self.drag = Some(DragState {
                                last: pos,
                                travelled: 0.0,
                            });
                        }
                    }
                    ElementState::Released => {
                        let was_click = self
                            .drag
                            .take()
                            .map_or(false, |drag| drag.travelled <= CLICK_SLOP_PX);
                        if was_click && !ui_consumed && !self.ui_wants_pointer {
                            if let Some((x, y)) = self.mouse_pos {
                                self.handle_click(x, y, Instant::now());
                            }
                        }
                    }
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                if ui_consumed || self.ui_wants_pointer {
                    return;
                }
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 60.0,
                };
                self.camera.zoom(steps * WHEEL_ZOOM_STEP);
            }
            WindowEvent::RedrawRequested => {
                self.frame();
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        if now >= self.next_frame_time {
            if let Some(window) = &self.window {
                window.request_redraw();
            }
            self.next_frame_time = now + self.target_frame_duration;
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.next_frame_time));
    }
}

pub fn run() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut config = config::load_config_or_default(Path::new(config::CONFIG_FILE));
    if let Some(path) = std::env::args().nth(1) {
        config.asset_path = path;
    }

    log::info!("🚀 glbview - interactive glTF viewer");
    log::info!("   Asset: {}", config.asset_path);
    log::info!("   Press ESC or close window to exit");

    let event_loop = EventLoop::new().expect("Failed to create event loop");
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(config);
    event_loop.run_app(&mut app).expect("Event loop error");

    log::info!("👋 Goodbye!");
}
