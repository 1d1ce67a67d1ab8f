//! Windowed host: a winit event loop that feeds keyboard and drop input into
//! the session and draws the committed scene as an XY line projection.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use bytemuck::{Pod, Zeroable};
use pollster::FutureExt;
use wgpu::{SurfaceError, util::DeviceExt};
use winit::{
    dpi::PhysicalSize,
    event::{ElementState, Event, KeyEvent, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Window, WindowBuilder},
};

use crate::scene::Scene;
use crate::session::Session;
use crate::ui::{ControlId, FieldId, IoState};
use crate::window::EventWindow;

const MARGIN: f32 = 0.05;
const MARKER_PIXELS: f32 = 3.0;
const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.05,
    g: 0.055,
    b: 0.08,
    a: 1.0,
};
const LOADING_COLOR: wgpu::Color = wgpu::Color {
    r: 0.02,
    g: 0.02,
    b: 0.03,
    a: 1.0,
};

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    position: [f32; 2],
    color: [f32; 3],
}

/// Projects every line of the scene (markers become small crosses) onto the
/// XY plane in normalized device coordinates, fitted to the scene bounds.
pub fn scene_vertices(scene: &Scene, width: u32, height: u32) -> Vec<Vertex> {
    let Some(bounds) = scene.bounds() else {
        return Vec::new();
    };
    let center = bounds.center().truncate();
    let extent = bounds.extent().truncate().max(glam::Vec2::splat(f32::EPSILON));
    let aspect = width.max(1) as f32 / height.max(1) as f32;
    // Uniform scale in pixels per scene unit, converted to NDC per axis.
    let usable = 2.0 * (1.0 - MARGIN);
    let scale = (usable * aspect / extent.x).min(usable / extent.y);
    let to_ndc = |point: glam::Vec3| -> [f32; 2] {
        let offset = point.truncate() - center;
        [offset.x * scale / aspect, offset.y * scale]
    };
    let marker_ndc = MARKER_PIXELS * 2.0 / height.max(1) as f32;

    let mut vertices = Vec::with_capacity(scene.line_count() * 2 + scene.marker_count() * 4);
    for model in scene.models() {
        for line in &model.lines {
            vertices.push(Vertex {
                position: to_ndc(line.start),
                color: line.color,
            });
            vertices.push(Vertex {
                position: to_ndc(line.end),
                color: line.color,
            });
        }
        for marker in &model.markers {
            let [x, y] = to_ndc(marker.position);
            let half = marker_ndc * marker.size.max(1.0);
            let half_x = half / aspect;
            for (from, to) in [
                ([x - half_x, y], [x + half_x, y]),
                ([x, y - half], [x, y + half]),
            ] {
                vertices.push(Vertex {
                    position: from,
                    color: marker.color,
                });
                vertices.push(Vertex {
                    position: to,
                    color: marker.color,
                });
            }
        }
    }
    vertices
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Next,
    Reload,
    Print,
    OpenChooser,
    Jump,
    EventStep(i32),
    RunStep(i32),
    ChooserEntry(usize),
    Escape,
}

pub fn key_action(key: &Key) -> Option<KeyAction> {
    match key {
        Key::Named(NamedKey::ArrowRight) => Some(KeyAction::Next),
        Key::Named(NamedKey::ArrowUp) => Some(KeyAction::EventStep(1)),
        Key::Named(NamedKey::ArrowDown) => Some(KeyAction::EventStep(-1)),
        Key::Named(NamedKey::PageUp) => Some(KeyAction::RunStep(1)),
        Key::Named(NamedKey::PageDown) => Some(KeyAction::RunStep(-1)),
        Key::Named(NamedKey::Escape) => Some(KeyAction::Escape),
        Key::Character(text) => match text.as_str() {
            "n" | "N" => Some(KeyAction::Next),
            "r" | "R" => Some(KeyAction::Reload),
            "p" | "P" => Some(KeyAction::Print),
            "o" | "O" => Some(KeyAction::OpenChooser),
            "g" | "G" => Some(KeyAction::Jump),
            digit => digit
                .parse::<usize>()
                .ok()
                .filter(|value| (1..=9).contains(value))
                .map(|value| KeyAction::ChooserEntry(value - 1)),
        },
        _ => None,
    }
}

/// Input collected between two redraws, plus the jump target edited with the
/// arrow keys.
#[derive(Debug, Default)]
pub struct HostInput {
    pending: IoState,
    jump_target: (i32, i32),
    synced_commits: u64,
}

impl HostInput {
    /// Resets the jump target whenever a new event has been committed.
    pub fn sync(&mut self, window: &EventWindow) {
        if window.committed_events() == self.synced_commits {
            return;
        }
        self.synced_commits = window.committed_events();
        if let Some(metadata) = window.current_event() {
            self.jump_target = metadata.key();
        }
    }

    pub fn apply(&mut self, action: KeyAction) {
        match action {
            KeyAction::Next => self.click(ControlId::Next),
            KeyAction::Reload => self.click(ControlId::Reload),
            KeyAction::Print => self.click(ControlId::Print),
            KeyAction::OpenChooser => self.click(ControlId::ChooseFile),
            KeyAction::ChooserEntry(index) => self.click(ControlId::ChooserEntry(index)),
            KeyAction::Escape => self.click(ControlId::ChooserCancel),
            KeyAction::Jump => {
                self.pending.field_edits.push((FieldId::Run, self.jump_target.0));
                self.pending
                    .field_edits
                    .push((FieldId::Event, self.jump_target.1));
                self.click(ControlId::Jump);
            }
            KeyAction::EventStep(delta) => {
                self.jump_target.1 = self.jump_target.1.saturating_add(delta);
                self.pending
                    .field_edits
                    .push((FieldId::Event, self.jump_target.1));
            }
            KeyAction::RunStep(delta) => {
                self.jump_target.0 = self.jump_target.0.saturating_add(delta);
                self.pending.field_edits.push((FieldId::Run, self.jump_target.0));
            }
        }
    }

    pub fn drop_file(&mut self, path: std::path::PathBuf) {
        self.pending.dropped_file = Some(path);
    }

    pub fn take(&mut self) -> IoState {
        std::mem::take(&mut self.pending)
    }

    fn click(&mut self, control: ControlId) {
        self.pending.clicks.insert(control);
    }
}

struct SceneView {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,
    pipeline: wgpu::RenderPipeline,
    vertex_buffer: Option<wgpu::Buffer>,
    vertex_count: u32,
    uploaded_generation: Option<u64>,
}

impl SceneView {
    async fn new(window: Arc<Window>) -> Result<Self> {
        let instance = wgpu::Instance::default();
        let surface = instance.create_surface(window.clone())?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: Some(&surface),
            })
            .await
            .ok_or_else(|| anyhow!("no suitable GPU adapter found"))?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("evd-viewer-device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|format| format.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow!("surface reports no supported formats"))?;

        let size = window.inner_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
            alpha_mode: wgpu::CompositeAlphaMode::Opaque,
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("evd-viewer-shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("evd-viewer-pipeline-layout"),
            bind_group_layouts: &[],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("evd-viewer-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<Vertex>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x3],
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::LineList,
                ..wgpu::PrimitiveState::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            size,
            pipeline,
            vertex_buffer: None,
            vertex_count: 0,
            uploaded_generation: None,
        })
    }

    fn window(&self) -> &Window {
        &self.window
    }

    fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
            // Projection depends on the aspect ratio.
            self.uploaded_generation = None;
        }
    }

    fn sync_scene(&mut self, scene: &Scene) {
        if self.uploaded_generation == Some(scene.generation()) {
            return;
        }
        let vertices = scene_vertices(scene, self.size.width, self.size.height);
        self.vertex_count = vertices.len() as u32;
        self.vertex_buffer = (!vertices.is_empty()).then(|| {
            self.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("evd-viewer-scene-vertices"),
                    contents: bytemuck::cast_slice(&vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                })
        });
        self.uploaded_generation = Some(scene.generation());
        log::debug!("uploaded {} scene vertices", self.vertex_count);
    }

    fn render(&mut self, loading: bool) -> Result<(), SurfaceError> {
        let frame = self.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("evd-viewer-encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("evd-viewer-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(if loading { LOADING_COLOR } else { CLEAR_COLOR }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            if let Some(buffer) = &self.vertex_buffer {
                render_pass.set_pipeline(&self.pipeline);
                render_pass.set_vertex_buffer(0, buffer.slice(..));
                render_pass.draw(0..self.vertex_count, 0..1);
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}

pub fn run_windowed(mut session: Session) -> Result<()> {
    let event_loop = EventLoop::new().context("creating winit event loop")?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(format!("Event Display - {}", session.window().source_description()))
            .with_inner_size(PhysicalSize::new(1280, 720))
            .build(&event_loop)
            .context("creating viewer window")?,
    );
    let mut view = SceneView::new(window).block_on()?;
    let mut input = HostInput::default();
    let mut title = String::new();

    event_loop
        .run(move |event, target| {
            target.set_control_flow(ControlFlow::Poll);

            match event {
                Event::WindowEvent { window_id, event } if window_id == view.window().id() => {
                    match event {
                        WindowEvent::CloseRequested => target.exit(),
                        WindowEvent::KeyboardInput {
                            event:
                                KeyEvent {
                                    logical_key,
                                    state: ElementState::Pressed,
                                    ..
                                },
                            ..
                        } => match key_action(&logical_key) {
                            Some(KeyAction::Escape)
                                if !session
                                    .last_frame()
                                    .has_enabled_button(ControlId::ChooserCancel) =>
                            {
                                target.exit()
                            }
                            Some(action) => input.apply(action),
                            None => {}
                        },
                        WindowEvent::DroppedFile(path) => input.drop_file(path),
                        WindowEvent::Resized(new_size) => view.resize(new_size),
                        WindowEvent::RedrawRequested => {
                            let size = view.size();
                            let io = input.take();
                            session.render(size.width, size.height, &io);
                            input.sync(session.window());

                            let frame = session.last_frame();
                            let summary = frame.summary();
                            if summary != title {
                                view.window().set_title(&format!("Event Display - {summary}"));
                                title = summary;
                            }
                            let loading = frame.is_loading();
                            view.sync_scene(session.window().scene());
                            match view.render(loading) {
                                Ok(()) => {}
                                Err(SurfaceError::Lost) => view.resize(view.size()),
                                Err(SurfaceError::OutOfMemory) => target.exit(),
                                Err(err) => log::warn!("render error: {err:?}"),
                            }
                        }
                        _ => {}
                    }
                }
                Event::AboutToWait => view.window().request_redraw(),
                _ => {}
            }
        })
        .context("running viewer application")?;
    Ok(())
}

const SHADER: &str = r#"
struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) color: vec3<f32>,
};

@vertex
fn vs_main(@location(0) position: vec2<f32>, @location(1) color: vec3<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.position = vec4<f32>(position, 0.0, 1.0);
    out.color = color;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(in.color, 1.0);
}
"#;
