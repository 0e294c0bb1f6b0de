//! Preview window using winit + wgpu.
//!
//! Renders the controller's current frame and maps keys to [`Command`]s.

use crate::controller::{Command, UiEvent, WebcamController};
use crate::prompt::Level;
use camkit_codec::{convert, Frame};
use std::sync::Arc;
use std::time::Instant;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::ActiveEventLoop,
    keyboard::{Key, NamedKey},
    window::{Window, WindowId},
};

const KEY_HELP: &str =
    "0-9 select device, S start, X stop camera, C capture, R record, T stop recording, Esc/Q exit";

pub struct App {
    controller: WebcamController,
    preview: Option<Preview>,
}

impl App {
    pub const fn new(controller: WebcamController) -> Self {
        Self {
            controller,
            preview: None,
        }
    }

    fn command_for(key: &Key) -> Option<Command> {
        match key {
            Key::Named(NamedKey::Escape) => Some(Command::Exit),
            Key::Character(c) => {
                let c = c.to_ascii_lowercase();
                if let Ok(index) = c.parse::<usize>() {
                    return Some(Command::SelectDevice(index));
                }
                match c.as_str() {
                    "s" => Some(Command::StartCamera),
                    "x" => Some(Command::StopCamera),
                    "c" => Some(Command::CaptureImage),
                    "r" => Some(Command::StartRecording),
                    "t" => Some(Command::StopRecording),
                    "q" => Some(Command::Exit),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn title(&self, fps: Option<f32>) -> String {
        let device = self
            .controller
            .selected_device()
            .map_or("no device", |d| d.name.as_str());
        let state = if self.controller.is_recording() {
            "recording"
        } else if self.controller.is_running() {
            "live"
        } else {
            "stopped"
        };
        match fps {
            Some(fps) if self.controller.is_running() => {
                format!("camkit - {device} - {state} - {fps:.1} FPS")
            }
            _ => format!("camkit - {device} - {state}"),
        }
    }

    fn exit(&mut self, event_loop: &ActiveEventLoop) {
        self.controller.handle(Command::Exit);
        event_loop.exit();
    }
}

impl ApplicationHandler<UiEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.preview.is_some() {
            return;
        }

        let attributes = Window::default_attributes()
            .with_title(self.title(None))
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Failed to create window: {e}");
                self.exit(event_loop);
                return;
            }
        };

        match pollster::block_on(Preview::new(window)) {
            Ok(preview) => {
                log::info!("Keys: {KEY_HELP}");
                self.preview = Some(preview);
            }
            Err(e) => {
                log::error!("Failed to initialize preview: {e}");
                self.exit(event_loop);
            }
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: UiEvent) {
        match event {
            UiEvent::FrameReady => {
                if let Some(preview) = &self.preview {
                    preview.window.request_redraw();
                }
            }
            UiEvent::Error(message) => {
                log::error!("{message}");
                self.controller.notify(Level::Error, &message);
                if let Some(preview) = &self.preview {
                    preview.window.set_title(&self.title(None));
                }
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.exit(event_loop),
            WindowEvent::Resized(size) => {
                if let Some(preview) = &mut self.preview {
                    preview.resize(size.width, size.height);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if !event.state.is_pressed() || event.repeat {
                    return;
                }
                let Some(command) = Self::command_for(&event.logical_key) else {
                    return;
                };
                if !self.controller.handle(command) {
                    event_loop.exit();
                    return;
                }
                let title = self.title(None);
                let running = self.controller.is_running();
                if let Some(preview) = &mut self.preview {
                    if !running {
                        preview.clear();
                    }
                    preview.window.set_title(&title);
                    preview.window.request_redraw();
                }
            }
            WindowEvent::RedrawRequested => {
                let frame = self.controller.current_frame();
                let title = {
                    let Some(preview) = &mut self.preview else {
                        return;
                    };
                    if let Some(frame) = frame {
                        preview.upload(&frame);
                    }
                    preview.render();
                    preview.tick()
                };
                if let (Some(fps), Some(preview)) = (title, &self.preview) {
                    preview.window.set_title(&self.title(Some(fps)));
                }
            }
            _ => {}
        }
    }
}

struct Preview {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    texture: wgpu::Texture,
    texture_width: u32,
    texture_height: u32,
    bind_group: wgpu::BindGroup,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    pipeline: wgpu::RenderPipeline,
    last_frame: Option<Frame>,
    last_fps_update: Instant,
    frame_count: u32,
}

impl Preview {
    async fn new(window: Arc<Window>) -> Result<Self, String> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());

        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| format!("Surface: {e}"))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                compatible_surface: Some(&surface),
                ..Default::default()
            })
            .await
            .map_err(|e| format!("Adapter: {e}"))?;

        let (device, queue): (wgpu::Device, wgpu::Queue) = adapter
            .request_device(&wgpu::DeviceDescriptor::default())
            .await
            .map_err(|e| format!("Device: {e}"))?;

        let caps = surface.get_capabilities(&adapter);
        let format = *caps.formats.first().ok_or("Surface has no formats")?;
        let alpha_mode = *caps.alpha_modes.first().ok_or("Surface has no alpha modes")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor::default());

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("texture_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let (texture, bind_group) =
            create_texture(&device, &bind_group_layout, &sampler, 1, 1);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("preview_shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("render_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let mut preview = Self {
            window,
            surface,
            device,
            queue,
            config,
            texture,
            texture_width: 1,
            texture_height: 1,
            bind_group,
            bind_group_layout,
            sampler,
            pipeline,
            last_frame: None,
            last_fps_update: Instant::now(),
            frame_count: 0,
        };
        preview.clear();
        Ok(preview)
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.window.request_redraw();
    }

    /// Show black until the next frame.
    fn clear(&mut self) {
        self.last_frame = None;
        self.write_pixels(&[0, 0, 0, 255], 1, 1);
    }

    /// Upload `frame` unless it is already on the texture.
    fn upload(&mut self, frame: &Frame) {
        if self
            .last_frame
            .as_ref()
            .is_some_and(|last| Arc::ptr_eq(&last.data, &frame.data))
        {
            return;
        }

        match convert::to_rgba(frame) {
            Ok(rgba) => {
                let (width, height) = frame.dimensions();
                self.write_pixels(&rgba, width, height);
                self.last_frame = Some(frame.clone());
                self.frame_count += 1;
            }
            Err(e) => log::warn!("Skipping preview frame: {e}"),
        }
    }

    fn write_pixels(&mut self, rgba: &[u8], width: u32, height: u32) {
        if width != self.texture_width || height != self.texture_height {
            log::debug!("Preview size changed to {width}x{height}");
            let (texture, bind_group) = create_texture(
                &self.device,
                &self.bind_group_layout,
                &self.sampler,
                width,
                height,
            );
            self.texture = texture;
            self.bind_group = bind_group;
            self.texture_width = width;
            self.texture_height = height;
        }

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Frames shown per second, once a second.
    fn tick(&mut self) -> Option<f32> {
        let elapsed = self.last_fps_update.elapsed();
        if elapsed.as_secs_f32() < 1.0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let fps = self.frame_count as f32 / elapsed.as_secs_f32();
        self.frame_count = 0;
        self.last_fps_update = Instant::now();
        Some(fps)
    }

    fn render(&mut self) {
        let Ok(output) = self.surface.get_current_texture() else {
            return;
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor::default());

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("render_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            pass.draw(0..6, 0..1);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
    }
}

fn create_texture(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    width: u32,
    height: u32,
) -> (wgpu::Texture, wgpu::BindGroup) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("preview_texture"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("texture_bind_group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    });
    (texture, bind_group)
}

const SHADER: &str = r"
struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(@builtin(vertex_index) idx: u32) -> VertexOutput {
    var positions = array<vec2<f32>, 6>(
        vec2(-1.0, -1.0),
        vec2( 1.0, -1.0),
        vec2(-1.0,  1.0),
        vec2(-1.0,  1.0),
        vec2( 1.0, -1.0),
        vec2( 1.0,  1.0),
    );

    var uvs = array<vec2<f32>, 6>(
        vec2(0.0, 1.0),
        vec2(1.0, 1.0),
        vec2(0.0, 0.0),
        vec2(0.0, 0.0),
        vec2(1.0, 1.0),
        vec2(1.0, 0.0),
    );

    var out: VertexOutput;
    out.position = vec4(positions[idx], 0.0, 1.0);
    out.uv = uvs[idx];
    return out;
}

@group(0) @binding(0) var t_texture: texture_2d<f32>;
@group(0) @binding(1) var s_sampler: sampler;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(t_texture, s_sampler, in.uv);
}
";

#[cfg(test)]
mod tests {
    use super::*;
    use winit::keyboard::SmolStr;

    fn key(c: &str) -> Key {
        Key::Character(SmolStr::new(c))
    }

    #[test]
    fn key_bindings() {
        assert_eq!(App::command_for(&key("3")), Some(Command::SelectDevice(3)));
        assert_eq!(App::command_for(&key("S")), Some(Command::StartCamera));
        assert_eq!(App::command_for(&key("x")), Some(Command::StopCamera));
        assert_eq!(App::command_for(&key("c")), Some(Command::CaptureImage));
        assert_eq!(App::command_for(&key("R")), Some(Command::StartRecording));
        assert_eq!(App::command_for(&key("t")), Some(Command::StopRecording));
        assert_eq!(App::command_for(&key("q")), Some(Command::Exit));
        assert_eq!(
            App::command_for(&Key::Named(NamedKey::Escape)),
            Some(Command::Exit)
        );
        assert_eq!(App::command_for(&key("z")), None);
    }
}
