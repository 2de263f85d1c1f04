//! The GPU side of the viewport: surface, device, camera and light bindings,
//! pipelines, and the scene's meshes once they are uploaded.

use std::{iter, sync::Arc};

use anyhow::Context as _;
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::{
    camera::{Camera, CameraResources, OrbitController, Projection},
    config::ViewerConfig,
    data_structures::{instance::InstanceRaw, scene_graph::SceneGraph, texture::DepthBuffer},
    pipelines::{Pipelines, light::LightResources, material::material_layout},
    render::{Batch, DrawList, GpuScene},
};

/// Transparent black, so the page behind the canvas shows through.
const CLEAR_COLOUR: wgpu::Color = wgpu::Color::TRANSPARENT;

#[derive(Debug)]
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub(crate) depth_buffer: DepthBuffer,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub camera: CameraResources,
    pub projection: Projection,
    pub light: LightResources,
    pipelines: Pipelines,
    material_layout: wgpu::BindGroupLayout,
    gpu_scene: GpuScene,
    instance_buffer: Option<wgpu::Buffer>,
    is_surface_configured: bool,
}

impl Context {
    pub async fn new(window: Arc<Window>, viewer: &ViewerConfig) -> anyhow::Result<Self> {
        let size = window.inner_size();

        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("creating the draw surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no graphics adapter can draw to this surface")?;
        log::info!("Using adapter {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                // WebGL doesn't support all of wgpu's features, so if
                // we're building for the web we'll have to disable some.
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                ..Default::default()
            })
            .await
            .context("requesting a graphics device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        // The shader writes linear colour, so an sRGB surface does the encoding.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("the surface supports no texture formats")?;
        // The shader outputs premultiplied colour; prefer a surface that composites it that way.
        let alpha_mode = [
            wgpu::CompositeAlphaMode::PreMultiplied,
            wgpu::CompositeAlphaMode::Auto,
        ]
        .into_iter()
        .find(|mode| surface_caps.alpha_modes.contains(mode))
        .or_else(|| surface_caps.alpha_modes.first().copied())
        .unwrap_or(wgpu::CompositeAlphaMode::Auto);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        let camera = Camera::from_config(&viewer.camera);
        let mut projection = Projection::from_config(config.width, config.height, &viewer.camera);
        let controller = OrbitController::new(
            viewer.controls.clone(),
            (config.width, config.height),
            projection.fovy(),
        );

        let camera = CameraResources::new(&device, camera, controller, &mut projection);

        let depth_buffer = DepthBuffer::new(&device, &config);

        let light = LightResources::new(&device, &viewer.lighting);
        let material_layout = material_layout(&device);
        let pipelines = Pipelines::new(
            &device,
            &config,
            &material_layout,
            &camera.bind_group_layout,
            &light.bind_group_layout,
        );
        let gpu_scene = GpuScene::new(&device, &queue, &material_layout);

        Ok(Self {
            window,
            depth_buffer,
            surface,
            device,
            queue,
            config,
            camera,
            projection,
            light,
            pipelines,
            material_layout,
            gpu_scene,
            instance_buffer: None,
            is_surface_configured: false,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Resizes the draw surface and updates the projection. Zero sizes are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.is_surface_configured = true;
            self.projection.resize(width, height);
            self.camera.controller.resize(width, height);
            self.surface.configure(&self.device, &self.config);
            self.depth_buffer = DepthBuffer::new(&self.device, &self.config);
        }
    }

    /// Re-applies the current window size, e.g. after the surface was lost.
    pub fn reconfigure(&mut self) {
        let size = self.window.inner_size();
        self.resize(size.width, size.height);
    }

    /// Applies pending orbit input and uploads the resulting view.
    pub fn update_camera(&mut self) {
        self.camera.controller.update(&mut self.camera.camera);
        self.camera
            .uniform
            .update_view_proj(&self.camera.camera, &mut self.projection);
        self.queue.write_buffer(
            &self.camera.buffer,
            0,
            bytemuck::cast_slice(&[self.camera.uniform]),
        );
    }

    /// Draws one frame of `scene` as seen from the current camera.
    pub fn draw(&mut self, scene: &SceneGraph) -> Result<(), wgpu::SurfaceError> {
        // Rendering requires the surface to be configured
        if !self.is_surface_configured {
            return Ok(());
        }

        self.gpu_scene
            .sync(&self.device, &self.queue, &self.material_layout, scene);
        let draw_list = DrawList::build(scene, self.camera.camera.position);
        self.upload_instances(&draw_list.instances);

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOUR),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_buffer.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            if let Some(instances) = self.instance_buffer.as_ref().filter(|_| !draw_list.is_empty()) {
                render_pass.set_vertex_buffer(1, instances.slice(..));
                render_pass.set_bind_group(1, &self.camera.bind_group, &[]);
                render_pass.set_bind_group(2, &self.light.bind_group, &[]);
                for batch in &draw_list.opaque {
                    self.draw_batch(&mut render_pass, batch, false);
                }
                for batch in &draw_list.blended {
                    self.draw_batch(&mut render_pass, batch, true);
                }
            }
        }

        self.queue.submit(iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn draw_batch(&self, render_pass: &mut wgpu::RenderPass<'_>, batch: &Batch, blended: bool) {
        let Some(mesh) = self.gpu_scene.mesh(batch.mesh) else {
            log::warn!("Mesh {} was never uploaded, skipping it", batch.mesh.index());
            return;
        };
        let material = self.gpu_scene.material(batch.material);
        render_pass.set_pipeline(self.pipelines.select(blended, batch.double_sided));
        render_pass.set_bind_group(0, &material.bind_group, &[]);
        render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
        render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        render_pass.draw_indexed(0..mesh.num_elements, 0, batch.instances.clone());
    }

    /// Writes this frame's instances, growing the buffer when they no longer fit.
    fn upload_instances(&mut self, instances: &[InstanceRaw]) {
        if instances.is_empty() {
            return;
        }
        let bytes: &[u8] = bytemuck::cast_slice(instances);
        match &self.instance_buffer {
            Some(buffer) if buffer.size() >= bytes.len() as wgpu::BufferAddress => {
                self.queue.write_buffer(buffer, 0, bytes);
            }
            _ => {
                self.instance_buffer = Some(self.device.create_buffer_init(
                    &wgpu::util::BufferInitDescriptor {
                        label: Some("Instance Buffer"),
                        contents: bytes,
                        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                    },
                ));
            }
        }
    }
}
