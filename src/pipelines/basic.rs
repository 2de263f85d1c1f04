use crate::data_structures::{
    instance::InstanceRaw,
    model::{ModelVertex, Vertex},
    texture::DepthBuffer,
};

/// What distinguishes the model pipelines from each other.
#[derive(Clone, Copy, Debug)]
pub struct ModelPipelineOptions {
    pub label: &'static str,
    pub blend: wgpu::BlendState,
    pub depth_write_enabled: bool,
    pub cull_mode: Option<wgpu::Face>,
}

/// Pipeline for opaque and alpha-masked materials. Writes depth.
pub fn mk_basic_pipeline(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    layout: &wgpu::PipelineLayout,
    cull_mode: Option<wgpu::Face>,
) -> wgpu::RenderPipeline {
    mk_model_pipeline(
        device,
        config,
        layout,
        ModelPipelineOptions {
            label: "Model Pipeline",
            blend: wgpu::BlendState::REPLACE,
            depth_write_enabled: true,
            cull_mode,
        },
    )
}

/// Builds a triangle-list pipeline over `model_shader.wgsl` with per-vertex
/// and per-instance buffers, depth tested against [`DepthBuffer::FORMAT`].
pub fn mk_model_pipeline(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    layout: &wgpu::PipelineLayout,
    options: ModelPipelineOptions,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Model Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("model_shader.wgsl").into()),
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(options.label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[ModelVertex::desc(), InstanceRaw::desc()],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: config.format,
                blend: Some(options.blend),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: options.cull_mode,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DepthBuffer::FORMAT,
            depth_write_enabled: options.depth_write_enabled,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
