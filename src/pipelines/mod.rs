//! Render pipelines for model meshes.
//!
//! Every mesh is drawn with the same shader. What differs is blending and
//! face culling, which are baked into the pipeline, so there is one pipeline
//! per combination.

pub mod basic;
pub mod light;
pub mod material;
pub mod transparent;

#[derive(Debug)]
pub struct Pipelines {
    pub opaque: wgpu::RenderPipeline,
    pub opaque_double_sided: wgpu::RenderPipeline,
    pub blended: wgpu::RenderPipeline,
    pub blended_double_sided: wgpu::RenderPipeline,
}

impl Pipelines {
    /// Bind groups: 0 material, 1 camera, 2 light.
    pub fn new(
        device: &wgpu::Device,
        config: &wgpu::SurfaceConfiguration,
        material_layout: &wgpu::BindGroupLayout,
        camera_layout: &wgpu::BindGroupLayout,
        light_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Model Pipeline Layout"),
            bind_group_layouts: &[material_layout, camera_layout, light_layout],
            push_constant_ranges: &[],
        });
        let back = Some(wgpu::Face::Back);
        Self {
            opaque: basic::mk_basic_pipeline(device, config, &layout, back),
            opaque_double_sided: basic::mk_basic_pipeline(device, config, &layout, None),
            blended: transparent::mk_transparent_pipeline(device, config, &layout, back),
            blended_double_sided: transparent::mk_transparent_pipeline(device, config, &layout, None),
        }
    }

    pub fn select(&self, blended: bool, double_sided: bool) -> &wgpu::RenderPipeline {
        match (blended, double_sided) {
            (false, false) => &self.opaque,
            (false, true) => &self.opaque_double_sided,
            (true, false) => &self.blended,
            (true, true) => &self.blended_double_sided,
        }
    }
}
