use crate::pipelines::basic::{ModelPipelineOptions, mk_model_pipeline};

/**
 * Pipeline for blended materials.
 *
 * The shader outputs premultiplied colour, so blending adds the fragment on
 * top of what is already drawn. Depth is tested but not written: blended
 * meshes are drawn back to front after every opaque mesh.
 */
pub fn mk_transparent_pipeline(
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
            label: "Blended Model Pipeline",
            blend: wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING,
            depth_write_enabled: false,
            cull_mode,
        },
    )
}
