use wgpu::util::DeviceExt;

use crate::data_structures::{model::Material, texture::Texture};

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    base_color: [f32; 4],
    // x: alpha cutoff, y: 1.0 for opaque materials
    params: [f32; 4],
}

impl From<&Material> for MaterialUniform {
    fn from(material: &Material) -> Self {
        let opaque = if material.is_blended() { 0.0 } else { 1.0 };
        Self {
            base_color: material.base_color_factor,
            params: [material.alpha_cutoff(), opaque, 0.0, 0.0],
        }
    }
}

pub fn material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
        label: Some("material_bind_group_layout"),
    })
}

/// GPU side of a [`Material`]: its colour map and parameters, bound as group 0.
#[derive(Debug)]
pub struct GpuMaterial {
    pub name: String,
    pub blended: bool,
    pub double_sided: bool,
    pub bind_group: wgpu::BindGroup,
}

impl GpuMaterial {
    /// Uploads `material`. A material without a colour map samples a white pixel.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        material: &Material,
    ) -> Self {
        let texture = match &material.base_color_texture {
            Some(img) => Texture::from_image(device, queue, img, Some(&material.name)),
            None => Texture::solid(device, queue, [255, 255, 255, 255]),
        };
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Material Buffer"),
            contents: bytemuck::cast_slice(&[MaterialUniform::from(material)]),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&texture.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: buffer.as_entire_binding(),
                },
            ],
            label: Some(&material.name),
        });
        Self {
            name: material.name.clone(),
            blended: material.is_blended(),
            double_sided: material.double_sided,
            bind_group,
        }
    }
}
