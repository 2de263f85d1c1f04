use cgmath::{InnerSpace, Vector3};
use wgpu::util::DeviceExt;

use crate::config::LightingConfig;

#[derive(Debug)]
pub struct LightResources {
    pub uniform: LightUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl LightResources {
    pub fn new(device: &wgpu::Device, lighting: &LightingConfig) -> Self {
        let uniform = LightUniform::from_config(lighting);
        let buffer = mk_buffer(device, uniform);
        let bind_group_layout = mk_bind_group_layout(device);
        let bind_group = mk_bind_group(device, &bind_group_layout, &buffer);
        Self {
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
        }
    }
}

/// One ambient term plus one directional light.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    /// Direction the light travels in, normalized.
    direction: [f32; 3],
    intensity: f32,
    color: [f32; 3],
    ambient_intensity: f32,
    ambient: [f32; 3],
    // Due to uniforms requiring 16 byte (4 float) spacing, we need to use a padding field here
    _padding: u32,
}

impl LightUniform {
    /// The directional light shines from its configured position towards the origin.
    pub fn from_config(lighting: &LightingConfig) -> Self {
        let from = Vector3::from(lighting.directional_position);
        let direction = if from.magnitude2() > 0.0 {
            -from.normalize()
        } else {
            log::warn!("Directional light sits at the origin, pointing it straight down");
            -Vector3::unit_y()
        };
        Self {
            direction: direction.into(),
            intensity: lighting.directional_intensity,
            color: lighting.directional_color,
            ambient_intensity: lighting.ambient_intensity,
            ambient: lighting.ambient_color,
            _padding: 0,
        }
    }

    pub fn direction(&self) -> [f32; 3] {
        self.direction
    }
}

pub fn mk_buffer(device: &wgpu::Device, light_uniform: LightUniform) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Light Buffer"),
        contents: bytemuck::cast_slice(&[light_uniform]),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

pub fn mk_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("light_bind_group_layout"),
    })
}

pub fn mk_bind_group(
    device: &wgpu::Device,
    bind_group_layout: &wgpu::BindGroupLayout,
    light_buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout: bind_group_layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: light_buffer.as_entire_binding(),
        }],
        label: Some("light_bind_group"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_matches_shader_layout() {
        assert_eq!(std::mem::size_of::<LightUniform>(), 48);
    }

    #[test]
    fn default_light_points_at_origin() {
        let uniform = LightUniform::from_config(&LightingConfig::default());
        let expected = -1.0 / 3.0f32.sqrt();
        for component in uniform.direction() {
            assert!((component - expected).abs() < 1e-6);
        }
        assert_eq!(uniform.intensity, 1.0);
        assert_eq!(uniform.ambient_intensity, 1.0);
        assert_eq!(uniform.ambient, [1.0, 1.0, 1.0]);
    }
}
