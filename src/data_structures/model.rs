//! CPU-side geometry and materials.
//!
//! Parsers produce these plain types without touching the GPU; the viewport
//! uploads them lazily the first time a mesh is drawn. Keeping them CPU-only is
//! what lets model loading run off the render thread.

use image::RgbaImage;

pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
}

impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
            0 => Float32x3,
            1 => Float32x2,
            2 => Float32x3,
        ];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

/// One drawable primitive: triangle list geometry plus the index of its material.
///
/// `material` indexes the material table of whatever owns the mesh (the parsed
/// asset first, the scene graph once attached). `None` means the default
/// material.
#[derive(Clone, Debug)]
pub struct Mesh {
    pub name: String,
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
    pub material: Option<usize>,
}

impl Mesh {
    pub fn num_elements(&self) -> u32 {
        self.indices.len() as u32
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AlphaMode {
    Opaque,
    Mask { cutoff: f32 },
    Blend,
}

#[derive(Clone, Debug)]
pub struct Material {
    pub name: String,
    pub base_color_factor: [f32; 4],
    pub base_color_texture: Option<RgbaImage>,
    pub alpha_mode: AlphaMode,
    pub double_sided: bool,
}

impl Material {
    pub fn is_blended(&self) -> bool {
        self.alpha_mode == AlphaMode::Blend
    }

    /// Alpha cutoff as the shader expects it; zero disables the discard.
    pub fn alpha_cutoff(&self) -> f32 {
        match self.alpha_mode {
            AlphaMode::Mask { cutoff } => cutoff,
            _ => 0.0,
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            base_color_factor: [1.0, 1.0, 1.0, 1.0],
            base_color_texture: None,
            alpha_mode: AlphaMode::Opaque,
            double_sided: false,
        }
    }
}
