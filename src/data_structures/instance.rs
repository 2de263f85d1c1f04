//! Node transforms and their per-instance GPU layout.
//!
//! Every scene graph node carries a local [`Transform`] and a cached world
//! matrix. When a mesh is drawn, its world matrix is flattened into an
//! [`InstanceRaw`] and streamed through the instance vertex buffer.

use cgmath::{Matrix, Matrix3, Matrix4, One, Quaternion, SquareMatrix, Vector3};

use crate::data_structures::model;

/// Translation, rotation and (possibly non-uniform) scale of a node.
///
/// Applied in TRS order: scale first, then rotate, then translate. Nodes are
/// composed as matrices, since a non-uniform scale above a rotated child has
/// no TRS form.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vector3<f32>,
    pub rotation: Quaternion<f32>,
    pub scale: Vector3<f32>,
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: Quaternion::one(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn from_position_scale(position: Vector3<f32>, scale: Vector3<f32>) -> Self {
        Self {
            position,
            scale,
            ..Self::identity()
        }
    }

    /// Builds a transform from glTF's decomposed form (rotation is `[x, y, z, w]`).
    pub fn from_decomposed(translation: [f32; 3], rotation: [f32; 4], scale: [f32; 3]) -> Self {
        Self {
            position: translation.into(),
            rotation: Quaternion::new(rotation[3], rotation[0], rotation[1], rotation[2]),
            scale: scale.into(),
        }
    }

    pub fn to_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position)
            * Matrix4::from(self.rotation)
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/**
 * The world matrix and normal matrix of one drawn mesh as laid out in the
 * instance buffer.
 */
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceRaw {
    pub(crate) model: [[f32; 4]; 4],
    pub(crate) normal: [[f32; 3]; 3],
}

impl InstanceRaw {
    /// Normals go through the inverse transpose of the linear part so they stay
    /// perpendicular to sheared or unevenly scaled surfaces. A degenerate
    /// matrix falls back to the linear part itself.
    pub fn from_world(world: &Matrix4<f32>) -> Self {
        let linear = Matrix3::from_cols(world.x.truncate(), world.y.truncate(), world.z.truncate());
        let normal = linear.invert().map_or(linear, |inv| inv.transpose());
        Self {
            model: (*world).into(),
            normal: normal.into(),
        }
    }
}

/**
 * A mat4 occupies four vertex slots and a mat3 three, so the instance layout
 * spans shader locations 5 through 11.
 */
impl model::Vertex for InstanceRaw {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        const ATTRIBUTES: [wgpu::VertexAttribute; 7] = wgpu::vertex_attr_array![
            5 => Float32x4,
            6 => Float32x4,
            7 => Float32x4,
            8 => Float32x4,
            9 => Float32x3,
            10 => Float32x3,
            11 => Float32x3,
        ];
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &ATTRIBUTES,
        }
    }
}
