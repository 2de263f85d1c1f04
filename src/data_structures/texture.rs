//! GPU textures: the depth buffer and material colour maps.

use image::RgbaImage;

fn texture_2d(
    device: &wgpu::Device,
    label: Option<&str>,
    (width, height): (u32, u32),
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label,
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage,
        view_formats: &[],
    })
}

/// Depth attachment sized to the draw surface. Recreated on every resize.
#[derive(Debug)]
pub struct DepthBuffer {
    pub view: wgpu::TextureView,
}

impl DepthBuffer {
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    pub fn new(device: &wgpu::Device, config: &wgpu::SurfaceConfiguration) -> Self {
        let texture = texture_2d(
            device,
            Some("depth buffer"),
            (config.width, config.height),
            Self::FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        );
        Self {
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
        }
    }
}

/// A sampled sRGB colour texture.
#[derive(Clone, Debug)]
pub struct Texture {
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

impl Texture {
    /// Uploads a decoded colour image.
    pub fn from_image(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        img: &RgbaImage,
        label: Option<&str>,
    ) -> Self {
        Self::from_rgba(device, queue, img.as_raw(), img.dimensions(), label)
    }

    /// A 1x1 texture of a single colour, used when a material has no colour map.
    pub fn solid(device: &wgpu::Device, queue: &wgpu::Queue, rgba: [u8; 4]) -> Self {
        Self::from_rgba(device, queue, &rgba, (1, 1), Some("solid colour texture"))
    }

    fn from_rgba(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        rgba: &[u8],
        (width, height): (u32, u32),
        label: Option<&str>,
    ) -> Self {
        let texture = texture_2d(
            device,
            label,
            (width, height),
            wgpu::TextureFormat::Rgba8UnormSrgb,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        );
        queue.write_texture(
            texture.as_image_copy(),
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            texture.size(),
        );

        // Model UVs routinely leave [0, 1], so colour maps tile.
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("colour map sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        Self {
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
            sampler,
        }
    }
}
