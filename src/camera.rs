//! Camera, projection and the orbit controls that steer them.
//!
//! The [`Camera`] always looks at its target. [`OrbitController`] turns
//! pointer and touch input into pending rotate, pan and dolly amounts and
//! applies them once per frame in [`OrbitController::update`].

use std::{collections::HashMap, f32::consts::PI};

use cgmath::{InnerSpace, Matrix4, Point3, Rad, Vector2, Vector3, perspective};
use winit::{
    dpi::PhysicalPosition,
    event::{ElementState, MouseButton, MouseScrollDelta, TouchPhase, WindowEvent},
};

use wgpu::util::DeviceExt;

use crate::config::{CameraConfig, ControlsConfig};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Keeps the orbit away from the poles, where the view direction and `up` align.
const POLAR_EPSILON: f32 = 1e-4;
/// Dolly scale per wheel step.
const ZOOM_BASE: f32 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
}

impl Camera {
    pub fn new<P: Into<Point3<f32>>, T: Into<Point3<f32>>>(position: P, target: T) -> Self {
        Self {
            position: position.into(),
            target: target.into(),
            up: Vector3::unit_y(),
        }
    }

    pub fn from_config(config: &CameraConfig) -> Self {
        Self::new(config.position, config.target)
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.target, self.up)
    }

    /// Distance between the camera and the point it orbits.
    pub fn distance(&self) -> f32 {
        (self.position - self.target).magnitude()
    }
}

/// Perspective projection plus the size of the surface it draws to.
#[derive(Debug, Clone)]
pub struct Projection {
    width: u32,
    height: u32,
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
    matrix: Matrix4<f32>,
    dirty: bool,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let mut projection = Self {
            width,
            height,
            aspect: width as f32 / height as f32,
            fovy: fovy.into(),
            znear,
            zfar,
            matrix: Matrix4::from_scale(1.0),
            dirty: true,
        };
        projection.calc_matrix();
        projection
    }

    pub fn from_config(width: u32, height: u32, config: &CameraConfig) -> Self {
        Self::new(width, height, cgmath::Deg(config.fov), config.near, config.far)
    }

    /// Takes the new surface size. A zero dimension has no drawable area and is ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.width = width;
        self.height = height;
        self.aspect = width as f32 / height as f32;
        self.dirty = true;
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn fovy(&self) -> Rad<f32> {
        self.fovy
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The projection matrix, recomputed only after a resize.
    pub fn calc_matrix(&mut self) -> Matrix4<f32> {
        if self.dirty {
            self.matrix = OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar);
            self.dirty = false;
        }
        self.matrix
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::from_scale(1.0).into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera, projection: &mut Projection) {
        self.view_position = camera.position.to_homogeneous().into();
        self.view_proj = (projection.calc_matrix() * camera.calc_matrix()).into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

/// Camera state and its GPU binding.
#[derive(Debug)]
pub struct CameraResources {
    pub camera: Camera,
    pub controller: OrbitController,
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl CameraResources {
    pub fn new(
        device: &wgpu::Device,
        camera: Camera,
        controller: OrbitController,
        projection: &mut Projection,
    ) -> Self {
        let mut uniform = CameraUniform::new();
        uniform.update_view_proj(&camera, projection);
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("camera_bind_group_layout"),
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
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("camera_bind_group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        Self {
            camera,
            controller,
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DragMode {
    Rotate,
    Dolly,
    Pan,
}

impl DragMode {
    fn for_button(button: MouseButton) -> Option<Self> {
        match button {
            MouseButton::Left => Some(Self::Rotate),
            MouseButton::Middle => Some(Self::Dolly),
            MouseButton::Right => Some(Self::Pan),
            _ => None,
        }
    }
}

/// Orbit, dolly and pan around the camera target, driven by mouse, wheel and touch.
///
/// Input only accumulates pending motion; nothing moves until [`Self::update`].
#[derive(Debug)]
pub struct OrbitController {
    settings: ControlsConfig,
    /// Needed to turn pixel drags into angles and distances.
    viewport: (u32, u32),
    fovy: Rad<f32>,
    // pending motion
    theta: f32,
    phi: f32,
    scale: f32,
    pan: Vector3<f32>,
    // pointer state; a drag belongs to the button that started it
    drag: Option<(MouseButton, DragMode)>,
    cursor: Option<PhysicalPosition<f64>>,
    touches: HashMap<u64, PhysicalPosition<f64>>,
}

impl OrbitController {
    pub fn new(settings: ControlsConfig, viewport: (u32, u32), fovy: Rad<f32>) -> Self {
        Self {
            settings,
            viewport,
            fovy,
            theta: 0.0,
            phi: 0.0,
            scale: 1.0,
            pan: Vector3::new(0.0, 0.0, 0.0),
            drag: None,
            cursor: None,
            touches: HashMap::new(),
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.viewport = (width, height);
        }
    }

    fn height(&self) -> f32 {
        self.viewport.1.max(1) as f32
    }

    /// Rotates by a pointer drag of `(dx, dy)` pixels. Dragging across the
    /// full viewport height turns the camera once around the target.
    pub fn rotate_by_pixels(&mut self, dx: f32, dy: f32) {
        let per_pixel = 2.0 * PI * self.settings.rotate_speed / self.height();
        self.theta -= dx * per_pixel;
        self.phi -= dy * per_pixel;
    }

    /// Pans by a pointer drag of `(dx, dy)` pixels so the scene follows the pointer.
    pub fn pan_by_pixels(&mut self, camera: &Camera, dx: f32, dy: f32) {
        let forward = camera.target - camera.position;
        let distance = forward.magnitude() * (self.fovy.0 / 2.0).tan();
        let per_pixel = 2.0 * distance * self.settings.pan_speed / self.height();
        let right = forward.cross(camera.up);
        if right.magnitude2() <= f32::EPSILON {
            return;
        }
        let right = right.normalize();
        let up = right.cross(forward).normalize();
        self.pan += right * (-dx * per_pixel) + up * (dy * per_pixel);
    }

    /// Positive steps move the camera closer to the target.
    pub fn zoom_steps(&mut self, steps: f32) {
        self.scale *= ZOOM_BASE.powf(self.settings.zoom_speed * steps);
    }

    pub fn handle_window_events(&mut self, camera: &Camera, event: &WindowEvent) {
        match event {
            WindowEvent::MouseInput { state, button, .. } => self.mouse_input(*state, *button),
            WindowEvent::CursorMoved { position, .. } => self.cursor_moved(camera, *position),
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
                self.drag = None;
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let y = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32,
                };
                if y != 0.0 {
                    self.zoom_steps(y.signum());
                }
            }
            WindowEvent::Touch(touch) => match touch.phase {
                TouchPhase::Started => {
                    self.touches.insert(touch.id, touch.location);
                }
                TouchPhase::Moved => self.touch_moved(camera, touch.id, touch.location),
                TouchPhase::Ended | TouchPhase::Cancelled => {
                    self.touches.remove(&touch.id);
                }
            },
            _ => {}
        }
    }

    /// Starts a drag on press unless one is already running. Only releasing
    /// the button that started the drag ends it.
    pub fn mouse_input(&mut self, state: ElementState, button: MouseButton) {
        match state {
            ElementState::Pressed if self.drag.is_none() => {
                self.drag = DragMode::for_button(button).map(|mode| (button, mode));
            }
            ElementState::Pressed => {}
            ElementState::Released => {
                if self.drag.is_some_and(|(started_by, _)| started_by == button) {
                    self.drag = None;
                }
            }
        }
    }

    pub fn cursor_moved(&mut self, camera: &Camera, position: PhysicalPosition<f64>) {
        let Some(last) = self.cursor.replace(position) else {
            return;
        };
        let dx = (position.x - last.x) as f32;
        let dy = (position.y - last.y) as f32;
        match self.drag {
            None => {}
            Some((_, DragMode::Rotate)) => self.rotate_by_pixels(dx, dy),
            Some((_, DragMode::Dolly)) => self.zoom_steps(-dy / 10.0),
            Some((_, DragMode::Pan)) => self.pan_by_pixels(camera, dx, dy),
        }
    }

    /// One finger rotates; two fingers pinch to dolly and move together to pan.
    fn touch_moved(&mut self, camera: &Camera, id: u64, location: PhysicalPosition<f64>) {
        let Some(last) = self.touches.insert(id, location) else {
            return;
        };
        match self.touches.len() {
            1 => self.rotate_by_pixels((location.x - last.x) as f32, (location.y - last.y) as f32),
            2 => {
                let Some(other) = self
                    .touches
                    .iter()
                    .find(|(other_id, _)| **other_id != id)
                    .map(|(_, p)| *p)
                else {
                    return;
                };
                let before = Vector2::new((last.x - other.x) as f32, (last.y - other.y) as f32);
                let after = Vector2::new((location.x - other.x) as f32, (location.y - other.y) as f32);
                if before.magnitude() > f32::EPSILON && after.magnitude() > f32::EPSILON {
                    self.scale *= (before.magnitude() / after.magnitude()).powf(self.settings.zoom_speed);
                }
                // The midpoint moves by half of this finger's motion.
                self.pan_by_pixels(
                    camera,
                    (location.x - last.x) as f32 / 2.0,
                    (location.y - last.y) as f32 / 2.0,
                );
            }
            _ => {}
        }
    }

    /// Applies the pending motion to `camera`.
    ///
    /// Without damping everything pending is applied at once. With damping,
    /// a `damping_factor` share is applied and the rest decays over the next updates.
    pub fn update(&mut self, camera: &mut Camera) {
        let share = if self.settings.enable_damping {
            self.settings.damping_factor.clamp(0.0, 1.0)
        } else {
            1.0
        };

        let offset = camera.position - camera.target;
        let radius = offset.magnitude();
        let mut theta = offset.x.atan2(offset.z);
        let mut phi = if radius > 0.0 {
            (offset.y / radius).clamp(-1.0, 1.0).acos()
        } else {
            PI / 2.0
        };
        theta += self.theta * share;
        phi = (phi + self.phi * share).clamp(POLAR_EPSILON, PI - POLAR_EPSILON);
        let scale = self.scale.powf(share);
        let radius = (radius * scale).clamp(self.settings.min_distance, self.settings.max_distance);

        let pan = self.pan * share;
        camera.target += pan;
        camera.position = camera.target
            + Vector3::new(
                radius * phi.sin() * theta.sin(),
                radius * phi.cos(),
                radius * phi.sin() * theta.cos(),
            );

        if self.settings.enable_damping {
            self.theta *= 1.0 - share;
            self.phi *= 1.0 - share;
            self.scale = self.scale.powf(1.0 - share);
            self.pan *= 1.0 - share;
        } else {
            self.theta = 0.0;
            self.phi = 0.0;
            self.scale = 1.0;
            self.pan = Vector3::new(0.0, 0.0, 0.0);
        }
    }
}
