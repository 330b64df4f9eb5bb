//! Per-frame inputs shared by every batch.

use crate::config::PipelineConfig;
use crate::display::Color;
use crate::resource_cache::DeviceResourceCache;
use crate::shader::ShaderRegistry;
use bytemuck::{Pod, Zeroable};
use prism_core::math::{Mat4, Vec3};
use prism_test_utils::RenderDevice;
use static_assertions::const_assert_eq;

/// Upper bound on lights forwarded to mesh shading.
pub const MAX_DIRECTIONAL_LIGHTS: usize = 4;

/// Camera block bound at `@group(0) @binding(0)`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SceneUniforms {
    pub projection: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub camera_position: [f32; 3],
    pub device_pixel_ratio: f32,
}

const_assert_eq!(std::mem::size_of::<SceneUniforms>(), 144);

impl SceneUniforms {
    pub fn new(projection: Mat4, view: Mat4, camera_position: Vec3, device_pixel_ratio: f32) -> Self {
        Self {
            projection: projection.to_cols_array_2d(),
            view: view.to_cols_array_2d(),
            camera_position: camera_position.to_array(),
            device_pixel_ratio,
        }
    }

    /// Pixel-space camera with the origin at the top left and y pointing down.
    pub fn orthographic(width: f32, height: f32, device_pixel_ratio: f32) -> Self {
        let projection = Mat4::orthographic_rh(0.0, width, height, 0.0, -1000.0, 1000.0);
        Self::new(projection, Mat4::IDENTITY, Vec3::ZERO, device_pixel_ratio)
    }
}

impl Default for SceneUniforms {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Mat4::IDENTITY, Vec3::ZERO, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    /// Direction the light travels in, world space.
    pub direction: Vec3,
    pub intensity: f32,
    pub color: Color,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: Vec3::NEG_Z,
            intensity: 1.0,
            color: Color::WHITE,
        }
    }
}

/// Everything a batch needs from outside itself during a call.
///
/// Built by the caller for each frame; nothing here is looked up globally.
#[derive(Clone, Copy)]
pub struct FrameContext<'a> {
    pub device: &'a dyn RenderDevice,
    pub cache: &'a DeviceResourceCache,
    pub shaders: &'a ShaderRegistry,
    pub config: &'a PipelineConfig,
    pub scene: SceneUniforms,
    pub lights: &'a [DirectionalLight],
}
