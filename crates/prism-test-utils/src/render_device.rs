//! The device contract the batching pipeline renders through.
//!
//! The pipeline never touches wgpu directly. It creates buffers, input
//! layouts, input states and programs through [`RenderDevice`] and hands the
//! sorted frame to [`RenderDevice::execute`]. `prism-render` implements the
//! trait for its wgpu `GraphicsContext`; tests use `MockRenderDevice`.

use crate::gpu_types::*;
use std::fmt;

/// Errors reported by a [`RenderDevice`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// A shader stage failed to compile or validate.
    ProgramCompilation {
        label: Option<String>,
        message: String,
    },
    /// An input layout or input state did not match its buffers.
    InvalidLayout(String),
    /// The device ran out of memory.
    OutOfMemory,
    /// A handle was used after destruction or does not belong to this device.
    InvalidHandle { reason: String },
    /// The device was lost.
    Lost,
}

impl DeviceError {
    /// Errors no retry at this layer can recover from.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::OutOfMemory | Self::Lost)
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProgramCompilation { label, message } => match label {
                Some(label) => write!(f, "Program '{}' failed to compile: {}", label, message),
                None => write!(f, "Program failed to compile: {}", message),
            },
            Self::InvalidLayout(msg) => write!(f, "Invalid input layout: {}", msg),
            Self::OutOfMemory => write!(f, "Device out of memory"),
            Self::InvalidHandle { reason } => write!(f, "Invalid device handle: {}", reason),
            Self::Lost => write!(f, "Device lost"),
        }
    }
}

impl std::error::Error for DeviceError {}

/// A buffer created with its initial contents.
#[derive(Debug, Clone, Copy)]
pub struct BufferDescriptor<'a> {
    pub label: Option<&'a str>,
    pub usage: wgpu::BufferUsages,
    pub contents: &'a [u8],
}

/// An RGBA8 texture created with its pixels.
#[derive(Debug, Clone, Copy)]
pub struct TextureDescriptor<'a> {
    pub label: Option<&'a str>,
    pub width: u32,
    pub height: u32,
    pub data: &'a [u8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttributeDescriptor {
    pub location: u32,
    pub format: wgpu::VertexFormat,
    pub offset: u64,
}

impl VertexAttributeDescriptor {
    /// Byte size of one value of this attribute.
    pub fn size(&self) -> u64 {
        self.format.size()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexBufferLayoutDescriptor {
    pub stride: u64,
    pub step_mode: wgpu::VertexStepMode,
    pub attributes: Vec<VertexAttributeDescriptor>,
}

impl VertexBufferLayoutDescriptor {
    /// Instance divisor: 0 for per-vertex data, 1 for per-instance data.
    pub fn divisor(&self) -> u32 {
        match self.step_mode {
            wgpu::VertexStepMode::Vertex => 0,
            wgpu::VertexStepMode::Instance => 1,
        }
    }

    pub fn attribute(&self, location: u32) -> Option<&VertexAttributeDescriptor> {
        self.attributes.iter().find(|a| a.location == location)
    }
}

/// Structural description of how vertex buffer bytes map to shader inputs.
///
/// Two descriptors are equal exactly when they describe the same layout, so
/// the descriptor itself serves as a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InputLayoutDescriptor {
    pub vertex_buffers: Vec<VertexBufferLayoutDescriptor>,
    pub index_format: Option<wgpu::IndexFormat>,
}

#[derive(Debug, Clone)]
pub struct InputStateDescriptor<'a> {
    pub label: Option<&'a str>,
    pub layout: &'a GpuInputLayout,
    pub vertex_buffers: &'a [GpuBuffer],
    pub index_buffer: Option<&'a GpuBuffer>,
}

/// WGSL sources for a program. Both stages use `vs_main` / `fs_main`.
#[derive(Debug, Clone, Copy)]
pub struct ProgramDescriptor<'a> {
    pub label: Option<&'a str>,
    pub vertex: &'a str,
    pub fragment: &'a str,
}

/// Raw bytes bound as a uniform buffer at `@group(group) @binding(binding)`.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformBinding {
    pub group: u32,
    pub binding: u32,
    pub data: Vec<u8>,
}

/// A texture bound at `binding` with its sampler at `binding + 1`.
#[derive(Debug, Clone)]
pub struct TextureBinding {
    pub group: u32,
    pub binding: u32,
    pub texture: GpuTexture,
}

/// One indexed, instanced draw.
#[derive(Debug, Clone)]
pub struct DrawCommand {
    pub program: GpuProgram,
    pub input_state: GpuInputState,
    pub uniforms: Vec<UniformBinding>,
    pub textures: Vec<TextureBinding>,
    pub index_count: u32,
    pub instance_count: u32,
}

/// Trait abstracting the GPU operations the batching pipeline needs.
///
/// Methods take `&self` and return owned handles, so the trait is object
/// safe and mock implementations record calls through interior mutability.
///
/// # Example
///
/// ```rust,no_run
/// use prism_test_utils::{BufferDescriptor, DeviceError, RenderDevice};
///
/// fn upload(device: &dyn RenderDevice) -> Result<(), DeviceError> {
///     let buffer = device.create_buffer(&BufferDescriptor {
///         label: Some("instances"),
///         usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
///         contents: &[0u8; 64],
///     })?;
///     device.write_buffer(&buffer, 16, &[1u8; 16])?;
///     device.destroy_buffer(&buffer);
///     Ok(())
/// }
/// ```
pub trait RenderDevice: Send + Sync {
    fn create_buffer(&self, desc: &BufferDescriptor) -> Result<GpuBuffer, DeviceError>;

    /// Writes `data` at `offset`. The write must fit inside the buffer.
    fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8]) -> Result<(), DeviceError>;

    /// Releases the buffer. Destroying twice is a no-op.
    fn destroy_buffer(&self, buffer: &GpuBuffer);

    fn create_texture(&self, desc: &TextureDescriptor) -> Result<GpuTexture, DeviceError>;

    fn create_input_layout(&self, desc: &InputLayoutDescriptor) -> Result<GpuInputLayout, DeviceError>;

    fn create_input_state(&self, desc: &InputStateDescriptor) -> Result<GpuInputState, DeviceError>;

    fn destroy_input_state(&self, state: &GpuInputState);

    fn create_program(&self, desc: &ProgramDescriptor) -> Result<GpuProgram, DeviceError>;

    /// Executes `commands` in order as one submission into `target`.
    fn execute(&self, target: &RenderTarget, commands: &[DrawCommand]) -> Result<(), DeviceError>;
}
