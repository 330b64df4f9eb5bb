//! GPU resource handles that can be real or mock.
//!
//! Every handle carries a device-assigned id. Two handles compare equal when
//! their ids match, which is what the resource cache tests rely on.

use crate::render_device::InputLayoutDescriptor;
use std::sync::Arc;

/// Handle to a GPU buffer.
///
/// Cheap to clone: the real variant is reference counted by wgpu.
#[derive(Clone, Debug)]
pub struct GpuBuffer {
    id: u64,
    size: u64,
    inner: GpuBufferInner,
}

#[derive(Clone, Debug)]
enum GpuBufferInner {
    Real(wgpu::Buffer),
    #[cfg(feature = "mock")]
    Mock,
}

impl GpuBuffer {
    pub fn from_wgpu(id: u64, buffer: wgpu::Buffer) -> Self {
        Self {
            id,
            size: buffer.size(),
            inner: GpuBufferInner::Real(buffer),
        }
    }

    #[cfg(feature = "mock")]
    pub fn mock(id: u64, size: u64) -> Self {
        Self {
            id,
            size,
            inner: GpuBufferInner::Mock,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// The underlying wgpu buffer, `None` for mock buffers.
    pub fn as_wgpu(&self) -> Option<&wgpu::Buffer> {
        match &self.inner {
            GpuBufferInner::Real(buffer) => Some(buffer),
            #[cfg(feature = "mock")]
            GpuBufferInner::Mock => None,
        }
    }

    #[cfg(feature = "mock")]
    pub fn is_mock(&self) -> bool {
        matches!(self.inner, GpuBufferInner::Mock)
    }
}

impl PartialEq for GpuBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for GpuBuffer {}

/// Handle to a sampled RGBA8 texture.
#[derive(Clone, Debug)]
pub struct GpuTexture {
    id: u64,
    width: u32,
    height: u32,
    inner: GpuTextureInner,
}

#[derive(Clone, Debug)]
enum GpuTextureInner {
    Real {
        texture: wgpu::Texture,
        view: wgpu::TextureView,
    },
    #[cfg(feature = "mock")]
    Mock,
}

impl GpuTexture {
    pub fn from_wgpu(id: u64, texture: wgpu::Texture) -> Self {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            id,
            width: texture.width(),
            height: texture.height(),
            inner: GpuTextureInner::Real { texture, view },
        }
    }

    #[cfg(feature = "mock")]
    pub fn mock(id: u64, width: u32, height: u32) -> Self {
        Self {
            id,
            width,
            height,
            inner: GpuTextureInner::Mock,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn as_wgpu(&self) -> Option<&wgpu::Texture> {
        match &self.inner {
            GpuTextureInner::Real { texture, .. } => Some(texture),
            #[cfg(feature = "mock")]
            GpuTextureInner::Mock => None,
        }
    }

    pub fn view(&self) -> Option<&wgpu::TextureView> {
        match &self.inner {
            GpuTextureInner::Real { view, .. } => Some(view),
            #[cfg(feature = "mock")]
            GpuTextureInner::Mock => None,
        }
    }
}

impl PartialEq for GpuTexture {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for GpuTexture {}

/// Handle to a compiled program (vertex + fragment stage).
#[derive(Clone, Debug)]
pub struct GpuProgram {
    id: u32,
    inner: GpuProgramInner,
}

#[derive(Clone, Debug)]
enum GpuProgramInner {
    Real {
        vertex: wgpu::ShaderModule,
        fragment: wgpu::ShaderModule,
    },
    #[cfg(feature = "mock")]
    Mock,
}

impl GpuProgram {
    pub fn from_wgpu(id: u32, vertex: wgpu::ShaderModule, fragment: wgpu::ShaderModule) -> Self {
        Self {
            id,
            inner: GpuProgramInner::Real { vertex, fragment },
        }
    }

    #[cfg(feature = "mock")]
    pub fn mock(id: u32) -> Self {
        Self {
            id,
            inner: GpuProgramInner::Mock,
        }
    }

    /// Program id, used as the low half of the draw sort key.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The vertex and fragment modules, `None` for mock programs.
    pub fn modules(&self) -> Option<(&wgpu::ShaderModule, &wgpu::ShaderModule)> {
        match &self.inner {
            GpuProgramInner::Real { vertex, fragment } => Some((vertex, fragment)),
            #[cfg(feature = "mock")]
            GpuProgramInner::Mock => None,
        }
    }
}

impl PartialEq for GpuProgram {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for GpuProgram {}

/// Handle to an input layout.
///
/// Input layouts carry no GPU object of their own; wgpu bakes them into the
/// pipeline. The handle keeps the descriptor so the backend can build one.
#[derive(Clone, Debug)]
pub struct GpuInputLayout {
    id: u64,
    descriptor: Arc<InputLayoutDescriptor>,
}

impl GpuInputLayout {
    pub fn new(id: u64, descriptor: InputLayoutDescriptor) -> Self {
        Self {
            id,
            descriptor: Arc::new(descriptor),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn descriptor(&self) -> &InputLayoutDescriptor {
        &self.descriptor
    }
}

impl PartialEq for GpuInputLayout {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for GpuInputLayout {}

/// Vertex and index buffers bound to an input layout.
#[derive(Clone, Debug)]
pub struct GpuInputState {
    id: u64,
    layout: GpuInputLayout,
    vertex_buffers: Arc<[GpuBuffer]>,
    index_buffer: Option<GpuBuffer>,
}

impl GpuInputState {
    pub fn new(
        id: u64,
        layout: GpuInputLayout,
        vertex_buffers: Vec<GpuBuffer>,
        index_buffer: Option<GpuBuffer>,
    ) -> Self {
        Self {
            id,
            layout,
            vertex_buffers: vertex_buffers.into(),
            index_buffer,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn layout(&self) -> &GpuInputLayout {
        &self.layout
    }

    pub fn vertex_buffers(&self) -> &[GpuBuffer] {
        &self.vertex_buffers
    }

    pub fn index_buffer(&self) -> Option<&GpuBuffer> {
        self.index_buffer.as_ref()
    }
}

impl PartialEq for GpuInputState {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for GpuInputState {}

/// Color attachment a flush renders into.
#[derive(Clone, Debug)]
pub struct RenderTarget {
    inner: RenderTargetInner,
    /// Clear color for the pass. `None` loads the existing contents.
    pub clear_color: Option<wgpu::Color>,
}

#[derive(Clone, Debug)]
enum RenderTargetInner {
    Real {
        view: wgpu::TextureView,
        format: wgpu::TextureFormat,
    },
    #[cfg(feature = "mock")]
    Mock { width: u32, height: u32 },
}

impl RenderTarget {
    pub fn from_wgpu(view: wgpu::TextureView, format: wgpu::TextureFormat) -> Self {
        Self {
            inner: RenderTargetInner::Real { view, format },
            clear_color: Some(wgpu::Color::TRANSPARENT),
        }
    }

    #[cfg(feature = "mock")]
    pub fn mock(width: u32, height: u32) -> Self {
        Self {
            inner: RenderTargetInner::Mock { width, height },
            clear_color: Some(wgpu::Color::TRANSPARENT),
        }
    }

    pub fn with_clear_color(mut self, color: Option<wgpu::Color>) -> Self {
        self.clear_color = color;
        self
    }

    pub fn view(&self) -> Option<&wgpu::TextureView> {
        match &self.inner {
            RenderTargetInner::Real { view, .. } => Some(view),
            #[cfg(feature = "mock")]
            RenderTargetInner::Mock { .. } => None,
        }
    }

    pub fn format(&self) -> Option<wgpu::TextureFormat> {
        match &self.inner {
            RenderTargetInner::Real { format, .. } => Some(*format),
            #[cfg(feature = "mock")]
            RenderTargetInner::Mock { .. } => None,
        }
    }

    #[cfg(feature = "mock")]
    pub fn mock_size(&self) -> Option<(u32, u32)> {
        match &self.inner {
            RenderTargetInner::Mock { width, height } => Some((*width, *height)),
            _ => None,
        }
    }
}
