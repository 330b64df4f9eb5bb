use parking_lot::Mutex;
use prism_core::alloc::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64};

/// Errors raised while bringing up a [`GraphicsContext`].
#[derive(Debug)]
pub enum GraphicsContextError {
    /// No adapter matched the requested backends and options.
    NoAdapter(wgpu::RequestAdapterError),
    /// The adapter refused the device request.
    DeviceRequest(wgpu::RequestDeviceError),
}

impl fmt::Display for GraphicsContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAdapter(err) => write!(f, "Failed to find a suitable GPU adapter: {}", err),
            Self::DeviceRequest(err) => write!(f, "Failed to create device: {}", err),
        }
    }
}

impl std::error::Error for GraphicsContextError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::NoAdapter(err) => Some(err),
            Self::DeviceRequest(err) => Some(err),
        }
    }
}

/// Cache key for render pipelines built from a program and an input layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct PipelineKey {
    pub program: u32,
    pub layout: u64,
    pub format: wgpu::TextureFormat,
}

/// A wgpu device plus the bookkeeping needed to serve it as a
/// [`RenderDevice`](prism_test_utils::RenderDevice).
///
/// ```rust,no_run
/// use prism_render::GraphicsContext;
///
/// let ctx = GraphicsContext::new_owned_sync().expect("no GPU available");
/// let ctx2 = ctx.clone(); // Cheap clone
/// ```
pub struct GraphicsContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub(crate) next_resource_id: AtomicU64,
    pub(crate) next_program_id: AtomicU32,
    pub(crate) pipelines: Mutex<HashMap<PipelineKey, Arc<wgpu::RenderPipeline>>>,
    pub(crate) sampler: wgpu::Sampler,
}

impl GraphicsContext {
    /// Creates a context with default settings.
    pub async fn new_owned() -> Result<Arc<Self>, GraphicsContextError> {
        Self::new_owned_with_descriptor(GraphicsContextDescriptor::default()).await
    }

    /// Blocks the current thread until the context is created.
    pub fn new_owned_sync() -> Result<Arc<Self>, GraphicsContextError> {
        pollster::block_on(Self::new_owned())
    }

    pub async fn new_owned_with_descriptor(
        descriptor: GraphicsContextDescriptor,
    ) -> Result<Arc<Self>, GraphicsContextError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: descriptor.backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: descriptor.power_preference,
                compatible_surface: None,
                force_fallback_adapter: descriptor.force_fallback_adapter,
            })
            .await
            .map_err(GraphicsContextError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                required_limits: descriptor.limits.clone(),
                label: descriptor.label,
                ..Default::default()
            })
            .await
            .map_err(GraphicsContextError::DeviceRequest)?;

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("prism image sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        tracing::info!(adapter = %adapter.get_info().name, "Created graphics context");

        Ok(Arc::new(Self {
            instance,
            adapter,
            device,
            queue,
            next_resource_id: AtomicU64::new(1),
            next_program_id: AtomicU32::new(1),
            pipelines: Mutex::new(HashMap::default()),
            sampler,
        }))
    }

    /// Get device info
    pub fn info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    /// Get device limits
    pub fn limits(&self) -> wgpu::Limits {
        self.device.limits()
    }

    /// Number of render pipelines built so far.
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.lock().len()
    }
}

/// Descriptor for configuring graphics context creation.
pub struct GraphicsContextDescriptor {
    /// GPU backends to use
    pub backends: wgpu::Backends,
    /// Power preference for adapter selection
    pub power_preference: wgpu::PowerPreference,
    /// Whether to force fallback adapter
    pub force_fallback_adapter: bool,
    /// Required device limits
    pub limits: wgpu::Limits,
    /// Optional label for debugging
    pub label: Option<&'static str>,
}

impl Default for GraphicsContextDescriptor {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            limits: wgpu::Limits::default(),
            label: None,
        }
    }
}

impl GraphicsContextDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the power preference.
    pub fn power_preference(mut self, preference: wgpu::PowerPreference) -> Self {
        self.power_preference = preference;
        self
    }

    /// Set the backends to use.
    pub fn backends(mut self, backends: wgpu::Backends) -> Self {
        self.backends = backends;
        self
    }

    /// Use the software fallback adapter, for headless CI.
    pub fn fallback_adapter(mut self) -> Self {
        self.force_fallback_adapter = true;
        self
    }

    /// Set the device limits.
    pub fn limits(mut self, limits: wgpu::Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the debug label.
    pub fn label(mut self, label: &'static str) -> Self {
        self.label = Some(label);
        self
    }
}
