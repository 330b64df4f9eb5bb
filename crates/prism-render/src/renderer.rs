//! Frame driver tying the manager, cache, shaders and instruction list
//! together.

use crate::batch::RebuildStats;
use crate::batch::instance::AttributeProperty;
use crate::config::PipelineConfig;
use crate::display::{DisplayObjectStore, ObjectId};
use crate::error::RenderResult;
use crate::frame::{DirectionalLight, FrameContext, SceneUniforms};
use crate::manager::{BatchId, BatchManager};
use crate::render_inst::RenderInstList;
use crate::resource_cache::DeviceResourceCache;
use crate::shader::{Material, ShaderRegistry};
use prism_core::profiling::{self, profile_function};
use prism_test_utils::{RenderDevice, RenderTarget};
use std::borrow::Cow;

/// Statistics for a rendered frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub batches: usize,
    /// Instructions submitted before flushing.
    pub instructions: usize,
    /// Draw commands handed to the device.
    pub draw_calls: usize,
    pub instances: u64,
    /// Rebuild work since the previous frame, partial updates and dropped
    /// batches included.
    pub rebuilds: RebuildStats,
}

/// Owns everything the pipeline keeps between frames.
///
/// ```rust
/// # #[cfg(feature = "mock")]
/// # {
/// use prism_render::{BatchRenderer, DisplayObject, ObjectId, ObjectTable, ShapeStyle};
/// use prism_test_utils::{MockRenderDevice, RenderTarget};
///
/// let device = MockRenderDevice::new();
/// let mut objects = ObjectTable::new();
/// let mut renderer = BatchRenderer::new(Default::default());
///
/// let id = objects.insert(DisplayObject::new(ObjectId(1), ShapeStyle::Circle { r: 8.0 }));
/// renderer.insert(&objects, id);
///
/// let stats = renderer.render_frame(&device, &mut objects, &RenderTarget::mock(64, 64)).unwrap();
/// assert_eq!(stats.draw_calls, 1);
/// # }
/// ```
pub struct BatchRenderer {
    manager: BatchManager,
    cache: DeviceResourceCache,
    shaders: ShaderRegistry,
    config: PipelineConfig,
    list: RenderInstList,
    scene: SceneUniforms,
    lights: Vec<DirectionalLight>,
}

impl BatchRenderer {
    /// A renderer using the built-in materials.
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_shaders(config, ShaderRegistry::with_builtins())
    }

    pub fn with_shaders(config: PipelineConfig, shaders: ShaderRegistry) -> Self {
        Self {
            manager: BatchManager::new(),
            cache: DeviceResourceCache::new(),
            shaders,
            list: RenderInstList::with_capacity(config.instruction_capacity),
            config,
            scene: SceneUniforms::default(),
            lights: Vec::new(),
        }
    }

    pub fn set_scene(&mut self, scene: SceneUniforms) {
        self.scene = scene;
    }

    pub fn set_lights(&mut self, lights: Vec<DirectionalLight>) {
        self.lights = lights;
    }

    pub fn insert(&mut self, store: &dyn DisplayObjectStore, id: ObjectId) -> Option<BatchId> {
        self.manager.insert(store, id)
    }

    pub fn remove(&mut self, device: &dyn RenderDevice, id: ObjectId) -> bool {
        self.manager.remove(device, id)
    }

    pub fn on_shape_changed(
        &mut self,
        device: &dyn RenderDevice,
        store: &dyn DisplayObjectStore,
        id: ObjectId,
    ) -> Option<BatchId> {
        self.manager.on_shape_changed(device, store, id)
    }

    pub fn mark_dirty(&mut self, id: ObjectId) {
        self.manager.mark_dirty(id);
    }

    pub fn update_attribute(
        &mut self,
        device: &dyn RenderDevice,
        store: &dyn DisplayObjectStore,
        id: ObjectId,
        property: AttributeProperty,
    ) -> RenderResult<bool> {
        let ctx = FrameContext {
            device,
            cache: &self.cache,
            shaders: &self.shaders,
            config: &self.config,
            scene: self.scene,
            lights: &self.lights,
        };
        self.manager.update_attribute(&ctx, store, id, property)
    }

    /// Renders every batch, then sorts and flushes the instructions.
    ///
    /// Batches that fail do not stop the others from drawing; the first
    /// failure is returned after the flush.
    pub fn render_frame(
        &mut self,
        device: &dyn RenderDevice,
        store: &mut dyn DisplayObjectStore,
        target: &RenderTarget,
    ) -> RenderResult<FrameStats> {
        profiling::new_frame();
        profile_function!();

        let ctx = FrameContext {
            device,
            cache: &self.cache,
            shaders: &self.shaders,
            config: &self.config,
            scene: self.scene,
            lights: &self.lights,
        };
        let rendered = self.manager.render(&ctx, store, &mut self.list);

        let instructions = self.list.len();
        let instances = self.list.iter().map(|inst| inst.instance_count() as u64).sum();
        let flushed = self.list.flush(device, target);

        let rebuilds = self.manager.take_rebuilds();
        let draw_calls = flushed?;
        rendered?;

        let stats = FrameStats {
            batches: self.manager.len(),
            instructions,
            draw_calls,
            instances,
            rebuilds,
        };
        tracing::trace!(?stats, "frame rendered");
        Ok(stats)
    }

    /// Releases every batch and empties the resource cache.
    pub fn destroy(&mut self, device: &dyn RenderDevice) {
        self.manager.destroy(device);
        self.list.clear();
        self.cache.clear();
    }

    pub fn manager(&self) -> &BatchManager {
        &self.manager
    }

    pub fn cache(&self) -> &DeviceResourceCache {
        &self.cache
    }

    pub fn shaders(&self) -> &ShaderRegistry {
        &self.shaders
    }

    /// Registers or replaces a material. Batches already compiled from it
    /// rebuild their program on the next frame.
    pub fn register_material(&mut self, name: impl Into<String>, material: Material) {
        let name = name.into();
        self.manager.mark_material_dirty(&name);
        self.shaders.register_material(name, material);
    }

    /// Registers or replaces an include chunk. Every batch rebuilds its
    /// program on the next frame.
    pub fn register_chunk(&mut self, name: impl Into<String>, source: impl Into<Cow<'static, str>>) {
        self.shaders.register_chunk(name, source);
        self.manager.mark_all_programs_dirty();
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}
