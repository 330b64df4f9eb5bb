//! Memoized device resources.
//!
//! Input layouts and programs are expensive to create and shared by every
//! batch with the same shape. The cache keys them structurally and hands out
//! the same handle for the lifetime of the device.

use crate::shader::PreprocessedProgram;
use parking_lot::RwLock;
use prism_core::{alloc::HashMap, profiling::profile_function};
use prism_test_utils::{DeviceError, GpuInputLayout, GpuProgram, InputLayoutDescriptor, RenderDevice};
use std::hash::Hash;

/// Structural identity of a program: its preprocessed sources.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgramKey {
    pub vertex: String,
    pub fragment: String,
}

impl From<&PreprocessedProgram> for ProgramKey {
    fn from(program: &PreprocessedProgram) -> Self {
        Self {
            vertex: program.vertex.clone(),
            fragment: program.fragment.clone(),
        }
    }
}

/// Lookup-or-create under a read fast path and a double-checked write path.
///
/// The create closure runs while the write lock is held, so concurrent
/// callers with equal keys never create twice. Failures are not cached.
fn get_or_create<K, V, F>(map: &RwLock<HashMap<K, V>>, key: K, create: F) -> Result<V, DeviceError>
where
    K: Eq + Hash,
    V: Clone,
    F: FnOnce() -> Result<V, DeviceError>,
{
    if let Some(value) = map.read().get(&key) {
        return Ok(value.clone());
    }

    let mut map = map.write();
    if let Some(value) = map.get(&key) {
        return Ok(value.clone());
    }
    let value = create()?;
    map.insert(key, value.clone());
    Ok(value)
}

/// Thread-safe cache of input layouts and programs.
///
/// ```
/// use prism_render::DeviceResourceCache;
///
/// let cache = DeviceResourceCache::new();
/// assert_eq!(cache.program_count(), 0);
/// ```
#[derive(Default)]
pub struct DeviceResourceCache {
    input_layouts: RwLock<HashMap<InputLayoutDescriptor, GpuInputLayout>>,
    programs: RwLock<HashMap<ProgramKey, GpuProgram>>,
}

impl DeviceResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_input_layout(
        &self,
        device: &dyn RenderDevice,
        descriptor: &InputLayoutDescriptor,
    ) -> Result<GpuInputLayout, DeviceError> {
        profile_function!();
        get_or_create(&self.input_layouts, descriptor.clone(), || {
            let layout = device.create_input_layout(descriptor)?;
            tracing::debug!(
                id = layout.id(),
                buffers = descriptor.vertex_buffers.len(),
                "created input layout"
            );
            Ok(layout)
        })
    }

    pub fn create_program_simple(
        &self,
        device: &dyn RenderDevice,
        program: &PreprocessedProgram,
    ) -> Result<GpuProgram, DeviceError> {
        profile_function!();
        get_or_create(&self.programs, ProgramKey::from(program), || {
            let created = device.create_program(&program.descriptor())?;
            tracing::debug!(id = created.id(), label = %program.label, "compiled program");
            Ok(created)
        })
    }

    pub fn input_layout_count(&self) -> usize {
        self.input_layouts.read().len()
    }

    pub fn program_count(&self) -> usize {
        self.programs.read().len()
    }

    /// Drops every cached handle. Call on device teardown only.
    pub fn clear(&self) {
        self.input_layouts.write().clear();
        self.programs.write().clear();
    }
}
