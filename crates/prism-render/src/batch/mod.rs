//! Instanced draw batches.
//!
//! A [`Batch`] groups display objects of one [`ShapeKind`] that can be drawn
//! with a single indexed, instanced call. It owns the geometry and input
//! state behind that call and rebuilds only what its [`DirtyFlags`] say is
//! stale.

pub mod instance;
pub mod shape;
pub mod topology;

use crate::display::{DisplayObject, DisplayObjectStore, ObjectId, ShapeKind, ShapeStyle};
use crate::error::RenderResult;
use crate::frame::FrameContext;
use crate::geometry::GeometryBuffer;
use crate::render_inst::{RenderInstList, SortKey};
use bitflags::bitflags;
use instance::{
    AttributeProperty, EXTRAS_BUFFER, INSTANCE_BUFFER, InstanceRecord, NORMAL_BUFFER, POSITION_BUFFER, UV_BUFFER,
    location,
};
use prism_core::profiling::{profile_function, profile_scope};
use prism_test_utils::{GpuInputLayout, GpuInputState, GpuProgram, InputStateDescriptor, RenderDevice};
use shape::{ShapeBehavior, UniformInputs};

pub use instance::INSTANCE_STRIDE;
pub use topology::Topology;

bitflags! {
    /// Stale parts of a batch.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DirtyFlags: u8 {
        const GEOMETRY = 1 << 0;
        const INPUT_STATE = 1 << 1;
        const PROGRAM = 1 << 2;
    }
}

/// Rebuild counters. Cumulative over a batch's lifetime, or per frame in
/// [`FrameStats`](crate::FrameStats).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildStats {
    pub geometry_builds: u32,
    pub input_state_builds: u32,
    pub program_builds: u32,
    pub partial_updates: u32,
}

impl RebuildStats {
    /// Work done between `earlier` and `self`.
    pub fn since(self, earlier: Self) -> Self {
        Self {
            geometry_builds: self.geometry_builds.saturating_sub(earlier.geometry_builds),
            input_state_builds: self.input_state_builds.saturating_sub(earlier.input_state_builds),
            program_builds: self.program_builds.saturating_sub(earlier.program_builds),
            partial_updates: self.partial_updates.saturating_sub(earlier.partial_updates),
        }
    }
}

impl std::ops::AddAssign for RebuildStats {
    fn add_assign(&mut self, other: Self) {
        self.geometry_builds += other.geometry_builds;
        self.input_state_builds += other.input_state_builds;
        self.program_builds += other.program_builds;
        self.partial_updates += other.partial_updates;
    }
}

#[derive(Debug)]
pub struct Batch {
    kind: ShapeKind,
    members: Vec<ObjectId>,
    dirty: DirtyFlags,
    geometry: GeometryBuffer,
    input_layout: Option<GpuInputLayout>,
    input_state: Option<GpuInputState>,
    program: Option<GpuProgram>,
    stats: RebuildStats,
}

impl Batch {
    pub fn new(kind: ShapeKind) -> Self {
        Self {
            kind,
            members: Vec::new(),
            dirty: DirtyFlags::all(),
            geometry: GeometryBuffer::new(),
            input_layout: None,
            input_state: None,
            program: None,
            stats: RebuildStats::default(),
        }
    }

    fn behavior(&self) -> &'static ShapeBehavior {
        shape::behavior(self.kind)
    }

    /// Shape of the first member the store still knows about.
    fn leading_shape(&self, store: &dyn DisplayObjectStore) -> Option<ShapeStyle> {
        self.members
            .iter()
            .find_map(|id| store.get(*id))
            .map(|object| object.shape.clone())
    }

    /// Whether `object` may join this batch.
    ///
    /// An empty batch accepts anything. Otherwise the kind must match and the
    /// kind's compatibility predicate must hold against the leading member.
    pub fn check_batchable(&self, store: &dyn DisplayObjectStore, object: &DisplayObject) -> bool {
        if self.members.is_empty() {
            return true;
        }
        if object.kind() != self.kind {
            return false;
        }
        match self.members.iter().find_map(|id| store.get(*id)) {
            Some(leading) => (self.behavior().compatible)(&leading.shape, &object.shape),
            None => true,
        }
    }

    /// Whether member `id` still belongs here after its shape changed: same
    /// kind, and compatible with the first other member still in the store.
    ///
    /// Objects the store does not know are left alone.
    pub fn still_accepts(&self, store: &dyn DisplayObjectStore, id: ObjectId) -> bool {
        let Some(object) = store.get(id) else {
            return true;
        };
        if object.kind() != self.kind {
            return false;
        }
        let other = self
            .members
            .iter()
            .filter(|member| **member != id)
            .find_map(|member| store.get(*member));
        match other {
            Some(other) => (self.behavior().compatible)(&other.shape, &object.shape),
            None => true,
        }
    }

    /// Appends `id` unless it is already a member. Returns whether it was added.
    pub fn merge(&mut self, id: ObjectId) -> bool {
        self.dirty |= DirtyFlags::GEOMETRY;
        if self.members.contains(&id) {
            return false;
        }
        self.members.push(id);
        true
    }

    /// Removes `id` if it is a member. Returns whether anything was removed.
    pub fn purge(&mut self, id: ObjectId) -> bool {
        let Some(index) = self.members.iter().position(|member| *member == id) else {
            tracing::debug!(object = id.0, kind = ?self.kind, "purge of non-member ignored");
            return false;
        };
        self.members.remove(index);
        self.dirty |= DirtyFlags::GEOMETRY;
        true
    }

    /// Forces a full instance rebuild on the next render.
    pub fn mark_geometry_dirty(&mut self) {
        self.dirty |= DirtyFlags::GEOMETRY;
    }

    /// Forces the program to be rebuilt on the next render.
    pub fn mark_program_dirty(&mut self) {
        self.dirty |= DirtyFlags::PROGRAM;
    }

    /// Brings GPU state up to date and submits this batch's draw.
    ///
    /// On error the failing step's dirty flag stays set, so the next call
    /// retries it. A batch without members releases its resources instead.
    pub fn render(
        &mut self,
        ctx: &FrameContext<'_>,
        store: &mut dyn DisplayObjectStore,
        list: &mut RenderInstList,
    ) -> RenderResult<()> {
        profile_function!();
        if self.members.is_empty() {
            self.destroy(ctx.device);
            return Ok(());
        }
        let Some(shape) = self.leading_shape(store) else {
            tracing::warn!(kind = ?self.kind, members = self.members.len(), "no batch member found in store");
            return Ok(());
        };
        let behavior = self.behavior();

        if self.dirty.contains(DirtyFlags::GEOMETRY) {
            self.rebuild_geometry(ctx.device, store, &shape)?;
        }

        let layout = ctx
            .cache
            .create_input_layout(ctx.device, &self.geometry.input_layout_descriptor())?;
        if self.input_layout.as_ref() != Some(&layout) {
            self.dirty |= DirtyFlags::INPUT_STATE;
        }
        self.input_layout = Some(layout.clone());

        if self.dirty.contains(DirtyFlags::INPUT_STATE) || self.input_state.is_none() {
            self.rebuild_input_state(ctx.device, &layout)?;
        }

        if self.dirty.contains(DirtyFlags::PROGRAM) || self.program.is_none() {
            profile_scope!("build_program");
            let defines = (behavior.defines)(&shape);
            let source = ctx.shaders.preprocess(behavior.material, &defines)?;
            self.program = Some(ctx.cache.create_program_simple(ctx.device, &source)?);
            self.dirty.remove(DirtyFlags::PROGRAM);
            self.stats.program_builds += 1;
        }

        let (Some(program), Some(state)) = (self.program.clone(), self.input_state.clone()) else {
            return Ok(());
        };
        let material = ctx.shaders.material(behavior.material)?;

        let mut inst = list.new_render_inst();
        inst.set_sort_key(SortKey::new(ctx.config.default_layer, program.id()));
        inst.set_program(program);
        inst.set_input_layout_and_state(layout, state);
        inst.set_uniform(0, 0, bytemuck::bytes_of(&ctx.scene));
        (behavior.upload_uniforms)(
            &shape,
            UniformInputs {
                defaults: &material.uniform_defaults,
                lights: ctx.lights,
            },
            &mut inst,
        );
        inst.draw_indexes_instanced(self.geometry.index_count(), self.members.len() as u32);
        list.submit_render_inst(inst);

        for id in &self.members {
            store.set_needs_redraw(*id, false);
        }
        Ok(())
    }

    /// Packs every member into a fresh geometry buffer and swaps it in.
    fn rebuild_geometry(
        &mut self,
        device: &dyn RenderDevice,
        store: &dyn DisplayObjectStore,
        shape: &ShapeStyle,
    ) -> RenderResult<()> {
        profile_function!();
        let behavior = self.behavior();
        let mut records = Vec::with_capacity(self.members.len());
        let mut extras = Vec::with_capacity(self.members.len());
        for id in &self.members {
            match store.get(*id) {
                Some(object) => {
                    records.push(InstanceRecord::pack(object));
                    extras.push((behavior.extras)(&object.shape));
                }
                None => {
                    tracing::warn!(object = id.0, "batch member missing from store, packing empty record");
                    records.push(bytemuck::Zeroable::zeroed());
                    extras.push([0.0; 4]);
                }
            }
        }
        let topology = (behavior.topology)(shape);

        let mut geometry = GeometryBuffer::with_label(format!("{:?} batch", self.kind));
        if let Err(err) = fill_geometry(&mut geometry, device, &records, &extras, &topology) {
            geometry.destroy(device);
            return Err(err);
        }
        geometry.set_instance_count(records.len() as u32);

        let mut old = std::mem::replace(&mut self.geometry, geometry);
        old.destroy(device);

        self.dirty.remove(DirtyFlags::GEOMETRY);
        self.dirty |= DirtyFlags::INPUT_STATE;
        self.stats.geometry_builds += 1;
        tracing::trace!(kind = ?self.kind, instances = records.len(), "rebuilt batch geometry");
        Ok(())
    }

    fn rebuild_input_state(&mut self, device: &dyn RenderDevice, layout: &GpuInputLayout) -> RenderResult<()> {
        let vertex_buffers = self.geometry.vertex_buffers();
        let state = device.create_input_state(&InputStateDescriptor {
            label: Some("batch input state"),
            layout,
            vertex_buffers: &vertex_buffers,
            index_buffer: self.geometry.index_buffer(),
        })?;
        if let Some(old) = self.input_state.replace(state) {
            device.destroy_input_state(&old);
        }
        self.dirty.remove(DirtyFlags::INPUT_STATE);
        self.stats.input_state_builds += 1;
        Ok(())
    }

    /// Rewrites one property of one member in place.
    ///
    /// Returns `Ok(false)` when a partial write is not possible and the
    /// batch was marked for a full rebuild instead. Either way the next
    /// render sees the same instance data a full rebuild would produce.
    pub fn update_attribute(
        &mut self,
        ctx: &FrameContext<'_>,
        store: &dyn DisplayObjectStore,
        id: ObjectId,
        property: AttributeProperty,
    ) -> RenderResult<bool> {
        let index = self.members.iter().position(|member| *member == id);
        let object = store.get(id);
        let (Some(index), Some(object)) = (index, object) else {
            self.mark_geometry_dirty();
            return Ok(false);
        };
        if !ctx.config.partial_updates || self.dirty.contains(DirtyFlags::GEOMETRY) || !self.geometry.is_live() {
            self.mark_geometry_dirty();
            return Ok(false);
        }

        let record = InstanceRecord::pack(object);
        let result = match property.record_writes(&record) {
            Some(writes) => writes.iter().try_for_each(|(location, bytes)| {
                self.geometry
                    .update_vertex_buffer(ctx.device, INSTANCE_BUFFER, *location, index, bytes)
            }),
            // mesh size changes the topology, not just the extras
            None if self.kind == ShapeKind::Mesh => {
                self.mark_geometry_dirty();
                return Ok(false);
            }
            None => {
                let extras = (self.behavior().extras)(&object.shape);
                self.geometry.update_vertex_buffer(
                    ctx.device,
                    EXTRAS_BUFFER,
                    location::EXTRAS,
                    index,
                    bytemuck::bytes_of(&extras),
                )
            }
        };

        if let Err(err) = result {
            self.mark_geometry_dirty();
            return Err(err);
        }
        self.stats.partial_updates += 1;
        Ok(true)
    }

    /// Releases geometry and input state. Safe to call repeatedly.
    pub fn destroy(&mut self, device: &dyn RenderDevice) {
        self.geometry.destroy(device);
        if let Some(state) = self.input_state.take() {
            device.destroy_input_state(&state);
        }
        self.input_layout = None;
        self.dirty |= DirtyFlags::GEOMETRY | DirtyFlags::INPUT_STATE;
    }

    pub fn kind(&self) -> ShapeKind {
        self.kind
    }

    /// Name of the registered material this batch compiles.
    pub fn material(&self) -> &'static str {
        self.behavior().material
    }

    /// Members in draw order.
    pub fn members(&self) -> &[ObjectId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.members.contains(&id)
    }

    pub fn dirty(&self) -> DirtyFlags {
        self.dirty
    }

    pub fn stats(&self) -> RebuildStats {
        self.stats
    }

    pub fn geometry(&self) -> &GeometryBuffer {
        &self.geometry
    }

    pub fn input_state(&self) -> Option<&GpuInputState> {
        self.input_state.as_ref()
    }

    pub fn program(&self) -> Option<&GpuProgram> {
        self.program.as_ref()
    }

    /// Whether any GPU buffer or input state is still held.
    pub fn holds_gpu_resources(&self) -> bool {
        self.geometry.is_live() || self.input_state.is_some()
    }
}

fn fill_geometry(
    geometry: &mut GeometryBuffer,
    device: &dyn RenderDevice,
    records: &[InstanceRecord],
    extras: &[[f32; 4]],
    topology: &Topology,
) -> RenderResult<()> {
    geometry.set_vertex_buffer(
        device,
        INSTANCE_BUFFER,
        instance::instance_layout(),
        bytemuck::cast_slice(records),
    )?;
    geometry.set_vertex_buffer(device, EXTRAS_BUFFER, instance::extras_layout(), bytemuck::cast_slice(extras))?;
    geometry.set_vertex_buffer(
        device,
        POSITION_BUFFER,
        instance::vertex_layout(location::POSITION, wgpu::VertexFormat::Float32x3),
        bytemuck::cast_slice(&topology.positions),
    )?;
    geometry.set_vertex_buffer(
        device,
        NORMAL_BUFFER,
        instance::vertex_layout(location::NORMAL, wgpu::VertexFormat::Float32x3),
        bytemuck::cast_slice(&topology.normals),
    )?;
    geometry.set_vertex_buffer(
        device,
        UV_BUFFER,
        instance::vertex_layout(location::UV, wgpu::VertexFormat::Float32x2),
        bytemuck::cast_slice(&topology.uvs),
    )?;
    geometry.set_index(device, &topology.indices)
}
