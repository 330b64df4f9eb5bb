//! Batch membership and the per-frame render pass.

use crate::batch::instance::AttributeProperty;
use crate::batch::{Batch, RebuildStats};
use crate::display::{DisplayObjectStore, ObjectId};
use crate::error::{RenderError, RenderResult};
use crate::frame::FrameContext;
use crate::render_inst::RenderInstList;
use prism_core::alloc::HashMap;
use prism_core::alloc::sparse_set::{IndexSlot, SparseSet};
use prism_core::profiling::profile_function;
use prism_test_utils::RenderDevice;

/// Handle to a live batch. Stale handles never resolve to a newer batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchId(IndexSlot);

/// Decides which batch each object belongs to and renders batches in
/// creation order.
///
/// Every tracked object sits in exactly one batch, and a batch is dropped
/// together with its GPU resources as soon as its last member leaves.
#[derive(Debug, Default)]
pub struct BatchManager {
    batches: SparseSet<Batch>,
    order: Vec<BatchId>,
    owners: HashMap<ObjectId, BatchId>,
    /// Rebuild work since the last [`take_rebuilds`](Self::take_rebuilds).
    rebuilds: RebuildStats,
}

impl BatchManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Places `id` in the first compatible batch, creating one if needed.
    ///
    /// Returns `None` when the store does not know the object.
    pub fn insert(&mut self, store: &dyn DisplayObjectStore, id: ObjectId) -> Option<BatchId> {
        if let Some(existing) = self.owners.get(&id) {
            return Some(*existing);
        }
        let Some(object) = store.get(id) else {
            tracing::warn!(object = id.0, "cannot batch an object missing from the store");
            return None;
        };

        let found = self.order.iter().copied().find(|batch_id| {
            self.batches
                .get(batch_id.0)
                .is_some_and(|batch| batch.check_batchable(store, object))
        });
        let batch_id = match found {
            Some(batch_id) => batch_id,
            None => {
                let batch_id = BatchId(self.batches.push(Batch::new(object.kind())));
                self.order.push(batch_id);
                tracing::debug!(kind = ?object.kind(), batches = self.order.len(), "created batch");
                batch_id
            }
        };

        if let Some(batch) = self.batches.get_mut(batch_id.0) {
            batch.merge(id);
        }
        self.owners.insert(id, batch_id);
        Some(batch_id)
    }

    /// Drops `id` from its batch, destroying the batch if it is now empty.
    pub fn remove(&mut self, device: &dyn RenderDevice, id: ObjectId) -> bool {
        let Some(batch_id) = self.owners.remove(&id) else {
            tracing::debug!(object = id.0, "remove of untracked object ignored");
            return false;
        };
        let Some(batch) = self.batches.get_mut(batch_id.0) else {
            return false;
        };
        let removed = batch.purge(id);
        if batch.is_empty() {
            batch.destroy(device);
            self.batches.remove(batch_id.0);
            self.order.retain(|live| *live != batch_id);
            tracing::debug!(batches = self.order.len(), "dropped empty batch");
        }
        removed
    }

    /// Re-runs placement after a change that may affect compatibility,
    /// such as a new image source or a different shape kind.
    pub fn on_shape_changed(
        &mut self,
        device: &dyn RenderDevice,
        store: &dyn DisplayObjectStore,
        id: ObjectId,
    ) -> Option<BatchId> {
        self.remove(device, id);
        self.insert(store, id)
    }

    /// Schedules a full instance rebuild for the batch holding `id`.
    pub fn mark_dirty(&mut self, id: ObjectId) {
        if let Some(batch) = self.batch_of(id).and_then(|batch_id| self.batches.get_mut(batch_id.0)) {
            batch.mark_geometry_dirty();
        }
    }

    /// Forces every batch compiled from `material` to rebuild its program.
    /// Returns how many batches were marked.
    pub fn mark_material_dirty(&mut self, material: &str) -> usize {
        let mut marked = 0;
        for batch_id in &self.order {
            if let Some(batch) = self.batches.get_mut(batch_id.0)
                && batch.material() == material
            {
                batch.mark_program_dirty();
                marked += 1;
            }
        }
        tracing::debug!(material, batches = marked, "marked programs dirty");
        marked
    }

    /// Forces every batch to rebuild its program.
    pub fn mark_all_programs_dirty(&mut self) {
        for batch_id in &self.order {
            if let Some(batch) = self.batches.get_mut(batch_id.0) {
                batch.mark_program_dirty();
            }
        }
    }

    /// Patches one property of `id` in place when possible. Returns whether
    /// a partial write happened.
    ///
    /// A shape change that makes `id` incompatible with its batch re-runs
    /// placement instead, which rebuilds both affected batches next frame.
    pub fn update_attribute(
        &mut self,
        ctx: &FrameContext<'_>,
        store: &dyn DisplayObjectStore,
        id: ObjectId,
        property: AttributeProperty,
    ) -> RenderResult<bool> {
        let Some(batch_id) = self.batch_of(id) else {
            return Ok(false);
        };
        if property == AttributeProperty::ShapeGeometry
            && self
                .batches
                .get(batch_id.0)
                .is_some_and(|batch| !batch.still_accepts(store, id))
        {
            tracing::debug!(object = id.0, "shape change left its batch, re-placing");
            self.on_shape_changed(ctx.device, store, id);
            return Ok(false);
        }

        let Some(batch) = self.batches.get_mut(batch_id.0) else {
            return Ok(false);
        };
        let before = batch.stats();
        let result = batch.update_attribute(ctx, store, id, property);
        self.rebuilds += batch.stats().since(before);
        result
    }

    /// Renders every batch in creation order.
    ///
    /// A failing batch does not stop the pass; the first error is returned
    /// after all batches had their turn.
    pub fn render(
        &mut self,
        ctx: &FrameContext<'_>,
        store: &mut dyn DisplayObjectStore,
        list: &mut RenderInstList,
    ) -> RenderResult<()> {
        profile_function!();
        let mut first_error: Option<RenderError> = None;
        for batch_id in &self.order {
            let Some(batch) = self.batches.get_mut(batch_id.0) else {
                continue;
            };
            let before = batch.stats();
            let result = batch.render(ctx, store, list);
            self.rebuilds += batch.stats().since(before);
            if let Err(err) = result {
                tracing::error!(kind = ?batch.kind(), error = %err, fatal = err.is_fatal(), "batch failed to render");
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Releases every batch and forgets all objects.
    pub fn destroy(&mut self, device: &dyn RenderDevice) {
        for mut batch in self.batches.drain() {
            batch.destroy(device);
        }
        self.order.clear();
        self.owners.clear();
        self.rebuilds = RebuildStats::default();
    }

    pub fn batch(&self, id: BatchId) -> Option<&Batch> {
        self.batches.get(id.0)
    }

    pub fn batch_of(&self, object: ObjectId) -> Option<BatchId> {
        self.owners.get(&object).copied()
    }

    /// Live batches in creation order.
    pub fn batches(&self) -> impl Iterator<Item = (BatchId, &Batch)> {
        self.order
            .iter()
            .filter_map(|id| self.batches.get(id.0).map(|batch| (*id, batch)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn object_count(&self) -> usize {
        self.owners.len()
    }

    /// Rebuild work done since the previous call, including work by batches
    /// that have since been dropped.
    pub fn take_rebuilds(&mut self) -> RebuildStats {
        std::mem::take(&mut self.rebuilds)
    }

    /// Rebuild counters summed over live batches.
    pub fn stats(&self) -> RebuildStats {
        let mut total = RebuildStats::default();
        for (_, batch) in self.batches() {
            total += batch.stats();
        }
        total
    }
}
