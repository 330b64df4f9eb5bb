//! Per-frame draw instructions and their sort keys.
//!
//! Batches fill a [`RenderInst`] and submit it to the [`RenderInstList`].
//! At flush time the list is stably sorted by [`SortKey`], so draws of the
//! same program on the same layer end up adjacent while equal keys keep
//! their submission order.

use crate::error::RenderResult;
use prism_core::profiling::profile_function;
use prism_test_utils::{
    DrawCommand, GpuInputLayout, GpuInputState, GpuProgram, GpuTexture, RenderDevice, RenderTarget,
    TextureBinding, UniformBinding,
};

/// Coarse draw ordering. Lower layers draw first.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum RenderLayer {
    Background = 0x00,
    AlphaTest = 0x10,
    #[default]
    Opaque = 0x20,
    Translucent = 0x80,
}

/// `(layer << 32) | program_id`, compared as a plain integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SortKey(u64);

impl SortKey {
    pub const fn new(layer: RenderLayer, program_id: u32) -> Self {
        Self(((layer as u64) << 32) | program_id as u64)
    }

    pub const fn opaque(program_id: u32) -> Self {
        Self::new(RenderLayer::Opaque, program_id)
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub const fn layer(self) -> u8 {
        (self.0 >> 32) as u8
    }

    pub const fn program_id(self) -> u32 {
        self.0 as u32
    }
}

/// One draw submission.
#[derive(Debug, Clone, Default)]
pub struct RenderInst {
    program: Option<GpuProgram>,
    input_layout: Option<GpuInputLayout>,
    input_state: Option<GpuInputState>,
    uniforms: Vec<UniformBinding>,
    textures: Vec<TextureBinding>,
    index_count: u32,
    instance_count: u32,
    sort_key: SortKey,
}

impl RenderInst {
    pub fn set_program(&mut self, program: GpuProgram) {
        self.program = Some(program);
    }

    pub fn set_input_layout_and_state(&mut self, layout: GpuInputLayout, state: GpuInputState) {
        self.input_layout = Some(layout);
        self.input_state = Some(state);
    }

    /// Binds `data` as the uniform buffer at `group`/`binding`, replacing any
    /// earlier binding at the same slot.
    pub fn set_uniform(&mut self, group: u32, binding: u32, data: &[u8]) {
        self.uniforms.retain(|u| !(u.group == group && u.binding == binding));
        self.uniforms.push(UniformBinding {
            group,
            binding,
            data: data.to_vec(),
        });
    }

    pub fn set_texture(&mut self, group: u32, binding: u32, texture: GpuTexture) {
        self.textures.retain(|t| !(t.group == group && t.binding == binding));
        self.textures.push(TextureBinding {
            group,
            binding,
            texture,
        });
    }

    pub fn draw_indexes_instanced(&mut self, index_count: u32, instance_count: u32) {
        self.index_count = index_count;
        self.instance_count = instance_count;
    }

    pub fn set_sort_key(&mut self, key: SortKey) {
        self.sort_key = key;
    }

    pub fn sort_key(&self) -> SortKey {
        self.sort_key
    }

    pub fn program(&self) -> Option<&GpuProgram> {
        self.program.as_ref()
    }

    pub fn input_layout(&self) -> Option<&GpuInputLayout> {
        self.input_layout.as_ref()
    }

    pub fn input_state(&self) -> Option<&GpuInputState> {
        self.input_state.as_ref()
    }

    pub fn uniforms(&self) -> &[UniformBinding] {
        &self.uniforms
    }

    pub fn uniform(&self, group: u32, binding: u32) -> Option<&[u8]> {
        self.uniforms
            .iter()
            .find(|u| u.group == group && u.binding == binding)
            .map(|u| u.data.as_slice())
    }

    pub fn textures(&self) -> &[TextureBinding] {
        &self.textures
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn instance_count(&self) -> u32 {
        self.instance_count
    }

    fn to_draw_command(&self) -> Option<DrawCommand> {
        Some(DrawCommand {
            program: self.program.clone()?,
            input_state: self.input_state.clone()?,
            uniforms: self.uniforms.clone(),
            textures: self.textures.clone(),
            index_count: self.index_count,
            instance_count: self.instance_count,
        })
    }
}

/// Accumulates the frame's instructions until [`flush`](Self::flush).
///
/// Submitted instructions are owned by the list and only ever reordered.
#[derive(Debug, Default)]
pub struct RenderInstList {
    insts: Vec<RenderInst>,
}

impl RenderInstList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            insts: Vec::with_capacity(capacity),
        }
    }

    /// Returns a fresh instruction to fill before submitting.
    pub fn new_render_inst(&self) -> RenderInst {
        RenderInst::default()
    }

    pub fn submit_render_inst(&mut self, inst: RenderInst) {
        self.insts.push(inst);
    }

    pub fn len(&self) -> usize {
        self.insts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }

    /// Instructions in their current order.
    pub fn iter(&self) -> impl Iterator<Item = &RenderInst> {
        self.insts.iter()
    }

    /// Stable ascending sort by key.
    pub fn sort(&mut self) {
        self.insts.sort_by_key(|inst| inst.sort_key);
    }

    /// Drops every instruction without drawing.
    pub fn clear(&mut self) {
        self.insts.clear();
    }

    /// Sorts, executes every instruction in one submission and empties the
    /// list. Returns the number of draws issued.
    ///
    /// Instructions missing a program or input state are skipped.
    pub fn flush(&mut self, device: &dyn RenderDevice, target: &RenderTarget) -> RenderResult<usize> {
        profile_function!();
        self.sort();
        let commands: Vec<DrawCommand> = self
            .insts
            .drain(..)
            .filter_map(|inst| {
                let command = inst.to_draw_command();
                if command.is_none() {
                    tracing::warn!(
                        sort_key = inst.sort_key.raw(),
                        "skipping render instruction without program or input state"
                    );
                }
                command
            })
            .collect();
        device.execute(target, &commands)?;
        tracing::trace!(draws = commands.len(), "flushed render instructions");
        Ok(commands.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inst_with_key(key: u64, marker: u32) -> RenderInst {
        let mut inst = RenderInst::default();
        inst.set_sort_key(SortKey::from_raw(key));
        // index count doubles as an identity marker
        inst.draw_indexes_instanced(marker, 1);
        inst
    }

    #[test]
    fn test_sort_key_orders_by_layer_then_program() {
        let a = SortKey::new(RenderLayer::Opaque, 7);
        let b = SortKey::new(RenderLayer::Opaque, 3);
        let c = SortKey::new(RenderLayer::Background, 99);
        let d = SortKey::new(RenderLayer::Translucent, 0);

        let mut keys = vec![a, b, c, d];
        keys.sort();
        assert_eq!(keys, vec![c, b, a, d]);
        assert_eq!(a.layer(), 0x20);
        assert_eq!(a.program_id(), 7);
        assert_eq!(SortKey::opaque(7), a);
    }

    #[test]
    fn test_sort_is_stable() {
        let mut list = RenderInstList::new();
        for (i, key) in [2u64, 1, 2, 1].into_iter().enumerate() {
            list.submit_render_inst(inst_with_key(key, i as u32));
        }
        list.sort();
        let order: Vec<u32> = list.iter().map(|inst| inst.index_count()).collect();
        assert_eq!(order, vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_set_uniform_replaces_same_slot() {
        let mut inst = RenderInst::default();
        inst.set_uniform(1, 0, &[1, 2, 3, 4]);
        inst.set_uniform(1, 0, &[5, 6, 7, 8]);
        inst.set_uniform(0, 0, &[0; 4]);
        assert_eq!(inst.uniforms().len(), 2);
        assert_eq!(inst.uniform(1, 0), Some(&[5u8, 6, 7, 8][..]));
    }
}
