use crate::render_inst::RenderLayer;

/// Tuning knobs for the batching pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Write single changed attributes in place instead of rebuilding the
    /// whole instance buffer.
    pub partial_updates: bool,
    /// Layer batches submit their instructions on.
    pub default_layer: RenderLayer,
    /// Initial capacity of the per-frame instruction list.
    pub instruction_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            partial_updates: true,
            default_layer: RenderLayer::Opaque,
            instruction_capacity: 64,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always rebuild instance buffers on attribute changes.
    pub fn without_partial_updates(mut self) -> Self {
        self.partial_updates = false;
        self
    }

    pub fn layer(mut self, layer: RenderLayer) -> Self {
        self.default_layer = layer;
        self
    }
}
