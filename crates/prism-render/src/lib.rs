//! Prism Render
//!
//! The batching half of the Prism scene renderer: display objects with
//! resolved style go in, sorted instanced draws come out.
//!
//! - [`BatchManager`] places each object in a [`Batch`] of compatible shapes
//! - each batch packs one [`InstanceRecord`] per member and rebuilds only
//!   what its [`DirtyFlags`] mark as stale
//! - programs and input layouts are shared through [`DeviceResourceCache`]
//! - draws are collected in a [`RenderInstList`], stably sorted by
//!   [`SortKey`] and flushed to a [`RenderDevice`](prism_test_utils::RenderDevice)
//!
//! [`BatchRenderer`] drives a whole frame. [`GraphicsContext`] is the wgpu
//! implementation of the device trait; tests use the mock device from
//! `prism-test-utils`.

pub mod batch;
pub mod config;
mod context;
mod context_impl;
pub mod display;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod manager;
pub mod render_inst;
pub mod renderer;
pub mod resource_cache;
pub mod shader;

pub use batch::instance::{AttributeProperty, INSTANCE_STRIDE, InstanceRecord};
pub use batch::topology::Topology;
pub use batch::{Batch, DirtyFlags, RebuildStats};
pub use config::PipelineConfig;
pub use context::{GraphicsContext, GraphicsContextDescriptor, GraphicsContextError};
pub use display::{
    Color, DisplayObject, DisplayObjectStore, ImageSource, MeshMaterial, ObjectId, ObjectTable, Paint, ResolvedStyle,
    ShapeKind, ShapeStyle,
};
pub use error::{RenderError, RenderResult};
pub use frame::{DirectionalLight, FrameContext, SceneUniforms};
pub use geometry::GeometryBuffer;
pub use manager::{BatchId, BatchManager};
pub use render_inst::{RenderInst, RenderInstList, RenderLayer, SortKey};
pub use renderer::{BatchRenderer, FrameStats};
pub use resource_cache::DeviceResourceCache;
pub use shader::{Material, PreprocessedProgram, ShaderDefine, ShaderRegistry};
