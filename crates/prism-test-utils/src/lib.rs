//! Device contract and test utilities for the Prism renderer.
//!
//! - [`RenderDevice`]: the trait the batching pipeline renders through
//! - GPU handle types (`GpuBuffer`, `GpuProgram`, ...), real or mock
//! - `MockRenderDevice`: records calls and keeps buffer contents
//!   (requires the `mock` feature)
//!
//! # Example
//!
//! ```rust
//! # #[cfg(feature = "mock")]
//! # {
//! use prism_test_utils::{BufferDescriptor, MockRenderDevice, RenderDevice};
//!
//! let mock = MockRenderDevice::new();
//! let buffer = mock
//!     .create_buffer(&BufferDescriptor {
//!         label: Some("test_buffer"),
//!         usage: wgpu::BufferUsages::VERTEX,
//!         contents: &[0u8; 1024],
//!     })
//!     .unwrap();
//!
//! assert_eq!(mock.count_buffer_creates(), 1);
//! assert!(buffer.is_mock());
//! # }
//! ```
//!
//! Handles are owned and reference counted, so no lifetimes leak into the
//! pipeline. The mock uses `parking_lot::Mutex` for interior mutability so
//! it can satisfy the `Send + Sync` bound on [`RenderDevice`].

pub mod gpu_types;
#[cfg(feature = "mock")]
pub mod mock_device;
pub mod render_device;

pub use gpu_types::*;
#[cfg(feature = "mock")]
pub use mock_device::*;
pub use render_device::*;
