//! Error types for the batching pipeline.

use prism_test_utils::DeviceError;
use std::fmt;

/// Errors that can occur while building or rendering batches.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderError {
    /// The device failed to create or use a resource.
    Device(DeviceError),

    /// A shape asked for a material the shader registry does not know.
    UnknownMaterial {
        /// The requested material name.
        name: String,
    },

    /// A shader source `#include`d a chunk that is not registered.
    UnknownShaderChunk {
        /// The missing chunk name.
        name: String,
        /// The material being preprocessed.
        material: String,
    },

    /// A partial vertex write is larger than its attribute or addresses an
    /// instance past the end of the buffer.
    AttributeOutOfRange {
        buffer_index: usize,
        location: u32,
        instance_index: usize,
        len: usize,
        size: u64,
    },

    /// A vertex buffer slot or attribute location was never declared.
    MissingVertexBuffer {
        buffer_index: usize,
        location: Option<u32>,
    },
}

impl RenderError {
    /// Whether the error is unrecoverable at this layer (device exhausted or lost).
    pub fn is_fatal(&self) -> bool {
        match self {
            RenderError::Device(err) => err.is_fatal(),
            _ => false,
        }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Device(err) => write!(f, "Device error: {}", err),
            RenderError::UnknownMaterial { name } => {
                write!(f, "Unknown material: {}", name)
            }
            RenderError::UnknownShaderChunk { name, material } => {
                write!(f, "Unknown shader chunk '{}' included by material '{}'", name, material)
            }
            RenderError::AttributeOutOfRange {
                buffer_index,
                location,
                instance_index,
                len,
                size,
            } => write!(
                f,
                "Write of {} bytes to location {} of instance {} does not fit the {}-byte attribute in vertex buffer {}",
                len, location, instance_index, size, buffer_index
            ),
            RenderError::MissingVertexBuffer { buffer_index, location } => match location {
                Some(location) => write!(
                    f,
                    "Vertex buffer {} has no attribute at location {}",
                    buffer_index, location
                ),
                None => write!(f, "Vertex buffer {} is not set", buffer_index),
            },
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Device(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DeviceError> for RenderError {
    fn from(err: DeviceError) -> Self {
        RenderError::Device(err)
    }
}

/// Result type alias for pipeline operations.
pub type RenderResult<T> = Result<T, RenderError>;
