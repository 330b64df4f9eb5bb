//! Math types used across the renderer.
//!
//! CPU-side math uses the SIMD-accelerated [`glam`] types. Column-major
//! [`Mat4`] matches the layout the instance buffers and WGSL shaders expect,
//! so `Mat4::to_cols_array` can be written straight into GPU memory.
//!
//! ```
//! use prism_core::math::{Mat4, Vec3};
//!
//! let world = Mat4::from_translation(Vec3::new(10.0, 20.0, 0.0));
//! let cols = world.to_cols_array();
//! assert_eq!(cols[12], 10.0);
//! ```
//!
//! [`glam`]: https://docs.rs/glam

pub use glam::{Mat3, Mat4, Quat, UVec2, Vec2, Vec3, Vec4};

/// Number of `f32` values in a 4x4 matrix.
pub const MAT4_FLOATS: usize = 16;

/// Returns the matrix as a column-major array of sixteen floats.
#[inline]
pub fn mat4_to_floats(m: &Mat4) -> [f32; MAT4_FLOATS] {
    m.to_cols_array()
}

/// Builds a matrix from a column-major array of sixteen floats.
#[inline]
pub fn mat4_from_floats(floats: &[f32; MAT4_FLOATS]) -> Mat4 {
    Mat4::from_cols_array(floats)
}
