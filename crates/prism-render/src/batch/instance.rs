//! Packed per-instance records.
//!
//! Every batch draws from the same five vertex buffers:
//!
//! | Buffer | Step     | Contents                                  |
//! |--------|----------|-------------------------------------------|
//! | 0      | instance | [`InstanceRecord`], 136 bytes              |
//! | 1      | instance | shape extras, one `vec4`                  |
//! | 2      | vertex   | positions (`vec3`)                        |
//! | 3      | vertex   | normals (`vec3`)                          |
//! | 4      | vertex   | uvs (`vec2`)                              |
//!
//! Attribute locations match `shaders/instance.wgsl`.

use crate::display::DisplayObject;
use bytemuck::{Pod, Zeroable};
use prism_test_utils::{VertexAttributeDescriptor, VertexBufferLayoutDescriptor};
use static_assertions::const_assert_eq;

pub const INSTANCE_BUFFER: usize = 0;
pub const EXTRAS_BUFFER: usize = 1;
pub const POSITION_BUFFER: usize = 2;
pub const NORMAL_BUFFER: usize = 3;
pub const UV_BUFFER: usize = 4;

/// Shader attribute locations.
pub mod location {
    pub const MODEL: u32 = 0;
    pub const FILL: u32 = 4;
    pub const STROKE: u32 = 5;
    pub const STYLE: u32 = 6;
    pub const PICKING: u32 = 7;
    pub const ANCHOR: u32 = 8;
    pub const EXTRAS: u32 = 9;
    pub const POSITION: u32 = 10;
    pub const NORMAL: u32 = 11;
    pub const UV: u32 = 12;
}

/// One member's slice of the instance buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceRecord {
    /// Column-major world transform.
    pub model: [[f32; 4]; 4],
    pub fill: [f32; 4],
    pub stroke: [f32; 4],
    /// opacity, fill opacity, stroke opacity, line width
    pub style: [f32; 4],
    /// picking rgb as 0..255 floats, z index
    pub picking: [f32; 4],
    pub anchor: [f32; 2],
}

pub const INSTANCE_STRIDE: u64 = std::mem::size_of::<InstanceRecord>() as u64;
pub const EXTRAS_STRIDE: u64 = 16;

const_assert_eq!(std::mem::size_of::<InstanceRecord>(), 136);

impl InstanceRecord {
    pub fn pack(object: &DisplayObject) -> Self {
        let style = &object.style;
        let [r, g, b] = object.picking_color;
        Self {
            model: object.world_transform.to_cols_array_2d(),
            fill: style.fill.packed(),
            stroke: style.stroke.packed(),
            style: [style.opacity, style.fill_opacity, style.stroke_opacity, style.line_width],
            picking: [r as f32, g as f32, b as f32, style.z_index],
            anchor: style.anchor,
        }
    }

    /// Decodes one record from exactly [`INSTANCE_STRIDE`] bytes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        bytemuck::try_pod_read_unaligned(bytes).ok()
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

fn float4(location: u32, offset: u64) -> VertexAttributeDescriptor {
    VertexAttributeDescriptor {
        location,
        format: wgpu::VertexFormat::Float32x4,
        offset,
    }
}

pub fn instance_layout() -> VertexBufferLayoutDescriptor {
    let mut attributes: Vec<_> = (0..4).map(|column| float4(location::MODEL + column, column as u64 * 16)).collect();
    attributes.extend([
        float4(location::FILL, 64),
        float4(location::STROKE, 80),
        float4(location::STYLE, 96),
        float4(location::PICKING, 112),
        VertexAttributeDescriptor {
            location: location::ANCHOR,
            format: wgpu::VertexFormat::Float32x2,
            offset: 128,
        },
    ]);
    VertexBufferLayoutDescriptor {
        stride: INSTANCE_STRIDE,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes,
    }
}

pub fn extras_layout() -> VertexBufferLayoutDescriptor {
    VertexBufferLayoutDescriptor {
        stride: EXTRAS_STRIDE,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: vec![float4(location::EXTRAS, 0)],
    }
}

pub fn vertex_layout(location: u32, format: wgpu::VertexFormat) -> VertexBufferLayoutDescriptor {
    VertexBufferLayoutDescriptor {
        stride: format.size(),
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: vec![VertexAttributeDescriptor {
            location,
            format,
            offset: 0,
        }],
    }
}

/// A style property that can be patched in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeProperty {
    Fill,
    Stroke,
    Opacity,
    FillOpacity,
    StrokeOpacity,
    LineWidth,
    ZIndex,
    Transform,
    Anchor,
    /// Any size or source property of a shape (`r`, `width`, `src`, ...).
    /// Changes that break batch compatibility move the object to another
    /// batch.
    ShapeGeometry,
}

impl AttributeProperty {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "fill" => Self::Fill,
            "stroke" => Self::Stroke,
            "opacity" => Self::Opacity,
            "fillOpacity" => Self::FillOpacity,
            "strokeOpacity" => Self::StrokeOpacity,
            "lineWidth" => Self::LineWidth,
            "zIndex" => Self::ZIndex,
            "transform" | "modelMatrix" => Self::Transform,
            "anchor" => Self::Anchor,
            "r" | "rx" | "ry" | "width" | "height" | "depth" | "radius" | "src" => Self::ShapeGeometry,
            _ => return None,
        })
    }

    /// Attribute writes that patch this property into the instance buffer,
    /// or `None` for properties stored outside the record.
    ///
    /// Each write covers exactly one attribute. The style-pack properties
    /// share one `vec4`, so each of them rewrites the whole pack, and the
    /// model matrix goes out as its four columns.
    pub fn record_writes(self, record: &InstanceRecord) -> Option<Vec<(u32, Vec<u8>)>> {
        let single = |location: u32, bytes: &[u8]| Some(vec![(location, bytes.to_vec())]);
        match self {
            Self::Fill => single(location::FILL, bytemuck::bytes_of(&record.fill)),
            Self::Stroke => single(location::STROKE, bytemuck::bytes_of(&record.stroke)),
            Self::Opacity | Self::FillOpacity | Self::StrokeOpacity | Self::LineWidth => {
                single(location::STYLE, bytemuck::bytes_of(&record.style))
            }
            Self::ZIndex => single(location::PICKING, bytemuck::bytes_of(&record.picking)),
            Self::Transform => Some(
                record
                    .model
                    .iter()
                    .zip(location::MODEL..)
                    .map(|(column, location)| (location, bytemuck::bytes_of(column).to_vec()))
                    .collect(),
            ),
            Self::Anchor => single(location::ANCHOR, bytemuck::bytes_of(&record.anchor)),
            Self::ShapeGeometry => None,
        }
    }
}
