//! The display-object surface the pipeline reads.
//!
//! Display objects belong to the scene graph. The pipeline refers to them by
//! [`ObjectId`] and reads them through [`DisplayObjectStore`] for the length
//! of a call. [`ObjectTable`] is a plain map-backed store for embedders
//! without a scene graph of their own.

use prism_core::math::Mat4;
use prism_core::alloc::HashMap;
use prism_test_utils::GpuTexture;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(pub u64);

/// Linear RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);
    pub const BLACK: Color = Color::rgba(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Color = Color::rgba(1.0, 1.0, 1.0, 1.0);

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// A resolved fill or stroke.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Paint {
    Constant(Color),
    LinearGradient { angle: f32, stops: Vec<(f32, Color)> },
    Pattern { image: u64 },
    #[default]
    Unset,
}

impl Paint {
    /// Per-instance color for this paint. Only constant colors survive
    /// packing; everything else draws as transparent.
    pub fn packed(&self) -> [f32; 4] {
        match self {
            Paint::Constant(color) => color.to_array(),
            Paint::LinearGradient { .. } | Paint::Pattern { .. } | Paint::Unset => Color::TRANSPARENT.to_array(),
        }
    }
}

impl From<Color> for Paint {
    fn from(color: Color) -> Self {
        Paint::Constant(color)
    }
}

/// Style values after the cascade has run.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStyle {
    pub fill: Paint,
    pub stroke: Paint,
    pub opacity: f32,
    pub fill_opacity: f32,
    pub stroke_opacity: f32,
    pub line_width: f32,
    pub anchor: [f32; 2],
    pub z_index: f32,
}

impl Default for ResolvedStyle {
    fn default() -> Self {
        Self {
            fill: Paint::Unset,
            stroke: Paint::Unset,
            opacity: 1.0,
            fill_opacity: 1.0,
            stroke_opacity: 1.0,
            line_width: 0.0,
            anchor: [0.0, 0.0],
            z_index: 0.0,
        }
    }
}

/// An uploaded image. Sources compare by id.
#[derive(Debug, Clone)]
pub struct ImageSource {
    pub id: u64,
    pub texture: GpuTexture,
}

impl PartialEq for ImageSource {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// Surface description for meshes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshMaterial {
    pub color: Color,
    /// Shade with the frame's directional lights.
    pub lighting: bool,
}

impl Default for MeshMaterial {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            lighting: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Circle,
    Ellipse,
    Rect,
    Image,
    Mesh,
}

/// Geometry-relevant style, one record per shape kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeStyle {
    Circle {
        r: f32,
    },
    Ellipse {
        rx: f32,
        ry: f32,
    },
    Rect {
        width: f32,
        height: f32,
        radius: f32,
    },
    Image {
        width: f32,
        height: f32,
        source: ImageSource,
    },
    /// A segmented box.
    Mesh {
        width: f32,
        height: f32,
        depth: f32,
        segments: [u32; 3],
        material: MeshMaterial,
    },
}

impl ShapeStyle {
    pub fn kind(&self) -> ShapeKind {
        match self {
            ShapeStyle::Circle { .. } => ShapeKind::Circle,
            ShapeStyle::Ellipse { .. } => ShapeKind::Ellipse,
            ShapeStyle::Rect { .. } => ShapeKind::Rect,
            ShapeStyle::Image { .. } => ShapeKind::Image,
            ShapeStyle::Mesh { .. } => ShapeKind::Mesh,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DisplayObject {
    pub id: ObjectId,
    pub shape: ShapeStyle,
    pub style: ResolvedStyle,
    pub world_transform: Mat4,
    /// Stable per-object color written to the picking attachment.
    pub picking_color: [u8; 3],
    pub needs_redraw: bool,
}

impl DisplayObject {
    pub fn new(id: ObjectId, shape: ShapeStyle) -> Self {
        Self {
            id,
            shape,
            style: ResolvedStyle::default(),
            world_transform: Mat4::IDENTITY,
            picking_color: encode_picking_color(id),
            needs_redraw: true,
        }
    }

    pub fn with_style(mut self, style: ResolvedStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.world_transform = transform;
        self
    }

    pub fn kind(&self) -> ShapeKind {
        self.shape.kind()
    }
}

/// Low 24 bits of the id as an RGB triple.
pub fn encode_picking_color(id: ObjectId) -> [u8; 3] {
    let v = id.0 as u32;
    [(v & 0xff) as u8, ((v >> 8) & 0xff) as u8, ((v >> 16) & 0xff) as u8]
}

/// Read access to display objects plus their redraw flag.
pub trait DisplayObjectStore {
    fn get(&self, id: ObjectId) -> Option<&DisplayObject>;

    fn set_needs_redraw(&mut self, id: ObjectId, needs_redraw: bool);
}

/// Map-backed [`DisplayObjectStore`].
#[derive(Debug, Default)]
pub struct ObjectTable {
    objects: HashMap<ObjectId, DisplayObject>,
}

impl ObjectTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an object, returning its id.
    pub fn insert(&mut self, object: DisplayObject) -> ObjectId {
        let id = object.id;
        self.objects.insert(id, object);
        id
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut DisplayObject> {
        self.objects.get_mut(&id)
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<DisplayObject> {
        self.objects.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl DisplayObjectStore for ObjectTable {
    fn get(&self, id: ObjectId) -> Option<&DisplayObject> {
        self.objects.get(&id)
    }

    fn set_needs_redraw(&mut self, id: ObjectId, needs_redraw: bool) {
        if let Some(object) = self.objects.get_mut(&id) {
            object.needs_redraw = needs_redraw;
        }
    }
}
