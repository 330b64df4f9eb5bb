//! Per-kind batch behavior.
//!
//! Each [`ShapeKind`] maps to one static [`ShapeBehavior`] holding plain
//! function pointers, so adding a kind means adding a table entry and the
//! compiler points at every `match` that has to learn about it.

use super::topology::Topology;
use crate::display::{Color, MeshMaterial, ShapeKind, ShapeStyle};
use crate::frame::{DirectionalLight, MAX_DIRECTIONAL_LIGHTS};
use crate::render_inst::RenderInst;
use crate::shader::{MATERIAL_BASIC, MATERIAL_IMAGE, MATERIAL_SDF, ShaderDefine};
use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;

pub const SHAPE_UNIFORM_GROUP: u32 = 1;
pub const TEXTURE_GROUP: u32 = 2;

/// Values the uniform step reads besides the shape itself.
#[derive(Debug, Clone, Copy)]
pub struct UniformInputs<'a> {
    /// The material's default uniform block.
    pub defaults: &'a [f32],
    pub lights: &'a [DirectionalLight],
}

pub struct ShapeBehavior {
    pub kind: ShapeKind,
    pub material: &'static str,
    /// Whether two shapes of this kind can share one draw.
    pub compatible: fn(&ShapeStyle, &ShapeStyle) -> bool,
    pub topology: fn(&ShapeStyle) -> Topology,
    /// Per-instance `vec4` read by the shader at the extras location.
    pub extras: fn(&ShapeStyle) -> [f32; 4],
    pub defines: fn(&ShapeStyle) -> Vec<(&'static str, ShaderDefine)>,
    pub upload_uniforms: fn(&ShapeStyle, UniformInputs<'_>, &mut RenderInst),
}

impl std::fmt::Debug for ShapeBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShapeBehavior")
            .field("kind", &self.kind)
            .field("material", &self.material)
            .finish_non_exhaustive()
    }
}

pub fn behavior(kind: ShapeKind) -> &'static ShapeBehavior {
    match kind {
        ShapeKind::Circle => &CIRCLE,
        ShapeKind::Ellipse => &ELLIPSE,
        ShapeKind::Rect => &RECT,
        ShapeKind::Image => &IMAGE,
        ShapeKind::Mesh => &MESH,
    }
}

const SDF: ShapeBehavior = ShapeBehavior {
    kind: ShapeKind::Circle,
    material: MATERIAL_SDF,
    compatible: always,
    topology: quad,
    extras: sdf_extras,
    defines: sdf_defines,
    upload_uniforms: upload_defaults,
};

static CIRCLE: ShapeBehavior = SDF;

static ELLIPSE: ShapeBehavior = ShapeBehavior {
    kind: ShapeKind::Ellipse,
    ..SDF
};

static RECT: ShapeBehavior = ShapeBehavior {
    kind: ShapeKind::Rect,
    ..SDF
};

static IMAGE: ShapeBehavior = ShapeBehavior {
    kind: ShapeKind::Image,
    material: MATERIAL_IMAGE,
    compatible: same_image_source,
    topology: quad,
    extras: sdf_extras,
    defines: no_defines,
    upload_uniforms: upload_image,
};

static MESH: ShapeBehavior = ShapeBehavior {
    kind: ShapeKind::Mesh,
    material: MATERIAL_BASIC,
    compatible: same_mesh,
    topology: mesh_topology,
    extras: no_extras,
    defines: mesh_defines,
    upload_uniforms: upload_mesh,
};

fn always(_: &ShapeStyle, _: &ShapeStyle) -> bool {
    true
}

fn same_image_source(a: &ShapeStyle, b: &ShapeStyle) -> bool {
    match (a, b) {
        (ShapeStyle::Image { source: a, .. }, ShapeStyle::Image { source: b, .. }) => a == b,
        _ => false,
    }
}

fn same_mesh(a: &ShapeStyle, b: &ShapeStyle) -> bool {
    matches!((a, b), (ShapeStyle::Mesh { .. }, ShapeStyle::Mesh { .. })) && a == b
}

fn quad(_: &ShapeStyle) -> Topology {
    Topology::quad()
}

fn mesh_topology(shape: &ShapeStyle) -> Topology {
    match shape {
        ShapeStyle::Mesh {
            width,
            height,
            depth,
            segments,
            ..
        } => Topology::cuboid(*width, *height, *depth, *segments),
        _ => Topology::default(),
    }
}

/// Half extents for SDF quads, full size for images, plus a kind tag and
/// corner radius.
fn sdf_extras(shape: &ShapeStyle) -> [f32; 4] {
    match shape {
        ShapeStyle::Circle { r } => [*r, *r, 0.0, 0.0],
        ShapeStyle::Ellipse { rx, ry } => [*rx, *ry, 1.0, 0.0],
        ShapeStyle::Rect { width, height, radius } => [width / 2.0, height / 2.0, 2.0, *radius],
        ShapeStyle::Image { width, height, .. } => [*width, *height, 0.0, 0.0],
        ShapeStyle::Mesh { .. } => [0.0; 4],
    }
}

fn no_extras(_: &ShapeStyle) -> [f32; 4] {
    [0.0; 4]
}

fn sdf_defines(shape: &ShapeStyle) -> Vec<(&'static str, ShaderDefine)> {
    vec![("SHAPE_RECT", ShaderDefine::Bool(shape.kind() == ShapeKind::Rect))]
}

fn no_defines(_: &ShapeStyle) -> Vec<(&'static str, ShaderDefine)> {
    Vec::new()
}

fn mesh_defines(shape: &ShapeStyle) -> Vec<(&'static str, ShaderDefine)> {
    let lighting = match shape {
        ShapeStyle::Mesh { material, .. } => material.lighting,
        _ => false,
    };
    vec![("USE_LIGHTING", ShaderDefine::Bool(lighting))]
}

fn upload_defaults(_: &ShapeStyle, inputs: UniformInputs<'_>, inst: &mut RenderInst) {
    inst.set_uniform(SHAPE_UNIFORM_GROUP, 0, bytemuck::cast_slice(inputs.defaults));
}

fn upload_image(shape: &ShapeStyle, inputs: UniformInputs<'_>, inst: &mut RenderInst) {
    upload_defaults(shape, inputs, inst);
    if let ShapeStyle::Image { source, .. } = shape {
        inst.set_texture(TEXTURE_GROUP, 0, source.texture.clone());
    }
}

fn upload_mesh(shape: &ShapeStyle, inputs: UniformInputs<'_>, inst: &mut RenderInst) {
    let material = match shape {
        ShapeStyle::Mesh { material, .. } => *material,
        _ => MeshMaterial::default(),
    };
    let uniforms = MeshUniforms::new(material.color, inputs.lights);
    inst.set_uniform(SHAPE_UNIFORM_GROUP, 0, bytemuck::bytes_of(&uniforms));
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct LightUniform {
    pub direction_intensity: [f32; 4],
    pub color: [f32; 4],
}

/// Mirror of `MeshUniforms` in `shaders/lights.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MeshUniforms {
    pub color: [f32; 4],
    pub lights: [LightUniform; MAX_DIRECTIONAL_LIGHTS],
    pub light_count: u32,
    pub _pad: [u32; 3],
}

const_assert_eq!(std::mem::size_of::<MeshUniforms>(), 160);

impl MeshUniforms {
    /// Lights past [`MAX_DIRECTIONAL_LIGHTS`] are dropped.
    pub fn new(color: Color, lights: &[DirectionalLight]) -> Self {
        let mut uniforms = Self {
            color: color.to_array(),
            lights: [LightUniform::default(); MAX_DIRECTIONAL_LIGHTS],
            light_count: 0,
            _pad: [0; 3],
        };
        for (slot, light) in uniforms.lights.iter_mut().zip(lights) {
            let direction = light.direction.normalize_or_zero();
            *slot = LightUniform {
                direction_intensity: [direction.x, direction.y, direction.z, light.intensity],
                color: light.color.to_array(),
            };
            uniforms.light_count += 1;
        }
        uniforms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::ImageSource;
    use prism_core::math::Vec3;
    use prism_test_utils::GpuTexture;

    fn image(id: u64) -> ShapeStyle {
        ShapeStyle::Image {
            width: 32.0,
            height: 16.0,
            source: ImageSource {
                id,
                texture: GpuTexture::mock(id, 32, 16),
            },
        }
    }

    fn cube(width: f32, lighting: bool) -> ShapeStyle {
        ShapeStyle::Mesh {
            width,
            height: 1.0,
            depth: 1.0,
            segments: [1, 1, 1],
            material: MeshMaterial {
                color: Color::WHITE,
                lighting,
            },
        }
    }

    #[test]
    fn test_table_covers_every_kind() {
        for kind in [
            ShapeKind::Circle,
            ShapeKind::Ellipse,
            ShapeKind::Rect,
            ShapeKind::Image,
            ShapeKind::Mesh,
        ] {
            assert_eq!(behavior(kind).kind, kind);
        }
    }

    #[test]
    fn test_images_batch_by_source() {
        let compatible = behavior(ShapeKind::Image).compatible;
        assert!(compatible(&image(1), &image(1)));
        assert!(!compatible(&image(1), &image(2)));
    }

    #[test]
    fn test_meshes_batch_by_dimensions_and_material() {
        let compatible = behavior(ShapeKind::Mesh).compatible;
        assert!(compatible(&cube(1.0, true), &cube(1.0, true)));
        assert!(!compatible(&cube(1.0, true), &cube(2.0, true)));
        assert!(!compatible(&cube(1.0, true), &cube(1.0, false)));
    }

    #[test]
    fn test_extras_per_kind() {
        let extras = behavior(ShapeKind::Rect).extras;
        assert_eq!(
            extras(&ShapeStyle::Rect {
                width: 10.0,
                height: 4.0,
                radius: 1.0
            }),
            [5.0, 2.0, 2.0, 1.0]
        );
        assert_eq!(extras(&ShapeStyle::Circle { r: 3.0 }), [3.0, 3.0, 0.0, 0.0]);
        assert_eq!((behavior(ShapeKind::Image).extras)(&image(1)), [32.0, 16.0, 0.0, 0.0]);
    }

    #[test]
    fn test_rect_and_circle_differ_only_in_define() {
        let circle = (behavior(ShapeKind::Circle).defines)(&ShapeStyle::Circle { r: 1.0 });
        let rect = (behavior(ShapeKind::Rect).defines)(&ShapeStyle::Rect {
            width: 1.0,
            height: 1.0,
            radius: 0.0,
        });
        assert_eq!(circle, vec![("SHAPE_RECT", ShaderDefine::Bool(false))]);
        assert_eq!(rect, vec![("SHAPE_RECT", ShaderDefine::Bool(true))]);
    }

    #[test]
    fn test_image_binds_texture() {
        let mut inst = RenderInst::default();
        (behavior(ShapeKind::Image).upload_uniforms)(
            &image(7),
            UniformInputs {
                defaults: &[1.0, 1.0, 1.0, 1.0],
                lights: &[],
            },
            &mut inst,
        );
        assert_eq!(inst.textures().len(), 1);
        assert_eq!(inst.textures()[0].texture.id(), 7);
        assert_eq!(inst.uniform(SHAPE_UNIFORM_GROUP, 0).map(<[u8]>::len), Some(16));
    }

    #[test]
    fn test_mesh_uniforms_clamp_light_count() {
        let lights = vec![
            DirectionalLight {
                direction: Vec3::new(0.0, -2.0, 0.0),
                ..DirectionalLight::default()
            };
            6
        ];
        let uniforms = MeshUniforms::new(Color::BLACK, &lights);
        assert_eq!(uniforms.light_count, 4);
        assert_eq!(uniforms.lights[0].direction_intensity, [0.0, -1.0, 0.0, 1.0]);
        assert_eq!(uniforms.color, [0.0, 0.0, 0.0, 1.0]);
    }
}
