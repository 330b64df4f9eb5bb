//! Offscreen Batches
//!
//! Renders a few hundred shapes into an offscreen texture and logs per-frame
//! batching statistics. Circles drift each frame through partial attribute
//! updates, so only the first frame rebuilds geometry.
//!
//! Run with:
//!   cargo run -p prism-render --example offscreen_batches
//!
//! With puffin scopes served to puffin_viewer on 127.0.0.1:8585:
//!   cargo run -p prism-render --example offscreen_batches --features profiling

use prism_core::config::{Config, ProfilingMode};
use prism_core::math::{Mat4, Vec3};
use prism_render::{
    AttributeProperty, BatchRenderer, Color, DirectionalLight, DisplayObject, MeshMaterial, ObjectId, ObjectTable,
    Paint, PipelineConfig, ResolvedStyle, SceneUniforms, ShapeStyle,
};
use prism_test_utils::RenderTarget;

const SIZE: u32 = 512;
const FRAMES: u32 = 60;

fn main() {
    Config {
        profiling: if cfg!(feature = "profiling") {
            ProfilingMode::Server {
                addr: "127.0.0.1:8585".to_string(),
            }
        } else {
            ProfilingMode::Off
        },
        log_filter: None,
    }
    .apply();

    let ctx = prism_render::GraphicsContext::new_owned_sync().expect("Failed to create graphics context");
    tracing::info!(adapter = %ctx.info().name, "rendering offscreen");

    let format = wgpu::TextureFormat::Rgba8UnormSrgb;
    let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("offscreen_batches"),
        size: wgpu::Extent3d {
            width: SIZE,
            height: SIZE,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let target = RenderTarget::from_wgpu(texture.create_view(&Default::default()), format)
        .with_clear_color(Some(wgpu::Color::BLACK));

    let mut objects = ObjectTable::new();
    let mut renderer = BatchRenderer::new(PipelineConfig::default());
    renderer.set_scene(SceneUniforms::orthographic(SIZE as f32, SIZE as f32, 1.0));
    renderer.set_lights(vec![DirectionalLight::default()]);

    let mut circles = Vec::new();
    for i in 0..256u64 {
        let x = (i % 16) as f32 * 32.0 + 16.0;
        let y = (i / 16) as f32 * 32.0 + 16.0;
        let shape = if i % 4 == 0 {
            ShapeStyle::Rect {
                width: 20.0,
                height: 12.0,
                radius: 3.0,
            }
        } else {
            ShapeStyle::Circle { r: 10.0 }
        };
        let object = DisplayObject::new(ObjectId(i), shape)
            .with_transform(Mat4::from_translation(Vec3::new(x, y, 0.0)))
            .with_style(ResolvedStyle {
                fill: Paint::Constant(Color::rgba(x / SIZE as f32, y / SIZE as f32, 0.6, 1.0)),
                ..ResolvedStyle::default()
            });
        if i % 4 != 0 {
            circles.push(object.id);
        }
        let id = objects.insert(object);
        renderer.insert(&objects, id);
    }

    let cube = DisplayObject::new(
        ObjectId(1000),
        ShapeStyle::Mesh {
            width: 80.0,
            height: 80.0,
            depth: 80.0,
            segments: [2, 2, 2],
            material: MeshMaterial::default(),
        },
    )
    .with_transform(Mat4::from_translation(Vec3::new(256.0, 256.0, 0.0)));
    let cube = objects.insert(cube);
    renderer.insert(&objects, cube);

    for frame in 0..FRAMES {
        let offset = Vec3::new((frame as f32 * 0.1).sin() * 4.0, 0.0, 0.0);
        for id in &circles {
            if let Some(object) = objects.get_mut(*id) {
                object.world_transform = Mat4::from_translation(offset) * object.world_transform;
            }
            if let Err(e) = renderer.update_attribute(ctx.as_ref(), &objects, *id, AttributeProperty::Transform) {
                tracing::warn!(error = %e, "partial update failed");
            }
        }

        match renderer.render_frame(ctx.as_ref(), &mut objects, &target) {
            Ok(stats) => tracing::info!(
                frame,
                batches = stats.batches,
                draw_calls = stats.draw_calls,
                instances = stats.instances,
                geometry_builds = stats.rebuilds.geometry_builds,
                partial_updates = stats.rebuilds.partial_updates,
                "frame done"
            ),
            Err(e) => tracing::error!(frame, error = %e, "frame failed"),
        }
    }

    renderer.destroy(ctx.as_ref());
}
