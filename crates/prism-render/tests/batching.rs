//! End-to-end batching against the mock device.

use prism_core::math::{Mat4, Vec3};
use prism_render::shader::{MATERIAL_IMAGE, MATERIAL_SDF};
use prism_render::{
    AttributeProperty, BatchRenderer, Color, DirtyFlags, DisplayObject, DisplayObjectStore, INSTANCE_STRIDE,
    ImageSource, InstanceRecord, MeshMaterial, ObjectId, ObjectTable, Paint, PipelineConfig, RenderError,
    ResolvedStyle, ShapeKind, ShapeStyle,
};
use prism_test_utils::{DeviceError, GpuTexture, MockOp, MockRenderDevice, RenderTarget};

fn target() -> RenderTarget {
    RenderTarget::mock(256, 256)
}

fn filled(color: Color) -> ResolvedStyle {
    ResolvedStyle {
        fill: Paint::Constant(color),
        ..ResolvedStyle::default()
    }
}

fn circle(id: u64, x: f32) -> DisplayObject {
    DisplayObject::new(ObjectId(id), ShapeStyle::Circle { r: 10.0 })
        .with_transform(Mat4::from_translation(Vec3::new(x, 0.0, 0.0)))
        .with_style(filled(Color::rgba(1.0, 0.0, 0.0, 1.0)))
}

fn image(id: u64, source: u64) -> DisplayObject {
    DisplayObject::new(
        ObjectId(id),
        ShapeStyle::Image {
            width: 32.0,
            height: 32.0,
            source: ImageSource {
                id: source,
                texture: GpuTexture::mock(source, 32, 32),
            },
        },
    )
}

fn mesh(id: u64, color: Color) -> DisplayObject {
    DisplayObject::new(
        ObjectId(id),
        ShapeStyle::Mesh {
            width: 2.0,
            height: 2.0,
            depth: 2.0,
            segments: [1, 1, 1],
            material: MeshMaterial { color, lighting: true },
        },
    )
}

/// Inserts every object into both the table and the renderer.
fn populate(objects: impl IntoIterator<Item = DisplayObject>) -> (ObjectTable, BatchRenderer) {
    let mut table = ObjectTable::new();
    let mut renderer = BatchRenderer::new(PipelineConfig::default());
    for object in objects {
        let id = table.insert(object);
        assert!(renderer.insert(&table, id).is_some());
    }
    (table, renderer)
}

fn decode_records(bytes: &[u8]) -> Vec<InstanceRecord> {
    bytes
        .chunks_exact(INSTANCE_STRIDE as usize)
        .map(|chunk| InstanceRecord::from_bytes(chunk).unwrap())
        .collect()
}

#[test]
fn test_every_object_lands_in_exactly_one_homogeneous_batch() {
    let red = Color::rgba(1.0, 0.0, 0.0, 1.0);
    let blue = Color::rgba(0.0, 0.0, 1.0, 1.0);
    let objects = vec![
        circle(1, 0.0),
        circle(2, 10.0),
        DisplayObject::new(ObjectId(3), ShapeStyle::Ellipse { rx: 4.0, ry: 2.0 }),
        DisplayObject::new(
            ObjectId(4),
            ShapeStyle::Rect {
                width: 10.0,
                height: 5.0,
                radius: 0.0,
            },
        ),
        DisplayObject::new(
            ObjectId(5),
            ShapeStyle::Rect {
                width: 3.0,
                height: 3.0,
                radius: 1.0,
            },
        ),
        image(6, 100),
        image(7, 100),
        image(8, 200),
        mesh(9, red),
        mesh(10, red),
        mesh(11, blue),
        circle(12, 20.0),
    ];
    let (_table, renderer) = populate(objects);
    let manager = renderer.manager();

    // circles, ellipse, rects, image 100, image 200, red mesh, blue mesh
    assert_eq!(manager.len(), 7);
    assert_eq!(manager.object_count(), 12);

    let mut seen = Vec::new();
    for (_, batch) in manager.batches() {
        for member in batch.members() {
            assert!(!seen.contains(member), "object {:?} is in two batches", member);
            seen.push(*member);
        }
    }
    assert_eq!(seen.len(), 12);

    let circles = manager.batch(manager.batch_of(ObjectId(1)).unwrap()).unwrap();
    assert_eq!(circles.kind(), ShapeKind::Circle);
    assert_eq!(circles.members(), &[ObjectId(1), ObjectId(2), ObjectId(12)]);
    assert_eq!(manager.batch_of(ObjectId(6)), manager.batch_of(ObjectId(7)));
    assert_ne!(manager.batch_of(ObjectId(6)), manager.batch_of(ObjectId(8)));
    assert_eq!(manager.batch_of(ObjectId(9)), manager.batch_of(ObjectId(10)));
    assert_ne!(manager.batch_of(ObjectId(9)), manager.batch_of(ObjectId(11)));
}

#[test]
fn test_instance_records_follow_member_order() {
    let mock = MockRenderDevice::new();
    let (mut table, mut renderer) = populate((1..=5).map(|i| circle(i, i as f32 * 10.0)));

    renderer.render_frame(&mock, &mut table, &target()).unwrap();

    let (_, batch) = renderer.manager().batches().next().unwrap();
    let records = decode_records(batch.geometry().vertex_data(0).unwrap());
    assert_eq!(records.len(), batch.len());
    for (record, id) in records.iter().zip(batch.members()) {
        assert_eq!(*record, InstanceRecord::pack(table.get(*id).unwrap()));
    }

    // the device holds the same bytes the batch packed
    let instance_buffer = &batch.geometry().vertex_buffers()[0];
    assert_eq!(
        mock.buffer_contents(instance_buffer).unwrap(),
        batch.geometry().vertex_data(0).unwrap()
    );
}

#[test]
fn test_partial_update_only_touches_one_record() {
    let mock = MockRenderDevice::new();
    let (mut table, mut renderer) = populate((1..=4).map(|i| circle(i, i as f32)));
    renderer.render_frame(&mock, &mut table, &target()).unwrap();

    let before = {
        let (_, batch) = renderer.manager().batches().next().unwrap();
        decode_records(batch.geometry().vertex_data(0).unwrap())
    };

    let green = Color::rgba(0.0, 1.0, 0.0, 1.0);
    table.get_mut(ObjectId(3)).unwrap().style.fill = Paint::Constant(green);
    let writes_before = mock.count_buffer_writes();
    assert!(
        renderer
            .update_attribute(&mock, &table, ObjectId(3), AttributeProperty::Fill)
            .unwrap()
    );
    assert_eq!(mock.count_buffer_writes(), writes_before + 1);

    let (_, batch) = renderer.manager().batches().next().unwrap();
    let after = decode_records(batch.geometry().vertex_data(0).unwrap());
    assert_eq!(after[0], before[0]);
    assert_eq!(after[1], before[1]);
    assert_eq!(after[3], before[3]);
    assert_eq!(after[2].fill, green.to_array());
    assert_eq!(after[2], InstanceRecord::pack(table.get(ObjectId(3)).unwrap()));

    // no rebuild needed on the next frame
    let stats = renderer.render_frame(&mock, &mut table, &target()).unwrap();
    assert_eq!(stats.rebuilds.geometry_builds, 0);
    assert_eq!(stats.rebuilds.partial_updates, 1);
}

#[test]
fn test_transform_update_rewrites_model_matrix() {
    let mock = MockRenderDevice::new();
    let (mut table, mut renderer) = populate((1..=3).map(|i| circle(i, 0.0)));
    renderer.render_frame(&mock, &mut table, &target()).unwrap();

    let moved = Mat4::from_translation(Vec3::new(5.0, 6.0, 0.0));
    table.get_mut(ObjectId(2)).unwrap().world_transform = moved;
    let property = AttributeProperty::from_name("modelMatrix").unwrap();
    assert!(renderer.update_attribute(&mock, &table, ObjectId(2), property).unwrap());

    let (_, batch) = renderer.manager().batches().next().unwrap();
    let records = decode_records(batch.geometry().vertex_data(0).unwrap());
    assert_eq!(records[1].model, moved.to_cols_array_2d());
    assert_eq!(records[0].model, Mat4::IDENTITY.to_cols_array_2d());
}

#[test]
fn test_update_without_partial_writes_rebuilds_next_frame() {
    let mock = MockRenderDevice::new();
    let mut table = ObjectTable::new();
    let mut renderer = BatchRenderer::new(PipelineConfig::default().without_partial_updates());
    for i in 1..=2 {
        let id = table.insert(circle(i, 0.0));
        renderer.insert(&table, id);
    }
    renderer.render_frame(&mock, &mut table, &target()).unwrap();

    table.get_mut(ObjectId(1)).unwrap().style.opacity = 0.5;
    assert!(
        !renderer
            .update_attribute(&mock, &table, ObjectId(1), AttributeProperty::Opacity)
            .unwrap()
    );

    let stats = renderer.render_frame(&mock, &mut table, &target()).unwrap();
    assert_eq!(stats.rebuilds.geometry_builds, 1);
    let (_, batch) = renderer.manager().batches().next().unwrap();
    let records = decode_records(batch.geometry().vertex_data(0).unwrap());
    assert_eq!(records[0].style[0], 0.5);
}

#[test]
fn test_update_of_untracked_object_is_ignored() {
    let mock = MockRenderDevice::new();
    let (mut table, mut renderer) = populate([circle(1, 0.0)]);
    renderer.render_frame(&mock, &mut table, &target()).unwrap();

    let updated = renderer
        .update_attribute(&mock, &table, ObjectId(42), AttributeProperty::Fill)
        .unwrap();
    assert!(!updated);
}

#[test]
fn test_compatible_batches_share_cached_resources() {
    let mock = MockRenderDevice::new();
    let (mut table, mut renderer) = populate([
        circle(1, 0.0),
        DisplayObject::new(ObjectId(2), ShapeStyle::Ellipse { rx: 3.0, ry: 1.0 }),
    ]);

    renderer.render_frame(&mock, &mut table, &target()).unwrap();

    // two batches, one program and one input layout between them
    assert_eq!(renderer.manager().len(), 2);
    assert_eq!(renderer.cache().program_count(), 1);
    assert_eq!(renderer.cache().input_layout_count(), 1);
    assert_eq!(mock.count_program_creates(), 1);
    assert_eq!(mock.count_input_layout_creates(), 1);

    let programs: Vec<u32> = renderer
        .manager()
        .batches()
        .map(|(_, batch)| batch.program().unwrap().id())
        .collect();
    assert_eq!(programs[0], programs[1]);
}

#[test]
fn test_draws_are_grouped_by_program_in_submission_order() {
    let mock = MockRenderDevice::new();
    let red = Color::rgba(1.0, 0.0, 0.0, 1.0);
    let blue = Color::rgba(0.0, 0.0, 1.0, 1.0);
    // submitted as image, mesh, image, mesh
    let (mut table, mut renderer) = populate([image(1, 100), mesh(2, red), image(3, 200), mesh(4, blue)]);

    let stats = renderer.render_frame(&mock, &mut table, &target()).unwrap();
    assert_eq!(stats.draw_calls, 4);

    let manager = renderer.manager();
    let batch_for = |id| manager.batch(manager.batch_of(ObjectId(id)).unwrap()).unwrap();
    let image_program = batch_for(1).program().unwrap().id();
    let mesh_program = batch_for(2).program().unwrap().id();
    assert!(image_program < mesh_program);

    let draws = mock.last_draws();
    let programs: Vec<u32> = draws.iter().map(|d| d.program_id).collect();
    assert_eq!(programs, vec![image_program, image_program, mesh_program, mesh_program]);

    // ties keep submission order
    assert_eq!(draws[0].texture_ids, vec![100]);
    assert_eq!(draws[1].texture_ids, vec![200]);
    assert_eq!(draws[2].input_state_id, batch_for(2).input_state().unwrap().id());
    assert_eq!(draws[3].input_state_id, batch_for(4).input_state().unwrap().id());
}

#[test]
fn test_mesh_draw_binds_scene_and_material_uniforms() {
    let mock = MockRenderDevice::new();
    let (mut table, mut renderer) = populate([mesh(1, Color::WHITE), mesh(2, Color::WHITE)]);

    renderer.render_frame(&mock, &mut table, &target()).unwrap();

    let draws = mock.last_draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].instance_count, 2);
    assert_eq!(draws[0].index_count, 36);
    assert_eq!(draws[0].uniform_groups, vec![0, 1]);
    assert!(draws[0].texture_ids.is_empty());
}

#[test]
fn test_removing_all_members_releases_gpu_resources() {
    let mock = MockRenderDevice::new();
    let (mut table, mut renderer) = populate([circle(1, 0.0), circle(2, 5.0)]);
    renderer.render_frame(&mock, &mut table, &target()).unwrap();
    assert!(mock.live_buffer_count() > 0);
    assert_eq!(mock.live_input_state_count(), 1);

    assert!(renderer.remove(&mock, ObjectId(1)));
    assert_eq!(renderer.manager().len(), 1);
    assert!(renderer.remove(&mock, ObjectId(2)));
    assert!(!renderer.remove(&mock, ObjectId(2)));

    assert!(renderer.manager().is_empty());
    assert_eq!(mock.live_buffer_count(), 0);
    assert_eq!(mock.live_input_state_count(), 0);

    let stats = renderer.render_frame(&mock, &mut table, &target()).unwrap();
    assert_eq!(stats.draw_calls, 0);
    assert_eq!(stats.batches, 0);
}

#[test]
fn test_clean_frame_rebuilds_nothing() {
    let mock = MockRenderDevice::new();
    let (mut table, mut renderer) = populate((1..=3).map(|i| circle(i, 0.0)));

    let first = renderer.render_frame(&mock, &mut table, &target()).unwrap();
    assert_eq!(first.rebuilds.geometry_builds, 1);
    assert_eq!(first.rebuilds.input_state_builds, 1);
    assert_eq!(first.rebuilds.program_builds, 1);
    assert!(!table.get(ObjectId(1)).unwrap().needs_redraw);

    let creates = mock.count_buffer_creates();
    let second = renderer.render_frame(&mock, &mut table, &target()).unwrap();
    assert_eq!(second.rebuilds, Default::default());
    assert_eq!(mock.count_buffer_creates(), creates);
    assert_eq!(second.draw_calls, 1);

    // a dirty mark rebuilds instances but keeps the program
    renderer.mark_dirty(ObjectId(2));
    let third = renderer.render_frame(&mock, &mut table, &target()).unwrap();
    assert_eq!(third.rebuilds.geometry_builds, 1);
    assert_eq!(third.rebuilds.program_builds, 0);
    assert_eq!(mock.count_program_creates(), 1);
}

#[test]
fn test_rebuild_replaces_old_buffers() {
    let mock = MockRenderDevice::new();
    let (mut table, mut renderer) = populate([circle(1, 0.0)]);
    renderer.render_frame(&mock, &mut table, &target()).unwrap();
    let live = mock.live_buffer_count();

    let id = table.insert(circle(2, 1.0));
    renderer.insert(&table, id);
    renderer.render_frame(&mock, &mut table, &target()).unwrap();

    assert_eq!(mock.live_buffer_count(), live);
    assert_eq!(mock.live_input_state_count(), 1);
    assert_eq!(mock.last_draws()[0].instance_count, 2);
}

#[test]
fn test_failed_program_build_is_retried_next_frame() {
    let mock = MockRenderDevice::new();
    let (mut table, mut renderer) = populate([circle(1, 0.0), image(2, 100)]);
    mock.fail_next(
        MockOp::CreateProgram,
        DeviceError::ProgramCompilation {
            label: Some("material-sdf".to_string()),
            message: "unexpected token".to_string(),
        },
    );

    let err = renderer.render_frame(&mock, &mut table, &target()).unwrap_err();
    assert!(matches!(err, RenderError::Device(DeviceError::ProgramCompilation { .. })));
    assert!(!err.is_fatal());

    // the image batch still drew
    assert_eq!(mock.last_draws().len(), 1);
    let manager = renderer.manager();
    let circles = manager.batch(manager.batch_of(ObjectId(1)).unwrap()).unwrap();
    assert!(circles.dirty().contains(DirtyFlags::PROGRAM));
    assert!(circles.program().is_none());
    assert!(table.get(ObjectId(1)).unwrap().needs_redraw);
    assert!(!table.get(ObjectId(2)).unwrap().needs_redraw);

    let stats = renderer.render_frame(&mock, &mut table, &target()).unwrap();
    assert_eq!(stats.draw_calls, 2);
    assert_eq!(stats.rebuilds.program_builds, 1);
    let manager = renderer.manager();
    let circles = manager.batch(manager.batch_of(ObjectId(1)).unwrap()).unwrap();
    assert!(circles.dirty().is_empty());
}

#[test]
fn test_failed_buffer_creation_keeps_previous_geometry() {
    let mock = MockRenderDevice::new();
    let (mut table, mut renderer) = populate([circle(1, 0.0)]);
    renderer.render_frame(&mock, &mut table, &target()).unwrap();
    let live = mock.live_buffer_count();

    renderer.mark_dirty(ObjectId(1));
    mock.fail_next(MockOp::CreateBuffer, DeviceError::OutOfMemory);
    let err = renderer.render_frame(&mock, &mut table, &target()).unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(mock.live_buffer_count(), live);

    let stats = renderer.render_frame(&mock, &mut table, &target()).unwrap();
    assert_eq!(stats.rebuilds.geometry_builds, 1);
    assert_eq!(mock.live_buffer_count(), live);
}

#[test]
fn test_shape_kind_change_moves_object() {
    let mock = MockRenderDevice::new();
    let (mut table, mut renderer) = populate([circle(1, 0.0), circle(2, 0.0)]);
    renderer.render_frame(&mock, &mut table, &target()).unwrap();
    let circles = renderer.manager().batch_of(ObjectId(1)).unwrap();

    table.get_mut(ObjectId(2)).unwrap().shape = ShapeStyle::Rect {
        width: 4.0,
        height: 4.0,
        radius: 0.0,
    };
    let rects = renderer.on_shape_changed(&mock, &table, ObjectId(2)).unwrap();

    assert_ne!(rects, circles);
    let manager = renderer.manager();
    assert_eq!(manager.batch(circles).unwrap().members(), &[ObjectId(1)]);
    assert_eq!(manager.batch(rects).unwrap().kind(), ShapeKind::Rect);

    let stats = renderer.render_frame(&mock, &mut table, &target()).unwrap();
    assert_eq!(stats.draw_calls, 2);
    // the rect define makes a second program
    assert_eq!(renderer.cache().program_count(), 2);
}

#[test]
fn test_stale_batch_ids_do_not_resolve() {
    let mock = MockRenderDevice::new();
    let (table, mut renderer) = populate([circle(1, 0.0)]);
    let stale = renderer.manager().batch_of(ObjectId(1)).unwrap();

    renderer.remove(&mock, ObjectId(1));
    assert!(renderer.manager().batch(stale).is_none());

    // the freed slot is reused by the next batch under a new id
    let fresh = renderer.insert(&table, ObjectId(1)).unwrap();
    assert_ne!(fresh, stale);
    assert!(renderer.manager().batch(stale).is_none());
    assert!(renderer.manager().batch(fresh).is_some());
}

#[test]
fn test_frame_stats_count_instances() {
    let mock = MockRenderDevice::new();
    let mut objects: Vec<DisplayObject> = (1..=6).map(|i| circle(i, 0.0)).collect();
    objects.push(image(7, 1));
    objects.push(image(8, 1));
    let (mut table, mut renderer) = populate(objects);

    let stats = renderer.render_frame(&mock, &mut table, &target()).unwrap();
    assert_eq!(stats.batches, 2);
    assert_eq!(stats.instructions, 2);
    assert_eq!(stats.draw_calls, 2);
    assert_eq!(stats.instances, 8);
    assert_eq!(mock.count_executes(), 1);
}

#[test]
fn test_destroy_releases_everything() {
    let mock = MockRenderDevice::new();
    let (mut table, mut renderer) = populate([circle(1, 0.0), image(2, 5), mesh(3, Color::WHITE)]);
    renderer.render_frame(&mock, &mut table, &target()).unwrap();

    renderer.destroy(&mock);

    assert!(renderer.manager().is_empty());
    assert_eq!(renderer.cache().program_count(), 0);
    assert_eq!(mock.live_buffer_count(), 0);
    assert_eq!(mock.live_input_state_count(), 0);
}

#[test]
fn test_resized_mesh_leaves_incompatible_batch() {
    let mock = MockRenderDevice::new();
    let white = Color::WHITE;
    let (mut table, mut renderer) = populate([mesh(1, white), mesh(2, white)]);
    renderer.render_frame(&mock, &mut table, &target()).unwrap();
    assert_eq!(renderer.manager().len(), 1);

    table.get_mut(ObjectId(2)).unwrap().shape = ShapeStyle::Mesh {
        width: 5.0,
        height: 2.0,
        depth: 2.0,
        segments: [1, 1, 1],
        material: MeshMaterial {
            color: white,
            lighting: true,
        },
    };
    let patched = renderer
        .update_attribute(&mock, &table, ObjectId(2), AttributeProperty::ShapeGeometry)
        .unwrap();
    assert!(!patched);

    let manager = renderer.manager();
    assert_eq!(manager.len(), 2);
    assert_eq!(manager.object_count(), 2);
    let first = manager.batch_of(ObjectId(1)).unwrap();
    let second = manager.batch_of(ObjectId(2)).unwrap();
    assert_ne!(first, second);
    assert_eq!(manager.batch(first).unwrap().members(), &[ObjectId(1)]);
    assert_eq!(manager.batch(second).unwrap().members(), &[ObjectId(2)]);

    let stats = renderer.render_frame(&mock, &mut table, &target()).unwrap();
    assert_eq!(stats.draw_calls, 2);
    assert_eq!(stats.instances, 2);
    assert_eq!(stats.rebuilds.geometry_builds, 2);
}

#[test]
fn test_image_source_change_moves_to_matching_batch() {
    let mock = MockRenderDevice::new();
    let (mut table, mut renderer) = populate([image(1, 100), image(2, 100), image(3, 200)]);
    renderer.render_frame(&mock, &mut table, &target()).unwrap();

    table.insert(image(2, 200));
    assert!(
        !renderer
            .update_attribute(&mock, &table, ObjectId(2), AttributeProperty::from_name("src").unwrap())
            .unwrap()
    );

    let manager = renderer.manager();
    assert_eq!(manager.len(), 2);
    assert_eq!(manager.batch_of(ObjectId(2)), manager.batch_of(ObjectId(3)));
    assert_ne!(manager.batch_of(ObjectId(1)), manager.batch_of(ObjectId(2)));

    renderer.render_frame(&mock, &mut table, &target()).unwrap();
    let mut textures: Vec<(u32, Vec<u64>)> = mock
        .last_draws()
        .iter()
        .map(|d| (d.instance_count, d.texture_ids.clone()))
        .collect();
    textures.sort();
    assert_eq!(textures, vec![(1, vec![100]), (2, vec![200])]);
}

#[test]
fn test_compatible_resize_stays_in_batch() {
    let mock = MockRenderDevice::new();
    let (mut table, mut renderer) = populate([circle(1, 0.0), circle(2, 0.0)]);
    renderer.render_frame(&mock, &mut table, &target()).unwrap();
    let batch = renderer.manager().batch_of(ObjectId(1));

    table.get_mut(ObjectId(2)).unwrap().shape = ShapeStyle::Circle { r: 30.0 };
    let property = AttributeProperty::from_name("r").unwrap();
    assert!(renderer.update_attribute(&mock, &table, ObjectId(2), property).unwrap());
    assert_eq!(renderer.manager().batch_of(ObjectId(2)), batch);
    assert_eq!(renderer.manager().len(), 1);
}

#[test]
fn test_replaced_material_recompiles_its_batches() {
    let mock = MockRenderDevice::new();
    let (mut table, mut renderer) = populate([circle(1, 0.0), image(2, 100)]);
    renderer.render_frame(&mock, &mut table, &target()).unwrap();
    assert_eq!(mock.count_program_creates(), 2);

    let mut material = renderer.shaders().material(MATERIAL_SDF).unwrap().clone();
    material.fragment = format!("{}\n// tinted\n", material.fragment).into();
    renderer.register_material(MATERIAL_SDF, material);

    let stats = renderer.render_frame(&mock, &mut table, &target()).unwrap();
    assert_eq!(stats.rebuilds.program_builds, 1);
    assert_eq!(mock.count_program_creates(), 3);
    assert_eq!(stats.draw_calls, 2);

    let manager = renderer.manager();
    let circles = manager.batch(manager.batch_of(ObjectId(1)).unwrap()).unwrap();
    assert_eq!(circles.material(), MATERIAL_SDF);
    assert!(mock.last_draws().iter().any(|d| d.program_id == circles.program().unwrap().id()));
    let images = manager.batch(manager.batch_of(ObjectId(2)).unwrap()).unwrap();
    assert_eq!(images.material(), MATERIAL_IMAGE);
}

#[test]
fn test_replaced_chunk_recompiles_every_batch() {
    let mock = MockRenderDevice::new();
    let (mut table, mut renderer) = populate([circle(1, 0.0), image(2, 100)]);
    renderer.render_frame(&mock, &mut table, &target()).unwrap();

    let scene = format!("{}\n// resized viewport\n", include_str!("../src/shaders/scene.wgsl"));
    renderer.register_chunk("scene", scene);

    let stats = renderer.render_frame(&mock, &mut table, &target()).unwrap();
    assert_eq!(stats.rebuilds.program_builds, 2);
    assert_eq!(stats.rebuilds.geometry_builds, 0);
}

#[test]
fn test_frame_stats_count_rebuilds_of_surviving_batches() {
    let mock = MockRenderDevice::new();
    let (mut table, mut renderer) = populate([
        circle(1, 0.0),
        DisplayObject::new(
            ObjectId(2),
            ShapeStyle::Rect {
                width: 4.0,
                height: 4.0,
                radius: 0.0,
            },
        ),
    ]);
    let first = renderer.render_frame(&mock, &mut table, &target()).unwrap();
    assert_eq!(first.rebuilds.geometry_builds, 2);

    assert!(renderer.remove(&mock, ObjectId(1)));
    renderer.mark_dirty(ObjectId(2));

    let stats = renderer.render_frame(&mock, &mut table, &target()).unwrap();
    assert_eq!(stats.batches, 1);
    assert_eq!(stats.rebuilds.geometry_builds, 1);
    assert_eq!(stats.rebuilds.program_builds, 0);
}
