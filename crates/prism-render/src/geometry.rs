//! Vertex and index data owned by a batch.
//!
//! A [`GeometryBuffer`] keeps a CPU copy of every vertex buffer next to the
//! GPU buffer, so partial attribute writes can be checked against the
//! record layout and read back without a GPU round trip.

use crate::error::{RenderError, RenderResult};
use prism_core::profiling::profile_function;
use prism_test_utils::{
    BufferDescriptor, GpuBuffer, InputLayoutDescriptor, RenderDevice, VertexBufferLayoutDescriptor,
};

const VERTEX_USAGE: wgpu::BufferUsages = wgpu::BufferUsages::VERTEX.union(wgpu::BufferUsages::COPY_DST);
const INDEX_USAGE: wgpu::BufferUsages = wgpu::BufferUsages::INDEX.union(wgpu::BufferUsages::COPY_DST);

#[derive(Debug)]
struct VertexBufferSlot {
    layout: VertexBufferLayoutDescriptor,
    shadow: Vec<u8>,
    buffer: Option<GpuBuffer>,
}

#[derive(Debug, Default)]
pub struct GeometryBuffer {
    label: Option<String>,
    vertex_buffers: Vec<Option<VertexBufferSlot>>,
    indices: Vec<u32>,
    index_buffer: Option<GpuBuffer>,
    instance_count: u32,
}

impl GeometryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    /// Replaces the data and layout of vertex buffer `buffer_index`.
    ///
    /// The new GPU buffer is created before the old one is destroyed.
    pub fn set_vertex_buffer(
        &mut self,
        device: &dyn RenderDevice,
        buffer_index: usize,
        layout: VertexBufferLayoutDescriptor,
        data: &[u8],
    ) -> RenderResult<()> {
        profile_function!();
        let buffer = device.create_buffer(&BufferDescriptor {
            label: self.label.as_deref(),
            usage: VERTEX_USAGE,
            contents: data,
        })?;

        if self.vertex_buffers.len() <= buffer_index {
            self.vertex_buffers.resize_with(buffer_index + 1, || None);
        }
        let old = self.vertex_buffers[buffer_index].replace(VertexBufferSlot {
            layout,
            shadow: data.to_vec(),
            buffer: Some(buffer),
        });
        if let Some(old) = old.and_then(|slot| slot.buffer) {
            device.destroy_buffer(&old);
        }
        Ok(())
    }

    pub fn set_index(&mut self, device: &dyn RenderDevice, indices: &[u32]) -> RenderResult<()> {
        let buffer = device.create_buffer(&BufferDescriptor {
            label: self.label.as_deref(),
            usage: INDEX_USAGE,
            contents: bytemuck::cast_slice(indices),
        })?;
        if let Some(old) = self.index_buffer.replace(buffer) {
            device.destroy_buffer(&old);
        }
        self.indices = indices.to_vec();
        Ok(())
    }

    /// Overwrites the attribute at `location` for one instance, leaving the
    /// rest of the buffer untouched.
    ///
    /// The write lands at `instance_index * stride + attribute_offset` and
    /// may not be longer than the attribute itself.
    pub fn update_vertex_buffer(
        &mut self,
        device: &dyn RenderDevice,
        buffer_index: usize,
        location: u32,
        instance_index: usize,
        bytes: &[u8],
    ) -> RenderResult<()> {
        let slot = self
            .vertex_buffers
            .get_mut(buffer_index)
            .and_then(Option::as_mut)
            .ok_or(RenderError::MissingVertexBuffer {
                buffer_index,
                location: None,
            })?;
        let attribute = slot.layout.attribute(location).ok_or(RenderError::MissingVertexBuffer {
            buffer_index,
            location: Some(location),
        })?;

        let out_of_range = RenderError::AttributeOutOfRange {
            buffer_index,
            location,
            instance_index,
            len: bytes.len(),
            size: attribute.size(),
        };
        if bytes.len() as u64 > attribute.size() {
            return Err(out_of_range);
        }
        let start = instance_index as u64 * slot.layout.stride + attribute.offset;
        let end = start + bytes.len() as u64;
        if end > slot.shadow.len() as u64 {
            return Err(out_of_range);
        }

        if let Some(buffer) = &slot.buffer {
            device.write_buffer(buffer, start, bytes)?;
        }
        slot.shadow[start as usize..end as usize].copy_from_slice(bytes);
        Ok(())
    }

    /// Releases every GPU buffer. Safe to call repeatedly.
    pub fn destroy(&mut self, device: &dyn RenderDevice) {
        for slot in self.vertex_buffers.iter_mut().flatten() {
            if let Some(buffer) = slot.buffer.take() {
                device.destroy_buffer(&buffer);
            }
        }
        if let Some(buffer) = self.index_buffer.take() {
            device.destroy_buffer(&buffer);
        }
    }

    /// Whether GPU buffers currently back this geometry.
    pub fn is_live(&self) -> bool {
        self.vertex_buffers
            .iter()
            .flatten()
            .any(|slot| slot.buffer.is_some())
    }

    /// Layout of all declared vertex buffers, in slot order.
    pub fn input_layout_descriptor(&self) -> InputLayoutDescriptor {
        InputLayoutDescriptor {
            vertex_buffers: self
                .vertex_buffers
                .iter()
                .flatten()
                .map(|slot| slot.layout.clone())
                .collect(),
            index_format: self.index_buffer.as_ref().map(|_| wgpu::IndexFormat::Uint32),
        }
    }

    /// Live GPU vertex buffers, in slot order.
    pub fn vertex_buffers(&self) -> Vec<GpuBuffer> {
        self.vertex_buffers
            .iter()
            .flatten()
            .filter_map(|slot| slot.buffer.clone())
            .collect()
    }

    pub fn index_buffer(&self) -> Option<&GpuBuffer> {
        self.index_buffer.as_ref()
    }

    /// CPU copy of vertex buffer `buffer_index`.
    pub fn vertex_data(&self, buffer_index: usize) -> Option<&[u8]> {
        self.vertex_buffers
            .get(buffer_index)
            .and_then(Option::as_ref)
            .map(|slot| slot.shadow.as_slice())
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Number of vertices in the first per-vertex buffer.
    pub fn vertex_count(&self) -> u32 {
        self.vertex_buffers
            .iter()
            .flatten()
            .find(|slot| slot.layout.step_mode == wgpu::VertexStepMode::Vertex && slot.layout.stride > 0)
            .map(|slot| (slot.shadow.len() as u64 / slot.layout.stride) as u32)
            .unwrap_or(0)
    }

    pub fn instance_count(&self) -> u32 {
        self.instance_count
    }

    pub fn set_instance_count(&mut self, count: u32) {
        self.instance_count = count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_test_utils::{MockRenderDevice, VertexAttributeDescriptor};

    fn two_attribute_layout() -> VertexBufferLayoutDescriptor {
        VertexBufferLayoutDescriptor {
            stride: 24,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: vec![
                VertexAttributeDescriptor {
                    location: 0,
                    format: wgpu::VertexFormat::Float32x4,
                    offset: 0,
                },
                VertexAttributeDescriptor {
                    location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                    offset: 16,
                },
            ],
        }
    }

    fn geometry_with_instances(mock: &MockRenderDevice, count: usize) -> GeometryBuffer {
        let mut geometry = GeometryBuffer::with_label("test");
        let data = vec![0u8; 24 * count];
        geometry.set_vertex_buffer(mock, 0, two_attribute_layout(), &data).unwrap();
        geometry.set_instance_count(count as u32);
        geometry
    }

    #[test]
    fn test_update_writes_only_the_attribute_range() {
        let mock = MockRenderDevice::new();
        let mut geometry = geometry_with_instances(&mock, 3);

        geometry.update_vertex_buffer(&mock, 0, 1, 2, &[9u8; 8]).unwrap();

        let shadow = geometry.vertex_data(0).unwrap();
        assert_eq!(&shadow[64..72], &[9u8; 8]);
        assert!(shadow[..64].iter().all(|b| *b == 0));
        let gpu = mock.buffer_contents(&geometry.vertex_buffers()[0]).unwrap();
        assert_eq!(gpu, shadow);
    }

    #[test]
    fn test_update_past_record_is_rejected() {
        let mock = MockRenderDevice::new();
        let mut geometry = geometry_with_instances(&mock, 2);

        let err = geometry.update_vertex_buffer(&mock, 0, 1, 0, &[0u8; 16]).unwrap_err();
        assert!(matches!(err, RenderError::AttributeOutOfRange { .. }));
        let err = geometry.update_vertex_buffer(&mock, 0, 0, 2, &[0u8; 16]).unwrap_err();
        assert!(matches!(err, RenderError::AttributeOutOfRange { instance_index: 2, .. }));
        assert_eq!(mock.count_buffer_writes(), 0);
    }

    #[test]
    fn test_update_spilling_into_next_attribute_is_rejected() {
        let mock = MockRenderDevice::new();
        let mut geometry = geometry_with_instances(&mock, 1);

        // fits in the record but runs past the vec4 at location 0
        let err = geometry.update_vertex_buffer(&mock, 0, 0, 0, &[1u8; 20]).unwrap_err();
        assert!(matches!(err, RenderError::AttributeOutOfRange { len: 20, size: 16, .. }));
        assert!(geometry.vertex_data(0).unwrap().iter().all(|b| *b == 0));

        geometry.update_vertex_buffer(&mock, 0, 0, 0, &[1u8; 16]).unwrap();
        assert_eq!(mock.count_buffer_writes(), 1);
    }

    #[test]
    fn test_update_unknown_slot_or_location() {
        let mock = MockRenderDevice::new();
        let mut geometry = geometry_with_instances(&mock, 1);
        assert!(matches!(
            geometry.update_vertex_buffer(&mock, 3, 0, 0, &[0; 4]),
            Err(RenderError::MissingVertexBuffer { location: None, .. })
        ));
        assert!(matches!(
            geometry.update_vertex_buffer(&mock, 0, 7, 0, &[0; 4]),
            Err(RenderError::MissingVertexBuffer { location: Some(7), .. })
        ));
    }

    #[test]
    fn test_replacing_a_buffer_destroys_the_old_one() {
        let mock = MockRenderDevice::new();
        let mut geometry = geometry_with_instances(&mock, 1);
        geometry.set_vertex_buffer(&mock, 0, two_attribute_layout(), &[0u8; 48]).unwrap();

        assert_eq!(mock.count_buffer_creates(), 2);
        assert_eq!(mock.count_buffer_destroys(), 1);
        assert_eq!(mock.live_buffer_count(), 1);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mock = MockRenderDevice::new();
        let mut geometry = geometry_with_instances(&mock, 1);
        geometry.set_index(&mock, &[0, 1, 2]).unwrap();

        geometry.destroy(&mock);
        geometry.destroy(&mock);
        GeometryBuffer::new().destroy(&mock);

        assert_eq!(mock.count_buffer_destroys(), 2);
        assert!(!geometry.is_live());
    }

    #[test]
    fn test_layout_descriptor_reports_index_format() {
        let mock = MockRenderDevice::new();
        let mut geometry = geometry_with_instances(&mock, 1);
        assert_eq!(geometry.input_layout_descriptor().index_format, None);

        geometry.set_index(&mock, &[0, 1, 2, 2, 1, 3]).unwrap();
        let layout = geometry.input_layout_descriptor();
        assert_eq!(layout.index_format, Some(wgpu::IndexFormat::Uint32));
        assert_eq!(layout.vertex_buffers.len(), 1);
        assert_eq!(geometry.index_count(), 6);
    }
}
