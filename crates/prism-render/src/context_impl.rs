//! [`RenderDevice`] for [`GraphicsContext`].
//!
//! Input layouts and input states are plain descriptors on this backend; the
//! wgpu objects they imply (render pipelines, bind groups) are built in
//! `execute`. Pipelines are cached per program, layout and target format.

use crate::context::{GraphicsContext, PipelineKey};
use prism_core::profiling::profile_function;
use prism_test_utils::{
    BufferDescriptor, DeviceError, DrawCommand, GpuBuffer, GpuInputLayout, GpuInputState, GpuProgram, GpuTexture,
    InputLayoutDescriptor, InputStateDescriptor, ProgramDescriptor, RenderDevice, RenderTarget, TextureDescriptor,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use wgpu::util::DeviceExt;

fn from_scope_error(error: wgpu::Error) -> DeviceError {
    match error {
        wgpu::Error::OutOfMemory { .. } => DeviceError::OutOfMemory,
        other => DeviceError::InvalidLayout(other.to_string()),
    }
}

impl GraphicsContext {
    fn next_id(&self) -> u64 {
        self.next_resource_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Runs `f` inside a validation and an out-of-memory error scope.
    fn scoped<T>(&self, f: impl FnOnce() -> T) -> Result<T, wgpu::Error> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f();
        let validation = pollster::block_on(self.device.pop_error_scope());
        let oom = pollster::block_on(self.device.pop_error_scope());
        match oom.or(validation) {
            Some(error) => Err(error),
            None => Ok(value),
        }
    }

    fn pipeline(
        &self,
        program: &GpuProgram,
        layout: &GpuInputLayout,
        format: wgpu::TextureFormat,
    ) -> Result<Arc<wgpu::RenderPipeline>, DeviceError> {
        let key = PipelineKey {
            program: program.id(),
            layout: layout.id(),
            format,
        };
        if let Some(pipeline) = self.pipelines.lock().get(&key) {
            return Ok(pipeline.clone());
        }

        let (vertex, fragment) = program.modules().ok_or_else(|| DeviceError::InvalidHandle {
            reason: format!("program {} has no shader modules", program.id()),
        })?;
        let descriptor = layout.descriptor();
        let attributes: Vec<Vec<wgpu::VertexAttribute>> = descriptor
            .vertex_buffers
            .iter()
            .map(|buffer| {
                buffer
                    .attributes
                    .iter()
                    .map(|attribute| wgpu::VertexAttribute {
                        format: attribute.format,
                        offset: attribute.offset,
                        shader_location: attribute.location,
                    })
                    .collect()
            })
            .collect();
        let buffers: Vec<wgpu::VertexBufferLayout> = descriptor
            .vertex_buffers
            .iter()
            .zip(&attributes)
            .map(|(buffer, attributes)| wgpu::VertexBufferLayout {
                array_stride: buffer.stride,
                step_mode: buffer.step_mode,
                attributes,
            })
            .collect();

        let pipeline = self
            .scoped(|| {
                self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some("prism batch pipeline"),
                    layout: None,
                    vertex: wgpu::VertexState {
                        module: vertex,
                        entry_point: Some("vs_main"),
                        buffers: &buffers,
                        compilation_options: Default::default(),
                    },
                    fragment: Some(wgpu::FragmentState {
                        module: fragment,
                        entry_point: Some("fs_main"),
                        targets: &[Some(wgpu::ColorTargetState {
                            format,
                            blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                        compilation_options: Default::default(),
                    }),
                    primitive: wgpu::PrimitiveState::default(),
                    depth_stencil: None,
                    multisample: wgpu::MultisampleState::default(),
                    multiview: None,
                    cache: None,
                })
            })
            .map_err(from_scope_error)?;

        let pipeline = Arc::new(pipeline);
        self.pipelines.lock().insert(key, pipeline.clone());
        tracing::debug!(program = key.program, layout = key.layout, ?format, "created render pipeline");
        Ok(pipeline)
    }

    /// One bind group per group index, built from the command's uniforms
    /// and textures.
    fn bind_groups(
        &self,
        pipeline: &wgpu::RenderPipeline,
        command: &DrawCommand,
    ) -> Result<Vec<(u32, wgpu::BindGroup)>, DeviceError> {
        let mut uniform_buffers: BTreeMap<u32, Vec<(u32, wgpu::Buffer)>> = BTreeMap::new();
        for uniform in &command.uniforms {
            let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("prism uniforms"),
                contents: &uniform.data,
                usage: wgpu::BufferUsages::UNIFORM,
            });
            uniform_buffers
                .entry(uniform.group)
                .or_default()
                .push((uniform.binding, buffer));
        }
        let mut texture_views: BTreeMap<u32, Vec<(u32, &wgpu::TextureView)>> = BTreeMap::new();
        for texture in &command.textures {
            let view = texture.texture.view().ok_or_else(|| DeviceError::InvalidHandle {
                reason: format!("texture {} is not a device texture", texture.texture.id()),
            })?;
            texture_views.entry(texture.group).or_default().push((texture.binding, view));
        }

        let groups: std::collections::BTreeSet<u32> =
            uniform_buffers.keys().chain(texture_views.keys()).copied().collect();
        let mut bind_groups = Vec::with_capacity(groups.len());
        for group in groups {
            let mut entries = Vec::new();
            for (binding, buffer) in uniform_buffers.get(&group).into_iter().flatten() {
                entries.push(wgpu::BindGroupEntry {
                    binding: *binding,
                    resource: buffer.as_entire_binding(),
                });
            }
            for (binding, view) in texture_views.get(&group).into_iter().flatten() {
                entries.push(wgpu::BindGroupEntry {
                    binding: *binding,
                    resource: wgpu::BindingResource::TextureView(view),
                });
                entries.push(wgpu::BindGroupEntry {
                    binding: *binding + 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                });
            }
            let layout = pipeline.get_bind_group_layout(group);
            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("prism bind group"),
                layout: &layout,
                entries: &entries,
            });
            bind_groups.push((group, bind_group));
        }
        Ok(bind_groups)
    }
}

impl RenderDevice for GraphicsContext {
    fn create_buffer(&self, desc: &BufferDescriptor) -> Result<GpuBuffer, DeviceError> {
        let buffer = self
            .scoped(|| {
                self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: desc.label,
                    contents: desc.contents,
                    usage: desc.usage,
                })
            })
            .map_err(from_scope_error)?;
        Ok(GpuBuffer::from_wgpu(self.next_id(), buffer))
    }

    fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8]) -> Result<(), DeviceError> {
        let Some(wgpu_buffer) = buffer.as_wgpu() else {
            return Err(DeviceError::InvalidHandle {
                reason: format!("buffer {} is not a device buffer", buffer.id()),
            });
        };
        if offset + data.len() as u64 > buffer.size() {
            return Err(DeviceError::InvalidHandle {
                reason: format!(
                    "write of {} bytes at {} overruns buffer {} ({} bytes)",
                    data.len(),
                    offset,
                    buffer.id(),
                    buffer.size()
                ),
            });
        }
        self.queue.write_buffer(wgpu_buffer, offset, data);
        Ok(())
    }

    fn destroy_buffer(&self, buffer: &GpuBuffer) {
        if let Some(buffer) = buffer.as_wgpu() {
            buffer.destroy();
        }
    }

    fn create_texture(&self, desc: &TextureDescriptor) -> Result<GpuTexture, DeviceError> {
        let expected = desc.width as usize * desc.height as usize * 4;
        if desc.data.len() != expected {
            return Err(DeviceError::InvalidLayout(format!(
                "texture data is {} bytes, expected {} for {}x{} RGBA8",
                desc.data.len(),
                expected,
                desc.width,
                desc.height
            )));
        }
        let size = wgpu::Extent3d {
            width: desc.width,
            height: desc.height,
            depth_or_array_layers: 1,
        };
        let texture = self
            .scoped(|| {
                self.device.create_texture_with_data(
                    &self.queue,
                    &wgpu::TextureDescriptor {
                        label: desc.label,
                        size,
                        mip_level_count: 1,
                        sample_count: 1,
                        dimension: wgpu::TextureDimension::D2,
                        format: wgpu::TextureFormat::Rgba8UnormSrgb,
                        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                        view_formats: &[],
                    },
                    wgpu::util::TextureDataOrder::LayerMajor,
                    desc.data,
                )
            })
            .map_err(from_scope_error)?;
        Ok(GpuTexture::from_wgpu(self.next_id(), texture))
    }

    fn create_input_layout(&self, desc: &InputLayoutDescriptor) -> Result<GpuInputLayout, DeviceError> {
        let limits = self.device.limits();
        if desc.vertex_buffers.len() > limits.max_vertex_buffers as usize {
            return Err(DeviceError::InvalidLayout(format!(
                "{} vertex buffers exceed the device limit of {}",
                desc.vertex_buffers.len(),
                limits.max_vertex_buffers
            )));
        }
        for buffer in &desc.vertex_buffers {
            if let Some(attribute) = buffer
                .attributes
                .iter()
                .find(|attribute| attribute.offset + attribute.size() > buffer.stride)
            {
                return Err(DeviceError::InvalidLayout(format!(
                    "attribute at location {} ends past stride {}",
                    attribute.location, buffer.stride
                )));
            }
        }
        Ok(GpuInputLayout::new(self.next_id(), desc.clone()))
    }

    fn create_input_state(&self, desc: &InputStateDescriptor) -> Result<GpuInputState, DeviceError> {
        let expected = desc.layout.descriptor().vertex_buffers.len();
        if desc.vertex_buffers.len() != expected {
            return Err(DeviceError::InvalidLayout(format!(
                "input state has {} vertex buffers, layout expects {}",
                desc.vertex_buffers.len(),
                expected
            )));
        }
        Ok(GpuInputState::new(
            self.next_id(),
            desc.layout.clone(),
            desc.vertex_buffers.to_vec(),
            desc.index_buffer.cloned(),
        ))
    }

    fn destroy_input_state(&self, state: &GpuInputState) {
        // bindings are resolved per draw, nothing is held on the device
        tracing::trace!(id = state.id(), "released input state");
    }

    fn create_program(&self, desc: &ProgramDescriptor) -> Result<GpuProgram, DeviceError> {
        profile_function!();
        let compile = |source: &str| {
            self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: desc.label,
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        };
        let (vertex, fragment) = self
            .scoped(|| (compile(desc.vertex), compile(desc.fragment)))
            .map_err(|error| match error {
                wgpu::Error::OutOfMemory { .. } => DeviceError::OutOfMemory,
                other => DeviceError::ProgramCompilation {
                    label: desc.label.map(str::to_string),
                    message: other.to_string(),
                },
            })?;
        let id = self.next_program_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(id, label = ?desc.label, "compiled program");
        Ok(GpuProgram::from_wgpu(id, vertex, fragment))
    }

    fn execute(&self, target: &RenderTarget, commands: &[DrawCommand]) -> Result<(), DeviceError> {
        profile_function!();
        let (Some(view), Some(format)) = (target.view(), target.format()) else {
            return Err(DeviceError::InvalidHandle {
                reason: "render target is not a device texture view".to_string(),
            });
        };
        let load = match target.clear_color {
            Some(color) => wgpu::LoadOp::Clear(color),
            None => wgpu::LoadOp::Load,
        };

        let recorded = self.scoped(|| -> Result<(), DeviceError> {
            let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("prism frame"),
            });
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("prism batches"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for command in commands {
                let pipeline = self.pipeline(&command.program, command.input_state.layout(), format)?;
                let bind_groups = self.bind_groups(&pipeline, command)?;
                let vertex_buffers: Option<Vec<&wgpu::Buffer>> = command
                    .input_state
                    .vertex_buffers()
                    .iter()
                    .map(|buffer| buffer.as_wgpu().filter(|b| b.size() > 0))
                    .collect();
                let index_buffer = command.input_state.index_buffer().and_then(GpuBuffer::as_wgpu);
                let (Some(vertex_buffers), Some(index_buffer)) = (vertex_buffers, index_buffer) else {
                    tracing::warn!(
                        input_state = command.input_state.id(),
                        "skipping draw with a missing or empty buffer"
                    );
                    continue;
                };

                pass.set_pipeline(&pipeline);
                for (group, bind_group) in &bind_groups {
                    pass.set_bind_group(*group, bind_group, &[]);
                }
                for (slot, buffer) in vertex_buffers.into_iter().enumerate() {
                    pass.set_vertex_buffer(slot as u32, buffer.slice(..));
                }
                pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..command.index_count, 0, 0..command.instance_count);
            }
            drop(pass);

            self.queue.submit(std::iter::once(encoder.finish()));
            Ok(())
        });
        recorded.map_err(from_scope_error)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::GraphicsContextDescriptor;

    fn context() -> Option<Arc<GraphicsContext>> {
        pollster::block_on(GraphicsContext::new_owned_with_descriptor(
            GraphicsContextDescriptor::new().fallback_adapter(),
        ))
        .ok()
    }

    #[test]
    #[ignore = "requires a GPU adapter"]
    fn test_invalid_wgsl_reports_compilation_error() {
        let Some(ctx) = context() else { return };
        let err = ctx
            .create_program(&ProgramDescriptor {
                label: Some("broken"),
                vertex: "fn vs_main( {",
                fragment: "@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }",
            })
            .unwrap_err();
        assert!(matches!(err, DeviceError::ProgramCompilation { .. }));
    }

    #[test]
    #[ignore = "requires a GPU adapter"]
    fn test_write_past_end_is_rejected() {
        let Some(ctx) = context() else { return };
        let buffer = ctx
            .create_buffer(&BufferDescriptor {
                label: None,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                contents: &[0u8; 16],
            })
            .unwrap();
        assert!(ctx.write_buffer(&buffer, 8, &[0u8; 8]).is_ok());
        assert!(ctx.write_buffer(&buffer, 12, &[0u8; 8]).is_err());
    }
}
