//! Mock implementation of [`RenderDevice`] for testing.
//!
//! The mock records every call, keeps a CPU copy of each buffer's bytes so
//! tests can read back what the pipeline uploaded, and can be told to fail
//! upcoming operations.

use crate::{gpu_types::*, render_device::*};
use parking_lot::Mutex;

/// Records a device call for verification in tests.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    CreateBuffer { id: u64, size: u64, usage: wgpu::BufferUsages },
    WriteBuffer { id: u64, offset: u64, size: usize },
    DestroyBuffer { id: u64 },
    CreateTexture { id: u64, width: u32, height: u32 },
    CreateInputLayout { id: u64 },
    CreateInputState { id: u64, layout_id: u64 },
    DestroyInputState { id: u64 },
    CreateProgram { id: u32, label: Option<String> },
    Execute { draws: Vec<DrawRecord> },
}

/// What the mock saw of one executed draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawRecord {
    pub program_id: u32,
    pub input_state_id: u64,
    pub index_count: u32,
    pub instance_count: u32,
    pub uniform_groups: Vec<u32>,
    pub texture_ids: Vec<u64>,
}

/// Operations the mock can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockOp {
    CreateBuffer,
    CreateInputLayout,
    CreateInputState,
    CreateProgram,
    Execute,
}

#[derive(Debug)]
struct MockBuffer {
    data: Vec<u8>,
    destroyed: bool,
}

#[derive(Debug, Default)]
struct MockState {
    buffers: Vec<MockBuffer>,
    textures: u64,
    layouts: u64,
    input_states: Vec<bool>,
    programs: u32,
    failures: Vec<(MockOp, DeviceError)>,
}

/// Mock [`RenderDevice`] that never touches a GPU.
///
/// # Example
///
/// ```rust
/// use prism_test_utils::{BufferDescriptor, MockRenderDevice, RenderDevice};
///
/// let mock = MockRenderDevice::new();
/// let buffer = mock
///     .create_buffer(&BufferDescriptor {
///         label: None,
///         usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
///         contents: &[0u8; 8],
///     })
///     .unwrap();
/// mock.write_buffer(&buffer, 4, &[7u8; 4]).unwrap();
///
/// assert!(buffer.is_mock());
/// assert_eq!(mock.buffer_contents(&buffer).unwrap(), vec![0, 0, 0, 0, 7, 7, 7, 7]);
/// assert_eq!(mock.count_buffer_writes(), 1);
/// ```
pub struct MockRenderDevice {
    calls: Mutex<Vec<DeviceCall>>,
    state: Mutex<MockState>,
}

impl MockRenderDevice {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            state: Mutex::new(MockState::default()),
        }
    }

    /// Makes the next `op` call fail with `error`. Queued failures are
    /// consumed in order.
    pub fn fail_next(&self, op: MockOp, error: DeviceError) {
        self.state.lock().failures.push((op, error));
    }

    /// Get a copy of all recorded calls.
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn count(&self, pred: impl Fn(&DeviceCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| pred(call)).count()
    }

    pub fn count_buffer_creates(&self) -> usize {
        self.count(|c| matches!(c, DeviceCall::CreateBuffer { .. }))
    }

    pub fn count_buffer_writes(&self) -> usize {
        self.count(|c| matches!(c, DeviceCall::WriteBuffer { .. }))
    }

    pub fn count_buffer_destroys(&self) -> usize {
        self.count(|c| matches!(c, DeviceCall::DestroyBuffer { .. }))
    }

    pub fn count_input_layout_creates(&self) -> usize {
        self.count(|c| matches!(c, DeviceCall::CreateInputLayout { .. }))
    }

    pub fn count_input_state_creates(&self) -> usize {
        self.count(|c| matches!(c, DeviceCall::CreateInputState { .. }))
    }

    pub fn count_input_state_destroys(&self) -> usize {
        self.count(|c| matches!(c, DeviceCall::DestroyInputState { .. }))
    }

    pub fn count_program_creates(&self) -> usize {
        self.count(|c| matches!(c, DeviceCall::CreateProgram { .. }))
    }

    pub fn count_executes(&self) -> usize {
        self.count(|c| matches!(c, DeviceCall::Execute { .. }))
    }

    /// Draws of the most recent `execute` call.
    pub fn last_draws(&self) -> Vec<DrawRecord> {
        self.calls
            .lock()
            .iter()
            .rev()
            .find_map(|call| match call {
                DeviceCall::Execute { draws } => Some(draws.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// Current bytes of a buffer, `None` once destroyed.
    pub fn buffer_contents(&self, buffer: &GpuBuffer) -> Option<Vec<u8>> {
        let state = self.state.lock();
        state
            .buffers
            .get(buffer.id() as usize)
            .filter(|b| !b.destroyed)
            .map(|b| b.data.clone())
    }

    /// Number of buffers created and not yet destroyed.
    pub fn live_buffer_count(&self) -> usize {
        self.state.lock().buffers.iter().filter(|b| !b.destroyed).count()
    }

    /// Number of input states created and not yet destroyed.
    pub fn live_input_state_count(&self) -> usize {
        self.state.lock().input_states.iter().filter(|live| **live).count()
    }

    fn take_failure(state: &mut MockState, op: MockOp) -> Result<(), DeviceError> {
        match state.failures.iter().position(|(o, _)| *o == op) {
            Some(pos) => Err(state.failures.remove(pos).1),
            None => Ok(()),
        }
    }

    fn record(&self, call: DeviceCall) {
        self.calls.lock().push(call);
    }
}

impl Default for MockRenderDevice {
    fn default() -> Self {
        Self::new()
    }
}

fn live_buffer<'a>(state: &'a mut MockState, buffer: &GpuBuffer) -> Result<&'a mut MockBuffer, DeviceError> {
    match state.buffers.get_mut(buffer.id() as usize) {
        Some(b) if !b.destroyed => Ok(b),
        Some(_) => Err(DeviceError::InvalidHandle {
            reason: format!("buffer {} was destroyed", buffer.id()),
        }),
        None => Err(DeviceError::InvalidHandle {
            reason: format!("unknown buffer {}", buffer.id()),
        }),
    }
}

impl RenderDevice for MockRenderDevice {
    fn create_buffer(&self, desc: &BufferDescriptor) -> Result<GpuBuffer, DeviceError> {
        let mut state = self.state.lock();
        Self::take_failure(&mut state, MockOp::CreateBuffer)?;
        let id = state.buffers.len() as u64;
        state.buffers.push(MockBuffer {
            data: desc.contents.to_vec(),
            destroyed: false,
        });
        let size = desc.contents.len() as u64;
        self.record(DeviceCall::CreateBuffer {
            id,
            size,
            usage: desc.usage,
        });
        Ok(GpuBuffer::mock(id, size))
    }

    fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8]) -> Result<(), DeviceError> {
        let mut state = self.state.lock();
        let target = live_buffer(&mut state, buffer)?;
        let start = offset as usize;
        let end = start + data.len();
        if end > target.data.len() {
            return Err(DeviceError::InvalidHandle {
                reason: format!(
                    "write of {} bytes at {} overruns buffer {} ({} bytes)",
                    data.len(),
                    offset,
                    buffer.id(),
                    target.data.len()
                ),
            });
        }
        target.data[start..end].copy_from_slice(data);
        self.record(DeviceCall::WriteBuffer {
            id: buffer.id(),
            offset,
            size: data.len(),
        });
        Ok(())
    }

    fn destroy_buffer(&self, buffer: &GpuBuffer) {
        let mut state = self.state.lock();
        if let Some(b) = state.buffers.get_mut(buffer.id() as usize) {
            if !b.destroyed {
                b.destroyed = true;
                b.data = Vec::new();
                self.record(DeviceCall::DestroyBuffer { id: buffer.id() });
            }
        }
    }

    fn create_texture(&self, desc: &TextureDescriptor) -> Result<GpuTexture, DeviceError> {
        let expected = desc.width as usize * desc.height as usize * 4;
        if desc.data.len() != expected {
            return Err(DeviceError::InvalidHandle {
                reason: format!("texture data is {} bytes, expected {}", desc.data.len(), expected),
            });
        }
        let mut state = self.state.lock();
        let id = state.textures;
        state.textures += 1;
        self.record(DeviceCall::CreateTexture {
            id,
            width: desc.width,
            height: desc.height,
        });
        Ok(GpuTexture::mock(id, desc.width, desc.height))
    }

    fn create_input_layout(&self, desc: &InputLayoutDescriptor) -> Result<GpuInputLayout, DeviceError> {
        let mut state = self.state.lock();
        Self::take_failure(&mut state, MockOp::CreateInputLayout)?;
        for (i, vb) in desc.vertex_buffers.iter().enumerate() {
            if let Some(attr) = vb.attributes.iter().find(|a| a.offset + a.size() > vb.stride) {
                return Err(DeviceError::InvalidLayout(format!(
                    "attribute {} of buffer {} ends past stride {}",
                    attr.location, i, vb.stride
                )));
            }
        }
        let id = state.layouts;
        state.layouts += 1;
        self.record(DeviceCall::CreateInputLayout { id });
        Ok(GpuInputLayout::new(id, desc.clone()))
    }

    fn create_input_state(&self, desc: &InputStateDescriptor) -> Result<GpuInputState, DeviceError> {
        let mut state = self.state.lock();
        Self::take_failure(&mut state, MockOp::CreateInputState)?;
        let expected = desc.layout.descriptor().vertex_buffers.len();
        if desc.vertex_buffers.len() != expected {
            return Err(DeviceError::InvalidLayout(format!(
                "layout expects {} vertex buffers, got {}",
                expected,
                desc.vertex_buffers.len()
            )));
        }
        for buffer in desc.vertex_buffers.iter().chain(desc.index_buffer) {
            live_buffer(&mut state, buffer)?;
        }
        let id = state.input_states.len() as u64;
        state.input_states.push(true);
        self.record(DeviceCall::CreateInputState {
            id,
            layout_id: desc.layout.id(),
        });
        Ok(GpuInputState::new(
            id,
            desc.layout.clone(),
            desc.vertex_buffers.to_vec(),
            desc.index_buffer.cloned(),
        ))
    }

    fn destroy_input_state(&self, input_state: &GpuInputState) {
        let mut state = self.state.lock();
        if let Some(live) = state.input_states.get_mut(input_state.id() as usize) {
            if *live {
                *live = false;
                self.record(DeviceCall::DestroyInputState { id: input_state.id() });
            }
        }
    }

    fn create_program(&self, desc: &ProgramDescriptor) -> Result<GpuProgram, DeviceError> {
        let mut state = self.state.lock();
        Self::take_failure(&mut state, MockOp::CreateProgram)?;
        let missing = if !desc.vertex.contains("fn vs_main") {
            Some("vertex stage has no `vs_main` entry point")
        } else if !desc.fragment.contains("fn fs_main") {
            Some("fragment stage has no `fs_main` entry point")
        } else {
            None
        };
        if let Some(message) = missing {
            return Err(DeviceError::ProgramCompilation {
                label: desc.label.map(str::to_string),
                message: message.to_string(),
            });
        }
        let id = state.programs;
        state.programs += 1;
        self.record(DeviceCall::CreateProgram {
            id,
            label: desc.label.map(str::to_string),
        });
        Ok(GpuProgram::mock(id))
    }

    fn execute(&self, _target: &RenderTarget, commands: &[DrawCommand]) -> Result<(), DeviceError> {
        let mut state = self.state.lock();
        Self::take_failure(&mut state, MockOp::Execute)?;
        for command in commands {
            let live = state
                .input_states
                .get(command.input_state.id() as usize)
                .copied()
                .unwrap_or(false);
            if !live {
                return Err(DeviceError::InvalidHandle {
                    reason: format!("input state {} is not live", command.input_state.id()),
                });
            }
        }
        let draws = commands
            .iter()
            .map(|command| DrawRecord {
                program_id: command.program.id(),
                input_state_id: command.input_state.id(),
                index_count: command.index_count,
                instance_count: command.instance_count,
                uniform_groups: command.uniforms.iter().map(|u| u.group).collect(),
                texture_ids: command.textures.iter().map(|t| t.texture.id()).collect(),
            })
            .collect();
        self.record(DeviceCall::Execute { draws });
        Ok(())
    }
}
