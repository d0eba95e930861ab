//! Headless device that records every call into a shared journal.
//!
//! Nothing is drawn. Instead each `draw_indexed` is validated against the
//! bound state the way a debug layer would: every required binding present
//! and live, buffer kinds correct, layout stride equal to the bound stride,
//! and every fetched index inside the bound vertex buffer.

use crate::device::{
    BufferDesc, BufferId, BufferKind, GraphicsDevice, IndexFormat, LayoutId, RasterizerDesc,
    RasterizerId, Resource, ShaderId, ShaderProgram, ShaderStage, ViewportRect,
};
use crate::error::DeviceError;
use crate::layout::{ShaderInput, VertexLayout, match_signature, standard_inputs};
use celview_common::Color;
use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

/// One recorded device call.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CompileShader {
        id: ShaderId,
        stage: ShaderStage,
        entry: String,
    },
    CreateRasterizerState {
        id: RasterizerId,
        desc: RasterizerDesc,
    },
    CreateBuffer {
        id: BufferId,
        kind: BufferKind,
        size: u64,
        label: String,
    },
    CreateInputLayout {
        id: LayoutId,
        stride: u32,
    },
    UpdateBuffer {
        id: BufferId,
        size: usize,
    },
    BeginFrame {
        clear: Color,
    },
    SetViewport(ViewportRect),
    BindShaders {
        vertex: ShaderId,
        pixel: ShaderId,
    },
    BindRasterizerState(RasterizerId),
    BindInputLayout(LayoutId),
    BindVertexBuffer {
        slot: u32,
        buffer: BufferId,
        stride: u32,
        offset: u32,
    },
    BindIndexBuffer {
        buffer: BufferId,
        format: IndexFormat,
    },
    BindConstantBuffer {
        stage: ShaderStage,
        slot: u32,
        buffer: BufferId,
    },
    DrawIndexed {
        index_count: u32,
        first_index: u32,
        base_vertex: i32,
    },
    EndFrame,
    AbortFrame,
    Release(Resource),
}

/// A validated draw and the state it consumed.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub index_count: u32,
    pub vertex_buffer: BufferId,
    pub index_buffer: BufferId,
    pub layout: LayoutId,
    /// Vertices addressable through the bound vertex buffer.
    pub vertex_count: u32,
    /// Largest vertex index fetched by the draw.
    pub max_index: u32,
    /// Contents of the vertex-stage constant buffer in slot 0 at draw time.
    pub vertex_constants: Vec<u8>,
}

/// Everything a [`RecordingDevice`] observed. Outlives the device.
#[derive(Debug, Default)]
pub struct Journal {
    commands: Vec<Command>,
    draws: Vec<DrawCall>,
    created: Vec<Resource>,
    released: Vec<Resource>,
    double_releases: Vec<Resource>,
    buffer_kinds: BTreeMap<BufferId, BufferKind>,
    frames: u32,
}

impl Journal {
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn draw_calls(&self) -> &[DrawCall] {
        &self.draws
    }

    /// Resources in creation order.
    pub fn created(&self) -> &[Resource] {
        &self.created
    }

    /// Resources in release order.
    pub fn released(&self) -> &[Resource] {
        &self.released
    }

    /// Resources released more than once.
    pub fn double_releases(&self) -> &[Resource] {
        &self.double_releases
    }

    /// Created and not yet released.
    pub fn live(&self) -> Vec<Resource> {
        self.created
            .iter()
            .filter(|r| !self.released.contains(r))
            .copied()
            .collect()
    }

    pub fn buffers_created(&self, kind: BufferKind) -> usize {
        self.buffer_kinds.values().filter(|k| **k == kind).count()
    }

    pub fn buffers_released(&self, kind: BufferKind) -> usize {
        self.released
            .iter()
            .filter(|r| matches!(r, Resource::Buffer(id) if self.buffer_kinds.get(id) == Some(&kind)))
            .count()
    }

    pub fn layouts_created(&self) -> usize {
        self.created
            .iter()
            .filter(|r| matches!(r, Resource::Layout(_)))
            .count()
    }

    pub fn layouts_released(&self) -> usize {
        self.released
            .iter()
            .filter(|r| matches!(r, Resource::Layout(_)))
            .count()
    }

    /// Completed frames.
    pub fn frames(&self) -> u32 {
        self.frames
    }
}

struct BufferRecord {
    kind: BufferKind,
    size: u64,
    data: Vec<u8>,
}

#[derive(Default)]
struct Bindings {
    shaders: Option<(ShaderId, ShaderId)>,
    rasterizer: Option<RasterizerId>,
    layout: Option<LayoutId>,
    vertex: Option<(BufferId, u32, u32)>,
    index: Option<(BufferId, IndexFormat)>,
    constants: BTreeMap<(ShaderStage, u32), BufferId>,
}

/// Headless [`GraphicsDevice`] for tests and dry runs.
pub struct RecordingDevice {
    journal: Rc<RefCell<Journal>>,
    next_id: u64,
    inputs: Vec<ShaderInput>,
    buffers: HashMap<BufferId, BufferRecord>,
    shaders: HashMap<ShaderId, ShaderStage>,
    layouts: HashMap<LayoutId, u32>,
    rasterizers: HashMap<RasterizerId, RasterizerDesc>,
    bound: Bindings,
    in_frame: bool,
    creations: usize,
    fail_creation_at: Option<usize>,
    fail_stage: Option<ShaderStage>,
    draws: usize,
    fail_draw_at: Option<usize>,
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self {
            journal: Rc::default(),
            next_id: 1,
            inputs: standard_inputs(),
            buffers: HashMap::new(),
            shaders: HashMap::new(),
            layouts: HashMap::new(),
            rasterizers: HashMap::new(),
            bound: Bindings::default(),
            in_frame: false,
            creations: 0,
            fail_creation_at: None,
            fail_stage: None,
            draws: 0,
            fail_draw_at: None,
        }
    }

    /// Shared handle to the journal; stays readable after the device is gone.
    pub fn journal(&self) -> Rc<RefCell<Journal>> {
        Rc::clone(&self.journal)
    }

    /// Fail the `n`-th creation call (0-based). Shader compiles and every
    /// `create_*` call count.
    pub fn fail_creation_at(mut self, n: usize) -> Self {
        self.fail_creation_at = Some(n);
        self
    }

    /// Make compilation of one shader stage fail.
    pub fn fail_shader(mut self, stage: ShaderStage) -> Self {
        self.fail_stage = Some(stage);
        self
    }

    /// Fail the `n`-th `draw_indexed` call (0-based, counted across frames).
    pub fn fail_draw_at(mut self, n: usize) -> Self {
        self.fail_draw_at = Some(n);
        self
    }

    /// Replace the vertex shader signature of the built-in program.
    pub fn with_shader_inputs(mut self, inputs: Vec<ShaderInput>) -> Self {
        self.inputs = inputs;
        self
    }

    fn record(&self, command: Command) {
        self.journal.borrow_mut().commands.push(command);
    }

    fn next_creation(&mut self, what: &'static str) -> Result<u64, DeviceError> {
        let n = self.creations;
        self.creations += 1;
        if self.fail_creation_at == Some(n) {
            return Err(DeviceError::Creation {
                what,
                message: format!("injected failure at creation #{n}"),
            });
        }
        let id = self.next_id;
        self.next_id += 1;
        Ok(id)
    }

    fn created(&self, resource: Resource) {
        self.journal.borrow_mut().created.push(resource);
    }

    fn buffer(&self, id: BufferId, expected: BufferKind) -> Result<&BufferRecord, DeviceError> {
        let record = self
            .buffers
            .get(&id)
            .ok_or(DeviceError::UnknownResource(Resource::Buffer(id)))?;
        if record.kind != expected {
            return Err(DeviceError::Validation(format!(
                "{id:?} is a {:?} buffer, expected {expected:?}",
                record.kind
            )));
        }
        Ok(record)
    }

    fn validate_draw(
        &self,
        index_count: u32,
        first_index: u32,
        base_vertex: i32,
    ) -> Result<DrawCall, DeviceError> {
        let missing = |what: &str| DeviceError::Validation(format!("no {what} bound"));
        if !self.in_frame {
            return Err(DeviceError::Validation("draw outside of a frame".into()));
        }

        let (vs, ps) = self.bound.shaders.ok_or_else(|| missing("shaders"))?;
        for (id, stage) in [(vs, ShaderStage::Vertex), (ps, ShaderStage::Pixel)] {
            match self.shaders.get(&id) {
                Some(s) if *s == stage => {}
                Some(s) => {
                    return Err(DeviceError::Validation(format!(
                        "{id:?} is a {s:?} shader bound as {stage:?}"
                    )));
                }
                None => return Err(DeviceError::UnknownResource(Resource::Shader(id))),
            }
        }

        let rasterizer = self.bound.rasterizer.ok_or_else(|| missing("rasterizer state"))?;
        if !self.rasterizers.contains_key(&rasterizer) {
            return Err(DeviceError::UnknownResource(Resource::Rasterizer(rasterizer)));
        }

        let layout = self.bound.layout.ok_or_else(|| missing("input layout"))?;
        let layout_stride = *self
            .layouts
            .get(&layout)
            .ok_or(DeviceError::UnknownResource(Resource::Layout(layout)))?;

        let (vb, stride, offset) = self.bound.vertex.ok_or_else(|| missing("vertex buffer"))?;
        let vertex = self.buffer(vb, BufferKind::Vertex)?;
        if stride != layout_stride {
            return Err(DeviceError::Validation(format!(
                "vertex stride {stride} does not match layout stride {layout_stride}"
            )));
        }
        let vertex_count = (vertex.size.saturating_sub(offset as u64) / stride.max(1) as u64) as u32;

        let (ib, format) = self.bound.index.ok_or_else(|| missing("index buffer"))?;
        let index = self.buffer(ib, BufferKind::Index)?;

        let mut vertex_constants = Vec::new();
        for stage in [ShaderStage::Vertex, ShaderStage::Pixel] {
            let cb = *self
                .bound
                .constants
                .get(&(stage, 0))
                .ok_or_else(|| missing(&format!("{stage:?} constant buffer")))?;
            let record = self.buffer(cb, BufferKind::Constant)?;
            if stage == ShaderStage::Vertex {
                vertex_constants = record.data.clone();
            }
        }

        let width = format.size() as usize;
        let start = first_index as usize * width;
        let end = start + index_count as usize * width;
        if end > index.data.len() {
            return Err(DeviceError::Validation(format!(
                "indices {first_index}..{} exceed the index buffer ({} bytes)",
                first_index + index_count,
                index.data.len()
            )));
        }
        let mut max_index = 0;
        for chunk in index.data[start..end].chunks_exact(width) {
            let raw = match format {
                IndexFormat::Uint16 => u16::from_le_bytes([chunk[0], chunk[1]]) as i64,
                IndexFormat::Uint32 => {
                    u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as i64
                }
            };
            let fetched = raw + base_vertex as i64;
            if fetched < 0 || fetched >= vertex_count as i64 {
                return Err(DeviceError::Validation(format!(
                    "index {fetched} is outside the {vertex_count} bound vertices"
                )));
            }
            max_index = max_index.max(fetched as u32);
        }

        Ok(DrawCall {
            index_count,
            vertex_buffer: vb,
            index_buffer: ib,
            layout,
            vertex_count,
            max_index,
            vertex_constants,
        })
    }
}

impl GraphicsDevice for RecordingDevice {
    fn name(&self) -> &str {
        "recording"
    }

    fn builtin_program(&self) -> ShaderProgram {
        ShaderProgram {
            label: "recording",
            source: Cow::Borrowed(""),
            vertex_entry: "VS",
            pixel_entry: "PS",
            inputs: self.inputs.clone(),
        }
    }

    fn compile_shader(
        &mut self,
        program: &ShaderProgram,
        stage: ShaderStage,
    ) -> Result<ShaderId, DeviceError> {
        let entry = program.entry(stage);
        if self.fail_stage == Some(stage) {
            return Err(DeviceError::ShaderCompile {
                entry: entry.to_string(),
                message: "injected compile failure".into(),
            });
        }
        let id = ShaderId(self.next_creation("shader")?);
        self.shaders.insert(id, stage);
        self.created(id.into());
        self.record(Command::CompileShader {
            id,
            stage,
            entry: entry.to_string(),
        });
        Ok(id)
    }

    fn create_rasterizer_state(
        &mut self,
        desc: &RasterizerDesc,
    ) -> Result<RasterizerId, DeviceError> {
        let id = RasterizerId(self.next_creation("rasterizer state")?);
        self.rasterizers.insert(id, *desc);
        self.created(id.into());
        self.record(Command::CreateRasterizerState { id, desc: *desc });
        Ok(id)
    }

    fn create_buffer(&mut self, desc: &BufferDesc<'_>) -> Result<BufferId, DeviceError> {
        if desc.size == 0 {
            return Err(DeviceError::Creation {
                what: "buffer",
                message: format!("{} has zero size", desc.label),
            });
        }
        if let Some(contents) = desc.contents {
            if contents.len() as u64 != desc.size {
                return Err(DeviceError::Creation {
                    what: "buffer",
                    message: format!(
                        "{}: {} bytes of contents for a {} byte buffer",
                        desc.label,
                        contents.len(),
                        desc.size
                    ),
                });
            }
        }
        let id = BufferId(self.next_creation("buffer")?);
        let data = desc
            .contents
            .map(<[u8]>::to_vec)
            .unwrap_or_else(|| vec![0; desc.size as usize]);
        self.buffers.insert(
            id,
            BufferRecord {
                kind: desc.kind,
                size: desc.size,
                data,
            },
        );
        {
            let mut journal = self.journal.borrow_mut();
            journal.buffer_kinds.insert(id, desc.kind);
            journal.created.push(id.into());
        }
        self.record(Command::CreateBuffer {
            id,
            kind: desc.kind,
            size: desc.size,
            label: desc.label.to_string(),
        });
        Ok(id)
    }

    fn create_input_layout(
        &mut self,
        layout: &VertexLayout,
        vertex_shader: ShaderId,
    ) -> Result<LayoutId, DeviceError> {
        match self.shaders.get(&vertex_shader) {
            Some(ShaderStage::Vertex) => {}
            Some(_) => {
                return Err(DeviceError::LayoutMismatch(format!(
                    "{vertex_shader:?} is not a vertex shader"
                )));
            }
            None => return Err(DeviceError::UnknownResource(vertex_shader.into())),
        }
        match_signature(layout, &self.inputs)?;
        let id = LayoutId(self.next_creation("input layout")?);
        self.layouts.insert(id, layout.stride());
        self.created(id.into());
        self.record(Command::CreateInputLayout {
            id,
            stride: layout.stride(),
        });
        Ok(id)
    }

    fn update_buffer(&mut self, buffer: BufferId, data: &[u8]) -> Result<(), DeviceError> {
        let record = self
            .buffers
            .get_mut(&buffer)
            .ok_or(DeviceError::UnknownResource(buffer.into()))?;
        if data.len() as u64 > record.size {
            return Err(DeviceError::Validation(format!(
                "{} byte update into a {} byte buffer",
                data.len(),
                record.size
            )));
        }
        record.data[..data.len()].copy_from_slice(data);
        self.record(Command::UpdateBuffer {
            id: buffer,
            size: data.len(),
        });
        Ok(())
    }

    fn begin_frame(&mut self, clear: Color) -> Result<(), DeviceError> {
        if self.in_frame {
            return Err(DeviceError::Validation("frame already begun".into()));
        }
        self.in_frame = true;
        self.record(Command::BeginFrame { clear });
        Ok(())
    }

    fn set_viewport(&mut self, rect: ViewportRect) {
        self.record(Command::SetViewport(rect));
    }

    fn bind_shaders(&mut self, vertex: ShaderId, pixel: ShaderId) {
        self.bound.shaders = Some((vertex, pixel));
        self.record(Command::BindShaders { vertex, pixel });
    }

    fn bind_rasterizer_state(&mut self, state: RasterizerId) {
        self.bound.rasterizer = Some(state);
        self.record(Command::BindRasterizerState(state));
    }

    fn bind_input_layout(&mut self, layout: LayoutId) {
        self.bound.layout = Some(layout);
        self.record(Command::BindInputLayout(layout));
    }

    fn bind_vertex_buffer(&mut self, slot: u32, buffer: BufferId, stride: u32, offset: u32) {
        if slot == 0 {
            self.bound.vertex = Some((buffer, stride, offset));
        }
        self.record(Command::BindVertexBuffer {
            slot,
            buffer,
            stride,
            offset,
        });
    }

    fn bind_index_buffer(&mut self, buffer: BufferId, format: IndexFormat) {
        self.bound.index = Some((buffer, format));
        self.record(Command::BindIndexBuffer { buffer, format });
    }

    fn bind_constant_buffer(&mut self, stage: ShaderStage, slot: u32, buffer: BufferId) {
        self.bound.constants.insert((stage, slot), buffer);
        self.record(Command::BindConstantBuffer {
            stage,
            slot,
            buffer,
        });
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        first_index: u32,
        base_vertex: i32,
    ) -> Result<(), DeviceError> {
        self.record(Command::DrawIndexed {
            index_count,
            first_index,
            base_vertex,
        });
        let n = self.draws;
        self.draws += 1;
        if self.fail_draw_at == Some(n) {
            return Err(DeviceError::Validation(format!("injected failure of draw {n}")));
        }
        let call = self.validate_draw(index_count, first_index, base_vertex)?;
        self.journal.borrow_mut().draws.push(call);
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), DeviceError> {
        if !self.in_frame {
            return Err(DeviceError::Validation("end_frame without begin_frame".into()));
        }
        self.in_frame = false;
        self.record(Command::EndFrame);
        self.journal.borrow_mut().frames += 1;
        Ok(())
    }

    fn abort_frame(&mut self) {
        if self.in_frame {
            self.in_frame = false;
            self.record(Command::AbortFrame);
        }
    }

    fn release(&mut self, resource: Resource) {
        let removed = match resource {
            Resource::Buffer(id) => self.buffers.remove(&id).is_some(),
            Resource::Shader(id) => self.shaders.remove(&id).is_some(),
            Resource::Layout(id) => self.layouts.remove(&id).is_some(),
            Resource::Rasterizer(id) => self.rasterizers.remove(&id).is_some(),
        };
        self.record(Command::Release(resource));
        let mut journal = self.journal.borrow_mut();
        if removed {
            journal.released.push(resource);
        } else {
            tracing::warn!(?resource, "release of a resource that is not live");
            journal.double_releases.push(resource);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{GpuVertex, VertexFormat};

    fn ready_device() -> (RecordingDevice, ShaderId, ShaderId) {
        let mut dev = RecordingDevice::new();
        let program = dev.builtin_program();
        let vs = dev.compile_shader(&program, ShaderStage::Vertex).unwrap();
        let ps = dev.compile_shader(&program, ShaderStage::Pixel).unwrap();
        (dev, vs, ps)
    }

    #[test]
    fn draw_without_bindings_is_rejected() {
        let mut dev = RecordingDevice::new();
        dev.begin_frame(Color::BLACK).unwrap();
        let err = dev.draw_indexed(3, 0, 0).unwrap_err();
        assert!(matches!(err, DeviceError::Validation(msg) if msg.contains("shaders")));
    }

    #[test]
    fn draw_outside_frame_is_rejected() {
        let mut dev = RecordingDevice::new();
        assert!(dev.draw_indexed(3, 0, 0).is_err());
    }

    #[test]
    fn out_of_range_index_is_caught_at_draw() {
        let (mut dev, vs, ps) = ready_device();
        let rs = dev.create_rasterizer_state(&RasterizerDesc::default()).unwrap();
        let verts = [GpuVertex {
            position: [0.0; 4],
            color: [1.0; 4],
            normal: [0.0; 3],
        }; 3];
        let vb = dev
            .create_buffer(&BufferDesc::with_contents(
                "vb",
                BufferKind::Vertex,
                bytemuck::cast_slice(&verts),
            ))
            .unwrap();
        let indices: [u32; 3] = [0, 1, 3];
        let ib = dev
            .create_buffer(&BufferDesc::with_contents(
                "ib",
                BufferKind::Index,
                bytemuck::cast_slice(&indices),
            ))
            .unwrap();
        let layout = dev.create_input_layout(&GpuVertex::layout(), vs).unwrap();
        let cb = dev
            .create_buffer(&BufferDesc::zeroed("cb", BufferKind::Constant, 128))
            .unwrap();

        dev.begin_frame(Color::BLACK).unwrap();
        dev.bind_shaders(vs, ps);
        dev.bind_rasterizer_state(rs);
        dev.bind_input_layout(layout);
        dev.bind_vertex_buffer(0, vb, GpuVertex::layout().stride(), 0);
        dev.bind_index_buffer(ib, IndexFormat::Uint32);
        dev.bind_constant_buffer(ShaderStage::Vertex, 0, cb);
        dev.bind_constant_buffer(ShaderStage::Pixel, 0, cb);
        let err = dev.draw_indexed(3, 0, 0).unwrap_err();
        assert!(matches!(err, DeviceError::Validation(msg) if msg.contains("outside")));
        // the first two indices alone are fine
        dev.draw_indexed(2, 0, 0).unwrap();
        assert_eq!(dev.journal().borrow().draw_calls()[0].max_index, 1);
    }

    #[test]
    fn layout_against_pixel_shader_is_rejected() {
        let (mut dev, _vs, ps) = ready_device();
        assert!(dev.create_input_layout(&GpuVertex::layout(), ps).is_err());
    }

    #[test]
    fn injected_failure_hits_the_nth_creation() {
        let mut dev = RecordingDevice::new().fail_creation_at(1);
        let program = dev.builtin_program();
        assert!(dev.compile_shader(&program, ShaderStage::Vertex).is_ok());
        assert!(dev.compile_shader(&program, ShaderStage::Pixel).is_err());
    }

    #[test]
    fn double_release_is_recorded() {
        let mut dev = RecordingDevice::new();
        let cb = dev
            .create_buffer(&BufferDesc::zeroed("cb", BufferKind::Constant, 16))
            .unwrap();
        dev.release(cb.into());
        dev.release(cb.into());
        let journal = dev.journal();
        let journal = journal.borrow();
        assert_eq!(journal.released(), &[Resource::Buffer(cb)]);
        assert_eq!(journal.double_releases(), &[Resource::Buffer(cb)]);
        assert!(journal.live().is_empty());
    }

    #[test]
    fn zero_sized_buffer_is_rejected() {
        let mut dev = RecordingDevice::new();
        assert!(
            dev.create_buffer(&BufferDesc::zeroed("empty", BufferKind::Index, 0))
                .is_err()
        );
    }
}
