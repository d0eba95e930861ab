use crate::context::GpuContext;
use crate::convert::{
    UNIFORM_SLOT, UniformStaging, clear_color, copy_aligned, index_format, primitive_state,
    vertex_format,
};
use crate::shaders;
use celview_common::Color;
use celview_render::layout::{match_signature, standard_inputs};
use celview_render::{
    BufferDesc, BufferId, BufferKind, DeviceError, FillMode, GraphicsDevice, IndexFormat, LayoutId,
    RasterizerDesc, RasterizerId, Resource, ShaderId, ShaderInput, ShaderProgram, ShaderStage,
    VertexLayout, ViewportRect,
};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use wgpu::util::DeviceExt;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const INITIAL_ARENA_SLOTS: u64 = 64;

enum DeviceBuffer {
    Native {
        buffer: wgpu::Buffer,
        kind: BufferKind,
    },
    /// CPU copy; snapshotted into the uniform arena at each draw.
    Constant { shadow: Vec<u8> },
}

struct CompiledShader {
    module: wgpu::ShaderModule,
    stage: ShaderStage,
    entry: &'static str,
    inputs: Vec<ShaderInput>,
}

struct InputLayout {
    stride: u32,
    attributes: Vec<wgpu::VertexAttribute>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    layout: LayoutId,
    rasterizer: RasterizerId,
    vertex: ShaderId,
    pixel: ShaderId,
}

#[derive(Default)]
struct Bindings {
    shaders: Option<(ShaderId, ShaderId)>,
    rasterizer: Option<RasterizerId>,
    layout: Option<LayoutId>,
    vertex: Option<(BufferId, u32, u32)>,
    index: Option<(BufferId, IndexFormat)>,
    constants: HashMap<(ShaderStage, u32), BufferId>,
}

struct RecordedDraw {
    pipeline: PipelineKey,
    vertex: (BufferId, u32),
    index: (BufferId, IndexFormat),
    object_offset: u32,
    frame_offset: u32,
    index_count: u32,
    first_index: u32,
    base_vertex: i32,
}

struct FrameRecording {
    clear: Color,
    viewport: Option<ViewportRect>,
    draws: Vec<RecordedDraw>,
}

/// Dynamic-offset uniform buffer backing both constant-buffer groups.
struct UniformArena {
    buffer: wgpu::Buffer,
    capacity: u64,
    object_group: wgpu::BindGroup,
    frame_group: wgpu::BindGroup,
}

impl UniformArena {
    fn new(
        device: &wgpu::Device,
        object_layout: &wgpu::BindGroupLayout,
        frame_layout: &wgpu::BindGroupLayout,
        capacity: u64,
    ) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("uniform_arena"),
            size: capacity,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let group = |label: &str, layout: &wgpu::BindGroupLayout| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &buffer,
                        offset: 0,
                        size: wgpu::BufferSize::new(UNIFORM_SLOT),
                    }),
                }],
            })
        };
        let object_group = group("per_object_group", object_layout);
        let frame_group = group("per_frame_group", frame_layout);
        Self {
            buffer,
            capacity,
            object_group,
            frame_group,
        }
    }
}

/// [`GraphicsDevice`] over wgpu, presenting to a window surface.
///
/// Calls are recorded between `begin_frame` and `end_frame` and replayed into
/// a single render pass with a depth buffer when the frame ends.
pub struct WgpuDevice {
    context: Arc<GpuContext>,
    name: String,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    depth: wgpu::TextureView,
    wireframe: bool,
    next_id: u64,
    buffers: HashMap<BufferId, DeviceBuffer>,
    shaders: HashMap<ShaderId, CompiledShader>,
    layouts: HashMap<LayoutId, InputLayout>,
    rasterizers: HashMap<RasterizerId, RasterizerDesc>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    object_layout: wgpu::BindGroupLayout,
    frame_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    arena: UniformArena,
    staging: UniformStaging,
    bound: Bindings,
    frame: Option<FrameRecording>,
}

impl WgpuDevice {
    /// Create a device presenting to `target`, typically an `Arc<Window>`.
    pub fn new(
        context: Arc<GpuContext>,
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
    ) -> Result<Self, DeviceError> {
        let surface = context
            .instance()
            .create_surface(target)
            .map_err(|e| DeviceError::Surface(e.to_string()))?;

        let adapter = pollster::block_on(context.instance().request_adapter(
            &wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            },
        ))
        .ok_or_else(|| DeviceError::Creation {
            what: "adapter",
            message: format!("no {} adapter can present to this window", context.backend()),
        })?;
        let info = adapter.get_info();

        let optional = adapter.features() & wgpu::Features::POLYGON_MODE_LINE;
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("celview_device"),
                required_features: optional,
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .map_err(|e| DeviceError::Creation {
            what: "device",
            message: e.to_string(),
        })?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first())
            .copied()
            .ok_or_else(|| DeviceError::Surface("surface reports no formats".into()))?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let uniform_layout = |label: &str, visibility: wgpu::ShaderStages| {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: wgpu::BufferSize::new(UNIFORM_SLOT),
                    },
                    count: None,
                }],
            })
        };
        let object_layout = uniform_layout("per_object_layout", wgpu::ShaderStages::VERTEX);
        let frame_layout = uniform_layout("per_frame_layout", wgpu::ShaderStages::FRAGMENT);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("pipeline_layout"),
            bind_group_layouts: &[&object_layout, &frame_layout],
            push_constant_ranges: &[],
        });
        let arena = UniformArena::new(
            &device,
            &object_layout,
            &frame_layout,
            INITIAL_ARENA_SLOTS * UNIFORM_SLOT,
        );
        let depth = create_depth_texture(&device, config.width, config.height);

        let name = format!("{} ({})", info.name, info.backend.to_str());
        info!(adapter = %name, ?format, "graphics device created");

        Ok(Self {
            context,
            name,
            device,
            queue,
            surface,
            config,
            depth,
            wireframe: optional.contains(wgpu::Features::POLYGON_MODE_LINE),
            next_id: 1,
            buffers: HashMap::new(),
            shaders: HashMap::new(),
            layouts: HashMap::new(),
            rasterizers: HashMap::new(),
            pipelines: HashMap::new(),
            object_layout,
            frame_layout,
            pipeline_layout,
            arena,
            staging: UniformStaging::default(),
            bound: Bindings::default(),
            frame: None,
        })
    }

    /// Reconfigure the surface and depth target. Zero sizes clamp to one pixel.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.config.width = width.max(1);
        self.config.height = height.max(1);
        self.surface.configure(&self.device, &self.config);
        self.depth = create_depth_texture(&self.device, self.config.width, self.config.height);
        debug!(
            width = self.config.width,
            height = self.config.height,
            "surface reconfigured"
        );
    }

    pub fn set_vsync(&mut self, enabled: bool) {
        self.config.present_mode = if enabled {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        };
        self.surface.configure(&self.device, &self.config);
    }

    pub fn surface_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn context(&self) -> &Arc<GpuContext> {
        &self.context
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn with_error_scope<T>(&self, f: impl FnOnce(&wgpu::Device) -> T) -> Result<T, String> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(&self.device);
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => Err(err.to_string()),
            None => Ok(value),
        }
    }

    fn ensure_pipeline(&mut self, key: PipelineKey) -> Result<(), DeviceError> {
        if self.pipelines.contains_key(&key) {
            return Ok(());
        }
        let layout = self
            .layouts
            .get(&key.layout)
            .ok_or(DeviceError::UnknownResource(key.layout.into()))?;
        let raster = self
            .rasterizers
            .get(&key.rasterizer)
            .ok_or(DeviceError::UnknownResource(key.rasterizer.into()))?;
        let vs = self
            .shaders
            .get(&key.vertex)
            .ok_or(DeviceError::UnknownResource(key.vertex.into()))?;
        let ps = self
            .shaders
            .get(&key.pixel)
            .ok_or(DeviceError::UnknownResource(key.pixel.into()))?;
        if vs.stage != ShaderStage::Vertex || ps.stage != ShaderStage::Pixel {
            return Err(DeviceError::Validation("shader bound to the wrong stage".into()));
        }

        let buffers = [wgpu::VertexBufferLayout {
            array_stride: layout.stride as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &layout.attributes,
        }];
        let format = self.config.format;
        let pipeline_layout = &self.pipeline_layout;
        let primitive = primitive_state(raster);
        let pipeline = self
            .with_error_scope(|device| {
                device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some("mesh_pipeline"),
                    layout: Some(pipeline_layout),
                    vertex: wgpu::VertexState {
                        module: &vs.module,
                        entry_point: Some(vs.entry),
                        compilation_options: Default::default(),
                        buffers: &buffers,
                    },
                    fragment: Some(wgpu::FragmentState {
                        module: &ps.module,
                        entry_point: Some(ps.entry),
                        compilation_options: Default::default(),
                        targets: &[Some(wgpu::ColorTargetState {
                            format,
                            blend: Some(wgpu::BlendState::REPLACE),
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                    }),
                    primitive,
                    depth_stencil: Some(wgpu::DepthStencilState {
                        format: DEPTH_FORMAT,
                        depth_write_enabled: true,
                        depth_compare: wgpu::CompareFunction::Less,
                        stencil: Default::default(),
                        bias: Default::default(),
                    }),
                    multisample: Default::default(),
                    multiview: None,
                    cache: None,
                })
            })
            .map_err(|message| DeviceError::Creation {
                what: "render pipeline",
                message,
            })?;
        debug!(?key, "render pipeline created");
        self.pipelines.insert(key, pipeline);
        Ok(())
    }

    fn constant_shadow(&self, stage: ShaderStage) -> Result<&[u8], DeviceError> {
        let id = self
            .bound
            .constants
            .get(&(stage, 0))
            .ok_or_else(|| DeviceError::Validation(format!("no {stage:?} constant buffer bound")))?;
        match self.buffers.get(id) {
            Some(DeviceBuffer::Constant { shadow }) => Ok(shadow),
            Some(DeviceBuffer::Native { kind, .. }) => Err(DeviceError::Validation(format!(
                "{id:?} is a {kind:?} buffer bound as constants"
            ))),
            None => Err(DeviceError::UnknownResource((*id).into())),
        }
    }

    fn native_buffer(&self, id: BufferId, expected: BufferKind) -> Result<&wgpu::Buffer, DeviceError> {
        match self.buffers.get(&id) {
            Some(DeviceBuffer::Native { buffer, kind }) if *kind == expected => Ok(buffer),
            Some(_) => Err(DeviceError::Validation(format!(
                "{id:?} is not a {expected:?} buffer"
            ))),
            None => Err(DeviceError::UnknownResource(id.into())),
        }
    }

    fn grow_arena(&mut self, needed: u64) {
        let capacity = needed.next_power_of_two().max(self.arena.capacity);
        debug!(capacity, "growing uniform arena");
        self.arena = UniformArena::new(
            &self.device,
            &self.object_layout,
            &self.frame_layout,
            capacity,
        );
    }

    fn submit(&mut self, frame: FrameRecording) -> Result<(), DeviceError> {
        if self.staging.len() > self.arena.capacity {
            self.grow_arena(self.staging.len());
        }
        if !self.staging.is_empty() {
            self.queue
                .write_buffer(&self.arena.buffer, 0, self.staging.as_bytes());
        }

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                warn!("surface lost, reconfiguring and dropping the frame");
                self.surface.configure(&self.device, &self.config);
                return Ok(());
            }
            Err(err) => return Err(DeviceError::Surface(err.to_string())),
        };
        let view = output.texture.create_view(&Default::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("main_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear_color(frame.clear)),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            if let Some(rect) = frame.viewport {
                let width = rect.width.clamp(1.0, self.config.width as f32);
                let height = rect.height.clamp(1.0, self.config.height as f32);
                pass.set_viewport(rect.x, rect.y, width, height, rect.min_depth, rect.max_depth);
            }

            for draw in &frame.draws {
                let (Some(pipeline), Ok(vb), Ok(ib)) = (
                    self.pipelines.get(&draw.pipeline),
                    self.native_buffer(draw.vertex.0, BufferKind::Vertex),
                    self.native_buffer(draw.index.0, BufferKind::Index),
                ) else {
                    warn!("resources released mid-frame, skipping draw");
                    continue;
                };
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, &self.arena.object_group, &[draw.object_offset]);
                pass.set_bind_group(1, &self.arena.frame_group, &[draw.frame_offset]);
                pass.set_vertex_buffer(0, vb.slice(draw.vertex.1 as u64..));
                pass.set_index_buffer(ib.slice(..), index_format(draw.index.1));
                pass.draw_indexed(
                    draw.first_index..draw.first_index + draw.index_count,
                    draw.base_vertex,
                    0..1,
                );
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

impl GraphicsDevice for WgpuDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn builtin_program(&self) -> ShaderProgram {
        ShaderProgram {
            label: "lit",
            source: Cow::Borrowed(shaders::LIT_SHADER),
            vertex_entry: "VS",
            pixel_entry: "PS",
            inputs: standard_inputs(),
        }
    }

    fn compile_shader(
        &mut self,
        program: &ShaderProgram,
        stage: ShaderStage,
    ) -> Result<ShaderId, DeviceError> {
        let entry = program.entry(stage);
        let module = self
            .with_error_scope(|device| {
                device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(program.label),
                    source: wgpu::ShaderSource::Wgsl(program.source.clone()),
                })
            })
            .map_err(|message| DeviceError::ShaderCompile {
                entry: entry.to_string(),
                message,
            })?;
        let id = ShaderId(self.next_id());
        self.shaders.insert(
            id,
            CompiledShader {
                module,
                stage,
                entry,
                inputs: program.inputs.clone(),
            },
        );
        debug!(?id, entry, "shader compiled");
        Ok(id)
    }

    fn create_rasterizer_state(
        &mut self,
        desc: &RasterizerDesc,
    ) -> Result<RasterizerId, DeviceError> {
        if desc.fill == FillMode::Wireframe && !self.wireframe {
            return Err(DeviceError::Creation {
                what: "rasterizer state",
                message: "wireframe fill is not supported by this adapter".into(),
            });
        }
        let id = RasterizerId(self.next_id());
        self.rasterizers.insert(id, *desc);
        Ok(id)
    }

    fn create_buffer(&mut self, desc: &BufferDesc<'_>) -> Result<BufferId, DeviceError> {
        if desc.size == 0 {
            return Err(DeviceError::Creation {
                what: "buffer",
                message: format!("{} has zero size", desc.label),
            });
        }
        let buffer = match desc.kind {
            BufferKind::Constant => {
                if desc.size > UNIFORM_SLOT {
                    return Err(DeviceError::Creation {
                        what: "constant buffer",
                        message: format!(
                            "{} is {} bytes, the limit is {UNIFORM_SLOT}",
                            desc.label, desc.size
                        ),
                    });
                }
                let mut shadow = vec![0; desc.size as usize];
                if let Some(contents) = desc.contents {
                    let n = contents.len().min(shadow.len());
                    shadow[..n].copy_from_slice(&contents[..n]);
                }
                DeviceBuffer::Constant { shadow }
            }
            kind @ (BufferKind::Vertex | BufferKind::Index) => {
                let role = if kind == BufferKind::Vertex {
                    wgpu::BufferUsages::VERTEX
                } else {
                    wgpu::BufferUsages::INDEX
                };
                let usage = role | wgpu::BufferUsages::COPY_DST;
                let buffer = match desc.contents {
                    Some(contents) => {
                        self.device
                            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                                label: Some(desc.label),
                                contents,
                                usage,
                            })
                    }
                    None => self.device.create_buffer(&wgpu::BufferDescriptor {
                        label: Some(desc.label),
                        size: copy_aligned(desc.size),
                        usage,
                        mapped_at_creation: false,
                    }),
                };
                DeviceBuffer::Native { buffer, kind }
            }
        };
        let id = BufferId(self.next_id());
        self.buffers.insert(id, buffer);
        Ok(id)
    }

    fn create_input_layout(
        &mut self,
        layout: &VertexLayout,
        vertex_shader: ShaderId,
    ) -> Result<LayoutId, DeviceError> {
        let shader = self
            .shaders
            .get(&vertex_shader)
            .ok_or(DeviceError::UnknownResource(vertex_shader.into()))?;
        if shader.stage != ShaderStage::Vertex {
            return Err(DeviceError::LayoutMismatch(format!(
                "{vertex_shader:?} is not a vertex shader"
            )));
        }
        let attributes = match_signature(layout, &shader.inputs)?
            .into_iter()
            .map(|bound| {
                Ok(wgpu::VertexAttribute {
                    format: vertex_format(bound.format)?,
                    offset: bound.offset as u64,
                    shader_location: bound.location,
                })
            })
            .collect::<Result<Vec<_>, DeviceError>>()?;
        let id = LayoutId(self.next_id());
        self.layouts.insert(
            id,
            InputLayout {
                stride: layout.stride(),
                attributes,
            },
        );
        Ok(id)
    }

    fn update_buffer(&mut self, buffer: BufferId, data: &[u8]) -> Result<(), DeviceError> {
        match self.buffers.get_mut(&buffer) {
            Some(DeviceBuffer::Constant { shadow }) => {
                if data.len() > shadow.len() {
                    return Err(DeviceError::Validation(format!(
                        "{} byte update into a {} byte constant buffer",
                        data.len(),
                        shadow.len()
                    )));
                }
                shadow[..data.len()].copy_from_slice(data);
                Ok(())
            }
            Some(DeviceBuffer::Native { buffer, .. }) => {
                let padded = copy_aligned(data.len() as u64) as usize;
                if padded > buffer.size() as usize {
                    return Err(DeviceError::Validation(format!(
                        "{} byte update into a {} byte buffer",
                        data.len(),
                        buffer.size()
                    )));
                }
                if padded == data.len() {
                    self.queue.write_buffer(buffer, 0, data);
                } else {
                    let mut bytes = data.to_vec();
                    bytes.resize(padded, 0);
                    self.queue.write_buffer(buffer, 0, &bytes);
                }
                Ok(())
            }
            None => Err(DeviceError::UnknownResource(buffer.into())),
        }
    }

    fn begin_frame(&mut self, clear: Color) -> Result<(), DeviceError> {
        if self.frame.is_some() {
            return Err(DeviceError::Validation("frame already begun".into()));
        }
        self.staging.clear();
        self.frame = Some(FrameRecording {
            clear,
            viewport: None,
            draws: Vec::new(),
        });
        Ok(())
    }

    fn set_viewport(&mut self, rect: ViewportRect) {
        if let Some(frame) = self.frame.as_mut() {
            frame.viewport = Some(rect);
        }
    }

    fn bind_shaders(&mut self, vertex: ShaderId, pixel: ShaderId) {
        self.bound.shaders = Some((vertex, pixel));
    }

    fn bind_rasterizer_state(&mut self, state: RasterizerId) {
        self.bound.rasterizer = Some(state);
    }

    fn bind_input_layout(&mut self, layout: LayoutId) {
        self.bound.layout = Some(layout);
    }

    fn bind_vertex_buffer(&mut self, slot: u32, buffer: BufferId, stride: u32, offset: u32) {
        if slot != 0 {
            warn!(slot, "only vertex buffer slot 0 is used");
            return;
        }
        self.bound.vertex = Some((buffer, stride, offset));
    }

    fn bind_index_buffer(&mut self, buffer: BufferId, format: IndexFormat) {
        self.bound.index = Some((buffer, format));
    }

    fn bind_constant_buffer(&mut self, stage: ShaderStage, slot: u32, buffer: BufferId) {
        self.bound.constants.insert((stage, slot), buffer);
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        first_index: u32,
        base_vertex: i32,
    ) -> Result<(), DeviceError> {
        if self.frame.is_none() {
            return Err(DeviceError::Validation("draw outside of a frame".into()));
        }
        let missing = |what: &str| DeviceError::Validation(format!("no {what} bound"));
        let (vertex, pixel) = self.bound.shaders.ok_or_else(|| missing("shaders"))?;
        let rasterizer = self.bound.rasterizer.ok_or_else(|| missing("rasterizer state"))?;
        let layout = self.bound.layout.ok_or_else(|| missing("input layout"))?;
        let (vb, stride, offset) = self.bound.vertex.ok_or_else(|| missing("vertex buffer"))?;
        let (ib, format) = self.bound.index.ok_or_else(|| missing("index buffer"))?;

        let layout_stride = self
            .layouts
            .get(&layout)
            .map(|l| l.stride)
            .ok_or(DeviceError::UnknownResource(layout.into()))?;
        if stride != layout_stride {
            return Err(DeviceError::Validation(format!(
                "vertex stride {stride} does not match layout stride {layout_stride}"
            )));
        }
        self.native_buffer(vb, BufferKind::Vertex)?;
        self.native_buffer(ib, BufferKind::Index)?;

        let key = PipelineKey {
            layout,
            rasterizer,
            vertex,
            pixel,
        };
        self.ensure_pipeline(key)?;

        let object = self.constant_shadow(ShaderStage::Vertex)?.to_vec();
        let frame_constants = self.constant_shadow(ShaderStage::Pixel)?.to_vec();
        let object_offset = self.staging.push(&object)?;
        let frame_offset = self.staging.push(&frame_constants)?;

        if let Some(frame) = self.frame.as_mut() {
            frame.draws.push(RecordedDraw {
                pipeline: key,
                vertex: (vb, offset),
                index: (ib, format),
                object_offset,
                frame_offset,
                index_count,
                first_index,
                base_vertex,
            });
        }
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), DeviceError> {
        let frame = self
            .frame
            .take()
            .ok_or_else(|| DeviceError::Validation("end_frame without begin_frame".into()))?;
        self.submit(frame)
    }

    fn abort_frame(&mut self) {
        if let Some(frame) = self.frame.take() {
            tracing::debug!(draws = frame.draws.len(), "frame dropped unpresented");
            self.staging.clear();
        }
    }

    fn release(&mut self, resource: Resource) {
        let removed = match resource {
            Resource::Buffer(id) => self.buffers.remove(&id).is_some(),
            Resource::Shader(id) => {
                self.pipelines
                    .retain(|key, _| key.vertex != id && key.pixel != id);
                self.shaders.remove(&id).is_some()
            }
            Resource::Layout(id) => {
                self.pipelines.retain(|key, _| key.layout != id);
                self.layouts.remove(&id).is_some()
            }
            Resource::Rasterizer(id) => {
                self.pipelines.retain(|key, _| key.rasterizer != id);
                self.rasterizers.remove(&id).is_some()
            }
        };
        if !removed {
            warn!(?resource, "release of a resource that is not live");
        }
    }
}

fn create_depth_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth_texture"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&Default::default())
}
