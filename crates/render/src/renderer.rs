use crate::camera::Camera;
use crate::constants::{Light, PerFrame, PerObject};
use crate::device::{
    BufferDesc, BufferId, BufferKind, GraphicsDevice, IndexFormat, LayoutId, RasterizerDesc,
    RasterizerId, Resource, ShaderId, ShaderStage, ViewportRect,
};
use crate::error::{DeviceError, RenderError};
use crate::layout::{GpuVertex, VertexFormat};
use crate::viewport::{
    CullResult, FrameStats, MeshKey, PrepareReport, ViewportHandle, collect_draw_items,
};
use celview_common::{Color, Extent, Mat4};
use celview_scene::{Mesh, ModelId, Scene};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, trace, warn};

/// Lifecycle of a [`DeviceRenderer`].
///
/// `Uninitialized -> DeviceBound -> Ready -> SceneBound`. Drawing is allowed
/// from `Ready` on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererState {
    Uninitialized,
    DeviceBound,
    Ready,
    SceneBound,
}

/// Renderer-agnostic interface driven by a viewer.
///
/// The renderer reads the scene and a camera and never mutates either.
pub trait Renderer {
    fn set_buffer_size(&mut self, width: u32, height: u32);

    fn set_clear_color(&mut self, color: Color);

    /// Upload GPU resources for every mesh of `model`. Idempotent.
    fn register_model(&mut self, scene: &Scene, model: ModelId) -> Result<(), RenderError>;

    /// Register whatever in `scene` is not registered yet. Meshes that fail
    /// are skipped and reported, not fatal.
    fn prepare(&mut self, scene: &Scene) -> Result<PrepareReport, RenderError>;

    /// Bind a scene: registers all of its models.
    fn set_scene(&mut self, scene: &Scene) -> Result<PrepareReport, RenderError>;

    /// Record the camera transform used for `viewport`'s next frames.
    fn update_viewport_transform(&mut self, viewport: ViewportHandle, camera: &Camera);

    /// Decide what to draw. Every instance is visible.
    fn cull(&self, _viewport: ViewportHandle, scene: &Scene) -> CullResult {
        collect_draw_items(scene)
    }

    fn render(
        &mut self,
        viewport: ViewportHandle,
        culled: &CullResult,
    ) -> Result<FrameStats, RenderError>;
}

/// Device objects shared by every draw.
#[derive(Debug, Clone, Copy)]
struct RenderStates {
    vertex_shader: ShaderId,
    pixel_shader: ShaderId,
    rasterizer: RasterizerId,
    per_frame: BufferId,
}

/// GPU resources of one registered mesh.
#[derive(Debug, Clone, Copy)]
struct MeshBuffers {
    vertex_buffer: BufferId,
    index_buffer: BufferId,
    layout: LayoutId,
    per_object: BufferId,
    stride: u32,
    index_count: u32,
}

/// Renderer core over any [`GraphicsDevice`].
///
/// Owns every device object it creates. They are released in reverse order
/// of acquisition when the renderer is dropped or shut down.
pub struct DeviceRenderer<D: GraphicsDevice> {
    device: Option<D>,
    state: RendererState,
    states: Option<RenderStates>,
    meshes: BTreeMap<MeshKey, MeshBuffers>,
    rejected: BTreeSet<MeshKey>,
    acquired: Vec<Resource>,
    extent: Extent,
    clear: Color,
    light: Light,
    rasterizer: RasterizerDesc,
    view_transforms: BTreeMap<ViewportHandle, Mat4>,
}

impl<D: GraphicsDevice> Default for DeviceRenderer<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: GraphicsDevice> DeviceRenderer<D> {
    pub fn new() -> Self {
        Self {
            device: None,
            state: RendererState::Uninitialized,
            states: None,
            meshes: BTreeMap::new(),
            rejected: BTreeSet::new(),
            acquired: Vec::new(),
            extent: Extent::new(1, 1),
            clear: Color::AYANAMI_BLUE,
            light: Light::default(),
            rasterizer: RasterizerDesc::default(),
            view_transforms: BTreeMap::new(),
        }
    }

    /// Bind to `device` and create the shared render states.
    pub fn with_device(device: D) -> Result<Self, RenderError> {
        let mut renderer = Self::new();
        renderer.set_device_interface(device)?;
        Ok(renderer)
    }

    /// Rasterizer used by the render states. Only effective before a device
    /// is bound.
    pub fn with_rasterizer(mut self, desc: RasterizerDesc) -> Self {
        self.rasterizer = desc;
        self
    }

    pub fn set_light(&mut self, light: Light) {
        self.light = light;
    }

    /// Bind the device. A renderer binds exactly once; failures while
    /// creating the render states are fatal and leave nothing allocated.
    pub fn set_device_interface(&mut self, device: D) -> Result<(), RenderError> {
        if self.device.is_some() {
            return Err(RenderError::AlreadyBound);
        }
        info!(backend = device.name(), "binding renderer to device");
        self.device = Some(device);
        self.state = RendererState::DeviceBound;
        self.create_render_states()
    }

    fn create_render_states(&mut self) -> Result<(), RenderError> {
        let state = self.state;
        let device = self.device.as_mut().ok_or(RenderError::NotReady(state))?;
        let mut created = Vec::with_capacity(4);
        match build_render_states(device, &self.rasterizer, &mut created) {
            Ok(states) => {
                debug!(resources = created.len(), "render states created");
                self.acquired.extend(created);
                self.states = Some(states);
                self.state = RendererState::Ready;
                Ok(())
            }
            Err(err) => {
                for resource in created.into_iter().rev() {
                    device.release(resource);
                }
                Err(err)
            }
        }
    }

    fn ensure_ready(&self) -> Result<RenderStates, RenderError> {
        match (self.state, self.states) {
            (RendererState::Ready | RendererState::SceneBound, Some(states)) => Ok(states),
            (state, _) => Err(RenderError::NotReady(state)),
        }
    }

    /// Upload one mesh. Returns whether anything new was created.
    fn register_mesh(&mut self, key: MeshKey, mesh: &Mesh) -> Result<bool, RenderError> {
        if self.meshes.contains_key(&key) {
            trace!(%key, "mesh already registered");
            return Ok(false);
        }
        let states = self.ensure_ready()?;
        if mesh.triangle_count() == 0 {
            return Err(RenderError::EmptyMesh(key));
        }
        let state = self.state;
        let device = self.device.as_mut().ok_or(RenderError::NotReady(state))?;

        let mut created = Vec::with_capacity(4);
        match upload_mesh(device, key, mesh, states.vertex_shader, &mut created) {
            Ok(buffers) => {
                debug!(
                    %key,
                    vertices = mesh.vertex_count(),
                    triangles = mesh.triangle_count(),
                    "mesh registered"
                );
                self.acquired.extend(created);
                self.meshes.insert(key, buffers);
                self.rejected.remove(&key);
                Ok(true)
            }
            Err(source) => {
                for resource in created.into_iter().rev() {
                    device.release(resource);
                }
                Err(RenderError::Registration { key, source })
            }
        }
    }

    pub fn state(&self) -> RendererState {
        self.state
    }

    pub fn device(&self) -> Option<&D> {
        self.device.as_ref()
    }

    pub fn device_mut(&mut self) -> Option<&mut D> {
        self.device.as_mut()
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn clear_color(&self) -> Color {
        self.clear
    }

    /// Number of meshes with live GPU resources.
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_registered(&self, key: MeshKey) -> bool {
        self.meshes.contains_key(&key)
    }

    /// Meshes with live GPU resources, in key order.
    pub fn registered_models(&self) -> impl Iterator<Item = MeshKey> + '_ {
        self.meshes.keys().copied()
    }

    /// Release everything and hand the device back.
    pub fn shutdown(mut self) -> Option<D> {
        self.release_all();
        self.device.take()
    }

    fn release_all(&mut self) {
        let Some(device) = self.device.as_mut() else {
            return;
        };
        if self.meshes.is_empty() {
            info!("renderer shutting down with no registered meshes");
        }
        for key in self.meshes.keys() {
            debug!(%key, "releasing mesh buffers");
        }
        info!(
            meshes = self.meshes.len(),
            resources = self.acquired.len(),
            "releasing device resources"
        );
        while let Some(resource) = self.acquired.pop() {
            device.release(resource);
        }
        self.meshes.clear();
        self.states = None;
        self.state = RendererState::DeviceBound;
    }
}

fn build_render_states<D: GraphicsDevice>(
    device: &mut D,
    rasterizer: &RasterizerDesc,
    created: &mut Vec<Resource>,
) -> Result<RenderStates, RenderError> {
    let init = |stage: &'static str| move |source: DeviceError| RenderError::Init { stage, source };
    let program = device.builtin_program();

    let vertex_shader = device
        .compile_shader(&program, ShaderStage::Vertex)
        .map_err(init("compiling the vertex shader"))?;
    created.push(vertex_shader.into());

    let pixel_shader = device
        .compile_shader(&program, ShaderStage::Pixel)
        .map_err(init("compiling the pixel shader"))?;
    created.push(pixel_shader.into());

    let rasterizer = device
        .create_rasterizer_state(rasterizer)
        .map_err(init("creating the rasterizer state"))?;
    created.push(rasterizer.into());

    let per_frame = device
        .create_buffer(&BufferDesc::zeroed(
            "per_frame",
            BufferKind::Constant,
            size_of::<PerFrame>() as u64,
        ))
        .map_err(init("allocating the per-frame constants"))?;
    created.push(per_frame.into());

    Ok(RenderStates {
        vertex_shader,
        pixel_shader,
        rasterizer,
        per_frame,
    })
}

fn upload_mesh<D: GraphicsDevice>(
    device: &mut D,
    key: MeshKey,
    mesh: &Mesh,
    vertex_shader: ShaderId,
    created: &mut Vec<Resource>,
) -> Result<MeshBuffers, DeviceError> {
    let vertices: Vec<GpuVertex> = mesh.vertices().iter().map(GpuVertex::from).collect();
    let indices = mesh.indices();
    let layout = GpuVertex::layout();

    let label = format!("{key} vertices");
    let vertex_buffer = device.create_buffer(&BufferDesc::with_contents(
        &label,
        BufferKind::Vertex,
        bytemuck::cast_slice(&vertices),
    ))?;
    created.push(vertex_buffer.into());

    let label = format!("{key} indices");
    let index_buffer = device.create_buffer(&BufferDesc::with_contents(
        &label,
        BufferKind::Index,
        bytemuck::cast_slice(&indices),
    ))?;
    created.push(index_buffer.into());

    let input_layout = device.create_input_layout(&layout, vertex_shader)?;
    created.push(input_layout.into());

    let label = format!("{key} per_object");
    let per_object = device.create_buffer(&BufferDesc::zeroed(
        &label,
        BufferKind::Constant,
        size_of::<PerObject>() as u64,
    ))?;
    created.push(per_object.into());

    Ok(MeshBuffers {
        vertex_buffer,
        index_buffer,
        layout: input_layout,
        per_object,
        stride: layout.stride(),
        index_count: indices.len() as u32,
    })
}

impl<D: GraphicsDevice> Renderer for DeviceRenderer<D> {
    fn set_buffer_size(&mut self, width: u32, height: u32) {
        self.extent = Extent::new(width, height);
        debug!(width = self.extent.width(), height = self.extent.height(), "buffer resized");
    }

    fn set_clear_color(&mut self, color: Color) {
        self.clear = color;
    }

    fn register_model(&mut self, scene: &Scene, model: ModelId) -> Result<(), RenderError> {
        self.ensure_ready()?;
        let parts = scene.model(model).ok_or(RenderError::UnknownModel(model))?.parts();
        for (part, (mesh, _)) in parts.into_iter().enumerate() {
            let key = MeshKey {
                model,
                part: part as u32,
            };
            self.register_mesh(key, mesh)?;
        }
        Ok(())
    }

    fn prepare(&mut self, scene: &Scene) -> Result<PrepareReport, RenderError> {
        self.ensure_ready()?;
        let mut report = PrepareReport::default();
        for instance in scene.get_models() {
            let Some(model) = scene.model(instance.model) else {
                continue;
            };
            for (part, (mesh, _)) in model.parts().into_iter().enumerate() {
                let key = MeshKey {
                    model: instance.model,
                    part: part as u32,
                };
                if self.rejected.contains(&key) {
                    continue;
                }
                match self.register_mesh(key, mesh) {
                    Ok(true) => report.registered.push(key),
                    Ok(false) => {}
                    Err(err) => {
                        warn!(%key, error = %err, "skipping mesh that failed to register");
                        self.rejected.insert(key);
                        report.failed.push((key, err.to_string()));
                    }
                }
            }
        }
        Ok(report)
    }

    fn set_scene(&mut self, scene: &Scene) -> Result<PrepareReport, RenderError> {
        let report = self.prepare(scene)?;
        self.state = RendererState::SceneBound;
        info!(
            registered = report.registered.len(),
            failed = report.failed.len(),
            "scene bound"
        );
        Ok(report)
    }

    fn update_viewport_transform(&mut self, viewport: ViewportHandle, camera: &Camera) {
        self.view_transforms.insert(viewport, camera.world_to_clip());
    }

    fn render(
        &mut self,
        viewport: ViewportHandle,
        culled: &CullResult,
    ) -> Result<FrameStats, RenderError> {
        let states = self.ensure_ready()?;
        let world_to_clip = match self.view_transforms.get(&viewport) {
            Some(m) => *m,
            None => {
                debug!(?viewport, "no camera transform yet, drawing in clip space");
                Mat4::IDENTITY
            }
        };
        let state = self.state;
        let device = self.device.as_mut().ok_or(RenderError::NotReady(state))?;

        device.begin_frame(self.clear)?;
        let frame = FrameInputs {
            states,
            world_to_clip,
            extent: self.extent,
            light: self.light,
            meshes: &self.meshes,
            rejected: &self.rejected,
        };
        match frame.draw(device, culled) {
            Ok(stats) => {
                device.end_frame()?;
                trace!(?stats, "frame submitted");
                Ok(stats)
            }
            Err(err) => {
                device.abort_frame();
                Err(err)
            }
        }
    }
}

/// Everything one frame reads from the renderer.
struct FrameInputs<'a> {
    states: RenderStates,
    world_to_clip: Mat4,
    extent: Extent,
    light: Light,
    meshes: &'a BTreeMap<MeshKey, MeshBuffers>,
    rejected: &'a BTreeSet<MeshKey>,
}

impl FrameInputs<'_> {
    fn draw<D: GraphicsDevice>(
        &self,
        device: &mut D,
        culled: &CullResult,
    ) -> Result<FrameStats, RenderError> {
        let states = self.states;
        let world_to_clip = self.world_to_clip;
        device.set_viewport(ViewportRect::from_size(
            self.extent.width(),
            self.extent.height(),
        ));
        let per_frame = PerFrame { light: self.light };
        device.update_buffer(states.per_frame, bytemuck::bytes_of(&per_frame))?;
        device.bind_constant_buffer(ShaderStage::Pixel, 0, states.per_frame);

        let mut stats = FrameStats::default();
        for item in &culled.items {
            let Some(mesh) = self.meshes.get(&item.mesh) else {
                if self.rejected.contains(&item.mesh) {
                    trace!(key = %item.mesh, "skipping rejected mesh");
                } else {
                    warn!(key = %item.mesh, "skipping unregistered mesh");
                }
                stats.skipped += 1;
                continue;
            };
            device.bind_vertex_buffer(0, mesh.vertex_buffer, mesh.stride, 0);
            device.bind_index_buffer(mesh.index_buffer, IndexFormat::Uint32);
            device.bind_input_layout(mesh.layout);

            let per_object = PerObject::new(item.world, world_to_clip);
            device.update_buffer(mesh.per_object, bytemuck::bytes_of(&per_object))?;
            device.bind_constant_buffer(ShaderStage::Vertex, 0, mesh.per_object);

            device.bind_shaders(states.vertex_shader, states.pixel_shader);
            device.bind_rasterizer_state(states.rasterizer);
            device.draw_indexed(mesh.index_count, 0, 0)?;

            stats.draw_calls += 1;
            stats.indices += mesh.index_count as u64;
        }
        Ok(stats)
    }
}

impl<D: GraphicsDevice> Drop for DeviceRenderer<D> {
    fn drop(&mut self) {
        self.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{ElementFormat, ShaderInput};
    use crate::recording::{Command, Journal, RecordingDevice};
    use celview_common::Vec3;
    use celview_scene::{AggregateModel, Vertex, primitives};
    use std::cell::RefCell;
    use std::io;
    use std::rc::Rc;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    /// In-memory log sink for asserting on emitted events.
    #[derive(Clone, Default)]
    struct LogCapture(Arc<Mutex<Vec<u8>>>);

    impl LogCapture {
        fn lines(&self) -> Vec<String> {
            let bytes = self.0.lock().unwrap();
            String::from_utf8_lossy(&bytes)
                .lines()
                .map(str::to_owned)
                .collect()
        }
    }

    impl io::Write for LogCapture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for LogCapture {
        type Writer = LogCapture;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn captured<T>(f: impl FnOnce() -> T) -> (T, Vec<String>) {
        let capture = LogCapture::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(capture.clone())
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::TRACE)
            .finish();
        let out = tracing::subscriber::with_default(subscriber, f);
        (out, capture.lines())
    }

    fn renderer() -> (DeviceRenderer<RecordingDevice>, Rc<RefCell<Journal>>) {
        let device = RecordingDevice::new();
        let journal = device.journal();
        (DeviceRenderer::with_device(device).unwrap(), journal)
    }

    fn three_model_scene() -> (Scene, [ModelId; 3]) {
        let mut scene = Scene::new();
        let a = scene.add(primitives::quad(Color::RED), Mat4::IDENTITY);
        let b = scene.add(primitives::white_cube(), Mat4::from_translation(Vec3::X));
        let c = scene.add(primitives::quad(Color::BLUE), Mat4::from_translation(Vec3::Y));
        (scene, [a, b, c])
    }

    #[test]
    fn binding_creates_render_states() {
        let (r, journal) = renderer();
        assert_eq!(r.state(), RendererState::Ready);
        let journal = journal.borrow();
        assert_eq!(journal.created().len(), 4);
        assert_eq!(journal.buffers_created(BufferKind::Constant), 1);
    }

    #[test]
    fn second_device_is_rejected() {
        let (mut r, _journal) = renderer();
        let err = r.set_device_interface(RecordingDevice::new()).unwrap_err();
        assert_eq!(err, RenderError::AlreadyBound);
    }

    #[test]
    fn rendering_without_device_is_not_ready() {
        let mut r: DeviceRenderer<RecordingDevice> = DeviceRenderer::new();
        let err = r
            .render(ViewportHandle::PRIMARY, &CullResult::default())
            .unwrap_err();
        assert_eq!(err, RenderError::NotReady(RendererState::Uninitialized));
    }

    #[test]
    fn shader_failure_is_fatal_and_leaves_nothing_live() {
        let device = RecordingDevice::new().fail_shader(ShaderStage::Pixel);
        let journal = device.journal();
        let mut r = DeviceRenderer::new();
        let err = r.set_device_interface(device).unwrap_err();
        assert!(matches!(err, RenderError::Init { stage, .. } if stage.contains("pixel")));
        assert_eq!(r.state(), RendererState::DeviceBound);
        assert!(journal.borrow().live().is_empty());
    }

    #[test]
    fn registration_is_idempotent() {
        let (mut r, journal) = renderer();
        let (scene, [a, ..]) = three_model_scene();
        r.register_model(&scene, a).unwrap();
        let after_first = journal.borrow().created().len();
        r.register_model(&scene, a).unwrap();
        assert_eq!(journal.borrow().created().len(), after_first);
        assert_eq!(r.mesh_count(), 1);
    }

    #[test]
    fn unknown_model_is_reported() {
        let (mut r, _journal) = renderer();
        let (scene, _) = three_model_scene();
        let mut other = Scene::new();
        let foreign = other.add(primitives::white_cube(), Mat4::IDENTITY);
        assert_eq!(
            r.register_model(&scene, foreign).unwrap_err(),
            RenderError::UnknownModel(foreign)
        );
    }

    #[test]
    fn quad_scene_draws_six_indices() {
        let (mut r, journal) = renderer();
        let mut scene = Scene::new();
        scene.add(primitives::quad(Color::WHITE), Mat4::IDENTITY);
        r.set_buffer_size(720, 480);
        r.set_scene(&scene).unwrap();
        assert_eq!(r.state(), RendererState::SceneBound);

        r.update_viewport_transform(ViewportHandle::PRIMARY, &Camera::default());
        let culled = r.cull(ViewportHandle::PRIMARY, &scene);
        let stats = r.render(ViewportHandle::PRIMARY, &culled).unwrap();
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(stats.indices, 6);

        let journal = journal.borrow();
        assert_eq!(journal.frames(), 1);
        let draw = &journal.draw_calls()[0];
        assert_eq!(draw.index_count, 6);
        assert_eq!(draw.vertex_count, 4);
        assert!(journal.commands().contains(&Command::SetViewport(ViewportRect::from_size(
            720, 480
        ))));
    }

    #[test]
    fn draws_follow_instance_order_and_stay_in_range() {
        let (mut r, journal) = renderer();
        let (scene, ids) = three_model_scene();
        r.set_scene(&scene).unwrap();
        let culled = r.cull(ViewportHandle::PRIMARY, &scene);
        let stats = r.render(ViewportHandle::PRIMARY, &culled).unwrap();
        assert_eq!(stats.draw_calls, 3);

        let journal = journal.borrow();
        let counts: Vec<u32> = journal.draw_calls().iter().map(|d| d.index_count).collect();
        assert_eq!(counts, vec![6, 36, 6]);
        for draw in journal.draw_calls() {
            assert!(draw.max_index < draw.vertex_count);
        }
        let layouts: Vec<LayoutId> = journal.draw_calls().iter().map(|d| d.layout).collect();
        assert_eq!(layouts.len(), ids.len());
    }

    #[test]
    fn per_object_constants_carry_the_instance_transform() {
        let (mut r, journal) = renderer();
        let mut scene = Scene::new();
        let world = Mat4::from_translation(Vec3::new(3.0, 0.0, 0.0));
        scene.add(primitives::white_cube(), world);
        r.set_scene(&scene).unwrap();
        let camera = Camera::default();
        r.update_viewport_transform(ViewportHandle::PRIMARY, &camera);
        let culled = r.cull(ViewportHandle::PRIMARY, &scene);
        r.render(ViewportHandle::PRIMARY, &culled).unwrap();

        let journal = journal.borrow();
        let bytes = &journal.draw_calls()[0].vertex_constants;
        let cb: PerObject = bytemuck::pod_read_unaligned(bytes);
        assert_eq!(cb, PerObject::new(world, camera.world_to_clip()));
    }

    #[test]
    fn aggregate_parts_get_their_own_buffers() {
        let (mut r, journal) = renderer();
        let mut scene = Scene::new();
        let agg = AggregateModel::new()
            .with_part(primitives::white_cube(), Mat4::IDENTITY)
            .with_part(primitives::quad(Color::GREEN), Mat4::from_translation(Vec3::Z));
        let id = scene.add(agg, Mat4::IDENTITY);
        r.set_scene(&scene).unwrap();
        assert!(r.is_registered(MeshKey { model: id, part: 0 }));
        assert!(r.is_registered(MeshKey { model: id, part: 1 }));
        assert_eq!(
            r.registered_models().collect::<Vec<_>>(),
            vec![MeshKey { model: id, part: 0 }, MeshKey { model: id, part: 1 }]
        );
        let culled = r.cull(ViewportHandle::PRIMARY, &scene);
        assert_eq!(r.render(ViewportHandle::PRIMARY, &culled).unwrap().draw_calls, 2);
        assert_eq!(journal.borrow().buffers_created(BufferKind::Vertex), 2);
    }

    #[test]
    fn failing_model_is_skipped_with_the_rest_drawn() {
        // creations: 4 render states, then 4 per mesh; #9 is the second
        // mesh's index buffer
        let device = RecordingDevice::new().fail_creation_at(9);
        let journal = device.journal();
        let mut r = DeviceRenderer::with_device(device).unwrap();
        let (scene, [a, b, c]) = three_model_scene();

        let report = r.set_scene(&scene).unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0.model, b);
        assert_eq!(report.registered.len(), 2);

        let culled = r.cull(ViewportHandle::PRIMARY, &scene);
        let stats = r.render(ViewportHandle::PRIMARY, &culled).unwrap();
        assert_eq!(stats.draw_calls, 2);
        assert_eq!(stats.skipped, 1);
        assert!(r.is_registered(MeshKey { model: a, part: 0 }));
        assert!(r.is_registered(MeshKey { model: c, part: 0 }));

        // the half-built vertex buffer of `b` did not leak
        let live = journal.borrow().live().len();
        assert_eq!(live, 4 + 2 * 4);

        // a failed mesh is not retried every frame
        let again = r.prepare(&scene).unwrap();
        assert!(again.failed.is_empty() && again.registered.is_empty());
    }

    #[test]
    fn mismatched_shader_signature_fails_registration() {
        let device = RecordingDevice::new().with_shader_inputs(vec![ShaderInput {
            semantic: "TEXCOORD",
            location: 0,
            format: ElementFormat::Float32x2,
        }]);
        let mut r = DeviceRenderer::with_device(device).unwrap();
        let (scene, [a, ..]) = three_model_scene();
        let err = r.register_model(&scene, a).unwrap_err();
        assert!(matches!(
            err,
            RenderError::Registration {
                source: DeviceError::LayoutMismatch(_),
                ..
            }
        ));
    }

    #[test]
    fn drop_releases_in_reverse_acquisition_order() {
        let (mut r, journal) = renderer();
        let (scene, _) = three_model_scene();
        r.set_scene(&scene).unwrap();
        drop(r);

        let journal = journal.borrow();
        let mut expected = journal.created().to_vec();
        expected.reverse();
        assert_eq!(journal.released(), expected.as_slice());
        assert!(journal.double_releases().is_empty());
    }

    #[test]
    fn every_mesh_set_is_released_once() {
        let (mut r, journal) = renderer();
        let (scene, _) = three_model_scene();
        r.set_scene(&scene).unwrap();
        drop(r);

        let journal = journal.borrow();
        assert_eq!(journal.buffers_released(BufferKind::Vertex), 3);
        assert_eq!(journal.buffers_released(BufferKind::Index), 3);
        assert_eq!(journal.layouts_released(), 3);
        // three per-object buffers plus the per-frame one
        assert_eq!(journal.buffers_released(BufferKind::Constant), 4);
        assert!(journal.live().is_empty());
    }

    #[test]
    fn dropping_with_nothing_registered_releases_only_render_states() {
        let (r, journal) = renderer();
        drop(r);
        let journal = journal.borrow();
        assert_eq!(journal.released().len(), 4);
        assert_eq!(journal.buffers_released(BufferKind::Vertex), 0);
    }

    #[test]
    fn dropping_with_nothing_registered_logs_it() {
        let ((), lines) = captured(|| {
            let (r, _journal) = renderer();
            drop(r);
        });
        assert!(
            lines
                .iter()
                .any(|l| l.contains("renderer shutting down with no registered meshes"))
        );
    }

    #[test]
    fn dropping_with_meshes_does_not_log_the_empty_case() {
        let ((), lines) = captured(|| {
            let (mut r, _journal) = renderer();
            let (scene, _) = three_model_scene();
            r.set_scene(&scene).unwrap();
            drop(r);
        });
        assert!(
            !lines
                .iter()
                .any(|l| l.contains("no registered meshes"))
        );
        assert!(lines.iter().any(|l| l.contains("releasing device resources")));
    }

    #[test]
    fn rejected_mesh_warns_once_across_frames() {
        let (mut r, _journal) = renderer();
        let mut scene = Scene::new();
        let empty = Mesh::new(vec![Vertex::new(Vec3::ZERO)], vec![]).unwrap();
        scene.add(empty, Mat4::IDENTITY);

        let (skipped, lines) = captured(|| {
            r.set_scene(&scene).unwrap();
            let mut skipped = 0;
            for _ in 0..100 {
                r.prepare(&scene).unwrap();
                let culled = r.cull(ViewportHandle::PRIMARY, &scene);
                skipped += r.render(ViewportHandle::PRIMARY, &culled).unwrap().skipped;
            }
            skipped
        });
        assert_eq!(skipped, 100);
        let warnings = lines.iter().filter(|l| l.contains("WARN")).count();
        assert_eq!(warnings, 1);
    }

    #[test]
    fn never_prepared_mesh_still_warns() {
        let (mut r, _journal) = renderer();
        let (scene, _) = three_model_scene();
        let (stats, lines) = captured(|| {
            let culled = r.cull(ViewportHandle::PRIMARY, &scene);
            r.render(ViewportHandle::PRIMARY, &culled).unwrap()
        });
        assert_eq!(stats.skipped, 3);
        let warnings = lines
            .iter()
            .filter(|l| l.contains("WARN") && l.contains("skipping unregistered mesh"))
            .count();
        assert_eq!(warnings, 3);
    }

    #[test]
    fn failed_draw_aborts_the_frame_and_the_next_one_renders() {
        let device = RecordingDevice::new().fail_draw_at(1);
        let journal = device.journal();
        let mut r = DeviceRenderer::with_device(device).unwrap();
        let (scene, _) = three_model_scene();
        r.set_scene(&scene).unwrap();
        let culled = r.cull(ViewportHandle::PRIMARY, &scene);

        let err = r.render(ViewportHandle::PRIMARY, &culled).unwrap_err();
        assert!(matches!(err, RenderError::Frame(DeviceError::Validation(_))));
        assert_eq!(journal.borrow().frames(), 0);
        assert_eq!(journal.borrow().commands().last(), Some(&Command::AbortFrame));

        let stats = r.render(ViewportHandle::PRIMARY, &culled).unwrap();
        assert_eq!(stats.draw_calls, 3);
        assert_eq!(journal.borrow().frames(), 1);
    }

    #[test]
    fn shutdown_returns_the_device_and_drop_is_quiet() {
        let (mut r, journal) = renderer();
        let (scene, _) = three_model_scene();
        r.set_scene(&scene).unwrap();
        let device = r.shutdown();
        assert!(device.is_some());
        let journal = journal.borrow();
        assert!(journal.live().is_empty());
        assert!(journal.double_releases().is_empty());
    }
}
