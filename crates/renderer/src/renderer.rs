//! Main renderer orchestration.
//!
//! [`Renderer`] owns every Vulkan object the frame loop touches and runs
//! each frame through the [`FrameScheduler`].
//!
//! # Resource Destruction Order
//!
//! 1. Wait for the device to go idle
//! 2. Scene objects (meshes, textures, uniform rings, descriptor sets)
//! 3. Frame slots (command buffers, semaphores, fences)
//! 4. Framebuffers, then the render targets they reference
//! 5. Pipeline, pipeline layout, render pass
//! 6. Descriptor layouts, command pool
//! 7. Swapchain
//! 8. The renderer's device handle, so the logical device goes with it
//! 9. Surface
//! 10. Instance
//!
//! ManuallyDrop is used to ensure correct destruction order.

use std::mem::ManuallyDrop;
use std::path::PathBuf;
use std::sync::Arc;

use ash::vk;
use glam::{Mat4, Vec3};
use tracing::{debug, error, info, warn};

use vkpipe_core::config::GraphicsConfig;
use vkpipe_platform::{Surface, SurfaceSource, Window};
use vkpipe_resources::TextureData;
use vkpipe_rhi::command::CommandPool;
use vkpipe_rhi::descriptor::DescriptorManager;
use vkpipe_rhi::device::Device;
use vkpipe_rhi::framebuffer::Framebuffers;
use vkpipe_rhi::instance::Instance;
use vkpipe_rhi::physical_device::select_physical_device;
use vkpipe_rhi::pipeline::{
    CompareOp, CullMode, FrontFace, GraphicsPipelineBuilder, Pipeline, PipelineLayout,
};
use vkpipe_rhi::render_pass::{self, RenderPass};
use vkpipe_rhi::shader::{Shader, ShaderStage};
use vkpipe_rhi::swapchain::{AcquireOutcome, PresentOutcome, Swapchain, SwapchainConfig};
use vkpipe_rhi::vertex::Vertex;
use vkpipe_rhi::{RhiError, RhiResult};
use vkpipe_scene::{Camera, PointLight};

use crate::MAX_FRAMES_IN_FLIGHT;
use crate::frame::FrameSlot;
use crate::object::{GpuUploader, ObjectDesc, SET_SHAPES, SceneObject, scene_light};
use crate::overlay::UiOverlay;
use crate::scheduler::{FrameBackend, FrameOutcome, FrameScheduler, FrameStats};
use crate::targets::{RenderTargets, find_depth_format};

/// Fraction of samples shaded per fragment when MSAA is on.
pub const MIN_SAMPLE_SHADING: f32 = 0.2;

/// Minimum sample-shading fraction for a device, or `None` when the
/// `sampleRateShading` feature is off and the pipeline must not request it.
pub fn sample_shading_fraction(supported: bool) -> Option<f32> {
    supported.then_some(MIN_SAMPLE_SHADING)
}

/// Camera state for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameView {
    /// World to view space.
    pub view: Mat4,
    /// View to clip space, Y already flipped for Vulkan.
    pub proj: Mat4,
    /// World-space eye position for specular lighting.
    pub camera_position: Vec3,
}

impl FrameView {
    /// Snapshot of `camera` for the frame about to be recorded.
    pub fn from_camera(camera: &Camera) -> Self {
        Self {
            view: camera.view_matrix(),
            proj: camera.projection_matrix(),
            camera_position: camera.position(),
        }
    }
}

/// Every image-count-dependent resource must match the swapchain.
pub fn check_chain_counts(images: usize, views: usize, framebuffers: usize) -> RhiResult<()> {
    if images == views && views == framebuffers {
        Ok(())
    } else {
        Err(RhiError::SwapchainError(format!(
            "{images} image(s), {views} view(s), {framebuffers} framebuffer(s)"
        )))
    }
}

/// Vulkan objects owned by the renderer, in reverse destruction order.
struct RenderContext {
    /// Command buffer and synchronization per frame slot.
    frames: Vec<FrameSlot>,
    /// Swapchain format the render pass and pipeline were built for.
    color_format: vk::Format,
    depth_format: vk::Format,
    /// SPIR-V paths, reloaded when the pipeline is rebuilt.
    vertex_shader: PathBuf,
    fragment_shader: PathBuf,

    framebuffers: ManuallyDrop<Framebuffers>,
    targets: ManuallyDrop<RenderTargets>,
    pipeline: ManuallyDrop<Pipeline>,
    pipeline_layout: ManuallyDrop<PipelineLayout>,
    render_pass: ManuallyDrop<RenderPass>,
    descriptors: ManuallyDrop<DescriptorManager>,
    command_pool: ManuallyDrop<CommandPool>,
    swapchain: ManuallyDrop<Swapchain>,
    device: ManuallyDrop<Arc<Device>>,
    surface: ManuallyDrop<Surface>,
    instance: ManuallyDrop<Instance>,
}

impl RenderContext {
    /// Builds every object from the instance down to the frame slots.
    ///
    /// Objects created before a failure are dropped in reverse order.
    fn new(window: &Window, config: &GraphicsConfig) -> RhiResult<Self> {
        let display = window
            .raw_display_handle()
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;
        let instance = Instance::new(config.validation, display)?;
        let surface = window.create_surface(&instance)?;

        let physical_device_info =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
        let device = Device::new(&instance, &physical_device_info, config.max_msaa_samples)?;

        let swapchain = Swapchain::new(
            &instance,
            device.clone(),
            surface.handle(),
            vk::Extent2D {
                width: window.width(),
                height: window.height(),
            },
            SwapchainConfig {
                requested_image_count: config.requested_image_count,
                prefer_mailbox: config.prefer_mailbox,
            },
        )?;

        let command_pool = CommandPool::new(device.clone(), device.queue_families().graphics()?)?;
        let descriptors = DescriptorManager::new(device.clone())?;

        let color_format = swapchain.format();
        let depth_format = find_depth_format(&device)?;
        let render_pass = RenderPass::new(
            device.clone(),
            color_format,
            depth_format,
            device.msaa_samples(),
        )?;

        let set_layouts = SET_SHAPES.map(|shape| descriptors.layout(shape));
        let pipeline_layout = PipelineLayout::new(device.clone(), &set_layouts, &[])?;
        let pipeline = create_pipeline(
            &device,
            &pipeline_layout,
            &render_pass,
            &config.vertex_shader,
            &config.fragment_shader,
        )?;

        let targets = RenderTargets::new(
            device.clone(),
            &command_pool,
            swapchain.extent(),
            color_format,
            depth_format,
        )?;
        let framebuffers = Framebuffers::new(
            device.clone(),
            render_pass.handle(),
            targets.color_view(),
            targets.depth_view(),
            swapchain.image_views(),
            swapchain.extent(),
        )?;
        check_chain_counts(
            swapchain.image_count() as usize,
            swapchain.image_views().len(),
            framebuffers.len(),
        )?;

        let frames = FrameSlot::create_all(&device, &command_pool, MAX_FRAMES_IN_FLIGHT)?;

        info!(
            "Renderer initialized: {} swapchain images, {} frames in flight, {:?} MSAA, depth {:?}",
            swapchain.image_count(),
            frames.len(),
            device.msaa_samples(),
            depth_format
        );

        Ok(Self {
            frames,
            color_format,
            depth_format,
            vertex_shader: config.vertex_shader.clone(),
            fragment_shader: config.fragment_shader.clone(),
            framebuffers: ManuallyDrop::new(framebuffers),
            targets: ManuallyDrop::new(targets),
            pipeline: ManuallyDrop::new(pipeline),
            pipeline_layout: ManuallyDrop::new(pipeline_layout),
            render_pass: ManuallyDrop::new(render_pass),
            descriptors: ManuallyDrop::new(descriptors),
            command_pool: ManuallyDrop::new(command_pool),
            swapchain: ManuallyDrop::new(swapchain),
            device: ManuallyDrop::new(device),
            surface: ManuallyDrop::new(surface),
            instance: ManuallyDrop::new(instance),
        })
    }

    /// Borrows what object uploads need from the context.
    fn uploader(&self) -> GpuUploader<'_> {
        GpuUploader {
            device: &self.device,
            pool: &self.command_pool,
            descriptors: &self.descriptors,
            slots: self.frames.len(),
        }
    }

    /// Rebuilds the swapchain, then the targets and framebuffers that depend
    /// on it. The render pass and pipeline follow when the surface format
    /// changed.
    fn rebuild(&mut self, extent: vk::Extent2D) -> RhiResult<()> {
        self.swapchain.recreate(extent)?;
        let extent = self.swapchain.extent();

        let format = self.swapchain.format();
        if format != self.color_format {
            info!(
                "Swapchain format changed {:?} -> {:?}, rebuilding render pass",
                self.color_format, format
            );
            let render_pass = RenderPass::new(
                (*self.device).clone(),
                format,
                self.depth_format,
                self.device.msaa_samples(),
            )?;
            let pipeline = create_pipeline(
                &self.device,
                &self.pipeline_layout,
                &render_pass,
                &self.vertex_shader,
                &self.fragment_shader,
            )?;
            drop(std::mem::replace(&mut *self.pipeline, pipeline));
            drop(std::mem::replace(&mut *self.render_pass, render_pass));
            self.color_format = format;
        }

        let targets = RenderTargets::new(
            (*self.device).clone(),
            &self.command_pool,
            extent,
            self.color_format,
            self.depth_format,
        )?;
        let framebuffers = Framebuffers::new(
            (*self.device).clone(),
            self.render_pass.handle(),
            targets.color_view(),
            targets.depth_view(),
            self.swapchain.image_views(),
            extent,
        )?;
        check_chain_counts(
            self.swapchain.image_count() as usize,
            self.swapchain.image_views().len(),
            framebuffers.len(),
        )?;

        drop(std::mem::replace(&mut *self.framebuffers, framebuffers));
        drop(std::mem::replace(&mut *self.targets, targets));

        debug!(
            "Rebuilt {} framebuffer(s) at {}x{}",
            self.framebuffers.len(),
            extent.width,
            extent.height
        );
        Ok(())
    }
}

/// Builds the mesh pipeline: back-face culled, depth tested with LESS,
/// multisampled at the device's sample count.
fn create_pipeline(
    device: &Arc<Device>,
    layout: &PipelineLayout,
    render_pass: &RenderPass,
    vertex_path: &std::path::Path,
    fragment_path: &std::path::Path,
) -> RhiResult<Pipeline> {
    let vertex_shader = Shader::from_spirv_file(device.clone(), vertex_path, ShaderStage::Vertex)?;
    let fragment_shader =
        Shader::from_spirv_file(device.clone(), fragment_path, ShaderStage::Fragment)?;

    let mut builder = GraphicsPipelineBuilder::new()
        .vertex_shader(&vertex_shader)
        .fragment_shader(&fragment_shader)
        .vertex_binding(Vertex::binding_description())
        .vertex_attributes(&Vertex::attribute_descriptions())
        .cull_mode(CullMode::Back)
        .front_face(FrontFace::CounterClockwise)
        .rasterization_samples(device.msaa_samples())
        .depth_test_enable(true)
        .depth_write_enable(true)
        .depth_compare_op(CompareOp::Less)
        .render_pass(render_pass.handle());
    match sample_shading_fraction(device.sample_rate_shading()) {
        Some(fraction) => builder = builder.sample_shading(fraction),
        None => warn!("sampleRateShading unsupported, sample shading disabled"),
    }
    let pipeline = builder.build(device.clone(), layout)?;

    info!(
        "Mesh pipeline created ({}, {})",
        vertex_path.display(),
        fragment_path.display()
    );
    Ok(pipeline)
}

/// One frame's view of the renderer, driven by the scheduler.
struct FramePass<'a> {
    ctx: &'a mut RenderContext,
    objects: &'a [SceneObject],
    view: &'a FrameView,
    /// First point light of the scene, or the default light without one.
    light: PointLight,
    /// Recorded after every object, inside the same render pass.
    overlay: &'a mut dyn UiOverlay,
}

impl FramePass<'_> {
    /// The frame slot at `slot`, or an out-of-range error.
    fn frame(&self, slot: usize) -> RhiResult<&FrameSlot> {
        frame_at(&self.ctx.frames, slot)
    }
}

fn frame_at(frames: &[FrameSlot], slot: usize) -> RhiResult<&FrameSlot> {
    frames.get(slot).ok_or(RhiError::FrameSlotOutOfRange {
        slot,
        slots: frames.len(),
    })
}

impl FrameBackend for FramePass<'_> {
    fn wait_slot(&mut self, slot: usize) -> RhiResult<()> {
        self.frame(slot)?.sync.in_flight().wait(u64::MAX)
    }

    fn acquire(&mut self, slot: usize) -> RhiResult<AcquireOutcome> {
        let semaphore = self.frame(slot)?.sync.image_available();
        self.ctx.swapchain.acquire_next_image(semaphore)
    }

    fn reset_slot(&mut self, slot: usize) -> RhiResult<()> {
        self.frame(slot)?.sync.in_flight().reset()
    }

    /// Writes this slot's uniforms, then re-records its command buffer.
    fn record(&mut self, slot: usize, image_index: u32) -> RhiResult<()> {
        for object in self.objects {
            object.body().write_uniforms(slot, self.view, &self.light)?;
        }

        let ctx = &*self.ctx;
        let frame = frame_at(&ctx.frames, slot)?;
        let cmd = &frame.cmd;
        let framebuffer = ctx.framebuffers.get(image_index).ok_or_else(|| {
            RhiError::SwapchainError(format!(
                "no framebuffer for image {image_index} ({} framebuffer(s))",
                ctx.framebuffers.len()
            ))
        })?;
        let extent = ctx.swapchain.extent();

        cmd.reset()?;
        cmd.begin(false)?;
        cmd.begin_render_pass(
            ctx.render_pass.handle(),
            framebuffer,
            extent,
            &render_pass::clear_values(),
        );
        cmd.bind_pipeline(ctx.pipeline.bind_point(), ctx.pipeline.handle());
        cmd.set_viewport_and_scissor(extent);

        for object in self.objects {
            object.body().draw(cmd, ctx.pipeline_layout.handle(), slot)?;
        }
        self.overlay.record(cmd)?;

        cmd.end_render_pass();
        cmd.end()
    }

    fn submit(&mut self, slot: usize) -> RhiResult<()> {
        let frame = self.frame(slot)?;
        let wait_semaphores = [frame.sync.image_available()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [frame.cmd.handle()];
        let signal_semaphores = [frame.sync.render_finished()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        // SAFETY: the buffer was fully recorded in `record` and the fence
        // was reset after this slot's wait.
        unsafe {
            self.ctx
                .device
                .submit_graphics(&[submit_info], frame.sync.in_flight().handle())
        }
    }

    fn present(&mut self, slot: usize, image_index: u32) -> RhiResult<PresentOutcome> {
        let semaphore = self.frame(slot)?.sync.render_finished();
        let queue = self.ctx.device.present_queue();
        self.ctx.swapchain.present(queue, image_index, semaphore)
    }

    fn rebuild(&mut self, extent: vk::Extent2D) -> RhiResult<()> {
        self.ctx.rebuild(extent)
    }
}

/// Main renderer that manages all Vulkan resources.
///
/// Single-threaded: everything happens on the thread that drives the event
/// loop.
pub struct Renderer {
    /// Frame slot rotation and swapchain staleness handling.
    scheduler: FrameScheduler,
    /// Dropped before `ctx` frees the device.
    objects: Vec<SceneObject>,
    ctx: RenderContext,
}

impl Renderer {
    /// Creates a renderer presenting to `window`.
    ///
    /// # Errors
    ///
    /// Any Vulkan object creation failure, a missing adapter capability, or
    /// unreadable shader files.
    pub fn new(window: &Window, config: &GraphicsConfig) -> RhiResult<Self> {
        info!(
            "Initializing Vulkan renderer ({}x{})",
            window.width(),
            window.height()
        );
        let ctx = RenderContext::new(window, config)?;
        Ok(Self {
            scheduler: FrameScheduler::new(ctx.frames.len()),
            objects: Vec::new(),
            ctx,
        })
    }

    /// Uploads `desc` and adds it to the scene, returning its index.
    pub fn add_object(&mut self, desc: &ObjectDesc) -> RhiResult<usize> {
        let object = SceneObject::create(&self.ctx.uploader(), desc)?;
        self.objects.push(object);
        Ok(self.objects.len() - 1)
    }

    /// Objects in creation order; indices match [`Renderer::add_object`].
    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    /// Mutable access for per-frame animation. Objects cannot be removed.
    pub fn objects_mut(&mut self) -> &mut [SceneObject] {
        &mut self.objects
    }

    /// Replaces a part's texture once no frame is in flight.
    ///
    /// Blocks on a device idle wait, so it is meant for user actions rather
    /// than per-frame use.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidResource`] for an unknown object or part,
    /// otherwise any upload error. The old texture stays bound on failure.
    pub fn replace_texture(
        &mut self,
        object: usize,
        part: usize,
        data: &TextureData,
    ) -> RhiResult<()> {
        let count = self.objects.len();
        let target = self.objects.get_mut(object).ok_or_else(|| {
            RhiError::InvalidResource(format!("no object {object} ({count} in scene)"))
        })?;
        self.ctx.device.wait_idle()?;
        target
            .body_mut()
            .replace_texture(&self.ctx.uploader(), part, data)
    }

    /// Draws one frame of every object plus `overlay`.
    ///
    /// Swapchain staleness is handled here; only fatal errors are returned.
    pub fn render_frame<S: SurfaceSource + ?Sized>(
        &mut self,
        surface: &mut S,
        view: &FrameView,
        overlay: &mut dyn UiOverlay,
    ) -> RhiResult<FrameOutcome> {
        let mut pass = FramePass {
            ctx: &mut self.ctx,
            objects: &self.objects,
            view,
            light: scene_light(&self.objects),
            overlay,
        };
        self.scheduler.draw(&mut pass, surface)
    }

    /// Forces a swapchain rebuild on the next frame.
    pub fn request_rebuild(&mut self) {
        self.scheduler.request_rebuild();
    }

    /// Counters since creation.
    pub fn stats(&self) -> FrameStats {
        self.scheduler.stats()
    }

    /// Current swapchain extent, which may differ from the window size.
    pub fn extent(&self) -> vk::Extent2D {
        self.ctx.swapchain.extent()
    }

    /// Surface format of the swapchain images.
    pub fn format(&self) -> vk::Format {
        self.ctx.swapchain.format()
    }

    /// Number of images in the current swapchain.
    pub fn image_count(&self) -> u32 {
        self.ctx.swapchain.image_count()
    }

    /// Blocks until the GPU has finished all submitted frames.
    pub fn wait_idle(&self) -> RhiResult<()> {
        self.ctx.device.wait_idle()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.ctx.device.wait_idle() {
            error!(
                "Failed to wait for device idle during renderer drop: {:?}",
                e
            );
        }

        self.objects.clear();
        self.ctx.frames.clear();

        let ctx = &mut self.ctx;
        // SAFETY: each field is dropped exactly once, here, and never used
        // again; RenderContext has no Drop of its own.
        unsafe {
            ManuallyDrop::drop(&mut ctx.framebuffers);
            ManuallyDrop::drop(&mut ctx.targets);
            ManuallyDrop::drop(&mut ctx.pipeline);
            ManuallyDrop::drop(&mut ctx.pipeline_layout);
            ManuallyDrop::drop(&mut ctx.render_pass);
            ManuallyDrop::drop(&mut ctx.descriptors);
            ManuallyDrop::drop(&mut ctx.command_pool);
            ManuallyDrop::drop(&mut ctx.swapchain);
            ManuallyDrop::drop(&mut ctx.device);
            ManuallyDrop::drop(&mut ctx.surface);
            ManuallyDrop::drop(&mut ctx.instance);
        }

        info!("Renderer destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vkpipe_scene::{CameraRig, FlyCamera, Projection};

    #[test]
    fn test_chain_counts_match() {
        assert!(check_chain_counts(3, 3, 3).is_ok());
    }

    #[test]
    fn test_chain_counts_mismatch_reported() {
        let err = check_chain_counts(3, 3, 2).unwrap_err();
        assert!(matches!(err, RhiError::SwapchainError(_)));
        assert!(check_chain_counts(2, 3, 3).is_err());
    }

    #[test]
    fn test_sample_shading_follows_device_feature() {
        assert_eq!(sample_shading_fraction(true), Some(MIN_SAMPLE_SHADING));
        assert_eq!(sample_shading_fraction(false), None);
    }

    #[test]
    fn test_frame_view_from_camera() {
        let camera = Camera::new(
            CameraRig::Fly(FlyCamera::new(Vec3::new(3.0, 3.0, 3.0), Vec3::ZERO, 3.0, 0.5)),
            Projection::new(70.0, 4.0 / 3.0, 0.1, 100.0),
        );
        let view = FrameView::from_camera(&camera);
        assert_eq!(view.camera_position, camera.position());
        assert_eq!(view.view, camera.view_matrix());
        assert_eq!(view.proj, camera.projection_matrix());
    }
}
