use strata_core::StrataResult;

use crate::gpu::{Device, GpuBuffer, Program};

/// A source/destination buffer pair for one render pass.
///
/// Programs read the source and write the destination; [`roll_textures`]
/// promotes the destination to be the next source. The pair is released
/// when the context is dropped, whether or not the pass succeeded.
///
/// [`roll_textures`]: RenderContext::roll_textures
pub struct RenderContext<'d> {
    device: &'d Device,
    width: u32,
    height: u32,
    frame: i64,
    source: GpuBuffer,
    destination: GpuBuffer,
}

impl<'d> RenderContext<'d> {
    /// Allocate a transparent `width`×`height` buffer pair for `frame`.
    pub fn new(device: &'d Device, width: u32, height: u32, frame: i64) -> StrataResult<Self> {
        let source = device.allocate(width, height)?;
        let destination = device.allocate(width, height)?;
        Ok(Self {
            device,
            width,
            height,
            frame,
            source,
            destination,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn current_frame(&self) -> i64 {
        self.frame
    }

    pub fn device_handle(&self) -> &'d Device {
        self.device
    }

    pub fn source_buffer(&self) -> &GpuBuffer {
        &self.source
    }

    pub fn source_buffer_mut(&mut self) -> &mut GpuBuffer {
        &mut self.source
    }

    pub fn destination_buffer(&self) -> &GpuBuffer {
        &self.destination
    }

    pub fn destination_buffer_mut(&mut self) -> &mut GpuBuffer {
        &mut self.destination
    }

    /// Make the destination the new source and start a blank destination.
    ///
    /// The retired source's storage is recycled as the new destination, so a
    /// context never holds more than two buffers.
    pub fn roll_textures(&mut self) {
        std::mem::swap(&mut self.source, &mut self.destination);
        self.destination.clear();
    }

    /// Dispatch a map program from the source into the destination.
    pub fn run(&mut self, program: &Program, uniforms: &[f32]) -> StrataResult<()> {
        self.device
            .dispatch(program, &self.source, &mut self.destination, uniforms, self.frame)
    }

    /// Blend the destination into the source in place.
    pub fn blend_into_source(&mut self, program: &Program) -> StrataResult<()> {
        self.device.blend(program, &mut self.source, &self.destination)
    }
}
