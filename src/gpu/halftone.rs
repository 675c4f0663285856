//! Halftone composite pass: blurred trails in, screened frame out.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::shaders::halftone_shader;
use super::targets::{
    fullscreen_bind_group, fullscreen_bind_group_layout, fullscreen_pipeline, RenderTargets,
};
use crate::halftone::HalftoneParams;

/// Uniform block mirrored by `HalftoneUniforms` in the shader.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct HalftoneUniforms {
    pub radius: f32,
    pub rotate_r: f32,
    pub rotate_g: f32,
    pub rotate_b: f32,
    pub scatter: f32,
    pub width: f32,
    pub height: f32,
    pub blending: f32,
    pub shape: u32,
    pub blending_mode: u32,
    pub greyscale: u32,
    pub disable: u32,
}

impl HalftoneUniforms {
    pub fn new(params: &HalftoneParams, width: u32, height: u32) -> Self {
        let p = params.clamped();
        Self {
            radius: p.radius,
            rotate_r: p.rotate_r,
            rotate_g: p.rotate_g,
            rotate_b: p.rotate_b,
            scatter: p.scatter,
            width: width.max(1) as f32,
            height: height.max(1) as f32,
            blending: p.blending,
            shape: p.shape.id(),
            blending_mode: p.blending_mode.id(),
            greyscale: p.greyscale as u32,
            disable: p.disable as u32,
        }
    }
}

pub struct HalftonePass {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    uniforms: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl HalftonePass {
    pub fn new(
        device: &wgpu::Device,
        targets: &RenderTargets,
        sampler: &wgpu::Sampler,
        output_format: wgpu::TextureFormat,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Halftone Shader"),
            source: wgpu::ShaderSource::Wgsl(halftone_shader().into()),
        });
        let layout = fullscreen_bind_group_layout(device, "Halftone Bind Group Layout");
        let pipeline =
            fullscreen_pipeline(device, "Halftone Pipeline", &layout, &shader, output_format);
        let uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Halftone Uniforms"),
            contents: bytemuck::bytes_of(&HalftoneUniforms::new(
                &HalftoneParams::default(),
                targets.width,
                targets.height,
            )),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = fullscreen_bind_group(
            device,
            "Halftone Bind Group",
            &layout,
            &targets.blurred.view,
            sampler,
            &uniforms,
        );
        Self {
            pipeline,
            layout,
            uniforms,
            bind_group,
        }
    }

    pub fn rebind(&mut self, device: &wgpu::Device, targets: &RenderTargets, sampler: &wgpu::Sampler) {
        self.bind_group = fullscreen_bind_group(
            device,
            "Halftone Bind Group",
            &self.layout,
            &targets.blurred.view,
            sampler,
            &self.uniforms,
        );
    }

    pub fn update(&self, queue: &wgpu::Queue, params: &HalftoneParams, width: u32, height: u32) {
        let uniforms = HalftoneUniforms::new(params, width, height);
        queue.write_buffer(&self.uniforms, 0, bytemuck::bytes_of(&uniforms));
    }

    /// Draw into an already open pass on the output view.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.draw(0..3, 0..1);
    }

    pub fn destroy(self) {
        drop(self.bind_group);
        self.uniforms.destroy();
    }
}
