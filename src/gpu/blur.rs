//! Two-pass separable Gaussian blur over the trail buffer.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::shaders::blur_shader;
use super::targets::{
    fullscreen_bind_group, fullscreen_bind_group_layout, fullscreen_pipeline, RenderTargets,
    TARGET_FORMAT,
};

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct BlurUniforms {
    pub direction: [f32; 2],
    pub resolution: [f32; 2],
    pub blur_size: f32,
    pub _pad: [f32; 3],
}

impl BlurUniforms {
    pub fn new(direction: [f32; 2], width: u32, height: u32, blur_size: f32) -> Self {
        Self {
            direction,
            resolution: [width.max(1) as f32, height.max(1) as f32],
            blur_size,
            _pad: [0.0; 3],
        }
    }
}

pub struct BlurPass {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    horizontal_uniforms: wgpu::Buffer,
    vertical_uniforms: wgpu::Buffer,
    horizontal: wgpu::BindGroup,
    vertical: wgpu::BindGroup,
}

impl BlurPass {
    pub fn new(device: &wgpu::Device, targets: &RenderTargets, sampler: &wgpu::Sampler) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Blur Shader"),
            source: wgpu::ShaderSource::Wgsl(blur_shader().into()),
        });
        let layout = fullscreen_bind_group_layout(device, "Blur Bind Group Layout");
        let pipeline = fullscreen_pipeline(device, "Blur Pipeline", &layout, &shader, TARGET_FORMAT);

        let make_uniforms = |label: &str, direction: [f32; 2]| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::bytes_of(&BlurUniforms::new(
                    direction,
                    targets.width,
                    targets.height,
                    0.0,
                )),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            })
        };
        let horizontal_uniforms = make_uniforms("Horizontal Blur Uniforms", [1.0, 0.0]);
        let vertical_uniforms = make_uniforms("Vertical Blur Uniforms", [0.0, 1.0]);

        let (horizontal, vertical) =
            Self::bind(device, &layout, targets, sampler, &horizontal_uniforms, &vertical_uniforms);

        Self {
            pipeline,
            layout,
            horizontal_uniforms,
            vertical_uniforms,
            horizontal,
            vertical,
        }
    }

    fn bind(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        targets: &RenderTargets,
        sampler: &wgpu::Sampler,
        horizontal_uniforms: &wgpu::Buffer,
        vertical_uniforms: &wgpu::Buffer,
    ) -> (wgpu::BindGroup, wgpu::BindGroup) {
        let horizontal = fullscreen_bind_group(
            device,
            "Horizontal Blur Bind Group",
            layout,
            &targets.trail.view,
            sampler,
            horizontal_uniforms,
        );
        let vertical = fullscreen_bind_group(
            device,
            "Vertical Blur Bind Group",
            layout,
            &targets.blur_h.view,
            sampler,
            vertical_uniforms,
        );
        (horizontal, vertical)
    }

    /// Point the bind groups at freshly allocated targets.
    pub fn rebind(&mut self, device: &wgpu::Device, targets: &RenderTargets, sampler: &wgpu::Sampler) {
        let (horizontal, vertical) = Self::bind(
            device,
            &self.layout,
            targets,
            sampler,
            &self.horizontal_uniforms,
            &self.vertical_uniforms,
        );
        self.horizontal = horizontal;
        self.vertical = vertical;
    }

    pub fn update(&self, queue: &wgpu::Queue, blur_size: f32, width: u32, height: u32) {
        queue.write_buffer(
            &self.horizontal_uniforms,
            0,
            bytemuck::bytes_of(&BlurUniforms::new([1.0, 0.0], width, height, blur_size)),
        );
        queue.write_buffer(
            &self.vertical_uniforms,
            0,
            bytemuck::bytes_of(&BlurUniforms::new([0.0, 1.0], width, height, blur_size)),
        );
    }

    /// Encode trail → blur_h → blurred.
    pub fn encode(&self, encoder: &mut wgpu::CommandEncoder, targets: &RenderTargets) {
        for (label, view, bind_group) in [
            ("Horizontal Blur Pass", &targets.blur_h.view, &self.horizontal),
            ("Vertical Blur Pass", &targets.blurred.view, &self.vertical),
        ] {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
    }

    pub fn destroy(self) {
        drop(self.horizontal);
        drop(self.vertical);
        self.horizontal_uniforms.destroy();
        self.vertical_uniforms.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_size_is_16_aligned() {
        assert_eq!(std::mem::size_of::<BlurUniforms>() % 16, 0);
    }
}
