//! Instanced circular sprites for trail points and nodes.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::shaders::SPRITE_SHADER;
use super::targets::TARGET_FORMAT;

/// One sprite: center in pixels (y down), diameter, straight RGBA.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct SpriteInstance {
    pub center: [f32; 2],
    pub size: f32,
    pub _pad: f32,
    pub color: [f32; 4],
}

impl SpriteInstance {
    pub fn new(center: glam::Vec2, size: f32, color: glam::Vec4) -> Self {
        Self {
            center: center.to_array(),
            size,
            _pad: 0.0,
            color: color.to_array(),
        }
    }

    const ATTRIBUTES: [wgpu::VertexAttribute; 3] = [
        wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x2,
            offset: 0,
            shader_location: 0,
        },
        wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32,
            offset: 8,
            shader_location: 1,
        },
        wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x4,
            offset: 16,
            shader_location: 2,
        },
    ];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<SpriteInstance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct SpriteUniforms {
    resolution: [f32; 2],
    _pad: [f32; 2],
}

/// Growable instance buffer.
struct SpriteBatch {
    label: &'static str,
    buffer: wgpu::Buffer,
    capacity: usize,
    count: u32,
}

impl SpriteBatch {
    fn new(device: &wgpu::Device, label: &'static str, capacity: usize) -> Self {
        Self {
            label,
            buffer: Self::allocate(device, label, capacity),
            capacity,
            count: 0,
        }
    }

    fn allocate(device: &wgpu::Device, label: &str, capacity: usize) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: (capacity.max(1) * std::mem::size_of::<SpriteInstance>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, sprites: &[SpriteInstance]) {
        if sprites.len() > self.capacity {
            let capacity = sprites.len().next_power_of_two();
            tracing::debug!(batch = self.label, capacity, "growing sprite buffer");
            self.buffer.destroy();
            self.buffer = Self::allocate(device, self.label, capacity);
            self.capacity = capacity;
        }
        if !sprites.is_empty() {
            queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(sprites));
        }
        self.count = sprites.len() as u32;
    }
}

/// Trail and node sprite pipelines with their instance buffers.
pub struct SpritePass {
    trail_pipeline: wgpu::RenderPipeline,
    node_pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    uniform_buffer: wgpu::Buffer,
    trails: SpriteBatch,
    nodes: SpriteBatch,
}

impl SpritePass {
    /// `output_format` is the format of the final frame the nodes land on.
    pub fn new(
        device: &wgpu::Device,
        output_format: wgpu::TextureFormat,
        max_nodes: usize,
        width: u32,
        height: u32,
    ) -> Self {
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Sprite Uniform Buffer"),
            contents: bytemuck::bytes_of(&SpriteUniforms {
                resolution: [width.max(1) as f32, height.max(1) as f32],
                _pad: [0.0; 2],
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Sprite Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Sprite Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Sprite Shader"),
            source: wgpu::ShaderSource::Wgsl(SPRITE_SHADER.into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Sprite Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let trail_pipeline = create_sprite_pipeline(
            device,
            "Trail Sprite Pipeline",
            &pipeline_layout,
            &shader,
            "fs_trail",
            TARGET_FORMAT,
        );
        let node_pipeline = create_sprite_pipeline(
            device,
            "Node Sprite Pipeline",
            &pipeline_layout,
            &shader,
            "fs_node",
            output_format,
        );

        Self {
            trail_pipeline,
            node_pipeline,
            bind_group,
            uniform_buffer,
            trails: SpriteBatch::new(device, "Trail Instance Buffer", 1024),
            nodes: SpriteBatch::new(device, "Node Instance Buffer", max_nodes),
        }
    }

    pub fn resize(&self, queue: &wgpu::Queue, width: u32, height: u32) {
        let uniforms = SpriteUniforms {
            resolution: [width.max(1) as f32, height.max(1) as f32],
            _pad: [0.0; 2],
        };
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
    }

    pub fn upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        trails: &[SpriteInstance],
        nodes: &[SpriteInstance],
    ) {
        self.trails.upload(device, queue, trails);
        self.nodes.upload(device, queue, nodes);
    }

    pub fn draw_trails(&self, pass: &mut wgpu::RenderPass<'_>) {
        self.draw(pass, &self.trail_pipeline, &self.trails);
    }

    pub fn draw_nodes(&self, pass: &mut wgpu::RenderPass<'_>) {
        self.draw(pass, &self.node_pipeline, &self.nodes);
    }

    fn draw(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        pipeline: &wgpu::RenderPipeline,
        batch: &SpriteBatch,
    ) {
        if batch.count == 0 {
            return;
        }
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.set_vertex_buffer(0, batch.buffer.slice(..));
        pass.draw(0..6, 0..batch.count);
    }

    pub fn destroy(self) {
        self.trails.buffer.destroy();
        self.nodes.buffer.destroy();
        self.uniform_buffer.destroy();
    }
}

fn create_sprite_pipeline(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    fragment_entry: &str,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[SpriteInstance::layout()],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(fragment_entry),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
