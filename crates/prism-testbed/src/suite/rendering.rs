// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::time::Duration;

use prism_core::math::{ColorRgba, Extent2D, Extent3D};
use prism_core::renderer::{
    AttachmentDescriptor, AttachmentFormatDescriptor, AttachmentLoadOp, AttachmentStoreOp,
    ClearFlags, ClearValue, Format, GraphicsPipelineDescriptor, PipelineStateId, QueryHeapDescriptor,
    QueryType, RenderConditionMode, RenderPassDescriptor, RenderTargetDescriptor,
    RenderTargetId, ShaderDescriptor, ShaderProgramDescriptor, ShaderType, SwapChainDescriptor,
    TextureRegion,
};

use super::ModuleContext;
use crate::runner::{TestCase, TestResult};

pub(super) const TESTS: [TestCase<ModuleContext>; 4] = [
    TestCase {
        name: "OcclusionQueries",
        run: test_occlusion_queries,
    },
    TestCase {
        name: "RenderCondition",
        run: test_render_condition,
    },
    TestCase {
        name: "SwapChainPresent",
        run: test_swap_chain_present,
    },
    TestCase {
        name: "Fences",
        run: test_fences,
    },
];

const TRIANGLE_VS: &str = r#"
@vertex
fn main(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {
    let x = f32(i32(index) - 1);
    let y = f32(i32(index & 1u) * 2 - 1);
    return vec4<f32>(x, y, 0.0, 1.0);
}
"#;

const SOLID_FS: &str = r#"
@fragment
fn main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0, 0.0, 0.0, 1.0);
}
"#;

/// A render target with a pipeline that draws a triangle into it.
struct TriangleScene {
    target: RenderTargetId,
    pipeline: PipelineStateId,
}

impl TriangleScene {
    fn new(ctx: &ModuleContext) -> anyhow::Result<Self> {
        let system = &ctx.system;
        let size = ctx.texture_size();
        let render_pass = system.create_render_pass(&RenderPassDescriptor {
            color_attachments: vec![AttachmentFormatDescriptor {
                format: Format::RGBA8UNorm,
                load_op: AttachmentLoadOp::Clear,
                store_op: AttachmentStoreOp::Store,
            }],
            ..Default::default()
        })?;
        let target = system.create_render_target(&RenderTargetDescriptor {
            render_pass: Some(render_pass),
            resolution: Extent2D::new(size, size),
            color_attachments: vec![AttachmentDescriptor {
                format: Format::RGBA8UNorm,
                ..Default::default()
            }],
            ..Default::default()
        })?;
        let vertex =
            system.create_shader(&ShaderDescriptor::from_code(ShaderType::Vertex, TRIANGLE_VS))?;
        let fragment =
            system.create_shader(&ShaderDescriptor::from_code(ShaderType::Fragment, SOLID_FS))?;
        let program = system.create_shader_program(&ShaderProgramDescriptor {
            vertex: Some(vertex),
            fragment: Some(fragment),
            ..Default::default()
        })?;
        let linked = system.shader_program(program)?;
        anyhow::ensure!(
            linked.is_linked(),
            "triangle program failed to link: {}",
            linked.info_log()
        );
        let pipeline = system.create_graphics_pipeline(&GraphicsPipelineDescriptor {
            render_pass: Some(render_pass),
            ..GraphicsPipelineDescriptor::new(program)
        })?;
        Ok(Self { target, pipeline })
    }
}

fn test_occlusion_queries(ctx: &ModuleContext) -> anyhow::Result<TestResult> {
    let scene = TriangleScene::new(ctx)?;
    let samples = ctx.system.create_query_heap(&QueryHeapDescriptor {
        ty: QueryType::SamplesPassed,
        num_queries: 2,
        ..Default::default()
    })?;
    let any = ctx.system.create_query_heap(&QueryHeapDescriptor {
        ty: QueryType::AnySamplesPassed,
        num_queries: 1,
        ..Default::default()
    })?;

    ctx.submit(|commands| {
        commands.begin_render_pass(scene.target, None, &[ClearValue::default()])?;
        commands.set_pipeline_state(scene.pipeline)?;
        commands.begin_query(samples, 0)?;
        commands.begin_query(any, 0)?;
        commands.draw(3, 0)?;
        commands.end_query(any, 0)?;
        commands.end_query(samples, 0)?;
        commands.begin_query(samples, 1)?;
        commands.end_query(samples, 1)?;
        commands.end_render_pass()
    })?;

    let queue = ctx.system.command_queue();
    let counts = queue
        .query_result(samples, 0, 2)?
        .ok_or_else(|| anyhow::anyhow!("samples-passed results unavailable"))?;
    anyhow::ensure!(counts[0] > 0, "drawn triangle passed no samples");
    anyhow::ensure!(counts[1] == 0, "empty query counted {} samples", counts[1]);
    let any_passed = queue.query_result(any, 0, 1)?;
    anyhow::ensure!(
        any_passed == Some(vec![1]),
        "any-samples-passed returned {:?}",
        any_passed
    );

    ctx.system.destroy_query_heap(any)?;
    ctx.system.destroy_query_heap(samples)?;
    Ok(TestResult::Passed)
}

fn test_render_condition(ctx: &ModuleContext) -> anyhow::Result<TestResult> {
    if !ctx.system.rendering_caps().features.has_conditional_rendering {
        return Ok(TestResult::Skipped("no conditional rendering"));
    }
    let scene = TriangleScene::new(ctx)?;
    let occlusion = ctx.system.create_query_heap(&QueryHeapDescriptor {
        ty: QueryType::AnySamplesPassed,
        num_queries: 1,
        render_condition: true,
        ..Default::default()
    })?;
    let counter = ctx.system.create_query_heap(&QueryHeapDescriptor {
        ty: QueryType::SamplesPassed,
        num_queries: 2,
        ..Default::default()
    })?;

    ctx.submit(|commands| {
        commands.begin_render_pass(scene.target, None, &[ClearValue::default()])?;
        commands.set_pipeline_state(scene.pipeline)?;
        commands.begin_query(occlusion, 0)?;
        commands.end_query(occlusion, 0)?;

        commands.begin_query(counter, 0)?;
        commands.begin_render_condition(occlusion, 0, RenderConditionMode::Wait)?;
        commands.draw(3, 0)?;
        commands.end_render_condition()?;
        commands.end_query(counter, 0)?;

        commands.begin_query(counter, 1)?;
        commands.begin_render_condition(occlusion, 0, RenderConditionMode::WaitInverted)?;
        commands.draw(3, 0)?;
        commands.end_render_condition()?;
        commands.end_query(counter, 1)?;
        commands.end_render_pass()
    })?;

    let counts = ctx
        .system
        .command_queue()
        .query_result(counter, 0, 2)?
        .ok_or_else(|| anyhow::anyhow!("samples-passed results unavailable"))?;
    anyhow::ensure!(counts[0] == 0, "draw under a failed condition ran");
    anyhow::ensure!(counts[1] > 0, "draw under an inverted condition was skipped");

    ctx.system.destroy_query_heap(counter)?;
    ctx.system.destroy_query_heap(occlusion)?;
    Ok(TestResult::Passed)
}

fn test_swap_chain_present(ctx: &ModuleContext) -> anyhow::Result<TestResult> {
    let size = ctx.texture_size();
    let mut swap_chain = ctx.system.create_swap_chain(&SwapChainDescriptor {
        label: Some("Testbed".to_string()),
        resolution: Extent2D::new(size, size),
        swap_buffers: 2,
        ..Default::default()
    })?;
    anyhow::ensure!(swap_chain.num_swap_buffers() == 2);
    anyhow::ensure!(swap_chain.current_swap_index() == 0);

    // Clear the first back buffer to white and present it.
    let white = ClearValue::color(ColorRgba::new(1.0, 1.0, 1.0, 1.0));
    let target = swap_chain.render_target();
    ctx.submit(|commands| {
        commands.begin_render_pass(target, None, &[])?;
        commands.clear(ClearFlags::COLOR, &white)?;
        commands.end_render_pass()
    })?;
    swap_chain.present()?;
    anyhow::ensure!(swap_chain.current_swap_index() == 1);
    anyhow::ensure!(swap_chain.render_target() != target);

    let presented = swap_chain
        .color_buffer(0)
        .ok_or_else(|| anyhow::anyhow!("swap chain has no color buffer 0"))?;
    let extent = Extent3D::new(size, size, 1);
    let bytes = swap_chain.color_format().bytes_per_pixel() as usize;
    let mut contents = vec![0u8; (size * size) as usize * bytes];
    ctx.system
        .read_texture(presented, &TextureRegion::whole(extent), &mut contents)?;
    ctx.compare(&vec![255u8; contents.len()], &contents)?;

    swap_chain.present()?;
    anyhow::ensure!(swap_chain.current_swap_index() == 0);
    anyhow::ensure!(
        swap_chain.resize_buffers(Extent2D::new(0, size)).is_err(),
        "resized the swap chain to zero width"
    );
    swap_chain.resize_buffers(Extent2D::new(size * 2, size))?;
    anyhow::ensure!(swap_chain.resolution() == Extent2D::new(size * 2, size));
    Ok(TestResult::Passed)
}

fn test_fences(ctx: &ModuleContext) -> anyhow::Result<TestResult> {
    let queue = ctx.system.command_queue();
    let fences = [ctx.system.create_fence()?, ctx.system.create_fence()?];
    for fence in fences {
        queue.submit_fence(fence)?;
    }
    for fence in fences {
        anyhow::ensure!(
            queue.wait_fence(fence, Duration::from_secs(5))?,
            "fence {:?} was not signaled",
            fence
        );
    }
    queue.wait_idle()?;
    for fence in fences {
        ctx.system.destroy_fence(fence)?;
    }
    Ok(TestResult::Passed)
}
