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

//! Tests that need no renderer module.

use prism_core::math::{ColorRgba, Extent3D};
use prism_core::renderer::command::{DecodedCommand, DeferredCommandBuffer};
use prism_core::renderer::{
    num_mip_levels, BufferId, ClearValue, CommandBuffer, CommandBufferDescriptor,
    CommandBufferId, CommandError, CommandRecorder, Format, ModuleRequest, RenderSystemDescriptor,
    RenderTargetId, RendererModule, TextureType, Vendor,
};

use crate::cli::Options;
use crate::runner::{TestCase, TestResult};

/// Tests of the renderer-independent core.
pub const INDEPENDENT_TESTS: [TestCase<Options>; 5] = [
    TestCase {
        name: "CommandStream",
        run: test_command_stream,
    },
    TestCase {
        name: "CommandBufferStates",
        run: test_command_buffer_states,
    },
    TestCase {
        name: "MipChains",
        run: test_mip_chains,
    },
    TestCase {
        name: "FormatProperties",
        run: test_format_properties,
    },
    TestCase {
        name: "ModuleNames",
        run: test_module_names,
    },
];

fn test_command_stream(_: &Options) -> anyhow::Result<TestResult> {
    let mut buffer =
        DeferredCommandBuffer::new(CommandBufferId(1), &CommandBufferDescriptor::default(), 0);
    buffer.begin()?;
    buffer.update_buffer(BufferId(4), 8, &[1, 2, 3, 4])?;
    buffer.begin_render_pass(
        RenderTargetId(2),
        None,
        &[ClearValue::color(ColorRgba::new(0.0, 0.5, 1.0, 1.0))],
    )?;
    buffer.push_debug_group("triangles")?;
    buffer.draw_instanced(3, 0, 4, 1)?;
    buffer.pop_debug_group()?;
    buffer.end_render_pass()?;
    buffer.end()?;

    let commands = buffer
        .stream()
        .reader()
        .collect::<Result<Vec<_>, CommandError>>()?;
    anyhow::ensure!(
        commands.len() == buffer.stream().num_commands(),
        "decoded {} of {} commands",
        commands.len(),
        buffer.stream().num_commands()
    );
    anyhow::ensure!(commands.len() == 6, "expected 6 commands, got {}", commands.len());
    anyhow::ensure!(
        commands[0]
            == DecodedCommand::UpdateBuffer {
                dst: BufferId(4),
                dst_offset: 8,
                data: &[1, 2, 3, 4],
            },
        "unexpected first command {:?}",
        commands[0]
    );
    anyhow::ensure!(
        commands[3]
            == DecodedCommand::DrawInstanced {
                num_vertices: 3,
                first_vertex: 0,
                num_instances: 4,
                first_instance: 1,
            },
        "unexpected draw {:?}",
        commands[3]
    );
    Ok(TestResult::Passed)
}

fn test_command_buffer_states(_: &Options) -> anyhow::Result<TestResult> {
    let mut buffer =
        DeferredCommandBuffer::new(CommandBufferId(1), &CommandBufferDescriptor::default(), 0);
    anyhow::ensure!(
        buffer.draw(3, 0) == Err(CommandError::NotRecording),
        "draw accepted outside recording"
    );
    buffer.begin()?;
    anyhow::ensure!(
        buffer.begin() == Err(CommandError::AlreadyRecording),
        "nested begin accepted"
    );
    anyhow::ensure!(
        buffer.draw(3, 0) == Err(CommandError::OutsideRenderPass),
        "draw accepted outside a render pass"
    );
    buffer.push_debug_group("open")?;
    anyhow::ensure!(
        matches!(buffer.end(), Err(CommandError::UnbalancedDebugGroup { .. })),
        "end accepted an open debug group"
    );
    buffer.pop_debug_group()?;
    buffer.end()?;
    Ok(TestResult::Passed)
}

fn test_mip_chains(_: &Options) -> anyhow::Result<TestResult> {
    let cases = [
        (TextureType::Texture2D, Extent3D::new(1, 1, 1), 1),
        (TextureType::Texture2D, Extent3D::new(256, 128, 1), 9),
        (TextureType::Texture2DArray, Extent3D::new(64, 64, 32), 7),
        (TextureType::Texture3D, Extent3D::new(4, 4, 32), 6),
        (TextureType::Texture2DMS, Extent3D::new(512, 512, 1), 1),
    ];
    for (ty, extent, expected) in cases {
        let levels = num_mip_levels(ty, extent);
        anyhow::ensure!(
            levels == expected,
            "{:?} {:?}: expected {} mip levels, got {}",
            ty,
            extent,
            expected,
            levels
        );
    }
    Ok(TestResult::Passed)
}

fn test_format_properties(_: &Options) -> anyhow::Result<TestResult> {
    let sizes = [
        (Format::R8UNorm, 1),
        (Format::RGBA8UNorm, 4),
        (Format::RGBA16Float, 8),
        (Format::RGBA32Float, 16),
        (Format::D24UNormS8UInt, 4),
    ];
    for (format, expected) in sizes {
        anyhow::ensure!(
            format.bytes_per_pixel() == expected,
            "{:?} has {} bytes per pixel, expected {}",
            format,
            format.bytes_per_pixel(),
            expected
        );
    }
    anyhow::ensure!(Format::D24UNormS8UInt.is_depth_or_stencil());
    anyhow::ensure!(!Format::RGBA8UNorm.is_depth_or_stencil());
    anyhow::ensure!(Format::from_depth_stencil_bits(24, 8) == Format::D24UNormS8UInt);
    anyhow::ensure!(Format::from_depth_stencil_bits(0, 0) == Format::Undefined);
    Ok(TestResult::Passed)
}

fn test_module_names(_: &Options) -> anyhow::Result<TestResult> {
    let aliases = [
        ("gl", RendererModule::OpenGL),
        ("vk", RendererModule::Vulkan),
        ("mtl", RendererModule::Metal),
        ("dx11", RendererModule::Direct3D11),
        ("d3d12", RendererModule::Direct3D12),
        ("null", RendererModule::Null),
    ];
    for (alias, module) in aliases {
        let request: ModuleRequest = alias.parse()?;
        anyhow::ensure!(request.module == module, "'{}' resolved to {}", alias, request.module);
    }
    let versioned: ModuleRequest = "gl330".parse()?;
    anyhow::ensure!(versioned.version_major_minor() == Some((3, 3)));
    anyhow::ensure!("glide".parse::<ModuleRequest>().is_err());

    let descriptor = RenderSystemDescriptor::from_json(
        r#"{ "module": "d3d12", "debug": true, "preferred_vendor": "amd" }"#,
    )?;
    anyhow::ensure!(descriptor.module == "d3d12" && descriptor.debug);
    anyhow::ensure!(descriptor.preferred_vendor == Some(Vendor::Amd));
    Ok(TestResult::Passed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_independent_suite_passes() {
        for case in &INDEPENDENT_TESTS {
            assert_eq!(
                (case.run)(&Options::default()).unwrap(),
                TestResult::Passed,
                "{}",
                case.name
            );
        }
    }
}
