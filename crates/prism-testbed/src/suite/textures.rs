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

use prism_core::math::{ColorRgba, Extent2D, Extent3D, Offset3D};
use prism_core::renderer::{
    AttachmentDescriptor, AttachmentFormatDescriptor, AttachmentLoadOp, AttachmentStoreOp,
    ClearFlags, ClearValue, Format, MiscFlags, RenderPassDescriptor, RenderTargetDescriptor,
    TextureDescriptor, TextureId, TextureRegion, TextureSubresource,
};

use super::ModuleContext;
use crate::runner::{TestCase, TestResult};

pub(super) const TESTS: [TestCase<ModuleContext>; 4] = [
    TestCase {
        name: "TextureWriteAndRead",
        run: test_texture_write_and_read,
    },
    TestCase {
        name: "TextureMipGeneration",
        run: test_texture_mip_generation,
    },
    TestCase {
        name: "GenerateMipsCommand",
        run: test_generate_mips_command,
    },
    TestCase {
        name: "RenderTargetClear",
        run: test_render_target_clear,
    },
];

fn texels(extent: Extent3D, texel: impl Fn(u32, u32) -> [u8; 4]) -> Vec<u8> {
    (0..extent.height)
        .flat_map(|y| (0..extent.width).map(move |x| (x, y)))
        .flat_map(|(x, y)| texel(x, y))
        .collect()
}

fn read_level(ctx: &ModuleContext, texture: TextureId, level: u32) -> anyhow::Result<Vec<u8>> {
    let descriptor = ctx.system.texture_descriptor(texture)?;
    let extent = descriptor
        .mip_extent(level)
        .ok_or_else(|| anyhow::anyhow!("texture has no mip level {level}"))?;
    let mut out = vec![0u8; (extent.width * extent.height * 4) as usize];
    let region = TextureRegion {
        subresource: TextureSubresource {
            base_mip_level: level,
            ..Default::default()
        },
        extent,
        ..Default::default()
    };
    ctx.system.read_texture(texture, &region, &mut out)?;
    Ok(out)
}

fn test_texture_write_and_read(ctx: &ModuleContext) -> anyhow::Result<TestResult> {
    let size = ctx.texture_size();
    let extent = Extent3D::new(size, size, 1);
    let initial = texels(extent, |x, y| [x as u8, y as u8, (x ^ y) as u8, 255]);
    let texture = ctx.system.create_texture(
        &TextureDescriptor {
            extent,
            ..Default::default()
        },
        Some(&initial),
    )?;
    ctx.compare(&initial, &read_level(ctx, texture, 0)?)?;

    let patch_extent = Extent3D::new(4, 4, 1);
    let patch = texels(patch_extent, |_, _| [200, 100, 50, 255]);
    let region = TextureRegion {
        offset: Offset3D::new(2, 3, 0),
        extent: patch_extent,
        ..Default::default()
    };
    ctx.system.write_texture(texture, &region, &patch)?;

    let mut readback = vec![0u8; patch.len()];
    ctx.system.read_texture(texture, &region, &mut readback)?;
    ctx.compare(&patch, &readback)?;

    let mut too_small = vec![0u8; patch.len() - 4];
    anyhow::ensure!(
        ctx.system.read_texture(texture, &region, &mut too_small).is_err(),
        "read into an undersized buffer succeeded"
    );
    ctx.system.destroy_texture(texture)?;
    Ok(TestResult::Passed)
}

fn test_texture_mip_generation(ctx: &ModuleContext) -> anyhow::Result<TestResult> {
    let size = ctx.texture_size();
    let extent = Extent3D::new(size, size, 1);
    let color = [64, 128, 192, 255];
    let texture = ctx.system.create_texture(
        &TextureDescriptor {
            extent,
            misc_flags: MiscFlags::GENERATE_MIPS,
            ..Default::default()
        },
        Some(&texels(extent, |_, _| color)),
    )?;

    let descriptor = ctx.system.texture_descriptor(texture)?;
    let levels = descriptor.num_mip_levels();
    anyhow::ensure!(
        levels == size.trailing_zeros() + 1,
        "expected a full mip chain, got {levels} levels"
    );
    for level in [1, levels - 1] {
        let contents = read_level(ctx, texture, level)?;
        let expected: Vec<u8> = contents.chunks(4).flat_map(|_| color).collect();
        ctx.compare(&expected, &contents)?;
    }
    ctx.system.destroy_texture(texture)?;
    Ok(TestResult::Passed)
}

fn test_generate_mips_command(ctx: &ModuleContext) -> anyhow::Result<TestResult> {
    let size = ctx.texture_size();
    let extent = Extent3D::new(size, size, 1);
    let texture = ctx.system.create_texture(
        &TextureDescriptor {
            extent,
            misc_flags: MiscFlags::GENERATE_MIPS,
            ..Default::default()
        },
        Some(&texels(extent, |_, _| [0, 0, 0, 255])),
    )?;

    // Alternating columns of 0 and 200 average to 100.
    let stripes = texels(extent, |x, _| {
        let v = if x % 2 == 0 { 0 } else { 200 };
        [v, v, v, 255]
    });
    ctx.system
        .write_texture(texture, &TextureRegion::whole(extent), &stripes)?;
    ctx.submit(|commands| commands.generate_mips(texture, None))?;

    let levels = ctx.system.texture_descriptor(texture)?.num_mip_levels();
    let last = read_level(ctx, texture, levels - 1)?;
    ctx.compare(&[100, 100, 100, 255], &last)?;
    ctx.system.destroy_texture(texture)?;
    Ok(TestResult::Passed)
}

fn test_render_target_clear(ctx: &ModuleContext) -> anyhow::Result<TestResult> {
    if !ctx.system.rendering_caps().features.has_render_targets {
        return Ok(TestResult::Skipped("no render targets"));
    }
    let size = ctx.texture_size();
    let extent = Extent3D::new(size, size, 1);
    let texture = ctx.system.create_texture(
        &TextureDescriptor {
            extent,
            ..Default::default()
        },
        None,
    )?;
    let render_pass = ctx.system.create_render_pass(&RenderPassDescriptor {
        color_attachments: vec![AttachmentFormatDescriptor {
            format: Format::RGBA8UNorm,
            load_op: AttachmentLoadOp::Clear,
            store_op: AttachmentStoreOp::Store,
        }],
        ..Default::default()
    })?;
    let target = ctx.system.create_render_target(&RenderTargetDescriptor {
        render_pass: Some(render_pass),
        resolution: Extent2D::new(size, size),
        color_attachments: vec![AttachmentDescriptor {
            texture: Some(texture),
            format: Format::RGBA8UNorm,
            ..Default::default()
        }],
        ..Default::default()
    })?;

    let green = ClearValue::color(ColorRgba::new(0.0, 1.0, 0.0, 1.0));
    ctx.submit(|commands| {
        commands.begin_render_pass(target, Some(render_pass), &[green])?;
        commands.end_render_pass()
    })?;
    let contents = read_level(ctx, texture, 0)?;
    ctx.compare(&texels(extent, |_, _| [0, 255, 0, 255]), &contents)?;

    let blue = ClearValue::color(ColorRgba::new(0.0, 0.0, 1.0, 1.0));
    ctx.submit(|commands| {
        commands.begin_render_pass(target, None, &[])?;
        commands.clear(ClearFlags::COLOR, &blue)?;
        commands.end_render_pass()
    })?;
    let contents = read_level(ctx, texture, 0)?;
    ctx.compare(&texels(extent, |_, _| [0, 0, 255, 255]), &contents)?;

    ctx.system.destroy_render_target(target)?;
    ctx.system.destroy_render_pass(render_pass)?;
    ctx.system.destroy_texture(texture)?;
    Ok(TestResult::Passed)
}
