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

use prism_core::math::{ColorRgba, Extent2D, Extent3D};
use prism_core::renderer::*;
use prism_infra::{default_registry, NullRenderSystem};

fn null_system() -> NullRenderSystem {
    let _ = env_logger::builder().is_test(true).try_init();
    NullRenderSystem::new(&RenderSystemDescriptor::default())
}

fn buffer_descriptor(size: u64, cpu_access_flags: CpuAccessFlags) -> BufferDescriptor<'static> {
    BufferDescriptor {
        size,
        bind_flags: BindFlags::VERTEX_BUFFER | BindFlags::COPY_SRC | BindFlags::COPY_DST,
        cpu_access_flags,
        ..Default::default()
    }
}

#[test]
fn test_registry_loads_the_null_module() {
    let _ = env_logger::builder().is_test(true).try_init();
    let registry = default_registry();
    assert!(registry.is_registered(RendererModule::Null));

    let system = registry
        .load(&RenderSystemDescriptor::for_module("null"))
        .expect("the null module is always available");
    assert_eq!(system.module(), RendererModule::Null);
    assert_eq!(system.renderer_info().renderer_name, "Null");
    assert!(system.rendering_caps().features.has_render_targets);

    let err = registry
        .load(&RenderSystemDescriptor::for_module("glide"))
        .unwrap_err();
    assert!(matches!(err, RenderError::UnknownModule(_)));
}

#[test]
fn test_buffer_initial_data_and_partial_writes() {
    let system = null_system();
    let buffer = system
        .create_buffer(
            &buffer_descriptor(8, CpuAccessFlags::EMPTY),
            Some(&[1, 2, 3, 4]),
        )
        .unwrap();
    system.write_buffer(buffer, 5, &[9, 9]).unwrap();

    let mut out = [0u8; 8];
    system.read_buffer(buffer, 0, &mut out).unwrap();
    assert_eq!(out, [1, 2, 3, 4, 0, 9, 9, 0]);

    let err = system.write_buffer(buffer, 7, &[1, 2]).unwrap_err();
    assert!(matches!(err, ResourceError::OutOfBounds { .. }));
}

#[test]
fn test_zero_sized_buffer_is_rejected() {
    let system = null_system();
    let err = system
        .create_buffer(&buffer_descriptor(0, CpuAccessFlags::EMPTY), None)
        .unwrap_err();
    assert!(matches!(err, ResourceError::InvalidDescriptor(_)));
}

#[test]
fn test_map_buffer_respects_cpu_access() {
    let system = null_system();
    let buffer = system
        .create_buffer(
            &buffer_descriptor(16, CpuAccessFlags::READ | CpuAccessFlags::WRITE),
            Some(&[7; 16]),
        )
        .unwrap();

    system
        .map_buffer(buffer, CpuAccess::WriteOnly, 4, 8, &mut |mapping| {
            mapping.write(2, &[1, 2, 3]).unwrap();
        })
        .unwrap();

    let mut seen = Vec::new();
    system
        .map_buffer(buffer, CpuAccess::ReadOnly, 0, WHOLE_SIZE, &mut |mapping| {
            seen = mapping.data().to_vec();
        })
        .unwrap();
    assert_eq!(seen.len(), 16);
    assert_eq!(&seen[4..10], &[7, 7, 1, 2, 3, 7]);

    let read_only = system
        .create_buffer(&buffer_descriptor(16, CpuAccessFlags::READ), None)
        .unwrap();
    let err = system
        .map_buffer(read_only, CpuAccess::ReadWrite, 0, 16, &mut |_| {})
        .unwrap_err();
    assert!(matches!(err, ResourceError::InvalidAccess(_)));
}

#[test]
fn test_destroyed_buffer_is_gone() {
    let system = null_system();
    let buffer = system
        .create_buffer(&buffer_descriptor(4, CpuAccessFlags::EMPTY), None)
        .unwrap();
    system.destroy_buffer(buffer).unwrap();
    assert_eq!(system.destroy_buffer(buffer), Err(ResourceError::NotFound));
    assert!(system.buffer_descriptor(buffer).is_err());
}

#[test]
fn test_texture_upload_and_generated_mips() {
    let system = null_system();
    let texels: Vec<u8> = [0u8, 4, 8, 12]
        .iter()
        .flat_map(|value| [*value; 4])
        .collect();
    let texture = system
        .create_texture(
            &TextureDescriptor {
                extent: Extent3D::new(2, 2, 1),
                misc_flags: MiscFlags::GENERATE_MIPS,
                ..Default::default()
            },
            Some(&texels),
        )
        .unwrap();

    let descriptor = system.texture_descriptor(texture).unwrap();
    assert_eq!(descriptor.num_mip_levels(), 2);

    let mut base = vec![0u8; 16];
    system
        .read_texture(texture, &TextureRegion::whole(Extent3D::new(2, 2, 1)), &mut base)
        .unwrap();
    assert_eq!(base, texels);

    let mut level1 = [0u8; 4];
    let region = TextureRegion {
        subresource: TextureSubresource {
            base_mip_level: 1,
            ..Default::default()
        },
        extent: Extent3D::new(1, 1, 1),
        ..Default::default()
    };
    system.read_texture(texture, &region, &mut level1).unwrap();
    assert_eq!(level1, [6; 4]);
}

#[test]
fn test_texture_region_must_match_data_size() {
    let system = null_system();
    let texture = system
        .create_texture(
            &TextureDescriptor {
                extent: Extent3D::new(4, 4, 1),
                ..Default::default()
            },
            None,
        )
        .unwrap();
    let region = TextureRegion::whole(Extent3D::new(4, 4, 1));
    assert!(system.write_texture(texture, &region, &[0; 15]).is_err());

    let outside = TextureRegion::whole(Extent3D::new(8, 4, 1));
    let err = system.write_texture(texture, &outside, &[0; 128]).unwrap_err();
    assert!(matches!(err, ResourceError::OutOfBounds { .. }));
}

#[test]
fn test_sampler_lod_range_is_validated() {
    let system = null_system();
    assert!(system.create_sampler(&SamplerDescriptor::default()).is_ok());
    let err = system
        .create_sampler(&SamplerDescriptor {
            min_lod: 4.0,
            max_lod: 1.0,
            ..Default::default()
        })
        .unwrap_err();
    assert!(matches!(err, ResourceError::InvalidDescriptor(_)));
}

#[test]
fn test_render_target_allocates_internal_attachments() {
    let system = null_system();
    let target = system
        .create_render_target(&RenderTargetDescriptor {
            resolution: Extent2D::new(16, 16),
            color_attachments: vec![AttachmentDescriptor {
                format: Format::RGBA8UNorm,
                ..Default::default()
            }],
            depth_stencil_attachment: Some(AttachmentDescriptor {
                format: Format::D24UNormS8UInt,
                ..Default::default()
            }),
            ..Default::default()
        })
        .unwrap();
    system.destroy_render_target(target).unwrap();

    let err = system
        .create_render_target(&RenderTargetDescriptor {
            resolution: Extent2D::new(16, 16),
            color_attachments: vec![AttachmentDescriptor {
                format: Format::D32Float,
                ..Default::default()
            }],
            ..Default::default()
        })
        .unwrap_err();
    assert_eq!(err, ResourceError::UnsupportedFormat(Format::D32Float));
}

#[test]
fn test_swap_chain_rotates_back_buffers() {
    let system = null_system();
    let mut swap_chain = system
        .create_swap_chain(&SwapChainDescriptor {
            resolution: Extent2D::new(64, 32),
            swap_buffers: 3,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(swap_chain.num_swap_buffers(), 3);
    assert_eq!(swap_chain.current_swap_index(), 0);
    assert_eq!(swap_chain.depth_stencil_format(), Format::D24UNormS8UInt);

    for expected in [1, 2, 0] {
        swap_chain.present().unwrap();
        assert_eq!(swap_chain.current_swap_index(), expected);
    }

    let color = swap_chain.color_buffer(0).unwrap();
    assert!(swap_chain.resize_buffers(Extent2D::new(0, 32)).is_err());
    assert_eq!(swap_chain.resolution(), Extent2D::new(64, 32));
    assert_eq!(swap_chain.color_buffer(0), Some(color));

    swap_chain.resize_buffers(Extent2D::new(128, 64)).unwrap();
    let resized = swap_chain.color_buffer(0).unwrap();
    let descriptor = system.texture_descriptor(resized).unwrap();
    assert_eq!(descriptor.extent, Extent3D::new(128, 64, 1));
}

#[test]
fn test_render_pass_clear_reaches_the_texture() {
    let system = null_system();
    let texture = system
        .create_texture(
            &TextureDescriptor {
                extent: Extent3D::new(2, 2, 1),
                ..Default::default()
            },
            None,
        )
        .unwrap();
    let render_pass = system
        .create_render_pass(&RenderPassDescriptor {
            color_attachments: vec![AttachmentFormatDescriptor {
                format: Format::RGBA8UNorm,
                load_op: AttachmentLoadOp::Clear,
                store_op: AttachmentStoreOp::Store,
            }],
            ..Default::default()
        })
        .unwrap();
    let target = system
        .create_render_target(&RenderTargetDescriptor {
            render_pass: Some(render_pass),
            resolution: Extent2D::new(2, 2),
            color_attachments: vec![AttachmentDescriptor {
                texture: Some(texture),
                ..Default::default()
            }],
            ..Default::default()
        })
        .unwrap();

    let mut commands = system
        .create_command_buffer(&CommandBufferDescriptor::default())
        .unwrap();
    commands.begin().unwrap();
    let clear = ClearValue {
        color: ColorRgba::new(1.0, 0.0, 0.0, 1.0),
        ..Default::default()
    };
    commands
        .begin_render_pass(target, Some(render_pass), &[clear])
        .unwrap();
    commands.end_render_pass().unwrap();
    commands.end().unwrap();
    system.command_queue().submit(commands.as_mut()).unwrap();

    let mut texels = [0u8; 16];
    system
        .read_texture(texture, &TextureRegion::whole(Extent3D::new(2, 2, 1)), &mut texels)
        .unwrap();
    for texel in texels.chunks_exact(4) {
        assert_eq!(texel, [255, 0, 0, 255]);
    }
}
