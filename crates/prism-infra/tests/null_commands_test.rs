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

use prism_core::math::Extent2D;
use prism_core::renderer::*;
use prism_infra::NullRenderSystem;
use std::time::Duration;

/// A null device with a render target and a linked graphics pipeline.
struct DrawSetup {
    system: NullRenderSystem,
    target: RenderTargetId,
    pipeline: PipelineStateId,
}

impl DrawSetup {
    fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let system = NullRenderSystem::new(&RenderSystemDescriptor::default());
        let target = system
            .create_render_target(&RenderTargetDescriptor {
                resolution: Extent2D::new(8, 8),
                color_attachments: vec![AttachmentDescriptor {
                    format: Format::RGBA8UNorm,
                    ..Default::default()
                }],
                ..Default::default()
            })
            .unwrap();
        let vertex = system
            .create_shader(&ShaderDescriptor::from_code(
                ShaderType::Vertex,
                "void main() { gl_Position = vec4(0.0); }",
            ))
            .unwrap();
        let program = system
            .create_shader_program(&ShaderProgramDescriptor {
                vertex: Some(vertex),
                ..Default::default()
            })
            .unwrap();
        let pipeline = system
            .create_graphics_pipeline(&GraphicsPipelineDescriptor::new(program))
            .unwrap();
        Self {
            system,
            target,
            pipeline,
        }
    }

    fn command_buffer(&self, flags: CommandBufferFlags) -> Box<dyn CommandBuffer> {
        self.system
            .create_command_buffer(&CommandBufferDescriptor {
                flags,
                ..Default::default()
            })
            .unwrap()
    }

    fn query_heap(&self, ty: QueryType, num_queries: u32) -> QueryHeapId {
        self.system
            .create_query_heap(&QueryHeapDescriptor {
                ty,
                num_queries,
                ..Default::default()
            })
            .unwrap()
    }

    fn submit(&self, commands: &mut Box<dyn CommandBuffer>) -> CommandResult {
        self.system.command_queue().submit(commands.as_mut())
    }
}

#[test]
fn test_queries_count_vertices_of_their_scope() {
    let setup = DrawSetup::new();
    let samples = setup.query_heap(QueryType::SamplesPassed, 2);
    let any = setup.query_heap(QueryType::AnySamplesPassed, 1);

    let mut commands = setup.command_buffer(CommandBufferFlags::EMPTY);
    commands.begin().unwrap();
    commands.begin_render_pass(setup.target, None, &[]).unwrap();
    commands.set_pipeline_state(setup.pipeline).unwrap();
    commands.begin_query(samples, 0).unwrap();
    commands.begin_query(any, 0).unwrap();
    commands.draw(3, 0).unwrap();
    commands.draw_instanced(6, 0, 2, 0).unwrap();
    commands.end_query(any, 0).unwrap();
    commands.end_query(samples, 0).unwrap();
    commands.begin_query(samples, 1).unwrap();
    commands.end_query(samples, 1).unwrap();
    commands.end_render_pass().unwrap();
    commands.end().unwrap();
    setup.submit(&mut commands).unwrap();

    let queue = setup.system.command_queue();
    assert_eq!(queue.query_result(samples, 0, 2).unwrap(), Some(vec![15, 0]));
    assert_eq!(queue.query_result(any, 0, 1).unwrap(), Some(vec![1]));
    assert!(queue.query_result(samples, 1, 2).is_err());
}

#[test]
fn test_render_condition_skips_draws() {
    let setup = DrawSetup::new();
    let occlusion = setup.query_heap(QueryType::AnySamplesPassed, 1);

    let mut commands = setup.command_buffer(CommandBufferFlags::EMPTY);
    commands.begin().unwrap();
    commands.begin_render_pass(setup.target, None, &[]).unwrap();
    commands.set_pipeline_state(setup.pipeline).unwrap();
    // Nothing is drawn inside the query, so its result is zero.
    commands.begin_query(occlusion, 0).unwrap();
    commands.end_query(occlusion, 0).unwrap();
    commands
        .begin_render_condition(occlusion, 0, RenderConditionMode::Wait)
        .unwrap();
    commands.draw(3, 0).unwrap();
    commands.end_render_condition().unwrap();
    commands
        .begin_render_condition(occlusion, 0, RenderConditionMode::WaitInverted)
        .unwrap();
    commands.draw(3, 0).unwrap();
    commands.end_render_condition().unwrap();
    commands.end_render_pass().unwrap();
    commands.end().unwrap();
    setup.submit(&mut commands).unwrap();

    let statistics = setup.system.statistics().unwrap();
    assert_eq!(statistics.skipped_draws, 1);
    assert_eq!(statistics.draw_calls, 1);
    assert_eq!(statistics.vertices, 3);
}

#[test]
fn test_draw_without_pipeline_fails_at_submission() {
    let setup = DrawSetup::new();
    let mut commands = setup.command_buffer(CommandBufferFlags::EMPTY);
    commands.begin().unwrap();
    commands.begin_render_pass(setup.target, None, &[]).unwrap();
    commands.draw(3, 0).unwrap();
    commands.end_render_pass().unwrap();
    commands.end().unwrap();
    assert_eq!(
        setup.submit(&mut commands),
        Err(CommandError::MissingPipelineState)
    );
}

#[test]
fn test_submission_rules() {
    let setup = DrawSetup::new();
    let mut commands = setup.command_buffer(CommandBufferFlags::EMPTY);
    commands.begin().unwrap();
    assert_eq!(
        setup.submit(&mut commands),
        Err(CommandError::AlreadyRecording)
    );
    commands.end().unwrap();
    // An empty buffer is accepted and replays nothing.
    setup.submit(&mut commands).unwrap();
    assert_eq!(setup.system.statistics().unwrap().submits, 0);

    let mut secondary = setup.command_buffer(CommandBufferFlags::SECONDARY);
    secondary.begin().unwrap();
    secondary.push_debug_group("secondary").unwrap();
    secondary.pop_debug_group().unwrap();
    secondary.end().unwrap();
    assert_eq!(
        setup.submit(&mut secondary),
        Err(CommandError::SecondarySubmit(secondary.id()))
    );
}

#[test]
fn test_transfers_and_secondary_buffers() {
    let setup = DrawSetup::new();
    let system = &setup.system;
    let descriptor = BufferDescriptor {
        size: 16,
        bind_flags: BindFlags::COPY_SRC | BindFlags::COPY_DST,
        ..Default::default()
    };
    let src = system.create_buffer(&descriptor, None).unwrap();
    let dst = system.create_buffer(&descriptor, None).unwrap();

    let mut secondary = setup.command_buffer(CommandBufferFlags::SECONDARY);
    secondary.begin().unwrap();
    secondary.update_buffer(src, 0, &[1, 2, 3, 4]).unwrap();
    secondary.end().unwrap();

    let mut commands = setup.command_buffer(CommandBufferFlags::MULTI_SUBMIT);
    commands.begin().unwrap();
    commands.fill_buffer(dst, 0, 0xAABB_CCDD, WHOLE_SIZE).unwrap();
    commands.execute(secondary.id()).unwrap();
    commands.copy_buffer(dst, 8, src, 0, 4).unwrap();
    commands.end().unwrap();
    setup.submit(&mut commands).unwrap();
    // Multi-submit buffers keep their commands.
    setup.submit(&mut commands).unwrap();

    let mut out = [0u8; 16];
    system.read_buffer(dst, 0, &mut out).unwrap();
    assert_eq!(&out[..4], &0xAABB_CCDDu32.to_le_bytes());
    assert_eq!(&out[8..12], &[1, 2, 3, 4]);
    assert_eq!(system.statistics().unwrap().submits, 2);
}

#[test]
fn test_unaligned_fill_is_rejected() {
    let setup = DrawSetup::new();
    let buffer = setup
        .system
        .create_buffer(
            &BufferDescriptor {
                size: 16,
                ..Default::default()
            },
            None,
        )
        .unwrap();
    let mut commands = setup.command_buffer(CommandBufferFlags::EMPTY);
    commands.begin().unwrap();
    commands.fill_buffer(buffer, 2, 0, 4).unwrap();
    commands.end().unwrap();
    assert!(matches!(
        setup.submit(&mut commands),
        Err(CommandError::Resource(ResourceError::InvalidAccess(_)))
    ));
}

#[test]
fn test_fences_signal_after_submission() {
    let setup = DrawSetup::new();
    let queue = setup.system.command_queue();
    let fence = setup.system.create_fence().unwrap();
    assert!(!queue.wait_fence(fence, Duration::from_millis(1)).unwrap());
    queue.submit_fence(fence).unwrap();
    assert!(queue.wait_fence(fence, Duration::from_secs(1)).unwrap());
    queue.wait_idle().unwrap();

    setup.system.destroy_fence(fence).unwrap();
    assert_eq!(queue.submit_fence(fence), Err(ResourceError::NotFound));
}

fn draw_twice(setup: &DrawSetup, flags: CommandBufferFlags) -> Box<dyn CommandBuffer> {
    let mut commands = setup.command_buffer(flags);
    commands.begin().unwrap();
    commands.begin_render_pass(setup.target, None, &[]).unwrap();
    commands.set_pipeline_state(setup.pipeline).unwrap();
    commands.draw(3, 0).unwrap();
    commands.draw(6, 0).unwrap();
    commands.end_render_pass().unwrap();
    commands.end().unwrap();
    commands
}

#[test]
fn test_single_submit_buffers_are_cleared_after_replay() {
    let setup = DrawSetup::new();
    let mut commands = draw_twice(&setup, CommandBufferFlags::EMPTY);
    setup.submit(&mut commands).unwrap();
    setup.submit(&mut commands).unwrap();

    let statistics = setup.system.statistics().unwrap();
    assert_eq!(statistics.submits, 1);
    assert_eq!(statistics.draw_calls, 2);
}

#[test]
fn test_multi_submit_buffers_replay_every_time() {
    let setup = DrawSetup::new();
    let mut commands = draw_twice(&setup, CommandBufferFlags::MULTI_SUBMIT);
    setup.submit(&mut commands).unwrap();
    setup.submit(&mut commands).unwrap();

    let statistics = setup.system.statistics().unwrap();
    assert_eq!(statistics.submits, 2);
    assert_eq!(statistics.draw_calls, 4);
    assert_eq!(statistics.vertices, 18);
}

#[test]
fn test_immediate_submit_replays_on_end() {
    let setup = DrawSetup::new();
    let _commands = draw_twice(&setup, CommandBufferFlags::IMMEDIATE_SUBMIT);
    assert_eq!(setup.system.statistics().unwrap().draw_calls, 2);

    let mut empty = setup.command_buffer(CommandBufferFlags::IMMEDIATE_SUBMIT);
    empty.begin().unwrap();
    empty.end().unwrap();
    assert!(!empty.is_recording());
    assert_eq!(setup.system.statistics().unwrap().submits, 1);
}

#[test]
fn test_dropped_secondary_cannot_be_executed() {
    let setup = DrawSetup::new();
    let buffer = setup
        .system
        .create_buffer(
            &BufferDescriptor {
                size: 4,
                bind_flags: BindFlags::COPY_DST,
                ..Default::default()
            },
            None,
        )
        .unwrap();

    let mut secondary = setup.command_buffer(CommandBufferFlags::SECONDARY);
    secondary.begin().unwrap();
    secondary.update_buffer(buffer, 0, &[9, 9, 9, 9]).unwrap();
    secondary.end().unwrap();
    let released = secondary.id();
    drop(secondary);

    let mut commands = setup.command_buffer(CommandBufferFlags::EMPTY);
    commands.begin().unwrap();
    commands.execute(released).unwrap();
    commands.end().unwrap();
    assert_eq!(
        setup.submit(&mut commands),
        Err(CommandError::UnknownCommandBuffer(released))
    );

    let mut out = [0u8; 4];
    setup.system.read_buffer(buffer, 0, &mut out).unwrap();
    assert_eq!(out, [0; 4]);
}
