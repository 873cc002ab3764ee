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

use prism_core::renderer::{
    BindFlags, BufferDescriptor, CpuAccess, CpuAccessFlags, ResourceError, WHOLE_SIZE,
};

use super::ModuleContext;
use crate::runner::{TestCase, TestResult};

pub(super) const TESTS: [TestCase<ModuleContext>; 3] = [
    TestCase {
        name: "BufferWriteAndRead",
        run: test_buffer_write_and_read,
    },
    TestCase {
        name: "BufferMap",
        run: test_buffer_map,
    },
    TestCase {
        name: "BufferTransferCommands",
        run: test_buffer_transfer_commands,
    },
];

const BUFFER_SIZE: u64 = 256;

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 251) as u8).collect()
}

fn buffer_descriptor(cpu_access_flags: CpuAccessFlags) -> BufferDescriptor<'static> {
    BufferDescriptor {
        size: BUFFER_SIZE,
        bind_flags: BindFlags::VERTEX_BUFFER | BindFlags::COPY_SRC | BindFlags::COPY_DST,
        cpu_access_flags,
        ..Default::default()
    }
}

fn test_buffer_write_and_read(ctx: &ModuleContext) -> anyhow::Result<TestResult> {
    let system = &ctx.system;
    let initial = pattern(BUFFER_SIZE as usize);
    let buffer = system.create_buffer(
        &buffer_descriptor(CpuAccessFlags::READ | CpuAccessFlags::WRITE),
        Some(&initial),
    )?;

    let mut contents = vec![0u8; BUFFER_SIZE as usize];
    system.read_buffer(buffer, 0, &mut contents)?;
    ctx.compare(&initial, &contents)?;

    let patch = [0xABu8; 64];
    system.write_buffer(buffer, 64, &patch)?;
    let mut expected = initial;
    expected[64..128].copy_from_slice(&patch);
    system.read_buffer(buffer, 0, &mut contents)?;
    ctx.compare(&expected, &contents)?;

    let mut tail = [0u8; 4];
    anyhow::ensure!(
        system.read_buffer(buffer, BUFFER_SIZE - 2, &mut tail).is_err(),
        "read past the end of the buffer succeeded"
    );
    system.destroy_buffer(buffer)?;
    Ok(TestResult::Passed)
}

fn test_buffer_map(ctx: &ModuleContext) -> anyhow::Result<TestResult> {
    let system = &ctx.system;
    let buffer = system.create_buffer(
        &buffer_descriptor(CpuAccessFlags::READ | CpuAccessFlags::WRITE),
        None,
    )?;
    let data = pattern(128);

    let mut written: Result<(), ResourceError> = Ok(());
    system.map_buffer(buffer, CpuAccess::WriteOnly, 64, 128, &mut |mapping| {
        written = mapping.write(0, &data);
    })?;
    written?;

    let mut contents = Vec::new();
    system.map_buffer(buffer, CpuAccess::ReadOnly, 64, 128, &mut |mapping| {
        contents = mapping.data().to_vec();
    })?;
    ctx.compare(&data, &contents)?;

    let mut denied = false;
    system.map_buffer(buffer, CpuAccess::ReadOnly, 0, 16, &mut |mapping| {
        denied = mapping.write(0, &[1]).is_err();
    })?;
    anyhow::ensure!(denied, "a read-only mapping accepted a write");

    let write_only = system.create_buffer(&buffer_descriptor(CpuAccessFlags::WRITE), None)?;
    anyhow::ensure!(
        system
            .map_buffer(write_only, CpuAccess::ReadOnly, 0, 16, &mut |_| {})
            .is_err(),
        "mapped a buffer for reading without CPU read access"
    );

    system.destroy_buffer(write_only)?;
    system.destroy_buffer(buffer)?;
    Ok(TestResult::Passed)
}

fn test_buffer_transfer_commands(ctx: &ModuleContext) -> anyhow::Result<TestResult> {
    let system = &ctx.system;
    let source_data = pattern(BUFFER_SIZE as usize);
    let source = system.create_buffer(&buffer_descriptor(CpuAccessFlags::EMPTY), Some(&source_data))?;
    let target = system.create_buffer(&buffer_descriptor(CpuAccessFlags::READ), None)?;

    ctx.submit(|commands| {
        commands.fill_buffer(target, 0, 0xDEAD_BEEF, 128)?;
        commands.copy_buffer(target, 128, source, 0, 64)?;
        commands.update_buffer(target, 192, &[0x11; 16])?;
        commands.fill_buffer(target, 208, 0x0101_0101, WHOLE_SIZE)
    })?;

    let mut expected = Vec::with_capacity(BUFFER_SIZE as usize);
    for _ in 0..32 {
        expected.extend_from_slice(&0xDEAD_BEEFu32.to_le_bytes());
    }
    expected.extend_from_slice(&source_data[..64]);
    expected.extend_from_slice(&[0x11; 16]);
    expected.resize(BUFFER_SIZE as usize, 0x01);

    let mut contents = vec![0u8; BUFFER_SIZE as usize];
    system.read_buffer(target, 0, &mut contents)?;
    ctx.compare(&expected, &contents)?;

    system.destroy_buffer(target)?;
    system.destroy_buffer(source)?;
    Ok(TestResult::Passed)
}
