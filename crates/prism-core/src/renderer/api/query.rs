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

//! Query heaps, fences and resource heaps.

use super::{PipelineLayoutId, ResourceBinding};
use std::borrow::Cow;

/// The kind of query stored in a query heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QueryType {
    /// Number of samples that passed the depth test.
    #[default]
    SamplesPassed,
    /// Whether any sample passed the depth test.
    AnySamplesPassed,
    /// Number of primitives written by stream output.
    StreamOutPrimitivesWritten,
    /// GPU timestamp in nanoseconds.
    TimeElapsed,
    /// Pipeline statistics (vertices, primitives, invocations).
    PipelineStatistics,
}

/// Describes a query heap.
#[derive(Debug, Clone, Default)]
pub struct QueryHeapDescriptor<'a> {
    /// Optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Kind of queries.
    pub ty: QueryType,
    /// Number of queries in the heap.
    pub num_queries: u32,
    /// Queries are used for conditional rendering.
    pub render_condition: bool,
}

/// Pipeline statistics returned by `PipelineStatistics` queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryPipelineStatistics {
    /// Input-assembled vertices.
    pub input_assembly_vertices: u64,
    /// Input-assembled primitives.
    pub input_assembly_primitives: u64,
    /// Vertex shader invocations.
    pub vertex_shader_invocations: u64,
    /// Compute shader invocations.
    pub compute_shader_invocations: u64,
}

/// Describes a resource heap: a table of resources bound at once.
#[derive(Debug, Clone, Default)]
pub struct ResourceHeapDescriptor<'a> {
    /// Optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Layout the heap is compatible with.
    pub pipeline_layout: Option<PipelineLayoutId>,
    /// Resources in layout binding order, repeated once per descriptor set.
    pub resources: Vec<ResourceBinding>,
}

impl ResourceHeapDescriptor<'_> {
    /// Number of descriptor sets given `bindings_per_set` layout bindings.
    pub fn num_descriptor_sets(&self, bindings_per_set: usize) -> usize {
        if bindings_per_set == 0 {
            0
        } else {
            self.resources.len() / bindings_per_set
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::api::BufferId;

    #[test]
    fn test_descriptor_set_count() {
        let heap = ResourceHeapDescriptor {
            resources: vec![ResourceBinding::Buffer(BufferId(1)); 6],
            ..Default::default()
        };
        assert_eq!(heap.num_descriptor_sets(2), 3);
        assert_eq!(heap.num_descriptor_sets(0), 0);
    }
}
