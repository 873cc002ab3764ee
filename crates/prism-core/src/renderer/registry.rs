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

//! Runtime registry of renderer modules.

use std::collections::BTreeMap;
use std::fmt;

use crate::renderer::api::{ModuleRequest, RenderSystemDescriptor, RendererModule};
use crate::renderer::error::RenderError;
use crate::renderer::traits::RenderSystem;

/// Creates a render system for a module request.
pub type ModuleFactory = Box<
    dyn Fn(&ModuleRequest, &RenderSystemDescriptor) -> Result<Box<dyn RenderSystem>, RenderError>
        + Send
        + Sync,
>;

/// Maps renderer modules to the factories that load them.
///
/// Infra crates register the modules they were built with; applications then
/// load a module by the name or alias found in a [`RenderSystemDescriptor`].
#[derive(Default)]
pub struct ModuleRegistry {
    factories: BTreeMap<RendererModule, ModuleFactory>,
}

impl ModuleRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the factory of `module`, replacing any previous one.
    pub fn register<F>(&mut self, module: RendererModule, factory: F)
    where
        F: Fn(&ModuleRequest, &RenderSystemDescriptor) -> Result<Box<dyn RenderSystem>, RenderError>
            + Send
            + Sync
            + 'static,
    {
        log::debug!("ModuleRegistry: registered module '{}'", module);
        self.factories.insert(module, Box::new(factory));
    }

    /// Returns `true` if `module` can be loaded.
    #[must_use]
    pub fn is_registered(&self, module: RendererModule) -> bool {
        self.factories.contains_key(&module)
    }

    /// All registered modules in a stable order.
    #[must_use]
    pub fn find_modules(&self) -> Vec<RendererModule> {
        self.factories.keys().copied().collect()
    }

    /// Loads the module named by `descriptor.module`.
    /// ## Errors
    /// * `RenderError::UnknownModule` - If the name matches no module or alias.
    /// * `RenderError::ModuleUnavailable` - If the module is not registered.
    /// * Any error returned by the module's factory.
    pub fn load(
        &self,
        descriptor: &RenderSystemDescriptor,
    ) -> Result<Box<dyn RenderSystem>, RenderError> {
        let request: ModuleRequest = descriptor.module.parse()?;
        let factory = self
            .factories
            .get(&request.module)
            .ok_or_else(|| RenderError::ModuleUnavailable(request.module.name().to_string()))?;
        log::info!("ModuleRegistry: loading module '{}'", request.module);
        let system = factory(&request, descriptor)?;
        log::info!(
            "ModuleRegistry: loaded '{}' on '{}'",
            system.renderer_info().renderer_name,
            system.renderer_info().device_name
        );
        Ok(system)
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.find_modules())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failing_factory(
        request: &ModuleRequest,
        _: &RenderSystemDescriptor,
    ) -> Result<Box<dyn RenderSystem>, RenderError> {
        Err(RenderError::InitializationFailed(format!(
            "{:?}",
            request.version
        )))
    }

    #[test]
    fn test_find_modules_is_sorted() {
        let mut registry = ModuleRegistry::new();
        registry.register(RendererModule::Vulkan, failing_factory);
        registry.register(RendererModule::Null, failing_factory);
        assert_eq!(
            registry.find_modules(),
            vec![RendererModule::Null, RendererModule::Vulkan]
        );
        assert!(!registry.is_registered(RendererModule::Metal));
    }

    #[test]
    fn test_load_resolves_aliases_and_versions() {
        let mut registry = ModuleRegistry::new();
        registry.register(RendererModule::OpenGL, failing_factory);

        let err = registry
            .load(&RenderSystemDescriptor::for_module("gl330"))
            .unwrap_err();
        assert!(matches!(err, RenderError::InitializationFailed(msg) if msg == "Some(330)"));

        let err = registry
            .load(&RenderSystemDescriptor::for_module("dx12"))
            .unwrap_err();
        assert!(matches!(err, RenderError::ModuleUnavailable(name) if name == "Direct3D12"));

        let err = registry
            .load(&RenderSystemDescriptor::for_module("glide"))
            .unwrap_err();
        assert!(matches!(err, RenderError::UnknownModule(_)));
    }
}
