//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Service and method lookup.

use super::RequestHandler;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Handlers registered for one service, keyed by method name.
#[derive(Default)]
pub struct ServiceHandlers {
    methods: RwLock<HashMap<String, Arc<dyn RequestHandler>>>,
}

impl ServiceHandlers {
    /// Registers `handler` for `method`, replacing any previous one.
    pub fn insert(&self, method: impl Into<String>, handler: Arc<dyn RequestHandler>) {
        self.methods.write().insert(method.into(), handler);
    }

    /// Looks up the handler for `method`.
    #[must_use]
    pub fn get(&self, method: &str) -> Option<Arc<dyn RequestHandler>> {
        self.methods.read().get(method).cloned()
    }

    /// Registered method names, sorted.
    #[must_use]
    pub fn methods(&self) -> Vec<String> {
        let mut methods: Vec<String> = self.methods.read().keys().cloned().collect();
        methods.sort();
        methods
    }
}

impl std::fmt::Debug for ServiceHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceHandlers")
            .field("methods", &self.methods())
            .finish()
    }
}

/// Maps service names to their handlers.
///
/// Cloning shares the registry.
///
/// # Example
///
/// ```rust
/// use tchannel::handler::{handler_fn, HandlerRegistry};
/// use tchannel::{Request, Response};
/// use std::sync::Arc;
///
/// let registry = HandlerRegistry::new();
/// registry.service("server").insert(
///     "echo",
///     Arc::new(handler_fn(|request: Request| async move {
///         Ok(Response::new(request.header().clone(), request.body().clone()))
///     })),
/// );
///
/// assert!(registry.lookup("server", "echo").is_some());
/// assert!(registry.lookup("server", "missing").is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    services: Arc<RwLock<HashMap<String, Arc<ServiceHandlers>>>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The handler table for `service`, created on first use.
    pub fn service(&self, service: &str) -> Arc<ServiceHandlers> {
        if let Some(handlers) = self.services.read().get(service) {
            return Arc::clone(handlers);
        }
        Arc::clone(
            self.services
                .write()
                .entry(service.to_string())
                .or_default(),
        )
    }

    /// Looks up the handler for `service::method`.
    #[must_use]
    pub fn lookup(&self, service: &str, method: &str) -> Option<Arc<dyn RequestHandler>> {
        self.services.read().get(service)?.get(method)
    }

    /// Registered service names, sorted.
    #[must_use]
    pub fn services(&self) -> Vec<String> {
        let mut services: Vec<String> = self.services.read().keys().cloned().collect();
        services.sort();
        services
    }
}
