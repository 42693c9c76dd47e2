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

//! Controller and method descriptors.

use super::{Arguments, RequestContext, normalize_controller, normalize_member};
use crate::RpcError;
use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// The future a method returns: the serialized result, or an error.
pub type MethodFuture = BoxFuture<'static, Result<Vec<u8>, RpcError>>;

type Handler = Arc<dyn Fn(RequestContext, Arguments) -> MethodFuture + Send + Sync>;

/// Errors building a [`ControllerRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Two controllers normalize to the same name.
    #[error("controller '{0}' is registered more than once")]
    DuplicateController(String),

    /// Two methods of one controller normalize to the same name.
    #[error("method '{method}' is declared more than once on controller '{controller}'")]
    DuplicateMethod {
        /// Controller name.
        controller: String,
        /// Method name.
        method: String,
    },

    /// A controller or method has an empty name.
    #[error("controller and method names must not be empty")]
    EmptyName,
}

/// One callable method.
#[derive(Clone)]
pub struct MethodDescriptor {
    name: String,
    allow_anonymous: bool,
    handler: Handler,
}

impl MethodDescriptor {
    /// Describes a method.
    ///
    /// `handler` receives the request context and the request's arguments and
    /// returns the serialized result.
    pub fn new<F>(name: impl Into<String>, allow_anonymous: bool, handler: F) -> Self
    where
        F: Fn(RequestContext, Arguments) -> MethodFuture + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            allow_anonymous,
            handler: Arc::new(handler),
        }
    }

    /// Declared name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if unauthorized connections may call the method.
    pub fn allow_anonymous(&self) -> bool {
        self.allow_anonymous
    }

    pub(crate) fn invoke(&self, context: RequestContext, arguments: Arguments) -> MethodFuture {
        (self.handler)(context, arguments)
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("allow_anonymous", &self.allow_anonymous)
            .finish_non_exhaustive()
    }
}

/// A named group of methods.
#[derive(Debug, Clone)]
pub struct ControllerDescriptor {
    name: String,
    allow_anonymous: bool,
    methods: Vec<MethodDescriptor>,
}

impl ControllerDescriptor {
    /// Describes a controller whose methods require authorization unless they
    /// opt out individually.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            allow_anonymous: false,
            methods: Vec::new(),
        }
    }

    /// Lets unauthorized connections call every method of the controller.
    #[must_use]
    pub fn allow_anonymous(mut self, allow: bool) -> Self {
        self.allow_anonymous = allow;
        self
    }

    /// Adds a method.
    #[must_use]
    pub fn method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    /// Declared name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared methods.
    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }
}

struct RegisteredController {
    name: String,
    allow_anonymous: bool,
    methods: HashMap<String, MethodDescriptor>,
}

/// A method found by [`ControllerRegistry::resolve`].
#[derive(Debug, Clone, Copy)]
pub struct ResolvedMethod<'a> {
    controller: &'a str,
    method: &'a MethodDescriptor,
    allow_anonymous: bool,
}

impl<'a> ResolvedMethod<'a> {
    /// Declared controller name.
    pub fn controller(&self) -> &'a str {
        self.controller
    }

    /// The method.
    pub fn method(&self) -> &'a MethodDescriptor {
        self.method
    }

    /// True if the method or its controller allows anonymous calls.
    pub fn allow_anonymous(&self) -> bool {
        self.allow_anonymous
    }
}

/// Immutable set of controllers served by a connection.
pub struct ControllerRegistry {
    controllers: HashMap<String, RegisteredController>,
}

impl ControllerRegistry {
    /// Starts building a registry.
    pub fn builder() -> ControllerRegistryBuilder {
        ControllerRegistryBuilder::default()
    }

    /// A registry with no controllers. Every inbound call gets `ActionNotFound`.
    pub fn empty() -> Self {
        Self {
            controllers: HashMap::new(),
        }
    }

    /// Looks up a method.
    pub fn resolve(&self, controller: &str, method: &str) -> Option<ResolvedMethod<'_>> {
        let registered = self.controllers.get(&normalize_controller(controller))?;
        let method = registered.methods.get(&normalize_member(method))?;
        Some(ResolvedMethod {
            controller: &registered.name,
            method,
            allow_anonymous: registered.allow_anonymous || method.allow_anonymous,
        })
    }

    /// Returns true if a controller with this name is registered.
    pub fn contains(&self, controller: &str) -> bool {
        self.controllers
            .contains_key(&normalize_controller(controller))
    }

    /// Declared names of all controllers.
    pub fn controller_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self
            .controllers
            .values()
            .map(|controller| controller.name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    /// Number of controllers.
    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    /// Returns true if no controller is registered.
    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}

impl Default for ControllerRegistry {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for ControllerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerRegistry")
            .field("controllers", &self.controller_names())
            .finish()
    }
}

/// Collects controllers for a [`ControllerRegistry`].
#[derive(Debug, Default)]
pub struct ControllerRegistryBuilder {
    controllers: Vec<ControllerDescriptor>,
}

impl ControllerRegistryBuilder {
    /// Adds a controller.
    #[must_use]
    pub fn controller(mut self, controller: ControllerDescriptor) -> Self {
        self.controllers.push(controller);
        self
    }

    /// Builds the registry.
    ///
    /// # Errors
    ///
    /// Fails on empty names and on controllers or methods whose names collide
    /// after normalization.
    pub fn build(self) -> Result<ControllerRegistry, RegistryError> {
        let mut controllers = HashMap::with_capacity(self.controllers.len());
        for descriptor in self.controllers {
            if descriptor.name.is_empty() {
                return Err(RegistryError::EmptyName);
            }
            let key = normalize_controller(&descriptor.name);
            if controllers.contains_key(&key) {
                return Err(RegistryError::DuplicateController(descriptor.name));
            }

            let mut methods = HashMap::with_capacity(descriptor.methods.len());
            for method in descriptor.methods {
                let method_key = normalize_member(&method.name);
                if method_key.is_empty() {
                    return Err(RegistryError::EmptyName);
                }
                if methods.contains_key(&method_key) {
                    return Err(RegistryError::DuplicateMethod {
                        controller: descriptor.name,
                        method: method.name,
                    });
                }
                methods.insert(method_key, method);
            }

            controllers.insert(
                key,
                RegisteredController {
                    name: descriptor.name,
                    allow_anonymous: descriptor.allow_anonymous,
                    methods,
                },
            );
        }
        Ok(ControllerRegistry { controllers })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(name: &str, allow_anonymous: bool) -> MethodDescriptor {
        MethodDescriptor::new(name, allow_anonymous, |_, _| {
            Box::pin(async { Ok(Vec::new()) })
        })
    }

    #[test]
    fn test_resolve_normalizes_names() {
        let registry = ControllerRegistry::builder()
            .controller(ControllerDescriptor::new("ProfileController").method(noop("GetProfile", false)))
            .build()
            .unwrap();

        for (controller, method) in [
            ("Profile", "GetProfile"),
            ("profile", "get_profile"),
            ("PROFILECONTROLLER", "getprofile"),
        ] {
            let resolved = registry.resolve(controller, method).unwrap();
            assert_eq!(resolved.controller(), "ProfileController");
            assert_eq!(resolved.method().name(), "GetProfile");
        }
        assert!(registry.resolve("Profiles", "GetProfile").is_none());
        assert!(registry.contains("profile"));
    }

    #[test]
    fn test_anonymous_policy() {
        let registry = ControllerRegistry::builder()
            .controller(
                ControllerDescriptor::new("Auth")
                    .allow_anonymous(true)
                    .method(noop("Authorize", false)),
            )
            .controller(
                ControllerDescriptor::new("Profile")
                    .method(noop("Get", false))
                    .method(noop("Public", true)),
            )
            .build()
            .unwrap();

        assert!(registry.resolve("Auth", "Authorize").unwrap().allow_anonymous());
        assert!(!registry.resolve("Profile", "Get").unwrap().allow_anonymous());
        assert!(registry.resolve("Profile", "Public").unwrap().allow_anonymous());
    }

    #[test]
    fn test_duplicate_controller() {
        let err = ControllerRegistry::builder()
            .controller(ControllerDescriptor::new("Auth"))
            .controller(ControllerDescriptor::new("AuthController"))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateController("AuthController".to_string())
        );
    }

    #[test]
    fn test_duplicate_method() {
        let err = ControllerRegistry::builder()
            .controller(
                ControllerDescriptor::new("Profile")
                    .method(noop("get_profile", false))
                    .method(noop("GetProfile", false)),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateMethod { .. }));
    }

    #[test]
    fn test_empty_names() {
        assert_eq!(
            ControllerRegistry::builder()
                .controller(ControllerDescriptor::new(""))
                .build()
                .unwrap_err(),
            RegistryError::EmptyName
        );
        assert!(ControllerRegistry::empty().is_empty());
    }
}
