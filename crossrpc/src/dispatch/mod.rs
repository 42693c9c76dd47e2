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

//! Inbound call dispatch.
//!
//! Controllers are registered once, up front, in a [`ControllerRegistry`].
//! Each controller is described by a [`ControllerDescriptor`]: a name, an
//! authorization policy and a table of [`MethodDescriptor`]s. The
//! `#[controller]` attribute generates descriptors from a trait; they can also
//! be written by hand.
//!
//! For every inbound request the [`Dispatcher`] resolves the action, checks
//! authorization, hands the method a fresh [`RequestContext`] and the request's
//! [`Arguments`], and turns the outcome into a response.
//!
//! # Name matching
//!
//! Controller names are compared case-insensitively with a trailing
//! `Controller` suffix ignored, so `AuthController`, `auth` and `Auth` are
//! the same controller. Method and parameter names are compared
//! case-insensitively with underscores ignored, so `GetProfile` matches
//! `get_profile`.
//!
//! # Examples
//!
//! ```rust
//! use crossrpc::dispatch::{ControllerDescriptor, ControllerRegistry, MethodDescriptor};
//!
//! let home = ControllerDescriptor::new("HomeController").method(MethodDescriptor::new(
//!     "echo",
//!     true,
//!     |context, mut arguments| {
//!         Box::pin(async move {
//!             let text: String = arguments.take("text")?;
//!             context.encode(&text)
//!         })
//!     },
//! ));
//!
//! let registry = ControllerRegistry::builder().controller(home).build().unwrap();
//! assert!(registry.resolve("home", "Echo").is_some());
//! assert!(registry.resolve("Home", "missing").is_none());
//! ```

mod arguments;
mod context;
mod dispatcher;
mod registry;

pub use self::arguments::Arguments;
pub use self::context::RequestContext;
pub use self::dispatcher::Dispatcher;
pub use self::registry::{
    ControllerDescriptor, ControllerRegistry, ControllerRegistryBuilder, MethodDescriptor,
    MethodFuture, RegistryError, ResolvedMethod,
};

/// Normalizes a method or parameter name for matching.
pub(crate) fn normalize_member(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Normalizes a controller name for matching.
pub(crate) fn normalize_controller(name: &str) -> String {
    let lowered = name.to_lowercase();
    match lowered.strip_suffix("controller") {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => lowered,
    }
}
