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

//! Procedural macros for the crossrpc framework.
//!
//! This crate provides the `#[crossrpc::controller]` attribute macro, which
//! turns a trait into a controller contract usable from both ends of a
//! connection.
//!
//! # Example
//!
//! ```ignore
//! use crossrpc::{RpcError, controller};
//!
//! #[controller(name = "Auth", allow_anonymous)]
//! pub trait AuthController {
//!     async fn authorize(&self, login: String, password: String) -> Result<AuthResult, RpcError>;
//!
//!     fn server_time(&self) -> Result<u64, RpcError>;
//! }
//! ```
//!
//! This will generate:
//! - The `AuthController` trait, with its async methods boxed by `async_trait`
//! - An `AuthControllerProxy<I>` implementing the trait by calling the peer
//! - An `AuthControllerDispatcher` building the controller's dispatch table

use proc_macro::TokenStream;
use quote::quote;
use syn::{ItemTrait, Meta, Token, parse_macro_input, punctuated::Punctuated};

mod generate;
mod parse;

/// Declares a controller contract.
///
/// # Attributes
///
/// - `name = "..."`: controller name used in actions. Defaults to the trait
///   name; a trailing `Controller` is ignored when matching either way.
/// - `allow_anonymous`: every method may be called before the connection is
///   authorized.
/// - `missing_arguments = "reject" | "default"`: whether a request that omits
///   an argument is answered `BadRequest` (the default) or the parameter is
///   filled with `Default::default()`.
///
///   `"default"` fills gaps silently, so a caller that misspells a parameter
///   name gets a zero value instead of an error. It also requires every
///   parameter type to implement `Default`. Rejecting is therefore the default;
///   controllers that need lenient binding for older callers opt in, either
///   for the whole controller or per parameter with `#[optional]`.
///
/// # Method Signatures
///
/// Methods take `&self` and return `Result<T, RpcError>`. They may be
/// `async fn` or plain `fn`; a plain method's proxy blocks the calling thread
/// until the response arrives. Parameters and results must be serde types.
///
/// - `#[allow_anonymous]` on a method lets it be called before authorization.
/// - `#[optional]` on a parameter fills it with `Default::default()` when the
///   request omits it.
///
/// # Example
///
/// ```ignore
/// #[crossrpc::controller(missing_arguments = "default")]
/// trait Profile {
///     #[allow_anonymous]
///     async fn get_name(&self, user_id: i64) -> Result<String, RpcError>;
///
///     async fn rename(&self, name: String, #[optional] notify: bool) -> Result<(), RpcError>;
/// }
/// ```
#[proc_macro_attribute]
pub fn controller(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemTrait);

    // Parse attribute arguments
    let attr_args = if attr.is_empty() {
        Vec::new()
    } else {
        match syn::parse::Parser::parse(Punctuated::<Meta, Token![,]>::parse_terminated, attr) {
            Ok(args) => args.into_iter().collect(),
            Err(err) => return err.to_compile_error().into(),
        }
    };

    let controller = match parse::parse_controller(input, &attr_args) {
        Ok(controller) => controller,
        Err(err) => return err.to_compile_error().into(),
    };

    let controller_trait = generate::generate_trait(&controller);
    let proxy = generate::generate_proxy(&controller);
    let dispatcher = generate::generate_dispatcher(&controller);

    let expanded = quote! {
        #controller_trait

        #proxy

        #dispatcher
    };

    TokenStream::from(expanded)
}
