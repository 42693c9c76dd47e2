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

//! Code generation for the `#[crossrpc::controller]` macro.
//!
//! This module generates:
//! - the controller trait itself, made object-safe with `async_trait`
//! - `{Trait}Proxy`, which implements the trait by calling a remote peer
//! - `{Trait}Dispatcher`, which builds the trait's `ControllerDescriptor`

use crate::parse::{ControllerDef, MethodDef, MissingArguments};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::ext::IdentExt;

/// Action string sent for `method` on `controller`.
fn action_name(controller: &str, method: &str) -> String {
    format!("{}/{}", controller, method)
}

/// Re-emits the trait with async methods boxed.
pub fn generate_trait(controller: &ControllerDef) -> TokenStream {
    let trait_def = &controller.trait_def;
    quote! {
        #[::crossrpc::async_trait]
        #trait_def
    }
}

/// Generates the proxy struct and its trait implementation.
pub fn generate_proxy(controller: &ControllerDef) -> TokenStream {
    let trait_name = &controller.trait_def.ident;
    let vis = &controller.trait_def.vis;
    let proxy_name = format_ident!("{}Proxy", trait_name.unraw());
    let name = &controller.name;
    let doc = format!(
        "Calls [`{}`] on a remote peer through an [`Invoker`](::crossrpc::bridge::Invoker).",
        trait_name.unraw()
    );

    let methods: Vec<_> = controller
        .methods
        .iter()
        .map(|method| generate_proxy_method(method, name))
        .collect();

    quote! {
        #[doc = #doc]
        #[derive(Debug, Clone)]
        #vis struct #proxy_name<I = ::crossrpc::Connection> {
            invoker: I,
        }

        impl<I> #proxy_name<I> {
            /// Controller name used in actions.
            pub const NAME: &'static str = #name;

            /// Wraps an invoker, usually a `Connection` or a `Client`.
            pub fn new(invoker: I) -> Self {
                Self { invoker }
            }

            /// Returns the wrapped invoker.
            pub fn invoker(&self) -> &I {
                &self.invoker
            }

            /// Unwraps the invoker.
            pub fn into_invoker(self) -> I {
                self.invoker
            }
        }

        #[::crossrpc::async_trait]
        impl<I> #trait_name for #proxy_name<I>
        where
            I: ::crossrpc::bridge::Invoker,
        {
            #(#methods)*
        }
    }
}

fn generate_proxy_method(method: &MethodDef, controller: &str) -> TokenStream {
    let sig = &method.sig;
    let action = action_name(controller, &method.name().unraw().to_string());
    let mutability = if method.params.is_empty() {
        quote! {}
    } else {
        quote! { mut }
    };
    let arguments: Vec<_> = method
        .params
        .iter()
        .map(|param| {
            let name = &param.name;
            let wire_name = param.wire_name();
            quote! { __call.argument(#wire_name, &#name)?; }
        })
        .collect();
    let send = if method.is_async {
        quote! { ::crossrpc::bridge::invoke(&self.invoker, __call).await }
    } else {
        quote! { ::crossrpc::bridge::invoke_blocking(&self.invoker, __call) }
    };

    quote! {
        #sig {
            let #mutability __call = ::crossrpc::bridge::Call::new(
                ::crossrpc::bridge::Invoker::format(&self.invoker),
                #action,
            );
            #(#arguments)*
            #send
        }
    }
}

/// Generates the dispatcher that registers implementations of the trait.
pub fn generate_dispatcher(controller: &ControllerDef) -> TokenStream {
    let trait_name = &controller.trait_def.ident;
    let vis = &controller.trait_def.vis;
    let dispatcher_name = format_ident!("{}Dispatcher", trait_name.unraw());
    let name = &controller.name;
    let allow_anonymous = controller.allow_anonymous;
    let doc = format!(
        "Builds the [`ControllerDescriptor`](::crossrpc::dispatch::ControllerDescriptor) for [`{}`] implementations.",
        trait_name.unraw()
    );

    let methods: Vec<_> = controller
        .methods
        .iter()
        .map(|method| generate_dispatch_method(method, controller))
        .collect();

    quote! {
        #[doc = #doc]
        #[derive(Debug, Clone, Copy, Default)]
        #vis struct #dispatcher_name;

        impl #dispatcher_name {
            /// Controller name used in actions.
            pub const NAME: &'static str = #name;

            /// Describes the controller.
            ///
            /// `factory` is called once per request; the instance it returns
            /// is dropped when the call completes.
            pub fn descriptor<C, F>(factory: F) -> ::crossrpc::dispatch::ControllerDescriptor
            where
                C: #trait_name + ::std::marker::Send + ::std::marker::Sync + 'static,
                F: ::std::ops::Fn(&::crossrpc::RequestContext) -> C
                    + ::std::marker::Send
                    + ::std::marker::Sync
                    + 'static,
            {
                let factory = ::std::sync::Arc::new(factory);
                ::crossrpc::dispatch::ControllerDescriptor::new(Self::NAME)
                    .allow_anonymous(#allow_anonymous)
                    #(.method(#methods))*
            }
        }
    }
}

fn generate_dispatch_method(method: &MethodDef, controller: &ControllerDef) -> TokenStream {
    let trait_name = &controller.trait_def.ident;
    let method_name = method.name();
    let wire_name = method_name.unraw().to_string();
    let allow_anonymous = method.allow_anonymous;

    let mutability = if method.params.is_empty() {
        quote! {}
    } else {
        quote! { mut }
    };
    let bindings: Vec<_> = method
        .params
        .iter()
        .map(|param| {
            let name = &param.name;
            let ty = &param.ty;
            let wire_name = param.wire_name();
            let lenient =
                param.is_optional || controller.missing_arguments == MissingArguments::Default;
            if lenient {
                quote! { let #name: #ty = __arguments.take_or_default(#wire_name)?; }
            } else {
                quote! { let #name: #ty = __arguments.take(#wire_name)?; }
            }
        })
        .collect();
    let names: Vec<_> = method.params.iter().map(|param| &param.name).collect();
    let call = if method.is_async {
        quote! { <C as #trait_name>::#method_name(&__controller, #(#names),*).await? }
    } else {
        quote! { <C as #trait_name>::#method_name(&__controller, #(#names),*)? }
    };

    quote! {
        {
            let factory = ::std::sync::Arc::clone(&factory);
            ::crossrpc::dispatch::MethodDescriptor::new(
                #wire_name,
                #allow_anonymous,
                move |__context, #mutability __arguments| {
                    let factory = ::std::sync::Arc::clone(&factory);
                    ::std::boxed::Box::pin(async move {
                        #(#bindings)*
                        let __controller = (*factory)(&__context);
                        let __result = #call;
                        __context.encode(&__result)
                    })
                },
            )
        }
    }
}
