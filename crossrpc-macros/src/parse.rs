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

//! Parsing logic for the `#[crossrpc::controller]` macro.
//!
//! Turns an annotated trait into a [`ControllerDef`], validating that every
//! method can be both proxied and dispatched, and strips the inert marker
//! attributes (`#[allow_anonymous]`, `#[optional]`) so the re-emitted trait
//! compiles.

use std::collections::HashSet;
use syn::ext::IdentExt;
use syn::{
    Error, Expr, ExprLit, FnArg, Ident, ItemTrait, Lit, Meta, MetaNameValue, Pat, Result,
    ReturnType, Signature, TraitItem, TraitItemFn, Type,
};

/// What to do when a request omits an argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingArguments {
    /// Answer `BadRequest`.
    #[default]
    Reject,
    /// Substitute `Default::default()`.
    Default,
}

impl MissingArguments {
    fn parse(lit: &syn::LitStr) -> Result<Self> {
        match lit.value().to_lowercase().as_str() {
            "reject" => Ok(MissingArguments::Reject),
            "default" => Ok(MissingArguments::Default),
            other => Err(Error::new_spanned(
                lit,
                format!(
                    "Invalid missing_arguments '{}'. Expected 'reject' or 'default'",
                    other
                ),
            )),
        }
    }
}

/// Parsed controller definition.
#[derive(Debug)]
pub struct ControllerDef {
    /// The trait with marker attributes removed
    pub trait_def: ItemTrait,
    /// Controller name used in actions
    pub name: String,
    /// Whether every method may be called anonymously
    pub allow_anonymous: bool,
    /// Policy for omitted arguments
    pub missing_arguments: MissingArguments,
    /// Controller methods
    pub methods: Vec<MethodDef>,
}

/// Parsed method definition.
#[derive(Debug)]
pub struct MethodDef {
    /// Signature with parameter attributes and `mut` bindings removed
    pub sig: Signature,
    /// Whether the method is async
    pub is_async: bool,
    /// Whether the method may be called anonymously
    pub allow_anonymous: bool,
    /// Parameters, excluding the receiver
    pub params: Vec<ParamDef>,
}

impl MethodDef {
    /// Method name.
    pub fn name(&self) -> &Ident {
        &self.sig.ident
    }
}

/// Parsed parameter definition.
#[derive(Debug)]
pub struct ParamDef {
    /// Binding name
    pub name: Ident,
    /// Parameter type
    pub ty: Type,
    /// Whether a missing argument falls back to `Default::default()`
    pub is_optional: bool,
}

impl ParamDef {
    /// Argument name as sent on the wire.
    pub fn wire_name(&self) -> String {
        self.name.unraw().to_string()
    }
}

/// Parses the macro arguments and the annotated trait.
pub fn parse_controller(mut trait_def: ItemTrait, attr_args: &[Meta]) -> Result<ControllerDef> {
    let mut name = None;
    let mut allow_anonymous = false;
    let mut missing_arguments = MissingArguments::default();

    for meta in attr_args {
        match meta {
            Meta::NameValue(MetaNameValue {
                path,
                value: Expr::Lit(ExprLit { lit, .. }),
                ..
            }) if path.is_ident("name") => match lit {
                Lit::Str(lit_str) if !lit_str.value().is_empty() => name = Some(lit_str.value()),
                _ => {
                    return Err(Error::new_spanned(
                        lit,
                        "name attribute must be a non-empty string literal",
                    ));
                }
            },
            Meta::Path(path) if path.is_ident("allow_anonymous") => allow_anonymous = true,
            Meta::NameValue(MetaNameValue {
                path,
                value: Expr::Lit(ExprLit { lit, .. }),
                ..
            }) if path.is_ident("allow_anonymous") => match lit {
                Lit::Bool(lit_bool) => allow_anonymous = lit_bool.value,
                _ => {
                    return Err(Error::new_spanned(
                        lit,
                        "allow_anonymous attribute must be a boolean literal",
                    ));
                }
            },
            Meta::NameValue(MetaNameValue {
                path,
                value: Expr::Lit(ExprLit { lit, .. }),
                ..
            }) if path.is_ident("missing_arguments") => match lit {
                Lit::Str(lit_str) => missing_arguments = MissingArguments::parse(lit_str)?,
                _ => {
                    return Err(Error::new_spanned(
                        lit,
                        "missing_arguments attribute must be a string literal",
                    ));
                }
            },
            _ => {
                return Err(Error::new_spanned(
                    meta,
                    "Unknown attribute. Supported: name, allow_anonymous, missing_arguments",
                ));
            }
        }
    }

    if !trait_def.generics.params.is_empty() || trait_def.generics.where_clause.is_some() {
        return Err(Error::new_spanned(
            &trait_def.generics,
            "Controller traits cannot be generic",
        ));
    }

    let mut methods = Vec::new();
    for item in &mut trait_def.items {
        match item {
            TraitItem::Fn(method) => methods.push(parse_method(method)?),
            other => {
                return Err(Error::new_spanned(
                    other,
                    "Controller traits may only contain methods",
                ));
            }
        }
    }

    if methods.is_empty() {
        return Err(Error::new_spanned(
            &trait_def.ident,
            "Controller trait must have at least one method",
        ));
    }

    let name = name.unwrap_or_else(|| trait_def.ident.unraw().to_string());

    Ok(ControllerDef {
        trait_def,
        name,
        allow_anonymous,
        missing_arguments,
        methods,
    })
}

/// Parses one trait method, removing its marker attributes in place.
fn parse_method(method: &mut TraitItemFn) -> Result<MethodDef> {
    let mut allow_anonymous = false;
    let mut marker_error = None;
    method.attrs.retain(|attr| {
        if !attr.path().is_ident("allow_anonymous") {
            return true;
        }
        if let Err(err) = attr.meta.require_path_only() {
            marker_error.get_or_insert(err);
        }
        allow_anonymous = true;
        false
    });
    if let Some(err) = marker_error {
        return Err(err);
    }

    let sig = &mut method.sig;
    if !sig.generics.params.is_empty() || sig.generics.where_clause.is_some() {
        return Err(Error::new_spanned(
            &sig.generics,
            "Controller methods cannot be generic",
        ));
    }
    if sig.variadic.is_some() || sig.unsafety.is_some() {
        return Err(Error::new_spanned(
            &*sig,
            "Controller methods must be safe and non-variadic",
        ));
    }

    match sig.inputs.first() {
        Some(FnArg::Receiver(receiver))
            if receiver.reference.is_some() && receiver.mutability.is_none() => {}
        _ => {
            return Err(Error::new_spanned(
                &*sig,
                "Controller methods must take &self",
            ));
        }
    }

    check_return_type(&sig.output)?;

    let mut params = Vec::new();
    let mut seen = HashSet::new();
    for arg in sig.inputs.iter_mut().skip(1) {
        let FnArg::Typed(pat_type) = arg else {
            continue;
        };

        let mut is_optional = false;
        pat_type.attrs.retain(|attr| {
            let optional = attr.path().is_ident("optional");
            is_optional |= optional;
            !optional
        });

        let Pat::Ident(pat_ident) = &*pat_type.pat else {
            return Err(Error::new_spanned(
                &pat_type.pat,
                "Only simple parameter names are supported",
            ));
        };
        if pat_ident.by_ref.is_some() || pat_ident.subpat.is_some() {
            return Err(Error::new_spanned(
                &pat_type.pat,
                "Only simple parameter names are supported",
            ));
        }
        if matches!(&*pat_type.ty, Type::Reference(_) | Type::ImplTrait(_)) {
            return Err(Error::new_spanned(
                &pat_type.ty,
                "Controller parameters must be owned, deserializable types",
            ));
        }

        let param = ParamDef {
            name: pat_ident.ident.clone(),
            ty: (*pat_type.ty).clone(),
            is_optional,
        };
        if !seen.insert(normalize(&param.wire_name())) {
            return Err(Error::new_spanned(
                &pat_ident.ident,
                "Parameter names must stay distinct ignoring case and underscores",
            ));
        }
        params.push(param);
    }

    // Generated bodies only forward their parameters.
    let mut forwarded = sig.clone();
    for arg in forwarded.inputs.iter_mut() {
        if let FnArg::Typed(pat_type) = arg {
            if let Pat::Ident(pat_ident) = &mut *pat_type.pat {
                pat_ident.mutability = None;
            }
        }
    }

    Ok(MethodDef {
        is_async: sig.asyncness.is_some(),
        sig: forwarded,
        allow_anonymous,
        params,
    })
}

/// Controller methods report failures through `Result<T, RpcError>`.
fn check_return_type(output: &ReturnType) -> Result<()> {
    let is_result = match output {
        ReturnType::Type(_, ty) => match &**ty {
            Type::Path(type_path) => type_path
                .path
                .segments
                .last()
                .is_some_and(|segment| segment.ident == "Result"),
            _ => false,
        },
        ReturnType::Default => false,
    };
    if is_result {
        Ok(())
    } else {
        Err(Error::new_spanned(
            output,
            "Controller methods must return Result<T, RpcError>",
        ))
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    fn parse(trait_def: ItemTrait, args: Vec<Meta>) -> Result<ControllerDef> {
        parse_controller(trait_def, &args)
    }

    #[test]
    fn test_defaults() {
        let def = parse(
            parse_quote! {
                trait HomeController {
                    async fn index(&self) -> Result<String, RpcError>;
                }
            },
            Vec::new(),
        )
        .unwrap();
        assert_eq!(def.name, "HomeController");
        assert!(!def.allow_anonymous);
        assert_eq!(def.missing_arguments, MissingArguments::Reject);
        assert_eq!(def.methods.len(), 1);
        assert!(def.methods[0].is_async);
    }

    #[test]
    fn test_attributes() {
        let def = parse(
            parse_quote! {
                trait Auth {
                    #[allow_anonymous]
                    fn authorize(&self, login: String, #[optional] remember: bool) -> Result<u64, RpcError>;
                    async fn logout(&self) -> Result<(), RpcError>;
                }
            },
            vec![
                parse_quote!(name = "Authentication"),
                parse_quote!(missing_arguments = "default"),
            ],
        )
        .unwrap();
        assert_eq!(def.name, "Authentication");
        assert_eq!(def.missing_arguments, MissingArguments::Default);

        let authorize = &def.methods[0];
        assert!(authorize.allow_anonymous);
        assert!(!authorize.is_async);
        assert!(!authorize.params[0].is_optional);
        assert!(authorize.params[1].is_optional);
        assert!(!def.methods[1].allow_anonymous);

        // Marker attributes are gone from the re-emitted trait.
        let TraitItem::Fn(method) = &def.trait_def.items[0] else {
            panic!("expected a method");
        };
        assert!(method.attrs.is_empty());
        let FnArg::Typed(remember) = &method.sig.inputs[2] else {
            panic!("expected a typed argument");
        };
        assert!(remember.attrs.is_empty());
    }

    #[test]
    fn test_allow_anonymous_forms() {
        let def = |arg: Meta| {
            parse(
                parse_quote! {
                    trait Ping { fn ping(&self) -> Result<(), RpcError>; }
                },
                vec![arg],
            )
            .unwrap()
            .allow_anonymous
        };
        assert!(def(parse_quote!(allow_anonymous)));
        assert!(def(parse_quote!(allow_anonymous = true)));
        assert!(!def(parse_quote!(allow_anonymous = false)));
    }

    #[test]
    fn test_rejects_invalid_traits() {
        let cases: Vec<(ItemTrait, Vec<Meta>)> = vec![
            (
                parse_quote! { trait Empty {} },
                Vec::new(),
            ),
            (
                parse_quote! { trait Generic<T> { fn get(&self) -> Result<T, RpcError>; } },
                Vec::new(),
            ),
            (
                parse_quote! { trait Consts { const X: u8; fn get(&self) -> Result<u8, RpcError>; } },
                Vec::new(),
            ),
            (
                parse_quote! { trait Owned { fn get(self) -> Result<u8, RpcError>; } },
                Vec::new(),
            ),
            (
                parse_quote! { trait Mutable { fn get(&mut self) -> Result<u8, RpcError>; } },
                Vec::new(),
            ),
            (
                parse_quote! { trait Unit { fn get(&self); } },
                Vec::new(),
            ),
            (
                parse_quote! { trait Plain { fn get(&self) -> u8; } },
                Vec::new(),
            ),
            (
                parse_quote! { trait Borrowed { fn get(&self, name: &str) -> Result<u8, RpcError>; } },
                Vec::new(),
            ),
            (
                parse_quote! { trait Clash { fn get(&self, user_id: u8, userid: u8) -> Result<u8, RpcError>; } },
                Vec::new(),
            ),
            (
                parse_quote! { trait Ping { fn ping(&self) -> Result<(), RpcError>; } },
                vec![parse_quote!(direction = "call")],
            ),
            (
                parse_quote! { trait Ping { fn ping(&self) -> Result<(), RpcError>; } },
                vec![parse_quote!(missing_arguments = "ignore")],
            ),
            (
                parse_quote! { trait Ping { fn ping(&self) -> Result<(), RpcError>; } },
                vec![parse_quote!(name = "")],
            ),
        ];
        for (trait_def, args) in cases {
            let ident = trait_def.ident.to_string();
            assert!(parse(trait_def, args).is_err(), "{} should be rejected", ident);
        }
    }

    #[test]
    fn test_wire_name_strips_raw_prefix() {
        let def = parse(
            parse_quote! {
                trait Keywords { fn get(&self, r#type: String) -> Result<u8, RpcError>; }
            },
            Vec::new(),
        )
        .unwrap();
        assert_eq!(def.methods[0].params[0].wire_name(), "type");
    }
}
