use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{Ident, ItemFn, LitStr, ReturnType, parse_macro_input, spanned::Spanned};

/// Capability a registered constructor provides.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Initable,
    Service,
}

/// Implementation of `#[register_initable("key")]` / `#[register_service("key")]`.
///
/// Leaves the decorated `fn` unchanged and appends a
/// `#[::keystone_core::linkme::distributed_slice]` static that wires it into
/// `COMPONENT_REGISTRY`.
pub fn register_component(attr: TokenStream, item: TokenStream, capability: Capability) -> TokenStream {
    let key = parse_macro_input!(attr as LitStr);
    let func = parse_macro_input!(item as ItemFn);

    if let Err(err) = check_signature(&func) {
        return err.into_compile_error().into();
    }
    if key.value().is_empty() {
        return syn::Error::new(key.span(), "component key must not be empty")
            .into_compile_error()
            .into();
    }

    let fn_name = &func.sig.ident;
    let fn_name_upper = fn_name.to_string().to_uppercase();
    let static_name = Ident::new(
        &format!("_COMPONENT_REGISTER_{fn_name_upper}"),
        Span::call_site(),
    );

    let service = match capability {
        Capability::Service => quote! {
            ::std::option::Option::Some(
                || -> ::std::sync::Arc<dyn ::keystone_core::Service> {
                    ::std::sync::Arc::new(#fn_name())
                }
            )
        },
        Capability::Initable => quote!(::std::option::Option::None),
    };

    quote! {
        #func

        #[::keystone_core::linkme::distributed_slice(::keystone_core::COMPONENT_REGISTRY)]
        #[linkme(crate = ::keystone_core::linkme)]
        static #static_name: ::keystone_core::ComponentEntry = ::keystone_core::ComponentEntry {
            key: #key,
            initable: || -> ::std::sync::Arc<dyn ::keystone_core::Initable> {
                ::std::sync::Arc::new(#fn_name())
            },
            service: #service,
        };
    }
    .into()
}

fn check_signature(func: &ItemFn) -> syn::Result<()> {
    let sig = &func.sig;
    if let Some(asyncness) = sig.asyncness {
        return Err(syn::Error::new(
            asyncness.span(),
            "component constructors must not be async",
        ));
    }
    if !sig.inputs.is_empty() {
        return Err(syn::Error::new(
            sig.inputs.span(),
            "component constructors take no arguments",
        ));
    }
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new(
            sig.generics.span(),
            "component constructors must not be generic",
        ));
    }
    if matches!(sig.output, ReturnType::Default) {
        return Err(syn::Error::new(
            sig.ident.span(),
            "component constructors must return the component",
        ));
    }
    Ok(())
}
