use itertools::Itertools;
use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_macro_input, DeriveInput};

mod extracted_field;
mod utils;

use extracted_field::*;
use utils::*;

/// Derives a sequential `forward`, a `{Name}Config` and its initializer.
///
/// * `#[dims(in, out)]` sets the tensor ranks of `forward`.
/// * `#[res]` adds the block input to its output.
/// * `#[manual_forward]` skips `forward`, only the config is generated.
///
/// Every field of type `T` (or `Option<T>`, `Vec<T>`) expects a `TConfig`
/// implementing `dl_utils::LayerInit` to be in scope.
#[proc_macro_derive(SequentialForward, attributes(res, manual_forward, dims))]
pub fn sequential_forward(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand(input: DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let DeriveInput {
        attrs,
        vis,
        ident: module_name,
        generics,
        data,
    } = input;

    let backend = generics
        .type_params()
        .next()
        .map(|param| param.ident.clone())
        .ok_or_else(|| {
            syn::Error::new_spanned(&module_name, "expected a backend type parameter")
        })?;
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let data = match data {
        syn::Data::Struct(data) => data,
        _ => {
            return Err(syn::Error::new_spanned(
                &module_name,
                "only structs are supported",
            ))
        }
    };

    let fields = data
        .fields
        .iter()
        .map(ExtractedField::from_field)
        .collect::<syn::Result<Vec<_>>>()?;

    let config_name = format_ident!("{module_name}Config");
    let config_fields = fields
        .iter()
        .map(ExtractedField::config_field)
        .collect::<syn::Result<Vec<_>>>()?;
    let init_fields = fields
        .iter()
        .map(|field| field.init_field(&backend))
        .collect_vec();

    let forward_fn = if has_attribute(&attrs, "manual_forward") {
        quote! {}
    } else {
        let (in_dim, out_dim) = parse_dims_attr(&attrs, &module_name)?;
        let statements = fields
            .iter()
            .map(ExtractedField::forward_statement)
            .collect_vec();
        let body = if has_attribute(&attrs, "res") {
            quote! {
                let skip = x.clone();
                #(#statements)*
                x + skip
            }
        } else {
            quote! {
                #(#statements)*
                x
            }
        };

        quote! {
            impl #impl_generics #module_name #ty_generics #where_clause {
                pub fn forward(
                    &self,
                    x: burn::tensor::Tensor<#backend, #in_dim>,
                ) -> burn::tensor::Tensor<#backend, #out_dim> {
                    #body
                }
            }
        }
    };

    Ok(quote! {
        #forward_fn

        #[derive(Debug, burn::config::Config)]
        #vis struct #config_name {
            #(#config_fields,)*
        }

        impl #config_name {
            pub fn init #impl_generics (&self, device: &#backend::Device) -> #module_name #ty_generics #where_clause {
                #module_name {
                    #(#init_fields,)*
                }
            }
        }

        impl #impl_generics dl_utils::LayerInit<#backend> for #config_name #where_clause {
            type Layer = #module_name #ty_generics;

            fn init_layer(&self, device: &#backend::Device) -> Self::Layer {
                self.init(device)
            }
        }
    })
}
