use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{Field, Ident, Type};

use crate::utils::*;

/// Shape of a field as far as sequential forwarding is concerned.
pub enum FieldKind<'a> {
    Layer(&'a Type),
    Optional(Box<FieldKind<'a>>),
    Repeated(Box<FieldKind<'a>>),
}

impl<'a> FieldKind<'a> {
    fn from_ty(ty: &'a Type) -> syn::Result<Self> {
        let path = match ty {
            Type::Path(path) => &path.path,
            other => {
                return Err(syn::Error::new_spanned(
                    other,
                    "sequential fields must be plain layer types, `Option<_>` or `Vec<_>`",
                ))
            }
        };

        let kind = match path.segments.last().map(|segment| &segment.ident) {
            Some(ident) if ident == "Option" => {
                Self::Optional(Box::new(Self::from_ty(extract_inner_type(path)?)?))
            }
            Some(ident) if ident == "Vec" => {
                Self::Repeated(Box::new(Self::from_ty(extract_inner_type(path)?)?))
            }
            _ => Self::Layer(ty),
        };
        Ok(kind)
    }

    /// Code that consumes the tensor `x` with the field value bound to `layer`
    /// and evaluates to the output tensor.
    fn forward_code(&self) -> TokenStream {
        match self {
            Self::Layer(_) => quote! { layer.forward(x) },
            Self::Optional(inner) => {
                let inner = inner.forward_code();
                quote! {
                    match layer {
                        Some(layer) => { #inner }
                        None => x,
                    }
                }
            }
            Self::Repeated(inner) => {
                let inner = inner.forward_code();
                quote! {
                    layer.iter().fold(x, |x, layer| { #inner })
                }
            }
        }
    }

    fn config_type(&self) -> syn::Result<TokenStream> {
        Ok(match self {
            Self::Layer(ty) => {
                let name = ty_name(ty)?;
                let config = format_ident!("{name}Config");
                quote! { #config }
            }
            Self::Optional(inner) => {
                let inner = inner.config_type()?;
                // burn's Config only treats the bare `Option` path as optional
                quote! { Option<#inner> }
            }
            Self::Repeated(inner) => {
                let inner = inner.config_type()?;
                quote! { Vec<#inner> }
            }
        })
    }

    /// Code that builds the field from the config bound to `config`.
    fn init_code(&self, backend: &Ident) -> TokenStream {
        match self {
            Self::Layer(_) => quote! {
                dl_utils::LayerInit::<#backend>::init_layer(config, device)
            },
            Self::Optional(inner) => {
                let inner = inner.init_code(backend);
                quote! { config.as_ref().map(|config| { #inner }) }
            }
            Self::Repeated(inner) => {
                let inner = inner.init_code(backend);
                quote! { config.iter().map(|config| { #inner }).collect() }
            }
        }
    }
}

pub struct ExtractedField<'a> {
    pub name: &'a Ident,
    pub kind: FieldKind<'a>,
}

impl<'a> ExtractedField<'a> {
    pub fn from_field(field: &'a Field) -> syn::Result<Self> {
        let name = field.ident.as_ref().ok_or_else(|| {
            syn::Error::new_spanned(field, "sequential modules need named fields")
        })?;
        let kind = FieldKind::from_ty(&field.ty)?;
        Ok(Self { name, kind })
    }

    pub fn forward_statement(&self) -> TokenStream {
        let name = self.name;
        let code = self.kind.forward_code();
        quote! {
            let x = {
                let layer = &self.#name;
                #code
            };
        }
    }

    pub fn config_field(&self) -> syn::Result<TokenStream> {
        let name = self.name;
        let ty = self.kind.config_type()?;
        Ok(quote! { pub #name: #ty })
    }

    pub fn init_field(&self, backend: &Ident) -> TokenStream {
        let name = self.name;
        let code = self.kind.init_code(backend);
        quote! {
            #name: {
                let config = &self.#name;
                #code
            }
        }
    }
}
