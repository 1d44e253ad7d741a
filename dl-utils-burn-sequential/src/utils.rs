use syn::{Attribute, Ident, Type};

/// Last path segment of a layer type: `burn::nn::Linear<B>` -> `Linear`.
pub fn ty_name(ty: &Type) -> syn::Result<&Ident> {
    match ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .map(|segment| &segment.ident)
            .ok_or_else(|| syn::Error::new_spanned(ty, "empty type path")),
        other => Err(syn::Error::new_spanned(other, "expected a type path")),
    }
}

pub fn extract_inner_type(path: &syn::Path) -> syn::Result<&Type> {
    let segment = path
        .segments
        .last()
        .ok_or_else(|| syn::Error::new_spanned(path, "empty type path"))?;
    match &segment.arguments {
        syn::PathArguments::AngleBracketed(args) => match args.args.first() {
            Some(syn::GenericArgument::Type(ty)) => Ok(ty),
            _ => Err(syn::Error::new_spanned(args, "expected a type argument")),
        },
        _ => Err(syn::Error::new_spanned(
            segment,
            "expected a single angle-bracketed type argument",
        )),
    }
}

pub fn has_attribute(attrs: &[Attribute], attr_name: &str) -> bool {
    attrs.iter().any(|attr| match &attr.meta {
        syn::Meta::Path(path) => path.is_ident(attr_name),
        _ => false,
    })
}

/// Reads `#[dims(in, out)]`.
pub fn parse_dims_attr(attrs: &[Attribute], span: &Ident) -> syn::Result<(usize, usize)> {
    let attr = attrs
        .iter()
        .find(|attr| attr.path().is_ident("dims"))
        .ok_or_else(|| {
            syn::Error::new_spanned(
                span,
                "missing `#[dims(in, out)]`, or use `#[manual_forward]`",
            )
        })?;

    let dims = attr.parse_args_with(
        syn::punctuated::Punctuated::<syn::LitInt, syn::Token![,]>::parse_terminated,
    )?;
    let dims = dims
        .iter()
        .map(|dim| dim.base10_parse::<usize>())
        .collect::<syn::Result<Vec<_>>>()?;

    match dims.as_slice() {
        [in_dim, out_dim] => Ok((*in_dim, *out_dim)),
        _ => Err(syn::Error::new_spanned(
            attr,
            "dims should be two integers, for example `#[dims(4, 2)]`",
        )),
    }
}
