use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    Data, DeriveInput, Fields, GenericParam, LitStr, Path, parse_macro_input, parse_quote,
};

struct FieldSpec {
    ident: syn::Ident,
    wire: String,
}

pub fn field_derive_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand(input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}

fn expand(mut input: DeriveInput) -> syn::Result<TokenStream2> {
    let krate = crate_path(&input)?;

    let named = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => named.named.clone(),
            _ => {
                return Err(syn::Error::new_spanned(
                    &input.ident,
                    "Field can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "Field can only be derived for structs",
            ));
        }
    };

    let mut specs = Vec::new();
    for field in &named {
        if let Some(spec) = field_spec(field)? {
            specs.push(spec);
        }
    }

    let field_trait: Path = parse_quote!(#krate::codec::Field);
    let type_params: Vec<syn::Ident> = input
        .generics
        .params
        .iter()
        .filter_map(|param| match param {
            GenericParam::Type(ty) => Some(ty.ident.clone()),
            _ => None,
        })
        .collect();
    if !type_params.is_empty() {
        let where_clause = input.generics.make_where_clause();
        for ident in &type_params {
            where_clause
                .predicates
                .push(parse_quote!(#ident: #field_trait));
        }
    }

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let idents: Vec<_> = specs.iter().map(|s| &s.ident).collect();
    let wires: Vec<_> = specs.iter().map(|s| s.wire.as_str()).collect();

    Ok(quote! {
        impl #impl_generics #field_trait for #name #ty_generics #where_clause {
            fn child(&mut self, name: &str) -> ::core::option::Option<&mut dyn #field_trait> {
                match name {
                    #( #wires => ::core::option::Option::Some(&mut self.#idents), )*
                    _ => ::core::option::Option::None,
                }
            }

            fn encode(&self, path: &str, out: &mut ::std::vec::Vec<#krate::codec::BodyItem>) {
                #(
                    #field_trait::encode(
                        &self.#idents,
                        &#krate::codec::join_path(path, #wires),
                        out,
                    );
                )*
            }
        }
    })
}

fn crate_path(input: &DeriveInput) -> syn::Result<Path> {
    let mut path: Path = parse_quote!(::tessera);

    for attr in input.attrs.iter().filter(|a| a.path().is_ident("field")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("crate") {
                let value: LitStr = meta.value()?.parse()?;
                path = value.parse()?;
                Ok(())
            } else {
                Err(meta.error("unknown container attribute"))
            }
        })?;
    }

    Ok(path)
}

fn field_spec(field: &syn::Field) -> syn::Result<Option<FieldSpec>> {
    let Some(ident) = field.ident.clone() else {
        return Ok(None);
    };

    let mut wire = ident.to_string().trim_start_matches("r#").to_string();
    let mut skip = false;

    for attr in field.attrs.iter().filter(|a| a.path().is_ident("field")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let value: LitStr = meta.value()?.parse()?;
                wire = value.value();
                Ok(())
            } else if meta.path.is_ident("skip") {
                skip = true;
                Ok(())
            } else {
                Err(meta.error("unknown field attribute"))
            }
        })?;
    }

    if skip {
        return Ok(None);
    }

    if wire.is_empty() || wire.contains(['.', '[', ']']) {
        return Err(syn::Error::new_spanned(
            &field.ident,
            "field name must be non-empty and must not contain '.', '[' or ']'",
        ));
    }

    Ok(Some(FieldSpec { ident, wire }))
}
