use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput};

mod fields;

/// Derive macro for the `Structural` trait.
///
/// Generates `Structural` (`MODULE` is the defining module path, `CLASS` the
/// type name), plus `ToValue` and `FromValue` so the type is stored as an
/// object group with one child per field.
///
/// # Example
///
/// ```ignore
/// use siloxane_core::Structural;
///
/// #[derive(Structural)]
/// struct Sample {
///     name: String,
///     #[structural(rename = "n")]
///     count: u32,
///     #[structural(skip)]
///     cache: Vec<f64>,
/// }
/// ```
///
/// # Attributes
///
/// - `#[structural(skip)]` - Do not store this field (restored with `Default`)
/// - `#[structural(rename = "name")]` - Store the field under a custom name
#[proc_macro_derive(Structural, attributes(structural))]
pub fn derive_structural(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match derive_structural_impl(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn derive_structural_impl(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let class = name.to_string();

    let data = match &input.data {
        syn::Data::Struct(data) => data,
        syn::Data::Enum(_) | syn::Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "Structural can only be derived for structs",
            ));
        }
    };

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let where_clause = build_where_clause(&input.generics, where_clause);

    let stored = fields::stored_fields(&data.fields)?;
    let to_fields = fields::generate_to_fields(&stored);
    let from_fields = fields::generate_from_fields(data, &stored);

    Ok(quote! {
        impl #impl_generics ::siloxane_core::Structural for #name #ty_generics #where_clause {
            const MODULE: &'static str = ::std::module_path!();
            const CLASS: &'static str = #class;

            #to_fields
            #from_fields
        }

        impl #impl_generics ::siloxane_core::ToValue for #name #ty_generics #where_clause {
            fn to_value(&self) -> ::siloxane_core::Value {
                ::siloxane_core::Value::Object(::siloxane_core::Structural::to_object(self))
            }
        }

        impl #impl_generics ::siloxane_core::FromValue for #name #ty_generics #where_clause {
            fn from_value(
                value: ::siloxane_core::Value,
            ) -> ::std::result::Result<Self, ::siloxane_core::ValueError> {
                match value {
                    ::siloxane_core::Value::Object(object) => {
                        <Self as ::siloxane_core::Structural>::from_object(object)
                    }
                    other => ::std::result::Result::Err(::siloxane_core::ValueError::unexpected(
                        <Self as ::siloxane_core::Structural>::CLASS,
                        &other,
                    )),
                }
            }
        }
    })
}

/// Adds `ToValue + FromValue` bounds for every type parameter.
fn build_where_clause(
    generics: &syn::Generics,
    existing: Option<&syn::WhereClause>,
) -> proc_macro2::TokenStream {
    let type_params: Vec<_> = generics.type_params().map(|p| &p.ident).collect();

    if type_params.is_empty() && existing.is_none() {
        return quote! {};
    }

    let value_bounds = type_params.iter().map(|p| {
        quote! { #p: ::siloxane_core::ToValue + ::siloxane_core::FromValue }
    });

    let existing_predicates = existing
        .map(|w| {
            let predicates = &w.predicates;
            quote! { #predicates, }
        })
        .unwrap_or_default();

    quote! {
        where
            #existing_predicates
            #(#value_bounds),*
    }
}
