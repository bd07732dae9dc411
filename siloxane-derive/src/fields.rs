use proc_macro2::TokenStream;
use quote::quote;

#[derive(Default)]
pub(crate) struct FieldAttrs {
    pub skip: bool,
    pub rename: Option<String>,
}

pub(crate) fn parse_field_attrs(attrs: &[syn::Attribute]) -> syn::Result<FieldAttrs> {
    let mut result = FieldAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("structural") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                result.skip = true;
            } else if meta.path.is_ident("rename") {
                let value: syn::LitStr = meta.value()?.parse()?;
                result.rename = Some(value.value());
            } else {
                return Err(meta.error("expected `skip` or `rename = \"...\"`"));
            }
            Ok(())
        })?;
    }

    Ok(result)
}

/// One struct field as it appears in the stored object.
pub(crate) struct StoredField {
    /// Accessor on `self` (`name` or `0`).
    pub member: syn::Member,
    /// Child name in the stored group.
    pub name: String,
    pub skip: bool,
}

/// Collects the fields of a struct. Tuple fields are stored as `_0`, `_1`, ...
pub(crate) fn stored_fields(fields: &syn::Fields) -> syn::Result<Vec<StoredField>> {
    let mut out = Vec::new();
    for (i, field) in fields.iter().enumerate() {
        let attrs = parse_field_attrs(&field.attrs)?;
        let (member, default_name) = match &field.ident {
            Some(ident) => (syn::Member::Named(ident.clone()), ident.to_string()),
            None => (syn::Member::Unnamed(syn::Index::from(i)), format!("_{i}")),
        };
        let name = attrs.rename.unwrap_or(default_name);
        if name.is_empty() || name.contains('/') {
            return Err(syn::Error::new_spanned(
                field,
                "stored field names must be non-empty and must not contain '/'",
            ));
        }
        out.push(StoredField {
            member,
            name,
            skip: attrs.skip,
        });
    }
    Ok(out)
}

/// Generates the body of `to_fields`.
pub(crate) fn generate_to_fields(fields: &[StoredField]) -> TokenStream {
    let inserts = fields.iter().filter(|f| !f.skip).map(|f| {
        let member = &f.member;
        let name = &f.name;
        quote! {
            fields.insert(
                ::std::string::String::from(#name),
                ::siloxane_core::ToValue::to_value(&self.#member),
            );
        }
    });

    quote! {
        fn to_fields(&self) -> ::siloxane_core::Fields {
            #[allow(unused_mut)]
            let mut fields = ::siloxane_core::Fields::new();
            #(#inserts)*
            fields
        }
    }
}

/// Generates `from_fields`, building `Self` with the struct's own syntax.
/// Skipped fields are restored with `Default`.
pub(crate) fn generate_from_fields(
    data: &syn::DataStruct,
    fields: &[StoredField],
) -> TokenStream {
    let values: Vec<_> = fields
        .iter()
        .map(|f| {
            if f.skip {
                quote! { ::std::default::Default::default() }
            } else {
                let stored = &f.name;
                quote! { ::siloxane_core::take_field(&mut fields, #stored)? }
            }
        })
        .collect();

    let construction = match &data.fields {
        syn::Fields::Named(_) => {
            let members = fields.iter().map(|f| &f.member);
            quote! { Self { #(#members: #values),* } }
        }
        syn::Fields::Unnamed(_) => quote! { Self(#(#values),*) },
        syn::Fields::Unit => quote! { Self },
    };

    quote! {
        #[allow(unused_mut, unused_variables)]
        fn from_fields(
            mut fields: ::siloxane_core::Fields,
        ) -> ::std::result::Result<Self, ::siloxane_core::ValueError> {
            ::std::result::Result::Ok(#construction)
        }
    }
}
