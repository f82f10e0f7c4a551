//! Derive macro implementation for envapt

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields};

mod attrs;

use attrs::{FieldAttrs, StructAttrs};

/// `Envapt` derive macro
///
/// Implements `from_source()` and `from_env()` on structs with named fields.
///
/// # Supported Attributes
///
/// **Struct-level**:
/// - `#[envapt(prefix = "PREFIX_")]`: Add prefix to all variable names
///
/// **Field-level**:
/// - `#[envapt(name = "CUSTOM_NAME")]`: Custom variable name
/// - `#[envapt(fallback = expr)]`: Fallback value, anything `Into<EnvValue>`
/// - `#[envapt(converter = expr)]`: Converter, anything `Into<ConverterSpec>`
///
/// Without a converter, the field type's default converter applies.
///
/// # Example
///
/// See the `envapt` crate documentation for usage examples.
#[proc_macro_derive(Envapt, attributes(envapt))]
pub fn derive_envapt(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let prefix = StructAttrs::from_attrs(&input.attrs)?.prefix;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Envapt only supports structs with named fields",
                ));
            }
        },
        _ => return Err(syn::Error::new_spanned(input, "Envapt only supports structs")),
    };

    let mut field_initializers = Vec::with_capacity(fields.len());
    for field in fields {
        let Some(field_name) = field.ident.as_ref() else {
            continue;
        };
        let field_type = &field.ty;
        let attrs = FieldAttrs::from_field(field)?;

        let base_name = attrs
            .name
            .unwrap_or_else(|| field_name.to_string().trim_start_matches("r#").to_uppercase());
        let env_var_name = format!("{prefix}{base_name}");

        let with_fallback = attrs.fallback.map(|expr| quote! { .with_fallback(#expr) });
        let with_converter = attrs.converter.map(|expr| quote! { .with_converter(#expr) });

        field_initializers.push(quote! {
            #field_name: ::envapt::de::deserialize_field::<#field_type, __S>(
                source,
                &::envapt::ConversionRequest::new(#env_var_name)
                    #with_fallback
                    #with_converter,
            )?
        });
    }

    Ok(quote! {
        impl #impl_generics #struct_name #ty_generics #where_clause {
            /// Load configuration from an environment snapshot
            ///
            /// # Errors
            ///
            /// - A fallback does not fit its converter
            /// - A required variable is missing
            /// - A converted value does not fit the field type
            /// - A custom converter fails
            pub fn from_source<__S>(source: &__S) -> ::std::result::Result<Self, ::envapt::EnvaptError>
            where
                __S: ::envapt::EnvSource + ?Sized,
            {
                ::std::result::Result::Ok(Self {
                    #(#field_initializers),*
                })
            }

            /// Load configuration from process environment variables and `.env`
            ///
            /// # Errors
            ///
            /// - Loading the snapshot fails
            /// - Any error of `from_source`
            pub fn from_env() -> ::envapt::anyhow::Result<Self> {
                let env = ::envapt::Envapter::load()?;
                ::std::result::Result::Ok(Self::from_source(&env)?)
            }
        }
    })
}
