//! Attribute parsing for `#[envapt(...)]` annotations.

use syn::{Attribute, Expr, Field, LitStr};

/// Struct-level `#[envapt(...)]` options.
#[derive(Debug, Default)]
pub struct StructAttrs {
    /// Prepended to every variable name, including explicit `name`s.
    pub prefix: String,
}

impl StructAttrs {
    pub fn from_attrs(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut parsed = Self::default();

        for attr in attrs {
            if !attr.path().is_ident("envapt") {
                continue;
            }

            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("prefix") {
                    let lit: LitStr = meta.value()?.parse()?;
                    parsed.prefix = lit.value();
                    return Ok(());
                }

                Err(meta.error("unsupported struct-level envapt attribute"))
            })?;
        }

        Ok(parsed)
    }
}

/// Field-level `#[envapt(...)]` options.
#[derive(Debug, Default)]
pub struct FieldAttrs {
    /// Variable name override. Defaults to the upper-cased field name.
    pub name: Option<String>,

    /// Fallback expression, converted with `Into<EnvValue>`.
    pub fallback: Option<Expr>,

    /// Converter expression, converted with `Into<ConverterSpec>`.
    pub converter: Option<Expr>,
}

impl FieldAttrs {
    pub fn from_field(field: &Field) -> syn::Result<Self> {
        let mut attrs = Self::default();

        for attr in &field.attrs {
            if !attr.path().is_ident("envapt") {
                continue;
            }

            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    let lit: LitStr = meta.value()?.parse()?;
                    if lit.value().trim().is_empty() {
                        return Err(meta.error("envapt name cannot be empty"));
                    }
                    attrs.name = Some(lit.value());
                    return Ok(());
                }

                if meta.path.is_ident("fallback") {
                    attrs.fallback = Some(meta.value()?.parse()?);
                    return Ok(());
                }

                if meta.path.is_ident("converter") {
                    attrs.converter = Some(meta.value()?.parse()?);
                    return Ok(());
                }

                Err(meta.error("unsupported envapt attribute"))
            })?;
        }

        Ok(attrs)
    }
}
