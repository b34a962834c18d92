//! Derive macro for rowkeep row types.
//!
//! This crate provides the `#[derive(Row)]` macro, which turns a struct
//! with named fields into a row descriptor: its column names, an encoder
//! into a `Record` and a decoder from one.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Expr, Fields, Ident, Lit, Path};

/// Derives `rowkeep_core::row::Row` for a struct.
///
/// Every field becomes a column, in declaration order. Field types must
/// implement `Clone`, `ToSqlValue` and `FromSqlValue`.
///
/// # Attributes
///
/// - `#[row(crate = "path")]` - Path to `rowkeep_core` (optional, defaults
///   to `::rowkeep_core`)
///
/// # Field Attributes
///
/// - `#[row(rename = "column_name")]` - Specifies the SQL column name
///   (optional, defaults to field name)
#[proc_macro_derive(Row, attributes(row))]
pub fn derive_row(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_row_impl(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

fn derive_row_impl(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let krate = get_crate_path(&input.attrs)?;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Row derive only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Row derive only supports structs",
            ));
        }
    };

    let mut columns: Vec<ColumnInfo> = Vec::new();
    for field in fields {
        let Some(field_name) = field.ident.clone() else {
            return Err(syn::Error::new_spanned(field, "expected a named field"));
        };
        let column_name = parse_rename(&field.attrs)?.unwrap_or_else(|| field_name.to_string());
        if columns.iter().any(|c| c.column_name == column_name) {
            return Err(syn::Error::new_spanned(
                field,
                format!("duplicate column `{column_name}`"),
            ));
        }
        columns.push(ColumnInfo {
            field_name,
            column_name,
        });
    }

    let column_names: Vec<&str> = columns.iter().map(|c| c.column_name.as_str()).collect();

    let encoders: Vec<TokenStream2> = columns
        .iter()
        .map(|c| {
            let field_name = &c.field_name;
            let column_name = &c.column_name;
            quote! {
                record.insert(#column_name, ::std::clone::Clone::clone(&self.#field_name));
            }
        })
        .collect();

    let decoders: Vec<TokenStream2> = columns
        .iter()
        .map(|c| {
            let field_name = &c.field_name;
            let column_name = &c.column_name;
            quote! {
                #field_name: record.decode(#column_name)?,
            }
        })
        .collect();

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let expanded = quote! {
        impl #impl_generics #krate::row::Row for #struct_name #ty_generics #where_clause {
            const COLUMNS: &'static [&'static str] = &[#(#column_names),*];

            fn to_record(&self) -> #krate::row::Record {
                let mut record = #krate::row::Record::new();
                #(#encoders)*
                record
            }

            fn from_record(
                record: &#krate::row::Record,
            ) -> ::std::result::Result<Self, #krate::error::RowError> {
                ::std::result::Result::Ok(Self {
                    #(#decoders)*
                })
            }
        }
    };

    Ok(expanded)
}

struct ColumnInfo {
    field_name: Ident,
    column_name: String,
}

fn get_crate_path(attrs: &[Attribute]) -> syn::Result<TokenStream2> {
    for attr in attrs {
        if attr.path().is_ident("row") {
            let mut path = None;
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("crate") {
                    let value = string_value(&meta.value()?.parse()?);
                    match value {
                        Some(s) => path = Some(syn::parse_str::<Path>(&s)?),
                        None => return Err(meta.error("expected a string literal")),
                    }
                    Ok(())
                } else {
                    Err(meta.error("unsupported row attribute"))
                }
            })?;
            if let Some(path) = path {
                return Ok(quote!(#path));
            }
        }
    }
    Ok(quote!(::rowkeep_core))
}

fn parse_rename(attrs: &[Attribute]) -> syn::Result<Option<String>> {
    let mut rename = None;
    for attr in attrs {
        if attr.path().is_ident("row") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") {
                    rename = string_value(&meta.value()?.parse()?);
                    if rename.is_none() {
                        return Err(meta.error("expected a string literal"));
                    }
                    Ok(())
                } else {
                    Err(meta.error("unsupported row field attribute"))
                }
            })?;
        }
    }
    Ok(rename)
}

fn string_value(expr: &Expr) -> Option<String> {
    if let Expr::Lit(lit) = expr {
        if let Lit::Str(s) = &lit.lit {
            return Some(s.value());
        }
    }
    None
}
