use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Ident, LitStr, Type, parse_macro_input, spanned::Spanned};

/// Derives `factory_persist::Model` for a struct with named fields.
///
/// Struct attributes: `#[model(table = "...", unique(col, ...))]`.
/// Exactly one field must be marked `#[column(primary_key)]`.
/// Field attributes: `#[column(primary_key)]`, `#[column(unique)]`,
/// `#[column(name = "...")]`, `#[column(skip)]`.
#[proc_macro_derive(Model, attributes(model, column))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_model(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

struct ModelOptions {
    table_name: Option<String>,
    unique: Vec<Vec<Ident>>,
}

#[derive(Default)]
struct ColumnOptions {
    skip: bool,
    primary_key: bool,
    unique: bool,
    column_name: Option<String>,
}

struct ColumnField {
    ident: Ident,
    ty: Type,
    column_name: String,
    primary_key: bool,
    unique: bool,
}

fn expand_model(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            input.generics,
            "Model does not support generic structs",
        ));
    }

    let model_options = parse_model_options(&input.attrs)?;

    let data_struct = match input.data {
        Data::Struct(data) => data,
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                "Model can only be derived for structs",
            ));
        }
    };

    let named_fields = match data_struct.fields {
        Fields::Named(fields) => fields,
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                "Model requires named fields",
            ));
        }
    };

    let mut columns = Vec::<ColumnField>::new();
    for field in named_fields.named {
        let ident = field
            .ident
            .clone()
            .ok_or_else(|| syn::Error::new(field.span(), "Model requires named fields"))?;
        let options = parse_column_options(&field.attrs)?;
        if options.skip {
            continue;
        }
        let column_name = options
            .column_name
            .unwrap_or_else(|| ident.to_string().trim_start_matches("r#").to_string());
        if columns.iter().any(|c| c.column_name == column_name) {
            return Err(syn::Error::new(
                ident.span(),
                format!("Duplicate column name '{}'", column_name),
            ));
        }
        columns.push(ColumnField {
            ident,
            ty: field.ty,
            column_name,
            primary_key: options.primary_key,
            unique: options.unique,
        });
    }

    if columns.is_empty() {
        return Err(syn::Error::new(
            struct_name.span(),
            "Model requires at least one column",
        ));
    }
    match columns.iter().filter(|c| c.primary_key).count() {
        1 => {}
        0 => {
            return Err(syn::Error::new(
                struct_name.span(),
                "Model requires a #[column(primary_key)] field",
            ));
        }
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                "Model supports exactly one #[column(primary_key)]",
            ));
        }
    }

    let table_name = model_options
        .table_name
        .unwrap_or_else(|| to_snake_case(&struct_name.to_string()));

    let mut unique_groups = Vec::<Vec<String>>::new();
    for group in &model_options.unique {
        let mut names = Vec::with_capacity(group.len());
        for ident in group {
            let name = ident.to_string();
            if !columns.iter().any(|c| c.column_name == name) {
                return Err(syn::Error::new(
                    ident.span(),
                    format!("unique(...) refers to unknown column '{}'", name),
                ));
            }
            names.push(name);
        }
        unique_groups.push(names);
    }
    for column in columns.iter().filter(|c| c.unique) {
        unique_groups.push(vec![column.column_name.clone()]);
    }

    let column_exprs = columns.iter().map(|column| {
        let name = &column.column_name;
        let ty = &column.ty;
        let pk = if column.primary_key {
            quote! { .primary_key() }
        } else {
            quote! {}
        };
        quote! {
            ::factory_persist::Column::new(
                #name,
                <#ty as ::factory_persist::FieldValue>::DATA_TYPE,
            )
            .nullable(<#ty as ::factory_persist::FieldValue>::NULLABLE)
            #pk
        }
    });

    let unique_exprs = unique_groups.iter().map(|group| {
        quote! {
            .with_unique(::factory_persist::UniqueConstraint::new([#(#group),*]))
        }
    });

    let getter_arms = columns.iter().map(|column| {
        let name = &column.column_name;
        let ident = &column.ident;
        quote! {
            #name => ::std::option::Option::Some(
                ::factory_persist::FieldValue::to_value(&self.#ident)
            ),
        }
    });

    let setter_arms = columns.iter().map(|column| {
        let name = &column.column_name;
        let ident = &column.ident;
        quote! {
            #name => {
                self.#ident = ::factory_persist::FieldValue::from_value(value)?;
            }
        }
    });

    Ok(quote! {
        impl ::factory_persist::Model for #struct_name {
            fn schema() -> &'static ::factory_persist::ModelSchema {
                static SCHEMA: ::std::sync::OnceLock<::factory_persist::ModelSchema> =
                    ::std::sync::OnceLock::new();
                SCHEMA.get_or_init(|| {
                    ::factory_persist::ModelSchema::new(#table_name, vec![#(#column_exprs),*])
                        #(#unique_exprs)*
                })
            }

            fn from_args(
                args: ::factory_persist::ModelArgs,
            ) -> ::factory_persist::Result<Self> {
                ::factory_persist::model::build_from_args(args)
            }

            fn field(&self, name: &str) -> ::std::option::Option<::factory_persist::Value> {
                match name {
                    #(#getter_arms)*
                    _ => ::std::option::Option::None,
                }
            }

            fn set_field(
                &mut self,
                name: &str,
                value: ::factory_persist::Value,
            ) -> ::factory_persist::Result<()> {
                match name {
                    #(#setter_arms)*
                    other => {
                        return ::std::result::Result::Err(
                            ::factory_persist::FactoryError::UnknownField {
                                model: #table_name.to_string(),
                                field: other.to_string(),
                            },
                        );
                    }
                }
                ::std::result::Result::Ok(())
            }

            fn from_record(
                record: &::factory_persist::Record,
            ) -> ::factory_persist::Result<Self> {
                ::factory_persist::model::build_from_record(record)
            }
        }
    })
}

fn to_snake_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 4);
    for (idx, ch) in value.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if idx > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

fn parse_column_options(attrs: &[syn::Attribute]) -> syn::Result<ColumnOptions> {
    let mut options = ColumnOptions::default();

    for attr in attrs {
        if !attr.path().is_ident("column") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("primary_key") {
                options.primary_key = true;
                return Ok(());
            }

            if meta.path.is_ident("unique") {
                options.unique = true;
                return Ok(());
            }

            if meta.path.is_ident("skip") {
                options.skip = true;
                return Ok(());
            }

            if meta.path.is_ident("name") {
                let value = meta.value()?;
                let lit: LitStr = value.parse()?;
                options.column_name = Some(lit.value());
                return Ok(());
            }

            Err(meta.error(
                "Unsupported #[column(...)] option. Supported: primary_key, unique, skip, name = \"...\"",
            ))
        })?;

        if options.skip && (options.primary_key || options.unique || options.column_name.is_some())
        {
            return Err(syn::Error::new(
                attr.span(),
                "#[column(skip)] cannot be combined with other column options",
            ));
        }
    }

    Ok(options)
}

fn parse_model_options(attrs: &[syn::Attribute]) -> syn::Result<ModelOptions> {
    let mut options = ModelOptions {
        table_name: None,
        unique: Vec::new(),
    };

    for attr in attrs {
        if !attr.path().is_ident("model") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                let value = meta.value()?;
                let lit: LitStr = value.parse()?;
                options.table_name = Some(lit.value());
                return Ok(());
            }

            if meta.path.is_ident("unique") {
                let mut group = Vec::new();
                meta.parse_nested_meta(|column| {
                    let ident = column
                        .path
                        .get_ident()
                        .cloned()
                        .ok_or_else(|| column.error("expected a column name"))?;
                    group.push(ident);
                    Ok(())
                })?;
                if group.is_empty() {
                    return Err(meta.error("unique(...) needs at least one column"));
                }
                options.unique.push(group);
                return Ok(());
            }

            Err(meta.error(
                "Unsupported #[model(...)] option. Supported: table = \"...\", unique(col, ...)",
            ))
        })?;
    }

    Ok(options)
}
