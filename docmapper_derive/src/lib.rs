use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    Data, DeriveInput, Fields, Ident, LitStr, Token, Type, parse_macro_input, spanned::Spanned,
};

/// Generates `docmapper::Entity` for a struct with named fields.
///
/// Field options: `#[odm(key)]`, `#[odm(autokey)]`, `#[odm(file)]`,
/// `#[odm(skip)]`. `<Self as Default>::default` is registered as the
/// constructor unless the struct carries `#[odm(no_default)]`.
///
/// Stored field names follow `#[serde(rename = "...")]` on a field; the
/// generated `get_`/`set_` methods keep the Rust field name. Struct-level
/// `#[serde(rename_all)]` is rejected.
#[proc_macro_derive(Entity, attributes(odm))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_entity(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Default)]
struct FieldOptions {
    key: bool,
    autokey: bool,
    file: bool,
    skip: bool,
}

fn expand_entity(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            input.generics,
            "Entity does not support generic structs",
        ));
    }

    let has_constructor = !parse_struct_options(&input.attrs)?;
    reject_rename_all(&input.attrs)?;

    let data_struct = match input.data {
        Data::Struct(data) => data,
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                "Entity can only be derived for structs",
            ));
        }
    };

    let named_fields = match data_struct.fields {
        Fields::Named(fields) => fields,
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                "Entity requires named fields",
            ));
        }
    };

    let mut field_specs = Vec::<TokenStream2>::new();
    let mut methods = Vec::<TokenStream2>::new();

    for field in named_fields.named {
        let ident = field
            .ident
            .clone()
            .ok_or_else(|| syn::Error::new(field.span(), "Entity requires named fields"))?;
        let options = parse_field_options(&field.attrs)?;
        if options.skip {
            if options.key || options.autokey || options.file {
                return Err(syn::Error::new(
                    field.span(),
                    "#[odm(skip)] cannot be combined with key, autokey or file",
                ));
            }
            continue;
        }

        let ty = &field.ty;
        let stored_name = match serde_rename(&field.attrs)? {
            Some(name) => name,
            None => ident.to_string().trim_start_matches("r#").to_string(),
        };
        field_specs.push(field_spec_tokens(&ident, &stored_name, ty, &options));
        methods.extend(method_tokens(&ident, ty));
    }

    let constructor = if has_constructor {
        quote! { .constructor(<Self as ::core::default::Default>::default) }
    } else {
        quote! {}
    };

    Ok(quote! {
        impl ::docmapper::schema::Entity for #struct_name {
            fn schema() -> ::docmapper::schema::EntitySchema<Self> {
                ::docmapper::schema::EntitySchema::new(stringify!(#struct_name))
                    #constructor
                    #(.field(#field_specs))*
                    #(.method(#methods))*
            }
        }
    })
}

fn field_spec_tokens(ident: &Ident, name: &str, ty: &Type, options: &FieldOptions) -> TokenStream2 {
    let mut markers = Vec::<TokenStream2>::new();
    if options.key {
        markers.push(quote!(.key()));
    }
    if options.autokey {
        markers.push(quote!(.autokey()));
    }
    if options.file {
        markers.push(quote!(.file()));
    }

    let base = quote! {
        ::docmapper::schema::FieldSpec::new(
            #name,
            ::docmapper::ValueType::from_rust_type(stringify!(#ty)),
        )
        #(#markers)*
    };

    if !(options.key || options.autokey || options.file) {
        return base;
    }

    let setter = if options.autokey || options.file {
        quote! {
            let set: ::docmapper::schema::entity::FieldSetter<Self> = |entity, value| {
                ::docmapper::schema::entity::write_text(&mut entity.#ident, value)
            };
            let set = Some(set);
        }
    } else {
        quote! { let set = None; }
    };

    quote! {
        {
            let get: ::docmapper::schema::entity::FieldGetter<Self> =
                |entity| ::docmapper::schema::entity::read_text(&entity.#ident);
            #setter
            #base.accessor(get, set)
        }
    }
}

fn method_tokens(ident: &Ident, ty: &Type) -> Vec<TokenStream2> {
    let field = ident.to_string();
    let field = field.trim_start_matches("r#");
    let getter_name = format!("get_{}", field);
    let setter_name = format!("set_{}", field);

    let value_type = quote! { ::docmapper::ValueType::from_rust_type(stringify!(#ty)) };
    let getter_body = quote! {
        |entity: &Self| ::docmapper::schema::entity::encode_value(&entity.#ident)
    };

    let mut methods = vec![
        quote! {
            ::docmapper::schema::EntityMethod::getter(#getter_name, #value_type, #getter_body)
        },
        quote! {
            ::docmapper::schema::EntityMethod::setter(
                #setter_name,
                #value_type,
                |entity: &mut Self, value| {
                    entity.#ident = ::docmapper::schema::entity::decode_value(value)?;
                    Ok(())
                },
            )
        },
    ];

    if is_bool(ty) {
        let predicate_name = format!("is_{}", field);
        methods.push(quote! {
            ::docmapper::schema::EntityMethod::getter(#predicate_name, #value_type, #getter_body)
        });
    }

    methods
}

fn is_bool(ty: &Type) -> bool {
    match ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .map(|segment| segment.ident == "bool")
            .unwrap_or(false),
        _ => false,
    }
}

/// Returns whether the struct opts out of the constructor via `#[odm(no_default)]`.
fn parse_struct_options(attrs: &[syn::Attribute]) -> syn::Result<bool> {
    let mut no_default = false;

    for attr in attrs {
        if !attr.path().is_ident("odm") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("no_default") {
                no_default = true;
                return Ok(());
            }

            Err(meta.error("Unsupported #[odm(...)] struct option. Supported: no_default"))
        })?;
    }

    Ok(no_default)
}

/// Consumes the value of a serde option this macro does not interpret.
fn skip_serde_option(meta: &syn::meta::ParseNestedMeta<'_>) -> syn::Result<()> {
    if meta.input.peek(Token![=]) {
        meta.value()?.parse::<syn::Expr>()?;
    } else if meta.input.peek(syn::token::Paren) {
        let content;
        syn::parenthesized!(content in meta.input);
        content.parse::<TokenStream2>()?;
    }
    Ok(())
}

fn reject_rename_all(attrs: &[syn::Attribute]) -> syn::Result<()> {
    for attr in attrs {
        if !attr.path().is_ident("serde") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename_all") {
                return Err(meta.error(
                    "Entity does not support #[serde(rename_all)]; rename fields one by one",
                ));
            }
            skip_serde_option(&meta)
        })?;
    }

    Ok(())
}

/// Stored name from `#[serde(rename = "...")]`, if present.
fn serde_rename(attrs: &[syn::Attribute]) -> syn::Result<Option<String>> {
    let mut rename = None;

    for attr in attrs {
        if !attr.path().is_ident("serde") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                if !meta.input.peek(Token![=]) {
                    return Err(meta.error(
                        "Entity supports only #[serde(rename = \"...\")] on fields",
                    ));
                }
                let name: LitStr = meta.value()?.parse()?;
                rename = Some(name.value());
                return Ok(());
            }
            skip_serde_option(&meta)
        })?;
    }

    Ok(rename)
}

fn parse_field_options(attrs: &[syn::Attribute]) -> syn::Result<FieldOptions> {
    let mut options = FieldOptions::default();

    for attr in attrs {
        if !attr.path().is_ident("odm") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("key") {
                options.key = true;
                return Ok(());
            }

            if meta.path.is_ident("autokey") {
                options.autokey = true;
                return Ok(());
            }

            if meta.path.is_ident("file") {
                options.file = true;
                return Ok(());
            }

            if meta.path.is_ident("skip") {
                options.skip = true;
                return Ok(());
            }

            Err(meta.error(
                "Unsupported #[odm(...)] field option. Supported: key, autokey, file, skip",
            ))
        })?;
    }

    Ok(options)
}
