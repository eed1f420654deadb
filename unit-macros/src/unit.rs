use crate::utils::{apply_derives, is_option};
use proc_macro::TokenStream;
use quote::quote;
use syn::ext::IdentExt;
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::{Item, LitStr, Result, Token, parse::Parse, parse::ParseStream, parse_macro_input};

/// #[unit] 宏实现
pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    let cfg = parse_macro_input!(attr as UnitAttrConfig);
    let input = parse_macro_input!(item as Item);

    let mut st = match input {
        Item::Struct(s) => s,
        other => {
            return syn::Error::new(other.span(), "#[unit] only on struct")
                .to_compile_error()
                .into();
        }
    };

    if !st.generics.params.is_empty() {
        return syn::Error::new(st.generics.span(), "#[unit] does not support generic structs")
            .to_compile_error()
            .into();
    }

    // 单元结构体视为无构造参数
    let mut params: Vec<FieldParam> = Vec::new();
    match &mut st.fields {
        syn::Fields::Named(fields_named) => {
            for field in fields_named.named.iter_mut() {
                match FieldParam::take_from(field) {
                    Ok(p) => params.push(p),
                    Err(e) => return e.to_compile_error().into(),
                }
            }
        }
        syn::Fields::Unit => {}
        syn::Fields::Unnamed(_) => {
            return syn::Error::new(st.span(), "#[unit] only supports named-field struct")
                .to_compile_error()
                .into();
        }
    }

    apply_derives(
        &mut st.attrs,
        vec![syn::parse_quote!(Debug), syn::parse_quote!(Clone)],
    );

    let ident = &st.ident;
    let name_lit = cfg
        .name
        .unwrap_or_else(|| LitStr::new(&ident.to_string(), ident.span()));

    let flags = cfg.flags.iter().map(|flag| quote! { .#flag() });

    let param_defs = params.iter().map(|p| {
        let name = &p.name;
        if p.optional {
            quote! { ::unit_bus::marshal::Param::optional(#name) }
        } else {
            quote! { ::unit_bus::marshal::Param::required(#name) }
        }
    });

    let field_inits = params.iter().map(|p| {
        let field = &p.ident;
        let name = &p.name;
        let take = if p.optional {
            quote! { take_optional }
        } else {
            quote! { take_required }
        };
        quote! {
            #field: ::unit_bus::marshal::#take(
                &mut args,
                <Self as ::unit_bus::unit::Unit>::NAME,
                #name,
            )?
        }
    });

    let construct = if matches!(st.fields, syn::Fields::Unit) {
        quote! { Self }
    } else {
        quote! { Self { #( #field_inits, )* } }
    };

    let field_puts = params.iter().map(|p| {
        let field = &p.ident;
        let name = &p.name;
        quote! { ::unit_bus::marshal::put(&mut args, #name, &self.#field)?; }
    });

    let out = quote! {
        #st

        impl ::unit_bus::unit::Unit for #ident {
            const NAME: &'static str = #name_lit;
            const CAPABILITIES: ::unit_bus::unit::Capabilities =
                ::unit_bus::unit::Capabilities::NONE #( #flags )*;
        }

        impl ::unit_bus::marshal::Marshal for #ident {
            const PARAMS: &'static [::unit_bus::marshal::Param] = &[ #( #param_defs ),* ];

            #[allow(unused_mut, unused_variables)]
            fn from_arguments(
                mut args: ::unit_bus::arguments::ArgumentBag,
            ) -> ::unit_bus::error::AppResult<Self> {
                ::core::result::Result::Ok(#construct)
            }

            #[allow(unused_mut)]
            fn to_arguments(
                &self,
            ) -> ::unit_bus::error::AppResult<::unit_bus::arguments::ArgumentBag> {
                let mut args = ::unit_bus::arguments::ArgumentBag::new();
                #( #field_puts )*
                ::core::result::Result::Ok(args)
            }
        }
    };

    TokenStream::from(out)
}

// 字段 → 构造参数
struct FieldParam {
    ident: syn::Ident,
    name: LitStr,
    optional: bool,
}

impl FieldParam {
    // 解析并移除字段上的 #[unit(...)]
    fn take_from(field: &mut syn::Field) -> Result<Self> {
        let ident = field
            .ident
            .clone()
            .ok_or_else(|| syn::Error::new(field.span(), "expected named field"))?;

        let mut default = false;
        let mut rename: Option<LitStr> = None;

        for attr in field.attrs.iter().filter(|a| a.path().is_ident("unit")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("default") {
                    if default {
                        return Err(meta.error("duplicate key 'default' in attribute"));
                    }
                    default = true;
                    Ok(())
                } else if meta.path.is_ident("rename") {
                    if rename.is_some() {
                        return Err(meta.error("duplicate key 'rename' in attribute"));
                    }
                    rename = Some(meta.value()?.parse()?);
                    Ok(())
                } else {
                    Err(meta.error("unknown key; expected 'default' | 'rename'"))
                }
            })?;
        }
        field.attrs.retain(|a| !a.path().is_ident("unit"));

        let name =
            rename.unwrap_or_else(|| LitStr::new(&ident.unraw().to_string(), ident.span()));
        let optional = default || is_option(&field.ty);

        Ok(Self {
            ident,
            name,
            optional,
        })
    }
}

// -------- parsing --------

// 解析 unit 宏参数：name = "..."、queueable、operation、job
struct UnitAttrConfig {
    name: Option<LitStr>,
    flags: Vec<syn::Ident>,
}

impl Parse for UnitAttrConfig {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut name: Option<LitStr> = None;
        let mut flags: Vec<syn::Ident> = Vec::new();

        if input.is_empty() {
            return Ok(Self { name, flags });
        }

        let elems: Punctuated<UnitAttrElem, Token![,]> = Punctuated::parse_terminated(input)?;

        for elem in elems {
            match elem {
                UnitAttrElem::Name(lit) => {
                    if name.is_some() {
                        return Err(syn::Error::new(
                            lit.span(),
                            "duplicate key 'name' in attribute",
                        ));
                    }
                    name = Some(lit);
                }
                UnitAttrElem::Flag(flag) => {
                    if flags.iter().any(|f| f == &flag) {
                        return Err(syn::Error::new(
                            flag.span(),
                            format!("duplicate key '{flag}' in attribute"),
                        ));
                    }
                    flags.push(flag);
                }
            }
        }

        Ok(Self { name, flags })
    }
}

enum UnitAttrElem {
    Name(LitStr),
    Flag(syn::Ident),
}

impl Parse for UnitAttrElem {
    fn parse(input: ParseStream) -> Result<Self> {
        let key: syn::Ident = input.parse()?;
        match key.to_string().as_str() {
            "name" => {
                let _eq: Token![=] = input.parse()?;
                let lit: LitStr = input.parse()?;
                Ok(Self::Name(lit))
            }
            "queueable" | "operation" | "job" => Ok(Self::Flag(key)),
            _ => Err(syn::Error::new(
                key.span(),
                "unknown key in attribute; expected 'name' | 'queueable' | 'operation' | 'job'",
            )),
        }
    }
}
