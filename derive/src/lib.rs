use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DataStruct, DeriveInput, Fields, LitStr};

/// 生成 Model trait 的实现
///
/// 自动生成 `TABLE`、`PK`、`FIELDS` 常量以及按列名读写字段的方法
///
/// 使用示例：
/// ```ignore
/// #[derive(Debug, Clone, Default, Model)]
/// #[model(table = "users", pk = "id")]
/// struct User {
///     id: i64,
///     #[column(name = "user_name")]
///     username: String,
///     created_at: Option<chrono::DateTime<chrono::Utc>>,
///     // 不映射到任何列
///     #[skip]
///     cached_score: u32,
/// }
/// ```
#[proc_macro_derive(Model, attributes(model, column, skip))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_model(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_model(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;

    // 解析 #[model(table = "...", pk = "...")]
    let mut table_name = None;
    let mut pk_field = None;
    for attr in &input.attrs {
        if attr.path().is_ident("model") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("table") {
                    table_name = Some(meta.value()?.parse::<LitStr>()?.value());
                    Ok(())
                } else if meta.path.is_ident("pk") {
                    pk_field = Some(meta.value()?.parse::<LitStr>()?.value());
                    Ok(())
                } else {
                    Err(meta.error("unsupported model attribute, expected `table` or `pk`"))
                }
            })?;
        }
    }

    // 如果没有指定表名，使用结构体名称的小写蛇形命名方式
    let table = table_name.unwrap_or_else(|| to_snake_case(&name.to_string()));
    // 如果没有指定主键，默认使用 "id"
    let pk = pk_field.unwrap_or_else(|| "id".to_string());

    let fields = match &input.data {
        Data::Struct(DataStruct {
            fields: Fields::Named(fields),
            ..
        }) => &fields.named,
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "Model derive only supports structs with named fields",
            ))
        }
    };

    let mut field_idents = Vec::new();
    let mut field_types = Vec::new();
    let mut columns: Vec<LitStr> = Vec::new();
    let mut pk_ident = None;

    for field in fields {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        if field.attrs.iter().any(|attr| attr.path().is_ident("skip")) {
            continue;
        }

        let mut column = ident.to_string();
        for attr in &field.attrs {
            if attr.path().is_ident("column") {
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("name") {
                        column = meta.value()?.parse::<LitStr>()?.value();
                        Ok(())
                    } else {
                        Err(meta.error("unsupported column attribute, expected `name`"))
                    }
                })?;
            }
        }

        if column == pk {
            pk_ident = Some(ident);
        }
        field_idents.push(ident);
        field_types.push(&field.ty);
        columns.push(LitStr::new(&column, proc_macro2::Span::call_site()));
    }

    // 编译期确保主键字段存在
    let pk_ident = pk_ident.ok_or_else(|| {
        syn::Error::new_spanned(
            name,
            format!("primary key field `{}` not found in struct", pk),
        )
    })?;

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics sqlxactive::Model for #name #ty_generics #where_clause {
            const TABLE: &'static str = #table;
            const PK: &'static str = #pk;
            const FIELDS: &'static [&'static str] = &[#(#columns),*];

            fn to_row(&self) -> sqlxactive::Row {
                let mut row = sqlxactive::Row::with_capacity(Self::FIELDS.len());
                #(
                    row.insert(
                        ::std::string::String::from(#columns),
                        sqlxactive::Value::from(::std::clone::Clone::clone(&self.#field_idents)),
                    );
                )*
                row
            }

            fn set_field(
                &mut self,
                name: &str,
                value: sqlxactive::Value,
            ) -> sqlxactive::Result<bool> {
                match name {
                    #(
                        #columns => {
                            self.#field_idents = <#field_types as sqlxactive::FromValue>::from_value(value)?;
                            ::std::result::Result::Ok(true)
                        }
                    )*
                    _ => ::std::result::Result::Ok(false),
                }
            }

            fn id_value(&self) -> sqlxactive::Value {
                sqlxactive::Value::from(::std::clone::Clone::clone(&self.#pk_ident))
            }
        }
    })
}

/// 将 PascalCase 转换为 snake_case
fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() && i > 0 {
            result.push('_');
        }
        result.push(c.to_ascii_lowercase());
    }
    result
}
