extern crate proc_macro;

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::{quote_spanned, ToTokens};
use syn::parse::Parse;
use syn::spanned::Spanned;
use syn::{parse_macro_input, parse_quote, FnArg, Ident, Item, ItemMod, LitStr, PatType};

struct BuiltinArgs {
    name: LitStr,
}

impl Parse for BuiltinArgs {
    fn parse(input: syn::parse::ParseStream) -> syn::Result<Self> {
        Ok(BuiltinArgs {
            name: input.parse()?,
        })
    }
}

/// Mark the annotated module as a module for defining Nix builtins.
///
/// A function `fn builtins() -> Vec<Builtin>` will be defined within the
/// annotated module, returning one [`Builtin`] for each function annotated
/// with the `#[builtin]` attribute within the module.
///
/// Each invocation of the `#[builtin]` annotation should be passed a string
/// literal for the name under which the builtin is registered.
///
/// All parameters of a builtin function are forced before the function body
/// runs, unless the parameter is annotated with `#[lazy]`, in which case the
/// argument is passed through unforced (used e.g. by `tryEval` and `seq`).
///
/// # Examples
/// ```ignore
/// #[builtins]
/// mod builtins {
///     use crate::errors::Error;
///     use crate::value::Value;
///
///     #[builtin("identity")]
///     pub fn builtin_identity(x: Value) -> Result<Value, Error> {
///         Ok(x)
///     }
///
///     #[builtin("tryEval")]
///     pub fn builtin_try_eval(#[lazy] x: Value) -> Result<Value, Error> {
///         todo!()
///     }
/// }
/// ```
#[proc_macro_attribute]
pub fn builtins(_args: TokenStream, item: TokenStream) -> TokenStream {
    let mut module = parse_macro_input!(item as ItemMod);

    let (_, items) = match &mut module.content {
        Some(content) => content,
        None => {
            return (quote_spanned!(module.span() =>
                compile_error!("Builtin modules must be defined in-line")
            ))
            .into();
        }
    };

    let mut builtins = vec![];
    for item in items.iter_mut() {
        if let Item::Fn(f) = item {
            if let Some(builtin_attr_pos) = f
                .attrs
                .iter()
                .position(|attr| attr.path.get_ident().iter().any(|id| *id == "builtin"))
            {
                let builtin_attr = f.attrs.remove(builtin_attr_pos);
                let BuiltinArgs { name } = match builtin_attr.parse_args() {
                    Ok(args) => args,
                    Err(err) => return err.into_compile_error().into(),
                };

                if f.sig.inputs.is_empty() {
                    return (quote_spanned!(
                        f.sig.inputs.span() =>
                            compile_error!("Builtin functions must take at least one argument")
                    ))
                    .into();
                }

                // Determine per-argument strictness, and strip the `#[lazy]`
                // markers so the remaining function is plain Rust.
                let strictness = f
                    .sig
                    .inputs
                    .iter_mut()
                    .map(|input| {
                        let mut lazy = false;
                        if let FnArg::Typed(PatType { attrs, .. }) = input {
                            attrs.retain(|attr| {
                                attr.path.get_ident().into_iter().any(|id| {
                                    if id == "lazy" {
                                        lazy = true;
                                        false
                                    } else {
                                        true
                                    }
                                })
                            });
                        }
                        !lazy
                    })
                    .collect::<Vec<_>>();

                let fn_name = f.sig.ident.clone();
                let args = (0..f.sig.inputs.len())
                    .map(|n| Ident::new(&format!("arg_{n}"), Span::call_site()))
                    .collect::<Vec<_>>();
                let mut reversed_args = args.clone();
                reversed_args.reverse();

                builtins.push(quote_spanned! { builtin_attr.span() => {
                    crate::value::Builtin::new(
                        #name,
                        &[#(#strictness),*],
                        |mut args: Vec<crate::value::Value>| {
                            #(let #reversed_args = args.pop().unwrap();)*
                            #fn_name(#(#args),*)
                        }
                    )
                }});
            }
        }
    }

    items.push(parse_quote! {
        pub fn builtins() -> Vec<crate::value::Builtin> {
            vec![#(#builtins),*]
        }
    });

    module.into_token_stream().into()
}
