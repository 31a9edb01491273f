use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::spanned::Spanned;
use syn::{
    parse_macro_input, parse_quote, FnArg, GenericArgument, ItemFn, PathArguments, ReturnType, Type,
};

pub(crate) fn generator_impl(args: TokenStream, item: TokenStream) -> TokenStream {
    if !args.is_empty() {
        return syn::Error::new(Span::call_site(), "#[generator] takes no arguments")
            .to_compile_error()
            .into();
    }
    let input = parse_macro_input!(item as ItemFn);
    match expand(input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand(input: ItemFn) -> syn::Result<proc_macro2::TokenStream> {
    let ItemFn {
        attrs,
        vis,
        mut sig,
        block,
    } = input;

    let mut inputs = std::mem::take(&mut sig.inputs).into_iter();
    let yielder = match inputs.next() {
        Some(FnArg::Typed(arg)) => arg,
        Some(other) => {
            return Err(syn::Error::new(other.span(), "expected `name: &Yielder<T>` first"));
        }
        None => {
            return Err(syn::Error::new(sig.span(), "missing `&Yielder<T>` parameter"));
        }
    };
    let (yielded, local) = yielder_args(&yielder.ty)?;
    sig.inputs = inputs.collect();

    let body_output = match &sig.output {
        ReturnType::Default => quote!(()),
        ReturnType::Type(_, ty) => quote!(#ty),
    };
    sig.output = parse_quote!(-> ::stackfiber::Fiber<'static, #yielded, #local>);

    let yielder_pat = &yielder.pat;
    let yielder_ty = &yielder.ty;
    let stmts = block.stmts;

    Ok(quote! {
        #(#attrs)*
        #vis #sig {
            ::stackfiber::Fiber::with_local(
                ::core::default::Default::default(),
                move |#yielder_pat: #yielder_ty| -> #body_output {
                    #(#stmts)*
                },
            )
        }
    })
}

/// Extracts `T` and `L` from `&Yielder<T, L>`, with `L` defaulting to `()`.
fn yielder_args(ty: &Type) -> syn::Result<(Type, Type)> {
    let err = || syn::Error::new(ty.span(), "expected `&Yielder<T>` or `&Yielder<T, L>`");

    let Type::Reference(reference) = ty else {
        return Err(err());
    };
    let Type::Path(path) = &*reference.elem else {
        return Err(err());
    };
    let segment = path.path.segments.last().ok_or_else(err)?;
    if segment.ident != "Yielder" {
        return Err(err());
    }
    let PathArguments::AngleBracketed(generics) = &segment.arguments else {
        return Err(err());
    };

    let mut types = generics.args.iter().filter_map(|arg| match arg {
        GenericArgument::Type(ty) => Some(ty.clone()),
        _ => None,
    });
    let yielded = types.next().ok_or_else(err)?;
    let local = types.next().unwrap_or_else(|| parse_quote!(()));
    Ok((yielded, local))
}
