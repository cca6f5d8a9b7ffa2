use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::spanned::Spanned;
use syn::{parse_macro_input, ItemFn, ReturnType};

/// Kernel test case procedural macro
///
/// Turns a plain function into a `#[test]` that:
/// - Boots a fresh simulated kernel with the default configuration
/// - Runs the function body as the kernel's main thread
/// - Fails the test if the kernel halts in a deadlock
///
/// Every other attribute on the function (`#[should_panic]`, `#[ignore]`,
/// doc comments...) is forwarded to the generated test.
///
/// Usage:
/// ```ignore
/// #[kernel_test]
/// fn wait_until_blocks() {
///     xux_threads::alarm().wait_until(1000);
/// }
/// ```
#[proc_macro_attribute]
pub fn kernel_test(attr: TokenStream, input: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        let attr = proc_macro2::TokenStream::from(attr);
        return syn::Error::new(attr.span(), "kernel_test takes no arguments")
            .to_compile_error()
            .into();
    }

    let input_fn = parse_macro_input!(input as ItemFn);
    if let Err(err) = check_signature(&input_fn) {
        return err.to_compile_error().into();
    }

    let fn_name = &input_fn.sig.ident;
    let attrs = &input_fn.attrs;
    let vis = &input_fn.vis;
    let block = &input_fn.block;

    let body_name = format_ident!("__{}_kernel_body", fn_name);

    // Generate test wrapper with:
    // 1. The test body, moved into a nested fn
    // 2. A kernel boot that runs the body as the main thread
    let output = quote! {
        #(#attrs)*
        #[test]
        #vis fn #fn_name() {
            fn #body_name() #block

            ::xux_threads::kernel::run_test(
                stringify!(#fn_name),
                file!(),
                #body_name,
            );
        }
    };

    output.into()
}

/// Rejects signatures that cannot run as a kernel main thread.
fn check_signature(input_fn: &ItemFn) -> Result<(), syn::Error> {
    let sig = &input_fn.sig;
    if let Some(asyncness) = &sig.asyncness {
        return Err(syn::Error::new(
            asyncness.span(),
            "kernel tests cannot be async",
        ));
    }
    if !sig.inputs.is_empty() {
        return Err(syn::Error::new(
            sig.inputs.span(),
            "kernel tests take no arguments",
        ));
    }
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new(
            sig.generics.span(),
            "kernel tests cannot be generic",
        ));
    }
    if let ReturnType::Type(_, ty) = &sig.output {
        if !is_unit_type(ty) {
            return Err(syn::Error::new(ty.span(), "kernel tests must return ()"));
        }
    }
    Ok(())
}

/// Checks if type is the unit type `()`
fn is_unit_type(ty: &syn::Type) -> bool {
    matches!(ty, syn::Type::Tuple(tuple) if tuple.elems.is_empty())
}
