//! Defines Pedal-Power Runtime macros.

#![doc(test(
    no_crate_inject,
    attr(deny(warnings, rust_2018_idioms), allow(dead_code, unused_variables))
))]

extern crate proc_macro;

use proc_macro::TokenStream;

use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, ItemFn};

/// Macro definition for Pedal-Power Runtime.
///
/// This macro should be used once only in a project.
/// This macro requires `tokio` as a dependency.
///
/// _Executes the entire function in a tokio runtime and waits for all subsequently and dynamically
/// spawned tasks (using `task::run`) to be done before returning._
///
/// # Example
/// ```
/// #[pedal_macros::runtime]
/// async fn main() {
///     // whatever
/// }
/// ```
#[proc_macro_attribute]
pub fn runtime(_: TokenStream, item: TokenStream) -> TokenStream {
    macro_inner(item, false)
}

/// Same as `#[pedal_macros::runtime]` but for tests.
///
/// Tests using this macro are run serially: the task runner is global to the process.
#[proc_macro_attribute]
pub fn test(_: TokenStream, item: TokenStream) -> TokenStream {
    macro_inner(item, true)
}

fn macro_inner(item: TokenStream, test: bool) -> TokenStream {
    let pedal_power = pedal_power_crate_path();

    let input = parse_macro_input!(item as ItemFn);
    let ItemFn {
        attrs,
        vis,
        sig,
        block,
    } = input;

    if sig.asyncness.is_none() {
        return syn::Error::new_spanned(sig.fn_token, "the `async` keyword is missing")
            .to_compile_error()
            .into();
    }

    // Define the #[tokio::main] / #[tokio::test] tokio macro attribute.
    let tokio_main_attr = match test {
        true => quote! {
            #[#pedal_power::utils::tokio::test]
            #[#pedal_power::utils::serial_test::serial]
        },
        false => quote! {
            #[#pedal_power::utils::tokio::main]
        },
    };

    let output: TokenStream2 = quote! {
        #tokio_main_attr
        #(#attrs)*
        #vis #sig {
            #pedal_power::utils::task::init_task_channel().await;

            let output = async move #block.await;

            // Wait for all dynamically spawned tasks to complete.
            #pedal_power::utils::task::wait_for_tasks().await;

            output
        }
    };

    output.into()
}

/// Path used to refer to `pedal_power`.
///
/// `pedal_power` declares `extern crate self as pedal_power` so that the same path resolves
/// from within the crate itself, its doctests and any dependent crate.
fn pedal_power_crate_path() -> syn::Path {
    syn::parse_quote!(::pedal_power)
}

#[cfg(doctest)]
mod doctests {
    //! Rust doesn't provide a standard way to test for failure to compile, but Rustdoc does. So tests like
    //! that can be put here.
    //!
    //! ```
    //! // Confirm that the file exists.
    //! include_bytes!("../tests/compile-fail/incorrect_runtime.rs");
    //! ```
    //! ```compile_fail
    //! // Including the file as code is enough to cause a compilation failure.
    //! include!("../tests/compile-fail/incorrect_runtime.rs");
    //! fn main() {}
    //! ```
}
