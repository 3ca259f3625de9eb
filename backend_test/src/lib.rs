use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use syn::{
    parse_macro_input, spanned::Spanned, FnArg, GenericArgument, ItemFn, Pat, PathArguments,
    Signature, Type, TypePath,
};

/// Run an `async` test against a throwaway database.
///
/// Each test gets a database with a random name and a Rocket instance bound
/// to it. The database is dropped afterwards, whether or not the test passed.
/// Parameters are filled in by type, in any order:
///
/// - `rocket::local::asynchronous::Client` (at most one)
/// - `mongodb::Database` (at most one)
/// - `Coll<T>`, any number, each a typed handle on the test database
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    if !args.is_empty() {
        return syn::Error::new(
            Span::call_site(),
            "`backend_test` takes no arguments; sign requests in with a session cookie instead",
        )
        .into_compile_error()
        .into();
    }

    let item_fn = parse_macro_input!(input as ItemFn);
    match expand(item_fn) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.into_compile_error().into(),
    }
}

/// What the harness passes for one test parameter.
#[derive(Debug, Clone, PartialEq)]
enum Injected {
    Client,
    Database,
    Collection(TypePath),
}

impl Injected {
    /// The expression handed to the test body for this parameter.
    fn argument(&self) -> TokenStream2 {
        match self {
            Injected::Client => quote! { client },
            Injected::Database => quote! { db.clone() },
            Injected::Collection(ty) => quote! { crate::model::mongodb::Coll::<#ty>::from_db(&db) },
        }
    }
}

fn expand(mut item_fn: ItemFn) -> syn::Result<TokenStream2> {
    let injected = injections(&item_fn.sig)?;
    let arguments = call_arguments(&injected);

    let name = item_fn.sig.ident.clone();
    item_fn.sig.ident = syn::Ident::new("body", name.span());

    Ok(quote! {
        #[test]
        fn #name() {
            #item_fn

            // Setup and cleanup share a runtime; the body gets its own so a
            // panic in it can't take the cleanup down too.
            let harness = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("test-harness")
                .worker_threads(1)
                .enable_all()
                .build()
                .expect("failed to start the harness runtime");

            #[allow(unused_variables)]
            let (client, db) = harness.block_on(async {
                let db_client = crate::db_client().await;
                let db_name = crate::database();
                let instance = crate::rocket_for_db(db_client.clone(), &db_name).await;
                let client = rocket::local::asynchronous::Client::tracked(instance)
                    .await
                    .expect("rocket failed to launch");
                (client, db_client.database(&db_name))
            });

            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                let worker = rocket::tokio::runtime::Builder::new_multi_thread()
                    .thread_name("rocket-worker-test-thread")
                    .worker_threads(1)
                    .enable_all()
                    .build()
                    .expect("failed to start the test runtime");
                worker.block_on(body(#(#arguments),*));
            }));

            harness
                .block_on(db.drop(None))
                .expect("failed to drop the test database");

            if let Err(panic) = outcome {
                std::panic::resume_unwind(panic);
            }
        }
    })
}

/// Arguments for the test body, in the order its parameters are declared.
fn call_arguments(injected: &[Injected]) -> Vec<TokenStream2> {
    injected.iter().map(Injected::argument).collect()
}

/// Check the test is `async` and work out what to pass for each parameter.
fn injections(sig: &Signature) -> syn::Result<Vec<Injected>> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut injected = Vec::with_capacity(sig.inputs.len());
    for input in &sig.inputs {
        let kind = classify(input)?;
        let repeated = match kind {
            Injected::Client => injected.contains(&Injected::Client),
            Injected::Database => injected.contains(&Injected::Database),
            Injected::Collection(_) => false,
        };
        if repeated {
            return Err(syn::Error::new(
                input.span(),
                "Test cannot take more than one `Client` or `Database`",
            ));
        }
        injected.push(kind);
    }
    Ok(injected)
}

fn classify(input: &FnArg) -> syn::Result<Injected> {
    let unsupported = || {
        syn::Error::new(
            input.span(),
            "Expected one of `client: Client`, `db: Database` or `name: Coll<T>`",
        )
    };

    let typed = match input {
        FnArg::Typed(typed) => typed,
        FnArg::Receiver(_) => return Err(unsupported()),
    };
    if !matches!(&*typed.pat, Pat::Ident(_)) {
        return Err(unsupported());
    }
    let path = match &*typed.ty {
        Type::Path(ty) => &ty.path,
        _ => return Err(unsupported()),
    };
    let last = path.segments.last().ok_or_else(unsupported)?;

    if last.ident == "Coll" {
        let generics = match &last.arguments {
            PathArguments::AngleBracketed(generics) if generics.args.len() == 1 => generics,
            _ => return Err(unsupported()),
        };
        return match generics.args.first() {
            Some(GenericArgument::Type(Type::Path(document))) => {
                Ok(Injected::Collection(document.clone()))
            }
            _ => Err(unsupported()),
        };
    }

    match last.ident.to_string().as_str() {
        "Client" if last.arguments.is_empty() => Ok(Injected::Client),
        "Database" if last.arguments.is_empty() => Ok(Injected::Database),
        _ => Err(unsupported()),
    }
}
