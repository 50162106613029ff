use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, punctuated::Punctuated, spanned::Spanned, FnArg, Ident, ItemFn, Pat,
    Signature, Token, Type,
};

/// Transform an asynchronous test into a synchronous one running against a
/// fresh store, and inject dependencies.
///
/// Injectable dependencies are [`rocket::local::asynchronous::Client`] and
/// [`crate::store::Store`]. Passing `admin` or `voter` signs the client in
/// before the test body runs.
///
/// By default the store is in memory. Passing `mongodb` runs the test against
/// a throwaway database on the replica set named by `LIVEVOTE_TEST_DB_URI`
/// instead, and skips the test if that variable is unset. The database is
/// dropped whether or not the test passes, and any panic is then rethrown.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);
    let args = parse_macro_input!(args with Punctuated::<Ident, Token![,]>::parse_terminated);

    // Extract type information and reject invalid function signatures.
    let test_args = match check_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    let mut login = None;
    let mut mongodb = false;
    for arg in args {
        if arg == "mongodb" && !mongodb {
            mongodb = true;
        } else if (arg == "admin" || arg == "voter") && login.is_none() {
            login = Some(arg);
        } else {
            return syn::Error::new(
                arg.span(),
                "Expected at most one of `admin` or `voter`, and optionally `mongodb`",
            )
            .into_compile_error()
            .into();
        }
    }

    // Log in the client as admin/voter if needed.
    let maybe_login = match login {
        Some(arg) if arg == "admin" => quote! {
            let response = rocket_client
                .post("/api/auth/admin")
                .header(rocket::http::ContentType::JSON)
                .body(rocket::serde::json::json!(crate::model::api::admin::AdminCredentials::example()).to_string())
                .dispatch()
                .await;
            assert_eq!(rocket::http::Status::Ok, response.status(), "admin login failed");
        },
        Some(_) => quote! {
            let response = rocket_client
                .post("/api/auth/register")
                .header(rocket::http::ContentType::JSON)
                .body(rocket::serde::json::json!(crate::model::api::voter::RegistrationRequest::example()).to_string())
                .dispatch()
                .await;
            assert!(response.status().class().is_success(), "voter login failed");
        },
        None => quote! {},
    };

    // Run the test, against the right store.
    let run = quote! {
        runtime.block_on(async {
            #[allow(unused_variables)]
            let store = store.clone();
            #[allow(unused_variables)]
            let rocket_client = setup(store.clone()).await;
            #new_name(#(#test_args),*).await;
        })
    };
    let body = if mongodb {
        quote! {
            let Ok(uri) = std::env::var("LIVEVOTE_TEST_DB_URI") else {
                eprintln!("skipping {}: LIVEVOTE_TEST_DB_URI is not set", stringify!(#name));
                return;
            };
            let db_name = format!("livevote_test_{}", crate::model::mongodb::Id::new());
            let store: crate::store::Store = std::sync::Arc::new(
                runtime
                    .block_on(crate::store::MongoStore::connect(&uri, &db_name))
                    .unwrap(),
            );

            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| #run));

            runtime.block_on(async {
                mongodb::Client::with_uri_str(&uri)
                    .await
                    .unwrap()
                    .database(&db_name)
                    .drop(None)
                    .await
                    .unwrap();
            });

            if let Err(cause) = result {
                std::panic::resume_unwind(cause);
            }
        }
    } else {
        quote! {
            let store: crate::store::Store =
                std::sync::Arc::new(crate::store::MemoryStore::new());
            #run;
        }
    };

    // Rewrite the test function.
    quote! {
        #[test]
        fn #name() {
            /// Test setup.
            async fn setup(store: crate::store::Store) -> rocket::local::asynchronous::Client {
                let rocket_client =
                    rocket::local::asynchronous::Client::tracked(crate::rocket_for_store(store))
                        .await
                        .unwrap();

                {
                    #maybe_login
                }

                rocket_client
            }

            /// The test itself.
            #item_fn

            let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(2)
                .enable_all()
                .build()
                .unwrap();

            #body
        }
    }
    .into()
}

/// Ensure the wrapped test is async, extract parameters to inject, and reject unknown parameters.
fn check_sig(sig: Signature) -> Result<Vec<TokenStream2>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut has_client = false;
    let mut has_store = false;
    let mut args = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let (Pat::Ident(_), Type::Path(type_path)) = (&*pat_type.pat, &*pat_type.ty) {
                if let Some(type_ident) = type_path.path.get_ident() {
                    if type_ident == "Client" {
                        if has_client {
                            return Err(syn::Error::new(input.span(), "Test cannot accept more than one `rocket::local::asynchronous::Client`"));
                        }
                        has_client = true;
                        args.push(quote! { rocket_client });
                        continue;
                    } else if type_ident == "Store" {
                        if has_store {
                            return Err(syn::Error::new(
                                input.span(),
                                "Test cannot accept more than one `Store`",
                            ));
                        }
                        has_store = true;
                        args.push(quote! { store });
                        continue;
                    }
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected one of `client_ident: Client` or `store_ident: Store`",
        ));
    }

    Ok(args)
}
