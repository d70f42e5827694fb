//! Perfidix Macros
//!
//! `#[bench_class]` turns an `impl` block into a registered benchmark class.
//! Methods inside the block are marked with role attributes that the macro
//! consumes:
//!
//! - `#[bench]` / `#[bench(runs = N, before_each_run = "name", ...)]`
//! - `#[before_bench_class]`, `#[after_bench_class]`
//! - `#[before_first_run]`, `#[before_each_run]`
//! - `#[after_each_run]`, `#[after_last_run]`
//! - `#[skip_bench]`

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use std::collections::HashSet;
use syn::{ImplItem, ImplItemFn, ItemImpl, parse_macro_input};

// ============================================================================
// Attribute Parsing Helpers
// ============================================================================

mod attr {
    use syn::meta::ParseNestedMeta;

    /// Get the attribute name as a string
    pub fn name(meta: &ParseNestedMeta) -> String {
        meta.path
            .get_ident()
            .map(|i| i.to_string())
            .unwrap_or_default()
    }

    /// Parse a string literal attribute: `attr = "value"`
    pub fn string(meta: &ParseNestedMeta) -> syn::Result<String> {
        let value: syn::LitStr = meta.value()?.parse()?;
        Ok(value.value())
    }

    /// Parse an integer literal attribute: `attr = 42`
    pub fn int<T>(meta: &ParseNestedMeta) -> syn::Result<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        let value: syn::LitInt = meta.value()?.parse()?;
        value.base10_parse()
    }

    /// Parse a path given as a string literal: `attr = "Self::new"`
    pub fn path(meta: &ParseNestedMeta) -> syn::Result<syn::ExprPath> {
        let value: syn::LitStr = meta.value()?.parse()?;
        value.parse()
    }

    /// Create an unknown attribute error
    pub fn unknown(meta: &ParseNestedMeta, name: &str) -> syn::Error {
        meta.error(format!("unknown attribute: {}", name))
    }
}

/// Register the methods of an `impl` block as a benchmark class
///
/// # Example
///
/// ```ignore
/// #[derive(Default)]
/// struct Sorting {
///     data: Vec<u64>,
/// }
///
/// #[perfidix::bench_class]
/// impl Sorting {
///     #[before_each_run]
///     fn fill(&mut self) {
///         self.data = (0..10_000).rev().collect();
///     }
///
///     #[bench(runs = 50)]
///     fn sort(&mut self) {
///         self.data.sort();
///     }
/// }
///
/// // Every unannotated `&self`/`&mut self` method is benchmarked 20 times,
/// // and the instance is built by `Parser::new`
/// #[perfidix::bench_class(runs = 20, constructor = "Parser::new")]
/// impl Parser { ... }
/// ```
#[proc_macro_attribute]
pub fn bench_class(args: TokenStream, item: TokenStream) -> TokenStream {
    let args = TokenStream2::from(args);
    let input = parse_macro_input!(item as ItemImpl);

    bench_class_impl(args, input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

#[derive(Default)]
struct ClassConfig {
    runs: Option<u32>,
    constructor: Option<syn::ExprPath>,
}

fn parse_class_config(args: TokenStream2) -> syn::Result<ClassConfig> {
    let mut config = ClassConfig::default();

    if args.is_empty() {
        return Ok(config);
    }

    let parser = syn::meta::parser(|meta| {
        let name = attr::name(&meta);
        match name.as_str() {
            "runs" => config.runs = Some(attr::int(&meta)?),
            "constructor" => config.constructor = Some(attr::path(&meta)?),
            _ => return Err(attr::unknown(&meta, &name)),
        }
        Ok(())
    });

    syn::parse::Parser::parse2(parser, args)?;
    Ok(config)
}

/// Role attributes consumed from methods
const ROLE_ATTRS: [&str; 8] = [
    "before_bench_class",
    "before_first_run",
    "before_each_run",
    "bench",
    "after_each_run",
    "after_last_run",
    "after_bench_class",
    "skip_bench",
];

#[derive(Default)]
struct BenchArgs {
    runs: Option<u32>,
    before_first_run: Option<String>,
    before_each_run: Option<String>,
    after_each_run: Option<String>,
    after_last_run: Option<String>,
}

fn parse_bench_args(attr: &syn::Attribute) -> syn::Result<BenchArgs> {
    let mut args = BenchArgs::default();
    if matches!(attr.meta, syn::Meta::Path(_)) {
        return Ok(args);
    }

    attr.parse_nested_meta(|meta| {
        let name = attr::name(&meta);
        match name.as_str() {
            "runs" => args.runs = Some(attr::int(&meta)?),
            "before_first_run" => args.before_first_run = Some(attr::string(&meta)?),
            "before_each_run" => args.before_each_run = Some(attr::string(&meta)?),
            "after_each_run" => args.after_each_run = Some(attr::string(&meta)?),
            "after_last_run" => args.after_last_run = Some(attr::string(&meta)?),
            _ => return Err(attr::unknown(&meta, &name)),
        }
        Ok(())
    })?;
    Ok(args)
}

/// Role attributes found on one method
#[derive(Default)]
struct Markers {
    /// `Annotation` expressions in attribute order
    annotations: Vec<TokenStream2>,
    /// Methods named as hooks by `#[bench(...)]`
    hook_names: Vec<String>,
    /// Carries a role other than `#[skip_bench]`
    has_role: bool,
    /// Carries `#[skip_bench]`
    skipped: bool,
}

/// Strip the role attributes off a method and describe them as
/// `Annotation` expressions
fn take_markers(method: &mut ImplItemFn) -> syn::Result<Markers> {
    let mut markers = Markers::default();
    let mut kept = Vec::with_capacity(method.attrs.len());

    for attr in method.attrs.drain(..) {
        let Some(ident) = attr.path().get_ident().map(|i| i.to_string()) else {
            kept.push(attr);
            continue;
        };
        if !ROLE_ATTRS.contains(&ident.as_str()) {
            kept.push(attr);
            continue;
        }
        if ident != "bench" && !matches!(attr.meta, syn::Meta::Path(_)) {
            return Err(syn::Error::new_spanned(
                &attr,
                format!("Perfidix: `#[{ident}]` takes no arguments"),
            ));
        }

        let annotation = match ident.as_str() {
            "before_bench_class" => quote! { ::perfidix::internal::Annotation::BeforeBenchClass },
            "before_first_run" => quote! { ::perfidix::internal::Annotation::BeforeFirstRun },
            "before_each_run" => quote! { ::perfidix::internal::Annotation::BeforeEachRun },
            "after_each_run" => quote! { ::perfidix::internal::Annotation::AfterEachRun },
            "after_last_run" => quote! { ::perfidix::internal::Annotation::AfterLastRun },
            "after_bench_class" => quote! { ::perfidix::internal::Annotation::AfterBenchClass },
            "skip_bench" => {
                markers.skipped = true;
                markers
                    .annotations
                    .push(quote! { ::perfidix::internal::Annotation::Skip });
                continue;
            }
            _ => {
                let args = parse_bench_args(&attr)?;
                markers.hook_names.extend(
                    [
                        &args.before_first_run,
                        &args.before_each_run,
                        &args.after_each_run,
                        &args.after_last_run,
                    ]
                    .into_iter()
                    .flatten()
                    .cloned(),
                );
                let runs = option(args.runs.map(|r| quote! { #r }));
                let hook = |name: Option<String>| option(name.map(|n| quote! { #n }));
                let before_first_run = hook(args.before_first_run);
                let before_each_run = hook(args.before_each_run);
                let after_each_run = hook(args.after_each_run);
                let after_last_run = hook(args.after_last_run);
                quote! {
                    ::perfidix::internal::Annotation::Bench(::perfidix::internal::BenchAttr {
                        runs: #runs,
                        before_first_run: #before_first_run,
                        before_each_run: #before_each_run,
                        after_each_run: #after_each_run,
                        after_last_run: #after_last_run,
                    })
                }
            }
        };
        markers.has_role = true;
        markers.annotations.push(annotation);
    }

    method.attrs = kept;
    Ok(markers)
}

fn option(value: Option<TokenStream2>) -> TokenStream2 {
    value
        .map(|v| quote! { ::core::option::Option::Some(#v) })
        .unwrap_or(quote! { ::core::option::Option::None })
}

fn bench_class_impl(args: TokenStream2, mut input: ItemImpl) -> Result<TokenStream2, syn::Error> {
    let config = parse_class_config(args)?;

    if input.trait_.is_some() {
        return Err(syn::Error::new_spanned(
            &input.self_ty,
            "Perfidix: #[bench_class] goes on an inherent impl block, not a trait impl",
        ));
    }
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Perfidix: benchmark classes cannot be generic",
        ));
    }

    let self_ty = input.self_ty.clone();
    let class_name = match &*self_ty {
        syn::Type::Path(path) => path
            .path
            .segments
            .last()
            .map(|s| s.ident.to_string())
            .unwrap_or_default(),
        other => {
            return Err(syn::Error::new_spanned(
                other,
                "Perfidix: #[bench_class] needs a named type",
            ));
        }
    };

    let mut methods = Vec::new();
    for item in &mut input.items {
        if let ImplItem::Fn(method) = item {
            let markers = take_markers(method)?;
            methods.push((method.sig.clone(), markers));
        }
    }
    let named_hooks: HashSet<&str> = methods
        .iter()
        .flat_map(|(_, m)| m.hook_names.iter().map(String::as_str))
        .collect();

    let mut wrappers = Vec::new();
    let mut method_defs = Vec::new();

    for (sig, markers) in &methods {
        let fn_name = &sig.ident;
        let fn_name_str = fn_name.to_string();
        let annotations = &markers.annotations;

        let receiver = match sig.receiver() {
            Some(r) if r.reference.is_some() && r.mutability.is_some() => {
                quote! { ::perfidix::internal::Receiver::Mut }
            }
            Some(r) if r.reference.is_some() => quote! { ::perfidix::internal::Receiver::Ref },
            // By-value `self` would consume the shared instance
            _ => quote! { ::perfidix::internal::Receiver::None },
        };
        let has_ref_receiver = sig.receiver().is_some_and(|r| r.reference.is_some());
        let params = sig.inputs.len() - usize::from(sig.receiver().is_some());

        // Entry points only for methods the engine may call; their return
        // type must implement `MethodOutcome`
        let called = markers.has_role
            || named_hooks.contains(fn_name_str.as_str())
            || (config.runs.is_some() && !markers.skipped);
        let invocable = called
            && has_ref_receiver
            && params == 0
            && sig.asyncness.is_none()
            && sig.generics.params.is_empty();

        let invoke = if invocable {
            let wrapper_name = format_ident!("__perfidix_invoke_{}", fn_name);
            wrappers.push(quote! {
                #[allow(non_snake_case)]
                fn #wrapper_name(
                    instance: &mut dyn ::core::any::Any,
                ) -> ::core::result::Result<(), ::std::string::String> {
                    match instance.downcast_mut::<#self_ty>() {
                        ::core::option::Option::Some(this) => {
                            ::perfidix::internal::MethodOutcome::into_outcome(this.#fn_name())
                        }
                        ::core::option::Option::None => ::core::result::Result::Err(
                            ::perfidix::internal::wrong_instance::<#self_ty>(),
                        ),
                    }
                }
            });
            quote! { ::core::option::Option::Some(#wrapper_name) }
        } else {
            quote! { ::core::option::Option::None }
        };

        method_defs.push(quote! {
            ::perfidix::internal::MethodDef {
                name: #fn_name_str,
                annotations: &[#(#annotations),*],
                receiver: #receiver,
                params: #params,
                invoke: #invoke,
            }
        });
    }

    let construct = match &config.constructor {
        Some(path) => quote! { #path() },
        None => quote! { <#self_ty as ::core::default::Default>::default() },
    };
    let runs = option(config.runs.map(|r| quote! { #r }));

    Ok(quote! {
        #input

        const _: () = {
            #(#wrappers)*

            fn __perfidix_instantiate() -> ::std::boxed::Box<dyn ::core::any::Any> {
                ::std::boxed::Box::new(#construct)
            }

            static __PERFIDIX_METHODS: &[::perfidix::internal::MethodDef] = &[#(#method_defs),*];

            ::perfidix::internal::inventory::submit! {
                ::perfidix::internal::ClassDef {
                    name: #class_name,
                    module_path: ::core::module_path!(),
                    runs: #runs,
                    instantiate: __perfidix_instantiate,
                    methods: __PERFIDIX_METHODS,
                }
            }
        };
    })
}
