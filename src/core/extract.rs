//! AF-003: Reference extraction from unevaluated literal trees.
//!
//! Any bare (single-segment) name mentioned anywhere in a value counts as a
//! reference, except prelude keywords and primitive/std type names. The walk
//! goes through field access, calls, indexing, unary and binary operators,
//! struct literals, blocks and comma-separated macro arguments. The result
//! over-approximates; the resolver drops names that are not resources.

use indexmap::IndexSet;
use syn::parse::ParseStream;
use syn::punctuated::Punctuated;
use syn::visit::{self, Visit};
use syn::{Expr, ExprPath, Lit, Macro, Token};

/// Names that never count as references.
const BUILTIN_NAMES: &[&str] = &[
    // prelude values and keywords
    "None", "Some", "Ok", "Err", "Default", "self", "Self", "crate", "super",
    // primitive types
    "bool", "char", "str", "u8", "u16", "u32", "u64", "u128", "usize", "i8", "i16", "i32",
    "i64", "i128", "isize", "f32", "f64",
    // std types commonly used as constructors
    "String", "Vec", "Box", "Option", "Result", "Cow", "Rc", "Arc", "HashMap", "BTreeMap",
    "HashSet", "BTreeSet", "IndexMap", "IndexSet", "LazyLock", "OnceLock", "Lazy",
];

/// Whether `name` is a keyword or primitive/std type name.
pub fn is_builtin(name: &str) -> bool {
    BUILTIN_NAMES.contains(&name)
}

/// Collect every bare name `expr` mentions, in first-mention order.
pub fn references(expr: &Expr) -> IndexSet<String> {
    let mut collector = ReferenceCollector::default();
    collector.visit_expr(expr);
    collector.names
}

#[derive(Default)]
struct ReferenceCollector {
    names: IndexSet<String>,
}

impl ReferenceCollector {
    fn record(&mut self, name: &str) {
        let name = name.strip_prefix("r#").unwrap_or(name);
        if !name.is_empty() && !is_builtin(name) {
            self.names.insert(name.to_string());
        }
    }
}

impl<'ast> Visit<'ast> for ReferenceCollector {
    fn visit_expr_path(&mut self, node: &'ast ExprPath) {
        if node.qself.is_none() && node.path.leading_colon.is_none() {
            if let Some(ident) = node.path.get_ident() {
                self.record(&ident.to_string());
            }
        }
        visit::visit_expr_path(self, node);
    }

    fn visit_macro(&mut self, node: &'ast Macro) {
        if let Ok(args) = node.parse_body_with(Punctuated::<Expr, Token![,]>::parse_terminated) {
            for arg in &args {
                if let Expr::Lit(lit) = arg {
                    if let Lit::Str(s) = &lit.lit {
                        for name in inline_captures(&s.value()) {
                            self.record(&name);
                        }
                    }
                }
                self.visit_expr(arg);
            }
        } else if let Ok((item, len)) = node.parse_body_with(parse_repeat) {
            self.visit_expr(&item);
            self.visit_expr(&len);
        }
    }
}

/// `X; n` as in `vec![X; n]`.
pub(crate) fn parse_repeat(input: ParseStream) -> syn::Result<(Expr, Expr)> {
    let item: Expr = input.parse()?;
    input.parse::<Token![;]>()?;
    let len: Expr = input.parse()?;
    Ok((item, len))
}

/// Identifiers captured inline by a format string: `{NAME}` or `{NAME:?}`.
pub fn inline_captures(format: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = format;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        if after.starts_with('{') {
            rest = &after[1..];
            continue;
        }
        let Some(close) = after.find('}') else {
            break;
        };
        let inner = &after[..close];
        let name = inner.split(':').next().unwrap_or("").trim();
        if is_identifier(name) {
            names.push(name.to_string());
        }
        rest = &after[close + 1..];
    }
    names
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    s != "_" && chars.all(|c| c.is_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs(src: &str) -> Vec<String> {
        let expr: Expr = syn::parse_str(src).unwrap();
        references(&expr).into_iter().collect()
    }

    #[test]
    fn test_af003_nested_field() {
        let names = refs("web::Site { properties: SiteProperties { server_farm_id: PLAN.id() } }");
        assert_eq!(names, vec!["PLAN"]);
    }

    #[test]
    fn test_af003_builtins_excluded() {
        let names = refs("Account { tags: None, kind: Some(String::from(\"x\")), n: 3u32 as usize }");
        assert!(names.is_empty(), "{:?}", names);
    }

    #[test]
    fn test_af003_duplicates_collapse() {
        let names = refs("[VNET, VNET, &VNET, VNET.name]");
        assert_eq!(names, vec!["VNET"]);
    }

    #[test]
    fn test_af003_operators_and_groups() {
        let names = refs("(PREFIX + SUFFIX)[IDX..END] == !FLAG");
        assert_eq!(names, vec!["PREFIX", "SUFFIX", "IDX", "END", "FLAG"]);
    }

    #[test]
    fn test_af003_call_arguments() {
        let names = refs("concat(NAME, parameters(\"env\"))");
        assert_eq!(names, vec!["concat", "NAME", "parameters"]);
    }

    #[test]
    fn test_af003_qualified_paths_ignored() {
        let names = refs("network::Subnet { kind: Sku::Standard, base: ::other::X }");
        assert!(names.is_empty(), "{:?}", names);
    }

    #[test]
    fn test_af003_shorthand_and_rest() {
        let names = refs("Account { location, ..BASE }");
        assert_eq!(names, vec!["location", "BASE"]);
    }

    #[test]
    fn test_af003_macro_arguments() {
        let names = refs("vec![SUBNET_A, SUBNET_B]");
        assert_eq!(names, vec!["SUBNET_A", "SUBNET_B"]);
        let names = refs("format!(\"{PREFIX}-{}\", ENV)");
        assert_eq!(names, vec!["PREFIX", "ENV"]);
        let names = refs("vec![RULE; 3]");
        assert_eq!(names, vec!["RULE"]);
    }

    #[test]
    fn test_af003_raw_identifier() {
        let names = refs("r#type");
        assert_eq!(names, vec!["type"]);
    }

    #[test]
    fn test_af003_inline_captures() {
        assert_eq!(inline_captures("{a}-{b:?}-{{c}}-{}-{0}"), vec!["a", "b"]);
    }
}
