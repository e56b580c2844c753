//! AF-010: Static lowering of unevaluated literal trees.
//!
//! Turns a resource's `syn::Expr` into a [`Literal`] without running any
//! code. Records, lists, maps and scalars map one-to-one; references to
//! other resources, parameters and variables become [`Builtin`] expressions;
//! non-resource bindings are inlined. Anything else is opaque and is
//! skipped when the literal is serialized.

use super::catalog::ResourceKind;
use super::expression::{Arg, Builtin};
use super::extract::parse_repeat;
use super::types::{Binding, DiscoveredResource};
use quote::ToTokens;
use serde::ser::{self, Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::Number;
use std::collections::HashMap;
use syn::punctuated::Punctuated;
use syn::{BinOp, Expr, Lit, Member, Stmt, Token, UnOp};
use tracing::trace;

/// Longest `vec![x; n]` expanded literally.
const MAX_REPEAT: u64 = 1024;

/// Maximum binding/name inlining depth.
const MAX_DEPTH: usize = 32;

/// A statically lowered value.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Unset,
    Bool(bool),
    Number(Number),
    Str(String),
    List(Vec<Literal>),
    Map(Vec<(String, Literal)>),
    Record(Vec<(String, Literal)>),
    Expr(Builtin),
    /// Source text of something that cannot be lowered
    Opaque(String),
}

impl Literal {
    /// Unset, or a collection with nothing to emit.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Unset => true,
            Self::List(items) => items.iter().all(Literal::is_empty),
            Self::Map(entries) | Self::Record(entries) => entries.iter().all(|(_, v)| v.is_empty()),
            _ => false,
        }
    }

    fn field(&self, key: &str) -> Option<&Literal> {
        match self {
            Self::Record(entries) | Self::Map(entries) => {
                entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
            }
            _ => None,
        }
    }

    fn into_arg(self) -> Option<Arg> {
        match self {
            Self::Str(s) => Some(Arg::Str(s)),
            Self::Number(n) => Some(Arg::Str(n.to_string())),
            Self::Bool(b) => Some(Arg::Str(b.to_string())),
            Self::Expr(e) => Some(Arg::from(e)),
            _ => None,
        }
    }
}

impl Serialize for Literal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Unset => serializer.serialize_none(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => n.serialize(serializer),
            Self::Str(s) => serializer.serialize_str(s),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(None)?;
                for item in items.iter().filter(|i| !i.is_empty()) {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(entries) | Self::Record(entries) => {
                let mut map = serializer.serialize_map(None)?;
                for (key, value) in entries.iter().filter(|(_, v)| !v.is_empty()) {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Self::Expr(e) => e.serialize(serializer),
            Self::Opaque(src) => Err(ser::Error::custom(format!("cannot lower `{}`", src))),
        }
    }
}

/// `server_farm_id` → `serverFarmId`; `r#type` → `type`.
pub fn external_key(field: &str) -> String {
    let field = field.strip_prefix("r#").unwrap_or(field).trim_start_matches('_');
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = !out.is_empty();
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Names visible to lowering for one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct SynthContext<'a> {
    resources: HashMap<&'a str, &'a DiscoveredResource>,
    bindings: HashMap<&'a str, &'a Binding>,
}

impl<'a> SynthContext<'a> {
    pub fn new(resources: &'a [DiscoveredResource], bindings: &'a [Binding]) -> Self {
        Self {
            resources: resources.iter().map(|r| (r.name.as_str(), r)).collect(),
            bindings: bindings.iter().map(|b| (b.name.as_str(), b)).collect(),
        }
    }

    /// Lower a resource's value.
    pub fn lower_resource(&self, resource: &DiscoveredResource) -> Literal {
        let mut lowerer = Lowerer::new(self);
        lowerer.stack.push(resource.name.clone());
        lowerer.lower(&resource.value)
    }

    /// Lower an arbitrary expression against this context.
    pub fn lower(&self, expr: &Expr) -> Literal {
        Lowerer::new(self).lower(expr)
    }

    /// Name a resource goes by in the document.
    pub fn external_name(&self, name: &str) -> Arg {
        Lowerer::new(self).external_name(name)
    }

    /// `resourceId(..)` for a resource, if `name` is one.
    pub fn resource_id(&self, name: &str) -> Option<Builtin> {
        let kind = self.resources.get(name)?.kind;
        Some(Builtin::resource_id(kind, self.external_name(name)))
    }
}

struct Lowerer<'c, 'a> {
    ctx: &'c SynthContext<'a>,
    stack: Vec<String>,
}

impl<'c, 'a> Lowerer<'c, 'a> {
    fn new(ctx: &'c SynthContext<'a>) -> Self {
        Self {
            ctx,
            stack: Vec::new(),
        }
    }

    fn enter(&mut self, name: &str) -> bool {
        if self.stack.len() >= MAX_DEPTH || self.stack.iter().any(|n| n == name) {
            trace!(name = %name, "recursive inline skipped");
            return false;
        }
        self.stack.push(name.to_string());
        true
    }

    fn external_name(&mut self, name: &str) -> Arg {
        let fallback = Arg::Str(name.to_string());
        let Some(resource) = self.ctx.resources.get(name) else {
            return fallback;
        };
        let Expr::Struct(s) = &resource.value else {
            return fallback;
        };
        let Some(field) = s.fields.iter().find(|f| member_name(&f.member) == "name") else {
            return fallback;
        };
        let key = format!("{}#name", name);
        if !self.enter(&key) {
            return fallback;
        }
        let lowered = self.lower(&field.expr);
        self.stack.pop();
        lowered.into_arg().unwrap_or(fallback)
    }

    fn kind_of(&self, name: &str) -> Option<ResourceKind> {
        self.ctx.resources.get(name).map(|r| r.kind)
    }

    fn lower(&mut self, expr: &Expr) -> Literal {
        match expr {
            Expr::Lit(l) => lower_lit(&l.lit),
            Expr::Struct(s) => {
                let mut fields: Vec<(String, Literal)> = s
                    .fields
                    .iter()
                    .map(|f| (external_key(&member_name(&f.member)), self.lower(&f.expr)))
                    .collect();
                if let Some(rest) = &s.rest {
                    if let Literal::Record(base) | Literal::Map(base) = self.lower(rest) {
                        for (key, value) in base {
                            if !fields.iter().any(|(k, _)| *k == key) {
                                fields.push((key, value));
                            }
                        }
                    }
                }
                Literal::Record(fields)
            }
            Expr::Path(p) => self.lower_path(p),
            Expr::Call(c) => self.lower_call(c),
            Expr::MethodCall(m) => self.lower_method(m),
            Expr::Field(f) => self.lower_field(f),
            Expr::Array(a) => Literal::List(a.elems.iter().map(|e| self.lower(e)).collect()),
            Expr::Tuple(t) => Literal::List(t.elems.iter().map(|e| self.lower(e)).collect()),
            Expr::Macro(m) => self.lower_macro(&m.mac),
            Expr::Reference(r) => self.lower(&r.expr),
            Expr::Paren(p) => self.lower(&p.expr),
            Expr::Group(g) => self.lower(&g.expr),
            Expr::Cast(c) => self.lower(&c.expr),
            Expr::Block(b) => match b.block.stmts.last() {
                Some(Stmt::Expr(inner, None)) => self.lower(inner),
                _ => opaque(expr),
            },
            Expr::Unary(u) if matches!(u.op, UnOp::Neg(_)) => match self.lower(&u.expr) {
                Literal::Number(n) => negate(&n).map(Literal::Number).unwrap_or_else(|| opaque(expr)),
                _ => opaque(expr),
            },
            Expr::Unary(u) if matches!(u.op, UnOp::Deref(_)) => self.lower(&u.expr),
            Expr::Binary(b) if matches!(b.op, BinOp::Add(_)) => {
                let left = self.lower(&b.left);
                let right = self.lower(&b.right);
                concat_pieces(vec![left, right]).unwrap_or_else(|| opaque(expr))
            }
            _ => opaque(expr),
        }
    }

    fn lower_path(&mut self, p: &syn::ExprPath) -> Literal {
        if p.qself.is_some() {
            return Literal::Opaque(p.to_token_stream().to_string());
        }
        if let Some(ident) = p.path.get_ident() {
            let name = ident.to_string();
            let name = name.strip_prefix("r#").unwrap_or(&name);
            if name == "None" {
                return Literal::Unset;
            }
            if let Some(kind) = self.kind_of(name) {
                return Literal::Expr(Builtin::resource_id(kind, self.external_name(name)));
            }
            if let Some(binding) = self.ctx.bindings.get(name) {
                if !self.enter(name) {
                    return Literal::Opaque(name.to_string());
                }
                let lowered = self.lower(&binding.value);
                self.stack.pop();
                return lowered;
            }
            return Literal::Opaque(name.to_string());
        }
        // Unit enum variant, e.g. `Sku::StandardLrs`.
        match p.path.segments.last() {
            Some(last) if p.path.segments.len() > 1 && is_variant_like(&last.ident.to_string()) => {
                Literal::Str(last.ident.to_string())
            }
            _ => Literal::Opaque(p.to_token_stream().to_string()),
        }
    }

    fn lower_call(&mut self, c: &syn::ExprCall) -> Literal {
        let Expr::Path(func) = c.func.as_ref() else {
            return opaque_call(c);
        };
        let segments: Vec<String> = func
            .path
            .segments
            .iter()
            .map(|s| s.ident.to_string())
            .collect();
        let args: Vec<&Expr> = c.args.iter().collect();
        let last = segments.last().map(String::as_str).unwrap_or("");
        let owner = segments
            .len()
            .checked_sub(2)
            .map(|i| segments[i].as_str());

        match (owner, last, args.as_slice()) {
            (None, "Some", [inner]) => self.lower(inner),
            (_, "parameters" | "parameter", [name]) => match string_lit(name) {
                Some(n) => Literal::Expr(Builtin::Parameter(n)),
                None => opaque_call(c),
            },
            (_, "variables" | "variable", [name]) => match string_lit(name) {
                Some(n) => Literal::Expr(Builtin::Variable(n)),
                None => opaque_call(c),
            },
            (_, "concat", _) => {
                let pieces = args.iter().map(|a| self.lower(a)).collect();
                concat_pieces(pieces).unwrap_or_else(|| opaque_call(c))
            }
            (Some("BTreeMap" | "HashMap" | "IndexMap"), "from", [entries]) => {
                self.lower_map_entries(entries).unwrap_or_else(|| opaque_call(c))
            }
            (Some(_), "from" | "new", [inner]) => self.lower(inner),
            (Some("From" | "Into"), _, [inner]) => self.lower(inner),
            (_, "default" | "new", []) => Literal::Unset,
            _ => opaque_call(c),
        }
    }

    fn lower_map_entries(&mut self, entries: &Expr) -> Option<Literal> {
        let Expr::Array(array) = entries else {
            return None;
        };
        let mut out = Vec::with_capacity(array.elems.len());
        for elem in &array.elems {
            let Expr::Tuple(pair) = elem else {
                return None;
            };
            if pair.elems.len() != 2 {
                return None;
            }
            let key = match self.lower(&pair.elems[0]) {
                Literal::Str(s) => s,
                Literal::Number(n) => n.to_string(),
                _ => return None,
            };
            out.push((key, self.lower(&pair.elems[1])));
        }
        Some(Literal::Map(out))
    }

    fn lower_method(&mut self, m: &syn::ExprMethodCall) -> Literal {
        let method = m.method.to_string();
        if m.args.is_empty() {
            if let Some(root) = resource_root(&m.receiver) {
                if let Some(kind) = self.kind_of(&root) {
                    let name = self.external_name(&root);
                    return match method.as_str() {
                        "id" => Literal::Expr(Builtin::resource_id(kind, name)),
                        "name" => name_literal(name),
                        "reference" => Literal::Expr(Builtin::Reference {
                            kind,
                            name,
                            path: Vec::new(),
                        }),
                        _ => Literal::Opaque(m.to_token_stream().to_string()),
                    };
                }
            }
        }
        match method.as_str() {
            "to_string" | "to_owned" | "into" | "clone" | "to_vec" | "as_str" | "as_ref"
            | "as_slice" | "iter" | "into_iter" | "cloned" | "copied" | "collect"
                if m.args.is_empty() =>
            {
                self.lower(&m.receiver)
            }
            _ => Literal::Opaque(m.to_token_stream().to_string()),
        }
    }

    fn lower_field(&mut self, f: &syn::ExprField) -> Literal {
        let mut path = vec![member_name(&f.member)];
        let mut base = f.base.as_ref();
        while let Expr::Field(inner) = base {
            path.push(member_name(&inner.member));
            base = inner.base.as_ref();
        }
        path.reverse();

        let Some(root) = resource_root(base) else {
            return Literal::Opaque(f.to_token_stream().to_string());
        };

        if let Some(kind) = self.kind_of(&root) {
            let name = self.external_name(&root);
            return match path.as_slice() {
                [only] if only == "name" => name_literal(name),
                [only] if only == "id" => Literal::Expr(Builtin::resource_id(kind, name)),
                _ => {
                    let mut keys: Vec<String> = path.iter().map(|p| external_key(p)).collect();
                    if keys.first().map(String::as_str) == Some("properties") {
                        keys.remove(0);
                    }
                    Literal::Expr(Builtin::Reference {
                        kind,
                        name,
                        path: keys,
                    })
                }
            };
        }

        // Navigate into an inlined binding.
        let mut current = self.lower(base);
        for segment in &path {
            current = match current.field(&external_key(segment)) {
                Some(next) => next.clone(),
                None => return Literal::Opaque(f.to_token_stream().to_string()),
            };
        }
        current
    }

    fn lower_macro(&mut self, mac: &syn::Macro) -> Literal {
        let name = mac
            .path
            .segments
            .last()
            .map(|s| s.ident.to_string())
            .unwrap_or_default();
        match name.as_str() {
            "vec" => {
                if let Ok(items) = mac.parse_body_with(Punctuated::<Expr, Token![,]>::parse_terminated) {
                    return Literal::List(items.iter().map(|e| self.lower(e)).collect());
                }
                if let Ok((item, len)) = mac.parse_body_with(parse_repeat) {
                    if let Literal::Number(n) = self.lower(&len) {
                        if let Some(n) = n.as_u64().filter(|&n| n <= MAX_REPEAT) {
                            let one = self.lower(&item);
                            return Literal::List((0..n).map(|_| one.clone()).collect());
                        }
                    }
                }
                Literal::Opaque(mac.to_token_stream().to_string())
            }
            "format" => self
                .lower_format(mac)
                .unwrap_or_else(|| Literal::Opaque(mac.to_token_stream().to_string())),
            _ => Literal::Opaque(mac.to_token_stream().to_string()),
        }
    }

    /// `format!` with `{}`, `{0}`, `{name}` and `name = expr` arguments.
    fn lower_format(&mut self, mac: &syn::Macro) -> Option<Literal> {
        let args = mac
            .parse_body_with(Punctuated::<Expr, Token![,]>::parse_terminated)
            .ok()?;
        let mut args = args.into_iter();
        let template = string_lit(&args.next()?)?;

        let mut positional = Vec::new();
        let mut named = HashMap::new();
        for arg in args {
            match arg {
                Expr::Assign(a) => {
                    let Expr::Path(p) = a.left.as_ref() else {
                        return None;
                    };
                    named.insert(p.path.get_ident()?.to_string(), *a.right);
                }
                other => positional.push(other),
            }
        }

        let mut pieces = Vec::new();
        let mut text = String::new();
        let mut next_positional = 0;
        let mut chars = template.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    text.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    text.push('}');
                }
                '{' => {
                    let mut placeholder = String::new();
                    for c in chars.by_ref() {
                        if c == '}' {
                            break;
                        }
                        placeholder.push(c);
                    }
                    let selector = placeholder.split(':').next().unwrap_or("").trim().to_string();
                    let value = if selector.is_empty() {
                        let expr = positional.get(next_positional)?.clone();
                        next_positional += 1;
                        self.lower(&expr)
                    } else if let Ok(i) = selector.parse::<usize>() {
                        let expr = positional.get(i)?.clone();
                        self.lower(&expr)
                    } else if let Some(expr) = named.get(&selector).cloned() {
                        self.lower(&expr)
                    } else {
                        let ident: syn::Ident = syn::parse_str(&selector).ok()?;
                        self.lower(&Expr::Path(syn::ExprPath {
                            attrs: Vec::new(),
                            qself: None,
                            path: ident.into(),
                        }))
                    };
                    if !text.is_empty() {
                        pieces.push(Literal::Str(std::mem::take(&mut text)));
                    }
                    pieces.push(value);
                }
                other => text.push(other),
            }
        }
        if !text.is_empty() || pieces.is_empty() {
            pieces.push(Literal::Str(text));
        }
        concat_pieces(pieces)
    }
}

/// Join string-like pieces: a plain string when every piece is static,
/// `concat(..)` as soon as one is an expression.
fn concat_pieces(pieces: Vec<Literal>) -> Option<Literal> {
    let mut args: Vec<Arg> = Vec::new();
    for piece in pieces {
        match piece {
            Literal::Expr(Builtin::Concat(inner)) => args.extend(inner),
            other => args.push(other.into_arg()?),
        }
    }
    // merge adjacent static strings
    let mut merged: Vec<Arg> = Vec::with_capacity(args.len());
    for arg in args {
        match (merged.last_mut(), arg) {
            (Some(Arg::Str(prev)), Arg::Str(next)) => prev.push_str(&next),
            (_, arg) => merged.push(arg),
        }
    }
    match merged.as_slice() {
        [] => Some(Literal::Str(String::new())),
        [Arg::Str(s)] => Some(Literal::Str(s.clone())),
        [Arg::Expr(e)] => Some(Literal::Expr((**e).clone())),
        _ => Some(Literal::Expr(Builtin::Concat(merged))),
    }
}

fn name_literal(name: Arg) -> Literal {
    match name {
        Arg::Str(s) => Literal::Str(s),
        Arg::Expr(e) => Literal::Expr(*e),
    }
}

fn lower_lit(lit: &Lit) -> Literal {
    match lit {
        Lit::Str(s) => Literal::Str(s.value()),
        Lit::Char(c) => Literal::Str(c.value().to_string()),
        Lit::Bool(b) => Literal::Bool(b.value),
        Lit::Int(i) => i
            .base10_parse::<i64>()
            .map(|n| Literal::Number(n.into()))
            .or_else(|_| i.base10_parse::<u64>().map(|n| Literal::Number(n.into())))
            .unwrap_or_else(|_| Literal::Opaque(i.to_string())),
        Lit::Float(f) => f
            .base10_parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Literal::Number)
            .unwrap_or_else(|| Literal::Opaque(f.to_string())),
        other => Literal::Opaque(other.to_token_stream().to_string()),
    }
}

fn negate(n: &Number) -> Option<Number> {
    if let Some(i) = n.as_i64() {
        return i.checked_neg().map(Number::from);
    }
    n.as_f64().and_then(|f| Number::from_f64(-f))
}

fn string_lit(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Lit(l) => match &l.lit {
            Lit::Str(s) => Some(s.value()),
            _ => None,
        },
        Expr::Reference(r) => string_lit(&r.expr),
        Expr::Paren(p) => string_lit(&p.expr),
        _ => None,
    }
}

/// Root identifier of `X`, `&X`, `X.clone()`.
fn resource_root(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Path(p) if p.qself.is_none() => {
            let ident = p.path.get_ident()?.to_string();
            Some(ident.strip_prefix("r#").map(str::to_string).unwrap_or(ident))
        }
        Expr::Reference(r) => resource_root(&r.expr),
        Expr::Paren(p) => resource_root(&p.expr),
        _ => None,
    }
}

fn member_name(member: &Member) -> String {
    match member {
        Member::Named(ident) => {
            let s = ident.to_string();
            s.strip_prefix("r#").map(str::to_string).unwrap_or(s)
        }
        Member::Unnamed(index) => index.index.to_string(),
    }
}

fn is_variant_like(ident: &str) -> bool {
    ident.chars().next().is_some_and(char::is_uppercase) && ident.chars().any(char::is_lowercase)
}

fn opaque(expr: &Expr) -> Literal {
    let src = expr.to_token_stream().to_string();
    trace!(expr = %src, "opaque literal");
    Literal::Opaque(src)
}

fn opaque_call(c: &syn::ExprCall) -> Literal {
    opaque(&Expr::Call(c.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::synth::to_value;
    use crate::core::types::SourceLocation;
    use serde_json::json;

    fn resource(name: &str, kind: ResourceKind, src: &str) -> DiscoveredResource {
        let value: Expr = syn::parse_str(src).unwrap();
        DiscoveredResource {
            name: name.to_string(),
            kind,
            location: SourceLocation::new("infra.rs", 1),
            dependencies: crate::core::extract::references(&value),
            value,
        }
    }

    fn binding(name: &str, src: &str) -> Binding {
        Binding {
            name: name.to_string(),
            location: SourceLocation::new("infra.rs", 1),
            value: syn::parse_str(src).unwrap(),
        }
    }

    fn lower_json(resources: &[DiscoveredResource], bindings: &[Binding], src: &str) -> serde_json::Value {
        let ctx = SynthContext::new(resources, bindings);
        let expr: Expr = syn::parse_str(src).unwrap();
        to_value(&ctx.lower(&expr)).unwrap_or(serde_json::Value::Null)
    }

    #[test]
    fn test_af010_external_key() {
        assert_eq!(external_key("server_farm_id"), "serverFarmId");
        assert_eq!(external_key("r#type"), "type");
        assert_eq!(external_key("httpsOnly"), "httpsOnly");
        assert_eq!(external_key("_private"), "private");
    }

    #[test]
    fn test_af010_record_scalars_and_omission() {
        let v = lower_json(
            &[],
            &[],
            r#"storage::Account {
                location: "westeurope",
                https_only: true,
                capacity: -3,
                ratio: 0.5,
                access_tier: None,
                tags: vec![],
                network_acls: Default::default(),
                sku: Sku { name: Sku::StandardLrs, tier: None },
            }"#,
        );
        assert_eq!(
            v,
            json!({
                "location": "westeurope",
                "httpsOnly": true,
                "capacity": -3,
                "ratio": 0.5,
                "sku": { "name": "StandardLrs" }
            })
        );
    }

    #[test]
    fn test_af010_resource_reference_renders_id() {
        let plan = resource("PLAN", ResourceKind::AppServicePlan, r#"web::ServerFarm { name: "plan-prod" }"#);
        let v = lower_json(
            &[plan],
            &[],
            "web::Site { properties: SiteProperties { server_farm_id: PLAN.id(), farm: &PLAN, farm_name: PLAN.name } }",
        );
        assert_eq!(
            v["properties"]["serverFarmId"],
            "[resourceId('Microsoft.Web/serverfarms', 'plan-prod')]"
        );
        assert_eq!(v["properties"]["farm"], v["properties"]["serverFarmId"]);
        assert_eq!(v["properties"]["farmName"], "plan-prod");
    }

    #[test]
    fn test_af010_reference_property_path() {
        let st = resource("LOGS", ResourceKind::StorageAccount, "storage::Account {}");
        let v = lower_json(&[st], &[], "X { endpoint: LOGS.properties.primary_endpoints.blob }");
        assert_eq!(
            v["endpoint"],
            "[reference(resourceId('Microsoft.Storage/storageAccounts', 'LOGS'), '2023-01-01').primaryEndpoints.blob]"
        );
    }

    #[test]
    fn test_af010_parameters_variables_concat() {
        let v = lower_json(
            &[],
            &[],
            r#"X {
                location: parameters("location"),
                prefix: variable("prefix"),
                name: concat(parameters("env"), "-app"),
                plain: concat("a", "b"),
                sum: String::from("x") + "y",
            }"#,
        );
        assert_eq!(v["location"], "[parameters('location')]");
        assert_eq!(v["prefix"], "[variables('prefix')]");
        assert_eq!(v["name"], "[concat(parameters('env'), '-app')]");
        assert_eq!(v["plain"], "ab");
        assert_eq!(v["sum"], "xy");
    }

    #[test]
    fn test_af010_format_macro() {
        let b = binding("ENV", "\"prod\"");
        let v = lower_json(
            &[],
            &[b],
            r#"X {
                a: format!("{}-{ENV}-{{x}}", "app"),
                b: format!("{p}-{0}", parameters("region"), p = "web"),
            }"#,
        );
        assert_eq!(v["a"], "app-prod-{x}");
        assert_eq!(v["b"], "[concat('web-', parameters('region'))]");
    }

    #[test]
    fn test_af010_bindings_inline_and_rest() {
        let loc = binding("LOCATION", "\"eastus\"");
        let base = binding("BASE", "Common { location: LOCATION, kind: \"StorageV2\" }");
        let v = lower_json(
            &[],
            &[loc, base],
            "storage::Account { kind: \"BlobStorage\", region: BASE.location, ..BASE }",
        );
        assert_eq!(
            v,
            json!({ "kind": "BlobStorage", "region": "eastus", "location": "eastus" })
        );
    }

    #[test]
    fn test_af010_recursive_binding_guarded() {
        let a = binding("A", "B");
        let b = binding("B", "A");
        let v = lower_json(&[], &[a, b], "X { loop_field: A, ok: 1 }");
        assert_eq!(v, json!({ "ok": 1 }));
    }

    #[test]
    fn test_af010_maps_and_lists() {
        let v = lower_json(
            &[],
            &[],
            r#"X {
                tags: BTreeMap::from([("env", "prod"), ("team", String::from("core"))]),
                ports: vec![80, 443],
                zones: ["1", "2"].to_vec(),
                pair: ("a", 1),
                repeated: vec!["x"; 2],
            }"#,
        );
        assert_eq!(v["tags"], json!({ "env": "prod", "team": "core" }));
        assert_eq!(v["ports"], json!([80, 443]));
        assert_eq!(v["zones"], json!(["1", "2"]));
        assert_eq!(v["pair"], json!(["a", 1]));
        assert_eq!(v["repeated"], json!(["x", "x"]));
    }

    #[test]
    fn test_af010_opaque_fields_skipped() {
        let v = lower_json(&[], &[], "X { computed: compute_name(), unknown: SOMETHING, kept: 'c' }");
        assert_eq!(v, json!({ "kept": "c" }));
    }

    #[test]
    fn test_af010_record_of_opaque_fields_omitted() {
        let v = lower_json(
            &[],
            &[],
            "X { acl: Acl { rule: compute(), source: UNKNOWN }, tags: BTreeMap::from([(\"a\", f())]), ok: 1 }",
        );
        assert_eq!(v, json!({ "ok": 1 }));
    }

    #[test]
    fn test_af010_external_name_from_parameter() {
        let kv = resource("KV", ResourceKind::KeyVault, "keyvault::Vault { name: parameters(\"vaultName\") }");
        let ctx = SynthContext::new(std::slice::from_ref(&kv), &[]);
        let id = ctx.resource_id("KV").unwrap();
        assert_eq!(
            crate::core::expression::Expression::render(&id),
            "[resourceId('Microsoft.KeyVault/vaults', parameters('vaultName'))]"
        );
        assert!(ctx.resource_id("NOPE").is_none());
    }

    #[test]
    fn test_af010_self_referencing_name_guarded() {
        let r = resource("SELF", ResourceKind::StorageAccount, "storage::Account { name: SELF.name }");
        let ctx = SynthContext::new(std::slice::from_ref(&r), &[]);
        assert_eq!(ctx.external_name("SELF"), Arg::str("SELF"));
    }
}
