//! AF-008: Expression values: render as ARM functions, not structure.
//!
//! A type with the [`Expression`] capability serializes as a newtype struct
//! under [`EXPRESSION_MARKER`]. The fragment serializer checks for the marker
//! before any structural conversion, at every depth, and emits the rendered
//! `"[...]"` string. Plain serde formats see the same string.

use super::catalog::ResourceKind;
use serde::{Serialize, Serializer};

/// Reserved newtype-struct name that marks an expression value.
pub const EXPRESSION_MARKER: &str = "$armforge::Expression";

/// Capability: render as a provider function call.
pub trait Expression {
    /// The call without brackets, e.g. `parameters('location')`.
    fn call(&self) -> String;

    /// The template string, e.g. `[parameters('location')]`.
    fn render(&self) -> String {
        format!("[{}]", self.call())
    }
}

/// Serialize an expression through the marker. Use from `Serialize` impls.
pub fn serialize_expression<E, S>(expr: &E, serializer: S) -> Result<S::Ok, S::Error>
where
    E: Expression + ?Sized,
    S: Serializer,
{
    serializer.serialize_newtype_struct(EXPRESSION_MARKER, &expr.render())
}

/// Argument to a provider function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    Str(String),
    Expr(Box<Builtin>),
}

impl Arg {
    pub fn str(s: impl Into<String>) -> Self {
        Self::Str(s.into())
    }

    fn render(&self) -> String {
        match self {
            Self::Str(s) => quote(s),
            Self::Expr(e) => e.call(),
        }
    }
}

impl From<Builtin> for Arg {
    fn from(expr: Builtin) -> Self {
        Self::Expr(Box::new(expr))
    }
}

/// Built-in expression values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Builtin {
    /// `parameters('name')`
    Parameter(String),
    /// `variables('name')`
    Variable(String),
    /// `resourceId('Provider/type', name)`
    ResourceId { kind: ResourceKind, name: Arg },
    /// `reference(resourceId(..), 'apiVersion').path`
    Reference {
        kind: ResourceKind,
        name: Arg,
        path: Vec<String>,
    },
    /// `concat(a, b, ...)`
    Concat(Vec<Arg>),
}

impl Builtin {
    pub fn resource_id(kind: ResourceKind, name: impl Into<Arg>) -> Self {
        Self::ResourceId {
            kind,
            name: name.into(),
        }
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl Expression for Builtin {
    fn call(&self) -> String {
        match self {
            Self::Parameter(name) => format!("parameters({})", quote(name)),
            Self::Variable(name) => format!("variables({})", quote(name)),
            Self::ResourceId { kind, name } => format!("resourceId({})", id_args(*kind, name)),
            Self::Reference { kind, name, path } => {
                let mut out = format!(
                    "reference(resourceId({}), {})",
                    id_args(*kind, name),
                    quote(kind.api_version())
                );
                for segment in path {
                    out.push('.');
                    out.push_str(segment);
                }
                out
            }
            Self::Concat(args) => {
                let args: Vec<String> = args.iter().map(Arg::render).collect();
                format!("concat({})", args.join(", "))
            }
        }
    }
}

impl Serialize for Builtin {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_expression(self, serializer)
    }
}

/// `resourceId` arguments. A child kind's static `parent/child` name is
/// passed as one segment per level.
fn id_args(kind: ResourceKind, name: &Arg) -> String {
    let provider = quote(kind.provider_type());
    match name {
        Arg::Str(s) if kind.is_child() && s.contains('/') => {
            let segments: Vec<String> = s.split('/').map(quote).collect();
            format!("{}, {}", provider, segments.join(", "))
        }
        _ => format!("{}, {}", provider, name.render()),
    }
}

/// ARM string literal: single quotes, embedded quotes doubled.
pub fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}
