//! AF-009: Artifact synthesis: value introspection into ARM fragments.
//!
//! Introspection is serde: [`FragmentSerializer`] walks any `Serialize` value
//! and builds `serde_json` structure. A field's external key and omit rule
//! come from its own `#[serde(..)]` annotation. On top of that:
//! - `None`, unit and values that fail to serialize are omitted
//! - empty sequences are omitted, never emitted as `[]`
//! - maps and records left with no entries are omitted, never emitted as `{}`
//! - expression values (see [`EXPRESSION_MARKER`]) become their rendered
//!   string before any structural conversion, at every depth
//!
//! Synthesis never fails; it degrades by omission.

use super::catalog::ResourceKind;
use super::expression::{Arg, Builtin, Expression, EXPRESSION_MARKER};
use super::literal::SynthContext;
use super::types::DiscoveredResource;
use serde::ser::{self, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;
use tracing::{debug, trace};

/// Outcome of converting one value.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Omitted,
    Value(Value),
}

/// A value that could not be read. Never escapes synthesis.
#[derive(Debug)]
pub struct Unreadable(String);

impl fmt::Display for Unreadable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unreadable value: {}", self.0)
    }
}

impl std::error::Error for Unreadable {}

impl ser::Error for Unreadable {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self(msg.to_string())
    }
}

/// Convert any serializable value. `None` when the whole value is omitted.
pub fn to_value<T: Serialize + ?Sized>(value: &T) -> Option<Value> {
    match value.serialize(FragmentSerializer) {
        Ok(Slot::Value(v)) => Some(v),
        Ok(Slot::Omitted) => None,
        Err(e) => {
            trace!(error = %e, "value skipped");
            None
        }
    }
}

/// Build one resource fragment from a typed or lowered value.
///
/// Key order: `type`, `apiVersion`, `name`, the value's own fields, then
/// `dependsOn`. The first three are injected when the value lacks them.
pub fn fragment<T: Serialize + ?Sized>(
    kind: ResourceKind,
    external_name: &Arg,
    value: &T,
    depends_on: &[Builtin],
) -> Map<String, Value> {
    let mut body = match to_value(value) {
        Some(Value::Object(map)) => map,
        Some(_) | None => Map::new(),
    };

    let mut out = Map::new();
    let type_value = body
        .shift_remove("type")
        .unwrap_or_else(|| Value::String(kind.provider_type().to_string()));
    out.insert("type".to_string(), type_value);
    let api_version = body
        .shift_remove("apiVersion")
        .unwrap_or_else(|| Value::String(kind.api_version().to_string()));
    out.insert("apiVersion".to_string(), api_version);
    let name = body
        .shift_remove("name")
        .unwrap_or_else(|| arg_value(external_name));
    out.insert("name".to_string(), name);

    let explicit = body.shift_remove("dependsOn");
    out.extend(body);

    let mut deps: Vec<Value> = match explicit {
        Some(Value::Array(items)) => items,
        Some(single @ Value::String(_)) => vec![single],
        _ => Vec::new(),
    };
    for dep in depends_on {
        let rendered = Value::String(dep.render());
        if !deps.contains(&rendered) {
            deps.push(rendered);
        }
    }
    if !deps.is_empty() {
        out.insert("dependsOn".to_string(), Value::Array(deps));
    }
    out
}

/// Synthesize the fragment of a discovered resource.
pub fn synthesize(
    resource: &DiscoveredResource,
    ctx: &SynthContext<'_>,
    depends_on: &[&str],
) -> Map<String, Value> {
    let literal = ctx.lower_resource(resource);
    let deps: Vec<Builtin> = depends_on
        .iter()
        .filter_map(|name| ctx.resource_id(name))
        .collect();
    let external_name = ctx.external_name(&resource.name);
    let out = fragment(resource.kind, &external_name, &literal, &deps);
    debug!(
        resource = %resource.name,
        kind = %resource.kind,
        keys = out.len(),
        "synthesized fragment"
    );
    out
}

fn arg_value(arg: &Arg) -> Value {
    match arg {
        Arg::Str(s) => Value::String(s.clone()),
        Arg::Expr(e) => Value::String(e.render()),
    }
}

// ============================================================================
// Serializer
// ============================================================================

/// Serializer producing `serde_json` structure with omission rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct FragmentSerializer;

fn number(n: impl Into<Number>) -> Result<Slot, Unreadable> {
    Ok(Slot::Value(Value::Number(n.into())))
}

impl ser::Serializer for FragmentSerializer {
    type Ok = Slot;
    type Error = Unreadable;
    type SerializeSeq = SeqBuilder;
    type SerializeTuple = SeqBuilder;
    type SerializeTupleStruct = SeqBuilder;
    type SerializeTupleVariant = VariantSeqBuilder;
    type SerializeMap = MapBuilder;
    type SerializeStruct = MapBuilder;
    type SerializeStructVariant = VariantMapBuilder;

    fn serialize_bool(self, v: bool) -> Result<Slot, Unreadable> {
        Ok(Slot::Value(Value::Bool(v)))
    }

    fn serialize_i8(self, v: i8) -> Result<Slot, Unreadable> {
        number(v)
    }

    fn serialize_i16(self, v: i16) -> Result<Slot, Unreadable> {
        number(v)
    }

    fn serialize_i32(self, v: i32) -> Result<Slot, Unreadable> {
        number(v)
    }

    fn serialize_i64(self, v: i64) -> Result<Slot, Unreadable> {
        number(v)
    }

    fn serialize_i128(self, v: i128) -> Result<Slot, Unreadable> {
        match i64::try_from(v) {
            Ok(n) => number(n),
            Err(_) => Ok(Slot::Value(Value::String(v.to_string()))),
        }
    }

    fn serialize_u8(self, v: u8) -> Result<Slot, Unreadable> {
        number(v)
    }

    fn serialize_u16(self, v: u16) -> Result<Slot, Unreadable> {
        number(v)
    }

    fn serialize_u32(self, v: u32) -> Result<Slot, Unreadable> {
        number(v)
    }

    fn serialize_u64(self, v: u64) -> Result<Slot, Unreadable> {
        number(v)
    }

    fn serialize_u128(self, v: u128) -> Result<Slot, Unreadable> {
        match u64::try_from(v) {
            Ok(n) => number(n),
            Err(_) => Ok(Slot::Value(Value::String(v.to_string()))),
        }
    }

    fn serialize_f32(self, v: f32) -> Result<Slot, Unreadable> {
        self.serialize_f64(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Result<Slot, Unreadable> {
        Number::from_f64(v)
            .map(|n| Slot::Value(Value::Number(n)))
            .ok_or_else(|| Unreadable(format!("non-finite float {}", v)))
    }

    fn serialize_char(self, v: char) -> Result<Slot, Unreadable> {
        Ok(Slot::Value(Value::String(v.to_string())))
    }

    fn serialize_str(self, v: &str) -> Result<Slot, Unreadable> {
        Ok(Slot::Value(Value::String(v.to_string())))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Slot, Unreadable> {
        if v.is_empty() {
            return Ok(Slot::Omitted);
        }
        Ok(Slot::Value(Value::Array(
            v.iter().map(|&b| Value::Number(b.into())).collect(),
        )))
    }

    fn serialize_none(self) -> Result<Slot, Unreadable> {
        Ok(Slot::Omitted)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<Slot, Unreadable> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Slot, Unreadable> {
        Ok(Slot::Omitted)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Slot, Unreadable> {
        Ok(Slot::Omitted)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<Slot, Unreadable> {
        Ok(Slot::Value(Value::String(variant.to_string())))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        name: &'static str,
        value: &T,
    ) -> Result<Slot, Unreadable> {
        if name == EXPRESSION_MARKER {
            // The payload is the rendered string; nothing structural follows.
            return match value.serialize(self)? {
                Slot::Value(Value::String(s)) => Ok(Slot::Value(Value::String(s))),
                _ => Err(Unreadable("expression did not render to a string".to_string())),
            };
        }
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Slot, Unreadable> {
        match value.serialize(self)? {
            Slot::Value(inner) => {
                let mut map = Map::new();
                map.insert(variant.to_string(), inner);
                Ok(Slot::Value(Value::Object(map)))
            }
            Slot::Omitted => Ok(Slot::Omitted),
        }
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqBuilder, Unreadable> {
        Ok(SeqBuilder {
            items: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqBuilder, Unreadable> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SeqBuilder, Unreadable> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<VariantSeqBuilder, Unreadable> {
        Ok(VariantSeqBuilder {
            variant,
            seq: self.serialize_seq(Some(len))?,
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<MapBuilder, Unreadable> {
        Ok(MapBuilder::default())
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<MapBuilder, Unreadable> {
        Ok(MapBuilder::default())
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<VariantMapBuilder, Unreadable> {
        Ok(VariantMapBuilder {
            variant,
            map: MapBuilder::default(),
        })
    }
}

/// Serialize one child, folding failures into omission.
fn child<T: Serialize + ?Sized>(value: &T) -> Option<Value> {
    to_value(value)
}

pub struct SeqBuilder {
    items: Vec<Value>,
}

impl SeqBuilder {
    fn push<T: Serialize + ?Sized>(&mut self, value: &T) {
        if let Some(v) = child(value) {
            self.items.push(v);
        }
    }

    fn finish(self) -> Slot {
        if self.items.is_empty() {
            Slot::Omitted
        } else {
            Slot::Value(Value::Array(self.items))
        }
    }
}

impl ser::SerializeSeq for SeqBuilder {
    type Ok = Slot;
    type Error = Unreadable;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Unreadable> {
        self.push(value);
        Ok(())
    }

    fn end(self) -> Result<Slot, Unreadable> {
        Ok(self.finish())
    }
}

impl ser::SerializeTuple for SeqBuilder {
    type Ok = Slot;
    type Error = Unreadable;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Unreadable> {
        self.push(value);
        Ok(())
    }

    fn end(self) -> Result<Slot, Unreadable> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleStruct for SeqBuilder {
    type Ok = Slot;
    type Error = Unreadable;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Unreadable> {
        self.push(value);
        Ok(())
    }

    fn end(self) -> Result<Slot, Unreadable> {
        Ok(self.finish())
    }
}

pub struct VariantSeqBuilder {
    variant: &'static str,
    seq: SeqBuilder,
}

impl ser::SerializeTupleVariant for VariantSeqBuilder {
    type Ok = Slot;
    type Error = Unreadable;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Unreadable> {
        self.seq.push(value);
        Ok(())
    }

    fn end(self) -> Result<Slot, Unreadable> {
        Ok(match self.seq.finish() {
            Slot::Value(inner) => {
                let mut map = Map::new();
                map.insert(self.variant.to_string(), inner);
                Slot::Value(Value::Object(map))
            }
            Slot::Omitted => Slot::Omitted,
        })
    }
}

#[derive(Default)]
pub struct MapBuilder {
    map: Map<String, Value>,
    next_key: Option<String>,
}

impl MapBuilder {
    fn finish(self) -> Slot {
        if self.map.is_empty() {
            Slot::Omitted
        } else {
            Slot::Value(Value::Object(self.map))
        }
    }

    fn insert<T: Serialize + ?Sized>(&mut self, key: String, value: &T) {
        match child(value) {
            Some(v) => {
                self.map.insert(key, v);
            }
            None => trace!(key = %key, "field omitted"),
        }
    }
}

/// Map keys must render to a string.
fn key_string<T: Serialize + ?Sized>(key: &T) -> Option<String> {
    match child(key)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl ser::SerializeMap for MapBuilder {
    type Ok = Slot;
    type Error = Unreadable;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), Unreadable> {
        self.next_key = key_string(key);
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Unreadable> {
        if let Some(key) = self.next_key.take() {
            self.insert(key, value);
        }
        Ok(())
    }

    fn end(self) -> Result<Slot, Unreadable> {
        Ok(self.finish())
    }
}

impl ser::SerializeStruct for MapBuilder {
    type Ok = Slot;
    type Error = Unreadable;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Unreadable> {
        self.insert(key.to_string(), value);
        Ok(())
    }

    fn end(self) -> Result<Slot, Unreadable> {
        Ok(self.finish())
    }
}

pub struct VariantMapBuilder {
    variant: &'static str,
    map: MapBuilder,
}

impl ser::SerializeStructVariant for VariantMapBuilder {
    type Ok = Slot;
    type Error = Unreadable;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Unreadable> {
        self.map.insert(key.to_string(), value);
        Ok(())
    }

    fn end(self) -> Result<Slot, Unreadable> {
        let mut outer = Map::new();
        outer.insert(self.variant.to_string(), Value::Object(self.map.map));
        Ok(Slot::Value(Value::Object(outer)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Serialize, Serializer};
    use serde_json::json;
    use std::collections::BTreeMap;

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Sku {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        tier: Option<String>,
    }

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Account {
        location: String,
        sku: Sku,
        #[serde(skip_serializing_if = "String::is_empty")]
        kind: String,
        access_tier: Option<String>,
        https_only: bool,
        #[serde(rename = "networkAcls")]
        acls: Vec<String>,
        tags: BTreeMap<String, String>,
        #[serde(skip)]
        #[allow(dead_code)]
        internal: u32,
    }

    fn account() -> Account {
        Account {
            location: "westeurope".into(),
            sku: Sku {
                name: "Standard_LRS".into(),
                tier: None,
            },
            kind: String::new(),
            access_tier: None,
            https_only: false,
            acls: vec![],
            tags: BTreeMap::from([("env".to_string(), "prod".to_string())]),
            internal: 7,
        }
    }

    /// Record-shaped expression: must still render as a string.
    struct Lookup {
        target: &'static str,
    }

    impl Expression for Lookup {
        fn call(&self) -> String {
            format!("reference('{}')", self.target)
        }
    }

    impl Serialize for Lookup {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            crate::core::expression::serialize_expression(self, serializer)
        }
    }

    struct Broken;

    impl Serialize for Broken {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(ser::Error::custom("private"))
        }
    }

    #[test]
    fn test_af009_omission_rules() {
        let v = to_value(&account()).unwrap();
        assert_eq!(
            v,
            json!({
                "location": "westeurope",
                "sku": { "name": "Standard_LRS" },
                "httpsOnly": false,
                "tags": { "env": "prod" }
            })
        );
    }

    #[test]
    fn test_af009_setting_value_makes_key_present() {
        let mut a = account();
        a.access_tier = Some("Hot".into());
        a.kind = "StorageV2".into();
        a.acls = vec!["deny".into()];
        let v = to_value(&a).unwrap();
        assert_eq!(v["accessTier"], "Hot");
        assert_eq!(v["kind"], "StorageV2");
        assert_eq!(v["networkAcls"], json!(["deny"]));
    }

    #[test]
    fn test_af009_expression_short_circuit_any_depth() {
        #[derive(Serialize)]
        struct Inner {
            id: Lookup,
        }
        #[derive(Serialize)]
        struct Outer {
            top: Lookup,
            nested: Vec<Option<Box<Inner>>>,
        }
        let v = to_value(&Outer {
            top: Lookup { target: "a" },
            nested: vec![Some(Box::new(Inner {
                id: Lookup { target: "b" },
            }))],
        })
        .unwrap();
        assert_eq!(v["top"], "[reference('a')]");
        assert_eq!(v["nested"][0]["id"], "[reference('b')]");
    }

    #[test]
    fn test_af009_unreadable_field_skipped() {
        #[derive(Serialize)]
        struct WithSecret {
            visible: u8,
            secret: Broken,
        }
        let v = to_value(&WithSecret {
            visible: 1,
            secret: Broken,
        })
        .unwrap();
        assert_eq!(v, json!({ "visible": 1 }));
    }

    #[test]
    fn test_af009_record_left_empty_omitted() {
        #[derive(Serialize)]
        struct Acl {
            secret: Broken,
            rules: Vec<String>,
        }
        #[derive(Serialize)]
        struct Holder {
            visible: u8,
            acl: Acl,
            tags: BTreeMap<String, Broken>,
        }
        let v = to_value(&Holder {
            visible: 1,
            acl: Acl {
                secret: Broken,
                rules: vec![],
            },
            tags: BTreeMap::from([("env".to_string(), Broken)]),
        })
        .unwrap();
        assert_eq!(v, json!({ "visible": 1 }));

        let empty: BTreeMap<String, u8> = BTreeMap::new();
        assert_eq!(to_value(&empty), None);
    }

    #[test]
    fn test_af009_references_dereferenced() {
        let sku = Sku {
            name: "Basic".into(),
            tier: Some("Basic".into()),
        };
        #[derive(Serialize)]
        struct Holder<'a> {
            sku: &'a Sku,
            missing: Option<&'a Sku>,
        }
        let v = to_value(&Holder {
            sku: &sku,
            missing: None,
        })
        .unwrap();
        assert_eq!(v, json!({ "sku": { "name": "Basic", "tier": "Basic" } }));
    }

    #[test]
    fn test_af009_enum_shapes() {
        #[derive(Serialize)]
        enum Mode {
            Incremental,
            Custom(u8),
            Pair(u8, u8),
            Named { level: u8 },
        }
        assert_eq!(to_value(&Mode::Incremental).unwrap(), json!("Incremental"));
        assert_eq!(to_value(&Mode::Custom(3)).unwrap(), json!({ "Custom": 3 }));
        assert_eq!(to_value(&Mode::Pair(1, 2)).unwrap(), json!({ "Pair": [1, 2] }));
        assert_eq!(
            to_value(&Mode::Named { level: 2 }).unwrap(),
            json!({ "Named": { "level": 2 } })
        );
    }

    #[test]
    fn test_af009_empty_top_level_omitted() {
        let empty: Vec<u8> = vec![];
        assert_eq!(to_value(&empty), None);
        assert_eq!(to_value(&Option::<u8>::None), None);
        assert_eq!(to_value(&f64::NAN), None);
    }

    #[test]
    fn test_af009_fragment_key_order_and_depends_on() {
        let deps = vec![Builtin::resource_id(ResourceKind::VirtualNetwork, "vnet")];
        let frag = fragment(
            ResourceKind::Subnet,
            &Arg::str("web"),
            &json!({ "properties": { "addressPrefix": "10.0.1.0/24" } }),
            &deps,
        );
        let keys: Vec<&str> = frag.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["type", "apiVersion", "name", "properties", "dependsOn"]);
        assert_eq!(frag["type"], "Microsoft.Network/virtualNetworks/subnets");
        assert_eq!(frag["name"], "web");
        assert_eq!(
            frag["dependsOn"],
            json!(["[resourceId('Microsoft.Network/virtualNetworks', 'vnet')]"])
        );
    }

    #[test]
    fn test_af009_fragment_keeps_value_name_and_merges_depends_on() {
        let deps = vec![Builtin::resource_id(ResourceKind::StorageAccount, "logs")];
        let frag = fragment(
            ResourceKind::WebSite,
            &Arg::str("FALLBACK"),
            &json!({
                "name": "app",
                "dependsOn": ["[resourceId('Microsoft.Storage/storageAccounts', 'logs')]", "extra"]
            }),
            &deps,
        );
        assert_eq!(frag["name"], "app");
        assert_eq!(frag["dependsOn"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_af009_fragment_without_deps_has_no_key() {
        let frag = fragment(ResourceKind::KeyVault, &Arg::str("kv"), &json!({}), &[]);
        assert!(!frag.contains_key("dependsOn"));
    }
}
