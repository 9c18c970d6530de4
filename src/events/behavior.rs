//! Record types and behavior namespaces.
//!
//! A [`TypeRegistry`] is the capability table handed to the collection builder: it maps a
//! collection name (`Jet`) to a record type name (`Jet`, `PtEtaPhiMLorentzVector`, ...) and
//! optionally carries a shared [`Behavior`], the set of named methods each record type
//! supports. Nothing here is global; two processors can use different registries.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::types::{DataType, Record, Value};

use super::lorentz::LorentzVector;

/// A derived quantity computed from one record, with the type of the value it returns.
///
/// The declared output type fixes the column type of the derived field, whatever the
/// records of a given chunk happen to produce.
#[derive(Clone)]
pub struct Method {
    output: DataType,
    f: Arc<dyn Fn(&Record) -> Value + Send + Sync>,
}

impl Method {
    pub fn new<F>(output: DataType, f: F) -> Self
    where
        F: Fn(&Record) -> Value + Send + Sync + 'static,
    {
        Self {
            output,
            f: Arc::new(f),
        }
    }

    /// Type of the values returned for one record.
    pub fn output_type(&self) -> &DataType {
        &self.output
    }

    pub fn call(&self, record: &Record) -> Value {
        (self.f)(record)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method").field("output", &self.output).finish()
    }
}

/// Named methods per record type.
#[derive(Clone, Default)]
pub struct Behavior {
    methods: BTreeMap<String, BTreeMap<String, Method>>,
}

impl Behavior {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `method` for records of type `record_type`, replacing any previous one.
    ///
    /// `output` is the type of the value `f` returns for one record (`Value::Null` is always
    /// allowed).
    pub fn register<F>(
        &mut self,
        record_type: impl Into<String>,
        method: impl Into<String>,
        output: DataType,
        f: F,
    ) where
        F: Fn(&Record) -> Value + Send + Sync + 'static,
    {
        self.methods
            .entry(record_type.into())
            .or_default()
            .insert(method.into(), Method::new(output, f));
    }

    /// Builder-style [`Self::register`].
    pub fn with_method<F>(
        mut self,
        record_type: impl Into<String>,
        method: impl Into<String>,
        output: DataType,
        f: F,
    ) -> Self
    where
        F: Fn(&Record) -> Value + Send + Sync + 'static,
    {
        self.register(record_type, method, output, f);
        self
    }

    pub fn method(&self, record_type: &str, method: &str) -> Option<&Method> {
        self.methods.get(record_type)?.get(method)
    }

    /// Method names registered for a record type, sorted.
    pub fn methods_for(&self, record_type: &str) -> Vec<&str> {
        self.methods
            .get(record_type)
            .map(|m| m.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Four-vector methods for NanoAOD-style record types.
    ///
    /// Types with `pt`/`eta`/`phi`(/`mass`) get `px`, `py`, `pz`, `energy` and `mass`;
    /// missing-energy types (`pt`/`phi` only) get `px` and `py`.
    pub fn nanoaod() -> Self {
        let mut b = Self::new();
        for t in FOUR_VECTOR_TYPES {
            b.register(*t, "px", DataType::Float64, |r| p4(r, |v| v.px));
            b.register(*t, "py", DataType::Float64, |r| p4(r, |v| v.py));
            b.register(*t, "pz", DataType::Float64, |r| p4(r, |v| v.pz));
            b.register(*t, "energy", DataType::Float64, |r| p4(r, |v| v.energy));
            b.register(*t, "mass", DataType::Float64, |r| p4(r, |v| v.mass()));
        }
        b.register("MissingET", "px", DataType::Float64, |r| polar(r, f64::cos));
        b.register("MissingET", "py", DataType::Float64, |r| polar(r, f64::sin));
        b
    }
}

impl fmt::Debug for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (t, methods) in &self.methods {
            map.entry(t, &methods.keys().collect::<Vec<_>>());
        }
        map.finish()
    }
}

const FOUR_VECTOR_TYPES: &[&str] = &[
    "PtEtaPhiMLorentzVector",
    "Jet",
    "FatJet",
    "Electron",
    "Muon",
    "Photon",
    "Tau",
    "GenParticle",
];

fn p4(record: &Record, f: impl Fn(&LorentzVector) -> f64) -> Value {
    LorentzVector::from_record(record).map_or(Value::Null, |v| Value::Float64(f(&v)))
}

fn polar(record: &Record, trig: fn(f64) -> f64) -> Value {
    match (record.get_f64("pt"), record.get_f64("phi")) {
        (Some(pt), Some(phi)) => Value::Float64(pt * trig(phi)),
        _ => Value::Null,
    }
}

/// The type tag attached to a grouped collection.
#[derive(Debug, Clone)]
pub struct RecordType {
    name: String,
    behavior: Option<Arc<Behavior>>,
}

impl RecordType {
    pub fn new(name: impl Into<String>, behavior: Option<Arc<Behavior>>) -> Self {
        Self {
            name: name.into(),
            behavior,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn behavior(&self) -> Option<&Behavior> {
        self.behavior.as_deref()
    }

    /// Look up a method of this type in the attached behavior.
    pub fn method(&self, method: &str) -> Option<&Method> {
        self.behavior()?.method(&self.name, method)
    }
}

impl PartialEq for RecordType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// Capability table: collection name → record type name, plus an optional shared behavior.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    tags: BTreeMap<String, String>,
    behavior: Option<Arc<Behavior>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag collection `collection` with record type `record_type`.
    pub fn register(&mut self, collection: impl Into<String>, record_type: impl Into<String>) {
        self.tags.insert(collection.into(), record_type.into());
    }

    pub fn with_type(mut self, collection: impl Into<String>, record_type: impl Into<String>) -> Self {
        self.register(collection, record_type);
        self
    }

    pub fn with_behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = Some(Arc::new(behavior));
        self
    }

    /// Merge a `collection → type name` mapping (e.g. from configuration).
    pub fn extend<I, K, V>(&mut self, tags: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in tags {
            self.register(k, v);
        }
    }

    pub fn behavior(&self) -> Option<&Arc<Behavior>> {
        self.behavior.as_ref()
    }

    pub fn type_name(&self, collection: &str) -> Option<&str> {
        self.tags.get(collection).map(String::as_str)
    }

    /// Record type for a collection, with the shared behavior attached when present.
    pub fn record_type(&self, collection: &str) -> Option<RecordType> {
        let name = self.tags.get(collection)?;
        Some(RecordType::new(name.clone(), self.behavior.clone()))
    }

    /// NanoAOD collection tags with [`Behavior::nanoaod`] attached.
    pub fn nanoaod() -> Self {
        let mut reg = Self::new().with_behavior(Behavior::nanoaod());
        reg.extend(NANOAOD_TAGS.iter().copied());
        reg
    }
}

const NANOAOD_TAGS: &[(&str, &str)] = &[
    ("Jet", "Jet"),
    ("FatJet", "FatJet"),
    ("Electron", "Electron"),
    ("Muon", "Muon"),
    ("Photon", "Photon"),
    ("Tau", "Tau"),
    ("GenPart", "GenParticle"),
    ("GenJet", "PtEtaPhiMLorentzVector"),
    ("GenJetAK8", "PtEtaPhiMLorentzVector"),
    ("SubJet", "PtEtaPhiMLorentzVector"),
    ("MET", "MissingET"),
    ("PuppiMET", "MissingET"),
    ("RawMET", "MissingET"),
    ("GenMET", "MissingET"),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn muon() -> Record {
        Record::new(vec![
            ("pt".to_string(), Value::Float64(30.0)),
            ("eta".to_string(), Value::Float64(0.0)),
            ("phi".to_string(), Value::Float64(0.0)),
            ("mass".to_string(), Value::Float64(0.105)),
        ])
    }

    #[test]
    fn registry_attaches_shared_behavior() {
        let reg = TypeRegistry::nanoaod();
        let t = reg.record_type("Muon").unwrap();
        assert_eq!(t.name(), "Muon");

        let px = t.method("px").unwrap();
        assert_eq!(px.output_type(), &DataType::Float64);
        let v = px.call(&muon()).as_f64().unwrap();
        assert!((v - 30.0).abs() < 1e-9);
        assert!(t.method("no_such_method").is_none());
        assert!(reg.record_type("HLT").is_none());
    }

    #[test]
    fn tags_without_behavior_have_no_methods() {
        let reg = TypeRegistry::new().with_type("Jet", "Jet");
        let t = reg.record_type("Jet").unwrap();
        assert!(t.behavior().is_none());
        assert!(t.method("mass").is_none());
    }

    #[test]
    fn custom_methods_can_be_registered() {
        let b = Behavior::new().with_method("Muon", "double_pt", DataType::Float64, |r: &Record| {
            r.get_f64("pt").map_or(Value::Null, |pt| Value::Float64(2.0 * pt))
        });
        let reg = TypeRegistry::new().with_type("Muon", "Muon").with_behavior(b);
        let t = reg.record_type("Muon").unwrap();
        assert_eq!(t.method("double_pt").unwrap().call(&muon()), Value::Float64(60.0));
        assert_eq!(reg.behavior().unwrap().methods_for("Muon"), vec!["double_pt"]);
    }

    #[test]
    fn missing_et_has_planar_components_only() {
        let b = Behavior::nanoaod();
        assert_eq!(b.methods_for("MissingET"), vec!["px", "py"]);
        let met = Record::new(vec![
            ("pt".to_string(), Value::Float64(10.0)),
            ("phi".to_string(), Value::Float64(0.0)),
        ]);
        assert_eq!(b.method("MissingET", "px").unwrap().call(&met), Value::Float64(10.0));
    }
}
