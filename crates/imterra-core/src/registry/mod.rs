//! Extensible variant registry.
//!
//! A registry maps a discriminator string to a variant: the caller's
//! shape composed with the registry's base shape and a literal `type`
//! field, plus a constructor payload `C` that tells the engine how to
//! build nodes of that kind. Feature modules register their kinds at
//! load time; nothing is ever unregistered.
//!
//! The combined view of every registered variant ("the union") is built
//! lazily on first use and rebuilt after each registration, so modules
//! may register in any order relative to the registry itself.

pub mod builtin;

use std::collections::HashMap;
use std::sync::OnceLock;

use serde_json::{Map, Value};

use crate::error::{DescriptorError, RegistryError, ValidationError};

pub use builtin::*;

/// Name of the discriminator field every variant carries.
pub const DISCRIMINATOR: &str = "type";

/// Kind of value a field accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Bool,
    Array,
    Object,
    /// Exactly this string
    Literal(String),
    Any,
}

impl FieldKind {
    fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (FieldKind::Any, _) => true,
            (FieldKind::String, Value::String(_)) => true,
            (FieldKind::Number, Value::Number(_)) => true,
            (FieldKind::Bool, Value::Bool(_)) => true,
            (FieldKind::Array, Value::Array(_)) => true,
            (FieldKind::Object, Value::Object(_)) => true,
            (FieldKind::Literal(expected), Value::String(s)) => s == expected,
            _ => false,
        }
    }

    fn describe(&self) -> String {
        match self {
            FieldKind::Literal(s) => format!("\"{}\"", s),
            other => format!("{:?}", other).to_lowercase(),
        }
    }
}

/// A field definition within a shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldSpec {
    pub fn required(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
        }
    }
}

/// An ordered set of field definitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Shape {
    pub fields: Vec<FieldSpec>,
}

impl Shape {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field addition
    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Compose `self` with `other`; fields of `other` override same-named
    /// fields of `self`.
    pub fn compose(&self, other: &Shape) -> Shape {
        let mut fields = self.fields.clone();
        for field in &other.fields {
            if let Some(pos) = fields.iter().position(|f| f.name == field.name) {
                fields[pos] = field.clone();
            } else {
                fields.push(field.clone());
            }
        }
        Shape { fields }
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Validate an object against this shape. Unknown fields are allowed;
    /// `null` counts as absent.
    pub fn validate(&self, object: &Map<String, Value>) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for field in &self.fields {
            match object.get(&field.name) {
                None | Some(Value::Null) => {
                    if field.required {
                        errors.push(ValidationError {
                            field: field.name.clone(),
                            message: "required field missing".into(),
                        });
                    }
                }
                Some(value) => {
                    if !field.kind.accepts(value) {
                        errors.push(ValidationError {
                            field: field.name.clone(),
                            message: format!(
                                "expected {}, got {}",
                                field.kind.describe(),
                                value_type_name(value)
                            ),
                        });
                    }
                }
            }
        }
        errors
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A registered variant: composed shape plus constructor payload.
#[derive(Debug, Clone)]
pub struct Variant<C> {
    name: String,
    shape: Shape,
    payload: C,
}

impl<C: Clone> Variant<C> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full shape: base fields, discriminator, then variant fields
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn payload(&self) -> &C {
        &self.payload
    }

    /// Check a descriptor against this variant
    pub fn validate(&self, descriptor: &Value) -> Result<(), DescriptorError> {
        let object = descriptor.as_object().ok_or(DescriptorError::NotAnObject)?;
        let errors = self.shape.validate(object);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(DescriptorError::Invalid {
                variant: self.name.clone(),
                errors,
            })
        }
    }
}

#[derive(Debug, Clone)]
enum Entry<C> {
    Variant(Variant<C>),
    Nested(VariantRegistry<C>),
}

/// Append-only registry of tagged variants sharing a base shape.
#[derive(Debug)]
pub struct VariantRegistry<C> {
    name: String,
    base: Shape,
    entries: Vec<Entry<C>>,
    union: OnceLock<VariantUnion<C>>,
}

impl<C: Clone> Clone for VariantRegistry<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            base: self.base.clone(),
            entries: self.entries.clone(),
            union: OnceLock::new(),
        }
    }
}

impl<C: Clone> VariantRegistry<C> {
    /// Create an empty registry whose variants all extend `base`
    pub fn new(name: impl Into<String>, base: Shape) -> Self {
        Self {
            name: name.into(),
            base,
            entries: Vec::new(),
            union: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> &Shape {
        &self.base
    }

    /// Register a new variant.
    ///
    /// Fails when `name` is blank or already taken anywhere in this
    /// registry, nested registries included.
    pub fn register(
        &mut self,
        name: &str,
        shape: Shape,
        payload: C,
    ) -> Result<(), RegistryError> {
        let name = self.check_name(name)?;

        let discriminator = Shape::new().field(FieldSpec::required(
            DISCRIMINATOR,
            FieldKind::Literal(name.clone()),
        ));
        let shape = self.base.compose(&discriminator).compose(&shape);

        self.entries.push(Entry::Variant(Variant {
            name,
            shape,
            payload,
        }));
        self.union = OnceLock::new();
        Ok(())
    }

    /// Register a nested sub-registry. Its variants become part of this
    /// registry's union, after the variants registered before it.
    pub fn register_nested(&mut self, registry: VariantRegistry<C>) -> Result<(), RegistryError> {
        self.check_name(&registry.name)?;
        for name in registry.union().names() {
            if self.lookup(name).is_some() {
                return Err(RegistryError::AlreadyRegistered(name.to_string()));
            }
        }
        self.entries.push(Entry::Nested(registry));
        self.union = OnceLock::new();
        Ok(())
    }

    fn check_name(&self, name: &str) -> Result<String, RegistryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RegistryError::AnonymousVariant);
        }
        let taken = self.lookup(name).is_some()
            || self.entries.iter().any(|entry| match entry {
                Entry::Nested(nested) => nested.name == name,
                Entry::Variant(_) => false,
            });
        if taken {
            return Err(RegistryError::AlreadyRegistered(name.to_string()));
        }
        Ok(name.to_string())
    }

    /// Find a variant by name, walking nested registries in registration
    /// order. The first match wins.
    pub fn lookup(&self, name: &str) -> Option<&Variant<C>> {
        self.entries.iter().find_map(|entry| match entry {
            Entry::Variant(variant) if variant.name == name => Some(variant),
            Entry::Variant(_) => None,
            Entry::Nested(nested) => nested.lookup(name),
        })
    }

    /// Combined view of every variant registered so far
    pub fn union(&self) -> &VariantUnion<C> {
        self.union.get_or_init(|| {
            let mut variants = Vec::new();
            self.collect(&mut variants);
            VariantUnion::new(variants)
        })
    }

    fn collect(&self, out: &mut Vec<Variant<C>>) {
        for entry in &self.entries {
            match entry {
                Entry::Variant(variant) => out.push(variant.clone()),
                Entry::Nested(nested) => nested.collect(out),
            }
        }
    }
}

/// Flattened, name-indexed view over a registry.
#[derive(Debug, Clone)]
pub struct VariantUnion<C> {
    variants: Vec<Variant<C>>,
    by_name: HashMap<String, usize>,
}

impl<C: Clone> VariantUnion<C> {
    fn new(variants: Vec<Variant<C>>) -> Self {
        let mut by_name = HashMap::new();
        for (index, variant) in variants.iter().enumerate() {
            by_name.entry(variant.name.clone()).or_insert(index);
        }
        Self { variants, by_name }
    }

    pub fn get(&self, name: &str) -> Option<&Variant<C>> {
        self.by_name.get(name).map(|&index| &self.variants[index])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Variant names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variants.iter().map(|v| v.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Dispatch on the descriptor's discriminator and validate it.
    pub fn validate(&self, descriptor: &Value) -> Result<&Variant<C>, DescriptorError> {
        let object = descriptor.as_object().ok_or(DescriptorError::NotAnObject)?;
        let tag = object
            .get(DISCRIMINATOR)
            .and_then(Value::as_str)
            .ok_or(DescriptorError::MissingDiscriminator)?;
        let variant = self
            .get(tag)
            .ok_or_else(|| DescriptorError::UnknownVariant(tag.to_string()))?;
        variant.validate(descriptor)?;
        Ok(variant)
    }
}
