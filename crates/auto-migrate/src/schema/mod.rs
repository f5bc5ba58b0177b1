//! Logical model schema types.
//!
//! A [`SchemaRegistry`] holds the model definitions that auto-migration
//! reconciles against the physical layer. The registry is owned by the
//! caller (an ORM, an app, a schema file on disk) and is read-only to the
//! migration core.

mod spec;

pub use spec::{ColumnSpec, TableSpec};

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Ordered collection of model definitions, keyed by model identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaRegistry {
    models: BTreeMap<String, ModelDefinition>,
}

impl SchemaRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a registry from a YAML schema file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a registry from a YAML string.
    ///
    /// The document is a map of model identity to definition; identities
    /// omitted inside a definition are filled in from the map key.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut registry: SchemaRegistry = serde_yaml::from_str(yaml)?;
        for (identity, model) in registry.models.iter_mut() {
            if model.identity.is_empty() {
                model.identity = identity.clone();
            }
        }
        Ok(registry)
    }

    /// Add a model definition, keyed by its identity.
    pub fn register(&mut self, model: ModelDefinition) {
        self.models.insert(model.identity.clone(), model);
    }

    /// Look up a model by identity.
    pub fn get(&self, identity: &str) -> Option<&ModelDefinition> {
        self.models.get(identity)
    }

    /// Iterate over all model definitions in identity order.
    pub fn models(&self) -> impl Iterator<Item = &ModelDefinition> {
        self.models.values()
    }

    /// Number of registered models.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether the registry holds no models.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Logical definition of one user-defined data type, mapped to one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDefinition {
    /// Unique model identity.
    #[serde(default)]
    pub identity: String,

    /// Name of the datastore this model lives on.
    pub datastore: String,

    /// Physical table name.
    pub table_name: String,

    /// Name of the primary key attribute, if the model declares one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,

    /// Attribute definitions, keyed by attribute name.
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeDefinition>,
}

/// One named field of a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeDefinition {
    /// Physical column name. Defaults to the attribute name when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_name: Option<String>,

    /// True for plural associations, which have no physical column.
    #[serde(default)]
    pub plural_association: bool,

    /// Physical column metadata. Required unless the attribute is a plural
    /// association.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directives: Option<ColumnDirectives>,
}

impl AttributeDefinition {
    /// The physical column this attribute maps to, given its own name.
    pub fn column_for<'a>(&'a self, attribute_name: &'a str) -> &'a str {
        self.column_name.as_deref().unwrap_or(attribute_name)
    }
}

/// Physical-column descriptor attached to an attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDirectives {
    /// Column type in the datastore's own vocabulary (e.g. `VARCHAR(255)`).
    pub column_type: String,

    /// Whether the column allows NULL.
    #[serde(default)]
    pub nullable: bool,

    /// Whether the column carries a uniqueness constraint.
    #[serde(default)]
    pub unique: bool,

    /// Whether the column value is generated by the datastore.
    #[serde(default)]
    pub auto_increment: bool,

    /// Default value, in whatever form the adapter understands.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
}
