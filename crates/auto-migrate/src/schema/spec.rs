//! Derived physical table specifications.

use super::{ColumnDirectives, ModelDefinition};
use crate::error::{MigrateError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Physical specification for one table, derived from a model definition.
///
/// A spec is built fresh for each migration run and handed to the adapter;
/// it has no lifecycle of its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableSpec {
    columns: BTreeMap<String, ColumnSpec>,
}

/// One column of a [`TableSpec`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// The column's migration directives, copied from the attribute.
    #[serde(flatten)]
    pub directives: ColumnDirectives,

    /// Whether this column is the table's primary key.
    #[serde(default)]
    pub primary_key: bool,
}

impl TableSpec {
    /// Build the table spec for a model.
    ///
    /// Plural associations are skipped outright; they have no physical
    /// column. Every other attribute must carry migration directives, and
    /// the declared primary key attribute (if any) must resolve to one of
    /// the produced columns. On any violation this fails without producing
    /// a partial spec.
    pub fn build(model: &ModelDefinition) -> Result<TableSpec> {
        let mut columns = BTreeMap::new();

        for (attribute_name, attribute) in &model.attributes {
            if attribute.plural_association {
                continue;
            }

            let directives = attribute.directives.clone().ok_or_else(|| {
                MigrateError::MissingDirectives {
                    model: model.identity.clone(),
                    attribute: attribute_name.clone(),
                }
            })?;

            columns.insert(
                attribute.column_for(attribute_name).to_string(),
                ColumnSpec {
                    directives,
                    primary_key: false,
                },
            );
        }

        if let Some(pk_attribute) = &model.primary_key {
            let column = model
                .attributes
                .get(pk_attribute)
                .filter(|attr| !attr.plural_association)
                .map(|attr| attr.column_for(pk_attribute))
                .and_then(|name| columns.get_mut(name));

            match column {
                Some(column) => column.primary_key = true,
                None => {
                    return Err(MigrateError::InvalidPrimaryKey {
                        model: model.identity.clone(),
                        attribute: pk_attribute.clone(),
                    });
                }
            }
        }

        Ok(TableSpec { columns })
    }

    /// Look up a column spec by physical column name.
    pub fn get(&self, column: &str) -> Option<&ColumnSpec> {
        self.columns.get(column)
    }

    /// Iterate over columns in name order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &ColumnSpec)> {
        self.columns.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    /// The primary key column, if one is flagged.
    pub fn primary_key(&self) -> Option<(&str, &ColumnSpec)> {
        self.columns().find(|(_, spec)| spec.primary_key)
    }

    /// Number of columns in the spec.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the spec has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
