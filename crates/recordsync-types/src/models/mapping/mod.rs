//! Field translation between a local record type and a remote record type.
//!
//! A [`Mapping`] is an ordered table of `(local_field, remote_field, converter)`
//! triples. Field names are unique on each side. The table only grows after
//! construction: [`Mapping::add_mappings`] overrides entries for an existing
//! local field and appends new ones.

mod converter;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests;

pub use converter::{parse_timestamp, to_timestamp, Converter};

use serde::{Deserialize, Serialize};

use super::instance::{Attributes, Origin};
use crate::error::{ConfigError, ConversionError};

/// One row of the translation table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldMapping {
    /// Column / attribute name in the local store
    pub local: String,
    /// Field name in the remote system
    pub remote: String,
    #[serde(default)]
    pub converter: Converter,
}

impl FieldMapping {
    pub fn new(local: impl Into<String>, remote: impl Into<String>) -> Self {
        Self { local: local.into(), remote: remote.into(), converter: Converter::Identity }
    }

    pub fn with_converter(mut self, converter: Converter) -> Self {
        self.converter = converter;
        self
    }
}

/// Which field names the translated attributes should carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Local attribute names -> remote field names
    ToRemote,
    /// Remote field names -> local attribute names
    ToLocal,
}

impl Direction {
    /// Direction that produces attributes for a store of the given origin.
    pub fn toward(origin: Origin) -> Self {
        match origin {
            Origin::Local => Self::ToLocal,
            Origin::Remote => Self::ToRemote,
        }
    }
}

/// Translation table shared read-only by both record type adapters.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "Vec<FieldMapping>", into = "Vec<FieldMapping>")]
pub struct Mapping {
    fields: Vec<FieldMapping>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(local, remote)` pairs with identity conversion.
    pub fn from_pairs<I, L, R>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (L, R)>,
        L: Into<String>,
        R: Into<String>,
    {
        Self::from_fields(pairs.into_iter().map(|(l, r)| FieldMapping::new(l, r)))
    }

    pub fn from_fields(fields: impl IntoIterator<Item = FieldMapping>) -> Result<Self, ConfigError> {
        let mut mapping = Self::new();
        mapping.add_mappings(fields)?;
        Ok(mapping)
    }

    /// Extend the table. Applied atomically: on error the table is unchanged.
    ///
    /// A later entry for an already mapped local field replaces it in place.
    /// Binding a remote field that another local field already owns fails.
    pub fn add_mappings(
        &mut self,
        fields: impl IntoIterator<Item = FieldMapping>,
    ) -> Result<(), ConfigError> {
        let mut next = self.fields.clone();

        for field in fields {
            if field.local.trim().is_empty() || field.remote.trim().is_empty() {
                return Err(ConfigError::invalid(
                    "fields",
                    format!("empty field name in {} -> {}", field.local, field.remote),
                ));
            }

            if let Some(owner) =
                next.iter().find(|f| f.remote == field.remote && f.local != field.local)
            {
                return Err(ConfigError::DuplicateRemoteField {
                    remote: field.remote,
                    existing: owner.local.clone(),
                    local: field.local,
                });
            }

            match next.iter_mut().find(|f| f.local == field.local) {
                Some(existing) => *existing = field,
                None => next.push(field),
            }
        }

        self.fields = next;
        Ok(())
    }

    pub fn fields(&self) -> &[FieldMapping] {
        &self.fields
    }

    pub fn local_fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.local.as_str())
    }

    pub fn remote_fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.remote.as_str())
    }

    pub fn remote_field_for(&self, local: &str) -> Option<&str> {
        self.fields.iter().find(|f| f.local == local).map(|f| f.remote.as_str())
    }

    pub fn local_field_for(&self, remote: &str) -> Option<&str> {
        self.fields.iter().find(|f| f.remote == remote).map(|f| f.local.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Translate attribute names for `direction`, applying each field's converter.
    ///
    /// Attributes outside the table are dropped; mapped fields absent from the
    /// input stay absent so partial writes only touch what the source carries.
    pub fn convert(
        &self,
        direction: Direction,
        attributes: &Attributes,
    ) -> Result<Attributes, ConversionError> {
        let mut translated = Attributes::new();

        for field in &self.fields {
            let (from, to) = match direction {
                Direction::ToRemote => (&field.local, &field.remote),
                Direction::ToLocal => (&field.remote, &field.local),
            };
            if let Some(value) = attributes.get(from) {
                let converted = field.converter.apply(from, value.clone())?;
                translated.insert(to.clone(), converted);
            }
        }

        Ok(translated)
    }

    /// Translate attributes read from a store of `origin` into the shape
    /// expected by a store of `target`.
    pub fn translate(
        &self,
        origin: Origin,
        target: Origin,
        attributes: &Attributes,
    ) -> Result<Attributes, ConversionError> {
        if origin == target {
            let own = match origin {
                Origin::Local => Direction::ToRemote,
                Origin::Remote => Direction::ToLocal,
            };
            // Same-side copy: keep only mapped names but still normalise values.
            let there = self.convert(own, attributes)?;
            return self.convert(Direction::toward(origin), &there);
        }
        self.convert(Direction::toward(target), attributes)
    }
}

impl TryFrom<Vec<FieldMapping>> for Mapping {
    type Error = ConfigError;

    fn try_from(fields: Vec<FieldMapping>) -> Result<Self, Self::Error> {
        Self::from_fields(fields)
    }
}

impl From<Mapping> for Vec<FieldMapping> {
    fn from(mapping: Mapping) -> Self {
        mapping.fields
    }
}
