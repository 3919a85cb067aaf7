use crate::error::{MssqlError, Result};
use crate::geometry::{envelope, geometry_to_wkb};
use crate::types::{LayerDescriptor, Value};
use geo_types::{Geometry, Rect};
use std::collections::HashMap;
use std::sync::Arc;

/// Ordered attribute names shared by every feature of one cursor.
#[derive(Debug, PartialEq)]
pub struct AttributeContext {
    names: Vec<String>,
    index_by_name: HashMap<String, usize>,
}

impl AttributeContext {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let mut index_by_name = HashMap::with_capacity(names.len());
        for (idx, name) in names.iter().enumerate() {
            // A repeated name resolves to its first column.
            index_by_name.entry(name.clone()).or_insert(idx);
        }
        Self {
            names,
            index_by_name,
        }
    }

    pub fn from_descriptor(descriptor: &LayerDescriptor) -> Self {
        Self::new(descriptor.descriptors.iter().map(|d| d.name.as_str()))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index_by_name.get(name).copied()
    }
}

/// One result row: identity, attribute slots, and decoded geometry parts.
#[derive(Clone, Debug)]
pub struct MssqlFeature {
    id: i64,
    context: Arc<AttributeContext>,
    values: Vec<Option<Value>>,
    geometries: Vec<Geometry<f64>>,
}

impl MssqlFeature {
    /// Create an empty feature with one unset slot per context attribute.
    pub fn new(context: Arc<AttributeContext>, id: i64) -> Self {
        let values = vec![None; context.len()];
        Self {
            id,
            context,
            values,
            geometries: Vec::new(),
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn context(&self) -> &Arc<AttributeContext> {
        &self.context
    }

    /// Value of the attribute `name`; `None` if it is unknown or unset.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.context
            .index_of(name)
            .and_then(|idx| self.get_at(idx))
    }

    pub fn get_at(&self, index: usize) -> Option<&Value> {
        self.values.get(index).and_then(Option::as_ref)
    }

    /// Whether the attribute `name` holds a value. Unset differs from an
    /// empty string or zero.
    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Read and convert an attribute; `Ok(None)` if the slot is unset.
    ///
    /// Example:
    /// ```
    /// use mssql_featureset::{AttributeContext, MssqlFeature};
    /// use std::sync::Arc;
    ///
    /// let context = Arc::new(AttributeContext::new(["name"]));
    /// let mut feature = MssqlFeature::new(context, 1);
    /// feature.put("name", "alpha")?;
    /// let name: Option<String> = feature.property("name")?;
    /// assert_eq!(name.as_deref(), Some("alpha"));
    /// # Ok::<(), mssql_featureset::MssqlError>(())
    /// ```
    pub fn property<T>(&self, name: &str) -> Result<Option<T>>
    where
        T: TryFrom<Value, Error = MssqlError>,
    {
        let idx = self
            .context
            .index_of(name)
            .ok_or_else(|| MssqlError::MissingAttribute {
                attribute: name.to_string(),
            })?;
        self.values[idx].clone().map(T::try_from).transpose()
    }

    pub fn put(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let idx = self
            .context
            .index_of(name)
            .ok_or_else(|| MssqlError::MissingAttribute {
                attribute: name.to_string(),
            })?;
        self.values[idx] = Some(value.into());
        Ok(())
    }

    /// Set the slot at `index`. Indices past the context are ignored.
    pub fn put_at(&mut self, index: usize, value: impl Into<Value>) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = Some(value.into());
        }
    }

    /// Attribute names in context order with their values.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.context
            .names()
            .iter()
            .zip(&self.values)
            .map(|(name, value)| (name.as_str(), value.as_ref()))
    }

    pub fn geometries(&self) -> &[Geometry<f64>] {
        &self.geometries
    }

    pub fn add_geometry(&mut self, geometry: Geometry<f64>) {
        self.geometries.push(geometry);
    }

    /// Bounding box over every attached geometry part.
    pub fn envelope(&self) -> Option<Rect<f64>> {
        envelope(&self.geometries)
    }

    /// Encode the geometry part at `index` as WKB.
    pub fn geometry_wkb(&self, index: usize) -> Result<Vec<u8>> {
        let geometry = self
            .geometries
            .get(index)
            .ok_or(MssqlError::MissingGeometry { index })?;
        geometry_to_wkb(geometry)
    }
}
