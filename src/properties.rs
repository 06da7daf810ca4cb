//! Property cache: the reconciliation point between the live element model and the XML.
//!
//! Blank values are never stored. Setting a property to an empty or whitespace-only string
//! removes it, whichever side the edit came from.

use indexmap::IndexMap;

/// True when a value means "no value set".
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Named string properties of one element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementProperties(IndexMap<String, String>);

impl ElementProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `name`. A blank value removes the property instead.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if is_blank(&value) {
            self.0.shift_remove(&name);
        } else {
            self.0.insert(name, value);
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.shift_remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ElementProperties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut props = ElementProperties::new();
        for (k, v) in iter {
            props.insert(k, v);
        }
        props
    }
}

/// Element id -> properties.
///
/// An entry with an empty property set is meaningful: injection strips any stale
/// property block for that element. Use [`PropertyCache::remove`] to forget an element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyCache {
    entries: IndexMap<String, ElementProperties>,
}

impl PropertyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, element_id: &str) -> Option<&ElementProperties> {
        self.entries.get(element_id)
    }

    /// Cached properties of `element_id`, or an empty set.
    pub fn properties_of(&self, element_id: &str) -> ElementProperties {
        self.entries.get(element_id).cloned().unwrap_or_default()
    }

    pub fn set(&mut self, element_id: &str, name: &str, value: &str) {
        self.entries
            .entry(element_id.to_string())
            .or_default()
            .insert(name, value);
    }

    /// Drop every property of one element, keeping it known to the cache.
    pub fn clear(&mut self, element_id: &str) {
        self.entries
            .insert(element_id.to_string(), ElementProperties::new());
    }

    pub fn clear_all(&mut self) {
        self.entries.clear();
    }

    /// Replace the whole property set of one element.
    pub fn replace(&mut self, element_id: &str, properties: ElementProperties) {
        self.entries.insert(element_id.to_string(), properties);
    }

    /// Forget an element entirely (it was deleted).
    pub fn remove(&mut self, element_id: &str) -> Option<ElementProperties> {
        self.entries.shift_remove(element_id)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.entries.retain(|id, _| keep(id));
    }

    pub fn contains(&self, element_id: &str) -> bool {
        self.entries.contains_key(element_id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ElementProperties)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for PropertyCache {
    type Item = (String, ElementProperties);
    type IntoIter = indexmap::map::IntoIter<String, ElementProperties>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
