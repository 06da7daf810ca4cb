//! The live element model the diagram editor works on, and the updater that pushes
//! extracted properties back into it.

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::properties::ElementProperties;
use crate::statics;
use crate::xml::{read_properties, tracked_elements};
use indexmap::IndexMap;

/// What the sync engine needs from a diagram editor.
pub trait ElementModel {
    fn contains(&self, element_id: &str) -> bool;

    /// Ids of every element currently materialized, in display order.
    fn element_ids(&self) -> Vec<String>;

    /// Current extension properties of an element, `None` if it is not in the model.
    fn properties(&self, element_id: &str) -> Option<ElementProperties>;

    /// Replace the element's extension properties with `properties` as a single update.
    /// Callers check [`ElementModel::contains`] first.
    fn update_properties(&mut self, element_id: &str, properties: &ElementProperties);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// The element is not materialized in the model; nothing changed.
    Missing,
}

/// Push the full property set of one element into the model.
/// An element the model does not know about is skipped, not an error: documents may
/// describe elements the editor is not currently showing.
pub fn apply<M: ElementModel + ?Sized>(
    model: &mut M,
    element_id: &str,
    properties: &ElementProperties,
) -> ApplyOutcome {
    if !model.contains(element_id) {
        tracing::debug!(element_id, "element not in model; skipping update");
        return ApplyOutcome::Missing;
    }
    model.update_properties(element_id, properties);
    ApplyOutcome::Applied
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelElement {
    pub id: String,
    pub kind: String,
    pub name: Option<String>,
    pub properties: ElementProperties,
}

/// An in-memory element model.
/// `revision` increases by exactly one per property update so observers can tell
/// one atomic update from several partial ones.
#[derive(Debug, Clone, Default)]
pub struct ElementRegistry {
    elements: IndexMap<String, ModelElement>,
    revision: u64,
}

impl ElementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Materialize every tracked element of `document` with its current properties.
    pub fn from_document(document: &str, config: &SyncConfig) -> Result<Self, SyncError> {
        let doc = roxmltree::Document::parse(document)?;
        crate::xml::check_structure(&doc, config)?;

        let mut registry = Self::new();
        for node in tracked_elements(&doc, config) {
            let Some(id) = node.attribute(statics::XML_ATTR_ID) else {
                continue;
            };
            registry.insert(ModelElement {
                id: id.to_string(),
                kind: node.tag_name().name().to_string(),
                name: node.attribute(statics::XML_ATTR_NAME).map(str::to_string),
                properties: read_properties(node, id)?,
            });
        }
        Ok(registry)
    }

    pub fn insert(&mut self, element: ModelElement) {
        self.elements.insert(element.id.clone(), element);
    }

    pub fn remove(&mut self, element_id: &str) -> Option<ModelElement> {
        self.elements.shift_remove(element_id)
    }

    pub fn get(&self, element_id: &str) -> Option<&ModelElement> {
        self.elements.get(element_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelElement> {
        self.elements.values()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}

impl ElementModel for ElementRegistry {
    fn contains(&self, element_id: &str) -> bool {
        self.elements.contains_key(element_id)
    }

    fn element_ids(&self) -> Vec<String> {
        self.elements.keys().cloned().collect()
    }

    fn properties(&self, element_id: &str) -> Option<ElementProperties> {
        self.elements.get(element_id).map(|e| e.properties.clone())
    }

    fn update_properties(&mut self, element_id: &str, properties: &ElementProperties) {
        if let Some(element) = self.elements.get_mut(element_id) {
            element.properties = properties.clone();
            self.revision += 1;
        }
    }
}
