use super::{check_structure, read_properties, tracked_elements};
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::properties::PropertyCache;
use crate::statics;

/// Read the property annotations of every tracked element in `document`.
///
/// Every tracked element with an id gets an entry, empty when it carries no annotations, so
/// applying the result clears values that were removed from the text. Elements without an id
/// are skipped. Malformed markup fails the whole extraction and yields nothing.
pub fn extract(document: &str, config: &SyncConfig) -> Result<PropertyCache, SyncError> {
    let doc = roxmltree::Document::parse(document)?;
    check_structure(&doc, config)?;

    let mut cache = PropertyCache::new();
    for node in tracked_elements(&doc, config) {
        let Some(id) = node.attribute(statics::XML_ATTR_ID) else {
            tracing::debug!(kind = node.tag_name().name(), "skipping tracked element without id");
            continue;
        };
        cache.replace(id, read_properties(node, id)?);
    }

    tracing::debug!(elements = cache.len(), "extracted properties");
    Ok(cache)
}
