//! Markup side of the sync: reading property annotations out of a BPMN document and writing
//! the cache back into it.
//!
//! Elements are matched by local name, so `bpmn:serviceTask`, `bpmn2:serviceTask` and a
//! default-namespace `serviceTask` are the same kind. The annotation layout is
//!
//! ```xml
//! <serviceTask id="Task_1">
//!   <extensionElements>
//!     <camunda:properties>
//!       <camunda:property name="service.type" value="REST"/>
//!     </camunda:properties>
//!   </extensionElements>
//! </serviceTask>
//! ```

mod extract;
mod inject;

pub use extract::extract;
pub use inject::inject;

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::properties::ElementProperties;
use crate::statics;
use roxmltree::{Document, Node};
use std::collections::HashSet;

/// Tracked elements in document order, visiting at most `config.max_depth` levels below the root.
pub(crate) fn tracked_elements<'a, 'input>(
    doc: &'a Document<'input>,
    config: &SyncConfig,
) -> Vec<Node<'a, 'input>> {
    let mut out = Vec::new();
    let mut truncated = false;
    let mut stack = vec![(doc.root_element(), 0usize)];

    while let Some((node, depth)) = stack.pop() {
        if config.is_tracked(node.tag_name().name()) {
            out.push(node);
        }
        let children: Vec<_> = node.children().filter(Node::is_element).collect();
        if depth >= config.max_depth {
            truncated |= !children.is_empty();
            continue;
        }
        // Reverse so the stack pops children in document order.
        for child in children.into_iter().rev() {
            stack.push((child, depth + 1));
        }
    }

    if truncated {
        tracing::warn!(
            max_depth = config.max_depth,
            "document nesting exceeds the traversal limit; deeper elements are ignored"
        );
    }
    out
}

fn element_children<'a, 'input>(
    node: Node<'a, 'input>,
    local_name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(move |c| c.is_element() && c.tag_name().name() == local_name)
}

/// The single property block of a tracked element, if any.
/// More than one container, or more than one block inside it, is an input error.
fn property_block<'a, 'input>(
    node: Node<'a, 'input>,
    element_id: &str,
) -> Result<Option<Node<'a, 'input>>, SyncError> {
    let duplicate = || SyncError::DuplicateContainer {
        element_id: element_id.to_string(),
    };

    let mut containers = element_children(node, statics::XML_EXTENSION_ELEMENTS);
    let Some(container) = containers.next() else {
        return Ok(None);
    };
    if containers.next().is_some() {
        return Err(duplicate());
    }

    let mut blocks = element_children(container, statics::XML_PROPERTIES);
    let block = blocks.next();
    if blocks.next().is_some() {
        return Err(duplicate());
    }
    Ok(block)
}

/// Read the annotations of one tracked element. Properties without a name are skipped,
/// blank values are elided and a repeated name keeps its last value.
pub(crate) fn read_properties(
    node: Node<'_, '_>,
    element_id: &str,
) -> Result<ElementProperties, SyncError> {
    let mut props = ElementProperties::new();
    let Some(block) = property_block(node, element_id)? else {
        return Ok(props);
    };

    for property in element_children(block, statics::XML_PROPERTY) {
        let Some(name) = property.attribute(statics::XML_ATTR_NAME) else {
            tracing::debug!(element_id, "skipping property without a name");
            continue;
        };
        let value = property.attribute(statics::XML_ATTR_VALUE).unwrap_or_default();
        props.insert(name, value);
    }
    Ok(props)
}

/// Checks shared by extraction and injection: unique ids and one container per element.
///
/// Returns the ids of tracked elements that already carry an extension container, wherever
/// it sits among their children.
pub(crate) fn check_structure(
    doc: &Document<'_>,
    config: &SyncConfig,
) -> Result<HashSet<String>, SyncError> {
    let mut seen = HashSet::new();
    let mut with_container = HashSet::new();
    for node in tracked_elements(doc, config) {
        let Some(id) = node.attribute(statics::XML_ATTR_ID) else {
            continue;
        };
        if !seen.insert(id) {
            return Err(SyncError::DuplicateElementId {
                element_id: id.to_string(),
            });
        }
        property_block(node, id)?;
        if element_children(node, statics::XML_EXTENSION_ELEMENTS)
            .next()
            .is_some()
        {
            with_container.insert(id.to_string());
        }
    }
    Ok(with_container)
}

#[cfg(test)]
mod tests {
    use super::{check_structure, tracked_elements};
    use crate::config::SyncConfig;
    use crate::error::SyncError;

    #[test]
    fn tracked_elements_match_any_prefix_in_document_order() {
        let xml = r#"<bpmn:definitions xmlns:bpmn="http://www.omg.org/spec/BPMN/20100524/MODEL" xmlns:b2="http://www.omg.org/spec/BPMN/20100524/MODEL">
  <bpmn:process id="P">
    <bpmn:serviceTask id="A"/>
    <bpmn:subProcess id="S">
      <b2:userTask id="B"/>
    </bpmn:subProcess>
    <bpmn:sequenceFlow id="F"/>
    <bpmn:task id="C"/>
  </bpmn:process>
</bpmn:definitions>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let ids: Vec<_> = tracked_elements(&doc, &SyncConfig::default())
            .into_iter()
            .filter_map(|n| n.attribute("id"))
            .collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
    }

    #[test]
    fn depth_limit_stops_descent() {
        let xml = r#"<definitions><process><subProcess><task id="deep"/></subProcess><task id="shallow"/></process></definitions>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let config = SyncConfig {
            max_depth: 2,
            ..SyncConfig::default()
        };
        let ids: Vec<_> = tracked_elements(&doc, &config)
            .into_iter()
            .filter_map(|n| n.attribute("id"))
            .collect();
        assert_eq!(ids, vec!["shallow"]);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let xml = r#"<process><task id="A"/><serviceTask id="A"/></process>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let err = check_structure(&doc, &SyncConfig::default()).unwrap_err();
        assert!(matches!(err, SyncError::DuplicateElementId { element_id } if element_id == "A"));
    }

    #[test]
    fn containers_are_found_after_other_children() {
        let xml = r#"<process>
  <task id="A"><incoming>F1</incoming><extensionElements/></task>
  <task id="B"><incoming>F2</incoming></task>
</process>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let with_container = check_structure(&doc, &SyncConfig::default()).unwrap();
        assert!(with_container.contains("A"));
        assert!(!with_container.contains("B"));
    }
}
