//! Sync orchestrator: keeps the live element model, the property cache and the XML text in step
//! across view switches and edits on either side.
//!
//! ```text
//!  Diagram --enter_text_view--> TextReadOnly <--set_edit_enabled--> TextEditable
//!     ^                             |                                   |
//!     +------enter_diagram_view-----+-----------------------------------+
//! ```
//!
//! Entering the XML view snapshots the model into the cache and regenerates the text, with
//! editing always off. While editable, text changes restart a debounce timer; when it fires the
//! text is extracted into the cache and pushed into the model. Leaving the XML view flushes
//! an edit the timer has not picked up yet.

use crate::config::SyncConfig;
use crate::debounce::Debouncer;
use crate::error::SyncError;
use crate::model::{ApplyOutcome, ElementModel, apply};
use crate::properties::{ElementProperties, PropertyCache};
use crate::statics;
use crate::validate::Validator;
use crate::xml::{extract, inject};
use std::collections::HashSet;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    Diagram,
    TextReadOnly,
    TextEditable,
}

impl ViewState {
    pub fn is_text(self) -> bool {
        !matches!(self, ViewState::Diagram)
    }

    fn label(self) -> &'static str {
        match self {
            ViewState::Diagram => "diagram",
            ViewState::TextReadOnly => "read-only XML",
            ViewState::TextEditable => "editable XML",
        }
    }
}

/// Outcome of one extract-and-apply cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Elements whose properties were pushed into the model.
    pub updated: Vec<String>,
    /// Elements in the text that the model does not have.
    pub missing: Vec<String>,
    /// Cache entries dropped because neither the text nor the model has the element.
    pub pruned: Vec<String>,
}

#[derive(Debug)]
pub struct SyncOrchestrator {
    config: SyncConfig,
    validator: Validator,
    cache: PropertyCache,
    /// Last document state every side agrees on.
    document: String,
    /// What the XML view shows; differs from `document` only while an edit is unsynced.
    text: String,
    view: ViewState,
    debouncer: Debouncer,
    selected: Option<String>,
    status: String,
    last_error: Option<String>,
}

impl SyncOrchestrator {
    pub fn new(document: impl Into<String>, config: SyncConfig) -> Result<Self, SyncError> {
        let mut sync = Self {
            validator: Validator::new(config.rules.clone()),
            debouncer: Debouncer::new(config.debounce()),
            config,
            cache: PropertyCache::new(),
            document: String::new(),
            text: String::new(),
            view: ViewState::Diagram,
            selected: None,
            status: String::new(),
            last_error: None,
        };
        sync.load_document(document)?;
        Ok(sync)
    }

    /// Start over from a freshly loaded document. The cache is rebuilt from scratch.
    pub fn load_document(&mut self, document: impl Into<String>) -> Result<(), SyncError> {
        let document = document.into();
        let extracted = extract(&document, &self.config)?;

        self.cache.clear_all();
        for (id, props) in extracted {
            self.cache.replace(&id, props);
        }
        self.text = document.clone();
        self.document = document;
        self.view = ViewState::Diagram;
        self.debouncer.cancel();
        self.selected = None;
        self.last_error = None;
        tracing::info!(elements = self.cache.len(), "document loaded");
        Ok(())
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn cache(&self) -> &PropertyCache {
        &self.cache
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn view(&self) -> ViewState {
        self.view
    }

    pub fn edit_enabled(&self) -> bool {
        self.view == ViewState::TextEditable
    }

    /// Diagram-side mutations are refused while the XML is editable.
    pub fn is_diagram_locked(&self) -> bool {
        self.edit_enabled()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    pub fn has_unsynced_edits(&self) -> bool {
        self.text != self.document
    }

    /// How long until a pending text edit syncs, for scheduling the next poll.
    pub fn time_until_sync(&self, now: Instant) -> Option<Duration> {
        self.debouncer.remaining(now)
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn on_selection_changed(&mut self, element_id: Option<&str>) {
        self.selected = element_id.map(str::to_string);
    }

    pub fn selected_properties(&self) -> ElementProperties {
        self.selected
            .as_deref()
            .map(|id| self.cache.properties_of(id))
            .unwrap_or_default()
    }

    /// Switch to the XML view, read-only. The model's current properties are copied into the
    /// cache first so the generated text reflects the latest diagram edits.
    pub fn enter_text_view<M: ElementModel + ?Sized>(
        &mut self,
        model: &mut M,
    ) -> Result<&str, SyncError> {
        self.snapshot_document(model)?;
        self.view = ViewState::TextReadOnly;
        self.debouncer.cancel();
        self.status = statics::EN_STATUS_READ_ONLY.to_string();
        tracing::info!("entered XML view");
        Ok(&self.text)
    }

    /// Bring the document up to date with the model and return it, e.g. before saving.
    /// An unsynced text edit is flushed first.
    pub fn snapshot_document<M: ElementModel + ?Sized>(
        &mut self,
        model: &mut M,
    ) -> Result<&str, SyncError> {
        if self.has_unsynced_edits() {
            self.flush(model)?;
        }

        let mut cache = self.cache.clone();
        for id in model.element_ids() {
            if let Some(props) = model.properties(&id) {
                cache.replace(&id, props);
            }
        }
        self.commit(cache)?;
        Ok(&self.document)
    }

    /// Regenerate the document from `cache`. The cache and the document change together, and
    /// only when generation succeeds.
    fn commit(&mut self, cache: PropertyCache) -> Result<(), SyncError> {
        let text = match inject(&self.document, &cache, &self.config) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "could not regenerate XML");
                self.last_error = Some(e.to_string());
                return Err(e);
            }
        };
        self.cache = cache;
        self.document = text.clone();
        self.text = text;
        Ok(())
    }

    /// Flip the edit toggle of the XML view. Turning editing off first syncs any pending edit.
    pub fn set_edit_enabled<M: ElementModel + ?Sized>(
        &mut self,
        enabled: bool,
        model: &mut M,
    ) -> Result<(), SyncError> {
        if !self.view.is_text() {
            return Err(SyncError::InvalidTransition {
                from: self.view.label(),
                action: "toggle XML editing",
            });
        }

        if enabled {
            self.view = ViewState::TextEditable;
            self.status = statics::EN_STATUS_EDITING.to_string();
        } else {
            if self.has_unsynced_edits() {
                self.flush(model)?;
            }
            self.view = ViewState::TextReadOnly;
            self.status = statics::EN_STATUS_READ_ONLY.to_string();
        }
        tracing::debug!(enabled, "XML edit toggle");
        Ok(())
    }

    /// Accept new text from the XML surface. Ignored unless editing is enabled.
    /// Returns true when the text was taken and a sync scheduled.
    pub fn on_text_changed(&mut self, text: &str, now: Instant) -> bool {
        if self.view != ViewState::TextEditable {
            tracing::debug!(view = self.view.label(), "ignoring text change");
            return false;
        }
        if text == self.text {
            return false;
        }
        self.text = text.to_string();
        self.debouncer.schedule(now);
        self.status = statics::EN_STATUS_PENDING.to_string();
        true
    }

    /// Run the debounced sync when its quiet period has elapsed.
    pub fn poll<M: ElementModel + ?Sized>(
        &mut self,
        now: Instant,
        model: &mut M,
    ) -> Option<Result<SyncReport, SyncError>> {
        if !self.debouncer.poll(now) {
            return None;
        }
        Some(self.flush(model))
    }

    /// Extract the current text into the cache and push every element into the model.
    /// On failure nothing changes except the status, and the text is kept for correction.
    pub fn flush<M: ElementModel + ?Sized>(
        &mut self,
        model: &mut M,
    ) -> Result<SyncReport, SyncError> {
        self.debouncer.cancel();

        let extracted = match extract(&self.text, &self.config) {
            Ok(cache) => cache,
            Err(e) => {
                tracing::warn!(error = %e, "XML edit not applied");
                self.last_error = Some(e.to_string());
                return Err(e);
            }
        };

        let mut report = SyncReport::default();
        let present: HashSet<String> = extracted.ids().map(str::to_string).collect();
        for (id, props) in extracted {
            self.cache.replace(&id, props.clone());
            match apply(model, &id, &props) {
                ApplyOutcome::Applied => report.updated.push(id),
                ApplyOutcome::Missing => report.missing.push(id),
            }
        }

        let stale: Vec<String> = self
            .cache
            .ids()
            .filter(|id| !present.contains(*id) && !model.contains(id))
            .map(str::to_string)
            .collect();
        for id in &stale {
            self.cache.remove(id);
        }
        report.pruned = stale;

        self.document = self.text.clone();
        self.last_error = None;
        self.status = format!(
            "{}: {} element(s) updated",
            statics::EN_STATUS_SYNCED,
            report.updated.len()
        );
        tracing::info!(
            updated = report.updated.len(),
            missing = report.missing.len(),
            pruned = report.pruned.len(),
            "XML edit synced"
        );
        Ok(report)
    }

    /// Switch back to the diagram. An unsynced edit is flushed first; if that fails the view
    /// stays on the XML so the edit is not lost.
    pub fn enter_diagram_view<M: ElementModel + ?Sized>(
        &mut self,
        model: &mut M,
    ) -> Result<Option<SyncReport>, SyncError> {
        if self.view == ViewState::Diagram {
            return Ok(None);
        }
        let report = if self.has_unsynced_edits() {
            Some(self.flush(model)?)
        } else {
            None
        };
        self.debouncer.cancel();
        self.view = ViewState::Diagram;
        self.status.clear();
        tracing::info!("entered diagram view");
        Ok(report)
    }

    /// Throw away unsynced XML edits and show the last synced text again.
    pub fn discard_text_edits(&mut self) {
        self.debouncer.cancel();
        self.text = self.document.clone();
        self.last_error = None;
        self.status = statics::EN_STATUS_DISCARDED.to_string();
    }

    /// A property edited in the properties panel. Validated before anything is touched; a
    /// blank value removes the property. The element's full set is then pushed to the model.
    pub fn on_property_edited<M: ElementModel + ?Sized>(
        &mut self,
        model: &mut M,
        element_id: &str,
        name: &str,
        value: &str,
    ) -> Result<(), SyncError> {
        if self.is_diagram_locked() {
            return Err(SyncError::DiagramLocked);
        }
        self.validator.check(name, value)?;

        let mut props = model
            .properties(element_id)
            .unwrap_or_else(|| self.cache.properties_of(element_id));
        props.insert(name, value);
        let mut cache = self.cache.clone();
        cache.replace(element_id, props.clone());
        self.commit(cache)?;
        apply(model, element_id, &props);
        tracing::debug!(element_id, name, "property edited");
        Ok(())
    }

    /// Remove one property of an element. Same path as an edit with a blank value.
    pub fn on_property_removed<M: ElementModel + ?Sized>(
        &mut self,
        model: &mut M,
        element_id: &str,
        name: &str,
    ) -> Result<(), SyncError> {
        self.on_property_edited(model, element_id, name, "")
    }

    /// The diagram deleted an element; strip its annotations from the document and forget its
    /// cached properties, so a later text sync cannot bring them back.
    pub fn on_element_removed(&mut self, element_id: &str) -> Result<(), SyncError> {
        if self.is_diagram_locked() {
            return Err(SyncError::DiagramLocked);
        }
        let mut cache = self.cache.clone();
        cache.clear(element_id);
        self.commit(cache)?;
        self.cache.remove(element_id);
        if self.selected.as_deref() == Some(element_id) {
            self.selected = None;
        }
        Ok(())
    }
}
