use crate::config::SyncConfig;
use crate::document::LoadedDocument;
use crate::error::SyncError;
use crate::model::{ElementRegistry, ModelElement};
use crate::statics;
use crate::sync::{SyncOrchestrator, ViewState};
use eframe::egui;
use egui_extras::{Column, TableBuilder};
use std::{collections::HashMap, path::PathBuf, time::Instant};

pub fn run_gui(config: SyncConfig) -> eframe::Result {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1280.0, 900.0]),
        ..Default::default()
    };
    let title = format!("{} {}", statics::EN_APP_TITLE, env!("CARGO_PKG_VERSION"));
    eframe::run_native(
        &title,
        options,
        Box::new(|_cc| {
            Ok(Box::new(BpmnSyncApp {
                config,
                ..Default::default()
            }))
        }),
    )
}

/// One open document with its live model and the orchestrator keeping them in step.
struct Session {
    document: LoadedDocument,
    sync: SyncOrchestrator,
    model: ElementRegistry,
}

impl Session {
    fn open(document: LoadedDocument, config: &SyncConfig) -> Result<Self, SyncError> {
        let model = ElementRegistry::from_document(&document.text, config)?;
        let sync = SyncOrchestrator::new(document.text.clone(), config.clone())?;
        Ok(Self {
            document,
            sync,
            model,
        })
    }

    /// Carry the orchestrator's agreed document into the file buffer (updates `dirty`).
    fn refresh_document(&mut self) {
        self.document.set_text(self.sync.document());
    }
}

enum PanelAction {
    Edit { name: String, value: String },
    Remove { name: String },
}

/// The main application state and GUI logic.
#[derive(Default)]
struct BpmnSyncApp {
    config: SyncConfig,
    session: Option<Session>,
    dialog_dir: Option<PathBuf>,
    filter: String,

    // Mirror of the XML text widget; handed to the orchestrator on every change.
    text_buffer: String,

    // Per-property value buffers for the selected element, and validation messages per field.
    edit_buffers: HashMap<String, String>,
    field_errors: HashMap<String, String>,
    new_prop_name: String,
    new_prop_value: String,

    status: String,
    last_error: Option<String>,
}

impl BpmnSyncApp {
    fn file_dialog(&self) -> rfd::FileDialog {
        let mut dlg = rfd::FileDialog::new().add_filter("BPMN", &["bpmn", "xml"]);
        if let Some(dir) = self.dialog_dir.clone() {
            dlg = dlg.set_directory(dir);
        }
        dlg
    }

    fn open_file(&mut self) {
        let Some(path) = self.file_dialog().pick_file() else {
            return;
        };

        let document = match LoadedDocument::load_path(&path) {
            Ok(document) => document,
            Err(e) => {
                self.last_error = Some(format!("Failed to load: {e:#}"));
                return;
            }
        };

        match Session::open(document, &self.config) {
            Ok(session) => {
                self.dialog_dir = path.parent().map(PathBuf::from);
                self.status = format!("Loaded {}", path.display());
                self.text_buffer = session.sync.text().to_string();
                self.session = Some(session);
                self.reset_panel_buffers();
                self.filter.clear();
                self.last_error = None;
            }
            Err(e) => {
                self.last_error = Some(format!("Failed to load: {e}"));
            }
        }
    }

    fn save_file_as(&mut self) {
        let mut dlg = self.file_dialog();
        if let Some(session) = self.session.as_ref()
            && let Some(source_path) = session.document.source_path.as_ref()
            && let Some(file_name) = source_path.file_name()
        {
            dlg = dlg.set_file_name(file_name.to_string_lossy());
        }

        let Some(path) = dlg.save_file() else {
            return;
        };

        let Some(session) = self.session.as_mut() else {
            return;
        };

        if let Err(e) = session.sync.snapshot_document(&mut session.model) {
            self.last_error = Some(format!("Failed to save: {e}"));
            return;
        }
        session.refresh_document();
        self.text_buffer = session.sync.text().to_string();

        if let Err(e) = session.document.save_to_path(&path) {
            self.last_error = Some(format!("Failed to save: {e:#}"));
        } else {
            self.dialog_dir = path.parent().map(PathBuf::from);
            self.status = format!("Saved {}", path.display());
            self.last_error = None;
        }
    }

    fn reset_panel_buffers(&mut self) {
        self.edit_buffers.clear();
        self.field_errors.clear();
        self.new_prop_name.clear();
        self.new_prop_value.clear();
    }

    fn switch_view(&mut self, session: &mut Session, target: ViewState) {
        let result = match target {
            ViewState::Diagram => session
                .sync
                .enter_diagram_view(&mut session.model)
                .map(|_| ()),
            _ => session
                .sync
                .enter_text_view(&mut session.model)
                .map(|_| ()),
        };
        match result {
            Ok(()) => {
                session.refresh_document();
                self.text_buffer = session.sync.text().to_string();
                self.reset_panel_buffers();
                self.last_error = None;
            }
            Err(e) => self.last_error = Some(e.to_string()),
        }
    }

    fn set_edit_enabled(&mut self, session: &mut Session, enabled: bool) {
        match session.sync.set_edit_enabled(enabled, &mut session.model) {
            Ok(()) => {
                session.refresh_document();
                self.text_buffer = session.sync.text().to_string();
            }
            Err(e) => self.last_error = Some(e.to_string()),
        }
    }

    fn apply_panel_action(&mut self, session: &mut Session, element_id: &str, action: PanelAction) {
        let (name, result) = match action {
            PanelAction::Edit { name, value } => {
                let result =
                    session
                        .sync
                        .on_property_edited(&mut session.model, element_id, &name, &value);
                (name, result)
            }
            PanelAction::Remove { name } => {
                let result = session
                    .sync
                    .on_property_removed(&mut session.model, element_id, &name);
                (name, result)
            }
        };

        match result {
            Ok(()) => {
                self.field_errors.remove(&name);
                self.edit_buffers.remove(&name);
                session.refresh_document();
                self.status = format!("{element_id}.{name} updated");
                self.last_error = None;
            }
            Err(SyncError::Validation(e)) => {
                self.field_errors.insert(name, e.to_string());
            }
            Err(e) => self.last_error = Some(e.to_string()),
        }
    }

    fn render_elements_panel(&mut self, ui: &mut egui::Ui, session: &mut Session) {
        ui.heading(statics::EN_HEADING_ELEMENTS);
        ui.add(egui::TextEdit::singleline(&mut self.filter).hint_text(statics::EN_HINT_FILTER));
        ui.separator();

        let mut clicked = None;
        let selected = session.sync.selected().map(str::to_string);
        let row_h = ui.text_style_height(&egui::TextStyle::Body) + 6.0;
        ui.push_id("elements_table", |ui| {
            TableBuilder::new(ui)
                .striped(true)
                .cell_layout(egui::Layout::left_to_right(egui::Align::Center))
                .column(Column::initial(140.0).resizable(true))
                .column(Column::initial(110.0).resizable(true))
                .column(Column::remainder())
                .header(row_h, |mut header| {
                    header.col(|ui| {
                        ui.strong(statics::EN_COL_ID);
                    });
                    header.col(|ui| {
                        ui.strong(statics::EN_COL_KIND);
                    });
                    header.col(|ui| {
                        ui.strong(statics::EN_COL_NAME);
                    });
                })
                .body(|mut body| {
                    for element in filter_elements(&session.model, &self.filter) {
                        body.row(row_h, |mut row| {
                            let is_selected = selected.as_deref() == Some(element.id.as_str());
                            row.col(|ui| {
                                if ui.selectable_label(is_selected, &element.id).clicked() {
                                    clicked = Some(element.id.clone());
                                }
                            });
                            row.col(|ui| {
                                ui.monospace(&element.kind);
                            });
                            row.col(|ui| {
                                ui.label(element.name.as_deref().unwrap_or(statics::EN_EMPTY));
                            });
                        });
                    }
                });
        });

        if let Some(id) = clicked {
            session.sync.on_selection_changed(Some(&id));
            self.reset_panel_buffers();
        }
    }

    fn render_properties_panel(&mut self, ui: &mut egui::Ui, session: &Session) -> Option<PanelAction> {
        ui.heading(statics::EN_HEADING_PROPERTIES);
        ui.separator();

        let Some(element) = session.sync.selected().and_then(|id| session.model.get(id)) else {
            ui.label(statics::EN_SELECT_ELEMENT);
            return None;
        };
        ui.label(element_label(element));
        ui.separator();

        let mut action = None;
        if element.properties.is_empty() {
            ui.label(statics::EN_NO_PROPERTIES);
        } else {
            let row_h = ui.text_style_height(&egui::TextStyle::Body) + 8.0;
            ui.push_id("properties_table", |ui| {
                TableBuilder::new(ui)
                    .striped(true)
                    .cell_layout(egui::Layout::left_to_right(egui::Align::Center))
                    .column(Column::initial(200.0).resizable(true))
                    .column(Column::remainder().resizable(true))
                    .column(Column::initial(140.0).resizable(false))
                    .header(row_h, |mut header| {
                        header.col(|ui| {
                            ui.strong(statics::EN_COL_PROPERTY);
                        });
                        header.col(|ui| {
                            ui.strong(statics::EN_COL_VALUE);
                        });
                        header.col(|_ui| {});
                    })
                    .body(|mut body| {
                        for (name, value) in element.properties.iter() {
                            body.row(row_h, |mut row| {
                                row.col(|ui| {
                                    ui.monospace(name);
                                });
                                row.col(|ui| {
                                    let buffer = self
                                        .edit_buffers
                                        .entry(name.to_string())
                                        .or_insert_with(|| value.to_string());
                                    let resp = ui.add(
                                        egui::TextEdit::singleline(buffer)
                                            .desired_width(f32::INFINITY),
                                    );
                                    if let Some(msg) = self.field_errors.get(name) {
                                        ui.colored_label(egui::Color32::RED, msg);
                                    }
                                    let submitted =
                                        resp.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                                    if submitted && buffer.as_str() != value {
                                        action = Some(PanelAction::Edit {
                                            name: name.to_string(),
                                            value: buffer.clone(),
                                        });
                                    }
                                });
                                row.col(|ui| {
                                    if ui.small_button(statics::EN_BTN_APPLY).clicked()
                                        && let Some(buffer) = self.edit_buffers.get(name)
                                    {
                                        action = Some(PanelAction::Edit {
                                            name: name.to_string(),
                                            value: buffer.clone(),
                                        });
                                    }
                                    if ui.small_button(statics::EN_BTN_REMOVE).clicked() {
                                        action = Some(PanelAction::Remove {
                                            name: name.to_string(),
                                        });
                                    }
                                });
                            });
                        }
                    });
            });
        }

        ui.separator();
        ui.horizontal(|ui| {
            ui.add(
                egui::TextEdit::singleline(&mut self.new_prop_name)
                    .hint_text(statics::EN_HINT_PROPERTY_NAME)
                    .desired_width(180.0),
            );
            ui.add(
                egui::TextEdit::singleline(&mut self.new_prop_value)
                    .hint_text(statics::EN_HINT_PROPERTY_VALUE)
                    .desired_width(240.0),
            );
            if ui.button(statics::EN_BTN_ADD_PROPERTY).clicked() {
                action = Some(PanelAction::Edit {
                    name: self.new_prop_name.trim().to_string(),
                    value: self.new_prop_value.clone(),
                });
            }
        });
        if let Some(msg) = self.field_errors.get(self.new_prop_name.trim()) {
            ui.colored_label(egui::Color32::RED, msg);
        }

        action
    }

    fn render_xml_view(&mut self, ui: &mut egui::Ui, session: &mut Session) {
        let editable = session.sync.edit_enabled();
        ui.horizontal(|ui| {
            if session.sync.has_unsynced_edits()
                && ui.button(statics::EN_BTN_DISCARD).clicked()
            {
                session.sync.discard_text_edits();
                self.text_buffer = session.sync.text().to_string();
                self.last_error = None;
            }
            if !editable {
                ui.weak(statics::EN_STATUS_READ_ONLY);
            }
        });
        ui.separator();

        egui::ScrollArea::both()
            .auto_shrink([false, false])
            .show(ui, |ui| {
                let resp = ui.add(
                    egui::TextEdit::multiline(&mut self.text_buffer)
                        .code_editor()
                        .interactive(editable)
                        .desired_width(f32::INFINITY),
                );
                if resp.changed() {
                    session.sync.on_text_changed(&self.text_buffer, Instant::now());
                }
            });
    }
}

/// Elements whose id or name contains `query`, case-insensitively. An empty query keeps all.
fn filter_elements<'a>(model: &'a ElementRegistry, query: &str) -> Vec<&'a ModelElement> {
    let query = query.trim().to_lowercase();
    model
        .iter()
        .filter(|e| {
            query.is_empty()
                || e.id.to_lowercase().contains(&query)
                || e
                    .name
                    .as_deref()
                    .is_some_and(|n| n.to_lowercase().contains(&query))
        })
        .collect()
}

fn element_label(element: &ModelElement) -> String {
    match element.name.as_deref() {
        Some(name) if !name.trim().is_empty() => {
            format!("{} ({}): {}", element.id, element.kind, name)
        }
        _ => format!("{} ({})", element.id, element.kind),
    }
}

impl eframe::App for BpmnSyncApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if let Some(session) = self.session.as_mut() {
            let now = Instant::now();
            if let Some(result) = session.sync.poll(now, &mut session.model) {
                match result {
                    Ok(_) => {
                        session.refresh_document();
                        self.last_error = None;
                    }
                    Err(e) => self.last_error = Some(e.to_string()),
                }
            }
            if let Some(wait) = session.sync.time_until_sync(now) {
                ctx.request_repaint_after(wait);
            }
        }

        let mut session = self.session.take();

        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            egui::MenuBar::new().ui(ui, |ui| {
                if ui.button(statics::EN_BTN_OPEN).clicked() {
                    self.open_file();
                    if self.session.is_some() {
                        session = self.session.take();
                    }
                }

                let has_session = session.is_some();
                if ui
                    .add_enabled(has_session, egui::Button::new(statics::EN_BTN_SAVE_AS))
                    .clicked()
                {
                    self.session = session.take();
                    self.save_file_as();
                    session = self.session.take();
                }

                if let Some(session) = session.as_mut() {
                    ui.separator();
                    let view = session.sync.view();
                    if ui
                        .selectable_label(view == ViewState::Diagram, statics::EN_VIEW_DIAGRAM)
                        .clicked()
                        && view != ViewState::Diagram
                    {
                        self.switch_view(session, ViewState::Diagram);
                    }
                    if ui
                        .selectable_label(view.is_text(), statics::EN_VIEW_XML)
                        .clicked()
                        && !view.is_text()
                    {
                        self.switch_view(session, ViewState::TextReadOnly);
                    }

                    if session.sync.view().is_text() {
                        let mut enabled = session.sync.edit_enabled();
                        if ui
                            .checkbox(&mut enabled, statics::EN_CHECKBOX_EDIT_XML)
                            .changed()
                        {
                            self.set_edit_enabled(session, enabled);
                        }
                    }

                    if !session.sync.status().is_empty() {
                        ui.separator();
                        ui.label(session.sync.status());
                    }
                }

                if !self.status.is_empty() {
                    ui.separator();
                    ui.label(&self.status);
                }
            });
        });

        if let Some(err) = self.last_error.clone() {
            egui::TopBottomPanel::top("error_bar").show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.colored_label(egui::Color32::RED, err);
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.small_button(statics::EN_BTN_CLEAR).clicked() {
                            self.last_error = None;
                            if let Some(session) = session.as_mut() {
                                session.sync.clear_error();
                            }
                        }
                    });
                });
            });
        }

        let Some(mut session) = session else {
            egui::CentralPanel::default().show(ctx, |ui| {
                ui.heading(statics::EN_HOME_HEADING);
                ui.label(statics::EN_HOME_INSTRUCTIONS);
            });
            return;
        };

        // Shown before the side and central panels so it spans the full window width.
        egui::TopBottomPanel::bottom("bottom_status").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(session.document.display_name());
                ui.separator();
                ui.label(format!(
                    "{} {}",
                    statics::EN_LABEL_ELEMENTS_COUNT,
                    session.model.len()
                ));
                ui.separator();
                let view = if session.sync.view().is_text() {
                    statics::EN_VIEW_XML
                } else {
                    statics::EN_VIEW_DIAGRAM
                };
                ui.label(format!("{} {view}", statics::EN_LABEL_VIEW));
                if session.sync.is_diagram_locked() {
                    ui.separator();
                    ui.colored_label(egui::Color32::LIGHT_BLUE, statics::EN_BADGE_LOCKED);
                }
                if session.document.dirty {
                    ui.separator();
                    ui.colored_label(egui::Color32::YELLOW, statics::EN_BADGE_DIRTY);
                }
            });
        });

        if session.sync.view() == ViewState::Diagram {
            egui::SidePanel::left("elements_panel")
                .resizable(true)
                .default_width(420.0)
                .show(ctx, |ui| {
                    self.render_elements_panel(ui, &mut session);
                });

            egui::CentralPanel::default().show(ctx, |ui| {
                let action = self.render_properties_panel(ui, &session);
                if let Some(action) = action {
                    match session.sync.selected().map(str::to_string) {
                        Some(id) => self.apply_panel_action(&mut session, &id, action),
                        None => {
                            self.last_error = Some(statics::EN_ERR_NOTHING_SELECTED.to_string())
                        }
                    }
                }
            });
        } else {
            egui::CentralPanel::default().show(ctx, |ui| {
                self.render_xml_view(ui, &mut session);
            });
        }

        self.session = Some(session);
    }
}

#[cfg(test)]
mod tests {
    use super::{element_label, filter_elements};
    use crate::model::{ElementRegistry, ModelElement};
    use crate::properties::ElementProperties;

    fn element(id: &str, name: Option<&str>) -> ModelElement {
        ModelElement {
            id: id.to_string(),
            kind: "serviceTask".to_string(),
            name: name.map(str::to_string),
            properties: ElementProperties::new(),
        }
    }

    #[test]
    fn filter_matches_id_or_name_case_insensitively() {
        let mut model = ElementRegistry::new();
        model.insert(element("Task_1", Some("Charge Card")));
        model.insert(element("Task_2", None));
        model.insert(element("Ship", Some("Ship order")));

        let ids = |q: &str| -> Vec<String> {
            filter_elements(&model, q)
                .into_iter()
                .map(|e| e.id.clone())
                .collect()
        };
        assert_eq!(ids(""), vec!["Task_1", "Task_2", "Ship"]);
        assert_eq!(ids("task"), vec!["Task_1", "Task_2"]);
        assert_eq!(ids("CHARGE"), vec!["Task_1"]);
        assert_eq!(ids("  order "), vec!["Ship"]);
    }

    #[test]
    fn element_label_skips_blank_names() {
        assert_eq!(
            element_label(&element("Task_1", Some("Charge"))),
            "Task_1 (serviceTask): Charge"
        );
        assert_eq!(element_label(&element("Task_2", Some("  "))), "Task_2 (serviceTask)");
        assert_eq!(element_label(&element("Task_3", None)), "Task_3 (serviceTask)");
    }
}
