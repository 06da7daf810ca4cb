use bpmnsync::{
    ElementModel, ElementRegistry, SyncConfig, SyncError, SyncOrchestrator, ViewState,
};
use pretty_assertions::assert_eq;
use std::time::{Duration, Instant};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

const DOC: &str = r#"<bpmn:definitions xmlns:bpmn="http://www.omg.org/spec/BPMN/20100524/MODEL" xmlns:camunda="http://camunda.org/schema/1.0/bpmn">
  <bpmn:process id="P">
    <bpmn:serviceTask id="Task_1" name="Charge card">
      <bpmn:extensionElements>
        <camunda:properties>
          <camunda:property name="service.type" value="REST"/>
        </camunda:properties>
      </bpmn:extensionElements>
    </bpmn:serviceTask>
    <bpmn:userTask id="Task_2"/>
  </bpmn:process>
</bpmn:definitions>"#;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn open() -> Result<(SyncOrchestrator, ElementRegistry)> {
    let config = SyncConfig::default();
    let model = ElementRegistry::from_document(DOC, &config)?;
    let sync = SyncOrchestrator::new(DOC, config)?;
    Ok((sync, model))
}

fn open_editable() -> Result<(SyncOrchestrator, ElementRegistry)> {
    let (mut sync, mut model) = open()?;
    sync.enter_text_view(&mut model)?;
    sync.set_edit_enabled(true, &mut model)?;
    Ok((sync, model))
}

fn service_type(model: &ElementRegistry) -> Option<String> {
    model
        .properties("Task_1")
        .and_then(|p| p.get("service.type").map(str::to_string))
}

#[test]
fn entering_text_view_without_edits_keeps_document_bytes() -> Result<()> {
    let (mut sync, mut model) = open()?;
    let text = sync.enter_text_view(&mut model)?.to_string();
    assert_eq!(text, DOC);
    assert_eq!(sync.view(), ViewState::TextReadOnly);
    Ok(())
}

#[test]
fn read_only_text_ignores_changes() -> Result<()> {
    let (mut sync, mut model) = open()?;
    sync.enter_text_view(&mut model)?;
    let t0 = Instant::now();

    let edited = sync.text().replace("REST", "SOAP");
    assert!(!sync.on_text_changed(&edited, t0));
    assert!(sync.poll(t0 + ms(1000), &mut model).is_none());

    assert_eq!(sync.text(), DOC);
    assert_eq!(service_type(&model).as_deref(), Some("REST"));
    assert_eq!(model.revision(), 0);
    Ok(())
}

#[test]
fn typing_burst_syncs_once_with_the_final_text() -> Result<()> {
    let (mut sync, mut model) = open_editable()?;
    let t0 = Instant::now();
    let base = sync.text().to_string();

    for i in 0..10u64 {
        let text = base.replace("REST", &format!("REST{i}"));
        assert!(sync.on_text_changed(&text, t0 + ms(i * 100)));
        assert!(sync.poll(t0 + ms(i * 100 + 50), &mut model).is_none());
    }
    assert_eq!(model.revision(), 0);

    // Last keystroke at 900ms.
    assert!(sync.poll(t0 + ms(1399), &mut model).is_none());
    let report = sync
        .poll(t0 + ms(1400), &mut model)
        .expect("sync due")?;
    assert_eq!(report.updated, vec!["Task_1".to_string(), "Task_2".to_string()]);
    assert_eq!(service_type(&model).as_deref(), Some("REST9"));

    // One cycle: one atomic update per element, then nothing more.
    assert_eq!(model.revision(), 2);
    assert!(sync.poll(t0 + ms(5000), &mut model).is_none());
    assert_eq!(model.revision(), 2);
    Ok(())
}

#[test]
fn rest_to_soap_lands_after_the_quiet_period() -> Result<()> {
    let (mut sync, mut model) = open_editable()?;
    let t0 = Instant::now();

    let edited = sync.text().replace("REST", "SOAP");
    sync.on_text_changed(&edited, t0);
    assert!(sync.poll(t0 + ms(600), &mut model).is_some());

    assert_eq!(service_type(&model).as_deref(), Some("SOAP"));
    assert_eq!(
        sync.cache().properties_of("Task_1").get("service.type"),
        Some("SOAP")
    );
    assert_eq!(sync.document(), edited);
    assert!(!sync.has_unsynced_edits());
    Ok(())
}

#[test]
fn clearing_a_value_removes_the_property() -> Result<()> {
    let (mut sync, mut model) = open_editable()?;
    let t0 = Instant::now();

    let edited = sync.text().replace(r#"value="REST""#, r#"value="""#);
    sync.on_text_changed(&edited, t0);
    sync.poll(t0 + ms(500), &mut model).expect("sync due")?;

    let props = model.properties("Task_1").expect("Task_1 in model");
    assert!(!props.contains("service.type"));
    assert!(props.is_empty());
    Ok(())
}

#[test]
fn malformed_text_leaves_everything_untouched() -> Result<()> {
    let (mut sync, mut model) = open_editable()?;
    let t0 = Instant::now();
    let cache_before = sync.cache().clone();

    let broken = sync.text().replace("</bpmn:process>", "");
    sync.on_text_changed(&broken, t0);
    let err = sync
        .poll(t0 + ms(500), &mut model)
        .expect("sync due")
        .unwrap_err();

    assert!(err.is_parse());
    assert!(sync.last_error().is_some());
    assert_eq!(sync.cache(), &cache_before);
    assert_eq!(model.revision(), 0);
    assert_eq!(sync.text(), broken);
    assert_eq!(sync.document(), DOC);

    // Fixing the text syncs normally.
    let fixed = DOC.replace("REST", "gRPC");
    sync.on_text_changed(&fixed, t0 + ms(1000));
    sync.poll(t0 + ms(1500), &mut model).expect("sync due")?;
    assert_eq!(service_type(&model).as_deref(), Some("gRPC"));
    assert_eq!(sync.last_error(), None);
    Ok(())
}

#[test]
fn leaving_text_view_flushes_a_pending_edit() -> Result<()> {
    let (mut sync, mut model) = open_editable()?;
    let t0 = Instant::now();

    let edited = sync.text().replace("REST", "SOAP");
    sync.on_text_changed(&edited, t0);
    let report = sync.enter_diagram_view(&mut model)?;

    assert!(report.is_some());
    assert_eq!(sync.view(), ViewState::Diagram);
    assert_eq!(service_type(&model).as_deref(), Some("SOAP"));
    assert!(sync.poll(t0 + ms(1000), &mut model).is_none());
    Ok(())
}

#[test]
fn leaving_text_view_with_broken_text_is_refused() -> Result<()> {
    let (mut sync, mut model) = open_editable()?;

    sync.on_text_changed("<bpmn:definitions", Instant::now());
    let err = sync.enter_diagram_view(&mut model).unwrap_err();
    assert!(err.is_parse());
    assert_eq!(sync.view(), ViewState::TextEditable);

    sync.discard_text_edits();
    assert!(sync.enter_diagram_view(&mut model)?.is_none());
    assert_eq!(sync.view(), ViewState::Diagram);
    Ok(())
}

#[test]
fn disabling_edit_flushes_and_returns_to_read_only() -> Result<()> {
    let (mut sync, mut model) = open_editable()?;

    let edited = sync.text().replace("REST", "SOAP");
    sync.on_text_changed(&edited, Instant::now());
    sync.set_edit_enabled(false, &mut model)?;

    assert_eq!(sync.view(), ViewState::TextReadOnly);
    assert_eq!(service_type(&model).as_deref(), Some("SOAP"));
    Ok(())
}

#[test]
fn diagram_edit_shows_up_in_the_text_view() -> Result<()> {
    let (mut sync, mut model) = open()?;
    sync.on_property_edited(&mut model, "Task_2", "service.version", "1.2")?;

    let text = sync.enter_text_view(&mut model)?;
    assert!(text.contains(r#"<camunda:property name="service.version" value="1.2"/>"#));
    Ok(())
}

#[test]
fn invalid_diagram_edit_is_rejected() -> Result<()> {
    let (mut sync, mut model) = open()?;

    let err = sync
        .on_property_edited(&mut model, "Task_1", "service.id", "9lives")
        .unwrap_err();
    assert!(matches!(err, SyncError::Validation(_)));
    assert_eq!(model.revision(), 0);
    Ok(())
}

#[test]
fn elements_missing_from_model_stay_cached_and_are_reported() -> Result<()> {
    let (mut sync, mut model) = open_editable()?;

    let edited = sync.text().replace(
        r#"<bpmn:userTask id="Task_2"/>"#,
        r#"<bpmn:userTask id="Task_2"/>
    <bpmn:task id="Task_3">
      <bpmn:extensionElements>
        <camunda:properties>
          <camunda:property name="owner" value="ops"/>
        </camunda:properties>
      </bpmn:extensionElements>
    </bpmn:task>"#,
    );
    sync.on_text_changed(&edited, Instant::now());
    let report = sync.flush(&mut model)?;

    assert_eq!(report.missing, vec!["Task_3".to_string()]);
    assert!(!model.contains("Task_3"));
    assert_eq!(
        sync.cache().properties_of("Task_3").get("owner"),
        Some("ops")
    );
    Ok(())
}

#[test]
fn stale_cache_entries_are_pruned() -> Result<()> {
    let (mut sync, mut model) = open()?;
    model.remove("Task_2");
    sync.enter_text_view(&mut model)?;
    sync.set_edit_enabled(true, &mut model)?;

    let edited = sync
        .text()
        .replace("\n    <bpmn:userTask id=\"Task_2\"/>", "");
    sync.on_text_changed(&edited, Instant::now());
    let report = sync.flush(&mut model)?;

    assert_eq!(report.pruned, vec!["Task_2".to_string()]);
    assert!(!sync.cache().contains("Task_2"));
    Ok(())
}

#[test]
fn emptying_a_value_in_the_panel_drops_it_from_the_document() -> Result<()> {
    let (mut sync, mut model) = open()?;
    sync.on_property_edited(&mut model, "Task_2", "service.type", "REST")?;
    assert!(sync.document().contains(r#"name="service.type" value="REST""#));

    sync.on_property_edited(&mut model, "Task_2", "service.type", "")?;
    assert!(!sync.cache().properties_of("Task_2").contains("service.type"));

    let text = sync.enter_text_view(&mut model)?;
    let task_2 = &text[text.find("Task_2").expect("Task_2 present")..];
    assert!(!task_2.contains("service.type"));
    Ok(())
}

#[test]
fn deleted_element_properties_do_not_come_back_after_a_text_sync() -> Result<()> {
    let (mut sync, mut model) = open()?;
    model.remove("Task_1");
    sync.on_element_removed("Task_1")?;
    assert!(!sync.document().contains("service.type"));

    sync.enter_text_view(&mut model)?;
    sync.set_edit_enabled(true, &mut model)?;
    let edited = sync.text().replace(
        r#"<bpmn:userTask id="Task_2"/>"#,
        r#"<bpmn:userTask id="Task_2" name="Review"/>"#,
    );
    sync.on_text_changed(&edited, Instant::now());
    let report = sync.flush(&mut model)?;

    assert_eq!(report.missing, vec!["Task_1".to_string()]);
    assert!(sync.cache().properties_of("Task_1").is_empty());
    assert!(!sync.text().contains("service.type"));
    Ok(())
}

#[test]
fn panel_edit_on_a_task_whose_container_follows_its_flows() -> Result<()> {
    let doc = r#"<bpmn:definitions xmlns:bpmn="http://www.omg.org/spec/BPMN/20100524/MODEL" xmlns:camunda="http://camunda.org/schema/1.0/bpmn">
  <bpmn:process id="P">
    <bpmn:task id="T">
      <bpmn:incoming>F1</bpmn:incoming>
      <bpmn:extensionElements>
        <camunda:properties>
          <camunda:property name="a" value="1"/>
        </camunda:properties>
      </bpmn:extensionElements>
    </bpmn:task>
  </bpmn:process>
</bpmn:definitions>"#;
    let config = SyncConfig::default();
    let mut model = ElementRegistry::from_document(doc, &config)?;
    let mut sync = SyncOrchestrator::new(doc, config)?;

    sync.on_property_edited(&mut model, "T", "a", "2")?;
    let text = sync.enter_text_view(&mut model)?.to_string();

    assert_eq!(text, doc.replace(r#"value="1""#, r#"value="2""#));
    Ok(())
}
