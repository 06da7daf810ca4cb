use bpmnsync::{ElementRegistry, LineEnding, LoadedDocument, SyncConfig, SyncOrchestrator};
use std::io::Write;
use tempfile::NamedTempFile;

fn assert_all_lf_are_crlf(bytes: &[u8]) {
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'\n' {
            assert!(i > 0 && bytes[i - 1] == b'\r', "found bare LF at {i}");
        }
    }
}

fn edit_and_save(input: &[u8]) -> Vec<u8> {
    let mut tmp = NamedTempFile::new().expect("tempfile");
    tmp.write_all(input).expect("write");

    let config = SyncConfig::default();
    let mut doc = LoadedDocument::load_path(tmp.path()).expect("load");
    let mut model = ElementRegistry::from_document(&doc.text, &config).expect("model");
    let mut sync = SyncOrchestrator::new(doc.text.clone(), config).expect("sync");

    sync.on_property_edited(&mut model, "Task_1", "owner", "ops")
        .expect("edit");
    doc.set_text(sync.document());
    assert!(doc.dirty);

    let out = tmp.path().with_extension("out.bpmn");
    doc.save_to_path(&out).expect("save");
    std::fs::read(&out).expect("read back")
}

#[test]
fn modified_document_preserves_crlf() {
    let input = b"<definitions>\r\n  <process id=\"P\">\r\n    <serviceTask id=\"Task_1\"/>\r\n  </process>\r\n</definitions>\r\n";
    let doc = LoadedDocument::from_bytes(input.to_vec()).expect("load");
    assert_eq!(doc.line_ending, LineEnding::CrLf);

    let bytes = edit_and_save(input);
    assert_all_lf_are_crlf(&bytes);
    assert!(String::from_utf8_lossy(&bytes).contains(r#"name="owner" value="ops""#));
}

#[test]
fn modified_document_preserves_lf() {
    let input = b"<definitions>\n  <process id=\"P\">\n    <serviceTask id=\"Task_1\"/>\n  </process>\n</definitions>\n";
    let bytes = edit_and_save(input);

    assert!(
        !bytes.contains(&b'\r'),
        "expected no CR characters in LF output"
    );
    assert!(String::from_utf8_lossy(&bytes).contains(r#"name="owner" value="ops""#));
}
