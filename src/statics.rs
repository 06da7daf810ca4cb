// Constants shared by the sync engine and the GUI: markup names, config defaults and UI text.

// BPMN / extension markup local names. Matching is by local name only, so any prefix works.
pub const XML_EXTENSION_ELEMENTS: &str = "extensionElements";
pub const XML_PROPERTIES: &str = "properties";
pub const XML_PROPERTY: &str = "property";
pub const XML_DOCUMENTATION: &str = "documentation";
pub const XML_ATTR_ID: &str = "id";
pub const XML_ATTR_NAME: &str = "name";
pub const XML_ATTR_VALUE: &str = "value";
pub const XML_XMLNS: &str = "xmlns";

// Defaults for `SyncConfig`.
pub const DEFAULT_EXTENSION_NAMESPACE: &str = "http://camunda.org/schema/1.0/bpmn";
pub const DEFAULT_EXTENSION_PREFIX: &str = "camunda";
pub const DEFAULT_INDENT: &str = "  ";
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;
pub const DEFAULT_MAX_DEPTH: usize = 64;
pub const DEFAULT_TRACKED_KINDS: &[&str] = &[
    "task",
    "serviceTask",
    "userTask",
    "scriptTask",
    "sendTask",
    "receiveTask",
    "manualTask",
    "businessRuleTask",
];

// Property names with a default validation rule.
pub const PROP_VERSION: &str = "version";
pub const PROP_SERVICE_VERSION: &str = "service.version";
pub const PROP_SERVICE_ID: &str = "service.id";

// Newline constants (used for document formatting).
pub const NL_LF: &str = "\n";
pub const NL_CRLF: &str = "\r\n";

// Environment variable naming an optional TOML config file.
pub const ENV_CONFIG_PATH: &str = "BPMNSYNC_CONFIG";

// English UI strings (EN_ prefix to make future localization easier)
pub const EN_APP_TITLE: &str = "BPMN Property Sync";

pub const EN_BTN_OPEN: &str = "Open...";
pub const EN_BTN_SAVE_AS: &str = "Save As...";
pub const EN_BTN_CLEAR: &str = "Clear";
pub const EN_BTN_ADD_PROPERTY: &str = "Add property";
pub const EN_BTN_REMOVE: &str = "Remove";
pub const EN_BTN_APPLY: &str = "Apply";
pub const EN_BTN_DISCARD: &str = "Discard edits";

pub const EN_VIEW_DIAGRAM: &str = "Diagram";
pub const EN_VIEW_XML: &str = "XML";
pub const EN_CHECKBOX_EDIT_XML: &str = "Enable XML editing";

pub const EN_HOME_HEADING: &str = "BPMN Property Sync";
pub const EN_HOME_INSTRUCTIONS: &str = "Open a BPMN file (.bpmn/.xml) to begin.";

pub const EN_HEADING_ELEMENTS: &str = "Elements";
pub const EN_HEADING_PROPERTIES: &str = "Properties";

pub const EN_COL_ID: &str = "ID";
pub const EN_COL_KIND: &str = "Kind";
pub const EN_COL_NAME: &str = "Name";
pub const EN_COL_PROPERTY: &str = "Property";
pub const EN_COL_VALUE: &str = "Value";

pub const EN_HINT_PROPERTY_NAME: &str = "name";
pub const EN_HINT_PROPERTY_VALUE: &str = "value";
pub const EN_HINT_FILTER: &str = "Filter by id or name";
pub const EN_SELECT_ELEMENT: &str = "Select an element.";
pub const EN_NO_PROPERTIES: &str = "No properties.";

pub const EN_STATUS_READ_ONLY: &str = "XML is read-only. Enable editing to change it.";
pub const EN_STATUS_EDITING: &str = "Editing XML. Changes sync after a short pause.";
pub const EN_STATUS_SYNCED: &str = "Synced";
pub const EN_STATUS_PENDING: &str = "Pending sync...";
pub const EN_STATUS_DISCARDED: &str = "Discarded pending XML edits";

pub const EN_LABEL_ELEMENTS_COUNT: &str = "elements:";
pub const EN_LABEL_VIEW: &str = "view:";
pub const EN_ERR_NOTHING_SELECTED: &str = "No element selected";

pub const EN_BADGE_DIRTY: &str = "dirty";
pub const EN_BADGE_LOCKED: &str = "diagram locked while XML is editable";
pub const EN_PLACEHOLDER_UNSAVED: &str = "<unsaved>";
pub const EN_EMPTY: &str = "";
