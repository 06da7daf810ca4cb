use thiserror::Error;

/// A property value or name rejected at the point of entry.
/// The offending field stays flagged and nothing reaches the cache or the document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("property name must not be empty")]
    EmptyName,

    #[error("invalid property name {name:?}: must start with a letter")]
    InvalidName { name: String },

    #[error("invalid version for {name}: {value:?} (expected X.Y or X.Y.Z)")]
    InvalidVersion { name: String, value: String },

    #[error("invalid identifier for {name}: {value:?} (must start with a letter)")]
    InvalidIdentifier { name: String, value: String },
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("XML parse error: {message}")]
    Parse { message: String },

    #[error("element {element_id} has more than one extension container")]
    DuplicateContainer { element_id: String },

    #[error("element id {element_id} appears more than once")]
    DuplicateElementId { element_id: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("diagram is locked while XML editing is enabled")]
    DiagramLocked,

    #[error("cannot {action} from the {from} view")]
    InvalidTransition {
        from: &'static str,
        action: &'static str,
    },

    #[error("attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),

    #[error("write error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Parse failures are the only errors a user fixes by editing the XML text.
    pub fn is_parse(&self) -> bool {
        matches!(
            self,
            SyncError::Parse { .. }
                | SyncError::DuplicateContainer { .. }
                | SyncError::DuplicateElementId { .. }
        )
    }
}

impl From<roxmltree::Error> for SyncError {
    fn from(e: roxmltree::Error) -> Self {
        SyncError::Parse {
            message: e.to_string(),
        }
    }
}

impl From<quick_xml::Error> for SyncError {
    fn from(e: quick_xml::Error) -> Self {
        SyncError::Parse {
            message: e.to_string(),
        }
    }
}

impl From<std::str::Utf8Error> for SyncError {
    fn from(e: std::str::Utf8Error) -> Self {
        SyncError::Parse {
            message: e.to_string(),
        }
    }
}
