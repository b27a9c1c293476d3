use thiserror::Error;

/// Failure while turning a JSON or XML document into canonical data.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum FormatError {
    /// JSON syntax or shape error
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    /// XML syntax error
    #[error("XML parse error: {0}")]
    Xml(String),
    /// A required element is absent
    #[error("missing <{element}> element")]
    MissingElement { element: String },
    /// A required attribute is absent
    #[error("<{element}> is missing the '{attribute}' attribute")]
    MissingAttribute { element: String, attribute: String },
    /// An attribute holds a value of the wrong shape
    #[error("<{element}> has invalid {attribute}='{value}'")]
    InvalidValue {
        element: String,
        attribute: String,
        value: String,
    },
    /// Tile layer data could not be read as a list of gids
    #[error("invalid tile data in layer '{layer}': {reason}")]
    InvalidTileData { layer: String, reason: String },
    /// Only csv (xml) and plain arrays (json) are understood
    #[error("unsupported tile data encoding '{0}'")]
    UnsupportedEncoding(String),
    /// Custom property declared with a type Tiled does not define
    #[error("unsupported property type '{kind}' for property '{name}'")]
    UnsupportedPropertyType { name: String, kind: String },
}

/// Error type for every registry, scheduler and loader operation.
///
/// Variants split in two tiers, see [`AssetError::is_critical`].
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum AssetError {
    /// The loader type was never registered
    #[error("loader type '{type_name}' is not registered")]
    UnregisteredLoader { type_name: String },
    /// Blank key/url or bad settings
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The url's extension is not one the structured loader understands
    #[error("unsupported file format for {kind}: {url}")]
    UnsupportedFormat { kind: &'static str, url: String },
    /// An upload function returned an immediate value instead of a deferred upload
    #[error("upload function of '{type_name}' (key '{key}') must return a deferred upload, got an immediate value")]
    InvalidLoaderContract { type_name: String, key: String },
    /// Pending work was still being discovered after the last allowed pass
    #[error("preload did not settle after {passes} upload passes, {pending} file(s) still pending")]
    RecursionLimit { passes: u32, pending: usize },
    /// Network or file system failure
    #[error("failed to fetch '{url}': {reason}")]
    Fetch { url: String, reason: String },
    /// Image or audio bytes could not be decoded
    #[error("failed to decode '{url}': {reason}")]
    Decode { url: String, reason: String },
    /// Structured document could not be normalized
    #[error("failed to read '{url}': {source}")]
    Format {
        url: String,
        #[source]
        source: FormatError,
    },
    /// An upload expected an extra argument that was not supplied
    #[error("'{key}' needs extra argument #{index} ({what})")]
    MissingArgument {
        key: String,
        index: usize,
        what: &'static str,
    },
}

impl AssetError {
    /// Critical errors abort the whole preload; the rest are reported
    /// through `error` events and loading carries on.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            AssetError::UnregisteredLoader { .. }
                | AssetError::InvalidInput(_)
                | AssetError::UnsupportedFormat { .. }
                | AssetError::InvalidLoaderContract { .. }
                | AssetError::RecursionLimit { .. }
        )
    }

    pub(crate) fn format(url: &str, source: FormatError) -> Self {
        AssetError::Format {
            url: url.to_owned(),
            source,
        }
    }
}
