//! Device error code translation
//!
//! Controllers report per-point failures as numeric codes. The built-in table
//! covers the codes of the EXOline family; a controller may host its own
//! table, fetched once per connection and merged over the built-in one.

use async_trait::async_trait;
use exo_core::{ExoError, ExoResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

/// Path of the error code table on the controller's web server
pub const ERROR_CODES_PATH: &str = "/errorcodes.json";

const BUILTIN_ERROR_CODES: &[(i64, &str)] = &[
    (0, "OK"),
    (1, "Wrong data type"),
    (2, "Illegal Text variable load number"),
    (3, "Illegal load number"),
    (4, "Illegal Task load number"),
    (5, "It does not exist"),
    (6, "It already exists"),
    (7, "The DPac does not exist"),
    (8, "The DPac is used by Task(s)"),
    (9, "The Task does not exist"),
    (10, "The Task already exists"),
    (11, "Wrong loading order"),
    (12, "The Task is already installed"),
    (13, "The Task is running"),
    (14, "The Task is already running"),
    (15, "The Task is not running"),
    (16, "The Task is not installed"),
    (17, "The command StepT is not allowed"),
    (18, "The Text variable already exists"),
    (19, "The variable does not exist"),
    (20, "The memory of the controller is full"),
    (21, "(The text is empty)"),
    (22, "The text string is too long. It has been truncated!"),
    (23, "Illegal access level"),
    (24, "Illegal access level"),
    (25, "Illegal parameter value"),
    (26, "Wrong password"),
    (27, "Reserved error code (0x1B)"),
    (28, "Access denied"),
    (29, "The maximum length is too large"),
    (30, "Internal error on hardware device"),
    (31, "Reserved error code (0x1F)"),
    (32, "The procedure Task is used by other Task(s)"),
    (33, "The Text variable memory is full"),
    (34, "The Task is not in step mode"),
    (35, "(The data is empty)"),
    (36, "Reserved error code (0x24)"),
    (37, "Illegal address"),
    (38, "Illegal command"),
    (39, "Wrong message length"),
    (40, "Data too large"),
    (41, "Address outside range"),
    (42, "Wrong file format"),
    (43, "Not allowed"),
    (44, "Internal error (inconsitent tables)"),
    (45, "It is busy for the moment"),
    (46, "Too many break points"),
    (47, "Dataconversion error"),
    (100, "Data invalid"),
    (193, "No Answer"),
    (194, "Internal error"),
    (195, "The configured communication channel does not exist"),
    (196, "Wrong checksum or incorrect answer syntax"),
    (197, "The configured serial port does not exist"),
    (198, "Can not get access to the configured serial port"),
    (199, "The configured serial port is used by something else"),
    (200, "CTS not received"),
    (201, "No response from the configured IP address"),
    (202, "The device with the configured IP address does not support EXOline communication"),
    (203, "Serious TCP/IP error. Check the network installation and configuration"),
    (204, "No configured route for this EXOline address"),
    (205, "The modem is not connected"),
    (206, "End-of-Message not received"),
    (207, "Received message is too long"),
    (208, "Parity or format error"),
    (209, "The serial port is jammed"),
];

/// A translated device error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: i64,
    pub text: String,
}

/// Error code table document hosted by the controller
///
/// `codes` and `texts` are aligned by index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCodeDocument {
    #[serde(default)]
    pub codes: Vec<i64>,
    #[serde(default)]
    pub texts: Vec<String>,
}

/// Mapping from device error code to text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorCodeTable {
    entries: BTreeMap<i64, String>,
}

impl ErrorCodeTable {
    /// Create the built-in table
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN_ERROR_CODES
                .iter()
                .map(|(code, text)| (*code, (*text).to_string()))
                .collect(),
        }
    }

    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Build a table from a controller document
    ///
    /// # Errors
    ///
    /// Returns `ExoError::InvalidData` if `codes` and `texts` differ in length
    pub fn from_document(document: ErrorCodeDocument) -> ExoResult<Self> {
        if document.codes.len() != document.texts.len() {
            return Err(ExoError::InvalidData(format!(
                "Error code document has {} codes but {} texts",
                document.codes.len(),
                document.texts.len()
            )));
        }
        Ok(Self {
            entries: document.codes.into_iter().zip(document.texts).collect(),
        })
    }

    pub fn get(&self, code: i64) -> Option<&str> {
        self.entries.get(&code).map(String::as_str)
    }

    pub fn insert(&mut self, code: i64, text: impl Into<String>) {
        self.entries.insert(code, text.into());
    }

    /// Merge another table over this one; its entries win
    pub fn merge(&mut self, other: ErrorCodeTable) {
        self.entries.extend(other.entries);
    }

    /// Get the text for a code, with a generic fallback
    pub fn describe(&self, code: i64) -> String {
        self.get(code)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Unknown error {}", code))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ErrorCodeTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Source of a controller-hosted error code table
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ErrorCodeSource: Send + Sync {
    /// Fetch the table
    async fn fetch(&self) -> ExoResult<ErrorCodeTable>;
}

/// Error code table fetched over plain HTTP
#[derive(Debug, Clone)]
pub struct HttpErrorCodeSource {
    client: reqwest::Client,
    url: Url,
}

impl HttpErrorCodeSource {
    /// Create a source for a table URL
    ///
    /// # Arguments
    ///
    /// * `url` - Location of the JSON table
    /// * `timeout` - Request timeout
    pub fn new(url: Url, timeout: Duration) -> ExoResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExoError::Transport(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, url })
    }

    /// Create a source for the default table location of a controller
    pub fn for_host(host: &str, timeout: Duration) -> ExoResult<Self> {
        let url = Url::parse(&format!("http://{}{}", host, ERROR_CODES_PATH))
            .map_err(|e| ExoError::InvalidData(format!("Invalid error code URL: {}", e)))?;
        Self::new(url, timeout)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl ErrorCodeSource for HttpErrorCodeSource {
    async fn fetch(&self) -> ExoResult<ErrorCodeTable> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ExoError::Transport(format!("Error code request failed: {}", e)))?;
        let document: ErrorCodeDocument = response
            .json()
            .await
            .map_err(|e| ExoError::InvalidData(format!("Error code table is not valid: {}", e)))?;
        ErrorCodeTable::from_document(document)
    }
}

/// Translates device error codes for one client
///
/// The controller table is fetched on first use after each `reset`, at most
/// once, and failures leave the built-in table in place.
pub struct ErrorTranslator {
    table: ErrorCodeTable,
    source: Option<Box<dyn ErrorCodeSource>>,
    loaded: bool,
}

impl ErrorTranslator {
    pub fn new(source: Option<Box<dyn ErrorCodeSource>>) -> Self {
        Self {
            table: ErrorCodeTable::builtin(),
            source,
            loaded: false,
        }
    }

    /// Create a translator that only knows the built-in table
    pub fn builtin() -> Self {
        Self::new(None)
    }

    /// Fetch and merge the controller table if not yet attempted
    pub async fn ensure_loaded(&mut self) {
        if self.loaded {
            return;
        }
        self.loaded = true;

        let Some(source) = self.source.as_ref() else {
            return;
        };
        match source.fetch().await {
            Ok(table) => {
                log::debug!("Merging {} controller error codes", table.len());
                self.table.merge(table);
            }
            Err(e) => {
                log::debug!("Keeping built-in error codes: {}", e);
            }
        }
    }

    /// Forget the controller table, for a new connection
    pub fn reset(&mut self) {
        self.table = ErrorCodeTable::builtin();
        self.loaded = false;
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn table(&self) -> &ErrorCodeTable {
        &self.table
    }

    pub fn describe(&self, code: i64) -> String {
        self.table.describe(code)
    }

    pub fn detail(&self, code: i64) -> ErrorDetail {
        ErrorDetail {
            code,
            text: self.describe(code),
        }
    }
}

impl std::fmt::Debug for ErrorTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorTranslator")
            .field("entries", &self.table.len())
            .field("has_source", &self.source.is_some())
            .field("loaded", &self.loaded)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_builtin_table() {
        let table = ErrorCodeTable::builtin();
        assert_eq!(table.describe(19), "The variable does not exist");
        assert_eq!(table.describe(209), "The serial port is jammed");
        assert_eq!(table.describe(150), "Unknown error 150");
        assert_eq!(table.describe(-3), "Unknown error -3");
    }

    #[test]
    fn test_merge_prefers_device_entries() {
        let mut table = ErrorCodeTable::builtin();
        let device = ErrorCodeTable::from_document(ErrorCodeDocument {
            codes: vec![19, 500],
            texts: vec!["Variable missing".to_string(), "Vendor specific".to_string()],
        })
        .unwrap();
        table.merge(device);
        assert_eq!(table.describe(19), "Variable missing");
        assert_eq!(table.describe(500), "Vendor specific");
        assert_eq!(table.describe(26), "Wrong password");
    }

    #[test]
    fn test_document_length_mismatch() {
        let document: ErrorCodeDocument =
            serde_json::from_str(r#"{"codes":[1,2],"texts":["one"]}"#).unwrap();
        let err = assert_err!(ErrorCodeTable::from_document(document));
        assert!(matches!(err, ExoError::InvalidData(_)));
    }

    #[test]
    fn test_http_source_url() {
        let source = assert_ok!(HttpErrorCodeSource::for_host("10.0.0.2", Duration::from_secs(5)));
        assert_eq!(source.url().as_str(), "http://10.0.0.2/errorcodes.json");
    }

    #[tokio::test]
    async fn test_translator_fetches_once() {
        let mut source = MockErrorCodeSource::new();
        source.expect_fetch().times(1).returning(|| {
            let mut table = ErrorCodeTable::empty();
            table.insert(7, "Module missing");
            Ok(table)
        });

        let mut translator = ErrorTranslator::new(Some(Box::new(source)));
        translator.ensure_loaded().await;
        translator.ensure_loaded().await;
        assert!(translator.is_loaded());
        assert_eq!(translator.describe(7), "Module missing");
        assert_eq!(
            translator.detail(1),
            ErrorDetail {
                code: 1,
                text: "Wrong data type".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_translator_keeps_defaults_on_failure() {
        let mut source = MockErrorCodeSource::new();
        source
            .expect_fetch()
            .times(2)
            .returning(|| Err(ExoError::Transport("connection refused".to_string())));

        let mut translator = ErrorTranslator::new(Some(Box::new(source)));
        translator.ensure_loaded().await;
        assert_eq!(translator.describe(7), "The DPac does not exist");

        translator.reset();
        assert!(!translator.is_loaded());
        translator.ensure_loaded().await;
        assert_eq!(translator.table(), &ErrorCodeTable::builtin());
    }
}
