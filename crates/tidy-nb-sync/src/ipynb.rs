//! Jupyter notebook (.ipynb) reading and generation.
//!
//! Reads the container format into a [`Document`] and writes a document
//! back out with minimal per-cell metadata.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tidy_nb_core::{Cell, CellKind, Document};

use crate::error::{SyncError, SyncResult};

/// Format version written when the document does not carry one.
const DEFAULT_FORMAT: (u32, u32) = (4, 5);

/// A Jupyter notebook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JupyterNotebook {
    /// Notebook cells
    pub cells: Vec<JupyterCell>,

    /// Notebook metadata, kept as-is
    #[serde(default)]
    pub metadata: Map<String, Value>,

    /// Format version
    #[serde(default = "default_nbformat")]
    pub nbformat: u32,

    /// Minor format version
    #[serde(default)]
    pub nbformat_minor: u32,
}

fn default_nbformat() -> u32 {
    DEFAULT_FORMAT.0
}

/// A Jupyter cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JupyterCell {
    /// Cell type; absent means code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell_type: Option<String>,

    /// Cell id (nbformat 4.5 and later)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Cell metadata
    #[serde(default)]
    pub metadata: CellMetadata,

    /// Cell source
    #[serde(default)]
    pub source: CellSource,

    /// Cell outputs (for code cells)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<Value>>,

    /// Execution count (for code cells); `Some(None)` is written as `null`
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_execution_count"
    )]
    pub execution_count: Option<Option<u32>>,
}

fn deserialize_execution_count<'de, D>(deserializer: D) -> Result<Option<Option<u32>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<u32>::deserialize(deserializer).map(Some)
}

/// Cell source: either one string or a list of lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellSource {
    Text(String),
    Lines(Vec<String>),
}

impl CellSource {
    /// The source as a single string; lines are concatenated verbatim.
    pub fn text(&self) -> String {
        match self {
            CellSource::Text(text) => text.clone(),
            CellSource::Lines(lines) => lines.concat(),
        }
    }
}

impl Default for CellSource {
    fn default() -> Self {
        CellSource::Lines(Vec::new())
    }
}

/// Cell metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CellMetadata {
    /// Explicit cell name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Jupyter display settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jupyter: Option<JupyterDisplay>,

    /// Everything else, passed through on read
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The `jupyter` block of cell metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JupyterDisplay {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_hidden: Option<bool>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Kernel specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelSpec {
    pub display_name: String,
    pub language: String,
    pub name: String,
}

/// Language information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageInfo {
    pub name: String,
    pub file_extension: String,
    pub mimetype: String,
}

impl Default for KernelSpec {
    fn default() -> Self {
        Self {
            display_name: "Python 3".to_string(),
            language: "python".to_string(),
            name: "python3".to_string(),
        }
    }
}

impl Default for LanguageInfo {
    fn default() -> Self {
        Self {
            name: "python".to_string(),
            file_extension: ".py".to_string(),
            mimetype: "text/x-python".to_string(),
        }
    }
}

/// Notebook metadata used when the document does not carry its own.
pub fn default_metadata() -> SyncResult<Map<String, Value>> {
    let mut metadata = Map::new();
    metadata.insert("kernelspec".to_string(), serde_json::to_value(KernelSpec::default())?);
    metadata.insert(
        "language_info".to_string(),
        serde_json::to_value(LanguageInfo::default())?,
    );
    Ok(metadata)
}

impl JupyterNotebook {
    /// Create a new empty notebook.
    pub fn new() -> SyncResult<Self> {
        Ok(Self {
            cells: Vec::new(),
            metadata: default_metadata()?,
            nbformat: DEFAULT_FORMAT.0,
            nbformat_minor: DEFAULT_FORMAT.1,
        })
    }

    /// Parse a notebook from JSON text.
    pub fn from_json(json: &str) -> SyncResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        if !value.get("cells").is_some_and(Value::is_array) {
            return Err(SyncError::Format("missing 'cells' array".to_string()));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Serialize with one-space indentation and a trailing newline, the way
    /// Jupyter itself writes notebooks.
    pub fn to_json(&self) -> SyncResult<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer)?;
        let mut json = String::from_utf8(buf)
            .map_err(|e| SyncError::Format(format!("generated JSON is not UTF-8: {}", e)))?;
        json.push('\n');
        Ok(json)
    }

    /// Write the notebook to a file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> SyncResult<()> {
        let path = path.as_ref();
        let json = self.to_json()?;
        fs::write(path, json).map_err(|e| SyncError::WriteError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Read a notebook from a file.
    pub fn read_from_file(path: impl AsRef<Path>) -> SyncResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| SyncError::ReadError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_json(&content)
    }

    /// Convert into the format-independent document model.
    pub fn into_document(self) -> SyncResult<Document> {
        let mut cells = Vec::with_capacity(self.cells.len());

        for (index, cell) in self.cells.into_iter().enumerate() {
            let kind = match cell.cell_type.as_deref() {
                None => CellKind::Code,
                Some(cell_type) => CellKind::from_cell_type(cell_type).ok_or_else(|| {
                    SyncError::Format(format!(
                        "cell {} has unknown cell_type '{}'",
                        index + 1,
                        cell_type
                    ))
                })?,
            };

            let hidden = cell
                .metadata
                .jupyter
                .as_ref()
                .and_then(|display| display.source_hidden)
                .unwrap_or(false);

            let mut converted = Cell::new(kind, cell.source.text()).with_hide_code(hidden);
            if let Some(name) = cell.metadata.name {
                converted = converted.with_label(name);
            }
            cells.push(converted);
        }

        let mut document = Document::new(cells);
        document.metadata = Some(self.metadata);
        document.format = Some((self.nbformat, self.nbformat_minor));
        Ok(document)
    }
}

/// Parse container-format JSON into a document.
pub fn read_document(json: &str) -> SyncResult<Document> {
    JupyterNotebook::from_json(json)?.into_document()
}

/// Generator for Jupyter notebooks from documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct IpynbGenerator;

impl IpynbGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Generate a Jupyter notebook from a document.
    pub fn generate(&self, document: &Document) -> SyncResult<JupyterNotebook> {
        let (nbformat, nbformat_minor) = document.format.unwrap_or(DEFAULT_FORMAT);
        let metadata = match &document.metadata {
            Some(metadata) => metadata.clone(),
            None => default_metadata()?,
        };
        let with_ids = (nbformat, nbformat_minor) >= DEFAULT_FORMAT;

        let cells = document
            .cells
            .iter()
            .map(|cell| convert_cell(cell, with_ids))
            .collect();

        Ok(JupyterNotebook {
            cells,
            metadata,
            nbformat,
            nbformat_minor,
        })
    }
}

/// nbformat limits cell ids to 64 characters.
const MAX_CELL_ID: usize = 64;

/// The cell name, shortened to fit the id limit. A shortened id ends in
/// `-<position>`; sanitized names never contain `-`, so ids stay unique.
fn cell_id(cell: &Cell) -> String {
    if cell.name.len() <= MAX_CELL_ID {
        return cell.name.clone();
    }
    let suffix = format!("-{}", cell.index + 1);
    let mut id: String = cell
        .name
        .chars()
        .take(MAX_CELL_ID - suffix.len())
        .collect();
    id.push_str(&suffix);
    id
}

fn convert_cell(cell: &Cell, with_id: bool) -> JupyterCell {
    let is_code = cell.kind == CellKind::Code;

    JupyterCell {
        cell_type: Some(cell.kind.as_str().to_string()),
        id: with_id.then(|| cell_id(cell)),
        metadata: CellMetadata {
            name: cell.label.clone().filter(|label| label != "_"),
            // Narrative cells are always rendered without code.
            jupyter: (cell.hide_code && is_code).then(|| JupyterDisplay {
                source_hidden: Some(true),
                extra: Map::new(),
            }),
            extra: Map::new(),
        },
        source: CellSource::Lines(
            cell.raw_text
                .split_inclusive('\n')
                .map(str::to_string)
                .collect(),
        ),
        outputs: is_code.then(Vec::new),
        execution_count: is_code.then_some(None),
    }
}
