//! Record store abstraction over the host base, plus an in-memory
//! implementation that loads from and saves to a JSON file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

/// Opaque record identifier handed out by the host.
pub type RecordId = String;

/// Errors reported by a record store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Table not found: {0}")]
    TableNotFound(String),
    #[error("View not found: {0}")]
    ViewNotFound(String),
    #[error("Record not found: {0}")]
    RecordNotFound(String),
    #[error("Host error: {0}")]
    Host(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMeta {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewType {
    Grid,
    Kanban,
    Gallery,
    Gantt,
    Form,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewMeta {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub view_type: ViewType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldType {
    Text,
    Number,
    SingleSelect,
    DateTime,
    Checkbox,
    Url,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMeta {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

/// A cell of a type this crate understands, serialized as
/// `{"type": "text", "text": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TypedCell {
    Text { text: String },
    Number { value: f64 },
    Checkbox { checked: bool },
}

/// A cell value. Cells of other host types are kept as raw JSON and
/// written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Typed(TypedCell),
    Raw(serde_json::Value),
}

impl CellValue {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Typed(TypedCell::Text { text: text.into() })
    }

    pub fn number(value: f64) -> Self {
        Self::Typed(TypedCell::Number { value })
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Typed(TypedCell::Text { text }) => Some(text),
            _ => None,
        }
    }
}

/// Field values of one record, keyed by field id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default)]
    pub fields: BTreeMap<String, CellValue>,
}

/// The host's current UI selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_id: Option<String>,
}

/// Operations the host base exposes.
///
/// `visible_record_ids` returns ids in view order; entries may be `None`
/// when the host lists a row without an identifier.
#[allow(async_fn_in_trait)]
pub trait RecordStore {
    async fn list_tables(&self) -> Result<Vec<TableMeta>, StoreError>;

    async fn list_views(&self, table_id: &str) -> Result<Vec<ViewMeta>, StoreError>;

    async fn list_fields(&self, table_id: &str) -> Result<Vec<FieldMeta>, StoreError>;

    async fn visible_record_ids(
        &self,
        table_id: &str,
        view_id: &str,
    ) -> Result<Vec<Option<RecordId>>, StoreError>;

    async fn get_record(&self, table_id: &str, record_id: &str) -> Result<Record, StoreError>;

    async fn set_record(
        &self,
        table_id: &str,
        record_id: &str,
        record: Record,
    ) -> Result<(), StoreError>;

    async fn selection(&self) -> Result<Selection, StoreError> {
        Ok(Selection::default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub view_type: ViewType,
    #[serde(default)]
    pub record_ids: Vec<Option<RecordId>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldMeta>,
    #[serde(default)]
    pub views: Vec<View>,
    #[serde(default)]
    pub records: BTreeMap<RecordId, Record>,
}

/// Serializable snapshot of a whole base.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Base {
    #[serde(default)]
    pub selection: Selection,
    #[serde(default)]
    pub tables: Vec<Table>,
}

impl Base {
    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(data: &str) -> Result<Self, StoreError> {
        Ok(serde_json::from_str(data)?)
    }

    fn table(&self, table_id: &str) -> Result<&Table, StoreError> {
        self.tables
            .iter()
            .find(|t| t.id == table_id)
            .ok_or_else(|| StoreError::TableNotFound(table_id.to_string()))
    }

    fn table_mut(&mut self, table_id: &str) -> Result<&mut Table, StoreError> {
        self.tables
            .iter_mut()
            .find(|t| t.id == table_id)
            .ok_or_else(|| StoreError::TableNotFound(table_id.to_string()))
    }
}

/// [`RecordStore`] backed by an in-memory [`Base`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    base: Mutex<Base>,
}

impl MemoryStore {
    pub fn new(base: Base) -> Self {
        Self {
            base: Mutex::new(base),
        }
    }

    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let data = fs::read_to_string(path)?;
        Ok(Self::new(Base::from_json(&data)?))
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        fs::write(path, self.snapshot().to_json()?)?;
        Ok(())
    }

    /// Clone of the current contents.
    pub fn snapshot(&self) -> Base {
        self.lock().clone()
    }

    pub fn into_base(self) -> Base {
        self.base.into_inner().unwrap_or_else(|e| e.into_inner())
    }

    fn lock(&self) -> MutexGuard<'_, Base> {
        // a panicked writer cannot leave a Base half-updated
        self.base.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl RecordStore for MemoryStore {
    async fn list_tables(&self) -> Result<Vec<TableMeta>, StoreError> {
        Ok(self
            .lock()
            .tables
            .iter()
            .map(|t| TableMeta {
                id: t.id.clone(),
                name: t.name.clone(),
            })
            .collect())
    }

    async fn list_views(&self, table_id: &str) -> Result<Vec<ViewMeta>, StoreError> {
        let base = self.lock();
        Ok(base
            .table(table_id)?
            .views
            .iter()
            .map(|v| ViewMeta {
                id: v.id.clone(),
                name: v.name.clone(),
                view_type: v.view_type,
            })
            .collect())
    }

    async fn list_fields(&self, table_id: &str) -> Result<Vec<FieldMeta>, StoreError> {
        Ok(self.lock().table(table_id)?.fields.clone())
    }

    async fn visible_record_ids(
        &self,
        table_id: &str,
        view_id: &str,
    ) -> Result<Vec<Option<RecordId>>, StoreError> {
        let base = self.lock();
        let view = base
            .table(table_id)?
            .views
            .iter()
            .find(|v| v.id == view_id)
            .ok_or_else(|| StoreError::ViewNotFound(view_id.to_string()))?;
        Ok(view.record_ids.clone())
    }

    async fn get_record(&self, table_id: &str, record_id: &str) -> Result<Record, StoreError> {
        self.lock()
            .table(table_id)?
            .records
            .get(record_id)
            .cloned()
            .ok_or_else(|| StoreError::RecordNotFound(record_id.to_string()))
    }

    async fn set_record(
        &self,
        table_id: &str,
        record_id: &str,
        record: Record,
    ) -> Result<(), StoreError> {
        let mut base = self.lock();
        let slot = base
            .table_mut(table_id)?
            .records
            .get_mut(record_id)
            .ok_or_else(|| StoreError::RecordNotFound(record_id.to_string()))?;
        *slot = record;
        Ok(())
    }

    async fn selection(&self) -> Result<Selection, StoreError> {
        Ok(self.lock().selection.clone())
    }
}
