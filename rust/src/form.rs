//! Form submission: validation of the user's selections and the entry
//! point that runs one batch.

use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::batch::{BatchError, BatchReport, apply_batch};
use crate::code::{Clock, CodeError, CodeGen, CodeRequest};
use crate::format::{DateTemplate, SuffixFormat};
use crate::store::{FieldMeta, FieldType, RecordStore, StoreError, ViewMeta, ViewType};

/// Errors raised before or while running a submitted form.
#[derive(Error, Debug)]
pub enum FormError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("Unknown table: {0}")]
    UnknownTable(String),
    #[error("View {0} is not a grid view of the table")]
    NotAGridView(String),
    #[error("Field {0} is not a text field of the table")]
    NotATextField(String),
    #[error(transparent)]
    Code(#[from] CodeError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Batch(#[from] BatchError),
}

/// Raw form values as the form layer submits them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeForm {
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub target_view: Option<String>,
    #[serde(default)]
    pub target_field: Option<String>,
    #[serde(default)]
    pub code_prefix: Option<String>,
    #[serde(default)]
    pub code_format: Option<usize>,
    #[serde(default)]
    pub code_suffix: Option<usize>,
}

/// A form whose required selections are all present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub table_id: String,
    pub view_id: String,
    pub field_id: String,
    pub request: CodeRequest,
}

fn required(value: &Option<String>, name: &'static str) -> Result<String, FormError> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(FormError::MissingField(name)),
    }
}

impl CodeForm {
    /// Empty form with `table` taken from the host's current selection.
    pub async fn prefilled<S: RecordStore>(store: &S) -> Result<Self, FormError> {
        let selection = store.selection().await?;
        Ok(Self {
            table: selection.table_id,
            ..Self::default()
        })
    }

    /// Check required selections and format indices.
    pub fn validate(&self) -> Result<Submission, FormError> {
        let table_id = required(&self.table, "table")?;
        let view_id = required(&self.target_view, "targetView")?;
        let field_id = required(&self.target_field, "targetField")?;
        let date_format = self
            .code_format
            .ok_or(FormError::MissingField("codeFormat"))?;
        let suffix_format = self
            .code_suffix
            .ok_or(FormError::MissingField("codeSuffix"))?;

        DateTemplate::from_index(date_format)?;
        SuffixFormat::from_index(suffix_format)?;

        Ok(Submission {
            table_id,
            view_id,
            field_id,
            request: CodeRequest::new(
                self.code_prefix.clone().unwrap_or_default(),
                date_format,
                suffix_format,
            ),
        })
    }
}

/// Views the form offers: grid views only.
pub async fn grid_views<S: RecordStore>(
    store: &S,
    table_id: &str,
) -> Result<Vec<ViewMeta>, StoreError> {
    let views = store.list_views(table_id).await?;
    Ok(views
        .into_iter()
        .filter(|v| v.view_type == ViewType::Grid)
        .collect())
}

/// Fields the form offers as targets: text fields only.
pub async fn text_fields<S: RecordStore>(
    store: &S,
    table_id: &str,
) -> Result<Vec<FieldMeta>, StoreError> {
    let fields = store.list_fields(table_id).await?;
    Ok(fields
        .into_iter()
        .filter(|f| f.field_type == FieldType::Text)
        .collect())
}

impl Submission {
    /// Confirm the selections exist in the store and are usable targets.
    pub async fn check<S: RecordStore>(&self, store: &S) -> Result<(), FormError> {
        let tables = store.list_tables().await?;
        if !tables.iter().any(|t| t.id == self.table_id) {
            return Err(FormError::UnknownTable(self.table_id.clone()));
        }
        if !grid_views(store, &self.table_id)
            .await?
            .iter()
            .any(|v| v.id == self.view_id)
        {
            return Err(FormError::NotAGridView(self.view_id.clone()));
        }
        if !text_fields(store, &self.table_id)
            .await?
            .iter()
            .any(|f| f.id == self.field_id)
        {
            return Err(FormError::NotATextField(self.field_id.clone()));
        }
        Ok(())
    }
}

/// Validate the form, then write one code per visible record of the view.
pub async fn submit<S, C>(store: &S, form: &CodeForm, clock: C) -> Result<BatchReport, FormError>
where
    S: RecordStore,
    C: Clock,
{
    let submission = form.validate()?;
    submission.check(store).await?;

    let mut generator = CodeGen::with_clock(&submission.request, clock)?;
    let record_ids = store
        .visible_record_ids(&submission.table_id, &submission.view_id)
        .await?;
    info!(
        "submitting view {} of table {} ({} visible row(s))",
        submission.view_id,
        submission.table_id,
        record_ids.len()
    );

    Ok(apply_batch(
        store,
        &submission.table_id,
        &record_ids,
        &submission.field_id,
        &mut generator,
    )
    .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::FixedClock;
    use crate::store::tests::sample_store;
    use chrono::NaiveDate;
    use futures::executor::block_on;

    fn clock() -> FixedClock {
        FixedClock(
            NaiveDate::from_ymd_opt(2024, 3, 5)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        )
    }

    fn form(view: &str, field: &str) -> CodeForm {
        CodeForm {
            table: Some("tbl_orders".to_string()),
            target_view: Some(view.to_string()),
            target_field: Some(field.to_string()),
            code_prefix: Some("PO-".to_string()),
            code_format: Some(4),
            code_suffix: Some(0),
        }
    }

    #[test]
    fn test_validate_reports_first_missing_field() {
        let mut f = form("viw_all", "fld_code");
        f.target_view = Some(String::new());
        assert!(matches!(
            f.validate(),
            Err(FormError::MissingField("targetView"))
        ));

        f = form("viw_all", "fld_code");
        f.code_suffix = None;
        assert!(matches!(
            f.validate(),
            Err(FormError::MissingField("codeSuffix"))
        ));

        assert!(matches!(
            CodeForm::default().validate(),
            Err(FormError::MissingField("table"))
        ));
    }

    #[test]
    fn test_validate_defaults_prefix_and_checks_indices() {
        let mut f = form("viw_all", "fld_code");
        f.code_prefix = None;
        let s = f.validate().unwrap();
        assert_eq!(s.request, CodeRequest::new("", 4, 0));

        f.code_format = Some(6);
        assert!(matches!(
            f.validate(),
            Err(FormError::Code(CodeError::UnknownDateFormat(6)))
        ));
    }

    #[test]
    fn test_form_deserializes_from_camel_case() {
        let f: CodeForm = serde_json::from_str(
            r#"{"table":"tbl_orders","targetView":"viw_all","targetField":"fld_code",
                "codeFormat":5,"codeSuffix":2}"#,
        )
        .unwrap();
        assert_eq!(f.code_prefix, None);
        assert_eq!(f.validate().unwrap().request.date_format, 5);
    }

    #[test]
    fn test_discovery_filters() {
        let store = sample_store();
        let views = block_on(grid_views(&store, "tbl_orders")).unwrap();
        let ids: Vec<&str> = views.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["viw_all", "viw_gaps"]);

        let fields = block_on(text_fields(&store, "tbl_orders")).unwrap();
        let ids: Vec<&str> = fields.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["fld_code", "fld_note"]);
    }

    #[test]
    fn test_prefilled_uses_selection() {
        let store = sample_store();
        let f = block_on(CodeForm::prefilled(&store)).unwrap();
        assert_eq!(f.table.as_deref(), Some("tbl_orders"));
        assert_eq!(f.target_view, None);
    }

    #[test]
    fn test_submit_writes_visible_records() {
        let store = sample_store();
        let report = block_on(submit(&store, &form("viw_gaps", "fld_code"), clock())).unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.written[0].record_id, "rec_c");
        assert_eq!(report.written[0].code, "PO-2024030501");
        assert_eq!(report.written[1].record_id, "rec_a");
        assert_eq!(report.written[1].code, "PO-2024030502");

        let rec_b = block_on(store.get_record("tbl_orders", "rec_b")).unwrap();
        assert!(rec_b.fields.is_empty());
    }

    #[test]
    fn test_submit_rejects_unusable_targets() {
        let store = sample_store();
        assert!(matches!(
            block_on(submit(&store, &form("viw_board", "fld_code"), clock())),
            Err(FormError::NotAGridView(_))
        ));
        assert!(matches!(
            block_on(submit(&store, &form("viw_all", "fld_qty"), clock())),
            Err(FormError::NotATextField(_))
        ));

        let mut f = form("viw_all", "fld_code");
        f.table = Some("tbl_nope".to_string());
        assert!(matches!(
            block_on(submit(&store, &f, clock())),
            Err(FormError::UnknownTable(_))
        ));

        let untouched = block_on(store.get_record("tbl_orders", "rec_c")).unwrap();
        assert_eq!(untouched.fields["fld_code"].as_text(), Some("old"));
    }
}
