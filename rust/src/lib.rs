//! stampcode: sequential, timestamp-based record codes for spreadsheet bases.
//!
//! A code is a free-form prefix, the current wall-clock time rendered through
//! a date template, and a zero-padded sequence suffix. A batch writes one code
//! into a text field of every visible record of a view, numbering records in
//! view order.
//!
//! # Format
//!
//! ```text
//! CODE ::= PREFIX TIMESTAMP SUFFIX
//! SUFFIX ::= zero-pad(sequence + value(template), len(template))
//! ```
//!
//! # Example
//!
//! ```
//! use stampcode::{CodeGen, CodeRequest};
//!
//! // prefix "PO-", date template "yyyyMMdd", suffix template "01"
//! let mut code_gen = CodeGen::new(&CodeRequest::new("PO-", 4, 0)).expect("valid format indices");
//! let code = code_gen.next_code();
//! println!("{}", code); // e.g., "PO-2024030501"
//! ```

mod batch;
mod code;
mod form;
mod format;
mod store;

pub use batch::{BatchError, BatchReport, RecordFailure, Stage, WrittenCode, apply_batch};
pub use code::{
    Clock, CodeError, CodeGen, CodeRequest, FixedClock, SystemClock, generate, generate_at,
};
pub use form::{CodeForm, FormError, Submission, grid_views, submit, text_fields};
pub use format::{DATE_FORMATS, DateTemplate, SUFFIX_FORMATS, Segment, SuffixFormat, Token};
pub use store::{
    Base, CellValue, FieldMeta, FieldType, MemoryStore, Record, RecordId, RecordStore,
    Selection, StoreError, Table, TableMeta, TypedCell, View, ViewMeta, ViewType,
};
