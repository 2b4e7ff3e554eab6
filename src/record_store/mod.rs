mod error;
mod models;
pub mod months;
pub mod query;
mod schema;
mod sqlite_record_store;

pub use error::RecordStoreError;
pub use models::*;
pub use query::{RangeFilter, SearchFilters};
pub use schema::RECORD_VERSIONED_SCHEMAS;
pub use sqlite_record_store::SqliteRecordStore;

pub type RecordStoreResult<T> = Result<T, RecordStoreError>;

/// Storage of catalog records and of the recency-ordered genre/store choices.
pub trait RecordStore: Send + Sync {
    // Search

    /// Records matching every present filter, newest first.
    fn search(&self, filters: &SearchFilters) -> RecordStoreResult<Vec<Record>>;

    /// Contiguous `YYYY-MM` list from the earliest record's creation month to
    /// the current month. Empty when there are no records.
    fn month_range(&self) -> RecordStoreResult<Vec<String>>;

    // Records

    fn get_record(&self, id: i64) -> RecordStoreResult<Option<Record>>;

    fn get_records_count(&self) -> RecordStoreResult<usize>;

    /// Inserts a record and refreshes its genre and store recency in the same
    /// transaction.
    fn create_record(&self, fields: &RecordFields) -> RecordStoreResult<Record>;

    /// Overwrites a record and refreshes its genre and store recency in the
    /// same transaction. A `None` filename keeps the current one.
    fn update_record(&self, id: i64, fields: &RecordFields) -> RecordStoreResult<Record>;

    /// Returns false if there was no such record.
    fn delete_record(&self, id: i64) -> RecordStoreResult<bool>;

    // Recency

    /// Inserts `name` into the category or bumps its last use to now.
    /// Blank names are ignored.
    fn record_use(&self, category: ChoiceCategory, name: &str) -> RecordStoreResult<()>;

    /// Names of the category, most recently used first.
    fn list_choices(&self, category: ChoiceCategory) -> RecordStoreResult<Vec<String>>;

    fn list_choice_entries(&self, category: ChoiceCategory) -> RecordStoreResult<Vec<ChoiceEntry>>;
}
