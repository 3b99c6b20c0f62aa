mod fields;
mod history;

pub use fields::{InvoiceField, InvoiceFields, NOT_AVAILABLE};
pub use history::{History, HistoryEntry};
