//! boardsync: in-process mirror of a remote tabular work-tracking board
//!
//! The board model mirrors one remote resource (groups × rows × typed
//! columns) into an addressable object graph, tracks local edits per cell,
//! and pushes them back through the rate-limited connection layer in
//! `boardsync-http`.
//!
//! # Architecture
//!
//! - `schema`: column registry, display-name deduplication, id index
//! - `value` / `cell`: tagged cell values with dirty tracking
//! - `row`: the addressable unit; cells by name, sub-row ownership
//! - `key`: composite row keys and uniqueness
//! - `query`: structured request builders and the write change-set
//! - `select`: cursor pagination, rehydration, client-side filtering
//! - `board`: the aggregate exposing select/insert/update/delete
//! - `subitem`: child rows with their own column schema
//! - `verify`: schema drift detection with alert notifications

pub mod board;
pub mod cell;
pub mod key;
pub mod query;
pub mod row;
pub mod schema;
pub mod select;
pub mod subitem;
pub mod value;
pub mod verify;

pub use board::{Board, Group};
pub use boardsync_common::{BoardError, Result};
pub use cell::Cell;
pub use key::KeySpec;
pub use query::{CmpOp, RowFilter};
pub use row::Row;
pub use schema::{Column, ColumnRegistry, ColumnType};
pub use select::SelectOptions;
pub use value::CellValue;
pub use verify::{verify, Notifier, RequiredColumn, RequiredElements, VerifyReport};
