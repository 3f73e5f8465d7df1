// Telemetry is a submodule of query
pub mod telemetry;

mod cursor;
mod exec;
mod types;

pub use cursor::{Cursor, CursorState};
pub use exec::QueryPlan;
pub(crate) use exec::{count, delete, distinct, insert, update};
pub use types::{DeleteResult, FindOptions, InsertManyResult, InsertOneResult, UpdateOptions, UpdateResult};
