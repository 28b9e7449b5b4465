//! Array variables and the store that owns them
//!
//! Arrays come in three script-visible flavours over two storage layouts:
//! - `Array`: packed, number-indexed, dense storage
//! - `Map`: number-keyed, sorted storage
//! - `StringMap`: string-keyed, sorted storage

mod array;
mod backend;
mod store;

pub use array::{ArrayKind, ArrayVar};
pub use backend::Backend;
pub use store::{ArrayState, ArrayStore, SortMode, SortOrder};

pub(crate) use store::ArrayTable;
