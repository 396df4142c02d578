mod options;
mod row;

pub use options::{IndexUpdateMode, PostFilter, QueryOptions};
pub use row::QueryRow;
