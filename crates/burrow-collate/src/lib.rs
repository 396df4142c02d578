mod compare;
mod sortkey;

pub use compare::{Collation, compare};
pub use serde_json::{Map, Value};
pub use sortkey::{prefix_key, sort_key, successor};
