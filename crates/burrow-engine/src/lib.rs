mod error;
mod index;
mod keys;
mod meta;

pub use error::EngineError;
pub use index::{IndexRow, IndexStore, RangeSpec, ScanBounds};
pub use keys::view_cf;
pub use meta::{SYS_CF, ViewMeta, delete_view_meta, load_view_meta, save_view_meta};
