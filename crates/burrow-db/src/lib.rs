mod database;
mod docstore;
mod error;
mod live;
mod mapred;
mod query;
mod view;

pub use burrow_collate::{Collation, Map, Value};
pub use burrow_engine::IndexRow;
pub use burrow_query::{IndexUpdateMode, PostFilter, QueryOptions, QueryRow};
pub use database::{Database, DatabaseConfig};
pub use docstore::Revision;
pub use error::DbError;
pub use live::{ChangeEvent, ChangeListener, LiveQuery};
pub use mapred::{Emitter, MapError, Mapper, Reducer, total_values};
pub use view::View;
