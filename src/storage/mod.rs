pub mod catalog;
pub mod lexicon;
pub mod persistence;
pub mod query;
pub mod schema;
pub mod schema_manager;
pub mod store;

pub use catalog::{Catalog, Record};
pub use lexicon::{Lexicon, tokenize};
pub use persistence::{SnapshotManager, StoreSnapshot};
pub use query::{Predicate, Query};
pub use schema::{CatalogSchema, IndexDefinition, IndexKind, MetadataColumn};
pub use schema_manager::{CatalogSpec, SchemaManager, SetupReport};
pub use store::{CatalogStore, QueryCursor, SearchResult};
