pub mod check;
pub mod identifier;
pub mod locator;
pub mod normalize;
pub mod paginate;
pub mod path_query;
pub mod protocol;

pub use check::{verify, AttrCheck, CheckError};
pub use identifier::{CompositeId, MalformedIdentifier};
pub use locator::{LocateError, LocatorConfig, ResourceLocator};
pub use paginate::fetch_all;
pub use path_query::{evaluate, PathQuery, QueryError};
pub use protocol::{Page, PageCursor, PageSource, PaginationConfig, PaginationKind, TransportError};
