//! List-state machinery shared by every paginated admin page.

pub mod debounce;
pub mod error;
pub mod fetch;
pub mod mutation;
pub mod pagination;
pub mod polling;
pub mod query_state;
pub mod session;
pub mod source;

pub use debounce::Debouncer;
pub use error::{ListError, ListResult};
pub use fetch::{ErrorPolicy, FetchController, FetchResult, ListFetchController, RefreshMode};
pub use mutation::{MutationOutcome, OptimisticMutator, PendingMutation};
pub use pagination::{page_count, Pagination};
pub use polling::PollingScheduler;
pub use query_state::{FilterValue, QueryParams, QueryState, Sort, SortDirection};
pub use session::{PageSession, SessionOptions, SessionSnapshot, SessionUpdate, PAGE_SIZES};
pub use source::{DataSource, Entity, Page};
