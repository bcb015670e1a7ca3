//! Backend-independent query IR: predicates, where clauses, sort and paging.
//!
//! ## Example
//!
//! ```
//! use sourced_adapter::{FindMany, Predicate, SortSpec, Where};
//!
//! // verified users whose email ends with x.com or y.com
//! let filter = Where::new()
//!     .with(Predicate::eq("emailVerified", true))
//!     .with(Predicate::ends_with("email", "x.com").or())
//!     .with(Predicate::ends_with("email", "y.com").or());
//!
//! let query = FindMany::new()
//!     .filter(filter)
//!     .sort_by(SortSpec::desc("createdAt"))
//!     .limit(20);
//! assert_eq!(query.filter.groups().any.len(), 2);
//! ```

pub mod eval;
mod filter;
mod predicate;

pub use filter::{Direction, FindMany, Groups, Page, Select, SortSpec, Where, Window};
pub use predicate::{Connector, Operator, Predicate};
