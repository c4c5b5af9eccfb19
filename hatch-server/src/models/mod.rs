//! Domain models with validation at construction
//!
//! All user input is validated when creating these types.
//! Invalid input returns ValidationError, not panic.

pub mod pagination;
pub mod user;
pub mod validation;

use hatch_migrate::Schema;

pub use pagination::{Paginated, Pagination, PaginationParams, Sort, SortField, SortOrder};
pub use user::{
    CreateUser, DisplayName, EmailAddress, NewUser, UpdateUser, User, UserChanges, USERS_TABLE,
};
pub use validation::{FieldError, ValidationError};

/// Schema of every persisted entity; new migrations are diffed against it.
pub fn entity_schema() -> Schema {
    Schema::new(vec![user::users_table()])
}
