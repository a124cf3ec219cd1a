//! User management module.
//!
//! Provides user CRUD operations, credential verification and the store seam
//! used by credential maintenance jobs.

mod models;
mod repository;
mod service;
mod store;

pub use models::{CreateUserRequest, UpdateUserRequest, User, UserInfo, UserListQuery, UserRole};
pub use repository::UserRepository;
pub use service::UserService;
pub use store::UserStore;
