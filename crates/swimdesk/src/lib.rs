//! Swimdesk backend library.
//!
//! Accounts, login sessions and credential maintenance for the swim school
//! management app.

pub mod api;
pub mod auth;
pub mod db;
pub mod repair;
pub mod user;
