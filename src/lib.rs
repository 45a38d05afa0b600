/// NewsHub - server-rendered news portal
///
/// Articles organized by category and tag, reader accounts with moderated
/// comments, and a staff back office with role-based access.

pub mod account;
pub mod admin;
pub mod api;
pub mod auth;
pub mod blob_store;
pub mod config;
pub mod content;
pub mod context;
pub mod db;
pub mod error;
pub mod identity;
pub mod mailer;
pub mod server;
pub mod validation;
pub mod views;

#[cfg(test)]
mod test_support;

pub use context::AppContext;
