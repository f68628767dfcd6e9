//! Application services layer.

pub mod auth;
pub mod entries;
pub mod error;
pub mod repos;
pub mod sidebar;
pub mod site;
pub mod syndication;
