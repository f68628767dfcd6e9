//! Flog blog server: client publishing API, public and preview site, upload storage.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
