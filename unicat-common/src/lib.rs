//! # UniCat Common Library
//!
//! Core of the UniCat exchange program directory:
//! - Database schema, initialization and migrations
//! - Rating aggregation (cached running average per program)
//! - Enrollment, favorite and review registry with its uniqueness rules
//! - Directory queries for the request-handling layer
//! - Configuration loading

pub mod config;
pub mod db;
pub mod directory;
pub mod error;
pub mod pagination;
pub mod rating;
pub mod registry;
pub mod uuid_utils;

pub use error::{Error, Result};
