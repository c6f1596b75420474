//! Core types for the simtree component tree.
//!
//! This crate provides:
//! - [`Istr`] - Interned strings with address identity
//! - [`NodeId`] - Generational node handles, and [`NodeUid`] unique identifiers
//! - [`ident`] - Identifier rules for names, groups, aliases and tags
//! - [`glob`] - Glob-like patterns for paths and categories
//! - [`Error`] - Error taxonomy with context

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod glob;
pub mod handle;
pub mod ident;
pub mod intern;

pub use error::{Error, ErrorContext, ErrorKind, Result, fatal_internal};
pub use glob::{GlobPattern, has_wildcard_characters, matches_glob_like};
pub use handle::{NodeId, NodeUid};
pub use intern::{BUILTIN_GROUP, Istr, StringTable, intern};
