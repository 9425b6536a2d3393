//! Core catalog traits and abstractions.
//!
//! - [`Catalog`] - the narrow backend contract the pagination engine drives
//! - [`ResumeCursor`] - replayable position or live handle
//! - [`BackendKind`] - backend selection

pub mod backend;
pub mod catalog;

pub use backend::BackendKind;
pub use catalog::{Catalog, CatalogPage, FormatFilter, LiveCursor, ResumeCursor};
pub(crate) use catalog::resume_live;
