#![allow(dead_code, unused_imports)]
//! # Metacat - Metadata Routing for a Scientific Data Catalog
//!
//! Metacat is the metadata routing and filtering layer of a scientific data
//! catalog. Heterogeneous storage backends each own a disjoint slice of
//! per-entity key/value metadata, and callers get a single uniform
//! read/write/list surface that is backend-agnostic.
//!
//! ## Key Features
//!
//! - **Key Ownership Routing**: every read and write resolves to exactly
//!   one authoritative plugin, fail-closed
//! - **Declarative Filters**: one expression language (OR of AND groups,
//!   operator suffixes, wildcards, typed coercion) compiled per backend
//! - **Bulk Writes**: batches partitioned by ownership with exact
//!   committed-plugin reporting on partial failure
//! - **Recursive Listing**: matched collections expand through the
//!   attachment graph with duplicate suppression
//! - **Reference Backends**: an in-memory relational-column adapter and a
//!   JSON document adapter at the production technology seam
//! - **Clean API**: PIMPL pattern provides stable, encapsulated interface
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use metacat::backend::{ColumnAdapter, DocumentAdapter};
//! use metacat::catalog_builder::CatalogBuilder;
//! use metacat::common::{EntityId, EntityType, Hierarchy, InMemoryHierarchy, MetaValue};
//! use metacat::plugin::{ColumnMetaPlugin, JsonMetaPlugin, MetaPluginProvider, PluginSelector};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let hierarchy = Hierarchy::new(InMemoryHierarchy::new());
//! let columns = ColumnAdapter::new(hierarchy.clone());
//! let column_plugin = ColumnMetaPlugin::new(columns.clone(), hierarchy.clone());
//! let json_plugin = JsonMetaPlugin::new(DocumentAdapter::new());
//!
//! let catalog = CatalogBuilder::default()
//!     .hierarchy(hierarchy)
//!     .plugin(column_plugin.as_plugin())
//!     .plugin(json_plugin.as_plugin())
//!     .open()?;
//!
//! let file = EntityId::new("mc16", "events.root");
//! columns.register_entity(&file, EntityType::File);
//!
//! catalog.set_metadata(&file, "project", MetaValue::from("data17"), false)?;
//! catalog.set_metadata(&file, "custom_tag", MetaValue::from("blue"), false)?;
//! let meta = catalog.get_metadata(&file, &PluginSelector::All)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`backend`] - Storage backend adapters and native predicates
//! - [`bulk`] - Partitioned bulk write coordination
//! - [`catalog`] - The catalog facade
//! - [`catalog_builder`] - Catalog builder for initialization
//! - [`common`] - Values, entity identity, hierarchy, shared utilities
//! - [`errors`] - Error types and result definitions
//! - [`filter`] - Filter expressions, coercion, and compilation
//! - [`listing`] - Listing options, result shapes, recursive expansion
//! - [`meta_config`] - Catalog configuration
//! - [`plugin`] - Metadata plugins, the registry, and key routing

pub mod backend;
pub mod bulk;
pub mod catalog;
pub mod catalog_builder;
pub mod common;
pub mod errors;
pub mod filter;
pub mod listing;
pub mod meta_config;
pub mod plugin;

pub use crate::catalog::MetaCatalog;
pub use crate::catalog_builder::CatalogBuilder;
pub use crate::common::MetaValue;
pub use crate::errors::{ErrorKind, MetaError, MetaResult};
