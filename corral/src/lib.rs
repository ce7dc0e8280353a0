#![allow(
    dead_code,
    unused_imports,
)]
//! # Corral - In-Memory Event-Driven Object Store
//!
//! Corral keeps reference-counted entities in observable collections. A
//! generic [`ObjectCollection`](collection::ObjectCollection) pairs with a
//! string-attribute [`Model`](model::Model), and pluggable behaviors keep
//! memberships filtered, mirrored, capped or derived while every change
//! notifies its listeners synchronously.
//!
//! ## Key Features
//!
//! - **In-memory**: no storage backend, entities live as `Arc<T>`
//! - **Event-driven**: add/remove/change events with owner-tagged listeners
//! - **Mutation-safe iteration**: callbacks may add and remove during
//!   iteration; structural changes queue and apply afterwards
//! - **Behaviors**: active filters, one-way sync, size limits with
//!   eviction order, collection-to-collection transformation
//! - **Attribute taps**: per-attribute and per-model transformers with
//!   immediate initial delivery
//! - **JSON ingestion**: diff-and-upsert loading for collections and
//!   registries (feature `serde`, on by default)
//! - **Clean API**: PIMPL pattern provides stable, encapsulated interface
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use corral::collection::Registry;
//! use corral::model::ModelOps;
//!
//! let registry = Registry::new();
//! let people = registry.collection("people");
//!
//! // react to members joining
//! people.added().subscribe(corral::common::OwnerTag::next(), |model| {
//!     println!("welcome {}", model.id());
//!     Ok(())
//! });
//!
//! // models are attribute maps with change events
//! let person = people.create();
//! person.set("name", "John");
//!
//! // behaviors keep the membership in shape
//! people.filter("status", "active");
//! people.limit(100);
//! ```
//!
//! ## Design Pattern
//!
//! Corral uses the **PIMPL (Pointer To IMPLementation)** design pattern:
//! public handles (`Collection`, `Model`, `Emitter`, ...) are cheap
//! clones over a shared `Arc<Inner>`, so every clone observes the same
//! state and the public surface stays stable while internals evolve.
//!
//! ## Module Organization
//!
//! - [`collection`] - Object collections, the model collection facade and
//!   the named-collection registry
//! - [`model`] - The string-attribute model and its transformers
//! - [`behavior`] - Size limit, one-way sync and transformation behaviors
//! - [`filter`] - Membership predicates and active filtering
//! - [`common`] - Emitters, admission gates, constants and utilities
//! - [`errors`] - Error types and result definitions
//! - [`json`] - JSON ingestion (feature `serde`)

pub mod behavior;
pub mod collection;
pub mod common;
pub mod errors;
pub mod filter;
#[cfg(feature = "serde")]
pub mod json;
pub mod model;

pub use common::util::*;
