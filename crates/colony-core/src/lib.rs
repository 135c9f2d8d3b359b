//! Colony Core -- the request and recipe system behind a colony's workers.
//!
//! A colony raises requests for items. Resolvers compete to fulfil them:
//! the warehouse hands over stock it already holds, crafters commit to a
//! recipe and spawn child requests for missing inputs. Recipes come from
//! data-driven definitions that are gated by building level and research,
//! and are interned in a reference-counted store shared by every building.
//!
//! # Dispatch Pass
//!
//! Each call to [`manager::RequestManager::dispatch`] runs one pass:
//!
//! 1. **Collect** -- Created and overruled requests, plus unresolved ones if
//!    the colony changed since the last pass.
//! 2. **Order** -- Highest request priority first, then creation order.
//! 3. **Offer** -- Each request goes to resolvers in ascending priority value
//!    until one accepts and commits.
//! 4. **Expand** -- Child requests spawned by a commitment join the same pass.
//! 5. **Complete** -- Finished children notify their parent's resolver.
//!
//! # Recipe Lifecycle
//!
//! ```rust,ignore
//! let def = parse::parse_recipe(id, &json, &registry)?;
//! book.apply(def);
//! book.refresh_building(&mut colony, building, &research, &mut store);
//! ```
//!
//! # Key Types
//!
//! - [`engine::Engine`] -- Owns the registry, recipe book, store and colonies.
//! - [`recipe::RecipeDefinition`] -- A parsed, validated recipe definition.
//! - [`store::RecipeStore`] -- Interned recipe storages with usage counts.
//! - [`book::RecipeBook`] -- Definitions indexed by crafter.
//! - [`request::Request`] -- A node in a colony's request graph.
//! - [`resolver::Resolver`] -- The capability interface resolvers implement.
//! - [`manager::RequestManager`] -- Per-colony request graph and dispatch.
//! - [`view::BuilderView`] -- Builder view sync payload.

pub mod book;
pub mod building;
pub mod colony;
pub mod crafting;
pub mod dirty;
pub mod engine;
pub mod event;
pub mod fixed;
pub mod gating;
pub mod id;
pub mod item;
pub mod manager;
pub mod parse;
pub mod recipe;
pub mod registry;
pub mod request;
pub mod research;
pub mod resolver;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod view;
pub mod warehouse;
