//! # Engine Module
//!
//! Internal ECS runtime implementation.
//!
//! This module contains all core building blocks:
//! - Entity allocation and handle recycling
//! - Component registration and type-erased storage
//! - Archetype tables and row migration
//! - Lifecycle events
//! - Queries, command buffers, systems
//! - Plugins and optional capabilities
//!
//! Public API exposure is controlled by `lib.rs`.

pub mod types;
pub mod error;
pub mod storage;
pub mod component;
pub mod entity;
pub mod archetype;
pub mod events;
pub mod world;
pub mod query;
pub mod commands;
pub mod systems;
pub mod plugin;
pub mod capability;
