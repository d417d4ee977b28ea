#![doc = "siyuan-anki-core: reconciliation engine that mirrors flagged SiYuan blocks into Anki."]

//! This crate holds the data model, the pure planning stages and the orchestration of
//! a sync run. Network and OS access live behind the traits in [`contract`]; the CLI
//! crate provides the HTTP and process-list implementations.
//!
//! # Usage
//! Build a [`config::SyncConfig`], open a [`repository::SqliteBlockStore`] and call
//! [`synchronise::synchronise`] with the collaborators.

pub mod batch;
pub mod config;
pub mod contract;
pub mod deck;
pub mod error;
pub mod executor;
pub mod matcher;
pub mod media;
pub mod model;
pub mod repository;
pub mod synchronise;
pub mod transform;
