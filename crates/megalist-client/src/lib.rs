//! # megalist-client
//!
//! Client for the external playlist service's Web API.
//!
//! Wraps track listing, track mutation, and playlist metadata endpoints,
//! owning pagination and the 100-item batch limit so callers can work with
//! whole track lists.

pub mod client;
pub mod context;
pub mod endpoints;
pub mod parser;
mod service;
pub mod types;

pub use client::PlaylistClient;
pub use context::{ClientContext, StaticToken, TokenProvider, DEFAULT_BASE_URL};
