//! Core library for the taskdesk client.
//!
//! Holds everything below the command line: configuration, logging, the
//! data model, the persisted session, the authenticated request pipeline,
//! typed API functions and page state.

pub mod api;
pub mod client;
pub mod config;
pub mod logging;
pub mod models;
pub mod pages;
pub mod session;
