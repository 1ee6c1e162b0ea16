//! # Tether Core Library
//!
//! This crate contains the resolution and lifecycle engine of `tether`, a hermetic version manager
//! for prebuilt developer tools.
//!
//! `tether` resolves a package manifest from a git-backed catalog, downloads and extracts the pinned
//! artifact into a per-version directory, and either runs it directly or writes small link scripts
//! onto your `PATH` that do so. Nothing is installed system-wide.
//!
//! This library is built for the `tether` CLI, but you can also reuse it as a backend in other tools.
//!
//! ## Modules Overview
//! - [`paths`] – Well-known locations (config, catalog, installs, temp)
//! - [`settings`] – Loading and merging `config.toml` files
//! - [`catalog`] – Syncing the catalog of manifest templates
//! - [`manifest`] – Manifest templates, option merging and resolution
//! - [`template`] – `${...}` placeholder rendering
//! - [`installer`] – Downloading and extracting packages
//! - [`links`] – Writing and removing link scripts
//! - [`runner`] – Running installed binaries
//! - [`context`] – The per-invocation paths and settings


pub mod error;
pub mod paths;
pub mod platform;
pub mod util;
pub mod template;
pub mod settings;
pub mod catalog;
pub mod context;
pub mod manifest;
pub mod installer;
pub mod links;
pub mod runner;

pub use error::{Error, Result};
pub use paths::*;
pub use settings::*;
pub use catalog::*;
pub use context::*;
pub use manifest::*;
pub use installer::*;
pub use links::*;
pub use runner::*;
