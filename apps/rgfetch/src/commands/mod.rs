//! Command modules for the rgfetch CLI.
//!
//! - [`install`] - Fetch, extract and install the ripgrep executable
//! - [`path`] - Print the location of the installed executable

pub mod install;
pub mod path;
