//! Blogroll discovery and feed ranking.
//!
//! Starting from a seed RSS/Atom feed, the crate locates the feed's blogroll (an OPML list of
//! recommended feeds), follows every listed feed's own blogroll up to a bounded depth, and
//! scores each feed URL by how often and how close to the seed it is referenced.
//!
//! - [`feed`] - feed resolution, blogroll discovery, OPML loading and export
//! - [`walk`] - the depth-bounded traversal and score table
//! - [`greader`] - subscribing feeds on a Google Reader compatible service
//! - [`report`] - ranked output for the terminal and JSON
//! - [`config`] - `config.toml` loading

pub mod config;
pub mod feed;
pub mod greader;
pub mod report;
pub mod util;
pub mod walk;
