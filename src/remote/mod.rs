//! Talking to the file server that hosts the tree dump.
//!
//! | Module | Role |
//! |--------|------|
//! | [`backend`] | [`TreeHost`] trait, [`RemoteFileMetadata`], [`HostError`] |
//! | [`alist`] | [`AlistClient`], the blocking HTTP implementation |

pub mod alist;
pub mod backend;

pub use alist::AlistClient;
pub use backend::{HostError, RemoteFileMetadata, TreeHost};
