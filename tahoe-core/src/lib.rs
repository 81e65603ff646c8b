mod client;
mod listing;

pub use client::{TahoeClient, TahoeError};
pub use listing::{Capability, NodeKind, RemoteEntry, RemoteListing, parse_listing};
