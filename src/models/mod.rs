pub mod link_metadata;

pub use link_metadata::{ResolveLinkQuery, ResolvedMetadata};
