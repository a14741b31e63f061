//! Storage - Where finished storybooks live
//!
//! Two backends implement the artifact store port: a Supabase-style object
//! store that hands out signed URLs, and a scratch directory served back
//! through this service's own retrieval route.

mod filename;
mod local;
mod remote;

pub use filename::sanitize_filename;
pub use local::LocalScratchStore;
pub use remote::RemoteObjectStore;

/// Route prefix under which the local backend's files are served
pub const LOCAL_FILES_ROUTE: &str = "/api/storybooks/files";
