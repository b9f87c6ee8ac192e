pub mod marker;
pub mod paths;

pub use marker::{FileMarkerStore, MarkerStore, MemoryMarkerStore};
pub use paths::WalletPaths;
