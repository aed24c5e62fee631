pub mod error;
pub mod package;
pub mod rcol;

pub use error::RcolError;
pub use package::Package;
pub use package::header::PackageHeader;
pub use package::index::{IndexEntry, ResourceKey};
pub use rcol::{ChunkEntry, ChunkIndexEntry, RcolContainer, ResolvedRef};
pub use rcol::block::{BlockTag, KnownBlock, RcolBlock, UnknownBlock};
pub use rcol::reference::{ChunkReference, RefType};
pub use rcol::registry::{BlockConstructor, BlockKind, BlockRegistry, BlockRegistryBuilder};
pub use rcol::tgi::TgiKey;
