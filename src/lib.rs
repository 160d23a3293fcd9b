pub mod config;
pub mod error;
pub mod factory;
pub mod manager;
pub mod package;
pub mod resource;

pub use config::{ManagerOptions, ParseLimits};
pub use error::{ErrorKind, FormatError, ResourceError, Result};
pub use factory::{CodecFactory, CreateOptions, FactoryRegistry, GenericFactory, ResourceFactory};
pub use manager::metrics::MetricsSnapshot;
pub use manager::repack::RepackReport;
pub use manager::{LoadOptions, ResourceManager, SharedResource};
pub use package::header::PackageHeader;
pub use package::index::{IndexEntry, ResourceKey};
pub use package::memory::MemoryArchive;
pub use package::{Archive, ArchiveId, Package, Payload};
pub use resource::{Codec, ContentValue, FieldInfo, GenericResource, Resource, TypedResource};
pub use tokio_util::sync::CancellationToken;
