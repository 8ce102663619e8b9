mod loader;
mod model;

pub use loader::{default_catalog, descriptor_from_manifest, CatalogEntry, FabricModJson, RegistryLoader};
pub use model::{ModDependency, ModDescriptor, ModRegistry, PLACEHOLDER_MOD_ID};
