// HLS manifest handling for the media relay: classification, URI resolution and rewriting
pub mod location;
pub mod resource;
pub mod rewrite;
pub mod wrap;

pub use location::ManifestLocation;
pub use resource::ResourceKind;
pub use rewrite::{MANIFEST_HEADER, Manifest, ManifestError, RewrittenManifest, is_valid_manifest};
pub use wrap::{DEFAULT_ROUTE_PREFIX, ProxyRoutes};
