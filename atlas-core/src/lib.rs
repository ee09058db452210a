//! Platform-independent core of the atlas dashboard: instance registry,
//! viewport synchronisation, spatial queries, graticule and measurement.

pub mod config;
pub mod error;
pub mod extent;
pub mod features;
pub mod graticule;
pub mod measure;
pub mod query;
pub mod registry;
pub mod viewport;

pub use config::AtlasConfig;
pub use error::AtlasError;
pub use extent::{BoundingExtent, Ring5};
pub use graticule::{Axis, GraticuleLine, format_degrees, graticule};
pub use query::{DatasetStats, ExtentStats, filter_by_extent, visible_dataset, visible_stats};
pub use registry::{InstanceRegistry, MapInstance, ViewState};
pub use viewport::{ExtentChanged, Subscription, ViewportSync};
