pub mod batch;
pub mod bulk;
pub mod categories;
pub mod health;
pub mod icons;
pub mod metrics;
pub mod random;
pub mod search;
pub mod sources;

pub use batch::batch_icons;
pub use bulk::bulk_download;
pub use categories::list_categories;
pub use health::{health_handler, liveness, readiness};
pub use icons::{get_icon, get_icon_default_source};
pub use metrics::{get_metrics, get_metrics_prometheus};
pub use random::random_icons;
pub use search::search_icons;
pub use sources::list_sources;
