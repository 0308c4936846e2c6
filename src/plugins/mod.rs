pub mod manager;
pub mod message;
pub mod notifiers;
pub mod traits;

pub use manager::{DeliveryReport, PluginManager};
pub use message::render_listing;
pub use traits::{NotificationResult, NotifierPlugin};
