pub mod assistant;
pub mod cache;
pub mod config;
pub mod errors;
pub mod generator;
pub mod identifier;
pub mod model;
pub mod narration;
pub mod prompt;
pub mod providers;
pub mod storage;

pub use assistant::VehicleAssistant;
pub use cache::{CacheOptions, ConcurrencyMode, Namespace, ReportCache};
pub use errors::{ConfigError, ReportError, ReportResult};
pub use identifier::{IdentifierPolicy, Normalization, VehicleIdentifier};
pub use model::{Analysis, AnalysisInput, CachedReport, ReportSource};
