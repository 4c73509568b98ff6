pub mod cache;
pub mod calibrate;
pub mod classify;
pub mod codes;
pub mod core;
pub mod embedding;
pub mod extract;
pub mod http;
pub mod metrics;
pub mod ml;
pub mod orchestrator;
pub mod reliability;
pub mod repo;
pub mod scraping;

// --- Primary core exports ---
pub use crate::core::config::{load_config, Config};
pub use crate::core::errors::ClassifyError;
pub use crate::core::types;
pub use crate::core::types::*;
pub use crate::core::AppState;

// --- Component exports ---
pub use cache::{fingerprint, ClassificationCache};
pub use classify::MultiStrategyClassifier;
pub use codes::CodeGenerator;
pub use extract::KeywordExtractor;
pub use repo::{Repository, StaticRepository};
pub use scraping::{normalize_website_url, ScraperPipeline};
