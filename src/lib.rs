pub mod analyzer;
pub mod config;
pub mod error;
pub mod normalizer;
pub mod prompt;
pub mod providers;
pub mod server;
pub mod types;

pub use analyzer::CabinetAnalyzer;
pub use config::{ProviderKind, ServerConfig};
pub use error::{ConfigError, VisionError};
pub use normalizer::{normalize, CabinetAnalysisResult, ParseFailure};
pub use prompt::PromptTemplate;
pub use providers::{extract_reply_text, VisionProvider};
pub use server::{router, AppState};
pub use types::{ImageData, VisionRequest};
