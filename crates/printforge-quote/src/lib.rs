pub mod analyzer;
pub mod cache;
pub mod pricing;

pub use analyzer::{model_hash, AnalysisError, MeshAnalyzer, MeshReport};
pub use cache::{CacheStats, QuotationCache, QuoteKey};
pub use pricing::{Material, MaterialTable, Quote, Quoter};
