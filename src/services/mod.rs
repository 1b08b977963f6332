pub mod investor_scoring;
pub mod llm_service;
pub mod message_drafter;
pub mod profile_extractor;
pub mod selectors;

pub use llm_service::LlmService;
pub use profile_extractor::ProfileExtractor;
