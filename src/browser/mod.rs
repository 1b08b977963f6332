pub mod connection;
pub mod engine;

pub use connection::connect_to_browser_and_page;
pub use engine::{
    AutomationEngine, ChromiumEngine, ChromiumFactory, ElementSnapshot, EngineError,
    EngineFactory, EngineHealth, EngineResult, RetryPolicy,
};
