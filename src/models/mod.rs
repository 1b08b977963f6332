pub mod profile;
pub mod startup;

pub use profile::{
    InvestorAnalysis, InvestorReport, KeywordAnalysis, ProfileSignals, ScoreBreakdown, WebInfo,
};
pub use startup::{load_startup_info, StartupInfo};
