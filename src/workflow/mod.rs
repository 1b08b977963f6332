pub mod investor_flow;

pub use investor_flow::InvestorFlow;
