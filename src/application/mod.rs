pub mod bootstrap;
pub mod briefing;
pub mod commands;
pub mod session;
pub mod summaries;
