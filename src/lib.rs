pub mod catalog;
pub mod cli;
pub mod icmp;
pub mod orchestrator;
pub mod probe;
pub mod provider;
pub mod report;
pub mod utils;

pub use catalog::*;
pub use cli::*;
pub use icmp::*;
pub use orchestrator::*;
pub use probe::*;
pub use provider::*;
pub use report::*;
pub use utils::*;
