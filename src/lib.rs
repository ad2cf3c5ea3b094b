pub mod error;
pub mod monitor;
pub mod philosopher;

pub use error::{DinnerError, MonitorError};
pub use monitor::{find_adjacent_eaters, EatGuard, Monitor, State, TalkGuard};
pub use philosopher::{dine, DinnerConfig, DinnerReport, Philosopher};
