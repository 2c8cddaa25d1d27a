pub mod bootstrap;
pub mod planner;
pub mod recurrence;
pub mod rollover;
