pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::bootstrap::{BootstrapResult, bootstrap_workspace};
pub use application::planner::{
    DeleteDecision, ExpansionReport, Planner, SaveDecision, ERROR_DISPLAY_SECONDS,
};
pub use application::recurrence::{ExpansionPlan, plan_instances};
pub use application::rollover::{ScheduledTask, spawn_clock_tick_task, spawn_rollover_task};
pub use domain::clock::{
    ClockDisplay, Meridiem, extend_past_midnight, parse_clock_time, to_12_hour, to_clock_time,
};
pub use domain::models::{
    Block, DayInfo, RepeatKind, RepeatRule, SessionContext, UserIdentity, DEFAULT_BLOCK_COLOR,
};
pub use domain::overlap::find_overlaps;
pub use domain::window::{DayWindow, ViewMode, effective_today, next_rollover};
pub use infrastructure::block_api_client::{BlockApiClient, BlockRow, ReqwestBlockApiClient};
pub use infrastructure::block_store::{BlockStoreAdapter, DeleteOutcome, SaveOutcome};
pub use infrastructure::error::EngineError;
pub use infrastructure::rule_store::{
    InMemoryRepeatRuleRepository, RepeatRuleRepository, SqliteRepeatRuleRepository,
};
