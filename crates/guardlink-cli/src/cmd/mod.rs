pub mod fleet;
pub mod plan;
pub mod run;
pub mod teardown;
