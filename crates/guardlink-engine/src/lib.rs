//! `guardlink-engine`: the reconciliation engine that keeps a fleet of
//! member accounts enrolled under one security-monitoring administrator.
//!
//! Each pass derives what every region needs from two inputs, the eligible
//! roster and a single member-list snapshot, then applies the derived plan:
//! batched administrator-side mutations first, per-account member steps
//! after. Nothing is cached between passes; re-running against an already
//! converged fleet performs no mutations at all.
//!
//! # Architecture
//!
//! ```text
//! Settings + Providers
//!     │
//!     ▼
//! inventory    ← org roots × role registry → eligible roster
//!     │
//!     ▼
//! plan::derive ← pure derivation in guardlink-core
//!     │
//!     ▼
//! region pass  ← delete / create / invite batches, then member steps
//!     │           under a bounded worker pool
//!     ▼
//! RunSummary
//! ```
//!
//! # Quick start
//!
//! ```rust,ignore
//! use guardlink_core::config::Settings;
//! use guardlink_engine::{Engine, FleetState, SimCloud};
//!
//! let cloud = SimCloud::new(FleetState::starter());
//! let engine = Engine::new(cloud.providers(), Settings::default());
//! let summary = engine.run().await?;
//! println!("created {} members", summary.totals().created);
//! ```

pub mod driver;
pub mod error;
pub mod providers;
pub mod sim;

pub(crate) mod inventory;
pub(crate) mod region;
pub(crate) mod retry;
pub(crate) mod teardown;


pub use driver::{Engine, PlanReport, PlannedRegion};
pub use error::{EngineError, ProviderError};
pub use providers::{
    AccountDirectory, AccountPage, Identity, Invitation, MemberPage, MonitoringApi, PageToken,
    ProviderResult, Providers, RoleDirectory, RolePage, Session, SessionProvider, Unprocessed,
};
pub use sim::{FleetState, SimCloud};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Run one reconciliation pass with the given collaborators and settings.
pub async fn run(
    providers: Providers,
    settings: guardlink_core::config::Settings,
) -> Result<guardlink_core::summary::RunSummary> {
    Engine::new(providers, settings).run().await
}
