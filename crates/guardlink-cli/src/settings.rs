use anyhow::Result;
use guardlink_core::config::{
    self, Settings, DEFAULT_CATEGORY, DEFAULT_HOME_REGION, DEFAULT_REGISTRY_TABLE,
};
use guardlink_core::types::{Region, RoleRef};

/// Run configuration as command-line arguments. Every flag has an
/// environment fallback so scheduled invocations need no wrapper script.
#[derive(Debug, clap::Args)]
pub struct SettingsArgs {
    /// Delegated organization root roles, comma separated
    #[arg(long = "org-roles", env = "GUARDLINK_ORG_ROLES")]
    org_roles: Option<String>,

    /// Role to assume for administrator-side work (default: the caller)
    #[arg(long, env = "GUARDLINK_MANAGER_ROLE")]
    manager_role: Option<String>,

    /// Registry category marking an account eligible
    #[arg(long, env = "GUARDLINK_CATEGORY", default_value = DEFAULT_CATEGORY)]
    category: String,

    /// Shared role registry location
    #[arg(long, env = "GUARDLINK_REGISTRY_TABLE", default_value = DEFAULT_REGISTRY_TABLE)]
    registry_table: String,

    /// Region scoping directory and registry queries
    #[arg(long, env = "GUARDLINK_HOME_REGION", default_value = DEFAULT_HOME_REGION)]
    home_region: String,

    /// Restrict the pass to these accounts, whitespace separated
    #[arg(long = "allow-list", env = "GUARDLINK_ALLOW_LIST")]
    allow_list: Option<String>,

    /// Act on exactly these regions instead of discovering them, comma separated
    #[arg(long, env = "GUARDLINK_REGIONS")]
    regions: Option<String>,

    /// Regions reconciled concurrently
    #[arg(long, env = "GUARDLINK_REGION_PARALLELISM", default_value_t = 4)]
    region_parallelism: usize,

    /// Member accounts handled concurrently within a region
    #[arg(long, env = "GUARDLINK_ACCOUNT_PARALLELISM", default_value_t = 8)]
    account_parallelism: usize,

    /// Attempts per provider call before giving up
    #[arg(long, env = "GUARDLINK_ATTEMPTS", default_value_t = 3)]
    attempts: u32,

    /// Per-call timeout, plain seconds or suffixed (30s, 5m)
    #[arg(long, env = "GUARDLINK_OP_TIMEOUT", default_value = "10s")]
    op_timeout: String,

    /// Per-region deadline, plain seconds or suffixed
    #[arg(long, env = "GUARDLINK_DEADLINE")]
    deadline: Option<String>,
}

impl SettingsArgs {
    pub fn resolve(&self) -> Result<Settings> {
        let mut settings = Settings::default();
        if let Some(raw) = &self.org_roles {
            settings.org_roots = config::parse_role_list(raw);
        }
        settings.manager_role = self.manager_role.as_deref().map(RoleRef::from);
        settings.category = self.category.clone();
        settings.registry_table = self.registry_table.clone();
        settings.home_region = Region::from(self.home_region.as_str());
        if let Some(raw) = &self.allow_list {
            let allowed = config::parse_allow_list(raw);
            if !allowed.is_empty() {
                settings.allow_list = Some(allowed);
            }
        }
        if let Some(raw) = &self.regions {
            let regions = config::parse_region_list(raw);
            if !regions.is_empty() {
                settings.regions = Some(regions);
            }
        }
        settings.region_parallelism = self.region_parallelism;
        settings.account_parallelism = self.account_parallelism;
        settings.retry.attempts = self.attempts.max(1);
        settings.retry.op_timeout = config::parse_duration(&self.op_timeout)?;
        settings.deadline = self
            .deadline
            .as_deref()
            .map(config::parse_duration)
            .transpose()?;
        Ok(settings)
    }
}
