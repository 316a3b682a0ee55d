//! Layered settings for a governor deployment.
//!
//! Values are resolved in order, later layers overriding earlier ones:
//! built-in defaults, an optional TOML file, then environment variables
//! prefixed with `RLM_GOVERNOR__` using `__` as the nesting separator
//! (for example `RLM_GOVERNOR__BUDGET__COST_LIMIT=2.5`).

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::allocation::{AllocationPolicy, BudgetConfig};
use crate::error::Result;
use crate::guarantees::GuaranteeTuning;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "RLM_GOVERNOR";

/// Separator between nested keys in environment overrides.
pub const ENV_SEPARATOR: &str = "__";

/// Everything needed to run the allocator and governors for a service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernorSettings {
    /// Caller-level ceiling applied to every allocation
    pub budget: BudgetConfig,
    /// Per-difficulty resource policy
    pub policy: AllocationPolicy,
    /// Warning ratio and checkpoint retention
    pub guarantees: GuaranteeTuning,
}

impl GovernorSettings {
    /// Load settings from defaults, an optional file and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, Self::environment())
    }

    /// Load from an optional TOML file without consulting the environment.
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::load_with_env(
            Some(path),
            Self::environment().source(Some(Default::default())),
        )
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
    }

    fn load_with_env(path: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Some(path) = path {
            debug!(path = %path.display(), "loading governor settings file");
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }

        let settings: Self = builder.add_source(env).build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check every section.
    pub fn validate(&self) -> Result<()> {
        self.budget.validate()?;
        self.policy.validate()?;
        self.guarantees.validate()
    }

    /// Render as TOML, suitable for writing a settings file.
    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string(self)
    }
}
