//! Tiered configuration.
//!
//! Tiers, lowest to highest, merged field by field:
//! 1. **Defaults** - compiled in
//! 2. **Project** - `$CWD/polar/config.yaml`
//! 3. **User** - `~/.polar/config.yaml`
//! 4. **Environment** - variables below
//!
//! ## Environment Variables
//! - `POLAR_CONFIG_PATH` - Explicit config file (overrides all tiers)
//! - `POLAR_DB_PATH` - Database path
//! - `POLAR_RECONCILE_INTERVAL_HOURS` - Hours between reconcile passes
//! - `POLAR_EXACT_TRIGGERS` - Exact trigger capability (`true`/`false`)
//! - `POLAR_USER_DIR` - User config dir (default: `~/.polar`)
//! - `POLAR_PROJECT_DIR` - Project config dir (default: `./polar`)

mod loader;
mod merge;
mod types;

pub use loader::{ConfigLoader, ConfigPaths, ConfigTier};
pub use merge::deep_merge;
pub use types::*;
