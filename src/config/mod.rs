// Re-export all items from the submodules
mod env_vars;
mod relay_config;

pub use env_vars::{config_path_from_env, read_env_var, service_account_key};
pub(crate) use env_vars::require_key;

pub use relay_config::{load_or_default, RelayConfig};
