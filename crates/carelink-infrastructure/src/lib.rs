mod config_file;
pub mod config_service;
pub mod paths;
pub mod secret_service;

pub use crate::config_service::AssistantConfigLoader;
pub use crate::paths::CarelinkPaths;
pub use crate::secret_service::SecretServiceImpl;
