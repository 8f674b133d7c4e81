pub mod config;
pub mod error;
pub mod theme;
pub mod types;

pub use config::ConverseConfig;
pub use error::{ConverseError, Result};
pub use theme::{resolve_theme, ResolvedTheme, ThemeConfig, ThemeOutput, ThemeResolver, VariableMap};
pub use types::*;
