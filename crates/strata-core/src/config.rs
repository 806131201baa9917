use serde::{Deserialize, Serialize};

use crate::error::StrataResult;

/// Which implementation backs the render device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceBackend {
    /// Use a wgpu adapter when one is available, the CPU otherwise.
    #[default]
    Auto,
    /// Require a wgpu adapter.
    Gpu,
    /// Run every program on the CPU.
    Cpu,
}

/// Limits applied to the render device.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub backend: DeviceBackend,
    /// Upper bound on bytes held by live buffers. `None` means unbounded.
    pub max_live_bytes: Option<u64>,
    /// Largest width or height a buffer may have.
    pub max_texture_dimension: u32,
    /// Number of distinct programs the device will compile.
    pub max_programs: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            backend: DeviceBackend::Auto,
            max_live_bytes: None,
            max_texture_dimension: 16384,
            max_programs: 256,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Skip effects that precede a write-only effect in a chain.
    pub elide_dead_stages: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            elide_dead_stages: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct StrataConfig {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

impl StrataConfig {
    pub fn from_toml_str(contents: &str) -> StrataResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn load_from_file(path: &std::path::Path) -> StrataResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn save_to_file(&self, path: &std::path::Path) -> StrataResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| crate::StrataError::configuration(e.to_string()))?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}
