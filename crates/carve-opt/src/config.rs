//! Offload configuration.

/// Smallest cluster worth replacing with an invocation.
pub const MIN_CLUSTER_SIZE: usize = 2;

/// Environment toggle selecting accelerator placement for invocations.
pub const PLACEMENT_ENV: &str = "CARVE_ACCELERATOR_PLACEMENT";

/// Placement of invocation nodes when accelerator placement is off.
pub const CPU_PLACEMENT: &str = "/device:CPU:0";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OffloadConfig {
    /// Place each invocation on the device of its cluster's last member
    /// instead of the CPU.
    pub accelerator_placement: bool,
    /// Clusters with fewer members are left in the graph.
    pub min_cluster_size: usize,
}

impl Default for OffloadConfig {
    fn default() -> Self {
        Self {
            accelerator_placement: false,
            min_cluster_size: MIN_CLUSTER_SIZE,
        }
    }
}

impl OffloadConfig {
    /// Defaults, with accelerator placement read from [`PLACEMENT_ENV`].
    pub fn from_env() -> Self {
        let accelerator_placement = std::env::var(PLACEMENT_ENV)
            .map(|v| is_truthy(&v))
            .unwrap_or(false);
        Self {
            accelerator_placement,
            ..Self::default()
        }
    }

    pub fn with_accelerator_placement(mut self, enabled: bool) -> Self {
        self.accelerator_placement = enabled;
        self
    }

    pub fn with_min_cluster_size(mut self, size: usize) -> Self {
        self.min_cluster_size = size;
        self
    }
}

/// `1`, `true`, `yes` and `on`, in any case.
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = OffloadConfig::default();
        assert!(!config.accelerator_placement);
        assert_eq!(config.min_cluster_size, 2);
    }

    #[test]
    fn truthy_values() {
        for v in ["1", "true", "TRUE", "yes", "On", " on "] {
            assert!(is_truthy(v), "{v}");
        }
        for v in ["", "0", "false", "off", "enabled"] {
            assert!(!is_truthy(v), "{v}");
        }
    }

    #[test]
    fn builder_overrides() {
        let config = OffloadConfig::default()
            .with_accelerator_placement(true)
            .with_min_cluster_size(5);
        assert!(config.accelerator_placement);
        assert_eq!(config.min_cluster_size, 5);
    }
}
