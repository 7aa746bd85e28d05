//! Environment-aware concurrency throttling.
//!
//! The governor samples resource signals between rounds and may lower
//! the effective concurrency limit, down to 1. It never cancels
//! in-flight steps and never raises the limit above the configured
//! maximum.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sysinfo::System;

/// Coarse network quality signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NetworkQuality {
    #[default]
    Good,
    Degraded,
    Poor,
}

/// Resource signals sampled before a round.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct ResourceSignals {
    /// Used memory as a percentage of total.
    pub memory_used_percent: f32,

    /// Battery charge percentage, when the host reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_percent: Option<f32>,

    /// Whether the battery is charging, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_charging: Option<bool>,

    /// Network quality as reported by the host.
    #[serde(default)]
    pub network: NetworkQuality,
}

/// Source of resource signals.
pub trait SignalSource: Send + Sync {
    /// Sample current signals.
    fn sample(&self) -> ResourceSignals;
}

/// Signal source backed by `sysinfo`.
///
/// Reports memory pressure; battery and network are host concerns this
/// process cannot observe portably and stay unset.
pub struct SystemSignalSource {
    system: Mutex<System>,
}

impl SystemSignalSource {
    /// Create a source.
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SystemSignalSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalSource for SystemSignalSource {
    fn sample(&self) -> ResourceSignals {
        let mut system = match self.system.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        system.refresh_memory();

        let total = system.total_memory();
        let used = system.used_memory();
        let memory_used_percent = if total > 0 {
            (used as f32 / total as f32) * 100.0
        } else {
            0.0
        };

        ResourceSignals {
            memory_used_percent,
            battery_percent: None,
            battery_charging: None,
            network: NetworkQuality::Good,
        }
    }
}

/// Fixed signal source for tests and embedded hosts that push their own
/// readings.
pub struct StaticSignalSource {
    signals: ResourceSignals,
}

impl StaticSignalSource {
    /// Create a source that always reports the given signals.
    pub fn new(signals: ResourceSignals) -> Self {
        Self { signals }
    }
}

impl SignalSource for StaticSignalSource {
    fn sample(&self) -> ResourceSignals {
        self.signals
    }
}

/// Snapshot of one governor decision, recorded per round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernorSnapshot {
    /// Signals observed.
    pub signals: ResourceSignals,
    /// Limit configured by the run options.
    pub configured_limit: usize,
    /// Limit actually applied to the round.
    pub effective_limit: usize,
    /// When the sample was taken.
    pub sampled_at: DateTime<Utc>,
}

/// Adjusts concurrency from environment signals.
pub struct ResourceGovernor {
    source: Box<dyn SignalSource>,
}

impl ResourceGovernor {
    /// Governor over the given signal source.
    pub fn new(source: Box<dyn SignalSource>) -> Self {
        Self { source }
    }

    /// Governor over live system signals.
    pub fn system() -> Self {
        Self::new(Box::new(SystemSignalSource::new()))
    }

    /// Compute the effective concurrency limit for the next round.
    pub fn effective_limit(&self, configured: usize) -> GovernorSnapshot {
        let signals = self.source.sample();
        let configured = configured.max(1);
        let mut effective = configured;

        if signals.memory_used_percent >= 95.0 {
            effective = 1;
        } else if signals.memory_used_percent >= 85.0 {
            effective = (effective / 2).max(1);
        }

        if let Some(battery) = signals.battery_percent {
            let charging = signals.battery_charging.unwrap_or(false);
            if battery < 20.0 && !charging {
                effective = 1;
            }
        }

        match signals.network {
            NetworkQuality::Poor => effective = 1,
            NetworkQuality::Degraded => effective = (effective / 2).max(1),
            NetworkQuality::Good => {}
        }

        if effective < configured {
            tracing::info!(
                configured,
                effective,
                memory_used_percent = signals.memory_used_percent,
                network = ?signals.network,
                "Resource governor lowered concurrency"
            );
        }

        GovernorSnapshot {
            signals,
            configured_limit: configured,
            effective_limit: effective,
            sampled_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn governor_with(signals: ResourceSignals) -> ResourceGovernor {
        ResourceGovernor::new(Box::new(StaticSignalSource::new(signals)))
    }

    #[test]
    fn test_healthy_signals_keep_configured_limit() {
        let governor = governor_with(ResourceSignals {
            memory_used_percent: 40.0,
            ..Default::default()
        });

        let snapshot = governor.effective_limit(4);
        assert_eq!(snapshot.effective_limit, 4);
        assert_eq!(snapshot.configured_limit, 4);
    }

    #[test]
    fn test_memory_pressure_halves_then_floors() {
        let governor = governor_with(ResourceSignals {
            memory_used_percent: 90.0,
            ..Default::default()
        });
        assert_eq!(governor.effective_limit(4).effective_limit, 2);

        let governor = governor_with(ResourceSignals {
            memory_used_percent: 97.0,
            ..Default::default()
        });
        assert_eq!(governor.effective_limit(8).effective_limit, 1);
    }

    #[test]
    fn test_low_battery_clamps_to_one_unless_charging() {
        let governor = governor_with(ResourceSignals {
            memory_used_percent: 10.0,
            battery_percent: Some(12.0),
            battery_charging: Some(false),
            network: NetworkQuality::Good,
        });
        assert_eq!(governor.effective_limit(6).effective_limit, 1);

        let governor = governor_with(ResourceSignals {
            memory_used_percent: 10.0,
            battery_percent: Some(12.0),
            battery_charging: Some(true),
            network: NetworkQuality::Good,
        });
        assert_eq!(governor.effective_limit(6).effective_limit, 6);
    }

    #[test]
    fn test_network_quality_throttling() {
        let governor = governor_with(ResourceSignals {
            memory_used_percent: 10.0,
            network: NetworkQuality::Degraded,
            ..Default::default()
        });
        assert_eq!(governor.effective_limit(4).effective_limit, 2);

        let governor = governor_with(ResourceSignals {
            memory_used_percent: 10.0,
            network: NetworkQuality::Poor,
            ..Default::default()
        });
        assert_eq!(governor.effective_limit(4).effective_limit, 1);
    }

    #[test]
    fn test_limit_never_below_one() {
        let governor = governor_with(ResourceSignals {
            memory_used_percent: 99.0,
            battery_percent: Some(1.0),
            battery_charging: Some(false),
            network: NetworkQuality::Poor,
        });
        assert_eq!(governor.effective_limit(1).effective_limit, 1);
        assert_eq!(governor.effective_limit(0).effective_limit, 1);
    }

    #[test]
    fn test_system_source_samples_memory() {
        let source = SystemSignalSource::new();
        let signals = source.sample();
        assert!(signals.memory_used_percent >= 0.0);
        assert!(signals.memory_used_percent <= 100.0);
    }
}
