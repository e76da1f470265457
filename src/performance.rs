//! Device performance classification.
//!
//! Bigger images produce more particles than slow devices can animate, so the
//! density filter drops dim pixels more aggressively on weaker hardware. The
//! classifier turns a few capability signals into a [`PerformanceProfile`]
//! whose `threshold` is the minimum channel value a pixel needs to become a
//! particle.
//!
//! # Example
//!
//! ```ignore
//! use pixdust::performance::{classify, AcceleratorClass, CapabilitySignals};
//!
//! let profile = classify(&CapabilitySignals {
//!     mobile: Some(false),
//!     accelerator: Some(AcceleratorClass::Standard),
//!     memory_gb: Some(16.0),
//!     ..Default::default()
//! });
//! assert_eq!(profile.threshold, 24);
//! ```

use std::sync::OnceLock;

/// Base luminance threshold that each level adjusts.
pub const BASE_THRESHOLD: u8 = 34;

/// Adapter name fragments that identify integrated or software renderers.
const LOW_END_NAMES: &[&str] = &["mesa", "swiftshader", "llvmpipe", "softpipe"];

static CACHED: OnceLock<PerformanceProfile> = OnceLock::new();

/// Coarse class of the graphics accelerator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceleratorClass {
    /// No usable accelerator was found.
    Missing,
    /// Integrated or software renderer.
    LowEnd,
    /// Anything else.
    Standard,
}

/// Raw capability signals. Every field is optional; unknown values are
/// scored neutrally.
#[derive(Debug, Clone, Default)]
pub struct CapabilitySignals {
    /// Accelerator class, if known.
    pub accelerator: Option<AcceleratorClass>,
    /// Whether this is a mobile form factor.
    pub mobile: Option<bool>,
    /// Approximate system memory in gigabytes.
    pub memory_gb: Option<f32>,
    /// Adapter name, kept for logging.
    pub renderer: Option<String>,
}

impl CapabilitySignals {
    /// Whether no signal at all is known.
    pub fn is_empty(&self) -> bool {
        self.accelerator.is_none() && self.mobile.is_none() && self.memory_gb.is_none()
    }

    /// Derive signals from a `wgpu` adapter description.
    pub fn from_adapter_info(info: &wgpu::AdapterInfo) -> Self {
        Self {
            accelerator: Some(accelerator_class(&info.name, info.device_type)),
            mobile: Some(cfg!(any(target_os = "android", target_os = "ios"))),
            memory_gb: None,
            renderer: Some(info.name.clone()),
        }
    }

    /// Probe the local machine by asking `wgpu` for a high-performance adapter.
    ///
    /// Blocks until the adapter request resolves. When no adapter exists the
    /// accelerator is reported as [`AcceleratorClass::Missing`].
    pub fn probe() -> Self {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }));

        match adapter {
            Some(adapter) => Self::from_adapter_info(&adapter.get_info()),
            None => Self {
                accelerator: Some(AcceleratorClass::Missing),
                mobile: Some(cfg!(any(target_os = "android", target_os = "ios"))),
                ..Default::default()
            },
        }
    }
}

/// Classify an adapter by name and device type.
pub fn accelerator_class(name: &str, device_type: wgpu::DeviceType) -> AcceleratorClass {
    if device_type == wgpu::DeviceType::Cpu {
        return AcceleratorClass::LowEnd;
    }

    let name = name.to_lowercase();
    let intel_hd = name
        .find("intel")
        .is_some_and(|at| name[at..].contains("hd"));

    if intel_hd || LOW_END_NAMES.iter().any(|n| name.contains(n)) {
        AcceleratorClass::LowEnd
    } else {
        AcceleratorClass::Standard
    }
}

/// Performance level of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PerformanceLevel {
    Low,
    Medium,
    High,
}

impl PerformanceLevel {
    /// Map a capability score to a level.
    pub fn from_score(score: i32) -> Self {
        if score <= 1 {
            PerformanceLevel::Low
        } else if score >= 4 {
            PerformanceLevel::High
        } else {
            PerformanceLevel::Medium
        }
    }

    /// Density threshold for this level relative to `base`.
    pub fn threshold(self, base: u8) -> u8 {
        let base = base as i32;
        let value = match self {
            PerformanceLevel::Low => (base + 30).max(80),
            PerformanceLevel::Medium => (base + 15).max(50),
            PerformanceLevel::High => (base - 10).max(20),
        };
        value.clamp(0, 255) as u8
    }
}

/// Result of classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerformanceProfile {
    pub level: PerformanceLevel,
    pub score: i32,
    /// Minimum channel value (exclusive) for a pixel to become a particle.
    pub threshold: u8,
}

impl PerformanceProfile {
    /// Profile used when nothing is known about the device.
    pub fn fallback() -> Self {
        Self {
            level: PerformanceLevel::Medium,
            score: 2,
            threshold: BASE_THRESHOLD,
        }
    }

    /// Process-wide profile, probed and classified on first use.
    pub fn cached() -> PerformanceProfile {
        *CACHED.get_or_init(|| classify(&CapabilitySignals::probe()))
    }
}

/// Classify a device from its capability signals.
///
/// Weights: desktop +2, accelerator that is not low-end +2, memory of at
/// least 8 GB +1. An unknown form factor or accelerator scores +1 (half
/// weight); unknown memory scores nothing. A missing accelerator is always
/// [`PerformanceLevel::Low`]. Never fails.
pub fn classify(signals: &CapabilitySignals) -> PerformanceProfile {
    if signals.is_empty() {
        log::info!("No capability signals, using fallback density threshold {}", BASE_THRESHOLD);
        return PerformanceProfile::fallback();
    }

    let mut score = 0;

    score += match signals.mobile {
        Some(false) => 2,
        Some(true) => 0,
        None => 1,
    };

    score += match signals.accelerator {
        Some(AcceleratorClass::Standard) => 2,
        Some(AcceleratorClass::LowEnd) | Some(AcceleratorClass::Missing) => 0,
        None => 1,
    };

    if signals.memory_gb.is_some_and(|gb| gb >= 8.0) {
        score += 1;
    }

    let level = if signals.accelerator == Some(AcceleratorClass::Missing) {
        PerformanceLevel::Low
    } else {
        PerformanceLevel::from_score(score)
    };

    let profile = PerformanceProfile {
        level,
        score,
        threshold: level.threshold(BASE_THRESHOLD),
    };

    log::info!(
        "Device performance {:?} (score {}, renderer {}), density threshold {}",
        profile.level,
        profile.score,
        signals.renderer.as_deref().unwrap_or("unknown"),
        profile.threshold
    );

    profile
}
