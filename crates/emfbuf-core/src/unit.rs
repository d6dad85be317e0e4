//! Unit catalog and storage resolution.
//!
//! `MetricUnit` is the closed set of units CloudWatch understands. Callers
//! that only have a string can pass `Unit::Raw`; whether an unknown raw string
//! is rejected or emitted verbatim is decided by `UnitPolicy` at validation.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Well-known measurement units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricUnit {
    Seconds,
    Microseconds,
    Milliseconds,
    Bytes,
    Kilobytes,
    Megabytes,
    Gigabytes,
    Terabytes,
    Bits,
    Kilobits,
    Megabits,
    Gigabits,
    Terabits,
    Percent,
    Count,
    BytesPerSecond,
    KilobytesPerSecond,
    MegabytesPerSecond,
    GigabytesPerSecond,
    TerabytesPerSecond,
    BitsPerSecond,
    KilobitsPerSecond,
    MegabitsPerSecond,
    GigabitsPerSecond,
    TerabitsPerSecond,
    CountPerSecond,
    None,
}

impl MetricUnit {
    /// Every catalog entry, in declaration order.
    pub const ALL: [MetricUnit; 27] = [
        MetricUnit::Seconds,
        MetricUnit::Microseconds,
        MetricUnit::Milliseconds,
        MetricUnit::Bytes,
        MetricUnit::Kilobytes,
        MetricUnit::Megabytes,
        MetricUnit::Gigabytes,
        MetricUnit::Terabytes,
        MetricUnit::Bits,
        MetricUnit::Kilobits,
        MetricUnit::Megabits,
        MetricUnit::Gigabits,
        MetricUnit::Terabits,
        MetricUnit::Percent,
        MetricUnit::Count,
        MetricUnit::BytesPerSecond,
        MetricUnit::KilobytesPerSecond,
        MetricUnit::MegabytesPerSecond,
        MetricUnit::GigabytesPerSecond,
        MetricUnit::TerabytesPerSecond,
        MetricUnit::BitsPerSecond,
        MetricUnit::KilobitsPerSecond,
        MetricUnit::MegabitsPerSecond,
        MetricUnit::GigabitsPerSecond,
        MetricUnit::TerabitsPerSecond,
        MetricUnit::CountPerSecond,
        MetricUnit::None,
    ];

    /// Value written to the `Unit` field of a metric definition.
    pub fn as_str(self) -> &'static str {
        match self {
            MetricUnit::Seconds => "Seconds",
            MetricUnit::Microseconds => "Microseconds",
            MetricUnit::Milliseconds => "Milliseconds",
            MetricUnit::Bytes => "Bytes",
            MetricUnit::Kilobytes => "Kilobytes",
            MetricUnit::Megabytes => "Megabytes",
            MetricUnit::Gigabytes => "Gigabytes",
            MetricUnit::Terabytes => "Terabytes",
            MetricUnit::Bits => "Bits",
            MetricUnit::Kilobits => "Kilobits",
            MetricUnit::Megabits => "Megabits",
            MetricUnit::Gigabits => "Gigabits",
            MetricUnit::Terabits => "Terabits",
            MetricUnit::Percent => "Percent",
            MetricUnit::Count => "Count",
            MetricUnit::BytesPerSecond => "Bytes/Second",
            MetricUnit::KilobytesPerSecond => "Kilobytes/Second",
            MetricUnit::MegabytesPerSecond => "Megabytes/Second",
            MetricUnit::GigabytesPerSecond => "Gigabytes/Second",
            MetricUnit::TerabytesPerSecond => "Terabytes/Second",
            MetricUnit::BitsPerSecond => "Bits/Second",
            MetricUnit::KilobitsPerSecond => "Kilobits/Second",
            MetricUnit::MegabitsPerSecond => "Megabits/Second",
            MetricUnit::GigabitsPerSecond => "Gigabits/Second",
            MetricUnit::TerabitsPerSecond => "Terabits/Second",
            MetricUnit::CountPerSecond => "Count/Second",
            MetricUnit::None => "None",
        }
    }

    /// Variant name, e.g. `BytesPerSecond` for `Bytes/Second`.
    fn variant_name(self) -> String {
        self.as_str().replace("/Second", "PerSecond")
    }
}

impl fmt::Display for MetricUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no catalog unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownUnit(pub String);

impl FromStr for MetricUnit {
    type Err = UnknownUnit;

    /// Accepts either the wire value (`Bytes/Second`) or the variant name (`BytesPerSecond`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricUnit::ALL
            .iter()
            .copied()
            .find(|u| u.as_str() == s || u.variant_name() == s)
            .ok_or_else(|| UnknownUnit(s.to_string()))
    }
}

/// Unit as supplied by the caller: a catalog entry or a free-form string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unit {
    Known(MetricUnit),
    Raw(String),
}

impl Unit {
    /// Resolve to the string emitted on the wire.
    ///
    /// Returns `None` when the policy is strict and the raw string is unknown.
    pub fn resolve(&self, policy: UnitPolicy) -> Option<String> {
        match self {
            Unit::Known(u) => Some(u.as_str().to_string()),
            Unit::Raw(s) => match (s.parse::<MetricUnit>(), policy) {
                (Ok(u), _) => Some(u.as_str().to_string()),
                (Err(_), UnitPolicy::Passthrough) => Some(s.clone()),
                (Err(_), UnitPolicy::Strict) => None,
            },
        }
    }

    /// The caller-supplied text, unresolved.
    pub fn as_raw(&self) -> &str {
        match self {
            Unit::Known(u) => u.as_str(),
            Unit::Raw(s) => s,
        }
    }
}

impl From<MetricUnit> for Unit {
    fn from(u: MetricUnit) -> Self {
        Unit::Known(u)
    }
}

impl From<&str> for Unit {
    fn from(s: &str) -> Self {
        Unit::Raw(s.to_string())
    }
}

impl From<String> for Unit {
    fn from(s: String) -> Self {
        Unit::Raw(s)
    }
}

/// How raw unit strings outside the catalog are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitPolicy {
    /// Reject unknown raw units at validation time.
    #[default]
    Strict,
    /// Emit unknown raw units verbatim.
    Passthrough,
}

/// Storage resolution of a metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MetricResolution {
    /// 60 second resolution (CloudWatch default, not written to the record).
    #[default]
    Standard,
    /// 1 second resolution.
    High,
}

impl MetricResolution {
    /// Resolution in seconds.
    pub fn seconds(self) -> u32 {
        match self {
            MetricResolution::Standard => 60,
            MetricResolution::High => 1,
        }
    }
}
