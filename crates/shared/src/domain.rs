use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ParseEnumError;

macro_rules! wire_enum {
    ($name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($wire => Ok($name::$variant),)+
                    other => Err(ParseEnumError::new(stringify!($name), other)),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupMode {
    #[default]
    Technique,
    Nist,
}

wire_enum!(LookupMode {
    Technique => "technique",
    Nist => "nist",
});

impl LookupMode {
    pub fn endpoint(self) -> &'static str {
        match self {
            LookupMode::Technique => "/api/technique",
            LookupMode::Nist => "/api/nist",
        }
    }

    pub fn placeholder(self) -> &'static str {
        match self {
            LookupMode::Technique => "e.g., T1110",
            LookupMode::Nist => "e.g., AC-2",
        }
    }
}

/// Chat behaviour hint. Absence of a mode means "auto".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatMode {
    Map,
    Audit,
}

wire_enum!(ChatMode {
    Map => "map",
    Audit => "audit",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Prod,
    Staging,
    Dev,
}

wire_enum!(Environment {
    Prod => "prod",
    Staging => "staging",
    Dev => "dev",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

wire_enum!(Severity {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Moderate,
    Elevated,
    High,
}

wire_enum!(RiskLevel {
    Low => "low",
    Moderate => "moderate",
    Elevated => "elevated",
    High => "high",
});
