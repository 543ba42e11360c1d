use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("unrecognized {kind} {value:?}")]
pub struct ParsePreferenceError {
    pub kind: &'static str,
    pub value: String,
}

/// Defines a closed preference enum with a kebab-case string form shared by `Display`, `FromStr` and serde.
macro_rules! def_preference {
    ($t: ident, $kind: literal, default = $default: ident, { $($variant: ident => $name: literal),+ $(,)? }) => {
        #[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
        #[serde(try_from = "String", into = "&'static str")]
        pub enum $t {
            $($variant),+
        }

        impl $t {
            pub const ALL: &'static [$t] = &[$($t::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($t::$variant => $name),+
                }
            }
        }

        impl Default for $t {
            fn default() -> Self {
                $t::$default
            }
        }

        impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl From<$t> for &'static str {
            fn from(value: $t) -> Self {
                value.as_str()
            }
        }

        impl TryFrom<String> for $t {
            type Error = ParsePreferenceError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl FromStr for $t {
            type Err = ParsePreferenceError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok($t::$variant),)+
                    _ => Err(ParsePreferenceError {
                        kind: $kind,
                        value: s.to_owned(),
                    }),
                }
            }
        }
    };
}

def_preference!(MapStyle, "map style", default = Standard, {
    Standard => "standard",
    Satellite => "satellite",
    Hybrid => "hybrid",
    Light => "light",
    Dark => "dark",
    Outdoors => "outdoors",
    NavigationDay => "navigation-day",
    NavigationNight => "navigation-night",
    StandardSatellite => "standard-satellite",
    None => "none",
});

def_preference!(MapProjection, "map projection", default = Mercator, {
    Globe => "globe",
    Mercator => "mercator",
});

def_preference!(FogConcentration, "fog concentration", default = Medium, {
    Low => "low",
    Medium => "medium",
    High => "high",
});

/// How the map is drawn. None of this affects the visited-area data.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct Preferences {
    pub style: MapStyle,
    pub projection: MapProjection,
    pub fog_concentration: FogConcentration,
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
