use serde::{Deserialize, Serialize};

use super::ModelError;

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = ModelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                $(
                    if trimmed.eq_ignore_ascii_case($s) {
                        return Ok(Self::$variant);
                    }
                )+
                Err(ModelError::InvalidEnum {
                    field: stringify!($name).into(),
                    value: s.into(),
                })
            }
        }

        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(Classification {
    Low => "low",
    High => "high",
});

// Sex code used by the guideline table. `Any` is the sex-agnostic band.
str_enum!(SexBand {
    Male => "M",
    Female => "F",
    Any => "Todos",
});

impl SexBand {
    /// Sex-specific bands outrank the `Todos` fallback band.
    pub fn specificity(&self) -> u8 {
        match self {
            Self::Male | Self::Female => 1,
            Self::Any => 0,
        }
    }
}

/// Patient sex as reported by the caller.
///
/// The upload form sends free text; only `masculino` and `feminino` are
/// recognized, anything else is treated as unspecified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatientSex {
    Masculino,
    Feminino,
    Unspecified,
}

impl PatientSex {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "masculino" => Self::Masculino,
            "feminino" => Self::Feminino,
            _ => Self::Unspecified,
        }
    }

    /// Guideline band this patient is matched against (besides `Todos`).
    pub fn band(&self) -> SexBand {
        match self {
            Self::Masculino => SexBand::Male,
            Self::Feminino => SexBand::Female,
            Self::Unspecified => SexBand::Any,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn classification_round_trips_through_str() {
        assert_eq!(Classification::from_str("low").unwrap(), Classification::Low);
        assert_eq!(Classification::High.as_str(), "high");
        assert!(Classification::from_str("normal").is_err());
    }

    #[test]
    fn sex_band_parses_table_codes_case_insensitively() {
        assert_eq!(SexBand::from_str("M").unwrap(), SexBand::Male);
        assert_eq!(SexBand::from_str(" f ").unwrap(), SexBand::Female);
        assert_eq!(SexBand::from_str("todos").unwrap(), SexBand::Any);
        assert!(matches!(
            SexBand::from_str("X"),
            Err(ModelError::InvalidEnum { .. })
        ));
    }

    #[test]
    fn sex_specific_bands_outrank_todos() {
        assert!(SexBand::Male.specificity() > SexBand::Any.specificity());
        assert!(SexBand::Female.specificity() > SexBand::Any.specificity());
    }

    #[test]
    fn patient_sex_maps_to_band() {
        assert_eq!(PatientSex::parse("Masculino").band(), SexBand::Male);
        assert_eq!(PatientSex::parse("FEMININO").band(), SexBand::Female);
        assert_eq!(PatientSex::parse("outro").band(), SexBand::Any);
        assert_eq!(PatientSex::parse("").band(), SexBand::Any);
    }

    #[test]
    fn serde_uses_table_codes() {
        let json = serde_json::to_string(&SexBand::Any).unwrap();
        assert_eq!(json, "\"Todos\"");
        let json = serde_json::to_string(&Classification::Low).unwrap();
        assert_eq!(json, "\"low\"");
    }
}
