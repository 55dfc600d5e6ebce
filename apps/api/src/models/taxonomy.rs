//! Controlled vocabularies shared by signals, trends and users.
//!
//! Every enum is stored as its canonical display string in a TEXT column and
//! serialized to the same string on the wire. Incoming values may use either
//! the canonical string or the short variant name (handy for query strings,
//! where the canonical STEEP labels contain commas).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::postgres::{PgArgumentBuffer, PgHasArrayType, PgTypeInfo, PgValueRef};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("'{value}' is not a valid option for {field}")]
pub struct InvalidOption {
    pub field: &'static str,
    pub value: String,
}

/// Defines a string-backed enum with serde and Postgres TEXT codecs.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $value:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $value,)+
                }
            }

            pub fn options() -> Vec<&'static str> {
                Self::ALL.iter().map(|v| v.as_str()).collect()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = InvalidOption;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($value => return Ok($name::$variant),)+
                    _ => {}
                }
                // fall back to the bare variant name
                $(
                    if s == stringify!($variant) {
                        return Ok($name::$variant);
                    }
                )+
                Err(InvalidOption {
                    field: stringify!($name),
                    value: s.to_string(),
                })
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let value = String::deserialize(deserializer)?;
                value.parse().map_err(serde::de::Error::custom)
            }
        }

        impl sqlx::Type<sqlx::Postgres> for $name {
            fn type_info() -> PgTypeInfo {
                <&str as sqlx::Type<sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &PgTypeInfo) -> bool {
                <&str as sqlx::Type<sqlx::Postgres>>::compatible(ty)
            }
        }

        impl PgHasArrayType for $name {
            fn array_type_info() -> PgTypeInfo {
                <&str as PgHasArrayType>::array_type_info()
            }
        }

        impl<'q> sqlx::Encode<'q, sqlx::Postgres> for $name {
            fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> sqlx::encode::IsNull {
                <&str as sqlx::Encode<'q, sqlx::Postgres>>::encode(self.as_str(), buf)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $name {
            fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
                let text = <&str as sqlx::Decode<'r, sqlx::Postgres>>::decode(value)?;
                Ok(text.parse::<$name>()?)
            }
        }
    };
}

text_enum! {
    /// User roles for RBAC. Admins, curators and users are actual users who
    /// authenticate via JWT; the visitor role is assigned to a dummy user
    /// authenticated with an API key.
    pub enum Role {
        Admin => "Admin",
        Curator => "Curator",
        User => "User",
        Visitor => "Visitor",
    }
}

text_enum! {
    /// Signal/trend review statuses.
    pub enum Status {
        Draft => "Draft",
        New => "New",
        Approved => "Approved",
        Archived => "Archived",
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::New
    }
}

text_enum! {
    /// Categories in terms of the STEEP+V analysis methodology.
    pub enum Steep {
        Social => "Social – Issues related to human culture, demography, communication, movement and migration, work and education",
        Technological => "Technological – Made culture, tools, devices, systems, infrastructure and networks",
        Economic => "Economic – Issues of value, money, financial tools and systems, business and business models, exchanges and transactions",
        Environmental => "Environmental – The natural world, living environment, sustainability, resources, climate and health",
        Political => "Political – Legal issues, policy, governance, rules and regulations and organizational systems",
        Values => "Values – Ethics, spirituality, ideology or other forms of values",
    }
}

text_enum! {
    /// The six Signature Solutions plus the three enablers.
    pub enum Signature {
        Poverty => "Poverty and Inequality",
        Governance => "Governance",
        Resilience => "Resilience",
        Environment => "Environment",
        Energy => "Energy",
        Gender => "Gender Equality",
        Innovation => "Strategic Innovation",
        Digitalisation => "Digitalisation",
        Financing => "Development Financing",
    }
}

text_enum! {
    /// The 17 Sustainable Development Goals.
    pub enum Goal {
        G1 => "GOAL 1: No Poverty",
        G2 => "GOAL 2: Zero Hunger",
        G3 => "GOAL 3: Good Health and Well-being",
        G4 => "GOAL 4: Quality Education",
        G5 => "GOAL 5: Gender Equality",
        G6 => "GOAL 6: Clean Water and Sanitation",
        G7 => "GOAL 7: Affordable and Clean Energy",
        G8 => "GOAL 8: Decent Work and Economic Growth",
        G9 => "GOAL 9: Industry, Innovation and Infrastructure",
        G10 => "GOAL 10: Reduced Inequality",
        G11 => "GOAL 11: Sustainable Cities and Communities",
        G12 => "GOAL 12: Responsible Consumption and Production",
        G13 => "GOAL 13: Climate Action",
        G14 => "GOAL 14: Life Below Water",
        G15 => "GOAL 15: Life on Land",
        G16 => "GOAL 16: Peace and Justice Strong Institutions",
        G17 => "GOAL 17: Partnerships to achieve the Goal",
    }
}

text_enum! {
    /// Signal novelty scores.
    pub enum Score {
        One => "1 — Non-novel (known, but potentially notable in particular context)",
        Two => "2",
        Three => "3 — Potentially novel or uncertain, but not clear in its potential impact",
        Four => "4",
        Five => "5 — Something that introduces or points to a potentially interesting or consequential change in direction of trends",
    }
}

text_enum! {
    /// Trend impact horizons.
    pub enum Horizon {
        Short => "Horizon 1 (0-3 years)",
        Medium => "Horizon 2 (3-7 years)",
        Long => "Horizon 3 (7-10 years)",
    }
}

text_enum! {
    /// Trend impact ratings.
    pub enum Rating {
        Low => "1 – Low",
        Moderate => "2 – Moderate",
        High => "3 – Significant",
    }
}

text_enum! {
    /// Regional bureaus.
    pub enum Bureau {
        Rba => "RBA",
        Rbap => "RBAP",
        Rbas => "RBAS",
        Rbec => "RBEC",
        Rblac => "RBLAC",
    }
}

/// Static option lists for the choices endpoint, keyed by field name.
pub fn static_choices() -> Vec<(&'static str, Vec<&'static str>)> {
    vec![
        ("role", Role::options()),
        ("status", Status::options()),
        ("steep", Steep::options()),
        ("signature", Signature::options()),
        ("goal", Goal::options()),
        ("score", Score::options()),
        ("horizon", Horizon::options()),
        ("rating", Rating::options()),
        ("bureau", Bureau::options()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_value() {
        assert_eq!("Approved".parse::<Status>().unwrap(), Status::Approved);
        assert_eq!(
            "Poverty and Inequality".parse::<Signature>().unwrap(),
            Signature::Poverty
        );
    }

    #[test]
    fn parses_variant_name_fallback() {
        // STEEP labels contain commas, so query strings send the short name
        assert_eq!("Social".parse::<Steep>().unwrap(), Steep::Social);
        assert_eq!("G13".parse::<Goal>().unwrap(), Goal::G13);
    }

    #[test]
    fn rejects_unknown_value() {
        let err = "Banana".parse::<Status>().unwrap_err();
        assert_eq!(err.field, "Status");
    }

    #[test]
    fn serializes_to_canonical_value() {
        let json = serde_json::to_string(&Steep::Economic).unwrap();
        assert!(json.contains("Economic – Issues of value"));
    }

    #[test]
    fn status_defaults_to_new() {
        assert_eq!(Status::default(), Status::New);
    }
}
