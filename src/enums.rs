use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Enum stored as a lowercase string column, parsed back through `FromStr`.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
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
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(AppError::schema(stringify!($name), s)),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(AppointmentStatus {
    Scheduled => "scheduled",
    Completed => "completed",
    Cancelled => "cancelled",
});

str_enum!(Cadence {
    Daily => "daily",
    Weekly => "weekly",
    Monthly => "monthly",
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn parses_stored_strings() {
        assert_eq!(Cadence::from_str("weekly").unwrap(), Cadence::Weekly);
        assert_eq!(
            AppointmentStatus::from_str("cancelled").unwrap(),
            AppointmentStatus::Cancelled
        );
    }

    #[test]
    fn unknown_value_is_schema_mismatch() {
        match Cadence::from_str("hourly") {
            Err(AppError::SchemaMismatch { field, value }) => {
                assert_eq!(field, "Cadence");
                assert_eq!(value, "hourly");
            }
            other => panic!("expected schema mismatch, got {other:?}"),
        }
    }

    #[test]
    fn serde_matches_column_values() {
        assert_eq!(serde_json::to_string(&Cadence::Monthly).unwrap(), "\"monthly\"");
        assert_eq!(
            serde_json::to_string(&AppointmentStatus::Scheduled).unwrap(),
            "\"scheduled\""
        );
    }
}
