use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// The string form is also the serde representation stored in documents.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
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

str_enum!(Conclusion {
    Yes => "YES",
    No => "NO",
    Slit => "SLIT",
});

str_enum!(DecisionMethod {
    Rule => "rule-based",
    Ai => "ai",
});

impl Conclusion {
    /// Interpret a conclusion emitted by the model. Matching is case-insensitive
    /// and ignores surrounding whitespace; anything unrecognised becomes `No`.
    pub fn from_model_output(raw: &str) -> Self {
        raw.trim().to_uppercase().parse().unwrap_or(Self::No)
    }

    /// Family-level conclusion: YES beats SLIT beats NO, independent of order.
    pub fn aggregate<'a, I>(conclusions: I) -> Self
    where
        I: IntoIterator<Item = &'a Conclusion>,
    {
        let mut has_slit = false;
        for c in conclusions {
            match c {
                Self::Yes => return Self::Yes,
                Self::Slit => has_slit = true,
                Self::No => {}
            }
        }
        if has_slit {
            Self::Slit
        } else {
            Self::No
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn conclusion_round_trips_through_str() {
        for c in [Conclusion::Yes, Conclusion::No, Conclusion::Slit] {
            assert_eq!(Conclusion::from_str(c.as_str()).unwrap(), c);
        }
    }

    #[test]
    fn from_str_is_case_sensitive() {
        assert!(Conclusion::from_str("yes").is_err());
    }

    #[test]
    fn model_output_matches_case_insensitively() {
        assert_eq!(Conclusion::from_model_output("yes"), Conclusion::Yes);
        assert_eq!(Conclusion::from_model_output("Slit"), Conclusion::Slit);
        assert_eq!(Conclusion::from_model_output(" no \n"), Conclusion::No);
    }

    #[test]
    fn unknown_model_output_coerces_to_no() {
        assert_eq!(Conclusion::from_model_output("MAYBE"), Conclusion::No);
        assert_eq!(Conclusion::from_model_output(""), Conclusion::No);
        assert_eq!(Conclusion::from_model_output("yes please"), Conclusion::No);
    }

    #[test]
    fn aggregate_priority_ignores_order() {
        use Conclusion::*;
        let orders: [&[Conclusion]; 4] = [
            &[No, Slit, Yes],
            &[Yes, No, Slit],
            &[Slit, Yes],
            &[No, No, Yes],
        ];
        for order in orders {
            assert_eq!(Conclusion::aggregate(order), Yes, "order {order:?}");
        }
        assert_eq!(Conclusion::aggregate(&[No, Slit, No]), Slit);
        assert_eq!(Conclusion::aggregate(&[Slit, No]), Slit);
        assert_eq!(Conclusion::aggregate(&[No, No]), No);
        let none: [Conclusion; 0] = [];
        assert_eq!(Conclusion::aggregate(&none), No);
    }

    #[test]
    fn serde_uses_document_labels() {
        assert_eq!(serde_json::to_string(&Conclusion::Slit).unwrap(), "\"SLIT\"");
        assert_eq!(serde_json::to_string(&DecisionMethod::Rule).unwrap(), "\"rule-based\"");
        let m: DecisionMethod = serde_json::from_str("\"ai\"").unwrap();
        assert_eq!(m, DecisionMethod::Ai);
    }
}
