use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

pub fn validate_identifier_value(kind: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{kind} must be non-empty"));
    }
    if value
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        return Ok(());
    }
    Err(format!(
        "{kind} must use only ASCII letters, digits, '-' or '_'"
    ))
}

/// Cache filenames land directly inside an environment's `cache/` directory,
/// so they must be exactly one path segment.
pub fn validate_cache_filename(value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err("cache filename must be non-empty".to_string());
    }
    if value == "." || value == ".." {
        return Err(format!("cache filename `{value}` is reserved"));
    }
    if value.contains('/') || value.contains('\\') || value.contains('\0') {
        return Err(format!(
            "cache filename `{value}` must not contain path separators"
        ));
    }
    Ok(())
}

macro_rules! define_id_type {
    ($name:ident, $kind:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn parse(raw: &str) -> Result<Self, String> {
                validate_identifier_value($kind, raw)?;
                Ok(Self(raw.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                self.as_str()
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                Self::parse(&raw).map_err(|err| {
                    D::Error::custom(format!("invalid {} `{}`: {}", $kind, raw, err))
                })
            }
        }
    };
}

define_id_type!(EnvironmentName, "environment name");
define_id_type!(ProcedureName, "procedure name");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_names_reject_path_like_values() {
        assert!(EnvironmentName::parse("default").is_ok());
        assert!(EnvironmentName::parse("exp-2_b").is_ok());
        assert!(EnvironmentName::parse("").is_err());
        assert!(EnvironmentName::parse("../etc").is_err());
        assert!(EnvironmentName::parse("a b").is_err());
    }

    #[test]
    fn cache_filenames_must_be_single_segment() {
        assert!(validate_cache_filename("classifier.rf").is_ok());
        assert!(validate_cache_filename("X.csv").is_ok());
        assert!(validate_cache_filename("..").is_err());
        assert!(validate_cache_filename("nested/X.csv").is_err());
        assert!(validate_cache_filename("  ").is_err());
    }

    #[test]
    fn procedure_name_deserialize_reports_kind() {
        let err = serde_json::from_str::<ProcedureName>("\"bad name\"")
            .expect_err("invalid procedure name");
        assert!(err.to_string().contains("invalid procedure name"));
    }
}
