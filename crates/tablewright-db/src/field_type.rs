use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use tablewright_common::{Error, Result};

use crate::database::{SqlValue, quote_literal};

/// Abstract column type understood by `add_field` and `change_field`.
///
/// Anything that is not one of the known names is passed through verbatim
/// as a column definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    Bool,
    Char,
    String,
    Integer,
    Date,
    Datetime,
    Text,
    Longtext,
    Autoincrement,
    Raw(String),
}

impl From<&str> for FieldType {
    fn from(s: &str) -> Self {
        match s {
            "bool" => Self::Bool,
            "char" => Self::Char,
            "string" => Self::String,
            "integer" => Self::Integer,
            "date" => Self::Date,
            "datetime" => Self::Datetime,
            "text" => Self::Text,
            "longtext" => Self::Longtext,
            "autoincrement" => Self::Autoincrement,
            other => Self::Raw(other.to_string()),
        }
    }
}

impl From<String> for FieldType {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<FieldType> for String {
    fn from(t: FieldType) -> Self {
        t.to_string()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Char => "char",
            Self::String => "string",
            Self::Integer => "integer",
            Self::Date => "date",
            Self::Datetime => "datetime",
            Self::Text => "text",
            Self::Longtext => "longtext",
            Self::Autoincrement => "autoincrement",
            Self::Raw(raw) => raw.as_str(),
        };
        f.write_str(name)
    }
}

impl FieldType {
    /// Column definition for this type, including its DEFAULT clause.
    ///
    /// `default` is the literal default value, `None` meaning "no specific
    /// value". With `no_default` the DEFAULT clause is left out entirely.
    pub fn definition(&self, default: Option<&str>, no_default: bool) -> Result<String> {
        let (base, policy) = match self {
            Self::Bool => ("TINYINT(1) NOT NULL", DefaultPolicy::Flag),
            Self::Char => ("CHAR(1)", DefaultPolicy::NullableText),
            Self::String => ("VARCHAR(255) COLLATE utf8_unicode_ci", DefaultPolicy::NullableText),
            Self::Integer => ("INT(11) NOT NULL", DefaultPolicy::Numeric),
            Self::Date => ("DATE", DefaultPolicy::Temporal),
            Self::Datetime => ("DATETIME", DefaultPolicy::Temporal),
            Self::Text => ("TEXT COLLATE utf8_unicode_ci", DefaultPolicy::NullableText),
            Self::Longtext => ("LONGTEXT COLLATE utf8_unicode_ci", DefaultPolicy::NullableText),
            Self::Autoincrement => ("INT(11) NOT NULL AUTO_INCREMENT", DefaultPolicy::Never),
            Self::Raw(raw) => return Ok(raw.clone()),
        };

        if no_default {
            return Ok(base.to_string());
        }

        let clause = match (policy, default) {
            (DefaultPolicy::Never, _) => return Ok(base.to_string()),
            (DefaultPolicy::Flag | DefaultPolicy::Numeric, None) => "DEFAULT '0'".to_string(),
            (DefaultPolicy::Flag, Some(v)) if v == "0" || v == "1" => {
                format!("DEFAULT {}", quote_literal(v))
            }
            (DefaultPolicy::Flag, Some(v)) => {
                return Err(self.invalid(v, "default value must be 0 or 1"));
            }
            (DefaultPolicy::Numeric, Some(v)) if is_numeric(v) => {
                format!("DEFAULT {}", quote_literal(v))
            }
            (DefaultPolicy::Numeric, Some(v)) => {
                return Err(self.invalid(v, "default value must be numeric"));
            }
            (DefaultPolicy::NullableText | DefaultPolicy::Temporal, None) => {
                "DEFAULT NULL".to_string()
            }
            (DefaultPolicy::NullableText, Some(v)) => {
                format!("NOT NULL DEFAULT {}", quote_literal(v))
            }
            (DefaultPolicy::Temporal, Some(v)) => format!("DEFAULT {}", quote_literal(v)),
        };

        Ok(format!("{base} {clause}"))
    }

    fn invalid(&self, value: &str, reason: &'static str) -> Error {
        Error::InvalidDefaultValue {
            field_type: self.to_string(),
            value: value.to_string(),
            reason,
        }
    }
}

#[derive(Clone, Copy)]
enum DefaultPolicy {
    Flag,
    NullableText,
    Numeric,
    Temporal,
    Never,
}

/// Accepts what MySQL accepts as a numeric literal: optional sign, digits,
/// optional fraction and exponent.
fn is_numeric(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty()
        && trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
        && trimmed.parse::<f64>().is_ok_and(f64::is_finite)
}

/// Kind of index created by `add_key`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IndexKind {
    #[default]
    #[serde(alias = "index")]
    Index,
    #[serde(alias = "unique")]
    Unique,
    #[serde(alias = "fulltext")]
    Fulltext,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Index => "INDEX",
            Self::Unique => "UNIQUE",
            Self::Fulltext => "FULLTEXT",
        })
    }
}

/// Options of `add_field` / `change_field`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldOptions {
    /// SQL expression backfilling existing rows once the column exists.
    pub update: String,
    /// Extra clause appended to the backfill UPDATE, usually a WHERE.
    pub condition: String,
    /// Default value literal.
    #[serde(deserialize_with = "scalar_as_text")]
    pub value: Option<String>,
    #[serde(alias = "nodefault")]
    pub no_default: bool,
    pub comment: String,
    /// Place the new column after this one.
    pub after: String,
    /// Place the new column first. Ignored when `after` is set.
    pub first: bool,
    #[serde(alias = "null")]
    pub nullable: bool,
}

impl FieldOptions {
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Default::default()
        }
    }
}

fn scalar_as_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    Ok(Option::<SqlValue>::deserialize(deserializer)?.and_then(|v| v.to_text()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_without_value_defaults_to_zero() {
        let def = FieldType::Integer.definition(None, false).unwrap();
        assert_eq!(def, "INT(11) NOT NULL DEFAULT '0'");
        assert!(def.ends_with("DEFAULT '0'"));
    }

    #[test]
    fn integer_rejects_non_numeric_default() {
        let err = FieldType::Integer.definition(Some("abc"), false).unwrap_err();
        assert!(matches!(err, Error::InvalidDefaultValue { .. }));

        assert_eq!(
            FieldType::Integer.definition(Some("-3"), false).unwrap(),
            "INT(11) NOT NULL DEFAULT '-3'"
        );
        assert_eq!(
            FieldType::Integer.definition(Some("1.5e2"), false).unwrap(),
            "INT(11) NOT NULL DEFAULT '1.5e2'"
        );
        assert!(FieldType::Integer.definition(Some("inf"), false).is_err());
    }

    #[test]
    fn bool_accepts_only_zero_or_one() {
        assert_eq!(
            FieldType::Bool.definition(None, false).unwrap(),
            "TINYINT(1) NOT NULL DEFAULT '0'"
        );
        assert_eq!(
            FieldType::Bool.definition(Some("1"), false).unwrap(),
            "TINYINT(1) NOT NULL DEFAULT '1'"
        );
        assert!(FieldType::Bool.definition(Some("2"), false).is_err());
        assert_eq!(
            FieldType::Bool.definition(Some("2"), true).unwrap(),
            "TINYINT(1) NOT NULL"
        );
    }

    #[test]
    fn text_types_switch_to_not_null_with_a_value() {
        assert_eq!(
            FieldType::String.definition(None, false).unwrap(),
            "VARCHAR(255) COLLATE utf8_unicode_ci DEFAULT NULL"
        );
        assert_eq!(
            FieldType::String.definition(Some("it's"), false).unwrap(),
            "VARCHAR(255) COLLATE utf8_unicode_ci NOT NULL DEFAULT 'it\\'s'"
        );
        assert_eq!(
            FieldType::Char.definition(Some("a"), false).unwrap(),
            "CHAR(1) NOT NULL DEFAULT 'a'"
        );
        assert_eq!(
            FieldType::Longtext.definition(None, true).unwrap(),
            "LONGTEXT COLLATE utf8_unicode_ci"
        );
    }

    #[test]
    fn temporal_types_stay_nullable() {
        assert_eq!(
            FieldType::Datetime.definition(None, false).unwrap(),
            "DATETIME DEFAULT NULL"
        );
        assert_eq!(
            FieldType::Date.definition(Some("2017-01-01"), false).unwrap(),
            "DATE DEFAULT '2017-01-01'"
        );
    }

    #[test]
    fn autoincrement_never_has_a_default() {
        assert_eq!(
            FieldType::Autoincrement.definition(Some("5"), false).unwrap(),
            "INT(11) NOT NULL AUTO_INCREMENT"
        );
    }

    #[test]
    fn unknown_types_pass_through() {
        let raw = FieldType::from("SMALLINT(6) NOT NULL DEFAULT '1'");
        assert_eq!(
            raw.definition(Some("x"), false).unwrap(),
            "SMALLINT(6) NOT NULL DEFAULT '1'"
        );
        assert_eq!(FieldType::from("integer"), FieldType::Integer);
    }

    #[test]
    fn options_accept_legacy_keys_and_numeric_values() {
        let opts: FieldOptions =
            serde_yaml::from_str("value: 0\nnodefault: false\nnull: true\nafter: name\n").unwrap();
        assert_eq!(opts.value.as_deref(), Some("0"));
        assert!(opts.nullable);
        assert_eq!(opts.after, "name");
        assert!(opts.update.is_empty());
    }

    #[test]
    fn index_kind_parses_either_case() {
        let kind: IndexKind = serde_yaml::from_str("unique").unwrap();
        assert_eq!(kind, IndexKind::Unique);
        let kind: IndexKind = serde_yaml::from_str("FULLTEXT").unwrap();
        assert_eq!(kind, IndexKind::Fulltext);
    }
}
