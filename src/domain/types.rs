//! Shared domain enumerations aligned with persisted database enums.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "content_status", rename_all = "snake_case")]
pub enum ContentStatus {
    Draft,
    Pending,
    Private,
    Published,
    /// Published, but hidden from default listings and feeds.
    Archiveless,
    Trash,
}

impl ContentStatus {
    /// Statuses a public listing query selects before visibility filtering.
    pub const PUBLIC: [ContentStatus; 2] = [ContentStatus::Published, ContentStatus::Archiveless];

    pub fn as_str(self) -> &'static str {
        match self {
            ContentStatus::Draft => "draft",
            ContentStatus::Pending => "pending",
            ContentStatus::Private => "private",
            ContentStatus::Published => "published",
            ContentStatus::Archiveless => "archiveless",
            ContentStatus::Trash => "trash",
        }
    }

    pub fn is_public(self) -> bool {
        matches!(self, ContentStatus::Published | ContentStatus::Archiveless)
    }
}

impl TryFrom<&str> for ContentStatus {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "draft" => Ok(ContentStatus::Draft),
            "pending" => Ok(ContentStatus::Pending),
            "private" => Ok(ContentStatus::Private),
            "published" | "publish" => Ok(ContentStatus::Published),
            "archiveless" => Ok(ContentStatus::Archiveless),
            "trash" => Ok(ContentStatus::Trash),
            _ => Err(()),
        }
    }
}

/// Hidden terms attached to sponsored items to keep them out of the loop or feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VisibilityTerm {
    #[serde(rename = "_hidden_from_loop")]
    HiddenFromLoop,
    #[serde(rename = "_hidden_from_feed")]
    HiddenFromFeed,
}

impl VisibilityTerm {
    pub const ALL: [VisibilityTerm; 2] = [VisibilityTerm::HiddenFromLoop, VisibilityTerm::HiddenFromFeed];

    pub fn as_str(self) -> &'static str {
        match self {
            VisibilityTerm::HiddenFromLoop => "_hidden_from_loop",
            VisibilityTerm::HiddenFromFeed => "_hidden_from_feed",
        }
    }
}

impl TryFrom<&str> for VisibilityTerm {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "_hidden_from_loop" => Ok(VisibilityTerm::HiddenFromLoop),
            "_hidden_from_feed" => Ok(VisibilityTerm::HiddenFromFeed),
            _ => Err(()),
        }
    }
}

/// How a metadata value is interpreted when compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MetaValueType {
    #[default]
    Char,
    Numeric,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetaCompare {
    #[serde(rename = "EXISTS")]
    Exists,
    #[serde(rename = "NOT EXISTS")]
    NotExists,
    #[default]
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "LIKE")]
    Like,
}

impl MetaCompare {
    pub fn as_sql(self) -> &'static str {
        match self {
            MetaCompare::Exists => "EXISTS",
            MetaCompare::NotExists => "NOT EXISTS",
            MetaCompare::Eq => "=",
            MetaCompare::NotEq => "<>",
            MetaCompare::Gt => ">",
            MetaCompare::Gte => ">=",
            MetaCompare::Lt => "<",
            MetaCompare::Lte => "<=",
            MetaCompare::Like => "ILIKE",
        }
    }

    pub fn needs_value(self) -> bool {
        !matches!(self, MetaCompare::Exists | MetaCompare::NotExists)
    }
}

impl TryFrom<&str> for MetaCompare {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "EXISTS" => Ok(MetaCompare::Exists),
            "NOT EXISTS" => Ok(MetaCompare::NotExists),
            "=" => Ok(MetaCompare::Eq),
            "!=" | "<>" => Ok(MetaCompare::NotEq),
            ">" => Ok(MetaCompare::Gt),
            ">=" => Ok(MetaCompare::Gte),
            "<" => Ok(MetaCompare::Lt),
            "<=" => Ok(MetaCompare::Lte),
            "LIKE" => Ok(MetaCompare::Like),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_alias_maps_to_published() {
        assert_eq!(
            ContentStatus::try_from("publish"),
            Ok(ContentStatus::Published)
        );
        assert!(ContentStatus::try_from("future").is_err());
    }

    #[test]
    fn archiveless_is_public() {
        assert!(ContentStatus::Archiveless.is_public());
        assert!(!ContentStatus::Draft.is_public());
    }

    #[test]
    fn meta_compare_parses_case_insensitively() {
        assert_eq!(MetaCompare::try_from("not exists"), Ok(MetaCompare::NotExists));
        assert_eq!(MetaCompare::try_from("<>"), Ok(MetaCompare::NotEq));
    }

    #[test]
    fn visibility_terms_serialize_as_term_slugs() {
        let json = serde_json::to_string(&VisibilityTerm::HiddenFromFeed).expect("serialize");
        assert_eq!(json, "\"_hidden_from_feed\"");
    }
}
