//! Remote field types and the fixed table mapping them to local column types.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Field type as reported by the CRM describe APIs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RemoteFieldType {
    String,
    TextArea,
    Double,
    Percent,
    Currency,
    Int,
    Boolean,
    Date,
    DateTime,
    Picklist,
    Phone,
    Email,
    Url,
    Reference,
    Id,
    Other(String),
}

impl RemoteFieldType {
    pub fn parse(value: &str) -> Self {
        match value {
            "string" => Self::String,
            "textarea" => Self::TextArea,
            "double" => Self::Double,
            "percent" => Self::Percent,
            "currency" => Self::Currency,
            "int" => Self::Int,
            "boolean" => Self::Boolean,
            "date" => Self::Date,
            "datetime" => Self::DateTime,
            "picklist" => Self::Picklist,
            "phone" => Self::Phone,
            "email" => Self::Email,
            "url" => Self::Url,
            "reference" => Self::Reference,
            "id" => Self::Id,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::String => "string",
            Self::TextArea => "textarea",
            Self::Double => "double",
            Self::Percent => "percent",
            Self::Currency => "currency",
            Self::Int => "int",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Picklist => "picklist",
            Self::Phone => "phone",
            Self::Email => "email",
            Self::Url => "url",
            Self::Reference => "reference",
            Self::Id => "id",
            Self::Other(name) => name,
        }
    }

    /// Local column type for this remote type.
    pub fn local_type(&self) -> LocalType {
        match self {
            Self::Double | Self::Percent | Self::Currency | Self::Int | Self::Boolean => {
                LocalType::Integer
            }
            _ => LocalType::Text,
        }
    }
}

impl fmt::Display for RemoteFieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RemoteFieldType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RemoteFieldType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::parse(&value))
    }
}

/// Column type of the local survey table.
///
/// `Integer` carries SQLite numeric affinity, so decimals survive; booleans
/// are stored as 0/1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocalType {
    Integer,
    Text,
}

impl LocalType {
    pub fn sql_type(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Text => "text",
        }
    }
}

/// Lookup into the coercion table.
pub fn local_type_for(remote_type: &str) -> LocalType {
    RemoteFieldType::parse(remote_type).local_type()
}
