//! User document schema
//!
//! Stores account profile fields and the argon2 password hash. The hash
//! never leaves the database layer; response DTOs are built from the other
//! fields only.

use bson::{doc, oid::ObjectId, Document};
use chrono::{DateTime, Utc};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::types::RitualError;

/// Collection name for users
pub const USER_COLLECTION: &str = "users";

/// Self-reported gender, constrained to the two wire values
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    #[default]
    Male,
    Female,
}

impl Gender {
    pub fn parse(value: &str) -> Result<Self, RitualError> {
        match value {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            _ => Err(RitualError::Validation(
                "Gender must be either \"male\" or \"female\"".to_string(),
            )),
        }
    }
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Gender::Male => write!(f, "male"),
            Gender::Female => write!(f, "female"),
        }
    }
}

/// User document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct UserDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    pub name: String,

    pub surname: String,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub birthday: DateTime<Utc>,

    pub gender: Gender,

    /// Login identifier, unique across the collection
    pub email: String,

    /// Argon2 password hash
    pub password_hash: String,
}

impl UserDoc {
    /// Create a new user document
    pub fn new(
        name: String,
        surname: String,
        birthday: DateTime<Utc>,
        gender: Gender,
        email: String,
        password_hash: String,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            name,
            surname,
            birthday,
            gender,
            email,
            password_hash,
        }
    }
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Unique index on email
            (
                doc! { "email": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("email_unique".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for UserDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gender_parses_wire_values() {
        assert_eq!(Gender::parse("male").unwrap(), Gender::Male);
        assert_eq!(Gender::parse("female").unwrap(), Gender::Female);
        assert!(Gender::parse("other").is_err());
        assert!(Gender::parse("MALE").is_err());
    }

    #[test]
    fn test_password_hash_is_a_plain_field() {
        // UserDoc serialization is only used by the database layer; routes
        // build response DTOs that leave this field out.
        let user = UserDoc::new(
            "Ada".to_string(),
            "Lovelace".to_string(),
            Utc::now(),
            Gender::Female,
            "ada@example.com".to_string(),
            "$argon2id$stub".to_string(),
        );
        let bson = bson::to_document(&user).unwrap();
        assert!(bson.contains_key("password_hash"));
    }
}
