//! User entity and its input types

use chrono::{DateTime, Utc};
use hatch_migrate::{ColumnDef, ColumnType, IndexDef, TableDef};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer};

use super::ValidationError;

pub const USERS_TABLE: &str = "users";

const MAX_EMAIL_LEN: usize = 255;
const MAX_NAME_LEN: usize = 255;

/// `local@domain.tld` with no whitespace and a single `@`
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s.]+$").expect("invalid email regex")
});

/// Persisted user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub is_active: bool,
    pub is_superuser: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated, lowercased email address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Trim, lowercase and check the basic address shape.
    ///
    /// ```
    /// use hatch_server::models::EmailAddress;
    ///
    /// assert_eq!(EmailAddress::new(" Ann@X.com ").unwrap().as_str(), "ann@x.com");
    /// assert!(EmailAddress::new("ann@localhost").is_err());
    /// ```
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ValidationError::Empty { field: "email" });
        }

        if s.chars().count() > MAX_EMAIL_LEN {
            return Err(ValidationError::TooLong {
                field: "email",
                max: MAX_EMAIL_LEN,
            });
        }

        if !EMAIL_RE.is_match(s) {
            return Err(ValidationError::InvalidFormat {
                field: "email",
                reason: "must be a valid email address",
            });
        }

        Ok(Self(s.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Validated display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayName(String);

impl DisplayName {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ValidationError::Empty { field: "name" });
        }

        if s.chars().count() > MAX_NAME_LEN {
            return Err(ValidationError::TooLong {
                field: "name",
                max: MAX_NAME_LEN,
            });
        }

        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// `POST /users` body
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateUser {
    pub email: String,
    #[serde(default, alias = "full_name")]
    pub name: Option<String>,
}

impl CreateUser {
    pub fn validate(self) -> Result<NewUser, ValidationError> {
        let email = EmailAddress::new(&self.email);
        let name = self.name.as_deref().map(DisplayName::new).transpose();

        match (email, name) {
            (Ok(email), Ok(name)) => Ok(NewUser::new(email, name)),
            (Err(e), Ok(_)) | (Ok(_), Err(e)) => Err(e),
            (Err(a), Err(b)) => Err(ValidationError::Multiple(vec![a, b])),
        }
    }
}

/// `PATCH /users/{id}` body. Absent fields are left untouched;
/// `"name": null` clears the name.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateUser {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "full_name", deserialize_with = "double_option")]
    pub name: Option<Option<String>>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

impl UpdateUser {
    pub fn validate(self) -> Result<UserChanges, ValidationError> {
        let mut errors = Vec::new();

        let email = match self.email.as_deref().map(EmailAddress::new).transpose() {
            Ok(email) => email,
            Err(e) => {
                errors.push(e);
                None
            }
        };

        let name = match self.name {
            None => None,
            Some(None) => Some(None),
            Some(Some(raw)) => match DisplayName::new(&raw) {
                Ok(name) => Some(Some(name)),
                Err(e) => {
                    errors.push(e);
                    None
                }
            },
        };

        if let Some(err) = ValidationError::combine(errors) {
            return Err(err);
        }

        Ok(UserChanges {
            email,
            name,
            is_active: self.is_active,
        })
    }
}

/// Validated insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: EmailAddress,
    pub name: Option<DisplayName>,
    pub is_superuser: bool,
}

impl NewUser {
    pub fn new(email: EmailAddress, name: Option<DisplayName>) -> Self {
        Self {
            email,
            name,
            is_superuser: false,
        }
    }

    pub fn superuser(email: EmailAddress, name: Option<DisplayName>) -> Self {
        Self {
            email,
            name,
            is_superuser: true,
        }
    }
}

/// Validated partial update
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub email: Option<EmailAddress>,
    pub name: Option<Option<DisplayName>>,
    pub is_active: Option<bool>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.name.is_none() && self.is_active.is_none()
    }

    /// Apply to an in-memory copy. Timestamps are left to the caller.
    pub fn apply_to(&self, user: &mut User) {
        if let Some(email) = &self.email {
            user.email = email.as_str().to_owned();
        }
        if let Some(name) = &self.name {
            user.name = name.as_ref().map(|n| n.as_str().to_owned());
        }
        if let Some(active) = self.is_active {
            user.is_active = active;
        }
    }
}

/// Table definition the migrations are generated from.
pub fn users_table() -> TableDef {
    TableDef::new(USERS_TABLE)
        .with_column(ColumnDef::new("id", ColumnType::BigSerial).primary_key())
        .with_column(ColumnDef::new("email", ColumnType::Varchar(255)))
        .with_column(ColumnDef::new("name", ColumnType::Varchar(255)).nullable())
        .with_column(ColumnDef::new("is_active", ColumnType::Boolean).default_sql("TRUE"))
        .with_column(ColumnDef::new("is_superuser", ColumnType::Boolean).default_sql("FALSE"))
        .with_column(ColumnDef::new("created_at", ColumnType::TimestampTz).default_sql("NOW()"))
        .with_column(ColumnDef::new("updated_at", ColumnType::TimestampTz).default_sql("NOW()"))
        .with_index(IndexDef::new("ix_users_email", &["email"]).unique())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_normalized() {
        let email = EmailAddress::new("  Ann@Example.COM ").unwrap();
        assert_eq!(email.as_str(), "ann@example.com");
    }

    #[test]
    fn email_rejects_bad_shapes() {
        for bad in ["", "ann", "ann@", "@x.com", "ann@x", "a b@x.com", "ann@@x.com", "ann@x."] {
            assert!(EmailAddress::new(bad).is_err(), "{bad} should be rejected");
        }
        let long = format!("{}@x.com", "a".repeat(260));
        assert!(matches!(
            EmailAddress::new(&long),
            Err(ValidationError::TooLong { field: "email", .. })
        ));
    }

    #[test]
    fn create_collects_every_error() {
        let input: CreateUser =
            serde_json::from_str(r#"{"email": "nope", "name": "   "}"#).unwrap();
        let err = input.validate().unwrap_err();
        assert_eq!(err.field_errors().len(), 2);
    }

    #[test]
    fn create_accepts_full_name_alias() {
        let input: CreateUser =
            serde_json::from_str(r#"{"email": "ann@x.com", "full_name": "Ann"}"#).unwrap();
        let user = input.validate().unwrap();
        assert_eq!(user.name.unwrap().as_str(), "Ann");
        assert!(!user.is_superuser);
    }

    #[test]
    fn create_rejects_unknown_fields() {
        let parsed = serde_json::from_str::<CreateUser>(
            r#"{"email": "ann@x.com", "is_superuser": true}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn update_distinguishes_null_from_absent() {
        let absent: UpdateUser = serde_json::from_str(r#"{"is_active": false}"#).unwrap();
        let changes = absent.validate().unwrap();
        assert_eq!(changes.name, None);
        assert_eq!(changes.is_active, Some(false));

        let cleared: UpdateUser = serde_json::from_str(r#"{"name": null}"#).unwrap();
        assert_eq!(cleared.validate().unwrap().name, Some(None));

        let empty: UpdateUser = serde_json::from_str("{}").unwrap();
        assert!(empty.validate().unwrap().is_empty());
    }

    #[test]
    fn changes_apply_to_user() {
        let now = Utc::now();
        let mut user = User {
            id: 1,
            email: "ann@x.com".into(),
            name: Some("Ann".into()),
            is_active: true,
            is_superuser: false,
            created_at: now,
            updated_at: now,
        };
        let changes = UserChanges {
            name: Some(Some(DisplayName::new("Annie").unwrap())),
            ..UserChanges::default()
        };
        changes.apply_to(&mut user);
        assert_eq!(user.name.as_deref(), Some("Annie"));
        assert_eq!(user.email, "ann@x.com");
    }
}
