//! Identifier newtypes and personnel records.
//!
//! Ids are opaque strings as they arrive from the roster store; the newtypes
//! keep a person id from being passed where a shift id is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_newtype!(
    /// Identifier of a person on the personnel roster.
    PersonId
);

string_newtype!(
    /// Identifier of a post (duty position).
    PositionId
);

string_newtype!(
    /// Identifier of a shift, unique within its post.
    ShiftId
);

string_newtype!(
    /// A personnel role, matched against slot eligibility.
    Role
);

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// A member of the personnel roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub unit: String,
}

impl Person {
    pub fn new(id: impl Into<PersonId>, name: impl Into<String>, role: impl Into<Role>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: role.into(),
            unit: String::new(),
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newtype_display() {
        assert_eq!(PersonId::from("p-01").to_string(), "p-01");
        assert_eq!(PositionId::from("gate").to_string(), "gate");
        assert_eq!(ShiftId::from("night").to_string(), "night");
    }

    #[test]
    fn newtype_serializes_as_plain_string() {
        let yaml = serde_yaml::to_string(&Role::from("medic")).expect("serialize");
        assert_eq!(yaml.trim(), "medic");
    }

    #[test]
    fn person_defaults_unit_when_missing() {
        let person: Person =
            serde_yaml::from_str("id: p1\nname: Ada\nrole: guard\n").expect("deserialize");
        assert_eq!(person.unit, "");
        assert_eq!(person.role, Role::from("guard"));
    }
}
