// Shared enumerations. Both travel as small integers in JSON and SQL.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(try_from = "i16", into = "i16")]
#[repr(i16)]
pub enum Role {
    #[default]
    Unknown = 0,
    Admin = 1,
    User = 2,
}

impl Role {
    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }
}

impl TryFrom<i16> for Role {
    type Error = String;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Role::Unknown),
            1 => Ok(Role::Admin),
            2 => Ok(Role::User),
            other => Err(format!("invalid role: {other}")),
        }
    }
}

impl From<Role> for i16 {
    fn from(role: Role) -> Self {
        role as i16
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(try_from = "i16", into = "i16")]
#[repr(i16)]
pub enum Sex {
    #[default]
    Other = 0,
    Female = 1,
    Male = 2,
}

impl TryFrom<i16> for Sex {
    type Error = String;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Sex::Other),
            1 => Ok(Sex::Female),
            2 => Ok(Sex::Male),
            other => Err(format!("invalid sex: {other}")),
        }
    }
}

impl From<Sex> for i16 {
    fn from(sex: Sex) -> Self {
        sex as i16
    }
}
