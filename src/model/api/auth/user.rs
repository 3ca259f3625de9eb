use serde_repr::{Deserialize_repr, Serialize_repr};

/// Privilege levels granted by the session provider.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum Rights {
    User = 0,
    Admin = 1,
}

impl Rights {
    pub fn is_admin(self) -> bool {
        self == Self::Admin
    }
}

impl From<bool> for Rights {
    fn from(is_admin: bool) -> Self {
        if is_admin {
            Self::Admin
        } else {
            Self::User
        }
    }
}
