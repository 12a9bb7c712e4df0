use crate::board::domain::{Role, UserId};
use crate::board::error::BoardError;

/// Caller identity recovered from a verified bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub id: UserId,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), BoardError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(BoardError::forbidden("Admin access required"))
        }
    }

    pub fn require_role(&self, role: Role, message: &str) -> Result<(), BoardError> {
        if self.role == role {
            Ok(())
        } else {
            Err(BoardError::forbidden(message))
        }
    }
}
