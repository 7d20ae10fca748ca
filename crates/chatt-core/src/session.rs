use serde::{Deserialize, Serialize};

use crate::ids::UserId;

/// Identity established by a successful authentication.
/// A session owns at most one live connection at a time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    user_id: UserId,
}

impl Session {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_carries_identity() {
        let id = UserId::from_raw("user_abc");
        let session = Session::new(id.clone());
        assert_eq!(session.user_id(), &id);
    }
}
