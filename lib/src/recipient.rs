use crate::db::{Collectable, Id, Identifiable};
use crate::user::UserId;

pub type RecipientId = Id;

/// A single addressee that can be attached to any number of mailings.
///
/// Email addresses are unique across the whole store, not per owner.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Recipient {
    pub id: RecipientId,
    pub owner: UserId,
    pub email: String,
    pub full_name: String,
    /// Free-form notes about the recipient.
    pub comment: String,
}

impl Recipient {
    pub fn new(owner: UserId, email: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            id: 0,
            owner,
            email: email.into(),
            full_name: full_name.into(),
            comment: String::new(),
        }
    }
}

impl Collectable for Recipient {
    fn get_collection_name() -> &'static str {
        "recipient"
    }
}

impl Identifiable for Recipient {
    fn get_id(&self) -> Id {
        self.id
    }

    fn set_id(&mut self, id: Id) {
        self.id = id;
    }
}
