use crate::db::{Collectable, Id, Identifiable};

pub type UserId = Id;

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    /// Oversees all mailings and users but doesn't run mailings itself.
    Manager,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub role: Role,
    /// Blocked users keep their data but can't start mailings.
    pub is_blocked: bool,
}

impl User {
    pub fn new(email: impl Into<String>, role: Role) -> Self {
        Self {
            id: 0,
            email: email.into(),
            role,
            is_blocked: false,
        }
    }
}

impl Collectable for User {
    fn get_collection_name() -> &'static str {
        "user"
    }
}

impl Identifiable for User {
    fn get_id(&self) -> Id {
        self.id
    }

    fn set_id(&mut self, id: Id) {
        self.id = id;
    }
}
