use crate::db::{Collectable, Id, Identifiable};
use crate::user::UserId;

pub type MessageId = Id;

/// Content of a mailing. The body may carry `{full_name}` and `{email}`
/// placeholders, filled in per recipient at send time.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Message {
    pub id: MessageId,
    pub owner: UserId,
    pub subject: String,
    pub body: String,
}

impl Message {
    pub fn new(owner: UserId, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: 0,
            owner,
            subject: subject.into(),
            body: body.into(),
        }
    }
}

impl Collectable for Message {
    fn get_collection_name() -> &'static str {
        "message"
    }
}

impl Identifiable for Message {
    fn get_id(&self) -> Id {
        self.id
    }

    fn set_id(&mut self, id: Id) {
        self.id = id;
    }
}
