#[cfg(feature = "sled")]
mod sled;

use crate::Result;

#[cfg(feature = "sled")]
pub use self::sled::SledDb as Database;

/// Numeric identifier shared by all stored entities.
///
/// Ids are handed out by the database and are monotonically increasing, so
/// sorting by id yields insertion order.
pub type Id = u64;

pub trait Identifiable {
    fn get_id(&self) -> Id;
    fn set_id(&mut self, id: Id);
}

pub trait Collectable {
    fn get_collection_name() -> &'static str;
}

/// Entities living in a collection scoped to some parent entity, e.g. the
/// delivery attempts of a single mailing.
pub trait CollectableAt {
    fn get_collection_name_at(parent: Id) -> String;
}

pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let t: T = pot::from_slice(bytes)?;
    Ok(t)
}

pub fn encode<T: serde::Serialize>(item: &T) -> Result<Vec<u8>> {
    let bytes = pot::to_vec(item)?;
    Ok(bytes)
}

/// Big-endian key encoding keeps tree iteration in id order.
pub fn key(id: Id) -> [u8; 8] {
    id.to_be_bytes()
}
