use std::path::Path;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::mailing::{Mailing, MailingAttempt, MailingFilter, MailingId, MailingStatus};
use crate::message::{Message, MessageId};
use crate::recipient::Recipient;
use crate::store::{Claim, Store};
use crate::user::{User, UserId};
use crate::{error::ErrorKind, Result};

use super::{decode, encode, key, Collectable, CollectableAt, Id, Identifiable};

const CLAIMS: &str = "dispatch_claim";

#[derive(Clone, Debug)]
pub struct SledDb {
    inner: sled::Db,
}

impl SledDb {
    pub fn new(config: &crate::config::Db) -> Result<Self> {
        if config.temporary {
            Self::temporary()
        } else {
            Self::open(&config.path)
        }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let inner = sled::Config::default().path(path).open()?;
        Ok(Self { inner })
    }

    /// Opens a database that is removed once dropped.
    pub fn temporary() -> Result<Self> {
        let inner = sled::Config::default().temporary(true).open()?;
        Ok(Self { inner })
    }

    pub fn get_collection<T: DeserializeOwned + Collectable>(&self) -> Result<Vec<T>> {
        self.get_collection_at(T::get_collection_name())
    }

    /// Gets a collection of entries of the same type from the collection
    /// specified by name.
    pub fn get_collection_at<T: DeserializeOwned>(&self, name: impl AsRef<[u8]>) -> Result<Vec<T>> {
        let tree = self.inner.open_tree(name)?;
        let mut out = Vec::new();
        for entry in tree.iter() {
            let (_, value_bytes) = entry?;
            out.push(decode(&value_bytes)?);
        }
        Ok(out)
    }

    /// Returns the length of the collection as defined for the specified type.
    pub fn len<T: Collectable>(&self) -> Result<usize> {
        Ok(self.inner.open_tree(T::get_collection_name())?.len())
    }

    /// Gets an item from the collection defined for the item type.
    pub fn get<T: DeserializeOwned + Collectable>(&self, id: Id) -> Result<Option<T>> {
        self.get_at(T::get_collection_name(), id)
    }

    /// Gets an item by id from the collection specified by name.
    pub fn get_at<T: DeserializeOwned>(
        &self,
        collection: impl AsRef<[u8]>,
        id: Id,
    ) -> Result<Option<T>> {
        let tree = self.inner.open_tree(collection)?;
        match tree.get(key(id))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn set<T: Serialize + Identifiable + Collectable>(&self, value: &T) -> Result<()> {
        self.set_at(T::get_collection_name(), value)
    }

    pub fn set_at<T: Serialize + Identifiable>(
        &self,
        collection: impl AsRef<[u8]>,
        value: &T,
    ) -> Result<()> {
        let tree = self.inner.open_tree(collection)?;
        tree.insert(key(value.get_id()), encode(value)?)?;
        Ok(())
    }

    /// Stores a new item under a freshly generated id and returns it.
    pub fn insert<T: Serialize + Identifiable + Collectable>(&self, value: T) -> Result<T> {
        self.insert_at(T::get_collection_name(), value)
    }

    pub fn insert_at<T: Serialize + Identifiable>(
        &self,
        collection: impl AsRef<[u8]>,
        mut value: T,
    ) -> Result<T> {
        // Ids start at 1 so that 0 can stand for "not stored yet".
        value.set_id(self.inner.generate_id()? + 1);
        self.set_at(collection, &value)?;
        Ok(value)
    }

    pub fn remove<T: Identifiable + Collectable>(&self, value: &T) -> Result<()> {
        let tree = self.inner.open_tree(T::get_collection_name())?;
        tree.remove(key(value.get_id()))?;
        Ok(())
    }

    pub fn add_user(&self, user: User) -> Result<User> {
        self.insert(user)
    }

    pub fn add_message(&self, message: Message) -> Result<Message> {
        self.get_user(message.owner)?;
        self.insert(message)
    }

    /// Adds a recipient. Email addresses are unique across all owners.
    pub fn add_recipient(&self, recipient: Recipient) -> Result<Recipient> {
        if self
            .get_collection::<Recipient>()?
            .iter()
            .any(|r| r.email.eq_ignore_ascii_case(&recipient.email))
        {
            return Err(ErrorKind::RecipientExists(recipient.email).into());
        }
        self.insert(recipient)
    }

    /// Adds a mailing after checking its schedule and references.
    pub fn add_mailing(&self, mailing: Mailing) -> Result<Mailing> {
        mailing.validate()?;
        self.get_message(mailing.message)?;
        for recipient in &mailing.recipients {
            if self.get::<Recipient>(*recipient)?.is_none() {
                return Err(ErrorKind::BadInput(format!("unknown recipient: {}", recipient)).into());
            }
        }
        self.insert(mailing)
    }

    /// Removes the mailing together with its attempt log and claim.
    pub fn remove_mailing(&self, id: MailingId) -> Result<()> {
        let mailing = self.get_mailing(id)?;
        self.inner
            .drop_tree(MailingAttempt::get_collection_name_at(id))?;
        self.inner.open_tree(CLAIMS)?.remove(key(id))?;
        self.remove(&mailing)
    }

    /// Flushes pending writes to disk.
    pub fn flush(&self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

impl Store for SledDb {
    fn find_mailings(&self, filter: &MailingFilter, now: DateTime<Utc>) -> Result<Vec<Mailing>> {
        if let Some(id) = filter.target() {
            return Ok(self
                .get::<Mailing>(id)?
                .into_iter()
                .filter(|m| filter.matches(m, now))
                .collect());
        }
        let mut mailings = self.get_collection::<Mailing>()?;
        mailings.retain(|m| filter.matches(m, now));
        Ok(mailings)
    }

    fn get_mailing(&self, id: MailingId) -> Result<Mailing> {
        self.get::<Mailing>(id)?
            .ok_or_else(|| ErrorKind::MailingNotFound(id).into())
    }

    fn mailings(&self) -> Result<Vec<Mailing>> {
        self.get_collection()
    }

    fn set_status(&self, id: MailingId, status: MailingStatus) -> Result<()> {
        let tree = self.inner.open_tree(Mailing::get_collection_name())?;
        let mut missing = false;
        let mut failed = None;
        tree.fetch_and_update(key(id), |current| {
            missing = false;
            failed = None;
            let bytes = match current {
                Some(bytes) => bytes,
                None => {
                    missing = true;
                    return None;
                }
            };
            let mut mailing: Mailing = match decode(bytes) {
                Ok(m) => m,
                Err(e) => {
                    failed = Some(e);
                    return Some(bytes.to_vec());
                }
            };
            mailing.status = status;
            match encode(&mailing) {
                Ok(encoded) => Some(encoded),
                Err(e) => {
                    failed = Some(e);
                    Some(bytes.to_vec())
                }
            }
        })?;
        if let Some(e) = failed {
            return Err(e);
        }
        if missing {
            return Err(ErrorKind::MailingNotFound(id).into());
        }
        Ok(())
    }

    fn get_message(&self, id: MessageId) -> Result<Message> {
        self.get::<Message>(id)?
            .ok_or_else(|| ErrorKind::DbError(format!("message with id {} not found", id)).into())
    }

    fn recipients_of(&self, mailing: &Mailing) -> Result<Vec<Recipient>> {
        let mut out = Vec::with_capacity(mailing.recipients.len());
        for id in &mailing.recipients {
            match self.get::<Recipient>(*id)? {
                Some(recipient) => out.push(recipient),
                None => {
                    tracing::debug!(mailing = mailing.id, recipient = *id, "recipient no longer exists")
                }
            }
        }
        Ok(out)
    }

    fn recipients(&self) -> Result<Vec<Recipient>> {
        self.get_collection()
    }

    fn get_user(&self, id: UserId) -> Result<User> {
        self.get::<User>(id)?
            .ok_or_else(|| ErrorKind::UserNotFound(id).into())
    }

    fn set_user_blocked(&self, id: UserId, blocked: bool) -> Result<User> {
        let mut user = self.get_user(id)?;
        user.is_blocked = blocked;
        self.set(&user)?;
        Ok(user)
    }

    fn add_attempt(&self, attempt: MailingAttempt) -> Result<MailingAttempt> {
        // The parent has to exist at write time.
        self.get_mailing(attempt.mailing)?;
        self.insert_at(
            MailingAttempt::get_collection_name_at(attempt.mailing),
            attempt,
        )
    }

    fn attempts_of(&self, mailing: MailingId) -> Result<Vec<MailingAttempt>> {
        self.get_collection_at(MailingAttempt::get_collection_name_at(mailing))
    }

    fn claim(&self, mailing: MailingId, claim: &Claim) -> Result<bool> {
        let tree = self.inner.open_tree(CLAIMS)?;
        let new = encode(claim)?;
        loop {
            let current = tree.get(key(mailing))?;
            if let Some(bytes) = &current {
                let existing: Claim = decode(bytes)?;
                if existing.holder != claim.holder && !existing.is_expired(Utc::now()) {
                    return Ok(false);
                }
            }
            match tree.compare_and_swap(key(mailing), current, Some(new.clone()))? {
                Ok(()) => return Ok(true),
                // Lost a race against another pass, re-read and decide again.
                Err(_) => continue,
            }
        }
    }

    fn release(&self, mailing: MailingId, holder: Uuid) -> Result<()> {
        let tree = self.inner.open_tree(CLAIMS)?;
        if let Some(bytes) = tree.get(key(mailing))? {
            let existing: Claim = decode(&bytes)?;
            if existing.holder == holder {
                // A failed swap means someone took over an expired lease.
                let _ = tree.compare_and_swap(key(mailing), Some(bytes), None as Option<&[u8]>)?;
            }
        }
        Ok(())
    }
}
