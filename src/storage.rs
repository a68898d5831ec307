//! The storage port consumed by the database receiver, plus the built-in
//! in-memory engine. SQL engines named in the configuration are external
//! collaborators implementing the same trait.

use std::sync::Mutex;

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::mail::attachment::Attachment;
use crate::mail::item::MailItem;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("no mail found with id '{0}'")]
    MailNotFound(String),

    #[error("no attachment '{attachment_id}' on mail '{mail_id}'")]
    AttachmentNotFound {
        mail_id: String,
        attachment_id: String,
    },

    #[error("storage engine error: {0}")]
    Engine(String),
}

/// Storage engines selectable through the `dbEngine` configuration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    Sqlite,
    Mysql,
    Mssql,
}

impl StorageType {
    /// Resolve an engine name, falling back to SQLite for anything
    /// unrecognized.
    pub fn from_name(name: &str) -> StorageType {
        match name.to_ascii_lowercase().as_str() {
            "mysql" => StorageType::Mysql,
            "mssql" => StorageType::Mssql,
            _ => StorageType::Sqlite,
        }
    }
}

/// Search criteria for mail collection queries. Empty fields match
/// everything.
#[derive(Debug, Clone, Default)]
pub struct MailSearch {
    /// Free text matched against subject and body.
    pub message: String,
    /// Inclusive lower bound on `dateSent`, canonical format.
    pub start: String,
    /// Inclusive upper bound on `dateSent`, canonical format.
    pub end: String,
    pub from: String,
    pub to: String,
}

impl MailSearch {
    pub fn matches(&self, item: &MailItem) -> bool {
        if !self.message.is_empty()
            && !item.subject.contains(&self.message)
            && !item.body.contains(&self.message)
        {
            return false;
        }

        if !self.from.is_empty() && !item.from_address.contains(&self.from) {
            return false;
        }

        if !self.to.is_empty() && !item.to_addresses.iter().any(|to| to.contains(&self.to)) {
            return false;
        }

        // The canonical date layout sorts lexicographically.
        if !self.start.is_empty() && item.date_sent.as_str() < self.start.as_str() {
            return false;
        }

        if !self.end.is_empty() && item.date_sent.as_str() > self.end.as_str() {
            return false;
        }

        true
    }
}

/// Contract for mail persistence. Implementations must tolerate concurrent
/// `store_mail` calls.
pub trait Storage: Send + Sync {
    fn connect(&self) -> Result<(), StorageError>;
    fn disconnect(&self);

    /// Create the schema or whatever structure the engine needs.
    fn create(&self) -> Result<(), StorageError>;

    /// Persist a mail item and return its id.
    fn store_mail(&self, mail_item: &MailItem) -> Result<String, StorageError>;

    fn get_mail_by_id(&self, id: &str) -> Result<MailItem, StorageError>;

    fn get_mail_collection(
        &self,
        offset: usize,
        length: usize,
        search: &MailSearch,
    ) -> Result<Vec<MailItem>, StorageError>;

    fn get_mail_count(&self, search: &MailSearch) -> Result<usize, StorageError>;

    fn get_attachment(&self, mail_id: &str, attachment_id: &str)
        -> Result<Attachment, StorageError>;

    /// Prune mail dated on or before the start date.
    fn delete_mails_after_date(&self, start_date: &str) -> Result<(), StorageError>;
}

/// Storage engine keeping everything in memory, in arrival order.
#[derive(Default)]
pub struct InMemoryStorage {
    mails: Mutex<Vec<MailItem>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        InMemoryStorage::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<MailItem>>, StorageError> {
        self.mails
            .lock()
            .map_err(|_| StorageError::Engine("storage mutex poisoned".to_string()))
    }
}

impl Storage for InMemoryStorage {
    fn connect(&self) -> Result<(), StorageError> {
        Ok(())
    }

    fn disconnect(&self) {}

    fn create(&self) -> Result<(), StorageError> {
        Ok(())
    }

    fn store_mail(&self, mail_item: &MailItem) -> Result<String, StorageError> {
        let mut stored = mail_item.clone();

        for attachment in stored
            .attachments
            .iter_mut()
            .chain(stored.inline_attachments.iter_mut())
        {
            attachment.id = Uuid::new_v4().to_string();
            attachment.mail_id = stored.id.clone();
        }

        let id = stored.id.clone();
        self.lock()?.push(stored);
        Ok(id)
    }

    fn get_mail_by_id(&self, id: &str) -> Result<MailItem, StorageError> {
        self.lock()?
            .iter()
            .find(|item| item.id == id)
            .cloned()
            .ok_or_else(|| StorageError::MailNotFound(id.to_string()))
    }

    fn get_mail_collection(
        &self,
        offset: usize,
        length: usize,
        search: &MailSearch,
    ) -> Result<Vec<MailItem>, StorageError> {
        Ok(self
            .lock()?
            .iter()
            .filter(|item| search.matches(item))
            .skip(offset)
            .take(length)
            .cloned()
            .collect())
    }

    fn get_mail_count(&self, search: &MailSearch) -> Result<usize, StorageError> {
        Ok(self.lock()?.iter().filter(|item| search.matches(item)).count())
    }

    fn get_attachment(
        &self,
        mail_id: &str,
        attachment_id: &str,
    ) -> Result<Attachment, StorageError> {
        let mails = self.lock()?;
        let mail = mails
            .iter()
            .find(|item| item.id == mail_id)
            .ok_or_else(|| StorageError::MailNotFound(mail_id.to_string()))?;

        mail.attachments
            .iter()
            .chain(mail.inline_attachments.iter())
            .find(|attachment| attachment.id == attachment_id)
            .cloned()
            .ok_or_else(|| StorageError::AttachmentNotFound {
                mail_id: mail_id.to_string(),
                attachment_id: attachment_id.to_string(),
            })
    }

    fn delete_mails_after_date(&self, start_date: &str) -> Result<(), StorageError> {
        let mut mails = self.lock()?;
        let before = mails.len();
        mails.retain(|item| item.date_sent.as_str() > start_date);

        info!("pruned {} mail item(s)", before - mails.len());
        Ok(())
    }
}
