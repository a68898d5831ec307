//! Receivers subscribe to completed mail items.

use std::error::Error;
use std::sync::Arc;

use tracing::{error, info};

use crate::mail::item::MailItem;
use crate::storage::Storage;

/// Capability port for mail consumers. Each finished item is offered to
/// every registered receiver; failures are logged and never affect other
/// receivers or later items.
pub trait MailItemReceiver: Send + Sync {
    fn receive(&self, mail_item: &MailItem) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// The built-in receiver that persists mail through the storage port.
pub struct DatabaseReceiver {
    database: Arc<dyn Storage>,
}

impl DatabaseReceiver {
    pub fn new(database: Arc<dyn Storage>) -> Self {
        DatabaseReceiver { database }
    }
}

impl MailItemReceiver for DatabaseReceiver {
    fn receive(&self, mail_item: &MailItem) -> Result<(), Box<dyn Error + Send + Sync>> {
        match self.database.store_mail(mail_item) {
            Ok(new_id) => {
                info!("mail item {new_id} written");
                Ok(())
            }
            Err(err) => {
                error!("there was an error while storing your mail item: {err}");
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InMemoryStorage, MailSearch};

    #[test]
    fn test_database_receiver_stores_mail() {
        let storage = Arc::new(InMemoryStorage::new());
        let receiver = DatabaseReceiver::new(storage.clone());

        let mut item = MailItem::new();
        item.subject = "stored".to_string();

        receiver.receive(&item).unwrap();

        assert_eq!(storage.get_mail_count(&MailSearch::default()).unwrap(), 1);
        let stored = storage.get_mail_by_id(&item.id).unwrap();
        assert_eq!(stored.subject, "stored");
    }
}
