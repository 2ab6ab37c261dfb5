//! In-process book store for local runs and tests.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::models::Book;
use super::store::{BookStore, QuantityUpdate, StoreError, StoreResult, UpdateOutcome};

/// Book store kept in memory, in insertion order.
///
/// Mirrors the document store's guarantees: unique ids and atomic
/// conditional updates. Batch inserts are all-or-nothing.
#[derive(Debug, Default)]
pub struct MemoryBookStore {
    books: RwLock<Vec<Book>>,
}

impl MemoryBookStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `books`.
    pub fn with_books(books: impl IntoIterator<Item = Book>) -> Self {
        Self {
            books: RwLock::new(books.into_iter().collect()),
        }
    }
}

#[async_trait]
impl BookStore for MemoryBookStore {
    async fn get_by_id(&self, id: &str) -> StoreResult<Option<Book>> {
        let books = self.books.read().await;
        Ok(books.iter().find(|book| book.id == id).cloned())
    }

    async fn list_all(&self) -> StoreResult<Vec<Book>> {
        Ok(self.books.read().await.clone())
    }

    async fn insert_one(&self, book: &Book) -> StoreResult<()> {
        let mut books = self.books.write().await;
        if books.iter().any(|existing| existing.id == book.id) {
            return Err(StoreError::DuplicateKey(book.id.clone()));
        }
        books.push(book.clone());
        Ok(())
    }

    async fn insert_many(&self, batch: &[Book]) -> StoreResult<u64> {
        let mut books = self.books.write().await;

        let mut seen: HashSet<&str> = books.iter().map(|book| book.id.as_str()).collect();
        for book in batch {
            if !seen.insert(book.id.as_str()) {
                return Err(StoreError::DuplicateKey(book.id.clone()));
            }
        }

        books.extend(batch.iter().cloned());
        Ok(batch.len() as u64)
    }

    async fn update_quantity(
        &self,
        id: &str,
        update: QuantityUpdate,
    ) -> StoreResult<UpdateOutcome> {
        let mut books = self.books.write().await;

        let Some(book) = books
            .iter_mut()
            .find(|book| book.id == id && update.applies_to(book))
        else {
            return Ok(UpdateOutcome::default());
        };
        let Some(quantity) = update.apply(book) else {
            return Ok(UpdateOutcome::default());
        };

        let modified = u64::from(quantity != book.quantity);
        book.quantity = quantity;

        Ok(UpdateOutcome {
            matched: 1,
            modified,
        })
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
