//! Narrow interface to the document store holding books.

use async_trait::async_trait;
use thiserror::Error;

use super::models::Book;

/// Failures talking to, or reported by, the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document store error: {0}")]
    Backend(#[from] mongodb::error::Error),

    #[error("book '{0}' already exists")]
    DuplicateKey(String),

    #[error("update of book '{0}' matched but modified nothing")]
    NotModified(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Single-document change to a book's quantity.
///
/// Each variant carries the bound the stored document must still satisfy at
/// write time; when it no longer holds the update matches nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityUpdate {
    /// Take one copy while the stored quantity is above zero.
    Decrement,
    /// Put one copy back while the stored quantity is below `max_present`.
    Increment,
}

impl QuantityUpdate {
    /// Whether a stored book satisfies this update's bound.
    pub fn applies_to(&self, book: &Book) -> bool {
        match self {
            QuantityUpdate::Decrement => book.quantity > 0,
            QuantityUpdate::Increment => book.quantity < book.max_present,
        }
    }

    /// Quantity after applying this update to `book`, `None` on overflow.
    pub fn apply(&self, book: &Book) -> Option<i64> {
        match self {
            QuantityUpdate::Decrement => book.quantity.checked_sub(1),
            QuantityUpdate::Increment => book.quantity.checked_add(1),
        }
    }
}

/// Document counts reported by an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub modified: u64,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookStore: Send + Sync {
    /// Fetch the book stored under `id`, if any.
    async fn get_by_id(&self, id: &str) -> StoreResult<Option<Book>>;

    /// Fetch every book in the collection.
    async fn list_all(&self) -> StoreResult<Vec<Book>>;

    /// Insert one book; fails on a duplicate id.
    async fn insert_one(&self, book: &Book) -> StoreResult<()>;

    /// Insert a batch of books, returning how many were inserted.
    async fn insert_many(&self, books: &[Book]) -> StoreResult<u64>;

    /// Atomically apply a conditional quantity change to the book under `id`.
    async fn update_quantity(&self, id: &str, update: QuantityUpdate)
        -> StoreResult<UpdateOutcome>;

    /// Short label used in logs.
    fn backend(&self) -> &'static str;
}
