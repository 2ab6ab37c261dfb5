//! MongoDB-backed book store.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    error::{ErrorKind, WriteFailure},
    Collection, Database,
};

use super::models::{Book, BookDocument};
use super::store::{BookStore, QuantityUpdate, StoreError, StoreResult, UpdateOutcome};

/// Collection holding one document per book.
pub const BOOKS_COLLECTION: &str = "books";

const DUPLICATE_KEY_CODE: i32 = 11000;

/// Book store over a MongoDB collection keyed by `_id`.
#[derive(Clone)]
pub struct MongoBookStore {
    collection: Collection<BookDocument>,
}

impl MongoBookStore {
    pub fn new(database: &Database) -> Self {
        Self {
            collection: database.collection(BOOKS_COLLECTION),
        }
    }
}

/// Filter and update documents expressing `update` against the book `id`.
///
/// The bound lives in the filter, so a write that would cross it matches
/// no document.
fn update_documents(id: &str, update: QuantityUpdate) -> (Document, Document) {
    match update {
        QuantityUpdate::Decrement => (
            doc! { "_id": id, "quantity": { "$gt": 0_i64 } },
            doc! { "$inc": { "quantity": -1_i64 } },
        ),
        QuantityUpdate::Increment => (
            doc! { "_id": id, "$expr": { "$lt": ["$quantity", "$maxpresent"] } },
            doc! { "$inc": { "quantity": 1_i64 } },
        ),
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error))
            if write_error.code == DUPLICATE_KEY_CODE
    )
}

#[async_trait]
impl BookStore for MongoBookStore {
    async fn get_by_id(&self, id: &str) -> StoreResult<Option<Book>> {
        let document = self.collection.find_one(doc! { "_id": id }).await?;
        Ok(document.map(Book::from))
    }

    async fn list_all(&self) -> StoreResult<Vec<Book>> {
        let cursor = self.collection.find(doc! {}).await?;
        let documents: Vec<BookDocument> = cursor.try_collect().await?;
        Ok(documents.into_iter().map(Book::from).collect())
    }

    async fn insert_one(&self, book: &Book) -> StoreResult<()> {
        match self
            .collection
            .insert_one(BookDocument::from(book.clone()))
            .await
        {
            Ok(_) => Ok(()),
            Err(err) if is_duplicate_key(&err) => Err(StoreError::DuplicateKey(book.id.clone())),
            Err(err) => Err(err.into()),
        }
    }

    async fn insert_many(&self, books: &[Book]) -> StoreResult<u64> {
        let documents: Vec<BookDocument> =
            books.iter().cloned().map(BookDocument::from).collect();
        let result = self.collection.insert_many(documents).await?;
        Ok(result.inserted_ids.len() as u64)
    }

    async fn update_quantity(
        &self,
        id: &str,
        update: QuantityUpdate,
    ) -> StoreResult<UpdateOutcome> {
        let (filter, change) = update_documents(id, update);
        let result = self.collection.update_one(filter, change).await?;
        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    fn backend(&self) -> &'static str {
        "mongodb"
    }
}
