use std::sync::Arc;

use tracing::instrument;

use super::error::BookError;
use super::models::{parse_batch, Book};
use super::store::{BookStore, QuantityUpdate, StoreError, UpdateOutcome};

const UPDATE_FAILED: &str = "Failed to update quantity";

/// Book operations over a shared store handle.
#[derive(Clone)]
pub struct BookService {
    store: Arc<dyn BookStore>,
}

impl BookService {
    pub fn new(store: Arc<dyn BookStore>) -> Self {
        Self { store }
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: &str) -> Result<Book, BookError> {
        self.store
            .get_by_id(id)
            .await
            .map_err(BookError::store("Failed to fetch book"))?
            .ok_or_else(|| BookError::NotFound { id: id.to_string() })
    }

    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<Book>, BookError> {
        let books = self
            .store
            .list_all()
            .await
            .map_err(BookError::store("Failed to fetch books"))?;
        tracing::debug!(count = books.len(), "listed books");
        Ok(books)
    }

    /// Take one copy out. The returned book carries the decremented quantity.
    #[instrument(skip(self))]
    pub async fn checkout(&self, id: &str) -> Result<Book, BookError> {
        ensure_id(id)?;
        let mut book = self.get_by_id(id).await?;

        if book.quantity <= 0 {
            return Err(BookError::NotAvailable { id: book.id });
        }

        let outcome = self
            .store
            .update_quantity(id, QuantityUpdate::Decrement)
            .await
            .map_err(BookError::store(UPDATE_FAILED))?;
        check_outcome(id, outcome, || BookError::NotAvailable { id: id.to_string() })?;

        book.quantity -= 1;
        tracing::info!(book_id = %book.id, quantity = book.quantity, "book checked out");
        Ok(book)
    }

    /// Put one copy back, refusing to exceed `max_present`.
    #[instrument(skip(self))]
    pub async fn return_book(&self, id: &str) -> Result<Book, BookError> {
        ensure_id(id)?;
        let mut book = self.get_by_id(id).await?;

        let new_quantity = book
            .quantity
            .checked_add(1)
            .filter(|quantity| *quantity <= book.max_present)
            .ok_or_else(|| BookError::LimitExceeded {
                id: book.id.clone(),
            })?;

        let outcome = self
            .store
            .update_quantity(id, QuantityUpdate::Increment)
            .await
            .map_err(BookError::store(UPDATE_FAILED))?;
        check_outcome(id, outcome, || BookError::LimitExceeded { id: id.to_string() })?;

        book.quantity = new_quantity;
        tracing::info!(book_id = %book.id, quantity = book.quantity, "book returned");
        Ok(book)
    }

    /// Insert one book parsed from a JSON payload and echo it back.
    #[instrument(skip_all)]
    pub async fn create_one(&self, payload: &[u8]) -> Result<Book, BookError> {
        let book: Book = serde_json::from_slice(payload).map_err(|err| {
            tracing::debug!(error = %err, "rejecting book payload");
            BookError::bad_request("Invalid JSON payload")
        })?;
        ensure_valid(std::slice::from_ref(&book))?;

        self.store
            .insert_one(&book)
            .await
            .map_err(BookError::store("Failed to create book"))?;

        tracing::info!(book_id = %book.id, "book created");
        Ok(book)
    }

    /// Insert a JSON array of books, or a single book, returning the inserted count.
    #[instrument(skip_all)]
    pub async fn create_many(&self, payload: &[u8]) -> Result<u64, BookError> {
        let books = parse_batch(payload).map_err(|err| {
            tracing::debug!(error = %err, "rejecting batch payload");
            BookError::bad_request("Invalid JSON payload")
        })?;

        if books.is_empty() {
            return Err(BookError::bad_request("No books supplied"));
        }
        ensure_valid(&books)?;

        let count = self
            .store
            .insert_many(&books)
            .await
            .map_err(BookError::store("Failed to create books"))?;

        tracing::info!(count, "books created");
        Ok(count)
    }
}

fn ensure_id(id: &str) -> Result<(), BookError> {
    if id.is_empty() {
        return Err(BookError::bad_request("Bad request"));
    }
    Ok(())
}

fn ensure_valid(books: &[Book]) -> Result<(), BookError> {
    let batch = books.len() > 1;
    let details: Vec<serde_json::Value> = books
        .iter()
        .enumerate()
        .flat_map(|(index, book)| {
            book.violations().into_iter().map(move |mut detail| {
                if batch {
                    detail["index"] = index.into();
                }
                detail
            })
        })
        .collect();

    if details.is_empty() {
        Ok(())
    } else {
        Err(BookError::BadRequest {
            message: "Invalid book".to_string(),
            details,
        })
    }
}

/// Zero matched means the write-time condition failed; matched but
/// unmodified is a store failure.
fn check_outcome(
    id: &str,
    outcome: UpdateOutcome,
    precondition_failed: impl FnOnce() -> BookError,
) -> Result<(), BookError> {
    if outcome.matched == 0 {
        tracing::warn!(book_id = %id, "conditional quantity update matched no document");
        return Err(precondition_failed());
    }
    if outcome.modified == 0 {
        return Err(BookError::Store {
            context: UPDATE_FAILED,
            source: StoreError::NotModified(id.to_string()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::books::memory::MemoryBookStore;
    use crate::modules::books::store::MockBookStore;
    use axum::http::StatusCode;
    use catalog_http::error::AppError;
    use mockall::predicate::eq;

    fn book(id: &str, quantity: i64, max_present: i64) -> Book {
        Book {
            id: id.to_string(),
            title: format!("Title {id}"),
            author: "Anonymous".to_string(),
            quantity,
            max_present,
        }
    }

    fn service_with(books: Vec<Book>) -> (BookService, Arc<MemoryBookStore>) {
        let store = Arc::new(MemoryBookStore::with_books(books));
        (BookService::new(store.clone()), store)
    }

    async fn stored_quantity(store: &MemoryBookStore, id: &str) -> i64 {
        store.get_by_id(id).await.unwrap().unwrap().quantity
    }

    fn io_failure() -> StoreError {
        StoreError::Backend(mongodb::error::Error::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "connection reset by peer",
        )))
    }

    #[tokio::test]
    async fn get_by_id_returns_requested_book() {
        let (service, _) = service_with(vec![book("b1", 1, 5), book("b2", 0, 2)]);
        for id in ["b1", "b2"] {
            assert_eq!(service.get_by_id(id).await.unwrap().id, id);
        }
        assert!(matches!(
            service.get_by_id("unknown").await,
            Err(BookError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn list_all_on_empty_store_is_empty() {
        let (service, _) = service_with(Vec::new());
        assert!(service.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn checkout_decrements_by_one() {
        let (service, store) = service_with(vec![book("b1", 3, 5)]);

        let checked_out = service.checkout("b1").await.unwrap();

        assert_eq!(checked_out.quantity, 2);
        assert_eq!(stored_quantity(&store, "b1").await, 2);
    }

    #[tokio::test]
    async fn checkout_without_stock_leaves_store_untouched() {
        let (service, store) = service_with(vec![book("b1", 0, 5)]);

        let err = service.checkout("b1").await.unwrap_err();

        assert!(matches!(err, BookError::NotAvailable { .. }));
        assert_eq!(err.to_string(), "Books Not Available");
        assert_eq!(stored_quantity(&store, "b1").await, 0);
    }

    #[tokio::test]
    async fn checkout_with_zero_stock_never_writes() {
        let mut store = MockBookStore::new();
        store
            .expect_get_by_id()
            .with(eq("b1"))
            .returning(|_| Ok(Some(book("b1", 0, 5))));
        store.expect_update_quantity().never();

        let service = BookService::new(Arc::new(store));
        assert!(matches!(
            service.checkout("b1").await,
            Err(BookError::NotAvailable { .. })
        ));
    }

    #[tokio::test]
    async fn checkout_and_return_reject_empty_id() {
        let (service, _) = service_with(vec![book("b1", 1, 5)]);
        assert!(matches!(
            service.checkout("").await,
            Err(BookError::BadRequest { .. })
        ));
        assert!(matches!(
            service.return_book("").await,
            Err(BookError::BadRequest { .. })
        ));
    }

    #[tokio::test]
    async fn checkout_unknown_book_is_not_found() {
        let (service, _) = service_with(Vec::new());
        assert!(matches!(
            service.checkout("ghost").await,
            Err(BookError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn return_increments_by_one() {
        let (service, store) = service_with(vec![book("b1", 2, 5)]);

        let returned = service.return_book("b1").await.unwrap();

        assert_eq!(returned.quantity, 3);
        assert_eq!(stored_quantity(&store, "b1").await, 3);
    }

    #[tokio::test]
    async fn return_at_limit_never_writes() {
        let mut store = MockBookStore::new();
        store
            .expect_get_by_id()
            .returning(|_| Ok(Some(book("b2", 5, 5))));
        store.expect_update_quantity().never();

        let service = BookService::new(Arc::new(store));
        let err = service.return_book("b2").await.unwrap_err();
        assert!(matches!(err, BookError::LimitExceeded { .. }));
        assert_eq!(err.to_string(), "Maximum present limit exceeded");
    }

    #[tokio::test]
    async fn return_increments_guarded_by_stored_limit() {
        let mut store = MockBookStore::new();
        store
            .expect_get_by_id()
            .returning(|_| Ok(Some(book("b1", 2, 5))));
        store
            .expect_update_quantity()
            .with(
                eq("b1"),
                eq(QuantityUpdate::Increment),
            )
            .times(1)
            .returning(|_, _| {
                Ok(UpdateOutcome {
                    matched: 1,
                    modified: 1,
                })
            });

        let service = BookService::new(Arc::new(store));
        assert_eq!(service.return_book("b1").await.unwrap().quantity, 3);
    }

    #[tokio::test]
    async fn unmodified_update_is_a_store_error() {
        let mut store = MockBookStore::new();
        store
            .expect_get_by_id()
            .returning(|_| Ok(Some(book("b1", 1, 5))));
        store.expect_update_quantity().returning(|_, _| {
            Ok(UpdateOutcome {
                matched: 1,
                modified: 0,
            })
        });

        let service = BookService::new(Arc::new(store));
        let err = service.checkout("b1").await.unwrap_err();
        assert!(matches!(
            err,
            BookError::Store {
                source: StoreError::NotModified(_),
                ..
            }
        ));
        assert_eq!(err.to_string(), "Failed to update quantity");
    }

    #[tokio::test]
    async fn lost_race_surfaces_as_precondition_failure() {
        let mut store = MockBookStore::new();
        store
            .expect_get_by_id()
            .returning(|_| Ok(Some(book("b1", 1, 5))));
        store
            .expect_update_quantity()
            .returning(|_, _| Ok(UpdateOutcome::default()));

        let service = BookService::new(Arc::new(store));
        assert!(matches!(
            service.checkout("b1").await,
            Err(BookError::NotAvailable { .. })
        ));
        assert!(matches!(
            service.return_book("b1").await,
            Err(BookError::LimitExceeded { .. })
        ));
    }

    #[tokio::test]
    async fn return_at_i64_max_is_limit_exceeded() {
        let (service, store) = service_with(Vec::new());
        let payload = format!(
            r#"{{"id": "big", "quantity": {max}, "max_present": {max}}}"#,
            max = i64::MAX
        );
        service.create_one(payload.as_bytes()).await.unwrap();

        let err = service.return_book("big").await.unwrap_err();

        assert!(matches!(err, BookError::LimitExceeded { .. }));
        assert_eq!(stored_quantity(&store, "big").await, i64::MAX);
    }

    #[tokio::test]
    async fn concurrent_returns_stop_at_max_present() {
        let (service, store) = service_with(vec![book("b1", 0, 10)]);

        let handles: Vec<_> = (0..12)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.return_book("b1").await })
            })
            .collect();

        let mut succeeded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(BookError::LimitExceeded { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(succeeded, 10);
        assert_eq!(stored_quantity(&store, "b1").await, 10);
    }

    #[tokio::test]
    async fn store_failures_carry_context() {
        let mut store = MockBookStore::new();
        store.expect_list_all().returning(|| Err(io_failure()));
        store
            .expect_insert_many()
            .returning(|_| Err(io_failure()));

        let service = BookService::new(Arc::new(store));

        let err = service.list_all().await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to fetch books");

        let err = service.create_many(br#"{"id": "b1"}"#).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to create books");
    }

    #[tokio::test]
    async fn failed_lookup_is_an_internal_error() {
        let mut store = MockBookStore::new();
        store.expect_get_by_id().returning(|_| Err(io_failure()));
        store.expect_update_quantity().never();

        let service = BookService::new(Arc::new(store));

        let err = service.get_by_id("b1").await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to fetch book");
        assert_eq!(AppError::from(err).status(), StatusCode::INTERNAL_SERVER_ERROR);

        for err in [
            service.checkout("b1").await.unwrap_err(),
            service.return_book("b1").await.unwrap_err(),
        ] {
            assert_eq!(err.to_string(), "Failed to fetch book");
        }
    }

    #[tokio::test]
    async fn failed_quantity_update_is_an_internal_error() {
        let mut store = MockBookStore::new();
        store
            .expect_get_by_id()
            .returning(|_| Ok(Some(book("b1", 2, 5))));
        store
            .expect_update_quantity()
            .times(2)
            .returning(|_, _| Err(io_failure()));

        let service = BookService::new(Arc::new(store));

        for err in [
            service.checkout("b1").await.unwrap_err(),
            service.return_book("b1").await.unwrap_err(),
        ] {
            assert!(matches!(
                err,
                BookError::Store {
                    source: StoreError::Backend(_),
                    ..
                }
            ));
            assert_eq!(err.to_string(), "Failed to update quantity");

            let err = AppError::from(err);
            assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(err.to_string(), "Failed to update quantity");
        }
    }

    #[tokio::test]
    async fn failed_insert_is_an_internal_error() {
        let mut store = MockBookStore::new();
        store.expect_insert_one().returning(|_| Err(io_failure()));

        let service = BookService::new(Arc::new(store));
        let err = service.create_one(br#"{"id": "b1"}"#).await.unwrap_err();

        assert!(matches!(
            err,
            BookError::Store {
                source: StoreError::Backend(_),
                ..
            }
        ));
        assert_eq!(err.to_string(), "Failed to create book");
        assert_eq!(AppError::from(err).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn concurrent_checkouts_never_oversell() {
        let (service, store) = service_with(vec![book("b1", 3, 5)]);

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.checkout("b1").await })
            })
            .collect();

        let mut succeeded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(BookError::NotAvailable { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(succeeded, 3);
        assert_eq!(stored_quantity(&store, "b1").await, 0);
    }

    #[tokio::test]
    async fn create_one_rejects_malformed_payload() {
        let (service, store) = service_with(Vec::new());

        let err = service.create_one(b"{not json").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid JSON payload");

        let err = service
            .create_one(br#"{"id": "b1", "quantity": 6, "max_present": 5}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, BookError::BadRequest { ref details, .. } if details.len() == 1));

        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_one_echoes_inserted_book() {
        let (service, store) = service_with(Vec::new());

        let created = service
            .create_one(br#"{"id": "b1", "title": "Dune", "author": "Frank Herbert", "quantity": 1, "max_present": 5}"#)
            .await
            .unwrap();

        assert_eq!(created.title, "Dune");
        assert_eq!(store.get_by_id("b1").await.unwrap(), Some(created));
    }

    #[tokio::test]
    async fn create_one_duplicate_is_a_store_error() {
        let (service, _) = service_with(vec![book("b1", 1, 5)]);
        let err = service.create_one(br#"{"id": "b1"}"#).await.unwrap_err();
        assert!(matches!(
            err,
            BookError::Store {
                source: StoreError::DuplicateKey(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn create_many_inserts_every_array_element() {
        let (service, store) = service_with(Vec::new());

        let count = service
            .create_many(br#"[{"id": "a"}, {"id": "b"}, {"id": "c"}, {"id": "d"}]"#)
            .await
            .unwrap();

        assert_eq!(count, 4);
        assert_eq!(store.list_all().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn create_many_accepts_single_object() {
        let (service, store) = service_with(Vec::new());

        let count = service.create_many(br#"{"id": "solo"}"#).await.unwrap();

        assert_eq!(count, 1);
        assert!(store.get_by_id("solo").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn create_many_rejects_empty_and_invalid_batches() {
        let (service, store) = service_with(Vec::new());

        let err = service.create_many(b"[]").await.unwrap_err();
        assert_eq!(err.to_string(), "No books supplied");

        let err = service.create_many(b"\"books\"").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid JSON payload");

        let err = service
            .create_many(br#"[{"id": "ok"}, {"id": "bad", "quantity": -1}]"#)
            .await
            .unwrap_err();
        match err {
            BookError::BadRequest { details, .. } => {
                assert_eq!(details[0]["index"], 1);
                assert_eq!(details[0]["field"], "quantity");
            }
            other => panic!("expected bad request, got {other:?}"),
        }

        assert!(store.list_all().await.unwrap().is_empty());
    }
}
