//! HTTP handlers for the books module.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use catalog_http::error::AppError;

use super::models::{Book, CreatedBooks};
use super::service::BookService;

/// Routes served at the root of the HTTP surface.
pub fn router(service: BookService) -> Router {
    Router::new()
        .route("/books", get(list_books).post(create_books))
        .route("/books/{id}", get(get_book))
        .route("/book", post(create_book))
        .route("/checkout/", patch(checkout_missing_id))
        .route("/checkout/{id}", patch(checkout_book))
        .route("/return/", patch(return_missing_id))
        .route("/return/{id}", patch(return_book))
        .with_state(service)
}

async fn list_books(State(service): State<BookService>) -> Result<Json<Vec<Book>>, AppError> {
    Ok(Json(service.list_all().await?))
}

async fn get_book(
    State(service): State<BookService>,
    Path(id): Path<String>,
) -> Result<Json<Book>, AppError> {
    Ok(Json(service.get_by_id(&id).await?))
}

async fn create_book(
    State(service): State<BookService>,
    body: Bytes,
) -> Result<(StatusCode, Json<Book>), AppError> {
    let book = service.create_one(&body).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

async fn create_books(
    State(service): State<BookService>,
    body: Bytes,
) -> Result<(StatusCode, Json<CreatedBooks>), AppError> {
    let count = service.create_many(&body).await?;
    Ok((StatusCode::CREATED, Json(CreatedBooks::new(count))))
}

async fn checkout_book(
    State(service): State<BookService>,
    Path(id): Path<String>,
) -> Result<Json<Book>, AppError> {
    Ok(Json(service.checkout(&id).await?))
}

async fn checkout_missing_id(State(service): State<BookService>) -> Result<Json<Book>, AppError> {
    Ok(Json(service.checkout("").await?))
}

async fn return_book(
    State(service): State<BookService>,
    Path(id): Path<String>,
) -> Result<Json<Book>, AppError> {
    Ok(Json(service.return_book(&id).await?))
}

async fn return_missing_id(State(service): State<BookService>) -> Result<Json<Book>, AppError> {
    Ok(Json(service.return_book("").await?))
}
