pub mod error;
pub mod memory;
pub mod models;
pub mod mongo;
pub mod routes;
pub mod service;
pub mod store;

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use axum::Router;
use catalog_kernel::settings::{DatabaseSettings, StoreBackend};
use catalog_kernel::{InitCtx, Module};
use serde_json::json;

use memory::MemoryBookStore;
use mongo::MongoBookStore;
use service::BookService;
use store::BookStore;

/// Books module: catalog listing, creation, checkout and return
pub struct BooksModule {
    service: BookService,
}

impl BooksModule {
    pub fn new(store: Arc<dyn BookStore>) -> Self {
        Self {
            service: BookService::new(store),
        }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            backend = self.service.backend(),
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.service.clone())
    }

    /// Book routes live at the root: `/books`, `/checkout/{id}`, ...
    fn mount_path(&self) -> String {
        String::new()
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error = |description: &str| {
            json!({
                "description": description,
                "content": {
                    "application/json": {
                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                    }
                }
            })
        };
        let book = |description: &str| {
            json!({
                "description": description,
                "content": {
                    "application/json": {
                        "schema": { "$ref": "#/components/schemas/Book" }
                    }
                }
            })
        };
        let id_param = json!({
            "name": "id",
            "in": "path",
            "required": true,
            "schema": { "type": "string" }
        });

        Some(json!({
            "paths": {
                "/books": {
                    "get": {
                        "summary": "List books",
                        "tags": ["Books"],
                        "responses": {
                            "200": {
                                "description": "Every book in the catalog",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "array",
                                            "items": { "$ref": "#/components/schemas/Book" }
                                        }
                                    }
                                }
                            },
                            "500": error("Store failure")
                        }
                    },
                    "post": {
                        "summary": "Create one or many books",
                        "tags": ["Books"],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "oneOf": [
                                            {
                                                "type": "array",
                                                "items": { "$ref": "#/components/schemas/Book" }
                                            },
                                            { "$ref": "#/components/schemas/Book" }
                                        ]
                                    }
                                }
                            }
                        },
                        "responses": {
                            "201": {
                                "description": "Books created",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/CreatedBooks" }
                                    }
                                }
                            },
                            "400": error("Malformed payload"),
                            "500": error("Insert failure")
                        }
                    }
                },
                "/books/{id}": {
                    "get": {
                        "summary": "Get a book by id",
                        "tags": ["Books"],
                        "parameters": [id_param.clone()],
                        "responses": {
                            "200": book("The book"),
                            "404": error("Book not found")
                        }
                    }
                },
                "/book": {
                    "post": {
                        "summary": "Create a book",
                        "tags": ["Books"],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/Book" }
                                }
                            }
                        },
                        "responses": {
                            "201": book("The created book"),
                            "400": error("Malformed payload"),
                            "500": error("Insert failure")
                        }
                    }
                },
                "/checkout/{id}": {
                    "patch": {
                        "summary": "Check out one copy",
                        "tags": ["Books"],
                        "parameters": [id_param.clone()],
                        "responses": {
                            "200": book("The book with its decremented quantity"),
                            "400": error("No copies available"),
                            "404": error("Book not found"),
                            "500": error("Update failure")
                        }
                    }
                },
                "/return/{id}": {
                    "patch": {
                        "summary": "Return one copy",
                        "tags": ["Books"],
                        "parameters": [id_param],
                        "responses": {
                            "200": book("The book with its incremented quantity"),
                            "400": error("Maximum present limit exceeded"),
                            "404": error("Book not found"),
                            "500": error("Update failure")
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Book": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string", "description": "Unique identifier for the book" },
                            "title": { "type": "string" },
                            "author": { "type": "string" },
                            "quantity": { "type": "integer", "format": "int64", "minimum": 0 },
                            "max_present": { "type": "integer", "format": "int64", "minimum": 0 }
                        },
                        "required": ["id"]
                    },
                    "CreatedBooks": {
                        "type": "object",
                        "properties": {
                            "message": { "type": "string", "example": "Created 2 book(s)" }
                        },
                        "required": ["message"]
                    }
                }
            }
        }))
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// Open the configured book store. An unreachable MongoDB is an error.
pub async fn open_store(settings: &DatabaseSettings) -> anyhow::Result<Arc<dyn BookStore>> {
    match settings.backend {
        StoreBackend::Mongodb => {
            let database = catalog_db::connect(settings)
                .await
                .context("failed to open MongoDB book store")?;
            Ok(Arc::new(MongoBookStore::new(&database)))
        }
        StoreBackend::Memory => {
            tracing::warn!("using in-memory book store; data is lost on exit");
            Ok(Arc::new(MemoryBookStore::new()))
        }
    }
}

/// Create a new instance of the books module
pub fn create_module(store: Arc<dyn BookStore>) -> Arc<dyn Module> {
    Arc::new(BooksModule::new(store))
}
