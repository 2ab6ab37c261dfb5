use serde::{Deserialize, Serialize};
use serde_json::json;

/// A catalog entry as exchanged over HTTP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    /// Caller-supplied unique identifier
    pub id: String,
    /// Title of the book
    #[serde(default)]
    pub title: String,
    /// Author of the book
    #[serde(default)]
    pub author: String,
    /// Copies currently available for checkout
    #[serde(default)]
    pub quantity: i64,
    /// Upper bound for `quantity`
    #[serde(default)]
    pub max_present: i64,
}

impl Book {
    /// Field-level problems that make this book unfit for insertion.
    pub fn violations(&self) -> Vec<serde_json::Value> {
        let mut details = Vec::new();

        if self.id.is_empty() {
            details.push(json!({"field": "id", "error": "must not be empty"}));
        }
        if self.quantity < 0 {
            details.push(json!({"field": "quantity", "error": "must not be negative"}));
        }
        if self.max_present < 0 {
            details.push(json!({"field": "max_present", "error": "must not be negative"}));
        }
        if self.quantity > self.max_present {
            details.push(json!({"field": "quantity", "error": "must not exceed max_present"}));
        }

        details
    }
}

/// Stored shape of a book.
///
/// Field names match documents written by the earlier catalog service, which
/// keyed on `_id` and stored the bound as `maxpresent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(rename = "maxpresent", default)]
    pub max_present: i64,
}

impl From<Book> for BookDocument {
    fn from(book: Book) -> Self {
        Self {
            id: book.id,
            title: book.title,
            author: book.author,
            quantity: book.quantity,
            max_present: book.max_present,
        }
    }
}

impl From<BookDocument> for Book {
    fn from(document: BookDocument) -> Self {
        Self {
            id: document.id,
            title: document.title,
            author: document.author,
            quantity: document.quantity,
            max_present: document.max_present,
        }
    }
}

/// Body returned by batch creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedBooks {
    pub message: String,
}

impl CreatedBooks {
    pub fn new(count: u64) -> Self {
        Self {
            message: format!("Created {count} book(s)"),
        }
    }
}

/// Parse a batch payload: a JSON array of books, or failing that a single book.
///
/// On failure the error from the single-book attempt is returned.
pub fn parse_batch(payload: &[u8]) -> Result<Vec<Book>, serde_json::Error> {
    match serde_json::from_slice::<Vec<Book>>(payload) {
        Ok(books) => Ok(books),
        Err(_) => serde_json::from_slice::<Book>(payload).map(|book| vec![book]),
    }
}
