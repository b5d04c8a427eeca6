use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// A book row. `rating` is the running average shown to users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub book_id: u64,
    pub title: String,
    pub author_id: u64,
    pub genre: String,
    pub description: String,
    pub rating: f64,
    pub published_year: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Author {
    pub author_id: u64,
    pub name: String,
    pub biography: String,
}

/// Fields for inserting or updating a book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBook {
    pub title: String,
    pub author_id: u64,
    pub genre: String,
    pub description: String,
    pub rating: f64,
    pub published_year: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAuthor {
    pub name: String,
    #[serde(default)]
    pub biography: String,
}

#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    #[error("book not found")]
    BookNotFound,

    #[error("author not found")]
    AuthorNotFound,

    #[error("author already exists")]
    DuplicateAuthor,
}

/// Persistence collaborator contract. Book-returning queries order by
/// descending rating unless stated otherwise.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Books whose genre contains the given text, case-insensitive.
    async fn find_books_by_genre_substring(
        &self,
        genre: &str,
        limit: usize,
    ) -> Result<Vec<Book>, CatalogError>;

    async fn find_books_by_author(
        &self,
        author_id: u64,
        limit: usize,
    ) -> Result<Vec<Book>, CatalogError>;

    /// First author whose name contains the given text, case-insensitive.
    async fn find_author_by_name_substring(
        &self,
        name: &str,
    ) -> Result<Option<Author>, CatalogError>;

    /// Author whose name equals the given text, case-insensitive.
    async fn find_author_by_name(&self, name: &str) -> Result<Option<Author>, CatalogError>;

    /// Insert a book. The referenced author must already exist.
    async fn insert_book(&self, fields: NewBook) -> Result<Book, CatalogError>;

    async fn insert_author(&self, fields: NewAuthor) -> Result<Author, CatalogError>;

    /// All books, ordered by id (stable listing order).
    async fn list_books(&self) -> Result<Vec<Book>, CatalogError>;

    async fn get_book(&self, book_id: u64) -> Result<Book, CatalogError>;

    async fn update_book(&self, book_id: u64, fields: NewBook) -> Result<Book, CatalogError>;

    async fn delete_book(&self, book_id: u64) -> Result<(), CatalogError>;

    /// Books whose title contains the given text, case-insensitive.
    async fn search_books_by_title(
        &self,
        title: &str,
        limit: usize,
    ) -> Result<Vec<Book>, CatalogError>;

    /// Highest-rated books across all genres.
    async fn top_books(&self, limit: usize) -> Result<Vec<Book>, CatalogError>;

    async fn list_authors(&self) -> Result<Vec<Author>, CatalogError>;

    async fn get_author(&self, author_id: u64) -> Result<Author, CatalogError>;

    async fn update_author(
        &self,
        author_id: u64,
        fields: NewAuthor,
    ) -> Result<Author, CatalogError>;

    async fn delete_author(&self, author_id: u64) -> Result<(), CatalogError>;
}

#[derive(Default)]
struct Tables {
    books: HashMap<u64, Book>,
    authors: HashMap<u64, Author>,
    next_book_id: u64,
    next_author_id: u64,
}

/// Simple in-memory catalog. Stands in for the relational store the
/// surrounding application provides.
#[derive(Default)]
pub struct MemoryCatalog {
    tables: RwLock<Tables>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Descending by rating; ties break on id so repeated queries over
/// unchanged data list identically.
fn sort_by_rating_desc(books: &mut [Book]) {
    books.sort_by(|a, b| {
        b.rating
            .total_cmp(&a.rating)
            .then(a.book_id.cmp(&b.book_id))
    });
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn find_books_by_genre_substring(
        &self,
        genre: &str,
        limit: usize,
    ) -> Result<Vec<Book>, CatalogError> {
        let needle = genre.to_lowercase();
        let tables = self.tables.read().await;
        let mut books: Vec<Book> = tables
            .books
            .values()
            .filter(|b| b.genre.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        sort_by_rating_desc(&mut books);
        books.truncate(limit);
        Ok(books)
    }

    async fn find_books_by_author(
        &self,
        author_id: u64,
        limit: usize,
    ) -> Result<Vec<Book>, CatalogError> {
        let tables = self.tables.read().await;
        let mut books: Vec<Book> = tables
            .books
            .values()
            .filter(|b| b.author_id == author_id)
            .cloned()
            .collect();
        sort_by_rating_desc(&mut books);
        books.truncate(limit);
        Ok(books)
    }

    async fn find_author_by_name_substring(
        &self,
        name: &str,
    ) -> Result<Option<Author>, CatalogError> {
        let needle = name.to_lowercase();
        let tables = self.tables.read().await;
        let mut candidates: Vec<&Author> = tables
            .authors
            .values()
            .filter(|a| a.name.to_lowercase().contains(&needle))
            .collect();
        candidates.sort_by_key(|a| a.author_id);
        Ok(candidates.first().map(|a| (*a).clone()))
    }

    async fn find_author_by_name(&self, name: &str) -> Result<Option<Author>, CatalogError> {
        let needle = name.trim().to_lowercase();
        let tables = self.tables.read().await;
        Ok(tables
            .authors
            .values()
            .find(|a| a.name.to_lowercase() == needle)
            .cloned())
    }

    async fn insert_book(&self, fields: NewBook) -> Result<Book, CatalogError> {
        let mut tables = self.tables.write().await;
        if !tables.authors.contains_key(&fields.author_id) {
            return Err(CatalogError::AuthorNotFound);
        }
        tables.next_book_id += 1;
        let book = Book {
            book_id: tables.next_book_id,
            title: fields.title,
            author_id: fields.author_id,
            genre: fields.genre,
            description: fields.description,
            rating: fields.rating,
            published_year: fields.published_year,
        };
        tables.books.insert(book.book_id, book.clone());
        Ok(book)
    }

    async fn insert_author(&self, fields: NewAuthor) -> Result<Author, CatalogError> {
        let mut tables = self.tables.write().await;
        let needle = fields.name.trim().to_lowercase();
        if tables
            .authors
            .values()
            .any(|a| a.name.to_lowercase() == needle)
        {
            return Err(CatalogError::DuplicateAuthor);
        }
        tables.next_author_id += 1;
        let author = Author {
            author_id: tables.next_author_id,
            name: fields.name,
            biography: fields.biography,
        };
        tables.authors.insert(author.author_id, author.clone());
        Ok(author)
    }

    async fn list_books(&self) -> Result<Vec<Book>, CatalogError> {
        let tables = self.tables.read().await;
        let mut books: Vec<Book> = tables.books.values().cloned().collect();
        books.sort_by_key(|b| b.book_id);
        Ok(books)
    }

    async fn get_book(&self, book_id: u64) -> Result<Book, CatalogError> {
        let tables = self.tables.read().await;
        tables
            .books
            .get(&book_id)
            .cloned()
            .ok_or(CatalogError::BookNotFound)
    }

    async fn update_book(&self, book_id: u64, fields: NewBook) -> Result<Book, CatalogError> {
        let mut tables = self.tables.write().await;
        if !tables.authors.contains_key(&fields.author_id) {
            return Err(CatalogError::AuthorNotFound);
        }
        let book = tables
            .books
            .get_mut(&book_id)
            .ok_or(CatalogError::BookNotFound)?;
        book.title = fields.title;
        book.author_id = fields.author_id;
        book.genre = fields.genre;
        book.description = fields.description;
        book.rating = fields.rating;
        book.published_year = fields.published_year;
        Ok(book.clone())
    }

    async fn delete_book(&self, book_id: u64) -> Result<(), CatalogError> {
        let mut tables = self.tables.write().await;
        tables
            .books
            .remove(&book_id)
            .map(|_| ())
            .ok_or(CatalogError::BookNotFound)
    }

    async fn search_books_by_title(
        &self,
        title: &str,
        limit: usize,
    ) -> Result<Vec<Book>, CatalogError> {
        let needle = title.to_lowercase();
        let tables = self.tables.read().await;
        let mut books: Vec<Book> = tables
            .books
            .values()
            .filter(|b| b.title.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        sort_by_rating_desc(&mut books);
        books.truncate(limit);
        Ok(books)
    }

    async fn top_books(&self, limit: usize) -> Result<Vec<Book>, CatalogError> {
        let tables = self.tables.read().await;
        let mut books: Vec<Book> = tables.books.values().cloned().collect();
        sort_by_rating_desc(&mut books);
        books.truncate(limit);
        Ok(books)
    }

    async fn list_authors(&self) -> Result<Vec<Author>, CatalogError> {
        let tables = self.tables.read().await;
        let mut authors: Vec<Author> = tables.authors.values().cloned().collect();
        authors.sort_by_key(|a| a.author_id);
        Ok(authors)
    }

    async fn get_author(&self, author_id: u64) -> Result<Author, CatalogError> {
        let tables = self.tables.read().await;
        tables
            .authors
            .get(&author_id)
            .cloned()
            .ok_or(CatalogError::AuthorNotFound)
    }

    async fn update_author(
        &self,
        author_id: u64,
        fields: NewAuthor,
    ) -> Result<Author, CatalogError> {
        let mut tables = self.tables.write().await;
        let needle = fields.name.trim().to_lowercase();
        if tables
            .authors
            .values()
            .any(|a| a.author_id != author_id && a.name.to_lowercase() == needle)
        {
            return Err(CatalogError::DuplicateAuthor);
        }
        let author = tables
            .authors
            .get_mut(&author_id)
            .ok_or(CatalogError::AuthorNotFound)?;
        author.name = fields.name;
        author.biography = fields.biography;
        Ok(author.clone())
    }

    async fn delete_author(&self, author_id: u64) -> Result<(), CatalogError> {
        let mut tables = self.tables.write().await;
        if tables.authors.remove(&author_id).is_none() {
            return Err(CatalogError::AuthorNotFound);
        }
        // Orphaned books go with their author.
        tables.books.retain(|_, b| b.author_id != author_id);
        Ok(())
    }
}
