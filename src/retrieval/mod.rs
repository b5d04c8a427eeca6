use std::sync::Arc;

use async_trait::async_trait;

use crate::catalog::Catalog;

/// Similarity-search collaborator. Returns a small fixed number of passage
/// strings relevant to the query, most relevant first.
#[async_trait]
pub trait RetrievalIndex: Send + Sync {
    async fn similarity_search(&self, query: &str) -> anyhow::Result<Vec<String>>;
}

/// Keyword-overlap index over catalog content. Stands in for a real vector
/// index: passages are scored by how many query keywords they contain.
pub struct CatalogIndex {
    catalog: Arc<dyn Catalog>,
    top_k: usize,
}

impl CatalogIndex {
    pub fn new(catalog: Arc<dyn Catalog>, top_k: usize) -> Self {
        Self { catalog, top_k }
    }
}

/// Lowercased alphanumeric words, short stopword-ish tokens skipped.
fn keywords(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|w| w.len() > 2)
        .collect()
}

#[async_trait]
impl RetrievalIndex for CatalogIndex {
    async fn similarity_search(&self, query: &str) -> anyhow::Result<Vec<String>> {
        let keywords = keywords(query);
        if keywords.is_empty() {
            return Ok(Vec::new());
        }

        let books = self.catalog.list_books().await?;
        let mut scored: Vec<(usize, String)> = Vec::new();

        for book in books {
            let author_name = match self.catalog.get_author(book.author_id).await {
                Ok(author) => author.name,
                Err(_) => continue,
            };

            let haystack = format!(
                "{} {} {} {}",
                book.title, author_name, book.genre, book.description
            )
            .to_lowercase();

            let score = keywords.iter().filter(|k| haystack.contains(*k)).count();
            if score == 0 {
                continue;
            }

            let passage = format!(
                "\"{}\" by {} (genre: {}, rating: {}): {}",
                book.title, author_name, book.genre, book.rating, book.description
            );
            scored.push((score, passage));
        }

        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        Ok(scored
            .into_iter()
            .take(self.top_k)
            .map(|(_, passage)| passage)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MemoryCatalog, NewAuthor, NewBook};

    async fn seeded_catalog() -> Arc<MemoryCatalog> {
        let catalog = Arc::new(MemoryCatalog::new());
        let author = catalog
            .insert_author(NewAuthor {
                name: "Ursula K. Le Guin".into(),
                biography: String::new(),
            })
            .await
            .expect("author");
        catalog
            .insert_book(NewBook {
                title: "A Wizard of Earthsea".into(),
                author_id: author.author_id,
                genre: "fantasy".into(),
                description: "A young wizard learns the true names of things.".into(),
                rating: 4.5,
                published_year: 1968,
            })
            .await
            .expect("book");
        catalog
            .insert_book(NewBook {
                title: "The Dispossessed".into(),
                author_id: author.author_id,
                genre: "science fiction".into(),
                description: "An ambiguous utopia on twin worlds.".into(),
                rating: 4.3,
                published_year: 1974,
            })
            .await
            .expect("book");
        catalog
    }

    #[tokio::test]
    async fn matches_rank_above_non_matches() {
        let index = CatalogIndex::new(seeded_catalog().await, 4);
        let passages = index
            .similarity_search("a book about a wizard")
            .await
            .expect("search");
        assert_eq!(passages.len(), 1);
        assert!(passages[0].contains("A Wizard of Earthsea"));
    }

    #[tokio::test]
    async fn unrelated_query_returns_nothing() {
        let index = CatalogIndex::new(seeded_catalog().await, 4);
        let passages = index
            .similarity_search("quarterly tax filings")
            .await
            .expect("search");
        assert!(passages.is_empty());
    }
}
