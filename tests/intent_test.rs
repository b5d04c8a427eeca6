use std::sync::Arc;

use bookmind::assistant::intent::{Intent, IntentClassifier, parse_label};
use bookmind::assistant::providers::EchoProvider;

#[test]
fn parse_label_takes_first_token_lowercased() {
    assert_eq!(parse_label("Greet"), "greet");
    assert_eq!(parse_label("  top_books_genre  \n"), "top_books_genre");
    assert_eq!(parse_label("ADD_BOOK because the user asked"), "add_book");
}

#[test]
fn parse_label_strips_surrounding_quotes() {
    assert_eq!(parse_label("\"book_recommendation\""), "book_recommendation");
    assert_eq!(parse_label("'greet'"), "greet");
}

#[test]
fn parse_label_of_empty_response_is_empty() {
    assert_eq!(parse_label(""), "");
    assert_eq!(parse_label("   \n  "), "");
}

#[test]
fn from_label_maps_the_enumeration() {
    assert_eq!(
        Intent::from_label("book_recommendation"),
        Intent::BookRecommendation
    );
    assert_eq!(Intent::from_label("top_books_genre"), Intent::TopBooksGenre);
    assert_eq!(Intent::from_label("top_books_author"), Intent::TopBooksAuthor);
    assert_eq!(Intent::from_label("add_book"), Intent::AddBook);
    assert_eq!(
        Intent::from_label("chat_history_query"),
        Intent::ChatHistoryQuery
    );
    assert_eq!(Intent::from_label("greet"), Intent::Greet);
    assert_eq!(Intent::from_label("unknown"), Intent::Unknown);
}

#[test]
fn out_of_set_labels_default_to_unknown() {
    assert_eq!(Intent::from_label("banana"), Intent::Unknown);
    assert_eq!(Intent::from_label(""), Intent::Unknown);
    assert_eq!(Intent::from_label("book recommendation"), Intent::Unknown);
}

#[test]
fn labels_round_trip() {
    for intent in [
        Intent::BookRecommendation,
        Intent::TopBooksGenre,
        Intent::TopBooksAuthor,
        Intent::AddBook,
        Intent::ChatHistoryQuery,
        Intent::Greet,
        Intent::Unknown,
    ] {
        assert_eq!(Intent::from_label(intent.as_label()), intent);
    }
}

#[tokio::test]
async fn classifier_parses_the_model_response() {
    // The echo provider replies with the prompt's last line — the utterance
    // itself — so an utterance that is a bare label classifies as it.
    let classifier = IntentClassifier::new(Arc::new(EchoProvider));
    let label = classifier.classify("greet").await.expect("classify");
    assert_eq!(label, "greet");

    let label = classifier
        .classify("What's the weather like?")
        .await
        .expect("classify");
    assert_eq!(Intent::from_label(&label), Intent::Unknown);
}
