//! Prompt templates and fixed assistant messages.

/// Classifier instruction. The latest utterance is appended in isolation —
/// never the full transcript.
pub const INTENT_TEMPLATE: &str = r#"INSTRUCTIONS:
You are an intelligent assistant. Determine the user's intent based on the question provided. The possible intents are:
1. "book_recommendation" - The user is asking for a book recommendation related to something.
2. "book_recommendation" - The user is looking for a book with a specific description or asking about a book that's about something.
3. "top_books_genre" - The user is asking for top K books in a specific genre.
4. "top_books_author" - The user is asking for top K books by a specific author.
5. "add_book" - The user wants to add a book to the database and they may do that by asking to add a book.
6. "chat_history_query" - The user wants to inquire about previous interactions or chat history.
7. "greet" - The user is greeting the chatbot.
8. "unknown" - The intent is not clear from the question.

Respond with only one of the seven intents: "book_recommendation", "top_books_genre", "top_books_author", "add_book", "chat_history_query", "greet", or "unknown".

QUESTION:
"#;

/// Grounded-answer instruction for recommendation and history queries.
/// The composed context and the question are appended below it.
pub const MAIN_TEMPLATE: &str = r#"INSTRUCTIONS:
You're a smart library chatbot that answers human questions.
You can converse with the human but make sure that if the human asks a question you answer the QUESTION using the CONTEXT text below.
Keep your answer grounded in the facts of the CONTEXT.
Don't mention the CONTEXT to the user.
If the QUESTION doesn't relate to the CONTEXT return (Sorry, I can't answer this question as it doesn't relate to a book in my database.)
"#;

/// Emitted when the classifier resolves `unknown` (or any label outside the
/// enumeration). The turn terminates without invoking a handler.
pub const REFUSAL_MESSAGE: &str = "I'm sorry, I can only answer questions that relate to book recommendations, finding books that relate to a description, top books in a specific genre, or adding a book to the database.";

/// Emitted when an add-book utterance does not match the fixed template.
pub const ADD_BOOK_FORMAT_MESSAGE: &str = "Please provide all the required information: title, author, genre, description, rating, and published year. The correct format is: add book titled \"BOOK_TITLE\" by AUTHOR_NAME, genre: GENRE, description: DESCRIPTION, rating: RATING, published in YEAR.";

/// Emitted when a top-K utterance matched the intent but not the grammar.
pub const TOP_BOOKS_FORMAT_MESSAGE: &str =
    "Please specify the number of top books and the genre, for example: top 5 books in fantasy.";

pub const TOP_AUTHOR_FORMAT_MESSAGE: &str =
    "Please specify the number of top books and the author, for example: top 5 books by Jane Austen.";

pub const GREETING_MESSAGE: &str = "Hello! How can I assist you today?";

/// Generic notice for external-dependency failures. The caller never sees
/// the raw fault.
pub const DEGRADED_MESSAGE: &str =
    "Something went wrong while answering that. Please try again in a moment.";

/// Compose the classifier prompt for one utterance.
pub fn intent_prompt(utterance: &str) -> String {
    format!("{INTENT_TEMPLATE}{utterance}")
}

/// Compose a grounded-answer prompt from context plus the human message.
pub fn main_prompt(context: &str, question: &str) -> String {
    format!("{MAIN_TEMPLATE}\nCONTEXT:\n{context}\n\nHUMAN MESSAGE:\n{question}")
}
