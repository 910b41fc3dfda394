//! Keyword based intent matching for the storefront assistant.
//!
//! Intents are checked in declaration order of [`INTENT_KEYWORDS`]; the first
//! intent with a matching keyword wins. Single-word keywords match whole
//! tokens (optionally pluralized with a trailing `s`), multi-word keywords
//! match anywhere in the normalized message.

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    OrderStatus,
    Prescription,
    Discounts,
    Returns,
    Payment,
    Pickup,
    Hours,
    Location,
    Contact,
    Categories,
    ProductSearch,
    Greeting,
    Thanks,
    Goodbye,
    Unknown,
}

const INTENT_KEYWORDS: &[(Intent, &[&str])] = &[
    (
        Intent::OrderStatus,
        &["my order", "order status", "track", "tracking", "where is my"],
    ),
    (
        Intent::Prescription,
        &["prescription", "prescribed", "rx", "doctor", "recipe"],
    ),
    (
        Intent::Discounts,
        &["discount", "offer", "sale", "promo", "promotion", "deal", "coupon"],
    ),
    (Intent::Returns, &["return", "refund", "exchange"]),
    (
        Intent::Payment,
        &["pay", "payment", "card", "cash", "transfer"],
    ),
    (
        Intent::Pickup,
        &[
            "delivery", "deliver", "shipping", "ship", "pickup", "pick up", "collect",
        ],
    ),
    (
        Intent::Hours,
        &["hours", "open", "opening", "close", "closing", "schedule"],
    ),
    (
        Intent::Location,
        &["location", "address", "located", "directions", "where are you"],
    ),
    (
        Intent::Contact,
        &["contact", "phone", "email", "call", "whatsapp"],
    ),
    (Intent::Categories, &["category", "categories", "section"]),
    (
        Intent::ProductSearch,
        &[
            "do you have",
            "looking for",
            "price",
            "cost",
            "stock",
            "available",
            "buy",
            "search",
            "find",
            "product",
            "medicine",
        ],
    ),
    (
        Intent::Greeting,
        &[
            "hello",
            "hi",
            "hey",
            "good morning",
            "good afternoon",
            "good evening",
        ],
    ),
    (Intent::Thanks, &["thanks", "thank you", "thx"]),
    (Intent::Goodbye, &["bye", "goodbye", "see you"]),
];

/// Words that never identify a product.
const STOPWORDS: &[&str] = &[
    "the", "and", "for", "you", "your", "have", "has", "any", "some", "how", "much", "what",
    "does", "can", "need", "want", "with", "are", "there", "this", "that", "please", "price",
    "cost", "stock", "available", "buy", "search", "find", "product", "products", "medicine",
    "looking", "do", "is", "of", "a", "an", "me", "i", "in",
];

fn tokenize(message: &str) -> Vec<String> {
    message
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
        .collect()
}

fn matches_keyword(normalized: &str, tokens: &[String], keyword: &str) -> bool {
    if keyword.contains(' ') {
        normalized.contains(keyword)
    } else {
        tokens
            .iter()
            .any(|token| token == keyword || token.strip_suffix('s') == Some(keyword))
    }
}

pub fn classify(message: &str) -> Intent {
    let tokens = tokenize(message);
    let normalized = tokens.join(" ");

    INTENT_KEYWORDS
        .iter()
        .find(|(_, keywords)| {
            keywords
                .iter()
                .any(|keyword| matches_keyword(&normalized, &tokens, keyword))
        })
        .map(|(intent, _)| *intent)
        .unwrap_or(Intent::Unknown)
}

/// Candidate product name fragments from a search style message.
pub fn search_terms(message: &str) -> Vec<String> {
    let mut terms: Vec<String> = tokenize(message)
        .into_iter()
        .filter(|token| token.chars().count() >= 3 && !STOPWORDS.contains(&token.as_str()))
        .collect();
    terms.dedup();
    terms
}

pub const STORE_HOURS: &str = "Monday to Friday 8:00-21:00, Saturday 9:00-14:00. Closed on Sundays.";
pub const STORE_ADDRESS: &str = "Main Street 12, city centre, next to the central market.";
pub const STORE_PHONE: &str = "+1 555 0100";
pub const STORE_EMAIL: &str = "help@pharmacy.example";

/// Reply for intents that need no data lookup.
pub fn canned_reply(intent: Intent) -> String {
    match intent {
        Intent::Greeting => "Hello! I can help with products, opening hours, orders and pickup. What do you need?".to_owned(),
        Intent::Hours => format!("Our opening hours: {STORE_HOURS}"),
        Intent::Location => format!("You can find us at {STORE_ADDRESS}"),
        Intent::Contact => format!("Call us at {STORE_PHONE} or write to {STORE_EMAIL}."),
        Intent::Pickup => "We only offer in-store pickup, so there is no shipping cost. We let you know when your order is ready to collect.".to_owned(),
        Intent::Payment => "You pay when you collect your order, by card or cash.".to_owned(),
        Intent::Prescription => "Prescription medicines are marked in the catalogue. Bring your prescription when you collect the order; our pharmacist checks it before handing it over.".to_owned(),
        Intent::Returns => "Unopened non-prescription products can be returned within 14 days with the receipt. Medicines cannot be returned once they leave the pharmacy.".to_owned(),
        Intent::Thanks => "You're welcome! Anything else I can help with?".to_owned(),
        Intent::Goodbye => "Goodbye, take care!".to_owned(),
        Intent::OrderStatus => "Log in and I can tell you the status of your latest order.".to_owned(),
        Intent::Categories => "We don't have any categories yet.".to_owned(),
        Intent::Discounts => "There are no active discounts right now.".to_owned(),
        Intent::ProductSearch => "Tell me the name of the product you're looking for.".to_owned(),
        Intent::Unknown => format!(
            "Sorry, I didn't understand that. You can ask about products, discounts, opening hours, pickup or your order, or call us at {STORE_PHONE}."
        ),
    }
}
