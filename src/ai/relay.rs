//! Server side of the shopping assistant: turns one chat request into a
//! stream of relay events backed by a streamed Gemini generation.

use std::time::Duration;

use async_stream::stream;
use futures::StreamExt;
use futures::stream::BoxStream;
use sea_orm::EntityTrait;
use tokio::time::timeout;

use crate::{
    entity::products::{self, Entity as Products},
    error::{AppError, AppResult},
    locale::Locale,
    services::product_service,
    state::AppState,
};

use super::chat::{
    CartLine, ChatRequest, ChatRole, ChatTurn, MAX_HISTORY_TURNS, PageContext, ProductCard,
    RelayEvent, validate_request,
};
use super::error::AiError;
use super::gemini::Content;

pub const MAX_PRODUCT_CARDS: usize = 4;
const UPSTREAM_OPEN_TIMEOUT: Duration = Duration::from_secs(20);
const UPSTREAM_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

const MAX_MESSAGE_TERMS: usize = 6;

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "you", "your", "what", "which", "have", "with", "this", "that",
    "please", "want", "need", "هل", "عندكم", "لديكم", "ماذا", "هذا", "هذه", "أريد", "اريد",
];

/// Catalogue lookup words from a chat message.
fn message_terms(message: &str) -> Vec<String> {
    let lowered = message.to_lowercase();
    let mut terms: Vec<String> = Vec::new();
    for word in lowered.split(|c: char| !c.is_alphanumeric()) {
        if word.chars().count() < 3 || STOP_WORDS.contains(&word) {
            continue;
        }
        if !terms.iter().any(|t| t == word) {
            terms.push(word.to_string());
        }
        if terms.len() >= MAX_MESSAGE_TERMS {
            break;
        }
    }
    terms
}

fn product_card(product: &products::Model, locale: Locale) -> ProductCard {
    ProductCard {
        id: product.id,
        slug: product.slug.clone(),
        name: locale.pick(&product.name_ar, &product.name_en).to_string(),
        price: product.effective_price(),
        image_url: product.image_url.clone(),
        in_stock: product.stock > 0,
    }
}

/// Cards for the product on screen plus catalogue matches for the message.
async fn matching_cards(state: &AppState, request: &ChatRequest) -> AppResult<Vec<ProductCard>> {
    let mut found: Vec<products::Model> = Vec::new();

    if let Some(product_id) = request.page_context.as_ref().and_then(|c| c.product_id) {
        let product = Products::find_by_id(product_id).one(&state.orm).await?;
        found.extend(product.filter(|p| p.is_active));
    }

    let terms = message_terms(&request.message);
    let matches = product_service::find_matching(state, &terms, MAX_PRODUCT_CARDS as u64).await?;
    for product in matches {
        if !found.iter().any(|p| p.id == product.id) {
            found.push(product);
        }
    }

    Ok(found
        .iter()
        .take(MAX_PRODUCT_CARDS)
        .map(|p| product_card(p, request.locale))
        .collect())
}

pub fn system_instruction(
    locale: Locale,
    site_url: &str,
    page: Option<&PageContext>,
    cart: &[CartLine],
    cards: &[ProductCard],
) -> String {
    let mut prompt = String::new();
    match locale {
        Locale::Ar => prompt.push_str(
            "أنت مساعد التسوق للمجموعة وشركاتها. أجب باللغة العربية بإيجاز ولطف، \
             ولا تخترع منتجات أو أسعاراً غير مذكورة أدناه.\n",
        ),
        Locale::En => prompt.push_str(
            "You are the shopping assistant for the group and its companies. Answer in \
             English, briefly and politely, and never invent products or prices that are \
             not listed below.\n",
        ),
    }
    prompt.push_str(&format!("Site: {site_url}\n"));

    if let Some(page) = page {
        prompt.push_str(&format!("Current page: {}", page.page_type));
        if let Some(company) = page.company.as_deref() {
            prompt.push_str(&format!(" (company: {company})"));
        }
        prompt.push('\n');
    }

    if cart.is_empty() {
        prompt.push_str("Cart: empty\n");
    } else {
        prompt.push_str("Cart:\n");
        for line in cart {
            prompt.push_str(&format!("- {} x{} @ {}\n", line.name, line.quantity, line.price));
        }
    }

    if !cards.is_empty() {
        prompt.push_str("Relevant products (shown to the shopper as cards):\n");
        for card in cards {
            let availability = if card.in_stock { "in stock" } else { "out of stock" };
            prompt.push_str(&format!(
                "- {} | {} | {} | {}/products/{}\n",
                card.name, card.price, availability, site_url, card.slug
            ));
        }
    }
    prompt
}

/// Recent history plus the new message, starting with a user turn.
pub fn build_contents(history: &[ChatTurn], message: &str) -> Vec<Content> {
    let start = history.len().saturating_sub(MAX_HISTORY_TURNS);
    let mut contents: Vec<Content> = history[start..]
        .iter()
        .filter(|turn| !turn.content.trim().is_empty())
        .skip_while(|turn| turn.role != ChatRole::User)
        .map(|turn| match turn.role {
            ChatRole::User => Content::user(turn.content.trim()),
            ChatRole::Assistant => Content::model(turn.content.trim()),
        })
        .collect();
    contents.push(Content::user(message.trim()));
    contents
}

/// Validate the request and start the event stream. Validation and
/// configuration problems fail the request; provider failures become
/// `error` events followed by `done`.
pub async fn open_stream(
    state: &AppState,
    request: ChatRequest,
) -> AppResult<BoxStream<'static, RelayEvent>> {
    validate_request(&request).map_err(|msg| AppError::BadRequest(msg.into()))?;
    let client = state.gemini()?.clone();
    let locale = request.locale;

    let cards = matching_cards(state, &request).await?;
    let system = system_instruction(
        locale,
        &state.config.site_url,
        request.page_context.as_ref(),
        &request.cart,
        &cards,
    );
    let contents = build_contents(&request.history, &request.message);
    let session_id = request.session_id;

    tracing::info!(%session_id, %locale, cards = cards.len(), "chat relay started");

    Ok(Box::pin(stream! {
        if !cards.is_empty() {
            yield RelayEvent::Visual(cards);
        }

        let opened = match timeout(UPSTREAM_OPEN_TIMEOUT, client.stream_generate(system, contents)).await {
            Ok(result) => result,
            Err(_) => Err(AiError::Timeout),
        };

        match opened {
            Ok(mut upstream) => {
                let mut chars = 0usize;
                loop {
                    match timeout(UPSTREAM_IDLE_TIMEOUT, upstream.next()).await {
                        Ok(Some(Ok(chunk))) => {
                            if let Some(text) = chunk.text() {
                                chars += text.chars().count();
                                yield RelayEvent::Text(text);
                            }
                        }
                        Ok(Some(Err(err))) => {
                            tracing::warn!(%session_id, error = %err, "chat stream failed");
                            yield RelayEvent::Error(err.user_message(locale).to_string());
                            break;
                        }
                        Ok(None) => break,
                        Err(_) => {
                            tracing::warn!(%session_id, "chat stream stalled");
                            yield RelayEvent::Error(AiError::Timeout.user_message(locale).to_string());
                            break;
                        }
                    }
                }
                tracing::debug!(%session_id, chars, "chat relay finished");
            }
            Err(err) => {
                tracing::warn!(%session_id, error = %err, "chat upstream unavailable");
                yield RelayEvent::Error(err.user_message(locale).to_string());
            }
        }

        yield RelayEvent::Done;
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(role: ChatRole, content: &str) -> ChatTurn {
        ChatTurn {
            role,
            content: content.into(),
        }
    }

    #[test]
    fn message_terms_drop_phrase_and_filler() {
        assert_eq!(message_terms("honey"), vec!["honey".to_string()]);
        assert_eq!(
            message_terms("Do you have the olive oil?"),
            vec!["olive".to_string(), "oil".into()]
        );
        assert_eq!(message_terms("هل عندكم زيت"), vec!["زيت".to_string()]);
    }

    #[test]
    fn contents_start_with_user_and_end_with_message() {
        let history = vec![
            turn(ChatRole::Assistant, "مرحبا! كيف أساعدك؟"),
            turn(ChatRole::User, "do you sell dates?"),
            turn(ChatRole::Assistant, "Yes."),
            turn(ChatRole::User, "   "),
        ];
        let contents = build_contents(&history, " how much? ");
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0].role.as_deref(), Some("user"));
        assert_eq!(contents[1].role.as_deref(), Some("model"));
        assert_eq!(contents[2].parts[0].text, "how much?");
    }

    #[test]
    fn history_is_capped() {
        let history: Vec<ChatTurn> = (0..50)
            .map(|i| {
                let role = if i % 2 == 0 { ChatRole::User } else { ChatRole::Assistant };
                turn(role, &format!("turn {i}"))
            })
            .collect();
        let contents = build_contents(&history, "latest");
        assert!(contents.len() <= MAX_HISTORY_TURNS + 1);
        assert_eq!(contents.last().map(|c| c.parts[0].text.as_str()), Some("latest"));
    }

    #[test]
    fn instruction_mentions_cart_and_cards() {
        let cart = vec![CartLine {
            product_id: None,
            name: "Dates box".into(),
            quantity: 2,
            price: 90,
        }];
        let cards = vec![ProductCard {
            id: uuid::Uuid::new_v4(),
            slug: "honey".into(),
            name: "Honey".into(),
            price: 150,
            image_url: None,
            in_stock: false,
        }];
        let page = PageContext {
            page_type: "company".into(),
            company: Some("farms".into()),
            product_id: None,
        };
        let prompt = system_instruction(
            Locale::En,
            "https://shop.example",
            Some(&page),
            &cart,
            &cards,
        );
        assert!(prompt.contains("Answer in English"));
        assert!(prompt.contains("company: farms"));
        assert!(prompt.contains("Dates box x2 @ 90"));
        assert!(prompt.contains("out of stock"));
        assert!(prompt.contains("https://shop.example/products/honey"));

        let arabic = system_instruction(Locale::Ar, "https://shop.example", None, &[], &[]);
        assert!(arabic.contains("باللغة العربية"));
        assert!(arabic.contains("Cart: empty"));
    }
}
