//! Keyword classification of relayed messages.
//!
//! Messages read back from the raw topic are tagged as a promotion, a purchase
//! order, or neither, and republished on [`CLASSIFIED_TOPIC`].

use std::sync::Arc;

use async_trait::async_trait;
use promozap_relay::{Message, MessageSink, Publisher, RelayError, RelayResult};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Topic carrying classified messages.
pub const CLASSIFIED_TOPIC: &str = "whatsapp_in_threated";

const PROMOTION_KEYWORDS: &[&str] = &[
    "promoção",
    "desconto",
    "oferta",
    "liquidação",
    "black friday",
    "imperdível",
    "aproveite",
    "só hoje",
    "tempo limitado",
    "sale",
    "preço baixo",
    "oportunidade",
    "economize",
    "grátis",
    "frete grátis",
];

const ORDER_KEYWORDS: &[&str] = &[
    "quero comprar",
    "comprar",
    "pedido",
    "encomenda",
    "encomendar",
    "adquirir",
    "pedir",
    "reservar",
    "pagamento",
    "boleto",
    "cartão",
    "pix",
    "transferência",
    "entrega",
    "envio",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Promotion,
    Order,
    Other,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Promotion => "promotion",
            Classification::Order => "order",
            Classification::Other => "other",
        }
    }
}

/// Counts keyword hits per category; the category with more hits wins.
///
/// Keywords match as case-insensitive substrings, so "comprar" also counts
/// inside "quero comprar".
///
/// ```
/// use promozap_classifier::{Classification, KeywordClassifier};
///
/// let classifier = KeywordClassifier::default();
/// assert_eq!(classifier.classify("Mega OFERTA com desconto!"), Classification::Promotion);
/// assert_eq!(classifier.classify("Quero fazer um pedido"), Classification::Order);
/// assert_eq!(classifier.classify("bom dia"), Classification::Other);
/// ```
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    promotion: Vec<String>,
    order: Vec<String>,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(PROMOTION_KEYWORDS.iter().copied(), ORDER_KEYWORDS.iter().copied())
    }
}

impl KeywordClassifier {
    pub fn new<'a>(
        promotion: impl IntoIterator<Item = &'a str>,
        order: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Self {
            promotion: promotion.into_iter().map(str::to_lowercase).collect(),
            order: order.into_iter().map(str::to_lowercase).collect(),
        }
    }

    pub fn classify(&self, body: &str) -> Classification {
        let text = body.to_lowercase();
        let hits = |keywords: &[String]| {
            keywords
                .iter()
                .filter(|keyword| text.contains(keyword.as_str()))
                .count()
        };

        let promotion = hits(&self.promotion);
        let order = hits(&self.order);

        match promotion.cmp(&order) {
            std::cmp::Ordering::Greater => Classification::Promotion,
            std::cmp::Ordering::Less => Classification::Order,
            std::cmp::Ordering::Equal => Classification::Other,
        }
    }
}

/// Wire form on [`CLASSIFIED_TOPIC`]: the message fields plus the verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedMessage {
    pub id: String,
    pub body: String,
    pub from: String,
    pub timestamp: i64,
    pub classification: Classification,
}

impl ClassifiedMessage {
    pub fn new(message: &Message, classification: Classification) -> Self {
        Self {
            id: message.id().to_string(),
            body: message.body().to_string(),
            from: message.sender().to_string(),
            timestamp: message.timestamp(),
            classification,
        }
    }
}

/// Sink that classifies each message and republishes it.
pub struct ClassifyingSink {
    classifier: KeywordClassifier,
    publisher: Arc<dyn Publisher>,
}

impl ClassifyingSink {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self::with_classifier(publisher, KeywordClassifier::default())
    }

    pub fn with_classifier(publisher: Arc<dyn Publisher>, classifier: KeywordClassifier) -> Self {
        Self {
            classifier,
            publisher,
        }
    }
}

#[async_trait]
impl MessageSink for ClassifyingSink {
    async fn forward(&self, message: Message) -> RelayResult<()> {
        let classification = self.classifier.classify(message.body());
        let classified = ClassifiedMessage::new(&message, classification);
        let payload = serde_json::to_string(&classified)
            .map_err(|err| RelayError::encode(err.to_string()))?;

        self.publisher.publish(CLASSIFIED_TOPIC, &payload).await?;
        info!(
            message_id = message.id(),
            classification = classification.as_str(),
            "message classified"
        );
        Ok(())
    }
}
