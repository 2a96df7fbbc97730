use std::sync::Arc;
use std::time::Duration;

use promozap_classifier::{Classification, ClassifiedMessage, ClassifyingSink, CLASSIFIED_TOPIC};
use promozap_relay::test_support::{
    wait_until, RecordingPublisher, ScriptedSession, ScriptedSubscriber,
};
use promozap_relay::{Message, MessageSink, Relay, RelayError, SubscribePath, RAW_TOPIC};

fn promo_message() -> Message {
    Message::new("P1", "Black Friday: desconto imperdível!", "+5511999990000", 1_700_000_000)
}

#[tokio::test]
async fn classified_message_is_published_on_its_own_topic() {
    let publisher = Arc::new(RecordingPublisher::new());
    let sink = ClassifyingSink::new(publisher.clone());

    sink.forward(promo_message()).await.expect("forward succeeds");

    assert!(publisher.payloads_on(RAW_TOPIC).is_empty());
    let payloads = publisher.payloads_on(CLASSIFIED_TOPIC);
    assert_eq!(payloads.len(), 1);

    let classified: ClassifiedMessage = serde_json::from_str(&payloads[0]).unwrap();
    assert_eq!(classified.id, "P1");
    assert_eq!(classified.from, "+5511999990000");
    assert_eq!(classified.timestamp, 1_700_000_000);
    assert_eq!(classified.classification, Classification::Promotion);
}

#[tokio::test]
async fn publish_failure_surfaces_as_publish_error() {
    let publisher = Arc::new(RecordingPublisher::new());
    publisher.fail_next_publishes(1);
    let sink = ClassifyingSink::new(publisher.clone());

    let err = sink.forward(promo_message()).await.unwrap_err();
    assert!(matches!(err, RelayError::Publish { .. }));
    assert!(err.is_per_message());
}

#[tokio::test]
async fn subscribe_path_feeds_the_classifier() {
    let publisher = Arc::new(RecordingPublisher::new());
    let path = SubscribePath::new(Arc::new(ClassifyingSink::new(publisher.clone())));

    let raw = r#"{"id":"O1","body":"Quero comprar, aceita pix?","from":"+1","timestamp":5}"#;
    path.on_raw_payload(Some(raw.as_bytes())).await.expect("delivered");

    let payloads = publisher.payloads_on(CLASSIFIED_TOPIC);
    assert_eq!(
        payloads,
        vec![
            r#"{"id":"O1","body":"Quero comprar, aceita pix?","from":"+1","timestamp":5,"classification":"order"}"#
                .to_string()
        ]
    );
}

#[tokio::test]
async fn sink_built_from_the_relay_publisher_shares_its_connection() {
    let publisher = Arc::new(RecordingPublisher::new());
    let subscriber = ScriptedSubscriber::from_texts([
        r#"{"id":"P2","body":"Promoção com frete grátis","from":"+1","timestamp":9}"#,
    ]);

    let relay = Relay::new(
        publisher.clone(),
        Box::new(subscriber),
        Box::new(ScriptedSession::idle()),
    );
    let sink = Arc::new(ClassifyingSink::new(relay.publisher()));
    let mut relay = relay.with_sink(sink);

    relay.start().await.expect("relay should start");
    let classified = wait_until(Duration::from_secs(2), || {
        publisher.payloads_on(CLASSIFIED_TOPIC).len() == 1
    })
    .await;
    assert!(classified, "classified message should be published");

    let report = relay.shutdown().await;
    assert!(report.is_clean());
    assert!(publisher.is_closed());

    let payload: ClassifiedMessage =
        serde_json::from_str(&publisher.payloads_on(CLASSIFIED_TOPIC)[0]).unwrap();
    assert_eq!(payload.classification, Classification::Promotion);
}
