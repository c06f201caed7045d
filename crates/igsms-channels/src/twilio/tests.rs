use super::send::describe_error;
use super::*;
use igsms_core::{error::IgsmsError, message::OutgoingMessage, traits::Channel};
use std::collections::BTreeMap;

fn params() -> BTreeMap<String, String> {
    [
        ("From", "+15551234567"),
        ("To", "+15557654321"),
        ("Body", "START IG"),
        ("MessageSid", "SM123"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

const URL: &str = "https://igsms.example.com/twilio/sms";

#[test]
fn test_messages_url() {
    let channel = TwilioChannel::new(TwilioConfig {
        account_sid: "AC42".to_string(),
        api_base: "https://api.twilio.com/".to_string(),
        ..Default::default()
    });
    assert_eq!(
        channel.messages_url,
        "https://api.twilio.com/2010-04-01/Accounts/AC42/Messages.json"
    );
}

#[test]
fn test_signature_round_trip() {
    let validator = SignatureValidator::new("12345");
    let sig = validator.expected_signature(URL, &params());
    // base64 of a 20-byte SHA-1 MAC.
    assert_eq!(sig.len(), 28);
    assert!(validator.validate(URL, &params(), &sig));
}

#[test]
fn test_signature_rejects_tampered_body() {
    let validator = SignatureValidator::new("12345");
    let sig = validator.expected_signature(URL, &params());

    let mut tampered = params();
    tampered.insert("Body".to_string(), "STOP IG".to_string());
    assert!(!validator.validate(URL, &tampered, &sig));
}

#[test]
fn test_signature_rejects_other_url_and_token() {
    let sig = SignatureValidator::new("12345").expected_signature(URL, &params());
    assert!(!SignatureValidator::new("12345").validate(
        "https://evil.example.com/twilio/sms",
        &params(),
        &sig
    ));
    assert!(!SignatureValidator::new("54321").validate(URL, &params(), &sig));
    assert!(!SignatureValidator::new("12345").validate(URL, &params(), ""));
}

#[test]
fn test_signature_depends_on_key_order_not_insertion_order() {
    let validator = SignatureValidator::new("tok");
    let mut a = BTreeMap::new();
    a.insert("b".to_string(), "2".to_string());
    a.insert("a".to_string(), "1".to_string());
    let mut b = BTreeMap::new();
    b.insert("a".to_string(), "1".to_string());
    b.insert("b".to_string(), "2".to_string());
    assert_eq!(
        validator.expected_signature(URL, &a),
        validator.expected_signature(URL, &b)
    );
}

#[test]
fn test_request_url_prefers_public_url() {
    assert_eq!(
        request_url(
            "https://igsms.example.com/",
            Some("internal:8000"),
            Some("http"),
            "/twilio/sms"
        )
        .as_deref(),
        Some("https://igsms.example.com/twilio/sms")
    );
}

#[test]
fn test_request_url_from_forwarded_headers() {
    assert_eq!(
        request_url("", Some("igsms.onrender.com"), Some("https, http"), "/twilio/sms?x=1")
            .as_deref(),
        Some("https://igsms.onrender.com/twilio/sms?x=1")
    );
    assert_eq!(
        request_url("", Some("localhost:8000"), None, "/twilio/sms").as_deref(),
        Some("http://localhost:8000/twilio/sms")
    );
    assert!(request_url("", None, None, "/twilio/sms").is_none());
}

#[test]
fn test_describe_error() {
    let body = r#"{"code":21211,"message":"The 'To' number is not a valid phone number.","status":400}"#;
    assert_eq!(
        describe_error(400, body),
        "twilio send failed (400, code 21211): The 'To' number is not a valid phone number."
    );
    assert_eq!(describe_error(502, "bad gateway"), "twilio send failed (502): bad gateway");
}

#[tokio::test]
async fn test_send_without_target_fails_before_network() {
    let channel = TwilioChannel::new(TwilioConfig::default());
    let err = channel
        .send(OutgoingMessage {
            text: "hi".to_string(),
            reply_target: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, IgsmsError::Sms(_)));
    assert_eq!(channel.name(), "twilio");
}

#[test]
fn test_parse_inbound() {
    let mut form = params();
    form.insert("Body".to_string(), "  start ig \n".to_string());
    let msg = parse_inbound(&form).unwrap();
    assert_eq!(msg.channel, "twilio");
    assert_eq!(msg.sender_id, "+15551234567");
    assert_eq!(msg.text, "start ig");
    assert_eq!(msg.provider_id.as_deref(), Some("SM123"));
}

#[test]
fn test_parse_inbound_requires_sender() {
    let mut form = params();
    form.remove("From");
    assert!(parse_inbound(&form).is_none());
    form.insert("From".to_string(), "  ".to_string());
    assert!(parse_inbound(&form).is_none());
}

#[test]
fn test_constant_time_eq() {
    assert!(constant_time_eq("abc", "abc"));
    assert!(!constant_time_eq("abc", "abd"));
    assert!(!constant_time_eq("abc", "ab"));
    assert!(constant_time_eq("", ""));
}
