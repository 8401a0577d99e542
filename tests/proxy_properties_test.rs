//! 代理核心的性质测试

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use payments_proxy::proxy::credentials::{BasicAuth, normalize_basic_auth};
use payments_proxy::proxy::envelope::{EnvelopeBody, ForwardedRequest, ProxyEnvelope};
use payments_proxy::proxy::inspector::{
    REDACTED, TRUNCATION_MARKER, maybe_truncate, sanitize_header_pairs,
};
use payments_proxy::proxy::upstream_url::build_upstream_url;
use axum::http::StatusCode;
use proptest::prelude::*;
use rstest::rstest;

const BASE: &str = "https://api.example.com";

fn random_case(name: &str, mask: &[bool]) -> String {
    name.chars()
        .zip(mask.iter().cycle())
        .map(|(c, upper)| if *upper { c.to_ascii_uppercase() } else { c })
        .collect()
}

fn envelope_with_status(status: u16) -> ProxyEnvelope {
    ProxyEnvelope::new(
        ForwardedRequest::new(
            format!("{BASE}/payments/v1/sessions"),
            "POST",
            &BasicAuth::from_credentials("user", "pass"),
            None,
        ),
        status,
        EnvelopeBody::Payload(None),
    )
}

proptest! {
    #[test]
    fn normalization_is_idempotent(user in "[A-Za-z0-9._-]{1,16}", pass in "[!-~]{0,16}") {
        let encoded = format!("Basic {}", STANDARD.encode(format!("{user}:{pass}")));
        let once = normalize_basic_auth(&encoded);
        prop_assert_eq!(normalize_basic_auth(&once), once.clone());

        let from_raw = normalize_basic_auth(&format!("Basic {user}:{pass}"));
        prop_assert_eq!(&from_raw, &once);
        prop_assert_eq!(normalize_basic_auth(&from_raw), from_raw.clone());
    }

    #[test]
    fn sensitive_headers_are_always_redacted(
        values in prop::collection::vec("[A-Za-z0-9]{8,24}", 4),
        mask in prop::collection::vec(any::<bool>(), 1..12),
    ) {
        let names = ["authorization", "cookie", "set-cookie", "x-api-key"];
        let pairs: Vec<(String, String)> = names
            .iter()
            .zip(values.iter())
            .map(|(name, value)| (random_case(name, &mask), value.clone()))
            .collect();

        let sanitized = sanitize_header_pairs(pairs);
        prop_assert_eq!(sanitized.len(), 4);
        for value in sanitized.values() {
            prop_assert_eq!(value.as_str(), REDACTED);
        }
        for original in &values {
            prop_assert!(!sanitized.values().any(|v| v.contains(original.as_str())));
        }
    }

    #[test]
    fn truncation_boundary(text in "\\PC{1,64}") {
        let limit = text.chars().count();
        prop_assert_eq!(maybe_truncate(Some(&text), limit), Some(text.clone()));

        let longer = format!("{text}x");
        prop_assert_eq!(
            maybe_truncate(Some(&longer), limit),
            Some(format!("{text}{TRUNCATION_MARKER}"))
        );
    }

    #[test]
    fn url_resolution_inserts_single_separator(path in "[a-z0-9]{1,12}(/[a-z0-9]{1,12}){0,3}") {
        let expected = format!("{BASE}/{path}");
        prop_assert_eq!(build_upstream_url(BASE, &format!("/{path}")), expected.clone());
        prop_assert_eq!(build_upstream_url(BASE, &path), expected.clone());
        prop_assert_eq!(build_upstream_url(&format!("{BASE}/"), &format!("/{path}")), expected);

        let absolute = format!("https://other.example/{path}");
        prop_assert_eq!(build_upstream_url(BASE, &absolute), absolute.clone());
    }

    #[test]
    fn success_statuses_collapse_to_ok(status in 200u16..300) {
        let envelope = envelope_with_status(status);
        prop_assert_eq!(envelope.transport_status(), StatusCode::OK);
        prop_assert_eq!(envelope.status, status);
    }
}

#[rstest]
#[case(199)]
#[case(300)]
#[case(400)]
#[case(401)]
#[case(404)]
#[case(500)]
#[case(502)]
fn test_non_success_statuses_collapse_to_500(#[case] status: u16) {
    let envelope = envelope_with_status(status);
    assert_eq!(envelope.transport_status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(envelope.status, status);
}
