//! End-to-end exchanges between a relying party and the provider.

use chrono::{Duration, Utc};
use openid2_assoc::{Association, MemoryStore, Store};
use openid2_core::{ns, AssocType, Error, SessionType};
use openid2_crypto::encoding::base64_decode;
use openid2_crypto::{DhParams, OsRandom, PrivateKey, PublicKey, RandomSource};
use openid2_message::Message;
use openid2_provider::{Provider, ProviderConfig, Response, Session};
use std::sync::Arc;

const ENDPOINT: &str = "https://op.example.com/openid";
const RETURN_TO: &str = "https://rp.example.com/finish";

fn setup() -> (Provider, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let provider = Provider::new(ProviderConfig::new(ENDPOINT), store.clone()).unwrap();
    (provider, store)
}

fn respond(provider: &Provider, params: &[(&str, &str)]) -> Result<Response, Error> {
    let msg = Message::from_query(params.iter().copied())?;
    provider.establish_session(msg)?.response()
}

fn arg(msg: &Message, name: &str) -> String {
    msg.openid_arg(name)
        .unwrap_or_else(|| panic!("missing {name}"))
        .to_string()
}

/// Run a checkid_setup for `identity`, accepting it, and return the
/// positive assertion.
fn authenticate(provider: &Provider, assoc_handle: Option<&str>) -> Message {
    let mut params = vec![
        ("openid.ns", ns::OPENID20),
        ("openid.mode", "checkid_setup"),
        ("openid.identity", "https://op.example.com/alice"),
        ("openid.claimed_id", "https://op.example.com/alice"),
        ("openid.realm", "https://rp.example.com/"),
        ("openid.return_to", RETURN_TO),
    ];
    if let Some(handle) = assoc_handle {
        params.push(("openid.assoc_handle", handle));
    }
    let msg = Message::from_query(params).unwrap();
    let Session::CheckId(mut session) = provider.establish_session(msg).unwrap() else {
        panic!("expected a checkid session");
    };
    session.accept("https://op.example.com/alice", "").unwrap();
    let response = session.response().unwrap();
    assert!(response.needs_redirect());
    response.into_message()
}

/// The relying party's `check_authentication` round trip, over the wire.
fn check_authentication(provider: &Provider, assertion: &Message) -> Result<Message, Error> {
    let mut request = assertion.clone();
    request.set_openid_arg("mode", "check_authentication");
    let session = provider.establish_session_from_query(&request.to_query_string())?;
    let response = session.response()?;
    assert_eq!(response.content_type(), Some("text/plain;charset=utf-8"));
    Ok(response.into_message())
}

#[test]
fn test_associate_no_encryption() {
    let (provider, store) = setup();
    let response = respond(
        &provider,
        &[
            ("openid.ns", ns::OPENID20),
            ("openid.mode", "associate"),
            ("openid.assoc_type", "HMAC-SHA256"),
            ("openid.session_type", "no-encryption"),
        ],
    )
    .unwrap();
    assert!(!response.needs_redirect());

    let msg = response.message();
    assert_eq!(arg(msg, "session_type"), "no-encryption");
    assert_eq!(arg(msg, "assoc_type"), "HMAC-SHA256");
    let secret = base64_decode(&arg(msg, "mac_key")).unwrap();
    assert_eq!(secret.len(), 32);

    let stored = store.get_association(&arg(msg, "assoc_handle"), false).unwrap();
    assert_eq!(stored.secret(), secret.as_slice());
    assert!(!stored.is_stateless());

    let body = String::from_utf8(response.body().unwrap()).unwrap();
    assert!(body.starts_with("ns:http://specs.openid.net/auth/2.0\n"));
    assert!(body.contains("\nexpires_in:"));
}

#[test]
fn test_associate_diffie_hellman() {
    let (provider, store) = setup();
    let params = DhParams::default();

    for (assoc_type, session_type) in [
        (AssocType::HmacSha1, SessionType::DhSha1),
        (AssocType::HmacSha256, SessionType::DhSha256),
    ] {
        let consumer = PrivateKey::generate(&params, &OsRandom).unwrap();
        let consumer_public = consumer.public_key(&params).to_base64();

        let response = respond(
            &provider,
            &[
                ("openid.ns", ns::OPENID20),
                ("openid.mode", "associate"),
                ("openid.assoc_type", assoc_type.name()),
                ("openid.session_type", session_type.name()),
                ("openid.dh_consumer_public", consumer_public.as_str()),
            ],
        )
        .unwrap();
        let msg = response.message();
        assert!(msg.openid_arg("mac_key").is_none());

        let server_public = PublicKey::from_base64(&arg(msg, "dh_server_public")).unwrap();
        let shared = consumer.shared_secret(&server_public, &params).unwrap();
        let enc_mac_key = base64_decode(&arg(msg, "dh_mac_key")).unwrap();
        let hash = session_type.hash().unwrap();
        let secret = shared.xor_secret(hash, &enc_mac_key).unwrap();

        let stored = store.get_association(&arg(msg, "assoc_handle"), false).unwrap();
        assert_eq!(stored.assoc_type(), assoc_type);
        assert_eq!(stored.secret(), secret.as_slice());
    }
}

#[test]
fn test_associate_negotiation_failure() {
    let (provider, store) = setup();
    let response = respond(
        &provider,
        &[
            ("openid.ns", ns::OPENID20),
            ("openid.mode", "associate"),
            ("openid.assoc_type", "HMAC-SHA256"),
            ("openid.session_type", "DH-SHA1"),
        ],
    )
    .unwrap();

    let msg = response.message();
    assert_eq!(arg(msg, "error_code"), "unsupported-type");
    assert_eq!(arg(msg, "session_type"), "DH-SHA256");
    assert_eq!(arg(msg, "assoc_type"), "HMAC-SHA256");
    assert!(!arg(msg, "error").is_empty());
    assert!(msg.openid_arg("sig").is_none());
    assert_eq!(store.association_count().unwrap(), 0);
}

#[test]
fn test_associate_random_failure() {
    struct Exhausted;
    impl RandomSource for Exhausted {
        fn fill(&self, _: &mut [u8]) -> openid2_core::Result<()> {
            Err(Error::Crypto("entropy exhausted".into()))
        }
    }

    let provider = Provider::with_random(
        ProviderConfig::new(ENDPOINT),
        Arc::new(MemoryStore::new()),
        Arc::new(Exhausted),
    )
    .unwrap();
    let r = respond(
        &provider,
        &[
            ("openid.ns", ns::OPENID20),
            ("openid.mode", "associate"),
            ("openid.assoc_type", "HMAC-SHA1"),
            ("openid.session_type", "no-encryption"),
        ],
    );
    assert!(matches!(r, Err(Error::GeneratingAssociationFailed(_))));
}

#[test]
fn test_stateless_assertion_verifies_once() {
    let (provider, store) = setup();
    let assertion = authenticate(&provider, None);
    let handle = arg(&assertion, "assoc_handle");
    assert!(store.get_association(&handle, true).is_ok());

    let target = Response::redirect(assertion.clone(), RETURN_TO)
        .redirect_to()
        .unwrap();
    assert!(target.starts_with("https://rp.example.com/finish?openid.ns="));

    let result = check_authentication(&provider, &assertion).unwrap();
    assert_eq!(arg(&result, "is_valid"), "true");
    assert!(result.openid_arg("invalidate_handle").is_none());
    assert!(store.get_association(&handle, true).is_err());

    let replay = check_authentication(&provider, &assertion);
    assert_eq!(
        replay.unwrap_err(),
        Error::KnownNonce(arg(&assertion, "response_nonce"))
    );
}

#[test]
fn test_forged_check_does_not_consume_nonce() {
    let (provider, store) = setup();
    let assertion = authenticate(&provider, None);
    let nonce = arg(&assertion, "response_nonce");

    let mut forged = assertion.clone();
    forged.set_openid_arg("assoc_handle", "forged-handle");
    forged.set_openid_arg("sig", "Zm9yZ2Vk");
    let result = check_authentication(&provider, &forged).unwrap();
    assert_eq!(arg(&result, "is_valid"), "false");
    assert!(!store.is_known_nonce(&nonce).unwrap());

    let result = check_authentication(&provider, &assertion).unwrap();
    assert_eq!(arg(&result, "is_valid"), "true");
    assert!(store.is_known_nonce(&nonce).unwrap());
}

#[test]
fn test_tampered_assertion_is_invalid() {
    let (provider, store) = setup();
    let mut assertion = authenticate(&provider, None);
    let handle = arg(&assertion, "assoc_handle");
    assertion.set_openid_arg("identity", "https://op.example.com/mallory");

    let result = check_authentication(&provider, &assertion).unwrap();
    assert_eq!(arg(&result, "is_valid"), "false");
    assert_eq!(arg(&result, "invalidate_handle"), handle);
    assert!(store.get_association(&handle, true).is_err());
}

#[test]
fn test_stateful_assertion_verifies_at_relying_party() {
    let (provider, _store) = setup();
    let associated = respond(
        &provider,
        &[
            ("openid.ns", ns::OPENID20),
            ("openid.mode", "associate"),
            ("openid.assoc_type", "HMAC-SHA1"),
            ("openid.session_type", "no-encryption"),
        ],
    )
    .unwrap()
    .into_message();
    let handle = arg(&associated, "assoc_handle");
    let secret = base64_decode(&arg(&associated, "mac_key")).unwrap();

    let assertion = authenticate(&provider, Some(&handle));
    assert_eq!(arg(&assertion, "assoc_handle"), handle);
    assert!(assertion.openid_arg("invalidate_handle").is_none());

    let rp_copy = Association::new(
        AssocType::HmacSha1,
        handle,
        secret,
        Utc::now() + Duration::hours(1),
        false,
    )
    .unwrap();
    let signed: Vec<String> = arg(&assertion, "signed").split(',').map(str::to_owned).collect();
    assert_eq!(
        signed,
        ["op_endpoint", "return_to", "response_nonce", "assoc_handle", "claimed_id", "identity"]
    );
    assert!(rp_copy
        .verify(&assertion, &signed, &arg(&assertion, "sig"))
        .unwrap());
}

#[test]
fn test_unknown_handle_is_echoed_back() {
    let (provider, _store) = setup();
    let assertion = authenticate(&provider, Some("expired-handle"));
    assert_eq!(arg(&assertion, "invalidate_handle"), "expired-handle");
    assert_ne!(arg(&assertion, "assoc_handle"), "expired-handle");

    let result = check_authentication(&provider, &assertion).unwrap();
    assert_eq!(arg(&result, "is_valid"), "true");
    assert_eq!(arg(&result, "invalidate_handle"), "expired-handle");
}

#[test]
fn test_immediate_reject_needs_setup() {
    let (provider, _store) = setup();
    let response = respond(
        &provider,
        &[
            ("openid.ns", ns::OPENID20),
            ("openid.mode", "checkid_immediate"),
            ("openid.identity", ns::IDENTIFIER_SELECT),
            ("openid.claimed_id", ns::IDENTIFIER_SELECT),
            ("openid.return_to", RETURN_TO),
        ],
    )
    .unwrap();

    let msg = response.message();
    assert_eq!(arg(msg, "mode"), "setup_needed");
    let setup_url = arg(msg, "user_setup_url");
    let (endpoint, query) = setup_url.split_once('?').unwrap();
    assert_eq!(endpoint, ENDPOINT);

    let setup = Message::from_query_string(query).unwrap();
    assert_eq!(arg(&setup, "mode"), "checkid_setup");
    assert_eq!(arg(&setup, "return_to"), RETURN_TO);
    assert_eq!(arg(&setup, "identity"), ns::IDENTIFIER_SELECT);
}

#[test]
fn test_check_authentication_requires_openid2() {
    let (provider, _store) = setup();
    let r = respond(
        &provider,
        &[
            ("openid.ns", ns::OPENID11),
            ("openid.mode", "check_authentication"),
            ("openid.assoc_handle", "h"),
            ("openid.signed", "return_to"),
            ("openid.sig", "c2ln"),
            ("openid.response_nonce", "n"),
        ],
    );
    assert!(matches!(r, Err(Error::InvalidCheckAuthenticationRequest(_))));
}
