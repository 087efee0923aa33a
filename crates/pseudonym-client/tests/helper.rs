//! Helper tests: domain caching, secret-key unwrap and JWKS refresh,
//! driven by an in-process mock of the service and keystore.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use async_trait::async_trait;
use serde_json::json;

use pseudonym_client::{HelperError, JwksSupplier, PseudonymisationHelper};
use pseudonym_core::{ClientError, ClientResult, PseudonymisationClient};
use pseudonym_jose::b64;

const JKU: &str = "https://me.example.org/jwks";
const CEK: [u8; 32] = [0x11; 32];
const DOMAIN_KEY_BYTES: [u8; 32] = [0x42; 32];
const THUMBPRINT: &str = "sha256-thumbprint-of-my-cert";

/// Wrap the domain key (an inner oct JWK) for our recipient with `dir`.
fn encoded_secret_key() -> serde_json::Value {
    let inner_jwk = json!({
        "kty": "oct",
        "alg": "A256GCM",
        "k": b64::encode(DOMAIN_KEY_BYTES),
    })
    .to_string();

    let protected = b64::encode(br#"{"enc":"A256GCM"}"#);
    let iv = [9u8; 12];
    let cipher = Aes256Gcm::new_from_slice(&CEK).unwrap();
    let mut sealed = cipher
        .encrypt(
            Nonce::from_slice(&iv),
            Payload {
                msg: inner_jwk.as_bytes(),
                aad: protected.as_bytes(),
            },
        )
        .unwrap();
    let tag = sealed.split_off(sealed.len() - 16);

    json!({
        "protected": protected,
        "iv": b64::encode(iv),
        "ciphertext": b64::encode(&sealed),
        "tag": b64::encode(&tag),
        "recipients": [
            { "header": { "jku": "https://other.example.org/jwks", "alg": "RSA-OAEP-256", "kid": "not-us" },
              "encrypted_key": "AAAA" },
            { "header": { "jku": JKU, "alg": "dir", "kid": "my-key-1" } }
        ]
    })
}

fn domain_descriptor() -> String {
    json!({
        "domain": "uhmep_v1",
        "crv": "P-521",
        "bufferSize": 8,
        "audience": "https://api.example.org/pseudo/v1/domains/uhmep_v1",
        "jku": [JKU],
        "timeToLiveInTransit": "PT10M",
        "secretKeys": [
            { "kid": "2024-01", "active": true, "encoded": encoded_secret_key() }
        ]
    })
    .to_string()
}

struct MockClient {
    get_domain_calls: AtomicUsize,
}

impl MockClient {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            get_domain_calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl PseudonymisationClient for MockClient {
    async fn get_domain(&self, domain_key: &str) -> ClientResult<String> {
        self.get_domain_calls.fetch_add(1, Ordering::SeqCst);
        if domain_key == "uhmep_v1" {
            Ok(domain_descriptor())
        } else {
            Err(ClientError::Status {
                status: 404,
                body: format!("unknown domain {domain_key}"),
            })
        }
    }

    async fn identify(&self, _: &str, _: &str) -> ClientResult<String> {
        Err(ClientError::Transport("not implemented".into()))
    }
    async fn identify_multiple(&self, _: &str, _: &str) -> ClientResult<String> {
        Err(ClientError::Transport("not implemented".into()))
    }
    async fn pseudonymize(&self, _: &str, _: &str) -> ClientResult<String> {
        Err(ClientError::Transport("not implemented".into()))
    }
    async fn pseudonymize_multiple(&self, _: &str, _: &str) -> ClientResult<String> {
        Err(ClientError::Transport("not implemented".into()))
    }
    async fn convert_to(&self, _: &str, _: &str, _: &str) -> ClientResult<String> {
        Err(ClientError::Transport("not implemented".into()))
    }
    async fn convert_multiple_to(&self, _: &str, _: &str, _: &str) -> ClientResult<String> {
        Err(ClientError::Transport("not implemented".into()))
    }
}

/// JWKS with our recipient key, counting fetches.
struct MockJwks {
    calls: AtomicUsize,
    include_key: bool,
}

#[async_trait]
impl JwksSupplier for MockJwks {
    async fn fetch_jwks(&self) -> Result<String, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let keys = if self.include_key {
            json!([{ "kty": "oct", "kid": "my-key-1", "x5t#S256": THUMBPRINT }])
        } else {
            json!([])
        };
        Ok(json!({ "keys": keys }).to_string())
    }
}

fn helper_with(client: Arc<MockClient>, jwks: Arc<MockJwks>) -> PseudonymisationHelper {
    PseudonymisationHelper::builder()
        .jwks_url(JKU)
        .jwks_supplier(jwks)
        .private_key_supplier(|thumbprint| {
            (thumbprint == THUMBPRINT)
                .then(|| json!({ "kty": "oct", "k": b64::encode(CEK) }).to_string())
        })
        .client(client)
        .build()
        .unwrap()
}

#[tokio::test]
async fn get_domain_fetches_once_and_caches() {
    let client = MockClient::new();
    let jwks = Arc::new(MockJwks {
        calls: AtomicUsize::new(0),
        include_key: true,
    });
    let helper = helper_with(Arc::clone(&client), jwks);

    let domain = helper.get_domain("uhmep_v1").await.unwrap();
    assert_eq!(domain.key(), "uhmep_v1");
    assert_eq!(domain.buffer_size(), 8);
    assert_eq!(
        domain.audience(),
        Some("https://api.example.org/pseudo/v1/domains/uhmep_v1")
    );
    assert_eq!(domain.in_transit_ttl(), Some(chrono::Duration::minutes(10)));
    assert_eq!(domain.active_kid(), Some("2024-01"));

    let again = helper.get_domain("uhmep_v1").await.unwrap();
    assert!(domain.same_instance(&again));
    assert_eq!(client.get_domain_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn refresh_domain_replaces_the_cached_instance() {
    let client = MockClient::new();
    let jwks = Arc::new(MockJwks {
        calls: AtomicUsize::new(0),
        include_key: true,
    });
    let helper = helper_with(Arc::clone(&client), jwks);

    let first = helper.get_domain("uhmep_v1").await.unwrap();
    helper.refresh_domain("uhmep_v1").await.unwrap();
    let second = helper.get_domain("uhmep_v1").await.unwrap();

    assert!(!first.same_instance(&second));
    assert_eq!(client.get_domain_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unwrapped_secret_key_encrypts_and_decrypts_transit_info() {
    let client = MockClient::new();
    let jwks = Arc::new(MockJwks {
        calls: AtomicUsize::new(0),
        include_key: true,
    });
    let helper = helper_with(client, jwks);

    let domain = helper.get_domain("uhmep_v1").await.unwrap();
    let pseudonym = domain
        .values()
        .from_string("79021802145")
        .unwrap()
        .as_pseudonym();

    // Full round trip through a transit info proves the key bytes survived
    // distribution: blind, serialize, reparse, unblind.
    let wire = pseudonym.in_transit().unwrap().as_string();
    let received = domain
        .pseudonyms_in_transit()
        .from_sec1_and_transit_info(&wire)
        .unwrap();
    let at_rest = received.at_rest().unwrap();
    assert_eq!(at_rest.as_value().as_string().unwrap(), "79021802145");
}

#[tokio::test]
async fn jwks_is_fetched_lazily_and_only_on_miss() {
    let client = MockClient::new();
    let jwks = Arc::new(MockJwks {
        calls: AtomicUsize::new(0),
        include_key: true,
    });
    let helper = helper_with(client, Arc::clone(&jwks));

    helper.get_domain("uhmep_v1").await.unwrap();
    // One refresh populated the initially empty JWKS cache.
    assert_eq!(jwks.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn missing_kid_fails_after_one_jwks_refresh() {
    let client = MockClient::new();
    let jwks = Arc::new(MockJwks {
        calls: AtomicUsize::new(0),
        include_key: false,
    });
    let helper = helper_with(client, Arc::clone(&jwks));

    let err = helper.get_domain("uhmep_v1").await.unwrap_err();
    assert!(matches!(err, HelperError::Domain(_)));
    // The refresh-on-miss was attempted exactly once.
    assert_eq!(jwks.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn refreshable_domains_lists_domains_with_our_jku() {
    let client = MockClient::new();
    let jwks = Arc::new(MockJwks {
        calls: AtomicUsize::new(0),
        include_key: true,
    });
    let helper = helper_with(client, jwks);

    assert!(helper.refreshable_domains().await.is_empty());
    helper.get_domain("uhmep_v1").await.unwrap();
    assert!(helper.refreshable_domains().await.contains("uhmep_v1"));
}

#[tokio::test]
async fn unknown_domain_propagates_the_service_error() {
    let client = MockClient::new();
    let jwks = Arc::new(MockJwks {
        calls: AtomicUsize::new(0),
        include_key: true,
    });
    let helper = helper_with(client, jwks);

    assert!(matches!(
        helper.get_domain("nope").await.unwrap_err(),
        HelperError::Client(ClientError::Status { status: 404, .. })
    ));
}
