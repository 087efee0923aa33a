//! Domain cache, JWKS handling and secret-key unwrap.
//!
//! Domains are fetched once and cached by key; a single refresh is in
//! flight at any time and a refresh replaces the cached `Domain` handle
//! atomically, so readers never observe a half-built domain.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::error::{HelperError, HelperResult};
use pseudonym_core::{ContentEncryption, Domain, PseudonymisationClient, SecretKey};
use pseudonym_jose::{Jwk, JwkSet, MultiRecipientJwe};

/// Supplies the JWKS document published for this client.
///
/// Called on construction and again whenever an unknown key id shows up.
/// Do not cache inside the supplier if you want rotation to be picked up.
#[async_trait]
pub trait JwksSupplier: Send + Sync {
    async fn fetch_jwks(&self) -> Result<String, String>;
}

/// Resolves a private JWK (as JSON) from its certificate's SHA-256
/// thumbprint (`x5t#S256`).
pub type PrivateKeySupplier = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// The domain descriptor as served by `GET /pseudo/v1/domains/{key}`.
#[derive(Deserialize)]
struct DomainDescriptor {
    domain: String,
    crv: String,
    #[serde(rename = "bufferSize")]
    buffer_size: usize,
    #[serde(default)]
    audience: Option<String>,
    #[serde(default)]
    jku: Vec<String>,
    #[serde(rename = "timeToLiveInTransit")]
    time_to_live_in_transit: String,
    #[serde(rename = "secretKeys", default)]
    secret_keys: Vec<SecretKeyEntry>,
}

#[derive(Deserialize)]
struct SecretKeyEntry {
    kid: String,
    #[serde(default)]
    active: bool,
    encoded: MultiRecipientJwe,
}

pub struct PseudonymisationHelper {
    jwks_url: Option<String>,
    jwks_supplier: Option<Arc<dyn JwksSupplier>>,
    private_key_supplier: Option<PrivateKeySupplier>,
    client: Arc<dyn PseudonymisationClient>,
    domains: RwLock<HashMap<String, Domain>>,
    jwks: RwLock<Option<JwkSet>>,
    /// Domains whose secret keys were unwrapped with our jku; callers can
    /// schedule periodic refreshes for exactly these.
    refreshable: RwLock<HashSet<String>>,
    /// One domain refresh in flight at a time.
    refresh_lock: Mutex<()>,
}

impl PseudonymisationHelper {
    pub fn builder() -> PseudonymisationHelperBuilder {
        PseudonymisationHelperBuilder::default()
    }

    /// Get the domain for the given key, fetching it on first use.
    ///
    /// Concurrent misses on the same key collapse into one fetch.
    pub async fn get_domain(&self, domain_key: &str) -> HelperResult<Domain> {
        if let Some(domain) = self.domains.read().await.get(domain_key) {
            return Ok(domain.clone());
        }

        let _guard = self.refresh_lock.lock().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(domain) = self.domains.read().await.get(domain_key) {
            return Ok(domain.clone());
        }
        self.fetch_and_store(domain_key).await
    }

    /// Refetch the domain descriptor and atomically replace the cache entry.
    pub async fn refresh_domain(&self, domain_key: &str) -> HelperResult<()> {
        let _guard = self.refresh_lock.lock().await;
        self.fetch_and_store(domain_key).await?;
        Ok(())
    }

    /// Refetch the JWKS through the configured supplier.
    pub async fn refresh_jwks(&self) -> HelperResult<()> {
        let supplier = self
            .jwks_supplier
            .as_ref()
            .ok_or(HelperError::MissingJwksSupplier)?;
        let json = supplier.fetch_jwks().await.map_err(HelperError::Jwks)?;
        let set = JwkSet::from_json(&json)?;
        debug!(keys = set.keys.len(), "refreshed JWKS");
        *self.jwks.write().await = Some(set);
        Ok(())
    }

    /// Domain keys whose secret keys this client can decrypt.
    pub async fn refreshable_domains(&self) -> HashSet<String> {
        self.refreshable.read().await.clone()
    }

    async fn fetch_and_store(&self, domain_key: &str) -> HelperResult<Domain> {
        debug!(domain_key, "fetching domain descriptor");
        let raw = self.client.get_domain(domain_key).await?;
        let domain = self.create_domain(&raw).await?;
        let key = domain.key().to_string();
        self.domains
            .write()
            .await
            .insert(key, domain.clone());
        Ok(domain)
    }

    async fn create_domain(&self, raw_domain: &str) -> HelperResult<Domain> {
        let descriptor: DomainDescriptor = serde_json::from_str(raw_domain)
            .map_err(|e| HelperError::Domain(format!("malformed descriptor: {e}")))?;
        let ttl = parse_iso8601_duration(&descriptor.time_to_live_in_transit).ok_or_else(
            || {
                HelperError::Domain(format!(
                    "invalid timeToLiveInTransit `{}`",
                    descriptor.time_to_live_in_transit
                ))
            },
        )?;

        let mut builder = Domain::builder(&descriptor.domain)
            .crv(&descriptor.crv)
            .buffer_size(descriptor.buffer_size)
            .in_transit_ttl(ttl)
            .client(Arc::clone(&self.client));
        if let Some(audience) = &descriptor.audience {
            builder = builder.audience(audience);
        }

        // Secret keys are only decryptable when this client's jku is among
        // the domain's recipients.
        let known_jku = self
            .jwks_url
            .as_deref()
            .filter(|jku| {
                self.jwks_supplier.is_some() && descriptor.jku.iter().any(|j| j.as_str() == *jku)
            })
            .map(str::to_string);

        let mut has_active_kid = false;
        if let Some(jku) = &known_jku {
            for entry in &descriptor.secret_keys {
                match self.unwrap_secret_key(entry, jku, &descriptor.domain).await {
                    Ok(Some((secret_key, encryption))) => {
                        builder = builder.secret_key(&entry.kid, secret_key);
                        if entry.active {
                            builder = builder
                                .active_kid(&entry.kid)
                                .active_encryption(encryption);
                            has_active_kid = true;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        error!(kid = %entry.kid, error = %e, "failed to unwrap domain secret key");
                        return Err(e);
                    }
                }
            }
            if !has_active_kid {
                return Err(HelperError::Domain(format!(
                    "no decryptable secret key of domain `{}` carries the active flag",
                    descriptor.domain
                )));
            }
        } else {
            warn!(
                domain_key = %descriptor.domain,
                "this client's jku is not a recipient of the domain's secret keys; \
                 transit info cannot be created or decrypted for this domain"
            );
        }

        let domain = builder.build()?;
        if known_jku.is_some() {
            self.refreshable
                .write()
                .await
                .insert(descriptor.domain.clone());
        }
        Ok(domain)
    }

    /// Unwrap one distributed secret key.
    ///
    /// Returns `Ok(None)` when the entry is not addressed to us (no
    /// recipient with our jku, or the recipient's public key is missing
    /// from the JWKS even after a refresh).
    async fn unwrap_secret_key(
        &self,
        entry: &SecretKeyEntry,
        jku: &str,
        domain_key: &str,
    ) -> HelperResult<Option<(SecretKey, ContentEncryption)>> {
        let Some(my_kid) = entry
            .encoded
            .recipients_with_jku(jku)
            .find_map(|r| r.header.kid.clone())
        else {
            return Ok(None);
        };

        let Some(public_jwk) = self.jwk_for_kid(&my_kid, domain_key).await? else {
            return Ok(None);
        };
        let thumbprint = public_jwk.x5t_s256.as_deref().ok_or_else(|| {
            HelperError::Jwks(format!("JWKS key `{my_kid}` carries no x5t#S256 thumbprint"))
        })?;

        let private_key_supplier = self
            .private_key_supplier
            .as_ref()
            .ok_or(HelperError::MissingPrivateKeySupplier)?;
        let private_jwk_json = private_key_supplier(thumbprint)
            .ok_or_else(|| HelperError::MissingPrivateKey(thumbprint.to_string()))?;
        let private_jwk = Jwk::from_json(&private_jwk_json)?;

        let payload = entry.encoded.decrypt(&private_jwk, &my_kid)?;
        let inner: Jwk = serde_json::from_slice(&payload)
            .map_err(|e| HelperError::Domain(format!("decrypted secret key is not a JWK: {e}")))?;

        let encryption: ContentEncryption = inner
            .alg
            .as_deref()
            .ok_or_else(|| HelperError::Domain("secret-key JWK carries no `alg`".into()))?
            .parse()?;
        let secret_key = SecretKey::new(inner.symmetric_key()?)
            .map_err(HelperError::Core)?;

        debug!(kid = %entry.kid, domain_key, "registered domain secret key");
        Ok(Some((secret_key, encryption)))
    }

    /// Look up a public JWK by kid, refreshing the JWKS once on a miss.
    async fn jwk_for_kid(&self, kid: &str, domain_key: &str) -> HelperResult<Option<Jwk>> {
        if let Some(jwk) = self.find_jwk(kid).await {
            return Ok(Some(jwk));
        }

        self.refresh_jwks().await?;
        if let Some(jwk) = self.find_jwk(kid).await {
            return Ok(Some(jwk));
        }

        error!(
            kid,
            jwks_url = self.jwks_url.as_deref().unwrap_or_default(),
            domain_key,
            "kid not present in the JWKS: impossible to encrypt/decrypt transit info of this domain"
        );
        Ok(None)
    }

    async fn find_jwk(&self, kid: &str) -> Option<Jwk> {
        self.jwks
            .read()
            .await
            .as_ref()
            .and_then(|set| set.find(kid))
            .cloned()
    }
}

#[derive(Default)]
pub struct PseudonymisationHelperBuilder {
    jwks_url: Option<String>,
    jwks_supplier: Option<Arc<dyn JwksSupplier>>,
    private_key_supplier: Option<PrivateKeySupplier>,
    client: Option<Arc<dyn PseudonymisationClient>>,
}

impl PseudonymisationHelperBuilder {
    /// The URL this client's JWKS is published at; it is matched against
    /// the `jku` list of each domain descriptor.
    pub fn jwks_url(mut self, jwks_url: impl Into<String>) -> Self {
        self.jwks_url = Some(jwks_url.into());
        self
    }

    pub fn jwks_supplier(mut self, supplier: Arc<dyn JwksSupplier>) -> Self {
        self.jwks_supplier = Some(supplier);
        self
    }

    pub fn private_key_supplier(
        mut self,
        supplier: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.private_key_supplier = Some(Arc::new(supplier));
        self
    }

    pub fn client(mut self, client: Arc<dyn PseudonymisationClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn build(self) -> HelperResult<PseudonymisationHelper> {
        let client = self
            .client
            .ok_or_else(|| HelperError::Domain("a pseudonymisation client is required".into()))?;

        if self.jwks_url.is_none() {
            info!("no jwks_url: this helper will not be able to encrypt or decrypt transit info");
        }
        if self.jwks_supplier.is_none() {
            info!("no jwks_supplier: this helper will not be able to encrypt or decrypt transit info");
        }

        Ok(PseudonymisationHelper {
            jwks_url: self.jwks_url,
            jwks_supplier: self.jwks_supplier,
            private_key_supplier: self.private_key_supplier,
            client,
            domains: RwLock::new(HashMap::new()),
            jwks: RwLock::new(None),
            refreshable: RwLock::new(HashSet::new()),
            refresh_lock: Mutex::new(()),
        })
    }
}

/// Parse the ISO-8601 durations the service emits (`PT10M`, `P1DT2H`, …).
///
/// Year and month designators are rejected: they have no fixed length and
/// the service never uses them.
fn parse_iso8601_duration(input: &str) -> Option<Duration> {
    let rest = input.strip_prefix('P')?;
    if rest.is_empty() {
        return None;
    }

    let (date_part, time_part) = match rest.split_once('T') {
        Some((date, time)) if !time.is_empty() => (date, time),
        Some(_) => return None,
        None => (rest, ""),
    };

    let mut seconds: i64 = 0;
    let mut number = String::new();
    for c in date_part.chars() {
        if c.is_ascii_digit() {
            number.push(c);
        } else {
            let n: i64 = number.parse().ok()?;
            number.clear();
            seconds += match c {
                'W' => n.checked_mul(7 * 86_400)?,
                'D' => n.checked_mul(86_400)?,
                _ => return None,
            };
        }
    }
    if !number.is_empty() {
        return None;
    }

    for c in time_part.chars() {
        if c.is_ascii_digit() {
            number.push(c);
        } else {
            let n: i64 = number.parse().ok()?;
            number.clear();
            seconds += match c {
                'H' => n.checked_mul(3_600)?,
                'M' => n.checked_mul(60)?,
                'S' => n,
                _ => return None,
            };
        }
    }
    if !number.is_empty() {
        return None;
    }

    Some(Duration::seconds(seconds))
}
