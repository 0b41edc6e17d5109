//! Order-management backend REST adapter.
//!
//! Endpoints used:
//!
//! ```text
//! GET   {base}/pedidos/vendas?idsSituacoes[]={status}&pagina={n}&limite={size}
//! GET   {base}/pedidos/vendas/{id}
//! PATCH {base}/pedidos/vendas/{id}/situacoes/{status}      (dedicated)
//! PATCH {base}/pedidos/vendas/{id}  {"situacao":{"id":…}}  (generic)
//! POST  {oauth_token_url}  grant_type=authorization_code   (Basic client auth)
//! ```

use std::fmt;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use pickup_core::{
    AccessToken, CrossReferences, RemoteError, RemoteSystem, SourceOrder, SourceOrderId,
    SourceSettings, SourceSystem, StatusCode, StoreId, WritebackEndpoint,
};

use crate::http::{build_agent, decode_err, join_url, map_ureq_error};

const SYSTEM: RemoteSystem = RemoteSystem::Source;

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ListEnvelope {
    /// Decoded record by record so one malformed order cannot hide the rest.
    #[serde(default)]
    data: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct SingleEnvelope {
    data: OrderRecord,
}

#[derive(Debug, Deserialize)]
struct OrderRecord {
    id: u64,
    #[serde(default)]
    numero: Option<Value>,
    #[serde(default, rename = "numeroLoja")]
    numero_loja: Option<Value>,
    situacao: Situacao,
    #[serde(default)]
    loja: Option<Loja>,
}

#[derive(Debug, Deserialize)]
struct Situacao {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct Loja {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default, rename = "idLojaProduto")]
    id_loja_produto: Option<Value>,
}

impl OrderRecord {
    fn into_source_order(self) -> SourceOrder {
        let number = self.numero.as_ref().and_then(value_as_u64);
        let (store_id, store_scoped_id) = match self.loja {
            Some(loja) => (
                loja.id.filter(|id| *id != 0).map(StoreId),
                loja.id_loja_produto.as_ref().and_then(value_as_id),
            ),
            None => (None, None),
        };
        SourceOrder {
            id: SourceOrderId(self.id),
            number,
            status: StatusCode(self.situacao.id),
            store_id,
            cross_references: CrossReferences {
                store_order_number: self.numero_loja.as_ref().and_then(value_as_id),
                store_scoped_id,
                order_number: self.numero.as_ref().and_then(value_as_id),
            },
        }
    }
}

/// Identifier fields arrive as strings or numbers; blank strings and zero count as absent.
fn value_as_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) if n.as_u64() != Some(0) => Some(n.to_string()),
        _ => None,
    }
}

fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// SourceClient
// ---------------------------------------------------------------------------

/// REST client for the order-management backend.
pub struct SourceClient {
    agent: ureq::Agent,
    settings: SourceSettings,
}

impl SourceClient {
    pub fn new(settings: SourceSettings, timeout: Duration) -> Self {
        Self {
            agent: build_agent(timeout),
            settings,
        }
    }

    fn orders_url(&self) -> String {
        join_url(&self.settings.base_url, "pedidos/vendas")
    }

    fn order_url(&self, id: SourceOrderId) -> String {
        join_url(&self.settings.base_url, &format!("pedidos/vendas/{id}"))
    }

    /// One page of the listing. The second value is the raw record count,
    /// which decides whether another page follows.
    fn list_page(
        &self,
        token: &AccessToken,
        status: StatusCode,
        page: u32,
    ) -> Result<(Vec<SourceOrder>, usize), RemoteError> {
        let response = self
            .agent
            .get(&self.orders_url())
            .set("Authorization", &bearer(token))
            .set("Accept", "application/json")
            .query("idsSituacoes[]", &status.to_string())
            .query("pagina", &page.to_string())
            .query("limite", &self.settings.page_size.to_string())
            .call()
            .map_err(|e| map_ureq_error(SYSTEM, e))?;
        let envelope: ListEnvelope = response
            .into_json()
            .map_err(|e| decode_err(SYSTEM, e))?;
        let received = envelope.data.len();
        let orders = envelope
            .data
            .into_iter()
            .filter_map(|record| {
                let id = record.get("id").cloned().unwrap_or(Value::Null);
                match serde_json::from_value::<OrderRecord>(record) {
                    Ok(record) => Some(record.into_source_order()),
                    Err(err) => {
                        tracing::warn!(
                            source_order = %id,
                            page,
                            error = %err,
                            "skipping malformed source order record",
                        );
                        None
                    }
                }
            })
            .collect();
        Ok((orders, received))
    }

    fn patch_situation(
        &self,
        token: &AccessToken,
        id: SourceOrderId,
        status: StatusCode,
    ) -> Result<(), RemoteError> {
        let url = join_url(
            &self.settings.base_url,
            &format!("pedidos/vendas/{id}/situacoes/{status}"),
        );
        self.agent
            .patch(&url)
            .set("Authorization", &bearer(token))
            .call()
            .map_err(|e| map_ureq_error(SYSTEM, e))?;
        Ok(())
    }

    fn patch_generic(
        &self,
        token: &AccessToken,
        id: SourceOrderId,
        status: StatusCode,
    ) -> Result<(), RemoteError> {
        self.agent
            .patch(&self.order_url(id))
            .set("Authorization", &bearer(token))
            .send_json(json!({ "situacao": { "id": status.0 } }))
            .map_err(|e| map_ureq_error(SYSTEM, e))?;
        Ok(())
    }
}

impl SourceSystem for SourceClient {
    fn list_orders(
        &self,
        token: &AccessToken,
        status: StatusCode,
    ) -> Result<Vec<SourceOrder>, RemoteError> {
        let mut orders = Vec::new();
        for page in 1..=self.settings.max_pages {
            let (batch, received) = self.list_page(token, status, page)?;
            let full_page = received >= self.settings.page_size as usize;
            orders.extend(batch);
            if !full_page {
                return Ok(orders);
            }
        }
        tracing::warn!(
            max_pages = self.settings.max_pages,
            fetched = orders.len(),
            "source order listing hit the page cap; remaining orders wait for a later tick",
        );
        Ok(orders)
    }

    fn get_order(
        &self,
        token: &AccessToken,
        id: SourceOrderId,
    ) -> Result<SourceOrder, RemoteError> {
        let response = self
            .agent
            .get(&self.order_url(id))
            .set("Authorization", &bearer(token))
            .set("Accept", "application/json")
            .call()
            .map_err(|e| match map_ureq_error(SYSTEM, e) {
                RemoteError::Http { status: 404, .. } => RemoteError::NotFound {
                    system: SYSTEM,
                    what: format!("order {id}"),
                },
                other => other,
            })?;
        let envelope: SingleEnvelope = response
            .into_json()
            .map_err(|e| decode_err(SYSTEM, e))?;
        Ok(envelope.data.into_source_order())
    }

    fn write_status(
        &self,
        token: &AccessToken,
        id: SourceOrderId,
        status: StatusCode,
    ) -> Result<(), RemoteError> {
        match self.settings.writeback {
            WritebackEndpoint::GenericPatch => self.patch_generic(token, id, status),
            WritebackEndpoint::Situation => match self.patch_situation(token, id, status) {
                Err(RemoteError::Http {
                    status: code @ (404 | 405),
                    ..
                }) if self.settings.writeback_fallback => {
                    tracing::debug!(
                        source_order = %id,
                        http_status = code,
                        "dedicated status endpoint rejected the call; using generic patch",
                    );
                    self.patch_generic(token, id, status)
                }
                other => other,
            },
        }
    }
}

fn bearer(token: &AccessToken) -> String {
    format!("Bearer {}", token.secret())
}

// ---------------------------------------------------------------------------
// OAuth authorization-code exchange
// ---------------------------------------------------------------------------

/// OAuth client registration, read from the environment.
#[derive(Clone)]
pub struct OAuthClient {
    pub client_id: String,
    client_secret: String,
    pub redirect_uri: Option<String>,
}

impl OAuthClient {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: Option<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri,
        }
    }

    /// `BLING_CLIENT_ID` / `BLING_CLIENT_SECRET` / optional `BLING_REDIRECT_URI`.
    pub fn from_env() -> Option<Self> {
        let client_id = std::env::var("BLING_CLIENT_ID").ok()?;
        let client_secret = std::env::var("BLING_CLIENT_SECRET").ok()?;
        let redirect_uri = std::env::var("BLING_REDIRECT_URI").ok();
        Some(Self::new(client_id, client_secret, redirect_uri))
    }

    fn basic_auth(&self) -> String {
        let raw = format!("{}:{}", self.client_id, self.client_secret);
        format!("Basic {}", BASE64.encode(raw))
    }
}

impl fmt::Debug for OAuthClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthClient")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Exchange an authorization code for a bearer token.
pub fn exchange_authorization_code(
    token_url: &str,
    client: &OAuthClient,
    code: &str,
    timeout: Duration,
) -> Result<AccessToken, RemoteError> {
    let mut form = vec![("grant_type", "authorization_code"), ("code", code)];
    if let Some(redirect_uri) = client.redirect_uri.as_deref() {
        form.push(("redirect_uri", redirect_uri));
    }

    let response = build_agent(timeout)
        .post(token_url)
        .set("Authorization", &client.basic_auth())
        .set("Accept", "application/json")
        .send_form(&form)
        .map_err(|e| map_ureq_error(SYSTEM, e))?;
    let payload: TokenResponse = response
        .into_json()
        .map_err(|e| decode_err(SYSTEM, e))?;

    let expires_at = payload
        .expires_in
        .filter(|secs| *secs > 0)
        .map(|secs| Utc::now() + chrono::Duration::seconds(secs));
    Ok(AccessToken::new(payload.access_token, expires_at))
}
