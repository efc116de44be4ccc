use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::GatewayConfig,
    data_objects::{GatewayOrder, NewGatewayOrder},
    GatewayApiError,
};

#[derive(Clone)]
pub struct GatewayApi {
    config: GatewayConfig,
    client: Arc<Client>,
}

impl GatewayApi {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, GatewayApiError> {
        let url = self.url(path);
        trace!("Sending REST query: {url}");
        let mut req = self
            .client
            .request(method, url)
            .basic_auth(&self.config.key_id, Some(self.config.key_secret.reveal().as_str()));
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayApiError::Timeout(self.config.timeout.as_secs())
            } else {
                GatewayApiError::RestResponseError(e.to_string())
            }
        })?;
        if response.status().is_success() {
            trace!("REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| GatewayApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| GatewayApiError::RestResponseError(e.to_string()))?;
            Err(GatewayApiError::QueryError { status, message })
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    /// Registers a new payment intent with the gateway. The returned `id` is the gateway order id that the buyer's
    /// checkout is opened against.
    pub async fn create_order(&self, order: &NewGatewayOrder) -> Result<GatewayOrder, GatewayApiError> {
        if order.amount <= 0 {
            return Err(GatewayApiError::InvalidCurrencyAmount(order.amount.to_string()));
        }
        debug!("Creating gateway order for receipt {} ({} {})", order.receipt, order.amount, order.currency);
        let result = self.rest_query::<GatewayOrder, _>(Method::POST, "/v1/orders", Some(order)).await?;
        info!("Gateway order {} created for receipt {}", result.id, order.receipt);
        Ok(result)
    }

    pub async fn fetch_order(&self, gateway_order_id: &str) -> Result<GatewayOrder, GatewayApiError> {
        let path = format!("/v1/orders/{gateway_order_id}");
        self.rest_query::<GatewayOrder, ()>(Method::GET, &path, None).await
    }
}
