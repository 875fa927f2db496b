use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
    Method,
    RequestBuilder,
    Response,
};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::OnceCell;

use crate::{
    config::SumUpConfig,
    data_objects::{
        CheckoutAmount,
        CreateReader,
        CreateReaderCheckout,
        MerchantAccount,
        ReaderCheckoutResponse,
        ReaderList,
        SumUpReader,
    },
    SumUpApiError,
};

#[derive(Clone)]
pub struct SumUpApi {
    config: SumUpConfig,
    client: Arc<Client>,
    merchant_code: Arc<OnceCell<String>>,
}

impl SumUpApi {
    pub fn new(config: SumUpConfig) -> Result<Self, SumUpApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let mut val = HeaderValue::from_str(&format!("Bearer {}", config.api_key.reveal()))
            .map_err(|e| SumUpApiError::Initialization(e.to_string()))?;
        val.set_sensitive(true);
        headers.insert(AUTHORIZATION, val);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| SumUpApiError::Initialization(e.to_string()))?;
        let merchant_code = match &config.merchant_code {
            Some(code) => OnceCell::new_with(Some(code.clone())),
            None => OnceCell::new(),
        };
        Ok(Self { config, client: Arc::new(client), merchant_code: Arc::new(merchant_code) })
    }

    pub fn config(&self) -> &SumUpConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_url.trim_end_matches('/'))
    }

    fn request<B: Serialize>(&self, method: Method, path: &str, body: Option<B>) -> RequestBuilder {
        let url = self.url(path);
        trace!("💳️ Sending REST query: {method} {url}");
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        req
    }

    async fn check_status(response: Response) -> Result<Response, SumUpApiError> {
        if response.status().is_success() {
            trace!("💳️ REST query successful. {}", response.status());
            Ok(response)
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| SumUpApiError::RestResponseError(e.to_string()))?;
            Err(SumUpApiError::QueryError { status, message })
        }
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, SumUpApiError> {
        let response = self
            .request(method, path, body)
            .send()
            .await
            .map_err(|e| SumUpApiError::RestResponseError(e.to_string()))?;
        let response = Self::check_status(response).await?;
        response.json::<T>().await.map_err(|e| SumUpApiError::JsonError(e.to_string()))
    }

    /// Like [`rest_query`](Self::rest_query), for endpoints that answer with an empty body.
    pub async fn rest_command<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<(), SumUpApiError> {
        let response = self
            .request(method, path, body)
            .send()
            .await
            .map_err(|e| SumUpApiError::RestResponseError(e.to_string()))?;
        Self::check_status(response).await?;
        Ok(())
    }

    /// The merchant code from the configuration, or else the one attached to the API key's account. The lookup
    /// happens at most once.
    pub async fn merchant_code(&self) -> Result<String, SumUpApiError> {
        let code = self
            .merchant_code
            .get_or_try_init(|| async {
                debug!("💳️ Fetching the merchant code for this API key");
                let account = self.rest_query::<MerchantAccount, ()>(Method::GET, "/v0.1/me", None).await?;
                let code = account
                    .merchant_profile
                    .and_then(|p| p.merchant_code)
                    .filter(|c| !c.is_empty())
                    .ok_or(SumUpApiError::MissingMerchantCode)?;
                info!("💳️ Using SumUp merchant code {code}");
                Ok::<_, SumUpApiError>(code)
            })
            .await?;
        Ok(code.clone())
    }

    async fn readers_path(&self) -> Result<String, SumUpApiError> {
        let code = self.merchant_code().await?;
        Ok(format!("/v0.1/merchants/{code}/readers"))
    }

    pub async fn list_readers(&self) -> Result<Vec<SumUpReader>, SumUpApiError> {
        let path = self.readers_path().await?;
        let result = self.rest_query::<ReaderList, ()>(Method::GET, &path, None).await?;
        debug!("💳️ Fetched {} readers", result.items.len());
        Ok(result.items)
    }

    pub async fn create_reader(&self, name: &str, pairing_code: &str) -> Result<SumUpReader, SumUpApiError> {
        let path = self.readers_path().await?;
        let body = CreateReader { pairing_code: pairing_code.to_string(), name: name.to_string() };
        let reader = self.rest_query::<SumUpReader, _>(Method::POST, &path, Some(body)).await?;
        info!("💳️ Created reader {} ({})", reader.id, reader.name);
        Ok(reader)
    }

    pub async fn get_reader(&self, reader_id: &str) -> Result<SumUpReader, SumUpApiError> {
        let path = format!("{}/{reader_id}", self.readers_path().await?);
        let reader = self.rest_query::<SumUpReader, ()>(Method::GET, &path, None).await?;
        trace!("💳️ Reader {reader_id} is {}", reader.status);
        Ok(reader)
    }

    pub async fn delete_reader(&self, reader_id: &str) -> Result<(), SumUpApiError> {
        let path = format!("{}/{reader_id}", self.readers_path().await?);
        self.rest_command::<()>(Method::DELETE, &path, None).await?;
        info!("💳️ Deleted reader {reader_id}");
        Ok(())
    }

    /// Starts a checkout on the given reader and returns the client transaction id that SumUp will quote in its
    /// callbacks.
    pub async fn start_checkout(
        &self,
        reader_id: &str,
        amount: i64,
        description: &str,
    ) -> Result<String, SumUpApiError> {
        let path = format!("{}/{reader_id}/checkout", self.readers_path().await?);
        let body = CreateReaderCheckout {
            description: description.to_string(),
            return_url: self.config.return_url.clone(),
            total_amount: CheckoutAmount::in_minor_units(amount),
        };
        let response = self.rest_query::<ReaderCheckoutResponse, _>(Method::POST, &path, Some(body)).await?;
        let reference = response.data.client_transaction_id;
        info!("💳️ Started checkout {reference} for {amount} on reader {reader_id}");
        Ok(reference)
    }

    pub async fn terminate_checkout(&self, reader_id: &str) -> Result<(), SumUpApiError> {
        let path = format!("{}/{reader_id}/terminate", self.readers_path().await?);
        self.rest_command::<()>(Method::POST, &path, None).await?;
        info!("💳️ Terminated the checkout on reader {reader_id}");
        Ok(())
    }
}
