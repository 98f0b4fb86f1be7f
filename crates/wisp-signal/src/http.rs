use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder};
use url::Url;

/// HTTP side of the signaling exchange. Every request is sent exactly once;
/// there is no retry layer.
#[derive(Debug, Clone)]
pub struct SignalingHttp {
    client: Client,
    auth_token: Option<String>,
}

impl SignalingHttp {
    pub fn new(auth_token: Option<String>) -> Self {
        Self::with_client(Client::new(), auth_token)
    }

    pub fn with_client(client: Client, auth_token: Option<String>) -> Self {
        Self { client, auth_token }
    }

    fn request(&self, method: Method, url: &Url) -> RequestBuilder {
        let builder = self.client.request(method, url.clone());
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    pub fn post(&self, url: &Url, content_type: &str, body: String) -> RequestBuilder {
        self.request(Method::POST, url)
            .header(CONTENT_TYPE, content_type)
            .body(body)
    }

    pub fn patch(&self, url: &Url, content_type: &str, body: String) -> RequestBuilder {
        self.request(Method::PATCH, url)
            .header(CONTENT_TYPE, content_type)
            .body(body)
    }

    pub fn delete(&self, url: &Url) -> RequestBuilder {
        self.request(Method::DELETE, url)
    }
}
