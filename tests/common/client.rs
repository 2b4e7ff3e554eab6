//! HTTP client for end-to-end tests
//!
//! Wraps reqwest and provides one method per server endpoint.
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::multipart::{Form, Part};
use reqwest::Response;
use serde_json::json;
use std::time::Duration;

/// Fields of the add and edit forms.
#[derive(Clone, Debug, Default)]
pub struct RecordForm {
    pub artist: String,
    pub album: String,
    pub genre: Option<String>,
    pub year: Option<String>,
    pub store: Option<String>,
    /// File name and content of the uploaded image
    pub image: Option<(String, Vec<u8>)>,
}

impl RecordForm {
    pub fn new(artist: &str, album: &str) -> Self {
        Self {
            artist: artist.to_string(),
            album: album.to_string(),
            ..Default::default()
        }
    }

    pub fn genre(mut self, genre: &str) -> Self {
        self.genre = Some(genre.to_string());
        self
    }

    pub fn year(mut self, year: &str) -> Self {
        self.year = Some(year.to_string());
        self
    }

    pub fn store(mut self, store: &str) -> Self {
        self.store = Some(store.to_string());
        self
    }

    pub fn image(mut self, file_name: &str, bytes: &[u8]) -> Self {
        self.image = Some((file_name.to_string(), bytes.to_vec()));
        self
    }

    fn into_multipart(self) -> Form {
        let mut form = Form::new()
            .text("artist", self.artist)
            .text("album", self.album);
        for (name, value) in [
            ("genre", self.genre),
            ("year", self.year),
            ("store", self.store),
        ] {
            if let Some(value) = value {
                form = form.text(name, value);
            }
        }
        if let Some((file_name, bytes)) = self.image {
            form = form.part("image", Part::bytes(bytes).file_name(file_name));
        }
        form
    }
}

/// HTTP test client with cookie-based session management
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    /// Creates a new unauthenticated client
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    /// Creates a client logged in as the test user
    ///
    /// # Panics
    ///
    /// Panics if authentication fails (indicates test infrastructure problem).
    pub async fn authenticated(base_url: String) -> Self {
        let client = Self::new(base_url);

        let response = client.login(TEST_USER).await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::CREATED,
            "Test user authentication failed: {:?}",
            response.text().await
        );

        client
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ========================================================================
    // Authentication Endpoints
    // ========================================================================

    /// POST /v1/auth/login
    pub async fn login(&self, handle: &str) -> Response {
        self.client
            .post(self.url("/v1/auth/login"))
            .json(&json!({ "user_handle": handle }))
            .send()
            .await
            .expect("Login request failed")
    }

    /// GET /v1/auth/logout
    pub async fn logout(&self) -> Response {
        self.client
            .get(self.url("/v1/auth/logout"))
            .send()
            .await
            .expect("Logout request failed")
    }

    /// GET /
    pub async fn get_home(&self) -> Response {
        self.client
            .get(self.url("/"))
            .send()
            .await
            .expect("Home request failed")
    }

    // ========================================================================
    // Record Endpoints
    // ========================================================================

    /// GET /v1/records with the given query parameters
    pub async fn search(&self, params: &[(&str, &str)]) -> Response {
        self.client
            .get(self.url("/v1/records"))
            .query(params)
            .send()
            .await
            .expect("Search request failed")
    }

    /// POST /v1/records
    pub async fn create_record(&self, form: RecordForm) -> Response {
        self.client
            .post(self.url("/v1/records"))
            .multipart(form.into_multipart())
            .send()
            .await
            .expect("Create record request failed")
    }

    /// POST /v1/records, asserting success and returning the record JSON
    pub async fn create_record_ok(&self, form: RecordForm) -> serde_json::Value {
        let response = self.create_record(form).await;
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);
        response.json().await.expect("Invalid record JSON")
    }

    /// GET /v1/records/{id}
    pub async fn get_record(&self, id: i64) -> Response {
        self.client
            .get(self.url(&format!("/v1/records/{}", id)))
            .send()
            .await
            .expect("Get record request failed")
    }

    /// PUT /v1/records/{id}
    pub async fn update_record(&self, id: i64, form: RecordForm) -> Response {
        self.client
            .put(self.url(&format!("/v1/records/{}", id)))
            .multipart(form.into_multipart())
            .send()
            .await
            .expect("Update record request failed")
    }

    /// DELETE /v1/records/{id}, optionally with a `{confirm}` body
    pub async fn delete_record(&self, id: i64, confirm: Option<bool>) -> Response {
        let request = self
            .client
            .delete(self.url(&format!("/v1/records/{}", id)));
        let request = match confirm {
            Some(confirm) => request.json(&json!({ "confirm": confirm })),
            None => request,
        };
        request.send().await.expect("Delete record request failed")
    }

    // ========================================================================
    // Lookup Endpoints
    // ========================================================================

    /// GET /v1/choices/{category}
    pub async fn get_choices(&self, category: &str) -> Response {
        self.client
            .get(self.url(&format!("/v1/choices/{}", category)))
            .send()
            .await
            .expect("Choices request failed")
    }

    /// GET /v1/choices/{category}, returning the names
    pub async fn get_choice_names(&self, category: &str) -> Vec<String> {
        let response = self.get_choices(category).await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        response.json().await.expect("Invalid choices JSON")
    }

    /// GET /v1/months
    pub async fn get_months(&self) -> Response {
        self.client
            .get(self.url("/v1/months"))
            .send()
            .await
            .expect("Months request failed")
    }

    /// GET /v1/images/{filename}
    pub async fn get_image(&self, filename: &str) -> Response {
        self.client
            .get(self.url(&format!("/v1/images/{}", filename)))
            .send()
            .await
            .expect("Image request failed")
    }
}
