//! Salesforce REST API client used by the survey sync services.
//!
//! Every call goes through [`SalesforceClient::fetch_retriable`], which retries
//! transport failures and retryable HTTP statuses with capped exponential
//! backoff plus jitter.

use async_trait::async_trait;
use log::{debug, error, warn};
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use survey_sync_core::crm::{
    reference_id, CompositeRequest, CompositeResponse, CompositeSubrequest, CompositeTreeRequest,
    CompositeTreeResponse, CrmClientTrait, DescribeLayout, DescribeLayoutResult, QueryResponse,
    RemoteRecord, ATTRIBUTES_KEY,
};
use survey_sync_core::session::SessionProvider;
use survey_sync_core::settings::SyncSettings;
use survey_sync_core::sync::RetryPolicy;

use crate::error::{CrmError, Result};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_LOG_BODY_CHARS: usize = 512;
/// Subrequest limit of one composite call.
const COMPOSITE_MAX_SUBREQUESTS: usize = 25;

/// Error entry of a Salesforce error body (`[{message, errorCode}]`).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SalesforceApiError {
    message: String,
    #[serde(default)]
    error_code: String,
}

/// Resolved session values for one logical call.
struct RequestContext {
    instance_url: String,
    base_url: String,
    headers: HeaderMap,
}

#[derive(Clone)]
pub struct SalesforceClient {
    client: reqwest::Client,
    session: Arc<dyn SessionProvider>,
    api_version: String,
    retry: RetryPolicy,
}

impl SalesforceClient {
    pub fn new(session: Arc<dyn SessionProvider>, settings: &SyncSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            session,
            api_version: settings.api_version.clone(),
            retry: RetryPolicy::from(settings),
        })
    }

    fn log_response(status: StatusCode, body: &str) {
        if status.is_success() {
            debug!("API response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("API response error ({}): {}", status, preview);
    }

    fn backoff_with_jitter(&self, attempt: usize) -> Duration {
        let backoff = self.retry.backoff_ms(attempt);
        let jitter = rand::thread_rng().gen_range(0..=(backoff / 5).max(1));
        Duration::from_millis(backoff.saturating_add(jitter))
    }

    fn headers(token: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| CrmError::session("Invalid access token format"))?;
        headers.insert(AUTHORIZATION, auth_value);
        Ok(headers)
    }

    async fn context(&self) -> Result<RequestContext> {
        let instance_url = self
            .session
            .instance_url()
            .await
            .map_err(|e| CrmError::session(e.to_string()))?;
        if instance_url.is_empty() {
            return Err(CrmError::session("Instance URL is not set"));
        }
        let token = self
            .session
            .access_token()
            .await
            .map_err(|e| CrmError::session(e.to_string()))?;

        let instance_url = instance_url.trim_end_matches('/').to_string();
        Ok(RequestContext {
            base_url: format!("{}/services/data/{}", instance_url, self.api_version),
            instance_url,
            headers: Self::headers(&token)?,
        })
    }

    /// Map a non-success body to an API error, preferring Salesforce's error list.
    fn api_error(status: StatusCode, body: &str) -> CrmError {
        if let Ok(errors) = serde_json::from_str::<Vec<SalesforceApiError>>(body) {
            if let Some(first) = errors.first() {
                return CrmError::api(
                    status.as_u16(),
                    format!("{}: {}", first.error_code, first.message),
                );
            }
        }
        CrmError::api(status.as_u16(), format!("Request failed: {}", body))
    }

    /// Parse a JSON response body.
    fn parse_response<T: serde::de::DeserializeOwned>(status: StatusCode, body: &str) -> Result<T> {
        if !status.is_success() {
            return Err(Self::api_error(status, body));
        }

        serde_json::from_str(body).map_err(|e| {
            error!(
                "Failed to deserialize response. Body: {}, Error: {}",
                body, e
            );
            CrmError::api(status.as_u16(), format!("Failed to parse response: {}", e))
        })
    }

    /// Send a request, retrying transient failures.
    ///
    /// Returns the status and body of the last response; non-retryable
    /// statuses come back as `Ok` so callers can inspect the body.
    async fn fetch_retriable(
        &self,
        method: Method,
        url: &str,
        headers: &HeaderMap,
        body: Option<&serde_json::Value>,
    ) -> Result<(StatusCode, String)> {
        let mut attempt = 0usize;

        loop {
            attempt = attempt.saturating_add(1);
            debug!("{} {} (attempt {})", method, url, attempt);

            let mut request = self
                .client
                .request(method.clone(), url)
                .headers(headers.clone());
            if let Some(body) = body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await?;
                    Self::log_response(status, &text);
                    if status.is_success() {
                        return Ok((status, text));
                    }

                    let err = Self::api_error(status, &text);
                    if self.retry.should_retry(attempt, err.retry_class()) {
                        warn!(
                            "Retry attempt {}/{} after HTTP {} for {}",
                            attempt + 1,
                            self.retry.max_attempts,
                            status.as_u16(),
                            url
                        );
                        sleep(self.backoff_with_jitter(attempt)).await;
                        continue;
                    }
                    return Ok((status, text));
                }
                Err(err) => {
                    let err = CrmError::Http(err);
                    if self.retry.should_retry(attempt, err.retry_class()) {
                        warn!(
                            "Retry attempt {}/{} after transport error for {}: {}",
                            attempt + 1,
                            self.retry.max_attempts,
                            url,
                            err
                        );
                        sleep(self.backoff_with_jitter(attempt)).await;
                        continue;
                    }
                    return Err(err);
                }
            }
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        headers: &HeaderMap,
    ) -> Result<T> {
        let (status, body) = self.fetch_retriable(Method::GET, url, headers, None).await?;
        Self::parse_response(status, &body)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Query
    // ─────────────────────────────────────────────────────────────────────────

    /// GET /query?q={soql}, following nextRecordsUrl until done.
    async fn query_all(&self, soql: &str) -> Result<Vec<RemoteRecord>> {
        let ctx = self.context().await?;
        let mut url = format!("{}/query?q={}", ctx.base_url, urlencoding::encode(soql));
        let mut records = Vec::new();

        loop {
            let page: QueryResponse = self.get_json(&url, &ctx.headers).await?;
            debug!(
                "query | {} of {} records",
                records.len() + page.records.len(),
                page.total_size
            );
            records.extend(page.records.into_iter().map(|mut record| {
                record.remove(ATTRIBUTES_KEY);
                record
            }));

            match (page.done, page.next_records_url) {
                (false, Some(next)) => url = format!("{}{}", ctx.instance_url, next),
                _ => break,
            }
        }

        Ok(records)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Composite
    // ─────────────────────────────────────────────────────────────────────────

    /// POST /composite/tree/{object}
    ///
    /// A rejected batch answers 400 with `hasErrors: true`; that body is
    /// returned as a response rather than an error.
    async fn create_tree(
        &self,
        object_name: &str,
        records: Vec<RemoteRecord>,
    ) -> Result<CompositeTreeResponse> {
        let ctx = self.context().await?;
        let url = format!("{}/composite/tree/{}", ctx.base_url, object_name);
        let body = serde_json::to_value(CompositeTreeRequest { records })?;
        debug!("create_records | {}", url);

        let (status, text) = self
            .fetch_retriable(Method::POST, &url, &ctx.headers, Some(&body))
            .await?;
        if status == StatusCode::BAD_REQUEST {
            if let Ok(tree) = serde_json::from_str::<CompositeTreeResponse>(&text) {
                if tree.has_errors {
                    return Ok(tree);
                }
            }
        }
        Self::parse_response(status, &text)
    }

    /// POST /composite with one GET subrequest per id.
    async fn composite_get(
        &self,
        object_name: &str,
        ids: &[String],
        fields: &[String],
    ) -> Result<CompositeResponse> {
        let mut merged = CompositeResponse::default();
        if ids.is_empty() {
            return Ok(merged);
        }

        let ctx = self.context().await?;
        let url = format!("{}/composite", ctx.base_url);
        let field_list = fields.join(",");

        for (chunk_index, chunk) in ids.chunks(COMPOSITE_MAX_SUBREQUESTS).enumerate() {
            let request = CompositeRequest {
                all_or_none: false,
                composite_request: chunk
                    .iter()
                    .enumerate()
                    .map(|(i, id)| CompositeSubrequest {
                        method: "GET".to_string(),
                        url: format!(
                            "/services/data/{}/sobjects/{}/{}?fields={}",
                            self.api_version,
                            object_name,
                            urlencoding::encode(id),
                            field_list
                        ),
                        reference_id: reference_id(chunk_index * COMPOSITE_MAX_SUBREQUESTS + i),
                    })
                    .collect(),
            };
            let body = serde_json::to_value(&request)?;
            let (status, text) = self
                .fetch_retriable(Method::POST, &url, &ctx.headers, Some(&body))
                .await?;
            let response: CompositeResponse = Self::parse_response(status, &text)?;
            merged
                .composite_response
                .extend(response.composite_response);
        }

        Ok(merged)
    }
}

impl std::fmt::Debug for SalesforceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SalesforceClient")
            .field("api_version", &self.api_version)
            .field("retry", &self.retry)
            .finish()
    }
}

#[async_trait]
impl CrmClientTrait for SalesforceClient {
    async fn query(&self, soql: &str) -> survey_sync_core::Result<Vec<RemoteRecord>> {
        Ok(self.query_all(soql).await?)
    }

    async fn create_records(
        &self,
        object_name: &str,
        records: Vec<RemoteRecord>,
    ) -> survey_sync_core::Result<CompositeTreeResponse> {
        Ok(self.create_tree(object_name, records).await?)
    }

    async fn describe_layouts(
        &self,
        object_name: &str,
    ) -> survey_sync_core::Result<DescribeLayoutResult> {
        let ctx = self.context().await?;
        let url = format!("{}/sobjects/{}/describe/layouts", ctx.base_url, object_name);
        Ok(self.get_json(&url, &ctx.headers).await?)
    }

    async fn describe_layout(
        &self,
        object_name: &str,
        record_type_id: &str,
    ) -> survey_sync_core::Result<DescribeLayout> {
        let ctx = self.context().await?;
        let url = format!(
            "{}/sobjects/{}/describe/layouts/{}",
            ctx.base_url, object_name, record_type_id
        );
        Ok(self.get_json(&url, &ctx.headers).await?)
    }

    async fn fetch_records_by_ids(
        &self,
        object_name: &str,
        ids: &[String],
        fields: &[String],
    ) -> survey_sync_core::Result<CompositeResponse> {
        Ok(self.composite_get(object_name, ids, fields).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use survey_sync_core::errors::{Error as CoreError, RemoteError};
    use survey_sync_core::session::StaticSession;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::Mutex as TokioMutex;

    #[derive(Debug, Clone)]
    struct CapturedRequest {
        request_line: String,
        authorization: Option<String>,
        body: String,
    }

    #[derive(Debug, Clone)]
    enum MockOutcome {
        DropConnection,
        Respond { status: u16, body: String },
    }

    fn respond(status: u16, body: &str) -> MockOutcome {
        MockOutcome::Respond {
            status,
            body: body.to_string(),
        }
    }

    fn header_end_offset(buffer: &[u8]) -> Option<usize> {
        buffer.windows(4).position(|window| window == b"\r\n\r\n")
    }

    async fn read_http_request(
        stream: &mut tokio::net::TcpStream,
    ) -> Option<(String, HashMap<String, String>, String)> {
        let mut buffer = Vec::new();
        loop {
            let mut chunk = [0_u8; 2048];
            let read = stream.read(&mut chunk).await.ok()?;
            if read == 0 {
                return None;
            }
            buffer.extend_from_slice(&chunk[..read]);
            if header_end_offset(&buffer).is_some() {
                break;
            }
        }

        let header_end = header_end_offset(&buffer)?;
        let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
        let mut lines = head.lines();
        let request_line = lines.next()?.to_string();

        let mut headers = HashMap::new();
        for line in lines {
            if let Some((name, value)) = line.split_once(':') {
                headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
            }
        }

        let content_length = headers
            .get("content-length")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);

        let mut body = buffer[header_end + 4..].to_vec();
        while body.len() < content_length {
            let mut chunk = [0_u8; 2048];
            let read = stream.read(&mut chunk).await.ok()?;
            if read == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..read]);
        }

        Some((
            request_line,
            headers,
            String::from_utf8_lossy(&body).to_string(),
        ))
    }

    fn status_text(status: u16) -> &'static str {
        match status {
            200 => "OK",
            201 => "Created",
            400 => "Bad Request",
            401 => "Unauthorized",
            503 => "Service Unavailable",
            _ => "Error",
        }
    }

    async fn write_http_response(
        stream: &mut tokio::net::TcpStream,
        status: u16,
        body: &str,
    ) -> std::io::Result<()> {
        let response = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            status_text(status),
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).await?;
        stream.flush().await
    }

    async fn start_mock_server(
        outcomes: Vec<MockOutcome>,
    ) -> (
        String,
        Arc<TokioMutex<Vec<CapturedRequest>>>,
        tokio::task::JoinHandle<()>,
    ) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener addr");
        let captured = Arc::new(TokioMutex::new(Vec::<CapturedRequest>::new()));
        let scripted = Arc::new(TokioMutex::new(VecDeque::from(outcomes)));
        let captured_clone = Arc::clone(&captured);
        let scripted_clone = Arc::clone(&scripted);

        let handle = tokio::spawn(async move {
            loop {
                let (mut stream, _) = match listener.accept().await {
                    Ok(value) => value,
                    Err(_) => break,
                };
                let captured_inner = Arc::clone(&captured_clone);
                let scripted_inner = Arc::clone(&scripted_clone);
                tokio::spawn(async move {
                    let Some((request_line, headers, body)) =
                        read_http_request(&mut stream).await
                    else {
                        return;
                    };
                    captured_inner.lock().await.push(CapturedRequest {
                        request_line,
                        authorization: headers.get("authorization").cloned(),
                        body,
                    });

                    let outcome = scripted_inner.lock().await.pop_front().unwrap_or(respond(
                        500,
                        r#"[{"message":"unexpected request","errorCode":"UNKNOWN_EXCEPTION"}]"#,
                    ));
                    match outcome {
                        MockOutcome::DropConnection => {}
                        MockOutcome::Respond { status, body } => {
                            let _ = write_http_response(&mut stream, status, &body).await;
                        }
                    }
                });
            }
        });

        (format!("http://{}", addr), captured, handle)
    }

    fn client_for(base_url: &str) -> SalesforceClient {
        let session = Arc::new(StaticSession {
            instance_url: format!("{}/", base_url),
            access_token: "00Dxx!token".to_string(),
            user_contact_id: "003xx".to_string(),
        });
        let settings = SyncSettings {
            base_backoff_ms: 1,
            max_backoff_ms: 5,
            ..SyncSettings::default()
        };
        SalesforceClient::new(session, &settings).expect("client")
    }

    #[tokio::test]
    async fn query_follows_next_records_url_and_strips_attributes() {
        let (base_url, captured, server) = start_mock_server(vec![
            respond(
                200,
                r#"{"totalSize":2,"done":false,"nextRecordsUrl":"/services/data/v49.0/query/01gxx-2000","records":[{"attributes":{"type":"Survey__c"},"Id":"a0B1"}]}"#,
            ),
            respond(
                200,
                r#"{"totalSize":2,"done":true,"records":[{"attributes":{"type":"Survey__c"},"Id":"a0B2"}]}"#,
            ),
        ])
        .await;

        let records = client_for(&base_url)
            .query("SELECT Id FROM Survey__c WHERE Survey_Taker__c = '003xx'")
            .await
            .expect("query");

        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["Id"], "a0B2");
        assert!(records.iter().all(|r| !r.contains_key("attributes")));

        let requests = captured.lock().await.clone();
        assert_eq!(requests.len(), 2);
        assert!(requests[0]
            .request_line
            .starts_with("GET /services/data/v49.0/query?q=SELECT%20Id%20FROM%20Survey__c"));
        assert_eq!(
            requests[1].request_line,
            "GET /services/data/v49.0/query/01gxx-2000 HTTP/1.1"
        );
        assert_eq!(
            requests[0].authorization.as_deref(),
            Some("Bearer 00Dxx!token")
        );

        server.abort();
    }

    #[tokio::test]
    async fn retryable_status_is_retried_until_success() {
        let (base_url, captured, server) = start_mock_server(vec![
            respond(503, r#"[{"message":"busy","errorCode":"SERVER_UNAVAILABLE"}]"#),
            respond(200, r#"{"recordTypeMappings":[]}"#),
        ])
        .await;

        let result = client_for(&base_url)
            .describe_layouts("Survey__c")
            .await
            .expect("describe layouts");
        assert!(result.record_type_mappings.is_empty());

        let requests = captured.lock().await.clone();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[1].request_line,
            "GET /services/data/v49.0/sobjects/Survey__c/describe/layouts HTTP/1.1"
        );

        server.abort();
    }

    #[tokio::test]
    async fn dropped_connection_is_retried() {
        let (base_url, captured, server) = start_mock_server(vec![
            MockOutcome::DropConnection,
            respond(200, r#"{"id":"00hxx","editLayoutSections":[]}"#),
        ])
        .await;

        let layout = client_for(&base_url)
            .describe_layout("Survey__c", "012xx")
            .await
            .expect("describe layout");
        assert_eq!(layout.id.as_deref(), Some("00hxx"));
        assert_eq!(captured.lock().await.len(), 2);

        server.abort();
    }

    #[tokio::test]
    async fn retry_budget_is_bounded() {
        let busy = r#"[{"message":"busy","errorCode":"SERVER_UNAVAILABLE"}]"#;
        let (base_url, captured, server) = start_mock_server(vec![
            respond(503, busy),
            respond(503, busy),
            respond(503, busy),
            respond(200, "{}"),
        ])
        .await;

        let err = client_for(&base_url)
            .describe_layouts("Survey__c")
            .await
            .expect_err("retries exhausted");
        assert!(matches!(
            err,
            CoreError::Remote(RemoteError::Api { status: 503, .. })
        ));
        assert_eq!(captured.lock().await.len(), 3);

        server.abort();
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let (base_url, captured, server) = start_mock_server(vec![respond(
            400,
            r#"[{"message":"unexpected token: FROM","errorCode":"MALFORMED_QUERY"}]"#,
        )])
        .await;

        let err = client_for(&base_url)
            .query("SELECT FROM")
            .await
            .expect_err("malformed query");
        match err {
            CoreError::Remote(RemoteError::Api { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "MALFORMED_QUERY: unexpected token: FROM");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(captured.lock().await.len(), 1);

        server.abort();
    }

    #[tokio::test]
    async fn composite_tree_failure_body_is_returned_as_response() {
        let (base_url, captured, server) = start_mock_server(vec![respond(
            400,
            r#"{"hasErrors":true,"results":[{"referenceId":"ref0","errors":[{"statusCode":"REQUIRED_FIELD_MISSING","message":"Required fields are missing: [Visits__c]","fields":["Visits__c"]}]}]}"#,
        )])
        .await;

        let mut record = RemoteRecord::new();
        record.insert(
            "attributes".to_string(),
            serde_json::json!({ "type": "Survey__c", "referenceId": "ref0" }),
        );
        let response = client_for(&base_url)
            .create_records("Survey__c", vec![record])
            .await
            .expect("tree response");
        assert!(response.has_errors);
        assert_eq!(
            response.error_summary(),
            "ref0: REQUIRED_FIELD_MISSING Required fields are missing: [Visits__c]"
        );

        let requests = captured.lock().await.clone();
        assert_eq!(
            requests[0].request_line,
            "POST /services/data/v49.0/composite/tree/Survey__c HTTP/1.1"
        );
        let sent: serde_json::Value = serde_json::from_str(&requests[0].body).expect("json body");
        assert_eq!(sent["records"][0]["attributes"]["referenceId"], "ref0");

        server.abort();
    }

    #[tokio::test]
    async fn composite_fetch_sends_one_subrequest_per_id() {
        let (base_url, captured, server) = start_mock_server(vec![respond(
            200,
            r#"{"compositeResponse":[{"body":{"attributes":{"type":"Survey__c"},"Id":"a0B1","Name":"S-1"},"httpHeaders":{},"httpStatusCode":200,"referenceId":"ref0"}]}"#,
        )])
        .await;

        let response = client_for(&base_url)
            .fetch_records_by_ids(
                "Survey__c",
                &["a0B1".to_string()],
                &["Id".to_string(), "Name".to_string()],
            )
            .await
            .expect("composite");
        assert_eq!(response.composite_response.len(), 1);
        assert!(response.composite_response[0].is_success());

        let requests = captured.lock().await.clone();
        let sent: serde_json::Value = serde_json::from_str(&requests[0].body).expect("json body");
        assert_eq!(sent["allOrNone"], false);
        assert_eq!(
            sent["compositeRequest"][0]["url"],
            "/services/data/v49.0/sobjects/Survey__c/a0B1?fields=Id,Name"
        );
        assert_eq!(sent["compositeRequest"][0]["referenceId"], "ref0");

        server.abort();
    }

    #[tokio::test]
    async fn composite_fetch_without_ids_skips_the_call() {
        let client = client_for("http://127.0.0.1:9");
        let response = client
            .fetch_records_by_ids("Survey__c", &[], &["Name".to_string()])
            .await
            .expect("empty");
        assert!(response.composite_response.is_empty());
    }
}
