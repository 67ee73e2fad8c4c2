use async_trait::async_trait;
use log::{debug, info};
use reqwest::{Client, StatusCode, header::CONTENT_TYPE};
use url::Url;

use super::error::ConnectError;
use super::types::{ScriptDescriptor, ScriptPayload, ScriptRunResult};
use crate::credentials::Credential;
use crate::http::{HttpClient, HttpError, RetryPolicy, check_status};

/// Prefix of the REST API, relative to the host.
pub const API_PREFIX: &str = "service/rest/v1";

/// Health check endpoint, relative to the host.
pub const PING_PATH: &str = "service/metrics/ping";

/// Type tag of every script this tool manages.
pub const SCRIPT_TYPE: &str = "groovy";

/// Script management operations of the Nexus API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScriptApi: Send + Sync {
    /// Replaces the script called `name`, creating it if it does not exist.
    async fn create_or_update_script(&self, name: &str, content: &str) -> Result<(), HttpError>;

    /// Runs a script. `parameters` is sent verbatim as a text/plain body.
    async fn run_script(&self, name: &str, parameters: &str)
    -> Result<ScriptRunResult, HttpError>;

    async fn list_scripts(&self) -> Result<Vec<ScriptDescriptor>, HttpError>;

    async fn delete_script(&self, name: &str) -> Result<(), HttpError>;
}

/// Lists every script and deletes them one by one.
///
/// Not atomic: scripts added meanwhile are missed, and a script removed by
/// someone else in between makes the corresponding delete fail.
pub async fn delete_all_scripts<A: ScriptApi + ?Sized>(api: &A) -> Result<usize, HttpError> {
    let names: Vec<String> = api
        .list_scripts()
        .await?
        .into_iter()
        .map(|script| script.name)
        .collect();

    for name in &names {
        info!("Deleting script {}", name);
        api.delete_script(name).await?;
    }
    Ok(names.len())
}

/// A session against one Nexus instance, bound to one credential.
///
/// A value of this type only exists once the health check passed.
pub struct NexusClient {
    host: String,
    base: Url,
    http: HttpClient,
}

impl std::fmt::Debug for NexusClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NexusClient")
            .field("host", &self.host)
            .field("credential", &self.http.credential())
            .finish()
    }
}

impl NexusClient {
    /// Pings the instance with the given credential and returns a ready client.
    ///
    /// 401 is reported as [`ConnectError::Unauthorized`], an unreachable host
    /// as [`ConnectError::Connectivity`]; any other non-2xx as [`ConnectError::Http`].
    #[tracing::instrument(skip(client, credential, policy), fields(user = credential.username()))]
    pub async fn connect(
        client: Client,
        host: &str,
        credential: Credential,
        policy: RetryPolicy,
    ) -> Result<Self, ConnectError> {
        let host = host.trim_end_matches('/');
        let base = match Url::parse(host) {
            Ok(base) if !host.is_empty() && !base.cannot_be_a_base() => base,
            _ => return Err(ConnectError::InvalidHost(host.to_string())),
        };
        let user = credential.username().to_string();
        let http = HttpClient::new(client, policy).with_credential(credential);

        let ping_url = endpoint(&base, PING_PATH, &[]);
        debug!("Checking {} as {}...", ping_url, user);

        let response = http.send(http.get(ping_url.as_str())).await.map_err(|e| {
            if e.is_connectivity() {
                ConnectError::Connectivity {
                    host: host.to_string(),
                    source: e,
                }
            } else {
                ConnectError::Http(e)
            }
        })?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ConnectError::Unauthorized {
                host: host.to_string(),
                user,
            });
        }
        check_status(response).await.map_err(ConnectError::Http)?;

        Ok(Self {
            host: host.to_string(),
            base,
            http,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.http.credential()
    }

    pub async fn delete_all_scripts(&self) -> Result<usize, HttpError> {
        delete_all_scripts(self).await
    }

    fn api_url(&self, segments: &[&str]) -> String {
        endpoint(&self.base, API_PREFIX, segments).into()
    }
}

/// `base` extended by the fixed `prefix` path and `segments`, each segment
/// percent-encoded on its own.
fn endpoint(base: &Url, prefix: &str, segments: &[&str]) -> Url {
    let mut url = base.clone();
    // `base` is never cannot-be-a-base, see `connect`
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(prefix.split('/')).extend(segments);
    }
    url
}

#[async_trait]
impl ScriptApi for NexusClient {
    #[tracing::instrument(skip(self, content))]
    async fn create_or_update_script(&self, name: &str, content: &str) -> Result<(), HttpError> {
        let payload = ScriptPayload {
            name,
            script_type: SCRIPT_TYPE,
            content,
        };

        let update_url = self.api_url(&["script", name]);
        let response = self
            .http
            .send(self.http.put(&update_url).json(&payload))
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("Script {} does not exist yet, creating it", name);
            let response = self
                .http
                .send(self.http.post(&self.api_url(&["script"])).json(&payload))
                .await?;
            check_status(response).await?;
        } else {
            check_status(response).await?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, parameters))]
    async fn run_script(
        &self,
        name: &str,
        parameters: &str,
    ) -> Result<ScriptRunResult, HttpError> {
        let run_url = self.api_url(&["script", name, "run"]);
        let request = self
            .http
            .post(&run_url)
            .header(CONTENT_TYPE, "text/plain")
            .body(parameters.to_string());

        let response = check_status(self.http.send(request).await?).await?;
        let body = response.text().await.map_err(HttpError::Body)?;
        Ok(ScriptRunResult::new(body))
    }

    #[tracing::instrument(skip(self))]
    async fn list_scripts(&self) -> Result<Vec<ScriptDescriptor>, HttpError> {
        let response = self.http.send(self.http.get(&self.api_url(&["script"]))).await?;
        let response = check_status(response).await?;
        response
            .json::<Vec<ScriptDescriptor>>()
            .await
            .map_err(HttpError::Body)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_script(&self, name: &str) -> Result<(), HttpError> {
        let url = self.api_url(&["script", name]);
        let response = self.http.send(self.http.delete(&url)).await?;
        check_status(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::Sequence;
    use mockall::predicate::eq;
    use mockito::Matcher;
    use std::time::Duration;

    // admin:admin123
    const ADMIN_AUTH: &str = "Basic YWRtaW46YWRtaW4xMjM=";

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::default()
            .with_max_retries(1)
            .with_backoff_factor(Duration::from_millis(1))
    }

    async fn connected(server: &mut mockito::Server) -> NexusClient {
        let _ping = server
            .mock("GET", "/service/metrics/ping")
            .with_status(200)
            .create_async()
            .await;
        NexusClient::connect(
            Client::new(),
            &server.url(),
            Credential::new("admin", "admin123"),
            fast_policy(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_connect_success() {
        let mut server = mockito::Server::new_async().await;
        let ping = server
            .mock("GET", "/service/metrics/ping")
            .match_header("authorization", ADMIN_AUTH)
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let host = format!("{}/", server.url());
        let client = NexusClient::connect(
            Client::new(),
            &host,
            Credential::new("admin", "admin123"),
            fast_policy(),
        )
        .await
        .unwrap();

        ping.assert_async().await;
        assert_eq!(client.host(), server.url());
        assert_eq!(client.credential().unwrap().password(), "admin123");
    }

    #[tokio::test]
    async fn test_connect_unauthorized() {
        let mut server = mockito::Server::new_async().await;
        let ping = server
            .mock("GET", "/service/metrics/ping")
            .with_status(401)
            .expect(1)
            .create_async()
            .await;

        let err = NexusClient::connect(
            Client::new(),
            &server.url(),
            Credential::new("admin", "wrong"),
            fast_policy(),
        )
        .await
        .unwrap_err();

        ping.assert_async().await;
        assert!(err.is_unauthorized());
        assert!(err.to_string().contains("admin"));
    }

    #[tokio::test]
    async fn test_connect_other_status_is_http_error() {
        let mut server = mockito::Server::new_async().await;
        let _ping = server
            .mock("GET", "/service/metrics/ping")
            .with_status(403)
            .create_async()
            .await;

        let err = NexusClient::connect(
            Client::new(),
            &server.url(),
            Credential::new("admin", "admin123"),
            fast_policy(),
        )
        .await
        .unwrap_err();

        match err {
            ConnectError::Http(e) => assert_eq!(e.status(), Some(StatusCode::FORBIDDEN)),
            other => panic!("Expected HTTP error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connect_unreachable_host() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = NexusClient::connect(
            Client::new(),
            &format!("http://{}", addr),
            Credential::new("admin", "admin123"),
            fast_policy(),
        )
        .await
        .unwrap_err();

        assert!(err.is_connectivity());
        assert!(std::error::Error::source(&err).is_some());
    }

    #[tokio::test]
    async fn test_connect_empty_host() {
        let err = NexusClient::connect(
            Client::new(),
            "",
            Credential::new("admin", "admin123"),
            fast_policy(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ConnectError::InvalidHost(_)));
    }

    #[tokio::test]
    async fn test_connect_host_without_scheme() {
        let err = NexusClient::connect(
            Client::new(),
            "localhost:8081",
            Credential::new("admin", "admin123"),
            fast_policy(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ConnectError::InvalidHost(ref host) if host == "localhost:8081"));
    }

    #[tokio::test]
    async fn test_connect_keeps_host_path() {
        let mut server = mockito::Server::new_async().await;
        let ping = server
            .mock("GET", "/nexus/service/metrics/ping")
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let host = format!("{}/nexus/", server.url());
        NexusClient::connect(
            Client::new(),
            &host,
            Credential::new("admin", "admin123"),
            fast_policy(),
        )
        .await
        .unwrap();

        ping.assert_async().await;
    }

    #[tokio::test]
    async fn test_script_names_are_encoded_as_one_segment() {
        let mut server = mockito::Server::new_async().await;
        let client = connected(&mut server).await;

        let put = server
            .mock("PUT", "/service/rest/v1/script/a%23b%3Fc")
            .with_status(204)
            .expect(1)
            .create_async()
            .await;
        let run = server
            .mock("POST", "/service/rest/v1/script/a%23b%3Fc/run")
            .with_status(200)
            .with_body("ok")
            .expect(1)
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", "/service/rest/v1/script/a%23b%3Fc")
            .with_status(204)
            .expect(1)
            .create_async()
            .await;

        client.create_or_update_script("a#b?c", "x").await.unwrap();
        assert_eq!(client.run_script("a#b?c", "{}").await.unwrap().body(), "ok");
        client.delete_script("a#b?c").await.unwrap();

        put.assert_async().await;
        run.assert_async().await;
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_script_updates_existing() {
        let mut server = mockito::Server::new_async().await;
        let client = connected(&mut server).await;

        let put = server
            .mock("PUT", "/service/rest/v1/script/setup_anonymous_access")
            .match_header("authorization", ADMIN_AUTH)
            .match_body(Matcher::Json(serde_json::json!({
                "name": "setup_anonymous_access",
                "type": "groovy",
                "content": "security.setAnonymousAccess(true)"
            })))
            .with_status(204)
            .expect(1)
            .create_async()
            .await;
        let post = server
            .mock("POST", "/service/rest/v1/script")
            .expect(0)
            .create_async()
            .await;

        client
            .create_or_update_script("setup_anonymous_access", "security.setAnonymousAccess(true)")
            .await
            .unwrap();

        put.assert_async().await;
        post.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_script_falls_back_to_post_on_404() {
        let mut server = mockito::Server::new_async().await;
        let client = connected(&mut server).await;

        let payload = serde_json::json!({
            "name": "create_blobstore",
            "type": "groovy",
            "content": "blobStore.createFileBlobStore(args)"
        });
        let put = server
            .mock("PUT", "/service/rest/v1/script/create_blobstore")
            .match_body(Matcher::Json(payload.clone()))
            .with_status(404)
            .expect(1)
            .create_async()
            .await;
        let post = server
            .mock("POST", "/service/rest/v1/script")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(payload))
            .with_status(204)
            .expect(1)
            .create_async()
            .await;

        client
            .create_or_update_script("create_blobstore", "blobStore.createFileBlobStore(args)")
            .await
            .unwrap();

        put.assert_async().await;
        post.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_script_other_put_failure_skips_post() {
        let mut server = mockito::Server::new_async().await;
        let client = connected(&mut server).await;

        let put = server
            .mock("PUT", "/service/rest/v1/script/broken")
            .with_status(400)
            .with_body("invalid script")
            .expect(1)
            .create_async()
            .await;
        let post = server
            .mock("POST", "/service/rest/v1/script")
            .expect(0)
            .create_async()
            .await;

        let err = client
            .create_or_update_script("broken", "???")
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
        put.assert_async().await;
        post.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_script_failed_post_propagates() {
        let mut server = mockito::Server::new_async().await;
        let client = connected(&mut server).await;

        let _put = server
            .mock("PUT", "/service/rest/v1/script/new")
            .with_status(404)
            .create_async()
            .await;
        let _post = server
            .mock("POST", "/service/rest/v1/script")
            .with_status(400)
            .create_async()
            .await;

        let err = client.create_or_update_script("new", "x").await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
    }

    #[tokio::test]
    async fn test_run_script_posts_text_plain() {
        let mut server = mockito::Server::new_async().await;
        let client = connected(&mut server).await;

        let run = server
            .mock("POST", "/service/rest/v1/script/setup_anonymous_access/run")
            .match_header("content-type", "text/plain")
            .match_header("authorization", ADMIN_AUTH)
            .match_body(r#"{"anonymous_access":true}"#)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"name": "setup_anonymous_access", "result": "true"}"#)
            .expect(1)
            .create_async()
            .await;

        let result = client
            .run_script("setup_anonymous_access", r#"{"anonymous_access":true}"#)
            .await
            .unwrap();

        run.assert_async().await;
        assert_eq!(result.result(), "true");
    }

    #[tokio::test]
    async fn test_run_script_failure_propagates() {
        let mut server = mockito::Server::new_async().await;
        let client = connected(&mut server).await;

        let _run = server
            .mock("POST", "/service/rest/v1/script/missing/run")
            .with_status(404)
            .create_async()
            .await;

        let err = client.run_script("missing", "{}").await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn test_list_scripts() {
        let mut server = mockito::Server::new_async().await;
        let client = connected(&mut server).await;

        let _list = server
            .mock("GET", "/service/rest/v1/script")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[
                    {"name": "setup_anonymous_access", "type": "groovy", "content": "a"},
                    {"name": "create_blobstore", "type": "groovy", "content": "b"}
                ]"#,
            )
            .create_async()
            .await;

        let scripts = client.list_scripts().await.unwrap();
        let names: Vec<&str> = scripts.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["setup_anonymous_access", "create_blobstore"]);
    }

    #[tokio::test]
    async fn test_delete_script() {
        let mut server = mockito::Server::new_async().await;
        let client = connected(&mut server).await;

        let delete = server
            .mock("DELETE", "/service/rest/v1/script/old")
            .with_status(204)
            .expect(1)
            .create_async()
            .await;

        client.delete_script("old").await.unwrap();
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_all_scripts_over_http() {
        let mut server = mockito::Server::new_async().await;
        let client = connected(&mut server).await;

        let _list = server
            .mock("GET", "/service/rest/v1/script")
            .with_status(200)
            .with_body(r#"[{"name": "one"}, {"name": "two"}]"#)
            .create_async()
            .await;
        let one = server
            .mock("DELETE", "/service/rest/v1/script/one")
            .with_status(204)
            .expect(1)
            .create_async()
            .await;
        let two = server
            .mock("DELETE", "/service/rest/v1/script/two")
            .with_status(204)
            .expect(1)
            .create_async()
            .await;

        assert_eq!(client.delete_all_scripts().await.unwrap(), 2);
        one.assert_async().await;
        two.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_all_scripts_deletes_in_listed_order() {
        let mut api = MockScriptApi::new();
        let mut seq = Sequence::new();

        api.expect_list_scripts()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| {
                Ok(vec![
                    ScriptDescriptor {
                        name: "b".to_string(),
                        script_type: "groovy".to_string(),
                        content: String::new(),
                    },
                    ScriptDescriptor {
                        name: "a".to_string(),
                        script_type: "groovy".to_string(),
                        content: String::new(),
                    },
                ])
            });
        api.expect_delete_script()
            .with(eq("b"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        api.expect_delete_script()
            .with(eq("a"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        assert_eq!(delete_all_scripts(&api).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_delete_all_scripts_stops_on_not_found() {
        let mut api = MockScriptApi::new();
        api.expect_list_scripts().returning(|| {
            Ok(vec![ScriptDescriptor {
                name: "gone".to_string(),
                script_type: "groovy".to_string(),
                content: String::new(),
            }])
        });
        api.expect_delete_script().returning(|_| {
            Err(HttpError::Status {
                url: "http://nexus/service/rest/v1/script/gone".to_string(),
                status: StatusCode::NOT_FOUND,
                body: String::new(),
            })
        });

        let err = delete_all_scripts(&api).await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    }
}
