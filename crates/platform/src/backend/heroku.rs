//! Heroku Platform API v3 backend.
//!
//! A thin mapping from [`Backend`] methods to HTTPS calls. There is no retry
//! and no client-side rate limiting: each call is issued once and its error,
//! if any, is returned to the calling stage.

use crate::backend::{Backend, not_found};
use crate::error::{Error, Result};
use crate::types::{Addon, App, Dyno, Formation, LogOptions, NewApp};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader};

const API_BASE: &str = "https://api.heroku.com";
const ACCEPT: &str = "application/vnd.heroku+json; version=3";
const USER_AGENT: &str = concat!("hoist/", env!("CARGO_PKG_VERSION"));

type Response = ureq::http::Response<ureq::Body>;

/// Heroku Platform API backend.
pub struct HerokuBackend {
    agent: ureq::Agent,
    api_base: String,
    authorization: String,
    insecure_logs: bool,
}

impl HerokuBackend {
    /// Create a backend authenticating with `token`.
    pub fn new(token: impl AsRef<str>) -> Self {
        Self::with_api_base(token, API_BASE)
    }

    /// Create a backend with a custom API base (for testing).
    pub fn with_api_base(token: impl AsRef<str>, api_base: impl Into<String>) -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            api_base: api_base.into(),
            authorization: format!("Bearer {}", token.as_ref()),
            insecure_logs: false,
        }
    }

    /// Skip TLS certificate verification when streaming logs.
    ///
    /// Diagnostic use only; API calls always verify certificates.
    pub fn with_insecure_log_streaming(mut self, insecure: bool) -> Self {
        self.insecure_logs = insecure;
        self
    }

    /// Git endpoint of a Heroku app.
    pub fn git_url_for(app: &str) -> String {
        format!("https://git.heroku.com/{app}.git")
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn authorized<B>(&self, request: ureq::RequestBuilder<B>) -> ureq::RequestBuilder<B> {
        request
            .header("Accept", ACCEPT)
            .header("Authorization", self.authorization.as_str())
            .header("User-Agent", USER_AGENT)
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        log::debug!("GET {path}");
        let response = self.authorized(self.agent.get(&self.url(path))).call()?;
        decode(response)
    }

    fn post<T: DeserializeOwned>(&self, path: &str, body: &serde_json::Value) -> Result<T> {
        log::debug!("POST {path}");
        let response = self
            .authorized(self.agent.post(&self.url(path)))
            .send_json(body)?;
        decode(response)
    }

    fn patch<T: DeserializeOwned>(&self, path: &str, body: &serde_json::Value) -> Result<T> {
        log::debug!("PATCH {path}");
        let response = self
            .authorized(self.agent.patch(&self.url(path)))
            .send_json(body)?;
        decode(response)
    }

    fn delete(&self, path: &str) -> Result<()> {
        log::debug!("DELETE {path}");
        let response = self.authorized(self.agent.delete(&self.url(path))).call()?;
        check(response).map(|_| ())
    }

    fn log_agent(&self) -> ureq::Agent {
        let mut builder = ureq::Agent::config_builder().http_status_as_error(false);
        if self.insecure_logs {
            log::warn!("TLS certificate verification disabled for log streaming");
            builder = builder.tls_config(
                ureq::tls::TlsConfig::builder()
                    .disable_verification(true)
                    .build(),
            );
        }
        ureq::Agent::new_with_config(builder.build())
    }
}

/// Turn a non-success status into a structured error.
fn check(mut response: Response) -> Result<Response> {
    let status = response.status().as_u16();
    if (200..300).contains(&status) {
        return Ok(response);
    }
    let body = response.body_mut().read_to_string().unwrap_or_default();
    Err(Error::from_response(status, &body))
}

fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let mut response = check(response)?;
    Ok(response.body_mut().read_json()?)
}

impl Backend for HerokuBackend {
    fn list_apps(&self) -> Result<Vec<App>> {
        let apps: Vec<HerokuApp> = self.get("/apps")?;
        Ok(apps.into_iter().map(Into::into).collect())
    }

    fn create_app(&self, app: &NewApp) -> Result<App> {
        let created: HerokuApp = self.post("/apps", &serde_json::to_value(app)?)?;
        Ok(created.into())
    }

    fn get_app(&self, app: &str) -> Result<App> {
        let found: HerokuApp = self.get(&format!("/apps/{app}"))?;
        Ok(found.into())
    }

    fn set_stack(&self, app: &str, stack: &str) -> Result<()> {
        let _: serde_json::Value =
            self.patch(&format!("/apps/{app}"), &json!({ "build_stack": stack }))?;
        Ok(())
    }

    fn set_maintenance(&self, app: &str, enabled: bool) -> Result<()> {
        let _: serde_json::Value =
            self.patch(&format!("/apps/{app}"), &json!({ "maintenance": enabled }))?;
        Ok(())
    }

    fn list_addons(&self, app: &str) -> Result<Vec<Addon>> {
        let addons: Vec<HerokuAddon> = self.get(&format!("/apps/{app}/addons"))?;
        Ok(addons
            .into_iter()
            .map(|a| Addon {
                name: a.name,
                plan: a.plan.name,
            })
            .collect())
    }

    fn create_addon(&self, app: &str, plan: &str) -> Result<()> {
        let _: serde_json::Value =
            self.post(&format!("/apps/{app}/addons"), &json!({ "plan": plan }))?;
        Ok(())
    }

    fn delete_addon(&self, app: &str, plan: &str) -> Result<()> {
        let addons: Vec<HerokuAddon> = self.get(&format!("/apps/{app}/addons"))?;
        let addon = addons
            .into_iter()
            .find(|a| a.plan.name == plan || a.name == plan)
            .ok_or_else(|| not_found("addon", plan))?;
        self.delete(&format!("/apps/{app}/addons/{}", addon.id))
    }

    fn list_collaborators(&self, app: &str) -> Result<Vec<String>> {
        let collaborators: Vec<HerokuCollaborator> =
            self.get(&format!("/apps/{app}/collaborators"))?;
        Ok(collaborators
            .into_iter()
            .filter_map(|c| c.user.email)
            .collect())
    }

    fn create_collaborator(&self, app: &str, email: &str) -> Result<()> {
        let _: serde_json::Value = self.post(
            &format!("/apps/{app}/collaborators"),
            &json!({ "user": email, "silent": false }),
        )?;
        Ok(())
    }

    fn delete_collaborator(&self, app: &str, email: &str) -> Result<()> {
        self.delete(&format!("/apps/{app}/collaborators/{email}"))
    }

    fn list_domains(&self, app: &str) -> Result<Vec<String>> {
        let domains: Vec<HerokuDomain> = self.get(&format!("/apps/{app}/domains"))?;
        Ok(domains
            .into_iter()
            .filter(|d| d.kind.as_deref() != Some("heroku"))
            .map(|d| d.hostname)
            .collect())
    }

    fn create_domain(&self, app: &str, hostname: &str) -> Result<()> {
        let _: serde_json::Value = self.post(
            &format!("/apps/{app}/domains"),
            &json!({ "hostname": hostname, "sni_endpoint": null }),
        )?;
        Ok(())
    }

    fn delete_domain(&self, app: &str, hostname: &str) -> Result<()> {
        self.delete(&format!("/apps/{app}/domains/{hostname}"))
    }

    fn config_vars(&self, app: &str) -> Result<BTreeMap<String, String>> {
        let vars: BTreeMap<String, Option<String>> =
            self.get(&format!("/apps/{app}/config-vars"))?;
        Ok(vars
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .collect())
    }

    fn set_config_vars(&self, app: &str, vars: &BTreeMap<String, String>) -> Result<()> {
        let _: serde_json::Value =
            self.patch(&format!("/apps/{app}/config-vars"), &serde_json::to_value(vars)?)?;
        Ok(())
    }

    fn delete_config_var(&self, app: &str, key: &str) -> Result<()> {
        let mut body = serde_json::Map::new();
        body.insert(key.to_string(), serde_json::Value::Null);
        let _: serde_json::Value = self.patch(
            &format!("/apps/{app}/config-vars"),
            &serde_json::Value::Object(body),
        )?;
        Ok(())
    }

    fn formation(&self, app: &str) -> Result<Vec<Formation>> {
        let formation: Vec<HerokuFormation> = self.get(&format!("/apps/{app}/formation"))?;
        Ok(formation
            .into_iter()
            .map(|f| Formation {
                process_type: f.process_type,
                quantity: f.quantity,
                size: f.size,
            })
            .collect())
    }

    fn scale(&self, app: &str, process_type: &str, quantity: u32) -> Result<()> {
        let _: serde_json::Value = self.patch(
            &format!("/apps/{app}/formation/{process_type}"),
            &json!({ "quantity": quantity }),
        )?;
        Ok(())
    }

    fn restart(&self, app: &str) -> Result<()> {
        self.delete(&format!("/apps/{app}/dynos"))
    }

    fn run_command(&self, app: &str, command: &str) -> Result<Dyno> {
        let dyno: HerokuDyno = self.post(
            &format!("/apps/{app}/dynos"),
            &json!({ "command": command, "attach": false, "type": "run" }),
        )?;
        Ok(Dyno {
            name: dyno.name,
            command: dyno.command,
            state: dyno.state,
        })
    }

    fn stream_logs(
        &self,
        app: &str,
        options: &LogOptions,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<()> {
        let mut request = serde_json::Map::new();
        request.insert("tail".into(), options.tail.into());
        if let Some(lines) = options.lines {
            request.insert("lines".into(), lines.into());
        }
        if let Some(dyno) = &options.dyno {
            request.insert("dyno".into(), dyno.clone().into());
        }

        let session: HerokuLogSession = self.post(
            &format!("/apps/{app}/log-sessions"),
            &serde_json::Value::Object(request),
        )?;

        log::debug!("streaming logs for {app}");
        let response = check(self.log_agent().get(&session.logplex_url).call()?)?;
        let reader = BufReader::new(response.into_body().into_reader());
        for line in reader.lines() {
            on_line(&line?);
        }
        Ok(())
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct NamedRef {
    name: String,
}

#[derive(Debug, Deserialize)]
struct EmailRef {
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HerokuApp {
    name: String,
    git_url: Option<String>,
    web_url: Option<String>,
    stack: Option<NamedRef>,
    build_stack: Option<NamedRef>,
    region: Option<NamedRef>,
    owner: Option<EmailRef>,
    #[serde(default)]
    maintenance: bool,
    repo_size: Option<u64>,
    slug_size: Option<u64>,
    created_at: Option<DateTime<Utc>>,
    released_at: Option<DateTime<Utc>>,
}

impl From<HerokuApp> for App {
    fn from(app: HerokuApp) -> Self {
        let git_url = app
            .git_url
            .unwrap_or_else(|| HerokuBackend::git_url_for(&app.name));
        Self {
            name: app.name,
            git_url,
            web_url: app.web_url,
            stack: app.stack.map(|s| s.name),
            build_stack: app.build_stack.map(|s| s.name),
            region: app.region.map(|r| r.name),
            owner_email: app.owner.and_then(|o| o.email),
            maintenance: app.maintenance,
            repo_size: app.repo_size,
            slug_size: app.slug_size,
            created_at: app.created_at,
            released_at: app.released_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct HerokuAddon {
    id: String,
    name: String,
    plan: NamedRef,
}

#[derive(Debug, Deserialize)]
struct HerokuCollaborator {
    user: EmailRef,
}

#[derive(Debug, Deserialize)]
struct HerokuDomain {
    hostname: String,
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HerokuFormation {
    #[serde(rename = "type")]
    process_type: String,
    quantity: u32,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HerokuDyno {
    name: String,
    command: String,
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HerokuLogSession {
    logplex_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_from_wire() {
        let wire: HerokuApp = serde_json::from_str(
            r#"{
                "name": "awesomeapp",
                "git_url": "https://git.heroku.com/awesomeapp.git",
                "web_url": "https://awesomeapp.herokuapp.com/",
                "stack": {"id": "1", "name": "heroku-22"},
                "build_stack": {"id": "2", "name": "heroku-24"},
                "region": {"id": "3", "name": "us"},
                "owner": {"id": "4", "email": "ops@example.com"},
                "maintenance": false,
                "repo_size": null,
                "slug_size": 52428800,
                "created_at": "2024-01-02T03:04:05Z",
                "released_at": null
            }"#,
        )
        .unwrap();

        let app: App = wire.into();
        assert_eq!(app.name, "awesomeapp");
        assert_eq!(app.effective_stack(), Some("heroku-24"));
        assert_eq!(app.region.as_deref(), Some("us"));
        assert_eq!(app.owner_email.as_deref(), Some("ops@example.com"));
        assert_eq!(app.slug_size, Some(52_428_800));
        assert!(app.created_at.is_some());
    }

    #[test]
    fn test_missing_git_url_is_derived() {
        let wire: HerokuApp = serde_json::from_str(r#"{"name": "demo"}"#).unwrap();
        let app: App = wire.into();
        assert_eq!(app.git_url, "https://git.heroku.com/demo.git");
        assert_eq!(app.effective_stack(), None);
    }

    #[test]
    fn test_api_base() {
        let backend = HerokuBackend::with_api_base("token", "http://localhost:9999");
        assert_eq!(backend.api_base(), "http://localhost:9999");
        assert_eq!(backend.url("/apps"), "http://localhost:9999/apps");
    }
}
