use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, Context};
use reqwest::{Client, StatusCode, Url};
use reqwest::header::COOKIE;
use reqwest::multipart::{Form, Part};
use thiserror::Error;
use tracing::trace;

use updater_rest_api::dto::{PluginVersionDto, RejectionDto, UploadReportDto};
use updater_rest_api::endpoints::{GET_PLUGINS, POST_PLUGINS};
use updater_rest_api::session::{encode_token, TOKEN_COOKIE};

pub struct RegistryRestClient {
    url: String,
    client: Client,
    token: Option<String>,
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Upload rejected: {0}")]
    Rejected(String),
    #[error("Upload requires valid credentials")]
    Unauthorized,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RegistryRestClient {
    pub fn new(url: &str) -> Self {
        let mut url = String::from(url.trim_end_matches('/'));
        if !url.starts_with("http") {
            url = format!("http://{}", url);
        }
        Self {
            url,
            client: Client::new(),
            token: None,
        }
    }

    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.token = Some(encode_token(username, password));
        self
    }

    pub async fn get_versions(&self) -> anyhow::Result<BTreeMap<String, String>> {
        let url = Url::parse(&format!("{}{}", self.url, GET_PLUGINS))?;
        trace!("Request url: {url:?}");
        let response = self.client.get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response)
    }

    pub async fn get_version(&self, name: &str) -> anyhow::Result<Option<String>> {
        let mut url = Url::parse(&format!("{}/plugin", self.url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Url '{}' cannot have path segments", self.url))?
            .push(name);
        trace!("Request url: {url:?}");
        let response = self.client.get(url)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let dto: PluginVersionDto = response.error_for_status()?
            .json()
            .await?;
        Ok(Some(dto.version))
    }

    pub async fn upload(&self, archive: &Path) -> Result<UploadReportDto, UploadError> {
        let data = tokio::fs::read(archive)
            .await
            .with_context(|| format!("Cannot read '{}'", archive.display()))?;
        let file_name = archive.file_name()
            .and_then(|file_name| file_name.to_str())
            .unwrap_or("plugin.jar")
            .to_string();
        let form = Form::new().part("files", Part::bytes(data).file_name(file_name));

        let url = Url::parse(&format!("{}{}", self.url, POST_PLUGINS)).context("Invalid registry url")?;
        trace!("Request url: {url:?}");
        let mut request = self.client.post(url).multipart(form);
        if let Some(token) = &self.token {
            request = request.header(COOKIE, format!("{TOKEN_COOKIE}={token}"));
        }
        let response = request.send()
            .await
            .context("Upload request failed")?;

        match response.status() {
            StatusCode::UNAUTHORIZED => Err(UploadError::Unauthorized),
            StatusCode::BAD_REQUEST => {
                let rejection: RejectionDto = response.json()
                    .await
                    .context("Unexpected rejection body")?;
                Err(UploadError::Rejected(rejection.reason))
            }
            status if status.is_success() => Ok(response.json()
                .await
                .context("Unexpected upload report")?),
            status => Err(anyhow!("Upload failed with status {status}").into()),
        }
    }
}
