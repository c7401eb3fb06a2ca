use reqwest::blocking::Client;
use reqwest::{StatusCode, Url};
use serde_json::Value as Json;
use tracing::debug;

use super::{DocumentSink, SinkError};
use crate::error::PipelineError;
use crate::settings::IndexSettings;

const MAX_REASON_CHARS: usize = 300;

/// Elasticsearch document API over blocking HTTP.
pub struct ElasticClient {
    client: Client,
    base: String,
}

impl ElasticClient {
    pub fn new(settings: &IndexSettings) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| PipelineError::IndexUnavailable {
                endpoint: settings.url.clone(),
                reason: e.to_string(),
            })?;
        Ok(ElasticClient {
            client,
            base: settings.url.clone(),
        })
    }
}

/// `{base}/{index}/_doc[/{id}]`, with the id percent-encoded as one segment.
pub fn document_url(base: &str, index: &str, id: Option<&str>) -> Result<Url, String> {
    let mut url = Url::parse(base).map_err(|e| format!("bad index URL {}: {}", base, e))?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| format!("{} cannot be a base URL", base))?;
        segments.pop_if_empty().push(index).push("_doc");
        if let Some(id) = id {
            segments.push(id);
        }
    }
    Ok(url)
}

impl DocumentSink for ElasticClient {
    fn endpoint(&self) -> String {
        self.base.clone()
    }

    fn index_document(
        &mut self,
        index: &str,
        id: Option<&str>,
        body: &Json,
    ) -> Result<(), SinkError> {
        let url = document_url(&self.base, index, id).map_err(SinkError::Unavailable)?;
        let request = match id {
            Some(_) => self.client.put(url),
            None => self.client.post(url),
        };

        let resp = request
            .json(body)
            .send()
            .map_err(|e| SinkError::Unavailable(e.to_string()))?;
        let status = resp.status();
        debug!(status = status.as_u16(), id = id.unwrap_or("-"), "index response");

        if status.is_success() {
            return Ok(());
        }
        let text = resp.text().unwrap_or_default();
        let reason: String = text.chars().take(MAX_REASON_CHARS).collect();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            Err(SinkError::Unavailable(format!("{}: {}", status, reason)))
        } else {
            Err(SinkError::Rejected {
                status: status.as_u16(),
                reason,
            })
        }
    }
}
