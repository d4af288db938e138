//! Drains the spool in batches and forwards them to the telemetry server
//! (spec §4.6). Never drops or reorders rows: the next cycle re-peeks from
//! the head and retries until the server acknowledges.

use crate::error::Result;
use crate::spool::Spool;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use telemetry_common::Sample;
use tokio::time::sleep;
use tracing::{info, warn};

#[derive(Serialize)]
struct IngestRequest<'a> {
    samples: &'a [Sample],
}

pub struct Uploader {
    client: Client,
    base_url: String,
    token: String,
    batch_size: usize,
    backoff_max: Duration,
    backoff: Duration,
}

impl Uploader {
    pub fn new(
        base_url: String,
        token: String,
        batch_size: usize,
        request_timeout: Duration,
        backoff_max: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            // TLS verification is always on; the https:// scheme was
            // validated once at startup and is never relaxed here.
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url,
            token,
            batch_size,
            backoff_max,
            backoff: Duration::from_secs(1),
        })
    }

    fn reset_backoff(&mut self) {
        self.backoff = Duration::from_secs(1);
    }

    async fn back_off(&mut self) {
        warn!(delay_s = self.backoff.as_secs(), "upload backoff");
        sleep(self.backoff).await;
        self.backoff = (self.backoff * 2).min(self.backoff_max);
    }

    /// Runs one upload cycle: peek a batch, POST it, ack on success.
    pub async fn upload_once(&mut self, spool: &Spool) -> Result<()> {
        let batch = spool.peek(self.batch_size).await?;
        if batch.is_empty() {
            return Ok(());
        }

        let rowids: Vec<i64> = batch.iter().map(|(id, _)| *id).collect();
        let samples: Vec<Sample> = batch.into_iter().map(|(_, s)| s).collect();
        let url = format!("{}/v1/ingest", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&IngestRequest { samples: &samples })
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => match resp.json::<serde_json::Value>().await
            {
                Ok(body) if body.get("inserted").is_some() => {
                    spool.ack(&rowids).await?;
                    self.reset_backoff();
                    info!(count = rowids.len(), "uploaded and acknowledged batch");
                    Ok(())
                }
                Ok(_) | Err(_) => {
                    warn!("malformed response body, not acknowledging batch");
                    self.back_off().await;
                    Ok(())
                }
            },
            Ok(resp) => {
                warn!(status = %resp.status(), "upload rejected, not acknowledging batch");
                self.back_off().await;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "upload transport error, not acknowledging batch");
                self.back_off().await;
                Ok(())
            }
        }
    }
}
