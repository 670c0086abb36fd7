use crate::http::{error_message, retry_hint, transport_kind};
use crate::message::encode_raw;
use anyhow::Context;
use probe_core::mailer::{MailSender, OutgoingMail};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};

#[derive(Serialize)]
struct SendRequest {
    raw: String,
}

#[derive(Deserialize)]
struct SendResponse {
    id: String,
}

pub struct GmailSender {
    client: Client,
    endpoint: String,
    access_token: String,
}

impl GmailSender {
    pub fn new(
        client: Client,
        endpoint: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            access_token: access_token.into(),
        }
    }
}

impl MailSender for GmailSender {
    fn send(&self, mail: &OutgoingMail<'_>) -> anyhow::Result<u16> {
        let request = SendRequest {
            raw: encode_raw(mail),
        };
        let started = Instant::now();
        let response = match self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
        {
            Ok(response) => response,
            Err(err) => {
                let kind = transport_kind(&err);
                return Err(err).with_context(|| format!("send message to {} ({kind})", mail.to));
            }
        };
        let elapsed = started.elapsed();
        let status = response.status();

        if status.is_success() {
            let id = match response.json::<SendResponse>() {
                Ok(body) => body.id,
                Err(err) => {
                    warn!(error = %err, "could not decode send response");
                    "<unknown>".to_string()
                }
            };
            info!(
                message_id = %id,
                to = mail.to,
                elapsed_ms = elapsed.as_millis() as u64,
                "message accepted"
            );
            println!("Message {id} sent in {elapsed:?}");
            return Ok(status.as_u16());
        }

        let hint = retry_hint(response.headers());
        let body = response.text().unwrap_or_default();
        let message = error_message(&body);
        warn!(
            status = status.as_u16(),
            to = mail.to,
            retry_hint = ?hint,
            error = %message,
            "message rejected"
        );
        println!("Error: {status} {message}");
        Ok(status.as_u16())
    }
}
