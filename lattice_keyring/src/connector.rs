//! Credential handshake with the companion connector page.
//!
//! The keyring opens the connector page, the user logs in to the device there, and the page
//! answers once with the device id and password. In environments with messaging the answer is
//! posted by the page, otherwise it navigates to a url embedding the base64 json payload in the
//! `creds` query parameter.

use std::time::Duration;

use base64::Engine;
use url::{Origin, Url};

use crate::consts::UNKNOWN_APP_NAME;
use crate::credentials::{Credentials, CredentialsPayload};
use crate::error::BoxError;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectorMessage {
    /// A message posted by a page, `origin` is the sender origin
    Posted { origin: String, data: String },

    /// The page navigated to `url`
    Navigated { url: String },
}

/// An opened connector page.
///
/// Dropping it must close the page and unregister any listener.
pub trait Surface {
    /// Next message received from the page, if any.
    fn try_recv(&mut self) -> Option<ConnectorMessage>;

    fn is_closed(&self) -> bool;
}

/// Opens connector pages, for example a browser tab.
pub trait Connector {
    type Surface: Surface;

    fn open(&mut self, url: &Url) -> std::result::Result<Self::Surface, BoxError>;
}

#[derive(Debug, Clone)]
pub(crate) struct Handshake {
    pub(crate) connector_url: String,
    pub(crate) poll_interval: Duration,
    pub(crate) timeout: Duration,
}

impl Handshake {
    /// The url opened to ask for credentials.
    pub(crate) fn url(&self, app_name: &str) -> Result<Url> {
        let name = if app_name.is_empty() {
            UNKNOWN_APP_NAME
        } else {
            app_name
        };
        Ok(Url::parse_with_params(
            &self.connector_url,
            &[("keyring", name), ("forceLogin", "true")],
        )?)
    }

    /// Open the connector and wait for the credentials.
    ///
    /// Settles once: on the first valid answer, on an invalid answer from the connector
    /// origin, when the page is closed or when the timeout expires. The surface is dropped on
    /// every path.
    pub(crate) async fn run<C: Connector>(
        &self,
        connector: &mut C,
        app_name: &str,
    ) -> Result<Credentials> {
        let url = self.url(app_name)?;
        let origin = url.origin();
        tracing::info!("opening connector {url}");
        let mut surface = connector.open(&url).map_err(Error::ConnectorOpen)?;

        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);
        // interval panics on a zero period
        let mut interval = tokio::time::interval(self.poll_interval.max(Duration::from_millis(1)));

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    tracing::warn!("connector did not answer in {:?}", self.timeout);
                    return Err(Error::ConnectorClosed);
                }
                _ = interval.tick() => {
                    while let Some(message) = surface.try_recv() {
                        if let Some(result) = parse_message(&origin, message) {
                            return result;
                        }
                    }
                    if surface.is_closed() {
                        return Err(Error::ConnectorClosed);
                    }
                }
            }
        }
    }
}

/// `None` for messages not meant for us, which are ignored.
fn parse_message(origin: &Origin, message: ConnectorMessage) -> Option<Result<Credentials>> {
    match message {
        ConnectorMessage::Posted {
            origin: sender,
            data,
        } => {
            if !same_origin(origin, &sender) {
                tracing::warn!("ignoring message from {sender}");
                return None;
            }
            Some(parse_payload(&data))
        }
        ConnectorMessage::Navigated { url } => {
            let url = Url::parse(&url).ok()?;
            if &url.origin() != origin {
                return None;
            }
            let encoded = url
                .query_pairs()
                .find(|(k, _)| k == "creds")
                .map(|(_, v)| v.replace(' ', "+"))?;
            Some(decode_payload(&encoded))
        }
    }
}

fn same_origin(origin: &Origin, sender: &str) -> bool {
    Url::parse(sender)
        .map(|u| &u.origin() == origin)
        .unwrap_or(false)
}

fn decode_payload(encoded: &str) -> Result<Credentials> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(encoded)?;
    let data = String::from_utf8(bytes).map_err(|_| Error::InvalidCredentials)?;
    parse_payload(&data)
}

fn parse_payload(data: &str) -> Result<Credentials> {
    CredentialsPayload::from_json(data)
        .map_err(|_| Error::InvalidCredentials)?
        .into_credentials()
}
