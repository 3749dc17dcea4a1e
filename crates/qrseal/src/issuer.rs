//! Label issuance.
//!
//! Issuing signs a fresh payload and upserts the item; rendering the QR
//! symbol and the canonical image is left to the caller.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;

use qrseal_core::{generate_nonce, sign_payload, Item, Keypair, Payload, Serial, VerifyKey};
use qrseal_store::Registry;

use crate::error::IssueError;

/// What to put on a new label.
#[derive(Debug, Clone)]
pub struct IssueRequest {
    pub product: String,
    pub serial: Serial,
    pub batch: String,
    /// Ground-truth image for later visual comparison.
    pub canonical_image_path: PathBuf,
}

/// A freshly issued label.
#[derive(Debug, Clone)]
pub struct IssuedLabel {
    pub item: Item,
    /// The string to encode into the QR symbol.
    pub wire: String,
}

/// Signs labels and records them in the registry.
pub struct Issuer<R> {
    keypair: Keypair,
    registry: Arc<R>,
}

impl<R: Registry> Issuer<R> {
    pub fn new(keypair: Keypair, registry: Arc<R>) -> Self {
        Self { keypair, registry }
    }

    pub fn verify_key(&self) -> VerifyKey {
        self.keypair.verify_key()
    }

    /// Issue a label dated today with a fresh nonce.
    pub async fn issue(&self, request: IssueRequest) -> Result<IssuedLabel, IssueError> {
        let today = chrono::Local::now().date_naive();
        self.issue_with(request, today, generate_nonce()).await
    }

    /// Issue with an explicit date and nonce.
    ///
    /// Re-issuing an existing serial replaces its record.
    pub async fn issue_with(
        &self,
        request: IssueRequest,
        manufacture_date: NaiveDate,
        nonce: impl Into<String>,
    ) -> Result<IssuedLabel, IssueError> {
        if request.serial.is_empty() {
            return Err(IssueError::InvalidRequest("serial must not be empty".into()));
        }

        let payload = Payload::new(
            request.product,
            request.serial,
            request.batch,
            manufacture_date,
            nonce,
        );
        let label = sign_payload(&payload, &self.keypair)?;
        let item = Item::from_label(&payload, &label, request.canonical_image_path);

        self.registry.create_item(&item).await?;

        info!(
            serial = %item.serial,
            product = %item.product,
            batch = %item.batch,
            "issued label"
        );

        Ok(IssuedLabel {
            wire: label.wire(),
            item,
        })
    }
}
