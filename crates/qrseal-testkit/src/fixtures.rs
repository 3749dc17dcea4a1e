//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: a signing key, a registry, and a
//! scratch directory holding canonical label images.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use tempfile::TempDir;

use qrseal::{IssueRequest, IssuedLabel, Issuer, Verifier, VerifierConfig};
use qrseal_core::{generate_nonce, Keypair, Serial, VerifyKey};
use qrseal_store::{MemoryRegistry, Registry, SqliteRegistry};
use qrseal_vision::ImagePrimitives;

use crate::images;
use crate::scripted::ScriptedPrimitives;

/// Manufacture date stamped on fixture labels.
pub fn fixture_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 15).unwrap_or_default()
}

/// A test fixture with a keypair, a registry, and a scratch directory.
pub struct TestFixture<R = MemoryRegistry> {
    pub keypair: Keypair,
    pub registry: Arc<R>,
    dir: TempDir,
}

impl TestFixture<MemoryRegistry> {
    /// Create a new test fixture with a random keypair.
    pub fn new() -> anyhow::Result<Self> {
        Self::with_keypair(Keypair::generate(), MemoryRegistry::new())
    }

    /// Create with a deterministic keypair from seed.
    pub fn with_seed(seed: [u8; 32]) -> anyhow::Result<Self> {
        Self::with_keypair(Keypair::from_seed(&seed), MemoryRegistry::new())
    }
}

impl TestFixture<SqliteRegistry> {
    /// A fixture backed by a SQLite file inside the scratch directory.
    pub fn sqlite(seed: [u8; 32]) -> anyhow::Result<Self> {
        let dir = tempfile::tempdir().context("creating fixture directory")?;
        let registry = SqliteRegistry::open(dir.path().join("qrseal.db"))?;
        Ok(Self {
            keypair: Keypair::from_seed(&seed),
            registry: Arc::new(registry),
            dir,
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("qrseal.db")
    }
}

impl<R: Registry> TestFixture<R> {
    pub fn with_keypair(keypair: Keypair, registry: R) -> anyhow::Result<Self> {
        Ok(Self {
            keypair,
            registry: Arc::new(registry),
            dir: tempfile::tempdir().context("creating fixture directory")?,
        })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn verify_key(&self) -> VerifyKey {
        self.keypair.verify_key()
    }

    /// Where the canonical image for `serial` lives.
    pub fn canonical_path(&self, serial: &str) -> PathBuf {
        self.dir.path().join("labels").join(format!("{}.png", serial))
    }

    pub fn issuer(&self) -> Issuer<R> {
        Issuer::new(self.keypair.clone(), self.registry.clone())
    }

    /// A verifier with default configuration.
    pub fn verifier<P: ImagePrimitives>(&self, primitives: P) -> Verifier<R, P> {
        self.verifier_with(primitives, VerifierConfig::default())
    }

    pub fn verifier_with<P: ImagePrimitives>(
        &self,
        primitives: P,
        config: VerifierConfig,
    ) -> Verifier<R, P> {
        Verifier::new(self.registry.clone(), primitives, self.verify_key(), config)
    }

    /// Issue a "Widget" label for `serial`. No canonical image is written.
    pub async fn issue(&self, serial: &str) -> anyhow::Result<IssuedLabel> {
        let request = IssueRequest {
            product: "Widget".into(),
            serial: Serial::from(serial),
            batch: "B1".into(),
            canonical_image_path: self.canonical_path(serial),
        };
        let issued = self
            .issuer()
            .issue_with(request, fixture_date(), generate_nonce())
            .await?;
        Ok(issued)
    }

    /// Issue a label whose canonical image [`ScriptedPrimitives`] recognises.
    pub async fn issue_scripted(&self, serial: &str) -> anyhow::Result<IssuedLabel> {
        let issued = self.issue(serial).await?;
        ScriptedPrimitives::write_canonical(&issued.item.canonical_image_path)?;
        Ok(issued)
    }

    /// Issue a label whose canonical image is the PNG [`images::label_image`].
    pub async fn issue_png(&self, serial: &str, variant: u32) -> anyhow::Result<IssuedLabel> {
        let issued = self.issue(serial).await?;
        images::write_png(
            &images::label_image(variant),
            &issued.item.canonical_image_path,
        )?;
        Ok(issued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qrseal_core::decode;

    #[tokio::test]
    async fn test_fixture_issue() {
        let fixture = TestFixture::with_seed([9; 32]).unwrap();
        let issued = fixture.issue("SER001").await.unwrap();

        let payload = decode(&issued.wire, &fixture.verify_key()).unwrap();
        assert_eq!(payload.serial, Serial::from("SER001"));
        assert_eq!(payload.manufacture_date, Some(fixture_date()));
        assert_eq!(fixture.registry.item_count().await.unwrap(), 1);
        assert!(!issued.item.canonical_image_path.exists());
    }

    #[tokio::test]
    async fn test_fixture_writes_canonical_images() {
        let fixture = TestFixture::new().unwrap();

        let scripted = fixture.issue_scripted("SER-S").await.unwrap();
        let png = fixture.issue_png("SER-P", 0).await.unwrap();

        assert!(scripted.item.canonical_image_path.exists());
        assert!(png.item.canonical_image_path.starts_with(fixture.dir()));
        let img = image::open(&png.item.canonical_image_path).unwrap().to_luma8();
        assert_eq!(img, images::label_image(0));
    }

    #[tokio::test]
    async fn test_sqlite_fixture() {
        let fixture = TestFixture::sqlite([3; 32]).unwrap();
        fixture.issue("SER001").await.unwrap();

        assert!(fixture.db_path().exists());
        assert_eq!(fixture.registry.item_count().await.unwrap(), 1);
    }
}
