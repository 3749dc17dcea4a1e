//! Key material on disk.
//!
//! The signing key file holds the raw 32-byte Ed25519 seed. A 64-character
//! hex seed is also accepted so keys can be provisioned as text.

use std::path::Path;

use tracing::info;

use qrseal_core::{KeyError, Keypair, VerifyKey};

use crate::config::EngineConfig;
use crate::error::ConfigError;

fn key_file_error(path: &Path, source: std::io::Error) -> ConfigError {
    ConfigError::KeyFile {
        path: path.display().to_string(),
        source,
    }
}

/// Load the signing key from `path`.
pub fn load_signing_key(path: impl AsRef<Path>) -> Result<Keypair, ConfigError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| key_file_error(path, e))?;

    if bytes.len() == 32 {
        return Ok(Keypair::from_seed_slice(&bytes)?);
    }

    let text = String::from_utf8_lossy(&bytes);
    let text = text.trim();
    if text.len() == 64 {
        let seed = hex::decode(text).map_err(|e| KeyError::Encoding(e.to_string()))?;
        return Ok(Keypair::from_seed_slice(&seed)?);
    }

    Err(KeyError::Length {
        expected: 32,
        got: bytes.len(),
    }
    .into())
}

/// Write `keypair`'s seed to `path`, creating parent directories.
///
/// On Unix the file is readable by its owner only.
pub fn write_signing_key(path: impl AsRef<Path>, keypair: &Keypair) -> Result<(), ConfigError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| key_file_error(path, e))?;
        }
    }
    std::fs::write(path, keypair.seed()).map_err(|e| key_file_error(path, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .map_err(|e| key_file_error(path, e))?;
    }

    info!(path = %path.display(), verify_key = %keypair.verify_key().to_base64url(), "wrote signing key");
    Ok(())
}

/// The verify key: the configured override if present, else derived from
/// the signing key file.
pub fn load_verify_key(config: &EngineConfig) -> Result<VerifyKey, ConfigError> {
    match &config.public_key_b64 {
        Some(encoded) => Ok(VerifyKey::from_base64url(encoded)?),
        None => Ok(load_signing_key(&config.key_path)?.verify_key()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys").join("private_key.pem");
        let keypair = Keypair::generate();

        write_signing_key(&path, &keypair).unwrap();
        let loaded = load_signing_key(&path).unwrap();

        assert_eq!(loaded.seed(), keypair.seed());
        assert_eq!(std::fs::read(&path).unwrap().len(), 32);
    }

    #[test]
    fn test_hex_seed_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.hex");
        std::fs::write(&path, format!("{}\n", hex::encode([0x42u8; 32]))).unwrap();

        let loaded = load_signing_key(&path).unwrap();
        assert_eq!(loaded.seed(), [0x42u8; 32]);
    }

    #[test]
    fn test_wrong_length_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short");
        std::fs::write(&path, [1u8; 31]).unwrap();

        assert!(matches!(
            load_signing_key(&path),
            Err(ConfigError::Key(KeyError::Length { expected: 32, got: 31 }))
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_signing_key(dir.path().join("nope")),
            Err(ConfigError::KeyFile { .. })
        ));
    }

    #[test]
    fn test_verify_key_override_wins() {
        let config = EngineConfig {
            key_path: "/definitely/not/here".into(),
            public_key_b64: Some("IVL40Zt5HSRFMkLhXy6rbLfP-ntqXtMAl5YOBpiB2xI".into()),
            ..EngineConfig::default()
        };
        let key = load_verify_key(&config).unwrap();
        assert_eq!(key, Keypair::from_seed(&[0x42; 32]).verify_key());
    }

    #[test]
    fn test_verify_key_from_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("private_key.pem");
        let keypair = Keypair::from_seed(&[9; 32]);
        write_signing_key(&path, &keypair).unwrap();

        let config = EngineConfig {
            key_path: path,
            ..EngineConfig::default()
        };
        assert_eq!(load_verify_key(&config).unwrap(), keypair.verify_key());
    }
}
