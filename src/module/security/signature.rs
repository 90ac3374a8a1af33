//! HMAC-SHA256 module signatures
//!
//! A module file `foo.module` is signed by a sidecar `foo.module.hmac`
//! holding the lowercase hex HMAC of the file bytes.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::module::traits::ModuleError;

type HmacSha256 = Hmac<Sha256>;

/// Sidecar file extension
pub const SIGNATURE_EXTENSION: &str = "hmac";

/// Hex digits in an HMAC-SHA256 digest
const DIGEST_HEX_LEN: usize = 64;

/// Domain separation for keys derived from the machine identity
const MACHINE_KEY_CONTEXT: &[u8] = b"sentinel-module-hmac:";

/// Last-resort key when neither a configured key nor a machine id exists
const FALLBACK_KEY: &[u8] = b"sentinel-default-module-key";

/// Where the active key came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Configured,
    MachineId,
    Fallback,
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            KeySource::Configured => "configured",
            KeySource::MachineId => "machine-id",
            KeySource::Fallback => "fallback",
        })
    }
}

/// HMAC key material, wiped on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct HmacKey {
    bytes: Vec<u8>,
    #[zeroize(skip)]
    source: KeySource,
}

impl fmt::Debug for HmacKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmacKey")
            .field("bytes", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

impl HmacKey {
    pub fn configured(key: &str) -> Self {
        Self {
            bytes: key.as_bytes().to_vec(),
            source: KeySource::Configured,
        }
    }

    /// Derive a key from the machine identity file
    pub fn from_machine_id(path: &Path) -> Option<Self> {
        let id = fs::read_to_string(path).ok()?;
        let id = id.trim();
        if id.is_empty() {
            return None;
        }
        let mut hasher = Sha256::new();
        hasher.update(MACHINE_KEY_CONTEXT);
        hasher.update(id.as_bytes());
        Some(Self {
            bytes: hasher.finalize().to_vec(),
            source: KeySource::MachineId,
        })
    }

    pub fn fallback() -> Self {
        Self {
            bytes: FALLBACK_KEY.to_vec(),
            source: KeySource::Fallback,
        }
    }

    /// Pick the first available key: configured, machine id, fallback
    pub fn resolve(configured: Option<&str>, machine_id_path: &Path) -> Self {
        let key = match configured.filter(|k| !k.is_empty()) {
            Some(key) => Self::configured(key),
            None => Self::from_machine_id(machine_id_path).unwrap_or_else(Self::fallback),
        };
        debug!("Using {} HMAC key", key.source);
        key
    }

    pub fn source(&self) -> KeySource {
        self.source
    }

    fn mac(&self) -> Result<HmacSha256, ModuleError> {
        HmacSha256::new_from_slice(&self.bytes)
            .map_err(|e| ModuleError::Signature(format!("invalid key: {}", e)))
    }

    /// Hex HMAC of `data`
    pub fn sign(&self, data: &[u8]) -> Result<String, ModuleError> {
        let mut mac = self.mac()?;
        mac.update(data);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Constant-time check of a signature against `data`
    ///
    /// The signature must be exactly 64 lowercase hex digits, optionally
    /// followed by a single newline. Anything else is malformed.
    pub fn verify(&self, data: &[u8], signature_hex: &str) -> Result<bool, ModuleError> {
        let digest = signature_hex.strip_suffix('\n').unwrap_or(signature_hex);
        let well_formed = digest.len() == DIGEST_HEX_LEN
            && digest.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if !well_formed {
            return Err(ModuleError::Signature(format!(
                "malformed signature: expected {} lowercase hex digits",
                DIGEST_HEX_LEN
            )));
        }
        let expected = hex::decode(digest)
            .map_err(|e| ModuleError::Signature(format!("malformed signature: {}", e)))?;
        let mut mac = self.mac()?;
        mac.update(data);
        Ok(mac.verify_slice(&expected).is_ok())
    }
}

/// Sidecar path for a module file: `<file>.hmac`
pub fn signature_path(module_path: &Path) -> PathBuf {
    let mut name = module_path.as_os_str().to_os_string();
    name.push(".");
    name.push(SIGNATURE_EXTENSION);
    PathBuf::from(name)
}

/// Signature state of one module file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureStatus {
    Valid,
    Missing,
    Mismatch(String),
}

/// Check `data` (the module file's bytes) against its sidecar
pub fn verify_signature(key: &HmacKey, module_path: &Path, data: &[u8]) -> SignatureStatus {
    let sidecar = signature_path(module_path);
    let stored = match fs::read_to_string(&sidecar) {
        Ok(stored) => stored,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return SignatureStatus::Missing,
        Err(e) => return SignatureStatus::Mismatch(format!("unreadable signature: {}", e)),
    };

    match key.verify(data, &stored) {
        Ok(true) => SignatureStatus::Valid,
        Ok(false) => SignatureStatus::Mismatch("HMAC does not match file contents".to_string()),
        Err(e) => SignatureStatus::Mismatch(e.to_string()),
    }
}

/// Write the sidecar for a module file, returning its path
pub fn sign_file(key: &HmacKey, module_path: &Path) -> Result<PathBuf, ModuleError> {
    let data = fs::read(module_path).map_err(|e| ModuleError::io(module_path, e))?;
    let signature = key.sign(&data)?;
    let sidecar = signature_path(module_path);
    fs::write(&sidecar, format!("{}\n", signature)).map_err(|e| ModuleError::io(&sidecar, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&sidecar, fs::Permissions::from_mode(0o600))
            .map_err(|e| ModuleError::io(&sidecar, e))?;
    }

    info!("Signed {:?} with {} key", module_path, key.source());
    Ok(sidecar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sidecar_path() {
        assert_eq!(
            signature_path(Path::new("/m/foo.module")),
            PathBuf::from("/m/foo.module.hmac")
        );
    }

    #[test]
    fn test_known_vector() {
        // RFC 4231 test case 2
        let key = HmacKey::configured("Jefe");
        assert_eq!(
            key.sign(b"what do ya want for nothing?").unwrap(),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_sign_then_verify_file() {
        let dir = TempDir::new().unwrap();
        let module = dir.path().join("foo.module");
        fs::write(&module, "FOO=bar\n").unwrap();

        let key = HmacKey::configured("secret");
        assert_eq!(
            verify_signature(&key, &module, b"FOO=bar\n"),
            SignatureStatus::Missing
        );

        let sidecar = sign_file(&key, &module).unwrap();
        assert!(sidecar.exists());
        assert_eq!(
            verify_signature(&key, &module, b"FOO=bar\n"),
            SignatureStatus::Valid
        );
        assert!(matches!(
            verify_signature(&key, &module, b"FOO=baz\n"),
            SignatureStatus::Mismatch(_)
        ));
        assert!(matches!(
            verify_signature(&HmacKey::configured("other"), &module, b"FOO=bar\n"),
            SignatureStatus::Mismatch(_)
        ));
    }

    #[test]
    fn test_malformed_sidecar_is_mismatch() {
        let dir = TempDir::new().unwrap();
        let module = dir.path().join("foo.module");
        fs::write(&module, "FOO=bar\n").unwrap();
        fs::write(signature_path(&module), "not hex at all\n").unwrap();

        let key = HmacKey::fallback();
        assert!(matches!(
            verify_signature(&key, &module, b"FOO=bar\n"),
            SignatureStatus::Mismatch(_)
        ));
    }

    #[test]
    fn test_sidecar_format_is_exact() {
        let key = HmacKey::configured("secret");
        let digest = key.sign(b"X=1\n").unwrap();

        assert!(key.verify(b"X=1\n", &digest).unwrap());
        assert!(key.verify(b"X=1\n", &format!("{}\n", digest)).unwrap());

        for bad in [
            format!("{} ", digest),
            format!("{}\t", digest),
            format!("{}\r\n", digest),
            format!("{}\n\n", digest),
            format!(" {}", digest),
            digest.to_uppercase(),
            digest[..63].to_string(),
        ] {
            assert!(key.verify(b"X=1\n", &bad).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_key_resolution_order() {
        let dir = TempDir::new().unwrap();
        let machine_id = dir.path().join("machine-id");

        let key = HmacKey::resolve(None, &machine_id);
        assert_eq!(key.source(), KeySource::Fallback);

        fs::write(&machine_id, "0123456789abcdef\n").unwrap();
        let derived = HmacKey::resolve(Some(""), &machine_id);
        assert_eq!(derived.source(), KeySource::MachineId);
        // Trailing newline in the id file does not change the key
        fs::write(&machine_id, "0123456789abcdef").unwrap();
        let again = HmacKey::resolve(None, &machine_id);
        assert_eq!(derived.sign(b"x").unwrap(), again.sign(b"x").unwrap());

        let configured = HmacKey::resolve(Some("k"), &machine_id);
        assert_eq!(configured.source(), KeySource::Configured);
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = HmacKey::configured("hunter2");
        assert!(!format!("{:?}", key).contains("hunter2"));
    }
}
