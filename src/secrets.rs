use crate::error::InstallError;

/// How a secret value is generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    /// Long machine-consumed value, full alphanumeric alphabet.
    Token,
    /// Operator-typed credential; ambiguous glyphs (0/O, 1/l/I) excluded.
    Password,
}

/// Declares one configuration key whose value must be generated, never templated.
#[derive(Debug, Clone, Copy)]
pub struct SecretField {
    pub key: &'static str,
    pub kind: SecretKind,
    pub length: usize,
}

/// The fixed catalog of secret-typed keys in the environment file.
pub const SECRET_FIELDS: &[SecretField] = &[
    SecretField { key: "AUTH_SECRET", kind: SecretKind::Token, length: 32 },
    SecretField { key: "KEY_VAULTS_SECRET", kind: SecretKind::Token, length: 32 },
    SecretField { key: "POSTGRES_PASSWORD", kind: SecretKind::Password, length: 16 },
    SecretField { key: "MINIO_ROOT_PASSWORD", kind: SecretKind::Password, length: 8 },
];

const TOKEN_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const PASSWORD_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz23456789";

/// Generate a value for `field` from OS entropy.
///
/// Both alphabets are shell- and env-file-safe, so values never need quoting.
/// There is deliberately no fallback source: if the OS RNG is unavailable the
/// install fails rather than shipping weaker secrets.
pub fn generate(field: &SecretField) -> Result<String, InstallError> {
    let alphabet = match field.kind {
        SecretKind::Token => TOKEN_ALPHABET,
        SecretKind::Password => PASSWORD_ALPHABET,
    };

    // Rejection sampling keeps every alphabet character equally likely.
    let ceiling = (u8::MAX as usize / alphabet.len()) * alphabet.len();
    let mut out = String::with_capacity(field.length);
    let mut buf = [0u8; 64];
    while out.len() < field.length {
        getrandom::getrandom(&mut buf).map_err(InstallError::Entropy)?;
        for &byte in buf.iter() {
            if (byte as usize) < ceiling {
                out.push(alphabet[byte as usize % alphabet.len()] as char);
                if out.len() == field.length {
                    break;
                }
            }
        }
    }
    Ok(out)
}
