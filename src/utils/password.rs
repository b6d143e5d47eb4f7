use hmac::Hmac;
use pbkdf2::pbkdf2;
use sha2::Sha256;
use rand::Rng;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};

type HmacSha256 = Hmac<Sha256>;

const ITERATIONS: u32 = 260000;
const KEY_LENGTH: usize = 32;

/// Hash un mot de passe avec PBKDF2-HMAC-SHA256
/// (260000 itérations, salt aléatoire de 16 bytes)
pub fn hash_password(password: &str) -> Result<String, String> {
    // Générer un salt aléatoire de 16 bytes
    let mut salt = [0u8; 16];
    rand::thread_rng().fill(&mut salt);

    // Calculer le hash PBKDF2
    let mut key = [0u8; KEY_LENGTH];
    pbkdf2::<HmacSha256>(password.as_bytes(), &salt, ITERATIONS, &mut key)
        .map_err(|e| format!("PBKDF2 hash generation failed: {}", e))?;

    let salt_b64 = URL_SAFE_NO_PAD.encode(salt);
    let hash_b64 = URL_SAFE_NO_PAD.encode(key);

    // Format: pbkdf2:sha256:iterations$salt$hash
    Ok(format!("pbkdf2:sha256:{}${}${}", ITERATIONS, salt_b64, hash_b64))
}

/// Vérifie un mot de passe contre un hash stocké
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, String> {
    // Parser le format: pbkdf2:sha256:iterations$salt$hash
    let parts: Vec<&str> = stored_hash.split('$').collect();
    if parts.len() != 3 {
        return Err("Invalid hash format".to_string());
    }

    let header_and_iterations = parts[0];
    let salt_str = parts[1];
    let hash_str = parts[2];

    // Extraire les itérations du header
    let header_parts: Vec<&str> = header_and_iterations.split(':').collect();
    if header_parts.len() != 3 || header_parts[0] != "pbkdf2" || header_parts[1] != "sha256" {
        return Err("Invalid header".to_string());
    }

    let iterations = header_parts[2]
        .parse::<u32>()
        .map_err(|_| "Invalid iterations".to_string())?;

    let salt = URL_SAFE_NO_PAD
        .decode(salt_str)
        .map_err(|e| format!("Salt decode failed: {}", e))?;
    let expected_hash = URL_SAFE_NO_PAD
        .decode(hash_str)
        .map_err(|e| format!("Hash decode failed: {}", e))?;

    // Calculer le hash avec le même salt et iterations
    let mut computed = vec![0u8; expected_hash.len()];
    pbkdf2::<HmacSha256>(password.as_bytes(), &salt, iterations, &mut computed)
        .map_err(|e| format!("PBKDF2 hash verification failed: {}", e))?;

    Ok(computed == expected_hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("s3cret-pass").unwrap();

        assert!(hash.starts_with("pbkdf2:sha256:260000$"));
        assert!(verify_password("s3cret-pass", &hash).unwrap());
    }

    #[test]
    fn test_wrong_password_rejected() {
        let hash = hash_password("s3cret-pass").unwrap();

        assert!(!verify_password("wrong-pass", &hash).unwrap());
    }

    #[test]
    fn test_invalid_format_rejected() {
        assert!(verify_password("whatever", "not-a-valid-hash").is_err());
        assert!(verify_password("whatever", "md5:foo:1$abc$def").is_err());
    }
}
