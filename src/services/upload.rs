use actix_multipart::Multipart;
use futures::TryStreamExt;
use rand::Rng;
use std::collections::HashMap;
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Politique d'upload canonique pour une classe d'asset.
/// Une seule définition par classe (image de cours, vidéo de leçon),
/// sélectionnée par la route, jamais dupliquée par route.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub field_name: &'static str,
    pub allowed_mime: &'static [&'static str],
    pub allowed_extensions: &'static [&'static str],
    pub max_bytes: usize,
    pub dest_dir: &'static str,
}

/// Fichier accepté et écrit sur disque
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub path: String, // Chemin relatif (ex: uploads/courseImages/1724680000123_a3f9c2.png)
    pub original_name: String,
    pub size: usize,
}

impl UploadPolicy {
    /// Images de couverture de cours: 5 MB max
    pub fn course_image() -> Self {
        UploadPolicy {
            field_name: "courseImage",
            allowed_mime: &["image/jpeg", "image/jpg", "image/png", "image/gif"],
            allowed_extensions: &["jpeg", "jpg", "png", "gif"],
            max_bytes: 5 * 1024 * 1024,
            dest_dir: "uploads/courseImages",
        }
    }

    /// Vidéos de leçon: 50 MB max
    pub fn lesson_video() -> Self {
        UploadPolicy {
            field_name: "lessonVideo",
            allowed_mime: &["video/mp4", "video/x-msvideo", "video/quicktime", "video/x-matroska"],
            allowed_extensions: &["mp4", "avi", "mov", "mkv"],
            max_bytes: 50 * 1024 * 1024,
            dest_dir: "uploads/lessonVideos",
        }
    }

    /// Valide le fichier par son type MIME déclaré ET son extension.
    /// Les deux vérifications doivent passer. Retourne l'extension normalisée.
    pub fn validate(&self, filename: &str, content_type: &str) -> Result<String, String> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .ok_or_else(|| format!("File '{}' has no extension", filename))?;

        if !self.allowed_extensions.contains(&extension.as_str()) {
            return Err(format!(
                "Extension '.{}' not allowed (expected one of: {})",
                extension,
                self.allowed_extensions.join(", ")
            ));
        }

        let content_type = content_type.to_lowercase();
        if !self.allowed_mime.contains(&content_type.as_str()) {
            return Err(format!(
                "MIME type '{}' not allowed (expected one of: {})",
                content_type,
                self.allowed_mime.join(", ")
            ));
        }

        Ok(extension)
    }

    /// Génère un nom de fichier: timestamp milliseconde + suffixe aléatoire +
    /// extension d'origine. Le suffixe couvre le cas de deux uploads
    /// concurrents dans la même milliseconde.
    pub fn generate_filename(&self, extension: &str) -> String {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let suffix: u32 = rand::thread_rng().gen_range(0..0x1000000);
        format!("{}_{:06x}.{}", timestamp, suffix, extension)
    }
}

/// Parcourt un payload multipart: collecte les champs texte et écrit
/// l'éventuel fichier (sous le nom de champ fixé par la politique) sur disque.
/// Un fichier invalide ou trop gros est rejeté (le partiel est supprimé);
/// la route traduit l'erreur en 400.
pub async fn collect_form(
    mut payload: Multipart,
    policy: &UploadPolicy,
) -> Result<(HashMap<String, String>, Option<StoredFile>), String> {
    let mut text_fields: HashMap<String, String> = HashMap::new();
    let mut stored_file: Option<StoredFile> = None;

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| format!("Multipart error: {}", e))?
    {
        let field_name = field.name().unwrap_or_default().to_string();

        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(|f| f.to_string());

        match filename {
            // Champ fichier
            Some(original_name) => {
                if field_name != policy.field_name {
                    return Err(format!(
                        "Unexpected file field '{}' (expected '{}')",
                        field_name, policy.field_name
                    ));
                }
                if stored_file.is_some() {
                    return Err("Only one file per upload is accepted".to_string());
                }

                let content_type = field
                    .content_type()
                    .map(|m| m.to_string())
                    .unwrap_or_default();

                // 1. Valider MIME + extension avant d'écrire quoi que ce soit
                let extension = policy.validate(&original_name, &content_type)?;

                // 2. Écrire sur disque en streaming, plafond de taille inclus
                let generated = policy.generate_filename(&extension);
                let path = format!("{}/{}", policy.dest_dir, generated);

                let mut file = tokio::fs::File::create(&path)
                    .await
                    .map_err(|e| format!("Failed to create file: {}", e))?;

                let mut size: usize = 0;
                let mut too_large = false;

                while let Some(chunk) = field
                    .try_next()
                    .await
                    .map_err(|e| format!("Upload stream error: {}", e))?
                {
                    size += chunk.len();
                    if size > policy.max_bytes {
                        too_large = true;
                        break;
                    }
                    file.write_all(&chunk)
                        .await
                        .map_err(|e| format!("Failed to write file: {}", e))?;
                }

                if too_large {
                    drop(file);
                    let _ = tokio::fs::remove_file(&path).await;
                    return Err(format!(
                        "File exceeds the {} MB limit",
                        policy.max_bytes / (1024 * 1024)
                    ));
                }

                file.flush()
                    .await
                    .map_err(|e| format!("Failed to flush file: {}", e))?;

                stored_file = Some(StoredFile {
                    path,
                    original_name,
                    size,
                });
            }
            // Champ texte
            None => {
                let mut bytes: Vec<u8> = Vec::new();
                while let Some(chunk) = field
                    .try_next()
                    .await
                    .map_err(|e| format!("Multipart error: {}", e))?
                {
                    bytes.extend_from_slice(&chunk);
                }
                let value = String::from_utf8(bytes)
                    .map_err(|_| format!("Field '{}' is not valid UTF-8", field_name))?;
                text_fields.insert(field_name, value);
            }
        }
    }

    Ok((text_fields, stored_file))
}

/// Crée les répertoires de destination au démarrage
pub fn ensure_upload_dirs() -> std::io::Result<()> {
    std::fs::create_dir_all(UploadPolicy::course_image().dest_dir)?;
    std::fs::create_dir_all(UploadPolicy::lesson_video().dest_dir)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_image_accepted() {
        let policy = UploadPolicy::course_image();
        assert_eq!(policy.validate("cover.PNG", "image/png").unwrap(), "png");
    }

    #[test]
    fn test_extension_ok_but_mime_rejected() {
        // Les deux vérifications doivent passer, pas seulement l'extension
        let policy = UploadPolicy::course_image();
        assert!(policy.validate("cover.png", "application/octet-stream").is_err());
    }

    #[test]
    fn test_mime_ok_but_extension_rejected() {
        let policy = UploadPolicy::course_image();
        assert!(policy.validate("cover.webp", "image/png").is_err());
    }

    #[test]
    fn test_missing_extension_rejected() {
        let policy = UploadPolicy::lesson_video();
        assert!(policy.validate("lesson", "video/mp4").is_err());
    }

    #[test]
    fn test_video_policy_allow_lists() {
        let policy = UploadPolicy::lesson_video();
        assert!(policy.validate("intro.mp4", "video/mp4").is_ok());
        assert!(policy.validate("intro.mov", "video/quicktime").is_ok());
        // Une image ne passe pas par le pipeline vidéo
        assert!(policy.validate("intro.png", "image/png").is_err());
    }

    #[test]
    fn test_generated_filename_shape() {
        let policy = UploadPolicy::course_image();
        let name = policy.generate_filename("png");

        assert!(name.ends_with(".png"));
        // timestamp + '_' + suffixe hexadécimal
        let stem = name.trim_end_matches(".png");
        let parts: Vec<&str> = stem.split('_').collect();
        assert_eq!(parts.len(), 2);
        assert!(parts[0].parse::<i64>().is_ok());
        assert!(parts[1].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generated_filenames_differ() {
        let policy = UploadPolicy::lesson_video();
        let a = policy.generate_filename("mp4");
        let b = policy.generate_filename("mp4");
        assert_ne!(a, b);
    }
}
