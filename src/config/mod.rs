use std::collections::HashSet;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

const KIB: usize = 1024;
const MIB: usize = 1024 * KIB;
const GIB: u64 = 1024 * 1024 * 1024;

/// Extensions rejected at admission, compared case-insensitively.
pub const DEFAULT_BLOCKED_EXTENSIONS: &[&str] = &[
    "bat", "exe", "cmd", "sh", "ps1", "vbs", "js", "reg", "msi", "com", "scr", "gadget",
    "application", "msc", "jar", "vb", "vbe", "jse", "ws", "wsf", "wsc", "wsh", "ps1xml", "ps2",
    "ps2xml", "psc1", "psc2", "msh", "msh1", "msh2", "mshxml", "msh1xml", "msh2xml", "scf", "lnk",
    "inf", "sys",
];

/// What happens when an object is deleted while streams are still reading it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Remove the record now, unlink the bytes once the last stream closes.
    Defer,
    /// Refuse the delete with `ResourceBusy` while any stream is active.
    Reject,
}

impl FromStr for DeletePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "defer" => Ok(Self::Defer),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown delete policy: {}", other)),
        }
    }
}

/// Storage admission and delivery configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory holding `users/` and `tmp/` (default: ./storage)
    pub storage_root: PathBuf,

    /// Maximum accepted upload size in bytes (default: 20 GB)
    pub max_file_size: usize,

    /// Lowercase extensions refused at admission
    pub blocked_extensions: HashSet<String>,

    /// Chunk size for full responses and the medium tier (default: 1 MB)
    pub default_chunk_size: usize,

    /// Chunk size for the low tier (default: 256 KB)
    pub min_chunk_size: usize,

    /// Chunk size for the high tier (default: 4 MB)
    pub max_chunk_size: usize,

    /// Throughput above which a stream is classified high (default: 5 Mbps)
    pub quality_high_bps: u64,

    /// Throughput above which a stream is classified medium (default: 2 Mbps)
    pub quality_medium_bps: u64,

    /// Treat a zero/unset storage limit as unlimited (default: false)
    pub unlimited_quota_when_unset: bool,

    /// Limit assigned to newly provisioned principals (default: 50 GB)
    pub default_storage_limit: u64,

    /// Usage ratio reported as `warning` (default: 0.75)
    pub warning_threshold: f64,

    /// Usage ratio reported as `critical` (default: 0.90)
    pub critical_threshold: f64,

    /// Name resolution retries on a rename collision (default: 10)
    pub name_resolve_attempts: u32,

    /// Delete-while-streaming behaviour (default: defer)
    pub delete_policy: DeletePolicy,

    /// Rate limit: uploads per hour per user, 0 disables (default: 250)
    pub uploads_per_hour: u32,

    /// Staging file cleanup age in hours (default: 24)
    pub staging_cleanup_age_hours: u64,

    /// JWT Secret Key (Required in production)
    pub jwt_secret: String,

    /// Allowed CORS Origins (comma separated)
    pub allowed_origins: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("./storage"),
            max_file_size: (20 * GIB) as usize,
            blocked_extensions: DEFAULT_BLOCKED_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            default_chunk_size: MIB,
            min_chunk_size: 256 * KIB,
            max_chunk_size: 4 * MIB,
            quality_high_bps: 5_000_000,
            quality_medium_bps: 2_000_000,
            unlimited_quota_when_unset: false,
            default_storage_limit: 50 * GIB,
            warning_threshold: 0.75,
            critical_threshold: 0.90,
            name_resolve_attempts: 10,
            delete_policy: DeletePolicy::Defer,
            uploads_per_hour: 250,
            staging_cleanup_age_hours: 24,
            jwt_secret: "secret".to_string(),
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_flag(key: &str) -> Option<bool> {
    env::var(key)
        .ok()
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_list(key: &str) -> Option<Vec<String>> {
    env::var(key).ok().map(|v| {
        v.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

impl StorageConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            storage_root: env::var("STORAGE_ROOT")
                .map(PathBuf::from)
                .unwrap_or(default.storage_root),

            max_file_size: env_parse("MAX_FILE_SIZE").unwrap_or(default.max_file_size),

            blocked_extensions: env_list("BLOCKED_EXTENSIONS")
                .map(|list| {
                    list.into_iter()
                        .map(|e| e.trim_start_matches('.').to_lowercase())
                        .collect()
                })
                .unwrap_or(default.blocked_extensions),

            default_chunk_size: env_parse("CHUNK_SIZE").unwrap_or(default.default_chunk_size),
            min_chunk_size: env_parse("MIN_CHUNK_SIZE").unwrap_or(default.min_chunk_size),
            max_chunk_size: env_parse("MAX_CHUNK_SIZE").unwrap_or(default.max_chunk_size),

            quality_high_bps: env_parse("QUALITY_HIGH_BPS").unwrap_or(default.quality_high_bps),
            quality_medium_bps: env_parse("QUALITY_MEDIUM_BPS")
                .unwrap_or(default.quality_medium_bps),

            unlimited_quota_when_unset: env_flag("UNLIMITED_QUOTA_WHEN_UNSET")
                .unwrap_or(default.unlimited_quota_when_unset),

            default_storage_limit: env_parse("DEFAULT_STORAGE_LIMIT")
                .unwrap_or(default.default_storage_limit),

            warning_threshold: env_parse("WARNING_THRESHOLD").unwrap_or(default.warning_threshold),
            critical_threshold: env_parse("CRITICAL_THRESHOLD")
                .unwrap_or(default.critical_threshold),

            name_resolve_attempts: env_parse("NAME_RESOLVE_ATTEMPTS")
                .unwrap_or(default.name_resolve_attempts),

            delete_policy: env_parse("DELETE_POLICY").unwrap_or(default.delete_policy),

            uploads_per_hour: env_parse("UPLOADS_PER_HOUR").unwrap_or(default.uploads_per_hour),

            staging_cleanup_age_hours: env_parse("STAGING_CLEANUP_AGE_HOURS")
                .unwrap_or(default.staging_cleanup_age_hours),

            jwt_secret: env::var("JWT_SECRET").unwrap_or(default.jwt_secret),

            allowed_origins: env_list("ALLOWED_ORIGINS").unwrap_or(default.allowed_origins),
        }
    }

    /// Create config for development (relaxed limits, unlimited quota)
    pub fn development() -> Self {
        Self {
            storage_root: PathBuf::from("./storage-dev"),
            unlimited_quota_when_unset: true,
            uploads_per_hour: 0,
            staging_cleanup_age_hours: 1,
            ..Self::default()
        }
    }

    /// Create config for production (strict security)
    pub fn production() -> anyhow::Result<Self> {
        let secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("CRITICAL: JWT_SECRET must be set"))?;
        if env::var("ALLOWED_ORIGINS").is_err() {
            anyhow::bail!("CRITICAL: ALLOWED_ORIGINS must be set in production");
        }

        let config = Self {
            jwt_secret: secret,
            unlimited_quota_when_unset: false,
            ..Self::from_env()
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects combinations the streaming and quota code cannot work with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.min_chunk_size == 0 {
            anyhow::bail!("MIN_CHUNK_SIZE must be positive");
        }
        if !(self.min_chunk_size <= self.default_chunk_size
            && self.default_chunk_size <= self.max_chunk_size)
        {
            anyhow::bail!("chunk sizes must satisfy MIN_CHUNK_SIZE <= CHUNK_SIZE <= MAX_CHUNK_SIZE");
        }
        if self.quality_medium_bps > self.quality_high_bps {
            anyhow::bail!("QUALITY_MEDIUM_BPS must not exceed QUALITY_HIGH_BPS");
        }
        if self.warning_threshold > self.critical_threshold {
            anyhow::bail!("WARNING_THRESHOLD must not exceed CRITICAL_THRESHOLD");
        }
        if self.name_resolve_attempts == 0 {
            anyhow::bail!("NAME_RESOLVE_ATTEMPTS must be at least 1");
        }
        Ok(())
    }

    pub fn is_blocked_extension(&self, extension: &str) -> bool {
        self.blocked_extensions
            .contains(&extension.trim_start_matches('.').to_lowercase())
    }

    pub fn users_dir(&self) -> PathBuf {
        self.storage_root.join("users")
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.storage_root.join("tmp")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StorageConfig::default();
        assert_eq!(config.default_chunk_size, 1024 * 1024);
        assert_eq!(config.uploads_per_hour, 250);
        assert_eq!(config.delete_policy, DeletePolicy::Defer);
        assert!(!config.unlimited_quota_when_unset);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_blocked_extension_is_case_insensitive() {
        let config = StorageConfig::default();
        assert!(config.is_blocked_extension("EXE"));
        assert!(config.is_blocked_extension(".Bat"));
        assert!(!config.is_blocked_extension("mp4"));
    }

    #[test]
    fn test_development_config() {
        let config = StorageConfig::development();
        assert!(config.unlimited_quota_when_unset);
        assert_eq!(config.uploads_per_hour, 0);
    }

    #[test]
    fn test_production_requires_secret_and_origins() {
        unsafe {
            env::remove_var("JWT_SECRET");
            env::remove_var("ALLOWED_ORIGINS");
        }
        assert!(StorageConfig::production().is_err());

        unsafe {
            env::set_var("JWT_SECRET", "prod-secret");
            env::set_var("ALLOWED_ORIGINS", "https://nas.example.com");
        }
        let config = StorageConfig::production();
        unsafe {
            env::remove_var("JWT_SECRET");
            env::remove_var("ALLOWED_ORIGINS");
        }

        let config = config.unwrap();
        assert_eq!(config.jwt_secret, "prod-secret");
        assert_eq!(config.allowed_origins, vec!["https://nas.example.com".to_string()]);
        assert!(!config.unlimited_quota_when_unset);
    }

    #[test]
    fn test_delete_policy_parse() {
        assert_eq!("Reject".parse::<DeletePolicy>(), Ok(DeletePolicy::Reject));
        assert_eq!(" defer ".parse::<DeletePolicy>(), Ok(DeletePolicy::Defer));
        assert!("later".parse::<DeletePolicy>().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_chunks() {
        let config = StorageConfig {
            min_chunk_size: 8 * 1024 * 1024,
            ..StorageConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_env_overrides() {
        unsafe {
            env::set_var("NAME_RESOLVE_ATTEMPTS", "3");
            env::set_var("BLOCKED_EXTENSIONS", ".ISO, dmg");
        }
        let config = StorageConfig::from_env();
        unsafe {
            env::remove_var("NAME_RESOLVE_ATTEMPTS");
            env::remove_var("BLOCKED_EXTENSIONS");
        }
        assert_eq!(config.name_resolve_attempts, 3);
        assert!(config.is_blocked_extension("iso"));
        assert!(config.is_blocked_extension("DMG"));
        assert!(!config.is_blocked_extension("exe"));
    }
}
