//! Synthetic Android device identity and the fixed client header profile.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

/// Application id the service expects from the Android client.
pub const APP_ID: &str = "com.bigwinepot.nwdn.international";
/// User agent of the Android client's HTTP stack.
pub const USER_AGENT: &str = "okhttp/4.12.0";
/// Header carrying the session token on authenticated requests.
pub const TOKEN_HEADER: &str = "identity-token";

const APP_SET_ID: &str = "d44bd45a-a45d-4470-9674-7348a8e3fb71";

/// Headers every request carries, regardless of the device identity.
const PLATFORM_HEADERS: &[(&str, &str)] = &[
    ("bsp-id", "com.bigwinepot.nwdn.international.android"),
    ("build-number", "202514479"),
    ("build-version", "3.7.1020"),
    ("country", "US"),
    ("device-manufacturer", "Samsung"),
    ("device-model", "SM-G998B"),
    ("device-type", "6.8"),
    ("language", "en"),
    ("locale", "en_US"),
    ("os-version", "33"),
    ("platform", "Android"),
    ("timezone", "America/New_York"),
    ("accept-encoding", "gzip"),
    ("user-agent", USER_AGENT),
];

/// Identifiers impersonating one app installation.
///
/// Generated fresh for every client instance and never persisted. Tests can
/// build a fixed set with [`DeviceIdentity::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// 16 hex chars (Android `ANDROID_ID`).
    pub primary_id: String,
    /// Advertising id (UUID).
    pub secondary_id: String,
    pub backup_persistent_id: String,
    pub non_backup_persistent_id: String,
}

impl DeviceIdentity {
    /// Build an identity from explicit values. The backup persistent id is
    /// derived from `primary_id`.
    pub fn new(
        primary_id: impl Into<String>,
        secondary_id: impl Into<String>,
        non_backup_persistent_id: impl Into<String>,
    ) -> Self {
        let primary_id = primary_id.into();
        Self {
            backup_persistent_id: format!("{primary_id}_{APP_ID}"),
            primary_id,
            secondary_id: secondary_id.into(),
            non_backup_persistent_id: non_backup_persistent_id.into(),
        }
    }

    /// Generate a random identity.
    pub fn generate() -> Self {
        let simple = uuid::Uuid::new_v4().simple().to_string();
        Self::new(
            &simple[..16],
            uuid::Uuid::new_v4().to_string(),
            uuid::Uuid::new_v4().to_string(),
        )
    }

    /// Platform headers plus this device's ids, as sent on every API call.
    pub fn base_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for &(name, value) in PLATFORM_HEADERS {
            headers.insert(name, HeaderValue::from_static(value));
        }
        insert(&mut headers, "android-id", &self.primary_id);
        insert(&mut headers, "aaid", &self.secondary_id);
        headers
    }

    /// Extra installation metadata sent with the unauthenticated setup call.
    ///
    /// `install_ts_secs` is the first-install time in Unix seconds.
    pub fn bootstrap_headers(&self, install_ts_secs: i64) -> HeaderMap {
        let mut headers = self.base_headers();
        insert(&mut headers, "first-install-timestamp", &format!("{install_ts_secs}E9"));
        insert(&mut headers, "backup-persistent-id", &self.backup_persistent_id);
        insert(&mut headers, "non-backup-persistent-id", &self.non_backup_persistent_id);
        headers.insert("environment", HeaderValue::from_static("Production"));
        headers.insert("settings-response-version", HeaderValue::from_static("v2"));
        headers.insert("is-app-running-in-background", HeaderValue::from_static("false"));
        headers.insert("is-old-user", HeaderValue::from_static("true"));
        headers.insert("app-set-id", HeaderValue::from_static(APP_SET_ID));
        headers
    }
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self::generate()
    }
}

// Generated ids are ASCII; a value that still fails to parse is skipped.
fn insert(headers: &mut HeaderMap, name: &'static str, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(v) => {
            headers.insert(HeaderName::from_static(name), v);
        }
        Err(_) => log::warn!("Skipping invalid value for header {name}"),
    }
}
