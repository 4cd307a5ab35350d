//! Device metadata collection for instance updates.

use chrono::{Local, Offset};
use serde::{Deserialize, Serialize};

/// Platform this install is running on, as reported to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePlatform {
    Ios,
    Android,
    Mac,
    Windows,
    Linux,
    Unknown,
}

impl DevicePlatform {
    /// Detect the current platform from the build target.
    pub fn detect() -> Self {
        if cfg!(target_os = "ios") {
            DevicePlatform::Ios
        } else if cfg!(target_os = "android") {
            DevicePlatform::Android
        } else if cfg!(target_os = "macos") {
            DevicePlatform::Mac
        } else if cfg!(target_os = "windows") {
            DevicePlatform::Windows
        } else if cfg!(target_os = "linux") {
            DevicePlatform::Linux
        } else {
            DevicePlatform::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DevicePlatform::Ios => "ios",
            DevicePlatform::Android => "android",
            DevicePlatform::Mac => "mac",
            DevicePlatform::Windows => "windows",
            DevicePlatform::Linux => "linux",
            DevicePlatform::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for DevicePlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Locale and timezone snapshot taken at update time.
///
/// Missing locale information degrades to empty strings; the backend treats
/// them as "unset" rather than rejecting the update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub platform: DevicePlatform,
    pub language: String,
    pub country: String,
    pub tz_offset_secs: i32,
}

impl DeviceInfo {
    /// Collect current platform, locale, and UTC offset.
    pub fn collect() -> Self {
        let (language, country) = current_locale();
        Self {
            platform: DevicePlatform::detect(),
            language,
            country,
            tz_offset_secs: Local::now().offset().fix().local_minus_utc(),
        }
    }
}

/// Locale from the environment, split into (language, country).
///
/// Understands the POSIX `lang[_COUNTRY][.encoding]` shape, e.g.
/// `en_US.UTF-8` -> ("en", "US").
fn current_locale() -> (String, String) {
    let raw = std::env::var("LC_ALL")
        .or_else(|_| std::env::var("LANG"))
        .unwrap_or_default();
    parse_locale(&raw)
}

fn parse_locale(raw: &str) -> (String, String) {
    let base = raw.split('.').next().unwrap_or("");
    if base.is_empty() || base == "C" || base == "POSIX" {
        return (String::new(), String::new());
    }
    let mut parts = base.split(['_', '-']);
    let language = parts.next().unwrap_or("").to_string();
    let country = parts.next().unwrap_or("").to_string();
    (language, country)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_posix_locale() {
        assert_eq!(parse_locale("en_US.UTF-8"), ("en".into(), "US".into()));
        assert_eq!(parse_locale("de_DE"), ("de".into(), "DE".into()));
        assert_eq!(parse_locale("fr"), ("fr".into(), String::new()));
        assert_eq!(parse_locale("pt-BR"), ("pt".into(), "BR".into()));
    }

    #[test]
    fn degenerate_locales_are_empty() {
        assert_eq!(parse_locale(""), (String::new(), String::new()));
        assert_eq!(parse_locale("C"), (String::new(), String::new()));
        assert_eq!(parse_locale("POSIX.UTF-8"), (String::new(), String::new()));
    }

    #[test]
    fn detect_returns_a_known_platform() {
        // Whatever we run on, detection must not panic and must map to a
        // stable wire string.
        let platform = DevicePlatform::detect();
        assert!(!platform.as_str().is_empty());
    }
}
