//! Fingerprint synthesis: produces a coherent [`SessionIdentity`] for each
//! render — user-agent, locale, timezone, hardware claims, and WebGL vendor
//! strings that agree with each other the way a real browser's would.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserFamily {
    Chrome,
    Edge,
    Firefox,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientHints {
    /// `Sec-CH-UA` value, e.g. `"Chromium";v="120", "Not(A:Brand";v="24", "Google Chrome";v="120"`.
    pub brands: String,
    pub mobile: bool,
    pub platform: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScreenGeometry {
    pub width: u32,
    pub height: u32,
    pub avail_width: u32,
    pub avail_height: u32,
    pub color_depth: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebGlIdentity {
    pub vendor: String,
    pub renderer: String,
}

/// A coherent synthetic browser profile applied to one render's session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub user_agent: String,
    pub platform: String,
    pub locale: String,
    pub timezone: String,
    pub languages: Vec<String>,
    pub viewport: (u32, u32),
    pub screen: ScreenGeometry,
    pub hardware_concurrency: u32,
    pub device_memory_gb: u32,
    pub webgl: WebGlIdentity,
    pub client_hints: Option<ClientHints>,
    pub fingerprint_seed: [u8; 32],
}

impl SessionIdentity {
    pub fn is_firefox(&self) -> bool {
        self.client_hints.is_none()
    }
}

struct LocaleProfile {
    locale: &'static str,
    timezone: &'static str,
    languages: &'static [&'static str],
}

const LOCALE_POOL: &[LocaleProfile] = &[
    LocaleProfile { locale: "en-US", timezone: "America/New_York", languages: &["en-US", "en"] },
    LocaleProfile { locale: "en-US", timezone: "America/Los_Angeles", languages: &["en-US", "en"] },
    LocaleProfile { locale: "en-GB", timezone: "Europe/London", languages: &["en-GB", "en"] },
    LocaleProfile { locale: "en-CA", timezone: "America/Toronto", languages: &["en-CA", "en"] },
];

const HARDWARE_CONCURRENCY_POOL: &[u32] = &[4, 6, 8, 12, 16];
const DEVICE_MEMORY_POOL: &[u32] = &[4, 8, 16, 32];

const WEBGL_POOL: &[(&str, &str)] = &[
    ("Intel Inc.", "Intel Iris OpenGL Engine"),
    ("Intel Inc.", "Intel UHD Graphics 630"),
    ("NVIDIA Corporation", "NVIDIA GeForce GTX 1060/PCIe/SSE2"),
    ("NVIDIA Corporation", "NVIDIA GeForce RTX 3060/PCIe/SSE2"),
    ("ATI Technologies Inc.", "AMD Radeon RX 580"),
    ("ATI Technologies Inc.", "AMD Radeon RX 6600 XT"),
];

const USER_AGENT_POOL: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_1) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:121.0) Gecko/20100101 Firefox/121.0",
];

pub struct FingerprintSynthesiser;

impl FingerprintSynthesiser {
    /// Produce a coherent identity. `user_agent_override` pins the UA while
    /// every other field is still derived to stay consistent with it.
    pub fn generate(user_agent_override: Option<&str>, viewport: (u32, u32)) -> SessionIdentity {
        let mut rng = rand::thread_rng();

        let user_agent = user_agent_override
            .map(|s| s.to_string())
            .unwrap_or_else(|| USER_AGENT_POOL.choose(&mut rng).unwrap().to_string());

        let family = detect_family(&user_agent);
        let platform = detect_platform(&user_agent);

        let locale_profile = LOCALE_POOL.choose(&mut rng).unwrap();
        let (vendor, renderer) = *WEBGL_POOL.choose(&mut rng).unwrap();

        let hardware_concurrency = *HARDWARE_CONCURRENCY_POOL.choose(&mut rng).unwrap();
        let device_memory_gb = *DEVICE_MEMORY_POOL.choose(&mut rng).unwrap();

        let client_hints = match family {
            BrowserFamily::Firefox => None,
            BrowserFamily::Chrome | BrowserFamily::Edge => {
                Some(build_client_hints(&user_agent, family, &platform))
            }
        };

        let mut seed = [0u8; 32];
        rng.fill(&mut seed);

        SessionIdentity {
            user_agent,
            platform: platform.clone(),
            locale: locale_profile.locale.to_string(),
            timezone: locale_profile.timezone.to_string(),
            languages: locale_profile.languages.iter().map(|s| s.to_string()).collect(),
            viewport,
            screen: ScreenGeometry {
                width: viewport.0,
                height: viewport.1,
                avail_width: viewport.0,
                avail_height: viewport.1.saturating_sub(40),
                color_depth: 24,
            },
            hardware_concurrency,
            device_memory_gb,
            webgl: WebGlIdentity { vendor: vendor.to_string(), renderer: renderer.to_string() },
            client_hints,
            fingerprint_seed: seed,
        }
    }
}

fn detect_family(user_agent: &str) -> BrowserFamily {
    if user_agent.contains("Edg/") {
        BrowserFamily::Edge
    } else if user_agent.contains("Firefox/") {
        BrowserFamily::Firefox
    } else {
        BrowserFamily::Chrome
    }
}

fn detect_platform(user_agent: &str) -> String {
    if user_agent.contains("Windows") {
        "Win32".to_string()
    } else if user_agent.contains("Macintosh") || user_agent.contains("Mac OS X") {
        "MacIntel".to_string()
    } else {
        "Linux x86_64".to_string()
    }
}

fn chrome_major_version(user_agent: &str) -> &str {
    user_agent
        .split("Chrome/")
        .nth(1)
        .and_then(|rest| rest.split('.').next())
        .unwrap_or("120")
}

fn build_client_hints(user_agent: &str, family: BrowserFamily, platform: &str) -> ClientHints {
    let version = chrome_major_version(user_agent);
    let brand = match family {
        BrowserFamily::Edge => format!(
            "\"Not_A Brand\";v=\"8\", \"Chromium\";v=\"{version}\", \"Microsoft Edge\";v=\"{version}\""
        ),
        _ => format!(
            "\"Not_A Brand\";v=\"8\", \"Chromium\";v=\"{version}\", \"Google Chrome\";v=\"{version}\""
        ),
    };

    let ch_platform = match platform {
        "Win32" => "Windows",
        "MacIntel" => "macOS",
        _ => "Linux",
    };

    ClientHints {
        brands: brand,
        mobile: false,
        platform: ch_platform.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn firefox_identity_omits_client_hints() {
        let identity = FingerprintSynthesiser::generate(
            Some("Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0"),
            (1920, 1080),
        );
        assert!(identity.is_firefox());
        assert!(identity.client_hints.is_none());
    }

    #[test]
    fn chrome_identity_client_hints_agree_with_platform() {
        let identity = FingerprintSynthesiser::generate(
            Some("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"),
            (1920, 1080),
        );
        assert_eq!(identity.platform, "Win32");
        let hints = identity.client_hints.expect("chrome carries client hints");
        assert_eq!(hints.platform, "Windows");
        assert!(hints.brands.contains("120"));
    }

    #[test]
    fn hardware_claims_are_within_curated_pool() {
        let identity = FingerprintSynthesiser::generate(None, (1920, 1080));
        assert!(HARDWARE_CONCURRENCY_POOL.contains(&identity.hardware_concurrency));
        assert!(DEVICE_MEMORY_POOL.contains(&identity.device_memory_gb));
    }
}
