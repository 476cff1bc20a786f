use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, USER_AGENT};
use strum::{AsRefStr, Display};

pub const PRIMARY_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

pub const FALLBACK_USER_AGENT: &str =
    "facebookexternalhit/1.1 (+http://www.facebook.com/externalhit_uatext.php)";

/// Statuses that mean "this client was refused", as opposed to "this page is broken".
pub const BLOCKED_STATUSES: &[u16] = &[401, 403, 406, 429];

/// The request headers an attempt presents to the remote server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum HeaderProfile {
    /// A current desktop browser.
    Primary,
    /// A simpler link-unfurling client, for sites that refuse the browser signature.
    Fallback,
}

impl HeaderProfile {
    pub fn headers(self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        match self {
            HeaderProfile::Primary => {
                headers.insert(USER_AGENT, HeaderValue::from_static(PRIMARY_USER_AGENT));
                headers.insert(
                    ACCEPT,
                    HeaderValue::from_static(
                        "text/html,application/xhtml+xml,application/xml;q=0.9,\
                         image/avif,image/webp,*/*;q=0.8",
                    ),
                );
                headers.insert(
                    ACCEPT_LANGUAGE,
                    HeaderValue::from_static("en-US,en;q=0.9,ja;q=0.8"),
                );
                headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
                headers.insert("upgrade-insecure-requests", HeaderValue::from_static("1"));
            }
            HeaderProfile::Fallback => {
                headers.insert(USER_AGENT, HeaderValue::from_static(FALLBACK_USER_AGENT));
                headers.insert(
                    ACCEPT,
                    HeaderValue::from_static("text/html,application/xhtml+xml;q=0.9,*/*;q=0.5"),
                );
                headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en"));
            }
        }
        headers
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchAttempt {
    pub profile: HeaderProfile,
    pub use_range: bool,
}

/// Attempts in the order they are tried. No two share parameters.
pub const ATTEMPTS: &[FetchAttempt] = &[
    FetchAttempt {
        profile: HeaderProfile::Primary,
        use_range: true,
    },
    FetchAttempt {
        profile: HeaderProfile::Primary,
        use_range: false,
    },
    FetchAttempt {
        profile: HeaderProfile::Fallback,
        use_range: true,
    },
    FetchAttempt {
        profile: HeaderProfile::Fallback,
        use_range: false,
    },
];

pub fn is_blocked_status(status: u16) -> bool {
    BLOCKED_STATUSES.contains(&status)
}
