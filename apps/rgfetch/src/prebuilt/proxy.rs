//! Proxy selection from the environment.
//!
//! The proxy variables are read once, when the install request is resolved,
//! and captured in a [`ProxySettings`] value. The HTTP client consults it for
//! every request URL, including each redirect hop.
//!
//! ## Environment Variables
//!
//! - `HTTPS_PROXY`, `https_proxy`, `npm_config_https_proxy`: proxy for `https` URLs
//! - `HTTP_PROXY`, `http_proxy`, `npm_config_proxy`: proxy for `http` URLs, and
//!   for `https` URLs when no HTTPS proxy is set
//! - `NO_PROXY`, `no_proxy`: comma-separated hosts or domain suffixes to reach
//!   directly; `*` disables proxying entirely

use reqwest::Url;

const HTTPS_PROXY_VARS: [&str; 3] = ["HTTPS_PROXY", "https_proxy", "npm_config_https_proxy"];
const HTTP_PROXY_VARS: [&str; 3] = ["HTTP_PROXY", "http_proxy", "npm_config_proxy"];
const NO_PROXY_VARS: [&str; 2] = ["NO_PROXY", "no_proxy"];

/// Proxy configuration captured from the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxySettings {
    /// Proxy used for `https` URLs.
    pub https: Option<Url>,
    /// Proxy used for `http` URLs.
    pub http: Option<Url>,
    /// Hosts that bypass the proxy.
    pub no_proxy: Vec<String>,
}

impl ProxySettings {
    /// Reads proxy settings through a variable lookup, usually the process
    /// environment.
    ///
    /// Values that are empty or do not parse as URLs are ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let first_url = |keys: &[&str]| {
            keys.iter()
                .filter_map(|&key| lookup(key))
                .map(|value| value.trim().to_string())
                .find(|value| !value.is_empty())
                .and_then(|value| parse_proxy_url(&value))
        };

        let no_proxy = NO_PROXY_VARS
            .iter()
            .filter_map(|&key| lookup(key))
            .find(|value| !value.trim().is_empty())
            .map(|value| {
                value
                    .split(',')
                    .map(|entry| entry.trim().to_ascii_lowercase())
                    .filter(|entry| !entry.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            https: first_url(&HTTPS_PROXY_VARS),
            http: first_url(&HTTP_PROXY_VARS),
            no_proxy,
        }
    }

    /// Returns whether any proxy is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.https.is_none() && self.http.is_none()
    }

    /// Returns the proxy to use for `url`, or `None` to connect directly.
    #[must_use]
    pub fn proxy_for(&self, url: &Url) -> Option<Url> {
        let host = url.host_str()?.to_ascii_lowercase();
        if self.bypasses(&host) {
            return None;
        }
        match url.scheme() {
            "https" => self.https.clone().or_else(|| self.http.clone()),
            "http" => self.http.clone(),
            _ => None,
        }
    }

    fn bypasses(&self, host: &str) -> bool {
        self.no_proxy.iter().any(|entry| {
            if entry == "*" {
                return true;
            }
            let domain = entry.trim_start_matches('.');
            host == domain || host.ends_with(&format!(".{domain}"))
        })
    }
}

/// Parses a proxy value, assuming `http://` when no scheme is given.
fn parse_proxy_url(value: &str) -> Option<Url> {
    if value.contains("://") {
        Url::parse(value).ok()
    } else {
        Url::parse(&format!("http://{value}")).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> ProxySettings {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ProxySettings::from_lookup(|key| map.get(key).cloned())
    }

    fn url(s: &str) -> Url {
        Url::parse(s).expect("Should parse URL")
    }

    #[test]
    fn no_variables_means_no_proxy() {
        let settings = settings(&[]);
        assert!(settings.is_empty());
        assert_eq!(settings.proxy_for(&url("https://api.github.com/x")), None);
    }

    #[test]
    fn https_urls_use_https_proxy() {
        let settings = settings(&[
            ("HTTPS_PROXY", "http://secure.proxy:8443"),
            ("HTTP_PROXY", "http://plain.proxy:8080"),
        ]);
        assert_eq!(
            settings.proxy_for(&url("https://api.github.com/x")),
            Some(url("http://secure.proxy:8443"))
        );
        assert_eq!(
            settings.proxy_for(&url("http://mirror.local/x")),
            Some(url("http://plain.proxy:8080"))
        );
    }

    #[test]
    fn https_falls_back_to_http_proxy() {
        let settings = settings(&[("npm_config_proxy", "plain.proxy:3128")]);
        assert_eq!(
            settings.proxy_for(&url("https://github.com/x")),
            Some(url("http://plain.proxy:3128"))
        );
    }

    #[test]
    fn uppercase_variables_win_over_lowercase() {
        let settings = settings(&[
            ("HTTPS_PROXY", "http://upper:1"),
            ("https_proxy", "http://lower:2"),
        ]);
        assert_eq!(settings.https, Some(url("http://upper:1")));
    }

    #[test]
    fn empty_values_are_ignored() {
        let settings = settings(&[("HTTPS_PROXY", "  "), ("https_proxy", "http://lower:2")]);
        assert_eq!(settings.https, Some(url("http://lower:2")));
    }

    #[test]
    fn no_proxy_matches_exact_hosts_and_suffixes() {
        let settings = settings(&[
            ("HTTPS_PROXY", "http://proxy:1"),
            ("NO_PROXY", "localhost, .internal.corp,github.com"),
        ]);
        assert_eq!(settings.proxy_for(&url("https://localhost/x")), None);
        assert_eq!(settings.proxy_for(&url("https://cdn.internal.corp/x")), None);
        assert_eq!(settings.proxy_for(&url("https://api.github.com/x")), None);
        assert!(settings.proxy_for(&url("https://notgithub.com/x")).is_some());
    }

    #[test]
    fn wildcard_no_proxy_disables_proxying() {
        let settings = settings(&[("HTTP_PROXY", "http://proxy:1"), ("no_proxy", "*")]);
        assert_eq!(settings.proxy_for(&url("http://example.com/")), None);
    }
}
