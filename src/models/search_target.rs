use url::Url;

use crate::utils::error::{AppError, MirrorError, MirrorErrorKind};

/// A logical search mirrored across several country domains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTarget {
    url: Url,
    domains: Vec<String>,
}

/// One concrete, domain-specific variant of a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mirror {
    pub domain_code: String,
    pub url: String,
}

impl SearchTarget {
    /// Builds a target from its template URL. With no domains given the target
    /// mirrors only the domain embedded in the template.
    pub fn new(url: &str, domains: Vec<String>) -> Result<Self, AppError> {
        let url = Url::parse(url)
            .map_err(|e| AppError::Validation(format!("Invalid search URL '{}': {}", url, e)))?;

        let host = url
            .host_str()
            .ok_or_else(|| AppError::Validation(format!("Search URL '{}' has no host", url)))?;
        let (_, embedded) = split_host(host)
            .ok_or_else(|| AppError::Validation(format!("Cannot derive a domain code from host '{}'", host)))?;

        let mut normalized: Vec<String> = Vec::new();
        for domain in domains {
            let code = normalize_domain_code(&domain);
            if code.is_empty() {
                continue;
            }
            if !normalized.contains(&code) {
                normalized.push(code);
            }
        }
        if normalized.is_empty() {
            normalized.push(embedded);
        }

        Ok(Self {
            url,
            domains: normalized,
        })
    }

    /// The template URL, used as the target's name in logs and errors.
    pub fn name(&self) -> &str {
        self.url.as_str()
    }

    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    /// Mirror URLs in configured domain order.
    pub fn mirrors(&self) -> Vec<Result<Mirror, MirrorError>> {
        self.domains
            .iter()
            .map(|code| {
                self.mirror_url(code)
                    .map(|url| Mirror {
                        domain_code: code.clone(),
                        url,
                    })
                    .map_err(|reason| {
                        MirrorError::new(
                            self.name(),
                            &format!("{} [{}]", self.name(), code),
                            MirrorErrorKind::InvalidMirrorUrl(reason),
                        )
                    })
            })
            .collect()
    }

    fn mirror_url(&self, code: &str) -> Result<String, String> {
        let host = self.url.host_str().unwrap_or_default();
        let (prefix, _) = split_host(host).ok_or_else(|| format!("unsupported host '{}'", host))?;

        let mut url = self.url.clone();
        url.set_host(Some(&format!("{}.{}", prefix, code)))
            .map_err(|e| e.to_string())?;
        Ok(url.to_string())
    }
}

/// Domain code of a URL: its host minus a leading `www.` and the first label.
///
/// `https://www.ebay.co.uk/itm/1` gives `co.uk`.
pub fn domain_code(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    let host = url.host_str()?;
    split_host(host).map(|(_, code)| code)
}

fn split_host(host: &str) -> Option<(String, String)> {
    let (www, rest) = match host.strip_prefix("www.") {
        Some(rest) => ("www.", rest),
        None => ("", host),
    };
    let (label, code) = rest.split_once('.')?;
    if label.is_empty() || code.is_empty() {
        return None;
    }
    Some((format!("{}{}", www, label), code.to_ascii_lowercase()))
}

fn normalize_domain_code(code: &str) -> String {
    code.trim().trim_start_matches('.').to_ascii_lowercase()
}
