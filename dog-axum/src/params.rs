use axum::http::{header, HeaderMap, Uri};

/// Address of the current request, rebuilt from `Host` (and `x-forwarded-proto`
/// when a proxy sets it). Falls back to the bare path when no host is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestUrl(String);

impl RequestUrl {
    pub fn from_parts(headers: &HeaderMap, uri: &Uri) -> Self {
        let path = uri.path().trim_end_matches('/');
        let host = uri
            .authority()
            .map(|a| a.as_str().to_string())
            .or_else(|| header_str(headers, header::HOST.as_str()));

        let url = match host {
            Some(host) => {
                let scheme = header_str(headers, "x-forwarded-proto")
                    .or_else(|| uri.scheme_str().map(str::to_string))
                    .unwrap_or_else(|| "http".to_string());
                format!("{scheme}://{host}{path}")
            }
            None => path.to_string(),
        };
        Self(url)
    }

    /// Child URL, `{request-url}/{segment}`
    pub fn join(&self, segment: &str) -> String {
        format!("{}/{}", self.0, segment)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn uses_host_and_forwarded_proto() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("files.example.com"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));

        let uri: Uri = "/documents/42/attachment/".parse().unwrap();
        let url = RequestUrl::from_parts(&headers, &uri);
        assert_eq!(url.as_str(), "https://files.example.com/documents/42/attachment");
        assert_eq!(url.join("c1"), "https://files.example.com/documents/42/attachment/c1");
    }

    #[test]
    fn falls_back_to_the_path() {
        let uri: Uri = "/documents/42/attachment?x=1".parse().unwrap();
        let url = RequestUrl::from_parts(&HeaderMap::new(), &uri);
        assert_eq!(url.join("c1"), "/documents/42/attachment/c1");
    }
}
