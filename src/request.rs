use http::{header::COOKIE, HeaderMap, Uri};

/// Geolocation fields the edge attaches to an incoming request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoMetadata {
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// The parts of an incoming request the pipeline looks at.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub uri: Uri,
    pub headers: HeaderMap,
    pub geo: GeoMetadata,
}

impl RequestContext {
    pub fn new(uri: Uri, headers: HeaderMap) -> Self {
        Self {
            uri,
            headers,
            geo: GeoMetadata::default(),
        }
    }

    pub fn with_geo(mut self, geo: GeoMetadata) -> Self {
        self.geo = geo;
        self
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn url(&self) -> String {
        self.uri.to_string()
    }

    /// Value of the named cookie, if the request carries it.
    ///
    /// Multiple `Cookie` headers are searched in order.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.headers
            .get_all(COOKIE)
            .iter()
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
            .find_map(|header| {
                header.split(';').find_map(|pair| {
                    let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                    (key.trim() == name).then(|| value.trim().to_string())
                })
            })
    }

    pub fn has_cookie(&self, name: &str) -> bool {
        self.cookie(name).is_some()
    }
}
