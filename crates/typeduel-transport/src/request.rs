//! The HTTP upgrade request that opened a connection.

/// Path and query of the upgrade request.
///
/// Players connect to `/ws/{lobby_id}?token={ticket}`; the handler reads
/// both pieces from here before anything else happens on the socket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectRequest {
    path: String,
    query: Option<String>,
}

impl ConnectRequest {
    /// Creates a request from a raw path and optional query string.
    pub fn new(path: impl Into<String>, query: Option<String>) -> Self {
        Self {
            path: path.into(),
            query,
        }
    }

    /// The request path, e.g. `/ws/12`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The raw query string without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Looks up a query parameter by name.
    ///
    /// Only `%XX` escapes and `+` are decoded; that covers everything a
    /// browser produces for ticket strings.
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.query()?
            .split('&')
            .filter_map(|pair| pair.split_once('=').or(Some((pair, ""))))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| percent_decode(value))
    }

    /// Path segments with empty pieces removed.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('/').filter(|s| !s.is_empty())
    }
}

fn percent_decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
                match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    Some(b) => {
                        out.push(b);
                        i += 2;
                    }
                    None => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
