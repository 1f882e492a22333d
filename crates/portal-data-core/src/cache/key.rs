use std::fmt;

/// Identity of one cacheable read.
///
/// Derived keys compare by method, path and the sorted query pairs, so two
/// URLs that differ only in query parameter order share a slot. Callers that
/// want several query variants to collapse into one entry pass a custom key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Derived {
        method: String,
        path: String,
        query: Vec<String>,
    },
    Custom(String),
}

impl CacheKey {
    pub fn derive(method: &str, url: &str) -> Self {
        let without_fragment = url.split('#').next().unwrap_or_default();
        let (path, raw_query) = match without_fragment.split_once('?') {
            Some((path, query)) => (path, query),
            None => (without_fragment, ""),
        };

        let mut query: Vec<String> = raw_query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(str::to_string)
            .collect();
        query.sort();

        CacheKey::Derived {
            method: method.to_ascii_uppercase(),
            path: path.to_string(),
            query,
        }
    }

    pub fn custom(key: impl Into<String>) -> Self {
        CacheKey::Custom(key.into())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Derived {
                method,
                path,
                query,
            } => {
                write!(f, "{}:{}", method, path)?;
                if !query.is_empty() {
                    write!(f, "?{}", query.join("&"))?;
                }
                Ok(())
            }
            CacheKey::Custom(key) => f.write_str(key),
        }
    }
}
