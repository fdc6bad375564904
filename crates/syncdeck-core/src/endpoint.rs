use std::path::PathBuf;

/// How an endpoint string is reached, which decides how it is prepared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointKind {
    Local(String),
    Ssh { host: String, path: String },
    /// `docker://`, `kubernetes://` and similar. The daemon owns these.
    Scheme(String),
}

pub fn parse_endpoint(endpoint: &str) -> EndpointKind {
    if endpoint.contains("://") {
        return EndpointKind::Scheme(endpoint.to_string());
    }
    // One character before the colon is a drive letter, not a host.
    match endpoint.find(':') {
        Some(index) if index > 1 => EndpointKind::Ssh {
            host: endpoint[..index].to_string(),
            path: endpoint[index + 1..].to_string(),
        },
        _ => EndpointKind::Local(endpoint.to_string()),
    }
}

pub fn expand_local_path(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => PathBuf::from(path),
        },
        None => PathBuf::from(path),
    }
}
