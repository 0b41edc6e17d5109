//! Shared `ureq` plumbing: agent construction and error mapping.

use std::time::Duration;

use pickup_core::{RemoteError, RemoteSystem};

/// Longest response body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

/// Agent with connect and overall request timeouts set to `timeout`.
pub fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(timeout)
        .timeout(timeout)
        .user_agent(concat!("pickup-sync/", env!("CARGO_PKG_VERSION")))
        .build()
}

pub(crate) fn map_ureq_error(system: RemoteSystem, err: ureq::Error) -> RemoteError {
    match err {
        ureq::Error::Status(status, response) => {
            let body = response.into_string().unwrap_or_default();
            RemoteError::Http {
                system,
                status,
                body: truncate(body.trim()),
            }
        }
        ureq::Error::Transport(transport) => RemoteError::Transport {
            system,
            message: transport.to_string(),
        },
    }
}

pub(crate) fn decode_err(system: RemoteSystem, err: impl std::fmt::Display) -> RemoteError {
    RemoteError::Decode {
        system,
        message: err.to_string(),
    }
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn truncate(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_url_normalizes_slashes() {
        assert_eq!(
            join_url("https://api.example/v3/", "/pedidos/vendas"),
            "https://api.example/v3/pedidos/vendas"
        );
        assert_eq!(join_url("http://h", "a"), "http://h/a");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let long = "é".repeat(MAX_ERROR_BODY);
        let cut = truncate(&long);
        assert!(cut.ends_with('…'));
        assert!(cut.len() <= MAX_ERROR_BODY + '…'.len_utf8());
    }
}
