use axum::{
    extract::{ConnectInfo, Request},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;

use super::audit::{client_ip, user_agent};

const SUSPICIOUS_AGENTS: [&str; 5] = ["sqlmap", "nikto", "nmap", "masscan", "burp"];

pub fn is_suspicious_agent(user_agent: &str) -> bool {
    let lowered = user_agent.to_lowercase();
    SUSPICIOUS_AGENTS.iter().any(|agent| lowered.contains(agent))
}

/// Flags requests from known scanning tools. Never blocks.
pub async fn security_logger(request: Request, next: Next) -> Response {
    let agent = user_agent(request.headers());
    if is_suspicious_agent(&agent) {
        let ip = client_ip(
            request.headers(),
            request.extensions().get::<ConnectInfo<SocketAddr>>(),
        );
        tracing::warn!(
            ip = %ip,
            user_agent = %agent,
            path = %request.uri().path(),
            "Suspicious user agent"
        );
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scanner_agents_are_flagged() {
        assert!(is_suspicious_agent("sqlmap/1.7.2#stable (https://sqlmap.org)"));
        assert!(is_suspicious_agent("Mozilla/5.00 (Nikto/2.1.6)"));
        assert!(is_suspicious_agent("BurpSuite"));
        assert!(!is_suspicious_agent("Mozilla/5.0 (X11; Linux x86_64)"));
        assert!(!is_suspicious_agent("unknown"));
    }
}
