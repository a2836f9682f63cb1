//! Service endpoint classification.
//!
//! An orchestrator advertising a loopback address is unreachable for
//! broadcasters on other hosts, so the advertised URI is checked at startup.

use std::net::{IpAddr, Ipv6Addr};
use std::time::Duration;
use thiserror::Error;
use url::{Host, Url};

/// Errors that can occur while classifying a URL.
#[derive(Debug, Error)]
pub enum UrlError {
	/// The input is not an absolute URI.
	#[error("Invalid URL '{url}': {source}")]
	Parse {
		url: String,
		#[source]
		source: url::ParseError,
	},
	/// The URI has a scheme but no host.
	#[error("URL '{0}' has no host")]
	MissingHost(String),
}

fn parse_host(input: &str) -> Result<Host<String>, UrlError> {
	let url = Url::parse(input).map_err(|source| UrlError::Parse {
		url: input.to_string(),
		source,
	})?;

	url.host()
		.map(|host| host.to_owned())
		.ok_or_else(|| UrlError::MissingHost(input.to_string()))
}

fn is_loopback_v6(ip: &Ipv6Addr) -> bool {
	ip.is_loopback() || ip.to_ipv4_mapped().is_some_and(|v4| v4.is_loopback())
}

fn is_loopback(ip: &IpAddr) -> bool {
	match ip {
		IpAddr::V4(v4) => v4.is_loopback(),
		IpAddr::V6(v6) => is_loopback_v6(v6),
	}
}

/// Classifies the host of `input` without resolving names.
///
/// `localhost`, 127.0.0.0/8 and `::1` are local; any other host is not.
pub fn is_local_url(input: &str) -> Result<bool, UrlError> {
	Ok(match parse_host(input)? {
		Host::Domain(domain) => domain.eq_ignore_ascii_case("localhost"),
		Host::Ipv4(ip) => ip.is_loopback(),
		Host::Ipv6(ip) => is_loopback_v6(&ip),
	})
}

/// Classifies the host of `input`, resolving domain names.
///
/// A domain is local when every address it resolves to is a loopback address.
/// Resolution that fails or does not finish within `timeout` classifies the
/// URL as not local.
pub async fn is_local_url_resolved(input: &str, timeout: Duration) -> Result<bool, UrlError> {
	let domain = match parse_host(input)? {
		Host::Domain(domain) if !domain.eq_ignore_ascii_case("localhost") => domain,
		_ => return is_local_url(input),
	};

	let resolved = match tokio::time::timeout(timeout, tokio::net::lookup_host((domain.as_str(), 0))).await {
		Ok(Ok(addrs)) => {
			let ips: Vec<IpAddr> = addrs.map(|addr| addr.ip()).collect();
			Ok(!ips.is_empty() && ips.iter().all(is_loopback))
		},
		Ok(Err(e)) => {
			tracing::debug!(%domain, error = %e, "Host resolution failed, treating as not local");
			Ok(false)
		},
		Err(_) => {
			tracing::warn!(%domain, ?timeout, "Host resolution timed out, treating as not local");
			Ok(false)
		},
	};
	resolved
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_is_local_url() {
		assert!(matches!(
			is_local_url("127.0.0.1:8935"),
			Err(UrlError::Parse { .. })
		));

		assert!(is_local_url("https://127.0.0.1:8935").unwrap());
		assert!(is_local_url("https://127.0.0.2:8935").unwrap());
		assert!(is_local_url("https://localhost:8935").unwrap());
		assert!(is_local_url("https://LOCALHOST:8935").unwrap());
		assert!(is_local_url("https://[::1]:8935").unwrap());

		assert!(!is_local_url("https://0.0.0.0:8935").unwrap());
		assert!(!is_local_url("https://7.7.7.7:8935").unwrap());
		assert!(!is_local_url("https://[::]:8935").unwrap());
		assert!(!is_local_url("https://orchestrator.example.com:8935").unwrap());
	}

	#[test]
	fn test_ipv4_mapped_loopback() {
		assert!(is_local_url("https://[::ffff:127.0.0.1]:8935").unwrap());
		assert!(!is_local_url("https://[::ffff:7.7.7.7]:8935").unwrap());
	}

	#[test]
	fn test_missing_host() {
		assert!(matches!(
			is_local_url("mailto:operator@example.com"),
			Err(UrlError::MissingHost(_))
		));
		assert!(matches!(is_local_url(""), Err(UrlError::Parse { .. })));
	}

	#[tokio::test]
	async fn test_resolved_literals_and_localhost() {
		let timeout = Duration::from_millis(500);
		assert!(is_local_url_resolved("https://127.0.0.1:8935", timeout)
			.await
			.unwrap());
		assert!(is_local_url_resolved("https://localhost:8935", timeout)
			.await
			.unwrap());
		assert!(!is_local_url_resolved("https://7.7.7.7:8935", timeout)
			.await
			.unwrap());
		assert!(is_local_url_resolved("127.0.0.1:8935", timeout)
			.await
			.is_err());
	}

	#[tokio::test]
	async fn test_resolution_timeout_is_not_local() {
		let resolved =
			is_local_url_resolved("https://orchestrator.example.com:8935", Duration::ZERO).await;
		assert!(!resolved.unwrap());
	}

	#[tokio::test]
	async fn test_resolution_failure_is_not_local() {
		// The .invalid TLD never resolves.
		let local = is_local_url_resolved(
			"https://orchestrator.invalid:8935",
			Duration::from_millis(500),
		)
		.await
		.unwrap();
		assert!(!local);
	}
}
