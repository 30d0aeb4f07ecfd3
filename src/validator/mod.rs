//! Tiered email validation: a short-circuiting pipeline from a
//! cheap regex check up through an optional SMTP handshake, stopping at the
//! first tier that can render a verdict.
//!
//! Error types follow this crate's `thiserror`-per-module convention, and
//! MX lookups use `hickory-resolver` with a bounded timeout.

use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

#[derive(Debug, thiserror::Error)]
pub enum ValidatorError {
    #[error("DNS resolver init failed: {0}")]
    ResolverInit(String),
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub score: u32,
    pub reason: String,
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap()
    })
}

fn generic_local_part_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(info|contact|sales|support|hello|office|admin|mail|noreply|no-reply|service|help|billing|accounts?)$").unwrap()
    })
}

const DISPOSABLE_DOMAINS: &[&str] = &[
    "mailinator.com",
    "tempmail.com",
    "guerrillamail.com",
    "10minutemail.com",
    "yopmail.com",
    "trashmail.com",
    "throwawaymail.com",
    "getnada.com",
    "fakeinbox.com",
    "sharklasers.com",
    "dispostable.com",
    "maildrop.cc",
    "mintemail.com",
    "tempinbox.com",
    "spamgourmet.com",
    "mytemp.email",
    "temp-mail.org",
    "moakt.com",
    "mailnesia.com",
    "emailondeck.com",
    "33mail.com",
    "mohmal.com",
    "mail-temporaire.fr",
    "mailcatch.com",
    "tempail.com",
];

const SERVICE_DOMAINS: &[&str] = &[
    "sentry.io",
    "wixpress.com",
    "godaddy.com",
    "shopify.com",
    "squarespace.com",
    "cloudflare.com",
    "google.com",
    "microsoft.com",
    "automattic.com",
    "mailchimp.com",
];

/// Tiered email validator. Holds a lazily-built `TokioAsyncResolver` shared
/// across calls; cheap to clone (the resolver itself is reference-counted).
/// `deep_validation` (the SMTP-probe tier) is a per-job `JobConfig` option,
/// so it's a `validate` parameter rather than state fixed at construction.
#[derive(Clone)]
pub struct EmailValidator {
    resolver: TokioAsyncResolver,
    mx_timeout: Duration,
    smtp_timeout: Duration,
}

impl EmailValidator {
    pub fn new(mx_timeout: Duration, smtp_timeout: Duration) -> Result<Self, ValidatorError> {
        let mut opts = ResolverOpts::default();
        opts.timeout = mx_timeout;
        let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), opts);
        Ok(EmailValidator {
            resolver,
            mx_timeout,
            smtp_timeout,
        })
    }

    pub async fn validate(&self, email: &str, deep_validation: bool) -> ValidationResult {
        if !email_regex().is_match(email) {
            return ValidationResult {
                valid: false,
                score: 0,
                reason: "invalid_format".to_string(),
            };
        }

        let (local, domain) = match email.split_once('@') {
            Some(parts) => parts,
            None => {
                return ValidationResult {
                    valid: false,
                    score: 0,
                    reason: "invalid_format".to_string(),
                }
            }
        };
        let domain_lower = domain.to_lowercase();

        if DISPOSABLE_DOMAINS.contains(&domain_lower.as_str()) {
            return ValidationResult {
                valid: false,
                score: 0,
                reason: "disposable_domain".to_string(),
            };
        }

        if SERVICE_DOMAINS.contains(&domain_lower.as_str()) {
            return ValidationResult {
                valid: false,
                score: 0,
                reason: "service_domain".to_string(),
            };
        }

        let generic = generic_local_part_regex().is_match(local);

        let mx_lookup = tokio::time::timeout(self.mx_timeout, self.resolver.mx_lookup(format!("{domain_lower}.")))
            .await;

        let mx_hosts: Vec<String> = match mx_lookup {
            Ok(Ok(lookup)) => {
                // Sort by preference descending: the *lowest*-priority
                // (least-preferred, highest preference number) MX is the
                // one the SMTP probe targets.
                let mut records: Vec<_> = lookup.iter().collect();
                records.sort_by_key(|mx| std::cmp::Reverse(mx.preference()));
                records.into_iter().map(|mx| mx.exchange().to_string()).collect()
            }
            Ok(Err(_)) => {
                return ValidationResult {
                    valid: false,
                    score: 10,
                    reason: "no_mx_records".to_string(),
                }
            }
            Err(_) => {
                return ValidationResult {
                    valid: false,
                    score: 20,
                    reason: "dns_lookup_failed".to_string(),
                }
            }
        };

        if mx_hosts.is_empty() {
            return ValidationResult {
                valid: false,
                score: 10,
                reason: "no_mx_records".to_string(),
            };
        }

        let base_score = if generic { 70 } else { 85 };
        let base_reason = if generic { "generic_address" } else { "mx_verified" };

        if !deep_validation {
            return ValidationResult {
                valid: true,
                score: base_score,
                reason: base_reason.to_string(),
            };
        }

        match self.smtp_probe(&mx_hosts[0], email).await {
            SmtpOutcome::Exists => ValidationResult {
                valid: true,
                score: if generic { 75 } else { 95 },
                reason: "smtp_verified".to_string(),
            },
            SmtpOutcome::Rejected => ValidationResult {
                valid: false,
                score: 15,
                reason: "smtp_rejected".to_string(),
            },
            SmtpOutcome::Inconclusive => ValidationResult {
                valid: true,
                score: base_score,
                reason: "smtp_inconclusive".to_string(),
            },
        }
    }

    /// Minimal SMTP handshake probe: HELO, MAIL FROM, RCPT TO, reading the
    /// response code to RCPT TO without ever sending DATA. Best-effort; any
    /// connection failure or ambiguous response code is inconclusive rather
    /// than a hard rejection, since many servers greylist or reject probing.
    async fn smtp_probe(&self, mx_host: &str, email: &str) -> SmtpOutcome {
        let host = mx_host.trim_end_matches('.');
        let addr = format!("{host}:25");
        let connect = tokio::time::timeout(self.smtp_timeout, TcpStream::connect(&addr)).await;
        let stream = match connect {
            Ok(Ok(s)) => s,
            _ => return SmtpOutcome::Inconclusive,
        };

        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        macro_rules! expect_2xx {
            () => {{
                let mut line = String::new();
                match tokio::time::timeout(self.smtp_timeout, reader.read_line(&mut line)).await {
                    Ok(Ok(_)) if line.starts_with('2') => true,
                    Ok(Ok(_)) if line.starts_with('5') => return SmtpOutcome::Rejected,
                    _ => return SmtpOutcome::Inconclusive,
                }
            }};
        }

        // Greeting.
        let mut greeting = String::new();
        if tokio::time::timeout(self.smtp_timeout, reader.read_line(&mut greeting))
            .await
            .is_err()
        {
            return SmtpOutcome::Inconclusive;
        }

        if write_half
            .write_all(b"HELO leadgen.local\r\n")
            .await
            .is_err()
        {
            return SmtpOutcome::Inconclusive;
        }
        expect_2xx!();

        if write_half
            .write_all(b"MAIL FROM:<probe@leadgen.local>\r\n")
            .await
            .is_err()
        {
            return SmtpOutcome::Inconclusive;
        }
        expect_2xx!();

        let rcpt = format!("RCPT TO:<{email}>\r\n");
        if write_half.write_all(rcpt.as_bytes()).await.is_err() {
            return SmtpOutcome::Inconclusive;
        }

        let mut line = String::new();
        match tokio::time::timeout(self.smtp_timeout, reader.read_line(&mut line)).await {
            Ok(Ok(_)) if line.starts_with('2') => SmtpOutcome::Exists,
            Ok(Ok(_)) if line.starts_with('5') => SmtpOutcome::Rejected,
            _ => SmtpOutcome::Inconclusive,
        }
    }
}

enum SmtpOutcome {
    Exists,
    Rejected,
    Inconclusive,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_format_rejected() {
        assert!(!email_regex().is_match("not-an-email"));
        assert!(email_regex().is_match("info@example.com"));
    }

    #[test]
    fn test_generic_local_part_detection() {
        assert!(generic_local_part_regex().is_match("info"));
        assert!(generic_local_part_regex().is_match("Sales"));
        assert!(!generic_local_part_regex().is_match("jane.doe"));
    }

    #[test]
    fn test_generic_local_part_covers_service_and_billing() {
        assert!(generic_local_part_regex().is_match("service"));
        assert!(generic_local_part_regex().is_match("billing"));
        assert!(generic_local_part_regex().is_match("noreply"));
        assert!(generic_local_part_regex().is_match("no-reply"));
        assert!(generic_local_part_regex().is_match("accounts"));
    }

    #[test]
    fn test_disposable_domain_list_contains_mailinator() {
        assert!(DISPOSABLE_DOMAINS.contains(&"mailinator.com"));
    }

    #[tokio::test]
    async fn test_invalid_format_short_circuits_without_dns() {
        let validator = EmailValidator::new(
            Duration::from_millis(500),
            Duration::from_millis(500),
        )
        .unwrap();
        let result = validator.validate("not-an-email", false).await;
        assert_eq!(
            result,
            ValidationResult {
                valid: false,
                score: 0,
                reason: "invalid_format".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_disposable_domain_short_circuits() {
        let validator = EmailValidator::new(
            Duration::from_millis(500),
            Duration::from_millis(500),
        )
        .unwrap();
        let result = validator.validate("x@mailinator.com", false).await;
        assert_eq!(
            result,
            ValidationResult {
                valid: false,
                score: 0,
                reason: "disposable_domain".to_string(),
            }
        );
    }
}
