// Property-based tests for origin matching
//
// Uses proptest to check exact, wildcard and suffix entries across many
// generated hostnames.

use insight_proxy::core::AppError;
use insight_proxy::middleware::OriginPolicy;
use proptest::prelude::*;

fn label() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,10}"
}

fn policy(entries: &[String]) -> OriginPolicy {
    OriginPolicy::new(entries, true)
}

proptest! {
    #[test]
    fn test_exact_entry_allows_and_echoes(host in label(), tld in "[a-z]{2,4}") {
        let origin = format!("https://{}.{}", host, tld);
        let decision = policy(&[origin.clone()]).evaluate(Some(&origin)).unwrap();
        prop_assert_eq!(decision.allow_origin, Some(origin));
    }

    #[test]
    fn test_wildcard_allows_everything(host in label(), port in 1u16..65535) {
        let origin = format!("http://{}.test:{}", host, port);
        let decision = policy(&["*".to_string()]).evaluate(Some(&origin)).unwrap();
        prop_assert_eq!(decision.allow_origin.as_deref(), Some("*"));
    }

    #[test]
    fn test_suffix_allows_any_subdomain_depth(
        domain in label(),
        subdomains in prop::collection::vec(label(), 0..4),
    ) {
        let suffix = format!("{}.dev", domain);
        let mut host = subdomains.join(".");
        if !host.is_empty() {
            host.push('.');
        }
        host.push_str(&suffix);

        let origin = format!("https://{}", host);
        let decision = policy(&[format!("*.{}", suffix)]).evaluate(Some(&origin));
        prop_assert!(decision.is_ok(), "{} should match *.{}", origin, suffix);
    }

    #[test]
    fn test_suffix_rejects_glued_prefix(domain in label(), prefix in label()) {
        let suffix = format!("{}.dev", domain);
        let origin = format!("https://{}{}", prefix, suffix);
        let result = policy(&[format!("*.{}", suffix)]).evaluate(Some(&origin));
        prop_assert!(matches!(result, Err(AppError::OriginDenied)));
    }

    #[test]
    fn test_non_matching_origin_is_denied(a in label(), b in label()) {
        prop_assume!(a != b);
        let allowed = format!("https://{}.com", a);
        let declared = format!("https://{}.com", b);
        let result = policy(&[allowed]).evaluate(Some(&declared));
        prop_assert!(matches!(result, Err(AppError::OriginDenied)));
    }

    #[test]
    fn test_missing_origin_always_allowed(entries in prop::collection::vec(label(), 1..5)) {
        let entries: Vec<String> = entries
            .into_iter()
            .map(|e| format!("https://{}.io", e))
            .collect();
        let decision = policy(&entries).evaluate(None).unwrap();
        prop_assert!(decision.allow_origin.is_none());
    }
}
