use std::sync::Arc;

use policy_types::{Assertion, AssertionKind, PolicyValidatorResult, RemedialAction};
use url::Url;

use crate::messages;
use crate::registry::{AssertionValidator, PathScope};

/// Endpoint configuration of routing kinds, and one routing per path.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoutingValidator;

impl AssertionValidator for RoutingValidator {
    fn name(&self) -> &'static str {
        "routing"
    }

    fn validate(
        &self,
        assertion: &Arc<Assertion>,
        scope: &PathScope<'_>,
        result: &mut PolicyValidatorResult,
    ) {
        match assertion.kind() {
            AssertionKind::HttpRouting {
                url, custom_urls, ..
            } if custom_urls.is_empty() => match url.as_deref().map(str::trim) {
                None | Some("") => result.add_warning(
                    scope
                        .diagnostic(assertion, messages::ROUTING_EMPTY_URL)
                        .with_remedy(RemedialAction::ConfigureEndpoint),
                ),
                // resolved per request
                Some(url) if url.contains("${") => {}
                Some(url) => {
                    if let Err(e) = Url::parse(url) {
                        result.add_warning(
                            scope
                                .diagnostic(assertion, messages::ROUTING_MALFORMED_URL)
                                .with_cause(e)
                                .with_remedy(RemedialAction::ConfigureEndpoint),
                        );
                    }
                }
            },
            AssertionKind::JmsRouting { endpoint, .. }
                if endpoint.as_deref().map_or(true, |e| e.trim().is_empty()) =>
            {
                result.add_warning(
                    scope
                        .diagnostic(assertion, messages::JMS_NO_ENDPOINT)
                        .with_remedy(RemedialAction::ConfigureEndpoint),
                );
            }
            _ => {}
        }
    }

    fn validate_deferred(
        &self,
        assertion: &Arc<Assertion>,
        scope: &PathScope<'_>,
        result: &mut PolicyValidatorResult,
    ) {
        if !assertion.kind().routes() {
            return;
        }
        let earlier_routes = scope
            .path
            .predecessors(assertion)
            .any(|a| a.is_routing() && a.kind().routes());
        if earlier_routes {
            result.add_warning(
                scope
                    .diagnostic(assertion, messages::MULTIPLE_ROUTING)
                    .with_remedy(RemedialAction::RemoveAssertion),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockFragmentLookup;
    use crate::rules::testing::{run_alone, run_on};
    use policy_types::{PolicyType, PolicyValidationContext};

    fn http(url: Option<&str>) -> Arc<Assertion> {
        Assertion::leaf(AssertionKind::HttpRouting {
            url: url.map(str::to_string),
            custom_urls: vec![],
            attach_saml_sender_vouches: false,
        })
    }

    #[test]
    fn well_formed_url_is_clean() {
        assert!(run_alone(&RoutingValidator, &http(Some("https://backend:8443/svc"))).is_empty());
    }

    #[test]
    fn empty_and_malformed_urls() {
        let result = run_alone(&RoutingValidator, &http(None));
        assert_eq!(result.warnings()[0].message, messages::ROUTING_EMPTY_URL);

        let result = run_alone(&RoutingValidator, &http(Some("not a url")));
        assert_eq!(result.warnings()[0].message, messages::ROUTING_MALFORMED_URL);
        assert!(result.warnings()[0].cause.is_some());
    }

    #[test]
    fn templated_url_is_not_parsed() {
        assert!(run_alone(&RoutingValidator, &http(Some("${service.url}"))).is_empty());
    }

    #[test]
    fn custom_url_list_replaces_single_url() {
        let routing = Assertion::leaf(AssertionKind::HttpRouting {
            url: None,
            custom_urls: vec!["http://a/".into(), "http://b/".into()],
            attach_saml_sender_vouches: false,
        });
        assert!(run_alone(&RoutingValidator, &routing).is_empty());
    }

    #[test]
    fn jms_without_endpoint() {
        let jms = Assertion::leaf(AssertionKind::JmsRouting {
            endpoint: Some("  ".into()),
            attach_saml_sender_vouches: false,
        });
        let result = run_alone(&RoutingValidator, &jms);
        assert_eq!(result.warnings()[0].message, messages::JMS_NO_ENDPOINT);
    }

    #[test]
    fn second_routing_in_path_warns() {
        let first = http(Some("http://a/"));
        let second = http(Some("http://b/"));
        let ctx = PolicyValidationContext::new(PolicyType::IncludeFragment);
        let lookup = MockFragmentLookup::new();
        let path = vec![first.clone(), second.clone()];

        let result = run_on(&RoutingValidator, path.clone(), &first, &ctx, &lookup);
        assert!(result.is_empty());
        let result = run_on(&RoutingValidator, path, &second, &ctx, &lookup);
        assert_eq!(result.warnings().len(), 1);
        assert_eq!(result.warnings()[0].message, messages::MULTIPLE_ROUTING);
    }
}
