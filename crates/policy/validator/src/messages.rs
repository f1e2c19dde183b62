//! Diagnostic message texts.

use policy_types::{PolicyGuid, RecipientActor, SoapVersion};

pub const NOT_LICENSED: &str = "Assertion is not available on this cluster.";
pub const NOT_PERMITTED: &str = "Assertion is not permitted by the validator configuration.";
pub const REQUIRES_SOAP: &str =
    "Assertion applies only to SOAP services, but this service is not SOAP.";
pub const RELATIVE_NAMESPACE: &str =
    "The WSDL uses relative namespace URIs, which cannot be signed reliably.";
pub const NORMALLY_BEFORE_ROUTING: &str = "Assertion is normally positioned before routing.";
pub const SHOULD_BE_BEFORE_ROUTING: &str =
    "Assertion checks the request after it has been routed and has no effect there.";
pub const MUST_BE_BEFORE_ROUTING: &str = "Assertion must occur before routing.";
pub const AFTER_ROUTING: &str = "Assertion is positioned after routing.";
pub const REQUEST_AFTER_RESPONSE: &str =
    "Assertion uses the request after the response is available; this is uncommon.";
pub const RESPONSE_BEFORE_AVAILABLE: &str =
    "Assertion uses the response before it is available; it must follow a routing assertion.";
pub const NON_LOCAL_RECIPIENT: &str =
    "Requirements addressed to a non-local WS-Security recipient are not enforced by the gateway.";
pub const SWA_AFTER_ROUTING: &str = "SOAP attachments must be checked before routing.";
pub const MISSING_PRIOR_CREDENTIAL: &str =
    "A username/password or SAML credential source must precede this token exchange.";
pub const MISSING_PRIOR_PASSWORD: &str =
    "A username/password credential source must precede this token request.";
pub const SAML_MISSING_BEFORE: &str = "A SAML credential source must precede this token exchange.";
pub const TRANSPORT_MISSING_BEFORE: &str =
    "A plain WSS UsernameToken should be protected by a preceding SSL/TLS assertion.";
pub const MISSING_PASSWORD_COLLECTION: &str =
    "The token includes the last gathered password, but no earlier assertion gathers one.";
pub const CREDENTIALS_ALREADY_PRESENT: &str =
    "A credential source for this actor is already present in the path.";
pub const MULTIPLE_SIGNATURES_CONFLICTING: &str =
    "Another signature requirement for this message allows multiple signatures; \
     the settings conflict.";
pub const SECURE_CONVERSATION_ALREADY: &str =
    "Secure conversation is already required in this path.";
pub const SAML_ALREADY: &str = "A SAML token is already required in this path.";
pub const UNCOMMON_MODIFIER: &str =
    "Credentials are exchanged after access control has been applied; this is uncommon.";
pub const MULTIPLE_IDENTITIES: &str = "More than one specific user is required in this path.";
pub const MULTIPLE_AUTHENTICATIONS: &str =
    "More than one authentication assertion is present in this path.";
pub const CUSTOM_ACCESS_CONFLICT: &str =
    "Built-in identity assertions cannot be combined with custom access control.";
pub const CUSTOM_ACCESS_ALREADY: &str = "Custom access control is already provided in this path.";
pub const CUSTOM_ACCESS_NO_CREDENTIALS: &str =
    "No credential source precedes this custom access control assertion.";
pub const ROUTING_LOOP: &str =
    "Routing from this internal policy may feed messages back into the same policy.";
pub const SENDER_VOUCHES_UNAUTHENTICATED: &str =
    "A SAML sender-vouches statement is attached, but the request is not authenticated.";
pub const EMPTY_COMPOSITE: &str =
    "Composite assertion has no enabled children and will always fail.";
pub const TRUE_UNDER_ALL: &str = "A true assertion directly inside an all composite has no effect.";

pub const NO_ROUTING: &str = "The policy contains no routing assertion.";
pub const NON_XML_REQUESTS: &str =
    "The service is not SOAP, but assertions parse the message as XML; non-XML requests will fail.";
pub const CREDENTIALS_NOT_AUTHENTICATED: &str =
    "Credentials are gathered but never authenticated by an access control assertion.";

pub const ROUTING_EMPTY_URL: &str = "The routing URL is empty.";
pub const ROUTING_MALFORMED_URL: &str = "The routing URL is malformed.";
pub const JMS_NO_ENDPOINT: &str = "No JMS endpoint is configured.";
pub const MULTIPLE_ROUTING: &str = "This path routes the request more than once.";
pub const XPATH_EMPTY: &str = "The XPath expression is empty.";
pub const REGEX_INVALID: &str = "The regular expression does not compile.";
pub const XSLT_MESSAGE_URL: &str =
    "SOAP messages rarely carry stylesheet processing instructions; \
     the transformation may never apply.";
pub const AUDIT_DISK_USAGE: &str =
    "Saving message bodies with every audit record can use excessive disk space.";
pub const WSS_VERSION_INSUFFICIENT: &str =
    "WS-Security 1.1 is requested, but no request or response in this path is signed or encrypted.";
pub const WSS_VERSION_NOTHING_BEFORE_ROUTE: &str =
    "WS-Security 1.1 is requested, but the request is not signed or encrypted before routing.";
pub const WSS_VERSION_NOTHING_AFTER_ROUTE: &str =
    "WS-Security 1.1 is requested, but the response is not signed or encrypted after routing.";
pub const SWA_NO_MULTIPART: &str =
    "The WSDL declares no MIME multipart bindings; attachments will never match.";
pub const SCHEMA_EMPTY: &str = "No schema is configured.";
pub const IDENTITY_NO_PROVIDER: &str = "No identity provider is configured.";
pub const IDENTITY_NO_LOGIN: &str = "No user login is configured.";
pub const IDENTITY_NO_GROUP: &str = "No group is configured.";
pub const SAML_SENDER_VOUCHES_UNSIGNED: &str =
    "Sender-vouches SAML needs a preceding client certificate or WSS signature for the same actor.";
pub const PRIVATE_KEY_NO_ALIAS: &str =
    "A non-default private key is selected, but no key alias is configured.";
pub const VARIABLE_SYNTAX: &str = "Invalid context variable reference.";
pub const PATH_BUILD_FAILED: &str = "The policy could not be expanded into assertion paths.";

pub fn missing_prior_security(actor: &RecipientActor) -> String {
    match actor {
        RecipientActor::Local => {
            "No earlier assertion establishes a signing identity for this signature requirement."
                .to_string()
        }
        RecipientActor::Named(actor) => format!(
            "No earlier assertion establishes a signing identity for actor {actor}."
        ),
    }
}

pub fn no_auth_scheme(actor: &RecipientActor) -> String {
    match actor {
        RecipientActor::Local => {
            "No credential source precedes this access control assertion.".to_string()
        }
        RecipientActor::Named(actor) => format!(
            "No credential source for actor {actor} precedes this access control assertion."
        ),
    }
}

pub fn wss_signature_already_required(target: &str) -> String {
    format!("A WSS signature is already required for the {target} message.")
}

pub fn relative_namespace_detail(namespace: &str, operation: &str, message: &str) -> String {
    format!("Namespace: {namespace}, Operation Name: {operation}, Message Name: {message}")
}

pub fn identity_tag_unknown(tag: &str) -> String {
    format!("No earlier assertion authenticates an identity tagged {tag:?}.")
}

pub fn response_actor_mismatch(authenticated: &str, decorated: &str) -> String {
    format!(
        "The request is authenticated for actor {authenticated}, \
         but the response is secured only for actor {decorated}."
    )
}

pub fn include_dangling(guid: PolicyGuid) -> String {
    format!("The included policy fragment {guid} does not exist.")
}

pub fn include_not_fragment(name: &str) -> String {
    format!("The included policy {name} is not an include fragment.")
}

pub fn circular_include(guid: PolicyGuid, name: &str) -> String {
    format!("Include of {guid} creates a cycle through policy {name}.")
}

pub fn undeclared_prefix(prefix: &str) -> String {
    format!("Namespace prefix {prefix} is used but not declared.")
}

pub fn soap_version_mismatch(bound: SoapVersion, service: SoapVersion) -> String {
    format!("The expression binds the {bound} envelope namespace, but the service uses {service}.")
}

pub fn unsupported_encoding(encoding: &str) -> String {
    format!("Encoding {encoding} is not supported.")
}

pub fn unknown_assertion(name: &str) -> String {
    format!("Assertion {name} is not recognized; every request to this policy will fail.")
}

pub fn variable_undefined(name: &str) -> String {
    format!("Variable {name} is neither built in nor set earlier in the policy.")
}

pub fn variable_deprecated(name: &str, replacement: &str) -> String {
    format!("Variable {name} is deprecated; use {replacement} instead.")
}

pub fn variable_not_settable(name: &str) -> String {
    format!("Built-in variable {name} cannot be overwritten.")
}

pub fn variable_invalid_name(name: &str) -> String {
    format!("{name:?} is not a valid variable name.")
}
