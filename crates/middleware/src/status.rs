//! HTTP status code to span status classification.

use {opentelemetry::trace::Status, routespan_config::StatusPolicy, std::borrow::Cow};

/// Outcome classification of a server span.
///
/// `Ok` is never produced here: an explicit ok status is reserved for
/// operations that are not HTTP exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanClass {
    Unset,
    Error,
}

/// Classify an HTTP status code under the given policy.
///
/// Returns the classification and a description, which is empty unless the
/// code is outside the valid `100..=599` range.
#[must_use]
pub fn span_status(code: u16, policy: StatusPolicy) -> (SpanClass, Cow<'static, str>) {
    if !(100..600).contains(&code) {
        return (
            SpanClass::Error,
            Cow::Owned(format!("invalid HTTP status code {code}")),
        );
    }

    let error = match code {
        500..=599 => true,
        401 | 403 => policy == StatusPolicy::Strict,
        400..=499 => policy != StatusPolicy::ServerErrors,
        _ => false,
    };

    if error {
        (SpanClass::Error, Cow::Borrowed(""))
    } else {
        (SpanClass::Unset, Cow::Borrowed(""))
    }
}

/// Convert a classification into the span status recorded on the span.
#[must_use]
pub fn to_otel_status(class: SpanClass, description: Cow<'static, str>) -> Status {
    match class {
        SpanClass::Unset => Status::Unset,
        SpanClass::Error => Status::error(description),
    }
}
