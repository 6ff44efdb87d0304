//! Tracer selection.
//!
//! A request that arrives inside an already traced operation (for example a
//! service nested under another [`TraceLayer`](crate::TraceLayer)) gets its
//! tracer from the provider that issued the enclosing span, so nested
//! instrumentation shares its parent's configuration. Everything else uses the
//! provider injected into the layer.

use opentelemetry::{
    Context, InstrumentationScope,
    global::{self, BoxedTracer},
    trace::{TraceContextExt, TracerProvider},
};

use crate::{INSTRUMENTATION_NAME, INSTRUMENTATION_VERSION, semconv::SCHEMA_URL};

/// The process-wide provider, looked up each time a tracer is requested.
///
/// Unlike a captured [`global::GlobalTracerProvider`], a layer holding this
/// picks up a provider installed after the layer was built.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalProvider;

impl TracerProvider for GlobalProvider {
    type Tracer = BoxedTracer;

    fn tracer_with_scope(&self, scope: InstrumentationScope) -> Self::Tracer {
        global::tracer_provider().tracer_with_scope(scope)
    }
}

/// Provider that issued the active span, stored in the span-bearing context.
#[derive(Debug, Clone)]
pub struct ActiveProvider<P>(pub P);

/// A tracer together with the provider that issued it.
pub struct ResolvedTracer<P: TracerProvider> {
    pub provider: P,
    pub tracer: P::Tracer,
    /// `true` when the provider came from an enclosing span's context.
    pub inherited: bool,
}

#[derive(Debug, Clone)]
pub struct TracerResolver<P> {
    provider: P,
    scope: InstrumentationScope,
}

impl<P> TracerResolver<P>
where
    P: TracerProvider + Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            scope: instrumentation_scope(),
        }
    }

    /// Pick the tracer that should issue the span for a request running in `cx`.
    pub fn resolve(&self, cx: &Context) -> ResolvedTracer<P> {
        let parent = cx
            .span()
            .span_context()
            .is_valid()
            .then(|| cx.get::<ActiveProvider<P>>())
            .flatten();

        let (provider, inherited) = match parent {
            Some(ActiveProvider(provider)) => (provider.clone(), true),
            None => (self.provider.clone(), false),
        };

        ResolvedTracer {
            tracer: provider.tracer_with_scope(self.scope.clone()),
            provider,
            inherited,
        }
    }

    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }
}

/// The scope every span from this crate is reported under.
#[must_use]
pub fn instrumentation_scope() -> InstrumentationScope {
    InstrumentationScope::builder(INSTRUMENTATION_NAME)
        .with_version(INSTRUMENTATION_VERSION)
        .with_schema_url(SCHEMA_URL)
        .build()
}
