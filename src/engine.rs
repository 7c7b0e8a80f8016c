//! Request processing loop tying root resources, class dispatchers and
//! locator resolution together.
//!
//! ```text
//! root class match ─► ClassDispatcher ─► invoke target ─┬─► response
//!                                            ▲           │
//!                                            └─ resolve ◄┘ (locator result)
//! ```

use http::Method;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::DispatchConfig;
use crate::dispatcher::{ClassDispatcher, Dispatch};
use crate::error::{DispatchError, RoutingError};
use crate::instance::{DefaultConstruction, Instantiator};
use crate::locator::{LocatorResolver, LocatorResult, TypeHierarchy, TypeKey};
use crate::request::{Completion, RequestState};
use crate::resource::ResourceMethod;
use crate::response::DispatchResponse;
use crate::router::{PathTemplate, RequestMapper, RequestMatch, RequestPath, RoutingTable};

/// What invoking a resource method produced
#[derive(Debug)]
pub enum Invocation<R> {
    /// The method answered the request
    Response(R),
    /// The method is a locator; dispatch continues into its result
    Locator(LocatorResult),
}

/// Calls the selected resource method.
///
/// Implementations typically downcast `state.endpoint_instance()` to the
/// resource type and read path parameters from the state.
pub trait ResourceInvoker {
    type Output;

    fn invoke(
        &self,
        target: &Arc<ResourceMethod>,
        state: &RequestState,
    ) -> Invocation<Self::Output>;
}

impl<F, R> ResourceInvoker for F
where
    F: Fn(&Arc<ResourceMethod>, &RequestState) -> Invocation<R>,
{
    type Output = R;

    fn invoke(&self, target: &Arc<ResourceMethod>, state: &RequestState) -> Invocation<R> {
        self(target, state)
    }
}

/// Final outcome of processing a request
#[derive(Debug)]
pub enum Handled<R> {
    Response(R),
    /// Automatic `OPTIONS` answer
    Options(Vec<Method>),
    /// Nothing matched and the engine resumes the enclosing chain
    Unmatched,
}

/// Dispatch engine over a set of root resources
#[derive(Debug)]
pub struct DispatchEngine {
    roots: RequestMapper<Arc<ClassDispatcher>>,
    resolver: Arc<LocatorResolver>,
    config: DispatchConfig,
}

impl DispatchEngine {
    #[must_use]
    pub fn builder(config: DispatchConfig) -> DispatchEngineBuilder {
        DispatchEngineBuilder::new(config)
    }

    #[must_use]
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    #[must_use]
    pub fn resolver(&self) -> &Arc<LocatorResolver> {
        &self.resolver
    }

    /// Match the root resource class and run its dispatcher.
    ///
    /// # Errors
    ///
    /// `NotFound` when no root class matches (unless resuming on 404) and any
    /// error of the class dispatcher.
    pub fn route(&self, state: &mut RequestState) -> Result<Dispatch, DispatchError> {
        let root = {
            let path = match state.remaining() {
                "" => "/",
                remaining => remaining,
            };
            self.roots.map(path)
        };

        let Some(RequestMatch {
            value: class,
            remaining,
            path_param_values,
        }) = root
        else {
            if self.config.resume_on_404 {
                return Ok(Dispatch::Resume);
            }
            // E1: No root resource
            debug!(
                request_id = %state.request_id(),
                path = %state.remaining(),
                "No root resource matches"
            );
            return Err(DispatchError::NotFound);
        };

        let class_params = class.parameter_offset();
        state.set_max_path_params(class_params);
        for (idx, value) in path_param_values.into_iter().take(class_params).enumerate() {
            let Some(value) = value else {
                break;
            };
            state.set_path_param(idx, value);
        }
        state.set_param_offset(class_params);
        state.set_remaining(remaining);
        class.dispatch(state)
    }

    /// Run the full dispatch loop for `state`, following locator results
    /// until a method produces a response.
    ///
    /// # Errors
    ///
    /// Any [`DispatchError`] raised by a dispatch hop or locator resolution.
    pub fn handle<I>(
        &self,
        state: &mut RequestState,
        invoker: &I,
    ) -> Result<Handled<I::Output>, DispatchError>
    where
        I: ResourceInvoker,
    {
        let mut outcome = self.route(state)?;
        loop {
            match outcome {
                Dispatch::Options(allow) => return Ok(Handled::Options(allow)),
                Dispatch::Resume => return Ok(Handled::Unmatched),
                Dispatch::Matched => {
                    let Some(target) = state.target().cloned() else {
                        return Err(DispatchError::NotFound);
                    };
                    match invoker.invoke(&target, state) {
                        Invocation::Response(response) => return Ok(Handled::Response(response)),
                        Invocation::Locator(locator) => {
                            outcome = self.resolver.resolve(state, locator)?;
                        }
                    }
                }
            }
        }
    }

    /// Process a request to completion. Completion callbacks run once the
    /// outcome is known and the request scope is torn down.
    ///
    /// # Errors
    ///
    /// Any [`DispatchError`] raised while handling the request.
    pub fn process<I>(
        &self,
        mut state: RequestState,
        invoker: &I,
    ) -> Result<Handled<I::Output>, DispatchError>
    where
        I: ResourceInvoker,
    {
        let result = self.handle(&mut state, invoker);
        match &result {
            Ok(_) => state.complete(Completion::Success),
            Err(err) => {
                if !err.is_client_error() {
                    // E2: Server-side dispatch failure
                    warn!(
                        request_id = %state.request_id(),
                        error = %err,
                        "Dispatch failed"
                    );
                }
                state.complete(Completion::Failed(err));
            }
        }
        result
    }

    /// Process a request whose methods answer with [`DispatchResponse`],
    /// turning every dispatch outcome into a response. `None` means the
    /// request was not matched and the enclosing chain should continue.
    pub fn respond<I>(&self, state: RequestState, invoker: &I) -> Option<DispatchResponse>
    where
        I: ResourceInvoker<Output = DispatchResponse>,
    {
        match self.process(state, invoker) {
            Ok(Handled::Response(response)) => Some(response),
            Ok(Handled::Options(allow)) => Some(DispatchResponse::allow(&allow)),
            Ok(Handled::Unmatched) => None,
            Err(err) => Some(DispatchResponse::from(&err)),
        }
    }
}

/// Registration of root resources and locator-reachable resource types
pub struct DispatchEngineBuilder {
    config: DispatchConfig,
    hierarchy: TypeHierarchy,
    instantiator: Arc<dyn Instantiator>,
    roots: Vec<RequestPath<Arc<ClassDispatcher>>>,
    resources: Vec<(TypeKey, Arc<RoutingTable>)>,
}

impl DispatchEngineBuilder {
    #[must_use]
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            config,
            hierarchy: TypeHierarchy::default(),
            instantiator: Arc::new(DefaultConstruction),
            roots: Vec::new(),
            resources: Vec::new(),
        }
    }

    #[must_use]
    pub fn hierarchy(mut self, hierarchy: TypeHierarchy) -> Self {
        self.hierarchy = hierarchy;
        self
    }

    #[must_use]
    pub fn instantiator(mut self, instantiator: Arc<dyn Instantiator>) -> Self {
        self.instantiator = instantiator;
        self
    }

    /// Register a root resource class mounted at `class_path`. Method
    /// templates are relative to it; the class path's parameters occupy the
    /// first slots of every request routed here.
    ///
    /// # Errors
    ///
    /// `InvalidTemplate` when `class_path` does not compile.
    pub fn root<T, I>(mut self, class_path: &str, methods: I) -> Result<Self, RoutingError>
    where
        T: ?Sized + 'static,
        I: IntoIterator<Item = ResourceMethod>,
    {
        let template = Arc::new(PathTemplate::parse(class_path)?);
        let table = Arc::new(RoutingTable::from_resources(methods));
        let dispatcher = ClassDispatcher::new(
            Arc::clone(&table),
            template.param_count(),
            self.config.resume_on_404,
        );
        self.roots
            .push(RequestPath::new(true, template, Arc::new(dispatcher)));
        self.resources.push((TypeKey::of::<T>(), table));
        Ok(self)
    }

    /// Register the resource methods a type declares directly, making it
    /// reachable from locators (and from subtypes through the hierarchy)
    #[must_use]
    pub fn resource<T, I>(self, methods: I) -> Self
    where
        T: ?Sized + 'static,
        I: IntoIterator<Item = ResourceMethod>,
    {
        self.resource_table(TypeKey::of::<T>(), Arc::new(RoutingTable::from_resources(methods)))
    }

    #[must_use]
    pub fn resource_table(mut self, ty: TypeKey, table: Arc<RoutingTable>) -> Self {
        self.resources.push((ty, table));
        self
    }

    #[must_use]
    pub fn build(self) -> DispatchEngine {
        let resolver =
            LocatorResolver::new(Arc::new(self.hierarchy), self.instantiator, &self.config);
        for (ty, table) in self.resources {
            resolver.add_resource(ty, table);
        }
        let engine = DispatchEngine {
            roots: RequestMapper::new(self.roots),
            resolver: Arc::new(resolver),
            config: self.config,
        };
        info!(
            root_resources = engine.roots.templates().len(),
            max_locator_depth = engine.config.max_locator_depth,
            resume_on_404 = engine.config.resume_on_404,
            "Dispatch engine built"
        );
        engine
    }
}
