//! Type-check then evaluate.
//!
//! [`Pipeline`] handles standalone expressions: compile once, evaluate
//! many times against different bindings. [`RegistryPipeline`] owns a
//! [`Registry`] and drives the whole model: extraction, building, rebuilds
//! after changes, and evaluation of stored definitions at their own scope.

use std::sync::Arc;

use clause_common::ast::Expr;
use clause_common::model::Model;
use clause_common::{DefinitionKey, ScopeContext};
use clause_registry::{
    Definition, InvalidationSet, RebuildError, RebuildStrategy, Registry, RegistryError,
};
use clause_typeck::diagnostics::render_diagnostic;
use clause_typeck::{CheckSession, Ty, TypeChecker, TypeError, TypedNode};
use tracing::{debug, info_span, warn};

use crate::adapters::{DependencyRecorder, RuntimeAdapter, TypeCheckerAdapter};
use crate::build::{DefinitionBuilder, ExpressionParser};
use crate::config::PipelineConfig;
use crate::error::{BuildError, EvalError, PipelineError};
use crate::eval::{Bindings, EvalContext, Evaluator, RelationContext, Value};
use crate::extract::{ExtractedExpression, Extractor};

// ── Pipeline ───────────────────────────────────────────────────────────

/// A checked expression, ready to evaluate repeatedly.
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledExpression {
    pub typed_body: Arc<TypedNode>,
    pub parameters: Vec<String>,
    pub parameter_types: Vec<Ty>,
}

impl CompiledExpression {
    pub fn ty(&self) -> &Ty {
        &self.typed_body.ty
    }
}

/// Checks and evaluates expressions that do not call registry definitions.
pub struct Pipeline<E> {
    checker: TypeChecker,
    evaluator: E,
    config: PipelineConfig,
}

impl<E: Evaluator> Pipeline<E> {
    pub fn new(evaluator: E) -> Self {
        Self::with_config(evaluator, PipelineConfig::default())
    }

    pub fn with_config(evaluator: E, config: PipelineConfig) -> Self {
        Pipeline {
            checker: TypeChecker::new(),
            evaluator,
            config,
        }
    }

    /// Type-check `expr` with `parameters` in scope.
    pub fn compile(&self, expr: &Expr, parameters: &[String]) -> Result<CompiledExpression, TypeError> {
        let scope = ScopeContext::global();
        let session = CheckSession {
            self_name: Some(&self.config.self_name),
            ..CheckSession::standalone(&scope)
        };
        let checked = self.checker.check(expr, parameters, &session)?;
        Ok(CompiledExpression {
            typed_body: Arc::new(checked.typed_body),
            parameters: parameters.to_vec(),
            parameter_types: checked.parameters,
        })
    }

    /// Evaluate a compiled expression. No re-inference happens.
    pub fn eval(&self, compiled: &CompiledExpression, bindings: &Bindings) -> Result<Value, EvalError> {
        if let Some(missing) = compiled
            .parameters
            .iter()
            .find(|p| bindings.get(p).is_none())
        {
            return Err(EvalError::new(format!("parameter `{}` is not bound", missing)));
        }
        let ctx = EvalContext::standalone(bindings, &self.config.self_name);
        self.evaluator.eval(&compiled.typed_body, &ctx)
    }

    /// Compile with every bound name as a parameter, then evaluate.
    pub fn check_and_eval(&self, expr: &Expr, bindings: &Bindings) -> Result<Value, PipelineError> {
        let parameters: Vec<String> = bindings.names().map(str::to_string).collect();
        let compiled = self.compile(expr, &parameters)?;
        Ok(self.eval(&compiled, bindings)?)
    }
}

// ── RegistryPipeline ───────────────────────────────────────────────────

/// Outcome of [`RegistryPipeline::load_model`].
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Every key that was registered, in extraction order.
    pub registered: Vec<DefinitionKey>,
    /// Expressions that could not be parsed or registered.
    pub build_errors: Vec<BuildError>,
    /// Definitions that failed to type-check.
    pub rebuild_error: Option<RebuildError>,
}

impl LoadReport {
    pub fn is_ok(&self) -> bool {
        self.build_errors.is_empty() && self.rebuild_error.is_none()
    }
}

/// Owns a registry and keeps it type-checked.
pub struct RegistryPipeline<E> {
    registry: Arc<Registry>,
    checker: TypeChecker,
    evaluator: E,
    config: PipelineConfig,
}

impl<E: Evaluator> RegistryPipeline<E> {
    pub fn new(evaluator: E) -> Self {
        Self::with_registry(Arc::new(Registry::new()), evaluator, PipelineConfig::default())
    }

    pub fn with_config(evaluator: E, config: PipelineConfig) -> Self {
        Self::with_registry(Arc::new(Registry::new()), evaluator, config)
    }

    /// Drive an existing, possibly shared, registry.
    pub fn with_registry(registry: Arc<Registry>, evaluator: E, config: PipelineConfig) -> Self {
        RegistryPipeline {
            registry,
            checker: TypeChecker::new(),
            evaluator,
            config,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn shared_registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    // ── Building ────────────────────────────────────────────────────────

    /// Extract, build and fully type-check every expression of `model`.
    pub fn load_model(&self, model: &Model, parser: &dyn ExpressionParser) -> LoadReport {
        let _span = info_span!("load_model").entered();
        let exprs = Extractor::new().extract(model);
        debug!(count = exprs.len(), "expressions extracted");

        let (registered, build_errors) =
            DefinitionBuilder::new(&self.registry).build_all(exprs, parser);
        for err in &build_errors {
            warn!(error = %err, "expression not registered");
        }

        let rebuild_error = self.rebuild_all().err();
        LoadReport {
            registered,
            build_errors,
            rebuild_error,
        }
    }

    /// Register one expression without type-checking it.
    pub fn register_expression(
        &self,
        expr: ExtractedExpression,
        parser: &dyn ExpressionParser,
    ) -> Result<DefinitionKey, BuildError> {
        DefinitionBuilder::new(&self.registry).build(expr, parser)
    }

    // ── Rebuilding ──────────────────────────────────────────────────────

    /// Invalidate `changed` and everything depending on them, then re-check
    /// the invalidated definitions in dependency order.
    pub fn rebuild_definitions(
        &self,
        changed: &[DefinitionKey],
    ) -> Result<Vec<DefinitionKey>, PipelineError> {
        let invalidated = self.registry.invalidate_many(changed)?;
        let strategy = if self.config.prefers_full_rebuild(invalidated.len()) {
            RebuildStrategy::Full
        } else {
            RebuildStrategy::Incremental
        };
        Ok(self.rebuild(strategy, &invalidated)?)
    }

    /// Forget all type information and re-check everything.
    pub fn rebuild_all(&self) -> Result<Vec<DefinitionKey>, RebuildError> {
        self.rebuild(RebuildStrategy::Full, &InvalidationSet::new())
    }

    fn rebuild(
        &self,
        strategy: RebuildStrategy,
        invalidated: &InvalidationSet,
    ) -> Result<Vec<DefinitionKey>, RebuildError> {
        self.registry
            .rebuild(strategy, invalidated, |def| self.check_definition(def))
    }

    /// Check one definition at its own scope and store the result.
    fn check_definition(&self, def: &Definition) -> Result<(), TypeError> {
        let recorder = DependencyRecorder::begin(&self.registry, def.key.clone());
        let adapter = TypeCheckerAdapter::new(&self.registry);
        let scope = def.scope_context();
        let session = CheckSession {
            registry: &adapter,
            scope: &scope,
            tracker: Some(&recorder),
            self_name: def.scope.is_some().then_some(self.config.self_name.as_str()),
        };
        let checked = self
            .checker
            .check(&def.body, &def.parameter_names(), &session)?;

        // A conflict means the definition changed while it was being
        // checked; whoever changed it has already invalidated it.
        if let Err(err) = self.registry.set_typed_body(&def.key, def.version, checked) {
            warn!(key = %def.key, error = %err, "discarding type-check result");
        }
        Ok(())
    }

    /// Replace a definition's text and re-check it and its dependents.
    pub fn update_definition(
        &self,
        key: &DefinitionKey,
        text: &str,
        parameters: Vec<String>,
        parser: &dyn ExpressionParser,
    ) -> Result<Vec<DefinitionKey>, PipelineError> {
        let body = parser.parse_expression(text)?;
        self.registry.update(key, body.clone(), parameters)?;

        let previous = self.registry.with_definition(key, |d| d.source.clone()).flatten();
        if let Some(mut source) = previous {
            source.text = text.to_string();
            if source.guarantee.is_some() {
                source.guarantee = Some(crate::build::classify_guarantee(&body));
            }
            self.registry.attach_source(key, source)?;
        }

        self.rebuild_definitions(std::slice::from_ref(key))
    }

    /// Remove a definition and re-check whatever called it. The callers
    /// fail to resolve the call and are reported in the returned error.
    pub fn delete_definition(&self, key: &DefinitionKey) -> Result<Vec<DefinitionKey>, PipelineError> {
        let removed = self.registry.delete(key)?;
        let dependents: Vec<DefinitionKey> = removed
            .depended_by
            .into_iter()
            .filter(|k| self.registry.contains(k))
            .collect();
        if dependents.is_empty() {
            return Ok(Vec::new());
        }
        self.rebuild_definitions(&dependents)
    }

    // ── Evaluation ──────────────────────────────────────────────────────

    /// Evaluate a stored definition at its own scope.
    pub fn evaluate(
        &self,
        key: &DefinitionKey,
        bindings: &Bindings,
        relation: Option<&RelationContext>,
    ) -> Result<Value, PipelineError> {
        let def = self
            .registry
            .get(key)
            .ok_or_else(|| RegistryError::NotFound(key.clone()))?;
        let typed = def
            .typed_body
            .clone()
            .ok_or_else(|| PipelineError::NotTyped(key.clone()))?;
        let ctx = EvalContext {
            bindings,
            scope: def.scope_context(),
            self_name: &self.config.self_name,
            relation,
            guarantee: def.guarantee(),
            runtime: Some(RuntimeAdapter::new(&self.registry)),
        };
        Ok(self.evaluator.eval(&typed, &ctx)?)
    }

    /// Check and evaluate an ad-hoc expression written at `scope`. Calls
    /// resolve against the registry; no dependency edges are recorded.
    pub fn evaluate_at(
        &self,
        expr: &Expr,
        scope: &ScopeContext,
        bindings: &Bindings,
        relation: Option<&RelationContext>,
    ) -> Result<Value, PipelineError> {
        let adapter = TypeCheckerAdapter::new(&self.registry);
        let session = CheckSession {
            registry: &adapter,
            scope,
            tracker: None,
            self_name: Some(&self.config.self_name),
        };
        let parameters: Vec<String> = bindings.names().map(str::to_string).collect();
        let checked = self.checker.check(expr, &parameters, &session)?;
        let ctx = EvalContext {
            bindings,
            scope: scope.clone(),
            self_name: &self.config.self_name,
            relation,
            guarantee: None,
            runtime: Some(RuntimeAdapter::new(&self.registry)),
        };
        Ok(self.evaluator.eval(&checked.typed_body, &ctx)?)
    }

    // ── Diagnostics ─────────────────────────────────────────────────────

    /// Render each failure of a rebuild against its definition's source
    /// text. Definitions without stored source fall back to the plain
    /// error message.
    pub fn render_errors(&self, error: &RebuildError) -> Vec<String> {
        error
            .errors
            .iter()
            .map(|e| {
                let text = self
                    .registry
                    .with_definition(&e.key, |d| d.source.as_ref().map(|s| s.text.clone()))
                    .flatten();
                match text {
                    Some(text) => render_diagnostic(
                        &e.error,
                        &text,
                        e.key.as_str(),
                        self.config.color_diagnostics,
                    ),
                    None => e.to_string(),
                }
            })
            .collect()
    }
}
