#![forbid(unsafe_code)]

//! Request pipeline tying the query compiler, the permission resolver and
//! the value-group validator to a schema and a record store.
//!
//! Every entry point follows the same order: structural parse (fail fast),
//! partition and field validation, permission resolution, and only then a
//! single call into the store. Validation and permission problems are
//! collected in one pass so the caller sees all of them at once.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::{Map, Value as Json};
use time::Date;
use tracing::{debug, info, warn};

use crate::config::GateConfig;
use crate::error::{ErrorMap, GateError, Result, ValidationError};
use crate::permission::{resolve, Action, PermissionHolder, Resolution};
use crate::query::validate::coerce_scalar;
use crate::query::{
    evaluate, evaluate_groups, parse_filter, partition, ListQuery, PredicateValidator, Value,
};
use crate::schema::{CompiledType, Registry, SchemaProvider};
use crate::store::{Record, RecordStore, StoreError};
use crate::value_groups::ValueGroupValidator;

/// Entry point for filtered reads and validated writes.
#[derive(Debug)]
pub struct Gate<S, P> {
    schema: S,
    store: P,
    registry: Registry,
    config: GateConfig,
    today: Option<Date>,
}

impl<S, P> Gate<S, P>
where
    S: SchemaProvider,
    P: RecordStore,
{
    /// Creates a gate over `schema` and `store`.
    pub fn new(schema: S, store: P, config: GateConfig) -> Self {
        Self {
            schema,
            store,
            registry: Registry::new(),
            config,
            today: None,
        }
    }

    /// Pins the reference date used by no-future checks.
    pub fn with_today(mut self, today: Date) -> Self {
        self.today = Some(today);
        self
    }

    /// Schema the gate resolves types against.
    pub fn schema(&self) -> &S {
        &self.schema
    }

    /// Underlying store.
    pub fn store(&self) -> &P {
        &self.store
    }

    /// Active configuration.
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Cache of compiled types.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Compiled form of `type_name`.
    pub fn compiled(&self, type_name: &str) -> Result<Arc<CompiledType>> {
        self.schema
            .type_by_name(type_name)
            .and_then(|id| self.registry.get_or_compile(&self.schema, id))
            .ok_or_else(|| GateError::UnknownType(type_name.to_owned()))
    }

    /// Drops cached compilation results for `type_name` and its subtypes.
    pub fn invalidate(&self, type_name: &str) {
        if let Some(id) = self.schema.type_by_name(type_name) {
            self.registry.invalidate(id);
        }
    }

    /// Compiles an expression-mode filter into a store predicate without
    /// executing it. `Ok(None)` means "match everything".
    pub fn compile_filter(
        &self,
        caller: &dyn PermissionHolder,
        type_name: &str,
        filter: Option<&Json>,
    ) -> Result<Option<P::Predicate>> {
        let compiled = self.compiled(type_name)?;
        let mut query = parse_filter(filter, &self.config.query)?;
        let Some(root) = query.root.take() else {
            self.authorize(caller, &compiled, Action::View, std::iter::empty(), ErrorMap::new())?;
            return Ok(None);
        };

        let groups = partition(&query.predicates, root.leaves());
        let validator = PredicateValidator::new(&compiled, &self.config.query);
        let errors: ErrorMap = validator
            .validate_batch(&groups, &mut query.predicates)
            .into_iter()
            .collect();

        let fields: BTreeSet<&str> = query
            .predicates
            .iter()
            .map(|(_, predicate)| predicate.field.as_str())
            .collect();
        self.authorize(caller, &compiled, Action::View, fields, errors)?;

        Ok(evaluate(&root, &query.predicates, &self.store))
    }

    /// Runs an expression-mode filter against the store.
    pub fn filter(
        &self,
        caller: &dyn PermissionHolder,
        type_name: &str,
        filter: Option<&Json>,
    ) -> Result<Vec<Record>> {
        let predicate = self.compile_filter(caller, type_name, filter)?;
        self.execute(type_name, predicate.as_ref())
    }

    /// Runs list-mode `field=value` parameters against the store.
    ///
    /// Parameters combine with AND, including repeated parameters for the
    /// same key.
    pub fn list<I, K, V>(
        &self,
        caller: &dyn PermissionHolder,
        type_name: &str,
        params: I,
    ) -> Result<Vec<Record>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let compiled = self.compiled(type_name)?;
        let mut query = ListQuery::from_pairs(params)?;
        let validator = PredicateValidator::new(&compiled, &self.config.query);
        let errors: ErrorMap = validator
            .validate_batch(&query.groups, &mut query.predicates)
            .into_iter()
            .collect();

        let resolution = resolve(
            caller,
            &compiled,
            Action::View,
            &self.config.default_permissions,
            query.fields(),
        );
        self.check(caller, &compiled, Action::View, resolution, errors)?;

        let predicate = evaluate_groups(&query.groups, &query.predicates, &self.store);
        self.execute(type_name, predicate.as_ref())
    }

    /// Checks that `caller` may perform `action` on `fields` of
    /// `type_name`. Undeclared or hidden fields are reported as unknown.
    pub fn authorize_fields<'a, I>(
        &self,
        caller: &dyn PermissionHolder,
        type_name: &str,
        action: Action,
        fields: I,
    ) -> Result<Resolution>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let compiled = self.compiled(type_name)?;
        self.authorize(caller, &compiled, action, fields, ErrorMap::new())
    }

    /// Applies the configured value-group rules of `type_name` to a cleaned
    /// payload. `existing` switches to update semantics.
    pub fn validate_write(
        &self,
        type_name: &str,
        payload: &Record,
        existing: Option<&Record>,
    ) -> Result<()> {
        let errors: ErrorMap = self
            .value_group_errors(type_name, payload, existing, &[])
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(GateError::Invalid(errors))
        }
    }

    /// Authorizes, cleans and validates a create payload, then inserts it.
    ///
    /// A unique-key collision reported by the store surfaces as an
    /// integrity conflict in the validation payload.
    pub fn create(
        &self,
        caller: &dyn PermissionHolder,
        type_name: &str,
        payload: &Map<String, Json>,
    ) -> Result<Record> {
        let record = self.prepare_write(caller, type_name, Action::Add, payload, None)?;
        match self.store.insert(type_name, record.clone()) {
            Ok(()) => {
                info!(
                    caller = caller.caller_id(),
                    type_name,
                    fields = record.len(),
                    "gate.create.completed"
                );
                Ok(record)
            }
            Err(err @ StoreError::DuplicateKey { .. }) => {
                warn!(type_name, error = %err, "gate.create.integrity_conflict");
                let mut errors = ErrorMap::new();
                errors.push(ValidationError::IntegrityConflict {
                    message: err.to_string(),
                });
                Err(GateError::Invalid(errors))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Authorizes, cleans and validates a partial update of `existing`.
    ///
    /// Returns the cleaned changes; applying them is left to the caller.
    pub fn update(
        &self,
        caller: &dyn PermissionHolder,
        type_name: &str,
        payload: &Map<String, Json>,
        existing: &Record,
    ) -> Result<Record> {
        self.prepare_write(caller, type_name, Action::Change, payload, Some(existing))
    }

    fn prepare_write(
        &self,
        caller: &dyn PermissionHolder,
        type_name: &str,
        action: Action,
        payload: &Map<String, Json>,
        existing: Option<&Record>,
    ) -> Result<Record> {
        let compiled = self.compiled(type_name)?;
        let mut errors = ErrorMap::new();
        let mut record = Record::new();
        let mut rejected = Vec::new();
        for (field, raw) in payload {
            let Some(def) = compiled.field(field) else {
                continue;
            };
            match coerce_scalar(def, &Value::from_json(raw)) {
                Ok(value) => {
                    record.insert(field.clone(), value);
                }
                Err(message) => {
                    rejected.push(field.as_str());
                    errors.push(ValidationError::InvalidValue {
                        key: field.clone(),
                        message,
                    });
                }
            }
        }
        errors.extend(self.value_group_errors(type_name, &record, existing, &rejected));
        self.authorize(caller, &compiled, action, payload.keys().map(String::as_str), errors)?;
        Ok(record)
    }

    fn value_group_errors(
        &self,
        type_name: &str,
        payload: &Record,
        existing: Option<&Record>,
        rejected: &[&str],
    ) -> std::vec::IntoIter<ValidationError> {
        let Some(rules) = self.config.rules_for(type_name) else {
            return Vec::new().into_iter();
        };
        let mut validator = ValueGroupValidator::new(rules).skip_fields(rejected.iter().copied());
        if let Some(today) = self.today {
            validator = validator.with_today(today);
        }
        let errors = match existing {
            Some(existing) => validator.validate_update(payload, existing),
            None => validator.validate_create(payload),
        };
        errors.into_iter()
    }

    /// Resolves permissions for `fields`, folds unknown fields into
    /// `errors`, and fails if anything is missing or invalid.
    fn authorize<'a, I>(
        &self,
        caller: &dyn PermissionHolder,
        compiled: &CompiledType,
        action: Action,
        fields: I,
        mut errors: ErrorMap,
    ) -> Result<Resolution>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let resolution = resolve(
            caller,
            compiled,
            action,
            &self.config.default_permissions,
            fields,
        );
        errors.extend(
            resolution
                .unknown
                .iter()
                .map(|field| ValidationError::UnknownField {
                    field: field.clone(),
                }),
        );
        self.check(caller, compiled, action, resolution, errors)
    }

    fn check(
        &self,
        caller: &dyn PermissionHolder,
        compiled: &CompiledType,
        action: Action,
        resolution: Resolution,
        errors: ErrorMap,
    ) -> Result<Resolution> {
        if !resolution.missing.is_empty() {
            warn!(
                caller = caller.caller_id(),
                type_name = compiled.name(),
                %action,
                missing = resolution.missing.len(),
                "gate.authorize.forbidden"
            );
            return Err(GateError::Forbidden {
                missing: resolution.missing,
                errors,
            });
        }
        if !errors.is_empty() {
            debug!(
                type_name = compiled.name(),
                %action,
                errors = %errors,
                "gate.validate.rejected"
            );
            return Err(GateError::Invalid(errors));
        }
        Ok(resolution)
    }

    fn execute(&self, type_name: &str, predicate: Option<&P::Predicate>) -> Result<Vec<Record>> {
        let rows = self.store.execute(type_name, predicate)?;
        debug!(
            type_name,
            filtered = predicate.is_some(),
            rows = rows.len(),
            "gate.execute"
        );
        Ok(rows)
    }
}
