//! Sequencing of backend calls for one external server.
//!
//! ```text
//! Uncreated -> Created -> Synced <-> Drifted -> Deleted
//! ```
//!
//! All calls for one object are strictly sequential. Nothing is persisted
//! here; the caller owns the state between calls.

use extserver_core::{AttributeOperation, ConnectorRecord, Identifier, ProductVersion, Variant};
use serde::Serialize;

use crate::{
    attributes::attribute,
    codec,
    defaults::apply_defaults,
    diagnostics::Diagnostic,
    error::{BackendError, EngineError},
    framework::Backend,
    gate, planner,
    projector::{project, Projection, ProjectionMode},
    registry,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// The engine created the object and may delete it.
    Managed,
    /// The object exists independently of the engine. Create only converges
    /// it and delete only forgets it.
    Adopted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Lifecycle {
    Uncreated,
    Created,
    Synced,
    Drifted,
    Deleted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// What the engine now knows of the remote object
    pub state: ConnectorRecord,
    pub lifecycle: Lifecycle,
    /// Sent to the backend; for a read, what would restore the prior state
    pub operations: Vec<AttributeOperation>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    Present(Outcome),
    /// Deleted behind the engine's back. The caller should drop its state.
    Gone,
}

impl ReadOutcome {
    pub fn lifecycle(&self) -> Lifecycle {
        match self {
            ReadOutcome::Present(outcome) => outcome.lifecycle,
            ReadOutcome::Gone => Lifecycle::Uncreated,
        }
    }
}

/// What an apply of a plan would do, without doing it.
#[derive(Debug, Clone, PartialEq)]
pub enum Preview {
    Create(ConnectorRecord),
    /// Delete, then create this
    Replace(ConnectorRecord),
    Update(Vec<AttributeOperation>),
}

pub struct Reconciler<'a> {
    backend: &'a dyn Backend,
    mode: Mode,
    product_version: ProductVersion,
}

impl<'a> Reconciler<'a> {
    pub fn new(backend: &'a dyn Backend, mode: Mode, product_version: ProductVersion) -> Self {
        Reconciler {
            backend,
            mode,
            product_version,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    fn projection_mode(&self) -> ProjectionMode {
        match self.mode {
            Mode::Managed => ProjectionMode::Normal,
            Mode::Adopted => ProjectionMode::Adoption,
        }
    }

    /// Defaults, version gate, validation and normalization: everything that
    /// can reject a plan without contacting the backend.
    ///
    /// Defaults are only filled in for managed objects. An adopted object's
    /// unset attributes keep whatever the remote store has.
    pub fn prepare(&self, plan: &ConnectorRecord) -> Result<ConnectorRecord, EngineError> {
        let effective = match self.mode {
            Mode::Managed => apply_defaults(plan),
            Mode::Adopted => plan.clone(),
        };
        gate::gate(effective.variant, self.product_version, &effective)?;
        registry::validate(&effective)?;
        let mut prepared = ConnectorRecord::new(effective.identifier.clone(), effective.variant);
        for (name, value) in effective.attributes() {
            if let Some(spec) = attribute(name) {
                prepared.set(name, codec::normalize(spec, value)?);
            }
        }
        Ok(prepared)
    }

    #[tracing::instrument(skip_all, fields(identifier = %plan.identifier, variant = %plan.variant))]
    pub async fn create(&self, plan: &ConnectorRecord) -> Result<Outcome, EngineError> {
        let prepared = self.prepare(plan)?;
        match self.mode {
            Mode::Managed => self.create_remote(&prepared).await,
            Mode::Adopted => self.adopt(&prepared).await,
        }
    }

    async fn create_remote(&self, prepared: &ConnectorRecord) -> Result<Outcome, EngineError> {
        let response = self
            .backend
            .create(prepared)
            .await
            .map_err(|e| EngineError::backend(describe("create", &prepared.identifier), e))?;
        let Projection {
            record,
            diagnostics,
        } = project(prepared.variant, &response, prepared, self.projection_mode());
        tracing::info!("created");
        Ok(Outcome {
            state: record,
            lifecycle: Lifecycle::Created,
            operations: Vec::new(),
            diagnostics,
        })
    }

    async fn adopt(&self, prepared: &ConnectorRecord) -> Result<Outcome, EngineError> {
        let current = self.read_existing(&prepared.identifier).await?;
        if current.variant != prepared.variant {
            return Err(EngineError::VariantChanged {
                identifier: prepared.identifier.clone(),
                from: current.variant,
                to: prepared.variant,
            });
        }
        // Nothing has been sent yet, so no secret is known to be in place.
        let nothing_sent = ConnectorRecord::new(prepared.identifier.clone(), prepared.variant);
        let Projection {
            record: state,
            mut diagnostics,
        } = project(prepared.variant, &current, &nothing_sent, ProjectionMode::Adoption);
        let operations = planner::plan(prepared, &state)?;
        if operations.is_empty() {
            tracing::info!("adopted");
            return Ok(Outcome {
                state,
                lifecycle: Lifecycle::Created,
                operations,
                diagnostics,
            });
        }
        let projection = self.update_remote(prepared, &operations).await?;
        tracing::info!(operations = operations.len(), "adopted and converged");
        merge(&mut diagnostics, projection.diagnostics);
        Ok(Outcome {
            state: projection.record,
            lifecycle: Lifecycle::Created,
            operations,
            diagnostics,
        })
    }

    /// Refresh from the backend, comparing against `prior` for drift.
    #[tracing::instrument(skip_all, fields(identifier = %prior.identifier, variant = %prior.variant))]
    pub async fn read(&self, prior: &ConnectorRecord) -> Result<ReadOutcome, EngineError> {
        let response = match self.backend.read(&prior.identifier).await {
            Ok(response) => response,
            Err(BackendError::NotFound(_)) => {
                return match self.mode {
                    Mode::Managed => {
                        tracing::warn!("external server was deleted outside of extserver");
                        Ok(ReadOutcome::Gone)
                    }
                    Mode::Adopted => Err(EngineError::AdoptionTargetMissing {
                        identifier: prior.identifier.clone(),
                    }),
                };
            }
            Err(e) => return Err(EngineError::backend(describe("read", &prior.identifier), e)),
        };
        let Projection {
            record,
            diagnostics,
        } = project(response.variant, &response, prior, self.projection_mode());
        let (lifecycle, operations) = if record.variant != prior.variant {
            (Lifecycle::Drifted, Vec::new())
        } else {
            let operations = planner::plan(prior, &record)?;
            if operations.is_empty() {
                (Lifecycle::Synced, operations)
            } else {
                (Lifecycle::Drifted, operations)
            }
        };
        if lifecycle == Lifecycle::Drifted {
            tracing::warn!("external server has drifted from the last known state");
        }
        Ok(ReadOutcome::Present(Outcome {
            state: record,
            lifecycle,
            operations,
            diagnostics,
        }))
    }

    /// Converge the remote object from `prior` to `plan`.
    ///
    /// A variant change replaces a managed object and is an error for an
    /// adopted one.
    #[tracing::instrument(skip_all, fields(identifier = %plan.identifier, variant = %plan.variant))]
    pub async fn update(&self, plan: &ConnectorRecord, prior: &ConnectorRecord) -> Result<Outcome, EngineError> {
        if plan.identifier != prior.identifier {
            return Err(EngineError::IdentifierChanged {
                from: prior.identifier.clone(),
                to: plan.identifier.clone(),
            });
        }
        let prepared = self.prepare(plan)?;
        if prior.variant != prepared.variant {
            return self.replace(&prepared, prior.variant).await;
        }
        let current = self.read_existing(&prepared.identifier).await?;
        if current.variant != prepared.variant {
            return self.replace(&prepared, current.variant).await;
        }
        let Projection {
            record: state,
            mut diagnostics,
        } = project(prepared.variant, &current, prior, self.projection_mode());
        let operations = planner::plan(&prepared, &state)?;
        if operations.is_empty() {
            let nothing = Diagnostic::NothingToConverge {
                identifier: prepared.identifier.clone(),
            };
            nothing.log();
            diagnostics.push(nothing);
            return Ok(Outcome {
                state,
                lifecycle: Lifecycle::Synced,
                operations,
                diagnostics,
            });
        }
        let projection = self.update_remote(&prepared, &operations).await?;
        tracing::info!(operations = operations.len(), "updated");
        merge(&mut diagnostics, projection.diagnostics);
        Ok(Outcome {
            state: projection.record,
            lifecycle: Lifecycle::Synced,
            operations,
            diagnostics,
        })
    }

    async fn replace(&self, prepared: &ConnectorRecord, from: Variant) -> Result<Outcome, EngineError> {
        if self.mode == Mode::Adopted {
            return Err(EngineError::VariantChanged {
                identifier: prepared.identifier.clone(),
                from,
                to: prepared.variant,
            });
        }
        tracing::info!(%from, "type changed; replacing");
        self.delete_remote(&prepared.identifier).await?;
        self.create_remote(prepared).await
    }

    async fn update_remote(
        &self,
        prepared: &ConnectorRecord,
        operations: &[AttributeOperation],
    ) -> Result<Projection, EngineError> {
        let response = self
            .backend
            .update(&prepared.identifier, operations)
            .await
            .map_err(|e| EngineError::backend(describe("update", &prepared.identifier), e))?;
        Ok(project(prepared.variant, &response, prepared, self.projection_mode()))
    }

    /// Remove the object, or only forget it when adopted.
    #[tracing::instrument(skip_all, fields(identifier = %state.identifier, variant = %state.variant))]
    pub async fn delete(&self, state: &ConnectorRecord) -> Result<Outcome, EngineError> {
        let diagnostics = match self.mode {
            Mode::Managed => {
                self.delete_remote(&state.identifier).await?;
                tracing::info!("deleted");
                Vec::new()
            }
            Mode::Adopted => {
                let forgotten = Diagnostic::Forgotten {
                    identifier: state.identifier.clone(),
                };
                forgotten.log();
                vec![forgotten]
            }
        };
        Ok(Outcome {
            state: state.clone(),
            lifecycle: Lifecycle::Deleted,
            operations: Vec::new(),
            diagnostics,
        })
    }

    async fn delete_remote(&self, identifier: &Identifier) -> Result<(), EngineError> {
        match self.backend.delete(identifier).await {
            Ok(()) => Ok(()),
            Err(BackendError::NotFound(_)) => {
                tracing::info!("already deleted");
                Ok(())
            }
            Err(e) => Err(EngineError::backend(describe("delete", identifier), e)),
        }
    }

    /// Read an object that must exist. A missing adopted object is fatal;
    /// a missing managed one is [`EngineError::NotFound`].
    async fn read_existing(&self, identifier: &Identifier) -> Result<ConnectorRecord, EngineError> {
        match self.backend.read(identifier).await {
            Ok(current) => Ok(current),
            Err(BackendError::NotFound(_)) if self.mode == Mode::Adopted => {
                Err(EngineError::AdoptionTargetMissing {
                    identifier: identifier.clone(),
                })
            }
            Err(e) => Err(EngineError::backend(describe("read", identifier), e)),
        }
    }

    /// What [`Reconciler::create`] (when `prior` is `None`) or
    /// [`Reconciler::update`] would do. Reads, never writes.
    #[tracing::instrument(skip_all, fields(identifier = %plan.identifier, variant = %plan.variant))]
    pub async fn preview(
        &self,
        plan: &ConnectorRecord,
        prior: Option<&ConnectorRecord>,
    ) -> Result<Preview, EngineError> {
        let prepared = self.prepare(plan)?;
        let expected = match (prior, self.mode) {
            (None, Mode::Managed) => return Ok(Preview::Create(prepared)),
            (None, Mode::Adopted) => ConnectorRecord::new(prepared.identifier.clone(), prepared.variant),
            (Some(prior), _) => prior.clone(),
        };
        if expected.variant != prepared.variant {
            return self.preview_replace(prepared, expected.variant);
        }
        let current = match self.read_existing(&prepared.identifier).await {
            Ok(current) => current,
            Err(EngineError::NotFound { .. }) => return Ok(Preview::Create(prepared)),
            Err(e) => return Err(e),
        };
        if current.variant != prepared.variant {
            return self.preview_replace(prepared, current.variant);
        }
        let state = project(prepared.variant, &current, &expected, self.projection_mode()).record;
        Ok(Preview::Update(planner::plan(&prepared, &state)?))
    }

    fn preview_replace(&self, prepared: ConnectorRecord, from: Variant) -> Result<Preview, EngineError> {
        match self.mode {
            Mode::Managed => Ok(Preview::Replace(prepared)),
            Mode::Adopted => Err(EngineError::VariantChanged {
                identifier: prepared.identifier.clone(),
                from,
                to: prepared.variant,
            }),
        }
    }
}

/// Append what the write reported, skipping what the read already did.
fn merge(diagnostics: &mut Vec<Diagnostic>, more: Vec<Diagnostic>) {
    for d in more {
        if !diagnostics.contains(&d) {
            diagnostics.push(d);
        }
    }
}

fn describe(operation: &str, identifier: &Identifier) -> String {
    format!("{} external server '{}'", operation, identifier)
}
