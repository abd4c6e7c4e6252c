use std::{collections::BTreeMap, path::PathBuf};

use anyhow::{Context, Result};
use extserver_core::{AttributeOperation, Identifier};
use extserver_resource::{Outcome, Preview, Reconciler};
use extserver_resources_local::LocalStore;

use crate::{
    declaration::{Declarations, Declared},
    options::Options,
    state::{EngineState, ServerState},
};

#[derive(clap::Parser, Debug)]
pub(crate) struct Args {
    /// Declaration file listing the external servers that should exist
    declarations: PathBuf,
}

/// Run the `apply` command.
pub(crate) async fn apply(options: &Options, args: &Args) -> Result<()> {
    let declared = Declarations::load(&args.declarations)?.declared()?;
    let store = LocalStore::open(&options.store)?;
    let mut state = EngineState::load(&options.state)?;

    if declared.is_empty() {
        eprintln!("No external servers declared.");
    }
    for (id, Declared { plan, mode }) in declared.iter() {
        let r = Reconciler::new(&store, *mode, options.product_version);
        let outcome = match state.servers.get(id) {
            None => r.create(plan).await,
            Some(prior) => match r.update(plan, &prior.record).await {
                Err(e) if e.is_recoverable() => {
                    eprintln!("{}: gone from the store; creating it again", id);
                    r.create(plan).await
                }
                result => result,
            },
        }
        .with_context(|| format!("Could not apply external server '{}'", id))?;
        report(id, &outcome);
        state
            .servers
            .insert(id.clone(), ServerState::new(*mode, outcome.state));
        state.save(&options.state)?;
    }

    let undeclared: Vec<Identifier> = state
        .servers
        .keys()
        .filter(|id| !declared.contains_key(*id))
        .cloned()
        .collect();
    for id in undeclared {
        let Some(server) = state.servers.get(&id) else {
            continue;
        };
        let r = Reconciler::new(&store, server.mode(), options.product_version);
        let outcome = r
            .delete(&server.record)
            .await
            .with_context(|| format!("Could not remove external server '{}'", id))?;
        report(&id, &outcome);
        state.servers.remove(&id);
        state.save(&options.state)?;
    }
    Ok(())
}

/// Diagnostics are already logged by the engine.
fn report(id: &Identifier, outcome: &Outcome) {
    match outcome.operations.len() {
        0 => eprintln!("{}: {:?}", id, outcome.lifecycle),
        n => eprintln!("{}: {:?} ({} operations)", id, outcome.lifecycle, n),
    }
}

/// Run the `plan` command.
pub(crate) async fn plan(options: &Options, args: &Args) -> Result<()> {
    let declared = Declarations::load(&args.declarations)?.declared()?;
    let store = LocalStore::open(&options.store)?;
    let state = EngineState::load(&options.state)?;

    let mut previews = BTreeMap::new();
    for (id, Declared { plan, mode }) in declared.iter() {
        let r = Reconciler::new(&store, *mode, options.product_version);
        let prior = state.servers.get(id).map(|s| &s.record);
        let preview = r
            .preview(plan, prior)
            .await
            .with_context(|| format!("Could not plan external server '{}'", id))?;
        previews.insert(id.clone(), preview);
    }
    for (id, preview) in previews.iter() {
        match preview {
            Preview::Create(record) => println!("+ {} ({})", id, record.variant),
            Preview::Replace(record) => println!("-/+ {} ({})", id, record.variant),
            Preview::Update(operations) if operations.is_empty() => println!("= {}", id),
            Preview::Update(operations) => {
                println!("~ {}", id);
                print_operations(operations)?;
            }
        }
    }
    for (id, server) in state.servers.iter() {
        if !declared.contains_key(id) {
            if server.adopted {
                println!("- {} (forget only)", id);
            } else {
                println!("- {}", id);
            }
        }
    }
    Ok(())
}

fn print_operations(operations: &[AttributeOperation]) -> Result<()> {
    for op in operations {
        println!("    {}", serde_json::to_string(&op.to_wire())?);
    }
    Ok(())
}
