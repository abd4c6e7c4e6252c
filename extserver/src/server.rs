//! Commands on a single known external server.

use anyhow::{Context, Result};
use extserver_core::Identifier;
use extserver_resource::{Lifecycle, ReadOutcome, Reconciler};
use extserver_resources_local::LocalStore;

use crate::{
    options::Options,
    state::{EngineState, ServerState},
};

#[derive(clap::Parser, Debug)]
pub(crate) struct Args {
    /// Identifier of the external server
    id: Identifier,
}

fn known<'a>(state: &'a EngineState, id: &Identifier) -> Result<&'a ServerState> {
    state
        .servers
        .get(id)
        .with_context(|| format!("External server '{}' is not in the state file", id))
}

/// Run the `read` command: refresh the state of one server and report drift.
pub(crate) async fn read(options: &Options, args: &Args) -> Result<()> {
    let store = LocalStore::open(&options.store)?;
    let mut state = EngineState::load(&options.state)?;
    let server = known(&state, &args.id)?;
    let mode = server.mode();
    let r = Reconciler::new(&store, mode, options.product_version);
    let outcome = r
        .read(&server.record)
        .await
        .with_context(|| format!("Could not read external server '{}'", args.id))?;
    match outcome {
        ReadOutcome::Gone => {
            eprintln!("{}: deleted outside of extserver; dropped from state", args.id);
            state.servers.remove(&args.id);
        }
        ReadOutcome::Present(outcome) => {
            if outcome.lifecycle == Lifecycle::Drifted {
                eprintln!("{}: drifted; an apply would send:", args.id);
                for op in outcome.operations.iter() {
                    println!("    {}", serde_json::to_string(&op.to_wire())?);
                }
            } else {
                eprintln!("{}: {:?}", args.id, outcome.lifecycle);
            }
            println!("{}", serde_json::to_string_pretty(&outcome.state)?);
            state
                .servers
                .insert(args.id.clone(), ServerState::new(mode, outcome.state));
        }
    }
    state.save(&options.state)
}

/// Run the `delete` command. Adopted servers are only forgotten.
pub(crate) async fn delete(options: &Options, args: &Args) -> Result<()> {
    let store = LocalStore::open(&options.store)?;
    let mut state = EngineState::load(&options.state)?;
    let server = known(&state, &args.id)?;
    let r = Reconciler::new(&store, server.mode(), options.product_version);
    r.delete(&server.record)
        .await
        .with_context(|| format!("Could not delete external server '{}'", args.id))?;
    eprintln!("{}: {:?}", args.id, Lifecycle::Deleted);
    state.servers.remove(&args.id);
    state.save(&options.state)
}
