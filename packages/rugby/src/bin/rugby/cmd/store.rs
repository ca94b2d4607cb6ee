//! `rugby store`: administrative operations on the local binary store
//! (spec §4.2, component C2), separate from the `cache`/`use` workflows.

use clap::Subcommand;

pub mod reset;
pub mod show;

#[derive(Clone, Debug, Subcommand)]
pub enum Command {
    /// Deletes the entire local binary store.
    Reset(reset::Args),
    /// Prints volume usage for the local binary store.
    Show(show::Args),
}
