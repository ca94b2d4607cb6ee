//! `rugby remote`: drives the S3-compatible remote cache transport (spec
//! §4.6, component C6) independently of the project-mutating workflows.

use clap::Subcommand;

pub mod download;
pub mod upload;

#[derive(Clone, Debug, Subcommand)]
pub enum Command {
    /// Uploads the entries listed in `+latest` to the remote cache.
    Upload(upload::Args),
    /// Downloads a given set of keys from the remote cache.
    Download(download::Args),
}
