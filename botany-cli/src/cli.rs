use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about = "A botany guide kept as a directory tree")]
pub struct Cli {
    /// Workspace root directory (overrides BOTANY_WORKSPACE and workspace.json)
    #[clap(long, short = 'w')]
    pub workspace: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the classification tree
    Tree {
        /// Only list the species leaves
        #[clap(long)]
        species: bool,
    },

    /// Show a species and all of its identifications
    Show {
        /// Species name or species directory
        species: String,
    },

    /// Page through the identifications and photos of a species
    Browse {
        /// Species name or species directory
        species: String,
    },

    /// Species management commands
    #[clap(subcommand)]
    Species(SpeciesCommand),

    /// Identification management commands
    #[clap(subcommand)]
    Ident(IdentCommand),

    /// Workspace pointer commands
    #[clap(subcommand)]
    Workspace(WorkspaceCommand),
}

#[derive(Subcommand, Debug)]
pub enum SpeciesCommand {
    /// Create a new species record
    Add {
        /// Directory receiving the record (prompted when omitted)
        #[clap(long, short = 'd')]
        directory: Option<PathBuf>,
    },

    /// Edit an existing species record
    Edit {
        /// Species name or species directory
        species: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum IdentCommand {
    /// Add an identification to a species
    Add {
        /// Species name or species directory
        species: String,
    },

    /// Edit an existing identification
    Edit {
        /// Identification directory
        directory: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum WorkspaceCommand {
    /// Print the current workspace root
    Show,

    /// Point the workspace file at a new root directory
    Set {
        /// Root directory of the classification tree
        directory: PathBuf,
    },
}
