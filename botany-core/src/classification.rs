//! Classification index
//!
//! Walks the workspace root down to the species rank and builds the
//! taxonomy tree. Nodes only carry display metadata; a species leaf holds
//! the path from which a [`Species`] can be opened on demand.

use log::debug;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::species::Species;
use crate::walk::walk_directories;

/// One level of the fixed seven-level taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rank {
    Kingdom,
    Division,
    Class,
    Order,
    Family,
    Genus,
    Species,
}

impl Rank {
    pub const ALL: [Rank; 7] = [
        Rank::Kingdom,
        Rank::Division,
        Rank::Class,
        Rank::Order,
        Rank::Family,
        Rank::Genus,
        Rank::Species,
    ];

    /// Depth below the workspace root, from 1 (kingdom) to 7 (species)
    pub fn depth(self) -> usize {
        self as usize + 1
    }

    pub fn from_depth(depth: usize) -> Option<Rank> {
        depth.checked_sub(1).and_then(|i| Rank::ALL.get(i).copied())
    }

    pub fn label(self) -> &'static str {
        match self {
            Rank::Kingdom => "Kingdom",
            Rank::Division => "Division",
            Rank::Class => "Class",
            Rank::Order => "Order",
            Rank::Family => "Family",
            Rank::Genus => "Genus",
            Rank::Species => "Species",
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Display name of a rank directory: underscores become spaces, each word
/// is title-cased
///
/// A word starts after any non-alphabetic character, so `x-hybrida` becomes
/// `X-Hybrida`.
pub fn display_name(directory_name: &str) -> String {
    let mut name = String::with_capacity(directory_name.len());
    let mut word_start = true;
    for c in directory_name.chars() {
        let c = if c == '_' { ' ' } else { c };
        if c.is_alphabetic() {
            if word_start {
                name.extend(c.to_uppercase());
            } else {
                name.extend(c.to_lowercase());
            }
            word_start = false;
        } else {
            name.push(c);
            word_start = true;
        }
    }
    name
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankNode {
    pub name: String,
    pub path: PathBuf,
    pub rank: Rank,
    pub children: Vec<RankNode>,
}

impl RankNode {
    pub fn is_leaf(&self) -> bool {
        self.rank == Rank::Species
    }

    /// Path to open the species store from, for species-rank nodes
    pub fn species_path(&self) -> Option<&Path> {
        self.is_leaf().then_some(self.path.as_path())
    }

    /// Loads the species this leaf refers to
    pub fn open_species(&self) -> Option<Result<Species>> {
        self.species_path().map(Species::open)
    }
}

/// Taxonomy tree of a workspace
#[derive(Debug, Clone)]
pub struct ClassificationIndex {
    root: PathBuf,
    nodes: Vec<RankNode>,
    counts: [usize; 7],
}

impl ClassificationIndex {
    /// Walks `root` and builds the whole tree
    pub fn build<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let mut counts = [0usize; 7];
        let mut nodes = Vec::new();
        let mut stack: Vec<RankNode> = Vec::new();

        let first = Rank::Kingdom.depth();
        let last = Rank::Species.depth();
        walk_directories(&root, first..=last, |path, depth| {
            let Some(rank) = Rank::from_depth(depth) else {
                return;
            };
            while stack.last().is_some_and(|top| top.rank >= rank) {
                attach(&mut stack, &mut nodes);
            }
            let name = path
                .file_name()
                .map(|n| display_name(&n.to_string_lossy()))
                .unwrap_or_default();
            counts[rank as usize] += 1;
            stack.push(RankNode {
                name,
                path: path.to_path_buf(),
                rank,
                children: Vec::new(),
            });
        })?;
        while !stack.is_empty() {
            attach(&mut stack, &mut nodes);
        }

        debug!(
            "Classification of {:?}: {} species leaves",
            root,
            counts[Rank::Species as usize]
        );
        Ok(Self {
            root,
            nodes,
            counts,
        })
    }

    /// Rebuilds the whole tree from disk
    pub fn refresh(&mut self) -> Result<()> {
        *self = Self::build(&self.root)?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Top-level (kingdom) nodes
    pub fn nodes(&self) -> &[RankNode] {
        &self.nodes
    }

    pub fn count(&self, rank: Rank) -> usize {
        self.counts[rank as usize]
    }

    /// Header label such as `"Kingdom (2)"`
    pub fn header_label(&self, rank: Rank) -> String {
        format!("{} ({})", rank.label(), self.count(rank))
    }

    /// Every species-rank node, in walk order
    pub fn leaves(&self) -> Vec<&RankNode> {
        let mut leaves = Vec::new();
        let mut pending: Vec<&RankNode> = self.nodes.iter().rev().collect();
        while let Some(node) = pending.pop() {
            if node.is_leaf() {
                leaves.push(node);
            }
            pending.extend(node.children.iter().rev());
        }
        leaves
    }

    /// Finds a species leaf by display or directory name, ignoring case
    pub fn find_leaf(&self, name: &str) -> Option<&RankNode> {
        let wanted = display_name(name.trim()).to_lowercase();
        self.leaves()
            .into_iter()
            .find(|leaf| leaf.name.to_lowercase() == wanted)
    }
}

/// Pops the top node and attaches it to its parent, or to the roots
fn attach(stack: &mut Vec<RankNode>, nodes: &mut Vec<RankNode>) {
    if let Some(node) = stack.pop() {
        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => nodes.push(node),
        }
    }
}
