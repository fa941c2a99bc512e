mod cli;
mod prompts;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::{Path, PathBuf};

use botany_core::{
    determine_workspace_root, get_workspace_file_path, page_label, ClassificationIndex, Cursor,
    Identification, Rank, RankNode, RecordError, Species, SpeciesRecord, WorkspaceConfig,
};

use crate::cli::{Cli, Command, IdentCommand, SpeciesCommand, WorkspaceCommand};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match &cli.command {
        Command::Tree { species } => {
            let root = workspace_root(&cli)?;
            print_tree(&root, *species)?;
        }
        Command::Show { species } => {
            let species = open_species(&cli, species)?;
            show_species(&species);
        }
        Command::Browse { species } => {
            let species = open_species(&cli, species)?;
            browse_species(&species)?;
        }
        Command::Species(species_cmd) => {
            handle_species_command(species_cmd, &cli)?;
        }
        Command::Ident(ident_cmd) => {
            handle_ident_command(ident_cmd, &cli)?;
        }
        Command::Workspace(workspace_cmd) => {
            handle_workspace_command(workspace_cmd, &cli)?;
        }
    }

    Ok(())
}

// =========================================================================
// Workspace
// =========================================================================

/// Resolves the workspace root, asking for it when nothing is configured
fn workspace_root(cli: &Cli) -> Result<PathBuf> {
    let pointer_file = get_workspace_file_path()?;
    if let Some(root) = determine_workspace_root(cli.workspace.as_deref(), &pointer_file) {
        log::debug!("Using workspace {:?}", root);
        return Ok(root);
    }

    let Some(root) = prompts::prompt_workspace_directory()? else {
        anyhow::bail!("No workspace selected");
    };
    WorkspaceConfig::new(&root)
        .save(&pointer_file)
        .with_context(|| format!("Failed to write {:?}", pointer_file))?;
    Ok(root)
}

fn handle_workspace_command(cmd: &WorkspaceCommand, cli: &Cli) -> Result<()> {
    match cmd {
        WorkspaceCommand::Show => {
            let pointer_file = get_workspace_file_path()?;
            match determine_workspace_root(cli.workspace.as_deref(), &pointer_file) {
                Some(root) => println!("{}: {}", "Workspace".blue(), root.display()),
                None => println!("{}", "No workspace configured".yellow()),
            }
        }
        WorkspaceCommand::Set { directory } => {
            if !directory.is_dir() {
                anyhow::bail!("Not a directory: {}", directory.display());
            }
            let pointer_file = get_workspace_file_path()?;
            WorkspaceConfig::new(directory)
                .save(&pointer_file)
                .with_context(|| format!("Failed to write {:?}", pointer_file))?;
            println!("{}", "Workspace updated".green());
            print_tree(directory, false)?;
        }
    }
    Ok(())
}

// =========================================================================
// Classification
// =========================================================================

fn print_tree(root: &Path, species_only: bool) -> Result<()> {
    let index = ClassificationIndex::build(root)
        .with_context(|| format!("Failed to read workspace {:?}", root))?;

    if species_only {
        for leaf in index.leaves() {
            println!("{}  {}", leaf.name.green(), leaf.path.display());
        }
        return Ok(());
    }

    let headers: Vec<String> = Rank::ALL
        .iter()
        .map(|rank| index.header_label(*rank))
        .collect();
    println!("{}", headers.join(" | ").bold());

    for node in index.nodes() {
        print_node(node, 0);
    }
    Ok(())
}

fn print_node(node: &RankNode, indent: usize) {
    let padding = "  ".repeat(indent);
    if node.is_leaf() {
        println!("{}{}", padding, node.name.green());
    } else {
        println!("{}{}", padding, node.name);
    }
    for child in &node.children {
        print_node(child, indent + 1);
    }
}

/// Accepts a species directory or a species name from the workspace
fn resolve_species_path(cli: &Cli, species: &str) -> Result<PathBuf> {
    let as_path = PathBuf::from(species);
    if as_path.is_dir() {
        return Ok(as_path);
    }

    let root = workspace_root(cli)?;
    let index = ClassificationIndex::build(&root)
        .with_context(|| format!("Failed to read workspace {:?}", root))?;
    let leaf = index
        .find_leaf(species)
        .with_context(|| format!("Species '{}' not found in {:?}", species, root))?;
    Ok(leaf.path.clone())
}

fn open_species(cli: &Cli, species: &str) -> Result<Species> {
    let path = resolve_species_path(cli, species)?;
    Species::open(&path).with_context(|| format!("Failed to load species from {:?}", path))
}

// =========================================================================
// Display
// =========================================================================

fn show_species(species: &Species) {
    let record = species.record();
    println!("{}: {}", "Latin name".blue(), record.latin_name.italic());
    println!("{}: {}", "Common name".blue(), record.common_name);
    println!("{}: {}", "Edibility".blue(), record.edibility);
    for (label, page) in record.references.entries() {
        println!("{}: {}", label.blue(), page_label(page));
    }
    match species.cover_photo() {
        Some(photo) => println!("{}: {}", "Photo".blue(), photo.display()),
        None => println!("{}: {}", "Photo".blue(), "none".dimmed()),
    }

    let identifications = species.identifications();
    println!(
        "\n{}",
        format!("Identifications ({})", identifications.len()).green()
    );
    for (i, identification) in identifications.iter().enumerate() {
        let record = identification.record();
        println!(
            "  [{}] {} - {}, {}, {} ({} photo(s))",
            i + 1,
            record.date,
            record.location.city,
            record.location.department,
            record.location.country,
            identification.photos().len()
        );
    }
}

fn show_identification(identification: &Identification) {
    let record = identification.record();
    println!("{}: {}", "Date".blue(), record.date);
    println!("{}: {}", "City".blue(), record.location.city);
    println!("{}: {}", "Department".blue(), record.location.department);
    println!("{}: {}", "Country".blue(), record.location.country);
    println!("{}: {}", "GPS".blue(), record.location.gps);
    if !record.description.is_empty() {
        println!("{}: {}", "Description".blue(), record.description);
    }
}

const NEXT_IDENTIFICATION: &str = "Next identification";
const PREVIOUS_IDENTIFICATION: &str = "Previous identification";
const NEXT_PHOTO: &str = "Next photo";
const PREVIOUS_PHOTO: &str = "Previous photo";
const QUIT: &str = "Quit";

fn browse_species(species: &Species) -> Result<()> {
    let identifications = species.identifications();
    let mut identification_cursor = Cursor::new(identifications.len());
    let mut photo_cursor = Cursor::default();

    loop {
        println!(
            "\n{} {}",
            species.record().latin_name.italic(),
            format!("- Identifications {}", identification_cursor.label()).green()
        );

        let Some(identification) = identification_cursor.current(identifications) else {
            println!("{}", "No identification".dimmed());
            return Ok(());
        };
        show_identification(identification);

        let photos = identification.photos();
        match photo_cursor.current(photos) {
            Some(photo) => println!(
                "{} {}: {}",
                "Photos".blue(),
                photo_cursor.label(),
                photo.display()
            ),
            None => println!("{} {}", "Photos".blue(), photo_cursor.label()),
        }

        let mut actions = Vec::new();
        if identification_cursor.can_go_next() {
            actions.push(NEXT_IDENTIFICATION);
        }
        if identification_cursor.can_go_previous() {
            actions.push(PREVIOUS_IDENTIFICATION);
        }
        if photo_cursor.can_go_next() {
            actions.push(NEXT_PHOTO);
        }
        if photo_cursor.can_go_previous() {
            actions.push(PREVIOUS_PHOTO);
        }
        actions.push(QUIT);

        match prompts::prompt_action(actions)? {
            NEXT_IDENTIFICATION => {
                identification_cursor.next();
                photo_cursor.reset();
            }
            PREVIOUS_IDENTIFICATION => {
                identification_cursor.previous();
                photo_cursor.reset();
            }
            NEXT_PHOTO => {
                photo_cursor.next();
            }
            PREVIOUS_PHOTO => {
                photo_cursor.previous();
            }
            _ => return Ok(()),
        }
    }
}

// =========================================================================
// Edit dialogs
// =========================================================================

/// Runs a dialog until the staging copy commits or the user cancels
///
/// Validation failures keep the dialog open. Returns `None` on cancel,
/// otherwise whether anything changed.
fn run_dialog<F, P, C>(mut form: F, prompt: P, mut commit: C) -> Result<Option<bool>>
where
    P: Fn(&F) -> Result<F>,
    C: FnMut(&F) -> botany_core::Result<bool>,
{
    loop {
        form = prompt(&form)?;
        if !prompts::confirm_save()? {
            return Ok(None);
        }
        match commit(&form) {
            Ok(changed) => return Ok(Some(changed)),
            Err(RecordError::ValidationFailed(fields)) => {
                println!("{}: {}", "Invalid fields".red(), fields.join(", "));
                if !prompts::confirm_retry()? {
                    return Ok(None);
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn report(outcome: Option<bool>, done: &str) {
    match outcome {
        Some(true) => println!("{}", done.green()),
        Some(false) => println!("{}", "No changes".yellow()),
        None => println!("{}", "Cancelled".yellow()),
    }
}

fn handle_species_command(cmd: &SpeciesCommand, cli: &Cli) -> Result<()> {
    match cmd {
        SpeciesCommand::Add { directory } => {
            let directory = match directory {
                Some(directory) => directory.clone(),
                None => prompts::prompt_species_directory(&workspace_root(cli)?)?,
            };

            let mut created = None;
            let outcome = run_dialog(
                SpeciesRecord::default().stage(),
                prompts::prompt_species_form,
                |form| {
                    let record = form.validate()?;
                    created = Some(Species::create(&directory, record)?);
                    Ok(true)
                },
            )?;
            report(outcome, "Species added successfully!");
            if let Some(species) = created {
                println!("{}: {}", "File".blue(), species.record_path().display());
            }
        }
        SpeciesCommand::Edit { species } => {
            let mut species = open_species(cli, species)?;
            println!("Editing species: {}", species.record().latin_name.italic());
            let form = species.stage();
            let outcome = run_dialog(form, prompts::prompt_species_form, |form| {
                species.commit(form)
            })?;
            report(outcome, "Species updated successfully!");
        }
    }
    Ok(())
}

fn handle_ident_command(cmd: &IdentCommand, cli: &Cli) -> Result<()> {
    match cmd {
        IdentCommand::Add { species } => {
            let mut species = open_species(cli, species)?;
            println!(
                "New identification for {}",
                species.record().latin_name.italic()
            );

            let mut created = None;
            let form = species
                .identifications()
                .last()
                .map(Identification::stage)
                .unwrap_or_default();
            let outcome = run_dialog(form, prompts::prompt_identification_form, |form| {
                let record = form.validate()?;
                let identification = species.add_identification(record)?;
                created = Some(identification.directory().to_path_buf());
                Ok(true)
            })?;
            report(outcome, "Identification added successfully!");
            if let Some(directory) = created {
                println!("{}: {}", "Directory".blue(), directory.display());
            }
        }
        IdentCommand::Edit { directory } => {
            let species_dir = directory
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let mut species = Species::open(species_dir)
                .with_context(|| format!("Failed to load species from {:?}", species_dir))?;
            let name = directory
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let index = species
                .identification_index(&name)
                .with_context(|| format!("No identification in {:?}", directory))?;

            let identification = &species.identifications()[index];
            println!("Editing identification of {}", identification.record().date);
            let form = identification.stage();
            let outcome = run_dialog(form, prompts::prompt_identification_form, |form| {
                species.commit_identification(index, form)
            })?;
            report(outcome, "Identification updated successfully!");
        }
    }
    Ok(())
}
