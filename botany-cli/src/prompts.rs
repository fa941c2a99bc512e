use anyhow::Result;
use inquire::{Confirm, Select, Text};
use std::env;
use std::path::{Path, PathBuf};

use botany_core::{IdentificationForm, SpeciesForm};

/// Asks for the workspace root directory; `None` when the user gives up
pub fn prompt_workspace_directory() -> Result<Option<PathBuf>> {
    let default = env::current_dir()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();

    loop {
        let answer = Text::new("Workspace directory:")
            .with_default(&default)
            .prompt()?;
        let answer = answer.trim();
        if answer.is_empty() {
            return Ok(None);
        }
        let path = PathBuf::from(answer);
        if path.is_dir() {
            return Ok(Some(path));
        }
        println!("Not a directory: {}", path.display());
        if !Confirm::new("Try again?").with_default(true).prompt()? {
            return Ok(None);
        }
    }
}

/// Asks for the directory a new species record goes into
pub fn prompt_species_directory(workspace_root: &Path) -> Result<PathBuf> {
    let default = workspace_root.to_string_lossy().into_owned();
    let answer = Text::new("Species directory:")
        .with_initial_value(&default)
        .prompt()?;
    Ok(PathBuf::from(answer.trim()))
}

fn text_field(label: &str, current: &str) -> Result<String> {
    Ok(Text::new(label).with_initial_value(current).prompt()?)
}

/// Species edit dialog, pre-filled with the staging copy
pub fn prompt_species_form(form: &SpeciesForm) -> Result<SpeciesForm> {
    println!("Reference pages: leave empty when the species is not listed");
    Ok(SpeciesForm {
        latin_name: text_field("Latin name:", &form.latin_name)?,
        common_name: text_field("Common name:", &form.common_name)?,
        edibility: text_field("Edibility:", &form.edibility)?,
        delachaux_fleurs: text_field("Delachaux fleurs page:", &form.delachaux_fleurs)?,
        guide_700_plantes: text_field("Guide 700 plantes page:", &form.guide_700_plantes)?,
        flore_pyrenees: text_field("Flore des Pyrénées page:", &form.flore_pyrenees)?,
        delachaux_arbres: text_field("Delachaux arbres page:", &form.delachaux_arbres)?,
        champignons: text_field("Champignons page:", &form.champignons)?,
    })
}

/// Identification edit dialog, pre-filled with the staging copy
pub fn prompt_identification_form(form: &IdentificationForm) -> Result<IdentificationForm> {
    println!("GPS: degrees in [-90, 90], altitude in meters; leave empty when unknown");
    let description = inquire::Editor::new("Description:")
        .with_predefined_text(&form.description);

    Ok(IdentificationForm {
        day: text_field("Day:", &form.day)?,
        month: text_field("Month:", &form.month)?,
        year: text_field("Year:", &form.year)?,
        city: text_field("City:", &form.city)?,
        department: text_field("Department:", &form.department)?,
        country: text_field("Country:", &form.country)?,
        latitude: text_field("Latitude:", &form.latitude)?,
        longitude: text_field("Longitude:", &form.longitude)?,
        altitude: text_field("Altitude:", &form.altitude)?,
        description: description.prompt()?,
    })
}

pub fn confirm_save() -> Result<bool> {
    Ok(Confirm::new("Save?").with_default(true).prompt()?)
}

pub fn confirm_retry() -> Result<bool> {
    Ok(Confirm::new("Fix the invalid fields?")
        .with_default(true)
        .prompt()?)
}

/// Lets the user pick one of `actions`
pub fn prompt_action(actions: Vec<&'static str>) -> Result<&'static str> {
    Ok(Select::new("Navigate:", actions).prompt()?)
}
