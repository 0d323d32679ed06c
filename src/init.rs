//! Project initialization for storyloom
//!
//! `storyloom init` creates the project directory, the content database and
//! a default config. Existing files are left alone.

use crate::config::Config;
use crate::db::Database;
use colored::Colorize;
use std::fs;
use std::path::Path;

const PROJECT_DIR: &str = ".storyloom";

/// Initialize storyloom in the current directory
pub fn init_project() -> Result<(), String> {
    let cwd = std::env::current_dir().map_err(|e| format!("Could not get current directory: {}", e))?;
    init_project_at(&cwd)
}

/// Initialize storyloom under `root`
pub fn init_project_at(root: &Path) -> Result<(), String> {
    println!("\n{}", "Initializing Storyloom...".cyan().bold());
    println!("   Directory: {}\n", root.display());

    let project_dir = root.join(PROJECT_DIR);
    create_dir_if_missing(&project_dir)?;

    let db_path = project_dir.join("storyloom.db");
    if db_path.exists() {
        println!("   {} .storyloom/storyloom.db (already exists)", "Skipping".yellow());
    }
    // Opening runs the schema setup and column backfill either way
    Database::open_at(&db_path).map_err(|e| format!("Could not open database: {}", e))?;
    if !db_path.exists() {
        return Err(format!("Database was not created at {}", db_path.display()));
    }

    let config_path = project_dir.join("config.toml");
    write_file_if_missing(&config_path, &Config::default_toml(), ".storyloom/config.toml")?;

    add_to_gitignore(root)?;

    println!("\n{}", "Storyloom initialized!".green().bold());
    println!("\nNext steps:");
    println!("  1. Run {} to start an arc", "storyloom arc add \"Act One\"".cyan());
    println!("  2. Run {} to write a storylet", "storyloom storylet add \"Opening\"".cyan());
    println!("  3. Run {} to see how they connect", "storyloom graph".cyan());
    println!();

    Ok(())
}

fn create_dir_if_missing(path: &Path) -> Result<(), String> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| format!("Could not create {}: {}", path.display(), e))?;
        println!("   {} {}", "Creating".green(), path.display());
    }
    Ok(())
}

fn write_file_if_missing(path: &Path, content: &str, display_name: &str) -> Result<(), String> {
    if path.exists() {
        println!("   {} {} (already exists)", "Skipping".yellow(), display_name);
    } else {
        fs::write(path, content).map_err(|e| format!("Could not write {}: {}", display_name, e))?;
        println!("   {} {}", "Creating".green(), display_name);
    }
    Ok(())
}

fn add_to_gitignore(root: &Path) -> Result<(), String> {
    let gitignore_path = root.join(".gitignore");
    let entry = ".storyloom/";

    if gitignore_path.exists() {
        let existing =
            fs::read_to_string(&gitignore_path).map_err(|e| format!("Could not read .gitignore: {}", e))?;

        if existing.lines().any(|line| line.trim() == entry || line.trim() == PROJECT_DIR) {
            return Ok(());
        }

        let new_content = format!("{}\n\n# Storyloom content database (local)\n{}\n", existing.trim_end(), entry);
        fs::write(&gitignore_path, new_content).map_err(|e| format!("Could not update .gitignore: {}", e))?;
        println!("   {} .gitignore (added .storyloom/)", "Updated".green());
    } else {
        let content = format!("# Storyloom content database (local)\n{}\n", entry);
        fs::write(&gitignore_path, content).map_err(|e| format!("Could not create .gitignore: {}", e))?;
        println!("   {} .gitignore", "Creating".green());
    }

    Ok(())
}
