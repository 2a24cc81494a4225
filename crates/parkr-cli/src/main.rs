mod commands;
mod logging;
mod progress;

use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use anyhow::Context;
use chrono::Utc;
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use parkr_core::check::check_state;
use parkr_core::config::{home_dir, load_configuration};
use parkr_core::interactive::{format_age, InteractiveSelector, SelectionOutcome};
use parkr_core::inventory::{self, ProjectInfo};
use parkr_core::platform::CrosstermTerminal;
use parkr_core::prune::{execute, select_with, ExecutionResult, SelectOptions, SelectionResult};
use parkr_core::report::{self, ProjectReport, SortField};
use parkr_core::size::format_size;
use parkr_core::sync::RsyncSync;
use parkr_core::{
    AppConfig, JsonStateStore, ProjectEngine, ProjectStore, PruneReporter, PruneResult,
    RemoveOutcome, SilentReporter, VerifyMode,
};
use progress::CliReporter;
use tracing::{error, info, warn};

/// Exit status when a directory was deleted but the state file was not
/// updated to match.
const EXIT_STATE_UNSAVED: i32 = 2;

fn main() {
    dotenv().ok();

    let args = Cli::parse();

    let config = match load_configuration() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{} loading configuration: {}", "Error".red().bold(), err);
            process::exit(1);
        }
    };

    let guard = logging::init_logger(&config.state_dir().join("parkr.log"));

    let code = match run(args, &config) {
        Ok(code) => code,
        Err(err) => {
            error!("{:#}", err);
            eprintln!("{} {:#}", "Error:".red().bold(), err);
            1
        }
    };

    // Flush the file log before exiting.
    drop(guard);
    process::exit(code);
}

fn run(args: Cli, config: &AppConfig) -> anyhow::Result<i32> {
    let Some(command) = args.command else {
        let _ = Cli::command().print_long_help();
        return Ok(0);
    };

    match command {
        Commands::Init { archive_root } => run_init(config, archive_root),
        Commands::Add { path, category } => {
            let mut store = open_store(config)?;
            let engine = ProjectEngine::new(RsyncSync, home_dir());
            let summary = engine.add(&mut store, &path, category.as_deref())?;
            println!(
                "{} {} ({}) to {}",
                "Added".green(),
                summary.name,
                summary.category,
                summary.archive_path.display()
            );
            Ok(0)
        }
        Commands::List { category, json } => run_list(config, category.as_deref(), json),
        Commands::Status { json } => run_status(config, json),
        Commands::Info { name, json } => {
            let store = open_store(config)?;
            let info = inventory::project_info(store.state(), &name)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                print_info(&info);
            }
            Ok(0)
        }
        Commands::Local { unmanaged, json } => run_local(config, unmanaged, json),
        Commands::Remove { name, archive, yes } => run_remove(config, &name, archive, yes),
        Commands::Grab { name, force, path } => {
            let mut store = open_store(config)?;
            let engine = ProjectEngine::new(RsyncSync, home_dir());
            let local = engine.grab(&mut store, &name, force, path.as_deref())?;
            println!("{} {} to {}", "Grabbed".green(), name, local.display());
            Ok(0)
        }
        Commands::Park { name, no_hash } => {
            let mut store = open_store(config)?;
            let engine = ProjectEngine::new(RsyncSync, home_dir());
            let summary = engine.park(&mut store, &name, no_hash)?;
            println!(
                "{} {} to {}",
                "Parked".green(),
                name,
                summary.archive_path.display()
            );
            match summary.content_hash {
                Some(hash) => println!("  content hash {}", &hash[..12.min(hash.len())]),
                None => println!("  {}", "no hash recorded; rm will verify by mtime".yellow()),
            }
            Ok(0)
        }
        Commands::Rm {
            name,
            no_hash,
            force,
        } => {
            let mode = if force {
                VerifyMode::ForceSkip
            } else if no_hash {
                VerifyMode::MtimeOnly
            } else {
                VerifyMode::Hash
            };
            let mut store = open_store(config)?;
            let engine = ProjectEngine::new(RsyncSync, home_dir());
            match engine.remove_local(&mut store, &name, mode)? {
                RemoveOutcome::Removed { freed } => {
                    println!("{} {} ({} freed)", "Removed".green(), name, format_size(freed))
                }
                RemoveOutcome::AlreadyGone => println!(
                    "{} local copy of {} was already gone; marked as released",
                    "Note:".yellow(),
                    name
                ),
            }
            Ok(0)
        }
        Commands::Report {
            sort,
            candidates,
            no_hash,
            json,
        } => run_report(config, sort, candidates, no_hash, json),
        Commands::Prune {
            size,
            exec,
            interactive,
            no_hash,
            force,
            json,
        } => run_prune(
            config,
            PruneArgs {
                target_bytes: size,
                exec,
                interactive,
                no_hash,
                force,
                json,
            },
        ),
        Commands::Check { json } => {
            let store = open_store(config)?;
            let local_directories = store
                .state()
                .local_directories_or(&config.local_directories);
            let report = check_state(store.state(), &local_directories);

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else if report.is_clean() {
                println!("{}", "State is consistent".green());
            } else {
                for issue in &report.issues {
                    println!("{} {}", "ISSUE".red().bold(), issue);
                }
                for warning in &report.warnings {
                    println!("{} {}", "WARN".yellow(), warning);
                }
            }
            Ok(if report.issues.is_empty() { 0 } else { 1 })
        }
        Commands::Config => {
            println!("Configuration: {:#?}", config);
            Ok(0)
        }
    }
}

fn open_store(config: &AppConfig) -> anyhow::Result<JsonStateStore> {
    Ok(JsonStateStore::open(&config.state_path)?)
}

fn run_init(config: &AppConfig, archive_root: Option<PathBuf>) -> anyhow::Result<i32> {
    if JsonStateStore::exists(&config.state_path) {
        println!(
            "{} state file already exists at {}",
            "Note:".yellow(),
            config.state_path.display()
        );
        return Ok(0);
    }

    let archive_root = archive_root.unwrap_or_else(|| config.archive_root.clone());
    let mut store = JsonStateStore::create_with_root(&config.state_path, &archive_root)
        .with_context(|| format!("creating {}", config.state_path.display()))?;
    store.state_mut().local_directories = config.local_directories.clone();
    store.save()?;

    info!("Initialized state at {}", config.state_path.display());
    println!(
        "{} state at {} (archive {})",
        "Initialized".green(),
        config.state_path.display(),
        archive_root.display()
    );
    Ok(0)
}

fn run_report(
    config: &AppConfig,
    sort: SortField,
    candidates_only: bool,
    no_hash: bool,
    json: bool,
) -> anyhow::Result<i32> {
    let store = open_store(config)?;
    let mode = if no_hash {
        VerifyMode::MtimeOnly
    } else {
        VerifyMode::Auto
    };
    let mut summary = report::generate_report(store.projects(), mode);
    if candidates_only {
        summary.projects = report::filter_candidates(&summary.projects);
    }
    report::sort_projects(&mut summary.projects, sort);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(0);
    }

    if summary.projects.is_empty() {
        println!("No grabbed projects.");
        return Ok(0);
    }

    let now = Utc::now();
    for project in &summary.projects {
        print_project_line(project, now, None);
    }
    println!();
    println!(
        "{} projects, {} local; {} safe to delete ({} recoverable)",
        summary.total_projects,
        format_size(summary.total_size).cyan(),
        summary.safe_to_delete.to_string().green(),
        format_size(summary.recoverable_space).green()
    );
    Ok(0)
}

fn run_list(config: &AppConfig, category: Option<&str>, json: bool) -> anyhow::Result<i32> {
    let store = open_store(config)?;
    let entries = inventory::list_archive(store.state(), category).context("scanning archive")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(0);
    }
    if entries.is_empty() {
        println!("No projects found in archive.");
        return Ok(0);
    }

    println!(
        "{:<30} {:<12} {:>10}  {}",
        "PROJECT".bold(),
        "CATEGORY".bold(),
        "SIZE".bold(),
        "STATUS".bold()
    );
    for entry in &entries {
        let size = entry.size.map(format_size).unwrap_or_else(|| "?".to_string());
        let status = if entry.grabbed {
            "grabbed".cyan()
        } else {
            "archived".normal()
        };
        println!("{:<30} {:<12} {:>10}  {}", entry.name, entry.category, size, status);
    }
    Ok(0)
}

fn run_status(config: &AppConfig, json: bool) -> anyhow::Result<i32> {
    let store = open_store(config)?;
    let projects = inventory::status_report(store.state());

    if json {
        println!("{}", serde_json::to_string_pretty(&projects)?);
        return Ok(0);
    }
    if projects.is_empty() {
        println!("No projects currently grabbed.");
        return Ok(0);
    }

    let now = Utc::now();
    println!(
        "{:<24} {:>10}  {:<14} {:<14} {}",
        "PROJECT".bold(),
        "LOCAL SIZE".bold(),
        "MODIFIED".bold(),
        "PARKED".bold(),
        "STATUS".bold()
    );
    for project in &projects {
        let status = if project.is_safe_delete {
            project.status.green()
        } else {
            project.status.yellow()
        };
        println!(
            "{:<24} {:>10}  {:<14} {:<14} {}",
            project.name,
            format_size(project.local_size),
            format_age(project.last_modified, now),
            format_age(project.last_park_at, now),
            status
        );
    }
    Ok(0)
}

fn print_info(info: &ProjectInfo) {
    let timestamp = |time: Option<chrono::DateTime<Utc>>| {
        time.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string())
    };
    let yes_no = |value: bool| if value { "Yes" } else { "No" };

    println!("Project: {}", info.name.bold());
    match info.archive_size {
        Some(size) => println!("Archive: {} ({})", info.archive_path.display(), format_size(size)),
        None => println!("Archive: {} {}", info.archive_path.display(), "(missing)".red()),
    }
    match (&info.local_path, info.local_size) {
        (Some(path), Some(size)) => println!("Local: {} ({})", path.display(), format_size(size)),
        (Some(path), None) => println!("Local: {} {}", path.display(), "(missing)".red()),
        (None, _) => println!("Local: not grabbed"),
    }

    if info.tracked {
        println!("Grabbed: {}", timestamp(info.grabbed_at));
        println!("Last park: {}", timestamp(info.last_park_at));
        if info.local_path.is_some() {
            match info.last_modified {
                Some(_) => println!("Last modified: {}", timestamp(info.last_modified)),
                None => println!("Last modified: unknown"),
            }
        }
    }
    println!("Status: {}", info.status);
    println!("Archive exists: {}", yes_no(info.archive_exists()));
    println!("Local exists: {}", yes_no(info.local_exists()));

    if !info.tracked {
        return;
    }
    if info.no_hash_mode {
        println!("Hash mode: disabled (mtime-based verification)");
    } else if let Some(computed) = info.hash_computed_at {
        println!("Hash mode: enabled");
        println!("Hash computed: {}", timestamp(Some(computed)));
    }
}

fn run_local(config: &AppConfig, unmanaged_only: bool, json: bool) -> anyhow::Result<i32> {
    let store = open_store(config)?;
    let roots = store
        .state()
        .local_directories_or(&config.local_directories);
    let entries = inventory::scan_local(store.state(), &roots, unmanaged_only);

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(0);
    }
    if entries.is_empty() {
        if unmanaged_only {
            println!("No unmanaged projects found in local directories.");
        } else {
            println!("No projects found in local directories.");
        }
        return Ok(0);
    }

    println!(
        "{:<25} {:<40} {:>10}  {}",
        "NAME".bold(),
        "PATH".bold(),
        "SIZE".bold(),
        "STATUS".bold()
    );
    for entry in &entries {
        let status = if entry.managed {
            "managed".green()
        } else {
            "unmanaged".yellow()
        };
        println!(
            "{:<25} {:<40} {:>10}  {}",
            entry.name,
            entry.path.display(),
            format_size(entry.size),
            status
        );
    }

    let managed = entries.iter().filter(|entry| entry.managed).count();
    println!();
    println!(
        "Total: {} projects ({} managed, {} unmanaged)",
        entries.len(),
        managed,
        entries.len() - managed
    );
    Ok(0)
}

fn run_remove(
    config: &AppConfig,
    name: &str,
    delete_archive: bool,
    yes: bool,
) -> anyhow::Result<i32> {
    let mut store = open_store(config)?;
    let plan = inventory::plan_removal(store.state(), name)?;

    println!("Project: {}", plan.name.bold());
    println!(
        "Archive: {} ({})",
        plan.archive_path.display(),
        format_size(plan.archive_size)
    );
    if delete_archive {
        println!(
            "{}",
            "This will delete the archive copy and the state entry.".red().bold()
        );
        if plan.is_only_copy() {
            println!(
                "{}",
                "DANGER: this is the only copy of the project.".red().bold()
            );
        }
    } else {
        println!("This will remove the state entry; the archive copy is kept.");
    }
    if let Some(local) = &plan.local_copy {
        println!("Local copy at {} will be kept.", local.display());
    }

    if !yes && !prompt_project_name(name)? {
        anyhow::bail!("confirmation failed: project name did not match");
    }

    let engine = ProjectEngine::new(RsyncSync, home_dir());
    engine.remove_project(&mut store, &plan, delete_archive)?;
    println!("{} {}", "Removed".green(), name);
    Ok(0)
}

/// Ask the user to type `name`; anything else is a refusal.
fn prompt_project_name(name: &str) -> io::Result<bool> {
    print!("Type the project name to confirm: ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim() == name)
}

struct PruneArgs {
    target_bytes: u64,
    exec: bool,
    interactive: bool,
    no_hash: bool,
    force: bool,
    json: bool,
}

fn run_prune(config: &AppConfig, args: PruneArgs) -> anyhow::Result<i32> {
    let mut store = open_store(config)?;

    let select_mode = if args.no_hash {
        VerifyMode::MtimeOnly
    } else {
        VerifyMode::Auto
    };
    let exec_mode = if args.force {
        VerifyMode::ForceSkip
    } else {
        select_mode
    };

    let mut selection = select_with(
        store.projects(),
        &SelectOptions {
            target_bytes: args.target_bytes,
            force: args.force,
            mode: select_mode,
        },
    );

    if selection.no_candidates {
        return finish_prune(selection, None, args.json, || {
            println!("No projects are safe to delete.");
            println!("Park projects first, or check 'parkr report' for details.");
        });
    }

    if args.interactive {
        let selector = InteractiveSelector::new(selection.candidates.clone(), args.target_bytes);
        let mut terminal = CrosstermTerminal::new();
        match selector.run(&mut terminal)? {
            SelectionOutcome::Quit => {
                println!("Cancelled.");
                return Ok(0);
            }
            SelectionOutcome::Confirmed(chosen) => {
                let names: Vec<String> = chosen.into_iter().map(|c| c.report.name).collect();
                selection.apply_selection(&names);
            }
        }

        if selection.selected_count() == 0 {
            println!("Nothing selected.");
            return Ok(0);
        }
        print_plan(&selection);
        let prompt = format!(
            "Delete {} project(s), {}?",
            selection.selected_count(),
            format_size(selection.total_selected)
        );
        if !prompt_confirm(&prompt, Some(false))? {
            println!("Cancelled.");
            return Ok(0);
        }
    } else {
        if !args.json {
            print_plan(&selection);
        }
        if !args.exec {
            return finish_prune(selection, None, args.json, || {
                println!();
                println!("Dry run. Re-run with {} to delete.", "--exec".bold());
            });
        }
    }

    let reporter: Box<dyn PruneReporter> = if args.json {
        Box::new(SilentReporter)
    } else {
        Box::new(CliReporter::new())
    };
    let execution = execute(&mut store, &selection, exec_mode, reporter.as_ref());

    let unsaved = execution.has_unsaved_deletions();
    if unsaved {
        error!(
            "State file {} no longer matches the filesystem",
            store.path().display()
        );
    }
    let summary = execution.clone();
    finish_prune(selection, Some(execution), args.json, move || {
        print_execution(&summary)
    })?;

    Ok(if unsaved { EXIT_STATE_UNSAVED } else { 0 })
}

/// Print `PruneResult` as JSON, or run `human` for the text form.
fn finish_prune<F: FnOnce()>(
    selection: SelectionResult,
    execution: Option<ExecutionResult>,
    json: bool,
    human: F,
) -> anyhow::Result<i32> {
    if json {
        let result = PruneResult {
            selection,
            execution,
        };
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        human();
    }
    Ok(0)
}

fn print_plan(selection: &SelectionResult) {
    for warning in &selection.warnings {
        println!("{} {}", "WARNING:".red().bold(), warning);
    }

    println!(
        "Need to free up {}. Candidates, oldest first:",
        format_size(selection.target_bytes).cyan()
    );
    let now = Utc::now();
    for candidate in &selection.candidates {
        print_project_line(&candidate.report, now, Some(candidate.selected));
    }
    println!();
    println!(
        "Selected {} project(s), {}",
        selection.selected_count(),
        format_size(selection.total_selected).green()
    );
    if selection.insufficient_space {
        warn!(
            "Only {} of {} can be freed",
            selection.total_selected, selection.target_bytes
        );
        println!(
            "{} only {} of the requested {} can be freed",
            "Note:".yellow(),
            format_size(selection.total_selected),
            format_size(selection.target_bytes)
        );
    }
}

fn print_execution(execution: &ExecutionResult) {
    println!();
    println!(
        "Freed {} of {} requested",
        format_size(execution.total_freed).green(),
        format_size(execution.target_bytes)
    );
    for failure in &execution.failed {
        let line = format!("  {}: {}", failure.report.name, failure.kind);
        if failure.kind.is_state_inconsistent() {
            println!("{}", line.red().bold());
        } else {
            println!("{}", line.yellow());
        }
    }
    if !execution.skipped.is_empty() {
        let names: Vec<&str> = execution
            .skipped
            .iter()
            .map(|report| report.name.as_str())
            .collect();
        println!("  Not attempted: {}", names.join(", "));
    }
    if execution.has_unsaved_deletions() {
        println!(
            "{}",
            "Some directories were deleted but the state file was not updated. Run 'parkr check'."
                .red()
                .bold()
        );
    }
}

fn print_project_line(
    project: &ProjectReport,
    now: chrono::DateTime<Utc>,
    selected: Option<bool>,
) {
    let marker = match selected {
        Some(true) => "[x] ",
        Some(false) => "[ ] ",
        None => "",
    };
    let status = if project.is_safe_delete {
        project.status.green()
    } else {
        project.status.red()
    };
    println!(
        "  {}{:<30} {:>10}  {:<14} {}",
        marker,
        project.name,
        format_size(project.local_size),
        format_age(project.last_modified, now),
        status
    );
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(default.unwrap_or(false));
        }

        match input.trim().to_uppercase().as_str() {
            "Y" | "YES" => return Ok(true),
            "N" | "NO" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
