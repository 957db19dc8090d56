use std::sync::Arc;

use cheatdex::{
    DataDir,
    DocumentSynchronizer,
    Error,
    StateDb,
    error,
    index::UpdateOptions,
    staleness::StaleReport,
    store::{MirrorStore, configured_upstream, upstream_from},
    sync::Lookup,
    text_util::{history_date, indent, pad},
    web::{self, StackOverflow},
};
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Command, LookupArgs, ShowAction, UpdateArgs};

/// Candidates listed under "Did you mean".
const MAX_CANDIDATES: usize = 8;

/// Lines of a scraped web page printed before truncating.
const MAX_PAGE_LINES: usize = 200;

const GOODBYES: [&str; 12] = [
    "Adios", "Goodbye", "Au Revoir", "Ciao", "Pa", "Ade", "Dag", "Farvel",
    "Poka", "Ćao", "Shalom", "Aloha",
];

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("CHEATDEX_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn goodbye() {
    let pick = chrono::Utc::now().timestamp_subsec_nanos() as usize;
    println!("{}!", GOODBYES[pick % GOODBYES.len()]);
}

#[tokio::main]
async fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Some(Command::Completions(args)) = &cli.command {
        args.generate();
        return Ok(());
    }
    if cli.command.is_none() && cli.lookup.phrase().is_empty() {
        Cli::command().print_help()?;
        return Ok(());
    }

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let state = Arc::new(StateDb::open(&data_dir.state_db())?);
    let location = configured_upstream(&state, cli.upstream.as_deref())?;
    let upstream = upstream_from(location.as_deref())?;
    tracing::debug!(upstream = %upstream.describe(), "upstream selected");
    let store = MirrorStore::open(&data_dir, upstream)?;

    let sync = tokio::select! {
        sync = DocumentSynchronizer::start(Box::new(store), state) => sync?,
        _ = tokio::signal::ctrl_c() => {
            goodbye();
            return Ok(());
        }
    };

    let outcome = tokio::select! {
        result = run_command(&cli, &sync) => result,
        _ = tokio::signal::ctrl_c() => {
            sync.flush()?;
            goodbye();
            return Ok(());
        }
    };
    sync.flush()?;

    match outcome {
        Ok(()) => Ok(()),
        // Lookup and network failures are reported, not fatal.
        Err(
            e @ (Error::Fetch { .. }
            | Error::Http(_)
            | Error::NotFound { .. }
            | Error::Config(_)),
        ) => {
            println!("\n  Error: {e}\n");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

async fn run_command(cli: &Cli, sync: &DocumentSynchronizer) -> error::Result<()> {
    let Some(command) = &cli.command else {
        return cmd_lookup(sync, &cli.lookup).await;
    };

    match command {
        Command::Index => {
            sync.record_command("index")?;
            let tree = sync.build().await?;
            println!("\n  Index rebuilt: {} commands.\n", tree.leaf_count());
        }
        Command::Search(args) => {
            let query = args.query();
            sync.record_command(&format!("search {query}"))?;
            let matches = sync.search(&query);
            if matches.is_empty() {
                println!("\n  No matches.\n");
            }
            for m in &matches {
                println!("  {:>6.2}  {}", m.points, m.command);
            }
        }
        Command::StackOverflow(args) => {
            let query = args.query();
            sync.record_command(&format!("stackoverflow {query}"))?;
            cmd_stackoverflow(&query).await?;
        }
        Command::Compare => {
            sync.record_command("compare")?;
            print_stale_report(&sync.compare_docs().await?);
        }
        Command::Update(args) => {
            sync.record_command(if args.force { "update --force" } else { "update" })?;
            cmd_update(sync, args).await?;
        }
        Command::Show { what } => match what {
            ShowAction::Updates { max } => show_updates(sync, *max),
            ShowAction::Hist { max } => show_history(sync, *max),
        },
        Command::Complete(args) => {
            let matcher = args.matcher.matcher();
            let mut candidates =
                sync.autocomplete(&args.text, args.iteration, matcher.as_ref());
            if args.iteration <= 1 {
                candidates.sort();
            }
            for candidate in candidates {
                println!("{candidate}");
            }
        }
        // Handled before the data directory is opened.
        Command::Completions(_) => {}
    }

    Ok(())
}

async fn cmd_lookup(
    sync: &DocumentSynchronizer,
    args: &LookupArgs,
) -> error::Result<()> {
    let phrase = args.phrase();
    let options = args.options();

    match sync.resolve(&phrase, &options) {
        Lookup::Found {
            command,
            doc,
            downgraded,
            via_search,
        } => {
            if via_search {
                println!("\n  Showing results for \"{command}\":");
            }
            if let Some(label) = downgraded.and_then(|v| v.write_up()) {
                println!(
                    "\n  Sorry, there's no {label} write-up for this command. Showing the basic one instead."
                );
            }
            let document = sync.fetch(&doc).await?;
            println!("\n{}\n", indent(&document.content));
        }
        Lookup::Suggestions { command, names } => {
            sync.record_command(&phrase)?;
            println!(
                "\n  Sorry, there's no cheat sheet for that command. However, you can try these:\n"
            );
            for name in names {
                println!("  {command} {name}");
            }
            println!();
        }
        Lookup::Candidates(candidates) if candidates.is_empty() => {
            sync.record_command(&phrase)?;
            println!("\n  Sorry, there's no command like that.\n");
        }
        Lookup::Candidates(candidates) => {
            sync.record_command(&phrase)?;
            println!("\n  Did you mean:");
            for candidate in candidates.iter().take(MAX_CANDIDATES) {
                println!("  {}", candidate.command);
            }
            println!();
        }
    }
    Ok(())
}

async fn cmd_stackoverflow(query: &str) -> error::Result<()> {
    let client = StackOverflow::new()?;
    match web::first_page(&client, query, Some(MAX_PAGE_LINES)).await? {
        Some(page) => {
            println!("\n  {}\n", page.url);
            println!("{}\n", indent(&page.text));
        }
        None => {
            println!(
                "\n  Couldn't find any matches on Stack Overflow.\n  Try re-wording your question.\n"
            );
        }
    }
    Ok(())
}

async fn cmd_update(
    sync: &DocumentSynchronizer,
    args: &UpdateArgs,
) -> error::Result<()> {
    if args.all {
        tracing::warn!("update --all is not supported; nothing was downloaded");
        return Ok(());
    }

    let report = sync.update(UpdateOptions { force: args.force }).await?;
    println!(
        "\n  Successfully updated index: {} commands, {} documents queued.",
        report.leaves, report.enqueued
    );

    let drained = sync.drain().await?;
    if !drained.refreshed.is_empty() {
        println!("  Refreshed {} documents.", drained.refreshed.len());
    }
    for (path, reason) in &drained.failed {
        println!("  Failed to refresh {}: {reason}", path.describe());
    }
    for path in &drained.dropped {
        println!("  Gave up on {}.", path.describe());
    }

    let remaining = sync.queue().len();
    if remaining > 0 {
        println!("\n  {remaining} documents are queued for updating.");
    }
    println!();
    Ok(())
}

fn print_stale_report(report: &StaleReport) {
    if report.is_clean() {
        println!("\n  Local documents are up to date.\n");
        return;
    }

    if !report.stale.is_empty() {
        println!("\n  Out of date:");
        for doc in &report.stale {
            println!(
                "  {}  (local {}, remote {})",
                doc.path.describe(),
                doc.local_mtime,
                doc.remote_mtime
            );
        }
    }
    if !report.new_upstream.is_empty() {
        println!("\n  New upstream:");
        for path in &report.new_upstream {
            println!("  {}", path.describe());
        }
    }
    if !report.removed_upstream.is_empty() {
        println!("\n  No longer published:");
        for path in &report.removed_upstream {
            println!("  {}", path.describe());
        }
    }
    println!("\n  Run \"update\" to refresh.\n");
}

fn show_updates(sync: &DocumentSynchronizer, max: usize) {
    let items = sync.queue().items();
    if items.is_empty() {
        println!(
            "\n  No updates in the queue.\n  To do a fresh update, run the \"update\" command.\n"
        );
        return;
    }

    println!("\n  Command");
    for item in items.iter().rev().take(max) {
        println!("  {}", item.path.describe());
    }
    println!();
}

fn show_history(sync: &DocumentSynchronizer, max: usize) {
    let records = sync.history().get();
    println!("\n  {} {} Value", pad("Date", 15), pad("Type", 9));
    for record in records.iter().rev().take(max) {
        println!(
            "  {} {} {}",
            pad(&history_date(&record.date), 15),
            pad(record.kind.label(), 9),
            record.value
        );
    }
    println!();
}
