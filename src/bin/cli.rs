//! cellstore CLI
//!
//! Runs one administrative or data command against a local data directory.

use clap::{Parser, Subcommand};
use cellstore::{Cell, Config, Engine, Mutation, Result, StoreError};
use tracing_subscriber::{fmt, EnvFilter};

/// cellstore CLI
#[derive(Parser, Debug)]
#[command(name = "cellstore-cli")]
#[command(about = "CLI for the cellstore wide-column store")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./cellstore_data")]
    data_dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List all tables
    List,

    /// Create a table with one or more column families
    Create {
        name: String,
        #[arg(required = true)]
        families: Vec<String>,
    },

    /// Show a table's families and state
    Describe { name: String },

    Enable { name: String },

    Disable { name: String },

    /// Drop a disabled table
    Drop { name: String },

    /// Write cells given as FAMILY:QUALIFIER=VALUE
    Put {
        table: String,
        row: String,
        #[arg(required = true)]
        cells: Vec<String>,
    },

    /// Read one row
    Get {
        table: String,
        row: String,
        /// Restrict to these families
        #[arg(short, long)]
        family: Vec<String>,
    },

    /// Scan rows in [start, stop)
    Scan {
        table: String,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        stop: Option<String>,
    },

    /// Delete a row, a family (F) or a column (F:Q)
    Delete {
        table: String,
        row: String,
        #[arg(short, long)]
        column: Option<String>,
    },

    /// Flush all memtables to segments
    Flush,

    /// Merge a table's segments
    Compact { table: String },
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,cellstore=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // One-shot process: everything is flushed by close, no worker needed
    let config = Config::builder()
        .data_dir(&args.data_dir)
        .background_threads_enabled(false)
        .build();

    let engine = match Engine::open(config) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    let outcome = run(&engine, args.command);
    let closed = engine.close();

    if let Err(e) = outcome.and(closed) {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }
}

fn run(engine: &Engine, command: Commands) -> Result<()> {
    let admin = engine.admin();
    match command {
        Commands::List => {
            for name in admin.list_tables() {
                println!("{}", name);
            }
        }
        Commands::Create { name, families } => {
            let families: Vec<&str> = families.iter().map(String::as_str).collect();
            let desc = admin.create_table(&name, &families)?;
            println!("Created table '{}' (id {})", desc.name, desc.id);
        }
        Commands::Describe { name } => {
            let desc = admin.describe_table(&name)?;
            println!("Table: {}", desc.name);
            println!("Id: {}", desc.id);
            println!("State: {}", desc.state);
            println!("Families: {}", desc.family_names().join(", "));
        }
        Commands::Enable { name } => {
            admin.enable_table(&name)?;
            println!("Table '{}' enabled", name);
        }
        Commands::Disable { name } => {
            admin.disable_table(&name)?;
            println!("Table '{}' disabled", name);
        }
        Commands::Drop { name } => {
            admin.drop_table(&name)?;
            println!("Table '{}' dropped", name);
        }
        Commands::Put { table, row, cells } => {
            let mut mutation = Mutation::new(row.as_bytes());
            for spec in &cells {
                let (family, qualifier, value) = parse_cell(spec)?;
                mutation = mutation.put(family, qualifier, value);
            }
            let count = mutation.len();
            engine.mutate(&table, mutation)?;
            println!("Wrote {} cell(s)", count);
        }
        Commands::Get { table, row, family } => {
            let cells = if family.is_empty() {
                engine.get(&table, row.as_bytes())?
            } else {
                let families: Vec<&str> = family.iter().map(String::as_str).collect();
                engine.get_families(&table, row.as_bytes(), &families)?
            };
            if cells.is_empty() {
                println!("(no cells)");
            }
            for cell in &cells {
                print_cell(cell);
            }
        }
        Commands::Scan { table, start, stop } => {
            let scanner = engine.scan(
                &table,
                start.as_deref().map(str::as_bytes),
                stop.as_deref().map(str::as_bytes),
            )?;
            let mut rows = 0usize;
            for row in scanner {
                for cell in row?.cells() {
                    print_cell(cell);
                }
                rows += 1;
            }
            println!("({} row(s))", rows);
        }
        Commands::Delete { table, row, column } => {
            let row = row.as_bytes();
            match column.as_deref() {
                None => engine.delete(&table, row, None, None)?,
                Some(column) => match column.split_once(':') {
                    Some((family, qualifier)) => {
                        engine.delete(&table, row, Some(family), Some(qualifier.as_bytes()))?
                    }
                    None => engine.delete(&table, row, Some(column), None)?,
                },
            }
            println!("Deleted");
        }
        Commands::Flush => {
            engine.flush()?;
            println!("Flushed");
        }
        Commands::Compact { table } => {
            let stats = engine.compact(&table)?;
            println!(
                "Compacted {} segment(s): {} -> {} cells, {} versions dropped, {} tombstones purged",
                stats.input_segments,
                stats.input_cells,
                stats.output_cells,
                stats.dropped_versions,
                stats.purged_tombstones
            );
        }
    }
    Ok(())
}

/// `FAMILY:QUALIFIER=VALUE`
fn parse_cell(spec: &str) -> Result<(&str, &str, &str)> {
    let invalid = || {
        StoreError::InvalidArgument(format!("expected FAMILY:QUALIFIER=VALUE, got {:?}", spec))
    };
    let (column, value) = spec.split_once('=').ok_or_else(invalid)?;
    let (family, qualifier) = column.split_once(':').ok_or_else(invalid)?;
    Ok((family, qualifier, value))
}

fn print_cell(cell: &Cell) {
    println!(
        "Row key: {}, Family: {}, Qualifier: {}, Value: {}",
        String::from_utf8_lossy(cell.row()),
        cell.family(),
        String::from_utf8_lossy(cell.qualifier()),
        String::from_utf8_lossy(cell.value())
    );
}
