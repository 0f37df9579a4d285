use clap::Parser;
use flowline::utils::logger;
use flowline::{Dataset, LocalStorage};

#[derive(Parser)]
#[command(name = "inspect")]
#[command(about = "Inspect a loaded dataset: tables, schema and sample rows")]
struct Args {
    /// Destination directory the pipeline loaded into
    #[arg(short, long, default_value = "./data")]
    destination: String,

    /// Dataset name to inspect
    #[arg(long)]
    dataset: String,

    /// Show a single table instead of the dataset overview
    #[arg(long)]
    table: Option<String>,

    /// Number of sample rows to print
    #[arg(long, default_value_t = 5)]
    head: usize,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    logger::init_cli_logger(args.verbose);

    let storage = LocalStorage::new(args.destination.clone());
    let dataset = Dataset::attach(storage, args.dataset.clone());

    match &args.table {
        None => {
            let schema = match dataset.schema().await {
                Ok(schema) => schema,
                Err(e) => {
                    eprintln!("❌ {}", e.user_friendly_message());
                    eprintln!("💡 {}", e.recovery_suggestion());
                    std::process::exit(1);
                }
            };

            println!("📊 Dataset '{}' at {}", args.dataset, args.destination);
            println!("  Schema version: {}", schema.version_hash());
            println!();
            println!("  Tables:");
            for (table, count) in dataset.row_counts().await? {
                println!("    - {}: {} row(s)", table, count);
            }
        }
        Some(table) => {
            let relation = match dataset.table(table).await {
                Ok(relation) => relation,
                Err(e) => {
                    eprintln!("❌ {}", e.user_friendly_message());
                    eprintln!("💡 {}", e.recovery_suggestion());
                    std::process::exit(1);
                }
            };

            println!("📊 Table '{}' ({} row(s))", table, relation.row_count());
            println!("  Columns:");
            for column in relation.columns() {
                let column_type = relation
                    .schema()
                    .columns
                    .get(column)
                    .map(|t| t.as_str())
                    .unwrap_or("unknown");
                println!("    - {}: {}", column, column_type);
            }
            println!();
            println!("  First {} row(s):", args.head.min(relation.row_count()));
            for record in relation.head(args.head) {
                println!("    {}", serde_json::to_string(&record.data)?);
            }
        }
    }

    Ok(())
}
