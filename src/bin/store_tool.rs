use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use gostwear_backend::store::{Record, RecordId, RecordStore};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "store-tool")]
#[command(about = "Maintenance commands for the Gostwear JSON collections")]
struct Cli {
    /// Directory holding the collection files
    #[arg(long, env = "DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replace a collection with the JSON array stored in FILE
    Import { collection: String, file: PathBuf },
    /// Print a collection as pretty JSON
    Dump { collection: String },
    /// Print the record with ID
    Get { collection: String, id: String },
    /// Append one JSON object to a collection
    Add {
        collection: String,
        record: String,
        /// Also reject the record when another one has the same value in this field
        #[arg(long)]
        unique_by: Option<String>,
    },
    /// Remove the record with ID
    Remove { collection: String, id: String },
    /// Check that a collection file parses and has unique ids
    Verify { collection: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let store = RecordStore::open(&cli.data_dir);

    match cli.command {
        Command::Import { collection, file } => import(&store, &collection, &file).await,
        Command::Dump { collection } => {
            let records = store.load_all(&collection).await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
            Ok(())
        }
        Command::Get { collection, id } => {
            let record = find(&store, &collection, &id)
                .await?
                .ok_or_else(|| anyhow!("No record with id '{}' in '{}'", id, collection))?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        Command::Add {
            collection,
            record,
            unique_by,
        } => {
            let value: Value = serde_json::from_str(&record).context("Record must be valid JSON")?;
            let record = Record::try_from(value)?;
            let id = record.id().clone();
            match unique_by {
                Some(field) => store.append_unique_by(&collection, record, &field).await?,
                None => store.append(&collection, record).await?,
            }
            println!("Added record {} to '{}'", id, collection);
            Ok(())
        }
        Command::Remove { collection, id } => {
            let Some(existing) = find(&store, &collection, &id).await? else {
                bail!("No record with id '{}' in '{}'", id, collection);
            };
            store.remove(&collection, existing.id()).await?;
            println!("Removed record {} from '{}'", existing.id(), collection);
            Ok(())
        }
        Command::Verify { collection } => {
            let file = store.collection_file(&collection)?;
            if !file.exists()? {
                println!("'{}' has never been written ({})", collection, file.path().display());
                return Ok(());
            }
            let records = store.load_all(&collection).await?;
            println!(
                "'{}' is valid: {} records ({})",
                collection,
                records.len(),
                file.path().display()
            );
            Ok(())
        }
    }
}

async fn import(store: &RecordStore, collection: &str, file: &Path) -> Result<()> {
    let text = fs::read_to_string(file)
        .with_context(|| format!("Failed to read '{}'", file.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("'{}' is not valid JSON", file.display()))?;
    let Value::Array(items) = value else {
        bail!("'{}' must contain a JSON array", file.display());
    };

    let records = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            Record::try_from(item).with_context(|| format!("Element {} is not a valid record", index))
        })
        .collect::<Result<Vec<_>>>()?;

    let count = records.len();
    store.replace_all(collection, records).await?;
    println!("Imported {} records into '{}'", count, collection);
    Ok(())
}

async fn find(store: &RecordStore, collection: &str, raw_id: &str) -> Result<Option<Record>> {
    for candidate in RecordId::lookup_candidates(raw_id) {
        if let Some(record) = store.find_by_key(collection, &candidate).await? {
            return Ok(Some(record));
        }
    }
    Ok(None)
}
