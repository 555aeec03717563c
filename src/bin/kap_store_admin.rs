//! Maintenance tool for the processed-disclosure store
//!
//! Usage:
//!   kap_store_admin count
//!   kap_store_admin recent [N]
//!   kap_store_admin clear --yes
//!
//! Reads `KAP_DB_PATH` (default: kap_records.db). `clear` makes every
//! disclosure of the current day eligible for notification again on the
//! next cycle, hence the explicit `--yes`.

use dotenv::dotenv;
use kapflow::config::DEFAULT_DB_PATH;
use kapflow::store::SqliteRecordStore;
use std::env;

fn usage() -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("Usage: kap_store_admin <count | recent [N] | clear --yes>");
    Err("invalid arguments".into())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let db_path = env::var("KAP_DB_PATH").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());
    let args: Vec<String> = env::args().skip(1).collect();

    let Some(command) = args.first() else {
        return usage();
    };

    let store = SqliteRecordStore::open(&db_path)?;

    match command.as_str() {
        "count" => {
            println!("{}", store.count()?);
        }
        "recent" => {
            let limit = match args.get(1) {
                Some(n) => n.parse::<usize>().map_err(|_| format!("invalid count '{}'", n))?,
                None => 10,
            };
            for record in store.recent(limit)? {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    record.id,
                    record.publish_date,
                    record.issuer_codes,
                    if record.notified { "notified" } else { "suppressed" },
                    record.title
                );
            }
        }
        "clear" => {
            if !args.iter().any(|a| a == "--yes") {
                eprintln!("Refusing to clear {} without --yes", db_path);
                return usage();
            }
            let removed = store.clear()?;
            println!("Removed {} records from {}", removed, db_path);
        }
        _ => return usage(),
    }

    Ok(())
}
