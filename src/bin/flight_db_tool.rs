//! Dump the persistent flight database to stdout.

use std::env;
use std::fs;
use std::process;

use serde_json::Value;

fn main() {
    let Some(path) = env::args().nth(1) else {
        eprintln!("usage: flight_db_tool <flight-db.json>");
        process::exit(2);
    };

    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("{path}: {e}");
            process::exit(1);
        }
    };
    let db: Value = match serde_json::from_str(&raw) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("{path}: not a valid flight database: {e}");
            process::exit(1);
        }
    };

    println!("version:    {}", db["version"].as_str().unwrap_or("?"));
    println!("start date: {}", db["start_date"].as_str().unwrap_or("?"));
    println!("total:      {}", db["total_cnt"].as_u64().unwrap_or(0));
    println!();

    if let Some(flights) = db["flights"].as_array() {
        for entry in flights {
            let call_sign = entry[0].as_str().unwrap_or("?");
            let count = entry[1].as_u64().unwrap_or(0);
            println!("{call_sign:<10} {count}");
        }
    }
}
