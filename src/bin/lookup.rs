//! ipqs-lookup: CLI tool for inspecting IPQS databases and looking up addresses.

use clap::{Parser, Subcommand};
use ipqs_db::{AddressFamily, Database, Record};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "ipqs-lookup")]
#[command(version = "0.1.0")]
#[command(about = "Look up addresses in IPQS reputation databases", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the header and column table of a database
    Info {
        /// Database file
        #[arg(short, long)]
        db: PathBuf,
    },

    /// Look up one or more addresses
    Lookup {
        /// Database file
        #[arg(short, long)]
        db: PathBuf,

        /// Print records as JSON
        #[arg(long)]
        json: bool,

        /// Addresses to look up
        #[arg(required = true)]
        ips: Vec<String>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Info { db } => info(&db),
        Commands::Lookup { db, json, ips } => lookup(&db, json, &ips),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn info(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open(path)?;
    let schema = db.schema();

    println!("File:           {:?}", path);
    println!("Family:         {}", schema.family);
    println!("Blacklist:      {}", schema.blacklist);
    println!("Extended flags: {}", schema.extended_flags);
    println!("Version:        {}", schema.version);
    println!("Tree:           {}..{}", schema.tree_start, schema.tree_end);
    println!("Record length:  {} ({} decoded)", schema.record_length, schema.decoded_width());
    println!("Total bytes:    {}", schema.total_bytes);
    println!("Columns:");
    for column in &schema.columns {
        let kind = if column.role.is_fixed() {
            "fixed"
        } else if column.width() > 0 {
            "string"
        } else {
            "skipped"
        };
        println!(
            "  {:<23} type={:#04x} {}",
            column.name,
            column.flags.bits(),
            kind
        );
    }

    let skipped = schema.zero_width_columns().count();
    if skipped > 0 {
        log::warn!(
            "{} column(s) occupy no record bytes; columns after them share their offset",
            skipped
        );
    }
    Ok(())
}

fn lookup(path: &Path, json: bool, ips: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open(path)?;

    for ip in ips {
        if AddressFamily::of_address(ip).is_none() {
            eprintln!("{}: not an IP address", ip);
            continue;
        }

        match db.fetch(ip) {
            Ok(record) if json => {
                println!("{}", serde_json::json!({ "ip": ip, "record": record }));
            }
            Ok(record) => print_record(ip, &record),
            Err(e) if json => {
                println!("{}", serde_json::json!({ "ip": ip, "error": e.to_string() }));
            }
            Err(e) => eprintln!("{}: {}", ip, e),
        }
    }
    Ok(())
}

fn print_record(ip: &str, record: &Record) {
    let mut flags = Vec::new();
    for (set, name) in [
        (record.is_proxy, "proxy"),
        (record.is_vpn, "vpn"),
        (record.is_tor, "tor"),
        (record.is_crawler, "crawler"),
        (record.is_bot, "bot"),
        (record.recent_abuse, "recent-abuse"),
        (record.is_blacklisted, "blacklisted"),
        (record.is_private, "private"),
        (record.is_mobile, "mobile"),
        (record.has_open_ports, "open-ports"),
        (record.is_hosting_provider, "hosting"),
        (record.active_vpn, "active-vpn"),
        (record.active_tor, "active-tor"),
        (record.public_access_point, "public-access-point"),
    ] {
        if set {
            flags.push(name);
        }
    }

    println!("{}", ip);
    println!("  flags:           {}", if flags.is_empty() { "-".to_string() } else { flags.join(",") });
    println!("  connection type: {}", record.connection_type);
    println!("  abuse velocity:  {}", record.abuse_velocity);
    for strictness in 0..2 {
        if let Some(score) = record.fraud_score.get(strictness) {
            println!("  fraud score[{}]:  {}", strictness, score);
        }
    }
    for column in record.columns() {
        println!("  {:<16} {}", format!("{}:", column.name), column.value);
    }
}
