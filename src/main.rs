use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use hyperoptic::client::DEFAULT_PACKAGE_SORT;
use hyperoptic::{HyperopticClient, HyperopticError};

#[derive(Parser)]
#[command(
    name = "hyperoptic",
    version,
    about = "Query the Hyperoptic customer portal API"
)]
struct Cli {
    /// Hyperoptic account email
    #[arg(long, env = "HYPEROPTIC_EMAIL")]
    email: String,

    /// Hyperoptic account password
    #[arg(long, env = "HYPEROPTIC_PASSWORD", hide_env_values = true)]
    password: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print an overview of the customer, accounts and packages
    Summary,

    /// Print all customers as JSON
    Customers,

    /// Print packages for the primary customer as JSON
    Packages,

    /// Print connection details for the primary customer as JSON
    Connections,

    /// Fetch everything reachable and emit one JSON document
    Dump {
        /// Write the document to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Arbitrary authenticated GET against the account-service API
    Raw {
        /// Request path, e.g. /customers
        path: String,

        /// Query parameters as KEY=VALUE pairs
        #[arg(long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("HYPEROPTIC_LOG_LEVEL")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{}: {e}", "Error".red().bold());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), HyperopticError> {
    let client = HyperopticClient::new(&cli.email, &cli.password)?;

    match cli.command {
        Commands::Summary => run_summary(&client).await,
        Commands::Customers => {
            let customers = client.get_customers().await?;
            print_json(&serde_json::json!(customers));
            Ok(())
        }
        Commands::Packages => {
            let packages = client.get_my_packages().await?;
            print_json(&serde_json::json!(packages));
            Ok(())
        }
        Commands::Connections => {
            let connections = client.get_my_connections().await?;
            print_json(&serde_json::json!(connections));
            Ok(())
        }
        Commands::Dump { out } => run_dump(&client, out).await,
        Commands::Raw { path, params } => {
            let pairs: Vec<(&str, &str)> = params
                .iter()
                .map(|p| p.split_once('=').unwrap_or((p.as_str(), "")))
                .collect();
            let value = client.get_raw(&path, &pairs).await?;
            print_json(&value);
            Ok(())
        }
    }
}

async fn run_summary(client: &HyperopticClient) -> Result<(), HyperopticError> {
    let customer = client.get_customer().await?;

    println!("{}", format!("Customer: {}", customer.full_name()).bold());
    println!("Email:    {}", customer.email.as_deref().unwrap_or("-"));
    println!("Phone:    {}", customer.telephone.as_deref().unwrap_or("-"));
    if let Some(address) = &customer.address {
        println!(
            "Address:  {}, {}",
            address.street_address.as_deref().unwrap_or("-"),
            address.postal_code.as_deref().unwrap_or("-")
        );
    }
    println!(
        "Type:     {}",
        customer.additional_type.as_deref().unwrap_or("-")
    );

    for (i, account) in customer.accounts.iter().enumerate() {
        println!("\n{}", format!("--- Account {} ---", i + 1).bold());
        println!(
            "  Bundle:   {}",
            account.bundle_name.as_deref().unwrap_or("-")
        );
        println!(
            "  Status:   {} / {}",
            account.order_status.as_deref().unwrap_or("-"),
            account.activation_status.as_deref().unwrap_or("-")
        );
        println!("  HyperHub: {}", account.have_hyperhub.unwrap_or(false));
    }

    let packages = client
        .get_packages(&customer.id, DEFAULT_PACKAGE_SORT)
        .await?;
    for package in &packages {
        println!(
            "\n{}",
            format!(
                "--- Package: {} ---",
                package.bundle_name.as_deref().unwrap_or("-")
            )
            .bold()
        );
        println!("  Status:    {}", package.status.as_deref().unwrap_or("-"));
        println!(
            "  Speed:     {}/{} Mbps",
            package.download_speed().unwrap_or(0),
            package.upload_speed().unwrap_or(0)
        );
        if let Some(price) = package.current_price {
            println!("  Price:     £{price}");
        }
        println!(
            "  Contract:  {} -> {} ({} months)",
            package.start_date.as_deref().unwrap_or("-"),
            package.end_date.as_deref().unwrap_or("-"),
            package.duration_months.unwrap_or(0)
        );
        println!("  Can renew: {}", package.can_renew);

        if let Some(plan) = &package.plan_details {
            if !plan.pricing.is_empty() {
                println!("  Pricing periods:");
                for period in &plan.pricing {
                    println!(
                        "    £{}  {} -> {}",
                        period.price.as_deref().unwrap_or("?"),
                        period.from_date.as_deref().unwrap_or("base"),
                        period.until.as_deref().unwrap_or("ongoing")
                    );
                }
            }
        }
    }

    Ok(())
}

/// Fetch everything reachable for every customer; per-section failures are
/// recorded in the document instead of aborting the dump.
async fn run_dump(
    client: &HyperopticClient,
    out: Option<PathBuf>,
) -> Result<(), HyperopticError> {
    eprintln!("Fetching customer data...");
    let customers = client.get_customers().await?;

    let mut dumped = Vec::new();
    for customer in &customers {
        let mut entry = serde_json::json!({ "customer": customer });

        match client
            .get_packages(&customer.id, DEFAULT_PACKAGE_SORT)
            .await
        {
            Ok(packages) => entry["packages"] = serde_json::json!(packages),
            Err(e) => entry["packages_error"] = serde_json::Value::String(e.to_string()),
        }

        let mut connections = Vec::new();
        for account in &customer.accounts {
            if let Some(url) = account.connection_url() {
                let connection_id = url.rsplit_once('/').map_or(url, |(_, id)| id);
                match client.get_connection(connection_id).await {
                    Ok(connection) => connections.push(connection),
                    Err(e) => {
                        entry["connections_error"] = serde_json::Value::String(e.to_string())
                    }
                }
            }
        }
        entry["connections"] = serde_json::json!(connections);

        match client.get_total_wifi_promotion(&customer.id).await {
            Ok(promotion) => entry["promotions"] = serde_json::json!({ "total_wifi": promotion }),
            Err(e) => entry["promotions_error"] = serde_json::Value::String(e.to_string()),
        }

        dumped.push(entry);
    }

    let document = serde_json::json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "customers": dumped,
    });

    let pretty = serde_json::to_string_pretty(&document).unwrap_or_default();
    match out {
        Some(path) => {
            std::fs::write(&path, pretty)?;
            eprintln!("Wrote {}", path.display());
        }
        None => println!("{pretty}"),
    }
    Ok(())
}

fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}
