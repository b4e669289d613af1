use clap::{Parser, Subcommand};
use regex::Regex;

use flipadelphia::{client::FlippyClient, Feature};

/// A CLI interface to the flipadelphia server
#[derive(Debug, Parser)]
#[command(name = "flippy", version)]
struct Args {
    /// Base URL of the flipadelphia server
    #[arg(long, default_value = "localhost:3006", env = "FLIPADELPHIA_URL")]
    url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch all the existing scopes
    #[command(visible_alias = "gs")]
    GetScopes {
        /// Only print scopes matching the pattern
        pattern: Option<String>,
    },

    /// Fetch all the existing features
    #[command(visible_alias = "gf")]
    GetFeatures {
        /// Only print features matching the pattern
        pattern: Option<String>,
    },

    /// List the features set on a scope
    #[command(visible_alias = "gsf")]
    GetScopeFeatures {
        scope: String,
        /// Print full records instead of names
        #[arg(long)]
        full: bool,
    },

    /// Show one feature on a scope
    #[command(visible_alias = "gef")]
    GetFeature { scope: String, feature: String },

    /// Create/update the feature and set its value for the given scope
    #[command(visible_alias = "sf")]
    SetFeature {
        scope: String,
        feature: String,
        value: String,
    },
}

fn print_feature(feature: &Feature) {
    println!("name: {}", feature.name);
    println!("data: {}", feature.data);
    println!("value: {}", feature.value);
    println!();
}

fn print_matching(names: &[String], pattern: Option<&str>) -> Result<(), regex::Error> {
    let filter = Regex::new(pattern.unwrap_or(".*"))?;
    for name in names {
        if filter.is_match(name) {
            println!("{name}");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let client = FlippyClient::connect(&args.url).await?;

    match args.command {
        Command::GetScopes { pattern } => {
            print_matching(&client.scopes().await?, pattern.as_deref())?;
        }
        Command::GetFeatures { pattern } => {
            print_matching(&client.features().await?, pattern.as_deref())?;
        }
        Command::GetScopeFeatures { scope, full: false } => {
            for feature in client.scope_features(&scope).await? {
                println!("{feature}");
            }
        }
        Command::GetScopeFeatures { scope, full: true } => {
            for name in client.scope_features(&scope).await? {
                print_feature(&client.scope_feature(&scope, &name).await?);
            }
        }
        Command::GetFeature { scope, feature } => {
            print_feature(&client.scope_feature(&scope, &feature).await?);
        }
        Command::SetFeature {
            scope,
            feature,
            value,
        } => {
            print_feature(&client.set_feature(&scope, &feature, &value).await?);
        }
    }
    Ok(())
}
