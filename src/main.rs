mod api;
mod models;
mod state;
mod store;
mod tui;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use api::ApiClient;
use models::LocationOption;
use state::{project, Filters, Pager};
use store::Store;

#[derive(Parser)]
#[command(name = "magang")]
#[command(about = "Browse MagangHub internship vacancies - search, filter, and paginate")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse vacancies interactively
    Browse {
        /// Internship batch (angkatan)
        #[arg(short, long, default_value = "2")]
        batch: u32,

        /// Vacancies per page
        #[arg(long, default_value_t = state::DEFAULT_PAGE_SIZE)]
        page_size: u32,
    },

    /// List vacancies
    List {
        /// Match against position title or employer name
        #[arg(short, long)]
        search: Option<String>,

        /// Province code or name
        #[arg(short, long)]
        province: Option<String>,

        /// City/regency name (exact)
        #[arg(short, long)]
        city: Option<String>,

        /// Eligible major/field of study
        #[arg(short, long)]
        major: Option<String>,

        /// Page of results to print
        #[arg(long, default_value = "1")]
        page: u32,

        /// Internship batch (angkatan)
        #[arg(short, long, default_value = "2")]
        batch: u32,

        /// Vacancies per page
        #[arg(long, default_value_t = state::DEFAULT_PAGE_SIZE)]
        page_size: u32,
    },

    /// Print the province directory
    Provinces,

    /// Print the cities of one province
    Cities {
        /// Province code or name
        province: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = ApiClient::new()?;

    match cli.command {
        Commands::Browse { batch, page_size } => {
            // A broken store only means the disclaimer shows again.
            let store = match Store::open() {
                Ok(store) => Some(store),
                Err(err) => {
                    warn!(error = %err, "local store unavailable");
                    None
                }
            };
            tui::run_browse(client, store, batch, page_size.max(1)).await?;
        }

        Commands::List {
            search,
            province,
            city,
            major,
            page,
            batch,
            page_size,
        } => {
            run_list(
                &client,
                search,
                province,
                city,
                major,
                page,
                batch,
                page_size.max(1),
            )
            .await?;
        }

        Commands::Provinces => {
            let provinces = client.list_provinces().await?;
            if provinces.is_empty() {
                println!("No provinces returned.");
            } else {
                println!("{:<6} {:<30}", "CODE", "NAME");
                println!("{}", "-".repeat(36));
                for p in provinces {
                    println!("{:<6} {:<30}", p.value, p.label);
                }
            }
        }

        Commands::Cities { province } => {
            let province = resolve_province(&client, &province).await?;
            let cities = client.list_cities(&province.value).await?;
            if cities.is_empty() {
                println!("No cities returned for {}.", province.label);
            } else {
                println!("Cities in {}:", province.label);
                for c in cities {
                    println!("  {}", c.label);
                }
            }
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_list(
    client: &ApiClient,
    search: Option<String>,
    province: Option<String>,
    city: Option<String>,
    major: Option<String>,
    page: u32,
    batch: u32,
    page_size: u32,
) -> Result<()> {
    let province = match province {
        Some(query) => Some(resolve_province(client, &query).await?),
        None => None,
    };

    let records = match client
        .fetch_all_vacancies(batch, province.as_ref().map(|p| p.value.as_str()))
        .await
    {
        Ok(records) => records,
        Err(err) => {
            warn!(error = %err, "vacancy fetch failed");
            Vec::new()
        }
    };

    let filters = Filters {
        search: search.unwrap_or_default(),
        province,
        city: city.map(|c| LocationOption {
            value: c.clone(),
            label: c,
        }),
        major,
    };
    let visible = project(&records, &filters);

    if visible.is_empty() {
        println!("No vacancies found.");
        return Ok(());
    }

    let mut pager = Pager::new(page_size);
    let total = pager.total_pages(visible.len());
    pager.set_page(page, total);
    if pager.current != page {
        println!(
            "Page {page} is out of range, showing page {}.",
            pager.current
        );
    }

    println!(
        "{:<32} {:<24} {:<20} {:>9} {:>7}",
        "POSITION", "EMPLOYER", "CITY", "REG/QUOTA", "CHANCE"
    );
    println!("{}", "-".repeat(96));
    for v in pager.slice(&visible) {
        println!(
            "{:<32} {:<24} {:<20} {:>9} {:>7}",
            truncate(&v.posisi, 30),
            truncate(v.employer_name(), 22),
            truncate(v.city(), 18),
            format!("{}/{}", v.jumlah_terdaftar, v.jumlah_kuota),
            v.chance().label()
        );
    }
    println!(
        "\nPage {}/{} ({} matches)",
        pager.current,
        total,
        visible.len()
    );

    Ok(())
}

async fn resolve_province(client: &ApiClient, query: &str) -> Result<LocationOption> {
    let provinces = client.list_provinces().await?;
    let q = query.to_lowercase();
    provinces
        .into_iter()
        .find(|p| p.value == query || p.label.to_lowercase().starts_with(&q))
        .ok_or_else(|| anyhow!("Unknown province '{}'. Try 'magang provinces'.", query))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_is_char_safe() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exactly ten", 11), "exactly ten");
        assert_eq!(truncate("Teknik Informatika", 10), "Teknik ...");
    }
}
