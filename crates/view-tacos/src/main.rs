use anyhow::Result;
use clap::{Parser, Subcommand};
use shared::{Business, LabelMatch, TacoDb, TacoReport, DEFAULT_DB_PATH};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "view-tacos")]
#[command(about = "Browse the taco restaurant database")]
struct Args {
    /// SQLite database file
    #[arg(long, default_value = DEFAULT_DB_PATH, global = true)]
    db: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// List every restaurant (default)
    List,
    /// Show one restaurant with its reviews
    Show { id: String },
    /// Search names and addresses
    Search { query: String },
    /// Restaurants whose best taco matches a label
    Taco {
        label: String,
        /// Match the whole label instead of a substring
        #[arg(long)]
        exact: bool,
    },
    /// Most common best tacos
    Top {
        #[arg(short, long, default_value = "10")]
        n: usize,
    },
    /// Restaurant counts by ZIP code
    Zips,
    /// Number of restaurants
    Count,
    /// Print a stored setting
    Setting { key: String },
    /// Delete a restaurant and its reviews
    Delete { id: String },
}

fn main() -> Result<()> {
    let args = Args::parse();
    let open = || TacoReport::open(&args.db);

    match args.command.unwrap_or(Command::List) {
        Command::List => list_all(&open()?)?,
        Command::Show { id } => show(&open()?, &id)?,
        Command::Search { query } => print_matches(&open()?.search(&query)?),
        Command::Taco { label, exact } => {
            let mode = if exact {
                LabelMatch::Exact
            } else {
                LabelMatch::Contains
            };
            print_matches(&open()?.by_best_taco(&label, mode)?);
        }
        Command::Top { n } => {
            for (i, (taco, count)) in open()?.top_best_tacos(n)?.iter().enumerate() {
                println!("{:>3}. {} ({})", i + 1, taco, count);
            }
        }
        Command::Zips => {
            for (zip, count) in open()?.counts_by_postal_code()? {
                println!("{}: {}", zip, count);
            }
        }
        Command::Count => println!("{}", open()?.total_count()?),
        Command::Setting { key } => match open()?.get_setting(&key)? {
            Some(value) => println!("{} = {}", key, value),
            None => println!("{} is not set", key),
        },
        Command::Delete { id } => {
            // The only write, so it needs a read-write handle
            let db = TacoDb::open(&args.db)?;
            if db.delete_business(&id)? {
                println!("✓ Deleted {} and its reviews", id);
            } else {
                println!("No restaurant found with id: {}", id);
            }
        }
    }

    Ok(())
}

fn list_all(report: &TacoReport) -> Result<()> {
    let businesses = report.list_all()?;
    println!("Total restaurants in database: {}\n", businesses.len());

    for (i, business) in businesses.iter().enumerate() {
        println!("Restaurant #{}:", i + 1);
        print_business(business);
        let reviews = report.review_count(&business.id)?;
        if reviews > 0 {
            println!("Reviews: {} (use `show {}` to view)", reviews, business.id);
        }
        println!("{}", "-".repeat(50));
    }
    Ok(())
}

fn show(report: &TacoReport, id: &str) -> Result<()> {
    let Some(business) = report.get_by_id(id)? else {
        println!("No restaurant found with id: {}", id);
        return Ok(());
    };

    print_business(&business);

    let reviews = report.reviews_for(id)?;
    if reviews.is_empty() {
        println!("\nNo reviews found for this restaurant");
        return Ok(());
    }

    println!("\nReviews ({}):", reviews.len());
    for (i, review) in reviews.iter().enumerate() {
        println!("  Review #{}:", i + 1);
        if let Some(rating) = review.rating {
            println!("  Rating: {}/5", rating);
        }
        if let Some(date) = &review.date {
            println!("  Date: {}", date);
        }
        println!("  {}\n", review.text);
    }
    Ok(())
}

fn print_matches(businesses: &[Business]) {
    if businesses.is_empty() {
        println!("No matching restaurants.");
        return;
    }
    for business in businesses {
        println!(
            "{}  {} [{}] best taco: {}",
            business.id,
            business.name,
            business.address,
            business.best_taco.as_deref().unwrap_or("Unknown")
        );
    }
}

fn print_business(business: &Business) {
    println!("ID: {}", business.id);
    println!("Name: {}", business.name);
    println!("Address: {}", business.address);
    match &business.hours {
        Some(hours) => {
            println!("Hours:");
            for (day, range) in hours.iter() {
                println!("  {}: {}", day, range.unwrap_or("Closed"));
            }
        }
        None => println!("Hours: unavailable"),
    }
    println!(
        "Best taco: {}",
        business.best_taco.as_deref().unwrap_or("Unknown")
    );
}
