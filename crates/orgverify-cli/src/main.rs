use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "orgverify-cli")]
#[command(about = "Location verification workflow command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run pending database migrations.
    Migrate,
    /// Insert a demo organization with a few unpaid locations.
    Seed,
    /// Print the verification queue (paid, undecided locations).
    Pending,
    /// Print rejected locations and their email-sent state.
    Rejections,
}

const DEMO_BRANDS: [&str; 3] = ["Demo Cafe Mitte", "Demo Cafe Kreuzberg", "Demo Warehouse"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let pool = orgverify_db::connect_pool_from_env().await?;

    match cli.command {
        Commands::Migrate => {
            let applied = orgverify_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
        }
        Commands::Seed => {
            let org = seed_demo(&pool).await?;
            println!(
                "seeded organization {} with {} unpaid locations",
                org.public_id,
                DEMO_BRANDS.len()
            );
        }
        Commands::Pending => {
            let rows = orgverify_db::list_pending_locations(&pool).await?;
            if rows.is_empty() {
                println!("verification queue is empty");
            }
            for row in rows {
                println!(
                    "{}  #{:<3} {:<30} {:<24} since {}",
                    row.organization_public_id,
                    row.location_index,
                    row.brand_name,
                    row.organization_name,
                    row.created_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        Commands::Rejections => {
            let rows = orgverify_db::list_rejected_locations(&pool).await?;
            if rows.is_empty() {
                println!("no rejected locations");
            }
            for row in rows {
                let email = if row.email_sent { "sent" } else { "unsent" };
                println!(
                    "{}  #{:<3} {:<30} [{}] {}",
                    row.organization_public_id,
                    row.location_index,
                    row.brand_name,
                    email,
                    row.rejection_reason
                );
            }
        }
    }

    Ok(())
}

/// Inserts one demo organization with a headquarters and two branches, all
/// unpaid, so the whole payment-to-decision flow can be walked locally.
async fn seed_demo(pool: &sqlx::PgPool) -> anyhow::Result<orgverify_db::OrganizationRow> {
    let org = orgverify_db::create_organization(
        pool,
        "Demo Organization",
        "demo@orgverify.example",
        Some("retail"),
    )
    .await?;

    for (i, brand) in DEMO_BRANDS.iter().enumerate() {
        let location_type = if i == 0 { "headquarters" } else { "branch" };
        orgverify_db::insert_location(
            pool,
            org.id,
            &orgverify_db::NewLocation {
                brand_name: (*brand).to_string(),
                location_type: location_type.to_string(),
                country: Some("DE".to_string()),
                state: None,
                city: Some("Berlin".to_string()),
                city_region: None,
                street: Some("Invalidenstrasse".to_string()),
                house_number: Some((i + 1).to_string()),
            },
        )
        .await?;
    }

    Ok(org)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[sqlx::test(migrations = "../../migrations")]
    async fn seed_demo_inserts_unpaid_locations(pool: sqlx::PgPool) {
        let org = seed_demo(&pool).await.expect("seed");

        let rows = orgverify_db::list_locations(&pool, org.id)
            .await
            .expect("list locations");
        assert_eq!(rows.len(), DEMO_BRANDS.len());
        assert!(
            rows.iter().all(|r| !r.is_paid_for),
            "seeded locations must start unpaid"
        );
        assert_eq!(rows[0].location_type, "headquarters");
        assert!(rows[1..].iter().all(|r| r.location_type == "branch"));
    }
}
