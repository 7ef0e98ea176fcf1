//! Encrypts provider keys still stored as legacy plaintext.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use devtools::{
    config::ConfigLoader,
    crypto::{SecretCodec, is_encrypted},
    db,
    models::provider_key,
};
use sea_orm::{ActiveModelTrait, EntityTrait, Set};

#[derive(Debug, Parser)]
#[command(about = "Encrypt provider keys that are still stored in plaintext")]
struct Args {
    /// Report what would change without writing
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = ConfigLoader::new().load().context("loading configuration")?;

    let secret = config
        .session_secret
        .as_deref()
        .context("SESSION_SECRET not present in configuration")?;
    let codec = SecretCodec::from_secret(secret).context("initializing secret codec")?;

    let db = db::init_pool(&config)
        .await
        .context("initializing database connection pool")?;

    let rows = provider_key::Entity::find()
        .all(&db)
        .await
        .context("querying provider keys")?;

    let mut updated_count = 0usize;
    for row in rows {
        if row.value.is_empty() || is_encrypted(&row.value) {
            continue;
        }

        let provider = row.provider.clone();
        if args.dry_run {
            println!("would encrypt provider key '{provider}'");
            updated_count += 1;
            continue;
        }

        let ciphertext = codec
            .encrypt(&row.value)
            .with_context(|| format!("encrypting provider key '{provider}'"))?;

        let mut active: provider_key::ActiveModel = row.into();
        active.value = Set(ciphertext);
        active.updated_at = Set(Utc::now().into());
        active
            .update(&db)
            .await
            .with_context(|| format!("updating provider key '{provider}'"))?;
        updated_count += 1;
    }

    if args.dry_run {
        println!("{updated_count} provider key(s) would be re-encrypted.");
    } else {
        println!("Re-encrypted {updated_count} provider key(s) containing legacy plaintext.");
    }

    Ok(())
}
