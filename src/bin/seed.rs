/// Seed the default accounts, categories and tags
///
/// Safe to run repeatedly: existing rows are left untouched.
use anyhow::{Context, Result};
use newshub::{
    admin::Role,
    config::ServerConfig,
    content::{CategoryInput, TagInput},
    error::AppError,
    AppContext,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const ACCOUNTS: &[(&str, &str, &str, Role)] = &[
    ("superadmin", "superadmin@newshub.com", "superadmin123", Role::SuperAdmin),
    ("admin", "admin@newshub.com", "admin123", Role::Admin),
    ("editor", "editor@newshub.com", "editor123", Role::Editor),
    ("user", "user@newshub.com", "user123", Role::Reader),
];

const CATEGORIES: &[(&str, &str)] = &[
    ("Política", "Política nacional e internacional"),
    ("Economia", "Mercado, finanças e negócios"),
    ("Tecnologia", "Inovação, ciência e tecnologia"),
    ("Esportes", "Futebol e outros esportes"),
    ("Jogos", "Videogames e e-sports"),
    ("Saúde", "Saúde e bem-estar"),
];

const TAGS: &[(&str, &str)] = &[
    ("Eleições 2026", "eleicoes"),
    ("GTA VI", "urgente"),
    ("Inteligencia Artificial", "ia"),
    ("Gaming", "gaming"),
];

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "newshub=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env().context("loading configuration")?;
    let ctx = AppContext::new(config).await.context("opening database")?;

    seed_accounts(&ctx).await?;
    seed_categories(&ctx).await?;
    seed_tags(&ctx).await?;

    tracing::info!("Seeding complete");
    Ok(())
}

async fn seed_accounts(ctx: &AppContext) -> Result<()> {
    for (username, email, password, role) in ACCOUNTS {
        if ctx.account_manager.find_by_email(email).await?.is_some() {
            tracing::info!("Account {} already exists", email);
            continue;
        }

        // Default passwords predate the password policy
        ctx.account_manager
            .create_with_role(username, email, password, *role)
            .await
            .with_context(|| format!("creating account {}", email))?;
        tracing::info!("Created {} account {}", role, email);
    }

    Ok(())
}

async fn seed_categories(ctx: &AppContext) -> Result<()> {
    for (name, description) in CATEGORIES {
        let input = CategoryInput {
            name: name.to_string(),
            description: Some(description.to_string()),
            ..Default::default()
        };

        match ctx.taxonomy_manager.create_category(input).await {
            Ok(category) => tracing::info!("Created category {} ({})", category.name, category.slug),
            Err(AppError::Validation(_)) => tracing::info!("Category {} already exists", name),
            Err(e) => return Err(e).with_context(|| format!("creating category {}", name)),
        }
    }

    Ok(())
}

async fn seed_tags(ctx: &AppContext) -> Result<()> {
    for (name, slug) in TAGS {
        if ctx.taxonomy_manager.tag_by_slug(slug).await.is_ok() {
            tracing::info!("Tag {} already exists", slug);
            continue;
        }

        let input = TagInput {
            name: name.to_string(),
            slug: Some(slug.to_string()),
        };

        match ctx.taxonomy_manager.create_tag(input).await {
            Ok(tag) => tracing::info!("Created tag {} ({})", tag.name, tag.slug),
            Err(AppError::Validation(_)) => tracing::info!("Tag {} already exists", name),
            Err(e) => return Err(e).with_context(|| format!("creating tag {}", name)),
        }
    }

    Ok(())
}
