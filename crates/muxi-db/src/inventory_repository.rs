use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Pool, Postgres};

use muxi_core::error::AppError;
use muxi_core::game::{
    CARD_DRAW_COST, CatalogEntry, CatalogKind, OwnedEntry, Rarity, draw_rarity,
    skill_upgrade_cost,
};

use crate::catalog_repository::{CatalogRow, entry_columns};
use crate::error::db_error;
use crate::user_repository::lock_user;

/// Largest quantity a single grant may add.
pub const MAX_GRANT_AMOUNT: i32 = 10_000;

/// Outcome of a skill upgrade.
#[derive(Debug, Clone)]
pub struct SkillUpgrade {
    pub skill: OwnedEntry,
    pub strength_coin: i64,
}

/// Outcome of a card draw.
#[derive(Debug, Clone)]
pub struct CardDraw {
    pub card: CatalogEntry,
    /// How many copies of the drawn card the user now holds.
    pub quantity: i32,
    pub select_coin: i64,
}

/// Repository for what each user owns, and the coin-spending game actions.
#[derive(Clone)]
pub struct InventoryRepository {
    pool: Pool<Postgres>,
}

impl InventoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Entries of `kind` owned by a user, ordered by catalog id.
    pub async fn owned(&self, user_id: i64, kind: CatalogKind) -> Result<Vec<OwnedEntry>, AppError> {
        let rows = sqlx::query_as::<_, OwnedRow>(&format!(
            "{} ORDER BY c.id ASC",
            owned_select(kind)
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(rows.into_iter().map(|r| r.into_owned(kind)).collect())
    }

    /// Give a user catalog content.
    ///
    /// Achievements and skills are granted once; granting them again is a
    /// no-op. Cards and items add `amount` (default 1) to the held quantity.
    pub async fn grant(
        &self,
        user_id: i64,
        kind: CatalogKind,
        target_id: i64,
        amount: Option<i32>,
    ) -> Result<OwnedEntry, AppError> {
        let amount = amount.unwrap_or(1);
        if !(1..=MAX_GRANT_AMOUNT).contains(&amount) {
            return Err(AppError::ValidationError(format!(
                "amount must be between 1 and {MAX_GRANT_AMOUNT}"
            )));
        }

        let mut tx = self.pool.begin().await.map_err(db_error)?;

        lock_user(&mut tx, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User".into()))?;

        if !catalog_entry_exists(&mut tx, kind, target_id).await? {
            return Err(AppError::NotFound(capitalized(kind)));
        }

        let (table, column) = (kind.owned_table(), kind.owned_column());
        let statement = match kind {
            CatalogKind::Achievement | CatalogKind::Skill => format!(
                "INSERT INTO {table} (user_id, {column}) VALUES ($1, $2) ON CONFLICT DO NOTHING"
            ),
            CatalogKind::Card | CatalogKind::Item => format!(
                "INSERT INTO {table} (user_id, {column}, quantity) VALUES ($1, $2, $3) \
                 ON CONFLICT (user_id, {column}) \
                 DO UPDATE SET quantity = {table}.quantity + EXCLUDED.quantity, updated_at = NOW()"
            ),
        };
        let mut query = sqlx::query(&statement).bind(user_id).bind(target_id);
        if matches!(kind, CatalogKind::Card | CatalogKind::Item) {
            query = query.bind(amount);
        }
        query.execute(&mut *tx).await.map_err(db_error)?;

        let owned = fetch_owned_entry(&mut tx, user_id, kind, target_id)
            .await?
            .ok_or_else(|| AppError::Generic(format!("granted {kind} vanished")))?;

        tx.commit().await.map_err(db_error)?;

        tracing::info!(user_id, kind = %kind, target_id, amount, "Catalog content granted");
        Ok(owned)
    }

    /// Raise an owned skill by one level, paying `100 * current_level` strength coins.
    pub async fn upgrade_skill(&self, user_id: i64, skill_id: i64) -> Result<SkillUpgrade, AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let user = lock_user(&mut tx, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User".into()))?;

        if !catalog_entry_exists(&mut tx, CatalogKind::Skill, skill_id).await? {
            return Err(AppError::NotFound("Skill".into()));
        }

        let skill = fetch_owned_entry(&mut tx, user_id, CatalogKind::Skill, skill_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Learned skill".into()))?;

        let level = skill.level.unwrap_or(1);
        let max_level = skill.max_level.unwrap_or(level);
        if level >= max_level {
            return Err(AppError::Conflict(format!(
                "skill is already at max level {max_level}"
            )));
        }

        let cost = skill_upgrade_cost(level);
        if user.strength_coin < cost {
            return Err(AppError::Conflict(format!(
                "not enough strength coins: need {cost}, have {}",
                user.strength_coin
            )));
        }

        let (strength_coin,): (i64,) = sqlx::query_as(
            r#"
            UPDATE users
            SET strength_coin = strength_coin - $2, updated_at = NOW()
            WHERE id = $1
            RETURNING strength_coin
            "#,
        )
        .bind(user_id)
        .bind(cost)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;

        sqlx::query(
            r#"
            UPDATE user_skills
            SET level = level + 1, updated_at = NOW()
            WHERE user_id = $1 AND skill_id = $2
            "#,
        )
        .bind(user_id)
        .bind(skill_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;

        tracing::debug!(user_id, skill_id, new_level = level + 1, cost, "Skill upgraded");
        Ok(SkillUpgrade {
            skill: OwnedEntry {
                level: Some(level + 1),
                ..skill
            },
            strength_coin,
        })
    }

    /// Spend select coins on one weighted-random card.
    pub async fn draw_card(&self, user_id: i64) -> Result<CardDraw, AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let user = lock_user(&mut tx, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User".into()))?;

        if user.select_coin < CARD_DRAW_COST {
            return Err(AppError::Conflict(format!(
                "not enough select coins: need {CARD_DRAW_COST}, have {}",
                user.select_coin
            )));
        }

        let available = available_rarities(&mut tx).await?;
        // ThreadRng is !Send, keep it out of scope across awaits.
        let rarity = {
            let mut rng = rand::rng();
            draw_rarity(&available, &mut rng)
        }
        .ok_or_else(|| AppError::NotFound("Card".into()))?;

        let card = sqlx::query_as::<_, CatalogRow>(&format!(
            "SELECT {} FROM cards WHERE rarity = $1 ORDER BY random() LIMIT 1",
            entry_columns(CatalogKind::Card)
        ))
        .bind(rarity.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?
        .into_entry(CatalogKind::Card);

        let (select_coin,): (i64,) = sqlx::query_as(
            r#"
            UPDATE users
            SET select_coin = select_coin - $2, updated_at = NOW()
            WHERE id = $1
            RETURNING select_coin
            "#,
        )
        .bind(user_id)
        .bind(CARD_DRAW_COST)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;

        let (quantity,): (i32,) = sqlx::query_as(
            r#"
            INSERT INTO user_cards (user_id, card_id, quantity)
            VALUES ($1, $2, 1)
            ON CONFLICT (user_id, card_id)
            DO UPDATE SET quantity = user_cards.quantity + 1, updated_at = NOW()
            RETURNING quantity
            "#,
        )
        .bind(user_id)
        .bind(card.id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;

        tracing::debug!(user_id, card_id = card.id, rarity = %rarity, "Card drawn");
        Ok(CardDraw {
            card,
            quantity,
            select_coin,
        })
    }
}

async fn catalog_entry_exists(
    conn: &mut PgConnection,
    kind: CatalogKind,
    id: i64,
) -> Result<bool, AppError> {
    let (exists,): (bool,) = sqlx::query_as(&format!(
        "SELECT EXISTS (SELECT 1 FROM {} WHERE id = $1)",
        kind.table()
    ))
    .bind(id)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error)?;

    Ok(exists)
}

async fn fetch_owned_entry(
    conn: &mut PgConnection,
    user_id: i64,
    kind: CatalogKind,
    entry_id: i64,
) -> Result<Option<OwnedEntry>, AppError> {
    let row = sqlx::query_as::<_, OwnedRow>(&format!(
        "{} AND c.id = $2",
        owned_select(kind)
    ))
    .bind(user_id)
    .bind(entry_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_error)?;

    Ok(row.map(|r| r.into_owned(kind)))
}

/// Rarities that have at least one card, in weight order.
async fn available_rarities(conn: &mut PgConnection) -> Result<Vec<Rarity>, AppError> {
    let present: Vec<(String,)> = sqlx::query_as(r#"SELECT DISTINCT rarity FROM cards"#)
        .fetch_all(&mut *conn)
        .await
        .map_err(db_error)?;

    Ok(Rarity::ALL
        .into_iter()
        .filter(|rarity| present.iter().any(|(r,)| r == rarity.as_str()))
        .collect())
}

/// Ownership rows joined with their catalog entry, filtered by `user_id = $1`.
fn owned_select(kind: CatalogKind) -> String {
    let (extra, acquired) = match kind {
        CatalogKind::Achievement => (
            "NULL::INTEGER AS level, NULL::INTEGER AS max_level, \
             NULL::INTEGER AS quantity, NULL::VARCHAR AS rarity",
            "o.unlocked_at",
        ),
        CatalogKind::Skill => (
            "o.level, c.max_level, NULL::INTEGER AS quantity, NULL::VARCHAR AS rarity",
            "o.acquired_at",
        ),
        CatalogKind::Card => (
            "NULL::INTEGER AS level, NULL::INTEGER AS max_level, o.quantity, c.rarity",
            "o.acquired_at",
        ),
        CatalogKind::Item => (
            "NULL::INTEGER AS level, NULL::INTEGER AS max_level, o.quantity, NULL::VARCHAR AS rarity",
            "o.acquired_at",
        ),
    };

    format!(
        "SELECT c.id AS entry_id, c.name, c.description, {extra}, {acquired} AS acquired_at \
         FROM {owned} o JOIN {catalog} c ON c.id = o.{column} \
         WHERE o.user_id = $1",
        owned = kind.owned_table(),
        catalog = kind.table(),
        column = kind.owned_column(),
    )
}

fn capitalized(kind: CatalogKind) -> String {
    let name = kind.as_str();
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct OwnedRow {
    entry_id: i64,
    name: String,
    description: String,
    level: Option<i32>,
    max_level: Option<i32>,
    quantity: Option<i32>,
    rarity: Option<String>,
    acquired_at: DateTime<Utc>,
}

impl OwnedRow {
    fn into_owned(self, kind: CatalogKind) -> OwnedEntry {
        OwnedEntry {
            kind,
            entry_id: self.entry_id,
            name: self.name,
            description: self.description,
            level: self.level,
            max_level: self.max_level,
            quantity: self.quantity,
            rarity: self.rarity.and_then(|r| r.parse().ok()),
            acquired_at: self.acquired_at,
        }
    }
}
