pub mod address;
pub mod cart;
pub mod category;
pub mod image;
pub mod order;
pub mod order_part;
pub mod order_status;
pub mod product;
pub mod review;
pub mod user;
pub mod wishlist;

use chrono::Utc;
use sea_orm::{
    sea_query::Index, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, Schema, Set,
};
use tracing::info;

use crate::config::Config;
use crate::error::ApiError;
use crate::middleware::auth::hash_password;

async fn create_table<E: EntityTrait>(db: &DatabaseConnection, entity: E) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let mut statement = Schema::new(backend).create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(backend.build(&statement)).await?;
    Ok(())
}

/// One row per user and product.
async fn create_user_product_index<E, C>(
    db: &DatabaseConnection,
    entity: E,
    user_col: C,
    product_col: C,
) -> Result<(), DbErr>
where
    E: EntityTrait,
    C: ColumnTrait,
{
    let backend = db.get_database_backend();
    let statement = Index::create()
        .name(format!("idx_{}_user_product", entity.table_name()))
        .table(entity)
        .col(user_col)
        .col(product_col)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(backend.build(&statement)).await?;
    Ok(())
}

/// Creates every table that is missing. Referenced tables go first.
pub async fn setup_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    create_table(db, image::Entity).await?;
    create_table(db, user::Entity).await?;
    create_table(db, address::Entity).await?;
    create_table(db, category::Entity).await?;
    create_table(db, product::Entity).await?;
    create_table(db, review::Entity).await?;
    create_table(db, wishlist::Entity).await?;
    create_table(db, cart::Entity).await?;
    create_table(db, order::Entity).await?;
    create_table(db, order_part::Entity).await?;
    create_table(db, order_status::Entity).await?;

    create_user_product_index(db, review::Entity, review::Column::UserId, review::Column::ProductId)
        .await?;
    create_user_product_index(
        db,
        wishlist::Entity,
        wishlist::Column::UserId,
        wishlist::Column::ProductId,
    )
    .await?;
    create_user_product_index(db, cart::Entity, cart::Column::UserId, cart::Column::ProductId)
        .await?;
    Ok(())
}

/// Seeds the configured admin account unless a user with that email exists.
pub async fn seed_admin(db: &DatabaseConnection, config: &Config) -> Result<(), ApiError> {
    let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else {
        return Ok(());
    };
    let email = email.trim().to_lowercase();

    let existing = user::Entity::find()
        .filter(user::Column::Email.eq(email.as_str()))
        .one(db)
        .await?;
    if existing.is_some() {
        return Ok(());
    }

    let new_admin = user::ActiveModel {
        name: Set("Administrator".to_owned()),
        email: Set(email.clone()),
        password: Set(Some(hash_password(password)?)),
        google_id: Set(None),
        role: Set(user::Role::Admin),
        phone: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    user::Entity::insert(new_admin).exec(db).await?;
    info!(email = %email, "Seeded admin account");

    Ok(())
}
