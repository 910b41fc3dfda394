use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::Serialize;

use crate::pricing::Discount;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    #[sea_orm(unique)]
    pub slug: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub brand: Option<String>,
    pub price: f64,
    pub stock: i32,
    #[sea_orm(indexed)]
    pub category_id: Option<i32>,
    pub image_id: Option<i32>,
    #[sea_orm(default_value = false)]
    pub requires_prescription: bool,
    #[sea_orm(default_value = false)]
    pub is_featured: bool,
    #[sea_orm(default_value = true)]
    pub is_active: bool,
    pub discount_percentage: Option<f64>,
    pub discount_start: Option<DateTimeUtc>,
    pub discount_end: Option<DateTimeUtc>,
    #[sea_orm(default_value = 0.0)]
    pub rating: f64,
    #[sea_orm(default_value = 0)]
    pub num_reviews: i32,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// The discount window as stored; `None` unless all three columns are set.
    pub fn discount(&self) -> Option<Discount> {
        match (
            self.discount_percentage,
            self.discount_start,
            self.discount_end,
        ) {
            (Some(percentage), Some(start), Some(end)) => Some(Discount {
                percentage,
                start,
                end,
            }),
            _ => None,
        }
    }

    pub fn effective_price(&self, now: DateTime<Utc>) -> f64 {
        crate::pricing::effective_price(self.price, self.discount().as_ref(), now)
    }

    pub fn discount_active(&self, now: DateTime<Utc>) -> bool {
        self.discount().is_some_and(|d| d.is_active(now))
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "crate::entities::category::Entity",
        from = "crate::entities::product::Column::CategoryId",
        to = "crate::entities::category::Column::Id",
        on_update = "Cascade",
        on_delete = "SetNull"
    )]
    Category,
    #[sea_orm(
        belongs_to = "crate::entities::image::Entity",
        from = "crate::entities::product::Column::ImageId",
        to = "crate::entities::image::Column::Id",
        on_update = "Cascade",
        on_delete = "SetNull"
    )]
    Image,
    #[sea_orm(has_many = "crate::entities::review::Entity")]
    Review,
}

impl Related<crate::entities::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<crate::entities::review::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Review.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
