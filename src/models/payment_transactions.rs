use serde::{Serialize, Deserialize};
use sea_orm::entity::prelude::*;

// Machine à états locale pour la confirmation de paiement hors-bande:
// pending → paid | failed. Le tx_ref (unique) sert aussi de clé
// d'idempotence pour l'initiation et la vérification.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_transactions")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub tx_ref: String,
    pub student_id: i32,
    pub course_id: i32,
    pub amount: Decimal,
    pub email: String,
    pub full_name: String,
    pub status: String, // 'pending', 'paid', 'failed'
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::StudentId",
        to = "super::users::Column::Id"
    )]
    Student,

    #[sea_orm(
        belongs_to = "super::courses::Entity",
        from = "Column::CourseId",
        to = "super::courses::Column::Id"
    )]
    Course,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl Related<super::courses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Course.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
