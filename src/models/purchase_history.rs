use serde::{Serialize, Deserialize};
use sea_orm::entity::prelude::*;

// Journal append-only des tentatives de paiement: un enregistrement par
// tentative, jamais modifié sur place (une nouvelle tentative échouée produit
// un nouvel enregistrement, pas une transition de statut. Choix volontaire
// pour conserver la piste d'audit).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchase_history")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub student_id: i32,
    pub course_id: i32,
    pub payment_status: String, // 'paid', 'pending', 'failed'
    pub transaction_date: DateTimeUtc,
    pub amount: Option<Decimal>,
    pub tx_ref: Option<String>, // Référence gateway, si la tentative en a une
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
