use serde::{Serialize, Deserialize};
use sea_orm::entity::prelude::*;

// La table porte un index unique composé sur (student_id, lesson_id).
// Le grant passe par un seul upsert conditionnel (ON CONFLICT DO UPDATE),
// jamais par un find puis un save séparés: deux grants concurrents sur une
// paire jamais vue ne peuvent donc pas créer deux documents.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "lesson_access")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub student_id: i32,
    pub lesson_id: i32,
    pub is_accessible: bool, // false et "pas d'enregistrement" sont équivalents côté check
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
        belongs_to = "super::lessons::Entity",
        from = "Column::LessonId",
        to = "super::lessons::Column::Id"
    )]
    Lesson,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl Related<super::lessons::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lesson.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
