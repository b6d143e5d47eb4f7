use serde::{Serialize, Deserialize};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "courses")]
#[serde(rename_all = "camelCase")] // Les modèles sortent tels quels en JSON: camelCase côté client
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    pub description: String,
    pub category: String,            // 'development', 'business', 'design', etc.
    pub level: String,               // 'beginner', 'intermediate', 'advanced'
    pub price: Decimal,              // En ETB
    pub instructor_id: i32,
    pub cover_image: Option<String>, // Chemin relatif sous uploads/courseImages
    pub is_active: bool,             // Seul gate pour le listing côté étudiant
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::InstructorId",
        to = "super::users::Column::Id"
    )]
    Instructor,

    #[sea_orm(has_many = "super::lessons::Entity")]
    Lessons,

    #[sea_orm(has_many = "super::enrollments::Entity")]
    Enrollments,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Instructor.def()
    }
}

impl Related<super::lessons::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lessons.def()
    }
}

impl Related<super::enrollments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Enrollments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_course_serializes_in_camel_case() {
        let course = Model {
            id: 1,
            title: "Rust pour le web".to_string(),
            description: "Backend avec actix-web".to_string(),
            category: "development".to_string(),
            level: "beginner".to_string(),
            price: Decimal::new(49999, 2),
            instructor_id: 7,
            cover_image: Some("uploads/courseImages/a.png".to_string()),
            is_active: true,
            created_at: chrono::Utc::now(),
        };

        let json = serde_json::to_value(&course).unwrap();
        assert!(json.get("instructorId").is_some());
        assert!(json.get("coverImage").is_some());
        assert!(json.get("isActive").is_some());
        assert!(json.get("createdAt").is_some());
        assert!(json.get("instructor_id").is_none());
        assert!(json.get("is_active").is_none());
    }
}
